/*!
Session state and the per-peer registry tying established keys to live
transport connections.
*/

pub mod registry;
pub mod session;

pub use registry::{PeerDescriptor, SessionEvents, SessionRegistry};
pub use session::{Session, SessionStatus};
