/*!
The four-message KEM handshake: wire messages, the state machine, and
the per-role async drivers.
*/

pub mod driver;
pub mod message;
pub mod state;

pub use driver::{initiate, respond};
pub use message::HandshakeMessage;
pub use state::{HandshakeState, Role};
