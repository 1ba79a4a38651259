/*!
Per-peer session registry.

The registry owns every live [`Session`], establishes new ones on
demand (initiator side), accepts and registers inbound ones (responder
side), and removes entries when their transport closes or errors.

Concurrent `get_or_establish` calls for the same unregistered peer
coalesce on a per-peer in-flight lock, so at most one handshake runs per
peer at a time and the loser of the race reuses the winner's session.
*/

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::crypto::kdf::SessionKey;
use crate::crypto::kem::{Kem, KyberKem};
use crate::error::{Error, Result, protocol_err};
use crate::framing::{FrameDecoder, encode_frame};
use crate::handshake::driver::{initiate, respond};
use crate::handshake::state::Role;
use crate::identity::ServerIdentity;
use crate::session::session::{Session, SessionStatus};

/// Connect target: peer identifier plus transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    /// Peer identifier the session will be keyed by
    pub id: String,
    /// Transport address to connect to
    pub addr: SocketAddr,
}

impl PeerDescriptor {
    /// Create a peer descriptor
    pub fn new(id: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            id: id.into(),
            addr,
        }
    }
}

/// Collaborator callbacks for session lifecycle and application frames.
///
/// `on_session_established` fires exactly once per successful handshake;
/// `on_frame` fires once per decoded frame, in arrival order. Frame
/// payload content is opaque to the registry — malformed application
/// content is the collaborator's concern.
pub trait SessionEvents: Send + Sync + 'static {
    /// A handshake completed and the session was registered
    fn on_session_established(&self, _peer_id: &str, _key: &SessionKey) {}

    /// One application frame arrived from the peer
    fn on_frame(&self, peer_id: &str, payload: Vec<u8>);
}

/// Process-wide mapping from peer identifier to live session.
pub struct SessionRegistry<K: Kem> {
    inner: Arc<Inner<K>>,
}

impl<K: Kem> Clone for SessionRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<K: Kem> {
    local_id: String,
    kem: K,
    identity: ServerIdentity,
    config: ChannelConfig,
    events: Arc<dyn SessionEvents>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    // Per-peer in-flight handshake tokens; guarded separately so the
    // sessions map is never held across a handshake await.
    pending: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry<KyberKem> {
    /// Create a registry for this endpoint.
    ///
    /// The KEM backend is built from `config.algorithm`; `identity` is
    /// the process-wide responder keypair and must use the same
    /// parameter set. `events` receives session and frame callbacks.
    pub fn new(
        local_id: impl Into<String>,
        identity: ServerIdentity,
        config: ChannelConfig,
        events: Arc<dyn SessionEvents>,
    ) -> Self {
        Self::with_kem(local_id, KyberKem::new(config.algorithm), identity, config, events)
    }
}

impl<K: Kem + 'static> SessionRegistry<K> {
    /// Create a registry around an explicit KEM backend.
    ///
    /// The backend takes precedence over `config.algorithm`; use
    /// [`SessionRegistry::new`] to derive it from the configuration.
    pub fn with_kem(
        local_id: impl Into<String>,
        kem: K,
        identity: ServerIdentity,
        config: ChannelConfig,
        events: Arc<dyn SessionEvents>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                local_id: local_id.into(),
                kem,
                identity,
                config,
                events,
                sessions: Mutex::new(HashMap::new()),
                pending: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// This endpoint's identifier, sent to peers after each handshake
    pub fn local_id(&self) -> &str {
        &self.inner.local_id
    }

    /// Return the session key for a peer, handshaking first if needed.
    ///
    /// If a live session is registered its key is returned without any
    /// KEM work. Otherwise the peer is connected, the initiator
    /// handshake runs, and the session is registered on success. A
    /// failed handshake releases the transport and leaves no entry;
    /// retrying is the caller's decision.
    pub async fn get_or_establish(&self, peer: &PeerDescriptor) -> Result<SessionKey> {
        if let Some(key) = self.lookup_live(&peer.id).await {
            return Ok(key);
        }

        // One in-flight handshake per peer id; losers wait here and
        // then find the winner's session registered.
        let token = {
            let mut pending = self.inner.pending.lock().unwrap();
            pending.entry(peer.id.clone()).or_default().clone()
        };
        let result = {
            let _in_flight = token.lock().await;
            match self.lookup_live(&peer.id).await {
                Some(key) => Ok(key),
                None => self.establish(peer).await,
            }
        };

        // Prune the token once nobody else is waiting on it; a count of
        // two is the map's reference plus our own.
        {
            let mut pending = self.inner.pending.lock().unwrap();
            if let Some(entry) = pending.get(&peer.id) {
                if Arc::ptr_eq(entry, &token) && Arc::strong_count(entry) == 2 {
                    pending.remove(&peer.id);
                }
            }
        }
        result
    }

    async fn establish(&self, peer: &PeerDescriptor) -> Result<SessionKey> {
        debug!(peer = %peer.id, status = %SessionStatus::Connecting, "opening transport");
        let mut stream = TcpStream::connect(peer.addr).await?;

        debug!(peer = %peer.id, status = %SessionStatus::Handshaking, "starting handshake");
        let mut decoder = FrameDecoder::new(self.inner.config.max_frame_size);
        let key = initiate(
            &mut stream,
            &mut decoder,
            &self.inner.kem,
            &self.inner.config,
        )
        .await?;

        // The first application frame carries our identity so the
        // responder can key its registry entry.
        let frame = encode_frame(self.inner.local_id.as_bytes());
        stream.write_all(&frame).await?;
        stream.flush().await?;

        let (read_half, write_half) = stream.into_split();
        let session = Arc::new(Session::established(
            peer.id.clone(),
            Role::Initiator,
            key.clone(),
            write_half,
        ));
        if let Some(old) = self
            .inner
            .sessions
            .lock()
            .await
            .insert(peer.id.clone(), session.clone())
        {
            old.mark_closed();
        }

        info!(peer = %peer.id, "secure session established");
        self.inner.events.on_session_established(&peer.id, &key);
        tokio::spawn(read_loop(self.inner.clone(), session, read_half, decoder));

        Ok(key)
    }

    /// Frame-encode a payload and send it to a registered peer.
    ///
    /// Resolves when the write flushes. A transport failure closes and
    /// removes the session before the error is returned.
    pub async fn send_framed(&self, peer_id: &str, payload: &[u8]) -> Result<()> {
        let session = self
            .inner
            .sessions
            .lock()
            .await
            .get(peer_id)
            .cloned()
            .ok_or_else(|| Error::InvalidState {
                expected: "registered session".to_string(),
                actual: format!("no session for peer {}", peer_id),
            })?;

        if let Err(err) = session.write_frame(payload).await {
            warn!(peer = %peer_id, error = %err, "write failed, closing session");
            remove_session(&self.inner, &session).await;
            return Err(err);
        }
        Ok(())
    }

    /// Close a session and remove it from the registry.
    ///
    /// Dropping the transport half shuts the write direction down; the
    /// peer observes EOF and removes its own entry. A closed peer id can
    /// be re-established with a fresh `get_or_establish` call.
    pub async fn close(&self, peer_id: &str) {
        if let Some(session) = self.inner.sessions.lock().await.remove(peer_id) {
            session.mark_closed();
            debug!(peer = %peer_id, status = %SessionStatus::Closed, "session removed");
        }
    }

    /// Whether a live session is registered for the peer
    pub async fn contains(&self, peer_id: &str) -> bool {
        self.lookup_live(peer_id).await.is_some()
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Number of establishment attempts currently holding a per-peer token
    pub fn pending_handshakes(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }

    /// Accept inbound connections forever.
    ///
    /// Each connection runs the responder handshake on its own task;
    /// failures drop that connection without registering anything and
    /// without affecting other sessions.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(local = %self.inner.local_id, "listening for inbound sessions");
        loop {
            let (stream, addr) = listener.accept().await?;
            tokio::spawn(handle_inbound(self.inner.clone(), stream, addr));
        }
    }

    async fn lookup_live(&self, peer_id: &str) -> Option<SessionKey> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .get(peer_id)
            .filter(|session| session.is_live())
            .map(|session| session.session_key())
    }
}

async fn handle_inbound<K: Kem + 'static>(
    inner: Arc<Inner<K>>,
    mut stream: TcpStream,
    addr: SocketAddr,
) {
    let mut decoder = FrameDecoder::new(inner.config.max_frame_size);
    let key = match respond(
        &mut stream,
        &mut decoder,
        &inner.kem,
        &inner.identity,
        &inner.config,
    )
    .await
    {
        Ok(key) => key,
        Err(err) => {
            warn!(%addr, error = %err, "inbound handshake failed");
            return;
        }
    };

    // The initiator announces its identifier in the first frame.
    let peer_id = match recv_identity(&mut stream, &mut decoder, &inner.config).await {
        Ok(id) => id,
        Err(err) => {
            warn!(%addr, error = %err, "no identity frame after handshake");
            return;
        }
    };

    let (read_half, write_half) = stream.into_split();
    let session = Arc::new(Session::established(
        peer_id.clone(),
        Role::Responder,
        key.clone(),
        write_half,
    ));
    // A reconnecting peer replaces its old entry; the stale session is
    // closed here and its reader exits without touching the new entry.
    if let Some(old) = inner
        .sessions
        .lock()
        .await
        .insert(peer_id.clone(), session.clone())
    {
        old.mark_closed();
    }

    info!(peer = %peer_id, "secure session established");
    inner.events.on_session_established(&peer_id, &key);
    read_loop(inner, session, read_half, decoder).await;
}

async fn recv_identity(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
    config: &ChannelConfig,
) -> Result<String> {
    let wait = async {
        loop {
            if let Some(payload) = decoder.next_frame()? {
                return match String::from_utf8(payload) {
                    Ok(id) if !id.is_empty() => Ok(id),
                    _ => protocol_err("identity frame is not valid UTF-8"),
                };
            }
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed before sending its identity",
                )));
            }
            decoder.extend(&buf[..n]);
        }
    };

    match timeout(config.step_timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(config.step_timeout.as_millis() as u64)),
    }
}

/// Deliver application frames until the transport closes or errors.
async fn read_loop<K: Kem>(
    inner: Arc<Inner<K>>,
    session: Arc<Session>,
    mut read_half: OwnedReadHalf,
    mut decoder: FrameDecoder,
) {
    let peer_id = session.peer_id().to_string();
    let mut buf = [0u8; 4096];
    loop {
        loop {
            match decoder.next_frame() {
                Ok(Some(payload)) => inner.events.on_frame(&peer_id, payload),
                Ok(None) => break,
                Err(err) => {
                    warn!(peer = %peer_id, error = %err, "frame error, closing session");
                    remove_session(&inner, &session).await;
                    return;
                }
            }
        }

        match read_half.read(&mut buf).await {
            Ok(0) => {
                debug!(peer = %peer_id, "peer closed the connection");
                remove_session(&inner, &session).await;
                return;
            }
            Ok(n) => decoder.extend(&buf[..n]),
            Err(err) => {
                warn!(peer = %peer_id, error = %err, "read failed, closing session");
                remove_session(&inner, &session).await;
                return;
            }
        }
    }
}

// Removal is identity-guarded: a dying connection must never evict a
// replacement session registered under the same peer id.
async fn remove_session<K: Kem>(inner: &Arc<Inner<K>>, session: &Arc<Session>) {
    let peer_id = session.peer_id();
    let mut sessions = inner.sessions.lock().await;
    if sessions
        .get(peer_id)
        .is_some_and(|current| Arc::ptr_eq(current, session))
    {
        sessions.remove(peer_id);
        debug!(peer = %peer_id, status = %SessionStatus::Closed, "session removed");
    }
    session.mark_closed();
}
