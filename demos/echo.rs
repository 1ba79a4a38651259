// Two endpoints on loopback: one serves, one establishes a session and
// sends a framed message; the server echoes it back.
use std::sync::Arc;

use kemtls_channel::{
    ChannelConfig, KyberKem, PeerDescriptor, Result, ServerIdentity, SessionEvents, SessionKey,
    SessionRegistry,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct Forwarder {
    frames: mpsc::UnboundedSender<(String, Vec<u8>)>,
}

impl SessionEvents for Forwarder {
    fn on_session_established(&self, peer_id: &str, key: &SessionKey) {
        println!(
            "session established with {} ({}-byte key)",
            peer_id,
            key.as_bytes().len()
        );
    }

    fn on_frame(&self, peer_id: &str, payload: Vec<u8>) {
        let _ = self.frames.send((peer_id.to_string(), payload));
    }
}

fn make_node(id: &str) -> Result<(SessionRegistry<KyberKem>, mpsc::UnboundedReceiver<(String, Vec<u8>)>)> {
    let config = ChannelConfig::default();
    let identity = ServerIdentity::generate(&KyberKem::new(config.algorithm))?;
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = SessionRegistry::new(id, identity, config, Arc::new(Forwarder { frames: tx }));
    Ok((registry, rx))
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("KEMTLS Channel Echo Demo");
    println!("========================");

    let (server, mut server_rx) = make_node("server")?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });

    // Echo every frame back to its sender
    let echoing = server.clone();
    tokio::spawn(async move {
        while let Some((peer, payload)) = server_rx.recv().await {
            println!("server received {} bytes from {}", payload.len(), peer);
            let _ = echoing.send_framed(&peer, &payload).await;
        }
    });

    let (client, mut client_rx) = make_node("client")?;
    let peer = PeerDescriptor::new("server", addr);
    let key = client.get_or_establish(&peer).await?;
    println!("client session key: {:02x?}...", &key.as_bytes()[..8]);

    client.send_framed("server", b"ping").await?;
    let (from, payload) = client_rx.recv().await.expect("echo reply");
    println!(
        "client received {:?} back from {}",
        String::from_utf8_lossy(&payload),
        from
    );

    client.close("server").await;
    Ok(())
}
