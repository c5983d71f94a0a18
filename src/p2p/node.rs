use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::state::AppState;

use super::P2pError;
use super::message::{
    CHAIN_UPDATE, GET_CHAIN, GET_CHAIN_RESPONSE, GET_PEERS, HEARTBEAT, HEARTBEAT_ACK, Message,
    NEW_BLOCK, PEER_LIST,
};

/// Idle limit for an inbound session, reset by every line received.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Listening side of the sync protocol.
pub struct P2pNode {
    state: Arc<AppState>,
    listener: TcpListener,
}

impl P2pNode {
    pub async fn bind(state: Arc<AppState>, addr: &str) -> Result<Self, P2pError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { state, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, P2pError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task per session.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("P2P - listening on {addr}");
        }
        loop {
            let (stream, remote) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("P2P - accept failed: {e}");
                    continue;
                }
            };
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                debug!("P2P - connection from {remote}");
                match handle_connection(state, stream).await {
                    Ok(()) => debug!("P2P - {remote} disconnected"),
                    Err(P2pError::Timeout(_)) => info!("P2P - dropping idle connection {remote}"),
                    Err(e) => warn!("P2P - closing connection {remote}: {e}"),
                }
            });
        }
    }
}

async fn handle_connection(state: Arc<AppState>, stream: TcpStream) -> Result<(), P2pError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(msg) = read_message(&mut lines, READ_TIMEOUT).await? {
        if let Some(reply) = handle_message(&state, msg).await? {
            writer.write_all(&reply.encode()?).await?;
        }
    }
    Ok(())
}

/// Next non-blank line as a message, `None` once the peer hangs up.
async fn read_message<R>(lines: &mut Lines<R>, limit: Duration) -> Result<Option<Message>, P2pError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = timeout(limit, lines.next_line())
            .await
            .map_err(|_| P2pError::Timeout(limit))??;
        match line {
            None => return Ok(None),
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => return Message::decode(&l).map(Some),
        }
    }
}

/// Apply one incoming message to the node and produce the reply, if the
/// command has one. Errors mean the session should be torn down; unknown
/// commands are logged and skipped.
pub async fn handle_message(
    state: &Arc<AppState>,
    msg: Message,
) -> Result<Option<Message>, P2pError> {
    match msg.command.as_str() {
        GET_CHAIN => Ok(Some(Message::chain(
            GET_CHAIN_RESPONSE,
            &state.chain_snapshot(),
        )?)),
        GET_CHAIN_RESPONSE | CHAIN_UPDATE => {
            let candidate = msg.blocks()?;
            let len = candidate.len();
            // full revalidation and ledger replay
            let job = Arc::clone(state);
            if tokio::task::spawn_blocking(move || job.replace_chain(candidate)).await? {
                info!("P2P - adopted {len}-block chain from {}", msg.command);
            } else {
                debug!("P2P - kept local chain over received {len}-block chain");
            }
            Ok(None)
        }
        NEW_BLOCK => {
            let block = msg.block()?;
            let (index, hash) = (block.index, block.hash.clone());
            if state.accept_new_block(block) {
                info!("P2P - appended block #{index} {hash}");
                let update = Message::chain(CHAIN_UPDATE, &state.chain_snapshot())?;
                broadcast(&state.peers.snapshot(), &update);
            } else {
                debug!("P2P - discarded block #{index} {hash}");
            }
            Ok(None)
        }
        HEARTBEAT => Ok(Some(Message::bare(HEARTBEAT_ACK))),
        HEARTBEAT_ACK => Ok(None),
        GET_PEERS => Ok(Some(Message::peer_list(&state.peers.snapshot()))),
        PEER_LIST => {
            state.peers.merge(&msg.peers()?);
            Ok(None)
        }
        other => {
            warn!("P2P - ignoring unknown command {other:?}");
            Ok(None)
        }
    }
}

async fn dial(peer: &str) -> Result<TcpStream, P2pError> {
    Ok(timeout(DIAL_TIMEOUT, TcpStream::connect(peer))
        .await
        .map_err(|_| P2pError::Timeout(DIAL_TIMEOUT))??)
}

/// Send `requests` to `peer` on a fresh connection and collect one reply per
/// request, stopping early if the peer hangs up.
pub async fn exchange(peer: &str, requests: &[Message]) -> Result<Vec<Message>, P2pError> {
    let stream = dial(peer).await?;
    let (reader, mut writer) = stream.into_split();
    for req in requests {
        writer.write_all(&req.encode()?).await?;
    }

    let mut lines = BufReader::new(reader).lines();
    let mut replies = Vec::with_capacity(requests.len());
    while replies.len() < requests.len() {
        match read_message(&mut lines, READ_TIMEOUT).await? {
            Some(msg) => replies.push(msg),
            None => break,
        }
    }
    Ok(replies)
}

/// Ask `peer` for its chain and peer list and fold both into local state.
pub async fn sync_with_peer(state: &Arc<AppState>, peer: &str) -> Result<(), P2pError> {
    let replies = exchange(peer, &[Message::bare(GET_CHAIN), Message::bare(GET_PEERS)]).await?;
    for reply in replies {
        handle_message(state, reply).await?;
    }
    Ok(())
}

/// Initial outbound sweep over the configured peers. Failed dials are
/// logged and abandoned.
pub fn connect_to_peers(state: &Arc<AppState>) {
    for peer in state.peers.snapshot() {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            match sync_with_peer(&state, &peer).await {
                Ok(()) => debug!("P2P - synced with {peer}"),
                Err(e) => warn!("P2P - could not sync with {peer}: {e}"),
            }
        });
    }
}

/// One discovery round: `GET_PEERS` to every known peer.
pub fn discover_peers(state: &Arc<AppState>) {
    for peer in state.peers.snapshot() {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            let result = async {
                for reply in exchange(&peer, &[Message::bare(GET_PEERS)]).await? {
                    handle_message(&state, reply).await?;
                }
                Ok::<(), P2pError>(())
            };
            if let Err(e) = result.await {
                debug!("P2P - discovery via {peer} failed: {e}");
            }
        });
    }
}

/// Fire-and-forget delivery of `msg` to each peer on its own connection.
pub fn broadcast(peers: &[String], msg: &Message) {
    let bytes = match msg.encode() {
        Ok(b) => b,
        Err(e) => {
            warn!("P2P - could not encode {}: {e}", msg.command);
            return;
        }
    };
    for peer in peers {
        let peer = peer.clone();
        let bytes = bytes.clone();
        tokio::spawn(async move {
            let sent = async {
                let mut stream = dial(&peer).await?;
                stream.write_all(&bytes).await?;
                stream.shutdown().await?;
                Ok::<(), P2pError>(())
            };
            if let Err(e) = sent.await {
                warn!("P2P - broadcast to {peer} failed: {e}");
            }
        });
    }
}
