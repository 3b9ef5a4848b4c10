//! WebSocket boundary — the connection manager the signaling core talks
//! through.
//!
//! The accept loop hands every connection to a pair of tasks: a reader
//! that feeds inbound frames to the hub, and a writer that drains an
//! unbounded outbound queue into the socket. [`WsConnection`] wraps the
//! queue's sender; pushing into a queue whose writer has died is how the
//! core observes a dead transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async_with_config};
use tracing::{debug, error, info};
use uuid::Uuid;

use droplet_signal::{Connection, ConnectionState, SignalError, SignalHub};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Transport handle handed to the hub for one client.
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Message>,
    state: Arc<AtomicU8>,
}

impl Connection for WsConnection {
    fn send(&self, payload: &str) -> Result<(), SignalError> {
        if self.state.load(Ordering::Acquire) != STATE_OPEN {
            return Err(SignalError::ConnectionClosed);
        }
        self.outbound
            .send(Message::text(payload))
            .map_err(|_| SignalError::ConnectionClosed)
    }

    fn close(&self) {
        self.state
            .compare_exchange(
                STATE_OPEN,
                STATE_CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok();
        let _ = self.outbound.send(Message::Close(None));
    }

    fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => ConnectionState::Open,
            STATE_CLOSING => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Run the WebSocket listener until shutdown.
///
/// Listen address, message-size cap, and proxy trust come from the hub's
/// config. Each accepted connection is registered with the hub and served
/// until its socket goes away.
pub async fn start_server(
    hub: Arc<Mutex<SignalHub>>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), SignalError> {
    let (listen_addr, max_message_size, trust_forwarded_for) = {
        let hub = hub.lock();
        let config = hub.config();
        (
            config.listen_addr,
            config.max_message_size as usize,
            config.trust_forwarded_for,
        )
    };

    let listener = TcpListener::bind(listen_addr).await.map_err(SignalError::Io)?;
    info!("WebSocket server listening on {listen_addr}");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        let hub = Arc::clone(&hub);
                        tokio::spawn(async move {
                            serve_connection(
                                stream,
                                peer_addr,
                                hub,
                                max_message_size,
                                trust_forwarded_for,
                            )
                            .await;
                        });
                    }
                    Err(e) => {
                        error!("TCP accept failed: {e}");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("WebSocket server shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Handshake one connection, register it with the hub, and pump frames
/// until the socket closes.
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<Mutex<SignalHub>>,
    max_message_size: usize,
    trust_forwarded_for: bool,
) {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(max_message_size))
        .max_frame_size(Some(max_message_size));

    let mut forwarded_for: Option<String> = None;
    let callback = |request: &Request, response: Response| {
        if trust_forwarded_for {
            forwarded_for = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(|value| value.trim().to_string());
        }
        Ok(response)
    };

    let ws_stream = match accept_hdr_async_with_config(stream, callback, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake failed for {peer_addr}: {e}");
            return;
        }
    };

    let remote_address = forwarded_for.unwrap_or_else(|| peer_addr.ip().to_string());
    let (sink, source) = ws_stream.split();
    let state = Arc::new(AtomicU8::new(STATE_OPEN));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let connection = WsConnection {
        outbound: outbound_tx,
        state: Arc::clone(&state),
    };
    let conn_id = hub.lock().accept(Box::new(connection), remote_address);

    tokio::spawn(write_loop(sink, outbound_rx, Arc::clone(&state)));
    read_loop(source, hub, conn_id, state).await;
}

/// Drain the outbound queue into the socket. A failed write or a queued
/// Close frame ends the loop; either way the connection is done.
async fn write_loop(
    mut sink: WsSink,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    state: Arc<AtomicU8>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if sink.send(message).await.is_err() {
            break;
        }
        if closing {
            break;
        }
    }
    state.store(STATE_CLOSED, Ordering::Release);
}

/// Feed inbound frames into the hub until the socket goes away, then
/// report the disconnect.
async fn read_loop(
    mut source: WsSource,
    hub: Arc<Mutex<SignalHub>>,
    conn_id: Uuid,
    state: Arc<AtomicU8>,
) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                hub.lock().handle_text(conn_id, text.as_str());
            }
            Ok(Message::Close(_)) => {
                debug!("Client {conn_id} sent close");
                break;
            }
            Ok(_) => {} // Ignore binary/ping/pong.
            Err(e) => {
                debug!("Read error on {conn_id}: {e}");
                break;
            }
        }
    }

    state.store(STATE_CLOSED, Ordering::Release);
    hub.lock().disconnect(conn_id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
