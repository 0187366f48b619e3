//! WebSocket implementation of the transport channel.

use super::{ChannelEvent, Transport, TransportError};
use crate::protocol::{InboundFrame, OutboundFrame};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection settings for the host link
#[derive(Clone, Debug)]
pub struct TransportSettings {
    /// Base WebSocket url of the host bridge, e.g. `ws://127.0.0.1:8002`
    pub url: String,
    /// Logical window name, sent as the `window` query parameter
    pub window: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8002".to_string(),
            window: "table".to_string(),
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

impl TransportSettings {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/?window={}",
            self.url.trim_end_matches('/'),
            urlencoding::encode(&self.window)
        )
    }
}

type OutboundSlot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Handle to the WebSocket connection task.
///
/// Each established connection gets its own outbound queue. When the
/// connection drops, the queue is dropped with it, so frames accepted just
/// before a disconnect are discarded rather than replayed later.
pub struct WsTransport {
    outbound: OutboundSlot,
    shutdown: CancellationToken,
}

impl WsTransport {
    /// Spawns the connection task. It keeps reconnecting until [`WsTransport::shutdown`].
    pub fn spawn(settings: TransportSettings) -> (Self, mpsc::Receiver<ChannelEvent>) {
        info!("Spawning host transport for {}", settings.endpoint());

        let outbound: OutboundSlot = Arc::new(Mutex::new(None));
        let (event_tx, event_rx) = mpsc::channel(256);
        let shutdown = CancellationToken::new();

        let task_outbound = outbound.clone();
        let task_shutdown = shutdown.clone();
        tokio::spawn(async move {
            run_connection_loop(settings, task_outbound, event_tx, task_shutdown).await;
            info!("Host transport task finished");
        });

        (Self { outbound, shutdown }, event_rx)
    }

    /// Stops reconnecting and closes the current connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Transport for WsTransport {
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let text = frame.to_json()?;
        let slot = lock_slot(&self.outbound);
        match slot.as_ref() {
            Some(tx) => tx.send(text).map_err(|_| TransportError::NotConnected),
            None => Err(TransportError::NotConnected),
        }
    }

    fn is_open(&self) -> bool {
        lock_slot(&self.outbound).is_some()
    }
}

fn lock_slot(slot: &OutboundSlot) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_connection_loop(
    settings: TransportSettings,
    outbound: OutboundSlot,
    event_tx: mpsc::Sender<ChannelEvent>,
    shutdown: CancellationToken,
) {
    let endpoint = settings.endpoint();

    loop {
        debug!("Connecting to host at {}", endpoint);

        let connect = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = tokio_tungstenite::connect_async(endpoint.as_str()) => result,
        };

        match connect {
            Ok((stream, _response)) => {
                info!("Connected to host at {}", endpoint);
                let (mut write, mut read) = stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                *lock_slot(&outbound) = Some(tx);

                if event_tx.send(ChannelEvent::Opened).await.is_err() {
                    debug!("Channel event receiver dropped, stopping transport");
                    return;
                }

                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            lock_slot(&outbound).take();
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                        Some(text) = rx.recv() => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                warn!("Failed to write frame to host: {}", e);
                                break;
                            }
                        }
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => match InboundFrame::parse(&text) {
                                Ok(frame) => {
                                    if event_tx.send(ChannelEvent::Frame(frame)).await.is_err() {
                                        debug!("Channel event receiver dropped, stopping transport");
                                        lock_slot(&outbound).take();
                                        return;
                                    }
                                }
                                Err(e) => warn!("Dropping malformed frame from host: {}", e),
                            },
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Host closed the connection");
                                break;
                            }
                            Some(Ok(_)) => debug!("Ignoring non-text frame"),
                            Some(Err(e)) => {
                                warn!("Connection error: {}", e);
                                break;
                            }
                        }
                    }
                }

                // Frames still queued in `rx` die with this connection
                lock_slot(&outbound).take();
                if event_tx.send(ChannelEvent::Closed).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                error!("Failed to connect to host at {}: {}", endpoint, e);
            }
        }

        info!(
            "Reconnecting in {} ms",
            settings.reconnect_delay.as_millis()
        );
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn endpoint_carries_window_name() {
        let settings = TransportSettings {
            url: "ws://127.0.0.1:8002/".into(),
            window: "bg".into(),
            ..TransportSettings::default()
        };
        assert_eq!(settings.endpoint(), "ws://127.0.0.1:8002/?window=bg");
    }

    #[tokio::test]
    async fn send_fails_fast_while_disconnected() {
        // Nothing listens on this port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (transport, _events) = WsTransport::spawn(TransportSettings {
            url: format!("ws://127.0.0.1:{}", port),
            window: "table".into(),
            reconnect_delay: Duration::from_millis(50),
        });

        let frame = OutboundFrame::ApiCall {
            id: "1".into(),
            method: "get_tables".into(),
            args: vec![],
        };
        assert!(!transport.is_open());
        assert!(matches!(
            transport.send(&frame),
            Err(TransportError::NotConnected)
        ));
        transport.shutdown();
    }

    #[tokio::test]
    async fn delivers_frames_and_reconnects_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            // First connection: push one event, then hang up
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"event","message":{"type":"TableIndexUpdate","index":2}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text("garbage".into())).await.unwrap();
            ws.close(None).await.unwrap();

            // Second connection stays open
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (transport, mut events) = WsTransport::spawn(TransportSettings {
            url: format!("ws://127.0.0.1:{}", port),
            window: "table".into(),
            reconnect_delay: Duration::from_millis(20),
        });

        assert_eq!(events.recv().await, Some(ChannelEvent::Opened));
        match events.recv().await {
            Some(ChannelEvent::Frame(InboundFrame::Event { message, .. })) => {
                assert_eq!(message["index"], 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
        // The malformed frame is dropped, the next notification is the close
        assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
        assert_eq!(events.recv().await, Some(ChannelEvent::Opened));
        assert!(transport.is_open());
        transport.shutdown();
    }
}
