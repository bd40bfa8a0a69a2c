//! TCP relay carrying session channels between processes.
//!
//! The wire format is newline-delimited JSON [`RelayFrame`]s. Clients
//! subscribe to channels and publish events; the relay fans each published
//! event out to every client subscribed to its channel. Delivery is
//! best-effort: a slow or vanished client simply misses events.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::{BusError, BusEvent, EventBus, EventHandler, EventKind, Subscription};

/// Where `quizcam relay` listens unless told otherwise.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:7878";

/// Longest frame line accepted from a peer, newline excluded. A peer that
/// exceeds it is disconnected.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// One line of the relay protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RelayFrame {
    /// client -> relay: start receiving `channel`
    Subscribe { channel: String },
    /// client -> relay: stop receiving `channel`
    Unsubscribe { channel: String },
    /// client -> relay: fan `data` out on `channel`
    Publish {
        channel: String,
        event: EventKind,
        data: serde_json::Value,
    },
    /// relay -> client: an event on a subscribed channel
    Event {
        channel: String,
        event: EventKind,
        data: serde_json::Value,
    },
}

/// Connected relay client
struct RelayClient {
    channels: HashSet<String>,
    tx: mpsc::UnboundedSender<String>,
}

/// Connection registry shared by all relay connections.
#[derive(Default)]
struct RelayHub {
    clients: RwLock<HashMap<Uuid, RelayClient>>,
}

impl RelayHub {
    async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.insert(
            id,
            RelayClient {
                channels: HashSet::new(),
                tx,
            },
        );
        log::info!("Relay client {} connected", id);
        (id, rx)
    }

    async fn unregister(&self, id: &Uuid) {
        if self.clients.write().await.remove(id).is_some() {
            log::info!("Relay client {} disconnected", id);
        }
    }

    async fn join(&self, id: &Uuid, channel: String) {
        if let Some(client) = self.clients.write().await.get_mut(id) {
            log::debug!("Relay client {} joined {}", id, channel);
            client.channels.insert(channel);
        }
    }

    async fn leave(&self, id: &Uuid, channel: &str) {
        if let Some(client) = self.clients.write().await.get_mut(id) {
            client.channels.remove(channel);
        }
    }

    /// Send an event to every subscriber of `channel`; returns how many got it.
    async fn broadcast(&self, channel: String, event: EventKind, data: serde_json::Value) -> usize {
        let frame = RelayFrame::Event {
            channel: channel.clone(),
            event,
            data,
        };
        let json = match serde_json::to_string(&frame) {
            Ok(j) => j,
            Err(e) => {
                log::error!("Failed to serialize relay event: {}", e);
                return 0;
            }
        };

        let clients = self.clients.read().await;
        let mut delivered = 0;
        for (id, client) in clients.iter() {
            if !client.channels.contains(&channel) {
                continue;
            }
            if client.tx.send(json.clone()).is_ok() {
                delivered += 1;
            } else {
                log::warn!("Relay client {} is gone, dropping {} event", id, event);
            }
        }
        delivered
    }
}

/// Accept relay connections until the listener fails.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    let hub = Arc::new(RelayHub::default());
    log::info!("Relay listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(hub, stream).await {
                log::warn!("Relay connection {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(hub: Arc<RelayHub>, stream: TcpStream) -> std::io::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (id, rx) = hub.register().await;
    let writer = tokio::spawn(write_lines(write_half, rx));

    let result = read_client_frames(&hub, &id, read_half).await;

    hub.unregister(&id).await;
    writer.abort();
    result
}

/// Read one newline-terminated frame into `line`, refusing to buffer more
/// than [`MAX_FRAME_LEN`] bytes. Returns `false` at end of stream.
async fn next_frame_line<R>(reader: &mut R, line: &mut String) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let limit = MAX_FRAME_LEN as u64 + 1;
    let read = (&mut *reader).take(limit).read_line(line).await?;
    if read == 0 {
        return Ok(false);
    }
    if !line.ends_with('\n') && read as u64 >= limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("relay frame longer than {} bytes", MAX_FRAME_LEN),
        ));
    }
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(true)
}

async fn read_client_frames(
    hub: &RelayHub,
    id: &Uuid,
    read_half: OwnedReadHalf,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    while next_frame_line(&mut reader, &mut line).await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RelayFrame>(&line) {
            Ok(RelayFrame::Subscribe { channel }) => hub.join(id, channel).await,
            Ok(RelayFrame::Unsubscribe { channel }) => hub.leave(id, &channel).await,
            Ok(RelayFrame::Publish {
                channel,
                event,
                data,
            }) => {
                let n = hub.broadcast(channel, event, data).await;
                log::debug!("Relayed {} event to {} client(s)", event, n);
            }
            Ok(RelayFrame::Event { .. }) => {
                log::debug!("Ignoring event frame sent by client {}", id);
            }
            Err(e) => log::warn!("Ignoring malformed relay frame: {}", e),
        }
    }
    Ok(())
}

async fn write_lines(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err()
            || write_half.write_all(b"\n").await.is_err()
        {
            break;
        }
    }
}

type HandlerMap = Arc<Mutex<HashMap<String, Vec<(u64, EventHandler)>>>>;

/// [`EventBus`] backed by a connection to a `quizcam relay`.
///
/// Handlers run on the connection's reader task.
pub struct RelayBus {
    addr: String,
    outbound: mpsc::UnboundedSender<String>,
    handlers: HandlerMap,
    next_id: AtomicU64,
}

impl std::fmt::Debug for RelayBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayBus")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl RelayBus {
    /// Connect to a relay and start the reader and writer tasks.
    pub async fn connect(addr: &str) -> Result<Self, BusError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| BusError::Connect {
                addr: addr.to_string(),
                source: e,
            })?;
        let (read_half, write_half) = stream.into_split();

        let (outbound, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(write_half, rx));

        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(dispatch_incoming(read_half, Arc::clone(&handlers)));

        log::info!("Connected to relay at {}", addr);
        Ok(Self {
            addr: addr.to_string(),
            outbound,
            handlers,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn send(&self, frame: &RelayFrame) -> Result<(), BusError> {
        send_frame(&self.outbound, frame)
    }
}

fn send_frame(
    outbound: &mpsc::UnboundedSender<String>,
    frame: &RelayFrame,
) -> Result<(), BusError> {
    let line = serde_json::to_string(frame)?;
    outbound.send(line).map_err(|_| BusError::Closed)
}

/// Route relay events to the handlers registered for their channel.
async fn dispatch_incoming(read_half: OwnedReadHalf, handlers: HandlerMap) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        match next_frame_line(&mut reader, &mut line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                log::warn!("Relay read failed: {}", e);
                break;
            }
        }

        let (channel, kind, payload) = match serde_json::from_str::<RelayFrame>(&line) {
            Ok(RelayFrame::Event {
                channel,
                event,
                data,
            }) => (channel, event, data),
            Ok(other) => {
                log::debug!("Ignoring unexpected relay frame: {:?}", other);
                continue;
            }
            Err(e) => {
                log::warn!("Ignoring malformed relay frame: {}", e);
                continue;
            }
        };

        let targets: Vec<EventHandler> = handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let event = BusEvent {
            channel,
            kind,
            payload,
        };
        for handler in &targets {
            handler(&event);
        }
    }
    log::warn!("Relay connection closed; no further remote events");
}

impl EventBus for RelayBus {
    fn publish(
        &self,
        channel: &str,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        self.send(&RelayFrame::Publish {
            channel: channel.to_string(),
            event: kind,
            data: payload,
        })
    }

    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let first = {
            let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            let subs = handlers.entry(channel.to_string()).or_default();
            subs.push((id, handler));
            subs.len() == 1
        };

        if first {
            let frame = RelayFrame::Subscribe {
                channel: channel.to_string(),
            };
            if let Err(e) = self.send(&frame) {
                log::warn!("Failed to subscribe to {}: {}", channel, e);
            }
        }

        let handlers = Arc::clone(&self.handlers);
        let outbound = self.outbound.clone();
        let channel = channel.to_string();
        Subscription::new(move || {
            let last = {
                let mut handlers = handlers.lock().unwrap_or_else(PoisonError::into_inner);
                match handlers.get_mut(&channel) {
                    Some(subs) => {
                        subs.retain(|(sub_id, _)| *sub_id != id);
                        let empty = subs.is_empty();
                        if empty {
                            handlers.remove(&channel);
                        }
                        empty
                    }
                    None => false,
                }
            };
            if last {
                let _ = send_frame(&outbound, &RelayFrame::Unsubscribe { channel });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_wire_format() {
        let frame = RelayFrame::Publish {
            channel: "sess-1".to_string(),
            event: EventKind::Shot,
            data: json!({"jobId": "abcdefgh"}),
        };
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["op"], "publish");
        assert_eq!(value["channel"], "sess-1");
        assert_eq!(value["event"], "shot");
        assert_eq!(value["data"]["jobId"], "abcdefgh");
    }

    #[test]
    fn test_frame_parse_subscribe() {
        let frame: RelayFrame =
            serde_json::from_str(r#"{"op":"subscribe","channel":"sess-9"}"#).unwrap();
        assert_eq!(
            frame,
            RelayFrame::Subscribe {
                channel: "sess-9".to_string()
            }
        );
    }

    #[test]
    fn test_frame_rejects_unknown_op() {
        assert!(serde_json::from_str::<RelayFrame>(r#"{"op":"shout","channel":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn test_hub_broadcast_only_reaches_channel_members() {
        let hub = RelayHub::default();
        let (a, mut rx_a) = hub.register().await;
        let (_b, mut rx_b) = hub.register().await;
        hub.join(&a, "sess-1".to_string()).await;

        let n = hub
            .broadcast("sess-1".to_string(), EventKind::Answer, json!({"answer": "B"}))
            .await;
        assert_eq!(n, 1);

        let line = rx_a.recv().await.unwrap();
        let frame: RelayFrame = serde_json::from_str(&line).unwrap();
        assert!(matches!(frame, RelayFrame::Event { event: EventKind::Answer, .. }));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hub_leave_and_unregister() {
        let hub = RelayHub::default();
        let (a, _rx) = hub.register().await;
        hub.join(&a, "sess-1".to_string()).await;
        hub.leave(&a, "sess-1").await;
        assert_eq!(
            hub.broadcast("sess-1".to_string(), EventKind::Shot, json!({})).await,
            0
        );

        hub.unregister(&a).await;
        assert!(hub.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_frame_lines_strip_terminators() {
        let mut reader: &[u8] = b"first\r\n{\"op\":\"x\"}\nlast";
        let mut line = String::new();
        let mut seen = Vec::new();
        while next_frame_line(&mut reader, &mut line).await.unwrap() {
            seen.push(line.clone());
        }
        assert_eq!(seen, vec!["first", "{\"op\":\"x\"}", "last"]);
    }

    #[tokio::test]
    async fn test_frame_line_length_is_capped() {
        let mut exact = vec![b'x'; MAX_FRAME_LEN];
        exact.push(b'\n');
        let mut reader: &[u8] = &exact;
        let mut line = String::new();
        assert!(next_frame_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line.len(), MAX_FRAME_LEN);

        let endless = vec![b'x'; MAX_FRAME_LEN * 2];
        let mut reader: &[u8] = &endless;
        let err = next_frame_line(&mut reader, &mut line).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = RelayBus::connect(&addr).await;
        assert!(matches!(result, Err(BusError::Connect { .. })));
    }
}
