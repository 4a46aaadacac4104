use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{IpcError, WayblError};
use crate::scene::SceneNode;
use crate::Result;

const MAGIC: &[u8; 6] = b"i3-ipc";
const HEADER_LEN: usize = MAGIC.len() + 8;

// Largest payload accepted from the socket.
const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

const MSG_SUBSCRIBE: u32 = 2;
const MSG_GET_TREE: u32 = 4;

const EVENT_WORKSPACE: u32 = 0x8000_0000;
const EVENT_WINDOW: u32 = 0x8000_0003;

/// Window manager events the daemon cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Window { change: String },
    Workspace { change: String },
    Other { kind: u32 },
}

impl Event {
    /// Title updates never move windows between outputs, everything else might.
    pub fn triggers_reconcile(&self) -> bool {
        match self {
            Event::Window { change } => change != "title",
            Event::Workspace { .. } => true,
            Event::Other { .. } => false,
        }
    }

    fn decode(kind: u32, payload: &[u8]) -> Result<Self> {
        #[derive(Deserialize)]
        struct Change {
            #[serde(default)]
            change: String,
        }

        Ok(match kind {
            EVENT_WINDOW => Event::Window {
                change: serde_json::from_slice::<Change>(payload)?.change,
            },
            EVENT_WORKSPACE => Event::Workspace {
                change: serde_json::from_slice::<Change>(payload)?.change,
            },
            kind => Event::Other { kind },
        })
    }
}

/// Point-in-time tree snapshots.
pub trait TreeSource {
    fn tree(&mut self) -> Result<SceneNode>;
}

/// Blocking, lazy event subscription for window and workspace changes.
pub trait EventSource: Send + 'static {
    type Events: Iterator<Item = Result<Event>>;

    fn subscribe(&self) -> Result<Self::Events>;
}

/// Location of the sway IPC socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwayIpc {
    socket_path: PathBuf,
}

impl SwayIpc {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn from_env() -> Result<Self> {
        env::var_os("SWAYSOCK")
            .or_else(|| env::var_os("I3SOCK"))
            .filter(|s| !s.is_empty())
            .map(|s| Self::new(PathBuf::from(s)))
            .ok_or(WayblError::Ipc(IpcError::SocketNotFound))
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub fn connect(&self) -> Result<SwayConnection<UnixStream>> {
        let stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            WayblError::Ipc(IpcError::Connection {
                path: self.socket_path.clone(),
                source: e,
            })
        })?;
        Ok(SwayConnection::new(stream))
    }
}

impl EventSource for SwayIpc {
    type Events = EventStream<UnixStream>;

    fn subscribe(&self) -> Result<Self::Events> {
        self.connect()?.subscribe(&["window", "workspace"])
    }
}

/// One IPC connection speaking the i3 framing.
pub struct SwayConnection<S> {
    stream: S,
}

impl<S: Read + Write> SwayConnection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_tree(&mut self) -> Result<SceneNode> {
        write_frame(&mut self.stream, MSG_GET_TREE, &[])?;
        let (kind, payload) = read_frame(&mut self.stream)?;
        if kind != MSG_GET_TREE {
            return Err(WayblError::Ipc(IpcError::InvalidFrame {
                message: format!("expected GET_TREE reply, got message type {:#x}", kind),
            }));
        }
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Turns this connection into an event stream.
    pub fn subscribe(mut self, events: &[&str]) -> Result<EventStream<S>> {
        #[derive(Deserialize)]
        struct Reply {
            success: bool,
        }

        let payload = serde_json::to_vec(events)?;
        write_frame(&mut self.stream, MSG_SUBSCRIBE, &payload)?;

        let (kind, payload) = read_frame(&mut self.stream)?;
        if kind != MSG_SUBSCRIBE || !serde_json::from_slice::<Reply>(&payload)?.success {
            return Err(WayblError::Ipc(IpcError::SubscriptionRejected));
        }

        log::debug!("Subscribed to {:?}", events);
        Ok(EventStream {
            stream: self.stream,
            done: false,
        })
    }
}

/// Blocks on each `next`. Ends after the first transport error.
pub struct EventStream<S> {
    stream: S,
    done: bool,
}

impl<S: Read> Iterator for EventStream<S> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let event = read_frame(&mut self.stream).and_then(|(kind, payload)| Event::decode(kind, &payload));
        if event.is_err() {
            self.done = true;
        }
        Some(event)
    }
}

/// Tree queries over a lazily (re)established connection.
pub struct TreeClient {
    ipc: SwayIpc,
    connection: Option<SwayConnection<UnixStream>>,
}

impl TreeClient {
    pub fn new(ipc: SwayIpc) -> Self {
        Self {
            ipc,
            connection: None,
        }
    }
}

impl TreeSource for TreeClient {
    fn tree(&mut self) -> Result<SceneNode> {
        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => self.ipc.connect()?,
        };

        // A failed query may leave the stream mid-frame, so only keep healthy connections.
        let tree = connection.get_tree();
        if tree.is_ok() {
            self.connection = Some(connection);
        }
        tree
    }
}

fn write_frame<W: Write>(stream: &mut W, kind: u32, payload: &[u8]) -> Result<()> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        WayblError::Ipc(IpcError::InvalidFrame {
            message: format!("payload of {} bytes is too large", payload.len()),
        })
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&length.to_ne_bytes());
    frame.extend_from_slice(&kind.to_ne_bytes());
    frame.extend_from_slice(payload);

    stream.write_all(&frame).map_err(IpcError::Io)?;
    stream.flush().map_err(IpcError::Io)?;
    Ok(())
}

fn read_frame<R: Read>(stream: &mut R) -> Result<(u32, Vec<u8>)> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).map_err(IpcError::Io)?;

    if &header[..MAGIC.len()] != MAGIC {
        return Err(WayblError::Ipc(IpcError::InvalidFrame {
            message: format!("bad magic {:?}", String::from_utf8_lossy(&header[..MAGIC.len()])),
        }));
    }

    let mut length = [0u8; 4];
    length.copy_from_slice(&header[MAGIC.len()..MAGIC.len() + 4]);
    let mut kind = [0u8; 4];
    kind.copy_from_slice(&header[MAGIC.len() + 4..]);

    let length = u32::from_ne_bytes(length) as usize;
    if length > MAX_PAYLOAD {
        return Err(WayblError::Ipc(IpcError::InvalidFrame {
            message: format!("payload of {} bytes exceeds the {} byte limit", length, MAX_PAYLOAD),
        }));
    }

    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).map_err(IpcError::Io)?;

    Ok((u32::from_ne_bytes(kind), payload))
}
