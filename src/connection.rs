//! One client connection.
//!
//! A [`Connection`] owns the object table for one transport session, the
//! server-side id allocator, and the outbox that events are queued into.
//! Inbound transport messages are fed to [`Connection::on_message`], which
//! splits them into frames and dispatches each one in order.
//!
//! Any error raised while handling a message is fatal: an error event is
//! posted to the peer, the outbox is flushed, and the connection closes.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──close()──▶ Closing ──(teardown done)──▶ Closed
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bytes::{Bytes, BytesMut};
use tokio::sync::watch;

use crate::codec::{Message, ObjectLookup};
use crate::config::ServerConfig;
use crate::error::{Result, WestfieldError};
use crate::lock;
use crate::protocol::{
    Frame, FrameReader, ObjectId, ERROR_OPCODE, NULL_ID, REGISTRY_ID, SERVER_ID_BASE,
};
use crate::resource::Resource;
use crate::server::ServerInner;
use crate::transport::Sender;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting and dispatching messages.
    Open,
    /// Teardown in progress; no new messages are dispatched.
    Closing,
    /// All objects destroyed.
    Closed,
}

/// Object table of one connection.
pub(crate) struct ObjectTable {
    objects: Mutex<HashMap<ObjectId, Resource>>,
    limit: usize,
}

impl ObjectTable {
    fn new(limit: usize) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            limit,
        }
    }

    fn get(&self, id: ObjectId) -> Option<Resource> {
        lock(&self.objects).get(&id).cloned()
    }

    fn insert(&self, resource: &Resource) -> Result<()> {
        let id = resource.id();
        if id == NULL_ID {
            return Err(WestfieldError::IdCollision(id));
        }

        let mut objects = lock(&self.objects);
        if objects.contains_key(&id) {
            return Err(WestfieldError::IdCollision(id));
        }
        if objects.len() >= self.limit {
            return Err(WestfieldError::ResourceLimit(self.limit));
        }
        objects.insert(id, resource.clone());
        Ok(())
    }

    /// Remove `resource`, leaving any newer object with the same id alone.
    fn remove(&self, resource: &Resource) {
        let mut objects = lock(&self.objects);
        if objects
            .get(&resource.id())
            .is_some_and(|current| current.ptr_eq(resource))
        {
            objects.remove(&resource.id());
        }
    }

    fn drain(&self) -> Vec<Resource> {
        lock(&self.objects).drain().map(|(_, r)| r).collect()
    }

    fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    fn values(&self) -> Vec<Resource> {
        lock(&self.objects).values().cloned().collect()
    }
}

impl ObjectLookup for ObjectTable {
    fn lookup(&self, id: ObjectId) -> Option<Resource> {
        self.get(id)
    }
}

pub(crate) struct ConnectionInner {
    id: u64,
    sender: Box<dyn Sender>,
    objects: ObjectTable,
    /// Last server-side id handed out.
    next_id: AtomicU32,
    outbox: Mutex<BytesMut>,
    /// Held from taking a batch until the sender accepted it.
    send_lock: Mutex<()>,
    state: watch::Sender<ConnectionState>,
    max_message_size: usize,
    server: Weak<ServerInner>,
}

/// Handle to one client connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        sender: Box<dyn Sender>,
        config: &ServerConfig,
        server: Weak<ServerInner>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Open);
        Self {
            inner: Arc::new(ConnectionInner {
                id,
                sender,
                objects: ObjectTable::new(config.max_objects_per_connection),
                next_id: AtomicU32::new(SERVER_ID_BASE),
                outbox: Mutex::new(BytesMut::new()),
                send_lock: Mutex::new(()),
                state,
                max_message_size: config.max_message_size,
                server,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner> {
        Arc::downgrade(&self.inner)
    }

    /// Server-unique connection id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Allocate the next server-side object id.
    ///
    /// Ids start at `0xFF000001` and are never reused.
    pub fn next_id(&self) -> Result<ObjectId> {
        self.inner
            .next_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| last.checked_add(1))
            .map(|last| last + 1)
            .map_err(|_| WestfieldError::IdsExhausted)
    }

    /// Look up a live object.
    pub fn get(&self, id: ObjectId) -> Option<Resource> {
        self.inner.objects.get(id)
    }

    /// Snapshot of all live objects.
    pub fn resources(&self) -> Vec<Resource> {
        self.inner.objects.values()
    }

    /// Number of live objects, the registry object included.
    pub fn resource_count(&self) -> usize {
        self.inner.objects.len()
    }

    pub(crate) fn register(&self, resource: &Resource) -> Result<()> {
        if !self.is_open() {
            return Err(WestfieldError::ConnectionClosed);
        }
        self.inner.objects.insert(resource)
    }

    pub(crate) fn unregister(&self, resource: &Resource) {
        self.inner.objects.remove(resource);
    }

    /// Queue an outbound message.
    ///
    /// Nothing is written to the transport until [`flush`](Self::flush).
    pub fn queue(&self, message: &Message) -> Result<()> {
        if !self.is_open() {
            return Err(WestfieldError::ConnectionClosed);
        }
        message.encode_into(&mut lock(&self.inner.outbox))
    }

    /// Write all queued messages to the transport as one message.
    ///
    /// Concurrent flushes hand their batches to the sender in the order the
    /// batches were taken from the outbox.
    pub fn flush(&self) -> Result<()> {
        let _sending = lock(&self.inner.send_lock);
        if self.state() == ConnectionState::Closed {
            return Err(WestfieldError::ConnectionClosed);
        }
        self.send_outbox()
    }

    /// Caller holds `send_lock`.
    fn send_outbox(&self) -> Result<()> {
        let batch = {
            let mut outbox = lock(&self.inner.outbox);
            if outbox.is_empty() {
                return Ok(());
            }
            outbox.split().freeze()
        };

        self.inner.sender.send(batch)
    }

    /// Queue an error event for the peer.
    ///
    /// Non-ASCII characters in `message` are replaced with `?`.
    pub fn post_error(&self, object_id: ObjectId, code: u32, message: &str) -> Result<()> {
        let message: String = message
            .chars()
            .map(|c| if c.is_ascii() && c != '\0' { c } else { '?' })
            .collect();

        self.queue(
            &Message::new(REGISTRY_ID, ERROR_OPCODE)
                .object(object_id)
                .arg(code)
                .arg(message),
        )
    }

    /// Handle one inbound transport message.
    ///
    /// Frames are dispatched in order. Replies queued by the handlers are
    /// flushed once the whole message has been processed.
    pub fn on_message(&self, message: Bytes) -> Result<()> {
        if !self.is_open() {
            return Err(WestfieldError::ConnectionClosed);
        }

        if message.len() > self.inner.max_message_size {
            return Err(self.fail(
                NULL_ID,
                WestfieldError::Framing(format!(
                    "message of {} bytes exceeds limit of {}",
                    message.len(),
                    self.inner.max_message_size
                )),
            ));
        }

        for frame in FrameReader::new(message) {
            let result = match frame {
                Ok(frame) => {
                    let object_id = frame.object_id();
                    self.dispatch(frame).map_err(|e| (object_id, e))
                }
                Err(e) => Err((NULL_ID, e)),
            };

            if let Err((object_id, e)) = result {
                return Err(self.fail(object_id, e));
            }

            // A handler may have closed the connection.
            if !self.is_open() {
                return Ok(());
            }
        }

        self.flush()
    }

    fn dispatch(&self, frame: Frame) -> Result<()> {
        let object_id = frame.object_id();
        let resource = self
            .get(object_id)
            .ok_or(WestfieldError::UnknownObject(object_id))?;

        resource.dispatch(frame.opcode(), frame.payload, &self.inner.objects)
    }

    /// Report `error` to the peer and close the connection.
    fn fail(&self, object_id: ObjectId, error: WestfieldError) -> WestfieldError {
        let object_id = match &error {
            WestfieldError::UnknownObject(id) => *id,
            WestfieldError::UnknownOpcode { object_id, .. } => *object_id,
            _ => object_id,
        };

        if error.is_protocol_violation() {
            tracing::warn!(
                "Protocol error on connection {} (object {}): {}",
                self.id(),
                object_id,
                error
            );
        } else {
            tracing::error!(
                "Request failed on connection {} (object {}): {}",
                self.id(),
                object_id,
                error
            );
        }

        if self.get(REGISTRY_ID).is_some() {
            let posted = self
                .post_error(object_id, error.error_code(), &error.to_string())
                .and_then(|()| self.flush());
            if let Err(e) = posted {
                tracing::debug!("Failed to post error to connection {}: {}", self.id(), e);
            }
        }

        self.close();
        error
    }

    /// Close the connection.
    ///
    /// Detaches it from the server and registry, destroys every object and
    /// flushes anything still queued. Idempotent.
    pub fn close(&self) {
        let transitioned = self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });
        if !transitioned {
            return;
        }

        tracing::debug!("Closing connection {}", self.id());

        if let Some(server) = self.inner.server.upgrade() {
            server.connection_closed(self.id());
        }

        for resource in self.inner.objects.drain() {
            resource.destroy();
        }

        // Nothing reaches the sender once close returns.
        let _sending = lock(&self.inner.send_lock);
        if let Err(e) = self.send_outbox() {
            tracing::debug!("Final flush on connection {} failed: {}", self.id(), e);
        }
        self.inner.state.send_replace(ConnectionState::Closed);
        tracing::info!("Connection {} closed", self.id());
    }

    /// Wait until the connection reaches [`ConnectionState::Closed`].
    pub async fn wait_closed(&self) {
        let mut state = self.inner.state.subscribe();
        while *state.borrow_and_update() != ConnectionState::Closed {
            if state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("objects", &self.resource_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;
    use tokio::sync::mpsc;

    fn open() -> (Connection, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Server::new().create(tx).unwrap(), rx)
    }

    #[test]
    fn test_next_id_exhaustion() {
        let (connection, _rx) = open();
        connection.inner.next_id.store(u32::MAX - 1, Ordering::Release);

        assert_eq!(connection.next_id().unwrap(), u32::MAX);
        assert!(matches!(connection.next_id(), Err(WestfieldError::IdsExhausted)));
    }

    #[test]
    fn test_queued_messages_flush_as_one_batch() {
        let (connection, mut rx) = open();

        connection.queue(&Message::new(REGISTRY_ID, 2).arg(1u32)).unwrap();
        connection.queue(&Message::new(REGISTRY_ID, 2).arg(2u32)).unwrap();
        connection.flush().unwrap();
        connection.flush().unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 24);
        assert_eq!(FrameReader::new(batch).count(), 2);
        assert!(rx.try_recv().is_err());
    }

    /// Sender whose first call blocks until released.
    struct StallingSender {
        entered: std::sync::mpsc::Sender<()>,
        release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
        sent: Mutex<Vec<Bytes>>,
    }

    impl Sender for StallingSender {
        fn send(&self, message: Bytes) -> Result<()> {
            let release = lock(&self.release).take();
            if let Some(release) = release {
                self.entered.send(()).unwrap();
                release.recv().unwrap();
            }
            lock(&self.sent).push(message);
            Ok(())
        }
    }

    #[test]
    fn test_stalled_flush_keeps_batch_order() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let sender = Arc::new(StallingSender {
            entered: entered_tx,
            release: Mutex::new(Some(release_rx)),
            sent: Mutex::new(Vec::new()),
        });
        let server = Server::new();
        let connection = server.create(sender.clone()).unwrap();

        connection.queue(&Message::new(REGISTRY_ID, 1).arg(1u32)).unwrap();
        let first = {
            let connection = connection.clone();
            std::thread::spawn(move || connection.flush().unwrap())
        };
        entered_rx.recv().unwrap();

        connection.queue(&Message::new(REGISTRY_ID, 2).arg(1u32)).unwrap();
        let second = {
            let connection = connection.clone();
            std::thread::spawn(move || connection.flush().unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        release_tx.send(()).unwrap();

        first.join().unwrap();
        second.join().unwrap();

        let opcodes: Vec<u16> = lock(&sender.sent)
            .iter()
            .flat_map(|batch| FrameReader::new(batch.clone()).map(|f| f.unwrap().opcode()))
            .collect();
        assert_eq!(opcodes, vec![1, 2]);
    }

    #[test]
    fn test_post_error_replaces_non_ascii() {
        let (connection, mut rx) = open();

        connection.post_error(7, 3, "caf\u{e9}").unwrap();
        connection.flush().unwrap();

        let batch = rx.try_recv().unwrap();
        // header, object, code, length, "caf?"
        assert_eq!(batch.len(), 8 + 4 + 4 + 4 + 4);
        assert_eq!(&batch[20..24], b"caf?");
    }

    #[test]
    fn test_queue_after_close() {
        let (connection, _rx) = open();
        connection.close();

        let err = connection.queue(&Message::new(REGISTRY_ID, 2)).unwrap_err();
        assert!(matches!(err, WestfieldError::ConnectionClosed));
        assert!(matches!(connection.flush(), Err(WestfieldError::ConnectionClosed)));
    }

    #[test]
    fn test_failed_message_leaves_registry_detached() {
        let server = Server::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = server.create(tx).unwrap();

        let _ = connection.on_message(Bytes::from_static(&[1, 0, 0, 0]));

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(server.registry().attached_count(), 0);
        assert!(server.connection(connection.id()).is_none());
    }

    #[tokio::test]
    async fn test_wait_closed_after_close() {
        let (connection, _rx) = open();
        connection.close();
        connection.wait_closed().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
