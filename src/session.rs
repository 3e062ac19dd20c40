//! Session driver.
//!
//! [`run`] consumes [`TransportEvent`]s for one connection until the peer
//! goes away or a fatal error closes the connection. Transport adapters
//! that own a socket push events into a channel and let this loop do the
//! dispatching.
//!
//! # Example
//!
//! ```ignore
//! let (session, mut outbound) = server.open_session()?;
//!
//! // Writer half: forward batches to the socket.
//! tokio::spawn(async move {
//!     while let Some(batch) = outbound.recv().await {
//!         socket.send(batch).await?;
//!     }
//! });
//!
//! // Reader half: forward frames into the session.
//! while let Some(message) = socket.next().await {
//!     session.binary(message).await?;
//! }
//! session.close().await?;
//! session.join().await?;
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::error::{Result, WestfieldError};
use crate::server::Server;
use crate::transport::TransportEvent;

/// Drive `connection` from a stream of transport events.
///
/// Returns `Ok` when the transport closes and the error that tore the
/// connection down otherwise. The connection is closed on return.
pub async fn run(connection: Connection, mut events: mpsc::Receiver<TransportEvent>) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Binary(message) => match connection.on_message(message) {
                Ok(()) => {}
                Err(WestfieldError::ConnectionClosed) => break,
                Err(e) => return Err(e),
            },
            TransportEvent::Text(text) => {
                tracing::debug!(
                    "Ignoring {} byte text message on connection {}",
                    text.len(),
                    connection.id()
                );
            }
            TransportEvent::Error(reason) => {
                tracing::warn!("Transport error on connection {}: {}", connection.id(), reason);
                break;
            }
            TransportEvent::Closed => break,
        }

        if !connection.is_open() {
            break;
        }
    }

    connection.close();
    Ok(())
}

/// A connection driven by a spawned [`run`] task.
pub struct SessionHandle {
    events: mpsc::Sender<TransportEvent>,
    connection: Connection,
    task: JoinHandle<Result<()>>,
}

impl SessionHandle {
    #[inline]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Forward a transport event to the session task.
    pub async fn deliver(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| WestfieldError::ConnectionClosed)
    }

    /// Forward an inbound binary message.
    pub async fn binary(&self, message: Bytes) -> Result<()> {
        self.deliver(TransportEvent::Binary(message)).await
    }

    /// Report that the peer went away.
    pub async fn close(&self) -> Result<()> {
        self.deliver(TransportEvent::Closed).await
    }

    /// Wait for the session task to finish.
    pub async fn join(self) -> Result<()> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| WestfieldError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

impl Server {
    /// Create a connection whose outbound batches arrive on the returned
    /// receiver and spawn a session task to drive it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_session(&self) -> Result<(SessionHandle, mpsc::UnboundedReceiver<Bytes>)> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection = self.create(outbound_tx)?;

        let capacity = self.config().session_channel_capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let task = tokio::spawn(run(connection.clone(), events_rx));

        Ok((
            SessionHandle {
                events: events_tx,
                connection,
                task,
            },
            outbound_rx,
        ))
    }
}
