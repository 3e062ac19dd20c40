//! Channel-backed sender.
//!
//! Lets a transport task own the socket while connections push batches into
//! an unbounded tokio channel. Sending never blocks the dispatch path.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::Sender;
use crate::error::{Result, WestfieldError};

impl Sender for mpsc::UnboundedSender<Bytes> {
    fn send(&self, message: Bytes) -> Result<()> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| WestfieldError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_through_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

        Sender::send(&tx, Bytes::from_static(b"abcd")).unwrap();

        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"abcd"));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        drop(rx);

        let err = Sender::send(&tx, Bytes::from_static(b"abcd")).unwrap_err();
        assert!(matches!(err, WestfieldError::ConnectionClosed));
    }
}
