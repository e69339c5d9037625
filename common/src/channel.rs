//! Bounded FIFO links between pipeline stages.
//!
//! A link carries [`PipelineMessage`]s. `send` waits while the link is full,
//! which is how a slow stage pushes back on the one feeding it. `recv` waits
//! while the link is empty and only reports the end of the link once every
//! sender is gone and everything buffered has been handed out.

use tokio::sync::mpsc;

/// Default number of messages a link buffers.
pub const DEFAULT_CAPACITY: usize = 10;

/// What travels on a link: a payload, or the end-of-stream marker.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage<T> {
    Payload(T),
    EndOfStream,
}

impl<T> PipelineMessage<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, PipelineMessage::EndOfStream)
    }
}

/// The receiving side of a link has been closed or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Create a link buffering up to `capacity` messages (at least one).
pub fn bounded<T>(capacity: usize) -> (StageSender<T>, StageReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (StageSender { inner: tx }, StageReceiver { inner: rx })
}

#[derive(Debug)]
pub struct StageSender<T> {
    inner: mpsc::Sender<PipelineMessage<T>>,
}

impl<T> StageSender<T> {
    /// Wait for a free slot, then enqueue `msg`.
    pub async fn send(&self, msg: PipelineMessage<T>) -> Result<(), ChannelClosed> {
        self.inner.send(msg).await.map_err(|_| ChannelClosed)
    }

    /// Blocking flavour of [`send`](Self::send) for worker threads.
    /// Must not be called from inside an async task.
    pub fn blocking_send(&self, msg: PipelineMessage<T>) -> Result<(), ChannelClosed> {
        self.inner.blocking_send(msg).map_err(|_| ChannelClosed)
    }

    pub async fn send_payload(&self, payload: T) -> Result<(), ChannelClosed> {
        self.send(PipelineMessage::Payload(payload)).await
    }

    pub async fn send_end_of_stream(&self) -> Result<(), ChannelClosed> {
        self.send(PipelineMessage::EndOfStream).await
    }

    pub fn blocking_send_end_of_stream(&self) -> Result<(), ChannelClosed> {
        self.blocking_send(PipelineMessage::EndOfStream)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.inner.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.inner.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug)]
pub struct StageReceiver<T> {
    inner: mpsc::Receiver<PipelineMessage<T>>,
}

impl<T> StageReceiver<T> {
    /// Wait for the next message. `None` means every sender is gone (or the
    /// link was closed) and nothing is left in the buffer.
    pub async fn recv(&mut self) -> Option<PipelineMessage<T>> {
        self.inner.recv().await
    }

    /// Blocking flavour of [`recv`](Self::recv) for worker threads.
    pub fn blocking_recv(&mut self) -> Option<PipelineMessage<T>> {
        self.inner.blocking_recv()
    }

    /// Stop accepting messages. Buffered messages can still be received;
    /// pending and future sends fail with [`ChannelClosed`].
    pub fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(msg: Option<PipelineMessage<u32>>) -> Option<u32> {
        match msg {
            Some(PipelineMessage::Payload(v)) => Some(v),
            _ => None,
        }
    }

    #[tokio::test]
    async fn delivers_in_send_order() {
        let (tx, mut rx) = bounded(4);
        for i in 0..4 {
            tx.send_payload(i).await.unwrap();
        }
        for i in 0..4 {
            assert_eq!(payload(rx.recv().await), Some(i));
        }
    }

    #[tokio::test]
    async fn end_of_stream_is_not_a_payload() {
        let (tx, mut rx) = bounded::<Vec<u32>>(2);
        tx.send_payload(Vec::new()).await.unwrap();
        tx.send_end_of_stream().await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(!first.is_end_of_stream());
        assert_eq!(first, PipelineMessage::Payload(Vec::new()));
        assert!(rx.recv().await.unwrap().is_end_of_stream());
    }

    #[tokio::test]
    async fn send_blocks_at_capacity_until_receive() {
        let (tx, mut rx) = bounded(2);
        tx.send_payload(1).await.unwrap();
        tx.send_payload(2).await.unwrap();
        assert_eq!(tx.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send_payload(3)).await;
        assert!(blocked.is_err(), "send on a full link must wait");

        let sender = tokio::spawn(async move {
            tx.send_payload(3).await.unwrap();
            tx
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished());

        assert_eq!(payload(rx.recv().await), Some(1));
        let tx = sender.await.unwrap();
        assert_eq!(tx.available(), 0);
        assert_eq!(payload(rx.recv().await), Some(2));
        assert_eq!(payload(rx.recv().await), Some(3));
    }

    #[tokio::test]
    async fn receive_blocks_until_send() {
        let (tx, mut rx) = bounded::<u32>(2);
        let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(waited.is_err(), "receive on an empty open link must wait");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send_payload(9).await.unwrap();
        });
        assert_eq!(payload(rx.recv().await), Some(9));
    }

    #[tokio::test]
    async fn receive_ends_after_drain_when_senders_gone() {
        let (tx, mut rx) = bounded(3);
        tx.send_payload(1).await.unwrap();
        tx.send_payload(2).await.unwrap();
        drop(tx);
        assert_eq!(payload(rx.recv().await), Some(1));
        assert_eq!(payload(rx.recv().await), Some(2));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_fails_blocked_sender_but_keeps_buffer() {
        let (tx, mut rx) = bounded(1);
        tx.send_payload(1).await.unwrap();

        let sender = tokio::spawn(async move { tx.send_payload(2).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        rx.close();

        assert_eq!(sender.await.unwrap(), Err(ChannelClosed));
        assert_eq!(payload(rx.recv().await), Some(1));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_fails() {
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.send_end_of_stream().await, Err(ChannelClosed));
    }

    #[test]
    fn blocking_variants_work_across_threads() {
        let (tx, mut rx) = bounded(1);
        let producer = std::thread::spawn(move || {
            for i in 0..5 {
                tx.blocking_send(PipelineMessage::Payload(i)).unwrap();
            }
            tx.blocking_send_end_of_stream().unwrap();
        });
        let mut seen = Vec::new();
        while let Some(PipelineMessage::Payload(v)) = rx.blocking_recv() {
            seen.push(v);
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (tx, _rx) = bounded::<u32>(0);
        assert_eq!(tx.max_capacity(), 1);
    }
}
