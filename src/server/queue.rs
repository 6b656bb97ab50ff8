//! Bounded hand-off between the accept loop and the workers.
//!
//! The producer side never waits: a full queue hands the item straight back
//! so the caller can reject it. Consumers share one receiver behind a mutex
//! and wait while the queue is empty.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug)]
pub enum PushError<T> {
    /// Queue at capacity; the item is returned untouched.
    Full(T),
    /// Every consumer is gone.
    Closed(T),
}

/// Producer half. Dropping it lets consumers drain and then stop.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
}

/// Consumer half. Cloned once per worker.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl<T> QueueSender<T> {
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => PushError::Full(item),
            TrySendError::Closed(item) => PushError::Closed(item),
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of items waiting for a consumer.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> QueueReceiver<T> {
    /// Waits for the next item. `None` once the sender is dropped and the
    /// queue is empty.
    pub async fn pop(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Drops everything still waiting and returns how many items that was.
    pub async fn discard(&self) -> usize {
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn push_fails_fast_when_full() {
        let (tx, _rx) = bounded::<u32>(2);

        tx.try_push(1).unwrap();
        tx.try_push(2).unwrap();
        assert_eq!(tx.len(), 2);

        match tx.try_push(3) {
            Err(PushError::Full(item)) => assert_eq!(item, 3),
            other => panic!("expected Full, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pop_is_fifo() {
        let (tx, rx) = bounded(4);
        for i in 0..4 {
            tx.try_push(i).unwrap();
        }

        for i in 0..4 {
            assert_eq!(rx.pop().await, Some(i));
        }
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let (tx, rx) = bounded(1);

        let consumer = tokio::spawn(async move { rx.pop().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        tx.try_push("conn").unwrap();
        assert_eq!(consumer.await.unwrap(), Some("conn"));
    }

    #[tokio::test]
    async fn dropping_sender_drains_then_ends() {
        let (tx, rx) = bounded(2);
        tx.try_push(7).unwrap();
        drop(tx);

        assert_eq!(rx.pop().await, Some(7));
        assert_eq!(rx.pop().await, None);
    }

    #[tokio::test]
    async fn discard_empties_and_closes() {
        let (tx, rx) = bounded(3);
        tx.try_push(1).unwrap();
        tx.try_push(2).unwrap();

        assert_eq!(rx.discard().await, 2);
        assert!(matches!(tx.try_push(3), Err(PushError::Closed(3))));
    }

    #[tokio::test]
    async fn push_after_consumers_gone_is_closed() {
        let (tx, rx) = bounded(2);
        drop(rx);

        assert!(matches!(tx.try_push(1), Err(PushError::Closed(1))));
    }
}
