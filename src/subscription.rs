//! Cancellable live feeds returned by every `subscribe`/`watch` style operation.

use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};

/// Default buffer used between a feed producer and its consumer.
pub const FEED_CAPACITY: usize = 16;

/// Handle over a live feed of `T` values.
///
/// The producer side runs in a background task owned by the subscription. Calling
/// [`Subscription::unsubscribe`] or dropping the handle aborts that task and releases the
/// underlying resource (store listener, polling loop, ...).
pub struct Subscription<T> {
    receiver: mpsc::Receiver<T>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// Wrap a receiver and the task feeding it.
    pub fn new(receiver: mpsc::Receiver<T>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Wrap a receiver whose producer is not a task owned by this handle.
    pub fn detached(receiver: mpsc::Receiver<T>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// A subscription that never yields anything. Used in local-only mode.
    pub fn closed() -> Self {
        let (_tx, receiver) = mpsc::channel(1);
        Self::detached(receiver)
    }

    /// Wait for the next value, returning `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Stop receiving values and release the producer.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.receiver.close();
    }
}

impl<T: Send + 'static> Subscription<T> {
    /// Transform every value of the feed, dropping those mapped to `None`.
    ///
    /// The returned subscription owns `self`; cancelling it cancels the source as well.
    pub fn filter_map<U, F>(mut self, mut f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = self.recv() => {
                        let Some(value) = next else { break };
                        if let Some(mapped) = f(value) {
                            if tx.send(mapped).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });
        Subscription::new(rx, task)
    }

    /// Consume the subscription as a [`Stream`].
    pub fn into_stream(mut self) -> impl Stream<Item = T> {
        async_stream::stream! {
            while let Some(value) = self.recv().await {
                yield value;
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filter_map_forwards_and_drops() {
        let (tx, rx) = mpsc::channel(4);
        let source = Subscription::detached(rx);
        let mut evens = source.filter_map(|n: u32| (n % 2 == 0).then_some(n * 10));

        for n in 1..=4 {
            tx.send(n).await.unwrap();
        }
        drop(tx);

        assert_eq!(evens.recv().await, Some(20));
        assert_eq!(evens.recv().await, Some(40));
        assert_eq!(evens.recv().await, None);
    }

    #[tokio::test]
    async fn unsubscribe_aborts_producer() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let (alive, released) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _held = (tx, alive);
            std::future::pending::<()>().await;
        });
        let subscription = Subscription::new(rx, task);
        subscription.unsubscribe();

        let released = tokio::time::timeout(std::time::Duration::from_secs(1), released).await;
        assert!(matches!(released, Ok(Err(_))));
    }

    #[tokio::test]
    async fn stream_ends_with_the_feed() {
        use futures::StreamExt;

        let (tx, rx) = mpsc::channel(4);
        let stream = Subscription::detached(rx).into_stream();
        tx.send("a").await.unwrap();
        tx.send("b").await.unwrap();
        drop(tx);

        assert_eq!(stream.collect::<Vec<_>>().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn closed_subscription_yields_nothing() {
        let mut subscription = Subscription::<u32>::closed();
        assert_eq!(subscription.recv().await, None);
    }
}
