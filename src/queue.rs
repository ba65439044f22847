use anyhow::Result;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::pipeline::Pipeline;
use crate::translate::context::ContextStore;

/// Something that can turn one page image into its translated rendering.
/// The queue only needs this seam; the real implementation is [`Pipeline`].
pub trait PageProcessor: Send + Sync + 'static {
    fn process<'a>(
        &'a self,
        image: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}

impl PageProcessor for Pipeline {
    fn process<'a>(
        &'a self,
        image: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(self.run(image, None))
    }
}

/// Outcome notifications for enqueued pages, keyed by content hash.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Completed { hash: String, image: Vec<u8> },
    Failed { hash: String, message: String },
}

struct Job {
    hash: String,
    image: Vec<u8>,
}

struct QueueInner {
    pending: Mutex<VecDeque<Job>>,
    seen: Mutex<HashSet<String>>,
    wakeup: Notify,
    cancel: Notify,
    context: ContextStore,
}

impl QueueInner {
    fn locked_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<Job>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn locked_seen(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// FIFO of whole images with a single background worker, so pages are
/// translated one at a time in arrival order. Repeated submissions of the
/// same bytes are dropped until the next clear.
#[derive(Clone)]
pub struct TranslateQueue {
    inner: Arc<QueueInner>,
}

impl TranslateQueue {
    pub fn start(
        processor: Arc<dyn PageProcessor>,
        context: ContextStore,
    ) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                seen: Mutex::new(HashSet::new()),
                wakeup: Notify::new(),
                cancel: Notify::new(),
                context,
            }),
        };
        tokio::spawn(worker(queue.inner.clone(), processor, events));
        (queue, receiver)
    }

    /// Admits one image. Returns `false` when the same bytes were already
    /// submitted since the last clear.
    pub fn enqueue(&self, image: Vec<u8>) -> bool {
        let hash = format!("{:x}", md5::compute(&image));
        if !self.inner.locked_seen().insert(hash.clone()) {
            debug!(%hash, "duplicate image dropped");
            return false;
        }
        self.inner.locked_pending().push_back(Job { hash, image });
        self.inner.wakeup.notify_one();
        true
    }

    /// Drops everything pending and aborts the in-flight image. The shared
    /// translation context survives.
    pub fn stop(&self) {
        let dropped = {
            let mut pending = self.inner.locked_pending();
            let count = pending.len();
            pending.clear();
            count
        };
        self.inner.cancel.notify_waiters();
        info!(dropped, "queue stopped");
    }

    /// Stop plus a full reset: the dedup set and the shared context are
    /// emptied as well.
    pub fn clear_all(&self) {
        self.stop();
        self.inner.locked_seen().clear();
        self.inner.context.clear();
        info!("queue and shared context cleared");
    }

    pub fn pending_len(&self) -> usize {
        self.inner.locked_pending().len()
    }
}

async fn worker(
    inner: Arc<QueueInner>,
    processor: Arc<dyn PageProcessor>,
    events: mpsc::UnboundedSender<QueueEvent>,
) {
    loop {
        let job = inner.locked_pending().pop_front();
        let Some(job) = job else {
            inner.wakeup.notified().await;
            continue;
        };

        let cancelled = inner.cancel.notified();
        tokio::pin!(cancelled);
        let outcome = tokio::select! {
            biased;
            _ = &mut cancelled => {
                info!(hash = %job.hash, "in-flight image aborted");
                continue;
            }
            result = processor.process(&job.image) => result,
        };

        let event = match outcome {
            Ok(image) => QueueEvent::Completed {
                hash: job.hash,
                image,
            },
            Err(err) => {
                warn!(hash = %job.hash, "image failed: {err:#}");
                QueueEvent::Failed {
                    hash: job.hash,
                    message: format!("{err:#}"),
                }
            }
        };
        if events.send(event).is_err() {
            debug!("queue event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    struct EchoProcessor {
        delay: Duration,
    }

    impl PageProcessor for EchoProcessor {
        fn process<'a>(
            &'a self,
            image: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
            Box::pin(async move {
                sleep(self.delay).await;
                Ok(image.to_vec())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn images_complete_in_arrival_order() {
        let (queue, mut events) = TranslateQueue::start(
            Arc::new(EchoProcessor {
                delay: Duration::from_millis(10),
            }),
            ContextStore::new(),
        );
        assert!(queue.enqueue(b"first".to_vec()));
        assert!(queue.enqueue(b"second".to_vec()));

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        match (first, second) {
            (
                QueueEvent::Completed { image: a, .. },
                QueueEvent::Completed { image: b, .. },
            ) => {
                assert_eq!(a, b"first");
                assert_eq!(b, b"second");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_images_are_dropped_until_clear() {
        let (queue, mut events) = TranslateQueue::start(
            Arc::new(EchoProcessor {
                delay: Duration::from_millis(1),
            }),
            ContextStore::new(),
        );
        assert!(queue.enqueue(b"page".to_vec()));
        assert!(!queue.enqueue(b"page".to_vec()));

        assert!(matches!(
            events.recv().await.unwrap(),
            QueueEvent::Completed { .. }
        ));

        queue.clear_all();
        assert!(queue.enqueue(b"page".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aborts_in_flight_and_pending_but_keeps_context() {
        let context = ContextStore::new();
        context.push("src", "dst");
        let (queue, mut events) = TranslateQueue::start(
            Arc::new(EchoProcessor {
                delay: Duration::from_secs(3600),
            }),
            context.clone(),
        );
        queue.enqueue(b"slow-1".to_vec());
        queue.enqueue(b"slow-2".to_vec());
        tokio::task::yield_now().await;

        queue.stop();
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(context.snapshot().len(), 1);

        // The worker is free again: a fresh image still goes through.
        queue.enqueue(b"after-stop".to_vec());
        // The 3600s delay auto-advances under paused time.
        let event = events.recv().await.unwrap();
        match event {
            QueueEvent::Completed { image, .. } => assert_eq!(image, b"after-stop"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clear_all_empties_shared_context() {
        let context = ContextStore::new();
        context.push("src", "dst");
        let (queue, _events) = TranslateQueue::start(
            Arc::new(EchoProcessor {
                delay: Duration::from_millis(1),
            }),
            context.clone(),
        );
        queue.clear_all();
        assert!(context.is_empty());
    }
}
