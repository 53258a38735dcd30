//! The per-connection outbound scheduler: coalesces encoded request
//! records into [`Frame`]s and drains them onto the stream in order.
//!
//! Grounded on `original_source/sql/write_queue.go` for the admission
//! policy (first frame that's neither full nor closed, else a fresh one)
//! and the fixed-tick drain loop. The design notes explicitly permit
//! swapping the polling tick for a signaled wakeup; the tick is kept here
//! to stay close to the reference implementation and the teacher's own
//! polling-based reconnect loops.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::LbResult;
use crate::frame::Frame;

const DRAIN_TICK: Duration = Duration::from_micros(100);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The write queue's view of "the connection": something that can take a
/// closed-and-signed frame's bytes and put them on the wire under mutual
/// exclusion with any other stream write.
pub(crate) trait FrameSink: Send + Sync {
    fn emit_signed<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, LbResult<()>>;
}

struct Inner {
    frames: Mutex<VecDeque<Arc<Frame>>>,
    sink: Arc<dyn FrameSink>,
    closing: AtomicBool,
    notify: Notify,
}

/// A per-connection FIFO of frames awaiting emission, drained by a
/// background task.
pub(crate) struct WriteQueue {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WriteQueue {
    pub(crate) fn new(sink: Arc<dyn FrameSink>) -> Self {
        let inner = Arc::new(Inner {
            frames: Mutex::new(VecDeque::new()),
            sink,
            closing: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let task = tokio::spawn(Self::drain_loop(Arc::clone(&inner)));
        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Admission: append `entry` to the first frame that's neither full
    /// nor closed, or allocate a fresh frame at the tail.
    pub(crate) fn enqueue_entry(&self, entry: Vec<u8>) -> LbResult<()> {
        let mut frames = self.inner.frames.lock().expect("write queue mutex poisoned");
        let writable = frames.iter().find(|f| !f.is_full() && !f.is_closed());
        match writable {
            Some(frame) => frame.append(entry)?,
            None => {
                let frame = Arc::new(Frame::new());
                frame.append(entry)?;
                frames.push_back(frame);
            }
        }
        Ok(())
    }

    async fn drain_loop(inner: Arc<Inner>) {
        loop {
            tokio::select! {
                () = inner.notify.notified() => {
                    if inner.closing.load(Ordering::Acquire) {
                        trace!("write queue stopped");
                        return;
                    }
                }
                () = tokio::time::sleep(DRAIN_TICK) => {}
            }

            if inner.closing.load(Ordering::Acquire) {
                trace!("write queue stopped");
                return;
            }

            let head = {
                let mut frames = inner.frames.lock().expect("write queue mutex poisoned");
                frames.pop_front()
            };

            if let Some(frame) = head {
                if frame.is_empty() {
                    // The admission policy never creates empty frames, but
                    // guard against emitting one anyway (spec §8 boundary
                    // behavior: "a frame with zero entries is never
                    // emitted").
                    continue;
                }
                if let Err(e) = inner.sink.emit_signed(&frame).await {
                    warn!("error writing frame: {e}");
                }
            }
        }
    }

    /// Signals the drain task to exit at its next tick. Frames still
    /// queued at shutdown are discarded; callers whose requests were in
    /// those frames observe a timeout or a connection-closed error.
    pub(crate) fn close(&self) {
        self.inner.closing.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
        if let Some(task) = self.task.lock().expect("write queue mutex poisoned").take() {
            task.abort();
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        emitted: StdMutex<Vec<Vec<u8>>>,
    }

    impl FrameSink for RecordingSink {
        fn emit_signed<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, LbResult<()>> {
            Box::pin(async move {
                let bytes = frame.encode()?;
                self.emitted.lock().unwrap().push(bytes);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn enqueued_entries_are_drained_in_order() {
        let sink = Arc::new(RecordingSink {
            emitted: StdMutex::new(Vec::new()),
        });
        let queue = WriteQueue::new(sink.clone());

        queue.enqueue_entry(vec![1]).unwrap();
        queue.enqueue_entry(vec![2]).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let emitted = sink.emitted.lock().unwrap();
        assert!(!emitted.is_empty());
    }

    #[tokio::test]
    async fn many_concurrent_enqueues_coalesce_into_multiple_frames() {
        let sink = Arc::new(RecordingSink {
            emitted: StdMutex::new(Vec::new()),
        });
        let queue = Arc::new(WriteQueue::new(sink.clone()));

        for i in 0..200u32 {
            queue.enqueue_entry(i.to_le_bytes().to_vec()).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;

        // 200 entries at 100/frame must coalesce into at least ceil(200/100) = 2 frames.
        assert!(sink.emitted.lock().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn close_discards_remaining_frames() {
        let sink = Arc::new(RecordingSink {
            emitted: StdMutex::new(Vec::new()),
        });
        let queue = WriteQueue::new(sink.clone());
        queue.close();
        queue.enqueue_entry(vec![9]).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        // The drain task has exited; nothing more gets emitted.
        let count_after_close = sink.emitted.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sink.emitted.lock().unwrap().len(), count_after_close);
    }
}
