//! Single background writer for persisted blobs.
//!
//! Mutations hand serialized snapshots to the writer and return immediately.
//! The writer saves them in the order they were queued. A failed save is
//! logged and dropped; it is never retried and never rolls back memory.
//!
//! A writer can start paused: commands queue up but nothing touches the
//! store until [`PersistenceWriter::resume`]. The service uses this so no
//! save lands before the persisted blobs have been read.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::persistence::BlobStore;

enum WriteCommand {
    Save { key: &'static str, blob: String },
    Remove { key: &'static str },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer task. The task stops once the handle is
/// dropped and the queue is drained.
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
    gate: watch::Sender<bool>,
}

impl PersistenceWriter {
    /// Spawn a writer task on the current Tokio runtime. It queues commands
    /// until [`resume`](Self::resume) is called.
    pub fn paused(store: Arc<dyn BlobStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (gate, gate_rx) = watch::channel(false);
        tokio::spawn(run(store, rx, gate_rx));
        Self { tx, gate }
    }

    /// Let the task start draining its queue. Idempotent.
    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Queue a blob for saving.
    pub fn enqueue(&self, key: &'static str, blob: String) {
        if self.tx.send(WriteCommand::Save { key, blob }).is_err() {
            warn!(key, "Persistence writer has stopped; blob not saved");
        }
    }

    /// Queue the removal of a blob.
    pub fn enqueue_remove(&self, key: &'static str) {
        if self.tx.send(WriteCommand::Remove { key }).is_err() {
            warn!(key, "Persistence writer has stopped; blob not removed");
        }
    }

    /// Wait until everything queued before this call has been attempted.
    ///
    /// On a paused writer this waits for [`resume`](Self::resume) too.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(
    store: Arc<dyn BlobStore>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
    mut gate: watch::Receiver<bool>,
) {
    if gate.wait_for(|open| *open).await.is_err() {
        debug!("Persistence writer dropped before it was resumed");
        return;
    }

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriteCommand::Save { key, blob } => match store.save(key, &blob).await {
                Ok(()) => debug!(backend = store.name(), key, bytes = blob.len(), "Blob saved"),
                Err(e) => warn!(
                    backend = store.name(),
                    key,
                    error = %e,
                    "Failed to persist blob; keeping in-memory state"
                ),
            },
            WriteCommand::Remove { key } => match store.remove(key).await {
                Ok(()) => debug!(backend = store.name(), key, "Blob removed"),
                Err(e) => warn!(backend = store.name(), key, error = %e, "Failed to remove blob"),
            },
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Persistence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBlobStore;

    fn running(store: &MemoryBlobStore) -> PersistenceWriter {
        let writer = PersistenceWriter::paused(Arc::new(store.clone()));
        writer.resume();
        writer
    }

    #[tokio::test]
    async fn test_writes_in_order() {
        let store = MemoryBlobStore::new();
        let writer = running(&store);
        writer.enqueue("k", "one".into());
        writer.enqueue("k", "two".into());
        writer.flush().await;
        assert_eq!(store.get("k").await.as_deref(), Some("two"));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_writer() {
        let store = MemoryBlobStore::new();
        let writer = running(&store);
        store.set_fail_saves(true);
        writer.enqueue("k", "lost".into());
        writer.flush().await;
        assert!(store.get("k").await.is_none());

        store.set_fail_saves(false);
        writer.enqueue("k", "kept".into());
        writer.flush().await;
        assert_eq!(store.get("k").await.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_paused_writer_holds_queue_until_resumed() {
        let store = MemoryBlobStore::new();
        let writer = PersistenceWriter::paused(Arc::new(store.clone()));
        writer.enqueue("k", "early".into());
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(store.get("k").await.is_none());
        assert_eq!(store.save_count(), 0);

        writer.resume();
        writer.flush().await;
        assert_eq!(store.get("k").await.as_deref(), Some("early"));
    }

    #[tokio::test]
    async fn test_remove_after_save() {
        let store = MemoryBlobStore::new();
        let writer = running(&store);
        writer.enqueue("k", "v".into());
        writer.enqueue_remove("k");
        writer.flush().await;
        assert!(store.get("k").await.is_none());
        assert_eq!(store.save_count(), 1);
    }
}
