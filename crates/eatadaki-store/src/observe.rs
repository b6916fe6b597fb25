//! Live queries over a store.
//!
//! An [`Observation`] re-runs a query every time a write touches one of the
//! tables it depends on and yields each fresh result as a stream item. The
//! first item holds the state at subscription time and is already buffered
//! when [`Observation`] is handed back, so it is available immediately even
//! when the result is empty.
//!
//! Consumers are only promised the latest state: if several writes land
//! while the consumer is not polling, some intermediate results may be
//! coalesced.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use rusqlite::Connection;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::database::Database;

/// Number of results buffered ahead of the consumer.
const OBSERVATION_BUFFER: usize = 4;

/// A live query result stream.
///
/// Dropping the stream (or calling [`close`](Self::close)) stops the
/// background task and releases its change subscription.
pub struct Observation<T, E> {
    receiver: mpsc::Receiver<Result<T, E>>,
    handle: tokio::task::JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl<T, E> Observation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start observing `tables` in `db`, re-running `query` after each change.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) async fn start<F>(db: Database, tables: &'static [&'static str], query: F) -> Self
    where
        F: Fn(&Connection) -> Result<T, E> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(OBSERVATION_BUFFER);

        // Subscribe before the first query so no change can slip between them.
        let mut changes = db.subscribe();
        let initial = db.read(|conn| query(conn)).await;
        // The channel is empty, so this cannot fail for lack of capacity.
        let _ = tx.try_send(initial);

        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Observation cancelled, stopping");
                        break;
                    }
                    change = changes.recv() => {
                        match change {
                            Ok(changes) if !changes.touches(tables) => continue,
                            Ok(_) => {}
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, ?tables, "Observer lagged behind store changes, re-querying");
                            }
                            Err(RecvError::Closed) => break,
                        }

                        let result = db.read(|conn| query(conn)).await;
                        if result.is_err() {
                            warn!(?tables, "Observed query failed");
                        }

                        tokio::select! {
                            _ = task_token.cancelled() => break,
                            sent = tx.send(result) => {
                                if sent.is_err() {
                                    debug!("Observation receiver dropped, stopping");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Self {
            receiver: rx,
            handle,
            cancel_token,
        }
    }
}

impl<T, E> Observation<T, E> {
    /// Stop observing.
    pub fn close(self) {
        self.cancel_token.cancel();
    }

    /// Check if the background task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[cfg(test)]
impl<T, E> Observation<T, E> {
    /// Next item, failing the test if none arrives within two seconds.
    pub(crate) async fn next_within_timeout(&mut self) -> Result<T, E> {
        use futures::StreamExt;

        tokio::time::timeout(std::time::Duration::from_secs(2), self.next())
            .await
            .expect("observation should emit within the timeout")
            .expect("observation should stay open")
    }
}

impl<T, E> Drop for Observation<T, E> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl<T, E> Stream for Observation<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
