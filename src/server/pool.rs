//! Fixed set of workers pulling accepted connections off the queue.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::http::connection::{Connection, ConnectionContext};
use crate::server::queue::QueueReceiver;

/// A connection that has been accepted but not yet picked up by a worker.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

pub struct WorkerPool {
    workers: JoinSet<()>,
    queue: QueueReceiver<Accepted>,
    size: usize,
}

/// How a pool shutdown ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    /// Workers aborted mid-connection.
    pub forced: usize,
    /// Connections still queued, closed without a response.
    pub dropped: usize,
}

impl WorkerPool {
    pub fn spawn(
        size: usize,
        queue: QueueReceiver<Accepted>,
        ctx: Arc<ConnectionContext>,
    ) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..size {
            workers.spawn(worker_loop(id, queue.clone(), Arc::clone(&ctx)));
        }
        debug!(workers = size, "Worker pool started");
        Self {
            workers,
            queue,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Waits for the workers to drain the queue and finish their current
    /// connections. Whatever is still running after `grace` is aborted.
    ///
    /// Connections still queued at that point are closed unanswered.
    pub async fn shutdown(mut self, grace: Duration) -> Drained {
        let drained = timeout(grace, async {
            while let Some(res) = self.workers.join_next().await {
                if let Err(e) = res {
                    error!(error = %e, "Worker ended abnormally");
                }
            }
        })
        .await;

        if drained.is_ok() {
            return Drained::default();
        }

        let forced = self.workers.len();
        self.workers.shutdown().await;
        let dropped = self.queue.discard().await;
        warn!(forced, dropped, "Grace period elapsed, closed remaining connections");

        Drained { forced, dropped }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn worker_loop(id: usize, queue: QueueReceiver<Accepted>, ctx: Arc<ConnectionContext>) {
    while let Some(Accepted { stream, peer }) = queue.pop().await {
        let span = info_span!("conn", worker = id, %peer);
        let ctx = Arc::clone(&ctx);

        // Own task so a panic stays with this connection; the guard takes
        // the connection down too if the worker itself is aborted.
        let task = tokio::spawn(
            async move {
                let mut conn = Connection::new(stream);
                if let Err(e) = conn.run(&ctx).await {
                    debug!(error = %e, "Connection closed with error");
                }
            }
            .instrument(span),
        );
        let guard = AbortOnDrop(task.abort_handle());

        if let Err(e) = task.await {
            if e.is_panic() {
                error!(worker = id, %peer, "Connection handler panicked");
            }
        }
        drop(guard);
    }

    debug!(worker = id, "Worker stopped");
}
