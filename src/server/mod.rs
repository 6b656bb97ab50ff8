//! Connection admission and the worker pool.
//!
//! ```text
//!   accept loop ──try_push──▶ [ bounded queue ] ──pop──▶ worker × N
//!        │                                                 │
//!        └─ queue full: 503 + close            Connection::run (one at a time)
//! ```

pub mod listener;
pub mod pool;
pub mod queue;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::ConnectionContext;
use crate::static_files::StaticFiles;

use pool::WorkerPool;

/// What happened during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers still busy when the grace period ran out.
    pub forced: usize,
    /// Queued connections that never reached a worker.
    pub dropped: usize,
}

pub struct Server {
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    workers: usize,
    queue_capacity: usize,
    grace: Duration,
}

impl Server {
    /// Validates the configuration, checks the document root and binds.
    ///
    /// Any failure here is a startup error.
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let files = StaticFiles::new(&config.static_files)?;
        let addr = config.server.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        info!(
            addr = %listener.local_addr()?,
            root = %files.root().display(),
            workers = config.server.max_connections,
            queue = config.server.queue_capacity(),
            "Listening"
        );

        let ctx = ConnectionContext {
            files,
            parse: config.parse_options(),
            read_timeout: config.server.read_timeout(),
            write_timeout: config.server.write_timeout(),
        };

        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            workers: config.server.max_connections,
            queue_capacity: config.server.queue_capacity(),
            grace: config.server.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` resolves, then drains.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = queue::bounded(self.queue_capacity);
        let pool = WorkerPool::spawn(self.workers, rx, self.ctx);

        let accepted = listener::run(self.listener, tx, shutdown).await;

        info!(workers = pool.size(), "Waiting for in-flight connections");
        let drained = pool.shutdown(self.grace).await;
        info!(
            forced = drained.forced,
            dropped = drained.dropped,
            "Server stopped"
        );

        accepted?;
        Ok(ShutdownReport {
            forced: drained.forced,
            dropped: drained.dropped,
        })
    }
}
