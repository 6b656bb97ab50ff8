use std::future::Future;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::response::Response;
use crate::http::writer::serialize_response;
use crate::server::pool::Accepted;
use crate::server::queue::{PushError, QueueSender};

// Pause after a failed accept so fd exhaustion does not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The accept loop.
///
/// Runs until `shutdown` resolves. Each accepted connection is pushed onto
/// the queue without waiting; if the queue is full the client gets a 503
/// and is closed on the spot. Returning drops the listener and the queue's
/// producer side, which lets the workers drain and stop.
pub async fn run<F>(
    listener: TcpListener,
    queue: QueueSender<Accepted>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let rejection = serialize_response(&Response::service_unavailable());

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }

            res = listener.accept() => match res {
                Ok((stream, peer)) => admit(&queue, stream, peer, &rejection),
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    Ok(())
}

fn admit(queue: &QueueSender<Accepted>, stream: TcpStream, peer: SocketAddr, rejection: &[u8]) {
    match queue.try_push(Accepted { stream, peer }) {
        Ok(()) => {
            debug!(%peer, queued = queue.len(), "Accepted connection");
        }
        Err(PushError::Full(accepted)) => {
            warn!(%peer, capacity = queue.capacity(), "Connection queue full, rejecting");
            reject(accepted.stream, rejection);
        }
        Err(PushError::Closed(accepted)) => {
            error!(%peer, "No workers left, rejecting");
            reject(accepted.stream, rejection);
        }
    }
}

/// Best-effort 503, then close.
///
/// The socket stays in non-blocking mode after `into_std`, so none of
/// these calls can stall the accept loop.
fn reject(stream: TcpStream, response: &[u8]) {
    let result = stream.into_std().and_then(|mut stream| {
        // Whatever the client already sent; unread data turns close into RST
        let mut discard = [0u8; 1024];
        let _ = stream.read(&mut discard);

        let written = stream.write(response)?;
        if written < response.len() {
            debug!(written, "503 truncated, send buffer full");
        }
        stream.shutdown(Shutdown::Write)
    });

    if let Err(e) = result {
        debug!(error = %e, "Could not deliver 503");
    }
}
