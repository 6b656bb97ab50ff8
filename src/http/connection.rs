use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::http::handler::{handle_request, parse_error_response};
use crate::http::parser::{ParseError, ParseOptions, parse_http_request_with};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::static_files::StaticFiles;

const READ_CHUNK: usize = 4096;

/// Everything a worker needs to serve a connection. Shared read-only.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub files: StaticFiles,
    pub parse: ParseOptions,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

/// One accepted stream being served by one worker.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Result<Request, ParseError>),
    Writing(ResponseWriter),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Serves exactly one request, then closes.
    ///
    /// Errors are transport failures (read/write error or timeout). The
    /// connection is `Closed` when this returns, whatever the result.
    pub async fn run(&mut self, ctx: &ConnectionContext) -> anyhow::Result<()> {
        let result = self.drive(ctx).await;
        self.state = ConnectionState::Closed;
        let _ = self.stream.shutdown().await;
        result
    }

    async fn drive(&mut self, ctx: &ConnectionContext) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => {
                    let read = timeout(ctx.read_timeout, self.read_request(&ctx.parse))
                        .await
                        .map_err(|_| anyhow::anyhow!("read timed out"))??;

                    match read {
                        Some(outcome) => {
                            self.state = ConnectionState::Processing(outcome);
                        }
                        None => {
                            debug!("Peer closed before sending a full request");
                            self.state = ConnectionState::Closed;
                        }
                    }
                }

                ConnectionState::Processing(outcome) => {
                    let response = match outcome {
                        Ok(req) => {
                            let response = handle_request(req, &ctx.files).await;
                            info!(
                                method = %req.method,
                                path = %req.path.escape_debug(),
                                status = response.status.as_u16(),
                                "Served request"
                            );
                            response
                        }
                        Err(e) => {
                            let response = parse_error_response(e);
                            info!(
                                error = %e,
                                status = response.status.as_u16(),
                                "Rejected request"
                            );
                            response
                        }
                    };

                    self.state = ConnectionState::Writing(ResponseWriter::new(&response));
                }

                ConnectionState::Writing(writer) => {
                    timeout(ctx.write_timeout, writer.write_to_stream(&mut self.stream))
                        .await
                        .map_err(|_| anyhow::anyhow!("write timed out"))??;

                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads until the buffer frames a request or the parser gives up.
    ///
    /// `None` means the peer closed first.
    async fn read_request(
        &mut self,
        opts: &ParseOptions,
    ) -> anyhow::Result<Option<Result<Request, ParseError>>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request_with(&self.buffer, opts) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(Ok(request)));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => return Ok(Some(Err(e))),
            }

            self.buffer.reserve(READ_CHUNK);
            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                return Ok(None);
            }
        }
    }
}
