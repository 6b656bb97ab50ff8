//! HTTP protocol implementation.
//!
//! A deliberately small HTTP/1.1 subset: one request per connection, `GET`
//! and `HEAD` only, length-delimited bodies, `Connection: close` on every
//! response.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine run by a worker
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`handler`**: Maps requests and failures to responses
//! - **`writer`**: Serializes and writes HTTP responses to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request framed     (peer gone / timeout → Closed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Parse result → resolve → build
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Flushed, write error or timeout
//!               ▼
//!            Closed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use palisade::config::Config;
//! use palisade::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(&Config::default()).await?;
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod handler;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
