//! Palisade - Bounded static-file HTTP server
//!
//! Serves files from a sandboxed document root over a small HTTP/1.1
//! subset, with a fixed worker pool and a bounded admission queue.

pub mod config;
pub mod http;
pub mod server;
pub mod static_files;
