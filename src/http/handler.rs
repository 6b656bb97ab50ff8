//! Turns a parse outcome into a response.
//!
//! This is where status codes are decided. Resource failures never leak
//! detail: an escape attempt and a missing file produce the same bytes.

use tracing::{error, warn};

use crate::http::parser::ParseError;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::static_files::{ResolveError, StaticFiles};

/// Builds the response for a successfully parsed request.
///
/// A `HEAD` request gets exactly the response `GET` would, minus the body,
/// whatever the status.
pub async fn handle_request(req: &Request, files: &StaticFiles) -> Response {
    match req.method {
        Method::GET => serve(&req.path, files).await,
        Method::HEAD => describe(&req.path, files).await.without_body(),
        _ => Response::not_implemented(),
    }
}

async fn serve(path: &str, files: &StaticFiles) -> Response {
    let resource = match files.resolve(path).await {
        Ok(resource) => resource,
        Err(e) => return resolve_error_response(path, e),
    };

    match files.read(&resource).await {
        Ok(body) => Response::ok(body, resource.mime),
        Err(e) => resolve_error_response(path, e),
    }
}

// Headers for HEAD come from metadata; the file is never read.
async fn describe(path: &str, files: &StaticFiles) -> Response {
    match files.resolve(path).await {
        Ok(resource) => ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", resource.mime)
            .header("Content-Length", resource.len.to_string())
            .build(),
        Err(e) => resolve_error_response(path, e),
    }
}

/// Builds the response for a request the parser rejected.
pub fn parse_error_response(err: &ParseError) -> Response {
    match err {
        ParseError::UnknownMethod => Response::not_implemented(),
        ParseError::Malformed(_) | ParseError::TooLarge => Response::bad_request(),
        // Never answered; the reader keeps waiting or gives up
        ParseError::Incomplete => Response::bad_request(),
    }
}

pub fn resolve_error_response(path: &str, err: ResolveError) -> Response {
    match err {
        ResolveError::NotFound => Response::not_found(),
        ResolveError::OutsideRoot => {
            warn!(path = %path.escape_debug(), "Rejected path outside document root");
            Response::not_found()
        }
        ResolveError::ReadFailure(e) => {
            error!(path = %path.escape_debug(), error = %e, "Failed to read resource");
            Response::internal_error()
        }
    }
}
