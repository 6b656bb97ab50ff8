use crate::http::request::{Method, Request};
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Default upper bound on a buffered request (head + body).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The buffer does not yet hold a complete request.
    #[error("incomplete request")]
    Incomplete,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("unknown method")]
    UnknownMethod,
    #[error("request exceeds size limit")]
    TooLarge,
}

/// What to do when a header name appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateHeaders {
    #[default]
    LastWins,
    FirstWins,
    Reject,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub duplicate_headers: DuplicateHeaders,
    pub max_request_bytes: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            duplicate_headers: DuplicateHeaders::default(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse_http_request_with(buf, &ParseOptions::default())
}

/// Parses one request from the front of `buf`.
///
/// On success returns the request and the number of bytes it occupied.
/// `Incomplete` means more bytes are needed; every other error is final.
pub fn parse_http_request_with(
    buf: &[u8],
    opts: &ParseOptions,
) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > opts.max_request_bytes => return Err(ParseError::TooLarge),
        None => return Err(ParseError::Incomplete),
    };
    if headers_end + 4 > opts.max_request_bytes {
        return Err(ParseError::TooLarge);
    }

    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes)
        .map_err(|_| ParseError::Malformed("request head is not valid UTF-8"))?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let &[method_str, path, version] = &parts[..] else {
        return Err(ParseError::Malformed("request line must have three tokens"));
    };

    if !version.starts_with("HTTP/") {
        return Err(ParseError::Malformed("bad protocol version"));
    }

    // Headers
    let mut headers = HashMap::new();

    for line in lines {
        let (key, value) = line
            .split_once(':')
            .ok_or(ParseError::Malformed("header line without colon"))?;

        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(ParseError::Malformed("bad header name"));
        }

        let key = key.to_ascii_lowercase();
        let value = value.trim().to_string();

        match headers.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match opts.duplicate_headers {
                DuplicateHeaders::LastWins => {
                    slot.insert(value);
                }
                DuplicateHeaders::FirstWins => {}
                DuplicateHeaders::Reject => {
                    return Err(ParseError::Malformed("duplicate header"));
                }
            },
        }
    }

    // Length is the only framing we understand
    if headers.contains_key("transfer-encoding") {
        return Err(ParseError::Malformed("transfer-encoding is not supported"));
    }

    let content_length = headers
        .get("content-length")
        .map(|v| {
            // usize::from_str would also take a leading '+'
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::Malformed("invalid content-length"));
            }
            v.parse::<usize>()
                .map_err(|_| ParseError::Malformed("invalid content-length"))
        })
        .transpose()?
        .unwrap_or(0);

    let total_consumed = headers_end
        .checked_add(4 + content_length)
        .ok_or(ParseError::TooLarge)?;
    if total_consumed > opts.max_request_bytes {
        return Err(ParseError::TooLarge);
    }

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let method = Method::from_token(method_str).ok_or(ParseError::UnknownMethod)?;

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body: body_bytes[..content_length].to_vec(),
    };

    Ok((request, total_consumed))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}
