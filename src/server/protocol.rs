//! Newline-delimited text protocol.
//!
//! Each request is one line: `<resource> <key>`, or just `<key>` to use the
//! default rule, or `PING`. A lone `PING` is always the liveness check, so a
//! key spelled `PING` must be sent with a resource. Each answer is one line:
//!
//! ```text
//! OK
//! LIMITED <retry_after_ms>
//! PONG
//! ERR <message>
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A parsed request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Liveness check
    Ping,
    /// Admission check for `key`, optionally under a named resource
    Check {
        resource: Option<&'a str>,
        key: &'a str,
    },
}

/// Errors in a request line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,
    #[error("expected '<resource> <key>', got {0} fields")]
    TooManyFields(usize),
}

/// A response line, without its terminating newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Limited(Duration),
    Pong,
    Error(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Limited(retry_after) => write!(f, "LIMITED {}", retry_after.as_millis()),
            Response::Pong => write!(f, "PONG"),
            Response::Error(message) => write!(f, "ERR {}", message),
        }
    }
}

/// Parse one request line. Surrounding whitespace, including a trailing
/// `\r`, is ignored.
pub fn parse_request(line: &str) -> Result<Request<'_>, ProtocolError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields[..] {
        [] => Err(ProtocolError::Empty),
        ["PING"] => Ok(Request::Ping),
        [key] => Ok(Request::Check {
            resource: None,
            key,
        }),
        [resource, key] => Ok(Request::Check {
            resource: Some(resource),
            key,
        }),
        _ => Err(ProtocolError::TooManyFields(fields.len())),
    }
}
