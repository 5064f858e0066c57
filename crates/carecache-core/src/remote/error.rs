use reqwest::StatusCode;
use thiserror::Error;

/// Failure of the remote document store.
///
/// The one error class the cache never swallows: it reaches the caller
/// unchanged and no cache population or invalidation happens for the call.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// 403: signed in, but this account may not read or write the document.
    #[error("Not permitted by the school's access rules: {0}")]
    AccessDenied(String),

    /// 401: no session, or the session token has lapsed.
    #[error("Not signed in or session expired")]
    Unauthorized,

    #[error("Document not found: {0}")]
    NotFound(String),

    /// Still 429 after every backoff retry.
    #[error("Document API is rate limiting requests")]
    RateLimited,

    #[error("Document API failed: {0}")]
    ServerError(String),

    #[error("Could not reach the document API: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response arrived but does not fit the expected document shape.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Rejected before sending: bad base URL or an unencodable body.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Longest slice of a response body kept in an error, in bytes.
const BODY_EXCERPT_BYTES: usize = 500;

/// Cut `body` to at most [`BODY_EXCERPT_BYTES`] without splitting a character.
fn body_excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_BYTES {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

impl RemoteError {
    /// Error for a non-success `status`, keeping an excerpt of the body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::FORBIDDEN => Self::AccessDenied(body_excerpt(body)),
            StatusCode::NOT_FOUND => Self::NotFound(body_excerpt(body)),
            s if s.is_server_error() => Self::ServerError(body_excerpt(body)),
            s => Self::InvalidResponse(format!("Status {}: {}", s, body_excerpt(body))),
        }
    }
}
