// src/crawl/classify.rs
// =============================================================================
// This module turns a raw fetch result into exactly one FetchOutcome.
//
// Decision order:
// 1. Transport failed            -> TransportError
// 2. HTTP 429 Too Many Requests  -> RateLimited
// 3. JSON content-type           -> parse as an item array
//                                   ok  -> Success(page)
//                                   bad -> FormatError
// 4. Anything else               -> FormatError
//
// The classifier never panics and never returns an error. A body that
// makes no sense is an outcome like any other.
// =============================================================================

use reqwest::StatusCode;

use super::fetcher::RawReply;
use crate::model::Page;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A page of items
    Success(Page),
    /// The server asked us to slow down
    RateLimited,
    /// The request never produced a response
    TransportError(String),
    /// A response arrived but was not an item array
    FormatError { cause: String, body: String },
}

impl FetchOutcome {
    // Transient outcomes are retried at the same offset
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchOutcome::RateLimited | FetchOutcome::TransportError(_))
    }
}

pub fn classify(reply: &Result<RawReply, String>) -> FetchOutcome {
    let reply = match reply {
        Ok(reply) => reply,
        Err(cause) => return FetchOutcome::TransportError(cause.clone()),
    };

    if reply.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return FetchOutcome::RateLimited;
    }

    if !reply.content_type().is_some_and(is_json_content_type) {
        return FetchOutcome::FormatError {
            cause: match reply.content_type() {
                Some(ct) => format!("not json response (HTTP {}, content-type {})", reply.status, ct),
                None => format!("not json response (HTTP {}, no content-type)", reply.status),
            },
            body: String::from_utf8_lossy(&reply.body).into_owned(),
        };
    }

    match serde_json::from_slice::<Page>(&reply.body) {
        Ok(page) => FetchOutcome::Success(page),
        Err(e) => FetchOutcome::FormatError {
            cause: format!("malformed item array (HTTP {}): {}", reply.status, e),
            body: String::from_utf8_lossy(&reply.body).into_owned(),
        },
    }
}

// "application/json", "application/json; charset=utf-8", "application/problem+json"
fn is_json_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
