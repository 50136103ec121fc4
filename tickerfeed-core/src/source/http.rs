//! Shared blocking HTTP plumbing for the adapters.
//!
//! Maps transport failures and non-success statuses onto [`SourceError`]. No
//! retries happen here; a failed request fails the page.

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::Duration;

use super::SourceError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = concat!("tickerfeed/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build the blocking client every adapter uses.
pub fn build_client(user_agent: &str) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(user_agent)
        .build()
        .map_err(|e| SourceError::Transport(format!("failed to build HTTP client: {e}")))
}

pub fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        SourceError::Transport(format!("connection failed: {e}"))
    } else {
        SourceError::Transport(e.to_string())
    }
}

/// Check the status and read the body as text.
pub fn read_text(resp: Response) -> Result<String, SourceError> {
    let resp = check_status(resp)?;
    resp.text().map_err(transport_error)
}

/// Check the status and read the body as bytes.
pub fn read_bytes(resp: Response) -> Result<Vec<u8>, SourceError> {
    let resp = check_status(resp)?;
    resp.bytes().map(|b| b.to_vec()).map_err(transport_error)
}

fn check_status(resp: Response) -> Result<Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(SourceError::RateLimited {
            status: status.as_u16(),
            retry_after_secs,
        });
    }

    let message = truncate(resp.text().unwrap_or_default());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Auth {
            status: status.as_u16(),
            message,
        });
    }

    Err(SourceError::Http {
        status: status.as_u16(),
        message,
    })
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> Response {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Response::from(builder.body(body).unwrap())
    }

    #[test]
    fn too_many_requests_is_rate_limited_with_hint() {
        let err = read_text(response(429, &[("retry-after", "30")], "slow down")).unwrap_err();
        assert!(matches!(
            err,
            SourceError::RateLimited {
                status: 429,
                retry_after_secs: Some(30)
            }
        ));
    }

    #[test]
    fn unparsable_retry_after_is_dropped() {
        let err = read_text(response(429, &[("retry-after", "soon")], "")).unwrap_err();
        assert!(matches!(
            err,
            SourceError::RateLimited {
                retry_after_secs: None,
                ..
            }
        ));
    }

    #[test]
    fn unauthorized_and_forbidden_are_auth_errors() {
        for status in [401, 403] {
            match read_text(response(status, &[], "invalid api key")) {
                Err(SourceError::Auth { status: s, message }) => {
                    assert_eq!(s, status);
                    assert_eq!(message, "invalid api key");
                }
                other => panic!("expected Auth for {status}, got {other:?}"),
            }
        }
    }

    #[test]
    fn other_failures_keep_status_and_body() {
        match read_bytes(response(500, &[], "upstream exploded")) {
            Err(SourceError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn success_returns_the_body() {
        assert_eq!(read_text(response(200, &[], "ok")).unwrap(), "ok");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let out = truncate(body);
        assert!(out.ends_with('…'));
        assert!(out.len() <= MAX_ERROR_BODY + '…'.len_utf8());
    }

    #[test]
    fn short_bodies_are_untouched() {
        assert_eq!(truncate("nope".into()), "nope");
    }
}
