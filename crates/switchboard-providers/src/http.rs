use reqwest::Client;
use std::time::Duration;
use switchboard_core::Result;

/// Longest upstream error body kept in error messages.
const MAX_DETAIL_CHARS: usize = 200;

/// Builds an HTTP client with a whole-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Shortens an upstream error body for logs and error messages.
pub(crate) fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_owned();
    }
    let mut summary: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    summary.push_str("...");
    summary
}
