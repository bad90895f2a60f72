//! Core Twitter API utilities.
//!
//! This module contains low-level helpers for making authenticated requests
//! to the Twitter API and turning non-success responses into errors.

use log::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Sanitizes text for safe logging by truncating and escaping control characters.
///
/// This function:
/// - Truncates long text to prevent log flooding
/// - Replaces control characters that could manipulate log output
/// - Escapes newlines to prevent log injection
///
/// # Parameters
///
/// - `text`: The text to sanitize
/// - `max_len`: Maximum length in characters before truncation
///
/// # Returns
///
/// A sanitized string safe for logging
pub(crate) fn sanitize_for_logging(text: &str, max_len: usize) -> String {
    let sanitized: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();

    if sanitized.chars().count() > max_len {
        let truncated: String = sanitized.chars().take(max_len).collect();
        format!(
            "{}... [truncated, {} total bytes]",
            truncated,
            text.len()
        )
    } else {
        sanitized
    }
}

/// Sends an authenticated request and returns the response if it succeeded.
///
/// # Parameters
///
/// - `request_builder`: A configured reqwest::RequestBuilder, Authorization header included
/// - `operation_name`: Human-readable name for the operation (for logging)
///
/// # Returns
///
/// - `Ok(Response)`: The response, with a 2xx status and its body still unread
/// - `Err(Error::Http)`: If the request could not be sent
/// - `Err(Error::Api)`: If the API answered with any other status
pub(crate) async fn send_authenticated(
    request_builder: reqwest::RequestBuilder,
    operation_name: &str,
) -> Result<reqwest::Response> {
    debug!(
        "Making authenticated request for operation: {}",
        operation_name
    );

    let response = request_builder.send().await?;
    let status = response.status();
    debug!(
        "Received response with status: {} for operation: {}",
        status, operation_name
    );

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        warn!(
            "Received 401 Unauthorized for operation '{}' - access token may be invalid or revoked",
            operation_name
        );
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(
            "Rate limited on operation '{}' - will retry on the next scheduled run",
            operation_name
        );
    }

    let error_text = response.text().await.unwrap_or_default();
    error!("Operation '{}' failed - Status: {}", operation_name, status);
    debug!(
        "Error response for '{}': {}",
        operation_name,
        sanitize_for_logging(&error_text, 200)
    );
    Err(Error::Api {
        operation: operation_name.to_string(),
        status: status.as_u16(),
    })
}

/// Sends an authenticated request and returns its body as text.
pub(crate) async fn fetch_text(
    request_builder: reqwest::RequestBuilder,
    operation_name: &str,
) -> Result<String> {
    let response = send_authenticated(request_builder, operation_name).await?;
    let response_text = response.text().await?;
    info!(
        "Operation '{}' completed successfully ({} bytes)",
        operation_name,
        response_text.len()
    );
    Ok(response_text)
}
