//! OAuth authentication module for Twitter API integration.
//!
//! The service authenticates with a pre-issued OAuth 2.0 bearer token; this
//! module only knows how to present it.

/// Builds the Authorization header for OAuth 2.0 Bearer Token authentication.
///
/// # Parameters
///
/// - `access_token`: The bearer token from the Twitter Developer Portal
///
/// # Returns
///
/// A properly formatted Authorization header string.
///
/// # Example
///
/// ```rust
/// use twivility::build_bearer_auth_header;
///
/// let header = build_bearer_auth_header("your_access_token");
/// assert_eq!(header, "Bearer your_access_token");
/// ```
pub fn build_bearer_auth_header(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}
