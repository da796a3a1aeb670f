//! Error taxonomy and response checks shared by the generation service clients.

/// HTTP status code for rate limiting.
const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// HTTP status code for bad request (often content policy).
const HTTP_STATUS_BAD_REQUEST: u16 = 400;

/// HTTP status code for forbidden (content policy violation).
const HTTP_STATUS_FORBIDDEN: u16 = 403;

/// Gateway statuses that usually clear up on their own (502, 503, 504).
const HTTP_STATUS_UNAVAILABLE: std::ops::RangeInclusive<u16> = 502..=504;

/// Keywords that indicate a content policy violation in error messages.
const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "policy violation",
    "inappropriate",
    "not allowed",
    "prohibited",
    "blocked",
    "unsafe",
    "violates",
    "moderation",
    "nsfw",
];

/// Check if an error message indicates a content policy violation.
pub fn is_content_policy_error(error_text: &str) -> bool {
    let lower = error_text.to_lowercase();
    CONTENT_POLICY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

/// Turn a non-success response into the matching [`ServiceError`].
///
/// Successful responses are handed back untouched so callers can keep
/// chaining (`check_response(..).await?.json().await?`).
///
/// # Errors
///
/// - `ServiceError::RateLimit` for 429, carrying the Retry-After seconds
/// - `ServiceError::ContentPolicyViolation` for 400/403 whose body mentions policy
/// - `ServiceError::ServerUnavailable` for 502/503/504, retried like network errors
/// - `ServiceError::Api` for every other non-2xx status
pub async fn check_response(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
        let retry_after_secs = crate::retry::parse_retry_after(&response);
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Rate limit exceeded".to_string());
        log::warn!(
            "Rate limited by {}. Retry-After: {:?} seconds",
            service,
            retry_after_secs
        );
        return Err(ServiceError::RateLimit {
            message,
            retry_after_secs,
        });
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if (status.as_u16() == HTTP_STATUS_BAD_REQUEST || status.as_u16() == HTTP_STATUS_FORBIDDEN)
        && is_content_policy_error(&error_text)
    {
        log::warn!("Request rejected by {} content policy: {}", service, error_text);
        return Err(ServiceError::ContentPolicyViolation {
            message: error_text,
        });
    }

    if HTTP_STATUS_UNAVAILABLE.contains(&status.as_u16()) {
        log::warn!("{} unavailable ({}): {}", service, status, error_text);
        return Err(ServiceError::ServerUnavailable(format!(
            "{} returned {}: {}",
            service, status, error_text
        )));
    }

    Err(ServiceError::Api(format!(
        "{} request failed with status {}: {}",
        service, status, error_text
    )))
}

impl ServiceError {
    /// True for failures worth retrying under the network budget: connection
    /// problems, timeouts, and 502/503/504 responses.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(e) => crate::retry::is_transient_network_error(e),
            ServiceError::ServerUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Build the HTTP client every service uses.
pub fn http_client(
    timeout: std::time::Duration,
    connect_timeout: std::time::Duration,
) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()?)
}

/// Errors that can occur while talking to a generation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("API key not configured (set {env})")]
    MissingApiKey {
        /// Environment variable that would supply the key
        env: &'static str,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Generation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limited: {message}")]
    RateLimit {
        /// Human-readable rate limit message
        message: String,
        /// Retry-After header value in seconds, if provided
        retry_after_secs: Option<u64>,
    },

    #[error("Network error: {message} (after {attempts} attempts)")]
    NetworkError {
        /// Human-readable network error message
        message: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    #[error("Content policy violation: {message}")]
    ContentPolicyViolation {
        /// Human-readable explanation of the policy violation
        message: String,
    },

    #[error("Empty prompt")]
    EmptyPrompt,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Service unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_policy_keywords_case_insensitive() {
        assert!(is_content_policy_error("Prompt VIOLATES our Content Policy"));
        assert!(is_content_policy_error("nsfw detected"));
        assert!(!is_content_policy_error("invalid field: prompt"));
    }

    #[test]
    fn test_missing_api_key_names_env_var() {
        let err = ServiceError::MissingApiKey {
            env: "OPENAI_API_KEY",
        };
        assert_eq!(
            err.to_string(),
            "API key not configured (set OPENAI_API_KEY)"
        );
    }

    #[test]
    fn test_server_unavailable_is_transient() {
        assert!(ServiceError::ServerUnavailable("down".to_string()).is_transient());
        assert!(!ServiceError::Api("bad".to_string()).is_transient());
        assert!(!ServiceError::Interrupted.is_transient());
    }

    #[test]
    fn test_network_error_display() {
        let error = ServiceError::NetworkError {
            message: "Connection refused".to_string(),
            attempts: 3,
        };
        assert_eq!(
            error.to_string(),
            "Network error: Connection refused (after 3 attempts)"
        );
    }
}
