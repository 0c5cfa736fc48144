//! Client configuration

/// Configuration for connecting to the upstream order service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (e.g., "https://orders.example.com/api/v1")
    pub base_url: String,

    /// Access token; the `Bearer ` prefix is optional
    pub token: String,

    /// Request timeout in seconds (covers connect and read)
    pub timeout: u64,

    /// Retry attempt ceiling for transient failures
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds, doubled per attempt
    pub base_retry_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub max_retry_delay_ms: u64,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: 60,
            max_retries: 4,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5_000,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the retry attempt ceiling
    pub fn with_max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    /// Set the backoff window
    pub fn with_retry_delays(mut self, base_ms: u64, cap_ms: u64) -> Self {
        self.base_retry_delay_ms = base_ms;
        self.max_retry_delay_ms = cap_ms;
        self
    }

    /// Authorization header value; tolerates tokens that already carry
    /// the scheme prefix
    pub fn auth_header(&self) -> String {
        let token = self.token.trim();
        if token.to_lowercase().starts_with("bearer ") {
            token.to_string()
        } else {
            format!("Bearer {token}")
        }
    }
}
