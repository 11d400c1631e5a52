use thiserror::Error;

/// Default maximum number of envelopes per upload batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
/// Default windowed-flush interval.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 180_000;
/// Default daily epsilon cap for presence queries.
pub const DEFAULT_PRESENCE_EPSILON_CAP: f64 = 1.5;

/// Configuration rejected at configure time; never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ingestion endpoint must not be empty")]
    MissingEndpoint,
    #[error("upload token must not be empty")]
    MissingCredential,
}

/// Per-event-kind epsilon costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonTable {
    pub presence: f64,
    pub pageview: f64,
    pub session: f64,
    pub conversion: f64,
}

impl Default for EpsilonTable {
    fn default() -> Self {
        Self {
            presence: 0.5,
            pageview: 0.8,
            session: 0.6,
            conversion: 1.0,
        }
    }
}

/// Immutable SDK configuration; reconfiguring means building a new client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub site_id: String,
    pub endpoint: String,
    pub upload_token: String,
    pub sampling_rate: f64,
    pub epsilon: EpsilonTable,
    pub max_batch_size: usize,
    pub flush_interval_ms: u64,
    pub presence_epsilon_cap: f64,
    pub debug: bool,
}

impl ClientConfig {
    /// Creates a configuration with defaults merged in.
    pub fn new(
        site_id: impl Into<String>,
        endpoint: impl Into<String>,
        upload_token: impl Into<String>,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            endpoint: endpoint.into(),
            upload_token: upload_token.into(),
            sampling_rate: 1.0,
            epsilon: EpsilonTable::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            presence_epsilon_cap: DEFAULT_PRESENCE_EPSILON_CAP,
            debug: false,
        }
    }

    /// Global sampling rate, clamped into `[0, 1]`.
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_epsilon(mut self, epsilon: EpsilonTable) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    pub fn with_flush_interval_ms(mut self, interval_ms: u64) -> Self {
        self.flush_interval_ms = interval_ms;
        self
    }

    pub fn with_presence_epsilon_cap(mut self, cap: f64) -> Self {
        self.presence_epsilon_cap = cap;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Fatal validation applied once at configure time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.upload_token.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(())
    }
}
