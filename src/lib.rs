//! Privacy-budgeted telemetry SDK.
//!
//! Converts boolean marketing signals into deniable randomized-response
//! reports, accounts epsilon spend against a per-UTC-day cap, and delivers
//! batched envelopes to a shuffle endpoint with backoff and circuit
//! breaking. Host capabilities (secure randomness, wall clock, HTTP,
//! visibility signals) enter through narrow traits so embeddings and tests
//! stay deterministic.

pub mod client;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod ldp;
pub mod logging;
pub mod pipeline;
pub mod random;
pub mod transport;

pub use client::{
    AnalyticsClient, ClientError, ConversionEvent, PresenceReport, SessionEvent,
    DEFAULT_CLIENT_BREAKER_COOLDOWN_MS, DEFAULT_CLIENT_BREAKER_THRESHOLD,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use clock::{epoch_ms, utc_day_key, Clock, SystemClock};
pub use config::{
    ClientConfig, ConfigError, EpsilonTable, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_PRESENCE_EPSILON_CAP,
};
pub use envelope::{EventEnvelope, EventKind, EventPayload, UploadBatch};
pub use ldp::budget::PresenceBudget;
pub use ldp::rr::{adjusted_probability, flip, prob_true, rr_bit, RandomizedResponse};
pub use logging::{LogEntry, LogLevel, SdkLogger};
pub use pipeline::{
    DeliveryPipeline, EnqueueOutcome, FlushOutcome, FlushReason, PipelineConfig, VisibilitySignal,
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CEILING_MS, DEFAULT_BREAKER_COOLDOWN_MS,
    DEFAULT_BREAKER_THRESHOLD, DEFAULT_FLUSH_JITTER_MS,
};
pub use random::{nonce_hex, sample_gate, OsRandom, RandomError, RandomSource, SharedRandom};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportRequest};
