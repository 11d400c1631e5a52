use crate::envelope::{EventEnvelope, UploadBatch};
use crate::logging::SdkLogger;
use crate::random::{nonce_hex, RandomSource};
use crate::transport::{HttpTransport, TransportRequest};
use std::collections::VecDeque;

/// Default exponential-backoff base after a failed send.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
/// Default backoff ceiling (base doubled at most six times).
pub const DEFAULT_BACKOFF_CEILING_MS: u64 = 32_000;
/// Consecutive failures that open the pipeline circuit breaker.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 10;
/// How long the pipeline breaker suppresses sends once open.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 300_000;
/// Upper bound of the uniform jitter added to the flush deadline.
pub const DEFAULT_FLUSH_JITTER_MS: u64 = 250;
/// Batch nonce width in bytes.
const BATCH_NONCE_BYTES: usize = 16;

/// Delivery tunables; see `ClientConfig` for the user-facing subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub endpoint: String,
    pub upload_token: String,
    pub max_batch_size: usize,
    pub flush_interval_ms: u64,
    pub flush_jitter_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_ms: u64,
}

impl PipelineConfig {
    /// Creates a config with delivery defaults merged in.
    pub fn new(endpoint: impl Into<String>, upload_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            upload_token: upload_token.into(),
            max_batch_size: crate::config::DEFAULT_MAX_BATCH_SIZE,
            flush_interval_ms: crate::config::DEFAULT_FLUSH_INTERVAL_MS,
            flush_jitter_ms: DEFAULT_FLUSH_JITTER_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_ceiling_ms: DEFAULT_BACKOFF_CEILING_MS,
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            breaker_cooldown_ms: DEFAULT_BREAKER_COOLDOWN_MS,
        }
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    pub fn with_flush_interval_ms(mut self, interval_ms: u64) -> Self {
        self.flush_interval_ms = interval_ms;
        self
    }

    pub fn with_flush_jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.flush_jitter_ms = jitter_ms;
        self
    }

    pub fn with_backoff_base_ms(mut self, base_ms: u64) -> Self {
        self.backoff_base_ms = base_ms.max(1);
        self
    }

    pub fn with_breaker(mut self, threshold: u32, cooldown_ms: u64) -> Self {
        self.breaker_threshold = threshold.max(1);
        self.breaker_cooldown_ms = cooldown_ms;
        self
    }
}

/// Why a flush was attempted; recorded in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    BatchFull,
    Timer,
    Retry,
    VisibilityHidden,
    PageUnload,
    Manual,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::BatchFull => "batch_full",
            FlushReason::Timer => "timer",
            FlushReason::Retry => "retry",
            FlushReason::VisibilityHidden => "visibilitychange",
            FlushReason::PageUnload => "beforeunload",
            FlushReason::Manual => "manual",
        }
    }
}

/// Host visibility signals forwarded to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilitySignal {
    Hidden,
    Unload,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch was accepted by the endpoint.
    Sent { events: usize },
    /// Nothing buffered.
    Empty,
    /// A send is already in flight; the buffer was left untouched.
    InFlight,
    /// The breaker suppressed the attempt; no network call was made.
    BreakerOpen { until_ms: u64 },
    /// The transport failed; the batch was requeued (bounded) and a retry
    /// scheduled unless the breaker just opened.
    Failed {
        requeued: usize,
        dropped: usize,
        breaker_opened: bool,
        retry_at_ms: Option<u64>,
    },
}

/// Result of appending one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Buffered below the batch threshold; `wake_at_ms` is the armed flush
    /// deadline, if any.
    Buffered { wake_at_ms: Option<u64> },
    /// The buffer reached the batch size and an immediate flush ran.
    Flushed(FlushOutcome),
}

/// Batching event collector with backoff, circuit breaking, and bounded
/// requeue under sustained outage.
///
/// All state is owned by the instance; time is passed in as epoch
/// milliseconds so hosts and tests drive the timer explicitly. The single
/// `sending` flag serializes flush attempts — no two in-flight batches.
pub struct DeliveryPipeline<T: HttpTransport> {
    config: PipelineConfig,
    transport: T,
    rng: Box<dyn RandomSource>,
    logger: SdkLogger,
    buffer: VecDeque<EventEnvelope>,
    sending: bool,
    backoff_ms: u64,
    consecutive_failures: u32,
    breaker_until_ms: u64,
    wake_at_ms: Option<u64>,
    detached: bool,
}

impl<T: HttpTransport> DeliveryPipeline<T> {
    /// Creates an idle pipeline.
    pub fn new(
        config: PipelineConfig,
        transport: T,
        rng: Box<dyn RandomSource>,
        logger: SdkLogger,
    ) -> Self {
        let backoff_ms = config.backoff_base_ms;
        Self {
            config,
            transport,
            rng,
            logger,
            buffer: VecDeque::new(),
            sending: false,
            backoff_ms,
            consecutive_failures: 0,
            breaker_until_ms: 0,
            wake_at_ms: None,
            detached: false,
        }
    }

    /// Number of envelopes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Armed flush/retry deadline, if any.
    pub fn wake_at_ms(&self) -> Option<u64> {
        self.wake_at_ms
    }

    /// Breaker deadline while the breaker is open.
    pub fn breaker_until_ms(&self) -> Option<u64> {
        (self.breaker_until_ms > 0).then_some(self.breaker_until_ms)
    }

    /// Consecutive failed sends since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Recent log entries emitted by the pipeline.
    pub fn logger(&self) -> &SdkLogger {
        &self.logger
    }

    /// Appends an envelope; a full buffer triggers an immediate flush that
    /// bypasses the timer, otherwise the flush deadline is armed with
    /// uniform jitter to desynchronize concurrent clients.
    pub fn enqueue(&mut self, envelope: EventEnvelope, now_ms: u64) -> EnqueueOutcome {
        self.buffer.push_back(envelope);
        if self.buffer.len() >= self.config.max_batch_size {
            return EnqueueOutcome::Flushed(self.flush(FlushReason::BatchFull, now_ms));
        }
        // Armed even while the breaker is open: a deadline firing early is
        // suppressed by the flush guard and stays armed, so buffered
        // envelopes are retried once the cooldown passes.
        if self.wake_at_ms.is_none() && !self.detached {
            let unit = self.rng.next_float().unwrap_or(0.0);
            let jitter = (unit * self.config.flush_jitter_ms as f64) as u64;
            self.wake_at_ms = Some(now_ms + self.config.flush_interval_ms + jitter);
        }
        EnqueueOutcome::Buffered {
            wake_at_ms: self.wake_at_ms,
        }
    }

    /// Fires the armed deadline once due; returns `None` when nothing is due.
    pub fn tick(&mut self, now_ms: u64) -> Option<FlushOutcome> {
        match self.wake_at_ms {
            Some(deadline) if now_ms >= deadline => {
                let reason = if self.consecutive_failures > 0 {
                    FlushReason::Retry
                } else {
                    FlushReason::Timer
                };
                Some(self.flush(reason, now_ms))
            }
            _ => None,
        }
    }

    /// Best-effort flush on page-hidden / page-unload; ignored once the
    /// pipeline has been destroyed.
    pub fn handle_visibility(&mut self, signal: VisibilitySignal, now_ms: u64) -> FlushOutcome {
        if self.detached {
            return FlushOutcome::Empty;
        }
        let reason = match signal {
            VisibilitySignal::Hidden => FlushReason::VisibilityHidden,
            VisibilitySignal::Unload => FlushReason::PageUnload,
        };
        self.flush(reason, now_ms)
    }

    /// Detaches from host signals and cancels the pending deadline. Does not
    /// flush.
    pub fn destroy(&mut self) {
        self.detached = true;
        self.wake_at_ms = None;
    }

    /// Detaches the whole buffer as one batch and attempts transport.
    pub fn flush(&mut self, reason: FlushReason, now_ms: u64) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }
        if self.sending {
            return FlushOutcome::InFlight;
        }
        if now_ms < self.breaker_until_ms {
            return FlushOutcome::BreakerOpen {
                until_ms: self.breaker_until_ms,
            };
        }
        self.wake_at_ms = None;
        self.sending = true;
        let batch: Vec<EventEnvelope> = self.buffer.drain(..).collect();
        let events = batch.len();
        let result = self.send_batch(&batch);
        self.sending = false;
        match result {
            Ok(()) => {
                self.backoff_ms = self.config.backoff_base_ms;
                self.consecutive_failures = 0;
                self.logger.debug(
                    now_ms,
                    format!("flushed {events} events (reason: {})", reason.as_str()),
                );
                FlushOutcome::Sent { events }
            }
            Err(err) => {
                let (requeued, dropped) = self.requeue_bounded(batch);
                self.consecutive_failures += 1;
                let delay = self.backoff_ms;
                self.backoff_ms = (self.backoff_ms * 2).min(self.config.backoff_ceiling_ms);
                let breaker_opened = self.consecutive_failures >= self.config.breaker_threshold;
                let retry_at_ms = if breaker_opened {
                    self.breaker_until_ms = now_ms + self.config.breaker_cooldown_ms;
                    self.logger.warn(
                        now_ms,
                        format!(
                            "circuit breaker opened after {} failures, suppressed until {}",
                            self.consecutive_failures, self.breaker_until_ms
                        ),
                    );
                    None
                } else {
                    self.logger.warn(
                        now_ms,
                        format!("flush failed ({err}), retrying in {delay} ms"),
                    );
                    let deadline = now_ms + delay;
                    self.wake_at_ms = Some(deadline);
                    Some(deadline)
                };
                FlushOutcome::Failed {
                    requeued,
                    dropped,
                    breaker_opened,
                    retry_at_ms,
                }
            }
        }
    }

    fn send_batch(&mut self, batch: &[EventEnvelope]) -> Result<(), String> {
        let upload = UploadBatch {
            token: self.config.upload_token.clone(),
            nonce: nonce_hex(self.rng.as_mut(), BATCH_NONCE_BYTES)
                .map_err(|err| err.to_string())?,
            batch: batch.to_vec(),
        };
        let body = serde_json::to_string(&upload).map_err(|err| err.to_string())?;
        let request = TransportRequest {
            endpoint: self.config.endpoint.clone(),
            bearer_token: self.config.upload_token.clone(),
            body,
        };
        self.transport
            .post_json(&request)
            .map_err(|err| err.to_string())
    }

    // Re-prepends a failed batch, keeping at most `max_batch_size` newest
    // entries so sustained outage cannot grow memory without bound.
    fn requeue_bounded(&mut self, mut batch: Vec<EventEnvelope>) -> (usize, usize) {
        let max = self.config.max_batch_size;
        let dropped = batch.len().saturating_sub(max);
        if dropped > 0 {
            batch.drain(..dropped);
        }
        let requeued = batch.len();
        for envelope in batch.into_iter().rev() {
            self.buffer.push_front(envelope);
        }
        (requeued, dropped)
    }
}
