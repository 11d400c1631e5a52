use crate::clock::{epoch_ms, utc_day_key, Clock, SystemClock};
use crate::config::{ClientConfig, ConfigError};
use crate::envelope::{EventEnvelope, EventKind, EventPayload};
use crate::ldp::budget::PresenceBudget;
use crate::ldp::rr::{rr_bit, RandomizedResponse};
use crate::logging::SdkLogger;
use crate::pipeline::{
    DeliveryPipeline, EnqueueOutcome, FlushOutcome, FlushReason, PipelineConfig, VisibilitySignal,
};
use crate::random::{nonce_hex, sample_gate, OsRandom, RandomError, RandomSource, SharedRandom};
use crate::transport::{HttpTransport, ReqwestTransport};
use std::time::Duration;
use thiserror::Error;

/// Bounded timeout applied to each ingestion POST.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 20_000;
/// Consecutive failed flush outcomes that open the facade breaker.
pub const DEFAULT_CLIENT_BREAKER_THRESHOLD: u32 = 5;
/// How long the facade breaker rejects submissions once open.
pub const DEFAULT_CLIENT_BREAKER_COOLDOWN_MS: u64 = 60_000;
/// Envelope nonce width in bytes.
const ENVELOPE_NONCE_BYTES: usize = 16;

/// Errors surfaced by the client facade.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Submissions are temporarily suppressed; distinct from `Config` so
    /// callers can tell "not configured" from "temporarily suppressed".
    #[error("submissions suppressed until {until_ms} (epoch ms)")]
    BreakerOpen { until_ms: u64 },
    #[error(transparent)]
    Random(#[from] RandomError),
    #[error("transport construction failed: {0}")]
    Transport(String),
}

/// Session report fields, bucketed client-side before privatization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub referrer_bucket: String,
    pub engagement_bucket: String,
}

/// Conversion report fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionEvent {
    pub conversion_type: String,
}

/// What the accountant released for today's presence fact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceReport {
    pub bit: u8,
    pub epsilon: f64,
    pub p: f64,
    pub q: f64,
    pub variance: f64,
}

// Submission gate owned by the facade, independent of the pipeline's
// retry-suppression breaker.
#[derive(Debug, Clone, Copy)]
struct FacadeBreaker {
    threshold: u32,
    cooldown_ms: u64,
    consecutive_failures: u32,
    open_until_ms: u64,
}

impl FacadeBreaker {
    fn new(threshold: u32, cooldown_ms: u64) -> Self {
        Self {
            threshold,
            cooldown_ms,
            consecutive_failures: 0,
            open_until_ms: 0,
        }
    }

    fn guard(&self, now_ms: u64) -> Result<(), ClientError> {
        if now_ms < self.open_until_ms {
            return Err(ClientError::BreakerOpen {
                until_ms: self.open_until_ms,
            });
        }
        Ok(())
    }

    fn record_failure(&mut self, now_ms: u64) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.open_until_ms = now_ms + self.cooldown_ms;
            return true;
        }
        false
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.open_until_ms = 0;
    }
}

/// Configured SDK instance owning the pipeline, the budget accountant, and
/// all capability seams. One instance per embedding; no global state.
pub struct AnalyticsClient<T: HttpTransport> {
    config: ClientConfig,
    pipeline: DeliveryPipeline<T>,
    budget: PresenceBudget,
    rng: SharedRandom,
    clock: Box<dyn Clock>,
    logger: SdkLogger,
    breaker: FacadeBreaker,
}

impl AnalyticsClient<ReqwestTransport> {
    /// Validates the configuration and wires the default host capabilities
    /// (OS randomness, system clock, blocking HTTP).
    pub fn configure(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Self::with_parts(
            config,
            transport,
            Box::new(OsRandom),
            Box::new(SystemClock),
        )
    }
}

impl<T: HttpTransport> AnalyticsClient<T> {
    /// Builds a client from explicit capability implementations.
    pub fn with_parts(
        config: ClientConfig,
        transport: T,
        rng: Box<dyn RandomSource>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        // One injected source feeds both the facade draws and the
        // pipeline's jitter and batch nonces.
        let rng = SharedRandom::new(rng);
        let pipeline_config = PipelineConfig::new(&config.endpoint, &config.upload_token)
            .with_max_batch_size(config.max_batch_size)
            .with_flush_interval_ms(config.flush_interval_ms);
        let pipeline = DeliveryPipeline::new(
            pipeline_config,
            transport,
            Box::new(rng.clone()),
            SdkLogger::new(config.debug),
        );
        let budget = PresenceBudget::new(config.presence_epsilon_cap);
        let mut logger = SdkLogger::new(config.debug);
        logger.debug(epoch_ms(clock.now()), format!("configured site {}", config.site_id));
        Ok(Self {
            config,
            pipeline,
            budget,
            rng,
            clock,
            logger,
            breaker: FacadeBreaker::new(
                DEFAULT_CLIENT_BREAKER_THRESHOLD,
                DEFAULT_CLIENT_BREAKER_COOLDOWN_MS,
            ),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Envelopes queued but not yet delivered.
    pub fn pending_events(&self) -> usize {
        self.pipeline.buffered()
    }

    /// Recent facade log entries.
    pub fn logger(&self) -> &SdkLogger {
        &self.logger
    }

    /// Recent pipeline log entries.
    pub fn pipeline_logger(&self) -> &SdkLogger {
        self.pipeline.logger()
    }

    /// Reports a privatized pageview. `Ok(false)` means the sampling gate
    /// dropped the event; `Ok(true)` means it was queued, not delivered.
    pub fn record_pageview(&mut self) -> Result<bool, ClientError> {
        let now_ms = epoch_ms(self.clock.now());
        self.breaker.guard(now_ms)?;
        if !sample_gate(&mut self.rng, self.config.sampling_rate)? {
            return Ok(false);
        }
        let response = self.draw(self.config.epsilon.pageview)?;
        let payload = EventPayload::Pageview { response };
        self.submit(EventKind::Pageviews, payload, self.config.epsilon.pageview)?;
        Ok(true)
    }

    /// Reports a privatized session event.
    pub fn record_session(&mut self, event: SessionEvent) -> Result<bool, ClientError> {
        let now_ms = epoch_ms(self.clock.now());
        self.breaker.guard(now_ms)?;
        if !sample_gate(&mut self.rng, self.config.sampling_rate)? {
            return Ok(false);
        }
        let response = self.draw(self.config.epsilon.session)?;
        let payload = EventPayload::Session {
            referrer_bucket: event.referrer_bucket,
            engagement_bucket: event.engagement_bucket,
            response,
        };
        self.submit(EventKind::Sessions, payload, self.config.epsilon.session)?;
        Ok(true)
    }

    /// Reports a privatized conversion event.
    pub fn record_conversion(&mut self, event: ConversionEvent) -> Result<bool, ClientError> {
        let now_ms = epoch_ms(self.clock.now());
        self.breaker.guard(now_ms)?;
        if !sample_gate(&mut self.rng, self.config.sampling_rate)? {
            return Ok(false);
        }
        let response = self.draw(self.config.epsilon.conversion)?;
        let payload = EventPayload::Conversion {
            conversion_type: event.conversion_type,
            response,
        };
        self.submit(
            EventKind::Conversions,
            payload,
            self.config.epsilon.conversion,
        )?;
        Ok(true)
    }

    /// Reports today's presence bit through the budget accountant.
    ///
    /// `Ok(None)` means the daily budget is exhausted; nothing is queued.
    /// Repeat same-day calls reuse the memoized draw.
    pub fn report_presence(&mut self) -> Result<Option<PresenceReport>, ClientError> {
        let now = self.clock.now();
        let now_ms = epoch_ms(now);
        self.breaker.guard(now_ms)?;
        let epsilon = self.config.epsilon.presence;
        let response = self.budget.query(
            now,
            &mut self.rng,
            epsilon,
            self.config.sampling_rate,
        )?;
        let Some(response) = response else {
            self.logger.warn(
                now_ms,
                format!(
                    "presence budget exhausted ({} spent of {})",
                    self.budget.spent(now),
                    self.budget.cap()
                ),
            );
            return Ok(None);
        };
        let payload = EventPayload::Presence {
            day: utc_day_key(now),
            response,
        };
        self.submit(EventKind::Uniques, payload, epsilon)?;
        Ok(Some(PresenceReport {
            bit: response.bit,
            epsilon,
            p: response.p,
            q: response.q,
            variance: response.variance,
        }))
    }

    /// Manual flush; breaker-guarded like submissions.
    pub fn flush(&mut self) -> Result<FlushOutcome, ClientError> {
        let now_ms = epoch_ms(self.clock.now());
        self.breaker.guard(now_ms)?;
        let outcome = self.pipeline.flush(FlushReason::Manual, now_ms);
        self.observe(outcome, now_ms);
        Ok(outcome)
    }

    /// Drives the pipeline's flush/retry deadline; hosts call this from
    /// their timer glue. Returns `None` when nothing was due.
    pub fn tick(&mut self) -> Option<FlushOutcome> {
        let now_ms = epoch_ms(self.clock.now());
        let outcome = self.pipeline.tick(now_ms)?;
        self.observe(outcome, now_ms);
        Some(outcome)
    }

    /// Forwards a host visibility signal for a best-effort flush.
    pub fn handle_visibility(&mut self, signal: VisibilitySignal) -> FlushOutcome {
        let now_ms = epoch_ms(self.clock.now());
        let outcome = self.pipeline.handle_visibility(signal, now_ms);
        self.observe(outcome, now_ms);
        outcome
    }

    /// Detaches the pipeline from host signals without flushing.
    pub fn shutdown(&mut self) {
        self.pipeline.destroy();
    }

    fn draw(&mut self, epsilon: f64) -> Result<RandomizedResponse, ClientError> {
        Ok(rr_bit(
            &mut self.rng,
            true,
            epsilon,
            self.config.sampling_rate,
        )?)
    }

    fn submit(
        &mut self,
        kind: EventKind,
        payload: EventPayload,
        epsilon_used: f64,
    ) -> Result<(), ClientError> {
        let now = self.clock.now();
        let now_ms = epoch_ms(now);
        let envelope = EventEnvelope {
            site_id: self.config.site_id.clone(),
            kind,
            payload,
            epsilon_used,
            sampling_rate: self.config.sampling_rate,
            client_timestamp: now.to_rfc3339(),
            nonce: nonce_hex(&mut self.rng, ENVELOPE_NONCE_BYTES)?,
        };
        self.logger
            .debug(now_ms, format!("queued {} event", kind.as_str()));
        if let EnqueueOutcome::Flushed(outcome) = self.pipeline.enqueue(envelope, now_ms) {
            self.observe(outcome, now_ms);
        }
        Ok(())
    }

    // Feeds pipeline outcomes into the facade-level breaker.
    fn observe(&mut self, outcome: FlushOutcome, now_ms: u64) {
        match outcome {
            FlushOutcome::Sent { .. } => self.breaker.record_success(),
            FlushOutcome::Failed { .. } => {
                if self.breaker.record_failure(now_ms) {
                    self.logger.warn(
                        now_ms,
                        format!(
                            "client breaker opened, rejecting submissions until {}",
                            self.breaker.open_until_ms
                        ),
                    );
                }
            }
            _ => {}
        }
    }
}
