mod support;

use ldp_analytics::{
    DeliveryPipeline, EnqueueOutcome, FlushOutcome, FlushReason, LogLevel, PipelineConfig,
    SdkLogger, TransportError,
};
use support::{envelope, failing, mock_transport, ScriptedRandom};

fn pipeline_with(
    config: PipelineConfig,
    responses: Vec<Result<(), TransportError>>,
    floats: Vec<f64>,
) -> (
    DeliveryPipeline<support::MockTransport>,
    std::rc::Rc<std::cell::RefCell<support::MockState>>,
) {
    let (transport, state) = mock_transport(responses);
    let pipeline = DeliveryPipeline::new(
        config,
        transport,
        Box::new(ScriptedRandom::new(floats)),
        SdkLogger::new(true),
    );
    (pipeline, state)
}

fn base_config() -> PipelineConfig {
    PipelineConfig::new("https://ingest.example/api/shuffle", "tok-upload").with_max_batch_size(10)
}

#[test]
fn failed_batch_is_requeued_and_backoff_doubles() {
    let (mut pipeline, _state) = pipeline_with(base_config(), failing(3), vec![0.0]);
    pipeline.enqueue(envelope(0), 1_000);
    pipeline.enqueue(envelope(1), 1_000);

    let first = pipeline.flush(FlushReason::Manual, 10_000);
    assert_eq!(
        first,
        FlushOutcome::Failed {
            requeued: 2,
            dropped: 0,
            breaker_opened: false,
            retry_at_ms: Some(10_500),
        }
    );
    assert_eq!(pipeline.buffered(), 2, "failed batch returns to the buffer");

    let second = pipeline.flush(FlushReason::Manual, 11_000);
    assert_eq!(
        second,
        FlushOutcome::Failed {
            requeued: 2,
            dropped: 0,
            breaker_opened: false,
            retry_at_ms: Some(12_000),
        },
        "backoff doubles after each consecutive failure"
    );
    let third = pipeline.flush(FlushReason::Manual, 13_000);
    assert_eq!(
        third,
        FlushOutcome::Failed {
            requeued: 2,
            dropped: 0,
            breaker_opened: false,
            retry_at_ms: Some(15_000),
        }
    );
}

#[test]
fn success_resets_backoff_and_failure_count() {
    let mut responses = failing(2);
    responses.push(Ok(()));
    responses.extend(failing(1));
    let (mut pipeline, _state) = pipeline_with(base_config(), responses, vec![0.0, 0.0]);

    pipeline.enqueue(envelope(0), 1_000);
    pipeline.flush(FlushReason::Manual, 1_000);
    pipeline.flush(FlushReason::Manual, 2_000);
    assert_eq!(pipeline.consecutive_failures(), 2);

    assert_eq!(
        pipeline.flush(FlushReason::Manual, 3_000),
        FlushOutcome::Sent { events: 1 }
    );
    assert_eq!(pipeline.consecutive_failures(), 0);

    pipeline.enqueue(envelope(1), 4_000);
    assert_eq!(
        pipeline.flush(FlushReason::Manual, 5_000),
        FlushOutcome::Failed {
            requeued: 1,
            dropped: 0,
            breaker_opened: false,
            retry_at_ms: Some(5_500),
        },
        "delay must restart from the base after a success"
    );
}

#[test]
fn requeue_is_bounded_to_the_batch_size() {
    let config = base_config().with_max_batch_size(5).with_breaker(3, 60_000);
    let (mut pipeline, state) = pipeline_with(config, failing(4), vec![0.0, 0.0]);

    // Open the breaker first so the buffer can grow past the batch size.
    pipeline.enqueue(envelope(100), 1_000);
    for attempt in 0..3u64 {
        pipeline.flush(FlushReason::Manual, 1_000 + attempt);
    }
    assert!(pipeline.breaker_until_ms().is_some());
    for i in 0..7 {
        // Full-buffer flush attempts are suppressed while the breaker is open.
        let outcome = pipeline.enqueue(envelope(i), 2_000);
        if pipeline.buffered() >= 5 {
            assert!(matches!(
                outcome,
                EnqueueOutcome::Flushed(FlushOutcome::BreakerOpen { .. })
            ));
        }
    }
    assert_eq!(pipeline.buffered(), 8);

    // Past the breaker deadline the oversized batch fails once more and is
    // requeued bounded, dropping the oldest excess. The failure count is
    // still past the threshold, so the breaker re-opens.
    let outcome = pipeline.flush(FlushReason::Manual, 70_000);
    assert_eq!(
        outcome,
        FlushOutcome::Failed {
            requeued: 5,
            dropped: 3,
            breaker_opened: true,
            retry_at_ms: None,
        }
    );
    assert_eq!(pipeline.breaker_until_ms(), Some(130_000));
    assert_eq!(pipeline.buffered(), 5);
    let requests = state.borrow().requests.len();
    assert_eq!(requests, 4);
}

#[test]
fn envelopes_enqueued_while_breaker_open_flush_after_cooldown() {
    let config = base_config()
        .with_breaker(3, 60_000)
        .with_flush_interval_ms(30_000);
    let (mut pipeline, state) = pipeline_with(config, failing(3), vec![0.0, 0.0]);
    pipeline.enqueue(envelope(0), 1_000);
    for attempt in 0..3u64 {
        pipeline.flush(FlushReason::Manual, 1_000 + attempt);
    }
    assert_eq!(pipeline.breaker_until_ms(), Some(61_002));
    assert_eq!(
        pipeline.wake_at_ms(),
        None,
        "breaker opening schedules no retry"
    );

    // Enqueues during the cooldown still arm the flush timer.
    let outcome = pipeline.enqueue(envelope(1), 10_000);
    assert_eq!(
        outcome,
        EnqueueOutcome::Buffered {
            wake_at_ms: Some(40_000)
        }
    );

    // A deadline firing inside the cooldown is suppressed but stays armed.
    assert_eq!(
        pipeline.tick(40_000),
        Some(FlushOutcome::BreakerOpen { until_ms: 61_002 })
    );
    assert_eq!(pipeline.wake_at_ms(), Some(40_000));
    assert_eq!(pipeline.buffered(), 2);
    assert_eq!(state.borrow().requests.len(), 3);

    // Past the cooldown the armed deadline delivers the stranded buffer.
    assert_eq!(pipeline.tick(61_002), Some(FlushOutcome::Sent { events: 2 }));
    assert_eq!(pipeline.buffered(), 0);
    assert_eq!(state.borrow().requests.len(), 4);
}

#[test]
fn ten_failures_open_the_breaker_and_suppress_sends() {
    let (mut pipeline, state) = pipeline_with(base_config(), failing(10), vec![0.0]);
    pipeline.enqueue(envelope(0), 0);

    let mut last = FlushOutcome::Empty;
    for attempt in 0..10u64 {
        last = pipeline.flush(FlushReason::Manual, attempt * 40_000);
    }
    assert_eq!(
        last,
        FlushOutcome::Failed {
            requeued: 1,
            dropped: 0,
            breaker_opened: true,
            retry_at_ms: None,
        }
    );
    let opened_at = 9 * 40_000;
    assert_eq!(pipeline.breaker_until_ms(), Some(opened_at + 300_000));
    assert_eq!(state.borrow().requests.len(), 10);

    // Before the deadline: no network call, buffer length unchanged.
    let suppressed = pipeline.flush(FlushReason::Manual, opened_at + 299_999);
    assert_eq!(
        suppressed,
        FlushOutcome::BreakerOpen {
            until_ms: opened_at + 300_000
        }
    );
    assert_eq!(state.borrow().requests.len(), 10);
    assert_eq!(pipeline.buffered(), 1);

    // Past the deadline the next attempt goes out again (script exhausted,
    // the mock answers 2xx).
    assert_eq!(
        pipeline.flush(FlushReason::Manual, opened_at + 300_000),
        FlushOutcome::Sent { events: 1 }
    );
    assert_eq!(pipeline.buffered(), 0);

    let warned = pipeline
        .logger()
        .recent()
        .any(|entry| entry.level == LogLevel::Warn && entry.message.contains("circuit breaker"));
    assert!(warned, "breaker opening must be logged at warn level");
}

#[test]
fn retry_deadline_fires_through_tick() {
    let (mut pipeline, _state) = pipeline_with(base_config(), failing(1), vec![0.0, 0.0]);
    pipeline.enqueue(envelope(0), 1_000);
    let outcome = pipeline.flush(FlushReason::Manual, 2_000);
    assert_eq!(
        outcome,
        FlushOutcome::Failed {
            requeued: 1,
            dropped: 0,
            breaker_opened: false,
            retry_at_ms: Some(2_500),
        }
    );
    assert_eq!(pipeline.wake_at_ms(), Some(2_500));
    assert_eq!(pipeline.tick(2_499), None);
    assert_eq!(pipeline.tick(2_500), Some(FlushOutcome::Sent { events: 1 }));
}
