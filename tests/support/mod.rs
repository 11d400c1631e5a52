#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ldp_analytics::{
    Clock, ConversionEvent, EventEnvelope, EventKind, EventPayload, HttpTransport, RandomError,
    RandomSource, RandomizedResponse, SessionEvent, TransportError, TransportRequest,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Deterministic random source: scripted floats for draws, a rolling
/// counter for nonce bytes.
pub struct ScriptedRandom {
    floats: Vec<f64>,
    cursor: usize,
    counter: u8,
}

impl ScriptedRandom {
    pub fn new(floats: Vec<f64>) -> Self {
        Self {
            floats,
            cursor: 0,
            counter: 0,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        for byte in buf.iter_mut() {
            self.counter = self.counter.wrapping_add(1);
            *byte = self.counter;
        }
        Ok(())
    }

    fn next_float(&mut self) -> Result<f64, RandomError> {
        let value = self
            .floats
            .get(self.cursor)
            .copied()
            .ok_or_else(|| RandomError::new("scripted floats exhausted"))?;
        self.cursor += 1;
        Ok(value)
    }
}

/// Source that fails on any use; proves short-circuit paths consume nothing.
pub struct FailingRandom;

impl RandomSource for FailingRandom {
    fn fill_bytes(&mut self, _buf: &mut [u8]) -> Result<(), RandomError> {
        Err(RandomError::new("randomness must not be consumed"))
    }

    fn next_float(&mut self) -> Result<f64, RandomError> {
        Err(RandomError::new("randomness must not be consumed"))
    }
}

/// Shared, advanceable clock.
#[derive(Clone)]
pub struct FixedClock {
    now: Rc<RefCell<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(RefCell::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.borrow_mut() = now;
    }

    pub fn advance_ms(&self, ms: i64) {
        let next = *self.now.borrow() + chrono::Duration::milliseconds(ms);
        *self.now.borrow_mut() = next;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub struct MockState {
    pub responses: Vec<Result<(), TransportError>>,
    pub requests: Vec<TransportRequest>,
}

/// Scripted transport in the shape of the real blocking client; once the
/// script runs out every request succeeds.
#[derive(Clone)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl HttpTransport for MockTransport {
    fn post_json(&mut self, request: &TransportRequest) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());
        if state.responses.is_empty() {
            Ok(())
        } else {
            state.responses.remove(0)
        }
    }
}

pub fn mock_transport(
    responses: Vec<Result<(), TransportError>>,
) -> (MockTransport, Rc<RefCell<MockState>>) {
    let state = Rc::new(RefCell::new(MockState {
        responses,
        requests: Vec::new(),
    }));
    (
        MockTransport {
            state: state.clone(),
        },
        state,
    )
}

pub fn failing(times: usize) -> Vec<Result<(), TransportError>> {
    (0..times)
        .map(|_| Err(TransportError::RejectedStatus { status: 503 }))
        .collect()
}

/// Numbered conversion envelope for ordering assertions.
pub fn envelope(i: usize) -> EventEnvelope {
    EventEnvelope {
        site_id: "site-1".into(),
        kind: EventKind::Conversions,
        payload: EventPayload::Conversion {
            conversion_type: format!("c{i}"),
            response: RandomizedResponse {
                bit: 1,
                p: 0.62,
                q: 0.38,
                variance: 0.2356,
            },
        },
        epsilon_used: 1.0,
        sampling_rate: 1.0,
        client_timestamp: "2026-08-25T00:00:00+00:00".into(),
        nonce: format!("nonce-{i}"),
    }
}

pub fn conversion(name: &str) -> ConversionEvent {
    ConversionEvent {
        conversion_type: name.into(),
    }
}

pub fn session(referrer_bucket: &str, engagement_bucket: &str) -> SessionEvent {
    SessionEvent {
        referrer_bucket: referrer_bucket.into(),
        engagement_bucket: engagement_bucket.into(),
    }
}
