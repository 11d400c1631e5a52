use crate::clock::utc_day_key;
use crate::ldp::rr::{rr_bit, RandomizedResponse};
use crate::random::{RandomError, RandomSource};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Budget ledger for one UTC day's presence fact.
#[derive(Debug, Clone, Copy)]
struct DayEntry {
    epsilon_total: f64,
    response: RandomizedResponse,
}

/// Per-day epsilon accountant with a memoized presence bit.
///
/// The same underlying fact is never measured twice with fresh randomness
/// inside one UTC day: repeat queries of an unchanged fact reuse the stored
/// draw, so the privacy loss does not compound per query. Fresh randomness
/// is only spent on a genuinely new fact, i.e. a new day.
#[derive(Debug, Clone)]
pub struct PresenceBudget {
    cap: f64,
    entries: HashMap<String, DayEntry>,
}

impl PresenceBudget {
    /// Creates an accountant with the given daily epsilon cap.
    pub fn new(cap: f64) -> Self {
        Self {
            cap,
            entries: HashMap::new(),
        }
    }

    /// Configured daily cap.
    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Cumulative epsilon spent on the day containing `now`.
    pub fn spent(&self, now: DateTime<Utc>) -> f64 {
        self.entries
            .get(&utc_day_key(now))
            .map(|entry| entry.epsilon_total)
            .unwrap_or(0.0)
    }

    /// Number of day entries currently tracked.
    pub fn tracked_days(&self) -> usize {
        self.entries.len()
    }

    /// Answers today's presence query, charging `epsilon` against the cap.
    ///
    /// Returns `None` when the charge would exceed the cap; the spend is
    /// never partially applied. A first-of-day query draws a fresh
    /// randomized-response bit; same-day repeats return the memoized result
    /// without consuming randomness.
    pub fn query(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut dyn RandomSource,
        epsilon: f64,
        sampling_rate: f64,
    ) -> Result<Option<RandomizedResponse>, RandomError> {
        let key = utc_day_key(now);
        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.epsilon_total + epsilon > self.cap {
                return Ok(None);
            }
            entry.epsilon_total += epsilon;
            return Ok(Some(entry.response));
        }
        if epsilon > self.cap {
            return Ok(None);
        }
        let response = rr_bit(rng, true, epsilon, sampling_rate)?;
        self.entries.insert(
            key.clone(),
            DayEntry {
                epsilon_total: epsilon,
                response,
            },
        );
        self.evict_stale(&key);
        Ok(Some(response))
    }

    // Any key other than today's is more than 24h past its UTC midnight.
    fn evict_stale(&mut self, today: &str) {
        self.entries.retain(|key, _| key == today);
    }
}
