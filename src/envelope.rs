use crate::ldp::rr::RandomizedResponse;
use serde::{Deserialize, Serialize};

/// Event families understood by the ingestion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Uniques,
    Pageviews,
    Sessions,
    Conversions,
}

impl EventKind {
    /// Wire-format name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Uniques => "uniques",
            EventKind::Pageviews => "pageviews",
            EventKind::Sessions => "sessions",
            EventKind::Conversions => "conversions",
        }
    }
}

/// Kind-specific payload carrying the randomized-response outputs.
///
/// Variants are resolved structurally on the wire (no tag); the envelope's
/// `kind` field is the human-facing discriminator. Ordering matters for
/// deserialization: variants with required distinguishing fields come first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Session {
        referrer_bucket: String,
        engagement_bucket: String,
        #[serde(flatten)]
        response: RandomizedResponse,
    },
    Conversion {
        conversion_type: String,
        #[serde(flatten)]
        response: RandomizedResponse,
    },
    Presence {
        day: String,
        #[serde(flatten)]
        response: RandomizedResponse,
    },
    Pageview {
        #[serde(flatten)]
        response: RandomizedResponse,
    },
}

impl EventPayload {
    /// The randomized-response outputs embedded in the payload.
    pub fn response(&self) -> &RandomizedResponse {
        match self {
            EventPayload::Session { response, .. }
            | EventPayload::Conversion { response, .. }
            | EventPayload::Presence { response, .. }
            | EventPayload::Pageview { response } => response,
        }
    }
}

/// One privatized report, immutable after construction.
///
/// The nonce is a fresh random token per envelope, used for dedup and
/// idempotency on the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub site_id: String,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub epsilon_used: f64,
    pub sampling_rate: f64,
    pub client_timestamp: String,
    pub nonce: String,
}

/// POST body shipped to the shuffle endpoint; any 2xx response is success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub token: String,
    pub nonce: String,
    pub batch: Vec<EventEnvelope>,
}
