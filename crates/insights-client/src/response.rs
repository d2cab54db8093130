//! Response envelope decoding.
//!
//! Every query endpoint replies with `{"header": {...}, "data": [...]}`.
//! A missing `data` field is the API's way of reporting an empty result
//! set and decodes to an empty vector, never an error.

use serde::Deserialize;

/// Decoded reply from a query endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub header: EnvelopeHeader,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl ResponseEnvelope {
    /// Number of records in this page.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the result set is empty (a successful outcome).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Envelope header; `status` is always present, the rest is
/// endpoint-dependent.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeHeader {
    pub status: i64,
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "dataCount", default)]
    pub data_count: Option<u64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}
