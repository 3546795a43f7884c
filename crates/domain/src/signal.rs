//! Raw signal: an unvalidated message from a subsystem's sensor feed.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A raw signal as delivered by a sensor feed. Adapters normalize it into
/// an [`Event`](crate::event::Event) or reject it as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    /// Device tag, e.g. `FD-ER-001`.
    pub device: String,
    /// Signal name, e.g. `smoke`, `pressed`, `heartbeat`.
    pub signal: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub at: Option<Timestamp>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl RawSignal {
    #[must_use]
    pub fn new(device: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            signal: signal.into(),
            value: None,
            at: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_at(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_minimal_json_line() {
        let signal: RawSignal =
            serde_json::from_str(r#"{"device":"ES-ER-001","signal":"pressed"}"#).unwrap();
        assert_eq!(signal, RawSignal::new("ES-ER-001", "pressed"));
    }

    #[test]
    fn should_parse_reading_with_value() {
        let signal: RawSignal =
            serde_json::from_str(r#"{"device":"FD-ER-002","signal":"heat","value":92.5}"#)
                .unwrap();
        assert_eq!(signal.value, Some(92.5));
    }
}
