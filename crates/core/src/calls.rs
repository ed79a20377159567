//! Call classification: direction, status, and duration inference.
//!
//! Pure functions over the raw fields of a provider call record. The
//! reconciler in `crm-sync` applies these before anything touches storage.

use serde::{Deserialize, Serialize};

use crate::phone::is_sip_endpoint;

/// Disconnect reason reported for an unanswered call.
pub const DISCONNECT_MISSED: i64 = 1103;

/// Disconnect reason reported when the callee was busy.
pub const DISCONNECT_BUSY: i64 = 1102;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Direction of a call relative to our PBX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl CallDirection {
    /// Value stored in the `calls.direction` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(Self::In),
            "OUT" => Some(Self::Out),
            _ => None,
        }
    }

    /// Human-facing label used in deal titles and timeline entries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::In => "Incoming",
            Self::Out => "Outgoing",
        }
    }
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing iff `from` is one of our SIP endpoints and `to` is not.
pub fn infer_direction(from: &str, to: &str) -> CallDirection {
    if is_sip_endpoint(from) && !is_sip_endpoint(to) {
        CallDirection::Out
    } else {
        CallDirection::In
    }
}

/// The client side of the call: the callee for outgoing calls, the caller otherwise.
pub fn client_phone<'a>(direction: CallDirection, from: &'a str, to: &'a str) -> &'a str {
    match direction {
        CallDirection::Out => to,
        CallDirection::In => from,
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome of a call as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CallStatus {
    Completed,
    Missed,
    Busy,
    /// Any status written by another producer; preserved verbatim.
    Other(String),
}

impl CallStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Missed => "MISSED",
            Self::Busy => "BUSY",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "COMPLETED" => Self::Completed,
            "MISSED" => Self::Missed,
            "BUSY" => Self::Busy,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<String> for CallStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a provider disconnect reason to a call status.
///
/// The reason may arrive as a number or a numeric string; anything that is
/// not `1103` or `1102` is a normal hangup.
pub fn infer_status(disconnect_reason: Option<&str>) -> CallStatus {
    match disconnect_reason.and_then(|r| r.trim().parse::<i64>().ok()) {
        Some(DISCONNECT_MISSED) => CallStatus::Missed,
        Some(DISCONNECT_BUSY) => CallStatus::Busy,
        _ => CallStatus::Completed,
    }
}

// ---------------------------------------------------------------------------
// Duration
// ---------------------------------------------------------------------------

/// Talk duration in seconds; `0` when either bound is missing.
///
/// A finish before the start (clock skew on the provider side) also yields `0`,
/// as does a span too wide to represent.
pub fn call_duration(start: Option<i64>, finish: Option<i64>) -> i64 {
    match (start, finish) {
        (Some(start), Some(finish)) => finish.checked_sub(start).map_or(0, |d| d.max(0)),
        _ => 0,
    }
}

/// Whether a call should have a recording to look for.
pub fn recording_expected(status: &CallStatus, duration_secs: i64) -> bool {
    status.is_completed() && duration_secs > 0
}

/// `"5 min 3 sec"` / `"42 sec"`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        return format!("{secs} sec");
    }
    format!("{} min {} sec", secs / 60, secs % 60)
}

/// Summary line for a call's timeline entry on its deal.
pub fn timeline_summary(direction: CallDirection, status: &CallStatus, duration_secs: i64) -> String {
    let label = direction.label();
    match status {
        CallStatus::Missed => format!("Missed {} call", label.to_lowercase()),
        CallStatus::Busy => format!("{label} call, line busy"),
        _ => format!("{label} call, {}", format_duration(duration_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- direction -----------------------------------------------------------

    #[test]
    fn sip_caller_to_client_is_outgoing() {
        assert_eq!(infer_direction("sip:100@pbx", "79991234567"), CallDirection::Out);
    }

    #[test]
    fn client_to_sip_is_incoming() {
        assert_eq!(infer_direction("79991234567", "sip:100@pbx"), CallDirection::In);
    }

    #[test]
    fn sip_to_sip_is_incoming() {
        assert_eq!(infer_direction("sip:100@pbx", "sip:101@pbx"), CallDirection::In);
        assert_eq!(infer_direction("sip:100@pbx", "101@pbx"), CallDirection::In);
    }

    #[test]
    fn plain_numbers_are_incoming() {
        assert_eq!(infer_direction("79991234567", "74951234567"), CallDirection::In);
    }

    #[test]
    fn client_phone_follows_direction() {
        assert_eq!(client_phone(CallDirection::Out, "sip:1@x", "7999"), "7999");
        assert_eq!(client_phone(CallDirection::In, "7999", "sip:1@x"), "7999");
    }

    #[test]
    fn direction_round_trip() {
        for d in [CallDirection::In, CallDirection::Out] {
            assert_eq!(CallDirection::from_str(d.as_str()), Some(d));
        }
        assert!(CallDirection::from_str("SIDEWAYS").is_none());
    }

    // -- status --------------------------------------------------------------

    #[test]
    fn missed_and_busy_codes() {
        assert_eq!(infer_status(Some("1103")), CallStatus::Missed);
        assert_eq!(infer_status(Some("1102")), CallStatus::Busy);
        assert_eq!(infer_status(Some(" 1103 ")), CallStatus::Missed);
    }

    #[test]
    fn other_reasons_complete() {
        assert_eq!(infer_status(Some("1110")), CallStatus::Completed);
        assert_eq!(infer_status(Some("")), CallStatus::Completed);
        assert_eq!(infer_status(None), CallStatus::Completed);
    }

    #[test]
    fn status_storage_strings() {
        assert_eq!(CallStatus::parse("MISSED"), CallStatus::Missed);
        assert_eq!(CallStatus::parse("NO_ANSWER"), CallStatus::Other("NO_ANSWER".into()));
        assert_eq!(CallStatus::Busy.to_string(), "BUSY");
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_value(CallStatus::Completed).unwrap();
        assert_eq!(json, serde_json::json!("COMPLETED"));
    }

    // -- duration ------------------------------------------------------------

    #[test]
    fn unrepresentable_span_is_zero() {
        assert_eq!(call_duration(Some(i64::MIN), Some(i64::MAX)), 0);
        assert_eq!(call_duration(Some(i64::MAX), Some(i64::MIN)), 0);
    }

    #[test]
    fn duration_from_bounds() {
        assert_eq!(call_duration(Some(1_700_000_000), Some(1_700_000_300)), 300);
    }

    #[test]
    fn duration_missing_bound_is_zero() {
        assert_eq!(call_duration(None, Some(10)), 0);
        assert_eq!(call_duration(Some(10), None), 0);
    }

    #[test]
    fn duration_never_negative() {
        assert_eq!(call_duration(Some(100), Some(50)), 0);
    }

    #[test]
    fn recording_only_for_answered_calls_with_talk_time() {
        assert!(recording_expected(&CallStatus::Completed, 1));
        assert!(!recording_expected(&CallStatus::Completed, 0));
        assert!(!recording_expected(&CallStatus::Missed, 30));
    }

    #[test]
    fn summaries() {
        assert_eq!(
            timeline_summary(CallDirection::Out, &CallStatus::Completed, 300),
            "Outgoing call, 5 min 0 sec"
        );
        assert_eq!(
            timeline_summary(CallDirection::In, &CallStatus::Missed, 0),
            "Missed incoming call"
        );
        assert_eq!(format_duration(42), "42 sec");
    }
}
