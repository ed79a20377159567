//! Pushed call summaries (`/events/summary`).
//!
//! Mango posts the same signed form it expects from us: `vpbx_api_key`,
//! `sign` and `json`. The summary payload is mapped onto a [`CallRecord`]
//! so pushed calls go through the same reconciler as polled ones.

use serde::Deserialize;
use serde_json::Value;

use crm_core::call_record::CallRecord;
use crm_core::signing::verify_signature;

use crate::config::MangoConfig;
use crate::error::MangoError;

/// Form body of a pushed event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookForm {
    pub vpbx_api_key: Option<String>,
    pub sign: Option<String>,
    pub json: String,
}

#[derive(Debug, Deserialize)]
struct SummaryEvent {
    entry_id: Option<String>,
    #[serde(default)]
    create_time: Option<Value>,
    #[serde(default)]
    talk_time: Option<Value>,
    #[serde(default)]
    end_time: Option<Value>,
    #[serde(default)]
    from: Option<Party>,
    #[serde(default)]
    to: Option<Party>,
    #[serde(default)]
    disconnect_reason: Option<Value>,
    #[serde(default)]
    recording_id: Option<Value>,
    #[serde(default)]
    records: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Party {
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    extension: Option<Value>,
}

impl Party {
    /// External number, or `sip:<extension>` for an internal party without one.
    fn number(&self) -> Option<String> {
        let number = self.number.as_deref().map(str::trim).filter(|n| !n.is_empty());
        match number {
            Some(n) => Some(n.to_string()),
            None => scalar_text(self.extension.as_ref()?).map(|ext| format!("sip:{ext}")),
        }
    }
}

/// Parse the `json` field of a summary push.
///
/// The call is timed from answer (`talk_time`) when it was answered and from
/// creation otherwise; it ends at `end_time`.
pub fn parse_summary_event(json: &str) -> Result<CallRecord, MangoError> {
    let event: SummaryEvent =
        serde_json::from_str(json).map_err(|e| MangoError::Decode(format!("summary event: {e}")))?;

    let talk = event.talk_time.as_ref().and_then(scalar_i64).filter(|t| *t > 0);
    let created = event.create_time.as_ref().and_then(scalar_i64);

    Ok(CallRecord {
        entry_id: event.entry_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        start: talk.or(created),
        finish: event.end_time.as_ref().and_then(scalar_i64),
        from_number: event.from.as_ref().and_then(Party::number),
        to_number: event.to.as_ref().and_then(Party::number),
        disconnect_reason: event.disconnect_reason.as_ref().and_then(scalar_text),
        recording_token: event
            .recording_id
            .as_ref()
            .or(event.records.as_ref())
            .and_then(scalar_text),
    })
}

/// Check a push against the account credentials.
///
/// Both the key and the signature are required, and nothing is accepted
/// while the account credentials are unset.
pub fn verify_push(config: &MangoConfig, form: &WebhookForm) -> bool {
    if !config.is_configured() {
        return false;
    }
    match (&form.vpbx_api_key, &form.sign) {
        (Some(key), Some(sign)) => {
            key == &config.api_key && verify_signature(key, &form.json, &config.api_salt, sign)
        }
        _ => false,
    }
}

fn scalar_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(scalar_text),
        _ => None,
    }
}
