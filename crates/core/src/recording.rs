//! Recording token decoding and local file naming.
//!
//! The provider's `records` field wraps a base64 string in optional square
//! brackets. Decoded, it reads `type:recording_id:entry_id:flag`; only the
//! numeric recording id (index 1) is used locally.

use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use regex::Regex;

/// Downloads below this size are provider error pages, not audio.
pub const MIN_RECORDING_BYTES: usize = 1000;

/// Human-facing page for a recording in the provider's web UI.
const FALLBACK_URL_BASE: &str = "https://lk.mango-office.ru/issa/recordings";

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

/// A decoded recording token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingToken {
    inner: String,
    parts: Vec<String>,
}

impl RecordingToken {
    /// Decode a raw `records` value. Returns `None` if the value is empty or
    /// not valid base64 text.
    pub fn decode(raw: &str) -> Option<Self> {
        let inner = strip_wrapping(raw);
        if inner.is_empty() {
            return None;
        }

        let bytes = STANDARD
            .decode(inner)
            .or_else(|_| STANDARD_NO_PAD.decode(inner.trim_end_matches('=')))
            .ok()?;
        let text = String::from_utf8(bytes).ok()?;

        Some(Self {
            inner: inner.to_string(),
            parts: text.split(':').map(str::to_string).collect(),
        })
    }

    /// The token without brackets or quotes, as the provider expects it back.
    pub fn as_provider_id(&self) -> &str {
        &self.inner
    }

    /// Numeric recording id (index 1), if present and numeric.
    pub fn recording_id(&self) -> Option<&str> {
        self.parts
            .get(1)
            .map(String::as_str)
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
    }

    /// Entry id embedded in the token (index 2), if present.
    pub fn entry_id(&self) -> Option<&str> {
        self.parts.get(2).map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Link to the recording in the provider's web UI.
    pub fn fallback_url(&self) -> Option<String> {
        self.recording_id().map(recording_fallback_url)
    }
}

fn strip_wrapping(raw: &str) -> &str {
    let mut s = raw.trim();
    for (open, close) in [('[', ']'), ('"', '"'), ('\'', '\'')] {
        if let Some(inner) = s.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            s = inner.trim();
        }
    }
    s
}

/// Provider web UI link for a numeric recording id.
pub fn recording_fallback_url(recording_id: &str) -> String {
    format!("{FALLBACK_URL_BASE}/{recording_id}")
}

/// Make an entry id safe to use as a file stem.
pub fn sanitize_file_stem(entry_id: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(entry_id, "_").into_owned()
}

/// `wav` when the content type says so, otherwise `mp3`.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("wav") => "wav",
        _ => "mp3",
    }
}

/// All extensions a stored recording may carry.
pub const RECORDING_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        STANDARD.encode(s)
    }

    #[test]
    fn decodes_bracketed_token() {
        let raw = format!("[{}]", encode("1:123456789:E1:0"));
        let token = RecordingToken::decode(&raw).unwrap();
        assert_eq!(token.recording_id(), Some("123456789"));
        assert_eq!(token.entry_id(), Some("E1"));
        assert_eq!(token.as_provider_id(), encode("1:123456789:E1:0"));
    }

    #[test]
    fn decodes_bare_and_unpadded_token() {
        let encoded = encode("1:42:E2:1");
        let token = RecordingToken::decode(encoded.trim_end_matches('=')).unwrap();
        assert_eq!(token.recording_id(), Some("42"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(RecordingToken::decode("").is_none());
        assert!(RecordingToken::decode("[]").is_none());
        assert!(RecordingToken::decode("not base64 !!").is_none());
    }

    #[test]
    fn non_numeric_recording_id_is_none() {
        let token = RecordingToken::decode(&encode("1:abc:E1:0")).unwrap();
        assert_eq!(token.recording_id(), None);
        assert_eq!(token.fallback_url(), None);

        let short = RecordingToken::decode(&encode("justone")).unwrap();
        assert_eq!(short.recording_id(), None);
    }

    #[test]
    fn fallback_url_uses_recording_id() {
        let token = RecordingToken::decode(&encode("1:777:E1:0")).unwrap();
        assert_eq!(
            token.fallback_url().as_deref(),
            Some("https://lk.mango-office.ru/issa/recordings/777")
        );
    }

    #[test]
    fn sanitizes_file_stems() {
        assert_eq!(sanitize_file_stem("MToxMDA=/x y"), "MToxMDA__x_y");
        assert_eq!(sanitize_file_stem("E1_ok-2"), "E1_ok-2");
        assert_eq!(sanitize_file_stem("../../etc"), "______etc");
    }

    #[test]
    fn extension_from_content_type() {
        assert_eq!(extension_for_content_type(Some("audio/x-wav")), "wav");
        assert_eq!(extension_for_content_type(Some("audio/WAV")), "wav");
        assert_eq!(extension_for_content_type(Some("audio/mpeg")), "mp3");
        assert_eq!(extension_for_content_type(None), "mp3");
    }
}
