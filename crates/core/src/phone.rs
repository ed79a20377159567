//! Phone number normalization and matching.
//!
//! Every comparison between two phone numbers (contact lookup, call to
//! contact matching) goes through [`normalize_phone`] so that `+7 999 123-45-67`,
//! `89991234567` and `9991234567` all compare equal.
//!
//! Contacts are matched by exact equality against the set produced by
//! [`phone_variants`]. Substring ("contains") matching is deliberately not
//! offered here.

/// Length of a canonical national number.
pub const NATIONAL_DIGITS: usize = 10;

/// Strip everything but ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Produce the canonical 10-digit form of a phone number.
///
/// - 11 digits starting with `7` or `8`: the trunk/country digit is dropped.
/// - 10 digits: returned unchanged.
/// - Anything else: the stripped digit string, with no further validation.
pub fn normalize_phone(raw: &str) -> String {
    let digits = digits_only(raw);
    if digits.len() == NATIONAL_DIGITS + 1 && (digits.starts_with('7') || digits.starts_with('8'))
    {
        return digits[1..].to_string();
    }
    digits
}

/// Candidate spellings under which a contact's phone may have been stored.
///
/// Order: the raw string, the normalized form, then the normalized form with
/// `7`, `8` and `+7` prefixes. Empty and duplicate entries are dropped.
pub fn phone_variants(raw: &str) -> Vec<String> {
    let normalized = normalize_phone(raw);
    let mut candidates = vec![raw.trim().to_string()];
    if !normalized.is_empty() {
        candidates.push(normalized.clone());
        candidates.push(format!("7{normalized}"));
        candidates.push(format!("8{normalized}"));
        candidates.push(format!("+7{normalized}"));
    }

    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// An internal PBX extension rather than a client number.
pub fn is_sip_endpoint(number: &str) -> bool {
    number.contains("sip:") || number.contains('@')
}
