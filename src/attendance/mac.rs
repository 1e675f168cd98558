use crate::error::MacAddressError;
use regex::Regex;
use std::sync::OnceLock;

const MAC_PATTERN: &str =
    r"^(?:[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{2}(?:-[0-9A-Fa-f]{2}){5})$";

fn mac_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(MAC_PATTERN).ok()).as_ref()
}

pub fn validate(raw: &str) -> Result<&str, MacAddressError> {
    let trimmed = raw.trim();
    if mac_pattern().is_some_and(|pattern| pattern.is_match(trimmed)) {
        Ok(trimmed)
    } else {
        Err(MacAddressError::Malformed(raw.to_string()))
    }
}

/// Canonical upper-case colon form, e.g. `AA:BB:CC:DD:EE:FF`.
pub fn canonicalize(raw: &str) -> Result<String, MacAddressError> {
    validate(raw).map(|mac| mac.replace('-', ":").to_uppercase())
}

pub fn prepare(raw: &str, normalize: bool) -> Result<String, MacAddressError> {
    if normalize {
        canonicalize(raw)
    } else {
        validate(raw).map(ToOwned::to_owned)
    }
}
