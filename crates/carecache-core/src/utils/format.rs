/// Malaysian country calling code, without the plus sign.
const COUNTRY_CODE: &str = "60";

/// Normalise a phone number to E.164 form, assuming Malaysia for local numbers.
///
/// Separators are ignored, so every formatting of the same number yields the
/// same string: `012-345-6789`, `012 345 6789` and `+60 12-345 6789` all
/// become `+60123456789`. Query fingerprints depend on this being stable.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }

    if phone.trim_start().starts_with('+') {
        return format!("+{}", digits);
    }
    if let Some(international) = digits.strip_prefix("00") {
        return format!("+{}", international);
    }
    if digits.starts_with(COUNTRY_CODE) {
        return format!("+{}", digits);
    }
    match digits.strip_prefix('0') {
        // Drop the trunk prefix
        Some(local) => format!("+{}{}", COUNTRY_CODE, local),
        None => format!("+{}{}", COUNTRY_CODE, digits),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
