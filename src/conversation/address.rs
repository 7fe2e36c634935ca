//! Phone-number normalization for manually typed destinations.

/// Default country calling code (Indonesia).
pub const DEFAULT_COUNTRY_CODE: &str = "62";

/// Strip everything but digits; a leading `0` becomes `country_code`.
///
/// Returns `None` when nothing dialable is left.
pub fn normalize_number(input: &str, country_code: &str) -> Option<String> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    match digits.strip_prefix('0') {
        Some(rest) if !rest.is_empty() => Some(format!("{country_code}{rest}")),
        Some(_) => None,
        None => Some(digits),
    }
}
