//! Luhn check-digit validation for order numbers.

/// Returns whether `digits` carries a valid Luhn check digit.
///
/// Expects a pre-sanitized sequence of ASCII digits; any other byte makes the
/// number invalid rather than panicking.
pub fn is_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (position, byte) in digits.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Computes the digit that makes `payload` followed by it Luhn-valid.
pub fn check_digit(payload: &str) -> Option<u8> {
    let mut sum = 0u32;
    // Once the check digit is appended every payload digit shifts one place left.
    for (position, byte) in payload.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return None;
        }
        let mut digit = u32::from(byte - b'0');
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    Some(((10 - sum % 10) % 10) as u8)
}

/// Appends the Luhn check digit to `payload`.
pub fn with_check_digit(payload: &str) -> Option<String> {
    check_digit(payload).map(|digit| format!("{payload}{digit}"))
}
