use crate::config::{CellValue, PhoneKey};

/// Number of digits of a canonical phone number.
pub const PHONE_KEY_LEN: usize = 10;

const COUNTRY_CODE: &str = "91";
const TRUNK_PREFIX: &str = "0";

/// Reduces a raw phone value to its canonical 10-digit key.
///
/// - numbers are converted through their integer decimal form, so that
///   `7908938513.0` gives `7908938513`
///   (the sign is dropped)
/// - all the non-digit characters are dropped
/// - a 12-digit number starting with `91` loses its country code
/// - an 11-digit number starting with `0` loses its leading zero
/// - anything longer than 10 digits is reduced to its last 10 digits
///
/// Returns `None` for blank values and for numbers with fewer than 10 digits.
pub fn normalize(raw: &CellValue) -> Option<PhoneKey> {
    let digits = match raw {
        CellValue::Empty => return None,
        CellValue::Int(i) => i.unsigned_abs().to_string(),
        CellValue::Float(f) => float_digits(*f)?,
        CellValue::Text(s) => text_digits(s)?,
    };
    reduce_digits(&digits)
}

/// Same as [normalize], for a value read as text.
pub fn normalize_str(raw: &str) -> Option<PhoneKey> {
    text_digits(raw).and_then(|d| reduce_digits(&d))
}

fn float_digits(f: f64) -> Option<String> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    // Past this point the integer form is not exact anymore.
    if t.abs() >= 9.0e15 {
        return None;
    }
    Some((t as i64).unsigned_abs().to_string())
}

fn text_digits(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return None;
    }
    let s = strip_zero_fraction(s);
    Some(s.chars().filter(|c| c.is_ascii_digit()).collect())
}

// Numbers exported as text by spreadsheet tools sometimes keep a `.0` suffix,
// whatever the separators before it (`+91 7908938513.0`).
fn strip_zero_fraction(s: &str) -> &str {
    match s.rsplit_once('.') {
        Some((int_part, frac))
            if int_part.ends_with(|c: char| c.is_ascii_digit())
                && !frac.is_empty()
                && frac.chars().all(|c| c == '0') =>
        {
            int_part
        }
        _ => s,
    }
}

fn reduce_digits(digits: &str) -> Option<PhoneKey> {
    if digits.is_empty() {
        return None;
    }
    let d = if digits.len() == 12 && digits.starts_with(COUNTRY_CODE) {
        &digits[2..]
    } else if digits.len() == 11 && digits.starts_with(TRUNK_PREFIX) {
        &digits[1..]
    } else {
        digits
    };
    match d.len() {
        PHONE_KEY_LEN => Some(PhoneKey(d.to_string())),
        n if n > PHONE_KEY_LEN => Some(PhoneKey(d[n - PHONE_KEY_LEN..].to_string())),
        _ => None,
    }
}
