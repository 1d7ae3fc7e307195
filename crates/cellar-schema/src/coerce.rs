//! Write coercion per declared field type.
//!
//! | declared | input            | stored                              |
//! |----------|------------------|-------------------------------------|
//! | `string` | anything         | its string representation           |
//! | `number` | finite number    | unchanged                           |
//! | `number` | string           | leading integer, or `0` if none     |
//! | `number` | NaN / infinity   | `0`                                 |
//!
//! Non-finite numbers never reach storage: they have no JSON encoding and
//! would not survive an export.

use cellar_types::{FieldType, Value};

/// Coerce `raw` to the representation stored for `declared`.
///
/// Returns `None` when `declared` is not a supported type.
pub fn coerce(declared: &FieldType, raw: Value) -> Option<Value> {
    match declared {
        FieldType::String => Some(match raw {
            Value::String(s) => Value::String(s),
            number => Value::String(number.to_string()),
        }),
        FieldType::Number => {
            let n = match raw {
                Value::Number(n) => n,
                Value::String(s) => parse_int(&s).unwrap_or(0.0),
            };
            Some(Value::Number(if n.is_finite() { n } else { 0.0 }))
        }
        FieldType::Unsupported(_) => None,
    }
}

/// Parse the leading integer of `s`.
///
/// Leading whitespace and one sign are skipped, a `0x`/`0X` prefix selects
/// hexadecimal, and digits are consumed up to the first non-digit. Returns
/// `None` if no digit is found (`"abc"`, `""`, `"-"`).
pub fn parse_int(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let len = digits
        .chars()
        .take_while(|c| c.is_digit(radix))
        .count();
    if len == 0 {
        return None;
    }
    // Digits are ASCII, so the char count is also the byte length.
    let run = &digits[..len];
    let value = match radix {
        10 => run.parse::<f64>().ok()?,
        _ => parse_radix(run, radix),
    };
    Some(if negative { -value } else { value })
}

/// Convert a run of digits in `radix`, exactly while it fits in a `u128`.
fn parse_radix(run: &str, radix: u32) -> f64 {
    let mut exact = 0u128;
    let mut digits = run.chars().filter_map(|c| c.to_digit(radix));
    for digit in digits.by_ref() {
        match exact
            .checked_mul(u128::from(radix))
            .and_then(|v| v.checked_add(u128::from(digit)))
        {
            Some(v) => exact = v,
            None => {
                let mut value = exact as f64 * f64::from(radix) + f64::from(digit);
                for digit in digits {
                    value = value * f64::from(radix) + f64::from(digit);
                }
                return value;
            }
        }
    }
    exact as f64
}
