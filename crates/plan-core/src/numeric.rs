//! Coercion of user-entered numbers.
//!
//! Every numeric value that enters the matrix goes through these helpers:
//! blank or malformed input becomes zero and negative input clamps to zero,
//! so no arithmetic downstream ever sees an invalid operand.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

/// Parse a user-entered amount, falling back to zero.
///
/// Accepts plain (`"12.5"`) and scientific (`"1.2e3"`) notation after
/// trimming. Anything else, including `"NaN"` or partially numeric text such
/// as `"12abc"`, yields zero.
pub fn parse_non_negative_number(input: &str) -> Decimal {
    let s = input.trim();
    if s.is_empty() {
        return Decimal::ZERO;
    }
    match Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) {
        Ok(d) => non_negative(d),
        Err(_) => Decimal::ZERO,
    }
}

/// Clamp negative amounts to zero.
pub fn non_negative(d: Decimal) -> Decimal {
    if d.is_sign_negative() {
        Decimal::ZERO
    } else {
        d
    }
}

/// Coerce a document leaf (number, numeric string or anything else) to a
/// non-negative amount.
pub fn non_negative_from_json(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse_non_negative_number(&n.to_string()),
        Value::String(s) => parse_non_negative_number(s),
        _ => Decimal::ZERO,
    }
}

/// Emit an amount as a JSON number when it survives the trip exactly,
/// otherwise as a numeric string.
pub fn decimal_to_json(d: Decimal) -> Value {
    let d = d.normalize();
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    if let Some(n) = d.to_f64().and_then(Number::from_f64) {
        if parse_non_negative_number(&n.to_string()) == d {
            return Value::Number(n);
        }
    }
    Value::String(d.to_string())
}
