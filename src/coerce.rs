//! Typed coercion from [`RawValue`] into concrete field types.
//!
//! Every integer destination, 64-bit included, is widened to `i128` first and
//! then narrowed with a checked conversion, so a value that does not fit is
//! reported as an overflow naming the destination width instead of being
//! truncated. `float32` is checked against its maximum magnitude the same way.
//!
//! Strings (the environment and command-line case) are parsed per destination:
//! integers accept an optional sign and `0x`/`0o`/`0b` prefixes, booleans the
//! usual `1/t/true/0/f/false` spellings, durations the `1h30m`, `1.5s`,
//! `300ms` syntax (a bare number is nanoseconds), and lists are split on
//! whitespace.

use std::num::IntErrorKind;
use std::time::Duration;

use crate::capability::{IntWidth, ValueKind};
use crate::error::LayerfigError;
use crate::value::RawValue;

/// A type the engine can assign directly from any [`RawValue`].
pub trait Primitive: Sized {
    const KIND: ValueKind;

    /// Convert `raw` into `Self`. `key` names the config key, flag or
    /// environment variable in error messages.
    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError>;

    /// Render the current value for the store's default layer.
    fn render(&self) -> RawValue;
}

fn cast_error(key: &str, raw: &RawValue, target: &str) -> LayerfigError {
    LayerfigError::conversion(
        key,
        format!(
            "unable to cast {:?} of type {} to {target}",
            raw.to_string(),
            raw.type_name()
        ),
    )
}

fn split_radix(body: &str) -> (u32, &str) {
    match body.get(..2) {
        Some("0x") | Some("0X") => (16, &body[2..]),
        Some("0o") | Some("0O") => (8, &body[2..]),
        Some("0b") | Some("0B") => (2, &body[2..]),
        _ => (10, body),
    }
}

fn parse_int(key: &str, raw: &RawValue, text: &str, target: &str) -> Result<i128, LayerfigError> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, mut digits) = split_radix(body);
    // "10.0" is an integer written the way some tools emit it.
    if radix == 10
        && let Some((whole, frac)) = digits.split_once('.')
        && !frac.is_empty()
        && frac.bytes().all(|b| b == b'0')
    {
        digits = whole;
    }
    if digits.starts_with(['+', '-']) {
        return Err(cast_error(key, raw, target));
    }
    match i128::from_str_radix(digits, radix) {
        Ok(magnitude) => Ok(if negative { -magnitude } else { magnitude }),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Err(LayerfigError::overflow(key, trimmed, target))
        }
        Err(_) => Err(cast_error(key, raw, target)),
    }
}

fn to_wide_int(key: &str, raw: &RawValue, target: &str) -> Result<i128, LayerfigError> {
    match raw {
        RawValue::Int(i) => Ok(i128::from(*i)),
        RawValue::Uint(u) => Ok(i128::from(*u)),
        RawValue::Bool(b) => Ok(i128::from(*b)),
        RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i128),
        RawValue::Duration(d) => Ok(i128::try_from(d.as_nanos()).unwrap_or(i128::MAX)),
        RawValue::String(s) => parse_int(key, raw, s, target),
        RawValue::Bytes(b) => parse_int(key, raw, &String::from_utf8_lossy(b), target),
        other => Err(cast_error(key, other, target)),
    }
}

macro_rules! signed_primitive {
    ($($t:ty => $width:ident),* $(,)?) => {$(
        impl Primitive for $t {
            const KIND: ValueKind = ValueKind::Int(IntWidth::$width);

            fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
                let target = Self::KIND.type_name();
                let wide = to_wide_int(key, raw, &target)?;
                <$t>::try_from(wide).map_err(|_| LayerfigError::overflow(key, wide, &target))
            }

            fn render(&self) -> RawValue {
                RawValue::Int(*self as i64)
            }
        }
    )*};
}

macro_rules! unsigned_primitive {
    ($($t:ty => $width:ident),* $(,)?) => {$(
        impl Primitive for $t {
            const KIND: ValueKind = ValueKind::Uint(IntWidth::$width);

            fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
                let target = Self::KIND.type_name();
                let wide = to_wide_int(key, raw, &target)?;
                <$t>::try_from(wide).map_err(|_| LayerfigError::overflow(key, wide, &target))
            }

            fn render(&self) -> RawValue {
                RawValue::Uint(*self as u64)
            }
        }
    )*};
}

signed_primitive!(i8 => W8, i16 => W16, i32 => W32, i64 => W64, isize => W64);
unsigned_primitive!(u8 => W8, u16 => W16, u32 => W32, u64 => W64, usize => W64);

fn parse_float(key: &str, raw: &RawValue, text: &str, target: &str) -> Result<f64, LayerfigError> {
    let trimmed = text.trim();
    let parsed: f64 = trimmed.parse().map_err(|_| cast_error(key, raw, target))?;
    if parsed.is_infinite() && !trimmed.to_ascii_lowercase().contains("inf") {
        return Err(LayerfigError::overflow(key, trimmed, target));
    }
    Ok(parsed)
}

fn to_wide_float(key: &str, raw: &RawValue, target: &str) -> Result<f64, LayerfigError> {
    match raw {
        RawValue::Float(f) => Ok(*f),
        RawValue::Int(i) => Ok(*i as f64),
        RawValue::Uint(u) => Ok(*u as f64),
        RawValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        RawValue::String(s) => parse_float(key, raw, s, target),
        RawValue::Bytes(b) => parse_float(key, raw, &String::from_utf8_lossy(b), target),
        other => Err(cast_error(key, other, target)),
    }
}

impl Primitive for f64 {
    const KIND: ValueKind = ValueKind::Float64;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        to_wide_float(key, raw, "float64")
    }

    fn render(&self) -> RawValue {
        RawValue::Float(*self)
    }
}

impl Primitive for f32 {
    const KIND: ValueKind = ValueKind::Float32;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        let wide = to_wide_float(key, raw, "float32")?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(LayerfigError::overflow(key, wide, "float32"));
        }
        Ok(wide as f32)
    }

    fn render(&self) -> RawValue {
        RawValue::Float(f64::from(*self))
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl Primitive for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        match raw {
            RawValue::Bool(b) => Ok(*b),
            RawValue::Int(i) => Ok(*i != 0),
            RawValue::Uint(u) => Ok(*u != 0),
            RawValue::String(s) => parse_bool(s).ok_or_else(|| cast_error(key, raw, "bool")),
            RawValue::Bytes(b) => {
                parse_bool(&String::from_utf8_lossy(b)).ok_or_else(|| cast_error(key, raw, "bool"))
            }
            other => Err(cast_error(key, other, "bool")),
        }
    }

    fn render(&self) -> RawValue {
        RawValue::Bool(*self)
    }
}

impl Primitive for String {
    const KIND: ValueKind = ValueKind::String;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        match raw {
            RawValue::String(s) => Ok(s.clone()),
            RawValue::List(_) | RawValue::Table(_) => Err(cast_error(key, raw, "string")),
            other => Ok(other.to_string()),
        }
    }

    fn render(&self) -> RawValue {
        RawValue::String(self.clone())
    }
}

fn duration_from_text(key: &str, raw: &RawValue, text: &str) -> Result<Duration, LayerfigError> {
    let trimmed = text.trim();
    let result = if trimmed.contains(['n', 's', 'u', 'µ', 'μ', 'm', 'h']) {
        parse_duration(trimmed)
    } else {
        parse_duration(&format!("{trimmed}ns"))
    };
    result.map_err(|e| {
        LayerfigError::conversion(
            key,
            format!(
                "unable to cast {:?} of type {} to duration: {e}",
                raw.to_string(),
                raw.type_name()
            ),
        )
    })
}

impl Primitive for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        match raw {
            RawValue::Duration(d) => Ok(*d),
            RawValue::Int(i) => u64::try_from(*i)
                .map(Duration::from_nanos)
                .map_err(|_| cast_error(key, raw, "duration")),
            RawValue::Uint(u) => Ok(Duration::from_nanos(*u)),
            RawValue::Float(f) if f.is_finite() && *f >= 0.0 => Ok(Duration::from_nanos(*f as u64)),
            RawValue::String(s) => duration_from_text(key, raw, s),
            RawValue::Bytes(b) => duration_from_text(key, raw, &String::from_utf8_lossy(b)),
            other => Err(cast_error(key, other, "duration")),
        }
    }

    fn render(&self) -> RawValue {
        RawValue::Duration(*self)
    }
}

impl Primitive for Vec<String> {
    const KIND: ValueKind = ValueKind::StringList;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        match raw {
            RawValue::List(items) => items.iter().map(|item| String::coerce(key, item)).collect(),
            RawValue::String(s) => Ok(s.split_whitespace().map(String::from).collect()),
            other => Err(cast_error(key, other, "[]string")),
        }
    }

    fn render(&self) -> RawValue {
        RawValue::List(self.iter().cloned().map(RawValue::String).collect())
    }
}

impl Primitive for Vec<i64> {
    const KIND: ValueKind = ValueKind::IntList;

    fn coerce(key: &str, raw: &RawValue) -> Result<Self, LayerfigError> {
        match raw {
            RawValue::List(items) => items.iter().map(|item| i64::coerce(key, item)).collect(),
            RawValue::String(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .map(|part| i64::coerce(key, &RawValue::from(part)))
                .collect(),
            other => Err(cast_error(key, other, "[]int")),
        }
    }

    fn render(&self) -> RawValue {
        RawValue::List(self.iter().map(|i| RawValue::Int(*i)).collect())
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as `"300ms"`, `"1.5s"` or `"1h30m"`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. Segments add up.
/// Negative durations are rejected.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let s = text.trim();
    let invalid = || format!("invalid duration {text:?}");
    let too_large = || format!("duration {text:?} is too large");

    if s.starts_with('-') {
        return Err(format!("negative duration {text:?}"));
    }
    let body = s.strip_prefix('+').unwrap_or(s);
    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..num_end];
        rest = &rest[num_end..];
        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            "" => return Err(format!("missing unit in duration {text:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {text:?}")),
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if frac.contains('.') {
            return Err(invalid());
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| too_large())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(too_large)?;
        if !frac.is_empty() {
            let digits = &frac[..frac.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| invalid())?;
            nanos = nanos
                .checked_add(frac * scale / 10u128.pow(digits.len() as u32))
                .ok_or_else(too_large)?;
        }
        total = total.checked_add(nanos).ok_or_else(too_large)?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| too_large())?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

fn with_fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let text = format!("{whole}.{frac:0width$}");
    text.trim_end_matches('0').to_string()
}

/// Render a duration in the syntax [`parse_duration`] accepts
/// (`"1h30m0s"`, `"1.5s"`, `"300ms"`, `"0s"`).
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".into();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", with_fraction(nanos, 1_000));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", with_fraction(nanos, 1_000_000));
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&with_fraction(nanos % (60 * NANOS_PER_SEC), NANOS_PER_SEC));
    out.push('s');
    out
}
