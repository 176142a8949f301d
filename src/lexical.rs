//! Lexical Leniency
//!
//! Scalar and timestamp text never fails to decode. Instead every conversion
//! reports whether the text was well formed ([`Lexical::Parsed`]) or whether
//! the value was recovered by permissive parsing ([`Lexical::Defaulted`]).
//!
//! The permissive number parsers follow the C library conventions the wire
//! format has always been read with: leading whitespace is skipped, the longest
//! numeric prefix is converted, and text with no numeric prefix yields zero.

use crate::error::{Error, Result};

/// Outcome of a lenient lexical conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lexical<T> {
    /// The whole text was a valid lexical form
    Parsed(T),
    /// The text was malformed; the value is what permissive parsing recovered
    Defaulted(T),
}

impl<T> Lexical<T> {
    /// Tag a value according to whether its text was well formed.
    #[inline]
    pub fn new(value: T, well_formed: bool) -> Self {
        if well_formed {
            Lexical::Parsed(value)
        } else {
            Lexical::Defaulted(value)
        }
    }

    /// The decoded value, regardless of how it was obtained.
    #[inline]
    pub fn value(self) -> T {
        match self {
            Lexical::Parsed(v) | Lexical::Defaulted(v) => v,
        }
    }

    /// Borrow the decoded value.
    #[inline]
    pub fn as_value(&self) -> &T {
        match self {
            Lexical::Parsed(v) | Lexical::Defaulted(v) => v,
        }
    }

    #[inline]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Lexical::Parsed(_))
    }

    #[inline]
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Lexical::Defaulted(_))
    }

    /// Transform the value, keeping the tag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lexical<U> {
        match self {
            Lexical::Parsed(v) => Lexical::Parsed(f(v)),
            Lexical::Defaulted(v) => Lexical::Defaulted(f(v)),
        }
    }

    /// Downgrade to `Defaulted` when `ok` is false.
    pub fn and_check(self, ok: bool) -> Self {
        match self {
            Lexical::Parsed(v) if !ok => Lexical::Defaulted(v),
            other => other,
        }
    }

    /// Reject defaulted values, reporting the offending text.
    pub fn strict(self, type_name: &'static str, text: &str) -> Result<T> {
        match self {
            Lexical::Parsed(v) => Ok(v),
            Lexical::Defaulted(_) => Err(Error::lexical(type_name, text)),
        }
    }
}

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Parse a decimal integer the way `atol` does.
///
/// Returns the value and whether the text (ignoring surrounding whitespace) was
/// exactly one in-range integer. Overflow saturates.
pub fn parse_integer(text: &str) -> Lexical<i64> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }

    let negative = match bytes.get(pos) {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let digits_start = pos;
    let mut magnitude: u64 = 0;
    let mut overflow = false;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        let digit = u64::from(bytes[pos] - b'0');
        match magnitude.checked_mul(10).and_then(|m| m.checked_add(digit)) {
            Some(m) => magnitude = m,
            None => overflow = true,
        }
        pos += 1;
    }
    let has_digits = pos > digits_start;

    let value = if negative {
        if overflow || magnitude > i64::MIN.unsigned_abs() {
            overflow = true;
            i64::MIN
        } else {
            0i64.wrapping_sub_unsigned(magnitude)
        }
    } else if overflow || magnitude > i64::MAX as u64 {
        overflow = true;
        i64::MAX
    } else {
        magnitude as i64
    };

    let rest_blank = bytes[pos..].iter().all(|&b| is_space(b));
    Lexical::new(value, has_digits && rest_blank && !overflow)
}

/// Parse an integer and narrow it to a smaller width.
///
/// Out-of-range values wrap like a C integer conversion and are tagged `Defaulted`.
pub fn parse_integer_as<T>(text: &str) -> Lexical<T>
where
    T: TryFrom<i64> + WrappingFrom,
{
    let parsed = parse_integer(text);
    let well_formed = parsed.is_parsed();
    let wide = parsed.value();
    match T::try_from(wide) {
        Ok(v) => Lexical::new(v, well_formed),
        Err(_) => Lexical::Defaulted(T::wrapping_from(wide)),
    }
}

/// Truncating conversion from `i64`, used for out-of-range narrow integers.
pub trait WrappingFrom {
    fn wrapping_from(value: i64) -> Self;
}

macro_rules! impl_wrapping_from {
    ($($t:ty),*) => {
        $(impl WrappingFrom for $t {
            #[inline]
            fn wrapping_from(value: i64) -> Self {
                value as $t
            }
        })*
    };
}

impl_wrapping_from!(i8, i16, i32, i64, u8, u16, u32);

/// Parse a floating point number the way `atof` does.
///
/// The XML Schema special values `INF`, `-INF`, `+INF` and `NaN` are accepted as
/// well formed; the C spellings (`inf`, `infinity`, `nan`, any case) are recovered
/// as `Defaulted`.
pub fn parse_double(text: &str) -> Lexical<f64> {
    let trimmed = text.trim_matches(|c: char| c.is_ascii() && is_space(c as u8));
    match trimmed {
        "INF" | "+INF" => return Lexical::Parsed(f64::INFINITY),
        "-INF" => return Lexical::Parsed(f64::NEG_INFINITY),
        "NaN" => return Lexical::Parsed(f64::NAN),
        _ => {}
    }

    let bytes = trimmed.as_bytes();
    let end = float_prefix_len(bytes);
    if end == 0 {
        return Lexical::Defaulted(special_prefix(trimmed).unwrap_or(0.0));
    }

    // The prefix is ASCII digits, signs, '.', and 'e', so it is valid UTF-8 and
    // accepted by the standard parser.
    let value = trimmed[..end].parse::<f64>().unwrap_or(0.0);
    Lexical::new(value, end == bytes.len())
}

/// Length of the longest prefix of `bytes` that is a decimal floating point literal.
fn float_prefix_len(bytes: &[u8]) -> usize {
    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut mantissa_digits = pos - int_start;

    if bytes.get(pos) == Some(&b'.') {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            pos = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits_start {
            pos = exp;
        }
    }

    pos
}

/// C library spellings of infinity and NaN at the start of the text.
fn special_prefix(text: &str) -> Option<f64> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = body.get(..3)?.to_ascii_lowercase();
    let value = match lower.as_str() {
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => return None,
    };
    Some(if negative { -value } else { value })
}
