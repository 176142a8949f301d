//! Scalar Codec Set
//!
//! One codec type per XML Schema lexical type. Every codec reads the complete
//! character value at the cursor (an attribute value, or the text runs of a
//! non-empty element), converts it with the type's lexical rule, and writes
//! values back as character content.
//!
//! Decoding is lenient by default: malformed text yields whatever permissive
//! parsing recovers. [`XsType::read_lexical`] exposes whether that happened and
//! [`XsType::read_strict`] turns it into an
//! [`Error::Lexical`](crate::error::Error::Lexical).

use crate::base64;
use crate::cursor::{read_entire_node_value, XmlCursor, XmlWriter};
use crate::error::Result;
use crate::lexical::{parse_double, parse_integer_as, Lexical};
use crate::timestamp::{self, CalendarTimestamp, OffsetSign};
use std::borrow::Cow;
use tracing::debug;

/// Direction of the boolean encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanEncoding {
    /// `true` is written as `"true"`, matching the decoder
    #[default]
    Canonical,
    /// `true` is written as `"false"` and `false` as `"true"`.
    ///
    /// Reproduces the output of the legacy runtime for peers that decode with
    /// the same inversion. Values written this way do not read back unchanged.
    Inverted,
}

/// Options shared by the `*_with` codec entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecOptions {
    /// Reject malformed lexical text instead of recovering a value
    pub strict: bool,
    pub boolean_encoding: BooleanEncoding,
    /// Sign rule for calendar offsets, on read and write
    pub offset_sign: OffsetSign,
}

impl CodecOptions {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_boolean_encoding(mut self, encoding: BooleanEncoding) -> Self {
        self.boolean_encoding = encoding;
        self
    }

    pub fn with_offset_sign(mut self, rule: OffsetSign) -> Self {
        self.offset_sign = rule;
        self
    }
}

/// Codec for one XML Schema lexical type
pub trait XsType {
    /// In-memory representation
    type Value;

    /// Schema type name, e.g. `xs:int`
    const NAME: &'static str;

    /// Convert lexical text to a value.
    fn parse(text: &str) -> Lexical<Self::Value>;

    /// Canonical lexical form of a value.
    fn format(value: &Self::Value) -> Cow<'_, str>;

    /// [`XsType::parse`] under the given options.
    fn parse_with(text: &str, _options: &CodecOptions) -> Lexical<Self::Value> {
        Self::parse(text)
    }

    /// [`XsType::format`] under the given options.
    fn format_with<'v>(value: &'v Self::Value, _options: &CodecOptions) -> Cow<'v, str> {
        Self::format(value)
    }

    /// Decode the value at the cursor, reporting whether the text was well formed.
    fn read_lexical<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<Lexical<Self::Value>> {
        let text = read_entire_node_value(cursor)?;
        let parsed = Self::parse(&text);
        if parsed.is_defaulted() {
            debug!(type_name = Self::NAME, text = %text, "malformed lexical value decoded leniently");
        }
        Ok(parsed)
    }

    /// Decode the value at the cursor leniently.
    fn read<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<Self::Value> {
        Ok(Self::read_lexical(cursor)?.value())
    }

    /// Decode the value at the cursor, rejecting malformed text.
    fn read_strict<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<Self::Value> {
        let text = read_entire_node_value(cursor)?;
        Self::parse(&text).strict(Self::NAME, &text)
    }

    fn read_with<C: XmlCursor + ?Sized>(cursor: &mut C, options: &CodecOptions) -> Result<Self::Value> {
        let text = read_entire_node_value(cursor)?;
        let parsed = Self::parse_with(&text, options);
        if options.strict {
            return parsed.strict(Self::NAME, &text);
        }
        if parsed.is_defaulted() {
            debug!(type_name = Self::NAME, text = %text, "malformed lexical value decoded leniently");
        }
        Ok(parsed.value())
    }

    /// Write a value as character content. Returns the writer's byte count.
    fn write<W: XmlWriter + ?Sized>(writer: &mut W, value: &Self::Value) -> Result<usize> {
        writer.write_text(&Self::format(value))
    }

    fn write_with<W: XmlWriter + ?Sized>(
        writer: &mut W,
        value: &Self::Value,
        options: &CodecOptions,
    ) -> Result<usize> {
        writer.write_text(&Self::format_with(value, options))
    }

    /// Dispose of a decoded value. Values are uniquely owned, so this only drops.
    fn release(value: Self::Value) {
        drop(value);
    }
}

/// `xs:boolean`. Exactly `"true"` decodes to true; anything else to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XsBoolean;

impl XsBoolean {
    /// Lexical form of `value` in the given direction
    pub fn encode(value: bool, encoding: BooleanEncoding) -> &'static str {
        match (value, encoding) {
            (true, BooleanEncoding::Canonical) | (false, BooleanEncoding::Inverted) => "true",
            (false, BooleanEncoding::Canonical) | (true, BooleanEncoding::Inverted) => "false",
        }
    }
}

impl XsType for XsBoolean {
    type Value = bool;
    const NAME: &'static str = "xs:boolean";

    fn parse(text: &str) -> Lexical<bool> {
        match text {
            "true" => Lexical::Parsed(true),
            "false" => Lexical::Parsed(false),
            _ => Lexical::Defaulted(false),
        }
    }

    fn format(value: &bool) -> Cow<'_, str> {
        Cow::Borrowed(Self::encode(*value, BooleanEncoding::Canonical))
    }

    fn format_with<'v>(value: &'v bool, options: &CodecOptions) -> Cow<'v, str> {
        Cow::Borrowed(Self::encode(*value, options.boolean_encoding))
    }
}

macro_rules! integer_type {
    ($(#[$doc:meta])* $name:ident, $value:ty, $xs:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl XsType for $name {
            type Value = $value;
            const NAME: &'static str = $xs;

            fn parse(text: &str) -> Lexical<$value> {
                parse_integer_as::<$value>(text)
            }

            fn format(value: &$value) -> Cow<'_, str> {
                Cow::Owned(value.to_string())
            }
        }
    };
}

integer_type!(
    /// `xs:byte`, a signed 8-bit integer. Out-of-range text wraps.
    XsByte, i8, "xs:byte"
);
integer_type!(
    /// `xs:short`
    XsShort, i16, "xs:short"
);
integer_type!(
    /// `xs:int`
    XsInt, i32, "xs:int"
);
integer_type!(
    /// `xs:long`
    XsLong, i64, "xs:long"
);

/// Lexical form of a floating point value, with the schema spellings of the
/// special values.
fn format_float(value: f64, finite: impl FnOnce() -> String) -> Cow<'static, str> {
    if value.is_nan() {
        Cow::Borrowed("NaN")
    } else if value == f64::INFINITY {
        Cow::Borrowed("INF")
    } else if value == f64::NEG_INFINITY {
        Cow::Borrowed("-INF")
    } else {
        Cow::Owned(finite())
    }
}

/// `xs:float`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XsFloat;

impl XsType for XsFloat {
    type Value = f32;
    const NAME: &'static str = "xs:float";

    /// Finite values too large for `f32` become infinite and are `Defaulted`.
    fn parse(text: &str) -> Lexical<f32> {
        let wide = parse_double(text);
        let narrow = *wide.as_value() as f32;
        let fits = narrow.is_finite() || !wide.as_value().is_finite();
        wide.map(|_| narrow).and_check(fits)
    }

    fn format(value: &f32) -> Cow<'_, str> {
        format_float(f64::from(*value), || value.to_string())
    }
}

/// `xs:double`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XsDouble;

impl XsType for XsDouble {
    type Value = f64;
    const NAME: &'static str = "xs:double";

    fn parse(text: &str) -> Lexical<f64> {
        parse_double(text)
    }

    fn format(value: &f64) -> Cow<'_, str> {
        format_float(*value, || value.to_string())
    }
}

macro_rules! string_type {
    ($(#[$doc:meta])* $name:ident, $xs:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl XsType for $name {
            type Value = String;
            const NAME: &'static str = $xs;

            fn parse(text: &str) -> Lexical<String> {
                Lexical::Parsed(text.to_owned())
            }

            fn format(value: &String) -> Cow<'_, str> {
                Cow::Borrowed(value.as_str())
            }
        }
    };
}

string_type!(
    /// `xs:string`
    XsString, "xs:string"
);
string_type!(
    /// `xs:ID`
    XsId, "xs:ID"
);
string_type!(
    /// `xs:IDREF`
    XsIdRef, "xs:IDREF"
);
string_type!(
    /// `xs:integer`, kept as text so arbitrary precision survives
    XsInteger, "xs:integer"
);
string_type!(
    /// `xs:decimal`, kept as text so arbitrary precision survives
    XsDecimal, "xs:decimal"
);
string_type!(
    /// `xs:duration`
    XsDuration, "xs:duration"
);
string_type!(
    /// `xs:QName`, prefix included verbatim
    XsQName, "xs:QName"
);

macro_rules! calendar_type {
    ($(#[$doc:meta])* $name:ident, $xs:literal, $parse:path, $format:path) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl XsType for $name {
            type Value = CalendarTimestamp;
            const NAME: &'static str = $xs;

            fn parse(text: &str) -> Lexical<CalendarTimestamp> {
                $parse(text, OffsetSign::default())
            }

            fn format(value: &CalendarTimestamp) -> Cow<'_, str> {
                Cow::Owned($format(value, OffsetSign::default()))
            }

            fn parse_with(text: &str, options: &CodecOptions) -> Lexical<CalendarTimestamp> {
                $parse(text, options.offset_sign)
            }

            fn format_with<'v>(value: &'v CalendarTimestamp, options: &CodecOptions) -> Cow<'v, str> {
                Cow::Owned($format(value, options.offset_sign))
            }
        }
    };
}

calendar_type!(
    /// `xs:dateTime`. Fractional seconds are truncated on read.
    XsDateTime, "xs:dateTime", timestamp::parse_date_time_with, timestamp::format_date_time_with
);
calendar_type!(
    /// `xs:date`
    XsDate, "xs:date", timestamp::parse_date_with, timestamp::format_date_with
);
calendar_type!(
    /// `xs:time`
    XsTime, "xs:time", timestamp::parse_time_with, timestamp::format_time_with
);

/// `xs:base64Binary`. Text outside the alphabet is skipped on read; the value
/// is `Defaulted` when anything other than whitespace and padding was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XsBase64Binary;

impl XsType for XsBase64Binary {
    type Value = Vec<u8>;
    const NAME: &'static str = "xs:base64Binary";

    fn parse(text: &str) -> Lexical<Vec<u8>> {
        let clean = text
            .bytes()
            .all(|b| base64::is_symbol(b) || b == base64::PAD || b.is_ascii_whitespace());
        Lexical::new(base64::decode(text), clean)
    }

    fn format(value: &Vec<u8>) -> Cow<'_, str> {
        Cow::Owned(base64::encode(value))
    }
}

/// Scalar type selected at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Id,
    IdRef,
    Integer,
    Decimal,
    Duration,
    QName,
    DateTime,
    Date,
    Time,
    Base64Binary,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 18] = [
        ScalarKind::Boolean,
        ScalarKind::Byte,
        ScalarKind::Short,
        ScalarKind::Int,
        ScalarKind::Long,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::String,
        ScalarKind::Id,
        ScalarKind::IdRef,
        ScalarKind::Integer,
        ScalarKind::Decimal,
        ScalarKind::Duration,
        ScalarKind::QName,
        ScalarKind::DateTime,
        ScalarKind::Date,
        ScalarKind::Time,
        ScalarKind::Base64Binary,
    ];

    /// Schema type name, e.g. `xs:int`
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarKind::Boolean => XsBoolean::NAME,
            ScalarKind::Byte => XsByte::NAME,
            ScalarKind::Short => XsShort::NAME,
            ScalarKind::Int => XsInt::NAME,
            ScalarKind::Long => XsLong::NAME,
            ScalarKind::Float => XsFloat::NAME,
            ScalarKind::Double => XsDouble::NAME,
            ScalarKind::String => XsString::NAME,
            ScalarKind::Id => XsId::NAME,
            ScalarKind::IdRef => XsIdRef::NAME,
            ScalarKind::Integer => XsInteger::NAME,
            ScalarKind::Decimal => XsDecimal::NAME,
            ScalarKind::Duration => XsDuration::NAME,
            ScalarKind::QName => XsQName::NAME,
            ScalarKind::DateTime => XsDateTime::NAME,
            ScalarKind::Date => XsDate::NAME,
            ScalarKind::Time => XsTime::NAME,
            ScalarKind::Base64Binary => XsBase64Binary::NAME,
        }
    }

    /// Look a kind up by schema local name (`int`) or prefixed name (`xs:int`).
    /// Any prefix is accepted.
    pub fn from_type_name(name: &str) -> Option<ScalarKind> {
        let local = name.rsplit_once(':').map_or(name, |(_, local)| local);
        ScalarKind::ALL
            .into_iter()
            .find(|kind| kind.type_name().strip_prefix("xs:") == Some(local))
    }
}

/// A decoded scalar of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Any string-derived type
    Text(String),
    DateTime(CalendarTimestamp),
    Date(CalendarTimestamp),
    Time(CalendarTimestamp),
    Binary(Vec<u8>),
}

/// Decode a scalar whose type is only known at runtime.
pub fn read_scalar<C: XmlCursor + ?Sized>(
    kind: ScalarKind,
    cursor: &mut C,
    options: &CodecOptions,
) -> Result<ScalarValue> {
    Ok(match kind {
        ScalarKind::Boolean => ScalarValue::Boolean(XsBoolean::read_with(cursor, options)?),
        ScalarKind::Byte => ScalarValue::Byte(XsByte::read_with(cursor, options)?),
        ScalarKind::Short => ScalarValue::Short(XsShort::read_with(cursor, options)?),
        ScalarKind::Int => ScalarValue::Int(XsInt::read_with(cursor, options)?),
        ScalarKind::Long => ScalarValue::Long(XsLong::read_with(cursor, options)?),
        ScalarKind::Float => ScalarValue::Float(XsFloat::read_with(cursor, options)?),
        ScalarKind::Double => ScalarValue::Double(XsDouble::read_with(cursor, options)?),
        ScalarKind::String
        | ScalarKind::Id
        | ScalarKind::IdRef
        | ScalarKind::Integer
        | ScalarKind::Decimal
        | ScalarKind::Duration
        | ScalarKind::QName => ScalarValue::Text(XsString::read_with(cursor, options)?),
        ScalarKind::DateTime => ScalarValue::DateTime(XsDateTime::read_with(cursor, options)?),
        ScalarKind::Date => ScalarValue::Date(XsDate::read_with(cursor, options)?),
        ScalarKind::Time => ScalarValue::Time(XsTime::read_with(cursor, options)?),
        ScalarKind::Base64Binary => ScalarValue::Binary(XsBase64Binary::read_with(cursor, options)?),
    })
}

/// Encode a scalar of any kind as character content.
pub fn write_scalar<W: XmlWriter + ?Sized>(
    writer: &mut W,
    value: &ScalarValue,
    options: &CodecOptions,
) -> Result<usize> {
    match value {
        ScalarValue::Boolean(v) => XsBoolean::write_with(writer, v, options),
        ScalarValue::Byte(v) => XsByte::write_with(writer, v, options),
        ScalarValue::Short(v) => XsShort::write_with(writer, v, options),
        ScalarValue::Int(v) => XsInt::write_with(writer, v, options),
        ScalarValue::Long(v) => XsLong::write_with(writer, v, options),
        ScalarValue::Float(v) => XsFloat::write_with(writer, v, options),
        ScalarValue::Double(v) => XsDouble::write_with(writer, v, options),
        ScalarValue::Text(v) => XsString::write_with(writer, v, options),
        ScalarValue::DateTime(v) => XsDateTime::write_with(writer, v, options),
        ScalarValue::Date(v) => XsDate::write_with(writer, v, options),
        ScalarValue::Time(v) => XsTime::write_with(writer, v, options),
        ScalarValue::Binary(v) => XsBase64Binary::write_with(writer, v, options),
    }
}
