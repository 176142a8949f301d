//! XML Attribute Parsing
//!
//! Parses XML attributes from tag content.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char};
use memchr::memchr;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: &'a [u8],
    /// Attribute value (entities decoded)
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    /// Namespace prefix (before colon) and local name
    pub fn split_name(&self) -> (Option<&'a [u8]>, &'a [u8]) {
        split_name(self.name)
    }
}

/// Split a qualified name into prefix and local name at the first colon
pub fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr(b':', name) {
        Some(colon_pos) => (Some(&name[..colon_pos]), &name[colon_pos + 1..]),
        None => (None, name),
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
/// Every attribute needs a quoted value; the error names the first
/// construct that breaks that rule.
pub fn parse_attributes(input: &[u8]) -> Result<Vec<Attribute<'_>>, &'static str> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            return Ok(attrs);
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            return Err("attribute name must start with letter, underscore, or colon");
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if input.get(pos) != Some(&b'=') {
            return Err("attribute value required");
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err("attribute value must be quoted"),
        };
        pos += 1;
        let value_start = pos;
        let Some(len) = memchr(quote, &input[value_start..]) else {
            return Err("attribute value has mismatched quotes");
        };
        pos = value_start + len + 1;

        if attrs.iter().any(|a: &Attribute<'_>| a.name == name) {
            return Err("duplicate attribute");
        }
        attrs.push(Attribute {
            name,
            value: decode_text(&input[value_start..value_start + len]),
        });

        if pos < input.len() && !is_whitespace(input[pos]) {
            return Err("whitespace required between attributes");
        }
    }
}

/// Check if byte is whitespace
#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
