//! XML Entity Decoding and Escaping
//!
//! Handles decoding of XML entities:
//! - Predefined entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! References to any other entity are left in the text as written.
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode all entity references in the input
fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while let Some(amp_offset) = memchr(b'&', &input[pos..]) {
        result.extend_from_slice(&input[pos..pos + amp_offset]);
        pos += amp_offset;

        let decoded = memchr(b';', &input[pos..]).and_then(|semi_offset| {
            let entity = &input[pos + 1..pos + semi_offset];
            decode_entity(entity).map(|c| (c, semi_offset + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                let mut utf8 = [0u8; 4];
                result.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                pos += consumed;
            }
            None => {
                // Unknown or unterminated reference, keep the ampersand
                result.push(b'&');
                pos += 1;
            }
        }
    }

    result.extend_from_slice(&input[pos..]);
    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<char> {
    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => parse_codepoint(hex, 16),
        [b'#', dec @ ..] => parse_codepoint(dec, 10),
        _ => None,
    }
}

fn parse_codepoint(digits: &[u8], radix: u32) -> Option<char> {
    let digits = std::str::from_utf8(digits).ok()?;
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    let codepoint = u32::from_str_radix(digits, radix).ok()?;
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Escape character content for output.
pub fn escape_text(input: &str) -> Cow<'_, str> {
    escape_with(input, |c| match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        _ => None,
    })
}

/// Escape an attribute value for output inside double quotes.
///
/// Tabs and line breaks become character references so they survive
/// attribute value normalization on the way back in.
pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    escape_with(input, |c| match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\t' => Some("&#9;"),
        '\n' => Some("&#10;"),
        '\r' => Some("&#13;"),
        _ => None,
    })
}

fn escape_with(input: &str, replacement: impl Fn(char) -> Option<&'static str>) -> Cow<'_, str> {
    // Fast path: check if any escaping needed
    let Some(first) = input.char_indices().find(|&(_, c)| replacement(c).is_some()) else {
        return Cow::Borrowed(input);
    };

    let mut result = String::with_capacity(input.len() + 16);
    result.push_str(&input[..first.0]);
    for c in input[first.0..].chars() {
        match replacement(c) {
            Some(escaped) => result.push_str(escaped),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}
