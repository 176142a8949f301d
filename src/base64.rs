//! Base64 Codec
//!
//! Binary content embedded in text nodes. Encoding is plain RFC 4648 with
//! padding. Decoding is forgiving: every character outside the alphabet (line
//! breaks, spaces, stray punctuation, padding) is skipped as noise, and a short
//! final group decodes to as many whole bytes as its symbols carry.

use ::base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use ::base64::engine::DecodePaddingMode;
use ::base64::Engine;
use tracing::trace;

/// The 64-symbol encoding alphabet.
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding symbol appended to short final groups.
pub const PAD: u8 = b'=';

/// Decoder over already-filtered symbols: no padding required, low bits of a
/// short final group ignored.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &::base64::alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Whether a byte is one of the 64 alphabet symbols.
#[inline]
pub fn is_symbol(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/'
}

/// Encode bytes as padded base64 text. Empty input yields an empty string.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text, skipping noise. Never fails.
pub fn decode(text: &str) -> Vec<u8> {
    let mut symbols: Vec<u8> = text.bytes().filter(|&b| is_symbol(b)).collect();
    let skipped = text.len() - symbols.len();
    if skipped > 0 {
        trace!(skipped, "skipped non-alphabet characters in base64 text");
    }

    // A single trailing symbol carries fewer than 8 bits.
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }

    // Only alphabet symbols remain and the length is a valid unpadded length,
    // so the engine has nothing left to reject.
    LENIENT.decode(&symbols).unwrap_or_default()
}

/// Decode optional text; absent input yields an absent result.
pub fn decode_opt(text: Option<&str>) -> Option<Vec<u8>> {
    text.map(decode)
}
