//! Error types for xsmarshal.
//!
//! Every variant is a stream failure: the cursor or writer could not do what the
//! marshalling code asked of it. Malformed scalar text is not an error unless the
//! caller opts into strict decoding, in which case it surfaces as [`Error::Lexical`].

use thiserror::Error;

/// Errors raised by cursors, writers, and the codecs driving them.
#[derive(Debug, Error)]
pub enum Error {
    /// The document could not be tokenized at the given byte offset.
    #[error("malformed document at byte {position}: {message}")]
    Malformed {
        /// What went wrong
        message: String,
        /// Byte offset into the input
        position: usize,
    },

    /// The document ended while elements were still open.
    #[error("document ended before `{open}` was closed")]
    UnexpectedEof {
        /// Qualified name of the innermost open element
        open: String,
    },

    /// An end tag did not match the innermost open element.
    #[error("end tag `{found}` does not match open element `{expected}`")]
    MismatchedEndTag {
        /// Qualified name of the open element
        expected: String,
        /// Qualified name found in the end tag
        found: String,
    },

    /// After scanning attributes the cursor could not return to their element.
    #[error("unable to return to the owning element after reading attributes")]
    LostOwningElement,

    /// A tree build was requested while the cursor was not on a start element.
    #[error("cursor is not positioned on a start element")]
    NotOnStartElement,

    /// The writer was asked to close an element that was never opened.
    #[error("end element written with no open element")]
    UnbalancedEndElement,

    /// The writer was asked for an attribute after the start tag was closed.
    #[error("attribute `{name}` written outside a start tag")]
    AttributeOutsideStartTag {
        /// Qualified name of the attribute
        name: String,
    },

    /// Strict decoding rejected lexically invalid text.
    #[error("invalid {type_name} lexical value: {text:?}")]
    Lexical {
        /// Schema type name, e.g. `xs:int`
        type_name: &'static str,
        /// Text that failed to parse
        text: String,
    },

    /// The underlying sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed-document error.
    pub fn malformed(message: impl Into<String>, position: usize) -> Self {
        Error::Malformed {
            message: message.into(),
            position,
        }
    }

    /// Create a strict-mode lexical error.
    pub fn lexical(type_name: &'static str, text: impl Into<String>) -> Self {
        Error::Lexical {
            type_name,
            text: text.into(),
        }
    }

    /// Whether this error came from the document stream rather than from strict decoding.
    pub fn is_stream_failure(&self) -> bool {
        !matches!(self, Error::Lexical { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
