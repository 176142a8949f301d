//! XML Reader Module
//!
//! - TextReader: forward-only cursor over an in-memory document
//! - Node: the resolved node record the reader is positioned on

mod node;
mod text;

pub use text::TextReader;
