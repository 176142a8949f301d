//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks shared by the reader
//! and the writer:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: State machine for XML token extraction
//! - Entities: XML entity decoding with Cow (zero-copy when possible) and escaping
//! - Attributes: Attribute parsing and extraction
//! - Namespace: Stack-based prefix resolution

pub mod attributes;
pub mod entities;
pub mod namespace;
pub mod scanner;
pub mod tokenizer;
