//! Text Reader
//!
//! Forward-only [`XmlCursor`] over an in-memory document. Built on the pull
//! tokenizer; adds element nesting checks, namespace resolution and
//! in-place attribute navigation.

use super::node::{NodeAttribute, NodeName, ReaderNode};
use crate::core::attributes::parse_attributes;
use crate::core::namespace::{ns, NamespaceResolver};
use crate::core::tokenizer::{Token, TokenKind, Tokenizer};
use crate::cursor::{NodeKind, XmlCursor};
use crate::error::{Error, Result};
use std::borrow::Cow;
use tracing::debug;

/// Pull cursor over a UTF-8 document held in memory
///
/// The XML declaration is consumed silently. Whitespace outside the root
/// element is skipped; whitespace inside it is reported as
/// [`NodeKind::Whitespace`]. Predefined and numeric entity references are
/// expanded into the surrounding text, so [`NodeKind::EntityReference`] is
/// never produced.
pub struct TextReader<'a> {
    tokenizer: Tokenizer<'a>,
    /// Offset of the first invalid UTF-8 byte, reported on the first advance
    invalid_utf8: Option<usize>,
    namespaces: NamespaceResolver,
    /// Qualified names of the open elements, outermost first
    open: Vec<&'a str>,
    node: ReaderNode<'a>,
    /// Index into `node.attributes` while positioned on an attribute
    attribute: Option<usize>,
    finished: bool,
}

impl<'a> TextReader<'a> {
    /// Create a reader over raw document bytes, which must be UTF-8
    pub fn new(input: &'a [u8]) -> Self {
        TextReader {
            tokenizer: Tokenizer::new(input),
            invalid_utf8: std::str::from_utf8(input).err().map(|e| e.valid_up_to()),
            namespaces: NamespaceResolver::new(),
            open: Vec::new(),
            node: ReaderNode::default(),
            attribute: None,
            finished: false,
        }
    }

    /// Create a reader over a document string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'a str) -> Self {
        Self::new(input.as_bytes())
    }

    /// Byte offset of the tokenizer in the input
    pub fn position(&self) -> usize {
        self.tokenizer.position()
    }

    fn current_attribute(&self) -> Option<&NodeAttribute<'a>> {
        self.attribute.and_then(|i| self.node.attributes.get(i))
    }

    fn current_name(&self) -> Option<&NodeName<'a>> {
        match self.current_attribute() {
            Some(attr) => Some(&attr.name),
            None => self.node.name.as_ref(),
        }
    }

    /// Read tokens until one produces a node. `Ok(false)` at a clean end.
    fn read_node(&mut self) -> Result<bool> {
        if let Some(position) = self.invalid_utf8.take() {
            return Err(Error::malformed("invalid UTF-8", position));
        }

        loop {
            let Some(token) = self.tokenizer.next_token() else {
                return Err(match self.tokenizer.error() {
                    Some(e) => Error::malformed(e.message.clone(), e.position),
                    None => Error::malformed("token stream ended early", self.tokenizer.position()),
                });
            };
            let position = token.span.0;

            match token.kind {
                TokenKind::Eof => {
                    return match self.open.last() {
                        Some(open) => Err(Error::UnexpectedEof {
                            open: (*open).to_owned(),
                        }),
                        None => Ok(false),
                    };
                }
                TokenKind::StartTag | TokenKind::EmptyTag => {
                    self.start_element(&token)?;
                    return Ok(true);
                }
                TokenKind::EndTag => {
                    self.end_element(&token)?;
                    return Ok(true);
                }
                TokenKind::Text => {
                    let content = utf8_cow(token.content.unwrap_or_default(), position)?;
                    let blank = content.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
                    if self.open.is_empty() {
                        if blank {
                            continue;
                        }
                        return Err(Error::malformed("character content outside the root element", position));
                    }
                    let kind = if blank { NodeKind::Whitespace } else { NodeKind::Text };
                    self.node = ReaderNode::leaf(kind, self.open.len(), Some(content));
                    return Ok(true);
                }
                TokenKind::CData => {
                    if self.open.is_empty() {
                        return Err(Error::malformed("CDATA section outside the root element", position));
                    }
                    let content = utf8_cow(token.content.unwrap_or_default(), position)?;
                    self.node = ReaderNode::leaf(NodeKind::CData, self.open.len(), Some(content));
                    return Ok(true);
                }
                TokenKind::Comment => {
                    let content = utf8_cow(token.content.unwrap_or_default(), position)?;
                    self.node = ReaderNode::leaf(NodeKind::Comment, self.open.len(), Some(content));
                    return Ok(true);
                }
                TokenKind::ProcessingInstruction => {
                    let target = utf8(token.name.unwrap_or_default(), position)?;
                    let data = utf8_cow(token.content.unwrap_or_default(), position)?;
                    self.node = ReaderNode {
                        name: Some(NodeName::unresolved(target)),
                        ..ReaderNode::leaf(NodeKind::ProcessingInstruction, self.open.len(), Some(data))
                    };
                    return Ok(true);
                }
                TokenKind::DocType => {
                    let name = token.name.map(|n| utf8(n, position)).transpose()?;
                    self.node = ReaderNode {
                        name: name.map(NodeName::unresolved),
                        ..ReaderNode::leaf(NodeKind::DocumentType, 0, None)
                    };
                    return Ok(true);
                }
                TokenKind::XmlDeclaration => continue,
            }
        }
    }

    fn start_element(&mut self, token: &Token<'a>) -> Result<()> {
        let position = token.span.0;
        let qname = utf8(token.name.unwrap_or_default(), position)?;
        let parsed = parse_attributes(token.attributes).map_err(|msg| Error::malformed(msg, position))?;

        self.namespaces.push_scope();
        let mut attributes = Vec::with_capacity(parsed.len());
        for attr in parsed {
            let name = NodeName::unresolved(utf8(attr.name, position)?);
            let value = utf8_cow(attr.value, position)?;
            if name.is_namespace_declaration() {
                let prefix = name.prefix.map(|_| name.local_name);
                self.namespaces.declare(prefix, &value);
            }
            attributes.push(NodeAttribute { name, value });
        }

        // Declarations on this element are in scope for its own names
        for attr in &mut attributes {
            attr.name.namespace_uri = if attr.name.is_namespace_declaration() {
                Some(ns::XMLNS.to_owned())
            } else {
                attr.name
                    .prefix
                    .and_then(|p| self.namespaces.resolve(Some(p)))
                    .map(str::to_owned)
            };
        }
        let name = self.resolve_element(qname);

        let depth = self.open.len();
        let is_empty = token.kind == TokenKind::EmptyTag;
        if is_empty {
            self.namespaces.pop_scope();
        } else {
            self.open.push(qname);
        }

        self.node = ReaderNode {
            kind: NodeKind::StartElement,
            depth,
            is_empty,
            name: Some(name),
            value: None,
            attributes,
        };
        Ok(())
    }

    fn end_element(&mut self, token: &Token<'a>) -> Result<()> {
        let position = token.span.0;
        let qname = utf8(token.name.unwrap_or_default(), position)?;
        match self.open.pop() {
            None => return Err(Error::malformed(format!("end tag </{qname}> without a start tag"), position)),
            Some(expected) if expected != qname => {
                return Err(Error::MismatchedEndTag {
                    expected: expected.to_owned(),
                    found: qname.to_owned(),
                })
            }
            Some(_) => {}
        }

        let name = self.resolve_element(qname);
        self.namespaces.pop_scope();
        self.node = ReaderNode {
            kind: NodeKind::EndElement,
            depth: self.open.len(),
            name: Some(name),
            ..ReaderNode::default()
        };
        Ok(())
    }

    /// Element names take the default namespace when unprefixed
    fn resolve_element(&self, qname: &'a str) -> NodeName<'a> {
        let mut name = NodeName::unresolved(qname);
        name.namespace_uri = self.namespaces.resolve(name.prefix).map(str::to_owned);
        name
    }
}

impl XmlCursor for TextReader<'_> {
    fn advance(&mut self) -> Result<bool> {
        self.attribute = None;
        if self.finished {
            return Ok(false);
        }

        let result = self.read_node();
        if !matches!(result, Ok(true)) {
            self.finished = true;
            self.node = ReaderNode::default();
        }
        if let Err(err) = &result {
            debug!(error = %err, position = self.tokenizer.position(), "reader stopped");
        }
        result
    }

    fn node_kind(&self) -> NodeKind {
        if self.attribute.is_some() {
            NodeKind::Attribute
        } else {
            self.node.kind
        }
    }

    fn depth(&self) -> usize {
        if self.attribute.is_some() {
            self.node.depth + 1
        } else {
            self.node.depth
        }
    }

    fn is_empty_element(&self) -> bool {
        self.attribute.is_none() && self.node.is_empty
    }

    fn local_name(&self) -> Option<&str> {
        self.current_name().map(|n| n.local_name)
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.current_name().and_then(|n| n.namespace_uri.as_deref())
    }

    fn prefix(&self) -> Option<&str> {
        self.current_name().and_then(|n| n.prefix)
    }

    fn value(&self) -> Option<&str> {
        match self.current_attribute() {
            Some(attr) => Some(&*attr.value),
            None => self.node.value.as_deref(),
        }
    }

    fn has_attributes(&self) -> bool {
        self.attribute.is_none() && !self.node.attributes.is_empty()
    }

    fn move_to_next_attribute(&mut self) -> bool {
        if self.node.kind != NodeKind::StartElement {
            return false;
        }
        let next = self.attribute.map_or(0, |i| i + 1);
        if next < self.node.attributes.len() {
            self.attribute = Some(next);
            true
        } else {
            false
        }
    }

    fn move_to_element(&mut self) -> bool {
        if self.attribute.take().is_some() {
            return true;
        }
        self.node.kind == NodeKind::StartElement
    }
}

/// Borrow bytes as UTF-8. Slices taken at markup delimiters of valid input
/// are always valid; the check guards inputs already reported as invalid.
fn utf8(bytes: &[u8], position: usize) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::malformed("invalid UTF-8", position))
}

fn utf8_cow(bytes: Cow<'_, [u8]>, position: usize) -> Result<Cow<'_, str>> {
    match bytes {
        Cow::Borrowed(b) => utf8(b, position).map(Cow::Borrowed),
        Cow::Owned(v) => String::from_utf8(v)
            .map(Cow::Owned)
            .map_err(|_| Error::malformed("invalid UTF-8", position)),
    }
}
