//! Document Cursor and Writer Interfaces
//!
//! The marshalling core never owns a document. It is handed a forward-only
//! cursor to read from, or a writer to append to, by the generated record code,
//! and advances it cooperatively with that code.
//!
//! [`crate::reader::TextReader`] and [`crate::writer::TextWriter`] are the
//! in-crate implementations; anything else that follows the same event model
//! (libxml-style depth numbering, attributes visited in place) works too.

use crate::error::Result;

/// Type of the node the cursor is positioned on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Not positioned on a node (before the first advance or after the end)
    None,
    /// Start of an element, or a self-closing element
    StartElement,
    /// End of a non-empty element
    EndElement,
    /// Character content
    Text,
    /// CDATA section content
    CData,
    /// Unexpanded entity reference
    EntityReference,
    /// An attribute of the current element (after `move_to_next_attribute`)
    Attribute,
    /// Whitespace-only character content
    Whitespace,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
    /// Document type declaration
    DocumentType,
    /// Anything else a cursor implementation chooses to report
    Other,
}

impl NodeKind {
    /// Whether this node carries character data that belongs to a scalar value.
    ///
    /// Whitespace-only runs count, so a blank `xs:string` reads back as
    /// written instead of as `""`. Generic trees do not use this and skip them.
    #[inline]
    pub fn is_character_data(self) -> bool {
        matches!(
            self,
            NodeKind::Text | NodeKind::CData | NodeKind::EntityReference | NodeKind::Whitespace
        )
    }
}

/// A forward-only pull cursor over document events.
///
/// Depth follows the libxml reader convention: the root element is at depth 0,
/// its content at depth 1, an element's end event at the element's own depth,
/// and an attribute one deeper than its element. Self-closing elements report
/// `is_empty_element` and produce no end event.
pub trait XmlCursor {
    /// Move to the next node. `Ok(false)` means the document ended cleanly.
    fn advance(&mut self) -> Result<bool>;

    /// Kind of the current node.
    fn node_kind(&self) -> NodeKind;

    /// Nesting depth of the current node.
    fn depth(&self) -> usize;

    /// Whether the current start element is self-closing.
    fn is_empty_element(&self) -> bool;

    /// Local name of the current element or attribute.
    fn local_name(&self) -> Option<&str>;

    /// Resolved namespace URI of the current element or attribute.
    fn namespace_uri(&self) -> Option<&str>;

    /// Namespace prefix of the current element or attribute.
    fn prefix(&self) -> Option<&str>;

    /// Value of the current attribute or character data node.
    fn value(&self) -> Option<&str>;

    /// Whether the current element carries attributes.
    fn has_attributes(&self) -> bool;

    /// Move to the next attribute of the current element.
    fn move_to_next_attribute(&mut self) -> bool;

    /// Move from an attribute back to its element. True when positioned on the element afterwards.
    fn move_to_element(&mut self) -> bool;
}

/// An append-only document writer.
///
/// Every call returns the number of bytes it pushed to the underlying sink,
/// which may be 0 when output is buffered.
pub trait XmlWriter {
    /// Open an element, declaring its namespace if it is not already in scope.
    fn write_start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<usize>;

    /// Add an attribute to the element just opened.
    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<usize>;

    /// Write escaped character content.
    fn write_text(&mut self, text: &str) -> Result<usize>;

    /// Close the innermost open element.
    fn write_end_element(&mut self) -> Result<usize>;
}

impl<C: XmlCursor + ?Sized> XmlCursor for &mut C {
    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }
    fn node_kind(&self) -> NodeKind {
        (**self).node_kind()
    }
    fn depth(&self) -> usize {
        (**self).depth()
    }
    fn is_empty_element(&self) -> bool {
        (**self).is_empty_element()
    }
    fn local_name(&self) -> Option<&str> {
        (**self).local_name()
    }
    fn namespace_uri(&self) -> Option<&str> {
        (**self).namespace_uri()
    }
    fn prefix(&self) -> Option<&str> {
        (**self).prefix()
    }
    fn value(&self) -> Option<&str> {
        (**self).value()
    }
    fn has_attributes(&self) -> bool {
        (**self).has_attributes()
    }
    fn move_to_next_attribute(&mut self) -> bool {
        (**self).move_to_next_attribute()
    }
    fn move_to_element(&mut self) -> bool {
        (**self).move_to_element()
    }
}

impl<W: XmlWriter + ?Sized> XmlWriter for &mut W {
    fn write_start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<usize> {
        (**self).write_start_element(prefix, local_name, namespace_uri)
    }
    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<usize> {
        (**self).write_attribute(prefix, local_name, namespace_uri, value)
    }
    fn write_text(&mut self, text: &str) -> Result<usize> {
        (**self).write_text(text)
    }
    fn write_end_element(&mut self) -> Result<usize> {
        (**self).write_end_element()
    }
}

/// Read the complete character value at the cursor.
///
/// On an attribute this is the attribute value. On a non-empty element the
/// cursor advances through every consecutive text, CDATA, entity-reference and
/// whitespace node, concatenating them, and stops on the first node of any other
/// kind (normally the element's end). A self-closing element reads as `""`.
pub fn read_entire_node_value<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<String> {
    if cursor.node_kind() == NodeKind::Attribute {
        return Ok(cursor.value().unwrap_or_default().to_owned());
    }

    let mut buffer = String::new();
    if cursor.is_empty_element() {
        return Ok(buffer);
    }

    while cursor.advance()? && cursor.node_kind().is_character_data() {
        if let Some(snippet) = cursor.value() {
            buffer.push_str(snippet);
        }
    }
    Ok(buffer)
}

/// Advance to the next start or end element, skipping everything in between.
///
/// Returns `Ok(false)` if the document ends first.
pub fn advance_to_next_start_or_end_element<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<bool> {
    while cursor.advance()? {
        if matches!(cursor.node_kind(), NodeKind::StartElement | NodeKind::EndElement) {
            return Ok(true);
        }
    }
    Ok(false)
}
