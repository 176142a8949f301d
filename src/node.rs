//! Generic Content Tree
//!
//! An owned element tree for content whose shape is unknown until runtime
//! ("any type" fields). Built from a cursor positioned on a start element,
//! written back through any [`XmlWriter`], and released by value.

use crate::cursor::{NodeKind, XmlCursor, XmlWriter};
use crate::error::{Error, Result};
use tracing::debug;

/// An element or attribute captured from a document
///
/// Attribute nodes carry their value in `text` and never have children or
/// attributes of their own. Element text is every text and CDATA run directly
/// inside the element, concatenated; `None` means the element had none.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericNode {
    /// Local name
    pub name: String,
    pub namespace_uri: Option<String>,
    pub prefix: Option<String>,
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<GenericNode>,
    /// Attributes in document order, namespace declarations included
    pub attributes: Vec<GenericNode>,
}

impl GenericNode {
    /// An element with no namespace, text, attributes or children
    pub fn new_element(name: impl Into<String>) -> Self {
        GenericNode {
            name: name.into(),
            ..GenericNode::default()
        }
    }

    /// An attribute node with the given value
    pub fn new_attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        GenericNode {
            name: name.into(),
            text: Some(value.into()),
            ..GenericNode::default()
        }
    }

    pub fn with_namespace(mut self, namespace_uri: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespace_uri = Some(namespace_uri.into());
        self.prefix = prefix.map(str::to_owned);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, attribute: GenericNode) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_child(mut self, child: GenericNode) -> Self {
        self.children.push(child);
        self
    }

    /// `prefix:name`, or just the name when unprefixed
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// First attribute with the given local name
    pub fn attribute(&self, name: &str) -> Option<&GenericNode> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Value of the first attribute with the given local name
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(|a| a.text.as_deref())
    }

    /// First child element with the given local name
    pub fn child(&self, name: &str) -> Option<&GenericNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GenericNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Build a tree from the start element at the cursor.
    ///
    /// On success the cursor is left on the element's end event, or on the
    /// element itself when it is self-closing. On failure everything built so
    /// far is dropped and no tree is returned.
    ///
    /// Each level of element nesting takes one stack frame and there is no
    /// depth limit, so a document nested deeper than the thread's stack allows
    /// overflows it. Bound nesting before building from untrusted input.
    pub fn build<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<GenericNode> {
        if cursor.node_kind() != NodeKind::StartElement {
            return Err(Error::NotOnStartElement);
        }
        let depth = cursor.depth();
        Self::build_element(cursor).inspect_err(|err| {
            debug!(depth, error = %err, "generic tree build aborted");
        })
    }

    fn build_element<C: XmlCursor + ?Sized>(cursor: &mut C) -> Result<GenericNode> {
        let depth = cursor.depth();
        let mut node = GenericNode {
            name: cursor.local_name().unwrap_or_default().to_owned(),
            namespace_uri: cursor.namespace_uri().map(str::to_owned),
            prefix: cursor.prefix().map(str::to_owned),
            ..GenericNode::default()
        };

        if cursor.has_attributes() {
            while cursor.move_to_next_attribute() {
                node.attributes.push(GenericNode {
                    name: cursor.local_name().unwrap_or_default().to_owned(),
                    namespace_uri: cursor.namespace_uri().map(str::to_owned),
                    prefix: cursor.prefix().map(str::to_owned),
                    text: cursor.value().map(str::to_owned),
                    ..GenericNode::default()
                });
            }
            if !cursor.move_to_element() {
                return Err(Error::LostOwningElement);
            }
        }

        if cursor.is_empty_element() {
            return Ok(node);
        }

        loop {
            if !cursor.advance()? {
                return Err(Error::UnexpectedEof {
                    open: node.qualified_name(),
                });
            }
            if cursor.depth() <= depth {
                return Ok(node);
            }
            match cursor.node_kind() {
                NodeKind::StartElement => node.children.push(Self::build_element(cursor)?),
                NodeKind::Text | NodeKind::CData => {
                    if let Some(value) = cursor.value() {
                        node.text.get_or_insert_with(String::new).push_str(value);
                    }
                }
                _ => {}
            }
        }
    }

    /// Write this element and its subtree.
    ///
    /// Returns the sum of the writer's byte counts. The first writer error
    /// stops the write and is returned as is; output already written stays.
    pub fn write<W: XmlWriter + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        let mut total =
            writer.write_start_element(self.prefix.as_deref(), &self.name, self.namespace_uri.as_deref())?;
        for attr in &self.attributes {
            total += writer.write_attribute(
                attr.prefix.as_deref(),
                &attr.name,
                attr.namespace_uri.as_deref(),
                attr.text.as_deref().unwrap_or_default(),
            )?;
        }
        if let Some(text) = &self.text {
            total += writer.write_text(text)?;
        }
        for child in &self.children {
            total += child.write(writer)?;
        }
        total += writer.write_end_element()?;
        Ok(total)
    }

    /// Release the tree: attributes, then text, then children, then names.
    pub fn release(self) {
        let GenericNode {
            name,
            namespace_uri,
            prefix,
            text,
            children,
            attributes,
        } = self;
        attributes.into_iter().for_each(GenericNode::release);
        drop(text);
        children.into_iter().for_each(GenericNode::release);
        drop((name, prefix, namespace_uri));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::ns;
    use crate::reader::TextReader;
    use crate::tracking;
    use crate::writer::{FailingSink, TextWriter};

    fn build_root(xml: &str) -> GenericNode {
        let mut reader = TextReader::from_str(xml);
        assert!(reader.advance().unwrap());
        GenericNode::build(&mut reader).unwrap()
    }

    fn to_xml(node: &GenericNode) -> (String, usize) {
        let mut writer = TextWriter::new(Vec::new());
        let count = node.write(&mut writer).unwrap();
        (String::from_utf8(writer.into_inner()).unwrap(), count)
    }

    const DOCUMENT: &str = "<p:root xmlns:p=\"urn:p\" xmlns=\"urn:d\" id=\"1\" p:flag=\"yes\">\
        head<child a=\"x\">inner</child>mid<![CDATA[<c>]]>\n  <p:other/>tail</p:root>";

    #[test]
    fn test_build_captures_structure() {
        let root = build_root(DOCUMENT);
        assert_eq!(root.name, "root");
        assert_eq!(root.prefix.as_deref(), Some("p"));
        assert_eq!(root.namespace_uri.as_deref(), Some("urn:p"));
        assert_eq!(root.text.as_deref(), Some("headmid<c>tail"));

        let names: Vec<&str> = root.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["p", "xmlns", "id", "flag"]);
        assert_eq!(root.attributes[0].namespace_uri.as_deref(), Some(ns::XMLNS));
        assert_eq!(root.attributes[3].namespace_uri.as_deref(), Some("urn:p"));
        assert_eq!(root.attribute_value("id"), Some("1"));
        assert!(root.attributes.iter().all(|a| a.children.is_empty() && a.attributes.is_empty()));

        assert_eq!(root.children.len(), 2);
        let child = root.child("child").unwrap();
        assert_eq!(child.namespace_uri.as_deref(), Some("urn:d"));
        assert_eq!(child.text.as_deref(), Some("inner"));
        assert_eq!(child.attribute_value("a"), Some("x"));
        let other = root.child("other").unwrap();
        assert_eq!(other.text, None);
        assert!(other.children.is_empty());
    }

    #[test]
    fn test_write_then_build_round_trips() {
        let root = build_root(DOCUMENT);
        let (xml, count) = to_xml(&root);
        assert_eq!(count, xml.len());
        assert_eq!(
            xml,
            "<p:root xmlns:p=\"urn:p\" xmlns=\"urn:d\" id=\"1\" p:flag=\"yes\">headmid&lt;c&gt;tail\
             <child a=\"x\">inner</child><p:other/></p:root>"
        );
        assert_eq!(build_root(&xml), root);
    }

    #[test]
    fn test_declaration_order_survives_round_trip() {
        for xml in [
            "<r p:a=\"1\" xmlns:p=\"urn:p\"/>",
            "<p:r b=\"2\" xmlns:p=\"urn:p\" xmlns=\"urn:d\"><c/></p:r>",
        ] {
            let root = build_root(xml);
            let (written, _) = to_xml(&root);
            assert_eq!(written, xml);
            let rebuilt = build_root(&written);
            let order = |node: &GenericNode| node.attributes.iter().map(GenericNode::qualified_name).collect::<Vec<_>>();
            assert_eq!(order(&rebuilt), order(&root));
            assert_eq!(rebuilt, root);
        }
    }

    #[test]
    fn test_written_twice_is_identical() {
        let root = build_root(DOCUMENT);
        assert_eq!(to_xml(&root), to_xml(&root));
    }

    #[test]
    fn test_whitespace_only_runs_are_not_text() {
        let root = build_root("<a>\n  <b/>\n  <b>x</b>\n</a>");
        assert_eq!(root.text, None);
        assert_eq!(root.children_named("b").count(), 2);

        let empty = build_root("<a></a>");
        assert_eq!(empty.text, None);
    }

    #[test]
    fn test_build_leaves_cursor_after_subtree() {
        let mut reader = TextReader::from_str("<r><a><x/></a><b/></r>");
        assert!(reader.advance().unwrap());
        assert!(reader.advance().unwrap());
        let a = GenericNode::build(&mut reader).unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(reader.node_kind(), NodeKind::EndElement);
        assert_eq!(reader.local_name(), Some("a"));

        assert!(reader.advance().unwrap());
        let b = GenericNode::build(&mut reader).unwrap();
        assert_eq!(b, GenericNode::new_element("b"));
        assert_eq!(reader.node_kind(), NodeKind::StartElement);
    }

    #[test]
    fn test_deeply_nested_document() {
        let levels = 200;
        let xml = format!("{}x{}", "<e>".repeat(levels), "</e>".repeat(levels));
        let root = build_root(&xml);
        let mut depth = 1;
        let mut node = &root;
        while let Some(child) = node.child("e") {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, levels);
        assert_eq!(node.text.as_deref(), Some("x"));
        assert_eq!(to_xml(&root).0, xml);
    }

    #[test]
    fn test_build_requires_start_element() {
        let mut reader = TextReader::from_str("<r/>");
        assert!(matches!(GenericNode::build(&mut reader), Err(Error::NotOnStartElement)));
    }

    #[test]
    fn test_build_fails_on_truncated_document() {
        let mut reader = TextReader::from_str("<r><a>text</a><b>");
        assert!(reader.advance().unwrap());
        assert!(matches!(GenericNode::build(&mut reader), Err(Error::UnexpectedEof { .. })));
    }

    #[test]
    fn test_programmatic_tree() {
        let tree = GenericNode::new_element("order")
            .with_namespace("urn:o", Some("o"))
            .with_attribute(GenericNode::new_attribute("id", "a<1"))
            .with_child(GenericNode::new_element("qty").with_text("3"))
            .with_child(GenericNode::new_element("note"));
        let (xml, _) = to_xml(&tree);
        assert_eq!(xml, "<o:order xmlns:o=\"urn:o\" id=\"a&lt;1\"><qty>3</qty><note/></o:order>");
        assert_eq!(tree.qualified_name(), "o:order");
    }

    #[test]
    fn test_sink_error_returned_unchanged() {
        let root = build_root(DOCUMENT);
        let mut writer = TextWriter::new(FailingSink);
        match root.write(&mut writer) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Writer that accepts a fixed number of calls, then fails
    struct CountingWriter {
        calls: usize,
        fail_on: usize,
    }

    impl CountingWriter {
        fn call(&mut self) -> Result<usize> {
            self.calls += 1;
            if self.calls == self.fail_on {
                Err(Error::UnbalancedEndElement)
            } else {
                Ok(1)
            }
        }
    }

    impl XmlWriter for CountingWriter {
        fn write_start_element(&mut self, _: Option<&str>, _: &str, _: Option<&str>) -> Result<usize> {
            self.call()
        }
        fn write_attribute(&mut self, _: Option<&str>, _: &str, _: Option<&str>, _: &str) -> Result<usize> {
            self.call()
        }
        fn write_text(&mut self, _: &str) -> Result<usize> {
            self.call()
        }
        fn write_end_element(&mut self) -> Result<usize> {
            self.call()
        }
    }

    #[test]
    fn test_write_is_fail_fast() {
        let root = build_root("<r a=\"1\">t<c/><d/></r>");
        // start r, attr a, text, start c, end c, start d, end d, end r
        let mut ok = CountingWriter { calls: 0, fail_on: usize::MAX };
        assert_eq!(root.write(&mut ok).unwrap(), 8);

        let mut failing = CountingWriter { calls: 0, fail_on: 4 };
        assert!(matches!(root.write(&mut failing), Err(Error::UnbalancedEndElement)));
        assert_eq!(failing.calls, 4);
    }

    /// One scripted cursor event
    struct Event {
        kind: NodeKind,
        depth: usize,
        empty: bool,
        name: Option<&'static str>,
        value: Option<&'static str>,
        attributes: &'static [(&'static str, &'static str)],
    }

    fn start(depth: usize, name: &'static str, attributes: &'static [(&'static str, &'static str)]) -> Event {
        Event { kind: NodeKind::StartElement, depth, empty: false, name: Some(name), value: None, attributes }
    }

    fn empty(depth: usize, name: &'static str) -> Event {
        Event { empty: true, ..start(depth, name, &[]) }
    }

    fn text(depth: usize, value: &'static str) -> Event {
        Event { kind: NodeKind::Text, depth, empty: false, name: None, value: Some(value), attributes: &[] }
    }

    fn end(depth: usize, name: &'static str) -> Event {
        Event { kind: NodeKind::EndElement, ..start(depth, name, &[]) }
    }

    /// Cursor replaying prepared events without allocating as it advances
    struct ScriptedCursor {
        events: Vec<Event>,
        pos: usize,
        attribute: Option<usize>,
        /// Advancing past the last event fails instead of ending cleanly
        fail_at_end: bool,
        /// `move_to_element` refuses to leave the attributes
        lose_element: bool,
    }

    impl ScriptedCursor {
        fn new(events: Vec<Event>) -> Self {
            ScriptedCursor { events, pos: 0, attribute: None, fail_at_end: false, lose_element: false }
        }

        fn current(&self) -> Option<&Event> {
            self.events.get(self.pos)
        }

        fn current_attribute(&self) -> Option<&(&'static str, &'static str)> {
            self.attribute.and_then(|i| self.current()?.attributes.get(i))
        }
    }

    impl XmlCursor for ScriptedCursor {
        fn advance(&mut self) -> Result<bool> {
            self.attribute = None;
            if self.pos + 1 < self.events.len() {
                self.pos += 1;
                return Ok(true);
            }
            self.pos = self.events.len();
            if self.fail_at_end {
                Err(Error::LostOwningElement)
            } else {
                Ok(false)
            }
        }
        fn node_kind(&self) -> NodeKind {
            match (self.attribute, self.current()) {
                (Some(_), _) => NodeKind::Attribute,
                (None, Some(e)) => e.kind,
                (None, None) => NodeKind::None,
            }
        }
        fn depth(&self) -> usize {
            self.current().map_or(0, |e| e.depth + usize::from(self.attribute.is_some()))
        }
        fn is_empty_element(&self) -> bool {
            self.attribute.is_none() && self.current().is_some_and(|e| e.empty)
        }
        fn local_name(&self) -> Option<&str> {
            match self.current_attribute() {
                Some(&(name, _)) => Some(name),
                None => self.current()?.name,
            }
        }
        fn namespace_uri(&self) -> Option<&str> {
            None
        }
        fn prefix(&self) -> Option<&str> {
            None
        }
        fn value(&self) -> Option<&str> {
            match self.current_attribute() {
                Some(&(_, value)) => Some(value),
                None => self.current()?.value,
            }
        }
        fn has_attributes(&self) -> bool {
            self.current().is_some_and(|e| !e.attributes.is_empty())
        }
        fn move_to_next_attribute(&mut self) -> bool {
            let next = self.attribute.map_or(0, |i| i + 1);
            if self.current().is_some_and(|e| next < e.attributes.len()) {
                self.attribute = Some(next);
                true
            } else {
                false
            }
        }
        fn move_to_element(&mut self) -> bool {
            if self.lose_element {
                return false;
            }
            self.attribute = None;
            true
        }
    }

    /// A document cut off inside a grandchild, after a complete child
    fn truncated() -> Vec<Event> {
        vec![
            start(0, "root", &[("id", "1"), ("kind", "test")]),
            start(1, "first", &[("n", "1")]),
            text(2, "complete child"),
            end(1, "first"),
            start(1, "second", &[]),
            text(2, "partial"),
            start(2, "grandchild", &[("deep", "yes")]),
            empty(3, "leaf"),
        ]
    }

    /// Run `f`, returning the net bytes it left allocated on this thread
    fn net_allocation(f: impl FnOnce()) -> isize {
        let before = tracking::allocated();
        f();
        tracking::allocated() - before
    }

    #[test]
    fn test_scripted_build_succeeds() {
        let mut events = truncated();
        events.extend([end(2, "grandchild"), end(1, "second"), end(0, "root")]);
        let mut cursor = ScriptedCursor::new(events);
        let root = GenericNode::build(&mut cursor).unwrap();
        assert_eq!(root.attribute_value("kind"), Some("test"));
        assert_eq!(root.child("second").unwrap().text.as_deref(), Some("partial"));
        assert!(root.child("second").unwrap().child("grandchild").unwrap().child("leaf").is_some());
    }

    #[test]
    fn test_abort_on_read_error_releases_partial_tree() {
        let run = || {
            let mut cursor = ScriptedCursor::new(truncated());
            cursor.fail_at_end = true;
            let allocations = tracking::allocations();
            let result = GenericNode::build(&mut cursor);
            assert!(tracking::allocations() > allocations);
            assert!(matches!(result, Err(Error::LostOwningElement)));
        };
        // First run settles any one-time allocations outside the build
        run();
        assert_eq!(net_allocation(run), 0);
    }

    #[test]
    fn test_abort_on_premature_end_releases_partial_tree() {
        let run = || {
            let mut cursor = ScriptedCursor::new(truncated());
            let result = GenericNode::build(&mut cursor);
            assert!(matches!(result, Err(Error::UnexpectedEof { ref open }) if open == "grandchild"));
        };
        run();
        assert_eq!(net_allocation(run), 0);
    }

    #[test]
    fn test_abort_when_element_is_lost() {
        let run = || {
            let mut cursor = ScriptedCursor::new(truncated());
            cursor.lose_element = true;
            assert!(matches!(GenericNode::build(&mut cursor), Err(Error::LostOwningElement)));
        };
        run();
        assert_eq!(net_allocation(run), 0);
    }

    #[test]
    fn test_release_frees_everything() {
        let mut events = truncated();
        events.extend([end(2, "grandchild"), end(1, "second"), end(0, "root")]);
        let mut cursor = ScriptedCursor::new(events);
        let freed = net_allocation(|| {
            let root = GenericNode::build(&mut cursor).unwrap();
            root.release();
        });
        assert_eq!(freed, 0);
    }
}
