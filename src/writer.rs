//! Text Writer
//!
//! Streaming [`XmlWriter`] over any [`std::io::Write`] sink. Output is compact: no
//! indentation and no whitespace between markup.
//!
//! A start tag is assembled in memory until content or an end element follows,
//! so an element with nothing inside is written self-closing (`<a/>`) and the
//! calls that build the tag report 0 bytes. Namespace declarations are added
//! the first time a binding is needed in a scope. An explicit `xmlns`
//! attribute for a binding the writer already added to the same tag takes
//! that declaration's place, so declarations keep the position the caller
//! gave them.

use crate::core::entities::{escape_attribute, escape_text};
use crate::core::namespace::NamespaceResolver;
use crate::cursor::XmlWriter;
use crate::error::{Error, Result};
use std::io::Write;
use tracing::debug;

/// XML declaration written by [`TextWriter::write_declaration`]
const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// One piece of a start tag still being assembled
enum Piece {
    Markup(String),
    /// Namespace declaration the writer added on its own
    Implicit { prefix: Option<String>, markup: String },
}

impl Piece {
    fn markup(&self) -> &str {
        match self {
            Piece::Markup(markup) | Piece::Implicit { markup, .. } => markup,
        }
    }
}

/// Compact XML writer
pub struct TextWriter<W: Write> {
    sink: W,
    namespaces: NamespaceResolver,
    /// Qualified names of open elements, outermost first
    open: Vec<String>,
    /// The innermost start tag, while it still accepts attributes
    tag: Option<Vec<Piece>>,
}

impl<W: Write> TextWriter<W> {
    pub fn new(sink: W) -> Self {
        TextWriter {
            sink,
            namespaces: NamespaceResolver::new(),
            open: Vec::new(),
            tag: None,
        }
    }

    /// Write the `<?xml ...?>` declaration. Call before the root element.
    pub fn write_declaration(&mut self) -> Result<usize> {
        self.emit(&[DECLARATION])
    }

    /// Number of elements currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Close any pending start tag and flush the sink
    pub fn flush(&mut self) -> Result<()> {
        self.close_start_tag(">")?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Recover the sink. Elements still open are left unterminated and a start
    /// tag not yet closed is discarded; call [`TextWriter::flush`] first to keep it.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn emit(&mut self, parts: &[&str]) -> Result<usize> {
        let mut written = 0;
        for part in parts {
            self.sink.write_all(part.as_bytes())?;
            written += part.len();
        }
        Ok(written)
    }

    /// Write out the pending start tag, terminated by `end`
    fn close_start_tag(&mut self, end: &str) -> Result<usize> {
        let Some(pieces) = self.tag.take() else {
            return Ok(0);
        };
        let mut parts: Vec<&str> = pieces.iter().map(Piece::markup).collect();
        parts.push(end);
        self.emit(&parts)
    }

    fn push(&mut self, piece: Piece) {
        if let Some(pieces) = self.tag.as_mut() {
            pieces.push(piece);
        }
    }

    /// Declare `prefix` as `uri` on the pending start tag
    fn declare(&mut self, prefix: Option<&str>, uri: &str, implicit: bool) {
        self.namespaces.declare(prefix, uri);
        let escaped = escape_attribute(uri);
        let markup = match prefix {
            Some(p) => format!(" xmlns:{p}=\"{escaped}\""),
            None => format!(" xmlns=\"{escaped}\""),
        };
        let piece = if implicit {
            Piece::Implicit {
                prefix: prefix.map(str::to_owned),
                markup,
            }
        } else {
            Piece::Markup(markup)
        };
        self.push(piece);
    }

    /// Handle an explicit `xmlns` or `xmlns:p` attribute
    fn declare_explicit(&mut self, prefix: Option<&str>, uri: &str) {
        if !self.namespaces.declared_here(prefix) {
            self.declare(prefix, uri, false);
            return;
        }
        if self.namespaces.resolve(prefix).unwrap_or("") != uri {
            debug!(prefix = ?prefix, uri, "conflicting namespace declaration dropped");
            return;
        }
        let Some(pieces) = self.tag.as_mut() else {
            return;
        };
        let implicit = pieces
            .iter()
            .position(|piece| matches!(piece, Piece::Implicit { prefix: p, .. } if p.as_deref() == prefix));
        if let Some(index) = implicit {
            pieces.remove(index);
            self.declare(prefix, uri, false);
        }
    }
}

/// Join a prefix and local name
fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local_name}"),
        None => local_name.to_owned(),
    }
}

impl<W: Write> XmlWriter for TextWriter<W> {
    fn write_start_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<usize> {
        let written = self.close_start_tag(">")?;

        let qname = qualified(prefix, local_name);
        self.tag = Some(vec![Piece::Markup(format!("<{qname}"))]);
        self.open.push(qname);
        self.namespaces.push_scope();

        match namespace_uri {
            Some(uri) if self.namespaces.resolve(prefix) != Some(uri) => {
                self.declare(prefix, uri, true);
            }
            // An unqualified element must not inherit a default namespace
            None if prefix.is_none() && self.namespaces.resolve(None).is_some() => {
                self.declare(None, "", true);
            }
            _ => {}
        }
        Ok(written)
    }

    fn write_attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<usize> {
        if self.tag.is_none() {
            return Err(Error::AttributeOutsideStartTag {
                name: qualified(prefix, local_name),
            });
        }

        match (prefix, local_name) {
            (None, "xmlns") => {
                self.declare_explicit(None, value);
                return Ok(0);
            }
            (Some("xmlns"), p) => {
                self.declare_explicit(Some(p), value);
                return Ok(0);
            }
            _ => {}
        }

        if let (Some(p), Some(uri)) = (prefix, namespace_uri) {
            if self.namespaces.resolve(Some(p)) != Some(uri) {
                self.declare(Some(p), uri, true);
            }
        }
        let qname = qualified(prefix, local_name);
        let escaped = escape_attribute(value);
        self.push(Piece::Markup(format!(" {qname}=\"{escaped}\"")));
        Ok(0)
    }

    fn write_text(&mut self, text: &str) -> Result<usize> {
        let written = self.close_start_tag(">")?;
        let escaped = escape_text(text);
        Ok(written + self.emit(&[&escaped])?)
    }

    fn write_end_element(&mut self) -> Result<usize> {
        let Some(qname) = self.open.pop() else {
            return Err(Error::UnbalancedEndElement);
        };
        self.namespaces.pop_scope();
        if self.tag.is_some() {
            return self.close_start_tag("/>");
        }
        self.emit(&["</", &qname, ">"])
    }
}

/// Sink that fails every write, for exercising error propagation
#[cfg(test)]
pub(crate) struct FailingSink;

#[cfg(test)]
impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::ns::{XML, XMLNS};
    use std::io;

    fn written(f: impl FnOnce(&mut TextWriter<Vec<u8>>) -> Result<()>) -> String {
        let mut writer = TextWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_empty_element_self_closes() {
        let out = written(|w| {
            w.write_start_element(None, "a", None)?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<a/>");
    }

    #[test]
    fn test_nested_content_and_escaping() {
        let out = written(|w| {
            w.write_start_element(None, "a", None)?;
            w.write_attribute(None, "t", None, "x\"<&\n")?;
            w.write_text("1 < 2 & \"q\"")?;
            w.write_start_element(None, "b", None)?;
            w.write_end_element()?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<a t=\"x&quot;&lt;&amp;&#10;\">1 &lt; 2 &amp; \"q\"<b/></a>");
    }

    #[test]
    fn test_byte_counts_match_output() {
        let mut writer = TextWriter::new(Vec::new());
        let mut total = writer.write_declaration().unwrap();
        total += writer.write_start_element(Some("p"), "r", Some("urn:p")).unwrap();
        total += writer.write_attribute(None, "id", None, "7").unwrap();
        total += writer.write_text("hi").unwrap();
        total += writer.write_end_element().unwrap();
        let out = writer.into_inner();
        assert_eq!(total, out.len());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<p:r xmlns:p=\"urn:p\" id=\"7\">hi</p:r>"
        );
    }

    #[test]
    fn test_namespace_declared_once_per_scope() {
        let out = written(|w| {
            w.write_start_element(None, "r", Some("urn:d"))?;
            w.write_attribute(None, "xmlns", Some(XMLNS), "urn:d")?;
            w.write_start_element(None, "c", Some("urn:d"))?;
            w.write_end_element()?;
            w.write_start_element(None, "u", None)?;
            w.write_end_element()?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<r xmlns=\"urn:d\"><c/><u xmlns=\"\"/></r>");
    }

    #[test]
    fn test_attribute_namespace_declared() {
        let out = written(|w| {
            w.write_start_element(None, "r", None)?;
            w.write_attribute(Some("x"), "a", Some("urn:x"), "1")?;
            w.write_attribute(Some("x"), "b", Some("urn:x"), "2")?;
            w.write_attribute(Some("xml"), "lang", Some(XML), "en")?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<r xmlns:x=\"urn:x\" x:a=\"1\" x:b=\"2\" xml:lang=\"en\"/>");
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut writer = TextWriter::new(Vec::new());
        assert!(matches!(writer.write_end_element(), Err(Error::UnbalancedEndElement)));
        assert!(matches!(
            writer.write_attribute(None, "a", None, "1"),
            Err(Error::AttributeOutsideStartTag { name }) if name == "a"
        ));
        writer.write_start_element(None, "r", None).unwrap();
        writer.write_text("x").unwrap();
        assert!(writer.write_attribute(None, "a", None, "1").is_err());
        assert_eq!(writer.depth(), 1);
    }

    #[test]
    fn test_sink_error_propagates() {
        let mut writer = TextWriter::new(FailingSink);
        assert_eq!(writer.write_start_element(None, "a", None).unwrap(), 0);
        match writer.write_end_element() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_explicit_declaration_keeps_its_position() {
        let out = written(|w| {
            w.write_start_element(None, "r", None)?;
            w.write_attribute(Some("p"), "a", Some("urn:p"), "1")?;
            w.write_attribute(Some("xmlns"), "p", Some(XMLNS), "urn:p")?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<r p:a=\"1\" xmlns:p=\"urn:p\"/>");

        let out = written(|w| {
            w.write_start_element(Some("q"), "r", Some("urn:q"))?;
            w.write_attribute(None, "id", None, "7")?;
            w.write_attribute(Some("xmlns"), "q", Some(XMLNS), "urn:q")?;
            w.write_text("x")?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<q:r id=\"7\" xmlns:q=\"urn:q\">x</q:r>");
    }

    #[test]
    fn test_conflicting_declaration_is_dropped() {
        let out = written(|w| {
            w.write_start_element(Some("p"), "r", Some("urn:p"))?;
            w.write_attribute(Some("xmlns"), "p", Some(XMLNS), "urn:other")?;
            w.write_attribute(Some("xmlns"), "p", Some(XMLNS), "urn:p")?;
            w.write_end_element()?;
            Ok(())
        });
        assert_eq!(out, "<p:r xmlns:p=\"urn:p\"/>");
    }

    #[test]
    fn test_start_tag_is_written_when_closed() {
        let mut writer = TextWriter::new(Vec::new());
        assert_eq!(writer.write_start_element(None, "a", None).unwrap(), 0);
        assert_eq!(writer.write_attribute(None, "k", None, "v").unwrap(), 0);
        assert!(writer.get_ref().is_empty());
        writer.flush().unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"<a k=\"v\">");
    }
}
