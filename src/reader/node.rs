//! Reader Node Records
//!
//! The node a [`super::TextReader`] is positioned on, with names already
//! resolved against the namespace scope in effect at that node.

use crate::cursor::NodeKind;
use std::borrow::Cow;

/// Qualified name with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeName<'a> {
    pub prefix: Option<&'a str>,
    pub local_name: &'a str,
    pub namespace_uri: Option<String>,
}

impl<'a> NodeName<'a> {
    /// Split a qualified name, leaving the namespace unresolved
    pub fn unresolved(qname: &'a str) -> Self {
        let (prefix, local_name) = split_qname(qname);
        NodeName {
            prefix,
            local_name,
            namespace_uri: None,
        }
    }

    /// Whether this attribute name is a namespace declaration
    pub fn is_namespace_declaration(&self) -> bool {
        matches!((self.prefix, self.local_name), (None, "xmlns") | (Some("xmlns"), _))
    }
}

/// An attribute of the current element
#[derive(Debug, Clone)]
pub struct NodeAttribute<'a> {
    pub name: NodeName<'a>,
    pub value: Cow<'a, str>,
}

/// The node the reader is positioned on
#[derive(Debug, Clone)]
pub struct ReaderNode<'a> {
    pub kind: NodeKind,
    pub depth: usize,
    pub is_empty: bool,
    pub name: Option<NodeName<'a>>,
    pub value: Option<Cow<'a, str>>,
    pub attributes: Vec<NodeAttribute<'a>>,
}

impl Default for ReaderNode<'_> {
    fn default() -> Self {
        ReaderNode {
            kind: NodeKind::None,
            depth: 0,
            is_empty: false,
            name: None,
            value: None,
            attributes: Vec::new(),
        }
    }
}

impl<'a> ReaderNode<'a> {
    /// A character data, comment or document-level node
    pub fn leaf(kind: NodeKind, depth: usize, value: Option<Cow<'a, str>>) -> Self {
        ReaderNode {
            kind,
            depth,
            value,
            ..ReaderNode::default()
        }
    }
}

/// Split a qualified name into prefix and local name at the first colon
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("xs:int"), (Some("xs"), "int"));
        assert_eq!(split_qname("int"), (None, "int"));
    }

    #[test]
    fn test_namespace_declaration_names() {
        assert!(NodeName::unresolved("xmlns").is_namespace_declaration());
        assert!(NodeName::unresolved("xmlns:a").is_namespace_declaration());
        assert!(!NodeName::unresolved("a:xmlns").is_namespace_declaration());
        assert!(!NodeName::unresolved("id").is_namespace_declaration());
    }
}
