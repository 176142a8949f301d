//! Namespace Resolution
//!
//! Stack-based namespace resolver shared by the reader (resolving prefixes of
//! parsed names) and the writer (deciding which declarations to emit).

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI). `None` is the default namespace.
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: Option<String>,
    uri: String,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: usize,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Create a new namespace resolver with pre-declared xml and xmlns namespaces
    pub fn new() -> Self {
        let mut bindings = Vec::with_capacity(16);
        bindings.push(NsBinding {
            prefix: Some("xml".to_owned()),
            uri: ns::XML.to_owned(),
            depth: 0,
        });
        bindings.push(NsBinding {
            prefix: Some("xmlns".to_owned()),
            uri: ns::XMLNS.to_owned(),
            depth: 0,
        });
        NamespaceResolver { bindings, depth: 0 }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope.
    ///
    /// An empty URI undeclares the default namespace. The `xml` and `xmlns`
    /// prefixes cannot be rebound.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        if matches!(prefix, Some("xml") | Some("xmlns")) {
            return;
        }
        self.bindings.push(NsBinding {
            prefix: prefix.map(str::to_owned),
            uri: uri.to_owned(),
            depth: self.depth,
        });
    }

    /// Resolve a prefix (`None` for the default namespace) to a namespace URI
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Whether the current scope itself already declares `prefix`
    pub fn declared_here(&self, prefix: Option<&str>) -> bool {
        self.bindings
            .iter()
            .rev()
            .take_while(|b| b.depth == self.depth)
            .any(|b| b.prefix.as_deref() == prefix)
    }

    /// Get current depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}
