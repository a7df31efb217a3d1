//! XML namespace handling
//!
//! Well-known namespace URIs, prefixed-name splitting and the scoped prefix
//! resolver used while parsing documents.

use std::collections::HashMap;

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML-DSig namespace
pub const DSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML namespace (bound to the `xml` prefix)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix of every SPI envelope namespace (`<base><family>/<version>`)
pub const SPI_NAMESPACE_BASE: &str = "https://www.bcb.gov.br/pi/";

/// Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Split `prefix:local` into its parts
pub fn split_prefixed(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Stack of in-scope namespace bindings
///
/// One frame is pushed per element; a frame only records the declarations
/// made on that element, lookups walk from the innermost frame outwards.
#[derive(Debug, Clone)]
pub struct NamespaceScope {
    frames: Vec<HashMap<Option<Prefix>, NamespaceUri>>,
}

impl NamespaceScope {
    /// Create a scope with only the `xml` prefix bound
    pub fn new() -> Self {
        let mut root = HashMap::new();
        root.insert(Some("xml".to_string()), XML_NAMESPACE.to_string());
        Self { frames: vec![root] }
    }

    /// Enter an element with the given declarations (`None` = default namespace)
    pub fn push(&mut self, declarations: &[(Option<Prefix>, NamespaceUri)]) {
        self.frames.push(declarations.iter().cloned().collect());
    }

    /// Leave the innermost element
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Resolve a prefix (`None` = default namespace) to its URI
    ///
    /// An empty URI (`xmlns=""`) undeclares the default namespace and
    /// resolves to `None`.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        let key = prefix.map(str::to_string);
        for frame in self.frames.iter().rev() {
            if let Some(uri) = frame.get(&key) {
                return if uri.is_empty() { None } else { Some(uri.as_str()) };
            }
        }
        None
    }
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::new()
    }
}
