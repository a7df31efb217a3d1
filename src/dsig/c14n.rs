//! Exclusive XML canonicalization
//!
//! Exclusive C14N 1.0 without comments and without an inclusive prefix
//! list, over the document arena. A namespace declaration is emitted on an
//! element only when the element or one of its attributes visibly uses the
//! prefix and the nearest output ancestor did not already emit the same
//! binding.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::documents::{Document, NodeId, NodeKind};

/// Prefix (`None` = default namespace) to URI bindings emitted so far
type Rendered = BTreeMap<Option<String>, String>;

/// Canonicalize the subtree rooted at `node`
pub fn canonicalize(doc: &Document, node: NodeId) -> String {
    canonicalize_excluding(doc, node, None)
}

/// Canonicalize the subtree rooted at `node`, leaving out `excluded`
///
/// The excluded subtree is how the enveloped-signature transform is applied.
pub fn canonicalize_excluding(doc: &Document, node: NodeId, excluded: Option<NodeId>) -> String {
    let mut out = String::new();
    write_node(doc, node, excluded, &Rendered::new(), &mut out);
    out
}

/// Base64 SHA-256 digest of canonical text
pub fn digest_base64(canonical: &str) -> String {
    STANDARD.encode(Sha256::digest(canonical.as_bytes()))
}

fn write_node(doc: &Document, node: NodeId, excluded: Option<NodeId>, rendered: &Rendered, out: &mut String) {
    if Some(node) == excluded {
        return;
    }

    let element = match doc.kind(node) {
        NodeKind::Text(text) => {
            escape_text(text, out);
            return;
        }
        NodeKind::Element(element) => element,
    };

    // Visibly utilized bindings
    let mut utilized = Rendered::new();
    utilized.insert(
        element.prefix.clone(),
        element.namespace.clone().unwrap_or_default(),
    );
    for attr in &element.attributes {
        if let Some(prefix) = &attr.prefix {
            if prefix != "xml" {
                utilized.insert(Some(prefix.clone()), attr.namespace.clone().unwrap_or_default());
            }
        }
    }

    let mut scope = rendered.clone();
    let mut declarations = Vec::new();
    for (prefix, uri) in utilized {
        let inherited = rendered.get(&prefix).map(String::as_str);
        let emit = match &prefix {
            None => inherited.unwrap_or("") != uri,
            Some(_) => inherited != Some(uri.as_str()),
        };
        if emit {
            declarations.push((prefix.clone(), uri.clone()));
            scope.insert(prefix, uri);
        }
    }

    let name = element.qualified_name();
    out.push('<');
    out.push_str(&name);

    for (prefix, uri) in &declarations {
        match prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        escape_attribute(uri, out);
        out.push('"');
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_key = (a.namespace.as_deref().unwrap_or(""), a.local_name.as_str());
        let b_key = (b.namespace.as_deref().unwrap_or(""), b.local_name.as_str());
        a_key.cmp(&b_key)
    });
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.qualified_name());
        out.push_str("=\"");
        escape_attribute(&attr.value, out);
        out.push('"');
    }
    out.push('>');

    for &child in doc.children(node) {
        write_node(doc, child, excluded, &scope, out);
    }

    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sorts_namespaces_and_attributes() {
        let xml = r#"<a:Root xmlns:b="urn:b" xmlns:a="urn:a" xmlns:unused="urn:u" z="1" b:y="2" a:x="3"><Child/></a:Root>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(
            canonicalize(&doc, doc.root().unwrap()),
            r#"<a:Root xmlns:a="urn:a" xmlns:b="urn:b" z="1" a:x="3" b:y="2"><Child></Child></a:Root>"#
        );
    }

    #[test]
    fn test_subtree_renders_inherited_bindings() {
        let xml = r#"<r xmlns="urn:e"><x:k xmlns:x="urn:x"><c/></x:k></r>"#;
        let doc = Document::parse(xml).unwrap();
        let k = doc.child_elements(doc.root().unwrap()).next().unwrap();
        assert_eq!(
            canonicalize(&doc, k),
            r#"<x:k xmlns:x="urn:x"><c xmlns="urn:e"></c></x:k>"#
        );
    }

    #[test]
    fn test_default_namespace_emitted_once() {
        let xml = "<Envelope xmlns=\"urn:e\">\n  <AppHdr xmlns=\"urn:h\"><Fr>A &amp; B</Fr></AppHdr>\n</Envelope>";
        let doc = Document::parse(xml).unwrap();
        let hdr = doc.child_by_name(doc.root().unwrap(), "AppHdr").unwrap();
        assert_eq!(
            canonicalize(&doc, hdr),
            r#"<AppHdr xmlns="urn:h"><Fr>A &amp; B</Fr></AppHdr>"#
        );
    }

    #[test]
    fn test_undeclared_default_namespace() {
        let xml = r#"<a xmlns="urn:a"><b xmlns=""/></a>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(
            canonicalize(&doc, doc.root().unwrap()),
            r#"<a xmlns="urn:a"><b xmlns=""></b></a>"#
        );
    }

    #[test]
    fn test_exclusion_and_escaping() {
        let xml = "<h v=\"a&#xA;b\"><s><sig/></s><t>1 &gt; 0</t></h>";
        let doc = Document::parse(xml).unwrap();
        let root = doc.root().unwrap();
        let s = doc.child_by_name(root, "s").unwrap();
        let sig = doc.child_by_name(s, "sig").unwrap();
        assert_eq!(
            canonicalize_excluding(&doc, root, Some(sig)),
            "<h v=\"a&#xA;b\"><s></s><t>1 &gt; 0</t></h>"
        );
    }

    #[test]
    fn test_digest() {
        assert_eq!(
            digest_base64(""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }
}
