//! XML document handling
//!
//! Documents are parsed with `quick-xml` into an arena of nodes addressed by
//! [`NodeId`]. Child lists are index vectors computed once at parse time, so
//! the structural walk never re-queries the tree. Text is kept verbatim
//! (line endings normalized) because canonicalization depends on it.

use crate::error::{Error, ParseError, Result, TextPos};
use crate::limits::Limits;
use crate::namespaces::{split_prefixed, NamespaceScope};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Index of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Attribute of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Prefix as written in the source
    pub prefix: Option<String>,
    /// Local name
    pub local_name: String,
    /// Resolved namespace (unprefixed attributes have none)
    pub namespace: Option<String>,
    /// Normalized, unescaped value
    pub value: String,
}

impl Attribute {
    /// Create an unprefixed attribute
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_name: local_name.into(),
            namespace: None,
            value: value.into(),
        }
    }

    /// Name as written (`prefix:local` or `local`)
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local_name)
    }
}

/// Element payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Prefix as written in the source
    pub prefix: Option<String>,
    /// Local name
    pub local_name: String,
    /// Resolved namespace URI
    pub namespace: Option<String>,
    /// Namespace declarations made on this element (`None` = default)
    pub namespace_decls: Vec<(Option<String>, String)>,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Position of the start tag, for parsed elements
    pub pos: Option<TextPos>,
}

impl ElementData {
    /// Name as written (`prefix:local` or `local`)
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local_name)
    }

    /// Get an attribute value by local name
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local_name == local_name)
            .map(|a| a.value.as_str())
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element node
    Element(ElementData),
    /// Character data (CDATA sections are folded in)
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// XML Document representation
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
    declaration: Option<String>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            declaration: None,
        }
    }

    /// Parse an XML document from a string with default limits
    pub fn parse(xml: &str) -> Result<Self> {
        Self::parse_with_limits(xml, &Limits::default())
    }

    /// Parse an XML document from a string
    pub fn parse_with_limits(xml: &str, limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;

        let positions = LineIndex::new(xml);
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);
        reader.check_end_names(true);

        let mut doc = Document::new();
        let mut scope = NamespaceScope::new();
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            let offset = reader.buffer_position();
            let event = reader.read_event().map_err(|e| {
                Error::MalformedInput(
                    ParseError::new(e.to_string()).at(positions.pos(reader.buffer_position())),
                )
            })?;

            match event {
                Event::Decl(decl) => {
                    let raw = String::from_utf8_lossy(decl.as_ref()).into_owned();
                    doc.declaration = Some(format!("<?{}?>", raw));
                }
                Event::DocType(_) => {
                    return Err(ParseError::new("DOCTYPE declarations are not allowed")
                        .at(positions.pos(offset))
                        .into());
                }
                Event::Start(start) => {
                    let pos = positions.pos(offset);
                    let data = Self::parse_element(&start, &mut scope, limits, pos)?;
                    let id = doc.attach_parsed(data, stack.last().copied(), pos)?;
                    stack.push(id);
                    limits.check_xml_depth(stack.len())?;
                }
                Event::Empty(start) => {
                    let pos = positions.pos(offset);
                    let data = Self::parse_element(&start, &mut scope, limits, pos)?;
                    doc.attach_parsed(data, stack.last().copied(), pos)?;
                    scope.pop();
                    limits.check_xml_depth(stack.len() + 1)?;
                }
                Event::End(_) => {
                    stack.pop();
                    scope.pop();
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(text.as_ref()).map_err(|e| {
                        ParseError::new(format!("invalid UTF-8 in text: {}", e))
                            .at(positions.pos(offset))
                    })?;
                    let normalized = normalize_line_endings(raw);
                    let value = unescape(&normalized)
                        .map_err(|e| ParseError::new(e.to_string()).at(positions.pos(offset)))?
                        .into_owned();
                    match stack.last() {
                        Some(&parent) => doc.append_text(parent, value),
                        None if value.trim().is_empty() => {}
                        None => {
                            return Err(ParseError::new("text content outside the root element")
                                .at(positions.pos(offset))
                                .into())
                        }
                    }
                }
                Event::CData(cdata) => {
                    let value = normalize_line_endings(&String::from_utf8_lossy(cdata.as_ref()));
                    match stack.last() {
                        Some(&parent) => doc.append_text(parent, value),
                        None => {
                            return Err(ParseError::new("CDATA section outside the root element")
                                .at(positions.pos(offset))
                                .into())
                        }
                    }
                }
                Event::Eof => break,
                // Comments and processing instructions are not part of the model
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            let name = doc
                .element(open)
                .map(|e| e.qualified_name())
                .unwrap_or_default();
            return Err(ParseError::new(format!("unclosed element <{}>", name)).into());
        }
        if doc.root.is_none() {
            return Err(ParseError::new("document has no root element").into());
        }

        Ok(doc)
    }

    /// Parse element from BytesStart event, pushing its namespace frame
    fn parse_element(
        start: &BytesStart,
        scope: &mut NamespaceScope,
        limits: &Limits,
        pos: TextPos,
    ) -> Result<ElementData> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| ParseError::new(format!("invalid element name: {}", e)).at(pos))?
            .to_string();

        let mut namespace_decls = Vec::new();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| ParseError::new(format!("failed to parse attribute: {}", e)).at(pos))?;
            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| ParseError::new(format!("invalid attribute name: {}", e)).at(pos))?
                .to_string();
            let raw_value = std::str::from_utf8(&attr.value)
                .map_err(|e| ParseError::new(format!("invalid attribute value: {}", e)).at(pos))?;
            let value = unescape(&normalize_attribute_whitespace(raw_value))
                .map_err(|e| ParseError::new(e.to_string()).at(pos))?
                .into_owned();

            if attr_name == "xmlns" {
                namespace_decls.push((None, value));
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                namespace_decls.push((Some(prefix.to_string()), value));
            } else {
                raw_attributes.push((attr_name, value));
            }
        }
        limits.check_attributes(raw_attributes.len())?;

        scope.push(&namespace_decls);

        let (prefix, local_name) = split_prefixed(&name);
        let namespace = match scope.resolve(prefix) {
            Some(uri) => Some(uri.to_string()),
            None if prefix.is_some() => {
                return Err(ParseError::new(format!("unbound namespace prefix in <{}>", name))
                    .at(pos)
                    .into())
            }
            None => None,
        };

        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (attr_name, value) in raw_attributes {
            let (attr_prefix, attr_local) = split_prefixed(&attr_name);
            let attr_namespace = match attr_prefix {
                Some(p) => Some(
                    scope
                        .resolve(Some(p))
                        .ok_or_else(|| {
                            ParseError::new(format!("unbound namespace prefix in @{}", attr_name))
                                .at(pos)
                        })?
                        .to_string(),
                ),
                None => None,
            };
            attributes.push(Attribute {
                prefix: attr_prefix.map(str::to_string),
                local_name: attr_local.to_string(),
                namespace: attr_namespace,
                value,
            });
        }

        Ok(ElementData {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace,
            namespace_decls,
            attributes,
            pos: Some(pos),
        })
    }

    fn attach_parsed(
        &mut self,
        data: ElementData,
        parent: Option<NodeId>,
        pos: TextPos,
    ) -> Result<NodeId> {
        let id = self.push_node(NodeKind::Element(data));
        match parent {
            Some(parent) => self.append_child(parent, id),
            None if self.root.is_none() => self.root = Some(id),
            None => {
                return Err(ParseError::new("multiple root elements").at(pos).into());
            }
        }
        Ok(id)
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn append_text(&mut self, parent: NodeId, text: String) {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeKind::Text(ref mut existing) = self.nodes[last.0].kind {
                existing.push_str(&text);
                return;
            }
        }
        let id = self.push_node(NodeKind::Text(text));
        self.append_child(parent, id);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Get the root element
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The XML declaration as written, if any
    pub fn declaration(&self) -> Option<&str> {
        self.declaration.as_deref()
    }

    /// Node payload
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Element payload, `None` for text nodes
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    /// Local name of an element node (empty for text nodes)
    pub fn local_name(&self, id: NodeId) -> &str {
        self.element(id).map(|e| e.local_name.as_str()).unwrap_or("")
    }

    /// Namespace URI of an element node
    pub fn namespace(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|e| e.namespace.as_deref())
    }

    /// Start-tag position of an element node
    pub fn position(&self, id: NodeId) -> Option<TextPos> {
        self.element(id).and_then(|e| e.pos)
    }

    /// Get an attribute value by local name
    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(local_name))
    }

    /// Parent node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// All child nodes (elements and text)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Child element nodes in document order
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(move |&c| self.element(c).is_some())
    }

    /// First child element with the given local name
    pub fn child_by_name(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.child_elements(id)
            .find(|&c| self.local_name(c) == local_name)
    }

    /// Descendant elements (excluding `id`) in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
                stack.extend(self.nodes[node.0].children.iter().rev().copied());
            }
        }
        out
    }

    /// First descendant element (excluding `id`) matching namespace and local name
    pub fn find_descendant(&self, id: NodeId, namespace: Option<&str>, local_name: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|&d| {
            self.local_name(d) == local_name && (namespace.is_none() || self.namespace(d) == namespace)
        })
    }

    /// Ancestors of a node, innermost first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Element carrying an `Id` attribute with the given value
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        let root = self.root?;
        std::iter::once(root)
            .chain(self.descendants(root))
            .find(|&n| self.attribute(n, "Id") == Some(value))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Resolve a prefix in the scope of an element (for QName-valued attributes)
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.element(n))
            .find_map(|e| {
                e.namespace_decls
                    .iter()
                    .find(|(p, _)| p.as_deref() == prefix)
                    .map(|(_, uri)| uri.as_str())
            })
            .filter(|uri| !uri.is_empty())
    }

    /// XPath-like absolute path of an element (`/Envelope/AppHdr/Fr`)
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .map(|n| self.local_name(n))
            .collect();
        names.reverse();
        format!("/{}", names.join("/"))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace: Option<&str>,
    ) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace: namespace.map(str::to_string),
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            pos: None,
        }))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove a node from its parent's child list
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Detach every child of a node
    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Set (or replace) an unprefixed attribute
    pub fn set_attribute(&mut self, id: NodeId, local_name: &str, value: &str) {
        if let NodeKind::Element(ref mut data) = self.nodes[id.0].kind {
            match data
                .attributes
                .iter_mut()
                .find(|a| a.prefix.is_none() && a.local_name == local_name)
            {
                Some(existing) => existing.value = value.to_string(),
                None => data.attributes.push(Attribute::new(local_name, value)),
            }
        }
    }

    /// Declare a namespace on an element (`None` = default namespace)
    pub fn declare_namespace(&mut self, id: NodeId, prefix: Option<&str>, uri: &str) {
        if let NodeKind::Element(ref mut data) = self.nodes[id.0].kind {
            let key = prefix.map(str::to_string);
            data.namespace_decls.retain(|(p, _)| *p != key);
            data.namespace_decls.push((key, uri.to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the document back to XML text
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(decl) = &self.declaration {
            out.push_str(decl);
            out.push('\n');
        }
        if let Some(root) = self.root {
            self.write_node(root, &mut out);
        }
        out
    }

    /// Serialize a single subtree
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element(data) => {
                let name = data.qualified_name();
                out.push('<');
                out.push_str(&name);
                for (prefix, uri) in &data.namespace_decls {
                    match prefix {
                        Some(p) => out.push_str(&format!(" xmlns:{}=\"{}\"", p, escape_attribute(uri))),
                        None => out.push_str(&format!(" xmlns=\"{}\"", escape_attribute(uri))),
                    }
                }
                for attr in &data.attributes {
                    out.push_str(&format!(
                        " {}=\"{}\"",
                        attr.qualified_name(),
                        escape_attribute(&attr.value)
                    ));
                }
                let children = &self.nodes[id.0].children;
                if children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for &child in children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn qualify(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local_name),
        None => local_name.to_string(),
    }
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

fn normalize_attribute_whitespace(raw: &str) -> String {
    raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ")
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
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
    out
}

/// Byte offset to line/column conversion
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            source,
            line_starts,
        }
    }

    fn pos(&self, offset: usize) -> TextPos {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        TextPos::new(line + 1, column + 1)
    }
}
