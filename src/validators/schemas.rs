//! Schema model and registry
//!
//! A [`SchemaModel`] is the in-memory type graph of one schema resource:
//! named simple types (restrictions), named complex types (ordered element
//! sequences) and the top-level element registry. Models are immutable once
//! built and shared through `Arc`.
//!
//! [`SchemaRegistry`] caches one model per [`SchemaKey`]. A model is always
//! fully built before it is published, so a reader never sees a partial one.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::debug;

use super::facets::{EnumerationFacet, FacetResult, MaxLengthFacet, MinLengthFacet, PatternFacet};
use super::parsing::parse_schema;
use super::particles::Occurs;
use crate::config::EngineConfig;
use crate::detection::SchemaKey;
use crate::error::Result;
use crate::loaders::Loader;

/// Reference to a type from an element declaration or restriction base
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Built-in XSD type (`xs:string`), treated as unconstrained
    Builtin(String),
    /// Named type defined in the schema (local name)
    Named(String),
}

impl TypeRef {
    /// Local name of the referenced type
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Builtin(name) | TypeRef::Named(name) => name,
        }
    }

    /// Whether this is a built-in type
    pub fn is_builtin(&self) -> bool {
        matches!(self, TypeRef::Builtin(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Builtin(name) => write!(f, "xs:{}", name),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

/// Simple-type restriction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    /// Base type
    pub base: TypeRef,
    /// Anchored pattern
    pub pattern: Option<PatternFacet>,
    /// Minimum length
    pub min_length: Option<MinLengthFacet>,
    /// Maximum length
    pub max_length: Option<MaxLengthFacet>,
    /// Allowed values
    pub enumeration: Option<EnumerationFacet>,
}

impl Restriction {
    /// Unconstrained restriction of `base`
    pub fn new(base: TypeRef) -> Self {
        Self {
            base,
            pattern: None,
            min_length: None,
            max_length: None,
            enumeration: None,
        }
    }

    /// Check a text value
    ///
    /// Empty values pass. Facets run as minLength, maxLength, pattern,
    /// enumeration and the first failure is returned.
    pub fn validate(&self, value: &str, type_name: &str) -> FacetResult {
        if value.is_empty() {
            return Ok(());
        }
        if let Some(facet) = &self.min_length {
            facet.validate(value, type_name)?;
        }
        if let Some(facet) = &self.max_length {
            facet.validate(value, type_name)?;
        }
        if let Some(facet) = &self.pattern {
            facet.validate(value, type_name)?;
        }
        if let Some(facet) = &self.enumeration {
            facet.validate(value, type_name)?;
        }
        Ok(())
    }
}

/// Element declaration inside a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    /// Element local name
    pub name: String,
    /// Declared type, if any
    pub type_ref: Option<TypeRef>,
    /// Occurrence bounds
    pub occurs: Occurs,
}

/// Complex type: an ordered sequence of element declarations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComplexType {
    /// Child declarations in declaration order
    pub elements: Vec<ElementSpec>,
    /// Base type of simple content (`xs:simpleContent/xs:extension`)
    pub simple_content: Option<TypeRef>,
}

impl ComplexType {
    /// First declared position of a child name
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Declaration for a child name
    pub fn spec(&self, name: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Declared child names joined for messages
    pub fn allowed_names(&self) -> String {
        self.elements
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Type of the SPI envelope element
const ENVELOPE_TYPE: &str = "SPIEnvelopeMessage";

/// Name of the SPI envelope element
const ENVELOPE_ELEMENT: &str = "Envelope";

/// A resolved type definition
#[derive(Debug, Clone, Copy)]
pub enum TypeDefinition<'a> {
    /// Built-in type, unconstrained
    Builtin,
    /// Simple type restriction
    Simple(&'a Restriction),
    /// Complex type
    Complex(&'a ComplexType),
    /// Named type with no definition in the schema
    Unresolved,
}

/// In-memory model of one schema resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModel {
    /// Target namespace
    pub target_namespace: String,
    /// Named simple types
    pub simple_types: IndexMap<String, Restriction>,
    /// Named complex types
    pub complex_types: IndexMap<String, ComplexType>,
    /// Top-level elements and their declared types, in declaration order
    pub root_elements: IndexMap<String, Option<TypeRef>>,
}

impl SchemaModel {
    /// Parse a schema resource
    pub fn parse(xsd: &str) -> Result<Self> {
        parse_schema(xsd)
    }

    /// Resolve a type reference. Complex types win over simple types.
    pub fn resolve(&self, type_ref: &TypeRef) -> TypeDefinition<'_> {
        match type_ref {
            TypeRef::Builtin(_) => TypeDefinition::Builtin,
            TypeRef::Named(name) => {
                if let Some(ct) = self.complex_types.get(name) {
                    TypeDefinition::Complex(ct)
                } else if let Some(st) = self.simple_types.get(name) {
                    TypeDefinition::Simple(st)
                } else {
                    TypeDefinition::Unresolved
                }
            }
        }
    }

    /// The element instances must use as root
    ///
    /// The envelope declaration (typed `SPIEnvelopeMessage` or named
    /// `Envelope`) when present, otherwise the first top-level element.
    pub fn expected_root(&self) -> Option<(&str, Option<&TypeRef>)> {
        let typed = |ty: &Option<TypeRef>| ty.as_ref().is_some_and(|t| t.name() == ENVELOPE_TYPE);
        self.root_elements
            .iter()
            .find(|(_, ty)| typed(ty))
            .or_else(|| self.root_elements.iter().find(|(name, _)| name.as_str() == ENVELOPE_ELEMENT))
            .or_else(|| self.root_elements.iter().next())
            .map(|(name, ty)| (name.as_str(), ty.as_ref()))
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<SchemaRegistry>> = Lazy::new(|| {
    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid environment configuration, using defaults");
        EngineConfig::default()
    });
    Arc::new(SchemaRegistry::from_config(&config))
});

/// Cache of schema models keyed by family/version
#[derive(Debug)]
pub struct SchemaRegistry {
    loader: Loader,
    cache: RwLock<HashMap<SchemaKey, Arc<SchemaModel>>>,
}

impl SchemaRegistry {
    /// Create a registry reading resources through `loader`
    pub fn new(loader: Loader) -> Self {
        Self {
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Loader::from_config(config))
    }

    /// Create a registry rooted at `schema_dir`
    pub fn with_schema_dir(schema_dir: impl AsRef<Path>) -> Self {
        Self::new(Loader::new(schema_dir))
    }

    /// Process-wide registry configured from the environment
    pub fn global() -> Arc<SchemaRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Root directory of the resources
    pub fn schema_dir(&self) -> &Path {
        self.loader.schema_dir()
    }

    /// Cached model, without loading
    pub fn cached(&self, key: &SchemaKey) -> Option<Arc<SchemaModel>> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    /// Number of cached models
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no model is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the model for `key`, loading and publishing it on first use
    ///
    /// Concurrent first loads of one key may both parse; the first model
    /// published wins and every caller receives it.
    pub fn get_or_load(&self, key: &SchemaKey) -> Result<Arc<SchemaModel>> {
        if let Some(model) = self.cached(key) {
            debug!(schema = %key, "schema cache hit");
            return Ok(model);
        }

        debug!(schema = %key, "schema cache miss");
        let content = self.loader.load_schema(key)?;
        let model = Arc::new(parse_schema(&content)?);
        debug!(
            schema = %key,
            simple_types = model.simple_types.len(),
            complex_types = model.complex_types.len(),
            "schema loaded"
        );

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let published = cache.entry(key.clone()).or_insert(model);
        Ok(Arc::clone(published))
    }
}
