//! Schema validators
//!
//! The schema model (restrictions, ordered element sequences, occurrence
//! bounds), the XSD reader that builds it, the cache that shares it and the
//! structural walk that checks instances against it.

// Facets and occurrence bounds
pub mod facets;
pub mod particles;

// Schema model, registry and XSD reader
pub mod parsing;
pub mod schemas;

// Instance validation
pub mod document_validation;
pub mod validation;

// Re-exports
pub use document_validation::validate_document;
pub use facets::{EnumerationFacet, FacetResult, MaxLengthFacet, MinLengthFacet, PatternFacet};
pub use parsing::parse_schema;
pub use particles::{parse_occurs, Occurs, OccursCheck};
pub use schemas::{ComplexType, ElementSpec, Restriction, SchemaModel, SchemaRegistry, TypeDefinition, TypeRef};
pub use validation::{CheckReport, Cursor, ValidationContext};
