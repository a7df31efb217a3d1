//! Schema resource parsing
//!
//! Builds a [`SchemaModel`] from XSD text. Only the vocabulary the payment
//! schemas use is understood: named simple types restricted by pattern,
//! length and enumeration facets; named complex types holding a sequence
//! (or simple content); top-level elements. Anything else is skipped.

use tracing::debug;

use super::facets::{EnumerationFacet, MaxLengthFacet, MinLengthFacet, PatternFacet};
use super::particles::parse_occurs;
use super::schemas::{ComplexType, ElementSpec, Restriction, SchemaModel, TypeRef};
use crate::documents::{Document, NodeId};
use crate::error::{Error, Result};
use crate::namespaces::{split_prefixed, XSD_NAMESPACE};

/// Parse XSD text into a schema model
pub fn parse_schema(xsd: &str) -> Result<SchemaModel> {
    let doc = Document::parse(xsd)?;
    let root = doc
        .root()
        .ok_or_else(|| Error::Schema("schema document has no root element".to_string()))?;

    if doc.local_name(root) != "schema" || doc.namespace(root) != Some(XSD_NAMESPACE) {
        return Err(Error::Schema(format!(
            "root element <{}> is not an XSD schema",
            doc.local_name(root)
        )));
    }

    let parser = SchemaParser { doc: &doc };
    let mut model = SchemaModel {
        target_namespace: doc.attribute(root, "targetNamespace").unwrap_or("").to_string(),
        ..SchemaModel::default()
    };

    // Top-level elements first so `ref` declarations can inherit their types
    for child in parser.xsd_children(root, "element") {
        if let Some(name) = doc.attribute(child, "name") {
            let type_ref = parser.type_attribute(child, "type")?;
            model.root_elements.insert(name.to_string(), type_ref);
        }
    }

    for child in parser.xsd_children(root, "simpleType") {
        let Some(name) = doc.attribute(child, "name") else {
            continue;
        };
        match parser.parse_restriction(child)? {
            Some(restriction) => {
                model.simple_types.insert(name.to_string(), restriction);
            }
            None => debug!(simple_type = name, "simple type without restriction skipped"),
        }
    }

    for child in parser.xsd_children(root, "complexType") {
        let Some(name) = doc.attribute(child, "name") else {
            continue;
        };
        let complex_type = parser.parse_complex_type(child, &model)?;
        model.complex_types.insert(name.to_string(), complex_type);
    }

    Ok(model)
}

struct SchemaParser<'a> {
    doc: &'a Document,
}

impl<'a> SchemaParser<'a> {
    /// Direct XSD-namespace children with the given local name
    fn xsd_children(&self, node: NodeId, local_name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        let doc = self.doc;
        doc.child_elements(node)
            .filter(move |&c| doc.local_name(c) == local_name && doc.namespace(c) == Some(XSD_NAMESPACE))
    }

    fn xsd_child(&self, node: NodeId, local_name: &'a str) -> Option<NodeId> {
        self.xsd_children(node, local_name).next()
    }

    /// Resolve a QName-valued attribute to a type reference
    fn type_attribute(&self, node: NodeId, attr: &str) -> Result<Option<TypeRef>> {
        let Some(value) = self.doc.attribute(node, attr) else {
            return Ok(None);
        };
        let (prefix, local) = split_prefixed(value.trim());
        let namespace = self.doc.lookup_namespace(node, prefix);

        if namespace == Some(XSD_NAMESPACE) {
            Ok(Some(TypeRef::Builtin(local.to_string())))
        } else if prefix.is_some() && namespace.is_none() {
            Err(Error::Schema(format!(
                "unbound prefix in {}=\"{}\"",
                attr, value
            )))
        } else {
            Ok(Some(TypeRef::Named(local.to_string())))
        }
    }

    fn facet_value(&self, facet: NodeId) -> Result<&'a str> {
        self.doc.attribute(facet, "value").ok_or_else(|| {
            Error::Schema(format!(
                "facet <{}> has no value",
                self.doc.local_name(facet)
            ))
        })
    }

    fn length_value(&self, facet: NodeId) -> Result<usize> {
        let value = self.facet_value(facet)?;
        value.trim().parse().map_err(|_| {
            Error::Schema(format!(
                "invalid {} value '{}'",
                self.doc.local_name(facet),
                value
            ))
        })
    }

    fn parse_restriction(&self, simple_type: NodeId) -> Result<Option<Restriction>> {
        let Some(node) = self.xsd_child(simple_type, "restriction") else {
            return Ok(None);
        };

        let base = self
            .type_attribute(node, "base")?
            .unwrap_or_else(|| TypeRef::Builtin("string".to_string()));
        let mut restriction = Restriction::new(base);
        let mut enumeration = Vec::new();

        for facet in self.doc.child_elements(node) {
            if self.doc.namespace(facet) != Some(XSD_NAMESPACE) {
                continue;
            }
            match self.doc.local_name(facet) {
                "pattern" if restriction.pattern.is_none() => {
                    restriction.pattern = Some(PatternFacet::new(self.facet_value(facet)?)?);
                }
                "minLength" => {
                    restriction.min_length = Some(MinLengthFacet::new(self.length_value(facet)?));
                }
                "maxLength" => {
                    restriction.max_length = Some(MaxLengthFacet::new(self.length_value(facet)?));
                }
                "length" => {
                    let len = self.length_value(facet)?;
                    restriction.min_length = Some(MinLengthFacet::new(len));
                    restriction.max_length = Some(MaxLengthFacet::new(len));
                }
                "enumeration" => enumeration.push(self.facet_value(facet)?.to_string()),
                other => debug!(facet = other, "unsupported facet ignored"),
            }
        }

        if !enumeration.is_empty() {
            restriction.enumeration = Some(EnumerationFacet::new(enumeration));
        }
        Ok(Some(restriction))
    }

    fn parse_complex_type(&self, node: NodeId, model: &SchemaModel) -> Result<ComplexType> {
        let mut complex_type = ComplexType::default();

        if let Some(content) = self.xsd_child(node, "simpleContent") {
            let derivation = self
                .xsd_child(content, "extension")
                .or_else(|| self.xsd_child(content, "restriction"));
            if let Some(derivation) = derivation {
                complex_type.simple_content = self.type_attribute(derivation, "base")?;
            }
            return Ok(complex_type);
        }

        if let Some(sequence) = self.xsd_child(node, "sequence") {
            self.collect_sequence(sequence, model, &mut complex_type.elements)?;
        }
        Ok(complex_type)
    }

    /// Flatten a sequence (and nested sequences) into element specs
    fn collect_sequence(
        &self,
        sequence: NodeId,
        model: &SchemaModel,
        out: &mut Vec<ElementSpec>,
    ) -> Result<()> {
        for child in self.doc.child_elements(sequence) {
            if self.doc.namespace(child) != Some(XSD_NAMESPACE) {
                continue;
            }
            match self.doc.local_name(child) {
                "element" => {
                    if let Some(spec) = self.parse_element_spec(child, model)? {
                        out.push(spec);
                    }
                }
                "sequence" => self.collect_sequence(child, model, out)?,
                other => debug!(particle = other, "unsupported particle ignored"),
            }
        }
        Ok(())
    }

    fn parse_element_spec(&self, node: NodeId, model: &SchemaModel) -> Result<Option<ElementSpec>> {
        let occurs = parse_occurs(
            self.doc.attribute(node, "minOccurs"),
            self.doc.attribute(node, "maxOccurs"),
        )?;

        if let Some(reference) = self.doc.attribute(node, "ref") {
            let (_, name) = split_prefixed(reference.trim());
            let type_ref = model.root_elements.get(name).cloned().flatten();
            return Ok(Some(ElementSpec {
                name: name.to_string(),
                type_ref,
                occurs,
            }));
        }

        let Some(name) = self.doc.attribute(node, "name") else {
            return Ok(None);
        };
        Ok(Some(ElementSpec {
            name: name.to_string(),
            type_ref: self.type_attribute(node, "type")?,
            occurs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::particles::Occurs;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns="urn:test" targetNamespace="urn:test" elementFormDefault="qualified">
  <xs:element name="Envelope" type="Envelope"/>
  <xs:element name="Hdr" type="Header"/>
  <xs:complexType name="Envelope">
    <xs:sequence>
      <xs:element ref="Hdr"/>
      <xs:element name="Item" type="Code" minOccurs="0" maxOccurs="unbounded"/>
      <xs:element name="Amt" type="Amount"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Header">
    <xs:sequence>
      <xs:element name="Id" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Amount">
    <xs:simpleContent>
      <xs:extension base="DecimalNumber"/>
    </xs:simpleContent>
  </xs:complexType>
  <xs:simpleType name="Code">
    <xs:restriction base="xs:string">
      <xs:enumeration value="A"/>
      <xs:enumeration value="B"/>
      <xs:maxLength value="4"/>
      <xs:pattern value="[A-Z]+"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="DecimalNumber">
    <xs:restriction base="xs:decimal">
      <xs:fractionDigits value="2"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

    #[test]
    fn test_parse_model() {
        let model = parse_schema(SCHEMA).unwrap();
        assert_eq!(model.target_namespace, "urn:test");
        assert_eq!(
            model.root_elements.keys().collect::<Vec<_>>(),
            vec!["Envelope", "Hdr"]
        );

        let envelope = &model.complex_types["Envelope"];
        let names: Vec<_> = envelope.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Hdr", "Item", "Amt"]);
        assert_eq!(envelope.elements[0].type_ref, Some(TypeRef::Named("Header".into())));
        assert_eq!(envelope.elements[1].occurs, Occurs::zero_or_more());

        let header = &model.complex_types["Header"];
        assert_eq!(header.elements[0].type_ref, Some(TypeRef::Builtin("string".into())));

        let amount = &model.complex_types["Amount"];
        assert_eq!(amount.simple_content, Some(TypeRef::Named("DecimalNumber".into())));
    }

    #[test]
    fn test_parse_restriction_facets() {
        let model = parse_schema(SCHEMA).unwrap();
        let code = &model.simple_types["Code"];
        assert_eq!(code.base, TypeRef::Builtin("string".into()));
        assert_eq!(code.max_length.as_ref().map(|f| f.value), Some(4));
        assert_eq!(code.pattern.as_ref().map(|f| f.pattern.as_str()), Some("[A-Z]+"));
        assert_eq!(
            code.enumeration.as_ref().map(|f| f.values.clone()),
            Some(vec!["A".to_string(), "B".to_string()])
        );

        let decimal = &model.simple_types["DecimalNumber"];
        assert!(decimal.pattern.is_none() && decimal.enumeration.is_none());
    }

    #[test]
    fn test_rejects_non_schema_documents() {
        assert!(matches!(parse_schema("<root/>"), Err(Error::Schema(_))));
        assert!(matches!(parse_schema("<xs:schema"), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_invalid_facets() {
        let bad_pattern = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="T"><xs:restriction base="xs:string"><xs:pattern value="(["/></xs:restriction></xs:simpleType>
        </xs:schema>"#;
        assert!(matches!(parse_schema(bad_pattern), Err(Error::Schema(_))));

        let bad_length = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="T"><xs:restriction base="xs:string"><xs:maxLength value="x"/></xs:restriction></xs:simpleType>
        </xs:schema>"#;
        assert!(matches!(parse_schema(bad_length), Err(Error::Schema(_))));
    }
}
