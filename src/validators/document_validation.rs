//! Document validation
//!
//! Structural validation of a parsed document against a [`SchemaModel`]:
//! root name and namespace, then a recursive walk that checks child order,
//! occurrence bounds, content types and unexpected children of every
//! complex-typed element. XML-DSig elements are invisible to the walk.

use indexmap::IndexMap;

use super::particles::OccursCheck;
use super::schemas::{ComplexType, SchemaModel, TypeDefinition, TypeRef};
use super::validation::{CheckReport, Cursor, ValidationContext};
use crate::documents::{Document, NodeId};
use crate::dsig::is_signature_element;

/// Validate an XML document against the schema
pub fn validate_document(doc: &Document, schema: &SchemaModel) -> CheckReport {
    let mut ctx = ValidationContext::new();

    let Some(root) = doc.root() else {
        ctx.report("Document has no root element", "/", None);
        return ctx.into_report();
    };
    let Some((root_name, root_type)) = schema.expected_root() else {
        ctx.report("Schema declares no root element", "/", None);
        return ctx.into_report();
    };

    let cursor = Cursor::at(doc, root);
    if doc.local_name(root) != root_name {
        ctx.report(
            format!(
                "Root element must be \"{}\", found \"{}\"",
                root_name,
                doc.local_name(root)
            ),
            "/",
            cursor.pos,
        );
    }

    let namespace = doc.namespace(root).unwrap_or("");
    if namespace != schema.target_namespace {
        ctx.report(
            format!(
                "Incorrect namespace. Expected: {}, found: {}",
                schema.target_namespace, namespace
            ),
            cursor.path.clone(),
            cursor.pos,
        );
    }

    if let Some(type_ref) = root_type {
        let walker = Walker { doc, schema };
        walker.validate_type(&mut ctx, root, type_ref, &cursor);
    }

    ctx.into_report()
}

struct Walker<'a> {
    doc: &'a Document,
    schema: &'a SchemaModel,
}

impl<'a> Walker<'a> {
    /// Check an element against its declared type
    fn validate_type(&self, ctx: &mut ValidationContext, node: NodeId, type_ref: &TypeRef, cursor: &Cursor) {
        match self.schema.resolve(type_ref) {
            TypeDefinition::Builtin | TypeDefinition::Unresolved => {}
            TypeDefinition::Simple(restriction) => {
                let text = self.doc.text_content(node);
                if let Err(message) = restriction.validate(text.trim(), type_ref.name()) {
                    ctx.report(message, cursor.path.clone(), cursor.pos);
                }
            }
            TypeDefinition::Complex(complex_type) => match &complex_type.simple_content {
                Some(content_type) => self.validate_type(ctx, node, content_type, cursor),
                None => self.validate_complex(ctx, node, complex_type, cursor),
            },
        }
    }

    fn validate_complex(&self, ctx: &mut ValidationContext, node: NodeId, complex_type: &ComplexType, cursor: &Cursor) {
        let ordered: Vec<(&str, NodeId)> = self
            .doc
            .child_elements(node)
            .map(|c| (self.doc.local_name(c), c))
            .collect();

        let mut by_name: IndexMap<&str, Vec<NodeId>> = IndexMap::new();
        for &(name, child) in &ordered {
            by_name.entry(name).or_default().push(child);
        }

        self.check_order(ctx, &ordered, complex_type, cursor);

        for spec in &complex_type.elements {
            let found = by_name.get(spec.name.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let path = cursor.child_path(&spec.name);

            match spec.occurs.check(found.len()) {
                OccursCheck::Missing => {
                    ctx.report(
                        format!(
                            "Required element \"{}\" missing or insufficient (expected minimum: {}, found: {})",
                            spec.name,
                            spec.occurs.min,
                            found.len()
                        ),
                        path,
                        cursor.pos,
                    );
                }
                OccursCheck::Exceeded => {
                    let max = spec.occurs.max.unwrap_or(found.len());
                    let anchor = found.get(max).and_then(|&n| self.doc.position(n));
                    ctx.report(
                        format!(
                            "Element \"{}\" appears more times than allowed (maximum: {}, found: {})",
                            spec.name,
                            max,
                            found.len()
                        ),
                        path,
                        anchor.or(cursor.pos),
                    );
                }
                OccursCheck::Within => {
                    let Some(type_ref) = &spec.type_ref else {
                        continue;
                    };
                    for &child in found {
                        let child_cursor = Cursor {
                            path: path.clone(),
                            pos: self.doc.position(child).or(cursor.pos),
                        };
                        self.validate_type(ctx, child, type_ref, &child_cursor);
                    }
                }
            }
        }

        for (name, nodes) in &by_name {
            if complex_type.spec(name).is_some() || is_signature_element(self.doc, nodes[0]) {
                continue;
            }
            ctx.report(
                format!(
                    "Unexpected element \"{}\" found. Allowed elements: {}",
                    name,
                    complex_type.allowed_names()
                ),
                cursor.child_path(name),
                self.doc.position(nodes[0]).or(cursor.pos),
            );
        }
    }

    /// Report the first child that precedes a sibling declared before it
    fn check_order(&self, ctx: &mut ValidationContext, ordered: &[(&str, NodeId)], complex_type: &ComplexType, cursor: &Cursor) {
        let positioned: Vec<(&str, NodeId, usize)> = ordered
            .iter()
            .filter(|(_, node)| !is_signature_element(self.doc, *node))
            .filter_map(|&(name, node)| complex_type.position_of(name).map(|pos| (name, node, pos)))
            .collect();

        for (i, &(current, _, current_pos)) in positioned.iter().enumerate() {
            let misplaced = positioned[i + 1..]
                .iter()
                .find(|&&(_, _, next_pos)| next_pos < current_pos);

            if let Some(&(next, next_node, next_pos)) = misplaced {
                let expected_after = match next_pos {
                    0 => "it should come first".to_string(),
                    p => format!("it should appear after \"{}\"", complex_type.elements[p - 1].name),
                };
                ctx.report(
                    format!(
                        "Element \"{}\" appears out of order after \"{}\"; {}",
                        next, current, expected_after
                    ),
                    cursor.child_path(next),
                    self.doc.position(next_node).or(cursor.pos),
                );
                return;
            }
        }
    }
}
