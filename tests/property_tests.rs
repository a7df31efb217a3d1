//! Property-based tests

use proptest::prelude::*;
use spi_xml::preprocess::{is_allowed, sanitize};
use spi_xml::validators::{parse_schema, validate_document};
use spi_xml::Document;

const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:p">
  <xs:element name="Root" type="RootType"/>
  <xs:complexType name="RootType">
    <xs:sequence>
      <xs:element name="A" type="xs:string"/>
      <xs:element name="B" type="xs:string" minOccurs="0" maxOccurs="3"/>
      <xs:element name="C" type="xs:string"/>
      <xs:element name="D" type="xs:string" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

const NAMES: [&str; 4] = ["A", "B", "C", "D"];

fn document_with(children: &[usize]) -> String {
    let body: String = children
        .iter()
        .map(|&i| format!("<{0}>x</{0}>", NAMES[i]))
        .collect();
    format!(r#"<Root xmlns="urn:p">{}</Root>"#, body)
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(input in any::<String>()) {
        let once = sanitize(&input);
        prop_assert_eq!(sanitize(&once), once.clone());
        prop_assert!(once.chars().all(is_allowed));
    }

    #[test]
    fn sanitize_keeps_allowed_text(input in "[ -~\t\n\r\u{a0}-\u{ff}]*") {
        prop_assert_eq!(sanitize(&input), input);
    }

    #[test]
    fn order_and_occurrence_are_checked(children in prop::collection::vec(0usize..4, 0..8)) {
        let schema = parse_schema(SCHEMA).unwrap();
        let doc = Document::parse(&document_with(&children)).unwrap();
        let report = validate_document(&doc, &schema);

        let count = |i: usize| children.iter().filter(|&&c| c == i).count();
        let sorted = children.windows(2).all(|w| w[0] <= w[1]);
        let counts_ok = count(0) == 1 && count(1) <= 3 && count(2) == 1 && count(3) <= 1;

        prop_assert_eq!(report.ok, sorted && counts_ok, "{:?}", report.issues);

        let order_issues = report
            .issues
            .iter()
            .filter(|i| i.message.contains("out of order"))
            .count();
        prop_assert_eq!(order_issues, usize::from(!sorted));
    }
}
