//! Business rules
//!
//! Semantic checks that sit outside the schema: identifier formats, code
//! tables and cross-field consistency. Every rule set extracts its fields
//! from the raw document text through named regex captures into typed field
//! structs, then checks those structs. Rule sets never fail; they return the
//! list of violated rules.

use crate::detection::MessageFamily;
use crate::error::ValidationIssue;
use crate::validators::CheckReport;

macro_rules! field_pattern {
    ($name:ident, $pattern:expr) => {
        static $name: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
            regex::Regex::new($pattern).expect("static field pattern is valid")
        });
    };
}

pub mod common;
pub mod pacs002;
pub mod pacs004;
pub mod pacs008;

pub use common::{AppHdrFields, Parsed, TransactionId};
pub use pacs002::{Pacs002Fields, Pacs002Rules};
pub use pacs004::{Pacs004Fields, Pacs004Rules, ReturnTransaction};
pub use pacs008::{CreditTransfer, Pacs008Fields, Pacs008Rules};

/// A family-specific rule set
pub trait BusinessRules: Send + Sync {
    /// Family the rules apply to
    fn family(&self) -> MessageFamily;

    /// Check document text and return every violated rule
    fn validate(&self, xml: &str) -> Vec<String>;
}

/// Rule set for a family
pub fn rules_for(family: MessageFamily) -> Box<dyn BusinessRules> {
    match family {
        MessageFamily::Pacs002 => Box::new(Pacs002Rules),
        MessageFamily::Pacs004 => Box::new(Pacs004Rules),
        MessageFamily::Pacs008 => Box::new(Pacs008Rules),
    }
}

/// Run the rule set of `family` (if any) and wrap the outcome as a report
pub fn validate_business(xml: &str, family: Option<MessageFamily>) -> CheckReport {
    let issues = family
        .map(|f| rules_for(f).validate(xml))
        .unwrap_or_default()
        .into_iter()
        .map(ValidationIssue::business)
        .collect();
    CheckReport::from_issues(issues)
}
