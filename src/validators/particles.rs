//! Occurrence bounds of sequence particles
//!
//! Every element declaration inside a complex type's sequence carries a
//! `minOccurs`/`maxOccurs` pair; `None` for the maximum means unbounded.

use std::fmt;

use crate::error::{Error, Result};

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: usize,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<usize>,
}

/// Where a count falls relative to the bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccursCheck {
    /// Within `[min, max]`
    Within,
    /// Below the minimum
    Missing,
    /// Above the maximum
    Exceeded,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// Check if occurrence count is under the minimum
    pub fn is_missing(&self, count: usize) -> bool {
        count < self.min
    }

    /// Check if occurrence count exceeds the maximum
    pub fn is_exceeded(&self, count: usize) -> bool {
        match self.max {
            Some(max) => count > max,
            None => false,
        }
    }

    /// Classify a count
    pub fn check(&self, count: usize) -> OccursCheck {
        if self.is_missing(count) {
            OccursCheck::Missing
        } else if self.is_exceeded(count) {
            OccursCheck::Exceeded
        } else {
            OccursCheck::Within
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..unbounded", self.min),
        }
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<usize>().map_err(|_| {
            Error::Schema(format!(
                "minOccurs value '{}' is not a valid non-negative integer",
                min_str
            ))
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<usize>().map_err(|_| {
                Error::Schema(format!(
                    "maxOccurs value '{}' must be a non-negative integer or 'unbounded'",
                    max_str
                ))
            })?;
            if occurs.min > max {
                return Err(Error::Schema(format!(
                    "maxOccurs {} is lower than minOccurs {}",
                    max, occurs.min
                )));
            }
            occurs.max = Some(max);
        }
        None if occurs.min > 1 => {
            return Err(Error::Schema(format!(
                "minOccurs {} exceeds the default maxOccurs of 1",
                occurs.min
            )));
        }
        None => {}
    }

    Ok(occurs)
}
