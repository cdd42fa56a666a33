#![deny(warnings)]

//! Core domain model for the growth-share (BCG) matrix of a strategic plan.
//!
//! This crate defines the serializable matrix aggregate, the numeric coercion
//! policy applied to every user-entered value, and the mutation operations
//! that keep the per-product maps in lock-step.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod document;
mod matrix;
mod numeric;

pub use document::{CompetitorRow, MatrixDocument, ProductRow};
pub use matrix::BcgMatrix;
pub use numeric::{decimal_to_json, non_negative, non_negative_from_json, parse_non_negative_number};

/// Colors handed out to new products, cycled by product count.
pub const COLOR_PALETTE: [&str; 9] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#A29BFE", "#55E6C1", "#FD79A8",
    "#00B894",
];

/// First year of the demand range for a fresh matrix.
pub const DEFAULT_FIRST_YEAR: i32 = 2012;
/// Number of demand years in a fresh matrix.
pub const DEFAULT_YEAR_COUNT: usize = 6;
/// Number of products in a fresh matrix.
pub const DEFAULT_PRODUCT_COUNT: usize = 5;
/// Minimum number of entries a qualitative list keeps on removal.
pub const QUALITATIVE_FLOOR: usize = 2;
/// Minimum length of a year range.
pub const MIN_YEARS: usize = 2;

/// Product identity used as the key of every per-product map.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductName(pub String);

impl ProductName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A product plotted on the matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product {
    /// Unique name within the matrix.
    pub name: ProductName,
    /// Display color tag, e.g. "#FF6B6B".
    pub color: String,
}

/// One competitor row for a product.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompetitorEntry {
    /// Competing company name (may be blank).
    pub company: String,
    /// Competitor's current sales (>= 0).
    pub sales: Decimal,
}

impl CompetitorEntry {
    /// The placeholder row inserted for new products and emptied lists.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Strategic decision recorded per product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategicDecision {
    /// Hold the current position.
    #[default]
    #[serde(rename = "Mantener", alias = "Maintain")]
    Maintain,
    /// Build share through investment.
    #[serde(rename = "Invertir", alias = "Invest")]
    Invest,
    /// Maximize short-term cash flow.
    #[serde(rename = "Cosechar", alias = "Harvest")]
    Harvest,
    /// Exit the business.
    #[serde(rename = "Desinvertir", alias = "Divest")]
    Divest,
}

impl StrategicDecision {
    pub const ALL: [StrategicDecision; 4] = [
        StrategicDecision::Maintain,
        StrategicDecision::Invest,
        StrategicDecision::Harvest,
        StrategicDecision::Divest,
    ];

    /// Label stored in the matrix document.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Maintain => "Mantener",
            Self::Invest => "Invertir",
            Self::Harvest => "Cosechar",
            Self::Divest => "Desinvertir",
        }
    }

    /// Parse a stored or English label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim();
        Self::ALL.into_iter().find(|d| {
            d.label().eq_ignore_ascii_case(l) || d.to_string().eq_ignore_ascii_case(l)
        })
    }
}

impl fmt::Display for StrategicDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maintain => write!(f, "Maintain"),
            Self::Invest => write!(f, "Invest"),
            Self::Harvest => write!(f, "Harvest"),
            Self::Divest => write!(f, "Divest"),
        }
    }
}

/// Ordered demand years, always at least [`MIN_YEARS`] long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YearRange(Vec<i32>);

impl YearRange {
    pub fn new(years: Vec<i32>) -> Result<Self, ValidationError> {
        if years.len() < MIN_YEARS {
            return Err(ValidationError::TooFewYears(years.len()));
        }
        Ok(Self(years))
    }

    /// `count` consecutive years starting at `first`.
    pub fn contiguous(first: i32, count: usize) -> Result<Self, ValidationError> {
        let years = (0..count)
            .map(|i| i32::try_from(i).ok().and_then(|i| first.checked_add(i)))
            .collect::<Option<Vec<i32>>>()
            .ok_or(ValidationError::YearOverflow { first, count })?;
        Self::new(years)
    }

    pub fn first(&self) -> i32 {
        self.0[0]
    }

    pub fn last(&self) -> i32 {
        self.0[self.0.len() - 1]
    }

    pub fn max(&self) -> i32 {
        self.0.iter().copied().fold(i32::MIN, i32::max)
    }

    /// Number of growth periods covered, never less than one.
    pub fn periods(&self) -> usize {
        self.0.len().saturating_sub(1).max(1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, year: i32) -> bool {
        self.0.contains(&year)
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub(crate) fn push(&mut self, year: i32) {
        self.0.push(year);
    }

    pub(crate) fn pop(&mut self) -> Option<i32> {
        if self.0.len() <= MIN_YEARS {
            return None;
        }
        self.0.pop()
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self(
            (0..DEFAULT_YEAR_COUNT)
                .map(|i| DEFAULT_FIRST_YEAR + i as i32)
                .collect(),
        )
    }
}

/// Free-text list (strengths, weaknesses, opportunities, threats) that never
/// shrinks below [`QUALITATIVE_FLOOR`] entries through removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualitativeList(Vec<String>);

impl QualitativeList {
    pub fn new(entries: Vec<String>) -> Self {
        Self(entries)
    }

    /// Append a blank entry.
    pub fn add(&mut self) {
        self.0.push(String::new());
    }

    pub fn remove(&mut self, index: usize) -> Result<String, EditError> {
        if self.0.len() <= QUALITATIVE_FLOOR {
            return Err(EditError::ListFloor(QUALITATIVE_FLOOR));
        }
        if index >= self.0.len() {
            return Err(EditError::IndexOutOfRange(index));
        }
        Ok(self.0.remove(index))
    }

    pub fn set(&mut self, index: usize, text: impl Into<String>) -> Result<(), EditError> {
        let slot = self
            .0
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange(index))?;
        *slot = text.into();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for QualitativeList {
    fn default() -> Self {
        Self(vec![String::new(); QUALITATIVE_FLOOR])
    }
}

/// Validation errors for constructor invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A year range needs at least two years.
    #[error("year range needs at least 2 years, got {0}")]
    TooFewYears(usize),
    #[error("{count} years starting at {first} run past the last representable year")]
    YearOverflow { first: i32, count: usize },
}

/// A rejected mutation. The matrix is left unchanged whenever one is returned.
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    /// No product with this name exists.
    #[error("unknown product: {0}")]
    UnknownProduct(String),
    /// The last remaining product cannot be removed.
    #[error("cannot remove the last product")]
    LastProduct,
    /// Product names must contain non-whitespace characters.
    #[error("product name must not be blank")]
    BlankName,
    /// The year range is already at its minimum length.
    #[error("year range cannot shrink below 2 years")]
    MinimumYears,
    /// Year rebase target must be a positive integer.
    #[error("invalid first year: {0}")]
    InvalidYear(i64),
    /// The year is not part of the active range.
    #[error("year {0} is not in the active range")]
    UnknownYear(i32),
    /// Row index does not exist.
    #[error("index {0} is out of range")]
    IndexOutOfRange(usize),
    /// Qualitative lists keep a minimum number of entries.
    #[error("list cannot shrink below {0} entries")]
    ListFloor(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn year_range_requires_two_years() {
        assert_eq!(
            YearRange::new(vec![2020]),
            Err(ValidationError::TooFewYears(1))
        );
        assert_eq!(
            YearRange::contiguous(i32::MAX, 2),
            Err(ValidationError::YearOverflow { first: i32::MAX, count: 2 })
        );
        let r = YearRange::contiguous(2020, 4).unwrap();
        assert_eq!(r.first(), 2020);
        assert_eq!(r.last(), 2023);
        assert_eq!(r.periods(), 3);
    }

    #[test]
    fn year_range_pop_stops_at_floor() {
        let mut r = YearRange::contiguous(2020, 3).unwrap();
        assert_eq!(r.pop(), Some(2022));
        assert_eq!(r.pop(), None);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn decision_labels() {
        assert_eq!(
            StrategicDecision::from_label("Cosechar"),
            Some(StrategicDecision::Harvest)
        );
        assert_eq!(
            StrategicDecision::from_label(" divest "),
            Some(StrategicDecision::Divest)
        );
        assert_eq!(StrategicDecision::from_label("Grow"), None);
        assert_eq!(StrategicDecision::default().label(), "Mantener");
        let s = serde_json::to_string(&StrategicDecision::Invest).unwrap();
        assert_eq!(s, "\"Invertir\"");
    }

    #[test]
    fn qualitative_list_keeps_floor() {
        let mut l = QualitativeList::default();
        assert_eq!(l.remove(0), Err(EditError::ListFloor(2)));
        l.add();
        l.set(2, "Brand recognition").unwrap();
        assert_eq!(l.remove(2).unwrap(), "Brand recognition");
        assert_eq!(l.len(), 2);
        assert_eq!(l.set(5, "x"), Err(EditError::IndexOutOfRange(5)));
    }

    proptest! {
        #[test]
        fn qualitative_list_never_below_floor(ops in proptest::collection::vec(0usize..6, 0..40)) {
            let mut l = QualitativeList::default();
            for op in ops {
                if op == 0 {
                    l.add();
                } else {
                    let _ = l.remove(op - 1);
                }
                prop_assert!(l.len() >= QUALITATIVE_FLOOR);
            }
        }

        #[test]
        fn contiguous_periods(first in 1i32..3000, count in 2usize..30) {
            let r = YearRange::contiguous(first, count).unwrap();
            prop_assert_eq!(r.periods(), count - 1);
            prop_assert_eq!(r.max(), first + count as i32 - 1);
        }
    }
}
