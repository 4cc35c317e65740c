//! # Filter Conditions
//!
//! Typed filter conditions produced by the query compiler and evaluated by
//! storage adapters. Values are already coerced to the column type, so
//! evaluation never looks at raw query-string text.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::value::{FieldValue, Record};

/// Filter operators accepted in `column[op]=value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    /// `%` wildcard match
    Like,
    /// Comma-separated list membership
    In,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::In => "in",
        }
    }

    /// Range operators need an ordered column type
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte
        )
    }

    /// Evaluate a comparison result against this operator
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterOperator::Eq => ordering == Ordering::Equal,
            FilterOperator::Ne => ordering != Ordering::Equal,
            FilterOperator::Gt => ordering == Ordering::Greater,
            FilterOperator::Lt => ordering == Ordering::Less,
            FilterOperator::Gte => ordering != Ordering::Less,
            FilterOperator::Lte => ordering != Ordering::Greater,
            FilterOperator::Like | FilterOperator::In => false,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "eq" => Ok(FilterOperator::Eq),
            "ne" => Ok(FilterOperator::Ne),
            "gt" => Ok(FilterOperator::Gt),
            "lt" => Ok(FilterOperator::Lt),
            "gte" => Ok(FilterOperator::Gte),
            "lte" => Ok(FilterOperator::Lte),
            "like" => Ok(FilterOperator::Like),
            "in" => Ok(FilterOperator::In),
            other => Err(EngineError::validation(
                other,
                format!("unsupported filter operator '{}'", other),
            )),
        }
    }
}

/// A LIKE pattern: `%` matches any run of characters, everything else is
/// literal. Matching is case-sensitive and anchored at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    raw: String,
    parts: Vec<String>,
}

impl LikePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let parts = raw.split('%').map(str::to_string).collect();
        Self { raw, parts }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, value: &str) -> bool {
        let (first, last) = match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return value.is_empty(),
        };
        if self.parts.len() == 1 {
            return value == first;
        }

        let Some(mut rest) = value.strip_prefix(first.as_str()) else {
            return false;
        };
        for middle in &self.parts[1..self.parts.len() - 1] {
            match rest.find(middle.as_str()) {
                Some(pos) => rest = &rest[pos + middle.len()..],
                None => return false,
            }
        }
        rest.ends_with(last.as_str())
    }
}

/// A single compiled filter
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: FilterOperator,
        value: FieldValue,
    },
    In {
        column: String,
        values: Vec<FieldValue>,
    },
    Like {
        column: String,
        pattern: LikePattern,
    },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::Compare {
            column: column.into(),
            op: FilterOperator::Eq,
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Condition::Compare { column, .. }
            | Condition::In { column, .. }
            | Condition::Like { column, .. } => column,
        }
    }

    /// Evaluate against a record. A null row value never matches.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.value(self.column());
        if actual.is_null() {
            return false;
        }
        match self {
            Condition::Compare { op, value, .. } => op.accepts(actual.total_cmp(value)),
            Condition::In { values, .. } => values.iter().any(|v| v == actual),
            Condition::Like { pattern, .. } => {
                actual.as_str().map(|s| pattern.matches(s)).unwrap_or(false)
            }
        }
    }
}

/// Full-text search term: case-insensitive substring match OR'd across
/// the schema's string columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub term: String,
    pub columns: Vec<String>,
    needle: String,
}

impl SearchTerm {
    pub fn new(term: impl Into<String>, columns: Vec<String>) -> Self {
        let term = term.into();
        let needle = term.to_lowercase();
        Self {
            term,
            columns,
            needle,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.columns.iter().any(|column| {
            record
                .value(column)
                .as_str()
                .map(|s| s.to_lowercase().contains(&self.needle))
                .unwrap_or(false)
        })
    }
}
