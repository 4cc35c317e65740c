//! # Aggregation Spec
//!
//! Parameters:
//!
//! ```text
//! column[op]=value        filters, same grammar as list queries
//! group_by=a,b            group key columns
//! count=*  | count=a,b    row count / non-null counts
//! sum=a  avg=a  min=a  max=a
//! sort=-quantity_sum,brand
//! ```
//!
//! Every aggregate is named `<column>_<function>` in the output, except the
//! row count which is `count`.

use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::query::{
    compile_filter, parse_sort_with, split_filter_key, split_list, Condition, SortKey, PARAM_SORT,
};
use crate::schema::CollectionSchema;

pub const PARAM_GROUP_BY: &str = "group_by";

/// Alias of the row count
pub const ROW_COUNT: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    /// Everything but `count` needs a numeric column
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggregateFunction {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                EngineError::validation(s, format!("unsupported aggregate function '{}'", s))
            })
    }
}

/// One requested aggregate. `column` is `None` only for the row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: Option<String>,
}

impl Aggregate {
    pub fn count_rows() -> Self {
        Self {
            function: AggregateFunction::Count,
            column: None,
        }
    }

    pub fn of(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: Some(column.into()),
        }
    }

    /// Output column name
    pub fn alias(&self) -> String {
        match &self.column {
            Some(column) => format!("{}_{}", column, self.function),
            None => ROW_COUNT.to_string(),
        }
    }
}

/// Compiled aggregation request
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub filters: Vec<Condition>,
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
    /// Sort over output columns; empty keeps group-key order
    pub sort: Vec<SortKey>,
}

impl AggregationSpec {
    /// Output column names, group keys first
    pub fn output_columns(&self) -> Vec<String> {
        self.group_by
            .iter()
            .cloned()
            .chain(self.aggregates.iter().map(Aggregate::alias))
            .collect()
    }

    /// Compile raw parameters against a schema
    pub fn compile(
        params: &[(String, String)],
        schema: &CollectionSchema,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let mut filters = Vec::new();
        let mut group_by: Option<Vec<String>> = None;
        let mut requested: Vec<(AggregateFunction, &str)> = Vec::new();
        let mut sort_param: Option<&str> = None;

        for (key, value) in params {
            if key == PARAM_GROUP_BY {
                if group_by.is_none() {
                    group_by = Some(parse_group_by(value, schema)?);
                }
            } else if key == PARAM_SORT {
                sort_param.get_or_insert(value.as_str());
            } else if let Ok(function) = key.parse::<AggregateFunction>() {
                if !requested.iter().any(|(f, _)| *f == function) {
                    requested.push((function, value.as_str()));
                }
            } else if let Some((column, op)) = split_filter_key(key) {
                filters.push(compile_filter(schema, key, column, op, value)?);
                if filters.len() > config.query.max_filters {
                    return Err(EngineError::validation(
                        "filters",
                        format!("at most {} filters allowed", config.query.max_filters),
                    ));
                }
            }
        }

        let mut aggregates: Vec<Aggregate> = Vec::new();
        for (function, value) in requested {
            for aggregate in parse_aggregates(function, value, schema)? {
                if !aggregates.contains(&aggregate) {
                    aggregates.push(aggregate);
                }
            }
        }
        if aggregates.is_empty() {
            return Err(EngineError::validation(
                "aggregates",
                "at least one of count, sum, avg, min, max is required",
            ));
        }

        let mut spec = AggregationSpec {
            filters,
            group_by: group_by.unwrap_or_default(),
            aggregates,
            sort: Vec::new(),
        };

        let outputs = spec.output_columns();
        for (i, name) in outputs.iter().enumerate() {
            if outputs[..i].contains(name) {
                return Err(EngineError::validation(
                    name,
                    "output column is produced more than once",
                ));
            }
        }

        if let Some(value) = sort_param {
            spec.sort = parse_sort_with(value, config.query.max_sort_fields, |name| {
                if outputs.iter().any(|o| o == name) {
                    Ok(name.to_string())
                } else {
                    Err(EngineError::validation(
                        PARAM_SORT,
                        format!("'{}' is not an output column", name),
                    ))
                }
            })?;
        }

        Ok(spec)
    }
}

fn parse_group_by(value: &str, schema: &CollectionSchema) -> EngineResult<Vec<String>> {
    let mut columns: Vec<String> = Vec::new();
    for name in split_list(value) {
        let column = schema.require_column(PARAM_GROUP_BY, name)?;
        if columns.contains(&column.name) {
            return Err(EngineError::validation(
                PARAM_GROUP_BY,
                format!("column '{}' grouped more than once", name),
            ));
        }
        columns.push(column.name.clone());
    }
    Ok(columns)
}

fn parse_aggregates(
    function: AggregateFunction,
    value: &str,
    schema: &CollectionSchema,
) -> EngineResult<Vec<Aggregate>> {
    let names: Vec<&str> = split_list(value).collect();
    if function == AggregateFunction::Count && names.is_empty() {
        return Ok(vec![Aggregate::count_rows()]);
    }

    names
        .into_iter()
        .map(|name| {
            if name == "*" && function == AggregateFunction::Count {
                return Ok(Aggregate::count_rows());
            }
            let column = schema.require_column(function.as_str(), name)?;
            if function.requires_numeric() && !column.column_type.is_numeric() {
                return Err(EngineError::validation(
                    name,
                    format!(
                        "{} requires an integer or decimal column, '{}' is {}",
                        function, name, column.column_type
                    ),
                ));
            }
            Ok(Aggregate::of(function, column.name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn schema() -> CollectionSchema {
        CollectionSchema {
            name: "products".to_string(),
            columns: vec![
                ColumnDef::id(),
                ColumnDef::new("brand", ColumnType::String),
                ColumnDef::new("quantity", ColumnType::Integer),
                ColumnDef::new("price", ColumnType::Decimal).nullable(),
            ],
            version: 1,
        }
    }

    fn compile(pairs: &[(&str, &str)]) -> EngineResult<AggregationSpec> {
        let params: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AggregationSpec::compile(&params, &schema(), &EngineConfig::default())
    }

    #[test]
    fn test_group_and_sum() {
        let spec = compile(&[("group_by", "brand"), ("sum", "quantity")]).unwrap();
        assert_eq!(spec.group_by, vec!["brand".to_string()]);
        assert_eq!(
            spec.aggregates,
            vec![Aggregate::of(AggregateFunction::Sum, "quantity")]
        );
        assert_eq!(spec.output_columns(), vec!["brand", "quantity_sum"]);
    }

    #[test]
    fn test_row_count_forms() {
        for value in ["*", ""] {
            let spec = compile(&[("count", value)]).unwrap();
            assert_eq!(spec.aggregates, vec![Aggregate::count_rows()]);
            assert_eq!(spec.aggregates[0].alias(), "count");
        }
        let spec = compile(&[("count", "*,brand")]).unwrap();
        assert_eq!(spec.output_columns(), vec!["count", "brand_count"]);
    }

    #[test]
    fn test_numeric_only_functions() {
        assert!(compile(&[("sum", "brand")]).is_err());
        assert!(compile(&[("avg", "price"), ("max", "quantity")]).is_ok());
        assert!(compile(&[("count", "brand")]).is_ok());
    }

    #[test]
    fn test_requires_an_aggregate() {
        let err = compile(&[("group_by", "brand")]).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_filters_and_sort() {
        let spec = compile(&[
            ("brand[ne]", "Apple"),
            ("sum", "quantity"),
            ("group_by", "brand"),
            ("sort", "-quantity_sum"),
        ])
        .unwrap();
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.sort, vec![SortKey::desc("quantity_sum")]);

        assert!(compile(&[("sum", "quantity"), ("sort", "price")]).is_err());
    }

    #[test]
    fn test_unknown_group_column() {
        assert!(compile(&[("group_by", "colour"), ("count", "*")]).is_err());
    }
}
