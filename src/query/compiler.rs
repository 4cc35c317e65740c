//! # Query Compiler
//!
//! Turns raw query-string pairs into a schema-validated `QuerySpec`.
//!
//! Grammar:
//!
//! ```text
//! column[op]=value     op ∈ eq ne gt lt gte lte like in   (repeatable, AND'ed)
//! sort=-a,b            leading '-' descending, '+' or none ascending
//! q=term               case-insensitive substring over string columns
//! fields=a,b           projection, `id` always included
//! limit=n              [1, max_limit], default when absent
//! after=id             cursor
//! ```
//!
//! Reserved keys take their first occurrence. Keys that are neither
//! reserved nor filters are ignored.

use super::filter::{Condition, FilterOperator, LikePattern, SearchTerm};
use super::spec::{QuerySpec, SortDirection, SortKey};
use crate::config::{EngineConfig, MIN_PAGE_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::schema::{coerce_literal, CollectionSchema, ColumnType, ID_COLUMN};

pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_AFTER: &str = "after";
pub const PARAM_SORT: &str = "sort";
pub const PARAM_SEARCH: &str = "q";
pub const PARAM_FIELDS: &str = "fields";

/// Compile raw parameters against a schema
pub fn compile(
    params: &[(String, String)],
    schema: &CollectionSchema,
    config: &EngineConfig,
) -> EngineResult<QuerySpec> {
    let mut filters = Vec::new();
    let mut sort = None;
    let mut search = None;
    let mut fields = None;
    let mut cursor = None;
    let mut limit = None;

    for (key, value) in params {
        match key.as_str() {
            PARAM_LIMIT => {
                if limit.is_none() {
                    limit = Some(parse_limit(value, config.pagination.max_limit)?);
                }
            }
            PARAM_AFTER => {
                if cursor.is_none() {
                    cursor = Some(value.trim().to_string());
                }
            }
            PARAM_SORT => {
                if sort.is_none() {
                    sort = Some(parse_sort(value, schema, config.query.max_sort_fields)?);
                }
            }
            PARAM_SEARCH => {
                if search.is_none() {
                    search = Some(value.trim().to_string());
                }
            }
            PARAM_FIELDS => {
                if fields.is_none() {
                    fields = Some(parse_fields(value, schema)?);
                }
            }
            _ => {
                if let Some((column, op)) = split_filter_key(key) {
                    filters.push(compile_filter(schema, key, column, op, value)?);
                    if filters.len() > config.query.max_filters {
                        return Err(EngineError::validation(
                            "filters",
                            format!("at most {} filters allowed", config.query.max_filters),
                        ));
                    }
                }
            }
        }
    }

    Ok(QuerySpec {
        filters,
        sort: sort.unwrap_or_default(),
        search: search
            .filter(|term| !term.is_empty())
            .map(|term| SearchTerm::new(term, schema.search_columns())),
        fields: fields.flatten(),
        cursor: cursor.filter(|c| !c.is_empty()),
        limit: limit.unwrap_or(config.pagination.default_limit),
    })
}

/// Split `column[op]` into its parts
pub fn split_filter_key(key: &str) -> Option<(&str, &str)> {
    let inner = key.strip_suffix(']')?;
    let open = inner.rfind('[')?;
    Some((&inner[..open], &inner[open + 1..]))
}

/// Compile one filter, checking the operator against the column type and
/// coercing the literal
pub fn compile_filter(
    schema: &CollectionSchema,
    key: &str,
    column: &str,
    op: &str,
    raw: &str,
) -> EngineResult<Condition> {
    let op: FilterOperator = op.parse().map_err(|_| {
        EngineError::validation(key, format!("unsupported filter operator '{}'", op))
    })?;
    let def = schema.require_column(key, column)?;

    if !operator_supported(op, def.column_type) {
        return Err(EngineError::validation(
            column,
            format!(
                "operator '{}' is not valid for {} column",
                op, def.column_type
            ),
        ));
    }

    let condition = match op {
        FilterOperator::Like => Condition::Like {
            column: def.name.clone(),
            pattern: LikePattern::new(raw),
        },
        FilterOperator::In => {
            let values = split_list(raw)
                .map(|item| coerce_literal(item, def))
                .collect::<EngineResult<Vec<_>>>()?;
            if values.is_empty() {
                return Err(EngineError::validation(column, "'in' requires at least one value"));
            }
            Condition::In {
                column: def.name.clone(),
                values,
            }
        }
        _ => Condition::Compare {
            column: def.name.clone(),
            op,
            value: coerce_literal(raw, def)?,
        },
    };
    Ok(condition)
}

/// Operator/type compatibility table
pub fn operator_supported(op: FilterOperator, column_type: ColumnType) -> bool {
    match op {
        FilterOperator::Eq | FilterOperator::Ne => true,
        FilterOperator::Like => column_type.is_text(),
        FilterOperator::In => column_type != ColumnType::Json,
        op if op.is_range() => column_type.is_orderable(),
        _ => false,
    }
}

/// Parse `sort=-a,+b,c`, checking names with `known`
pub fn parse_sort_with<F>(value: &str, max: usize, mut known: F) -> EngineResult<Vec<SortKey>>
where
    F: FnMut(&str) -> EngineResult<String>,
{
    let mut keys: Vec<SortKey> = Vec::new();

    for segment in split_list(value) {
        let (name, direction) = if let Some(rest) = segment.strip_prefix('-') {
            (rest, SortDirection::Desc)
        } else if let Some(rest) = segment.strip_prefix('+') {
            (rest, SortDirection::Asc)
        } else {
            (segment, SortDirection::Asc)
        };

        let column = known(name.trim())?;
        if keys.iter().any(|k| k.column == column) {
            return Err(EngineError::validation(
                PARAM_SORT,
                format!("column '{}' sorted more than once", column),
            ));
        }
        keys.push(SortKey { column, direction });

        if keys.len() > max {
            return Err(EngineError::validation(
                PARAM_SORT,
                format!("at most {} sort fields allowed", max),
            ));
        }
    }

    Ok(keys)
}

fn parse_sort(value: &str, schema: &CollectionSchema, max: usize) -> EngineResult<Vec<SortKey>> {
    parse_sort_with(value, max, |name| {
        schema
            .require_column(PARAM_SORT, name)
            .map(|c| c.name.clone())
    })
}

/// `Ok(None)` selects every column
fn parse_fields(value: &str, schema: &CollectionSchema) -> EngineResult<Option<Vec<String>>> {
    let mut fields = vec![ID_COLUMN.to_string()];
    for name in split_list(value) {
        let column = schema.require_column(PARAM_FIELDS, name)?;
        if !fields.contains(&column.name) {
            fields.push(column.name.clone());
        }
    }
    if fields.len() == 1 && split_list(value).next().is_none() {
        return Ok(None);
    }
    Ok(Some(fields))
}

fn parse_limit(value: &str, max: usize) -> EngineResult<usize> {
    let n: i64 = value.trim().parse().map_err(|_| {
        EngineError::validation(PARAM_LIMIT, format!("'{}' is not an integer", value))
    })?;
    if n < MIN_PAGE_SIZE as i64 || n > max as i64 {
        return Err(EngineError::Limit {
            value: n,
            min: MIN_PAGE_SIZE,
            max,
        });
    }
    Ok(n as usize)
}

/// Comma-separated list, trimmed, empty items skipped
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
