//! Grouping and accumulators
//!
//! Pure functions over records, shared by storage adapters that aggregate
//! in-process. Nulls are skipped by every function except the row count.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::spec::{Aggregate, AggregateFunction, AggregationSpec};
use crate::value::{FieldValue, Record};

/// Fractional digits kept by `avg`
pub const AVG_SCALE: u32 = 10;

#[derive(Debug, Clone)]
enum Accumulator {
    Rows(i64),
    Count(i64),
    Sum {
        total: Decimal,
        integral: bool,
        seen: bool,
    },
    Avg {
        total: Decimal,
        n: i64,
    },
    Min(Option<FieldValue>),
    Max(Option<FieldValue>),
}

impl Accumulator {
    fn new(aggregate: &Aggregate) -> Self {
        match (aggregate.function, &aggregate.column) {
            (AggregateFunction::Count, None) => Accumulator::Rows(0),
            (AggregateFunction::Count, Some(_)) => Accumulator::Count(0),
            (AggregateFunction::Sum, _) => Accumulator::Sum {
                total: Decimal::ZERO,
                integral: true,
                seen: false,
            },
            (AggregateFunction::Avg, _) => Accumulator::Avg {
                total: Decimal::ZERO,
                n: 0,
            },
            (AggregateFunction::Min, _) => Accumulator::Min(None),
            (AggregateFunction::Max, _) => Accumulator::Max(None),
        }
    }

    fn add(&mut self, value: &FieldValue) -> Result<(), String> {
        if let Accumulator::Rows(n) = self {
            *n += 1;
            return Ok(());
        }
        if value.is_null() {
            return Ok(());
        }

        match self {
            Accumulator::Rows(_) => {}
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum {
                total,
                integral,
                seen,
            } => {
                let (d, is_int) = numeric(value)?;
                *total = total
                    .checked_add(d)
                    .ok_or_else(|| "sum overflow".to_string())?;
                *integral &= is_int;
                *seen = true;
            }
            Accumulator::Avg { total, n } => {
                let (d, _) = numeric(value)?;
                *total = total
                    .checked_add(d)
                    .ok_or_else(|| "avg overflow".to_string())?;
                *n += 1;
            }
            Accumulator::Min(current) => {
                if current.as_ref().map_or(true, |c| value < c) {
                    *current = Some(value.clone());
                }
            }
            Accumulator::Max(current) => {
                if current.as_ref().map_or(true, |c| value > c) {
                    *current = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> FieldValue {
        match self {
            Accumulator::Rows(n) | Accumulator::Count(n) => FieldValue::Integer(n),
            Accumulator::Sum { seen: false, .. } => FieldValue::Null,
            Accumulator::Sum {
                total,
                integral: true,
                ..
            } => match total.to_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Decimal(total),
            },
            Accumulator::Sum { total, .. } => FieldValue::Decimal(total),
            Accumulator::Avg { n: 0, .. } => FieldValue::Null,
            Accumulator::Avg { total, n } => total
                .checked_div(Decimal::from(n))
                .map(|avg| FieldValue::Decimal(avg.round_dp(AVG_SCALE).normalize()))
                .unwrap_or(FieldValue::Null),
            Accumulator::Min(v) | Accumulator::Max(v) => v.unwrap_or(FieldValue::Null),
        }
    }
}

fn numeric(value: &FieldValue) -> Result<(Decimal, bool), String> {
    match value {
        FieldValue::Integer(i) => Ok((Decimal::from(*i), true)),
        FieldValue::Decimal(d) => Ok((*d, false)),
        other => Err(format!("cannot aggregate {} value numerically", other.kind_name())),
    }
}

/// Group `records` (already filtered) and compute every aggregate.
///
/// Without `group_by` exactly one row is produced, even for empty input.
/// A null key value forms its own group. Rows come out in group-key order.
pub fn aggregate_records<'a, I>(spec: &AggregationSpec, records: I) -> Result<Vec<Record>, String>
where
    I: IntoIterator<Item = &'a Record>,
{
    let fresh = || -> Vec<Accumulator> { spec.aggregates.iter().map(Accumulator::new).collect() };

    let mut groups: BTreeMap<Vec<FieldValue>, Vec<Accumulator>> = BTreeMap::new();
    if spec.group_by.is_empty() {
        groups.insert(Vec::new(), fresh());
    }

    for record in records {
        let key: Vec<FieldValue> = spec
            .group_by
            .iter()
            .map(|column| record.value(column).clone())
            .collect();
        let accumulators = groups.entry(key).or_insert_with(fresh);

        for (acc, aggregate) in accumulators.iter_mut().zip(&spec.aggregates) {
            let value = match &aggregate.column {
                Some(column) => record.value(column),
                None => &FieldValue::Null,
            };
            acc.add(value)?;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row = Record::new();
            for (column, value) in spec.group_by.iter().zip(key) {
                row.set(column.clone(), value);
            }
            for (acc, aggregate) in accumulators.into_iter().zip(&spec.aggregates) {
                row.set(aggregate.alias(), acc.finish());
            }
            row
        })
        .collect())
}
