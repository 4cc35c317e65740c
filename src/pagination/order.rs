//! Total record order and seek bounds
//!
//! The effective order is the requested sort plus `id` ascending, which
//! makes it total: no two distinct records compare equal. A cursor
//! position is therefore unambiguous even on non-unique sort columns.

use std::cmp::Ordering;

use crate::query::{SortDirection, SortKey};
use crate::schema::ID_COLUMN;
use crate::value::Record;

/// Total order over records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    /// Order over exactly `keys`; ties stay equal
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Requested sort plus the `id` tiebreaker
    pub fn effective(sort: &[SortKey]) -> Self {
        let mut keys = sort.to_vec();
        if !keys.iter().any(|k| k.column == ID_COLUMN) {
            keys.push(SortKey::asc(ID_COLUMN));
        }
        Self { keys }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Same keys, every direction flipped
    pub fn reversed(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .map(|k| SortKey {
                    column: k.column.clone(),
                    direction: k.direction.reverse(),
                })
                .collect(),
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ordering = a.value(&key.column).total_cmp(b.value(&key.column));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

/// Which side of the anchor a seek keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    After,
    Before,
}

/// Range condition: records strictly after (or before) an anchor record in
/// a given total order. The anchor itself never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekBound {
    order: SortOrder,
    anchor: Record,
    direction: SeekDirection,
}

impl SeekBound {
    pub fn after(order: &SortOrder, anchor: &Record) -> Self {
        Self::new(order, anchor, SeekDirection::After)
    }

    pub fn before(order: &SortOrder, anchor: &Record) -> Self {
        Self::new(order, anchor, SeekDirection::Before)
    }

    fn new(order: &SortOrder, anchor: &Record, direction: SeekDirection) -> Self {
        let columns: Vec<String> = order.keys().iter().map(|k| k.column.clone()).collect();
        Self {
            order: order.clone(),
            anchor: anchor.project(&columns),
            direction,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let ordering = self.order.compare(record, &self.anchor);
        match self.direction {
            SeekDirection::After => ordering == Ordering::Greater,
            SeekDirection::Before => ordering == Ordering::Less,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;

    fn rec(id: &str, quantity: i64) -> Record {
        let mut r = Record::new();
        r.set("id", FieldValue::from(id));
        r.set("quantity", FieldValue::Integer(quantity));
        r
    }

    #[test]
    fn test_effective_appends_id() {
        let order = SortOrder::effective(&[SortKey::desc("quantity")]);
        assert_eq!(order.keys(), &[SortKey::desc("quantity"), SortKey::asc("id")]);

        let order = SortOrder::effective(&[SortKey::desc("id")]);
        assert_eq!(order.keys(), &[SortKey::desc("id")]);

        let order = SortOrder::effective(&[]);
        assert_eq!(order.keys(), &[SortKey::asc("id")]);
    }

    #[test]
    fn test_tiebreak_on_id() {
        let order = SortOrder::effective(&[SortKey::desc("quantity")]);
        let mut records = vec![rec("b", 5), rec("c", 9), rec("a", 5)];
        order.sort(&mut records);

        let ids: Vec<_> = records.iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reversed_is_exact_inverse() {
        let order = SortOrder::effective(&[SortKey::asc("quantity")]);
        let reversed = order.reversed();
        let (a, b) = (rec("a", 1), rec("b", 1));
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(reversed.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_seek_excludes_anchor() {
        let order = SortOrder::effective(&[SortKey::asc("quantity")]);
        let anchor = rec("b", 5);
        let after = SeekBound::after(&order, &anchor);
        let before = SeekBound::before(&order, &anchor);

        assert!(!after.matches(&anchor));
        assert!(!before.matches(&anchor));
        assert!(after.matches(&rec("c", 5)));
        assert!(after.matches(&rec("a", 6)));
        assert!(before.matches(&rec("a", 5)));
        assert!(before.matches(&rec("z", 4)));
    }
}
