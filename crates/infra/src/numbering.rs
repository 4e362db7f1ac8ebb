//! Date-scoped document number allocation.
//!
//! Numbers like `PO-20260827-0004` are allocated from an atomic per-day
//! counter held behind a mutex, so two concurrent creates on the same day can
//! never compute the same sequence (a count-query scheme would).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use backroom_core::docnum;
use backroom_core::{DomainError, DomainResult};

#[derive(Debug, Default)]
pub struct DocumentNumbers {
    counters: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl DocumentNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next number for a prefix on the given day.
    pub fn next(&self, prefix: &str, date: NaiveDate) -> DomainResult<String> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::invariant("document counter lock poisoned"))?;
        let counter = counters
            .entry((prefix.to_string(), date))
            .or_insert(0);
        *counter += 1;
        Ok(docnum::format(prefix, date, *counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backroom_core::docnum::{PURCHASE_ORDER_PREFIX, SALES_ORDER_PREFIX};

    #[test]
    fn sequences_are_scoped_by_prefix_and_day() {
        let numbers = DocumentNumbers::new();
        let day1 = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();

        assert_eq!(
            numbers.next(PURCHASE_ORDER_PREFIX, day1).unwrap(),
            "PO-20260827-0001"
        );
        assert_eq!(
            numbers.next(PURCHASE_ORDER_PREFIX, day1).unwrap(),
            "PO-20260827-0002"
        );
        assert_eq!(
            numbers.next(SALES_ORDER_PREFIX, day1).unwrap(),
            "ORD-20260827-0001"
        );
        assert_eq!(
            numbers.next(PURCHASE_ORDER_PREFIX, day2).unwrap(),
            "PO-20260828-0001"
        );
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let numbers = Arc::new(DocumentNumbers::new());
        let day = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let numbers = Arc::clone(&numbers);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| numbers.next(SALES_ORDER_PREFIX, day).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(seen.insert(number), "duplicate document number allocated");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
