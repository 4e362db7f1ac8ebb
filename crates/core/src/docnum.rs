//! Human-readable, date-sequenced document numbers.
//!
//! Formats: `PO-YYYYMMDD-NNNN` for purchase orders, `ORD-YYYYMMDD-NNNN` for
//! sales orders. The sequence is scoped to the calendar day; allocation lives
//! in infrastructure (an atomic per-day counter, not a count query, so
//! concurrent creates cannot collide).

use chrono::NaiveDate;

pub const PURCHASE_ORDER_PREFIX: &str = "PO";
pub const SALES_ORDER_PREFIX: &str = "ORD";
pub const SALE_PREFIX: &str = "SALE";

/// Render a document number from its parts.
pub fn format(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{prefix}-{}-{sequence:04}", date.format("%Y%m%d"))
}

/// Derive the sale number for a delivered order.
///
/// Keeps the date-sequence suffix so the receipt stays visually correlated
/// with its source order.
pub fn sale_number_for(order_number: &str) -> String {
    let suffix = order_number
        .strip_prefix("ORD-")
        .unwrap_or(order_number);
    format!("{SALE_PREFIX}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded_sequence() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        assert_eq!(format(PURCHASE_ORDER_PREFIX, date, 7), "PO-20260827-0007");
        assert_eq!(format(SALES_ORDER_PREFIX, date, 1234), "ORD-20260827-1234");
    }

    #[test]
    fn sale_number_reuses_order_suffix() {
        assert_eq!(sale_number_for("ORD-20260827-0001"), "SALE-20260827-0001");
        assert_eq!(sale_number_for("legacy-42"), "SALE-legacy-42");
    }
}
