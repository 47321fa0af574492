//! Discount aggregation. Pure computation over amounts in minor units
//! (cents); no I/O. The caller resolves which discounts are in scope for a
//! product; this module only folds them into a net price.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    /// `value` is a percentage of the base price, e.g. 10 for 10%.
    Percentage,
    /// `value` is a fixed amount in cents.
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "percentage" => Some(DiscountKind::Percentage),
            "fixed" => Some(DiscountKind::Fixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiscountTerms {
    pub kind: DiscountKind,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedPrice {
    pub price: i64,
    /// Base price, reported only when at least one discount applied.
    pub old_price: Option<i64>,
}

/// Fold a set of applicable discounts into a net price.
///
/// Discounts stack additively: all percentage values are summed, all fixed
/// values are summed, and both totals come off the base price together. N
/// overlapping discounts compound; the best single discount is never chosen
/// exclusively. The result clamps at zero.
pub fn apply_discounts(base_price: i64, discounts: &[DiscountTerms]) -> AdjustedPrice {
    if discounts.is_empty() {
        return AdjustedPrice {
            price: base_price,
            old_price: None,
        };
    }

    let mut total_percentage: i64 = 0;
    let mut total_fixed: i64 = 0;
    for discount in discounts {
        match discount.kind {
            DiscountKind::Percentage => total_percentage += discount.value,
            DiscountKind::Fixed => total_fixed += discount.value,
        }
    }

    let price = base_price - total_fixed - base_price * total_percentage / 100;

    AdjustedPrice {
        price: price.max(0),
        old_price: Some(base_price),
    }
}

/// Convert an amount in cents with an exchange rate, rounding half away
/// from zero. Rate 1.0 is the identity.
pub fn convert_amount(amount: i64, rate: f64) -> i64 {
    (amount as f64 * rate).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: i64) -> DiscountTerms {
        DiscountTerms {
            kind: DiscountKind::Percentage,
            value,
        }
    }

    fn fixed(value: i64) -> DiscountTerms {
        DiscountTerms {
            kind: DiscountKind::Fixed,
            value,
        }
    }

    #[test]
    fn percentage_and_fixed_stack() {
        // 100.00 with 10% + 5.00 off = 85.00
        let adjusted = apply_discounts(10_000, &[pct(10), fixed(500)]);
        assert_eq!(adjusted.price, 8_500);
        assert_eq!(adjusted.old_price, Some(10_000));
    }

    #[test]
    fn multiple_percentages_sum_rather_than_best_wins() {
        let adjusted = apply_discounts(10_000, &[pct(10), pct(15)]);
        assert_eq!(adjusted.price, 7_500);
    }

    #[test]
    fn over_discounted_price_clamps_to_zero() {
        let adjusted = apply_discounts(1_000, &[pct(50), fixed(2_000)]);
        assert_eq!(adjusted.price, 0);
        assert_eq!(adjusted.old_price, Some(1_000));
    }

    #[test]
    fn no_discounts_means_no_old_price() {
        let adjusted = apply_discounts(4_200, &[]);
        assert_eq!(adjusted.price, 4_200);
        assert_eq!(adjusted.old_price, None);
    }

    #[test]
    fn conversion_rounds_to_nearest_cent() {
        assert_eq!(convert_amount(10_000, 0.9235), 9_235);
        assert_eq!(convert_amount(999, 1.105), 1_104);
        assert_eq!(convert_amount(500, 1.0), 500);
    }
}
