use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

/// Display-only split of a tax-inclusive amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TaxBreakdown {
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub base: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub rate: Decimal,
}

impl TaxBreakdown {
    /// `base = total / (1 + rate)` rounded to paise; tax is the remainder so
    /// `base + tax == total` exactly.
    pub fn from_inclusive(total: i64, rate: Decimal) -> Self {
        let total = Decimal::from(total);
        let base = (total / (Decimal::ONE + rate))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            total,
            base,
            tax: total - base,
            rate,
        }
    }
}

/// Converts the configured floating rate, falling back to 18%.
pub fn gst_rate_from_f64(rate: f64) -> Decimal {
    Decimal::try_from(rate)
        .map(|d| d.round_dp(4))
        .unwrap_or_else(|_| Decimal::new(18, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn splits_eighteen_percent_inclusive_amount() {
        let b = TaxBreakdown::from_inclusive(8259, dec!(0.18));
        assert_eq!(b.base, dec!(6999.15));
        assert_eq!(b.tax, dec!(1259.85));
        assert_eq!(b.base + b.tax, dec!(8259));
    }

    #[test]
    fn zero_amount_has_no_tax() {
        let b = TaxBreakdown::from_inclusive(0, dec!(0.18));
        assert_eq!(b.base, Decimal::ZERO);
        assert_eq!(b.tax, Decimal::ZERO);
    }

    #[test]
    fn rate_conversion() {
        assert_eq!(gst_rate_from_f64(0.18), dec!(0.18));
        assert_eq!(gst_rate_from_f64(f64::NAN), dec!(0.18));
    }
}
