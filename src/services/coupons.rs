//! Coupon evaluation.
//!
//! Evaluation is pure: the registry answers lookups and [`evaluate`] turns a
//! raw user-entered string plus the current amount into either an
//! [`AppliedCoupon`] or a [`CouponRejection`]. Callers own the amount.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use utoipa::ToSchema;

/// The only coupon seeded into the default registry.
pub const INNERCIRCLE: &str = "INNERCIRCLE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Coupon {
    pub code: String,
    /// 0..=100
    pub discount_percent: u8,
    /// A phone number may redeem this coupon at most once.
    pub phone_unique: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| now >= from)
            && self.valid_to.map_or(true, |to| now <= to)
    }

    /// A full discount; registrations under it skip payment.
    pub fn waives_payment(&self) -> bool {
        self.discount_percent >= 100
    }

    /// Amount left to pay after the discount, never negative.
    pub fn discounted_amount(&self, amount: i64) -> i64 {
        let percent = i64::from(self.discount_percent.min(100));
        (amount - amount * percent / 100).max(0)
    }
}

/// Source of coupon definitions.
pub trait CouponRegistry: Send + Sync {
    /// `code` is already normalized.
    fn lookup(&self, code: &str) -> Option<Coupon>;
}

#[derive(Clone, Debug)]
pub struct StaticCouponRegistry {
    coupons: HashMap<String, Coupon>,
}

impl StaticCouponRegistry {
    pub fn new(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        Self {
            coupons: coupons
                .into_iter()
                .map(|c| (normalize_code(&c.code), c))
                .collect(),
        }
    }
}

impl Default for StaticCouponRegistry {
    fn default() -> Self {
        Self::new([Coupon {
            code: INNERCIRCLE.to_string(),
            discount_percent: 100,
            phone_unique: true,
            valid_from: None,
            valid_to: None,
        }])
    }
}

impl CouponRegistry for StaticCouponRegistry {
    fn lookup(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(code).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Please enter a coupon code")]
    Empty,
    #[error("Invalid coupon code")]
    Unknown,
    #[error("This coupon has expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedCoupon {
    /// Canonical (normalized) code
    pub code: String,
    pub original_amount: i64,
    pub discounted_amount: i64,
    pub coupon: Coupon,
}

/// Trim and uppercase.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn evaluate(
    registry: &dyn CouponRegistry,
    raw: &str,
    amount: i64,
) -> Result<AppliedCoupon, CouponRejection> {
    evaluate_at(registry, raw, amount, Utc::now())
}

pub fn evaluate_at(
    registry: &dyn CouponRegistry,
    raw: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CouponRejection> {
    let code = normalize_code(raw);
    if code.is_empty() {
        return Err(CouponRejection::Empty);
    }
    let coupon = registry.lookup(&code).ok_or(CouponRejection::Unknown)?;
    if !coupon.is_active_at(now) {
        return Err(CouponRejection::Expired);
    }
    Ok(AppliedCoupon {
        discounted_amount: coupon.discounted_amount(amount),
        original_amount: amount,
        code,
        coupon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn innercircle_zeroes_amount() {
        let registry = StaticCouponRegistry::default();
        let applied = evaluate(&registry, "  innerCircle ", 8259).unwrap();
        assert_eq!(applied.code, INNERCIRCLE);
        assert_eq!(applied.discounted_amount, 0);
        assert_eq!(applied.original_amount, 8259);
        assert!(applied.coupon.phone_unique);
        assert!(applied.coupon.waives_payment());
    }

    #[test]
    fn empty_and_unknown_codes_are_rejected() {
        let registry = StaticCouponRegistry::default();
        assert_matches!(evaluate(&registry, "   ", 100), Err(CouponRejection::Empty));
        assert_matches!(
            evaluate(&registry, "OUTERCIRCLE", 100),
            Err(CouponRejection::Unknown)
        );
        assert_eq!(CouponRejection::Unknown.to_string(), "Invalid coupon code");
        assert_eq!(
            CouponRejection::Empty.to_string(),
            "Please enter a coupon code"
        );
    }

    #[test]
    fn partial_discounts_and_validity_windows() {
        let now = Utc::now();
        let registry = StaticCouponRegistry::new([Coupon {
            code: "half".into(),
            discount_percent: 50,
            phone_unique: false,
            valid_from: Some(now - Duration::days(1)),
            valid_to: Some(now + Duration::days(1)),
        }]);
        assert_eq!(
            evaluate_at(&registry, "HALF", 1001, now)
                .unwrap()
                .discounted_amount,
            501
        );
        assert_matches!(
            evaluate_at(&registry, "HALF", 1001, now + Duration::days(2)),
            Err(CouponRejection::Expired)
        );
    }

    proptest! {
        #[test]
        fn any_casing_and_padding_of_innercircle_applies(
            mask in proptest::collection::vec(any::<bool>(), INNERCIRCLE.len()),
            left in "[ \t]{0,3}",
            right in "[ \t]{0,3}",
            amount in 0i64..1_000_000,
        ) {
            let code: String = INNERCIRCLE
                .chars()
                .zip(mask)
                .map(|(c, lower)| if lower { c.to_ascii_lowercase() } else { c })
                .collect();
            let raw = format!("{left}{code}{right}");
            let applied = evaluate(&StaticCouponRegistry::default(), &raw, amount).unwrap();
            prop_assert_eq!(applied.discounted_amount, 0);
            prop_assert_eq!(applied.code, INNERCIRCLE);
        }

        #[test]
        fn other_codes_never_apply(raw in "[A-Za-z0-9]{1,16}") {
            prop_assume!(normalize_code(&raw) != INNERCIRCLE);
            prop_assert_eq!(
                evaluate(&StaticCouponRegistry::default(), &raw, 500),
                Err(CouponRejection::Unknown)
            );
        }
    }
}
