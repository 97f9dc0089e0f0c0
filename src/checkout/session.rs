//! The value that carries one checkout attempt through the controller.

use uuid::Uuid;

use super::form::FieldErrors;
use crate::models::MembershipPlan;
use crate::services::coupons::{self, CouponRegistry};

/// What is being bought. Fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutContext {
    pub paid_for: String,
    /// Tax-inclusive price before any coupon
    pub amount: i64,
    pub is_event: bool,
    pub event_slug: Option<String>,
    /// Hex colour passed to the success page
    pub color: String,
}

impl CheckoutContext {
    pub fn for_plan(plan: &MembershipPlan) -> Self {
        Self {
            paid_for: plan.name.clone(),
            amount: plan.price.amount,
            is_event: plan.is_event,
            event_slug: plan.is_event.then(|| plan.slug.clone()),
            color: plan.colors.primary.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    ScriptLoad,
    Order,
    Timeout,
    PaymentFailed,
    Verification,
    DuplicateCoupon,
    Registration,
    AlreadySubmitting,
}

/// A user-visible failure, already translated from whatever caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutFailure {
    pub kind: FailureKind,
    pub message: String,
    /// An explicit retry action is offered.
    pub retryable: bool,
    /// Set once money may have moved.
    pub payment_id: Option<String>,
}

impl CheckoutFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: matches!(kind, FailureKind::ScriptLoad | FailureKind::Registration),
            payment_id: None,
        }
    }

    pub fn with_payment(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self.retryable = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ScriptLoading,
    Ready,
    Submitting,
    Success { redirect: String },
    Error(CheckoutFailure),
}

/// Discriminant of [`Phase`], for observers that only care about transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    ScriptLoading,
    Ready,
    Submitting,
    Success,
    Error,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::ScriptLoading => PhaseKind::ScriptLoading,
            Phase::Ready => PhaseKind::Ready,
            Phase::Submitting => PhaseKind::Submitting,
            Phase::Success { .. } => PhaseKind::Success,
            Phase::Error(_) => PhaseKind::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CouponState {
    NoCoupon,
    Applied { code: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub auto_dismiss: bool,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
            auto_dismiss: true,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Info,
            message: message.into(),
            auto_dismiss: true,
        }
    }

    pub fn error(failure: &CheckoutFailure) -> Self {
        Self {
            kind: ToastKind::Error,
            message: failure.message.clone(),
            auto_dismiss: !failure.retryable,
        }
    }
}

/// State of one checkout attempt. Every controller step consumes a session
/// and returns the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub context: CheckoutContext,
    pub phase: Phase,
    pub coupon: CouponState,
    /// What would be charged right now
    pub amount: i64,
    pub toast: Option<Toast>,
    /// Inline coupon input error
    pub coupon_error: Option<String>,
    pub field_errors: FieldErrors,
}

impl CheckoutSession {
    pub fn new(context: CheckoutContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: context.amount,
            context,
            phase: Phase::Idle,
            coupon: CouponState::NoCoupon,
            toast: None,
            coupon_error: None,
            field_errors: FieldErrors::new(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Moves to `Error`, raising the matching toast.
    pub fn fail(mut self, failure: CheckoutFailure) -> Self {
        self.toast = Some(Toast::error(&failure));
        self.phase = Phase::Error(failure);
        self
    }

    pub fn is_free(&self) -> bool {
        matches!(self.coupon, CouponState::Applied { .. }) && self.amount == 0
    }

    pub fn applied_coupon(&self) -> Option<&str> {
        match &self.coupon {
            CouponState::Applied { code } => Some(code),
            CouponState::NoCoupon => None,
        }
    }

    /// Pure coupon step. The amount is only ever derived from the context, so
    /// apply/remove/apply lands on the same state as a single apply.
    pub fn apply_coupon(mut self, registry: &dyn CouponRegistry, raw: &str) -> Self {
        match coupons::evaluate(registry, raw, self.context.amount) {
            Ok(applied) => {
                self.amount = applied.discounted_amount;
                self.toast = Some(Toast::success(format!(
                    "Coupon {} applied successfully!",
                    applied.code
                )));
                self.coupon = CouponState::Applied { code: applied.code };
                self.coupon_error = None;
            }
            Err(rejection) => {
                self.coupon_error = Some(rejection.to_string());
            }
        }
        self
    }

    pub fn remove_coupon(mut self) -> Self {
        if matches!(self.coupon, CouponState::Applied { .. }) {
            self.coupon = CouponState::NoCoupon;
            self.amount = self.context.amount;
            self.toast = Some(Toast::info("Coupon removed"));
        }
        self.coupon_error = None;
        self
    }

    pub fn dismiss_toast(mut self) -> Self {
        self.toast = None;
        self
    }
}
