use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::registration::{self, Entity as Registration},
    errors::ServiceError,
    notifications::{
        normalize_phone, Channel, MessageTemplate, NotificationDispatcher, NotificationJob,
    },
    services::{
        coupons::{self, CouponRegistry},
        payments::{PaymentGateway, PaymentVerification},
    },
};

/// Marketing attribution captured from the landing page query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
}

/// Everything needed to record one registration.
#[derive(Clone, Debug)]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub business_name: Option<String>,
    pub gst_number: Option<String>,
    pub reason_to_attend: Option<String>,
    pub referred_by: Option<String>,
    pub event_slug: Option<String>,
    pub amount: i64,
    pub paid_for: String,
    pub is_event: bool,
    pub coupon_code: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub payment_signature: Option<String>,
    pub utm: UtmParams,
}

impl NewRegistration {
    fn payment(&self) -> Option<PaymentVerification> {
        Some(PaymentVerification {
            order_id: self.order_id.clone()?,
            payment_id: self.payment_id.clone()?,
            signature: self.payment_signature.clone()?,
        })
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    db: Arc<DatabaseConnection>,
    coupons: Arc<dyn CouponRegistry>,
    payments: Arc<dyn PaymentGateway>,
    dispatcher: Option<NotificationDispatcher>,
    channel: Channel,
    default_country_code: String,
}

impl RegistrationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        coupons: Arc<dyn CouponRegistry>,
        payments: Arc<dyn PaymentGateway>,
        default_country_code: impl Into<String>,
    ) -> Self {
        Self {
            db,
            coupons,
            payments,
            dispatcher: None,
            channel: Channel::Whatsapp,
            default_country_code: default_country_code.into(),
        }
    }

    pub fn with_notifications(mut self, dispatcher: NotificationDispatcher, channel: Channel) -> Self {
        self.dispatcher = Some(dispatcher);
        self.channel = channel;
        self
    }

    /// Records a registration and queues the confirmation message.
    ///
    /// A coupon, when present, is re-evaluated here. A coupon that waives
    /// payment stores 0 whatever the client sent. Any other registration
    /// carries the amount charged and must come with a payment whose
    /// signature checks out.
    #[instrument(skip(self, input), fields(paid_for = %input.paid_for))]
    pub async fn register(
        &self,
        input: NewRegistration,
    ) -> Result<registration::Model, ServiceError> {
        let phone = normalize_phone(&input.phone, &self.default_country_code)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let applied = input
            .coupon_code
            .as_deref()
            .map(|raw| coupons::evaluate(self.coupons.as_ref(), raw, input.amount))
            .transpose()
            .map_err(|e| ServiceError::InvalidCoupon(e.to_string()))?;
        let waived = applied.as_ref().map_or(false, |a| a.coupon.waives_payment());

        let amount = if waived { 0 } else { input.amount };
        if amount <= 0 && !waived {
            return Err(ServiceError::ValidationError(
                "amount must be positive unless a coupon waives payment".into(),
            ));
        }
        if amount > 0 {
            self.ensure_paid(&input)?;
        }

        if let Some(applied) = &applied {
            if applied.coupon.phone_unique {
                self.ensure_not_redeemed(&phone, &applied.code).await?;
            }
        }
        let coupon_code = applied.map(|a| a.code);

        let model = registration::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(input.email.trim().to_lowercase()),
            phone: Set(phone),
            business_name: Set(input.business_name),
            gst_number: Set(input.gst_number.map(|g| g.trim().to_uppercase())),
            reason_to_attend: Set(input.reason_to_attend),
            referred_by: Set(input.referred_by),
            event_slug: Set(input.event_slug),
            amount: Set(amount),
            paid_for: Set(input.paid_for),
            is_event: Set(input.is_event),
            coupon_code: Set(coupon_code.clone()),
            payment_id: Set(input.payment_id),
            order_id: Set(input.order_id),
            utm_source: Set(input.utm.source),
            utm_medium: Set(input.utm.medium),
            utm_campaign: Set(input.utm.campaign),
            created_at: Set(Utc::now()),
        };

        let saved = model.insert(self.db.as_ref()).await.map_err(|e| {
            match (e.sql_err(), coupon_code.as_ref()) {
                (Some(SqlErr::UniqueConstraintViolation(_)), Some(code)) => {
                    ServiceError::DuplicateCouponRedemption(code.clone())
                }
                _ => ServiceError::DatabaseError(e),
            }
        })?;

        info!(
            registration_id = %saved.id,
            amount = saved.amount,
            coupon = ?saved.coupon_code,
            utm_source = ?saved.utm_source,
            "registration recorded"
        );
        metrics::counter!("checkout.registrations.created", 1);

        self.queue_confirmation(&saved);
        Ok(saved)
    }

    fn ensure_paid(&self, input: &NewRegistration) -> Result<(), ServiceError> {
        let verified = input
            .payment()
            .map_or(false, |payment| self.payments.verify_signature(&payment));
        if !verified {
            let payment_id = input.payment_id.clone().unwrap_or_else(|| "unknown".into());
            warn!(%payment_id, "paid registration without a verified payment");
            metrics::counter!("checkout.registrations.unverified_payment", 1);
            return Err(ServiceError::VerificationFailed(payment_id));
        }
        Ok(())
    }

    async fn ensure_not_redeemed(&self, phone: &str, code: &str) -> Result<(), ServiceError> {
        let existing = Registration::find()
            .filter(registration::Column::Phone.eq(phone))
            .filter(registration::Column::CouponCode.eq(code))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            warn!(coupon = code, "coupon already redeemed for this phone");
            metrics::counter!("checkout.registrations.duplicate_coupon", 1);
            return Err(ServiceError::DuplicateCouponRedemption(code.to_string()));
        }
        Ok(())
    }

    fn queue_confirmation(&self, saved: &registration::Model) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        let job = NotificationJob {
            to: saved.phone.clone(),
            channel: self.channel,
            template: MessageTemplate::Comprehensive {
                name: saved.name.clone(),
                paid_for: saved.paid_for.clone(),
                amount: saved.amount,
                payment_id: saved.payment_id.clone(),
                coupon_code: saved.coupon_code.clone(),
                event: saved.event_slug.clone(),
            },
            registration_id: Some(saved.id),
        };
        if let Err(e) = dispatcher.enqueue(job) {
            warn!(registration_id = %saved.id, error = %e, "confirmation not queued");
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<registration::Model>, ServiceError> {
        Ok(Registration::find_by_id(id).one(self.db.as_ref()).await?)
    }
}
