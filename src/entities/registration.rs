use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attendee or payer submission. Rows are written once and never updated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub business_name: Option<String>,
    pub gst_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason_to_attend: Option<String>,
    pub referred_by: Option<String>,
    pub event_slug: Option<String>,
    /// Whole currency units, tax-inclusive
    pub amount: i64,
    pub paid_for: String,
    pub is_event: bool,
    pub coupon_code: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
