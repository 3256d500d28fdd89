use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::payment_intent_statuses::PaymentIntentStatus,
        money::{from_minor_units, to_minor_units},
    },
    infra::db::postgres::schema::payment_intents,
};

/// Server-side record of one checkout attempt. Never reused across attempts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentIntentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub credit_applied: Decimal,
    pub is_upgrade: bool,
    pub gateway_order_id: String,
    pub internal_payment_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: PaymentIntentStatus,
    pub failure_reason: Option<String>,
    pub reconcile_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentIntent {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub credit_applied: Decimal,
    pub is_upgrade: bool,
    pub gateway_order_id: String,
    pub internal_payment_id: Option<String>,
    pub status: PaymentIntentStatus,
    pub failure_reason: Option<String>,
}

/// Status change plus whatever the step learned along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentTransition {
    pub status: PaymentIntentStatus,
    pub gateway_payment_id: Option<String>,
    pub internal_payment_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl PaymentIntentTransition {
    pub fn to(status: PaymentIntentStatus) -> Self {
        Self {
            status,
            gateway_payment_id: None,
            internal_payment_id: None,
            failure_reason: None,
        }
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_payment_ids(
        mut self,
        gateway_payment_id: Option<String>,
        internal_payment_id: Option<String>,
    ) -> Self {
        self.gateway_payment_id = gateway_payment_id;
        self.internal_payment_id = internal_payment_id;
        self
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_intents)]
pub struct PaymentIntentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub credit_minor: i64,
    pub is_upgrade: bool,
    pub gateway_order_id: String,
    pub internal_payment_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub reconcile_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_intents)]
pub struct InsertPaymentIntentEntity {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub credit_minor: i64,
    pub is_upgrade: bool,
    pub gateway_order_id: String,
    pub internal_payment_id: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntentEntity {
    type Error = anyhow::Error;

    fn try_from(row: PaymentIntentRow) -> Result<Self> {
        let status = PaymentIntentStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("unknown payment intent status {}", row.status))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            amount_minor: row.amount_minor,
            currency: row.currency,
            credit_applied: from_minor_units(row.credit_minor),
            is_upgrade: row.is_upgrade,
            gateway_order_id: row.gateway_order_id,
            internal_payment_id: row.internal_payment_id,
            gateway_payment_id: row.gateway_payment_id,
            status,
            failure_reason: row.failure_reason,
            reconcile_attempts: row.reconcile_attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<NewPaymentIntent> for InsertPaymentIntentEntity {
    type Error = anyhow::Error;

    fn try_from(intent: NewPaymentIntent) -> Result<Self> {
        Ok(Self {
            user_id: intent.user_id,
            plan_id: intent.plan_id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            credit_minor: to_minor_units(intent.credit_applied)?,
            is_upgrade: intent.is_upgrade,
            gateway_order_id: intent.gateway_order_id,
            internal_payment_id: intent.internal_payment_id,
            status: intent.status.as_str().to_string(),
            failure_reason: intent.failure_reason,
        })
    }
}
