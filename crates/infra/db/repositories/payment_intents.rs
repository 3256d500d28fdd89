use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper, insert_into,
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_intents},
};
use domain::{
    entities::payment_intents::{
        InsertPaymentIntentEntity, NewPaymentIntent, PaymentIntentEntity, PaymentIntentRow,
        PaymentIntentTransition,
    },
    repositories::payment_intents::PaymentIntentRepository,
    value_objects::enums::payment_intent_statuses::PaymentIntentStatus,
};

pub struct PaymentIntentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentIntentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentIntentRepository for PaymentIntentPostgres {
    async fn insert(&self, intent: NewPaymentIntent) -> Result<PaymentIntentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let row = InsertPaymentIntentEntity::try_from(intent)?;

        let inserted = insert_into(payment_intents::table)
            .values(&row)
            .returning(PaymentIntentRow::as_returning())
            .get_result::<PaymentIntentRow>(&mut conn)?;

        PaymentIntentEntity::try_from(inserted)
    }

    async fn find_by_id(&self, intent_id: Uuid) -> Result<Option<PaymentIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payment_intents::table
            .filter(payment_intents::id.eq(intent_id))
            .select(PaymentIntentRow::as_select())
            .first::<PaymentIntentRow>(&mut conn)
            .optional()?;

        row.map(PaymentIntentEntity::try_from).transpose()
    }

    async fn transition(
        &self,
        intent_id: Uuid,
        expected: PaymentIntentStatus,
        transition: PaymentIntentTransition,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<bool, anyhow::Error, _>(|conn| {
            let current = payment_intents::table
                .filter(payment_intents::id.eq(intent_id))
                .filter(payment_intents::status.eq(expected.as_str()))
                .select(PaymentIntentRow::as_select())
                .for_update()
                .first::<PaymentIntentRow>(conn)
                .optional()?;

            let Some(current) = current else {
                return Ok(false);
            };

            // Payment ids and failure reasons are only ever added, never cleared.
            update(payment_intents::table.filter(payment_intents::id.eq(intent_id)))
                .set((
                    payment_intents::status.eq(transition.status.as_str()),
                    payment_intents::gateway_payment_id
                        .eq(transition.gateway_payment_id.or(current.gateway_payment_id)),
                    payment_intents::internal_payment_id
                        .eq(transition.internal_payment_id.or(current.internal_payment_id)),
                    payment_intents::failure_reason
                        .eq(transition.failure_reason.or(current.failure_reason)),
                    payment_intents::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            Ok(true)
        })
    }

    async fn list_by_status(
        &self,
        status: PaymentIntentStatus,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = payment_intents::table
            .filter(payment_intents::status.eq(status.as_str()))
            .order(payment_intents::updated_at.asc())
            .limit(limit)
            .select(PaymentIntentRow::as_select())
            .load::<PaymentIntentRow>(&mut conn)?;

        rows.into_iter().map(PaymentIntentEntity::try_from).collect()
    }

    async fn list_reconcilable(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = payment_intents::table
            .filter(payment_intents::status.eq(PaymentIntentStatus::PartiallyAssigned.as_str()))
            .filter(payment_intents::reconcile_attempts.lt(max_attempts))
            .order(payment_intents::updated_at.asc())
            .limit(limit)
            .select(PaymentIntentRow::as_select())
            .load::<PaymentIntentRow>(&mut conn)?;

        rows.into_iter().map(PaymentIntentEntity::try_from).collect()
    }

    async fn record_reconcile_attempt(&self, intent_id: Uuid, failure_reason: String) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempts = update(payment_intents::table.filter(payment_intents::id.eq(intent_id)))
            .set((
                payment_intents::reconcile_attempts.eq(payment_intents::reconcile_attempts + 1),
                payment_intents::failure_reason.eq(Some(failure_reason)),
                payment_intents::updated_at.eq(Utc::now()),
            ))
            .returning(payment_intents::reconcile_attempts)
            .get_result::<i32>(&mut conn)?;

        Ok(attempts)
    }
}
