use std::sync::Arc;

use axum::http::StatusCode;
use chrono::NaiveDate;
use crates::domain::{
    entities::plans::PlanEntity,
    repositories::{orders::OrderRepository, plans::PlanRepository},
    value_objects::{
        credits::{adjusted_price, is_upgrade_target, most_recent_order, unused_credit},
        plans::{PlanCatalogFilter, PlanView},
        sessions::Session,
        upgrades::{CurrentTerm, PlanQuote, UpgradeOptions},
    },
};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("current plan {0} is no longer available; upgrade credit cannot be computed")]
    CurrentPlanUnavailable(Uuid),
    #[error("upstream service unavailable")]
    Upstream(#[source] anyhow::Error),
}

impl QuoteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuoteError::CurrentPlanUnavailable(_) => StatusCode::CONFLICT,
            QuoteError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            QuoteError::CurrentPlanUnavailable(_) => "conflict",
            QuoteError::Upstream(_) => "upstream",
        }
    }
}

/// The caller's latest order together with the plan it was bought on.
struct ActiveTerm {
    plan: PlanEntity,
    term: CurrentTerm,
}

pub struct UpgradeQuoteUseCase<P, O>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    order_repo: Arc<O>,
}

impl<P, O> UpgradeQuoteUseCase<P, O>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, order_repo: Arc<O>) -> Self {
        Self {
            plan_repo,
            order_repo,
        }
    }

    /// Upgrade candidates for the caller. Without a current term every plan is
    /// offered at its full base price.
    pub async fn upgrade_options(
        &self,
        session: &Session,
        today: NaiveDate,
        filter: &PlanCatalogFilter,
    ) -> Result<UpgradeOptions, QuoteError> {
        let plans = self.plan_repo.list_plans().await.map_err(|err| {
            error!(error = ?err, "upgrades: failed to list plans");
            QuoteError::Upstream(err)
        })?;
        let active = self.active_term(session, today).await?;

        let candidates: Vec<PlanQuote> = plans
            .into_iter()
            .filter(|plan| match &active {
                Some(active) => is_upgrade_target(plan, &active.plan),
                None => true,
            })
            .filter(|plan| filter.matches(plan))
            .map(|plan| match &active {
                Some(active) => priced(plan, active.term.credit.amount, true),
                None => priced(plan, Decimal::ZERO, false),
            })
            .collect();

        info!(
            user_id = ?session.user_id(),
            candidate_count = candidates.len(),
            has_current_term = active.is_some(),
            "upgrades: options computed"
        );

        Ok(UpgradeOptions {
            current: active.map(|active| active.term),
            candidates,
        })
    }

    /// Server-side price for buying `plan` now. Credit only applies when the
    /// plan is a strict upgrade over the caller's current plan.
    pub async fn quote_for_plan(
        &self,
        session: &Session,
        plan: &PlanEntity,
        today: NaiveDate,
    ) -> Result<PlanQuote, QuoteError> {
        let active = self.active_term(session, today).await?;

        let quote = match active {
            Some(active) if is_upgrade_target(plan, &active.plan) => {
                priced(plan.clone(), active.term.credit.amount, true)
            }
            _ => priced(plan.clone(), Decimal::ZERO, false),
        };

        Ok(quote)
    }

    async fn active_term(
        &self,
        session: &Session,
        today: NaiveDate,
    ) -> Result<Option<ActiveTerm>, QuoteError> {
        let (Some(token), Some(user_id)) = (session.token(), session.user_id()) else {
            return Ok(None);
        };

        let orders = self
            .order_repo
            .list_user_orders(token.clone(), user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "upgrades: failed to list user orders");
                QuoteError::Upstream(err)
            })?;

        let Some(order) = most_recent_order(&orders) else {
            return Ok(None);
        };

        let plan = self
            .plan_repo
            .find_by_id(order.plan_id)
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = %order.plan_id, error = ?err, "upgrades: failed to load current plan");
                QuoteError::Upstream(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, plan_id = %order.plan_id, "upgrades: current plan missing upstream");
                QuoteError::CurrentPlanUnavailable(order.plan_id)
            })?;

        let credit = unused_credit(order, &plan, today);
        let term = CurrentTerm {
            order_id: order.id,
            plan: PlanView::from(plan.clone()),
            start_date: order.term_start(),
            end_date: order.end_date,
            credit,
        };

        Ok(Some(ActiveTerm { plan, term }))
    }
}

fn priced(plan: PlanEntity, credit: Decimal, is_upgrade: bool) -> PlanQuote {
    let base_price = plan.upgrade_base_price();

    PlanQuote {
        base_price,
        credit_applied: credit,
        adjusted_price: adjusted_price(base_price, credit),
        is_upgrade,
        plan: PlanView::from(plan),
    }
}
