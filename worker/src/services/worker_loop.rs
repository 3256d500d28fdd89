use crate::usecases::reconcile_partial_assignments::ReconcilePartialAssignmentsUseCase;
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run_reconcile_loop(
    usecase: Arc<ReconcilePartialAssignmentsUseCase>,
    interval: Duration,
) -> Result<()> {
    info!(interval_secs = interval.as_secs(), "reconcile: starting worker loop");
    loop {
        match usecase.run().await {
            Ok(report) if report.scanned == 0 => {}
            Ok(report) => info!(
                scanned = report.scanned,
                already_active = report.already_active,
                reassigned = report.reassigned,
                failed = report.failed,
                "reconcile: pass finished"
            ),
            Err(e) => error!(error = ?e, "reconcile: failed to list partial assignments"),
        }

        tokio::time::sleep(interval).await;
    }
}
