//! Recovery of billing records stuck in `processing`.
//!
//! Record creation and status transitions are not atomic with each other;
//! a crash between a `processing` write and the settlement outcome leaves
//! the record in flight forever. The sweep fails such records after a
//! timeout so downstream consumers see a terminal status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use service_core::error::AppError;
use tracing::{error, info, instrument, warn};

use crate::clients::{BillingRepository, EventPublisher};
use crate::config::ReconciliationConfig;
use crate::models::{BillingEvent, BillingEventKind, BillingStatus};

use super::{emit_event, with_timeout};

pub struct ReconciliationSweep {
    repository: Arc<dyn BillingRepository>,
    publisher: Arc<dyn EventPublisher>,
    processing_timeout: Duration,
    call_timeout: Duration,
}

impl ReconciliationSweep {
    pub fn new(
        config: &ReconciliationConfig,
        call_timeout: Duration,
        repository: Arc<dyn BillingRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            publisher,
            processing_timeout: config.processing_timeout(),
            call_timeout,
        }
    }

    /// Fail every record that has sat in `processing` since before
    /// `now - processing_timeout`. Returns how many records were failed.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let cutoff = now - chrono::Duration::seconds(self.processing_timeout.as_secs() as i64);

        let stale = with_timeout(
            "list_stale_processing",
            self.call_timeout,
            self.repository.list_stale_processing(cutoff),
        )
        .await?;

        let mut failed = 0;
        for record in stale {
            let updated = with_timeout(
                "update_billing_record_status",
                self.call_timeout,
                self.repository.update_billing_record_status(
                    record.billing_id,
                    BillingStatus::Failed,
                    None,
                    None,
                    Some("settlement timed out".to_string()),
                ),
            )
            .await;

            match updated {
                Ok(Some(updated)) => {
                    warn!(
                        billing_id = %updated.billing_id,
                        usage_record_id = %updated.usage_record_id,
                        "Stuck billing record failed by reconciliation"
                    );
                    emit_event(
                        &self.repository,
                        &self.publisher,
                        self.call_timeout,
                        BillingEvent::new(
                            BillingEventKind::Failed,
                            Some(updated.billing_id),
                            updated.user_id,
                            json!({
                                "billing_id": updated.billing_id,
                                "usage_event_id": updated.usage_record_id,
                                "billing_method": updated.billing_method.as_str(),
                                "failure_reason": updated.failure_reason,
                            }),
                        ),
                    )
                    .await;
                    failed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    // Leave it for the next sweep rather than abort the run.
                    error!(billing_id = %record.billing_id, error = %e, "Failed to reconcile record");
                }
            }
        }

        if failed > 0 {
            info!(failed = failed, "Reconciliation sweep completed");
        }
        Ok(failed)
    }

    /// Run the sweep forever on a fixed interval.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "Reconciliation sweep failed");
            }
        }
    }
}
