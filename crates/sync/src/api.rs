//! Frontend-facing sync operations, folded into [`ApiResponse`] envelopes.

use std::{path::Path, sync::Arc};

use {mylife_common::ApiResponse, tracing::warn};

use crate::{
    Result,
    service::SyncService,
    types::{
        Conflict, ConflictStrategy, ExportedSnapshot, ImportOutcome, PullReport, PushReport,
        Resolution, SyncStatus,
    },
};

pub struct SyncApi {
    service: Arc<SyncService>,
}

impl SyncApi {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    pub async fn status(&self) -> ApiResponse<SyncStatus> {
        respond("status", self.service.status().await)
    }

    pub async fn export_snapshot(&self) -> ApiResponse<ExportedSnapshot> {
        respond("export_snapshot", self.service.export_snapshot().await)
    }

    /// A refused import is a failure that still carries both hashes.
    pub async fn import_snapshot(&self, path: &Path) -> ApiResponse<ImportOutcome> {
        match self.service.import_snapshot(path).await {
            Ok(outcome) => outcome_response(outcome),
            Err(e) => respond("import_snapshot", Err(e)),
        }
    }

    pub async fn detect_conflicts(&self) -> ApiResponse<Vec<Conflict>> {
        respond("detect_conflicts", self.service.detect_conflicts().await)
    }

    /// `strategy` is one of `keep_local`, `use_remote` or `merge`.
    pub async fn resolve_conflict(
        &self,
        strategy: &str,
        remote_snapshot: Option<&Path>,
    ) -> ApiResponse<Resolution> {
        let result = async {
            let strategy: ConflictStrategy = strategy.parse()?;
            self.service
                .resolve_conflict(strategy, remote_snapshot)
                .await
        }
        .await;
        respond("resolve_conflict", result)
    }

    pub async fn push(&self) -> ApiResponse<PushReport> {
        respond("push", self.service.push().await)
    }

    pub async fn pull(&self) -> ApiResponse<PullReport> {
        match self.service.pull().await {
            Ok(report) => match report.outcome.conflict_error() {
                None => ApiResponse::ok(report),
                Some(conflict) => ApiResponse::failure_with(report, conflict.to_string()),
            },
            Err(e) => respond("pull", Err(e)),
        }
    }
}

fn outcome_response(outcome: ImportOutcome) -> ApiResponse<ImportOutcome> {
    match outcome.conflict_error() {
        None => ApiResponse::ok(outcome),
        Some(conflict) => ApiResponse::failure_with(outcome, conflict.to_string()),
    }
}

fn respond<T>(operation: &'static str, result: Result<T>) -> ApiResponse<T> {
    if let Err(e) = &result {
        warn!(operation, error = %e, "sync request failed");
    }
    ApiResponse::from_result(result)
}
