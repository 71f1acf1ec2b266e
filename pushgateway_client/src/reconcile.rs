//! Removing every group a Pushgateway holds.
//!
//! ## Strategy
//! 1. **Admin wipe** (`PUT /api/v1/admin/wipe`). Only available when the
//!    gateway runs with `--web.enable-admin-api`; a 200 ends the pass.
//! 2. **Discover and delete.** Anything else falls back to reading
//!    `GET /metrics`, collecting the `job`/`instance` labels of every sample,
//!    and deleting each `{job, instance}` group. Jobs that never showed an
//!    `instance` label get one job-level delete as a catch-all.
//!
//! Individual delete failures are recorded and the pass continues; the
//! outcome is summarized in [`ReconcileReport::status`].

use std::collections::{BTreeMap, BTreeSet};

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    client::Aggregator,
    errors::GatewayError,
    exposition::parse_exposition,
    grouping::GroupKey,
};

/// Groups discovered from an exposition dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupInventory {
    /// job -> instances seen under that job. Only jobs with at least one
    /// instance-labelled sample have an entry.
    pub instances: BTreeMap<String, BTreeSet<String>>,
    /// Every job seen, with or without an instance label.
    pub jobs: BTreeSet<String>,
}

impl GroupInventory {
    /// Collects job/instance labels from every sample in `text`. Samples
    /// without a `job` label are ignored. The gateway renders job-only groups
    /// with `instance=""`, which counts as no instance.
    pub fn from_exposition(text: &str) -> Self {
        let mut inventory = Self::default();
        for sample in parse_exposition(text) {
            let Some(job) = sample.label("job") else {
                continue;
            };
            inventory.jobs.insert(job.to_string());
            if let Some(instance) = sample.label("instance").filter(|i| !i.is_empty()) {
                inventory
                    .instances
                    .entry(job.to_string())
                    .or_default()
                    .insert(instance.to_string());
            }
        }
        inventory
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.instances.is_empty()
    }

    /// Deletes to issue, in order: every `{job, instance}` pair, then a
    /// job-level delete for each job that had no instance-qualified samples.
    pub fn deletion_plan(&self) -> Vec<GroupKey> {
        let per_instance = self.instances.iter().flat_map(|(job, instances)| {
            instances
                .iter()
                .map(move |instance| GroupKey::with_instance(job.clone(), instance.clone()))
        });
        let catch_all = self
            .jobs
            .iter()
            .filter(|job| self.instances.get(*job).is_none_or(BTreeSet::is_empty))
            .map(|job| GroupKey::job(job.clone()));
        per_instance.chain(catch_all).collect()
    }
}

/// Result of the admin wipe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WipeOutcome {
    /// 200: every group is gone.
    Wiped,
    /// 404: the gateway has no admin API.
    NotImplemented,
    /// 405: the admin API is disabled.
    Disabled,
    /// Any other HTTP status.
    Rejected(u16),
    /// The request never got an answer.
    Unreachable(String),
}

/// Result of one group delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// 202
    Deleted,
    /// 404; nothing to do.
    AlreadyAbsent,
    Rejected(u16),
    Unreachable(String),
}

impl DeleteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DeleteOutcome::Rejected(_) | DeleteOutcome::Unreachable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRecord {
    pub group: GroupKey,
    pub outcome: DeleteOutcome,
}

/// Terminal state of a reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// The admin wipe succeeded.
    Wiped,
    /// Every discovered group was deleted or already absent.
    Cleared,
    /// At least one group delete failed.
    PartiallyCleared,
    /// The exposition listed no groups.
    AlreadyEmpty,
    /// The gateway answered the wipe but `/metrics` could not be read.
    DiscoveryFailed,
    /// Neither the wipe nor the exposition fetch reached the gateway.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub wipe: WipeOutcome,
    /// `None` when discovery did not run or failed.
    pub inventory: Option<GroupInventory>,
    pub deletions: Vec<DeletionRecord>,
    pub status: ReconcileStatus,
}

impl ReconcileReport {
    pub fn failed_deletions(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.deletions.iter().filter(|d| d.outcome.is_failure())
    }
}

/// Runs one reconcile pass against `gateway`. Never fails: every problem is
/// logged and reflected in the report.
pub async fn reconcile<A: Aggregator + ?Sized>(gateway: &A) -> ReconcileReport {
    let wipe = attempt_admin_wipe(gateway).await;
    if wipe == WipeOutcome::Wiped {
        return ReconcileReport {
            wipe,
            inventory: None,
            deletions: Vec::new(),
            status: ReconcileStatus::Wiped,
        };
    }

    info!("admin wipe unavailable, falling back to discovering and deleting groups");
    let inventory = match discover_groups(gateway).await {
        Ok(inventory) => inventory,
        Err(e) => {
            error!(error = %e, "failed to fetch exposition for group discovery");
            let status = if e.is_transport() && matches!(wipe, WipeOutcome::Unreachable(_)) {
                ReconcileStatus::Unreachable
            } else {
                ReconcileStatus::DiscoveryFailed
            };
            return ReconcileReport {
                wipe,
                inventory: None,
                deletions: Vec::new(),
                status,
            };
        }
    };

    if inventory.is_empty() {
        info!("no metrics or groups found on the Pushgateway to delete");
        return ReconcileReport {
            wipe,
            inventory: Some(inventory),
            deletions: Vec::new(),
            status: ReconcileStatus::AlreadyEmpty,
        };
    }

    let mut deletions = Vec::new();
    for group in inventory.deletion_plan() {
        let outcome = delete_group(gateway, &group).await;
        deletions.push(DeletionRecord { group, outcome });
    }

    let status = if deletions.iter().any(|d| d.outcome.is_failure()) {
        ReconcileStatus::PartiallyCleared
    } else {
        ReconcileStatus::Cleared
    };
    info!(
        groups = deletions.len(),
        failed = deletions.iter().filter(|d| d.outcome.is_failure()).count(),
        ?status,
        "reconcile finished"
    );

    ReconcileReport {
        wipe,
        inventory: Some(inventory),
        deletions,
        status,
    }
}

/// Reads the exposition and builds the group inventory without deleting anything.
pub async fn discover_groups<A: Aggregator + ?Sized>(
    gateway: &A,
) -> Result<GroupInventory, GatewayError> {
    let text = gateway.fetch_exposition().await?;
    Ok(GroupInventory::from_exposition(&text))
}

/// The deletes a reconcile pass would issue for `exposition`, in order.
pub fn plan_deletions(exposition: &str) -> Vec<GroupKey> {
    GroupInventory::from_exposition(exposition).deletion_plan()
}

async fn attempt_admin_wipe<A: Aggregator + ?Sized>(gateway: &A) -> WipeOutcome {
    match gateway.admin_wipe().await {
        Ok(StatusCode::OK) => {
            info!("wiped all metrics via the admin API");
            WipeOutcome::Wiped
        }
        Ok(StatusCode::NOT_FOUND) => {
            warn!("admin wipe endpoint not found; gateway is older or has no admin API");
            WipeOutcome::NotImplemented
        }
        Ok(StatusCode::METHOD_NOT_ALLOWED) => {
            warn!("admin wipe returned 405; start the gateway with --web.enable-admin-api to use it");
            WipeOutcome::Disabled
        }
        Ok(status) => {
            error!(%status, "admin wipe failed");
            WipeOutcome::Rejected(status.as_u16())
        }
        Err(e) => {
            error!(error = %e, "admin wipe request failed");
            WipeOutcome::Unreachable(e.to_string())
        }
    }
}

async fn delete_group<A: Aggregator + ?Sized>(gateway: &A, group: &GroupKey) -> DeleteOutcome {
    match gateway.delete(group).await {
        Ok(StatusCode::ACCEPTED) => {
            info!(%group, "deleted group");
            DeleteOutcome::Deleted
        }
        Ok(StatusCode::NOT_FOUND) => {
            info!(%group, "group not found (already deleted)");
            DeleteOutcome::AlreadyAbsent
        }
        Ok(status) => {
            error!(%group, %status, "failed to delete group");
            DeleteOutcome::Rejected(status.as_u16())
        }
        Err(e) => {
            error!(%group, error = %e, "error deleting group");
            DeleteOutcome::Unreachable(e.to_string())
        }
    }
}
