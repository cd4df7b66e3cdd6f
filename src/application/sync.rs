//! Per-domain sync state machine over the weekly plan store.
//!
//! Each domain moves `Idle -> Syncing -> Idle`; a trigger that arrives while
//! its domain is `Syncing` is dropped, never queued. Adapter failures end up
//! in the domain's status and in [`SyncOutcome::Failed`], not as errors.

use crate::application::plan_store::{GenerateOutcome, WeeklyPlanStore};
use crate::application::selection::SelectionState;
use crate::domain::dates::{format_date, CalendarDate};
use crate::domain::models::{DomainFailure, SourceDomain, WeeklyPlan};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::plan_repository::WeeklyPlanRepository;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

pub type NowProvider = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Syncing,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSyncStatus {
    pub domain: SourceDomain,
    pub phase: SyncPhase,
    pub last_error: Option<String>,
    pub last_success_at: Option<NaiveDateTime>,
}

impl DomainSyncStatus {
    fn idle(domain: SourceDomain) -> Self {
        Self {
            domain,
            phase: SyncPhase::Idle,
            last_error: None,
            last_success_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied(WeeklyPlan),
    /// The domain was already syncing; nothing ran.
    Dropped,
    /// The store kept its previous content for the domain.
    Failed(DomainFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateStatus {
    Applied(GenerateOutcome),
    Dropped,
}

type StatusTable = BTreeMap<SourceDomain, DomainSyncStatus>;

/// Marks its domains `Syncing` while alive and puts them back to `Idle` on
/// drop, including when the owning future is cancelled.
struct SyncGuard<'a> {
    statuses: &'a Mutex<StatusTable>,
    domains: Vec<SourceDomain>,
}

impl SyncGuard<'_> {
    fn succeeded(&self, domain: SourceDomain, at: NaiveDateTime) {
        let mut statuses = lock_ignoring_poison(self.statuses);
        if let Some(status) = statuses.get_mut(&domain) {
            status.last_error = None;
            status.last_success_at = Some(at);
        }
    }

    fn failed(&self, failure: &DomainFailure) {
        let mut statuses = lock_ignoring_poison(self.statuses);
        if let Some(status) = statuses.get_mut(&failure.domain) {
            status.last_error = Some(failure.message.clone());
        }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        let mut statuses = lock_ignoring_poison(self.statuses);
        for domain in &self.domains {
            if let Some(status) = statuses.get_mut(domain) {
                status.phase = SyncPhase::Idle;
            }
        }
    }
}

fn lock_ignoring_poison(statuses: &Mutex<StatusTable>) -> MutexGuard<'_, StatusTable> {
    statuses.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SyncOrchestrator<R>
where
    R: WeeklyPlanRepository,
{
    store: Arc<WeeklyPlanStore<R>>,
    statuses: Mutex<StatusTable>,
    now_provider: NowProvider,
}

impl<R> SyncOrchestrator<R>
where
    R: WeeklyPlanRepository,
{
    pub fn new(store: Arc<WeeklyPlanStore<R>>) -> Self {
        Self {
            store,
            statuses: Mutex::new(
                SourceDomain::ALL
                    .into_iter()
                    .map(|domain| (domain, DomainSyncStatus::idle(domain)))
                    .collect(),
            ),
            now_provider: Arc::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn store(&self) -> &Arc<WeeklyPlanStore<R>> {
        &self.store
    }

    pub fn today(&self) -> CalendarDate {
        (self.now_provider)().date()
    }

    /// Full rebuild of the week holding all three domains busy. Dropped when
    /// any domain is already syncing.
    pub async fn generate(&self, week_start: CalendarDate) -> Result<GenerateStatus, PlannerError> {
        let Some(guard) = self.try_begin(&SourceDomain::ALL)? else {
            info!(week_start = %format_date(week_start), "generate dropped: a domain is already syncing");
            return Ok(GenerateStatus::Dropped);
        };

        match self.store.generate(week_start).await {
            Ok(outcome) => {
                let now = (self.now_provider)();
                for domain in SourceDomain::ALL {
                    match outcome.failures.iter().find(|failure| failure.domain == domain) {
                        Some(failure) => guard.failed(failure),
                        None => guard.succeeded(domain, now),
                    }
                }
                Ok(GenerateStatus::Applied(outcome))
            }
            Err(PlannerError::AllSourcesFailed(failures)) => {
                for failure in &failures {
                    guard.failed(failure);
                }
                warn!(week_start = %format_date(week_start), "generate failed for every domain");
                Err(PlannerError::AllSourcesFailed(failures))
            }
            Err(error) => Err(error),
        }
    }

    /// Refreshes one domain. Adapter failures become [`SyncOutcome::Failed`]
    /// and leave the stored blocks as they were.
    pub async fn resync(&self, domain: SourceDomain) -> Result<SyncOutcome, PlannerError> {
        let Some(guard) = self.try_begin(&[domain])? else {
            info!(domain = %domain, "resync dropped: already syncing");
            return Ok(SyncOutcome::Dropped);
        };

        match self.store.resync_domain(domain).await {
            Ok(plan) => {
                guard.succeeded(domain, (self.now_provider)());
                Ok(SyncOutcome::Applied(plan))
            }
            Err(error @ PlannerError::SourceAdapter { .. }) => {
                let failure = error.domain_failure(domain);
                warn!(domain = %domain, error = %failure.message, "resync failed; keeping stale blocks");
                guard.failed(&failure);
                Ok(SyncOutcome::Failed(failure))
            }
            Err(error) => Err(error),
        }
    }

    /// Blanks calendar-origin blocks across the week.
    pub fn clear_calendar(&self) -> Result<WeeklyPlan, PlannerError> {
        self.store.clear_domain(SourceDomain::Calendar)
    }

    pub fn jump_to_today(&self, selection: &mut SelectionState) -> Result<CalendarDate, PlannerError> {
        let week_start = self.store.week_start_date()?;
        Ok(selection.jump_to_today(week_start, self.today()))
    }

    pub fn sync_status(&self, domain: SourceDomain) -> DomainSyncStatus {
        lock_ignoring_poison(&self.statuses)
            .get(&domain)
            .cloned()
            .unwrap_or_else(|| DomainSyncStatus::idle(domain))
    }

    pub fn sync_statuses(&self) -> Vec<DomainSyncStatus> {
        lock_ignoring_poison(&self.statuses).values().cloned().collect()
    }

    pub fn is_syncing(&self, domain: SourceDomain) -> bool {
        self.sync_status(domain).phase == SyncPhase::Syncing
    }

    fn try_begin(&self, domains: &[SourceDomain]) -> Result<Option<SyncGuard<'_>>, PlannerError> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|error| PlannerError::Storage(format!("sync status lock poisoned: {error}")))?;
        let busy = domains.iter().any(|domain| {
            statuses
                .get(domain)
                .is_some_and(|status| status.phase == SyncPhase::Syncing)
        });
        if busy {
            return Ok(None);
        }
        for domain in domains {
            statuses
                .entry(*domain)
                .or_insert_with(|| DomainSyncStatus::idle(*domain))
                .phase = SyncPhase::Syncing;
        }
        Ok(Some(SyncGuard {
            statuses: &self.statuses,
            domains: domains.to_vec(),
        }))
    }
}
