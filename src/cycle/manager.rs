//! Cycle manager
//!
//! Resolves which cycle owns a date, creating and transitioning cycles
//! in the record store as needed. Dates must be fed in ascending order:
//! the cached cycle and the archive-on-boundary rule both assume time
//! only moves forward within a run.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cycle::boundary::{resolve_cycle_end_date, CycleDates};
use crate::cycle::model::{
    status_fields, Cycle, CycleStatus, DATE_RANGE_PROPERTY, DEFAULT_CYCLE_ICON, STATUS_PROPERTY,
};
use crate::error::RecordStoreError;
use crate::store::{Filter, Icon, Record, RecordStore};

/// An upcoming cycle whose end no longer matches the configured cycle
/// dates. It is marked Error and left for the user to inspect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upcoming cycle {cycle_id} starting {start} ends {found_end:?}, expected {expected_end}")]
pub struct CycleConflict {
    /// Record id of the conflicting cycle
    pub cycle_id: String,
    /// Shared start date
    pub start: NaiveDate,
    /// End computed from the current configuration
    pub expected_end: NaiveDate,
    /// End stored on the record
    pub found_end: Option<NaiveDate>,
}

/// Owns the current-cycle cache and the cycle lifecycle for one run.
pub struct CycleManager {
    store: Arc<dyn RecordStore>,
    collection: String,
    dates: CycleDates,
    today: NaiveDate,
    default_icon: Option<Icon>,
    current: Option<Cycle>,
    conflicts: Vec<CycleConflict>,
}

impl CycleManager {
    /// Create a manager for the cycles collection.
    ///
    /// `today` is the run's anchor date; a cycle synthesized for it on a
    /// non-boundary day starts out Active instead of Upcoming.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        collection: impl Into<String>,
        dates: CycleDates,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            dates,
            today,
            default_icon: None,
            current: None,
            conflicts: Vec::new(),
        }
    }

    /// Icon for new cycles when there is no previous cycle to copy from.
    #[must_use]
    pub fn with_default_icon(mut self, icon: Option<Icon>) -> Self {
        self.default_icon = icon;
        self
    }

    /// Configured cycle-start days.
    #[must_use]
    pub const fn dates(&self) -> &CycleDates {
        &self.dates
    }

    /// The most recently resolved cycle.
    #[must_use]
    pub const fn current(&self) -> Option<&Cycle> {
        self.current.as_ref()
    }

    /// Conflicting cycles flagged so far in this run.
    #[must_use]
    pub fn conflicts(&self) -> &[CycleConflict] {
        &self.conflicts
    }

    /// Return the cycle that owns occurrences created for `target`.
    ///
    /// On a configured cycle-start day the previous Active cycle is
    /// archived and a cycle for `[target, end)` becomes Active. On other
    /// days an existing covering cycle is reused, or a new one is
    /// scheduled.
    pub async fn get_or_create_cycle(
        &mut self,
        target: NaiveDate,
    ) -> Result<Cycle, RecordStoreError> {
        let boundary = self.dates.is_boundary(target);

        if let Some(cached) = self.cached_for(target, boundary) {
            debug!(%target, cycle = %cached.name, "reusing cached cycle");
            return Ok(cached);
        }

        let (end, end_index) = resolve_cycle_end_date(target, &self.dates);
        let upcoming = self.flag_conflicts(target, end).await?;

        let cycle = if boundary {
            self.open_boundary_cycle(target, end, end_index, upcoming)
                .await?
        } else {
            self.find_or_schedule(target, end, end_index, upcoming)
                .await?
        };

        self.current = Some(cycle.clone());
        Ok(cycle)
    }

    fn cached_for(&mut self, target: NaiveDate, boundary: bool) -> Option<Cycle> {
        let Some(cached) = self.current.clone().filter(|c| c.contains(target)) else {
            self.current = None;
            return None;
        };
        // A boundary day only reuses the cycle opened on that same day.
        if boundary && !(cached.start == target && cached.status == CycleStatus::Active) {
            return None;
        }
        Some(cached)
    }

    /// Mark Upcoming cycles starting on `target` whose end disagrees with
    /// `end` as Error. Returns the Upcoming cycles that match exactly.
    async fn flag_conflicts(
        &mut self,
        target: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Cycle>, RecordStoreError> {
        let filter = Filter::And(vec![
            Filter::select_equals(STATUS_PROPERTY, CycleStatus::Upcoming.as_str()),
            Filter::date_equals(DATE_RANGE_PROPERTY, target),
        ]);
        let records = self.store.query(&self.collection, Some(&filter)).await?;

        let mut exact = Vec::new();
        for record in records {
            let found_end = record.date(DATE_RANGE_PROPERTY).and_then(|(_, end)| end);
            if found_end == Some(end) {
                if let Some(cycle) = Cycle::from_record(&record) {
                    exact.push(cycle);
                }
                continue;
            }

            let conflict = CycleConflict {
                cycle_id: record.id.clone(),
                start: target,
                expected_end: end,
                found_end,
            };
            warn!(%conflict, "marking conflicting cycle as Error");
            self.set_status(&record.id, CycleStatus::Error).await?;
            self.conflicts.push(conflict);
        }

        Ok(exact)
    }

    async fn open_boundary_cycle(
        &self,
        target: NaiveDate,
        end: NaiveDate,
        end_index: usize,
        upcoming: Vec<Cycle>,
    ) -> Result<Cycle, RecordStoreError> {
        let (kept, previous_icon) = self.archive_active(Some((target, end))).await?;
        if let Some(cycle) = kept {
            debug!(cycle = %cycle.name, "cycle already active for this boundary");
            return Ok(cycle);
        }

        if let Some(mut cycle) = upcoming.into_iter().next() {
            if let Some(id) = &cycle.id {
                self.set_status(id, CycleStatus::Active).await?;
            }
            cycle.status = CycleStatus::Active;
            info!(cycle = %cycle.name, start = %cycle.start, "activated upcoming cycle");
            return Ok(cycle);
        }

        self.create(target, end, end_index, CycleStatus::Active, previous_icon)
            .await
    }

    async fn find_or_schedule(
        &self,
        target: NaiveDate,
        end: NaiveDate,
        end_index: usize,
        upcoming: Vec<Cycle>,
    ) -> Result<Cycle, RecordStoreError> {
        let filter = Filter::And(vec![
            Filter::date_on_or_before(DATE_RANGE_PROPERTY, target),
            Filter::select_not_equals(STATUS_PROPERTY, CycleStatus::Archive.as_str()),
            Filter::select_not_equals(STATUS_PROPERTY, CycleStatus::Error.as_str()),
        ]);
        let covering = self
            .store
            .query(&self.collection, Some(&filter))
            .await?
            .iter()
            .filter_map(Cycle::from_record)
            .filter(|c| c.contains(target))
            // Active wins over Upcoming, then the latest start.
            .max_by_key(|c| (c.status == CycleStatus::Active, c.start));
        if let Some(cycle) = covering {
            return Ok(cycle);
        }

        if let Some(cycle) = upcoming.into_iter().next() {
            return Ok(cycle);
        }

        if target == self.today {
            let (_, previous_icon) = self.archive_active(None).await?;
            return self
                .create(target, end, end_index, CycleStatus::Active, previous_icon)
                .await;
        }

        self.create(target, end, end_index, CycleStatus::Upcoming, None)
            .await
    }

    /// Archive every Active cycle except one spanning exactly `keep`.
    /// Returns the kept cycle and the icon of the first archived one.
    async fn archive_active(
        &self,
        keep: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<(Option<Cycle>, Option<Icon>), RecordStoreError> {
        let filter = Filter::select_equals(STATUS_PROPERTY, CycleStatus::Active.as_str());
        let active = self.store.query(&self.collection, Some(&filter)).await?;

        let mut kept = None;
        let mut previous_icon = None;
        for record in active {
            if kept.is_none() {
                if let Some((start, end)) = keep {
                    if let Some(cycle) = parse_spanning(&record, start, end) {
                        kept = Some(cycle);
                        continue;
                    }
                }
            }

            if previous_icon.is_none() {
                previous_icon.clone_from(&record.icon);
            }
            self.set_status(&record.id, CycleStatus::Archive).await?;
            info!(cycle_id = %record.id, "archived cycle");
        }

        Ok((kept, previous_icon))
    }

    async fn create(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        end_index: usize,
        status: CycleStatus,
        icon: Option<Icon>,
    ) -> Result<Cycle, RecordStoreError> {
        let icon = icon
            .or_else(|| self.default_icon.clone())
            .or_else(|| Some(Icon::Emoji(DEFAULT_CYCLE_ICON.to_string())));
        let mut cycle = Cycle::planned(start, end, end_index, &self.dates, status, icon);

        let record = self
            .store
            .create_record(&self.collection, cycle.to_fields(), cycle.icon.clone())
            .await?;
        cycle.id = Some(record.id);

        info!(
            cycle = %cycle.name,
            %start,
            %end,
            %status,
            "created cycle"
        );
        Ok(cycle)
    }

    async fn set_status(&self, record_id: &str, status: CycleStatus) -> Result<(), RecordStoreError> {
        self.store
            .update_record(record_id, status_fields(status))
            .await
    }
}

fn parse_spanning(record: &Record, start: NaiveDate, end: NaiveDate) -> Option<Cycle> {
    Cycle::from_record(record).filter(|c| c.spans(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, InMemoryRecordStore};

    const CYCLES: &str = "cycles";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manager(store: &Arc<InMemoryRecordStore>, days: &[u32], today: NaiveDate) -> CycleManager {
        CycleManager::new(
            store.clone(),
            CYCLES,
            CycleDates::new(days.iter().copied()).unwrap(),
            today,
        )
    }

    fn seed(
        store: &InMemoryRecordStore,
        start: NaiveDate,
        end: Option<NaiveDate>,
        status: CycleStatus,
    ) -> String {
        let mut fields: Fields = status_fields(status);
        fields.insert(
            DATE_RANGE_PROPERTY.to_string(),
            crate::store::FieldValue::Date { start, end },
        );
        store.insert(CYCLES, fields, Some(Icon::Emoji("🌕".to_string())))
    }

    fn status_of(store: &InMemoryRecordStore, id: &str) -> CycleStatus {
        Cycle::from_record(&store.get(id).unwrap()).unwrap().status
    }

    #[tokio::test]
    async fn test_boundary_archives_active_and_creates_new_active() {
        let store = Arc::new(InMemoryRecordStore::new());
        let old = seed(
            &store,
            date(2023, 3, 1),
            Some(date(2023, 4, 1)),
            CycleStatus::Active,
        );
        let mut cycles = manager(&store, &[1], date(2023, 4, 1));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 1)).await.unwrap();

        assert_eq!(cycle.status, CycleStatus::Active);
        assert!(cycle.spans(date(2023, 4, 1), date(2023, 5, 1)));
        assert_eq!(cycle.name, "April");
        assert_eq!(status_of(&store, &old), CycleStatus::Archive);
        // The new cycle inherits the archived cycle's icon.
        assert_eq!(cycle.icon, Some(Icon::Emoji("🌕".to_string())));
        assert_eq!(store.records(CYCLES).len(), 2);
    }

    #[tokio::test]
    async fn test_boundary_activates_matching_upcoming_cycle() {
        let store = Arc::new(InMemoryRecordStore::new());
        let upcoming = seed(
            &store,
            date(2023, 4, 15),
            Some(date(2023, 5, 1)),
            CycleStatus::Upcoming,
        );
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 15));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 15)).await.unwrap();

        assert_eq!(cycle.id.as_deref(), Some(upcoming.as_str()));
        assert_eq!(cycle.status, CycleStatus::Active);
        assert_eq!(status_of(&store, &upcoming), CycleStatus::Active);
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_boundary_rerun_keeps_matching_active_cycle() {
        let store = Arc::new(InMemoryRecordStore::new());
        let today = date(2023, 4, 1);

        let first = manager(&store, &[1], today)
            .get_or_create_cycle(today)
            .await
            .unwrap();
        let second = manager(&store, &[1], today)
            .get_or_create_cycle(today)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.records(CYCLES).len(), 1);
        assert_eq!(
            status_of(&store, first.id.as_deref().unwrap()),
            CycleStatus::Active
        );
    }

    #[tokio::test]
    async fn test_conflicting_upcoming_cycle_marked_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        // Scheduled when cycles ran monthly; now they split on the 15th.
        let stale = seed(
            &store,
            date(2023, 4, 1),
            Some(date(2023, 5, 1)),
            CycleStatus::Upcoming,
        );
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 1));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 1)).await.unwrap();

        assert_eq!(status_of(&store, &stale), CycleStatus::Error);
        assert_ne!(cycle.id.as_deref(), Some(stale.as_str()));
        assert!(cycle.spans(date(2023, 4, 1), date(2023, 4, 15)));
        assert_eq!(cycles.conflicts().len(), 1);
        assert_eq!(cycles.conflicts()[0].found_end, Some(date(2023, 5, 1)));
        assert_eq!(cycles.conflicts()[0].expected_end, date(2023, 4, 15));
    }

    #[tokio::test]
    async fn test_non_boundary_reuses_covering_cycle() {
        let store = Arc::new(InMemoryRecordStore::new());
        let active = seed(
            &store,
            date(2023, 4, 1),
            Some(date(2023, 4, 15)),
            CycleStatus::Active,
        );
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 5));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 5)).await.unwrap();

        assert_eq!(cycle.id.as_deref(), Some(active.as_str()));
        assert_eq!(store.create_count(), 0);
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_non_boundary_prefers_active_over_overlapping_upcoming() {
        let store = Arc::new(InMemoryRecordStore::new());
        let active = seed(
            &store,
            date(2023, 4, 15),
            Some(date(2023, 5, 1)),
            CycleStatus::Active,
        );
        let upcoming = seed(
            &store,
            date(2023, 4, 20),
            Some(date(2023, 5, 1)),
            CycleStatus::Upcoming,
        );
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 20));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 20)).await.unwrap();

        assert_eq!(cycle.id.as_deref(), Some(active.as_str()));
        assert_eq!(status_of(&store, &upcoming), CycleStatus::Upcoming);
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_non_boundary_ignores_archived_and_error_cycles() {
        let store = Arc::new(InMemoryRecordStore::new());
        seed(
            &store,
            date(2023, 4, 1),
            Some(date(2023, 4, 15)),
            CycleStatus::Archive,
        );
        seed(
            &store,
            date(2023, 4, 1),
            Some(date(2023, 4, 15)),
            CycleStatus::Error,
        );
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 1));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 5)).await.unwrap();

        assert_eq!(cycle.status, CycleStatus::Upcoming);
        assert!(cycle.spans(date(2023, 4, 5), date(2023, 4, 15)));
        assert_eq!(store.records(CYCLES).len(), 3);
    }

    #[tokio::test]
    async fn test_non_boundary_future_date_schedules_upcoming() {
        let store = Arc::new(InMemoryRecordStore::new());
        let mut cycles = manager(&store, &[1, 15], date(2023, 4, 1));

        let cycle = cycles.get_or_create_cycle(date(2023, 4, 20)).await.unwrap();

        assert_eq!(cycle.status, CycleStatus::Upcoming);
        assert!(cycle.spans(date(2023, 4, 20), date(2023, 5, 1)));
        assert_eq!(cycle.name, "April (part 2)");
        assert_eq!(
            cycle.icon,
            Some(Icon::Emoji(DEFAULT_CYCLE_ICON.to_string()))
        );
    }

    #[tokio::test]
    async fn test_non_boundary_today_without_cycle_creates_active() {
        let store = Arc::new(InMemoryRecordStore::new());
        let stale = seed(
            &store,
            date(2023, 2, 1),
            Some(date(2023, 3, 1)),
            CycleStatus::Active,
        );
        let today = date(2023, 4, 5);
        let mut cycles = manager(&store, &[1], today);

        let cycle = cycles.get_or_create_cycle(today).await.unwrap();

        assert_eq!(cycle.status, CycleStatus::Active);
        assert!(cycle.spans(today, date(2023, 5, 1)));
        assert_eq!(status_of(&store, &stale), CycleStatus::Archive);
    }

    #[tokio::test]
    async fn test_non_boundary_is_idempotent_without_cache() {
        let store = Arc::new(InMemoryRecordStore::new());
        let today = date(2023, 4, 1);
        let target = date(2023, 4, 20);

        let first = manager(&store, &[1, 15], today)
            .get_or_create_cycle(target)
            .await
            .unwrap();
        let second = manager(&store, &[1, 15], today)
            .get_or_create_cycle(target)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.records(CYCLES).len(), 1);
    }

    #[tokio::test]
    async fn test_cache_avoids_queries_within_range() {
        let store = Arc::new(InMemoryRecordStore::new());
        let today = date(2023, 4, 1);
        let mut cycles = manager(&store, &[1, 15], today);

        let first = cycles.get_or_create_cycle(today).await.unwrap();
        let queries = store.query_count();
        let again = cycles.get_or_create_cycle(date(2023, 4, 2)).await.unwrap();
        let same_day = cycles.get_or_create_cycle(today).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(first.id, same_day.id);
        assert_eq!(store.query_count(), queries);
    }

    #[tokio::test]
    async fn test_cache_invalidated_outside_range() {
        let store = Arc::new(InMemoryRecordStore::new());
        let today = date(2023, 4, 1);
        let mut cycles = manager(&store, &[1, 15], today);

        let first = cycles.get_or_create_cycle(today).await.unwrap();
        let next = cycles.get_or_create_cycle(date(2023, 4, 15)).await.unwrap();

        assert_ne!(first.id, next.id);
        assert_eq!(cycles.current().and_then(|c| c.id.clone()), next.id);
        assert_eq!(
            status_of(&store, first.id.as_deref().unwrap()),
            CycleStatus::Archive
        );
        assert_eq!(next.status, CycleStatus::Active);
    }

    #[tokio::test]
    async fn test_query_failure_is_fatal() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_queries();
        let mut cycles = manager(&store, &[1], date(2023, 4, 5));

        let err = cycles
            .get_or_create_cycle(date(2023, 4, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::Api { .. }));
        assert!(cycles.current().is_none());
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_default_icon_used_when_configured() {
        let store = Arc::new(InMemoryRecordStore::new());
        let today = date(2023, 4, 1);
        let mut cycles = manager(&store, &[1], today)
            .with_default_icon(Some(Icon::Emoji("🗓️".to_string())));

        let cycle = cycles.get_or_create_cycle(today).await.unwrap();
        assert_eq!(cycle.icon, Some(Icon::Emoji("🗓️".to_string())));
    }
}
