//! Query and aggregation engine over the in-memory control collection.
//!
//! Every function here is pure: it borrows a slice of controls, never mutates
//! it, and never fails except for an id lookup miss.

use chrono::{Days, NaiveDate};
use shared::{
    domain::{
        AssertionStatus, CalendarEvent, CalendarEventKind, Control, DueUrgency, Effectiveness,
        EffectivenessBreakdown, KpiAggregate, TestStatus,
    },
    error::ApiError,
    protocol::{ControlsPage, UpcomingEvent},
};
use thiserror::Error;

pub mod filter;
pub mod params;

pub use filter::{FilterSpec, Matcher, Pagination, SearchScope};
pub use params::{CalendarQuery, ControlQuery, DateRange, ParamError, UpcomingQuery};

const CRITICAL_WITHIN_DAYS: i64 = 10;
const WARNING_WITHIN_DAYS: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Control not found")]
    ControlNotFound { id: String },
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::not_found(err.to_string())
    }
}

/// Controls matching `filter` in their original order.
pub fn filter_controls<'a>(
    controls: &'a [Control],
    filter: &FilterSpec,
    scope: SearchScope,
) -> Vec<&'a Control> {
    let matcher = filter.matcher(scope);
    controls
        .iter()
        .filter(|control| matcher.matches(control))
        .collect()
}

pub fn list_controls(
    controls: &[Control],
    filter: &FilterSpec,
    pagination: Pagination,
) -> ControlsPage {
    let filtered = filter_controls(controls, filter, SearchScope::Listing);
    let window = pagination.window(filtered.len());
    ControlsPage {
        items: filtered[window].iter().map(|&control| control.clone()).collect(),
        total: filtered.len() as u64,
        page: pagination.page,
        page_size: pagination.page_size,
    }
}

/// A control collection that can resolve a `ControlId`. Plain slices scan;
/// indexed collections override [`ControlSource::find`].
pub trait ControlSource {
    fn controls(&self) -> &[Control];

    fn find(&self, id: &str) -> Option<&Control> {
        self.controls()
            .iter()
            .find(|control| control.control_id == id)
    }
}

impl ControlSource for [Control] {
    fn controls(&self) -> &[Control] {
        self
    }
}

impl ControlSource for Vec<Control> {
    fn controls(&self) -> &[Control] {
        self
    }
}

pub fn get_control_by_id<'a, C>(collection: &'a C, id: &str) -> Result<&'a Control, QueryError>
where
    C: ControlSource + ?Sized,
{
    collection
        .find(id)
        .ok_or_else(|| QueryError::ControlNotFound { id: id.to_string() })
}

/// Whether a control is still awaiting a test verdict. A pending or unrated
/// test outranks whatever the effectiveness column says.
pub fn is_not_tested(control: &Control) -> bool {
    matches!(control.status, TestStatus::NotRated | TestStatus::Pending)
        || control.effectiveness == Effectiveness::NotRated
}

pub fn compute_kpis<'a, I>(controls: I) -> KpiAggregate
where
    I: IntoIterator<Item = &'a Control>,
{
    let mut kpis = KpiAggregate::default();
    for control in controls {
        match control.assertion_status {
            AssertionStatus::Due => kpis.certification_due += 1,
            AssertionStatus::Asserted => kpis.control_asserted += 1,
            AssertionStatus::NotAsserted => kpis.control_not_asserted += 1,
        }

        match control.status {
            TestStatus::Pending => kpis.test_pending += 1,
            TestStatus::Completed => kpis.pass_test += 1,
            TestStatus::NotRated => kpis.not_rated_test += 1,
            TestStatus::Fail => kpis.fail_test += 1,
        }

        if is_not_tested(control) {
            continue;
        }
        if control.effectiveness == Effectiveness::Effective {
            kpis.control_effective += 1;
        } else {
            kpis.control_not_effective += 1;
        }
    }
    kpis
}

pub fn effectiveness_breakdown<'a, I>(controls: I) -> EffectivenessBreakdown
where
    I: IntoIterator<Item = &'a Control>,
{
    let mut stats = EffectivenessBreakdown::default();
    for control in controls {
        match control.assertion_status {
            AssertionStatus::Asserted => stats.asserted += 1,
            AssertionStatus::NotAsserted => stats.not_asserted += 1,
            AssertionStatus::Due => stats.due += 1,
        }

        if is_not_tested(control) {
            stats.not_tested += 1;
        } else if control.effectiveness == Effectiveness::Effective {
            stats.effective += 1;
        } else {
            stats.ineffective += 1;
        }

        let quarter = stats.quarterly.quarter_mut(control.quarter);
        match control.status {
            TestStatus::Completed => quarter.passed += 1,
            TestStatus::Fail => quarter.failed += 1,
            TestStatus::NotRated => quarter.not_rated += 1,
            TestStatus::Pending => quarter.pending += 1,
        }
    }
    stats
}

pub fn to_calendar_event(control: &Control) -> CalendarEvent {
    CalendarEvent {
        id: control.control_id.clone(),
        title: control.control_title.clone(),
        date: control.due_date,
        status: control.status,
        kind: CalendarEventKind::DueDate,
        description: control.control_description.clone(),
        owner: control.control_owner.clone(),
        business_unit: control.business_unit.clone(),
        ore_number: control.ore_number.clone(),
        assertion_status: control.assertion_status,
    }
}

pub fn project_calendar_events(controls: &[Control]) -> Vec<CalendarEvent> {
    controls.iter().map(to_calendar_event).collect()
}

pub fn events_in_range(events: Vec<CalendarEvent>, range: DateRange) -> Vec<CalendarEvent> {
    events
        .into_iter()
        .filter(|event| range.contains(event.date))
        .collect()
}

pub fn due_urgency(due: NaiveDate, today: NaiveDate) -> DueUrgency {
    let days_left = due.signed_duration_since(today).num_days();
    if days_left < CRITICAL_WITHIN_DAYS {
        DueUrgency::Critical
    } else if days_left <= WARNING_WITHIN_DAYS {
        DueUrgency::Warning
    } else {
        DueUrgency::Normal
    }
}

/// Events due between `today` and `today + within_days` (inclusive), soonest
/// first.
pub fn upcoming_events(
    controls: &[Control],
    today: NaiveDate,
    within_days: u32,
) -> Vec<UpcomingEvent> {
    let horizon = today
        .checked_add_days(Days::new(u64::from(within_days)))
        .unwrap_or(NaiveDate::MAX);
    let range = DateRange {
        start: today,
        end: horizon,
    };
    let mut items: Vec<UpcomingEvent> = events_in_range(project_calendar_events(controls), range)
        .into_iter()
        .map(|event| UpcomingEvent {
            urgency: due_urgency(event.date, today),
            event,
        })
        .collect();
    items.sort_by(|a, b| {
        a.event
            .date
            .cmp(&b.event.date)
            .then_with(|| a.event.id.cmp(&b.event.id))
    });
    items
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
