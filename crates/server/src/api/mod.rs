//! Route logic independent of the HTTP layer. Every operation returns
//! `ApiError` so handlers only pick a status code.

use std::sync::Arc;

use chrono::NaiveDate;
use mailer::Mailer;
use query::{
    compute_kpis, effectiveness_breakdown, events_in_range, filter_controls, get_control_by_id,
    project_calendar_events, upcoming_events, CalendarQuery, ControlQuery, SearchScope,
    UpcomingQuery,
};
use shared::{
    domain::{Control, EffectivenessBreakdown, KpiAggregate},
    error::ApiError,
    protocol::{CalendarResponse, ControlsPage, UpcomingResponse},
};
use storage::{AdminStore, ControlStore};
use tracing::warn;

pub mod admin;

#[derive(Clone)]
pub struct ApiContext {
    pub controls: ControlStore,
    pub admin: Arc<dyn AdminStore>,
    pub mailer: Arc<dyn Mailer>,
    /// Linked from welcome emails.
    pub dashboard_url: String,
}

pub fn list_controls(ctx: &ApiContext, params: &ControlQuery) -> ControlsPage {
    let snapshot = ctx.controls.snapshot();
    query::list_controls(snapshot.controls(), &params.filter(), params.pagination())
}

pub fn get_control(ctx: &ApiContext, id: &str) -> Result<Control, ApiError> {
    let snapshot = ctx.controls.snapshot();
    get_control_by_id(&*snapshot, id)
        .cloned()
        .map_err(ApiError::from)
}

pub fn kpis(ctx: &ApiContext, params: &ControlQuery) -> KpiAggregate {
    let snapshot = ctx.controls.snapshot();
    let matched = filter_controls(snapshot.controls(), &params.filter(), SearchScope::Kpi);
    compute_kpis(matched)
}

pub fn kpi_breakdown(ctx: &ApiContext, params: &ControlQuery) -> EffectivenessBreakdown {
    let snapshot = ctx.controls.snapshot();
    let matched = filter_controls(snapshot.controls(), &params.filter(), SearchScope::Kpi);
    effectiveness_breakdown(matched)
}

pub fn calendar(ctx: &ApiContext, params: &CalendarQuery) -> Result<CalendarResponse, ApiError> {
    let range = params
        .range()
        .map_err(|err| ApiError::validation(err.to_string()))?;
    let snapshot = ctx.controls.snapshot();
    let events = project_calendar_events(snapshot.controls());
    let items = match range {
        Some(range) => events_in_range(events, range),
        None => events,
    };
    Ok(CalendarResponse { items })
}

pub fn upcoming(ctx: &ApiContext, params: &UpcomingQuery, today: NaiveDate) -> UpcomingResponse {
    let snapshot = ctx.controls.snapshot();
    UpcomingResponse {
        items: upcoming_events(snapshot.controls(), today, params.within_days()),
    }
}

fn internal(context: &'static str, err: anyhow::Error) -> ApiError {
    warn!(error = %err, context, "collaborator failure");
    ApiError::internal(context)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
