use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::filter::{FilterSpec, Pagination, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

pub const DEFAULT_UPCOMING_DAYS: u32 = 20;
pub const MAX_UPCOMING_DAYS: u32 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("invalid {field} date '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
}

/// Raw query-string parameters of the listing and KPI routes. Everything is
/// kept as text so that malformed numbers fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlQuery {
    pub business_unit: Option<String>,
    pub process_name: Option<String>,
    pub process_id: Option<String>,
    pub control_owner: Option<String>,
    pub test_performer: Option<String>,
    pub quarter: Option<String>,
    pub status: Option<String>,
    pub assertion_status: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ControlQuery {
    pub fn filter(&self) -> FilterSpec {
        FilterSpec {
            business_unit: self.business_unit.clone(),
            quarter: self.quarter.clone(),
            status: self.status.clone(),
            assertion_status: self.assertion_status.clone(),
            process_name: self.process_name.clone(),
            process_id: self.process_id.clone(),
            control_owner: self.control_owner.clone(),
            test_performer: self.test_performer.clone(),
            search: self.search.clone(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        let page = parse_number(self.page.as_deref())
            .map(|page| u64::try_from(page).unwrap_or(DEFAULT_PAGE))
            .unwrap_or(DEFAULT_PAGE);
        let page_size = parse_number(self.page_size.as_deref())
            .map(|size| u64::try_from(size).unwrap_or(0))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Pagination::new(page, page_size)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Inclusive date bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl CalendarQuery {
    /// The calendar is only narrowed when both bounds are given; a lone
    /// `start` or `end` is ignored.
    pub fn range(&self) -> Result<Option<DateRange>, ParamError> {
        let start = present(self.start.as_deref());
        let end = present(self.end.as_deref());
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(None);
        };
        Ok(Some(DateRange {
            start: parse_date("start", start)?,
            end: parse_date("end", end)?,
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<String>,
}

impl UpcomingQuery {
    pub fn within_days(&self) -> u32 {
        match parse_number(self.days.as_deref()) {
            Some(days) => u32::try_from(days.clamp(0, i64::from(MAX_UPCOMING_DAYS)))
                .unwrap_or(DEFAULT_UPCOMING_DAYS),
            None => DEFAULT_UPCOMING_DAYS,
        }
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|raw| !raw.is_empty())
}

/// Accepts any decimal form (`2`, `2.0`, `1e1`) and truncates toward zero.
fn parse_number(raw: Option<&str>) -> Option<i64> {
    present(raw)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ParamError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ParamError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/params_tests.rs"]
mod tests;
