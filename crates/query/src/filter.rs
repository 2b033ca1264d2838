use std::ops::Range;

use shared::domain::Control;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Which text fields a free-text `search` term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// ControlId, ControlTitle and ControlDescription.
    Listing,
    /// ControlId and ControlTitle only.
    Kpi,
}

/// Typed filter over the control collection. Every present, non-empty option
/// is ANDed with the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub business_unit: Option<String>,
    pub quarter: Option<String>,
    pub status: Option<String>,
    pub assertion_status: Option<String>,
    pub process_name: Option<String>,
    pub process_id: Option<String>,
    pub control_owner: Option<String>,
    pub test_performer: Option<String>,
    pub search: Option<String>,
}

impl FilterSpec {
    pub fn matcher(&self, scope: SearchScope) -> Matcher<'_> {
        Matcher {
            business_unit: present(&self.business_unit),
            quarter: present(&self.quarter),
            status: present(&self.status),
            assertion_status: present(&self.assertion_status),
            process_name: lowered(&self.process_name),
            process_id: lowered(&self.process_id),
            control_owner: lowered(&self.control_owner),
            test_performer: lowered(&self.test_performer),
            search: lowered(&self.search),
            scope,
        }
    }

    pub fn matches(&self, control: &Control, scope: SearchScope) -> bool {
        self.matcher(scope).matches(control)
    }
}

/// A [`FilterSpec`] with its needles lower-cased once, ready to test many rows.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
    business_unit: Option<&'a str>,
    quarter: Option<&'a str>,
    status: Option<&'a str>,
    assertion_status: Option<&'a str>,
    process_name: Option<String>,
    process_id: Option<String>,
    control_owner: Option<String>,
    test_performer: Option<String>,
    search: Option<String>,
    scope: SearchScope,
}

impl Matcher<'_> {
    pub fn matches(&self, control: &Control) -> bool {
        equals(self.business_unit, &control.business_unit)
            && equals(self.quarter, control.quarter.as_str())
            && equals(self.status, control.status.as_str())
            && equals(self.assertion_status, control.assertion_status.as_str())
            && contains(self.process_name.as_deref(), &control.process_name)
            && contains(self.process_id.as_deref(), &control.process_id)
            && contains(self.control_owner.as_deref(), &control.control_owner)
            && contains(self.test_performer.as_deref(), &control.test_performer)
            && self.matches_search(control)
    }

    fn matches_search(&self, control: &Control) -> bool {
        let Some(term) = self.search.as_deref() else {
            return true;
        };
        let mut haystacks = vec![
            control.control_id.as_str(),
            control.control_title.as_str(),
        ];
        if self.scope == SearchScope::Listing {
            haystacks.push(control.control_description.as_str());
        }
        haystacks
            .into_iter()
            .any(|field| field.to_lowercase().contains(term))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn lowered(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_lowercase)
}

fn equals(expected: Option<&str>, actual: &str) -> bool {
    expected.map_or(true, |expected| expected == actual)
}

fn contains(needle: Option<&str>, haystack: &str) -> bool {
    needle.map_or(true, |needle| haystack.to_lowercase().contains(needle))
}

/// 1-indexed page window. `page_size == 0` always yields an empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size,
        }
    }

    /// Index range of this page within a sequence of `len` items, clamped so
    /// that pages past the end are empty.
    pub fn window(&self, len: usize) -> Range<usize> {
        let offset = self.page.saturating_sub(1).saturating_mul(self.page_size);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        let size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let end = start.saturating_add(size).min(len);
        start..end
    }
}
