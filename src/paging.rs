//! Page bookkeeping for the alarm/event lists of the engine monitoring view.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Structured query for paged platform lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ListFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("withTotalPages", "true".to_string())];
        if let Some(page) = self.page {
            q.push(("currentPage", page.to_string()));
        }
        if let Some(size) = self.page_size {
            q.push(("pageSize", size.to_string()));
        }
        if let Some(source) = &self.source_id {
            q.push(("source", source.clone()));
        }
        if let Some(status) = &self.status {
            q.push(("status", status.clone()));
        }
        q
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageState {
    /// 1-based.
    pub page_index: u32,
    pub page_size: u32,
    pub filter: ListFilter,
}

impl PageState {
    pub fn new(page_size: u32, filter: ListFilter) -> Self {
        Self {
            page_index: 1,
            page_size: page_size.max(1),
            filter,
        }
    }

    /// Filter for the current page, with paging fields filled in.
    pub fn to_filter(&self) -> ListFilter {
        ListFilter {
            page: Some(self.page_index),
            page_size: Some(self.page_size),
            ..self.filter.clone()
        }
    }
}

/// Moves `delta` pages, never before the first page.
pub fn next_page(state: &PageState, delta: i64) -> PageState {
    let target = i64::from(state.page_index).saturating_add(delta);
    let page_index = target.clamp(1, i64::from(u32::MAX)) as u32;
    PageState {
        page_index,
        ..state.clone()
    }
}

/// Replaces the status filter and restarts at the first page.
pub fn with_status(state: &PageState, status: Option<String>) -> PageState {
    PageState {
        page_index: 1,
        page_size: state.page_size,
        filter: ListFilter {
            status,
            ..state.filter.clone()
        },
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    #[serde(rename = "type", default)]
    pub alarm_type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PageState {
        PageState::new(
            DEFAULT_PAGE_SIZE,
            ListFilter {
                source_id: Some("4711".to_string()),
                ..ListFilter::default()
            },
        )
    }

    #[test]
    fn next_page_clamps_at_first_page() {
        let s = state();
        assert_eq!(next_page(&s, -1).page_index, 1);
        let s = next_page(&s, 2);
        assert_eq!(s.page_index, 3);
        assert_eq!(next_page(&s, -5).page_index, 1);
    }

    #[test]
    fn next_page_keeps_filter_and_size() {
        let s = next_page(&state(), 1);
        assert_eq!(s.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(s.filter.source_id.as_deref(), Some("4711"));
    }

    #[test]
    fn status_change_resets_page() {
        let s = next_page(&state(), 3);
        let s = with_status(&s, Some("ACTIVE".to_string()));
        assert_eq!(s.page_index, 1);
        assert_eq!(s.filter.status.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn filter_renders_platform_query_keys() {
        let q = next_page(&state(), 1).to_filter().query_pairs();
        assert!(q.contains(&("currentPage", "2".to_string())));
        assert!(q.contains(&("pageSize", "5".to_string())));
        assert!(q.contains(&("source", "4711".to_string())));
        assert!(!q.iter().any(|(k, _)| *k == "status"));
    }
}
