use tracing::debug;

use crate::api::ResourceApi;
use crate::error::ApiError;
use crate::resource::Resource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search_term: String,
    /// Empty means "any status".
    pub status: String,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.search_term.trim().is_empty() && self.status.trim().is_empty()
    }
}

pub fn matches_search<R: Resource>(record: &R, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    record
        .search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
}

pub fn matches_status<R: Resource>(record: &R, status: &str) -> bool {
    let status = status.trim();
    if status.is_empty() {
        return true;
    }
    record
        .status()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(status))
}

/// Visible subset of `collection` under `criteria`, in collection order.
pub fn filter<R: Resource>(collection: &[R], criteria: &FilterCriteria) -> Vec<R> {
    if criteria.is_empty() {
        return collection.to_vec();
    }
    collection
        .iter()
        .filter(|r| matches_search(*r, &criteria.search_term) && matches_status(*r, &criteria.status))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    NotLoaded,
    Loaded,
    Failed(String),
}

/// Last fetched collection of one kind. Only `refresh` writes it, and only
/// with a complete server response.
#[derive(Debug)]
pub struct ListStore<R> {
    records: Vec<R>,
    state: LoadState,
}

impl<R: Resource> Default for ListStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ListStore<R> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            state: LoadState::NotLoaded,
        }
    }

    pub fn refresh(&mut self, api: &impl ResourceApi<R>) -> Result<(), ApiError> {
        match api.list() {
            Ok(fresh) => {
                debug!(kind = R::PATH, count = fresh.len(), "collection refreshed");
                self.records = fresh;
                self.state = LoadState::Loaded;
                Ok(())
            }
            Err(err) => {
                self.state = LoadState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn view(&self, criteria: &FilterCriteria) -> Vec<R> {
        filter(&self.records, criteria)
    }
}
