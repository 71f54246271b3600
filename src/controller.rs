//! One list screen: collection, filter, form and the banners that report on
//! them. Every mutation is followed by a full `list()` refresh.
//!
//! Errors are reported as banners before they are returned. The caller only
//! needs to act on `ApiError::Unauthorized`, which is returned without a
//! banner so the session expiry path can post its own.

use tracing::{info, warn};

use crate::api::ResourceApi;
use crate::error::ApiError;
use crate::form::{FormController, SubmitControl, SubmitOutcome};
use crate::notify::Notifications;
use crate::render::{Lookups, Table, Tabular, render_store};
use crate::resource::{Draft, FieldSpec};
use crate::store::{FilterCriteria, ListStore, LoadState};

pub struct ListController<R: Tabular, A: ResourceApi<R>> {
    api: A,
    store: ListStore<R>,
    criteria: FilterCriteria,
    form: FormController<R>,
}

impl<R: Tabular, A: ResourceApi<R>> ListController<R, A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            store: ListStore::new(),
            criteria: FilterCriteria::default(),
            form: FormController::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn records(&self) -> &[R] {
        self.store.records()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn form(&self) -> &FormController<R> {
        &self.form
    }

    pub fn load(&mut self, notes: &mut Notifications) -> Result<(), ApiError> {
        match self.store.refresh(&self.api) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(kind = R::PATH, "load failed: {err}");
                if !err.is_unauthorized() {
                    notes.error(format!("Error loading {}. Please try again.", R::PLURAL));
                }
                Err(err)
            }
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.criteria.search_term = term.to_string();
    }

    pub fn set_status(&mut self, status: &str) {
        self.criteria.status = status.to_string();
    }

    pub fn table(&self, lookups: &Lookups) -> Table {
        render_store(&self.store, &self.criteria, lookups)
    }

    pub fn open_create(&mut self) {
        self.form.open_create();
    }

    /// Opens the form on a fresh copy of the record from the server.
    pub fn open_edit(&mut self, id: i64, notes: &mut Notifications) -> Result<(), ApiError> {
        self.form.open_edit_by_id(&self.api, id).inspect_err(|err| {
            warn!(kind = R::PATH, id, "fetch for edit failed: {err}");
            if !err.is_unauthorized() {
                notes.error(err.user_message(&format!("Error loading {} details.", R::SINGULAR)));
            }
        })
    }

    pub fn set_field(&mut self, name: &str, value: String) {
        self.form.set_field(name, value);
    }

    pub fn close_form(&mut self) {
        self.form.close();
    }

    pub fn submit(&mut self, notes: &mut Notifications) -> Result<SubmitOutcome, ApiError> {
        let outcome = match self.form.submit(&self.api) {
            Ok(outcome) => outcome,
            Err(err) => {
                if !err.is_unauthorized() {
                    notes.error(err.user_message(&format!(
                        "Error occurred while saving the {}. Please try again.",
                        R::SINGULAR
                    )));
                }
                return Err(err);
            }
        };
        let verb = match outcome {
            SubmitOutcome::Created => "added",
            SubmitOutcome::Updated => "updated",
            SubmitOutcome::Blocked | SubmitOutcome::Ignored => return Ok(outcome),
        };
        info!(kind = R::PATH, verb, "record saved");
        notes.success(format!("{} {} successfully.", R::TITLE, verb));
        self.reload_after_write(notes)?;
        Ok(outcome)
    }

    /// Deletes `id` if `confirm` agrees. Returns whether a delete was issued.
    pub fn delete(
        &mut self,
        id: i64,
        confirm: impl FnOnce() -> bool,
        notes: &mut Notifications,
    ) -> Result<bool, ApiError> {
        if !confirm() {
            return Ok(false);
        }
        if let Err(err) = self.api.delete(id) {
            warn!(kind = R::PATH, id, "delete failed: {err}");
            if !err.is_unauthorized() {
                notes.error(format!("Error deleting {}. Please try again.", R::SINGULAR));
            }
            return Err(err);
        }
        info!(kind = R::PATH, id, "record deleted");
        notes.success(format!("{} deleted successfully.", R::TITLE));
        self.reload_after_write(notes)?;
        Ok(true)
    }

    /// The write has already happened, so a failed refresh only leaves its
    /// banner. An expired session is still passed on.
    fn reload_after_write(&mut self, notes: &mut Notifications) -> Result<(), ApiError> {
        match self.load(notes) {
            Err(err) if err.is_unauthorized() => Err(err),
            _ => Ok(()),
        }
    }
}

/// Object-safe view of a [`ListController`], so the terminal browser can
/// drive every kind through one code path.
pub trait ListPage {
    fn kind(&self) -> &'static str;
    fn statuses(&self) -> &'static [&'static str];
    fn criteria(&self) -> &FilterCriteria;
    fn set_search(&mut self, term: &str);
    fn set_status(&mut self, status: &str);
    fn is_loaded(&self) -> bool;
    fn load(&mut self, notes: &mut Notifications) -> Result<(), ApiError>;
    fn table(&self, lookups: &Lookups) -> Table;
    fn delete_prompt(&self) -> String;
    fn delete_confirmed(&mut self, id: i64, notes: &mut Notifications) -> Result<(), ApiError>;

    fn open_create(&mut self);
    fn open_edit(&mut self, id: i64, notes: &mut Notifications) -> Result<(), ApiError>;
    fn form_open(&self) -> bool;
    fn form_heading(&self) -> String;
    fn form_fields(&self) -> &'static [FieldSpec];
    fn form_value(&self, name: &str) -> String;
    fn set_form_value(&mut self, name: &str, value: String);
    fn form_error(&self) -> Option<String>;
    fn submit_control(&self) -> SubmitControl;
    fn close_form(&mut self);
    fn submit(&mut self, notes: &mut Notifications) -> Result<(), ApiError>;
}

impl<R: Tabular, A: ResourceApi<R>> ListPage for ListController<R, A> {
    fn kind(&self) -> &'static str {
        R::PATH
    }

    fn statuses(&self) -> &'static [&'static str] {
        R::STATUSES
    }

    fn criteria(&self) -> &FilterCriteria {
        ListController::criteria(self)
    }

    fn set_search(&mut self, term: &str) {
        ListController::set_search(self, term);
    }

    fn set_status(&mut self, status: &str) {
        ListController::set_status(self, status);
    }

    fn is_loaded(&self) -> bool {
        *self.store.state() == LoadState::Loaded
    }

    fn load(&mut self, notes: &mut Notifications) -> Result<(), ApiError> {
        ListController::load(self, notes)
    }

    fn table(&self, lookups: &Lookups) -> Table {
        ListController::table(self, lookups)
    }

    fn delete_prompt(&self) -> String {
        format!("Are you sure you want to delete this {}?", R::SINGULAR)
    }

    fn delete_confirmed(&mut self, id: i64, notes: &mut Notifications) -> Result<(), ApiError> {
        ListController::delete(self, id, || true, notes).map(|_| ())
    }

    fn open_create(&mut self) {
        ListController::open_create(self);
    }

    fn open_edit(&mut self, id: i64, notes: &mut Notifications) -> Result<(), ApiError> {
        ListController::open_edit(self, id, notes)
    }

    fn form_open(&self) -> bool {
        self.form.is_open()
    }

    fn form_heading(&self) -> String {
        self.form.heading()
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        <R::Draft as Draft>::fields()
    }

    fn form_value(&self, name: &str) -> String {
        self.form.draft().get(name)
    }

    fn set_form_value(&mut self, name: &str, value: String) {
        self.form.set_field(name, value);
    }

    fn form_error(&self) -> Option<String> {
        self.form.error().map(str::to_string)
    }

    fn submit_control(&self) -> SubmitControl {
        self.form.submit_control()
    }

    fn close_form(&mut self) {
        ListController::close_form(self);
    }

    fn submit(&mut self, notes: &mut Notifications) -> Result<(), ApiError> {
        ListController::submit(self, notes).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{Company, JobListing};
    use crate::session::{MemorySessionStore, Navigation, Page, SESSION_EXPIRED, SessionGuard, test_session};
    use crate::store::fake::FakeApi;

    fn company(id: i64, name: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
            industry: None,
            size: None,
            contact_info: None,
            notes: None,
        }
    }

    fn notes() -> Notifications {
        Notifications::new(Duration::from_secs(4))
    }

    fn messages(notes: &Notifications) -> Vec<String> {
        notes.banners().iter().map(|b| b.message.clone()).collect()
    }

    #[test]
    fn test_blank_company_name_issues_no_call() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        ctl.open_create();

        let outcome = ctl.submit(&mut notes).unwrap();

        assert_eq!(outcome, SubmitOutcome::Blocked);
        assert_eq!(ctl.api().mutations(), 0);
        assert_eq!(ctl.api().list_calls.get(), 0);
        assert!(ctl.form().submit_control().enabled);
        assert_eq!(ctl.form().error(), Some("Company name is required."));
    }

    #[test]
    fn test_successful_create_refreshes_from_server() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        ctl.load(&mut notes).unwrap();

        ctl.open_create();
        ctl.set_field("name", "Globex".to_string());
        // the server is the source of truth for what comes back
        ctl.api().records.borrow_mut().push(company(2, "Globex"));
        let outcome = ctl.submit(&mut notes).unwrap();

        assert_eq!(outcome, SubmitOutcome::Created);
        assert_eq!(ctl.api().list_calls.get(), 2);
        assert_eq!(ctl.records().len(), 2);
        assert!(!ctl.form().is_open());
        assert_eq!(messages(&notes), vec!["Company added successfully."]);
    }

    #[test]
    fn test_saved_record_stays_saved_when_refresh_fails() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        *ctl.api().fail_list.borrow_mut() = Some(ApiError::NetworkOrServer("down".to_string()));

        ctl.open_create();
        ctl.set_field("name", "Globex".to_string());
        let outcome = ctl.submit(&mut notes).unwrap();

        assert_eq!(outcome, SubmitOutcome::Created);
        assert_eq!(ctl.api().create_calls.get(), 1);
        assert_eq!(
            messages(&notes),
            vec!["Company added successfully.", "Error loading companies. Please try again."]
        );
    }

    #[test]
    fn test_delete_stays_done_when_refresh_fails() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        *ctl.api().fail_list.borrow_mut() = Some(ApiError::NetworkOrServer("down".to_string()));

        assert!(ctl.delete(1, || true, &mut notes).unwrap());
        assert_eq!(*ctl.api().delete_calls.borrow(), vec![1]);
    }

    #[test]
    fn test_expired_session_during_refresh_is_passed_on() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        *ctl.api().fail_list.borrow_mut() = Some(ApiError::Unauthorized);

        ctl.open_create();
        ctl.set_field("name", "Globex".to_string());
        assert!(ctl.submit(&mut notes).unwrap_err().is_unauthorized());
        assert_eq!(ctl.api().create_calls.get(), 1);
    }

    #[test]
    fn test_failed_update_leaves_collection_untouched() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        ctl.load(&mut notes).unwrap();
        ctl.open_edit(1, &mut notes).unwrap();
        ctl.set_field("name", "Acme Corp".to_string());
        *ctl.api().fail_mutation.borrow_mut() = Some(ApiError::NetworkOrServer("boom".to_string()));

        assert!(ctl.submit(&mut notes).is_err());

        assert_eq!(ctl.records(), &[company(1, "Acme")]);
        assert_eq!(ctl.api().list_calls.get(), 1);
        assert!(ctl.form().is_open());
        assert_eq!(
            messages(&notes),
            vec!["Error occurred while saving the company. Please try again."]
        );
    }

    #[test]
    fn test_confirmed_delete_calls_delete_then_list_once() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme"), company(2, "Globex")]));
        let mut notes = notes();

        let deleted = ctl.delete(2, || true, &mut notes).unwrap();

        assert!(deleted);
        assert_eq!(*ctl.api().delete_calls.borrow(), vec![2]);
        assert_eq!(ctl.api().list_calls.get(), 1);
        assert_eq!(ctl.records(), &[company(1, "Acme")]);
        assert_eq!(messages(&notes), vec!["Company deleted successfully."]);
    }

    #[test]
    fn test_declined_delete_makes_no_calls() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();

        assert!(!ctl.delete(1, || false, &mut notes).unwrap());

        assert!(ctl.api().delete_calls.borrow().is_empty());
        assert_eq!(ctl.api().list_calls.get(), 0);
        assert!(notes.banners().is_empty());
    }

    #[test]
    fn test_failed_delete_reports_and_skips_refresh() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme")]));
        let mut notes = notes();
        *ctl.api().fail_mutation.borrow_mut() = Some(ApiError::NetworkOrServer("boom".to_string()));

        assert!(ctl.delete(1, || true, &mut notes).is_err());
        assert_eq!(ctl.api().list_calls.get(), 0);
        assert_eq!(messages(&notes), vec!["Error deleting company. Please try again."]);
    }

    #[test]
    fn test_unauthorized_list_expires_session() {
        let store = MemorySessionStore::with(test_session("abc"));
        let guard = SessionGuard::new(Box::new(store.clone()), Duration::from_secs(2));
        let mut ctl = ListController::new(FakeApi::<Company>::with(vec![]));
        *ctl.api().fail_list.borrow_mut() = Some(ApiError::Unauthorized);
        let mut notes = notes();

        let err = ctl.load(&mut notes).unwrap_err();
        assert!(err.is_unauthorized());
        assert!(notes.banners().is_empty());

        let nav = guard.expire(&mut notes);
        assert_eq!(nav, Navigation::after(Page::Login, Duration::from_secs(2)));
        assert!(store.current().is_none());
        assert_eq!(messages(&notes), vec![SESSION_EXPIRED]);
    }

    #[test]
    fn test_failed_load_posts_banner_and_error_row() {
        let mut ctl = ListController::new(FakeApi::<JobListing>::with(vec![]));
        *ctl.api().fail_list.borrow_mut() = Some(ApiError::NetworkOrServer("down".to_string()));
        let mut notes = notes();

        assert!(ctl.load(&mut notes).is_err());
        assert_eq!(messages(&notes), vec!["Error loading job listings. Please try again."]);
        let table = ctl.table(&Lookups::default());
        assert!(table.record_ids().is_empty());
    }

    #[test]
    fn test_list_page_filters_through_criteria() {
        let mut ctl = ListController::new(FakeApi::with(vec![company(1, "Acme"), company(2, "Globex")]));
        let mut notes = notes();
        let page: &mut dyn ListPage = &mut ctl;
        page.load(&mut notes).unwrap();
        page.set_search("glob");

        assert_eq!(page.table(&Lookups::default()).record_ids(), vec![2]);
        assert_eq!(page.delete_prompt(), "Are you sure you want to delete this company?");
        assert!(page.statuses().is_empty());
    }
}
