use tracing::{debug, warn};

use crate::api::ResourceApi;
use crate::error::ApiError;
use crate::resource::{Draft, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Creating,
    Editing(i64),
    Submitting { editing: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitControl {
    pub enabled: bool,
    pub label: &'static str,
}

impl SubmitControl {
    fn idle(editing: bool) -> Self {
        Self {
            enabled: true,
            label: if editing { "Update" } else { "Save" },
        }
    }

    fn busy(editing: bool) -> Self {
        Self {
            enabled: false,
            label: if editing { "Updating..." } else { "Saving..." },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The form was not open for input.
    Ignored,
    /// Required fields were blank; nothing was sent.
    Blocked,
    Created,
    Updated,
}

/// Add/edit modal for one resource kind.
///
/// The draft belongs to the controller alone and is reset whenever the form
/// closes. A successful submit closes the form; the caller refreshes.
#[derive(Debug)]
pub struct FormController<R: Resource> {
    state: FormState,
    draft: R::Draft,
    error: Option<String>,
    submit: SubmitControl,
}

impl<R: Resource> Default for FormController<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> FormController<R> {
    pub fn new() -> Self {
        Self {
            state: FormState::Closed,
            draft: R::Draft::blank(),
            error: None,
            submit: SubmitControl::idle(false),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != FormState::Closed
    }

    pub fn draft(&self) -> &R::Draft {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn submit_control(&self) -> SubmitControl {
        self.submit
    }

    pub fn heading(&self) -> String {
        match self.state {
            FormState::Editing(_) | FormState::Submitting { editing: Some(_) } => format!("Edit {}", R::TITLE),
            _ => format!("Add {}", R::TITLE),
        }
    }

    pub fn open_create(&mut self) {
        self.draft = R::Draft::blank();
        self.error = None;
        self.submit = SubmitControl::idle(false);
        self.state = FormState::Creating;
    }

    pub fn open_edit(&mut self, record: &R) {
        self.draft = record.to_draft();
        self.error = None;
        self.submit = SubmitControl::idle(true);
        self.state = FormState::Editing(record.id());
    }

    /// Fetches the record first; on failure the form stays closed.
    pub fn open_edit_by_id(&mut self, api: &impl ResourceApi<R>, id: i64) -> Result<(), ApiError> {
        let record = api.get(id)?;
        self.open_edit(&record);
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = FormState::Closed;
        self.draft = R::Draft::blank();
        self.error = None;
        self.submit = SubmitControl::idle(false);
    }

    pub fn set_field(&mut self, name: &str, value: String) {
        if matches!(self.state, FormState::Creating | FormState::Editing(_)) {
            self.draft.set(name, value);
        }
    }

    /// Validates locally, then creates or updates. On failure the form stays
    /// open with an inline message. The submit control is enabled again
    /// whatever the outcome.
    pub fn submit(&mut self, api: &impl ResourceApi<R>) -> Result<SubmitOutcome, ApiError> {
        let editing = match self.state {
            FormState::Creating => None,
            FormState::Editing(id) => Some(id),
            FormState::Closed | FormState::Submitting { .. } => return Ok(SubmitOutcome::Ignored),
        };
        self.error = None;

        let missing = self.draft.missing_required();
        if !missing.is_empty() {
            debug!(kind = R::PATH, ?missing, "submit blocked by blank required fields");
            self.error = Some(R::Draft::required_message(&missing));
            self.submit = SubmitControl::idle(editing.is_some());
            return Ok(SubmitOutcome::Blocked);
        }

        self.state = FormState::Submitting { editing };
        self.submit = SubmitControl::busy(editing.is_some());

        let result = match editing {
            Some(id) => api.update(id, &self.draft),
            None => api.create(&self.draft),
        };

        self.submit = SubmitControl::idle(editing.is_some());
        match result {
            Ok(_) => {
                self.close();
                Ok(match editing {
                    Some(_) => SubmitOutcome::Updated,
                    None => SubmitOutcome::Created,
                })
            }
            Err(err) => {
                warn!(kind = R::PATH, "save failed: {err}");
                self.state = match editing {
                    Some(id) => FormState::Editing(id),
                    None => FormState::Creating,
                };
                self.error = Some(err.user_message(&format!(
                    "Error occurred while saving the {}. Please try again.",
                    R::SINGULAR
                )));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, JobApplication};
    use crate::store::fake::FakeApi;

    fn acme() -> Company {
        Company {
            id: 4,
            name: "Acme".to_string(),
            industry: Some("Tools".to_string()),
            size: None,
            contact_info: None,
            notes: None,
        }
    }

    #[test]
    fn test_blank_name_blocks_network_call() {
        let api = FakeApi::<Company>::with(vec![]);
        let mut form = FormController::<Company>::new();
        form.open_create();

        let outcome = form.submit(&api).unwrap();

        assert_eq!(outcome, SubmitOutcome::Blocked);
        assert_eq!(api.mutations(), 0);
        assert_eq!(form.error(), Some("Company name is required."));
        assert!(form.submit_control().enabled);
        assert_eq!(form.state(), FormState::Creating);
    }

    #[test]
    fn test_application_blank_fields_use_generic_message() {
        let api = FakeApi::<JobApplication>::with(vec![]);
        let mut form = FormController::<JobApplication>::new();
        form.open_create();
        form.set_field("companyName", "Acme".to_string());
        assert_eq!(form.submit(&api).unwrap(), SubmitOutcome::Blocked);
        assert_eq!(form.error(), Some("Please fill in all required fields."));
        assert_eq!(api.mutations(), 0);
    }

    #[test]
    fn test_successful_create_closes_and_resets() {
        let api = FakeApi::<Company>::with(vec![]);
        let mut form = FormController::<Company>::new();
        form.open_create();
        form.set_field("name", "Acme".to_string());

        assert_eq!(form.submit(&api).unwrap(), SubmitOutcome::Created);
        assert_eq!(api.create_calls.get(), 1);
        assert_eq!(api.last_draft.borrow().as_ref().map(|d| d.name.as_str()), Some("Acme"));
        assert_eq!(form.state(), FormState::Closed);
        assert_eq!(form.draft().name, "");
        assert!(form.submit_control().enabled);
    }

    #[test]
    fn test_failed_update_stays_open_with_error() {
        let api = FakeApi::<Company>::with(vec![acme()]);
        *api.fail_mutation.borrow_mut() = Some(ApiError::NetworkOrServer("timeout".to_string()));
        let mut form = FormController::<Company>::new();
        form.open_edit(&acme());
        assert_eq!(form.heading(), "Edit Company");

        let err = form.submit(&api).unwrap_err();

        assert!(matches!(err, ApiError::NetworkOrServer(_)));
        assert_eq!(form.state(), FormState::Editing(4));
        assert_eq!(
            form.error(),
            Some("Error occurred while saving the company. Please try again.")
        );
        assert_eq!(form.submit_control(), SubmitControl { enabled: true, label: "Update" });
        assert_eq!(form.draft().name, "Acme");
    }

    #[test]
    fn test_open_edit_by_id_fetches_record() {
        let api = FakeApi::<Company>::with(vec![acme()]);
        let mut form = FormController::<Company>::new();
        form.open_edit_by_id(&api, 4).unwrap();
        assert_eq!(api.get_calls.get(), 1);
        assert_eq!(form.draft().industry, "Tools");

        let mut missing = FormController::<Company>::new();
        assert_eq!(missing.open_edit_by_id(&api, 99), Err(ApiError::NotFound));
        assert!(!missing.is_open());
    }

    #[test]
    fn test_close_resets_draft_and_error() {
        let api = FakeApi::<Company>::with(vec![]);
        let mut form = FormController::<Company>::new();
        form.open_create();
        form.set_field("industry", "Tools".to_string());
        let _ = form.submit(&api);
        assert!(form.error().is_some());

        form.close();
        assert!(form.error().is_none());
        assert_eq!(form.draft().industry, "");
        assert!(!form.is_open());
    }

    #[test]
    fn test_submit_on_closed_form_is_ignored() {
        let api = FakeApi::<Company>::with(vec![]);
        let mut form = FormController::<Company>::new();
        form.set_field("name", "ignored".to_string());
        assert_eq!(form.submit(&api).unwrap(), SubmitOutcome::Ignored);
        assert_eq!(form.draft().name, "");
        assert_eq!(api.mutations(), 0);
    }
}
