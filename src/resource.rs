//! Resource kinds served by the API and the editable drafts that go with
//! them.
//!
//! Every kind pairs a record type (what `list()`/`get()` return) with a
//! draft type (what the form edits and `create()`/`update()` send). Drafts
//! are addressed by field name so that forms and the command line can treat
//! all kinds alike.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::{Company, JobApplication, JobListing, Reminder, date_part};

pub const APPLICATION_STATUSES: &[&str] =
    &["Applied", "Interviewed", "Offered", "Rejected", "Accepted"];
pub const LISTING_STATUSES: &[&str] = &["open", "closed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Multiline,
    Date,
    Time,
    Choice(&'static [&'static str]),
    /// Identifier of a record of another kind.
    Reference,
    /// Local path of a file to upload.
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn field(name: &'static str, label: &'static str, required: bool, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, label, required, kind }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub field: &'static str,
    pub path: PathBuf,
}

/// Request body for create/update. Sent as JSON unless attachments are
/// present, in which case it goes out as multipart form data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: Map<String, Value>,
    pub attachments: Vec<Attachment>,
}

impl Payload {
    pub fn is_multipart(&self) -> bool {
        !self.attachments.is_empty()
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.fields
            .insert(name.to_string(), Value::String(value.trim().to_string()));
        self
    }

    /// Ids travel as numbers when they look like numbers.
    fn reference(mut self, name: &str, value: &str) -> Self {
        let value = value.trim();
        let json = match value.parse::<i64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::String(value.to_string()),
        };
        self.fields.insert(name.to_string(), json);
        self
    }

    fn attach(mut self, field: &'static str, path: &Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.attachments.push(Attachment {
                field,
                path: path.clone(),
            });
        }
        self
    }
}

pub trait Draft: Clone + fmt::Debug {
    fn fields() -> &'static [FieldSpec];

    /// Empty defaults used when a form opens for create.
    fn blank() -> Self;

    fn get(&self, name: &str) -> String;

    fn set(&mut self, name: &str, value: String);

    fn payload(&self) -> Payload;

    fn missing_required(&self) -> Vec<&'static str> {
        Self::fields()
            .iter()
            .filter(|f| f.required && self.get(f.name).trim().is_empty())
            .map(|f| f.label)
            .collect()
    }

    fn required_message(_missing: &[&'static str]) -> String {
        "Please fill in all required fields.".to_string()
    }
}

pub trait Resource: DeserializeOwned + Clone + fmt::Debug {
    type Draft: Draft;

    /// Collection path under `/api/`.
    const PATH: &'static str;
    /// Capitalized singular for messages ("Company updated successfully.").
    const TITLE: &'static str;
    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    const STATUSES: &'static [&'static str] = &[];

    fn id(&self) -> i64;

    fn search_fields(&self) -> Vec<&str>;

    fn status(&self) -> Option<&str> {
        None
    }

    fn to_draft(&self) -> Self::Draft;
}

// --- Companies ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyDraft {
    pub name: String,
    pub industry: String,
    pub size: String,
    pub contact_info: String,
    pub notes: String,
}

const COMPANY_FIELDS: &[FieldSpec] = &[
    field("name", "Name", true, FieldKind::Text),
    field("industry", "Industry", false, FieldKind::Text),
    field("size", "Size", false, FieldKind::Text),
    field("contactInfo", "Contact Info", false, FieldKind::Text),
    field("notes", "Notes", false, FieldKind::Multiline),
];

impl Draft for CompanyDraft {
    fn fields() -> &'static [FieldSpec] {
        COMPANY_FIELDS
    }

    fn blank() -> Self {
        Self::default()
    }

    fn get(&self, name: &str) -> String {
        match name {
            "name" => self.name.clone(),
            "industry" => self.industry.clone(),
            "size" => self.size.clone(),
            "contactInfo" => self.contact_info.clone(),
            "notes" => self.notes.clone(),
            _ => String::new(),
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "name" => self.name = value,
            "industry" => self.industry = value,
            "size" => self.size = value,
            "contactInfo" => self.contact_info = value,
            "notes" => self.notes = value,
            _ => {}
        }
    }

    fn payload(&self) -> Payload {
        Payload::default()
            .text("name", &self.name)
            .text("industry", &self.industry)
            .text("size", &self.size)
            .text("contactInfo", &self.contact_info)
            .text("notes", &self.notes)
    }

    fn required_message(_missing: &[&'static str]) -> String {
        "Company name is required.".to_string()
    }
}

impl Resource for Company {
    type Draft = CompanyDraft;

    const PATH: &'static str = "companies";
    const TITLE: &'static str = "Company";
    const SINGULAR: &'static str = "company";
    const PLURAL: &'static str = "companies";

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.industry.as_deref().unwrap_or("")]
    }

    fn to_draft(&self) -> CompanyDraft {
        CompanyDraft {
            name: self.name.clone(),
            industry: self.industry.clone().unwrap_or_default(),
            size: self.size.clone().unwrap_or_default(),
            contact_info: self.contact_info.clone().unwrap_or_default(),
            notes: self.notes.clone().unwrap_or_default(),
        }
    }
}

// --- Job applications ---

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDraft {
    pub company_name: String,
    pub job_title: String,
    pub application_date: String,
    pub status: String,
    pub notes: String,
    pub resume: Option<PathBuf>,
    pub cover_letter: Option<PathBuf>,
}

const APPLICATION_FIELDS: &[FieldSpec] = &[
    field("companyName", "Company Name", true, FieldKind::Text),
    field("jobTitle", "Job Title", true, FieldKind::Text),
    field("applicationDate", "Application Date", true, FieldKind::Date),
    field("status", "Status", true, FieldKind::Choice(APPLICATION_STATUSES)),
    field("notes", "Notes", false, FieldKind::Multiline),
    field("resume", "Resume", false, FieldKind::File),
    field("coverLetter", "Cover Letter", false, FieldKind::File),
];

fn path_or_none(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

impl Draft for ApplicationDraft {
    fn fields() -> &'static [FieldSpec] {
        APPLICATION_FIELDS
    }

    fn blank() -> Self {
        Self {
            company_name: String::new(),
            job_title: String::new(),
            application_date: String::new(),
            status: APPLICATION_STATUSES[0].to_string(),
            notes: String::new(),
            resume: None,
            cover_letter: None,
        }
    }

    fn get(&self, name: &str) -> String {
        match name {
            "companyName" => self.company_name.clone(),
            "jobTitle" => self.job_title.clone(),
            "applicationDate" => self.application_date.clone(),
            "status" => self.status.clone(),
            "notes" => self.notes.clone(),
            "resume" => self
                .resume
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "coverLetter" => self
                .cover_letter
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "companyName" => self.company_name = value,
            "jobTitle" => self.job_title = value,
            "applicationDate" => self.application_date = value,
            "status" => self.status = value,
            "notes" => self.notes = value,
            "resume" => self.resume = path_or_none(value),
            "coverLetter" => self.cover_letter = path_or_none(value),
            _ => {}
        }
    }

    fn payload(&self) -> Payload {
        Payload::default()
            .text("companyName", &self.company_name)
            .text("jobTitle", &self.job_title)
            .text("applicationDate", &self.application_date)
            .text("status", &self.status)
            .text("notes", &self.notes)
            .attach("resume", &self.resume)
            .attach("coverLetter", &self.cover_letter)
    }
}

impl Resource for JobApplication {
    type Draft = ApplicationDraft;

    const PATH: &'static str = "job-applications";
    const TITLE: &'static str = "Application";
    const SINGULAR: &'static str = "application";
    const PLURAL: &'static str = "job applications";
    const STATUSES: &'static [&'static str] = APPLICATION_STATUSES;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.company_name.as_str(), self.job_title.as_str()]
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    // Attachments are never prefilled: the stored paths are server-side.
    fn to_draft(&self) -> ApplicationDraft {
        ApplicationDraft {
            company_name: self.company_name.clone(),
            job_title: self.job_title.clone(),
            application_date: date_part(&self.application_date),
            status: self.status.clone(),
            notes: self.notes.clone().unwrap_or_default(),
            resume: None,
            cover_letter: None,
        }
    }
}

// --- Job listings ---

#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub apply_url: String,
    pub status: String,
    pub company_id: String,
}

const LISTING_FIELDS: &[FieldSpec] = &[
    field("title", "Title", true, FieldKind::Text),
    field("description", "Description", true, FieldKind::Multiline),
    field("applyUrl", "Apply URL", true, FieldKind::Text),
    field("status", "Status", true, FieldKind::Choice(LISTING_STATUSES)),
    field("companyId", "Company", true, FieldKind::Reference),
];

impl Draft for ListingDraft {
    fn fields() -> &'static [FieldSpec] {
        LISTING_FIELDS
    }

    fn blank() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            apply_url: String::new(),
            status: LISTING_STATUSES[0].to_string(),
            company_id: String::new(),
        }
    }

    fn get(&self, name: &str) -> String {
        match name {
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "applyUrl" => self.apply_url.clone(),
            "status" => self.status.clone(),
            "companyId" => self.company_id.clone(),
            _ => String::new(),
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "description" => self.description = value,
            "applyUrl" => self.apply_url = value,
            "status" => self.status = value,
            "companyId" => self.company_id = value,
            _ => {}
        }
    }

    fn payload(&self) -> Payload {
        Payload::default()
            .text("title", &self.title)
            .text("description", &self.description)
            .text("applyUrl", &self.apply_url)
            .text("status", &self.status)
            .reference("companyId", &self.company_id)
    }
}

impl Resource for JobListing {
    type Draft = ListingDraft;

    const PATH: &'static str = "job-listings";
    const TITLE: &'static str = "Job listing";
    const SINGULAR: &'static str = "job listing";
    const PLURAL: &'static str = "job listings";
    const STATUSES: &'static [&'static str] = LISTING_STATUSES;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_deref().unwrap_or("")]
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn to_draft(&self) -> ListingDraft {
        ListingDraft {
            title: self.title.clone(),
            description: self.description.clone().unwrap_or_default(),
            apply_url: self.apply_url.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            company_id: self
                .company_ref_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

// --- Reminders ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderDraft {
    pub job_application_id: String,
    pub reminder_date: String,
    pub reminder_time: String,
    pub message: String,
}

const REMINDER_FIELDS: &[FieldSpec] = &[
    field("jobApplicationId", "Job Application", true, FieldKind::Reference),
    field("reminderDate", "Date", true, FieldKind::Date),
    field("reminderTime", "Time", true, FieldKind::Time),
    field("message", "Message", false, FieldKind::Multiline),
];

impl ReminderDraft {
    /// Date and time combined as naive local wall time; no zone is attached.
    pub fn combined_datetime(&self) -> String {
        let date = self.reminder_date.trim();
        let time = self.reminder_time.trim();
        if date.is_empty() || time.is_empty() {
            String::new()
        } else {
            format!("{}T{}", date, time)
        }
    }
}

impl Draft for ReminderDraft {
    fn fields() -> &'static [FieldSpec] {
        REMINDER_FIELDS
    }

    fn blank() -> Self {
        let now = Local::now();
        Self {
            job_application_id: String::new(),
            reminder_date: now.format("%Y-%m-%d").to_string(),
            reminder_time: now.format("%H:%M").to_string(),
            message: String::new(),
        }
    }

    fn get(&self, name: &str) -> String {
        match name {
            "jobApplicationId" => self.job_application_id.clone(),
            "reminderDate" => self.reminder_date.clone(),
            "reminderTime" => self.reminder_time.clone(),
            "message" => self.message.clone(),
            _ => String::new(),
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "jobApplicationId" => self.job_application_id = value,
            "reminderDate" => self.reminder_date = value,
            "reminderTime" => self.reminder_time = value,
            "message" => self.message = value,
            _ => {}
        }
    }

    fn payload(&self) -> Payload {
        let mut payload = Payload::default()
            .reference("jobApplicationId", &self.job_application_id)
            .text("message", &self.message);
        payload
            .fields
            .insert("reminderDate".to_string(), Value::String(self.combined_datetime()));
        payload
    }
}

impl Resource for Reminder {
    type Draft = ReminderDraft;

    const PATH: &'static str = "reminders";
    const TITLE: &'static str = "Reminder";
    const SINGULAR: &'static str = "reminder";
    const PLURAL: &'static str = "reminders";

    fn id(&self) -> i64 {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.message.as_deref().unwrap_or("")]
    }

    // Split on the literal string, without converting zones.
    fn to_draft(&self) -> ReminderDraft {
        ReminderDraft {
            job_application_id: self
                .application_ref_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            reminder_date: self.reminder_date.get(0..10).unwrap_or("").to_string(),
            reminder_time: self.reminder_date.get(11..16).unwrap_or("").to_string(),
            message: self.message.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_draft_requires_name_only() {
        let mut draft = CompanyDraft::blank();
        assert_eq!(draft.missing_required(), vec!["Name"]);
        draft.set("name", "   ".to_string());
        assert_eq!(draft.missing_required(), vec!["Name"]);
        draft.set("name", "Acme".to_string());
        assert!(draft.missing_required().is_empty());
    }

    #[test]
    fn test_application_required_fields() {
        let draft = ApplicationDraft::blank();
        assert_eq!(
            draft.missing_required(),
            vec!["Company Name", "Job Title", "Application Date"]
        );
    }

    #[test]
    fn test_application_payload_is_json_without_attachments() {
        let mut draft = ApplicationDraft::blank();
        draft.set("companyName", " Acme ".to_string());
        draft.set("jobTitle", "SRE".to_string());
        let payload = draft.payload();
        assert!(!payload.is_multipart());
        assert_eq!(payload.fields["companyName"], "Acme");
        assert_eq!(payload.fields["status"], "Applied");
    }

    #[test]
    fn test_application_payload_is_multipart_with_attachments() {
        let mut draft = ApplicationDraft::blank();
        draft.set("resume", "/tmp/cv.pdf".to_string());
        draft.set("coverLetter", "".to_string());
        let payload = draft.payload();
        assert!(payload.is_multipart());
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].field, "resume");
        assert_eq!(payload.attachments[0].path, PathBuf::from("/tmp/cv.pdf"));
    }

    #[test]
    fn test_listing_payload_sends_numeric_company_id() {
        let mut draft = ListingDraft::blank();
        draft.set("companyId", "12".to_string());
        assert_eq!(draft.payload().fields["companyId"], Value::from(12));
    }

    #[test]
    fn test_reminder_combines_date_and_time() {
        let mut draft = ReminderDraft::default();
        draft.set("reminderDate", "2025-09-09".to_string());
        draft.set("reminderTime", "14:35".to_string());
        draft.set("jobApplicationId", "3".to_string());
        let payload = draft.payload();
        assert_eq!(payload.fields["reminderDate"], "2025-09-09T14:35");
        assert_eq!(payload.fields["jobApplicationId"], Value::from(3));

        draft.set("reminderTime", String::new());
        assert_eq!(draft.combined_datetime(), "");
    }

    #[test]
    fn test_reminder_to_draft_splits_stored_datetime() {
        let reminder = Reminder {
            id: 1,
            job_application_id: Some(7),
            reminder_date: "2025-09-09T14:35:00.000Z".to_string(),
            message: Some("Follow up".to_string()),
            job_application: None,
        };
        let draft = reminder.to_draft();
        assert_eq!(draft.reminder_date, "2025-09-09");
        assert_eq!(draft.reminder_time, "14:35");
        assert_eq!(draft.job_application_id, "7");
    }

    #[test]
    fn test_application_to_draft_trims_date() {
        let app = JobApplication {
            id: 1,
            company_name: "Acme".to_string(),
            job_title: "SRE".to_string(),
            application_date: "2025-01-02T00:00:00.000Z".to_string(),
            status: "Applied".to_string(),
            notes: None,
            resume_path: Some("/uploads/cv.pdf".to_string()),
            resume_name: None,
            cover_letter_path: None,
            cover_letter_name: None,
        };
        let draft = app.to_draft();
        assert_eq!(draft.application_date, "2025-01-02");
        assert_eq!(draft.resume, None);
    }
}
