use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    // whatever else the server sends is kept so the stored copy round-trips
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub contact_info: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: i64,
    pub company_name: String,
    pub job_title: String,
    #[serde(default)]
    pub application_date: String,
    pub status: String, // "Applied", "Interviewed", "Offered", "Rejected", "Accepted"
    pub notes: Option<String>,
    pub resume_path: Option<String>,
    pub resume_name: Option<String>,
    pub cover_letter_path: Option<String>,
    pub cover_letter_name: Option<String>,
}

/// Company as embedded in a listing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub apply_url: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "company_id")]
    pub company_id: Option<i64>,
    #[serde(rename = "Company")]
    pub company: Option<CompanyRef>,
}

impl JobListing {
    /// Foreign key to the owning company, preferring the flat column.
    pub fn company_ref_id(&self) -> Option<i64> {
        self.company_id
            .or_else(|| self.company.as_ref().and_then(|c| c.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRef {
    pub id: Option<i64>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: i64,
    #[serde(alias = "job_application_id")]
    pub job_application_id: Option<i64>,
    #[serde(default)]
    pub reminder_date: String,
    pub message: Option<String>,
    #[serde(rename = "JobApplication")]
    pub job_application: Option<ApplicationRef>,
}

impl Reminder {
    pub fn application_ref_id(&self) -> Option<i64> {
        self.job_application_id
            .or_else(|| self.job_application.as_ref().and_then(|a| a.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub career_goals: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

// --- Timestamp helpers ---

/// Parses the timestamp shapes the API emits: RFC 3339 (converted to local
/// time), `YYYY-MM-DDTHH:MM[:SS]` taken as local wall time, or a bare date.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date portion of an ISO timestamp, as a date input expects it.
pub fn date_part(value: &str) -> String {
    value.split('T').next().unwrap_or("").trim().to_string()
}
