//! `view = f(state)`: collections become a [`Table`] model, which is then
//! painted either as HTML markup or as terminal text.
//!
//! Painting is the only place user-supplied strings meet an output format,
//! and both painters neutralize them: HTML escapes `& < > " '`, terminal
//! output drops control characters.

use crate::models::{Company, JobApplication, JobListing, Reminder, parse_timestamp};
use crate::resource::Resource;
use crate::store::{FilterCriteria, ListStore, LoadState};

pub const NOT_AVAILABLE: &str = "N/A";
const EMPTY_CELL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Link { label: String, href: String },
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn or_dash(value: &Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Cell::text(v),
            _ => Cell::text(EMPTY_CELL),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Cell::Text(text) => text,
            Cell::Link { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Edit(i64),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Record {
        id: i64,
        cells: Vec<Cell>,
        actions: [RowAction; 2],
    },
    Placeholder {
        text: String,
        span: usize,
    },
}

impl Row {
    pub fn actions(&self) -> &[RowAction] {
        match self {
            Row::Record { actions, .. } => actions.as_slice(),
            Row::Placeholder { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub kind: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Columns plus the trailing actions column.
    pub fn span(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn record_ids(&self) -> Vec<i64> {
        self.rows
            .iter()
            .filter_map(|row| match row {
                Row::Record { id, .. } => Some(*id),
                Row::Placeholder { .. } => None,
            })
            .collect()
    }
}

/// Companion collections used to resolve foreign keys for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lookups<'a> {
    pub companies: &'a [Company],
    pub applications: &'a [JobApplication],
}

impl<'a> Lookups<'a> {
    pub fn new(companies: &'a [Company], applications: &'a [JobApplication]) -> Self {
        Self {
            companies,
            applications,
        }
    }

    pub fn company(&self, id: Option<i64>) -> Option<&'a Company> {
        let id = id?;
        self.companies.iter().find(|c| c.id == id)
    }

    pub fn application(&self, id: Option<i64>) -> Option<&'a JobApplication> {
        let id = id?;
        self.applications.iter().find(|a| a.id == id)
    }
}

pub trait Tabular: Resource {
    fn columns() -> &'static [&'static str];

    /// Text of the single row shown for an empty collection.
    fn placeholder() -> &'static str;

    fn cells(&self, lookups: &Lookups) -> Vec<Cell>;
}

pub fn render<R: Tabular>(records: &[R], lookups: &Lookups) -> Table {
    if records.is_empty() {
        return placeholder_table::<R>(R::placeholder().to_string());
    }
    let rows = records
        .iter()
        .map(|record| {
            let id = record.id();
            Row::Record {
                id,
                cells: record.cells(lookups),
                actions: [RowAction::Edit(id), RowAction::Delete(id)],
            }
        })
        .collect();
    Table {
        kind: R::PATH,
        columns: R::columns().to_vec(),
        rows,
    }
}

/// A table of `R`'s columns holding one row of `text` across all of them.
fn placeholder_table<R: Tabular>(text: String) -> Table {
    let mut table = Table {
        kind: R::PATH,
        columns: R::columns().to_vec(),
        rows: Vec::new(),
    };
    let span = table.span();
    table.rows.push(Row::Placeholder { text, span });
    table
}

/// Renders the store's filtered view, or an explicit error row when the
/// last load failed.
pub fn render_store<R: Tabular>(store: &ListStore<R>, criteria: &FilterCriteria, lookups: &Lookups) -> Table {
    match store.state() {
        LoadState::Failed(_) => placeholder_table::<R>(format!("Error loading {}. Please try again.", R::PLURAL)),
        LoadState::NotLoaded => placeholder_table::<R>("Loading...".to_string()),
        LoadState::Loaded => render(&store.view(criteria), lookups),
    }
}

// --- Per-kind columns ---

impl Tabular for Company {
    fn columns() -> &'static [&'static str] {
        &["Name", "Industry", "Size", "Contact", "Notes"]
    }

    fn placeholder() -> &'static str {
        "No companies found. Add one to get started."
    }

    fn cells(&self, _lookups: &Lookups) -> Vec<Cell> {
        vec![
            Cell::text(&self.name),
            Cell::or_dash(&self.industry),
            Cell::or_dash(&self.size),
            Cell::or_dash(&self.contact_info),
            Cell::or_dash(&self.notes),
        ]
    }
}

fn file_cell(path: &Option<String>, name: &Option<String>, default_label: &str, missing: &str) -> Cell {
    match path.as_deref().filter(|p| !p.is_empty()) {
        Some(href) => Cell::Link {
            label: name.clone().unwrap_or_else(|| default_label.to_string()),
            href: href.to_string(),
        },
        None => Cell::text(missing),
    }
}

impl Tabular for JobApplication {
    fn columns() -> &'static [&'static str] {
        &["Job Title", "Company", "Applied", "Status", "Notes", "Resume", "Cover Letter"]
    }

    fn placeholder() -> &'static str {
        "No job applications found. Add a new application to get started."
    }

    fn cells(&self, _lookups: &Lookups) -> Vec<Cell> {
        vec![
            Cell::text(&self.job_title),
            Cell::text(&self.company_name),
            Cell::text(format_date(&self.application_date)),
            Cell::text(&self.status),
            Cell::or_dash(&self.notes),
            file_cell(&self.resume_path, &self.resume_name, "Resume", "No resume uploaded"),
            file_cell(
                &self.cover_letter_path,
                &self.cover_letter_name,
                "Cover Letter",
                "No cover letter uploaded",
            ),
        ]
    }
}

impl Tabular for JobListing {
    fn columns() -> &'static [&'static str] {
        &["Title", "Company", "Industry", "Status", "Apply"]
    }

    fn placeholder() -> &'static str {
        "No job listings found. Add a listing to get started."
    }

    fn cells(&self, lookups: &Lookups) -> Vec<Cell> {
        let company = lookups.company(self.company_ref_id());
        let apply = match self.apply_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Cell::Link {
                label: "Apply".to_string(),
                href: url.to_string(),
            },
            None => Cell::text(NOT_AVAILABLE),
        };
        vec![
            Cell::text(&self.title),
            Cell::text(company.map(|c| c.name.as_str()).unwrap_or(NOT_AVAILABLE)),
            Cell::text(
                company
                    .and_then(|c| c.industry.as_deref())
                    .filter(|i| !i.is_empty())
                    .unwrap_or(NOT_AVAILABLE),
            ),
            Cell::text(self.status.as_deref().unwrap_or(NOT_AVAILABLE)),
            apply,
        ]
    }
}

impl Tabular for Reminder {
    fn columns() -> &'static [&'static str] {
        &["When", "Job", "Message"]
    }

    fn placeholder() -> &'static str {
        "No reminders yet. Add a reminder to get started."
    }

    fn cells(&self, lookups: &Lookups) -> Vec<Cell> {
        let job = match lookups.application(self.application_ref_id()) {
            Some(app) => format!("{} @ {}", app.job_title, app.company_name),
            None => NOT_AVAILABLE.to_string(),
        };
        vec![
            Cell::text(format_datetime(&self.reminder_date)),
            Cell::text(job),
            Cell::or_dash(&self.message),
        ]
    }
}

// --- Formatting ---

pub fn format_date(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%b %-d, %Y").to_string(),
        None if value.trim().is_empty() => EMPTY_CELL.to_string(),
        None => value.to_string(),
    }
}

pub fn format_datetime(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%b %-d, %Y %I:%M %p").to_string(),
        None if value.trim().is_empty() => EMPTY_CELL.to_string(),
        None => value.to_string(),
    }
}

// --- HTML painter ---

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn cell_html(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => escape_html(text),
        Cell::Link { label, href } => format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            escape_html(href),
            escape_html(label)
        ),
    }
}

pub fn to_html(table: &Table) -> String {
    let mut html = format!("<table class=\"{}\">\n<thead><tr>", escape_html(table.kind));
    for column in &table.columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("<th>Actions</th></tr></thead>\n<tbody>\n");
    for row in &table.rows {
        match row {
            Row::Placeholder { text, span } => {
                html.push_str(&format!(
                    "<tr><td colspan=\"{}\" class=\"placeholder\">{}</td></tr>\n",
                    span,
                    escape_html(text)
                ));
            }
            Row::Record { id, cells, actions } => {
                html.push_str(&format!("<tr data-id=\"{}\">", id));
                for cell in cells {
                    html.push_str(&format!("<td>{}</td>", cell_html(cell)));
                }
                html.push_str("<td class=\"actions\">");
                for action in actions {
                    let (name, label, id) = match action {
                        RowAction::Edit(id) => ("edit", "Edit", id),
                        RowAction::Delete(id) => ("delete", "Delete", id),
                    };
                    html.push_str(&format!(
                        "<button data-action=\"{}\" data-id=\"{}\">{}</button>",
                        name, id, label
                    ));
                }
                html.push_str("</td></tr>\n");
            }
        }
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

// --- Terminal painter ---

/// Terminal text for a user-supplied value: control characters (escape
/// sequences included) are dropped, whitespace runs become single spaces.
pub fn sanitize_terminal(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Fixed-width text rows for printing: header, rule, then one line per row.
pub fn to_text(table: &Table, width: usize) -> Vec<String> {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
    for row in &table.rows {
        if let Row::Record { cells, .. } = row {
            for (i, cell) in cells.iter().enumerate() {
                let len = sanitize_terminal(cell.label()).chars().count().min(width);
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(len);
                }
            }
        }
    }

    let mut lines = Vec::new();
    let mut header = format!("{:<6}", "ID");
    for (column, w) in table.columns.iter().zip(&widths) {
        header.push_str(&format!(" {:<w$}", column.to_uppercase(), w = *w));
    }
    let rule = "-".repeat(header.chars().count());
    lines.push(header.trim_end().to_string());
    lines.push(rule);

    for row in &table.rows {
        match row {
            Row::Placeholder { text, .. } => lines.push(sanitize_terminal(text)),
            Row::Record { id, cells, .. } => {
                let mut line = format!("{:<6}", id);
                for (cell, w) in cells.iter().zip(&widths) {
                    let text = truncate(&sanitize_terminal(cell.label()), width);
                    line.push_str(&format!(" {:<w$}", text, w = *w));
                }
                lines.push(line.trim_end().to_string());
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeApi;
    use crate::error::ApiError;

    fn company(id: i64, name: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
            industry: Some("Tools".to_string()),
            size: None,
            contact_info: None,
            notes: None,
        }
    }

    #[test]
    fn test_empty_collection_renders_one_placeholder_without_actions() {
        let table = render::<Company>(&[], &Lookups::default());
        assert_eq!(table.rows.len(), 1);
        match &table.rows[0] {
            Row::Placeholder { span, .. } => assert_eq!(*span, 6),
            other => panic!("expected placeholder, got {other:?}"),
        }
        assert!(table.rows[0].actions().is_empty());
        assert!(table.record_ids().is_empty());

        let reminders = render::<Reminder>(&[], &Lookups::default());
        assert_eq!(reminders.rows.len(), 1);
        assert!(matches!(reminders.rows[0], Row::Placeholder { span: 4, .. }));
    }

    #[test]
    fn test_rows_bind_actions_to_record_ids() {
        let table = render(&[company(7, "Acme"), company(3, "Globex")], &Lookups::default());
        assert_eq!(table.rows[0].actions(), &[RowAction::Edit(7), RowAction::Delete(7)]);
        assert_eq!(table.rows[1].actions(), &[RowAction::Edit(3), RowAction::Delete(3)]);
        assert_eq!(table.record_ids(), vec![7, 3]);
    }

    #[test]
    fn test_markup_in_fields_renders_as_literal_text() {
        let hostile = company(1, "<script>alert('x')</script> & \"co\"");
        let html = to_html(&render(&[hostile], &Lookups::default()));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;co&quot;"));
    }

    #[test]
    fn test_link_href_is_escaped() {
        let listing = JobListing {
            id: 1,
            title: "SRE".to_string(),
            description: None,
            apply_url: Some("https://x.test/\"onmouseover=\"alert(1)".to_string()),
            status: Some("open".to_string()),
            company_id: None,
            company: None,
        };
        let html = to_html(&render(&[listing], &Lookups::default()));
        assert!(html.contains("href=\"https://x.test/&quot;onmouseover=&quot;alert(1)\""));
    }

    #[test]
    fn test_foreign_keys_resolve_or_fall_back() {
        let companies = vec![company(2, "Acme")];
        let listing = |company_id| JobListing {
            id: 1,
            title: "SRE".to_string(),
            description: None,
            apply_url: None,
            status: None,
            company_id,
            company: None,
        };
        let lookups = Lookups::new(&companies, &[]);

        let known = listing(Some(2)).cells(&lookups);
        assert_eq!(known[1].label(), "Acme");
        assert_eq!(known[2].label(), "Tools");

        let unknown = listing(Some(9)).cells(&lookups);
        assert_eq!(unknown[1].label(), NOT_AVAILABLE);
        assert_eq!(unknown[4].label(), NOT_AVAILABLE);

        let reminder = Reminder {
            id: 1,
            job_application_id: Some(5),
            reminder_date: "2025-09-09T14:35".to_string(),
            message: None,
            job_application: None,
        };
        let cells = reminder.cells(&Lookups::default());
        assert_eq!(cells[0].label(), "Sep 9, 2025 02:35 PM");
        assert_eq!(cells[1].label(), NOT_AVAILABLE);
    }

    #[test]
    fn test_render_store_distinguishes_failure_from_empty() {
        let api = FakeApi::<Company>::with(vec![]);
        let mut store = ListStore::new();
        store.refresh(&api).unwrap();
        let empty = render_store(&store, &FilterCriteria::default(), &Lookups::default());
        assert_eq!(empty.rows[0], Row::Placeholder {
            text: Company::placeholder().to_string(),
            span: 6,
        });

        *api.fail_list.borrow_mut() = Some(ApiError::NetworkOrServer("down".to_string()));
        let _ = store.refresh(&api);
        let failed = render_store(&store, &FilterCriteria::default(), &Lookups::default());
        assert_eq!(failed.rows[0], Row::Placeholder {
            text: "Error loading companies. Please try again.".to_string(),
            span: 6,
        });
    }

    #[test]
    fn test_terminal_output_drops_escape_sequences() {
        assert_eq!(sanitize_terminal("Acme\x1b[2J\nInc\t"), "Acme[2J Inc");
        let lines = to_text(&render(&[company(1, "Ac\x1bme")], &Lookups::default()), 30);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("1      Acme"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }
}
