use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{
        BarChart, Block, Borders, Cell as TableCell, Clear, Paragraph, Row as TableRow, Table as TableWidget,
        TableState, Tabs, Wrap,
    },
};
use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::api::{ApiClient, HttpResource};
use crate::auth::{self, LoginForm, ProfileEditor, REGISTER_REDIRECT, RegisterForm};
use crate::config::Config;
use crate::controller::{ListController, ListPage};
use crate::dashboard::{Dashboard, QuickAdd, RECENT_LIMIT};
use crate::error::ApiError;
use crate::models::{Company, JobApplication, JobListing, Reminder, Session};
use crate::notify::{BannerKind, Notifications};
use crate::render::{self, Cell, Lookups, Row as ViewRow};
use crate::resource::FieldKind;
use crate::session::{Navigation, Page, SessionGuard};

const TICK: Duration = Duration::from_millis(250);
const MAIN_PAGES: [Page; 6] = [
    Page::Dashboard,
    Page::Companies,
    Page::Applications,
    Page::Listings,
    Page::Reminders,
    Page::Profile,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Search,
    Form { field: usize },
    ConfirmDelete(i64),
    ConfirmLogout,
    ProfileEdit { field: usize },
}

#[derive(Debug, Default)]
struct AuthScreen {
    registering: bool,
    field: usize,
    login: LoginForm,
    register: RegisterForm,
}

impl AuthScreen {
    fn field_count(&self) -> usize {
        if self.registering { 5 } else { 2 }
    }

    fn current_mut(&mut self) -> Option<&mut String> {
        match (self.registering, self.field) {
            (false, 0) => Some(&mut self.login.email),
            (false, 1) => Some(&mut self.login.password),
            (true, 0) => Some(&mut self.register.name),
            (true, 1) => Some(&mut self.register.email),
            (true, 2) => Some(&mut self.register.password),
            (true, 3) => Some(&mut self.register.confirm_password),
            _ => None,
        }
    }

    fn switch(&mut self, registering: bool) {
        self.registering = registering;
        self.field = 0;
    }
}

/// Everything that needs a signed-in session.
struct Workspace {
    session: Session,
    api: ApiClient,
    companies: ListController<Company, HttpResource<Company>>,
    applications: ListController<JobApplication, HttpResource<JobApplication>>,
    listings: ListController<JobListing, HttpResource<JobListing>>,
    reminders: ListController<Reminder, HttpResource<Reminder>>,
    quick_add: QuickAdd,
}

impl Workspace {
    fn new(client: &ApiClient, session: Session) -> Self {
        let api = client.clone().with_token(&session.token);
        Self {
            companies: ListController::new(api.resource()),
            applications: ListController::new(api.resource()),
            listings: ListController::new(api.resource()),
            reminders: ListController::new(api.resource()),
            quick_add: QuickAdd::default(),
            api,
            session,
        }
    }

    fn list(&self, page: Page) -> Option<&dyn ListPage> {
        match page {
            Page::Companies => Some(&self.companies),
            Page::Applications => Some(&self.applications),
            Page::Listings => Some(&self.listings),
            Page::Reminders => Some(&self.reminders),
            _ => None,
        }
    }

    fn list_mut(&mut self, page: Page) -> Option<&mut dyn ListPage> {
        match page {
            Page::Companies => Some(&mut self.companies),
            Page::Applications => Some(&mut self.applications),
            Page::Listings => Some(&mut self.listings),
            Page::Reminders => Some(&mut self.reminders),
            _ => None,
        }
    }

    fn form(&self, page: Page) -> Option<&dyn ListPage> {
        match (page, self.quick_add) {
            (Page::Dashboard, QuickAdd::Application) => Some(&self.applications),
            (Page::Dashboard, QuickAdd::Company) => Some(&self.companies),
            (other, _) => self.list(other),
        }
    }

    fn form_mut(&mut self, page: Page) -> Option<&mut dyn ListPage> {
        match (page, self.quick_add) {
            (Page::Dashboard, QuickAdd::Application) => Some(&mut self.applications),
            (Page::Dashboard, QuickAdd::Company) => Some(&mut self.companies),
            (other, _) => self.list_mut(other),
        }
    }

    /// Opens the dashboard's add form for `kind`.
    fn open_quick_add(&mut self, kind: QuickAdd) {
        self.quick_add = kind;
        if let Some(form) = self.form_mut(Page::Dashboard) {
            form.open_create();
        }
    }

    fn lookups(&self) -> Lookups<'_> {
        Lookups::new(self.companies.records(), self.applications.records())
    }

    /// Selectable targets for a reference field, as `(id, label)`.
    fn reference_options(&self, field: &str) -> Vec<(i64, String)> {
        match field {
            "companyId" => self
                .companies
                .records()
                .iter()
                .map(|c| (c.id, c.name.clone()))
                .collect(),
            "jobApplicationId" => self
                .applications
                .records()
                .iter()
                .map(|a| (a.id, format!("{} @ {}", a.job_title, a.company_name)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

struct App {
    config: Config,
    guard: SessionGuard,
    client: ApiClient,
    workspace: Option<Workspace>,
    page: Page,
    mode: Mode,
    notes: Notifications,
    pending: Option<(Page, Instant)>,
    auth: AuthScreen,
    dashboard: Dashboard,
    profile: ProfileEditor,
    selected: usize,
    pending_width: u16,
    quit: bool,
}

impl App {
    fn new(config: Config, guard: SessionGuard) -> Result<Self> {
        let client = ApiClient::new(&config.api_url)?;
        Ok(Self {
            notes: Notifications::new(config.banner_ttl),
            dashboard: Dashboard::new(config.refresh_interval),
            config,
            guard,
            client,
            workspace: None,
            page: Page::Login,
            mode: Mode::Normal,
            pending: None,
            auth: AuthScreen::default(),
            profile: ProfileEditor::new(),
            selected: 0,
            pending_width: 0,
            quit: false,
        })
    }

    fn navigate(&mut self, nav: Navigation) {
        if nav.after.is_zero() {
            self.pending = None;
            self.go(nav.to);
        } else {
            self.pending = Some((nav.to, nav.due_at(Instant::now())));
        }
    }

    fn go(&mut self, to: Page) {
        self.mode = Mode::Normal;
        self.selected = 0;
        self.dashboard.focus_lost();

        if to == Page::Login {
            self.workspace = None;
            self.page = Page::Login;
            self.auth.login.password.clear();
            self.auth.switch(false);
            return;
        }
        if self.workspace.is_none() {
            match self.guard.require() {
                Ok(session) => self.workspace = Some(Workspace::new(&self.client, session)),
                Err(nav) => return self.go(nav.to),
            }
        }
        info!(page = to.title(), "navigate");
        self.page = to;
        self.load_page();
        if self.page == Page::Dashboard {
            self.dashboard.focus_gained(Instant::now());
        }
    }

    fn load_page(&mut self) {
        let page = self.page;
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        let notes = &mut self.notes;
        let result = match page {
            Page::Dashboard => {
                let loaded = ws.applications.load(notes);
                self.dashboard.update(ws.applications.records());
                loaded
            }
            Page::Companies => ws.companies.load(notes),
            Page::Applications => ws.applications.load(notes),
            Page::Listings => {
                let companies = ws.companies.load(notes);
                ws.listings.load(notes).and(companies)
            }
            Page::Reminders => {
                let applications = ws.applications.load(notes);
                ws.reminders.load(notes).and(applications)
            }
            Page::Profile => self.profile.load(&ws.api, notes),
            Page::Login => Ok(()),
        };
        self.check(result);
    }

    /// Applies the session expiry policy to an `Unauthorized` result. Other
    /// failures have already been reported by the operation itself.
    fn check<T>(&mut self, result: Result<T, ApiError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_unauthorized() => {
                let nav = self.guard.expire(&mut self.notes);
                self.mode = Mode::Normal;
                self.navigate(nav);
                None
            }
            Err(_) => None,
        }
    }

    fn tick(&mut self, now: Instant) {
        self.notes.prune(now);
        if let Some((to, due)) = self.pending {
            if now >= due {
                self.pending = None;
                self.go(to);
            }
        }
        if self.page == Page::Dashboard && self.dashboard.refresh.due(now) {
            info!("dashboard auto-refresh");
            self.load_page();
        }
        if self.dashboard.resize.ready(now) {
            self.dashboard.chart_width = self.pending_width;
        }
    }

    fn on_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key(key),
            Event::FocusLost => self.dashboard.focus_lost(),
            Event::FocusGained => {
                if self.page == Page::Dashboard {
                    self.dashboard.focus_gained(now);
                }
            }
            Event::Resize(width, _) => {
                self.pending_width = width;
                self.dashboard.resize.trigger(now);
            }
            _ => {}
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        if self.page == Page::Login {
            self.on_auth_key(key);
            return;
        }
        match self.mode {
            Mode::Normal => self.on_normal_key(key),
            Mode::Search => self.on_search_key(key),
            Mode::Form { field } => self.on_form_key(key, field),
            Mode::ConfirmDelete(id) => self.on_confirm_delete(key, id),
            Mode::ConfirmLogout => self.on_confirm_logout(key),
            Mode::ProfileEdit { field } => self.on_profile_edit_key(key, field),
        }
    }

    // --- Login / register ---

    fn on_auth_key(&mut self, key: KeyEvent) {
        let count = self.auth.field_count();
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::F(2) => {
                let registering = !self.auth.registering;
                self.auth.switch(registering);
                self.notes.clear();
            }
            KeyCode::Tab | KeyCode::Down => self.auth.field = (self.auth.field + 1) % count,
            KeyCode::BackTab | KeyCode::Up => self.auth.field = (self.auth.field + count - 1) % count,
            KeyCode::Enter => self.submit_auth(),
            KeyCode::Char(' ') if self.auth.registering && self.auth.field == 4 => {
                self.auth.register.agree_terms = !self.auth.register.agree_terms;
            }
            KeyCode::Char(c) => {
                if let Some(value) = self.auth.current_mut() {
                    value.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(value) = self.auth.current_mut() {
                    value.pop();
                }
            }
            _ => {}
        }
    }

    fn submit_auth(&mut self) {
        self.notes.clear();
        if self.auth.registering {
            if let Some(registered) =
                auth::register(&self.client, &self.auth.register, REGISTER_REDIRECT, &mut self.notes)
            {
                self.auth.login.email = registered.email;
                self.auth.register = RegisterForm::default();
                self.navigate(registered.navigation);
            }
        } else if let Some(nav) = auth::login(
            &self.client,
            &self.guard,
            &self.auth.login,
            self.config.login_delay,
            &mut self.notes,
        ) {
            self.auth.login.password.clear();
            self.navigate(nav);
        }
    }

    // --- Signed-in pages ---

    fn on_normal_key(&mut self, key: KeyEvent) {
        let current = MAIN_PAGES.iter().position(|p| *p == self.page).unwrap_or(0);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Char(c @ '1'..='6') => self.go(MAIN_PAGES[c as usize - '1' as usize]),
            KeyCode::Tab => self.go(MAIN_PAGES[(current + 1) % MAIN_PAGES.len()]),
            KeyCode::BackTab => self.go(MAIN_PAGES[(current + MAIN_PAGES.len() - 1) % MAIN_PAGES.len()]),
            KeyCode::Char('L') => self.mode = Mode::ConfirmLogout,
            KeyCode::Char('r') => self.load_page(),
            _ => match self.page {
                Page::Dashboard => {
                    let kind = match key.code {
                        KeyCode::Char('a') => QuickAdd::Application,
                        KeyCode::Char('c') => QuickAdd::Company,
                        _ => return,
                    };
                    if let Some(ws) = self.workspace.as_mut() {
                        ws.open_quick_add(kind);
                        self.mode = Mode::Form { field: 0 };
                    }
                }
                Page::Profile => {
                    if key.code == KeyCode::Char('e') && self.profile.profile().is_some() {
                        self.profile.enter_edit();
                        self.mode = Mode::ProfileEdit { field: 0 };
                    }
                }
                _ => self.on_list_key(key),
            },
        }
    }

    fn visible_ids(&self) -> Vec<i64> {
        self.workspace
            .as_ref()
            .and_then(|ws| ws.list(self.page).map(|list| list.table(&ws.lookups()).record_ids()))
            .unwrap_or_default()
    }

    fn on_list_key(&mut self, key: KeyEvent) {
        let page = self.page;
        let ids = self.visible_ids();
        let Some(list) = self.workspace.as_mut().and_then(|ws| ws.list_mut(page)) else {
            return;
        };
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < ids.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('s') => {
                if !list.statuses().is_empty() {
                    let mut options = vec![""];
                    options.extend_from_slice(list.statuses());
                    let current = list.criteria().status.clone();
                    if let Some(next) = cycle(&options, &current, true) {
                        list.set_status(next);
                        self.selected = 0;
                    }
                }
            }
            KeyCode::Char('a') => {
                list.open_create();
                self.mode = Mode::Form { field: 0 };
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(&id) = ids.get(self.selected) {
                    let result = list.open_edit(id, &mut self.notes);
                    if self.check(result).is_some() {
                        self.mode = Mode::Form { field: 0 };
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(&id) = ids.get(self.selected) {
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            _ => {}
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        let page = self.page;
        let Some(list) = self.workspace.as_mut().and_then(|ws| ws.list_mut(page)) else {
            self.mode = Mode::Normal;
            return;
        };
        let mut term = list.criteria().search_term.clone();
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.mode = Mode::Normal;
                return;
            }
            KeyCode::Backspace => {
                term.pop();
            }
            KeyCode::Char(c) => term.push(c),
            _ => return,
        }
        list.set_search(&term);
        self.selected = 0;
    }

    fn on_form_key(&mut self, key: KeyEvent, field: usize) {
        let page = self.page;
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        let Some(fields) = ws.form(page).map(|form| form.form_fields()) else {
            return;
        };
        let Some(spec) = fields.get(field).copied() else {
            return;
        };
        let options: Vec<String> = match spec.kind {
            FieldKind::Choice(choices) => choices.iter().map(|c| c.to_string()).collect(),
            FieldKind::Reference => ws
                .reference_options(spec.name)
                .into_iter()
                .map(|(id, _)| id.to_string())
                .collect(),
            _ => Vec::new(),
        };
        let Some(form) = ws.form_mut(page) else {
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                form.close_form();
                self.mode = Mode::Normal;
            }
            KeyCode::Enter => self.submit_form(),
            KeyCode::Char('s') if ctrl => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => self.mode = Mode::Form { field: (field + 1) % fields.len() },
            KeyCode::BackTab | KeyCode::Up => {
                self.mode = Mode::Form {
                    field: (field + fields.len() - 1) % fields.len(),
                }
            }
            KeyCode::Left | KeyCode::Right if !options.is_empty() => {
                let options: Vec<&str> = options.iter().map(String::as_str).collect();
                let current = form.form_value(spec.name);
                if let Some(next) = cycle(&options, &current, key.code == KeyCode::Right) {
                    form.set_form_value(spec.name, next.to_string());
                }
            }
            KeyCode::Backspace => {
                let mut value = form.form_value(spec.name);
                value.pop();
                form.set_form_value(spec.name, value);
            }
            KeyCode::Char(c) if !matches!(spec.kind, FieldKind::Choice(_)) => {
                let mut value = form.form_value(spec.name);
                value.push(c);
                form.set_form_value(spec.name, value);
            }
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let page = self.page;
        let Some(ws) = self.workspace.as_mut() else {
            return;
        };
        let Some(form) = ws.form_mut(page) else {
            return;
        };
        let kind = form.kind();
        let result = form.submit(&mut self.notes);
        let closed = !form.form_open();
        info!(kind, closed, "form submitted");
        if closed {
            self.mode = Mode::Normal;
            if page == Page::Dashboard {
                self.dashboard.update(ws.applications.records());
            }
        }
        self.check(result);
    }

    fn on_confirm_delete(&mut self, key: KeyEvent, id: i64) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.mode = Mode::Normal;
                let page = self.page;
                let Some(list) = self.workspace.as_mut().and_then(|ws| ws.list_mut(page)) else {
                    return;
                };
                let result = list.delete_confirmed(id, &mut self.notes);
                if self.check(result).is_some() {
                    self.selected = self.selected.saturating_sub(1);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.mode = Mode::Normal,
            _ => {}
        }
    }

    fn on_confirm_logout(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => match self.guard.logout() {
                Ok(nav) => {
                    self.notes.clear();
                    self.navigate(nav);
                }
                Err(e) => {
                    warn!("logout failed: {e:#}");
                    self.mode = Mode::Normal;
                    self.notes.error("Could not clear the stored session.");
                }
            },
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.mode = Mode::Normal,
            _ => {}
        }
    }

    fn on_profile_edit_key(&mut self, key: KeyEvent, field: usize) {
        let value = if field == 0 {
            &mut self.profile.name
        } else {
            &mut self.profile.career_goals
        };
        match key.code {
            KeyCode::Esc => {
                self.profile.cancel();
                self.mode = Mode::Normal;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                self.mode = Mode::ProfileEdit { field: 1 - field.min(1) }
            }
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(c) => value.push(c),
            KeyCode::Enter => {
                let Some(ws) = self.workspace.as_ref() else {
                    return;
                };
                let result = self.profile.save(&ws.api, &mut self.notes);
                if !self.profile.is_editing() {
                    self.mode = Mode::Normal;
                }
                self.check(result);
            }
            _ => {}
        }
    }
}

/// Next (or previous) entry after `current`, wrapping around. An unknown
/// current value starts from either end.
fn cycle<'a>(options: &[&'a str], current: &str, forward: bool) -> Option<&'a str> {
    if options.is_empty() {
        return None;
    }
    let len = options.len();
    let next = match options.iter().position(|o| o.eq_ignore_ascii_case(current.trim())) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None if forward => 0,
        None => len - 1,
    };
    Some(options[next])
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn bar_width(area_width: u16) -> u16 {
    (area_width.saturating_sub(2) / 5).saturating_sub(2).clamp(3, 20)
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => render::sanitize_terminal(text),
        Cell::Link { label, href } => format!(
            "{} <{}>",
            render::sanitize_terminal(label),
            render::sanitize_terminal(href)
        ),
    }
}

pub fn run_browse(config: Config, guard: SessionGuard) -> Result<()> {
    let mut app = App::new(config, guard)?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let (width, _) = crossterm::terminal::size()?;
    app.pending_width = width;
    app.dashboard.chart_width = width;
    app.go(Page::Dashboard);

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    while !app.quit {
        app.tick(Instant::now());
        terminal.draw(|frame| draw(frame, &*app))?;
        // poll so banner, refresh and navigation timers advance without input
        if event::poll(TICK)? {
            let event = event::read()?;
            app.on_event(event, Instant::now());
        }
    }
    Ok(())
}

// --- Drawing ---

fn draw(frame: &mut Frame, app: &App) {
    let banner_height = app.notes.banners().len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_tabs(frame, app, chunks[0]);
    draw_banners(frame, app, chunks[1]);
    match app.page {
        Page::Login => draw_auth(frame, app, chunks[2]),
        Page::Dashboard => draw_dashboard(frame, app, chunks[2]),
        Page::Profile => draw_profile(frame, app, chunks[2]),
        _ => draw_list(frame, app, chunks[2]),
    }
    draw_help(frame, app, chunks[3]);

    match app.mode {
        Mode::Form { field } => draw_form(frame, app, field),
        Mode::ConfirmDelete(_) => {
            let prompt = app
                .workspace
                .as_ref()
                .and_then(|ws| ws.list(app.page))
                .map(|list| list.delete_prompt())
                .unwrap_or_default();
            draw_confirm(frame, &prompt);
        }
        Mode::ConfirmLogout => draw_confirm(frame, "Are you sure you want to logout?"),
        _ => {}
    }
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.workspace {
        Some(ws) => format!(" jobtrack - {} ", render::sanitize_terminal(&ws.session.user.name)),
        None => " jobtrack ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    if app.page == Page::Login {
        frame.render_widget(Paragraph::new(" Sign in to continue").block(block), area);
        return;
    }
    let selected = MAIN_PAGES.iter().position(|p| *p == app.page).unwrap_or(0);
    let tabs = Tabs::new(
        MAIN_PAGES
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} {}", i + 1, p.title())),
    )
    .select(selected)
    .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    .block(block);
    frame.render_widget(tabs, area);
}

fn draw_banners(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .notes
        .banners()
        .iter()
        .map(|banner| {
            let style = match banner.kind {
                BannerKind::Success => Style::default().fg(Color::Black).bg(Color::Green),
                BannerKind::Error => Style::default().fg(Color::White).bg(Color::Red),
            };
            Line::from(Span::styled(format!(" {} ", render::sanitize_terminal(&banner.message)), style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_help(frame: &mut Frame, app: &App, area: Rect) {
    let text = match (app.page, app.mode) {
        (Page::Login, _) if app.auth.registering => {
            " Tab:next field  Space:toggle terms  Enter:create account  F2:sign in  Esc:quit"
        }
        (Page::Login, _) => " Tab:next field  Enter:sign in  F2:create account  Esc:quit",
        (_, Mode::Search) => " type to filter  Enter/Esc:done",
        (_, Mode::Form { .. }) => " Tab:next field  Left/Right:choose  Enter:save  Esc:cancel",
        (_, Mode::ConfirmDelete(_)) | (_, Mode::ConfirmLogout) => " y:confirm  n:cancel",
        (_, Mode::ProfileEdit { .. }) => " Tab:switch field  Enter:save  Esc:cancel",
        (Page::Dashboard, _) => " 1-6/Tab:pages  a:add application  c:add company  r:refresh  L:logout  q:quit",
        (Page::Profile, _) => " 1-6/Tab:pages  e:edit  r:reload  L:logout  q:quit",
        _ => " j/k:move  /:search  s:status  a:add  e:edit  d:delete  r:reload  1-6:pages  L:logout  q:quit",
    };
    frame.render_widget(Paragraph::new(text).style(Style::default().fg(Color::DarkGray)), area);
}

fn field_line(label: &str, value: String, active: bool) -> Line<'static> {
    let style = if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let marker = if active { "> " } else { "  " };
    Line::from(vec![
        Span::styled(format!("{}{:<18}", marker, label), style),
        Span::raw(value),
        Span::styled(if active { "_" } else { "" }, style),
    ])
}

fn draw_auth(frame: &mut Frame, app: &App, area: Rect) {
    let screen = &app.auth;
    let mask = |s: &str| "*".repeat(s.chars().count());
    let (title, lines) = if screen.registering {
        let form = &screen.register;
        let terms = if form.agree_terms { "[x]" } else { "[ ]" };
        (
            " Create account ",
            vec![
                field_line("Name", form.name.clone(), screen.field == 0),
                field_line("Email", form.email.clone(), screen.field == 1),
                field_line("Password", mask(&form.password), screen.field == 2),
                field_line("Confirm password", mask(&form.confirm_password), screen.field == 3),
                field_line(
                    "Terms",
                    format!("{} I agree to the Terms & Conditions", terms),
                    screen.field == 4,
                ),
            ],
        )
    } else {
        (
            " Sign in ",
            vec![
                field_line("Email", screen.login.email.clone(), screen.field == 0),
                field_line("Password", mask(&screen.login.password), screen.field == 1),
            ],
        )
    };
    let popup = centered_rect(64, lines.len() as u16 + 4, area);
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(widget, popup);
}

fn draw_list(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ws) = &app.workspace else {
        return;
    };
    let Some(list) = ws.list(app.page) else {
        return;
    };
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let criteria = list.criteria();
    let search_style = if app.mode == Mode::Search {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let mut filter_spans = vec![Span::styled(
        format!(
            " Search: {}{}",
            render::sanitize_terminal(&criteria.search_term),
            if app.mode == Mode::Search { "_" } else { "" }
        ),
        search_style,
    )];
    if !list.statuses().is_empty() {
        let status = if criteria.status.is_empty() { "all" } else { criteria.status.as_str() };
        filter_spans.push(Span::raw(format!("    Status: {}", status)));
    }
    frame.render_widget(Paragraph::new(Line::from(filter_spans)), parts[0]);

    let table = list.table(&ws.lookups());
    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(6))
        .chain(table.columns.iter().map(|_| Constraint::Fill(1)))
        .collect();
    let header = TableRow::new(
        std::iter::once("ID".to_string()).chain(table.columns.iter().map(|c| c.to_uppercase())),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));
    let rows: Vec<TableRow> = table
        .rows
        .iter()
        .map(|row| match row {
            ViewRow::Record { id, cells, .. } => TableRow::new(
                std::iter::once(TableCell::from(id.to_string()))
                    .chain(cells.iter().map(|cell| TableCell::from(cell_text(cell)))),
            ),
            ViewRow::Placeholder { text, .. } => TableRow::new(vec![
                TableCell::from(""),
                TableCell::from(render::sanitize_terminal(text)).style(Style::default().fg(Color::DarkGray)),
            ]),
        })
        .collect();

    let count = table.record_ids().len();
    let mut state = TableState::default();
    if count > 0 {
        state.select(Some(app.selected.min(count - 1)));
    }
    let widget = TableWidget::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(if list.is_loaded() {
                    format!(" {} ({}) ", app.page.title(), count)
                } else {
                    format!(" {} ", app.page.title())
                }),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(widget, parts[1], &mut state);
}

fn draw_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let dashboard = &app.dashboard;
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(RECENT_LIMIT as u16 + 2),
        ])
        .split(area);

    let s = dashboard.stats;
    let stats = Paragraph::new(format!(
        " Total: {}   Applied: {}   Interviewed: {}   Offered: {}   Rejected: {}   Accepted: {}",
        s.total, s.applied, s.interviewed, s.offered, s.rejected, s.accepted
    ))
    .block(Block::default().borders(Borders::ALL).title(" Applications "));
    frame.render_widget(stats, parts[0]);

    let chart_block = Block::default().borders(Borders::ALL).title(" Status Overview ");
    match s.chart() {
        Some(data) => {
            let chart = BarChart::default()
                .block(chart_block)
                .data(&data[..])
                .bar_width(bar_width(dashboard.chart_width))
                .bar_gap(2)
                .bar_style(Style::default().fg(Color::Cyan))
                .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
            frame.render_widget(chart, parts[1]);
        }
        None => {
            let empty = Paragraph::new(vec![
                Line::from(Span::styled("No Data Available", Style::default().add_modifier(Modifier::BOLD))),
                Line::from("Add job applications to see the status overview."),
            ])
            .block(chart_block);
            frame.render_widget(empty, parts[1]);
        }
    }

    let recent: Vec<Line> = if dashboard.recent.is_empty() {
        vec![
            Line::from(Span::styled("No Applications Yet", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("Start by adding your first job application!"),
        ]
    } else {
        dashboard
            .recent
            .iter()
            .map(|entry| {
                Line::from(vec![
                    Span::styled(
                        render::sanitize_terminal(&entry.job_title),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(
                        "  {}  {}  ",
                        render::sanitize_terminal(&entry.company_name),
                        render::format_date(&entry.application_date)
                    )),
                    Span::styled(
                        format!("[{}]", render::sanitize_terminal(&entry.status)),
                        Style::default().fg(Color::Cyan),
                    ),
                ])
            })
            .collect()
    };
    let recent = Paragraph::new(recent).block(Block::default().borders(Borders::ALL).title(" Recent Applications "));
    frame.render_widget(recent, parts[2]);
}

fn draw_profile(frame: &mut Frame, app: &App, area: Rect) {
    let editor = &app.profile;
    let Some(profile) = editor.profile() else {
        frame.render_widget(
            Paragraph::new("Loading...").block(Block::default().borders(Borders::ALL).title(" Profile ")),
            area,
        );
        return;
    };
    let editing_field = match app.mode {
        Mode::ProfileEdit { field } => Some(field),
        _ => None,
    };

    let mut lines = vec![
        field_line("Name", render::sanitize_terminal(&editor.name), editing_field == Some(0)),
        field_line("Email", render::sanitize_terminal(&profile.email), false),
    ];
    if editing_field.is_some() {
        lines.push(field_line(
            "Career goals",
            render::sanitize_terminal(&editor.career_goals),
            editing_field == Some(1),
        ));
    } else {
        lines.push(Line::from(Span::styled(
            "  Career goals",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        let goals = if editor.career_goals.trim().is_empty() {
            "-".to_string()
        } else {
            render::sanitize_terminal(&editor.career_goals)
        };
        for line in textwrap::fill(&goals, 70).lines() {
            lines.push(Line::from(format!("    {}", line)));
        }
    }
    if let Some(created) = &profile.created_at {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("  Member since {}", render::format_date(created))));
    }
    if let Some(error) = editor.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("  {}", error), Style::default().fg(Color::Red))));
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Profile "))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_form(frame: &mut Frame, app: &App, active: usize) {
    let Some(ws) = &app.workspace else {
        return;
    };
    let Some(form) = ws.form(app.page) else {
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for (i, spec) in form.form_fields().iter().enumerate() {
        let raw = form.form_value(spec.name);
        let value = match spec.kind {
            FieldKind::Choice(_) => format!("< {} >", raw),
            FieldKind::Reference => {
                let name = ws
                    .reference_options(spec.name)
                    .into_iter()
                    .find(|(id, _)| id.to_string() == raw.trim())
                    .map(|(_, label)| label);
                match name {
                    Some(label) => format!("< {} > {}", raw, render::sanitize_terminal(&label)),
                    None => format!("< {} >", raw),
                }
            }
            _ => render::sanitize_terminal(&raw),
        };
        let label = if spec.required {
            format!("{} *", spec.label)
        } else {
            spec.label.to_string()
        };
        lines.push(field_line(&label, value, i == active));
    }
    lines.push(Line::from(""));
    if let Some(error) = form.form_error() {
        lines.push(Line::from(Span::styled(error, Style::default().fg(Color::Red))));
    }
    let submit = form.submit_control();
    let submit_style = if submit.enabled {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    lines.push(Line::from(vec![
        Span::styled(format!("[Enter] {}", submit.label), submit_style),
        Span::raw("   [Esc] Cancel"),
    ]));

    let height = lines.len() as u16 + 2;
    let popup = centered_rect(frame.area().width.saturating_mul(4) / 5, height, frame.area());
    frame.render_widget(Clear, popup);
    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", form.form_heading())),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, popup);
}

fn draw_confirm(frame: &mut Frame, prompt: &str) {
    let popup = centered_rect(prompt.chars().count() as u16 + 6, 5, frame.area());
    frame.render_widget(Clear, popup);
    let widget = Paragraph::new(vec![Line::from(prompt.to_string()), Line::from(""), Line::from("[y] Yes   [n] No")])
        .block(Block::default().borders(Borders::ALL).title(" Confirm "));
    frame.render_widget(widget, popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_session;
    use crate::store::fake::FakeApi;

    fn workspace() -> Workspace {
        let client = ApiClient::new("http://localhost:5000").unwrap();
        Workspace::new(&client, test_session("abc"))
    }

    #[test]
    fn test_dashboard_quick_add_picks_the_chosen_form() {
        let mut ws = workspace();
        assert_eq!(ws.form(Page::Dashboard).unwrap().kind(), "job-applications");

        ws.open_quick_add(QuickAdd::Company);
        let form = ws.form(Page::Dashboard).unwrap();
        assert_eq!(form.kind(), "companies");
        assert!(form.form_open());
        assert_eq!(form.form_heading(), "Add Company");
        assert!(!ws.applications.form().is_open());

        // list pages keep their own forms whatever the dashboard last used
        assert_eq!(ws.form(Page::Applications).unwrap().kind(), "job-applications");
    }

    #[test]
    fn test_quick_add_company_blocks_blank_name_then_creates_once() {
        let mut companies = ListController::new(FakeApi::<Company>::with(vec![]));
        let mut notes = Notifications::new(Duration::from_secs(4));
        let form: &mut dyn ListPage = &mut companies;

        form.open_create();
        form.submit(&mut notes).unwrap();
        assert!(form.form_open());
        assert_eq!(form.form_error().as_deref(), Some("Company name is required."));

        form.set_form_value("name", "Globex".to_string());
        form.submit(&mut notes).unwrap();
        assert!(!form.form_open());

        assert_eq!(companies.api().create_calls.get(), 1);
        assert_eq!(notes.banners()[0].message, "Company added successfully.");
    }

    #[test]
    fn test_cycle_wraps_both_ways() {
        let options = ["Applied", "Interviewed", "Offered"];
        assert_eq!(cycle(&options, "Applied", true), Some("Interviewed"));
        assert_eq!(cycle(&options, "offered", true), Some("Applied"));
        assert_eq!(cycle(&options, "Applied", false), Some("Offered"));
        assert_eq!(cycle(&options, "", true), Some("Applied"));
        assert_eq!(cycle(&options, "unknown", false), Some("Offered"));
        assert_eq!(cycle(&[], "x", true), None);
    }

    #[test]
    fn test_status_filter_cycle_includes_any() {
        let options = ["", "open", "closed"];
        assert_eq!(cycle(&options, "", true), Some("open"));
        assert_eq!(cycle(&options, "closed", true), Some(""));
    }

    #[test]
    fn test_centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 80, 24);
        assert_eq!(centered_rect(40, 10, area), Rect::new(20, 7, 40, 10));
        assert_eq!(centered_rect(200, 50, area), area);
    }

    #[test]
    fn test_bar_width_is_bounded() {
        assert_eq!(bar_width(0), 3);
        assert_eq!(bar_width(62), 10);
        assert_eq!(bar_width(500), 20);
    }

    #[test]
    fn test_auth_screen_fields() {
        let mut screen = AuthScreen::default();
        assert_eq!(screen.field_count(), 2);
        screen.current_mut().unwrap().push_str("ada@example.com");
        assert_eq!(screen.login.email, "ada@example.com");

        screen.switch(true);
        assert_eq!(screen.field_count(), 5);
        screen.field = 4;
        assert!(screen.current_mut().is_none());
    }
}
