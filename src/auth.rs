use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::api::{AuthApi, ProfileUpdate};
use crate::error::ApiError;
use crate::models::{Profile, Session};
use crate::notify::Notifications;
use crate::session::{Navigation, Page, SessionGuard};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const NETWORK_ERROR: &str = "Network error. Please check your connection and try again.";
pub const MIN_PASSWORD_LEN: usize = 6;
/// Pause before returning to the login form after registering.
pub const REGISTER_REDIRECT: Duration = Duration::from_secs(2);

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"));

fn looks_like_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

// --- Login ---

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signs in and stores the session. The navigation to the dashboard is held
/// back by `delay` so the success banner can be read.
pub fn login(
    api: &impl AuthApi,
    guard: &SessionGuard,
    form: &LoginForm,
    delay: Duration,
    notes: &mut Notifications,
) -> Option<Navigation> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        notes.error("Please enter your email and password.");
        return None;
    }

    let response = match api.login(email, &form.password) {
        Ok(response) => response,
        Err(err) => {
            warn!("login request failed: {err}");
            notes.error(NETWORK_ERROR);
            return None;
        }
    };

    match (response.success, response.token, response.user) {
        (true, Some(token), Some(user)) if !token.is_empty() => {
            let session = Session { token, user };
            if let Err(e) = guard.begin(&session) {
                warn!("failed to store session: {e:#}");
                notes.error("Could not save your session. Please try again.");
                return None;
            }
            notes.success("Login successful! Redirecting...");
            Some(Navigation::after(Page::Dashboard, delay))
        }
        _ => {
            info!(email, "login rejected");
            notes.error(
                response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Login failed. Please try again.".to_string()),
            );
            None
        }
    }
}

// --- Registration ---

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub agree_terms: bool,
}

impl RegisterForm {
    /// Checks made before anything is sent, in the order the user sees them.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err("Please fill in all required fields.");
        }
        if !looks_like_email(self.email.trim()) {
            return Err("Please enter a valid email address.");
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match.");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters long.");
        }
        if !self.agree_terms {
            return Err("Please agree to the Terms & Conditions.");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub navigation: Navigation,
    /// Prefills the login form.
    pub email: String,
}

pub fn register(
    api: &impl AuthApi,
    form: &RegisterForm,
    delay: Duration,
    notes: &mut Notifications,
) -> Option<Registered> {
    if let Err(message) = form.validate() {
        notes.error(message);
        return None;
    }

    let email = form.email.trim();
    match api.register(form.name.trim(), email, &form.password) {
        Ok(response) if response.success => {
            info!(email, "account registered");
            notes.success(
                response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Account created successfully! Please sign in.".to_string()),
            );
            Some(Registered {
                navigation: Navigation::after(Page::Login, delay),
                email: email.to_string(),
            })
        }
        Ok(response) => {
            notes.error(
                response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Registration failed. Please try again.".to_string()),
            );
            None
        }
        Err(err) => {
            warn!("register request failed: {err}");
            notes.error(err.user_message(NETWORK_ERROR));
            None
        }
    }
}

// --- Profile ---

/// Profile screen state. Edits go to `name`/`career_goals`; `cancel` puts
/// back what was last loaded or saved.
#[derive(Debug, Default)]
pub struct ProfileEditor {
    original: Option<Profile>,
    pub name: String,
    pub career_goals: String,
    editing: bool,
    error: Option<String>,
}

impl ProfileEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.original.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn load(&mut self, api: &impl AuthApi, notes: &mut Notifications) -> Result<(), ApiError> {
        match api.profile() {
            Ok(profile) => {
                self.name = profile.name.clone();
                self.career_goals = profile.career_goals.clone().unwrap_or_default();
                self.original = Some(profile);
                self.editing = false;
                Ok(())
            }
            Err(err) => {
                warn!("profile load failed: {err}");
                if !err.is_unauthorized() {
                    notes.error("Failed to load profile. Please try again.");
                }
                Err(err)
            }
        }
    }

    pub fn enter_edit(&mut self) {
        self.editing = true;
        self.error = None;
    }

    pub fn cancel(&mut self) {
        if let Some(profile) = &self.original {
            self.name = profile.name.clone();
            self.career_goals = profile.career_goals.clone().unwrap_or_default();
        }
        self.editing = false;
        self.error = None;
    }

    /// Returns whether the profile was saved.
    pub fn save(&mut self, api: &impl AuthApi, notes: &mut Notifications) -> Result<bool, ApiError> {
        if !self.editing {
            return Ok(false);
        }
        let update = ProfileUpdate {
            name: self.name.trim().to_string(),
            career_goals: self.career_goals.trim().to_string(),
        };
        if update.name.is_empty() {
            self.error = Some("Name is required".to_string());
            return Ok(false);
        }
        self.error = None;

        match api.update_profile(&update) {
            Ok(()) => {
                if let Some(profile) = &mut self.original {
                    profile.name = update.name.clone();
                    profile.career_goals = Some(update.career_goals.clone());
                }
                self.name = update.name;
                self.career_goals = update.career_goals;
                self.editing = false;
                notes.success("Profile updated successfully");
                Ok(true)
            }
            Err(err) => {
                warn!("profile update failed: {err}");
                if !err.is_unauthorized() {
                    notes.error(err.user_message("Failed to update profile. Please try again."));
                }
                Err(err)
            }
        }
    }
}
