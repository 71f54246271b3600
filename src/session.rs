use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::models::{Session, User};
use crate::notify::Notifications;

/// Screens the client can navigate between. `Login` is the one entry point
/// for unauthenticated users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Dashboard,
    Companies,
    Applications,
    Listings,
    Reminders,
    Profile,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Page::Login => "Login",
            Page::Dashboard => "Dashboard",
            Page::Companies => "Companies",
            Page::Applications => "Applications",
            Page::Listings => "Job Listings",
            Page::Reminders => "Reminders",
            Page::Profile => "Profile",
        }
    }
}

/// A requested screen change, optionally held back so a banner can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub to: Page,
    pub after: Duration,
}

impl Navigation {
    pub fn now(to: Page) -> Self {
        Self {
            to,
            after: Duration::ZERO,
        }
    }

    pub fn after(to: Page, after: Duration) -> Self {
        Self { to, after }
    }

    pub fn due_at(&self, issued: Instant) -> Instant {
        issued + self.after
    }
}

/// Persistent key-value storage for the session. Token and user are always
/// written and removed together.
pub trait SessionStore {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "authToken")]
    auth_token: Option<String>,
    user: Option<User>,
}

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn open() -> Result<Self> {
        Ok(Self::at(Self::default_path()?))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
            Ok(proj_dirs.data_dir().join("session.json"))
        } else {
            Ok(PathBuf::from("jobtrack-session.json"))
        }
    }
}

/// Writes a file only the current user can read; it holds the bearer token.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies when the file is created
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        let stored: StoredSession =
            serde_json::from_str(&raw).context("Session file is corrupt")?;
        match (stored.auth_token, stored.user) {
            (Some(token), Some(user)) if !token.is_empty() => Ok(Some(Session { token, user })),
            _ => Ok(None),
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            auth_token: Some(session.token.clone()),
            user: Some(session.user.clone()),
        };
        // write beside the target then rename, so readers never see half a session
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &serde_json::to_vec_pretty(&stored)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: std::rc::Rc<std::cell::RefCell<Option<Session>>>,
}

#[cfg(test)]
impl MemorySessionStore {
    pub fn with(session: Session) -> Self {
        let store = Self::default();
        *store.inner.borrow_mut() = Some(session);
        store
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.borrow().clone()
    }
}

#[cfg(test)]
impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.inner.borrow().clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.inner.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.borrow_mut() = None;
        Ok(())
    }
}

pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

/// Gates protected screens on a stored session and owns its lifecycle.
pub struct SessionGuard {
    store: Box<dyn SessionStore>,
    expiry_delay: Duration,
}

impl SessionGuard {
    pub fn new(store: Box<dyn SessionStore>, expiry_delay: Duration) -> Self {
        Self {
            store,
            expiry_delay,
        }
    }

    /// The stored session, or a navigation to the login screen when either
    /// half is missing. An unreadable session is discarded.
    pub fn require(&self) -> Result<Session, Navigation> {
        match self.store.load() {
            Ok(Some(session)) => {
                debug!(user = %session.user.email, "session restored");
                Ok(session)
            }
            Ok(None) => Err(Navigation::now(Page::Login)),
            Err(e) => {
                warn!("discarding unreadable session: {e:#}");
                if let Err(e) = self.store.clear() {
                    warn!("failed to clear session: {e:#}");
                }
                Err(Navigation::now(Page::Login))
            }
        }
    }

    pub fn begin(&self, session: &Session) -> Result<()> {
        self.store.save(session)?;
        info!(user = %session.user.email, "session started");
        Ok(())
    }

    /// Reaction to an authorization failure from any call: drop the session,
    /// tell the user, and go to login once they have had time to read it.
    pub fn expire(&self, notes: &mut Notifications) -> Navigation {
        warn!("authorization rejected, expiring session");
        if let Err(e) = self.store.clear() {
            warn!("failed to clear session: {e:#}");
        }
        notes.error(SESSION_EXPIRED);
        Navigation::after(Page::Login, self.expiry_delay)
    }

    pub fn logout(&self) -> Result<Navigation> {
        self.store.clear()?;
        info!("logged out");
        Ok(Navigation::now(Page::Login))
    }
}

#[cfg(test)]
pub(crate) fn test_session(token: &str) -> Session {
    Session {
        token: token.to_string(),
        user: User {
            id: Some(1),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            extra: serde_json::Map::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(test_name: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        root.push(format!("jobtrack-{test_name}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn test_require_without_session_goes_to_login() {
        let guard = SessionGuard::new(Box::new(MemorySessionStore::default()), Duration::from_secs(2));
        assert_eq!(guard.require(), Err(Navigation::now(Page::Login)));
    }

    #[test]
    fn test_expire_clears_and_delays_login() {
        let store = MemorySessionStore::with(test_session("abc"));
        let guard = SessionGuard::new(Box::new(store.clone()), Duration::from_secs(2));
        let mut notes = Notifications::new(Duration::from_secs(4));

        let nav = guard.expire(&mut notes);

        assert_eq!(nav, Navigation::after(Page::Login, Duration::from_secs(2)));
        assert!(store.current().is_none());
        assert_eq!(notes.banners()[0].message, SESSION_EXPIRED);
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = temp_dir("session-roundtrip");
        let store = FileSessionStore::at(dir.join("session.json"));
        assert!(store.load().unwrap().is_none());

        store.save(&test_session("abc")).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["authToken"], "abc");
        assert_eq!(json["user"]["email"], "ada@example.com");

        assert_eq!(store.load().unwrap(), Some(test_session("abc")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_dir("session-mode");
        let path = dir.join("session.json");
        // a stale temp file with loose bits must not leak them
        std::fs::write(path.with_extension("json.tmp"), "{}").unwrap();
        std::fs::set_permissions(
            path.with_extension("json.tmp"),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let store = FileSessionStore::at(path.clone());
        store.save(&test_session("abc")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_needs_both_keys() {
        let dir = temp_dir("session-half");
        let path = dir.join("session.json");
        std::fs::write(&path, r#"{"authToken": "abc"}"#).unwrap();
        let store = FileSessionStore::at(path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_is_discarded() {
        let dir = temp_dir("session-corrupt");
        let path = dir.join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let guard = SessionGuard::new(Box::new(FileSessionStore::at(path.clone())), Duration::from_secs(2));
        assert_eq!(guard.require(), Err(Navigation::now(Page::Login)));
        assert!(!path.exists());
    }
}
