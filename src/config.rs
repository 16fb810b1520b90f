use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::history::HISTORY_PAGE_SIZE;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATABASE_DIR: &str = "database";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Server settings.
///
/// Resolution order: built-in defaults, then `CALCULATOR_ADDR` /
/// `CALCULATOR_DATABASE`, then positional command-line arguments.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// Directory holding `users.json` and one sub-directory per user
    pub database_dir: PathBuf,

    /// Entries shown in the recent-history list
    pub history_page_size: usize,

    /// How long a sign-in stays valid
    pub session_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: DEFAULT_ADDR.to_string(),
            database_dir: PathBuf::from(DEFAULT_DATABASE_DIR),
            history_page_size: HISTORY_PAGE_SIZE,
            session_ttl: Duration::from_secs(SESSION_DURATION),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("CALCULATOR_ADDR").filter(|v| !v.is_empty()) {
            self.bind_addr = addr;
        }
        if let Some(dir) = lookup("CALCULATOR_DATABASE").filter(|v| !v.is_empty()) {
            self.database_dir = PathBuf::from(dir);
        }
        self
    }

    /// Apply `<addr> [database]` positional arguments (program name excluded).
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(addr) = args.first() {
            self.bind_addr = addr.clone();
        }
        if let Some(dir) = args.get(1) {
            self.database_dir = PathBuf::from(dir);
        }
        self
    }
}
