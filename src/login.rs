#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;

const SESSION_COOKIE: &str = "session";

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address
    pub email: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

/// Credential data for login and registration
///
/// Used to receive login and registration form data from the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Username for login/registration
    pub username: String,

    /// Email address (optional for login, required for registration)
    #[serde(default)]
    pub email: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// Name of the signed-in user, attached to requests by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// File-backed user registry
///
/// Users live in a single JSON map at `<database>/users.json`. Each user also
/// gets a directory under the database root for their history. Clones share
/// one registration lock.
#[derive(Debug, Clone)]
pub struct UserDatabase {
    root: PathBuf,
    register_lock: Arc<Mutex<()>>,
}

impl UserDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UserDatabase {
            root: root.into(),
            register_lock: Arc::new(Mutex::new(())),
        }
    }

    fn users_file(&self) -> PathBuf {
        self.root.join("users.json")
    }

    /// Initialize the database structure
    ///
    /// Creates the database directory and users file if they don't exist.
    /// This should be called before any other database operations.
    ///
    /// # Returns
    /// * `std::io::Result<()>` - Success or an IO error
    pub fn init(&self) -> std::io::Result<()> {
        create_dir_all(&self.root)?;

        let users_path = self.users_file();
        if !users_path.exists() {
            fs::write(users_path, b"{}")?;
        }

        Ok(())
    }

    /// Get all registered users
    ///
    /// # Errors
    /// * Returns an error if the users file cannot be read or parsed
    pub fn get_users(&self) -> Result<HashMap<String, User>, String> {
        let contents = match fs::read_to_string(self.users_file()) {
            Ok(contents) => contents,
            Err(_) => return Err("Failed to read users file".to_string()),
        };

        match serde_json::from_str(&contents) {
            Ok(users) => Ok(users),
            Err(_) => Err("Failed to parse users data".to_string()),
        }
    }

    pub fn save_users(&self, users: &HashMap<String, User>) -> Result<(), String> {
        let json = match serde_json::to_string_pretty(users) {
            Ok(json) => json,
            Err(_) => return Err("Failed to serialize users data".to_string()),
        };

        if fs::write(self.users_file(), json).is_err() {
            return Err("Failed to write users data".to_string());
        }

        Ok(())
    }

    /// Register a new user
    ///
    /// Creates a new user account with the provided username, email, and password.
    /// The password is hashed before storage.
    ///
    /// # Errors
    /// * Returns an error if the username or email is already in use
    /// * Returns an error if any required fields are empty
    /// * Returns an error if the username can't be used as a directory name
    pub fn register_user(&self, username: &str, email: &str, password: &str) -> Result<(), String> {
        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err("Username, email and password cannot be empty".to_string());
        }
        if !is_valid_username(username) {
            return Err("Username may only contain letters, digits, '-' and '_'".to_string());
        }

        let _guard = self
            .register_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut users = self.get_users()?;
        if users.contains_key(username) {
            return Err("Username already exists".to_string());
        }

        if users.values().any(|user| user.email == email) {
            return Err("Email address is already registered".to_string());
        }

        let password_hash = hash_password(password)?;

        if create_dir_all(self.root.join(username)).is_err() {
            return Err("Failed to create user directory".to_string());
        }

        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        users.insert(username.to_string(), user);
        self.save_users(&users)?;

        Ok(())
    }

    /// Verify user credentials
    ///
    /// # Returns
    /// * `Result<bool, String>` - True if credentials are valid, false if invalid, or an error
    pub fn verify_user(&self, username: &str, password: &str) -> Result<bool, String> {
        let users = self.get_users()?;

        if let Some(user) = users.get(username) {
            verify_password(password, &user.password_hash)
        } else {
            Ok(false)
        }
    }
}

/// Usernames double as directory names.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored hash
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Active sign-ins, keyed by session id
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new session and return its id.
    pub fn create_session(&self, username: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user_id: username.to_string(),
            expires_at: SystemTime::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// The username for a live session, or `None` if unknown or expired.
    pub fn validate_session(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        sessions
            .get(session_id)
            .filter(|session| session.expires_at > SystemTime::now())
            .map(|session| session.user_id.clone())
    }

    pub fn remove_session(&self, session_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}

// Web handler functions below

/// Serve the login page HTML
pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Serve the signup page HTML
pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

/// Handle user login requests
///
/// Validates credentials and creates a session if valid. Password checks run
/// on the blocking pool.
///
/// # Returns
/// * `Response` - Redirect to the calculator if successful, or error message if not
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    let users = state.users.clone();
    let username = credentials.username.clone();
    let password = credentials.password;
    let verified = tokio::task::spawn_blocking(move || users.verify_user(&username, &password))
        .await
        .unwrap_or_else(|e| Err(format!("Password check did not finish: {}", e)));

    match verified {
        Ok(true) => {
            log::info!("user {} signed in", credentials.username);
            let session_id = state.sessions.create_session(&credentials.username);
            let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
            cookie.set_path("/");
            cookie.set_http_only(true);
            (jar.add(cookie), Redirect::to("/calculator")).into_response()
        }
        Ok(false) => {
            log::info!("rejected sign-in for {}", credentials.username);
            (StatusCode::UNAUTHORIZED, "Invalid username or password").into_response()
        }
        Err(e) => {
            log::error!("authentication error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response()
        }
    }
}

/// Handle user registration
///
/// # Returns
/// * `Result<Redirect, (StatusCode, String)>` - Redirect to login page or error message
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<UserCredentials>,
) -> Result<Redirect, (StatusCode, String)> {
    let users = state.users.clone();
    let username = credentials.username.clone();
    let registered = tokio::task::spawn_blocking(move || {
        users.register_user(&username, &credentials.email, &credentials.password)
    })
    .await
    .map_err(|e| {
        log::error!("registration task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration error".to_string(),
        )
    })?;

    match registered {
        Ok(_) => {
            log::info!("registered user {}", credentials.username);
            Ok(Redirect::to("/login?registered=true"))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, e)),
    }
}

/// Handle user logout
///
/// Drops the session, clears the cookie and redirects to the login page.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove_session(cookie.value());
    }

    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    (jar.remove(cookie), Redirect::to("/login"))
}

/// Authentication middleware
///
/// Passes requests with a live session through with a [`CurrentUser`]
/// extension. Otherwise API calls get `401` and pages redirect to `/login`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(username) = state.sessions.validate_session(session_cookie.value()) {
            request.extensions_mut().insert(CurrentUser(username));
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        return (StatusCode::UNAUTHORIZED, "Not signed in").into_response();
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::new(dir.path());
        db.init().unwrap();

        db.register_user("ada", "ada@example.com", "hunter2").unwrap();

        assert!(db.verify_user("ada", "hunter2").unwrap());
        assert!(!db.verify_user("ada", "wrong").unwrap());
        assert!(!db.verify_user("bob", "hunter2").unwrap());
        assert!(dir.path().join("ada").is_dir());
    }

    #[test]
    fn duplicate_and_invalid_registrations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::new(dir.path());
        db.init().unwrap();
        db.register_user("ada", "ada@example.com", "pw").unwrap();

        assert!(db.register_user("ada", "other@example.com", "pw").is_err());
        assert!(db.register_user("eve", "ada@example.com", "pw").is_err());
        assert!(db.register_user("", "x@example.com", "pw").is_err());
        assert!(db.register_user("../etc", "y@example.com", "pw").is_err());
    }

    #[test]
    fn stored_passwords_are_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::new(dir.path());
        db.init().unwrap();
        db.register_user("ada", "ada@example.com", "hunter2").unwrap();

        let users = db.get_users().unwrap();
        let hash = &users["ada"].password_hash;
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn sessions_expire_and_can_be_removed() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create_session("ada");
        assert_eq!(store.validate_session(&id), Some("ada".to_string()));
        assert_eq!(store.validate_session("nope"), None);

        store.remove_session(&id);
        assert_eq!(store.validate_session(&id), None);

        let expired = SessionStore::new(Duration::ZERO);
        let id = expired.create_session("ada");
        assert_eq!(expired.validate_session(&id), None);
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::new(dir.path());
        db.init().unwrap();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || {
                    db.register_user(&format!("user{i}"), &format!("user{i}@example.com"), "pw")
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap().unwrap();
        }

        assert_eq!(db.get_users().unwrap().len(), 8);
    }

    #[test]
    fn usernames_must_be_path_safe() {
        assert!(is_valid_username("ada_lovelace-1"));
        assert!(!is_valid_username("a/b"));
        assert!(!is_valid_username(".."));
        assert!(!is_valid_username(""));
    }
}
