//! Session and authentication collaborator.
//!
//! The board never reaches for a global "current user". It is handed a
//! [`Session`], a cheap cloneable view of the [`AuthProvider`]'s state
//! carried on a `tokio::sync::watch` channel.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Minimum password length for sign-in and registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// The signed-in user as the rest of the client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Stable identifier; tasks are owned by this address.
    pub email: String,
    /// Shown as the author of new tasks.
    pub display_name: String,
    /// Avatar URL.
    pub photo_url: Option<String>,
}

/// Authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not reported yet.
    #[default]
    Loading,
    /// A user is signed in.
    Authenticated(SessionUser),
    /// Nobody is signed in.
    Anonymous,
}

/// Authentication failures. The caller's remedy is always to sign in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No user is signed in.
    #[error("not signed in")]
    NotSignedIn,

    /// The store no longer accepts the session's credentials.
    #[error("session expired; sign in again")]
    SessionExpired,

    /// Credentials were refused or malformed.
    #[error("{0}")]
    Rejected(String),

    /// Registration for an address that already has an account.
    #[error("an account already exists for {0}")]
    AccountExists(String),
}

/// Read-only handle on the current auth state.
#[derive(Debug, Clone)]
pub struct Session {
    rx: watch::Receiver<AuthState>,
}

impl Session {
    /// Wraps a watch receiver fed by an [`AuthProvider`].
    #[must_use]
    pub const fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    /// A session permanently signed in as `user`.
    #[must_use]
    pub fn fixed(user: SessionUser) -> Self {
        let (_tx, rx) = watch::channel(AuthState::Authenticated(user));
        Self { rx }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        match &*self.rx.borrow() {
            AuthState::Authenticated(user) => Some(user.clone()),
            AuthState::Loading | AuthState::Anonymous => None,
        }
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] while loading or anonymous.
    pub fn require_user(&self) -> Result<SessionUser, AuthError> {
        self.current_user().ok_or(AuthError::NotSignedIn)
    }

    /// Waits for the next state change.
    ///
    /// Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<AuthState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the state is no longer [`AuthState::Loading`].
    pub async fn settled(&mut self) -> AuthState {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if state != AuthState::Loading || self.rx.changed().await.is_err() {
                return state;
            }
        }
    }
}

/// Registration form. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Optional avatar URL.
    pub photo_url: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("photo_url", &self.photo_url)
            .finish()
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Rejected(format!("invalid email address: {email}"))),
    }
}

fn validate_password_length(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Rejected(format!(
            "password should be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

/// Checks sign-in input before the provider is contacted.
///
/// # Errors
///
/// Returns [`AuthError::Rejected`] for a malformed email or short password.
pub fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    validate_password_length(password)
}

/// Checks a registration form before the provider is contacted.
///
/// Passwords need a lowercase letter, an uppercase letter and a digit on
/// top of the minimum length.
///
/// # Errors
///
/// Returns [`AuthError::Rejected`] naming the first failed rule.
pub fn validate_registration(registration: &Registration) -> Result<(), AuthError> {
    if registration.name.trim().is_empty() {
        return Err(AuthError::Rejected("name is required".to_string()));
    }
    validate_email(&registration.email)?;
    let password = registration.password.as_str();
    validate_password_length(password)?;
    let lower = password.chars().any(char::is_lowercase);
    let upper = password.chars().any(char::is_uppercase);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(lower && upper && digit) {
        return Err(AuthError::Rejected(
            "password should contain at least one uppercase letter, one lowercase letter, and one number"
                .to_string(),
        ));
    }
    Ok(())
}

/// The identity service the client signs in against.
///
/// Implementations publish state changes through the [`Session`] they
/// hand out.
pub trait AuthProvider: Send + Sync {
    /// A handle that follows this provider's state.
    fn session(&self) -> Session;

    /// Signs in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SessionUser, AuthError>> + Send;

    /// Creates an account. Does not sign the new user in.
    fn sign_up(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Signs the current user out.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Changes the signed-in user's display name and avatar.
    fn update_profile(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> impl Future<Output = Result<SessionUser, AuthError>> + Send;

    /// Starts a password reset for `email`.
    fn send_password_reset(&self, email: &str)
    -> impl Future<Output = Result<(), AuthError>> + Send;
}

struct Account {
    digest: [u8; 32],
    user: SessionUser,
}

/// In-process [`AuthProvider`] keeping accounts in memory.
///
/// Passwords are stored as salted SHA-256 digests.
pub struct LocalAuth {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<AuthState>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    /// Creates a provider with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(AuthState::Anonymous);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
        }
    }

    /// Creates a provider already signed in as `user`.
    #[must_use]
    pub fn with_user(user: SessionUser) -> Self {
        let auth = Self::new();
        auth.state.send_replace(AuthState::Authenticated(user));
        auth
    }

    /// Drops the current session, as when the store reports it expired.
    pub fn expire(&self) {
        tracing::info!("session expired");
        self.state.send_replace(AuthState::Anonymous);
    }

    fn digest(email: &str, password: &str) -> [u8; 32] {
        let salted = Zeroizing::new(format!("{}\u{0}{password}", normalize(email)));
        Sha256::digest(salted.as_bytes()).into()
    }

    fn signed_in_user(&self) -> Result<SessionUser, AuthError> {
        match &*self.state.borrow() {
            AuthState::Authenticated(user) => Ok(user.clone()),
            AuthState::Loading | AuthState::Anonymous => Err(AuthError::NotSignedIn),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthProvider for LocalAuth {
    fn session(&self) -> Session {
        Session::new(self.state.subscribe())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        validate_login(email, password)?;
        let digest = Self::digest(email, password);
        let user = self
            .accounts
            .lock()
            .get(&normalize(email))
            .filter(|account| account.digest == digest)
            .map(|account| account.user.clone())
            .ok_or_else(|| {
                AuthError::Rejected("incorrect email or password".to_string())
            })?;
        tracing::info!(email = %user.email, "signed in");
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, registration: &Registration) -> Result<(), AuthError> {
        validate_registration(registration)?;
        let key = normalize(&registration.email);
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(&key) {
            return Err(AuthError::AccountExists(key));
        }
        let account = Account {
            digest: Self::digest(&registration.email, &registration.password),
            user: SessionUser {
                email: registration.email.trim().to_string(),
                display_name: registration.name.trim().to_string(),
                photo_url: registration.photo_url.clone(),
            },
        };
        tracing::info!(email = %account.user.email, "account created");
        accounts.insert(key, account);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.send_replace(AuthState::Anonymous);
        Ok(())
    }

    async fn update_profile(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<SessionUser, AuthError> {
        let mut user = self.signed_in_user()?;
        display_name.trim().clone_into(&mut user.display_name);
        user.photo_url = photo_url.map(str::to_string);
        if let Some(account) = self.accounts.lock().get_mut(&normalize(&user.email)) {
            account.user = user.clone();
        }
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        if !self.accounts.lock().contains_key(&normalize(email)) {
            return Err(AuthError::Rejected(format!("no account for {email}")));
        }
        tracing::info!(email, "password reset requested");
        Ok(())
    }
}
