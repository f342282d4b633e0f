//! In-memory identity service and data store.
//!
//! Intended for tests/dev. Behaves like the hosted platform where it matters
//! to the session layer: typed credential errors, a change feed, and
//! failure/latency injection per table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use chamberhub_core::{
    Business, ChamberMembership, SubscriptionSnapshot, User, UserId, UserProfile,
};

use crate::{
    AuthError, AuthEvent, AuthStateChange, IdentityService, OAuthProvider, OAuthRedirect,
    ProfileStore, Session, SignUpOutcome, StoreError,
};

const MIN_PASSWORD_LEN: usize = 8;
const SESSION_TTL_MINUTES: i64 = 60;
const FEED_CAPACITY: usize = 64;

/// Tables the store serves, for failure and latency injection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Memberships,
    Subscriptions,
    Businesses,
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct Rows {
    profiles: HashMap<UserId, UserProfile>,
    memberships: HashMap<UserId, Vec<ChamberMembership>>,
    subscriptions: HashMap<UserId, SubscriptionSnapshot>,
    businesses: HashMap<UserId, Business>,
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<Table>,
    delays: HashMap<Table, VecDeque<Duration>>,
}

/// Identity service + data store backed by process memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    rows: RwLock<Rows>,
    faults: RwLock<Faults>,
    failed_attempts: RwLock<u32>,
    oauth_providers: RwLock<HashSet<OAuthProvider>>,
    require_email_confirmation: bool,
    max_failed_attempts: u32,
    feed: broadcast::Sender<AuthStateChange>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            rows: RwLock::new(Rows::default()),
            faults: RwLock::new(Faults::default()),
            failed_attempts: RwLock::new(0),
            oauth_providers: RwLock::new(HashSet::from([OAuthProvider::Google])),
            require_email_confirmation: false,
            max_failed_attempts: 5,
            feed,
        }
    }

    /// New sign-ups must confirm their email before signing in.
    pub fn with_email_confirmation(mut self) -> Self {
        self.require_email_confirmation = true;
        self
    }

    /// Consecutive failed sign-ins allowed before rate limiting kicks in.
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    /// Register a confirmed account directly.
    pub fn register(&self, email: &str, password: &str) -> User {
        let user = User::new(UserId::new(), normalize_email(email));
        write(&self.accounts).insert(
            user.email.clone(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    pub fn confirm_email(&self, email: &str) {
        if let Some(account) = write(&self.accounts).get_mut(&normalize_email(email)) {
            account.user.email_confirmed = true;
        }
    }

    pub fn enable_oauth_provider(&self, provider: OAuthProvider) {
        write(&self.oauth_providers).insert(provider);
    }

    pub fn put_profile(&self, profile: UserProfile) {
        write(&self.rows).profiles.insert(profile.id, profile);
    }

    pub fn put_membership(&self, membership: ChamberMembership) {
        write(&self.rows)
            .memberships
            .entry(membership.user_id)
            .or_default()
            .push(membership);
    }

    pub fn put_subscription(&self, user_id: UserId, subscription: SubscriptionSnapshot) {
        write(&self.rows).subscriptions.insert(user_id, subscription);
    }

    pub fn remove_subscription(&self, user_id: UserId) {
        write(&self.rows).subscriptions.remove(&user_id);
    }

    pub fn put_business(&self, business: Business) {
        write(&self.rows).businesses.insert(business.owner_id, business);
    }

    /// Make every read of `table` fail until [`InMemoryBackend::heal`].
    pub fn fail(&self, table: Table) {
        write(&self.faults).failing.insert(table);
    }

    pub fn heal(&self, table: Table) {
        write(&self.faults).failing.remove(&table);
    }

    /// Delay the next read of `table`. Delays queue up, one per read.
    ///
    /// The row is captured before sleeping, so a delayed read returns the
    /// data as it was when the read started.
    pub fn delay_next(&self, table: Table, delay: Duration) {
        write(&self.faults)
            .delays
            .entry(table)
            .or_default()
            .push_back(delay);
    }

    /// Publish a change as the hosted service would (e.g. token refresh).
    pub fn emit(&self, event: AuthEvent) {
        let session = read(&self.session).clone();
        self.publish(AuthStateChange::new(event, session));
    }

    /// Number of live change-feed subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    pub fn current_user(&self) -> Option<User> {
        read(&self.session).as_ref().map(|s| s.user.clone())
    }

    fn publish(&self, change: AuthStateChange) {
        // No subscribers is fine; nobody is listening yet.
        let _ = self.feed.send(change);
    }

    fn start_session(&self, user: User) -> Session {
        let session = Session {
            user,
            access_token: Uuid::now_v7().to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(SESSION_TTL_MINUTES),
        };
        *write(&self.session) = Some(session.clone());
        self.publish(AuthStateChange::new(AuthEvent::SignedIn, Some(session.clone())));
        session
    }

    /// Fault check, capture, then optional sleep.
    async fn serve<T>(
        &self,
        table: Table,
        capture: impl FnOnce(&Rows) -> T,
    ) -> Result<T, StoreError> {
        let delay = {
            let mut faults = write(&self.faults);
            if faults.failing.contains(&table) {
                return Err(StoreError::Network(format!("{table:?} read failed")));
            }
            faults.delays.get_mut(&table).and_then(VecDeque::pop_front)
        };
        let value = capture(&read(&self.rows));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(value)
    }
}

#[async_trait]
impl IdentityService for InMemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(read(&self.session).clone())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(format!(
                "use at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let email = normalize_email(email);
        let user = {
            let mut accounts = write(&self.accounts);
            if accounts.contains_key(&email) {
                return Err(AuthError::UserAlreadyRegistered);
            }
            let user = User {
                id: UserId::new(),
                email: email.clone(),
                email_confirmed: !self.require_email_confirmation,
            };
            accounts.insert(
                email.clone(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            user
        };

        if self.require_email_confirmation {
            return Ok(SignUpOutcome::ConfirmationRequired { email });
        }
        Ok(SignUpOutcome::SignedIn(self.start_session(user)))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        if *read(&self.failed_attempts) >= self.max_failed_attempts {
            return Err(AuthError::RateLimited {
                retry_after_secs: Some(60),
            });
        }

        let account = read(&self.accounts).get(&normalize_email(email)).cloned();
        let account = match account {
            Some(account) if account.password == password => account,
            _ => {
                *write(&self.failed_attempts) += 1;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !account.user.email_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        *write(&self.failed_attempts) = 0;
        Ok(self.start_session(account.user))
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError> {
        if !read(&self.oauth_providers).contains(&provider) {
            return Err(AuthError::OAuthProviderUnavailable(provider.to_string()));
        }
        Ok(OAuthRedirect {
            provider,
            url: format!(
                "memory://auth/authorize?provider={}&redirect_to={}",
                provider,
                urlencoding::encode(redirect_to)
            ),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *write(&self.session) = None;
        self.publish(AuthStateChange::new(AuthEvent::SignedOut, None));
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        _redirect_to: &str,
    ) -> Result<(), AuthError> {
        // Unknown addresses succeed too, so the endpoint cannot enumerate accounts.
        let known = read(&self.accounts).contains_key(&normalize_email(email));
        tracing::debug!(known, "password reset requested");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.feed.subscribe()
    }
}

#[async_trait]
impl ProfileStore for InMemoryBackend {
    async fn user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        self.serve(Table::Profiles, |rows| rows.profiles.get(&user_id).cloned())
            .await
    }

    async fn chamber_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ChamberMembership>, StoreError> {
        self.serve(Table::Memberships, |rows| {
            rows.memberships.get(&user_id).cloned().unwrap_or_default()
        })
        .await
    }

    async fn subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionSnapshot>, StoreError> {
        self.serve(Table::Subscriptions, |rows| {
            rows.subscriptions.get(&user_id).cloned()
        })
        .await
    }

    async fn current_business(&self, user_id: UserId) -> Result<Option<Business>, StoreError> {
        self.serve(Table::Businesses, |rows| rows.businesses.get(&user_id).cloned())
            .await
    }
}
