//! Session state holder.
//!
//! [`AuthContext`] is the single owner of "who is signed in and what do they
//! have access to". It listens to the identity service's change feed, fetches
//! the user's rows, and publishes immutable [`AuthSnapshot`]s through a
//! `watch` channel. Consumers read; only the context writes.
//!
//! Every fetch sequence is tagged with a generation number. A result is
//! applied only if its generation is still the latest, so a slow response to
//! an older notification can never overwrite newer state.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use chamberhub_core::{User, UserId};

use crate::{
    AuthConfig, AuthError, AuthEvent, AuthSnapshot, AuthStateChange, Clock, IdentityService,
    OAuthProvider, OAuthRedirect, PermissionCache, Permissions, ProfileStore, Session,
    SessionData, SignUpOutcome, StoreError, SystemClock,
};

pub struct AuthContext {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    state: watch::Sender<AuthSnapshot>,
    generation: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
    permissions: PermissionCache,
}

impl core::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthContext")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("snapshot", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<dyn ProfileStore>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::unresolved());
        Self {
            identity,
            store,
            clock: Arc::new(SystemClock),
            config: AuthConfig::default(),
            state,
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
            permissions: PermissionCache::new(),
        }
    }

    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Capabilities for the current snapshot (memoized).
    pub fn permissions(&self) -> Permissions {
        self.permissions.get(&self.state.borrow())
    }

    /// Start listening to the identity service and hydrate from its
    /// persisted session.
    ///
    /// Only the first call registers a listener; later calls return
    /// immediately.
    pub async fn initialize(self: &Arc<Self>) {
        {
            let mut listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
            if listener.is_some() {
                tracing::debug!("auth context already initialized");
                return;
            }
            let feed = self.identity.subscribe();
            *listener = Some(tokio::spawn(listen(Arc::downgrade(self), feed)));
        }

        // Taken before the read so a notification that lands meanwhile wins.
        let generation = self.next_generation();
        let session = match self.identity.current_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, code = err.code(), "could not read persisted session");
                None
            }
        };
        let change = AuthStateChange::new(AuthEvent::InitialSession, session);
        if let Some(user) = self.begin_change(change, generation) {
            self.load(user, generation).await;
        }
    }

    /// Sign in with email and password.
    ///
    /// State updates arrive through the change feed; this call does not
    /// navigate or touch the snapshot.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.identity.sign_in_with_password(email, password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "signed in");
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(code = err.code(), "sign-in failed");
                Err(err)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let redirect_to = self.config.absolute_url(&self.config.oauth_callback_path);
        let outcome = self
            .identity
            .sign_up(email, password, Some(&redirect_to))
            .await
            .inspect_err(|err| tracing::warn!(code = err.code(), "sign-up failed"))?;
        if let SignUpOutcome::ConfirmationRequired { .. } = &outcome {
            tracing::info!("sign-up pending email confirmation");
        }
        Ok(outcome)
    }

    /// Start a provider sign-in. `redirect_to` defaults to the configured
    /// OAuth callback.
    pub async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<OAuthRedirect, AuthError> {
        let default_redirect = self.config.absolute_url(&self.config.oauth_callback_path);
        let redirect_to = redirect_to.unwrap_or(&default_redirect);
        self.identity
            .sign_in_with_oauth(provider, redirect_to)
            .await
            .inspect_err(|err| tracing::warn!(%provider, code = err.code(), "oauth sign-in failed"))
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let redirect_to = self.config.absolute_url(&self.config.password_reset_path);
        self.identity
            .reset_password_for_email(email, &redirect_to)
            .await
    }

    /// Sign out.
    ///
    /// The snapshot is cleared before this returns the future, so no
    /// privileged state is visible while the identity service confirms.
    pub fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send + use<> {
        let generation = self.next_generation();
        self.state.send_replace(AuthSnapshot::signed_out());
        tracing::info!(generation, "signed out locally");

        let identity = Arc::clone(&self.identity);
        async move {
            identity
                .sign_out()
                .await
                .inspect_err(|err| tracing::warn!(code = err.code(), "remote sign-out failed"))
        }
    }

    /// Re-fetch the current user's rows.
    ///
    /// This is the mutation path for consumers: after changing data through
    /// the platform, call this rather than editing the snapshot.
    pub async fn refresh(&self) {
        let user = self.state.borrow().user.clone();
        let Some(user) = user else {
            return;
        };
        let generation = self.next_generation();
        self.load(user, generation).await;
    }

    /// Apply the synchronous half of a notification: publish the signed-out
    /// or resolving snapshot under `generation`. Returns the user whose rows
    /// still need loading.
    fn begin_change(&self, change: AuthStateChange, generation: u64) -> Option<User> {
        tracing::debug!(event = ?change.event, generation, "auth state change");

        let Some(session) = change.session else {
            self.publish_if_current(generation, AuthSnapshot::signed_out());
            return None;
        };

        let user = session.user;
        let same_user = self.state.borrow().user.as_ref().map(|u| u.id) == Some(user.id);
        if !same_user {
            // Sign-in transition: loading goes back to true until rows arrive.
            self.publish_if_current(generation, AuthSnapshot::resolving(user.clone()));
        }
        Some(user)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn load(&self, user: User, generation: u64) {
        let data = self.fetch_session_data(user.id).await;
        let snapshot = AuthSnapshot::resolved(user, data, self.clock.now());
        if !self.publish_if_current(generation, snapshot) {
            tracing::debug!(generation, "discarded stale session data");
        }
    }

    /// Publish `snapshot` unless a newer generation has started.
    fn publish_if_current(&self, generation: u64, snapshot: AuthSnapshot) -> bool {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = snapshot;
            true
        })
    }

    async fn fetch_session_data(&self, user_id: UserId) -> SessionData {
        let (profile, memberships, subscription, business) = tokio::join!(
            self.store.user_profile(user_id),
            self.store.chamber_memberships(user_id),
            self.store.subscription(user_id),
            self.store.current_business(user_id),
        );

        SessionData {
            profile: degrade(profile, "user_profiles", user_id).flatten(),
            memberships: degrade(memberships, "chamber_memberships", user_id).unwrap_or_default(),
            subscription: degrade(subscription, "subscriptions", user_id).flatten(),
            business: degrade(business, "businesses", user_id).flatten(),
        }
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

/// A failed read becomes "absent" so permissions can still be derived.
fn degrade<T>(result: Result<T, StoreError>, table: &'static str, user_id: UserId) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(StoreError::NotFound) => None,
        Err(err) => {
            tracing::warn!(%user_id, table, error = %err, "fetch failed; treating as absent");
            None
        }
    }
}

/// Change-feed loop. Holds only a weak reference so the context can drop.
///
/// Notifications are numbered and their synchronous part applied here, in
/// feed order. Only the row fetches run on separate tasks.
async fn listen(context: Weak<AuthContext>, mut feed: broadcast::Receiver<AuthStateChange>) {
    loop {
        let received = feed.recv().await;
        let Some(context) = context.upgrade() else {
            break;
        };

        let generation = context.next_generation();
        let change = match received {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "auth feed lagged; re-reading current session");
                let session = context.identity.current_session().await.unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "could not re-read session after lag");
                    None
                });
                AuthStateChange::new(AuthEvent::InitialSession, session)
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("auth feed closed");
                break;
            }
        };

        if let Some(user) = context.begin_change(change, generation) {
            tokio::spawn(async move { context.load(user, generation).await });
        }
    }
}
