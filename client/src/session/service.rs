//! Session Service
//!
//! One background task consumes the identity provider's reports and the
//! vault's revocations, in order, and is the only writer of the identity
//! part of the [`SessionSnapshot`]. User actions go through the provider and
//! come back as reports.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ns_common::Identity;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    CredentialVault, Notice, NoticeLevel, Revocation, SessionError, SessionEvent, SessionSnapshot,
};
use crate::api::ApiClient;
use crate::identity::{
    ExternalCredential, IdentityError, IdentityProvider, ProfileUpdate, ProviderState,
};
use crate::routes::{Location, Redirect};

/// Session service settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the provider's first report.
    pub identity_timeout: Duration,
    /// How long user actions wait for the session to settle.
    pub settle_timeout: Duration,
    /// Where forced sign-outs send the user.
    pub sign_in_path: String,
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar_url: Option<String>,
}

/// Local password rules, checked before contacting the provider.
fn validate_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < 6 {
        return Err(IdentityError::WeakPassword(
            "must be at least 6 characters".into(),
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(IdentityError::WeakPassword(
            "must contain an upper-case letter".into(),
        ));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(IdentityError::WeakPassword(
            "must contain a lower-case letter".into(),
        ));
    }
    Ok(())
}

struct Shared {
    provider: Arc<dyn IdentityProvider>,
    vault: Arc<CredentialVault>,
    api: ApiClient,
    snapshot: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    /// Last provider report the task finished resolving.
    applied: watch::Sender<ProviderState>,
    /// Owned by the task: a report is being resolved.
    resolving: AtomicBool,
    /// User actions still in flight.
    pending: AtomicUsize,
    config: SessionConfig,
}

impl Shared {
    /// `loading` is derived, never written directly.
    fn is_busy(&self) -> bool {
        self.resolving.load(Ordering::SeqCst) || self.pending.load(Ordering::SeqCst) > 0
    }

    /// Recompute `loading` under the snapshot lock after a counter changed.
    fn refresh_loading(&self) {
        self.snapshot.send_if_modified(|s| {
            let loading = self.is_busy();
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }

    fn begin_resolving(&self, identity: Option<Identity>) {
        self.resolving.store(true, Ordering::SeqCst);
        self.snapshot.send_modify(|s| {
            if identity.is_some() {
                s.identity = identity;
            }
            s.loading = true;
        });
    }

    fn publish(&self, identity: Option<Identity>, authenticated: bool) {
        debug!(
            signed_in = identity.is_some(),
            authenticated, "Session settled"
        );
        self.resolving.store(false, Ordering::SeqCst);
        self.snapshot.send_modify(|s| {
            s.identity = identity;
            s.authenticated = authenticated;
            s.loading = self.is_busy();
        });
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        // No subscribers is fine
        let _ = self.events.send(SessionEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }

    /// Resolve one provider report.
    async fn apply(&self, state: ProviderState) {
        match &state {
            ProviderState::Initializing => {}
            ProviderState::SignedOut => {
                self.begin_resolving(None);
                self.vault.clear().await;
                self.publish(None, false);
            }
            ProviderState::SignedIn(identity) => {
                let previous = self.snapshot.borrow().identity.clone();
                self.begin_resolving(Some(identity.clone()));

                // A token never carries over to a different identity
                if previous.is_some_and(|p| p.uid != identity.uid) {
                    debug!("Identity changed, discarding the previous session token");
                    self.vault.clear().await;
                }

                if self.vault.activate().await {
                    debug!("Reusing stored session token");
                    self.publish(Some(identity.clone()), true);
                } else {
                    self.exchange(identity).await;
                }
            }
        }
        self.applied.send_replace(state);
    }

    async fn exchange(&self, identity: &Identity) {
        match self.api.exchange_token(&identity.email).await {
            Ok(token) => match self.vault.install(&token).await {
                Ok(()) => {
                    info!("Session token issued");
                    self.publish(Some(identity.clone()), true);
                }
                Err(e) => {
                    error!("Failed to persist session token: {}", e);
                    self.publish(Some(identity.clone()), false);
                }
            },
            Err(e) => {
                warn!("Token exchange failed, session stays unauthenticated: {}", e);
                self.publish(Some(identity.clone()), false);
            }
        }
    }

    /// Wait until the task has resolved the provider's current report.
    async fn await_applied(&self) {
        let target = self.provider.state().borrow().clone();
        let mut applied = self.applied.subscribe();
        let settled = tokio::time::timeout(self.config.settle_timeout, async {
            applied.wait_for(|state| *state == target).await.is_ok()
        })
        .await;
        if !matches!(settled, Ok(true)) {
            warn!("Session did not resolve the provider report in time");
        }
    }

    /// The backend rejected the session: sign out and send the user to sign-in.
    async fn force_sign_out(&self, revocation: Revocation) {
        info!(status = revocation.status, "Forcing sign-out");
        if let Err(e) = self.provider.sign_out().await {
            warn!("Identity provider sign-out failed: {}", e);
        }
        self.publish(None, false);
        self.notify(NoticeLevel::Error, "Your session has expired. Please sign in again.");
        let _ = self.events.send(SessionEvent::Redirect(Redirect::to_sign_in(
            &self.config.sign_in_path,
            None,
        )));
    }
}

/// Marks a user action as in flight until dropped, including when the
/// caller abandons the future.
struct PendingAction<'a> {
    shared: &'a Shared,
}

impl<'a> PendingAction<'a> {
    fn start(shared: &'a Shared) -> Self {
        shared.pending.fetch_add(1, Ordering::SeqCst);
        shared.refresh_loading();
        Self { shared }
    }
}

impl Drop for PendingAction<'_> {
    fn drop(&mut self) {
        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
        self.shared.refresh_loading();
    }
}

async fn run(
    shared: Arc<Shared>,
    mut reports: watch::Receiver<ProviderState>,
    mut revocations: mpsc::UnboundedReceiver<Revocation>,
) {
    let first = tokio::time::timeout(shared.config.identity_timeout, async {
        reports
            .wait_for(|s| *s != ProviderState::Initializing)
            .await
            .map(|state| state.clone())
    })
    .await;

    match first {
        Ok(Ok(state)) => shared.apply(state).await,
        Ok(Err(_)) => {
            warn!("Identity provider went away before reporting");
            shared.vault.suspend().await;
            shared.publish(None, false);
            return;
        }
        Err(_) => {
            // A stored token alone is not trusted without a provider report.
            warn!(
                timeout = ?shared.config.identity_timeout,
                "Identity provider did not report in time, treating as signed out"
            );
            shared.vault.suspend().await;
            shared.publish(None, false);
        }
    }

    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    info!("Identity provider closed, session service stopping");
                    break;
                }
                let state = reports.borrow_and_update().clone();
                shared.apply(state).await;
            }
            Some(revocation) = revocations.recv() => {
                shared.force_sign_out(revocation).await;
            }
        }
    }
}

/// Handle to the running session service. Cheap to clone.
#[derive(Clone)]
pub struct SessionService {
    shared: Arc<Shared>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionService {
    /// Start listening to `provider`. Call once at application start.
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        vault: Arc<CredentialVault>,
        revocations: mpsc::UnboundedReceiver<Revocation>,
        api: ApiClient,
        config: SessionConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::initial());
        let (events, _) = broadcast::channel(64);
        let (applied, _) = watch::channel(ProviderState::Initializing);
        let reports = provider.state();

        let shared = Arc::new(Shared {
            provider,
            vault,
            api,
            snapshot,
            events,
            applied,
            resolving: AtomicBool::new(true),
            pending: AtomicUsize::new(0),
            config,
        });

        info!("Session service starting");
        let task = tokio::spawn(run(Arc::clone(&shared), reports, revocations));

        Self {
            shared,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Stop the background task. Snapshots stay readable.
    pub fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            info!("Session service shutting down");
            task.abort();
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Subscribe to snapshots. The current one is visible immediately.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Subscribe to notices and redirects.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Route used for sign-in redirects.
    pub fn sign_in_path(&self) -> &str {
        &self.shared.config.sign_in_path
    }

    /// Wait until no resolution is in progress.
    pub async fn settled(&self) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.subscribe();
        rx.wait_for(|s| !s.loading)
            .await
            .map(|s| s.clone())
            .map_err(|_| SessionError::Stopped)
    }

    /// Run a provider call with the loading flag raised.
    ///
    /// On success the action stays in flight until the session task has
    /// resolved the provider's report. On failure the flag falls back to
    /// whatever the task is doing and the user gets a notice.
    async fn mutate<T, F>(&self, action: &'static str, call: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, IdentityError>>,
    {
        let _pending = PendingAction::start(&self.shared);
        match call.await {
            Ok(value) => {
                self.shared.await_applied().await;
                Ok(value)
            }
            Err(e) => {
                warn!(action, "Identity provider refused: {}", e);
                let level = if e == IdentityError::Cancelled {
                    NoticeLevel::Info
                } else {
                    NoticeLevel::Error
                };
                self.shared.notify(level, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Create an email/password account and set its profile.
    pub async fn sign_up(&self, form: SignUp) -> Result<Identity, SessionError> {
        if let Err(e) = validate_password(&form.password) {
            self.shared.notify(NoticeLevel::Error, e.to_string());
            return Err(e.into());
        }

        let provider = Arc::clone(&self.shared.provider);
        self.mutate("sign-up", async move {
            provider.create_user(&form.email, &form.password).await?;
            provider
                .update_profile(ProfileUpdate {
                    display_name: Some(form.name),
                    avatar_url: form.avatar_url,
                })
                .await
        })
        .await
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        self.mutate(
            "sign-in",
            self.shared.provider.sign_in_with_password(email, password),
        )
        .await
    }

    /// Sign in with an external provider's credential.
    pub async fn sign_in_with(
        &self,
        credential: ExternalCredential,
    ) -> Result<Identity, SessionError> {
        self.mutate(
            "external sign-in",
            self.shared.provider.sign_in_with_credential(credential),
        )
        .await
    }

    /// Sign out.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.mutate("sign-out", self.shared.provider.sign_out()).await
    }

    /// Change display name and/or avatar.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, SessionError> {
        self.mutate("profile update", self.shared.provider.update_profile(update))
            .await
    }

    /// Sign in, wait for the backend session, and return where to go next:
    /// the location the user originally asked for, or home.
    pub async fn sign_in_and_resume(
        &self,
        email: &str,
        password: &str,
        redirect: Option<&Redirect>,
    ) -> Result<Location, SessionError> {
        let identity = self.sign_in(email, password).await?;

        let mut rx = self.subscribe();
        let settled = tokio::time::timeout(self.shared.config.settle_timeout, async {
            rx.wait_for(|s| {
                !s.loading && s.identity.as_ref().is_some_and(|i| i.uid == identity.uid)
            })
            .await
            .map(|s| s.clone())
        })
        .await
        .map_err(|_| SessionError::Timeout)?
        .map_err(|_| SessionError::Stopped)?;

        if !settled.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let destination = redirect.map_or_else(Location::home, Redirect::resume_target);
        info!(%destination, "Signed in");
        self.shared.notify(NoticeLevel::Info, "Signed in successfully");
        Ok(destination)
    }
}
