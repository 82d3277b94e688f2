//! Route Guards
//!
//! A guard turns the current session (and for admin routes, the role) into
//! one of three answers. While anything is still resolving the answer is
//! [`GuardDecision::Loading`], never a redirect: a signed-in user reloading a
//! protected page must not be bounced to sign-in.

use ns_common::Identity;
use tracing::debug;

use super::{Resolution, RoleResolver};
use crate::routes::{Location, Redirect};
use crate::session::{SessionError, SessionService, SessionSnapshot};

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a loading indicator. Nothing protected is rendered.
    Loading,
    /// Render the protected content.
    Granted,
    /// Navigate away.
    Denied(Redirect),
}

impl GuardDecision {
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The redirect, when denied.
    pub const fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Denied(redirect) => Some(redirect),
            _ => None,
        }
    }
}

fn deny(sign_in_path: &str, location: &Location) -> GuardDecision {
    GuardDecision::Denied(Redirect::to_sign_in(sign_in_path, Some(location.clone())))
}

/// Guard for routes that need a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    sign_in_path: String,
}

impl AuthGuard {
    pub fn new(sign_in_path: impl Into<String>) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
        }
    }

    /// Decide from a snapshot.
    pub fn evaluate(&self, snapshot: &SessionSnapshot, location: &Location) -> GuardDecision {
        if snapshot.loading {
            GuardDecision::Loading
        } else if snapshot.is_authenticated() {
            GuardDecision::Granted
        } else {
            deny(&self.sign_in_path, location)
        }
    }

    /// Wait for the session to settle, then decide.
    pub async fn resolve(
        &self,
        session: &SessionService,
        location: &Location,
    ) -> Result<GuardDecision, SessionError> {
        let snapshot = session.settled().await?;
        let decision = self.evaluate(&snapshot, location);
        debug!(%location, ?decision, "Auth guard decided");
        Ok(decision)
    }
}

/// Guard for administrator-only routes.
#[derive(Clone)]
pub struct AdminGuard {
    sign_in_path: String,
    roles: RoleResolver,
}

impl AdminGuard {
    pub fn new(sign_in_path: impl Into<String>, roles: RoleResolver) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
            roles,
        }
    }

    /// Decide from a snapshot and the role lookup for its identity.
    ///
    /// Grants only when signed in, authenticated and the role is settled true.
    /// Everyone else, including signed-in non-admins, is sent to sign-in.
    pub fn evaluate(
        &self,
        snapshot: &SessionSnapshot,
        role: &Resolution<bool>,
        location: &Location,
    ) -> GuardDecision {
        if snapshot.loading {
            return GuardDecision::Loading;
        }
        if !snapshot.is_authenticated() {
            return deny(&self.sign_in_path, location);
        }
        match role {
            Resolution::Pending => GuardDecision::Loading,
            Resolution::Settled(true) => GuardDecision::Granted,
            Resolution::Settled(false) => deny(&self.sign_in_path, location),
        }
    }

    /// Wait for the session and the role lookup, then decide.
    ///
    /// A role answer is only used if the session still belongs to the identity
    /// it was asked for; otherwise the lookup starts over.
    pub async fn resolve(
        &self,
        session: &SessionService,
        location: &Location,
    ) -> Result<GuardDecision, SessionError> {
        let mut snapshots = session.subscribe();
        loop {
            let snapshot = snapshots
                .wait_for(|s| !s.loading)
                .await
                .map(|s| s.clone())
                .map_err(|_| SessionError::Stopped)?;

            let Some(identity) = authenticated_identity(&snapshot) else {
                let decision = self.evaluate(&snapshot, &Resolution::Pending, location);
                debug!(%location, ?decision, "Admin guard decided without role");
                return Ok(decision);
            };

            let mut lookup = self.roles.watch(&identity);
            let role = lookup
                .wait_for(Resolution::is_settled)
                .await
                .map_or(Resolution::Settled(false), |r| *r);

            let current = session.snapshot();
            if current.loading || authenticated_identity(&current).map(|i| i.uid) != Some(identity.uid)
            {
                debug!("Session changed during role lookup, discarding result");
                continue;
            }

            let decision = self.evaluate(&current, &role, location);
            debug!(%location, ?decision, "Admin guard decided");
            return Ok(decision);
        }
    }
}

fn authenticated_identity(snapshot: &SessionSnapshot) -> Option<Identity> {
    snapshot
        .identity
        .clone()
        .filter(|_| snapshot.is_authenticated())
}
