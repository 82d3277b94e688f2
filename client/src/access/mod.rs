//! Access control: who may see what.

mod guard;
mod role;
mod subscription;

pub use guard::{AdminGuard, AuthGuard, GuardDecision};
pub use role::RoleResolver;
pub use subscription::{PremiumAccess, SubscriptionResolver};

/// Result of an asynchronous lookup that may still be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution<T> {
    /// Not decided yet. Neither "allow" nor "deny".
    #[default]
    Pending,
    /// The lookup finished.
    Settled(T),
}

impl<T> Resolution<T> {
    /// Whether the lookup finished.
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    /// The settled value.
    pub const fn settled(&self) -> Option<&T> {
        match self {
            Self::Settled(value) => Some(value),
            Self::Pending => None,
        }
    }
}

impl Resolution<bool> {
    /// `(value, still_loading)`; the value is `false` while loading.
    pub const fn as_flags(&self) -> (bool, bool) {
        match self {
            Self::Pending => (false, true),
            Self::Settled(value) => (*value, false),
        }
    }
}
