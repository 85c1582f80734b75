//! Reacting to sign-in and sign-out.
//!
//! [`CartSync`] remembers the last authentication snapshot it saw and turns
//! each transition into exactly one cart action.

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use bazaar_core::UserId;

use super::{CartBackend, CartStore};
use crate::error::{clear_sentry_user, set_sentry_user};

/// Authentication state as observed by the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub user_id: Option<UserId>,
}

impl AuthSnapshot {
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            user_id: None,
        }
    }

    #[must_use]
    pub fn signed_in(user_id: impl Into<UserId>) -> Self {
        Self {
            is_authenticated: true,
            user_id: Some(user_id.into()),
        }
    }
}

/// What a transition asked the cart to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Signed in: merge the guest cart into the server cart.
    Migrate,
    /// Signed out: reset the cart.
    Reset,
    /// Another user signed in: reload the server cart.
    Reload,
}

impl SyncAction {
    /// Action for the move from `previous` to `current`, if any.
    #[must_use]
    pub fn for_transition(previous: &AuthSnapshot, current: &AuthSnapshot) -> Option<Self> {
        match (previous.is_authenticated, current.is_authenticated) {
            (false, true) if current.user_id.is_some() => Some(Self::Migrate),
            (true, false) => Some(Self::Reset),
            (true, true) if previous.user_id != current.user_id => Some(Self::Reload),
            _ => None,
        }
    }
}

/// Auth transition observer.
#[derive(Debug)]
pub struct CartSync {
    previous: Mutex<AuthSnapshot>,
}

impl Default for CartSync {
    fn default() -> Self {
        Self::new()
    }
}

impl CartSync {
    /// Start from a signed-out state, so an already signed-in first
    /// observation migrates.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: Mutex::new(AuthSnapshot::signed_out()),
        }
    }

    /// Start from a known snapshot without triggering anything for it.
    #[must_use]
    pub const fn starting_from(snapshot: AuthSnapshot) -> Self {
        Self {
            previous: Mutex::new(snapshot),
        }
    }

    /// Record `current` and run the action its transition calls for.
    ///
    /// Returns the action taken. Failures are logged, never returned; the
    /// transition is consumed either way.
    pub async fn observe<B: CartBackend>(
        &self,
        store: &CartStore<B>,
        current: AuthSnapshot,
    ) -> Option<SyncAction> {
        let action = {
            let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
            let action = SyncAction::for_transition(&previous, &current);
            *previous = current.clone();
            action
        }?;

        match action {
            SyncAction::Migrate => {
                if let Some(user_id) = &current.user_id {
                    set_sentry_user(user_id, None);
                }
                info!(user_id = ?current.user_id, "signed in, migrating guest cart");
                if let Err(e) = store.migrate_guest_cart_on_login().await {
                    warn!(error = %e, "guest cart migration failed");
                }
            }
            SyncAction::Reset => {
                info!("signed out, resetting cart");
                clear_sentry_user();
                store.handle_logout();
            }
            SyncAction::Reload => {
                if let Some(user_id) = &current.user_id {
                    set_sentry_user(user_id, None);
                }
                info!(user_id = ?current.user_id, "user changed, reloading server cart");
                if let Err(e) = store.load_server_cart().await {
                    warn!(error = %e, "server cart reload failed");
                }
            }
        }
        Some(action)
    }
}
