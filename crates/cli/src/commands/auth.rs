//! Sign-in and sign-out.

use std::io::Write;

use secrecy::SecretString;

use bazaar_core::UserId;
use bazaar_storefront::Storefront;
use bazaar_storefront::cart::{SessionKind, SyncAction};
use bazaar_storefront::state::AuthSession;

use super::CliError;

/// Store the buyer's token and merge the guest cart into their server cart.
pub async fn login(storefront: &Storefront, user_id: String, token: String) -> Result<(), CliError> {
    let session = AuthSession {
        user_id: UserId::new(user_id),
        token: SecretString::from(token),
    };
    let action = storefront.sign_in(session).await;

    let mut out = std::io::stdout().lock();
    match action {
        Some(SyncAction::Migrate) => {
            let count = storefront.cart().item_count(SessionKind::Authenticated);
            writeln!(out, "Signed in. Your cart has {count} item(s).")?;
        }
        Some(SyncAction::Reload) => writeln!(out, "Switched account.")?,
        Some(SyncAction::Reset) | None => writeln!(out, "Already signed in.")?,
    }
    if let Some(error) = storefront.cart().error() {
        writeln!(out, "Cart sync problem: {error}")?;
    }
    Ok(())
}

pub async fn logout(storefront: &Storefront) -> Result<(), CliError> {
    let action = storefront.sign_out().await;

    let mut out = std::io::stdout().lock();
    if action == Some(SyncAction::Reset) {
        writeln!(out, "Signed out.")?;
    } else {
        writeln!(out, "Not signed in.")?;
    }
    Ok(())
}
