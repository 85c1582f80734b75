//! Merging the guest cart into the server cart after sign-in.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use bazaar_core::{CartItemId, ProductId};

use super::{CartBackend, CartError, CartItem, CartStore};
use crate::api::{AddCartItemRequest, UpdateCartItemRequest};

/// What a migration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Server lines whose quantity was raised by the guest quantity.
    pub updated: usize,
    /// Guest products added as new server lines.
    pub added: usize,
    /// Adds skipped because the product was already on the server.
    pub skipped: usize,
    /// Merge steps that failed and were logged.
    pub failed: usize,
    /// Whether the closing server reload succeeded. When it fails the
    /// error is recorded on the store and the view keeps the last loaded
    /// server items.
    pub reloaded: bool,
    /// Whether the guest cart was emptied afterwards.
    pub guest_cleared: bool,
}

/// Result of [`CartStore::migrate_guest_cart_on_login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Another migration is running; nothing was done.
    AlreadyRunning,
    /// No guest items; the server cart was loaded.
    NothingToMigrate,
    Migrated(MigrationReport),
}

/// Clears the migration flag when dropped.
struct MigrationGuard<'a>(&'a AtomicBool);

impl Drop for MigrationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct PendingAdd {
    product_id: ProductId,
    quantity: u32,
}

struct PendingUpdate {
    cart_item_id: CartItemId,
    quantity: u32,
}

/// Split guest lines into quantity updates of existing server lines and adds.
fn plan(guest: &[CartItem], server: &[CartItem]) -> (Vec<PendingUpdate>, Vec<PendingAdd>) {
    let mut updates = Vec::new();
    let mut adds = Vec::new();

    for guest_line in guest {
        let Some(server_line) = server.iter().find(|s| s.id == guest_line.id) else {
            adds.push(PendingAdd {
                product_id: guest_line.id.clone(),
                quantity: guest_line.quantity,
            });
            continue;
        };

        let combined = server_line.quantity.saturating_add(guest_line.quantity);
        match &server_line.cart_item_id {
            Some(cart_item_id) => updates.push(PendingUpdate {
                cart_item_id: cart_item_id.clone(),
                quantity: combined,
            }),
            None => adds.push(PendingAdd {
                product_id: guest_line.id.clone(),
                quantity: combined,
            }),
        }
    }

    (updates, adds)
}

impl<B: CartBackend> CartStore<B> {
    /// Merge the guest cart into the signed-in buyer's server cart.
    ///
    /// Products in both carts get the summed quantity; guest-only products
    /// are added. Before each add the server cart is reloaded and the add is
    /// skipped if the product is already there, so running twice (or a
    /// backend that merges on add) never duplicates lines. Individual merge
    /// failures are logged and skipped.
    ///
    /// The guest cart is cleared only if it still equals the snapshot taken
    /// at the start. Once merge steps have reached the server the guest lines
    /// are spent, so a failed closing reload is recorded and logged but does
    /// not keep them around to be merged a second time.
    ///
    /// # Errors
    ///
    /// Returns the load error when there were no guest items to merge.
    #[instrument(skip(self))]
    pub async fn migrate_guest_cart_on_login(&self) -> Result<MigrationOutcome, CartError> {
        if self
            .migrating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("cart migration already in progress, skipping");
            return Ok(MigrationOutcome::AlreadyRunning);
        }
        let _guard = MigrationGuard(&self.migrating);

        let snapshot = self.with_state(|state| state.guest_items.clone());
        if snapshot.is_empty() {
            info!("no guest items, loading server cart");
            self.load_server_cart().await?;
            return Ok(MigrationOutcome::NothingToMigrate);
        }
        info!(guest_items = snapshot.len(), "starting cart migration");
        let _loading = self.begin_request();

        let server = match self.load_server_cart().await {
            Ok(()) => self.with_state(|state| state.server_items.clone()),
            Err(e) => {
                warn!(error = %e, "failed to load server cart, adding guest items as new");
                Vec::new()
            }
        };

        let (updates, adds) = plan(&snapshot, &server);
        let mut report = MigrationReport::default();

        for update in updates {
            let body = UpdateCartItemRequest {
                cart_item_id: update.cart_item_id.clone(),
                quantity: update.quantity,
            };
            match self.backend().update_item(body).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!(cart_item_id = %update.cart_item_id, error = %e, "failed to update cart item");
                    report.failed += 1;
                }
            }
        }

        self.reload_for_merge().await;
        for add in adds {
            self.reload_for_merge().await;
            let already_there = self.with_state(|state| {
                state
                    .server_items
                    .iter()
                    .any(|i| i.id == add.product_id && i.cart_item_id.is_some())
            });
            if already_there {
                info!(product_id = %add.product_id, "already in server cart, skipping add");
                report.skipped += 1;
                continue;
            }

            let body = AddCartItemRequest {
                product_id: add.product_id.clone(),
                quantity: add.quantity,
            };
            match self.backend().add_item(body).await {
                Ok(()) => report.added += 1,
                Err(e) => {
                    warn!(product_id = %add.product_id, error = %e, "failed to add cart item");
                    report.failed += 1;
                }
            }
        }

        match self.load_server_cart().await {
            Ok(()) => report.reloaded = true,
            Err(e) => warn!(error = %e, "server cart reload after migration failed"),
        }

        report.guest_cleared = self.with_state(|state| {
            if state.guest_items == snapshot {
                state.guest_items.clear();
                true
            } else {
                false
            }
        });
        if report.guest_cleared {
            self.persist();
            info!(?report, "cart migration completed");
        } else {
            warn!("guest cart changed during migration, keeping it");
        }
        Ok(MigrationOutcome::Migrated(report))
    }

    /// Reload between merge steps; a failure keeps the last known server items.
    async fn reload_for_merge(&self) {
        if let Err(e) = self.load_server_cart().await {
            warn!(error = %e, "cart reload during migration failed");
        }
    }
}
