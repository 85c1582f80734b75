//! CLI subcommands.

pub mod auth;
pub mod cart;
pub mod categories;
pub mod images;
pub mod products;

use std::io::Write;

use thiserror::Error;

use bazaar_storefront::AppError;
use bazaar_storefront::api::ApiError;
use bazaar_storefront::cart::CartError;
use bazaar_storefront::catalog::{CatalogError, ProductSummary};

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    /// Writing to the terminal failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for CliError {
    fn from(e: ApiError) -> Self {
        Self::App(e.into())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::App(e.into())
    }
}

impl From<CartError> for CliError {
    fn from(e: CartError) -> Self {
        Self::App(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.into())
    }
}

/// One line per product: id, name, price, stock.
fn write_summary(out: &mut impl Write, product: &ProductSummary) -> std::io::Result<()> {
    let price = &product.price;
    let was = price
        .original
        .filter(|original| *original > price.current)
        .map(|original| format!(" (was {original:.2})"))
        .unwrap_or_default();
    let rating = product
        .reviews
        .map(|r| format!("  {:.1}* ({})", r.average, r.total))
        .unwrap_or_default();
    writeln!(
        out,
        "{:<14} {:<40} {}{:.2}{was}  [{}]{rating}",
        product.id.as_str(),
        product.name,
        price.currency_code.symbol(),
        price.current,
        product.inventory_status.label(),
    )
}
