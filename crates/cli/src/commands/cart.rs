//! Cart commands. Operate on the guest cart until a buyer signs in.

use std::io::Write;

use bazaar_core::ProductId;
use bazaar_storefront::Storefront;
use bazaar_storefront::cart::SessionKind;

use super::CliError;

/// Print the cart lines and totals.
pub async fn show(storefront: &Storefront) -> Result<(), CliError> {
    let kind = storefront.session_kind().await;
    let cart = storefront.cart();
    let items = cart.items(kind);

    let mut out = std::io::stdout().lock();
    let source = match kind {
        SessionKind::Guest => "guest cart",
        SessionKind::Authenticated => "server cart",
    };
    if items.is_empty() {
        writeln!(out, "Your {source} is empty.")?;
        return Ok(());
    }

    writeln!(out, "{source}:")?;
    for item in &items {
        writeln!(
            out,
            "  {:<14} {:<36} x{:<3} {:.2}",
            item.id.as_str(),
            item.product.name,
            item.quantity,
            item.line_total()
        )?;
    }

    let totals = cart.totals(kind);
    writeln!(out)?;
    writeln!(out, "  Items     {}", totals.item_count)?;
    writeln!(out, "  Subtotal  {}", totals.subtotal)?;
    writeln!(out, "  Shipping  {}", totals.shipping)?;
    writeln!(out, "  Tax       {}", totals.tax)?;
    writeln!(out, "  Total     {}", totals.total)?;
    if let Some(error) = cart.error() {
        writeln!(out, "\n  ! {error}")?;
    }
    Ok(())
}

/// Look the product up and add it.
pub async fn add(storefront: &Storefront, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let product = storefront
        .catalog()
        .product(&ProductId::from(product_id))
        .await?;
    let name = product.name.clone();
    let kind = storefront.session_kind().await;
    storefront.cart().add_item(kind, product, quantity).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Added {quantity} x {name}.")?;
    Ok(())
}

pub async fn update(storefront: &Storefront, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let kind = storefront.session_kind().await;
    storefront
        .cart()
        .update_quantity(kind, &ProductId::from(product_id), quantity)
        .await?;
    Ok(())
}

pub async fn remove(storefront: &Storefront, product_id: &str) -> Result<(), CliError> {
    let kind = storefront.session_kind().await;
    storefront
        .cart()
        .remove_item(kind, &ProductId::from(product_id))
        .await?;
    Ok(())
}

pub async fn clear(storefront: &Storefront) -> Result<(), CliError> {
    let kind = storefront.session_kind().await;
    storefront.cart().clear_cart(kind).await?;
    Ok(())
}
