//! Product browsing commands.

use std::io::Write;

use bazaar_core::ProductId;
use bazaar_storefront::AppError;
use bazaar_storefront::Storefront;
use bazaar_storefront::catalog::ListingQuery;

use super::{CliError, write_summary};

/// List one page of active products, optionally within a category.
pub async fn list(
    storefront: &Storefront,
    page: u32,
    per_page: u32,
    search: Option<&str>,
    category: Option<&str>,
) -> Result<(), CliError> {
    let query = ListingQuery::new(page, per_page).search(search);
    let catalog = storefront.catalog();

    let listing = match category {
        Some(wanted) => {
            let tree = catalog.categories().await;
            let category = tree
                .find(wanted)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown category: {wanted}")))?;
            catalog
                .products_by_category(Some(&category.id), &query)
                .await?
        }
        None => catalog.active_products(&query).await?,
    };
    // A single command never supersedes its own listing
    let Some(listing) = listing else {
        return Ok(());
    };

    let mut out = std::io::stdout().lock();
    if listing.products.is_empty() {
        writeln!(out, "No products found.")?;
        return Ok(());
    }
    for product in &listing.products {
        write_summary(&mut out, product)?;
    }
    let pagination = &listing.pagination;
    writeln!(
        out,
        "\nPage {} of {} ({} products)",
        pagination.current_page, pagination.total_pages, pagination.total_items
    )?;
    Ok(())
}

/// Show one product in detail and record the view.
pub async fn show(storefront: &Storefront, product_id: &str, json: bool) -> Result<(), CliError> {
    let product_id = ProductId::from(product_id);
    let product = storefront.catalog().product(&product_id).await?;
    storefront.catalog().track_view(&product_id).await;

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &product)?;
        writeln!(out)?;
        return Ok(());
    }

    let price = &product.price;
    writeln!(out, "{} ({})", product.name, product.id)?;
    writeln!(out, "Sold by {}", product.store_name)?;
    write!(out, "Price: {}{:.2}", price.currency_code.symbol(), price.current)?;
    if let Some(discount) = &price.discount {
        write!(out, "  -{}%", discount.percentage)?;
    }
    writeln!(out)?;
    writeln!(out, "Stock: {}", product.inventory.status.label())?;
    match product.reviews {
        Some(reviews) => writeln!(out, "Rating: {:.1} ({} reviews)", reviews.average, reviews.total)?,
        None => writeln!(out, "Rating: no reviews yet")?,
    }
    if !product.estimated_delivery.is_empty() {
        writeln!(out, "Delivery: {}", product.estimated_delivery)?;
    }
    if !product.description.is_empty() {
        writeln!(out, "\n{}", product.description)?;
    }
    Ok(())
}

/// List discounted products.
pub async fn deals(storefront: &Storefront, limit: usize) -> Result<(), CliError> {
    let deals = storefront.catalog().flash_deals(limit).await?;

    let mut out = std::io::stdout().lock();
    if deals.is_empty() {
        writeln!(out, "No deals right now.")?;
    }
    for product in &deals {
        write_summary(&mut out, product)?;
    }
    Ok(())
}
