//! Category listing.

use std::io::Write;

use bazaar_storefront::Storefront;
use bazaar_storefront::catalog::Category;

use super::CliError;

/// Print the main categories with their subcategories, or the children of
/// `parent` only.
pub async fn list(storefront: &Storefront, parent: Option<&str>) -> Result<(), CliError> {
    let tree = storefront.catalog().categories().await;
    let mut out = std::io::stdout().lock();

    if let Some(parent) = parent {
        // Accept a slug as well as an id
        let parent_id = tree.find(parent).map_or(parent, |c| c.id.as_str());
        for category in tree.subcategories(parent_id) {
            write_category(&mut out, category, 0)?;
        }
        return Ok(());
    }

    for main in tree.main_categories() {
        write_category(&mut out, main, 0)?;
        for child in tree.subcategories(main.id.as_str()) {
            write_category(&mut out, child, 1)?;
        }
    }
    Ok(())
}

fn write_category(out: &mut impl Write, category: &Category, depth: usize) -> std::io::Result<()> {
    let count = category
        .product_count
        .map(|n| format!(" ({n})"))
        .unwrap_or_default();
    writeln!(
        out,
        "{:indent$}{} [{}]{count}",
        "",
        category.name,
        category.slug,
        indent = depth * 2
    )
}
