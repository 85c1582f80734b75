//! Image cache commands.

use std::io::Write;

use bazaar_storefront::Storefront;
use bazaar_storefront::cache::ImageSource;

use super::CliError;

/// Cache one image and print where it can be loaded from.
pub async fn fetch(storefront: &Storefront, url: &str) -> Result<(), CliError> {
    let source = storefront.images().resolve(url).await;

    let mut out = std::io::stdout().lock();
    match &source {
        ImageSource::Cached(image) => match &image.path {
            Some(path) => writeln!(out, "{} ({} bytes)", path.display(), image.bytes.len())?,
            None => writeln!(out, "cached in memory ({} bytes)", image.bytes.len())?,
        },
        ImageSource::Remote(url) => writeln!(out, "not cached, use {url}")?,
        ImageSource::Empty => writeln!(out, "no image")?,
    }
    Ok(())
}

/// Warm the image cache from recently listed products.
pub async fn preload(storefront: &Storefront, max: usize, hints: bool) -> Result<(), CliError> {
    let session = storefront.catalog().session();
    let mut out = std::io::stdout().lock();

    if hints {
        for hint in session.preload_hints(max) {
            writeln!(out, "{hint}")?;
        }
        return Ok(());
    }

    let urls = session.preload_image_urls(max);
    let total = urls.len();
    let cached = storefront.images().preload(urls).await;
    writeln!(out, "Cached {cached} of {total} images.")?;
    Ok(())
}
