//! Bazaar CLI - browse the marketplace and manage a cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse active products
//! bazaar products list --page 2 --search tote
//! bazaar products show p-123
//! bazaar products deals
//!
//! # Categories
//! bazaar categories
//! bazaar categories --parent services
//!
//! # Cart (guest until signed in)
//! bazaar cart add p-123 --quantity 2
//! bazaar cart show
//!
//! # Sign in with a token issued by the marketplace (merges the guest cart)
//! bazaar login --user-id u-42 --token "$BAZAAR_TOKEN"
//! bazaar logout
//!
//! # Image cache
//! bazaar images preload
//! ```
//!
//! Configuration comes from the environment; see `bazaar_storefront::config`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_storefront::Storefront;
use bazaar_storefront::config::StorefrontConfig;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// List categories
    Categories {
        /// Only subcategories of this parent id or slug
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in with a marketplace access token and merge the guest cart
    Login {
        #[arg(long)]
        user_id: String,

        #[arg(long, env = "BAZAAR_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Sign out and reset the cart
    Logout,
    /// Manage the image cache
    Images {
        #[command(subcommand)]
        action: ImagesAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List active products
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        per_page: u32,

        #[arg(short, long)]
        search: Option<String>,

        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Show {
        product_id: String,

        /// Print the product as JSON
        #[arg(long)]
        json: bool,
    },
    /// List discounted products
    Deals {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its totals
    Show,
    /// Add a product
    Add {
        product_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Change the quantity of a line (0 removes it)
    Update { product_id: String, quantity: u32 },
    /// Remove a product
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum ImagesAction {
    /// Cache one image and print its local URL
    Fetch { url: String },
    /// Cache the main images of recently listed products
    Preload {
        #[arg(short, long, default_value_t = bazaar_storefront::cache::DEFAULT_PRELOAD_IMAGES)]
        max: usize,

        /// Print `<link rel="preload">` hints instead of fetching
        #[arg(long)]
        hints: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// No subscriber exists yet when configuration fails, so write directly.
#[allow(clippy::print_stderr)]
fn report_config_error(e: &bazaar_storefront::config::ConfigError) {
    eprintln!("Configuration error: {e}");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        match &e {
            CliError::App(app) => {
                app.report();
                tracing::error!("{}", app.user_message());
            }
            CliError::Io(_) => tracing::error!("Command failed: {e}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::new(config)?;
    storefront.restore_session().await;

    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::List {
                page,
                per_page,
                search,
                category,
            } => {
                commands::products::list(
                    &storefront,
                    page,
                    per_page,
                    search.as_deref(),
                    category.as_deref(),
                )
                .await?;
            }
            ProductsAction::Show { product_id, json } => {
                commands::products::show(&storefront, &product_id, json).await?;
            }
            ProductsAction::Deals { limit } => {
                commands::products::deals(&storefront, limit).await?;
            }
        },
        Commands::Categories { parent } => {
            commands::categories::list(&storefront, parent.as_deref()).await?;
        }
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&storefront, &product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&storefront, &product_id, quantity).await?,
            CartAction::Remove { product_id } => {
                commands::cart::remove(&storefront, &product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Login { user_id, token } => {
            commands::auth::login(&storefront, user_id, token).await?;
        }
        Commands::Logout => commands::auth::logout(&storefront).await?,
        Commands::Images { action } => match action {
            ImagesAction::Fetch { url } => commands::images::fetch(&storefront, &url).await?,
            ImagesAction::Preload { max, hints } => {
                commands::images::preload(&storefront, max, hints).await?;
            }
        },
    }
    Ok(())
}
