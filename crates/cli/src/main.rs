//! NFT Market CLI - Browse the catalog, manage the cart and check out.
//!
//! # Usage
//!
//! ```bash
//! # List the first page of NFTs
//! nft-market products list
//!
//! # Walk the infinite feed two pages deep
//! nft-market products feed --pages 2
//!
//! # Show one NFT
//! nft-market products show 42
//!
//! # Add it to the cart and check out
//! nft-market cart add 42
//! nft-market checkout
//! ```
//!
//! # Commands
//!
//! - `products` - List, page through and show catalog NFTs
//! - `cart` - Show and edit the persisted cart
//! - `checkout` - Run the simulated checkout against the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use nft_market_core::ProductId;
use nft_market_storefront::config::{DEFAULT_LIST_ROWS, StorefrontConfig};
use nft_market_storefront::error::AppError;
use nft_market_storefront::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "nft-market")]
#[command(author, version, about = "NFT storefront in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Show or edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Run the simulated checkout for the current cart
    Checkout,
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List one page of NFTs, sorted by ID
    List {
        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// NFTs per page
        #[arg(short, long, default_value_t = DEFAULT_LIST_ROWS)]
        rows: u32,
    },
    /// Load the infinite feed page by page
    Feed {
        /// Stop after this many pages (default: until exhausted)
        #[arg(short, long)]
        pages: Option<u32>,
    },
    /// Show a single NFT
    Show {
        /// NFT ID
        id: ProductId,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart contents and total
    Show,
    /// Add an NFT to the cart
    Add {
        /// NFT ID
        id: ProductId,
    },
    /// Remove an NFT from the cart
    Remove {
        /// NFT ID
        id: ProductId,
    },
    /// Set the quantity of an NFT; zero or below removes it
    Set {
        /// NFT ID
        id: ProductId,

        /// New quantity
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Increase the quantity of an NFT by one
    Inc {
        /// NFT ID
        id: ProductId,
    },
    /// Decrease the quantity of an NFT by one
    Dec {
        /// NFT ID
        id: ProductId,
    },
    /// Empty the cart
    Clear,
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
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nft_market_storefront=info,nft_market_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let state = AppState::new(config);

    if let Err(e) = run(cli, &state).await {
        e.report();
        tracing::error!("Command failed: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), AppError> {
    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::List { page, rows } => commands::products::list(state, page, rows).await?,
            ProductsAction::Feed { pages } => commands::products::feed(state, pages).await?,
            ProductsAction::Show { id } => commands::products::show(state, id).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(state),
            CartAction::Add { id } => commands::cart::add(state, id).await?,
            CartAction::Remove { id } => commands::cart::remove(state, id),
            CartAction::Set { id, quantity } => commands::cart::set(state, id, quantity),
            CartAction::Inc { id } => commands::cart::increment(state, id),
            CartAction::Dec { id } => commands::cart::decrement(state, id),
            CartAction::Clear => commands::cart::clear(state),
        },
        Commands::Checkout => commands::checkout::run(state).await?,
    }
    Ok(())
}
