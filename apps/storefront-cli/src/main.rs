//! # storefront
//!
//! Command-line front end for the storefront session and cart engine.
//!
//! ```text
//! storefront login ada@example.com --password secret
//! storefront cart add 7
//! storefront cart show
//! storefront checkout
//! storefront access /admin
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use storefront_client::{
    CartDiagnostic, ClientConfig, ClientEventEmitter, MutationOutcome, StorefrontClient,
};
use storefront_core::{CartTotals, EntityId, LineId, OrderStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "storefront", version, about = "Storefront session and cart client")]
struct Cli {
    /// Config file (default: platform config dir / client.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create a user account
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the session
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Inspect or change the cart
    #[command(subcommand)]
    Cart(CartCommand),
    /// Turn the cart into orders
    Checkout,
    /// Order one unit of a product without using the cart
    BuyNow { product_id: String },
    /// List orders (your own, or every order with --all as admin)
    Orders {
        #[arg(long)]
        all: bool,
    },
    /// Change an order's status (admin)
    OrderStatus { order_id: String, status: String },
    /// List the product catalog
    Products,
    /// Product and order figures (admin)
    Dashboard,
    /// Show where the access guard sends a path
    Access { path: String },
}

#[derive(Debug, Subcommand)]
enum CartCommand {
    Show,
    Add { product_id: String },
    Remove { line_id: String },
    Set { line_id: String, quantity: i64 },
}

// =============================================================================
// Event Output
// =============================================================================

/// Reports client events through the log.
struct LogEmitter;

impl ClientEventEmitter for LogEmitter {
    fn emit_navigation(&self, route: &str) {
        info!(route, "Navigate");
    }

    fn emit_cart_changed(&self, _totals: &CartTotals) {}

    fn emit_cart_diagnostic(&self, diagnostic: &CartDiagnostic) {
        warn!(
            operation = ?diagnostic.operation,
            line_id = %diagnostic.line_id,
            reason = %diagnostic.reason,
            "Cart change was undone"
        );
    }
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = ClientConfig::load_or_init(cli.config).context("loading configuration")?;
    let mut client = StorefrontClient::builder(config)
        .with_emitter(Arc::new(LogEmitter))
        .build()
        .await
        .context("building client")?;
    client.start().await?;

    let result = run(&client, cli.command).await;
    client.shutdown().await?;
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(client: &StorefrontClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let identity = client.session().login(&email, &password).await?;
            println!("Signed in as {} ({})", identity.name, identity.role);
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            client.session().register(&name, &email, &password).await?;
            println!("Account created for {email}. Sign in to continue.");
        }
        Command::Logout => {
            client.session().logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match client.session().identity() {
            Some(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
            None => println!("Not signed in"),
        },
        Command::Cart(cart) => run_cart(client, cart).await?,
        Command::Checkout => {
            let receipt = client.checkout().checkout().await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            if let Some(failure) = receipt.interrupted {
                bail!("checkout stopped at line {}: {}", failure.line_id, failure.reason);
            }
        }
        Command::BuyNow { product_id } => {
            let product = client
                .catalog()
                .get_product(&EntityId::from(product_id))
                .await?;
            let order = client.checkout().buy_now(&product).await?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Command::Dashboard => {
            let stats = client.orders().dashboard().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Orders { all } => {
            let orders = if all {
                client.orders().all_orders().await?
            } else {
                client.orders().my_orders().await?
            };
            println!("{}", serde_json::to_string_pretty(&orders)?);
        }
        Command::OrderStatus { order_id, status } => {
            let status: OrderStatus = status.parse()?;
            let order = client
                .orders()
                .update_status(&EntityId::from(order_id), status)
                .await?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Command::Products => {
            for product in client.catalog().list_products().await? {
                println!("{:>6}  {:<40} {}", product.id.to_string(), product.title, product.price);
            }
        }
        Command::Access { path } => {
            let decision = client.access(&path);
            match decision.redirect() {
                None => println!("{path}: allow"),
                Some(route) => println!("{path}: redirect to {route}"),
            }
        }
    }
    Ok(())
}

async fn run_cart(client: &StorefrontClient, command: CartCommand) -> anyhow::Result<()> {
    let cart = client.cart();
    let outcome = match command {
        CartCommand::Show => {
            let view = cart.view().await;
            for line in &view.lines {
                println!(
                    "{:>10}  {:<40} x{:<4} {}",
                    line.line_id.to_string(),
                    line.product.title,
                    line.quantity,
                    line.line_total()
                );
            }
            println!(
                "{} items, total {}",
                view.totals.item_count, view.totals.total_price
            );
            return Ok(());
        }
        CartCommand::Add { product_id } => {
            let product = client
                .catalog()
                .get_product(&EntityId::from(product_id))
                .await?;
            cart.add_to_cart(&product).await?
        }
        CartCommand::Remove { line_id } => cart.remove_from_cart(&LineId::parse(&line_id)).await?,
        CartCommand::Set { line_id, quantity } => {
            cart.update_quantity(&LineId::parse(&line_id), quantity)
                .await?
        }
    };

    match outcome {
        MutationOutcome::Confirmed { line_id } => {
            let totals = cart.totals().await;
            println!(
                "Saved (line {line_id}); {} items, total {}",
                totals.item_count, totals.total_price
            );
            Ok(())
        }
        MutationOutcome::RolledBack { reason } => bail!("cart change was undone: {reason}"),
        MutationOutcome::Discarded => bail!("session changed before the store answered"),
    }
}
