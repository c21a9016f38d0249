mod view;

use std::{future::Future, path::PathBuf};

use anyhow::Result;
use cart_client::{item_handler, load_settings, provider_from_settings, CartProvider};
use clap::{Parser, Subcommand};
use shared::domain::{CartEventKind, CartItem};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "zcart", about = "Inspect and check out a zCart cart")]
struct Args {
    /// Settings file. Defaults to ./zcart.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Cart service base URL. Without one the synthetic provider is used.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    cart_id: Option<String>,
    /// Ignore any configured base URL and use the synthetic provider.
    #[arg(long)]
    synthetic: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Print the cart once.
    #[default]
    List,
    /// Finalize the cart.
    Checkout,
    /// Print the cart, then reprint it on every add/remove notification.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        settings.base_url = Some(base_url);
    }
    if let Some(cart_id) = args.cart_id {
        settings.cart_id = cart_id;
    }
    if args.synthetic {
        settings.base_url = None;
    }

    let provider = provider_from_settings(&settings)?;
    match args.command.unwrap_or_default() {
        Command::List => print_cart(provider.as_ref()).await?,
        Command::Checkout => {
            provider.checkout().await?;
            println!("Compra finalizada");
        }
        Command::Watch => watch(provider.as_ref(), tokio::signal::ctrl_c()).await?,
    }
    Ok(())
}

async fn print_cart(provider: &dyn CartProvider) -> Result<()> {
    let items = provider.list_cart_items().await?;
    print!("{}", view::render_cart(&items));
    Ok(())
}

/// Runs until `shutdown` resolves or the provider stops delivering notifications.
async fn watch<S>(provider: &dyn CartProvider, shutdown: S) -> Result<()>
where
    S: Future,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<(CartEventKind, CartItem)>();
    for kind in [CartEventKind::Added, CartEventKind::Removed] {
        let tx = tx.clone();
        let handler = item_handler(move |item| {
            let _ = tx.send((kind, item));
        });
        match kind {
            CartEventKind::Added => provider.on_add_product(handler),
            CartEventKind::Removed => provider.on_remove_product(handler),
        }
    }
    drop(tx);

    tokio::pin!(shutdown);

    tokio::select! {
        listed = print_cart(provider) => listed?,
        _ = &mut shutdown => {
            info!("interrupted, stopping watch");
            return Ok(());
        }
    }
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some((kind, item)) = event else { break };
                let label = match kind {
                    CartEventKind::Added => "adicionado",
                    CartEventKind::Removed => "removido",
                };
                println!("{}", view::render_notification(label, &item));
                tokio::select! {
                    listed = print_cart(provider) => {
                        if let Err(err) = listed {
                            warn!(error = %err, "failed to refresh cart");
                        }
                    }
                    _ = &mut shutdown => {
                        info!("interrupted, stopping watch");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}
