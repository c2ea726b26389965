mod file_store;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::load_settings_from, load_settings, sign_in, Credentials, DetailOutcome, ListRecord,
    ListState, LoadOutcome, PagedListController, ProductOutcome, ReportSlot, SecureStore,
    StorefrontClient, StoredCredentialProvider,
};
use file_store::FileSecureStore;
use serde_json::json;
use shared::domain::{OrderId, ProductId};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Vendor storefront client")]
struct Args {
    /// Settings file; defaults to ./storefront.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Credential store file.
    #[arg(long, global = true)]
    secrets: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify credentials against the store and remember them.
    SignIn {
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        consumer_key: Option<String>,
        #[arg(long)]
        consumer_secret: Option<String>,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run against the signed-in store.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    Orders {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Order status codes usable as list filters.
    Statuses,
    Order {
        id: i64,
    },
    SetStatus {
        id: i64,
        status: String,
    },
    Products {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Product {
        id: i64,
    },
    DeleteProduct {
        id: i64,
    },
    Reviews {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Reports,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    let store: Arc<dyn SecureStore> = Arc::new(FileSecureStore::new(
        args.secrets.unwrap_or_else(file_store::default_path),
    ));

    let command = match args.command {
        Command::SignIn {
            base_url,
            username,
            password,
            consumer_key,
            consumer_secret,
        } => {
            let credentials = match (username, password, consumer_key, consumer_secret) {
                (Some(username), Some(password), None, None) => {
                    Credentials::basic(base_url, username, password)
                }
                (None, None, Some(consumer_key), Some(consumer_secret)) => Credentials::ConsumerKey {
                    base_url,
                    consumer_key,
                    consumer_secret,
                },
                _ => bail!("pass either --username/--password or --consumer-key/--consumer-secret"),
            };
            sign_in(store.as_ref(), credentials, &settings).await?;
            println!("signed in");
            return Ok(());
        }
        Command::Store(command) => command,
    };

    let provider = StoredCredentialProvider::new(store);
    let client = StorefrontClient::connect(&provider, settings).await?;

    match command {
        StoreCommand::Orders {
            search,
            status,
            pages,
        } => {
            let list = client.mount_orders_list().await;
            let first = match (search, status) {
                (Some(term), _) => list.search(&term).await,
                (None, Some(code)) => list.filter_by_status(&code).await,
                (None, None) => list.load().await,
            };
            print_list(&list, first, pages).await?;
        }
        StoreCommand::Statuses => {
            for option in client.order_status_filters().await?.options {
                println!("{}\t{}", option.code, option.label);
            }
        }
        StoreCommand::Order { id } => {
            let screen = client.mount_order_detail(OrderId(id)).await;
            let outcome = screen.detail.load().await;
            if let DetailOutcome::Errored(err) = outcome {
                bail!(err.user_message());
            }
            let model = screen.detail.snapshot().await;
            if let Some(err) = &model.status_error {
                warn!(error = %err, "status list unavailable");
            }
            if let Some(order) = &model.order {
                println!(
                    "order #{} [{}] total {}{} products {}{}",
                    order.id,
                    order.status,
                    order.currency_display(),
                    order.total,
                    order.currency_display(),
                    order.product_total_display()
                );
            }
            for line in &model.line_items {
                let image = line.primary_image_url.as_deref().unwrap_or("-");
                println!(
                    "  {} x{} {} {}",
                    line.item.name,
                    line.item.quantity,
                    line.options.join(", "),
                    image
                );
            }
        }
        StoreCommand::SetStatus { id, status } => {
            let screen = client.mount_order_detail(OrderId(id)).await;
            screen.detail.load().await;
            let report = screen.mutator.apply_status(&status).await;
            println!("{}", report.outcome.notice());
        }
        StoreCommand::Products { search, pages } => {
            let list = client.mount_products_list().await;
            let first = match search {
                Some(term) => list.search(&term).await,
                None => list.load().await,
            };
            print_list(&list, first, pages).await?;
        }
        StoreCommand::Product { id } => {
            let product = client.mount_product_detail(ProductId(id)).await;
            if let ProductOutcome::Failed(err) = product.load().await {
                bail!(err.user_message());
            }
            if let Some(record) = product.snapshot().await.product {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        StoreCommand::DeleteProduct { id } => {
            let product = client.mount_product_detail(ProductId(id)).await;
            match product.delete().await {
                ProductOutcome::Deleted { .. } => println!("deleted product {id}"),
                ProductOutcome::Failed(err) => bail!(err.user_message()),
                other => bail!("delete did not run: {other:?}"),
            }
        }
        StoreCommand::Reviews { pages } => {
            let list = client.mount_reviews_list().await;
            let first = list.load().await;
            print_list(&list, first, pages).await?;
        }
        StoreCommand::Reports => {
            let reports = client.mount_reports().await;
            let snapshot = reports.refresh_all().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "sales": slot_json(&snapshot.sales)?,
                    "products": slot_json(&snapshot.products)?,
                    "reviews": slot_json(&snapshot.reviews)?,
                }))?
            );
        }
    }
    Ok(())
}

fn slot_json<T: serde::Serialize>(slot: &ReportSlot<T>) -> Result<serde_json::Value> {
    Ok(match slot {
        ReportSlot::Disabled => json!("disabled"),
        ReportSlot::Pending => json!("pending"),
        ReportSlot::Ready(summary) => serde_json::to_value(summary)?,
        ReportSlot::Unavailable(err) => json!({ "error": err.user_message() }),
    })
}

async fn print_list<T>(
    list: &PagedListController<T>,
    first: LoadOutcome,
    pages: u32,
) -> Result<()>
where
    T: ListRecord + serde::Serialize,
{
    let mut outcome = first;
    for _ in 1..pages {
        if !matches!(outcome, LoadOutcome::Appended(_)) {
            break;
        }
        outcome = list.load_more().await;
    }
    let ListState { items, error, .. } = list.snapshot().await;
    for item in &items {
        println!("{}", serde_json::to_string(item)?);
    }
    if let Some(err) = error {
        bail!(err.user_message());
    }
    Ok(())
}
