use chrono::{Duration, Utc};
use dotenvy::dotenv;
use sea_orm::DatabaseConnection;
use std::{env, path::Path};
use storefront_core::{
    config::{
        catalog::{self, CatalogConfig},
        database,
    },
    core::{cart, report},
    errors::Result,
};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

const RECENT_ORDER_DAYS: i64 = 7;

#[instrument]
fn load_configuration() -> Result<CatalogConfig> {
    let path = env::var("STOREFRONT_CONFIG")
        .unwrap_or_else(|_| catalog::DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        let config = catalog::load_config(&path)?;
        info!("Loaded configuration from {path}");
        Ok(config)
    } else {
        warn!("No configuration file at {path}, using defaults");
        Ok(CatalogConfig::default())
    }
}

#[instrument(skip_all)]
async fn init_database() -> Result<DatabaseConnection> {
    let db = database::create_connection().await?;
    database::create_tables(&db).await?;
    Ok(db)
}

#[instrument(skip_all)]
async fn log_store_status(db: &DatabaseConnection, config: &CatalogConfig) -> Result<()> {
    let today = Utc::now().date_naive();
    let summary = report::dashboard_summary(db, today - Duration::days(RECENT_ORDER_DAYS)).await?;

    info!(
        active_carts = summary.active_carts,
        recent_orders = summary.recent_orders,
        "Store summary"
    );
    for entry in &summary.status_counts {
        info!(status = %entry.status, count = entry.count, "Orders by status");
    }

    for sale in report::top_selling_products(db, 5).await? {
        info!(
            product_id = sale.product_id,
            units = sale.units,
            revenue = %report::format_amount(sale.revenue),
            "Top seller"
        );
    }

    let cutoff = config.checkout.abandoned_cutoff(Utc::now())?;
    let abandoned = cart::list_abandoned_carts(db, cutoff).await?;
    if !abandoned.is_empty() {
        warn!(
            count = abandoned.len(),
            hours = config.checkout.abandoned_cart_hours,
            "Abandoned carts found"
        );
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load checkout settings and seed data
    let config = load_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and make sure every table exists
    let db = init_database()
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;

    // 5. Seed categories, products and users that are missing
    catalog::seed_catalog(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {e}"))?;

    // 6. Report
    log_store_status(&db, &config).await?;

    Ok(())
}
