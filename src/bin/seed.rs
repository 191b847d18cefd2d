use dairyhub::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::migration::Dataset,
    services::import_service::import_dataset,
    store::OrmStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The demo catalog: twenty dairy products, an admin (`admin@dairyhub.com` /
/// `admin123`), two customers and their sample orders and reviews.
const DEMO_DATA: &str = include_str!("../../data/database.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dairyhub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let conn = create_orm_conn(&config.database_url).await?;
    run_migrations(&conn).await?;

    let dataset: Dataset = serde_json::from_str(DEMO_DATA)?;
    let report = import_dataset(&OrmStore::new(conn), dataset).await;
    if !report.is_clean() {
        anyhow::bail!("seed incomplete: {} record(s) failed", report.failures.len());
    }

    println!(
        "Seed completed: {} products, {} users, {} orders, {} reviews",
        report.products, report.users, report.orders, report.reviews
    );
    Ok(())
}
