use std::path::PathBuf;

use anyhow::Context;
use dairyhub::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::migration::Dataset,
    services::import_service::import_dataset,
    store::OrmStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATA_PATH: &str = "data/database.json";

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

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let dataset: Dataset =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    let config = AppConfig::from_env()?;
    let conn = create_orm_conn(&config.database_url).await?;
    run_migrations(&conn).await?;
    tracing::info!("schema migrations applied");

    let store = OrmStore::new(conn);
    let report = import_dataset(&store, dataset).await;
    tracing::info!(
        imported = report.imported(),
        failed = report.failures.len(),
        "import finished"
    );

    if !report.is_clean() {
        anyhow::bail!("{} record(s) failed to import", report.failures.len());
    }
    Ok(())
}
