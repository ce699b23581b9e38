use rent_ledger_service::{config::Config, services::init_metrics, Application};
use secrecy::ExposeSecret;
use service_core::observability::init_tracing;

/// Database URL that selects the in-memory store.
const IN_MEMORY_DATABASE_URL: &str = "memory://";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(
        &config.service_name,
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let application = if config.database.url.expose_secret() == IN_MEMORY_DATABASE_URL {
        Application::build_in_memory(config).await?
    } else {
        Application::build(config).await?
    };
    application.run_until_stopped().await?;

    Ok(())
}
