use std::sync::Arc;

use triage_bot::admin::AdminHandler;
use triage_bot::channels::TelegramChannel;
use triage_bot::config::Settings;
use triage_bot::faq::FaqMatcher;
use triage_bot::llm::{create_provider, LlmConfig};
use triage_bot::pipeline::TriagePipeline;
use triage_bot::store::{LibSqlStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("🤖 Triage Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Provider: {:?}", settings.llm_backend);
    eprintln!("   Admins: {}", settings.admin_ids.len());
    eprintln!(
        "   Mentor domains: {}",
        if settings.mentor_domains.is_empty() {
            "none".to_string()
        } else {
            let mut names: Vec<_> = settings.mentor_domains.keys().cloned().collect();
            names.sort();
            names.join(", ")
        }
    );
    eprintln!("   Database: {}\n", settings.db_path);

    let llm_config = LlmConfig {
        backend: settings.llm_backend,
        api_key: settings.llm_api_key.clone(),
        model: settings.llm_model.clone(),
    };
    let llm = create_provider(&llm_config)?;

    let db_path = std::path::Path::new(&settings.db_path);
    let store: Arc<dyn Store> = match LibSqlStore::new_local(db_path).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: Failed to open database at {}: {}", settings.db_path, e);
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(TriagePipeline::new(
        llm.clone(),
        store.clone(),
        settings.clone(),
    ));
    let admin_faq = FaqMatcher::new(llm, store.clone(), settings.faq_threshold);
    let admin = Arc::new(AdminHandler::new(settings.clone(), store, admin_faq));

    let channel = TelegramChannel::new(settings.bot_token.clone());
    channel.health_check().await?;
    channel.run(pipeline, admin).await?;

    Ok(())
}
