use clap::Parser;
use tokio::net::TcpListener;

use dishlens::{
    AppState, build_app,
    config::{Cli, Commands, Config, SignArgs},
    logging::init_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Both files are optional; values already in the environment win.
    dotenv::dotenv().ok();
    dotenv::from_filename("secrets.env").ok();

    let cli = Cli::parse();

    if let Some(command) = cli.command {
        return handle_command(command, &cli.config);
    }

    let config = cli.config;

    // Keep guard alive so file logger flushes correctly
    let _log_guards = init_logging(&config);

    log_config(&config);

    let state = AppState::from_config(config.clone())?;
    let app = build_app(state);

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn set_or_not(v: Option<&str>) -> &'static str {
    if v.is_some_and(|k| !k.trim().is_empty()) {
        "<set>"
    } else {
        "<not set>"
    }
}

fn log_config(config: &Config) {
    tracing::info!("=== Configuration ===");
    tracing::info!("Bind address: {}", config.bind);
    tracing::info!("Log file: {}", config.log_file.display());
    tracing::info!("LLM API key: {}", set_or_not(config.openai_api_key.as_deref()));
    tracing::info!("LLM model: {}", config.llm_model);
    tracing::info!("LLM API URL: {}", config.llm_api_url);
    tracing::info!("Cloudinary cloud: {}", config.cloudinary_cloud_name);
    tracing::info!(
        "Cloudinary API key: {}",
        set_or_not(Some(config.cloudinary_api_key.as_str()))
    );
    tracing::info!(
        "Cloudinary API secret: {}",
        set_or_not(Some(config.cloudinary_api_secret.as_str()))
    );
    tracing::info!("Asset API URL: {}", config.asset_api_url);
    tracing::info!("Upload folder: {}", config.upload_folder);
    tracing::info!("Scratch dir: {}", config.scratch_dir().display());
    tracing::info!("Max body: {} MiB", config.max_body_mb);
    tracing::info!(
        "Timeouts: identify {}s, recipe {}s, upload {}s",
        config.identify_timeout_secs,
        config.recipe_timeout_secs,
        config.upload_timeout_secs
    );
    tracing::info!("====================");

    if config.openai_api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        tracing::warn!("No LLM API key configured; every inference step will fall back");
    }
    if config.cloudinary_api_secret.is_empty() {
        tracing::warn!("No Cloudinary secret configured; uploads will fail and signature requests are refused");
    }
}

fn handle_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Sign(args) => print_signature(&args, config),
    }
}

fn print_signature(args: &SignArgs, config: &Config) -> anyhow::Result<()> {
    if config.cloudinary_api_secret.is_empty() {
        anyhow::bail!("CLOUDINARY_API_SECRET is not set");
    }

    let timestamp = args
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().timestamp().to_string());

    let assets = dishlens::cloudinary::AssetHost::from_config(config);
    let signature =
        assets.sign_direct_upload(&args.folder, &args.public_id, &timestamp, &args.upload_preset);

    println!("timestamp: {timestamp}");
    println!("signature: {signature}");
    println!("api_key:   {}", config.cloudinary_api_key);
    println!("cloud:     {}", config.cloudinary_cloud_name);
    Ok(())
}
