//! Tilesmith - split images into tiles and enhance them one by one.
//!
//! This binary starts the HTTP server or runs a one-shot split.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilesmith::{
    archive_filename,
    config::{Cli, Command, EnhanceArgs, ServeConfig, SplitConfig},
    enhance::{
        CredentialProvider, CredentialStore, EnhancementOrchestrator, EnhancementOutcome,
        EnvCredentialProvider, HttpEnhancementClient, QualityLevel,
    },
    server::{create_router, AppState, RouterConfig},
    BundleExporter, ImageSlicer, TileRegistry,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Split(config) => run_split(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let client = match build_client(&config.enhance) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let credentials = CredentialStore::from_secret(config.api_key.as_deref());

    info!("Tilesmith v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Enhancement endpoint: {}", client.endpoint());
    info!("  Enhancement timeout: {}s", config.enhance.enhance_timeout);
    info!("  Max grid: {}x{}", config.max_grid, config.max_grid);
    info!("  Max upload: {} bytes", config.max_upload);
    match credentials.credential() {
        Some(credential) => info!("  Credential: configured ({})", credential.fingerprint()),
        None => warn!("  Credential: not configured. Set one with PUT /credential"),
    }
    if config.access_token.is_some() {
        info!("  Access token: required");
    } else {
        warn!("  Access token: DISABLED - all endpoints are publicly accessible");
    }

    let mut exporter = BundleExporter::new();
    if let Some(folder) = &config.archive_folder {
        exporter = exporter.with_folder(folder.as_str());
    }

    let state = AppState::new(client, credentials)
        .with_exporter(exporter)
        .with_max_grid(config.max_grid);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!(
        "    curl --data-binary @photo.jpg 'http://{}/split?rows=3&cols=3'",
        addr
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tilesmith=debug,tower_http=debug"
    } else {
        "tilesmith=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload)
        .with_tracing(!config.no_tracing);

    if let Some(ref token) = config.access_token {
        router_config = router_config.with_access_token(token.clone());
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

fn build_client(args: &EnhanceArgs) -> Result<HttpEnhancementClient, String> {
    let endpoint = args
        .enhance_endpoint
        .as_deref()
        .ok_or_else(|| "No enhancement endpoint configured".to_string())?;
    HttpEnhancementClient::new(endpoint, args.timeout())
        .map_err(|e| format!("Failed to create enhancement client: {}", e))
}

// =============================================================================
// Split Command
// =============================================================================

async fn run_split(config: SplitConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let source = match tokio::fs::read(&config.input).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tilesmith::tile::validate_grid(config.rows, config.cols, config.max_grid) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let tile_set = match ImageSlicer::new().slice(&source, config.rows, config.cols) {
        Ok(tile_set) => tile_set,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = tile_set.source_dimensions();
    println!(
        "Split {} ({}x{}) into {} tiles",
        config.input.display(),
        width,
        height,
        tile_set.len()
    );

    let registry = Arc::new(TileRegistry::new());
    registry.replace_all(tile_set).await;

    if let Some(quality) = config.enhance {
        if let Err(e) = enhance_all(&config, Arc::clone(&registry), quality).await {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let mut exporter = BundleExporter::new();
    if let Some(folder) = &config.folder {
        exporter = exporter.with_folder(folder.as_str());
    }

    let snapshot = registry.snapshot().await;
    let archive = match exporter.export_all(&snapshot) {
        Ok(archive) => archive,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(archive_filename()));
    if let Err(e) = tokio::fs::write(&output, &archive).await {
        eprintln!("Error: cannot write {}: {}", output.display(), e);
        return ExitCode::FAILURE;
    }

    println!("Wrote {} ({} bytes)", output.display(), archive.len());
    ExitCode::SUCCESS
}

/// Enhance every tile concurrently. Tiles that fail keep their original image.
async fn enhance_all(
    config: &SplitConfig,
    registry: Arc<TileRegistry>,
    quality: QualityLevel,
) -> Result<(), String> {
    let credentials = EnvCredentialProvider::new(config.api_key_env.as_str());
    if !credentials.has_credential() {
        return Err(format!(
            "--enhance needs a credential in ${}",
            credentials.var()
        ));
    }

    let client = build_client(&config.service)?;
    let orchestrator = Arc::new(EnhancementOrchestrator::new(
        Arc::clone(&registry),
        Arc::new(client),
        Arc::new(credentials),
    ));

    let snapshot = registry.snapshot().await;
    let mut tasks = JoinSet::new();
    for tile in snapshot.iter() {
        let orchestrator = Arc::clone(&orchestrator);
        let tile_id = tile.id().clone();
        let position = (tile.row() + 1, tile.col() + 1);
        tasks.spawn(async move {
            let result = orchestrator.request_enhancement(&tile_id, quality).await;
            (position, result)
        });
    }

    let mut enhanced = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(EnhancementOutcome::Enhanced(_)))) => enhanced += 1,
            Ok((_, Ok(_))) => {}
            Ok(((row, col), Err(e))) => {
                failed += 1;
                warn!(row, col, "Tile enhancement failed: {}", e);
            }
            Err(e) => {
                failed += 1;
                warn!("Enhancement task failed: {}", e);
            }
        }
    }

    println!(
        "Enhanced {} tiles at {} ({} failed)",
        enhanced, quality, failed
    );
    Ok(())
}
