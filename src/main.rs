//! short-keygen - short key allocation and SSO account linking

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use short_keygen::{
    Result,
    account::AccountLinker,
    authority,
    cli::{Cli, Command},
    config::Config,
    entity::SsoUser,
    keygen::{self, KeyGenerator, LocalKeySource, RetryPolicy, new_key_with_retry},
    setup_tracing,
    store::{AccountMappingStore, FileAccountStore, InMemoryAccountMappingStore, InMemoryUserStore, UserStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Serve { port } => run_serve(config, port).await,
        Command::Mint { count } => run_mint(&config, count).await,
        Command::Link { sso_id, email, name } => {
            run_link(&config, SsoUser::new(sso_id, email, name)).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Run the development key authority
async fn run_serve(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.authority.port = port;
    }
    let source = Arc::new(LocalKeySource::new(config.keygen.source.key_length)?);
    authority::serve(&config.authority, source).await
}

/// Print `count` keys, one per line
async fn run_mint(config: &Config, count: usize) -> Result<()> {
    let generator = build_generator(config).await?;
    let policy = RetryPolicy::new(&config.keygen.retry);

    for _ in 0..count {
        let key = new_key_with_retry(&generator, &policy).await?;
        println!("{key}");
    }
    Ok(())
}

/// Link one SSO identity and print the outcome as JSON
async fn run_link(config: &Config, sso_user: SsoUser) -> Result<()> {
    let users: Arc<dyn UserStore>;
    let mappings: Arc<dyn AccountMappingStore>;
    let source;
    if let Some(path) = &config.store.path {
        let store = Arc::new(FileAccountStore::open(path)?);
        info!(path = %store.path().display(), "Using file account store");
        // Stored account IDs came from earlier runs; a local source must not reissue them.
        source = keygen::source_from_config_reserving(&config.keygen.source, store.user_ids())?;
        users = store.clone();
        mappings = store;
    } else {
        info!("No store path configured; accounts are kept in memory only");
        source = keygen::source_from_config(&config.keygen.source)?;
        users = Arc::new(InMemoryUserStore::new());
        mappings = Arc::new(InMemoryAccountMappingStore::new());
    }

    let generator = Arc::new(KeyGenerator::new(config.keygen.batch_size, source).await?);
    let linker = AccountLinker::new(generator, users, mappings);
    let outcome = linker.create_and_link_account(&sso_user).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn build_generator(config: &Config) -> Result<KeyGenerator> {
    let source = keygen::source_from_config(&config.keygen.source)?;
    KeyGenerator::new(config.keygen.batch_size, source).await
}
