use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use shortener::cli::{Cli, Commands};
use shortener::config::{StaticConfig, get_config, init_config_with};
use shortener::runtime::lifetime::{
    EngineContext, listen_for_shutdown, perform_shutdown, prepare_engine,
};
use shortener::system::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.command == Some(Commands::GenerateConfig) {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    let mut config = StaticConfig::load_from(&cli.config);
    cli.apply_overrides(&mut config);
    init_config_with(config);
    let config = get_config();

    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    let ctx = prepare_engine(&config).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Storage engine running, press Ctrl+C to stop");
            listen_for_shutdown(&ctx).await?;
        }
        command => {
            let outcome = run_command(&ctx, command).await;
            // 无论命令成功与否都保存快照
            if let Err(e) = perform_shutdown(&ctx).await {
                error!("Shutdown failed: {}", e);
            }
            if let Err(e) = outcome {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_command(ctx: &EngineContext, command: Commands) -> shortener::errors::Result<()> {
    let service = &ctx.link_service;
    let cancel = &ctx.cancel;
    match command {
        Commands::Shorten { url, user } => {
            println!("{}", service.shorten(cancel, &url, user.as_deref()).await?);
        }
        Commands::Resolve { key } => {
            println!("{}", service.resolve(cancel, &key).await?);
        }
        Commands::List { user } => {
            for link in service.user_links(cancel, &user).await? {
                println!("{}\t{}", link.short_url, link.original_url);
            }
        }
        Commands::Delete { user, keys } => {
            let deleted = service.delete_links(cancel, &user, &keys).await?;
            println!("Deleted {} of {} links", deleted, keys.len());
        }
        Commands::Ping => {
            service.check_db(cancel).await?;
            println!("OK");
        }
        Commands::Run | Commands::GenerateConfig => {}
    }
    Ok(())
}
