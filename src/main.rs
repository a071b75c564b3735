mod cli;

use metaforge::{config, metadata::Resolution, server, services::Services};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting metaforge");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let services = Arc::new(Services::open(config)?);
    server::start_server(services).await
}

async fn resolve(name: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let services = Services::open(config)?;

    let Some(resolution) = services.orchestrator.resolve(name).await else {
        anyhow::bail!("No metadata found for {:?}", name);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print_resolution(&resolution);
    }
    Ok(())
}

fn print_resolution(res: &Resolution) {
    let record = &res.record;
    println!("{}", res.display_name);
    println!("  Provider: {} ({})", record.provider, record.remote_ref);
    if !record.original_title.is_empty() && record.original_title != record.title {
        println!("  Original title: {}", record.original_title);
    }
    if !record.date.is_empty() {
        println!("  Released: {}", record.date);
    }
    if !record.runtime.is_empty() {
        println!("  Runtime: {}", record.runtime);
    }
    for (label, value) in [
        ("Studio", &record.studio),
        ("Maker", &record.maker),
        ("Series", &record.set),
        ("Director", &record.director),
    ] {
        if !value.is_empty() {
            println!("  {}: {}", label, value);
        }
    }
    if !record.genres.is_empty() {
        println!("  Genres: {}", record.genres.join(", "));
    }
    if !res.actors.is_empty() {
        println!("  Actors:");
        for actor in &res.actors {
            match &actor.image {
                Some(url) => println!("    {} <{}>", actor.name, url),
                None => println!("    {}", actor.name),
            }
        }
    }
    if !record.plot.is_empty() {
        println!("\n{}", record.plot);
    }
    if !res.images.is_empty() {
        println!("\nImages:");
        for image in &res.images {
            println!("  [{}] {}", image.kind, image.url);
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Public URL: {}", config.server.public_url());
            println!("  Data dir: {:?}", config.storage.data_dir);
            println!("  Providers: {}", config.providers.len());
            for provider in &config.providers {
                println!(
                    "    {} (priority {}, {})",
                    provider.name,
                    provider.priority,
                    if provider.enabled { "enabled" } else { "disabled" }
                );
            }
            println!("  Body analysis: {}", config.baidu.body_analysis);
            println!("  Translation: {}", config.baidu.translate);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "metaforge=trace,metaforge_db=debug,metaforge_common=debug,tower_http=debug".to_string()
        } else {
            "metaforge=info,metaforge_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Resolve { name, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve(&name, json, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("metaforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
