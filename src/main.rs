use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use portico::{
    ModuleRegistry, ProxyModule, ReqwestForwarder,
    config::{ConfigModule, GatewayConfigValidator, loader},
    register_modules, tracing_setup, utils,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,

    /// Human-readable console logs instead of JSON
    #[clap(long)]
    pretty_logs: bool,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config),
        Some(Commands::Serve { config }) => serve(&config, args.pretty_logs).await,
        None => serve(&args.config, args.pretty_logs).await,
    }
}

async fn serve(config_path: &str, pretty_logs: bool) -> Result<()> {
    if pretty_logs {
        tracing_setup::init_console_tracing()?;
    } else {
        tracing_setup::init_tracing()?;
    }

    let config = loader::load_config(config_path)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {config_path}"))?;
    GatewayConfigValidator::validate(&config)
        .map_err(|e| eyre!("Configuration validation failed:\n{e}"))?;

    // All registration happens here, before the listener starts; the
    // registry is read-only once requests are flowing.
    let mut registry = ModuleRegistry::new(Arc::new(ReqwestForwarder::new()));
    let modules: Vec<Box<dyn ProxyModule>> = config
        .modules
        .iter()
        .map(|(id, module)| {
            Box::new(ConfigModule::new(id.clone(), module.clone())) as Box<dyn ProxyModule>
        })
        .collect();
    register_modules(&mut registry, &modules)
        .map_err(|e| eyre!("Module registration failed: {e}"))?;
    tracing::info!(modules = registry.len(), "all proxy modules registered");

    let app = registry.into_router();
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind listen address {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Portico gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .wrap_err("Gateway server error")?;

    tracing::info!("Portico gateway stopped");
    Ok(())
}

async fn validate_config_command(config_path: &str) -> Result<()> {
    let config = loader::load_config(config_path)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {config_path}"))?;

    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            println!("Configuration {config_path} is valid");
            Ok(())
        }
        Err(e) => Err(eyre!("Configuration {config_path} is invalid:\n{e}")),
    }
}

fn init_config_command(config_path: &str) -> Result<()> {
    if Path::new(config_path).exists() {
        return Err(eyre!("Refusing to overwrite existing file {config_path}"));
    }

    std::fs::write(config_path, SAMPLE_CONFIG)
        .wrap_err_with(|| format!("Failed to write {config_path}"))?;
    println!("Wrote starter configuration to {config_path}");
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# Portico gateway configuration
listen_addr: "0.0.0.0:8080"

modules:
  example:
    name: "Example Module"
    description: "Forwards to the JSONPlaceholder demo API"
    endpoint: "/proxy/example"
    target_base: "https://jsonplaceholder.typicode.com"
    excluded_headers: ["cookie", "host"]
    routes:
      - path: "/item"
        upstream_path: "/todos"
        method: "GET"
      - path: "/item/{id}"
        upstream_path: "/todos/{id}"
        method: "GET"
        path_params: ["id"]
      - path: "/post"
        upstream_path: "/posts"
        method: "POST"
        static_body: { title: "test", body: "test", userId: 1 }
"#;
