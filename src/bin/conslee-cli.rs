use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use conslee_dashboard::api::ApiClient;
use conslee_dashboard::config::{load_config, DashboardConfig, Preferences, Theme};
use conslee_dashboard::coordination::DebouncedValidator;
use conslee_dashboard::health::ProbeRequest;

#[derive(Parser)]
#[command(name = "conslee-cli")]
#[command(about = "Management CLI for Conslee services", long_about = None)]
struct Cli {
    /// Dashboard configuration file; supplies the API and validator settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the management API base URL.
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List managed services
    Services,
    /// Show daemon settings
    System,
    /// Probe a URL through the management API
    Probe {
        url: String,
        #[arg(long, default_value = "")]
        expect_host: String,
        #[arg(long)]
        allow_wake: bool,
        #[arg(long)]
        require_signature: bool,
    },
    /// Check whether a listen address is available
    CheckPort { addr: String },
    /// Show or change UI preferences
    Preferences {
        #[arg(long, default_value = "preferences.toml")]
        path: PathBuf,
        #[command(subcommand)]
        action: PreferencesAction,
    },
}

#[derive(Subcommand)]
enum PreferencesAction {
    Show,
    Set {
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(url) = cli.url {
        config.api.base_url = url;
    }
    let api = ApiClient::new(&config.api)?;

    match cli.command {
        Commands::Services => print_json(&api.fetch_services().await?)?,
        Commands::System => print_json(&api.fetch_system().await?)?,
        Commands::Probe {
            url,
            expect_host,
            allow_wake,
            require_signature,
        } => {
            let request = ProbeRequest {
                url,
                expect_host,
                allow_wake,
                require_signature,
            };
            print_json(&api.send_probe(&request).await?)?;
        }
        Commands::CheckPort { addr } => {
            let baseline = api.fetch_system().await?.listen_addr;
            let validator = DebouncedValidator::new(
                Arc::new(api),
                baseline,
                config.validator.debounce(),
            );
            let verdict = validator.validate_now(&addr).await;
            if verdict.available {
                println!("{} is available", addr);
            } else {
                eprintln!(
                    "{} is not available: {}",
                    addr,
                    verdict.message.as_deref().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }
        }
        Commands::Preferences { path, action } => {
            let mut prefs = Preferences::load(&path)?;
            if let PreferencesAction::Set { theme, language } = action {
                if let Some(theme) = theme {
                    prefs.theme = theme;
                }
                if let Some(language) = language {
                    prefs.language = language;
                }
                prefs.save(&path)?;
            }
            print_json(&prefs)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
