mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use estimator::config::ClientConfig;
use estimator::time_material::YearField;
use serde_json::Value;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use commands::RowFields;

#[derive(Parser)]
#[clap(author, version, about = "Manage Time & Material profile assignments")]
struct Cli {
    /// TOML configuration file.
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL, overriding configuration.
    #[clap(long, global = true)]
    api_url: Option<String>,
    /// Project identifier, overriding configuration.
    #[clap(short, long, global = true)]
    project: Option<String>,
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Pretty-print the JSON response.
    #[clap(long, global = true)]
    pretty: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rows of the project with their yearly values
    List,
    Catalog {
        #[clap(subcommand)]
        command: CatalogCommands,
    },
    /// Available cities for a profile, or profiles with a free city
    Available {
        #[clap(long)]
        profile: Option<i64>,
        #[clap(long)]
        country: Option<String>,
    },
    /// Add and save a new assignment
    Assign {
        #[clap(long)]
        profile: i64,
        #[clap(long)]
        country: String,
        #[clap(long)]
        city: i64,
        #[clap(long)]
        process_time: f64,
        #[clap(long)]
        margin: Option<f64>,
    },
    /// Change a saved assignment
    Update {
        #[clap(long)]
        step: i64,
        #[clap(long)]
        profile: Option<i64>,
        #[clap(long)]
        country: Option<String>,
        #[clap(long)]
        city: Option<i64>,
        #[clap(long)]
        process_time: Option<f64>,
        #[clap(long)]
        margin: Option<f64>,
    },
    /// Set one year's value of a saved assignment
    SetYear {
        #[clap(long)]
        step: i64,
        #[clap(long)]
        year: i32,
        /// quantity, process-time, mng, office or hardware
        #[clap(long)]
        field: YearField,
        #[clap(long)]
        value: String,
    },
    Remove {
        #[clap(long)]
        step: i64,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    Profiles,
    Countries,
    Cities { country: String },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::List => "list",
            Commands::Catalog { .. } => "catalog",
            Commands::Available { .. } => "available",
            Commands::Assign { .. } => "assign",
            Commands::Update { .. } => "update",
            Commands::SetYear { .. } => "set-year",
            Commands::Remove { .. } => "remove",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let command = args.command.name();
    let pretty = args.pretty;

    match run(args).await {
        Ok((project, data)) => output::emit_response(command, project.as_deref(), data, pretty),
        Err(err) => {
            debug!("{} failed: {:?}", command, err);
            output::emit_error(command, &err, pretty)?;
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(project) = &args.project {
        config.project_id = Some(project.clone());
    }
    Ok(config)
}

async fn run(args: Cli) -> Result<(Option<String>, Value)> {
    let config = load_config(&args)?;
    debug!("Using backend {}", config.api_url);

    let data = match args.command {
        Commands::List => commands::list(&config).await?,
        Commands::Catalog { command } => match command {
            CatalogCommands::Profiles => commands::catalog_profiles(&config).await?,
            CatalogCommands::Countries => commands::catalog_countries(&config).await?,
            CatalogCommands::Cities { country } => {
                commands::catalog_cities(&config, country).await?
            }
        },
        Commands::Available { profile, country } => {
            commands::available(&config, profile, country).await?
        }
        Commands::Assign {
            profile,
            country,
            city,
            process_time,
            margin,
        } => {
            let fields = RowFields {
                profile: Some(profile),
                country: Some(country),
                city: Some(city),
                process_time: Some(process_time),
                margin,
            };
            commands::assign(&config, fields).await?
        }
        Commands::Update {
            step,
            profile,
            country,
            city,
            process_time,
            margin,
        } => {
            let fields = RowFields {
                profile,
                country,
                city,
                process_time,
                margin,
            };
            commands::update(&config, step, fields).await?
        }
        Commands::SetYear {
            step,
            year,
            field,
            value,
        } => commands::set_year(&config, step, year, field, &value).await?,
        Commands::Remove { step } => commands::remove(&config, step).await?,
    };

    Ok((config.project_id, data))
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("hyper=off,reqwest=warn,{}", log_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_year_field() {
        let cli = Cli::parse_from([
            "estimator", "--project", "p1", "set-year", "--step", "42", "--year", "2025",
            "--field", "process-time", "--value", "1.5",
        ]);
        match cli.command {
            Commands::SetYear { step, year, field, .. } => {
                assert_eq!((step, year), (42, 2025));
                assert_eq!(field, YearField::ProcessTime);
            }
            _ => panic!("expected set-year"),
        }
        assert_eq!(cli.project.as_deref(), Some("p1"));
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "estimator", "--api-url", "http://backend:8080/api", "--project", "p9", "list",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.api_url, "http://backend:8080/api");
        assert_eq!(config.project_id.as_deref(), Some("p9"));
    }
}
