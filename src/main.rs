//! Formula 1 Race Prediction CLI
//!
//! Collects race results, trains the two-stage forest and predicts
//! finishing positions and win/podium chances.

use clap::{Parser, Subcommand};
use f1_predictor::{Config, Result};

#[derive(Parser)]
#[command(name = "f1")]
#[command(about = "Formula 1 race outcome prediction from qualifying and race history", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train the position and win models on all stored results
    Train,
    /// Predict race outcomes
    Predict {
        /// Driver code, e.g. VER
        driver: Option<String>,
        /// Constructor id, e.g. red_bull
        team: Option<String>,
        /// Starting grid position
        #[arg(long)]
        grid: Option<u32>,
        /// Override the driver's recent average finish
        #[arg(long)]
        avg_recent_finish: Option<f64>,
        /// Override the driver's recent points
        #[arg(long)]
        recent_points: Option<f64>,
        /// Input fixture file (JSON array of requests)
        #[arg(long)]
        fixture: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Fetch race and qualifying results
    Sync {
        /// First season (defaults to config)
        #[arg(long)]
        start: Option<u16>,
        /// Last season (defaults to config, then the current year)
        #[arg(long)]
        end: Option<u16>,
        /// Re-fetch events already stored
        #[arg(long)]
        refresh: bool,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
    /// Validate the model artifact and copy it elsewhere
    Export {
        /// Output path
        output: String,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Sync {
                start,
                end,
                refresh,
            } => commands::data_sync(&config, start, end, refresh),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train => commands::train(&config),
        Commands::Predict {
            driver,
            team,
            grid,
            avg_recent_finish,
            recent_points,
            fixture,
            format,
        } => {
            let overrides = commands::Overrides {
                avg_recent_finish,
                recent_points,
            };
            commands::predict(&config, driver, team, grid, overrides, fixture, format)
        }
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
            ModelCommands::Export { output } => commands::model_export(&config, &output),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::Datelike;
    use f1_predictor::data::{collect_seasons, CollectOptions, Database, JolpicaClient};
    use f1_predictor::model::TrainedModel;
    use f1_predictor::predict::{format_prediction, Predictor};
    use f1_predictor::{PredictionOutcome, PredictionRequest, PredictorError};
    use serde::Serialize;

    pub struct Overrides {
        pub avg_recent_finish: Option<f64>,
        pub recent_points: Option<f64>,
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'f1 data sync' to fetch race results");
        println!("  3. Run 'f1 train' to train the model");
        println!("  4. Run 'f1 predict VER red_bull --grid 1' to make predictions");

        Ok(())
    }

    pub fn data_sync(config: &Config, start: Option<u16>, end: Option<u16>, refresh: bool) -> Result<()> {
        let start = start.unwrap_or(config.data.start_year);
        let end = end
            .or(config.data.end_year)
            .unwrap_or_else(|| chrono::Utc::now().year() as u16);
        if start > end {
            return Err(PredictorError::Config(format!(
                "start season {} is after end season {}",
                start, end
            )));
        }

        let mut db = Database::open(&config.data.database_path)?;
        let client = JolpicaClient::new(&config.data.api_base_url)?;
        let options = CollectOptions::from_config(&config.data, refresh);

        println!("Syncing seasons {}-{} from {}...", start, end, config.data.api_base_url);
        let summary = collect_seasons(&client, &mut db, start, end, &options)?;
        println!("Stored {}", summary);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Entries:  {}", stats.entry_count);
        println!("  Events:   {}", stats.event_count);
        println!("  Drivers:  {}", stats.driver_count);
        println!("  Teams:    {}", stats.team_count);
        if let (Some(first), Some(last)) = (stats.first_season, stats.last_season) {
            println!("  Seasons:  {} to {}", first, last);
        }

        Ok(())
    }

    pub fn train(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let entries = db.get_all_entries()?;
        if entries.is_empty() {
            return Err(PredictorError::InsufficientData(
                "no race entries stored - run `f1 data sync` first".to_string(),
            ));
        }

        println!("Training on {} race entries...", entries.len());
        let predictor = Predictor::new(config.clone());
        let report = predictor.train(&entries)?;

        println!("\n{}", report);
        println!("Model saved to {}", predictor.model_path().display());
        Ok(())
    }

    #[derive(Serialize)]
    struct PredictionRow<'a> {
        #[serde(flatten)]
        request: &'a PredictionRequest,
        #[serde(flatten)]
        outcome: &'a PredictionOutcome,
    }

    pub fn predict(
        config: &Config,
        driver: Option<String>,
        team: Option<String>,
        grid: Option<u32>,
        overrides: Overrides,
        fixture: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let requests: Vec<PredictionRequest> = if let Some(path) = fixture {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else if let (Some(driver), Some(team), Some(grid)) = (driver, team, grid) {
            let mut request = PredictionRequest::new(driver, team, grid);
            request.avg_recent_finish = overrides.avg_recent_finish;
            request.recent_points = overrides.recent_points;
            vec![request]
        } else {
            println!("Usage: f1 predict <DRIVER> <TEAM> --grid <N>");
            println!("       f1 predict --fixture <FILE>");
            println!("\nExample:");
            println!("  f1 predict VER red_bull --grid 1");
            return Ok(());
        };

        let predictor = Predictor::new(config.clone());
        let outcomes = predictor.predict_field(&requests);

        match format {
            OutputFormat::Table => {
                for (request, outcome) in requests.iter().zip(&outcomes) {
                    print!("{}", format_prediction(request, outcome));
                }
            }
            OutputFormat::Json => {
                let rows: Vec<PredictionRow> = requests
                    .iter()
                    .zip(&outcomes)
                    .map(|(request, outcome)| PredictionRow { request, outcome })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            OutputFormat::Csv => {
                println!("driver,team,grid,predicted_position,win_probability,podium_probability,confidence,source");
                for (request, outcome) in requests.iter().zip(&outcomes) {
                    let p = &outcome.prediction;
                    println!(
                        "{},{},{},{},{:.4},{:.4},{:.4},\"{}\"",
                        request.driver_id,
                        request.team_id,
                        request.grid_position,
                        p.predicted_position,
                        p.win_probability,
                        p.podium_probability,
                        p.confidence,
                        outcome.source
                    );
                }
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let path = std::path::Path::new(&config.data.model_path);
        if !path.exists() {
            return Err(PredictorError::NoModel);
        }
        let model = TrainedModel::load(path)?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:           {}", path.display());
        println!("  Trained:        {}", model.trained_at.format("%Y-%m-%d %H:%M UTC"));
        println!(
            "  Position trees: {} (max depth {:?})",
            model.position.forest().n_trees(),
            model.position.forest().params().max_depth
        );
        println!(
            "  Win trees:      {} (max depth {:?})",
            model.win.forest().n_trees(),
            model.win.forest().params().max_depth
        );
        println!("  Features:       {}", model.feature_names.join(", "));
        println!();
        println!("{}", model.report);

        Ok(())
    }

    pub fn model_export(config: &Config, output: &str) -> Result<()> {
        if !std::path::Path::new(&config.data.model_path).exists() {
            return Err(PredictorError::NoModel);
        }

        let model = TrainedModel::export(&config.data.model_path, output)?;
        println!(
            "Model trained {} exported to {}",
            model.trained_at.format("%Y-%m-%d %H:%M UTC"),
            output
        );

        Ok(())
    }
}
