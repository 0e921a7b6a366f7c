//! Traffic Volume Prediction CLI
//!
//! Trains a random forest on hourly weather and calendar data and serves
//! traffic volume predictions from the saved artifact.

use clap::{Parser, Subcommand};
use traffic::{Config, Result};

#[derive(Parser)]
#[command(name = "traffic")]
#[command(about = "Hourly traffic volume prediction with a random forest", long_about = None)]
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
    /// Data inspection commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train the model and save the artifact
    Train {
        /// Override number of trees
        #[arg(long)]
        trees: Option<usize>,
        /// Override the forest seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict traffic volume
    Predict {
        /// Inline JSON object or array of objects
        #[arg(long, conflicts_with = "file")]
        json: Option<String>,
        /// JSON file with one object or an array of objects
        #[arg(long)]
        file: Option<String>,
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
    /// Show dataset status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
    /// Show feature importances
    Importance {
        /// Only show the top K features
        #[arg(long)]
        top: Option<usize>,
    },
    /// Evaluate the model on the held-out split of the dataset
    Validate,
    /// Export model for deployment
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

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
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
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train { trees, seed } => commands::train(&config, trees, seed),
        Commands::Predict { json, file, format } => commands::predict(&config, json, file, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
            ModelCommands::Importance { top } => commands::model_importance(&config, top),
            ModelCommands::Validate => commands::model_validate(&config),
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
    use traffic::data::{load_records, TrafficDataset};
    use traffic::predict::{format_prediction, PredictionInput, Predictor};
    use traffic::training::{evaluate, Trainer};
    use traffic::TrafficError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Copy the traffic CSV to {}", config.data.dataset_path);
        println!("  2. Run 'traffic data status' to check the input");
        println!("  3. Run 'traffic train' to train the model");
        println!("  4. Run 'traffic predict --json '{{...}}'' to make predictions");

        Ok(())
    }

    fn load_dataset(config: &Config) -> Result<TrafficDataset> {
        let report = load_records(&config.data.dataset_path)?;
        if report.observations.is_empty() {
            return Err(TrafficError::EmptyDataset(format!(
                "no valid rows in {}",
                config.data.dataset_path
            )));
        }
        Ok(TrafficDataset::new(report.observations))
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let report = load_records(&config.data.dataset_path)?;

        println!("Dataset Status");
        println!("───────────────────────────────");
        println!("  Path:      {}", config.data.dataset_path);
        println!("  Rows:      {}", report.total_rows());
        println!("  Valid:     {}", report.observations.len());
        println!("  Rejected:  {}", report.rejected.len());
        for row in report.rejected.iter().take(5) {
            println!("    line {}: {}", row.line, row.reason);
        }
        if report.rejected.len() > 5 {
            println!("    ... and {} more", report.rejected.len() - 5);
        }

        let dataset = TrafficDataset::new(report.observations);
        if let Some((first, last)) = dataset.date_range() {
            println!("  Range:     {} to {}", first, last);
        }
        if let Some(stats) = dataset.volume_stats() {
            println!(
                "  Volume:    min {} / max {} / mean {:.1} / std {:.1}",
                stats.min, stats.max, stats.mean, stats.std
            );
        }

        Ok(())
    }

    pub fn train(config: &Config, trees: Option<usize>, seed: Option<u64>) -> Result<()> {
        let mut training_config = config.clone();
        if let Some(n) = trees {
            training_config.forest.n_trees = n;
        }
        if let Some(s) = seed {
            training_config.forest.seed = Some(s);
        }
        training_config.validate()?;

        println!("Loading data from {}...", config.data.dataset_path);
        let dataset = load_dataset(&training_config)?;

        println!(
            "Training {} trees on {} observations...",
            training_config.forest.n_trees,
            dataset.len()
        );
        let (artifact, report) = Trainer::new(&training_config).train(&dataset)?;

        artifact.save(&config.data.artifact_path)?;

        println!("\nTraining complete");
        println!("───────────────────────────────");
        println!("{}", report);
        println!("\nModel saved to {}", config.data.artifact_path);

        Ok(())
    }

    pub fn predict(
        config: &Config,
        json: Option<String>,
        file: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let source = match (json, file) {
            (Some(json), _) => json,
            (None, Some(path)) => std::fs::read_to_string(&path)?,
            (None, None) => {
                println!("Usage: traffic predict --json '<object>' | --file <path>");
                println!("\nExample:");
                println!(
                    "  traffic predict --json '{{\"holiday\":\"None\",\"temp\":288.3,\"rain_1h\":0,\
                     \"snow_1h\":0,\"weather_main\":\"Clouds\",\"month\":6,\"hour\":17,\
                     \"day_of_week\":2,\"is_weekend\":0,\"is_rush_hour\":1}}'"
                );
                return Ok(());
            }
        };

        let inputs = PredictionInput::from_json(&source)?;
        let predictor = Predictor::load(&config.data.artifact_path)?;
        let results = predictor.predict_batch(&inputs);

        let mut failed = 0;
        match format {
            OutputFormat::Table => {
                for (i, (input, result)) in inputs.iter().zip(&results).enumerate() {
                    match result {
                        Ok(volume) => print!("{}", format_prediction(input, *volume)),
                        Err(e) => {
                            failed += 1;
                            eprintln!("Row {}: {}", i, e);
                        }
                    }
                }
            }
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = results
                    .iter()
                    .map(|result| match result {
                        Ok(volume) => serde_json::json!({ "traffic_volume": volume }),
                        Err(e) => {
                            failed += 1;
                            serde_json::json!({ "error": e.to_string() })
                        }
                    })
                    .collect();
                let text = serde_json::to_string_pretty(&rows)
                    .map_err(|e| TrafficError::Parse(e.to_string()))?;
                println!("{}", text);
            }
            OutputFormat::Csv => {
                println!("row,hour,day_of_week,month,weather_main,traffic_volume");
                for (i, (input, result)) in inputs.iter().zip(&results).enumerate() {
                    match result {
                        Ok(volume) => println!(
                            "{},{},{},{},{},{}",
                            i, input.hour, input.day_of_week, input.month, input.weather_main, volume
                        ),
                        Err(e) => {
                            failed += 1;
                            eprintln!("Row {}: {}", i, e);
                        }
                    }
                }
            }
        }

        if failed == inputs.len() && failed > 0 {
            return Err(TrafficError::InvalidInput(format!(
                "all {} rows failed",
                failed
            )));
        }
        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let predictor = Predictor::load(&config.data.artifact_path)?;
        let artifact = predictor.artifact();
        let meta = &artifact.metadata;
        let forest = &artifact.forest;

        let depths: Vec<usize> = forest.trees().iter().map(|t| t.depth()).collect();
        let leaves: usize = forest.trees().iter().map(|t| t.n_leaves()).sum();
        let nodes: usize = forest.trees().iter().map(|t| t.nodes().len()).sum();

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:           {}", config.data.artifact_path);
        println!("  Format version: {}", artifact.format_version);
        println!("  Trained at:     {}", meta.trained_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Trees:          {}", forest.n_trees());
        println!("  Features:       {}", forest.n_features());
        println!("  Seed:           {}", forest.seed());
        println!("  Max depth:      {}", depths.iter().max().copied().unwrap_or(0));
        println!("  Mean leaves:    {:.1}", leaves as f64 / forest.n_trees() as f64);
        println!("  Total nodes:    {}", nodes);
        println!("  Train samples:  {}", meta.train_samples);
        println!("  Test samples:   {}", meta.test_samples);
        println!("  Train:          {}", meta.train_metrics);
        if let Some(test) = &meta.test_metrics {
            println!("  Test:           {}", test);
        }
        let degenerate = artifact.preprocessor.degenerate_fields();
        if !degenerate.is_empty() {
            println!("  Constant:       {}", degenerate.join(", "));
        }

        Ok(())
    }

    pub fn model_importance(config: &Config, top: Option<usize>) -> Result<()> {
        let predictor = Predictor::load(&config.data.artifact_path)?;
        let ranked = predictor.feature_importance_ranked(top.unwrap_or(usize::MAX));

        println!("Feature Importance");
        println!("───────────────────────────────");
        for (rank, (name, score)) in ranked.iter().enumerate() {
            println!("  {:>2}. {:<32} {:.4}", rank + 1, name, score);
        }

        Ok(())
    }

    pub fn model_validate(config: &Config) -> Result<()> {
        let predictor = Predictor::load(&config.data.artifact_path)?;
        let dataset = load_dataset(config)?;

        let holdout = if config.training.test_fraction > 0.0 {
            dataset
                .split(config.training.test_fraction, config.training.split_seed)
                .1
        } else {
            dataset
        };
        let metrics = evaluate(&predictor, holdout.observations())?;

        println!("Validation");
        println!("───────────────────────────────");
        println!("  {}", metrics);

        Ok(())
    }

    pub fn model_export(config: &Config, output: &str) -> Result<()> {
        // Loading validates the artifact before it is rewritten
        let predictor = Predictor::load(&config.data.artifact_path)?;
        predictor.artifact().save(output)?;
        println!("Model exported to {}", output);

        Ok(())
    }
}
