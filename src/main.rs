use meal_analyzer::api;
use meal_analyzer::commands::meal_cmd;
use meal_analyzer::commands::CommandHandler;
use meal_analyzer::config::{ProviderConfig, ProviderKind};
use meal_analyzer::food::{AnalysisConfig, MealAnalyzer};
use meal_analyzer::providers::create_provider;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use rustyline::history::DefaultHistory;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Estimate calories and nutrients from a meal photo", long_about = None)]
struct Args {
    /// Analyze this image once and exit
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(short, long)]
    api_key: Option<String>,

    /// Inference provider: fal or openai
    #[arg(long, default_value = "fal")]
    provider: String,

    /// Show extracted values as-is even when the model output had none
    #[arg(long)]
    no_fallback: bool,

    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize colored output
    colored::control::set_override(true);

    // Load environment variables
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let analyzer = build_analyzer(&args)?;

    if args.api {
        run_api_server(analyzer, args.port).await
    } else if let Some(image) = &args.image {
        run_once(&analyzer, image).await
    } else {
        run_cli_mode(analyzer).await
    }
}

fn build_analyzer(args: &Args) -> Result<MealAnalyzer, Box<dyn std::error::Error + Send + Sync>> {
    let kind: ProviderKind = args.provider.parse()?;
    let provider_config = ProviderConfig::from_env(kind, args.api_key.clone())?;
    log::info!("Using provider config: {:?}", provider_config);

    let mut analysis_config = AnalysisConfig::from_env();
    if args.no_fallback {
        analysis_config.fallback_profile = false;
    }

    Ok(MealAnalyzer::new(create_provider(&provider_config), analysis_config))
}

async fn run_once(analyzer: &MealAnalyzer, image: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = image.to_string_lossy();
    meal_cmd::select_image_file(&path, analyzer).await?;
    meal_cmd::run_analysis(analyzer).await?;
    Ok(())
}

async fn run_cli_mode(analyzer: MealAnalyzer) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut command_handler = CommandHandler::new(analyzer);

    // Show initial help menu
    command_handler.handle_command("help").await?;

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("🍽️  ") {
            Ok(line) => {
                let input = line.trim();
                let _ = rl.add_history_entry(input);

                if let Err(e) = command_handler.handle_command(input).await {
                    println!("{}", e.red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_api_server(analyzer: MealAnalyzer, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting API server on {} with provider {}", addr, analyzer.provider_name());

    let app = api::create_api(analyzer);

    let listener = TcpListener::bind(&addr).await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    println!("Server successfully bound to {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}
