use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::food::analysis::{Analysis, RecordSource};
use crate::food::chart::{project, NO_DATA_MESSAGE};
use crate::food::session::{AnalyzeOutcome, AnalyzerEvent, MealAnalyzer, SessionState, SkipReason};
use crate::providers::traits::QueueUpdate;
use crate::providers::utils::load_image;

const DISCLAIMER: &str = "Note: These are rough estimates and may not be accurate.";

pub async fn handle_command(input: &str, analyzer: &MealAnalyzer) -> Result<(), String> {
    let input = input.trim();

    match input.split_whitespace().next() {
        Some("load") => {
            let path = input.trim_start_matches("load").trim();
            if path.is_empty() {
                println!("Please specify an image file to load.");
                return Ok(());
            }
            select_image_file(path, analyzer).await
        }
        Some("analyze") | Some("check") => run_analysis(analyzer).await,
        Some("status") => {
            print_status(analyzer);
            Ok(())
        }
        Some("result") | Some("chart") => {
            match analyzer.snapshot().analysis {
                Some(analysis) => print_analysis(&analysis),
                None => println!("No analysis yet. Load an image and run: analyze"),
            }
            Ok(())
        }
        _ => {
            println!("Available commands:\n- load <image> (Select a meal photo)\n- analyze (Estimate its nutrition)\n- status (Show session state)\n- result (Show the last analysis)");
            Ok(())
        }
    }
}

pub async fn select_image_file(path: &str, analyzer: &MealAnalyzer) -> Result<(), String> {
    let payload = load_image(path).await.map_err(|e| e.to_string())?;
    analyzer.select_image(payload);
    println!("📷 Image loaded: {}", path.cyan());
    println!("Run {} to estimate its nutrition.", "analyze".cyan());
    Ok(())
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("Analyzing...");
    bar
}

pub async fn run_analysis(analyzer: &MealAnalyzer) -> Result<(), String> {
    let bar = spinner();
    let mut events = analyzer.subscribe();
    let watcher = tokio::spawn({
        let bar = bar.clone();
        async move {
            loop {
                match events.recv().await {
                    Ok(AnalyzerEvent::Progress(QueueUpdate::InQueue { position })) => {
                        let position = position.map(|p| format!(" (position {})", p)).unwrap_or_default();
                        bar.set_message(format!("Waiting in queue{}", position));
                    }
                    Ok(AnalyzerEvent::Progress(QueueUpdate::InProgress { logs })) => {
                        match logs.last() {
                            Some(line) => bar.set_message(format!("Analyzing... {}", line)),
                            None => bar.set_message("Analyzing..."),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }
    });

    let outcome = analyzer.analyze().await;
    watcher.abort();
    bar.finish_and_clear();

    match outcome {
        AnalyzeOutcome::Completed(analysis) => {
            print_analysis(&analysis);
            Ok(())
        }
        AnalyzeOutcome::Failed(message) => Err(message),
        AnalyzeOutcome::Skipped(SkipReason::NoImage) => {
            println!("No image selected. Use: load <image>");
            Ok(())
        }
        AnalyzeOutcome::Skipped(SkipReason::AlreadyAnalyzing) => {
            println!("An analysis is already running.");
            Ok(())
        }
        AnalyzeOutcome::Discarded => {
            println!("The image changed during analysis; run analyze again.");
            Ok(())
        }
    }
}

pub fn print_analysis(analysis: &Analysis) {
    println!("\n🍽️  {}", "Analysis Result".bold());
    println!("Total Calories: {}", analysis.record.total_calories.to_string().yellow());
    println!();

    match project(&analysis.record) {
        Some(series) => print!("{}", series.render_terminal()),
        None => println!("{}", NO_DATA_MESSAGE),
    }

    if analysis.source == RecordSource::FallbackProfile {
        println!("\n{}", "No nutrient values were found in the model output; showing a placeholder profile.".yellow());
    }
    println!("\n{}", DISCLAIMER.dimmed());
    println!();
}

fn print_status(analyzer: &MealAnalyzer) {
    let snapshot = analyzer.snapshot();
    let state = match snapshot.state {
        SessionState::Idle => "idle (no image)".normal(),
        SessionState::Ready => "ready".green(),
        SessionState::Analyzing => "analyzing".cyan(),
        SessionState::Analyzed => "analyzed".green(),
        SessionState::Errored => "error".red(),
    };
    println!("📋 Session: {}", state);
    if let Some(id) = snapshot.image_id {
        println!("  Image: {}", id);
    }
    println!("  Provider: {} ({})", analyzer.provider_name().cyan(), analyzer.model());
    if let Some(error) = snapshot.error {
        println!("  {}", error.red());
    }
}
