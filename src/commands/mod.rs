use colored::Colorize;
use crate::food::session::MealAnalyzer;

mod system;

pub mod meal_cmd;

pub struct CommandHandler {
    analyzer: MealAnalyzer,
}

impl CommandHandler {
    pub fn new(analyzer: MealAnalyzer) -> Self {
        Self { analyzer }
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<(), String> {
        if input.is_empty() {
            return Ok(());
        }

        let input = input.trim();

        // Handle single-word commands first
        match input.to_lowercase().as_str() {
            "help" | "exit" | "quit" => return system::handle_command(input),
            "provider" | "providers" => return self.show_provider(),
            _ => {}
        }

        match input.split_whitespace().next() {
            Some("load") | Some("analyze") | Some("check") | Some("status") | Some("result") | Some("chart") => {
                meal_cmd::handle_command(input, &self.analyzer).await
            }
            _ => Err(format!("Unknown command: {}. Type 'help' for available commands.", input)),
        }
    }

    fn show_provider(&self) -> Result<(), String> {
        println!("\n🤖 Inference provider: {}", self.analyzer.provider_name().cyan());
        println!("  Model: {}", self.analyzer.model());
        println!("\nTo switch providers, restart with: --provider <fal|openai>");
        Ok(())
    }
}
