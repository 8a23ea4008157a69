pub fn handle_command(input: &str) -> Result<(), String> {
    match input.to_lowercase().as_str() {
        "help" => {
            println!("\n🍽️ Meal Analyzer Commands:");
            println!("  load <image>  - Select a meal photo (png, jpeg, gif, webp, bmp, tiff)");
            println!("  analyze       - Estimate calories and nutrient shares");
            println!("  check         - Same as analyze");
            println!("  result        - Show the last analysis and its chart");
            println!("  status        - Show the current session state");
            println!();

            println!("⚙️ System Commands:");
            println!("  provider  - Show the inference provider in use");
            println!("  help      - Show this help menu");
            println!("  exit      - Exit the program");
            Ok(())
        },
        "exit" | "quit" => {
            println!("👋 Goodbye!");
            std::process::exit(0);
        },
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string())
    }
}
