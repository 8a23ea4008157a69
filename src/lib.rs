pub mod api;
pub mod commands;
pub mod config;
pub mod food;
pub mod providers;

// Re-export commonly used items
pub use food::{AnalysisConfig, MealAnalyzer, NutrientRecord};
pub use providers::create_provider;
