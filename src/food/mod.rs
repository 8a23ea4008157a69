pub mod analysis;
pub mod chart;
pub mod config;
pub mod session;

pub use analysis::{Analysis, CalorieEstimate, NutrientRecord, RecordSource};
pub use chart::{project, ChartSeries};
pub use config::AnalysisConfig;
pub use session::{AnalyzeOutcome, AnalyzerEvent, MealAnalyzer, SessionSnapshot, SessionState, SkipReason};
