pub mod extractor;
pub mod fallback;
pub mod nutrition;

pub use extractor::extract;
pub use fallback::{apply_fallback, FALLBACK_PROFILE};
pub use nutrition::{Analysis, CalorieEstimate, NutrientRecord, RecordSource};
