use crate::food::analysis::nutrition::{CalorieEstimate, NutrientRecord, RecordSource};

/// Placeholder shown when the model gave nothing usable, roughly a slice of pizza.
pub const FALLBACK_PROFILE: NutrientRecord = NutrientRecord {
    total_calories: CalorieEstimate::Approximate(300),
    carbohydrates: 35,
    fat: 10,
    protein: 15,
    sodium: 25,
    calcium: 10,
    saturated_fat: 5,
};

/// Replaces a record with no data at all by [`FALLBACK_PROFILE`].
///
/// Partial data passes through untouched, however sparse.
pub fn apply_fallback(record: NutrientRecord) -> (NutrientRecord, RecordSource) {
    if record.is_empty() {
        log::info!("No nutrient data in model output, using fallback profile");
        (FALLBACK_PROFILE, RecordSource::FallbackProfile)
    } else {
        (record, RecordSource::Extracted)
    }
}
