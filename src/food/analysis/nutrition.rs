use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Display text for a calorie value the model did not report.
pub const CALORIES_UNAVAILABLE: &str = "Estimate unavailable";

/// Total calories of a meal as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalorieEstimate {
    /// A value reported by the model, always positive.
    Kcal(u32),
    /// No usable value was found in the model output.
    Unavailable,
    /// A rough figure that did not come from the model.
    Approximate(u32),
}

impl CalorieEstimate {
    /// Builds an estimate from a captured value. Zero is not a meal.
    pub fn from_capture(value: Option<u32>) -> Self {
        match value {
            Some(kcal) if kcal > 0 => CalorieEstimate::Kcal(kcal),
            _ => CalorieEstimate::Unavailable,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CalorieEstimate::Unavailable)
    }
}

impl fmt::Display for CalorieEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalorieEstimate::Kcal(kcal) => write!(f, "{}", kcal),
            CalorieEstimate::Unavailable => f.write_str(CALORIES_UNAVAILABLE),
            CalorieEstimate::Approximate(kcal) => write!(f, "Approx. {}", kcal),
        }
    }
}

// Numbers stay numbers on the wire, placeholders go out as their display text.
impl Serialize for CalorieEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CalorieEstimate::Kcal(kcal) => serializer.serialize_u32(*kcal),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

/// Normalized nutrient breakdown of one analyzed meal.
///
/// Percentages are shares of 100 as reported by the model. They are not
/// rescaled and need not add up to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientRecord {
    pub total_calories: CalorieEstimate,
    pub carbohydrates: u32,
    pub fat: u32,
    pub protein: u32,
    pub sodium: u32,
    pub calcium: u32,
    pub saturated_fat: u32,
}

impl NutrientRecord {
    /// Percentage fields in chart order.
    pub fn percentages(&self) -> [u32; 6] {
        [
            self.carbohydrates,
            self.fat,
            self.protein,
            self.sodium,
            self.calcium,
            self.saturated_fat,
        ]
    }

    /// True when no field carries data: calories unavailable and every share zero.
    pub fn is_empty(&self) -> bool {
        self.total_calories.is_unavailable() && self.percentages().iter().all(|&v| v == 0)
    }
}

/// Where the numbers in a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Extracted,
    FallbackProfile,
}

/// A completed analysis, immutable once stored in the session.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub record: NutrientRecord,
    pub source: RecordSource,
    pub raw_output: String,
    pub analyzed_at: DateTime<Utc>,
}
