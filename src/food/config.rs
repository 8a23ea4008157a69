pub const DEFAULT_PROMPT: &str = "Analyze this meal image. Provide an estimate of total calories and approximate percentage breakdown of nutrients. If exact values are not possible, provide rough estimates. Format the response as: Total Calories: X, Carbohydrates: X%, Fat: X%, Protein: X%, Sodium: X%, Calcium: X%, Saturated Fat: X%. Replace X with estimated values.";

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub prompt: String,
    /// Substitute the placeholder profile when the model output has no data.
    pub fallback_profile: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            fallback_profile: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        let prompt = std::env::var("MEAL_PROMPT")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        let fallback_profile = std::env::var("MEAL_FALLBACK_PROFILE")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            prompt,
            fallback_profile,
        }
    }
}
