use lazy_static::lazy_static;
use regex::Regex;

use crate::food::analysis::nutrition::{CalorieEstimate, NutrientRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    TotalCalories,
    Carbohydrates,
    Fat,
    Protein,
    Sodium,
    Calcium,
    SaturatedFat,
}

struct FieldPattern {
    field: Field,
    regex: Regex,
    /// Qualifiers that turn a match into a different label, e.g. "Saturated" before "Fat".
    shadowed_by: &'static [&'static str],
}

fn pattern(field: Field, label: &str, percent: bool, shadowed_by: &'static [&'static str]) -> FieldPattern {
    let label = label.replace(' ', r"\s+");
    let suffix = if percent { "%?" } else { "" };
    let source = format!(r"(?i)\b{}:\s*([0-9]+){}", label, suffix);
    FieldPattern {
        field,
        regex: Regex::new(&source).expect("static nutrient pattern"),
        shadowed_by,
    }
}

lazy_static! {
    /// One pattern per field, values are ASCII digits only.
    ///
    /// `Fat` skips any match preceded by "Saturated", so text that only
    /// contains `Saturated Fat: 5%` yields `fat = 0`, not 5.
    static ref PATTERNS: Vec<FieldPattern> = vec![
        pattern(Field::TotalCalories, "Total Calories", false, &[]),
        pattern(Field::Carbohydrates, "Carbohydrates", true, &[]),
        pattern(Field::Fat, "Fat", true, &["saturated"]),
        pattern(Field::Protein, "Protein", true, &[]),
        pattern(Field::Sodium, "Sodium", true, &[]),
        pattern(Field::Calcium, "Calcium", true, &[]),
        pattern(Field::SaturatedFat, "Saturated Fat", true, &[]),
    ];
}

/// First integer captured for the pattern, or `None` when the label is
/// missing or its value does not fit.
fn capture(text: &str, pattern: &FieldPattern) -> Option<u32> {
    pattern
        .regex
        .captures_iter(text)
        .find(|caps| {
            let start = caps.get(0).map_or(0, |m| m.start());
            let before = text[..start].trim_end().to_lowercase();
            !pattern.shadowed_by.iter().any(|q| before.ends_with(q))
        })
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Pulls a nutrient record out of free text shaped like
/// `Total Calories: 450, Carbohydrates: 40%, ...`.
///
/// Labels are searched independently and in any order. Missing labels
/// become `0`, or `Unavailable` for calories. Never fails.
pub fn extract(raw_text: &str) -> NutrientRecord {
    let mut record = NutrientRecord {
        total_calories: CalorieEstimate::Unavailable,
        carbohydrates: 0,
        fat: 0,
        protein: 0,
        sodium: 0,
        calcium: 0,
        saturated_fat: 0,
    };

    for pattern in PATTERNS.iter() {
        let value = capture(raw_text, pattern);
        match pattern.field {
            Field::TotalCalories => record.total_calories = CalorieEstimate::from_capture(value),
            Field::Carbohydrates => record.carbohydrates = value.unwrap_or(0),
            Field::Fat => record.fat = value.unwrap_or(0),
            Field::Protein => record.protein = value.unwrap_or(0),
            Field::Sodium => record.sodium = value.unwrap_or(0),
            Field::Calcium => record.calcium = value.unwrap_or(0),
            Field::SaturatedFat => record.saturated_fat = value.unwrap_or(0),
        }
    }

    log::debug!("Extracted nutrient record: {:?}", record);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_every_labelled_field() {
        let text = "Total Calories: 450, Carbohydrates: 40%, Fat: 20%, Protein: 25%, \
                    Sodium: 8%, Calcium: 4%, Saturated Fat: 3%";
        let record = extract(text);
        assert_eq!(record.total_calories, CalorieEstimate::Kcal(450));
        assert_eq!(record.percentages(), [40, 20, 25, 8, 4, 3]);
    }

    #[test]
    fn labels_are_case_insensitive_and_unordered() {
        let text = "protein: 30%\nCALCIUM:2%\ntotal calories:  812\ncarbohydrates: 51 %";
        let record = extract(text);
        assert_eq!(record.total_calories, CalorieEstimate::Kcal(812));
        assert_eq!(record.protein, 30);
        assert_eq!(record.calcium, 2);
        assert_eq!(record.carbohydrates, 51);
        assert_eq!(record.fat, 0);
    }

    #[test]
    fn percent_sign_is_optional() {
        let record = extract("Sodium: 12, Fat: 9");
        assert_eq!(record.sodium, 12);
        assert_eq!(record.fat, 9);
    }

    #[test]
    fn fat_ignores_saturated_fat() {
        let record = extract("Saturated Fat: 7%, Protein: 20%, Fat: 18%");
        assert_eq!(record.saturated_fat, 7);
        assert_eq!(record.fat, 18);

        let record = extract("Saturated Fat: 7%");
        assert_eq!(record.fat, 0);
        assert_eq!(record.saturated_fat, 7);
    }

    #[test]
    fn full_width_digits_are_not_values() {
        let record = extract("Protein: \u{FF14}\u{FF10}%, Protein: 40%");
        assert_eq!(record.protein, 40);

        let record = extract("Total Calories: \u{0664}\u{0665}\u{0660}");
        assert_eq!(record.total_calories, CalorieEstimate::Unavailable);
    }

    #[test]
    fn first_match_wins() {
        let record = extract("Protein: 12%. On second thought, Protein: 40%");
        assert_eq!(record.protein, 12);
    }

    #[test]
    fn unrecognized_text_yields_sentinels() {
        let record = extract("I'm sorry, I can't tell what is on this plate.");
        assert_eq!(record.total_calories, CalorieEstimate::Unavailable);
        assert_eq!(record.percentages(), [0; 6]);
        assert!(record.is_empty());
    }

    #[test]
    fn only_calories_present() {
        let record = extract("Total Calories: 450");
        assert_eq!(record.total_calories, CalorieEstimate::Kcal(450));
        assert_eq!(record.percentages(), [0; 6]);
        assert!(!record.is_empty());
    }

    #[test]
    fn oversized_numbers_are_treated_as_missing() {
        let record = extract("Total Calories: 99999999999999, Fat: 99999999999999%");
        assert_eq!(record.total_calories, CalorieEstimate::Unavailable);
        assert_eq!(record.fat, 0);
    }
}
