use serde::Serialize;

use crate::models::{FoodEntry, User};

/// Placeholder rates used by the entry form's auto-calculation.
pub const CALORIES_PER_UNIT: f64 = 2.0;
pub const PROTEIN_PER_UNIT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Nutrition {
    pub calories: i64,
    pub protein: f64,
}

/// Linear estimate from quantity alone: whole calories, protein to one decimal.
#[must_use]
pub fn estimate_nutrition(quantity: f64) -> Nutrition {
    let calories = (quantity * CALORIES_PER_UNIT).round() as i64;
    let protein = (quantity * PROTEIN_PER_UNIT * 10.0).round() / 10.0;
    Nutrition { calories, protein }
}

/// Percentage of `target` reached by `total`, clamped to `[0, 100]`.
///
/// A zero target counts as met as soon as anything has been consumed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_percent(total: i64, target: i64) -> f64 {
    if target <= 0 {
        return if total > 0 { 100.0 } else { 0.0 };
    }
    (total as f64 / target as f64 * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub total_calories: i64,
    pub total_protein: i64,
    pub calorie_target: i64,
    pub protein_target: i64,
    pub calorie_progress: f64,
    pub protein_progress: f64,
    pub over_target: bool,
}

impl DailyProgress {
    #[must_use]
    pub fn from_entries(user: &User, entries: &[FoodEntry]) -> Self {
        let total_calories = entries.iter().map(|e| e.calories).sum();
        let total_protein = entries.iter().map(|e| e.protein).sum();
        Self {
            total_calories,
            total_protein,
            calorie_target: user.daily_calorie_target,
            protein_target: user.daily_protein_target,
            calorie_progress: progress_percent(total_calories, user.daily_calorie_target),
            protein_progress: progress_percent(total_protein, user.daily_protein_target),
            over_target: total_calories > user.daily_calorie_target,
        }
    }
}
