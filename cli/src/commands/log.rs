use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::client::{ApiClient, FoodEntryForm};
use nutrisnap_core::nutrition::estimate_nutrition;

use super::helpers::print_json;
use super::require_user;

/// Arguments of `nutrisnap log`.
#[derive(Debug)]
pub(crate) struct LogArgs {
    pub image: PathBuf,
    pub food: String,
    pub quantity: u32,
    pub unit: String,
    pub calories: Option<u32>,
    pub protein: Option<f64>,
}

/// Fill in missing nutrition values from the quantity estimate.
fn build_form(user_id: i64, args: &LogArgs) -> Result<FoodEntryForm> {
    let food_name = args.food.trim();
    if food_name.is_empty() {
        bail!("Food name must not be empty");
    }
    if args.protein.is_some_and(|p| p < 0.0 || !p.is_finite()) {
        bail!("Protein must be a non-negative number");
    }

    let estimate = estimate_nutrition(f64::from(args.quantity));
    Ok(FoodEntryForm {
        user_id,
        food_name: food_name.to_string(),
        quantity: i64::from(args.quantity),
        unit: args.unit.clone(),
        calories: args.calories.map_or(estimate.calories, i64::from),
        protein: args.protein.unwrap_or(estimate.protein),
    })
}

pub(crate) async fn cmd_log(
    client: &mut ApiClient,
    user_id: i64,
    args: LogArgs,
    json: bool,
) -> Result<()> {
    if !args.image.is_file() {
        bail!("Image not found: {}", args.image.display());
    }
    let user = require_user(client, user_id).await?;
    let form = build_form(user.id, &args)?;
    let entry = client.create_food_entry(&form, &args.image).await?;

    if json {
        return print_json(&entry);
    }

    println!(
        "Logged {} {} {} ({} kcal, {}g protein) [#{}]",
        entry.quantity, entry.unit, entry.food_name, entry.calories, entry.protein, entry.id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(calories: Option<u32>, protein: Option<f64>) -> LogArgs {
        LogArgs {
            image: PathBuf::from("meal.jpg"),
            food: "  Oatmeal ".to_string(),
            quantity: 150,
            unit: "grams".to_string(),
            calories,
            protein,
        }
    }

    #[test]
    fn test_build_form_estimates_missing_values() {
        let form = build_form(3, &args(None, None)).unwrap();
        assert_eq!(form.user_id, 3);
        assert_eq!(form.food_name, "Oatmeal");
        assert_eq!(form.quantity, 150);
        assert_eq!(form.calories, 300);
        assert!((form.protein - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_form_keeps_given_values() {
        let form = build_form(1, &args(Some(420), Some(12.5))).unwrap();
        assert_eq!(form.calories, 420);
        assert!((form.protein - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_form_rejects_negative_protein() {
        assert!(build_form(1, &args(None, Some(-1.0))).is_err());
    }

    #[test]
    fn test_build_form_rejects_blank_name() {
        let mut a = args(None, None);
        a.food = "   ".to_string();
        assert!(build_form(1, &a).is_err());
    }
}
