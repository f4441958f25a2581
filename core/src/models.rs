use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Units offered by the entry form. The server stores whatever it receives.
pub const UNITS: &[&str] = &["grams", "ml", "scoops", "pieces"];

/// Genders offered by the profile form. Free text on the server side.
pub const GENDERS: &[&str] = &["male", "female", "other"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub age: i64,
    pub gender: String,
    pub daily_calorie_target: i64,
    pub daily_protein_target: i64,
}

/// The field group accepted when creating or replacing a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub age: i64,
    pub gender: String,
    pub daily_calorie_target: i64,
    pub daily_protein_target: i64,
}

impl NewUser {
    #[must_use]
    pub fn with_id(self, id: i64) -> User {
        User {
            id,
            age: self.age,
            gender: self.gender,
            daily_calorie_target: self.daily_calorie_target,
            daily_protein_target: self.daily_protein_target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: i64,
    pub user_id: i64,
    pub image_url: String,
    pub food_name: String,
    pub quantity: i64,
    pub unit: String,
    pub calories: i64,
    pub protein: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFoodEntry {
    pub user_id: i64,
    pub image_url: String,
    pub food_name: String,
    pub quantity: i64,
    pub unit: String,
    pub calories: i64,
    pub protein: i64,
}

impl NewFoodEntry {
    #[must_use]
    pub fn with_id(self, id: i64, created_at: DateTime<Utc>) -> FoodEntry {
        FoodEntry {
            id,
            user_id: self.user_id,
            image_url: self.image_url,
            food_name: self.food_name,
            quantity: self.quantity,
            unit: self.unit,
            calories: self.calories,
            protein: self.protein,
            created_at,
        }
    }
}

// --- Wire payloads ---

/// A user body as received over the wire. Every field is optional so that
/// missing fields are reported by [`validate_user`] instead of the decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub daily_calorie_target: Option<i64>,
    pub daily_protein_target: Option<i64>,
}

/// Text fields of a multipart food entry form, before numeric coercion.
#[derive(Debug, Clone, Default)]
pub struct FoodEntryPayload {
    pub user_id: Option<String>,
    pub food_name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub calories: Option<String>,
    pub protein: Option<String>,
}

impl FoodEntryPayload {
    /// Assign a form field by its wire name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "userId" => &mut self.user_id,
            "foodName" => &mut self.food_name,
            "quantity" => &mut self.quantity,
            "unit" => &mut self.unit,
            "calories" => &mut self.calories,
            "protein" => &mut self.protein,
            _ => return,
        };
        *slot = Some(value);
    }
}

// --- Validation ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
    #[error("{0} must be a whole number")]
    NotAnInteger(&'static str),
    #[error("{0} is too large")]
    TooLarge(&'static str),
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::Missing(field))
}

fn non_negative(value: i64, field: &'static str) -> Result<i64, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative(field));
    }
    Ok(value)
}

pub fn validate_user(payload: UserPayload) -> Result<NewUser, ValidationError> {
    let age = non_negative(required(payload.age, "age")?, "age")?;
    let gender = required(payload.gender, "gender")?;
    let daily_calorie_target = non_negative(
        required(payload.daily_calorie_target, "dailyCalorieTarget")?,
        "dailyCalorieTarget",
    )?;
    let daily_protein_target = non_negative(
        required(payload.daily_protein_target, "dailyProteinTarget")?,
        "dailyProteinTarget",
    )?;
    Ok(NewUser {
        age,
        gender,
        daily_calorie_target,
        daily_protein_target,
    })
}

fn parse_number(raw: &str, field: &'static str) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(field))?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber(field));
    }
    Ok(value)
}

/// Coerce a form value that must hold a whole, non-negative number.
pub fn coerce_integer(raw: &str, field: &'static str) -> Result<i64, ValidationError> {
    let value = parse_number(raw, field)?;
    if value.fract() != 0.0 {
        return Err(ValidationError::NotAnInteger(field));
    }
    if value < 0.0 {
        return Err(ValidationError::Negative(field));
    }
    to_i64(value, field)
}

/// Coerce a form value that may carry decimals, rounding to the nearest integer.
pub fn coerce_rounded(raw: &str, field: &'static str) -> Result<i64, ValidationError> {
    let value = parse_number(raw, field)?;
    if value < 0.0 {
        return Err(ValidationError::Negative(field));
    }
    to_i64(value.round(), field)
}

/// `i64::MAX as f64` rounds up to 2^63, so the bound is exclusive.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn to_i64(value: f64, field: &'static str) -> Result<i64, ValidationError> {
    if value >= i64::MAX as f64 {
        return Err(ValidationError::TooLarge(field));
    }
    Ok(value as i64)
}

/// Validate the text fields of a food entry form against the stored image path.
pub fn validate_food_entry(
    payload: FoodEntryPayload,
    image_url: String,
) -> Result<NewFoodEntry, ValidationError> {
    let user_id = coerce_integer(&required(payload.user_id, "userId")?, "userId")?;

    let food_name = required(payload.food_name, "foodName")?;
    if food_name.trim().is_empty() {
        return Err(ValidationError::Empty("foodName"));
    }

    let quantity = coerce_integer(&required(payload.quantity, "quantity")?, "quantity")?;

    let unit = required(payload.unit, "unit")?;
    let calories = coerce_integer(&required(payload.calories, "calories")?, "calories")?;
    let protein = coerce_rounded(&required(payload.protein, "protein")?, "protein")?;

    Ok(NewFoodEntry {
        user_id,
        image_url,
        food_name,
        quantity,
        unit,
        calories,
        protein,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_user_payload() -> UserPayload {
        UserPayload {
            age: Some(30),
            gender: Some("female".to_string()),
            daily_calorie_target: Some(2000),
            daily_protein_target: Some(50),
        }
    }

    fn full_entry_payload() -> FoodEntryPayload {
        FoodEntryPayload {
            user_id: Some("1".to_string()),
            food_name: Some("Oats".to_string()),
            quantity: Some("100".to_string()),
            unit: Some("grams".to_string()),
            calories: Some("200".to_string()),
            protein: Some("10".to_string()),
        }
    }

    #[test]
    fn test_validate_user_complete() {
        let user = validate_user(full_user_payload()).unwrap();
        assert_eq!(user.age, 30);
        assert_eq!(user.gender, "female");
        assert_eq!(user.daily_calorie_target, 2000);
        assert_eq!(user.daily_protein_target, 50);
    }

    #[test]
    fn test_validate_user_missing_field() {
        let mut p = full_user_payload();
        p.age = None;
        assert_eq!(
            validate_user(p).unwrap_err(),
            ValidationError::Missing("age")
        );

        let mut p = full_user_payload();
        p.daily_protein_target = None;
        assert_eq!(
            validate_user(p).unwrap_err(),
            ValidationError::Missing("dailyProteinTarget")
        );
    }

    #[test]
    fn test_validate_user_negative() {
        let mut p = full_user_payload();
        p.daily_calorie_target = Some(-1);
        assert_eq!(
            validate_user(p).unwrap_err(),
            ValidationError::Negative("dailyCalorieTarget")
        );
    }

    #[test]
    fn test_validate_user_gender_is_free_text() {
        let mut p = full_user_payload();
        p.gender = Some("nonbinary".to_string());
        assert_eq!(validate_user(p).unwrap().gender, "nonbinary");
    }

    #[test]
    fn test_user_payload_camel_case() {
        let p: UserPayload = serde_json::from_str(
            r#"{"age":25,"gender":"male","dailyCalorieTarget":2500,"dailyProteinTarget":120}"#,
        )
        .unwrap();
        let user = validate_user(p).unwrap();
        assert_eq!(user.daily_calorie_target, 2500);
        assert_eq!(user.daily_protein_target, 120);
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let user = NewUser {
            age: 25,
            gender: "male".to_string(),
            daily_calorie_target: 2500,
            daily_protein_target: 120,
        }
        .with_id(7);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["dailyCalorieTarget"], 2500);
        assert!(json.get("daily_calorie_target").is_none());
    }

    #[test]
    fn test_validate_food_entry_complete() {
        let entry =
            validate_food_entry(full_entry_payload(), "uploads/abc".to_string()).unwrap();
        assert_eq!(entry.user_id, 1);
        assert_eq!(entry.image_url, "uploads/abc");
        assert_eq!(entry.food_name, "Oats");
        assert_eq!(entry.quantity, 100);
        assert_eq!(entry.calories, 200);
        assert_eq!(entry.protein, 10);
    }

    #[test]
    fn test_validate_food_entry_rounds_protein() {
        let mut p = full_entry_payload();
        p.protein = Some("10.5".to_string());
        let entry = validate_food_entry(p, String::new()).unwrap();
        assert_eq!(entry.protein, 11);

        let mut p = full_entry_payload();
        p.protein = Some("2.4".to_string());
        assert_eq!(validate_food_entry(p, String::new()).unwrap().protein, 2);
    }

    #[test]
    fn test_validate_food_entry_empty_name() {
        let mut p = full_entry_payload();
        p.food_name = Some("   ".to_string());
        assert_eq!(
            validate_food_entry(p, String::new()).unwrap_err(),
            ValidationError::Empty("foodName")
        );
    }

    #[test]
    fn test_validate_food_entry_not_a_number() {
        let mut p = full_entry_payload();
        p.quantity = Some("lots".to_string());
        assert_eq!(
            validate_food_entry(p, String::new()).unwrap_err(),
            ValidationError::NotANumber("quantity")
        );

        let mut p = full_entry_payload();
        p.calories = Some("NaN".to_string());
        assert!(validate_food_entry(p, String::new()).is_err());
    }

    #[test]
    fn test_validate_food_entry_fractional_integer_field() {
        let mut p = full_entry_payload();
        p.quantity = Some("1.5".to_string());
        assert_eq!(
            validate_food_entry(p, String::new()).unwrap_err(),
            ValidationError::NotAnInteger("quantity")
        );
    }

    #[test]
    fn test_validate_food_entry_missing_user() {
        let mut p = full_entry_payload();
        p.user_id = None;
        assert_eq!(
            validate_food_entry(p, String::new()).unwrap_err(),
            ValidationError::Missing("userId")
        );
    }

    #[test]
    fn test_validate_food_entry_negative() {
        let mut p = full_entry_payload();
        p.calories = Some("-5".to_string());
        assert_eq!(
            validate_food_entry(p, String::new()).unwrap_err(),
            ValidationError::Negative("calories")
        );
    }

    #[test]
    fn test_set_field_by_wire_name() {
        let mut p = FoodEntryPayload::default();
        p.set_field("foodName", "Rice".to_string());
        p.set_field("userId", "3".to_string());
        p.set_field("image", "ignored".to_string());
        assert_eq!(p.food_name.as_deref(), Some("Rice"));
        assert_eq!(p.user_id.as_deref(), Some("3"));
        assert!(p.quantity.is_none());
    }

    #[test]
    fn test_coerce_integer_accepts_whole_floats() {
        assert_eq!(coerce_integer("100.0", "quantity").unwrap(), 100);
        assert_eq!(coerce_integer(" 42 ", "quantity").unwrap(), 42);
    }

    #[test]
    fn test_coerce_integer_rejects_values_past_i64() {
        assert_eq!(
            coerce_integer("9223372036854775808", "calories"),
            Err(ValidationError::TooLarge("calories"))
        );
        assert_eq!(
            coerce_integer("1e19", "quantity"),
            Err(ValidationError::TooLarge("quantity"))
        );
        assert_eq!(
            coerce_integer("9007199254740992", "calories"),
            Ok(9_007_199_254_740_992)
        );
    }

    #[test]
    fn test_coerce_rounded_rejects_values_past_i64() {
        assert_eq!(
            coerce_rounded("1e300", "protein"),
            Err(ValidationError::TooLarge("protein"))
        );
        assert_eq!(coerce_rounded("12.5", "protein"), Ok(13));
    }

    #[test]
    fn test_validate_food_entry_huge_protein() {
        let mut payload = full_entry_payload();
        payload.protein = Some("1e300".to_string());
        assert_eq!(
            validate_food_entry(payload, "uploads/a.jpg".to_string()),
            Err(ValidationError::TooLarge("protein"))
        );
    }
}
