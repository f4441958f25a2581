use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::client::ApiClient;
use nutrisnap_core::models::FoodEntry;
use nutrisnap_core::nutrition::DailyProgress;

use super::helpers::{parse_day, print_json, progress_bar, utc_today};
use super::require_user;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyReport {
    date: NaiveDate,
    progress: DailyProgress,
    entries: Vec<FoodEntry>,
}

/// Entries logged on `date`; the server only filters by a lower bound.
fn entries_on(entries: Vec<FoodEntry>, date: NaiveDate) -> Vec<FoodEntry> {
    entries
        .into_iter()
        .filter(|e| e.created_at.date_naive() == date)
        .collect()
}

pub(crate) async fn cmd_today(
    client: &mut ApiClient,
    user_id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_day(date.as_deref(), utc_today())?;
    let user = require_user(client, user_id).await?;
    let entries = entries_on(client.food_entries(user.id, Some(date)).await?, date);
    let progress = DailyProgress::from_entries(&user, &entries);

    if json {
        return print_json(&DailyReport {
            date,
            progress,
            entries,
        });
    }

    println!("=== {date} ===\n");
    println!(
        "  Calories {} {}/{} kcal ({:.0}%)",
        progress_bar(progress.calorie_progress),
        progress.total_calories,
        progress.calorie_target,
        progress.calorie_progress
    );
    println!(
        "  Protein  {} {}/{} g ({:.0}%)",
        progress_bar(progress.protein_progress),
        progress.total_protein,
        progress.protein_target,
        progress.protein_progress
    );

    if progress.over_target {
        println!("\nWarning: You have exceeded your daily calorie target!");
    }

    if entries.is_empty() {
        println!("\nNo food logged yet.");
    } else {
        println!();
        for e in &entries {
            println!(
                "  [{}] {} {} {} - {} kcal | P:{}g",
                e.id, e.quantity, e.unit, e.food_name, e.calories, e.protein
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(id: i64, day: u32) -> FoodEntry {
        FoodEntry {
            id,
            user_id: 1,
            image_url: format!("/uploads/{id}.jpg"),
            food_name: "Apple".to_string(),
            quantity: 1,
            unit: "pieces".to_string(),
            calories: 95,
            protein: 0,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_entries_on_drops_later_days() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let kept = entries_on(vec![entry(1, 10), entry(2, 11), entry(3, 10)], date);
        let ids: Vec<i64> = kept.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
