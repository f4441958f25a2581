use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use crate::client::ApiClient;
use nutrisnap_core::models::FoodEntry;

use super::helpers::{parse_day, print_json, shorten_name, utc_today};
use super::require_user;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Logged")]
    logged: String,
    #[tabled(rename = "Food")]
    food: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "kcal")]
    calories: i64,
    #[tabled(rename = "Protein")]
    protein: String,
}

impl From<&FoodEntry> for EntryRow {
    fn from(e: &FoodEntry) -> Self {
        Self {
            id: e.id,
            logged: e.created_at.format("%Y-%m-%d %H:%M").to_string(),
            food: shorten_name(&e.food_name, 30),
            quantity: format!("{} {}", e.quantity, e.unit),
            calories: e.calories,
            protein: format!("{}g", e.protein),
        }
    }
}

pub(crate) async fn cmd_entries(
    client: &mut ApiClient,
    user_id: i64,
    since: Option<String>,
    json: bool,
) -> Result<()> {
    let since = since
        .map(|s| parse_day(Some(&s), utc_today()))
        .transpose()?;
    let user = require_user(client, user_id).await?;
    let entries = client.food_entries(user.id, since).await?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        eprintln!("No food entries found");
        process::exit(2);
    }

    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
