use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

const BAR_WIDTH: usize = 20;

/// The current day in UTC, which is how the server buckets `since`.
pub(crate) fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Resolve a day argument relative to `today`: `YYYY-MM-DD`, `today` or `yesterday`.
pub(crate) fn parse_day(arg: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    let Some(arg) = arg.map(str::trim) else {
        return Ok(today);
    };
    match arg {
        "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .with_context(|| format!("No day before {today}")),
        _ => NaiveDate::parse_from_str(arg, "%Y-%m-%d")
            .with_context(|| format!("Invalid day '{arg}'. Use YYYY-MM-DD, today or yesterday")),
    }
}

/// Render a `[####----]` bar for a percentage in `[0, 100]`.
pub(crate) fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cut a food name to `width` characters, marking the cut with `...`.
pub(crate) fn shorten_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let kept: String = name.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_day_defaults_to_today() {
        let today = day(2024, 6, 15);
        assert_eq!(parse_day(None, today).unwrap(), today);
        assert_eq!(parse_day(Some("today"), today).unwrap(), today);
    }

    #[test]
    fn test_parse_day_yesterday_crosses_month() {
        assert_eq!(
            parse_day(Some("yesterday"), day(2024, 3, 1)).unwrap(),
            day(2024, 2, 29)
        );
    }

    #[test]
    fn test_parse_day_explicit_date() {
        let today = day(2024, 6, 15);
        assert_eq!(
            parse_day(Some(" 2024-06-01 "), today).unwrap(),
            day(2024, 6, 1)
        );
    }

    #[test]
    fn test_parse_day_rejects_other_words() {
        let today = day(2024, 6, 15);
        assert!(parse_day(Some("breakfast"), today).is_err());
        assert!(parse_day(Some("2024-13-01"), today).is_err());
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(20)));
        assert_eq!(progress_bar(100.0), format!("[{}]", "#".repeat(20)));
        assert_eq!(
            progress_bar(50.0),
            format!("[{}{}]", "#".repeat(10), "-".repeat(10))
        );
        assert_eq!(progress_bar(250.0), progress_bar(100.0));
    }

    #[test]
    fn test_shorten_name_keeps_short_names() {
        assert_eq!(shorten_name("Greek yogurt", 30), "Greek yogurt");
        assert_eq!(shorten_name("Oats", 4), "Oats");
    }

    #[test]
    fn test_shorten_name_cuts_long_names() {
        assert_eq!(
            shorten_name("Chicken breast with rice and broccoli", 20),
            "Chicken breast wi..."
        );
        assert_eq!(shorten_name("Açaí bowl with granola", 10), "Açaí bo...");
    }
}
