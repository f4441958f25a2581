use anyhow::{Result, bail};

use crate::client::ApiClient;
use nutrisnap_core::models::{NewUser, User};

use super::helpers::print_json;
use super::require_user;

const DEFAULT_CALORIE_TARGET: i64 = 2000;
const DEFAULT_PROTEIN_TARGET: i64 = 50;

/// Profile fields given on the command line; unset fields keep their current value.
#[derive(Debug, Default)]
pub(crate) struct ProfileUpdate {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub calories: Option<u32>,
    pub protein: Option<u32>,
}

fn merge_profile(existing: Option<&User>, update: ProfileUpdate) -> Result<NewUser> {
    let gender = match (update.gender, existing) {
        (Some(g), _) => g,
        (None, Some(user)) => user.gender.clone(),
        (None, None) => bail!("--gender is required when creating a profile"),
    };
    Ok(NewUser {
        age: update
            .age
            .map_or_else(|| existing.map_or(0, |u| u.age), i64::from),
        gender,
        daily_calorie_target: update.calories.map_or_else(
            || existing.map_or(DEFAULT_CALORIE_TARGET, |u| u.daily_calorie_target),
            i64::from,
        ),
        daily_protein_target: update.protein.map_or_else(
            || existing.map_or(DEFAULT_PROTEIN_TARGET, |u| u.daily_protein_target),
            i64::from,
        ),
    })
}

fn print_profile(user: &User) {
    println!("Profile #{}", user.id);
    println!("  Age:            {}", user.age);
    println!("  Gender:         {}", user.gender);
    println!("  Calorie target: {} kcal", user.daily_calorie_target);
    println!("  Protein target: {} g", user.daily_protein_target);
}

pub(crate) async fn cmd_profile_show(
    client: &mut ApiClient,
    user_id: i64,
    json: bool,
) -> Result<()> {
    let user = require_user(client, user_id).await?;
    if json {
        return print_json(&user);
    }
    print_profile(&user);
    Ok(())
}

pub(crate) async fn cmd_profile_set(
    client: &mut ApiClient,
    user_id: i64,
    update: ProfileUpdate,
    json: bool,
) -> Result<()> {
    let existing = client.get_user(user_id).await?;
    let profile = merge_profile(existing.as_ref(), update)?;
    let user = client.save_profile(existing.as_ref(), &profile).await?;

    if json {
        return print_json(&user);
    }

    println!("Profile saved.");
    print_profile(&user);
    if user.id != user_id {
        let id = user.id;
        eprintln!("Note: the server assigned id {id}. Use --user {id} or NUTRISNAP_USER_ID={id}.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> User {
        User {
            id: 1,
            age: 40,
            gender: "female".to_string(),
            daily_calorie_target: 1800,
            daily_protein_target: 90,
        }
    }

    #[test]
    fn test_merge_new_profile_uses_defaults() {
        let profile = merge_profile(
            None,
            ProfileUpdate {
                gender: Some("male".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(profile.age, 0);
        assert_eq!(profile.gender, "male");
        assert_eq!(profile.daily_calorie_target, 2000);
        assert_eq!(profile.daily_protein_target, 50);
    }

    #[test]
    fn test_merge_new_profile_requires_gender() {
        assert!(merge_profile(None, ProfileUpdate::default()).is_err());
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let user = existing();
        let profile = merge_profile(
            Some(&user),
            ProfileUpdate {
                calories: Some(2200),
                ..ProfileUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(profile.age, 40);
        assert_eq!(profile.gender, "female");
        assert_eq!(profile.daily_calorie_target, 2200);
        assert_eq!(profile.daily_protein_target, 90);
    }
}
