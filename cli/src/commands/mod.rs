mod entries;
mod helpers;
mod log;
mod profile;
mod today;

use anyhow::{Context, Result};

use crate::client::ApiClient;
use nutrisnap_core::models::User;

pub(crate) use entries::cmd_entries;
pub(crate) use log::{LogArgs, cmd_log};
pub(crate) use profile::{ProfileUpdate, cmd_profile_set, cmd_profile_show};
pub(crate) use today::cmd_today;

/// Fetch the profile every tracking command depends on.
pub(super) async fn require_user(client: &mut ApiClient, user_id: i64) -> Result<User> {
    client.get_user(user_id).await?.with_context(|| {
        format!("No profile found for user {user_id}. Create one with `nutrisnap profile set`")
    })
}
