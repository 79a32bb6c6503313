use tracing::info;

use agora_shared::{BackendError, Profile};

use crate::state::AppState;

/// Change the signed-in user's display name, keeping the avatar.
///
/// Author names are joined at read time, so the room is refetched to pick
/// the new name up.
pub async fn set_display_name(state: &AppState, name: &str) -> Result<Profile, String> {
    let user = state
        .current_user()
        .ok_or_else(|| "No user signed in".to_string())?;

    let name = name.trim();
    if name.is_empty() {
        return Err("Display name cannot be empty".into());
    }

    let existing = match state.backend.get_profile(&user).await {
        Ok(profile) => profile,
        Err(BackendError::NotFound) => Profile::default(),
        Err(e) => return Err(format!("Failed to load profile: {e}")),
    };

    let profile = Profile {
        display_name: Some(name.to_string()),
        avatar_url: existing.avatar_url,
    };
    state
        .backend
        .upsert_profile(user.clone(), profile.clone())
        .await
        .map_err(|e| format!("Failed to update profile: {e}"))?;

    info!(user = %user, "Display name updated");
    state.registry.invalidate(&state.config.room);
    Ok(profile)
}
