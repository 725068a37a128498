//! Admin access management.
//!
//! Admins are regular users with `role = admin`; there is no separate admin
//! account. The user must have signed in at least once so their profile
//! exists.
//!
//! # Usage
//!
//! ```bash
//! brnno-cli admin promote <uid>
//! brnno-cli admin demote <uid>
//! ```

use brnno_core::{Role, UserId};
use brnno_storefront::db::users::UserRepository;

use super::{CliError, store};

/// Give `uid` the admin role.
///
/// # Errors
///
/// Returns `CliError::UnknownUser` if no profile exists for `uid`.
pub async fn promote(uid: &str) -> Result<(), CliError> {
    set_role(uid, Role::Admin).await
}

/// Return `uid` to the regular user role.
///
/// # Errors
///
/// Returns `CliError::UnknownUser` if no profile exists for `uid`.
pub async fn demote(uid: &str) -> Result<(), CliError> {
    set_role(uid, Role::User).await
}

async fn set_role(uid: &str, role: Role) -> Result<(), CliError> {
    let store = store().await?;
    let users = UserRepository::new(&store);
    let uid = UserId::new(uid);

    let Some(profile) = users.get(&uid).await? else {
        return Err(CliError::UnknownUser(uid.to_string()));
    };
    if profile.record.role == role {
        tracing::info!("{} ({}) already has role {}", uid, profile.record.email, role);
        return Ok(());
    }

    users.set_role(&uid, role).await?;
    tracing::info!("{} ({}) now has role {}", uid, profile.record.email, role);
    Ok(())
}
