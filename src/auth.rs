use crate::db::Database;
use crate::error::{PelaError, Result};
use crate::models::{GroupRole, Membership};

/// The authenticated caller. Discord has already verified who sent the
/// interaction, so this only carries the user id through to the checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

pub async fn require_group_member(
    database: &Database,
    identity: &Identity,
    group_id: &str,
) -> Result<Membership> {
    database
        .membership(group_id, &identity.user_id)
        .await?
        .ok_or_else(|| PelaError::Forbidden("você não faz parte deste grupo".to_string()))
}

pub async fn require_group_admin(
    database: &Database,
    identity: &Identity,
    group_id: &str,
) -> Result<Membership> {
    let membership = require_group_member(database, identity, group_id).await?;
    if membership.role != GroupRole::Admin {
        return Err(PelaError::Forbidden(
            "apenas administradores do grupo podem fazer isso".to_string(),
        ));
    }
    Ok(membership)
}
