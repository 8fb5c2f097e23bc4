//! Actor identity for the order workflow.
//!
//! Authentication itself happens upstream (gateway/session layer); requests
//! arrive here with a trusted `x-user-id` and `x-user-roles` pair. Those are
//! resolved once per request into an [`Actor`] capability set and threaded
//! explicitly into every state-machine guard, instead of re-querying roles
//! per check.

use std::collections::HashSet;
use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

/// Resolved caller identity: user id plus capability set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub roles: HashSet<Role>,
}

impl Actor {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn buyer(user_id: Uuid) -> Self {
        Self::new(user_id, [Role::Buyer])
    }

    pub fn seller(user_id: Uuid) -> Self {
        Self::new(user_id, [Role::Seller])
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, [Role::Admin])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admins hold every seller capability across all stores.
    pub fn is_seller(&self) -> bool {
        self.has_role(Role::Seller) || self.is_admin()
    }

    pub fn is_buyer(&self) -> bool {
        self.has_role(Role::Buyer)
    }
}

/// Parse a comma-separated role list (`"buyer,seller"`), ignoring blanks.
pub fn parse_roles(raw: &str) -> Result<HashSet<Role>, ServiceError> {
    let mut roles = HashSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let role = Role::from_str(part)
            .map_err(|_| ServiceError::Unauthorized(format!("unknown role '{}'", part)))?;
        roles.insert(role);
    }
    if roles.is_empty() {
        return Err(ServiceError::Unauthorized(
            "request carries no roles".to_string(),
        ));
    }
    Ok(roles)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", USER_ID_HEADER))
            })?;
        let user_id = Uuid::parse_str(user_id).map_err(|_| {
            ServiceError::Unauthorized(format!("{} is not a valid UUID", USER_ID_HEADER))
        })?;

        let roles_raw = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", USER_ROLES_HEADER))
            })?;
        let roles = parse_roles(roles_raw)?;

        Ok(Actor { user_id, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_lists_case_insensitively() {
        let roles = parse_roles("Buyer, SELLER").unwrap();
        assert!(roles.contains(&Role::Buyer));
        assert!(roles.contains(&Role::Seller));
        assert!(!roles.contains(&Role::Admin));
    }

    #[test]
    fn rejects_unknown_and_empty_role_lists() {
        assert!(parse_roles("superuser").is_err());
        assert!(parse_roles("  ,  ").is_err());
    }

    #[test]
    fn admin_implies_seller_capabilities() {
        let actor = Actor::admin(Uuid::new_v4());
        assert!(actor.is_seller());
        assert!(actor.is_admin());
        assert!(!actor.is_buyer());
    }
}
