//! Roles, encoded as the `role` custom claim.

use std::fmt;
use std::str::FromStr;

use crate::db::CustomClaims;
use crate::store::{Store, StoreError};

/// Custom claim key holding the [`Role`].
pub const ROLE_CLAIM: &str = "role";

/// The fixed set of roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May assign roles and change any setting.
    Superadmin,
    /// Reviews deposits and withdrawals.
    DepositAdmin,
    /// Moderates matches and results.
    MatchAdmin,
    /// Regular player.
    User,
}
impl Role {
    /// Every role.
    pub const ALL: [Role; 4] = [
        Role::Superadmin,
        Role::DepositAdmin,
        Role::MatchAdmin,
        Role::User,
    ];

    /// Claim value.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::DepositAdmin => "deposit_admin",
            Role::MatchAdmin => "match_admin",
            Role::User => "user",
        }
    }

    /// The role encoded in `claims`, if any.
    pub fn from_claims(claims: &CustomClaims) -> Option<Self> {
        claims.get(ROLE_CLAIM)?.as_str()?.parse().ok()
    }

    /// A claim set containing exactly this role.
    pub fn claims(self) -> CustomClaims {
        let mut claims = CustomClaims::new();
        claims.insert(ROLE_CLAIM.to_owned(), self.as_str().into());
        claims
    }
}
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleError::InvalidRole(s.to_owned()))
    }
}

/// Role assignment failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    /// Caller is not a superadmin.
    #[error("Only a superadmin can assign roles.")]
    Forbidden,
    /// Not one of [`Role::ALL`].
    #[error("Invalid role `{0}`. Expected one of: superadmin, deposit_admin, match_admin, user.")]
    InvalidRole(String),
    /// No such user.
    #[error("No user with uid `{0}`.")]
    NotFound(String),
    /// The email does not belong to the user.
    #[error("Email does not match user `{0}`.")]
    EmailMismatch(String),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Assign `new_role` to `target_uid` on behalf of a caller with `caller_claims`.
///
/// The target's custom claims are replaced by exactly `{ "role": new_role }`; any other claims
/// are discarded.
pub async fn assign_role<S: Store>(
    store: &S,
    caller_claims: &CustomClaims,
    target_uid: &str,
    new_role: &str,
) -> Result<Role, RoleError> {
    if Role::from_claims(caller_claims) != Some(Role::Superadmin) {
        return Err(RoleError::Forbidden);
    }
    let role: Role = new_role.parse()?;
    if !store.set_custom_claims(target_uid, &role.claims()).await? {
        return Err(RoleError::NotFound(target_uid.to_owned()));
    }
    log::info!("Assigned role `{}` to user `{}`.", role, target_uid);
    Ok(role)
}

/// Make `uid` a superadmin. Performs no caller authorization; `email` must match the user's.
pub async fn make_admin<S: Store>(store: &S, uid: &str, email: &str) -> Result<(), RoleError> {
    let user = store
        .user(uid)
        .await?
        .ok_or_else(|| RoleError::NotFound(uid.to_owned()))?;
    let email_matches = user
        .email
        .as_deref()
        .is_some_and(|user_email| user_email.eq_ignore_ascii_case(email.trim()));
    if !email_matches {
        return Err(RoleError::EmailMismatch(uid.to_owned()));
    }
    if !store
        .set_custom_claims(uid, &Role::Superadmin.claims())
        .await?
    {
        return Err(RoleError::NotFound(uid.to_owned()));
    }
    log::warn!("Made user `{}` ({}) a superadmin.", uid, email);
    Ok(())
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::db::User;
    use crate::store::MemoryStore;

    fn store_with_player() -> MemoryStore {
        let store = MemoryStore::new();
        let mut custom_claims = Role::User.claims();
        custom_claims.insert("kycVerified".into(), json!(true));
        store.insert_user(User {
            uid: "player".into(),
            email: Some("Player@Example.com".into()),
            custom_claims,
        });
        store
    }

    fn claims_of(store: &MemoryStore, uid: &str) -> CustomClaims {
        block_on(store.user(uid)).unwrap().unwrap().custom_claims
    }

    #[test]
    fn test_parse() {
        for role in Role::ALL {
            assert_eq!(Ok(role), role.as_str().parse());
        }
        assert_eq!(
            Err(RoleError::InvalidRole("admin".into())),
            "admin".parse::<Role>()
        );
        assert_eq!(None, Role::from_claims(&CustomClaims::new()));
        assert_eq!(Some(Role::MatchAdmin), Role::from_claims(&Role::MatchAdmin.claims()));
    }

    #[test]
    fn test_non_superadmin_forbidden() {
        let store = store_with_player();
        let before = claims_of(&store, "player");
        for caller in [CustomClaims::new(), Role::DepositAdmin.claims(), Role::User.claims()] {
            let result = block_on(assign_role(&store, &caller, "player", "superadmin"));
            assert_eq!(Err(RoleError::Forbidden), result);
        }
        assert_eq!(before, claims_of(&store, "player"));
    }

    #[test]
    fn test_invalid_role_rejected() {
        let store = store_with_player();
        let before = claims_of(&store, "player");
        let result = block_on(assign_role(
            &store,
            &Role::Superadmin.claims(),
            "player",
            "owner",
        ));
        assert_eq!(Err(RoleError::InvalidRole("owner".into())), result);
        assert_eq!(before, claims_of(&store, "player"));
    }

    #[test]
    fn test_assign_overwrites_claims() {
        let store = store_with_player();
        let result = block_on(assign_role(
            &store,
            &Role::Superadmin.claims(),
            "player",
            "deposit_admin",
        ));
        assert_eq!(Ok(Role::DepositAdmin), result);
        // `kycVerified` is gone.
        assert_eq!(Role::DepositAdmin.claims(), claims_of(&store, "player"));
    }

    #[test]
    fn test_assign_unknown_user() {
        let store = store_with_player();
        let result = block_on(assign_role(
            &store,
            &Role::Superadmin.claims(),
            "ghost",
            "user",
        ));
        assert_eq!(Err(RoleError::NotFound("ghost".into())), result);
    }

    #[test]
    fn test_make_admin() {
        let store = store_with_player();
        assert_eq!(
            Err(RoleError::NotFound("ghost".into())),
            block_on(make_admin(&store, "ghost", "player@example.com"))
        );
        assert_eq!(
            Err(RoleError::EmailMismatch("player".into())),
            block_on(make_admin(&store, "player", "someone@example.com"))
        );
        assert_eq!(Role::User, Role::from_claims(&claims_of(&store, "player")).unwrap());

        assert_eq!(Ok(()), block_on(make_admin(&store, "player", "player@example.com")));
        assert_eq!(Role::Superadmin.claims(), claims_of(&store, "player"));
    }
}
