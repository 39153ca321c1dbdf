//! Identity resolution: maps an authenticated principal to a user record and role.

use std::collections::HashSet;

use tracing::{debug, info};

use super::validation::normalize_email;
use crate::db::{Database, NewUser, Role, User, UserRepository};
use crate::{DocpoolError, Result};

/// An authenticated identity as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Identity provider subject identifier.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
}

impl Principal {
    /// Create a new principal.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

/// Administrator allowlist.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    /// Build a policy from configured administrator emails.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Check whether an email is on the allowlist.
    pub fn is_admin(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    /// Number of allowlisted emails.
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Whether the allowlist is empty.
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Classify an email into a role.
pub fn classify(email: &str, policy: &AdminPolicy) -> Role {
    if policy.is_admin(email) {
        Role::Admin
    } else {
        Role::User
    }
}

/// Resolves principals into persisted users.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    db: Database,
    policy: AdminPolicy,
}

impl IdentityResolver {
    /// Create a new resolver.
    pub fn new(db: Database, policy: AdminPolicy) -> Self {
        Self { db, policy }
    }

    /// The administrator policy in use.
    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }

    /// Record an authentication event and return the user's current role.
    pub async fn resolve_role(&self, principal: &Principal) -> Result<Role> {
        Ok(self.resolve(principal).await?.role)
    }

    /// Record an authentication event and return the full user record.
    ///
    /// Creates the user on first sight. The role is recomputed from the
    /// allowlist every time and `last_login` is always touched.
    pub async fn resolve(&self, principal: &Principal) -> Result<User> {
        if principal.id.trim().is_empty() {
            return Err(DocpoolError::Validation(
                "principal id cannot be empty".to_string(),
            ));
        }

        let email = normalize_email(&principal.email);
        let role = classify(&email, &self.policy);
        let display_name = if principal.display_name.trim().is_empty() {
            email.clone()
        } else {
            principal.display_name.clone()
        };

        let repo = UserRepository::new(self.db.pool());
        let previous = repo.get_by_id(&principal.id).await?;

        let user = repo
            .upsert_on_login(
                &NewUser::new(&principal.id, email, display_name).with_role(role),
            )
            .await?;

        match previous {
            None => info!(user_id = %user.id, role = %user.role, "New user authenticated"),
            Some(prev) if prev.role != user.role => info!(
                user_id = %user.id,
                from = %prev.role,
                to = %user.role,
                "User role reclassified"
            ),
            Some(_) => debug!(user_id = %user.id, "User authenticated"),
        }

        Ok(user)
    }

    /// Look up a user without recording an authentication event.
    pub async fn current_user(&self, id: &str) -> Result<Option<User>> {
        UserRepository::new(self.db.pool()).get_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup(admins: &[&str]) -> IdentityResolver {
        let db = Database::open_in_memory().await.unwrap();
        IdentityResolver::new(db, AdminPolicy::new(admins))
    }

    #[test]
    fn test_classify() {
        let policy = AdminPolicy::new(["Root@Example.com"]);

        assert_eq!(classify("root@example.com", &policy), Role::Admin);
        assert_eq!(classify(" ROOT@example.com", &policy), Role::Admin);
        assert_eq!(classify("user@example.com", &policy), Role::User);
    }

    #[test]
    fn test_empty_policy_has_no_admins() {
        let policy = AdminPolicy::new(Vec::<String>::new());
        assert!(policy.is_empty());
        assert_eq!(classify("root@example.com", &policy), Role::User);
    }

    #[test]
    fn test_policy_skips_blank_entries() {
        let policy = AdminPolicy::new(["", "  ", "a@example.com"]);
        assert_eq!(policy.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_creates_user() {
        let resolver = setup(&[]).await;
        let principal = Principal::new("sub-1", "Alice@Example.com", "Alice");

        let role = resolver.resolve_role(&principal).await.unwrap();
        assert_eq!(role, Role::User);

        let user = resolver.current_user("sub-1").await.unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.display_name, "Alice");
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn test_resolve_admin() {
        let resolver = setup(&["root@example.com"]).await;
        let principal = Principal::new("sub-root", "root@example.com", "Root");

        assert_eq!(resolver.resolve_role(&principal).await.unwrap(), Role::Admin);
    }

    #[tokio::test]
    async fn test_role_recomputed_on_each_authentication() {
        let db = Database::open_in_memory().await.unwrap();
        let principal = Principal::new("sub-1", "ops@example.com", "Ops");

        let before = IdentityResolver::new(db.clone(), AdminPolicy::new(["ops@example.com"]));
        assert_eq!(before.resolve_role(&principal).await.unwrap(), Role::Admin);

        // allowlist changed: takes effect on the next authentication only
        let after = IdentityResolver::new(db.clone(), AdminPolicy::default());
        let stored = after.current_user("sub-1").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);

        assert_eq!(after.resolve_role(&principal).await.unwrap(), Role::User);
        let stored = after.current_user("sub-1").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);
    }

    #[tokio::test]
    async fn test_resolve_blank_display_name_falls_back_to_email() {
        let resolver = setup(&[]).await;
        let user = resolver
            .resolve(&Principal::new("sub-1", "a@example.com", " "))
            .await
            .unwrap();
        assert_eq!(user.display_name, "a@example.com");
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_id() {
        let resolver = setup(&[]).await;
        let result = resolver
            .resolve(&Principal::new("", "a@example.com", "A"))
            .await;
        assert!(matches!(result, Err(DocpoolError::Validation(_))));
    }

    #[tokio::test]
    async fn test_resolve_backend_unavailable() {
        let resolver = setup(&[]).await;
        resolver.db.close().await;

        let result = resolver
            .resolve_role(&Principal::new("sub-1", "a@example.com", "A"))
            .await;
        assert!(matches!(result, Err(DocpoolError::BackendUnavailable(_))));
    }
}
