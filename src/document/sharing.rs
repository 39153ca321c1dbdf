//! Read sharing of documents by email.
//!
//! Only the owner changes a document's share set. Visibility is always read
//! from the database at request time.

use tracing::{debug, info};

use super::metadata::{Document, DocumentRepository};
use crate::auth::permission::require_owner;
use crate::auth::validation::{normalize_email, validate_email};
use crate::db::{Database, User};
use crate::{DocpoolError, Result};

/// Service managing document shares.
#[derive(Debug, Clone)]
pub struct ShareService {
    db: Database,
}

impl ShareService {
    /// Create a new share service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn repo(&self) -> DocumentRepository<'_> {
        DocumentRepository::new(self.db.pool())
    }

    async fn owned_document(&self, document_id: i64, requester: &User) -> Result<Document> {
        let doc = self
            .repo()
            .get_by_id(document_id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("document {document_id}")))?;
        require_owner(&doc, requester)?;
        Ok(doc)
    }

    fn target(email: &str) -> Result<String> {
        let email = normalize_email(email);
        validate_email(&email)?;
        Ok(email)
    }

    /// Grant `target_email` read access. Sharing twice is a no-op.
    pub async fn share(&self, document_id: i64, requester: &User, target_email: &str) -> Result<Document> {
        let doc = self.owned_document(document_id, requester).await?;
        let email = Self::target(target_email)?;

        if self.repo().add_share(doc.id, &email).await? {
            info!(document_id, shared_with = %email, "Document shared");
        } else {
            debug!(document_id, shared_with = %email, "Document already shared");
        }

        self.refreshed(document_id).await
    }

    /// Revoke `target_email`'s read access. Revoking a missing share is a no-op.
    pub async fn unshare(&self, document_id: i64, requester: &User, target_email: &str) -> Result<Document> {
        let doc = self.owned_document(document_id, requester).await?;
        let email = Self::target(target_email)?;

        if self.repo().remove_share(doc.id, &email).await? {
            info!(document_id, revoked = %email, "Document share revoked");
        }

        self.refreshed(document_id).await
    }

    /// Current share set, visible to the owner only.
    pub async fn shared_with(&self, document_id: i64, requester: &User) -> Result<Vec<String>> {
        let doc = self.owned_document(document_id, requester).await?;
        Ok(doc.shared_with)
    }

    async fn refreshed(&self, document_id: i64) -> Result<Document> {
        self.repo()
            .get_by_id(document_id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("document {document_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permission::can_read;
    use crate::db::{NewUser, UserRepository};
    use crate::document::metadata::NewDocument;
    use crate::pool::{AccountRepository, NewAccount};

    struct Fixture {
        service: ShareService,
        db: Database,
        alice: User,
        bob: User,
        doc: Document,
    }

    async fn fixture() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users
            .create(&NewUser::new("alice", "alice@example.com", "Alice"))
            .await
            .unwrap();
        let bob = users
            .create(&NewUser::new("bob", "bob@example.com", "Bob"))
            .await
            .unwrap();
        let account = AccountRepository::new(db.pool())
            .create(&NewAccount::new("drive@example.com", "t", 0, 100))
            .await
            .unwrap();
        let doc = DocumentRepository::new(db.pool())
            .create(&NewDocument {
                name: "plan.txt".to_string(),
                mime_type: "text/plain".to_string(),
                size_bytes: 4,
                owner_id: alice.id.clone(),
                account_id: account.id,
                storage_path: "ab/abc.txt".to_string(),
                download_url: "local://1/ab/abc.txt".to_string(),
                checksum: String::new(),
            })
            .await
            .unwrap();

        Fixture {
            service: ShareService::new(db.clone()),
            db,
            alice,
            bob,
            doc,
        }
    }

    #[tokio::test]
    async fn test_share_grants_visibility() {
        let f = fixture().await;
        assert!(!can_read(&f.doc, &f.bob));

        let doc = f.service.share(f.doc.id, &f.alice, "Bob@Example.com ").await.unwrap();
        assert_eq!(doc.shared_with, vec!["bob@example.com"]);
        assert!(can_read(&doc, &f.bob));

        let doc = f.service.unshare(f.doc.id, &f.alice, "bob@example.com").await.unwrap();
        assert!(doc.shared_with.is_empty());
        assert!(!can_read(&doc, &f.bob));
    }

    #[tokio::test]
    async fn test_share_is_idempotent() {
        let f = fixture().await;
        f.service.share(f.doc.id, &f.alice, "bob@example.com").await.unwrap();
        let doc = f.service.share(f.doc.id, &f.alice, "bob@example.com").await.unwrap();
        assert_eq!(doc.shared_with, vec!["bob@example.com"]);

        f.service.unshare(f.doc.id, &f.alice, "bob@example.com").await.unwrap();
        let doc = f.service.unshare(f.doc.id, &f.alice, "bob@example.com").await.unwrap();
        assert!(doc.shared_with.is_empty());
    }

    #[tokio::test]
    async fn test_only_owner_can_change_shares() {
        let f = fixture().await;
        f.service.share(f.doc.id, &f.alice, "bob@example.com").await.unwrap();

        let result = f.service.share(f.doc.id, &f.bob, "carol@example.com").await;
        assert!(matches!(result, Err(DocpoolError::PermissionDenied(_))));
        let result = f.service.unshare(f.doc.id, &f.bob, "bob@example.com").await;
        assert!(matches!(result, Err(DocpoolError::PermissionDenied(_))));
        let result = f.service.shared_with(f.doc.id, &f.bob).await;
        assert!(matches!(result, Err(DocpoolError::PermissionDenied(_))));

        assert_eq!(
            f.service.shared_with(f.doc.id, &f.alice).await.unwrap(),
            vec!["bob@example.com"]
        );
    }

    #[tokio::test]
    async fn test_share_errors() {
        let f = fixture().await;
        assert!(matches!(
            f.service.share(999, &f.alice, "bob@example.com").await,
            Err(DocpoolError::NotFound(_))
        ));
        assert!(matches!(
            f.service.share(f.doc.id, &f.alice, "not an email").await,
            Err(DocpoolError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_visibility_reflects_database() {
        let f = fixture().await;
        f.service.share(f.doc.id, &f.alice, "bob@example.com").await.unwrap();

        // revoked behind the service's back
        sqlx::query("DELETE FROM document_shares")
            .execute(f.db.pool())
            .await
            .unwrap();
        assert!(f.service.shared_with(f.doc.id, &f.alice).await.unwrap().is_empty());
    }
}
