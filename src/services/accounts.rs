use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::repositories::{CascadeDelete, ReviewRepository, UserRepository, WishlistRepository};

/// What deleting an account removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletion {
    pub user_id: Uuid,
    /// Rows removed per dependent table
    pub removed: BTreeMap<String, u64>,
}

/// Account lifecycle; deletion cascades through a fixed list of
/// dependent repositories.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    users: UserRepository,
    cascades: Vec<Arc<dyn CascadeDelete>>,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        let cascades: Vec<Arc<dyn CascadeDelete>> = vec![
            Arc::new(WishlistRepository::new(db.clone())),
            Arc::new(ReviewRepository::new(db.clone())),
        ];
        Self::with_cascades(db, cascades)
    }

    pub fn with_cascades(
        db: Arc<DatabaseConnection>,
        cascades: Vec<Arc<dyn CascadeDelete>>,
    ) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            db,
            cascades,
        }
    }

    /// Deletes a user and everything registered as owned by them, atomically
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<AccountDeletion, ServiceError> {
        let txn = self.db.begin().await?;

        if self.users.find_by_id(&txn, user_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        let mut removed = BTreeMap::new();
        for cascade in &self.cascades {
            let count = cascade.delete_for_user(&txn, user_id).await?;
            info!(table = cascade.label(), count, "Removed dependent rows");
            removed.insert(cascade.label().to_string(), count);
        }

        self.users.delete(&txn, user_id).await?;
        txn.commit().await?;

        info!("Account deleted");
        Ok(AccountDeletion { user_id, removed })
    }
}
