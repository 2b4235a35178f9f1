use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod order_repository;
pub mod product_repository;
pub mod review_repository;
pub mod user_repository;
pub mod wishlist_repository;

pub use order_repository::OrderRepository;
pub use product_repository::ProductRepository;
pub use review_repository::ReviewRepository;
pub use user_repository::UserRepository;
pub use wishlist_repository::WishlistRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Rows owned by a user that must go when the user is deleted.
///
/// Implementors run inside the caller's transaction and report how many
/// rows they removed.
#[async_trait]
pub trait CascadeDelete: Send + Sync {
    /// Short label used in logs and in the deletion summary
    fn label(&self) -> &'static str;

    async fn delete_for_user(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<u64, ServiceError>;
}
