use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::wishlist_item::{self, Entity as WishlistItem, Model as WishlistItemModel};
use crate::errors::ServiceError;
use crate::repositories::{CascadeDelete, Repository};

use super::BaseRepository;

#[derive(Debug, Clone)]
pub struct WishlistRepository {
    base: BaseRepository,
}

impl WishlistRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Adds a product to a user's wishlist; a second add is a conflict
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistItemModel, ServiceError> {
        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .count(self.base.get_db())
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(
                "Product is already in the wishlist".to_string(),
            ));
        }

        Ok(wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(self.base.get_db())
        .await?)
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        Ok(WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .count(self.base.get_db())
            .await?)
    }
}

#[async_trait]
impl CascadeDelete for WishlistRepository {
    fn label(&self) -> &'static str {
        "wishlist_items"
    }

    async fn delete_for_user(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = WishlistItem::delete_many()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

impl Repository for WishlistRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
