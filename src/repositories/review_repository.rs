use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::review::{self, Entity as Review, Model as ReviewModel};
use crate::errors::ServiceError;
use crate::repositories::{CascadeDelete, Repository};

use super::BaseRepository;

#[derive(Debug, Clone)]
pub struct ReviewRepository {
    base: BaseRepository,
}

impl ReviewRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// One review per user per product
    pub async fn create(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<ReviewModel, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let existing = Review::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::ProductId.eq(product_id))
            .count(self.base.get_db())
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(
                "User has already reviewed this product".to_string(),
            ));
        }

        Ok(review::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            rating: Set(rating),
            comment: Set(comment),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(self.base.get_db())
        .await?)
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        Ok(Review::find()
            .filter(review::Column::UserId.eq(user_id))
            .count(self.base.get_db())
            .await?)
    }
}

#[async_trait]
impl CascadeDelete for ReviewRepository {
    fn label(&self) -> &'static str {
        "reviews"
    }

    async fn delete_for_user(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = Review::delete_many()
            .filter(review::Column::UserId.eq(user_id))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

impl Repository for ReviewRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
