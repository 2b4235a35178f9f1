use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::user::{self, Entity as User, Model as UserModel};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id<C>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<Option<UserModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(User::find_by_id(id).one(conn).await?)
    }

    pub async fn create(&self, name: &str, email: &str) -> Result<UserModel, ServiceError> {
        Ok(user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(self.base.get_db())
        .await?)
    }

    /// Deletes the user row. Returns false if it did not exist.
    pub async fn delete<C>(&self, conn: &C, id: Uuid) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = User::delete_by_id(id).exec(conn).await?;
        Ok(result.rows_affected > 0)
    }
}

impl Repository for UserRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
