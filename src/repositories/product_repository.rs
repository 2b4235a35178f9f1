use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::product::{self, Entity as Product, Model as ProductModel};
use crate::entities::product_size::{self, Entity as ProductSize, Model as ProductSizeModel};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Catalog and per-size stock counters
#[derive(Debug, Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id<C>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<Option<ProductModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(Product::find_by_id(id).one(conn).await?)
    }

    pub async fn find_size<C>(
        &self,
        conn: &C,
        product_id: Uuid,
        size: &str,
    ) -> Result<Option<ProductSizeModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(ProductSize::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .filter(product_size::Column::Size.eq(size))
            .one(conn)
            .await?)
    }

    /// Takes `quantity` units out of stock if at least that many remain.
    /// Returns false when the counter is short (or the size is unknown).
    pub async fn decrement_stock<C>(
        &self,
        conn: &C,
        product_id: Uuid,
        size: &str,
        quantity: i32,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = ProductSize::update_many()
            .col_expr(
                product_size::Column::Stock,
                Expr::col(product_size::Column::Stock).sub(quantity),
            )
            .filter(product_size::Column::ProductId.eq(product_id))
            .filter(product_size::Column::Size.eq(size))
            .filter(product_size::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Puts `quantity` units back. Returns false if the size row is gone.
    pub async fn restock<C>(
        &self,
        conn: &C,
        product_id: Uuid,
        size: &str,
        quantity: i32,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = ProductSize::update_many()
            .col_expr(
                product_size::Column::Stock,
                Expr::col(product_size::Column::Stock).add(quantity),
            )
            .filter(product_size::Column::ProductId.eq(product_id))
            .filter(product_size::Column::Size.eq(size))
            .exec(conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Creates a product with its size rows
    pub async fn create_with_sizes(
        &self,
        name: &str,
        price: Decimal,
        sizes: &[(&str, i32)],
    ) -> Result<ProductModel, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let now = chrono::Utc::now();

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (size, stock) in sizes {
            product_size::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                size: Set((*size).to_string()),
                stock: Set(*stock),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(product)
    }
}

impl Repository for ProductRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
