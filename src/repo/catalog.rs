use crate::error::Result;
use crate::model::{Product, User};

use super::PgStore;

/// Read access to users and products, plus the inventory stock swap
#[async_trait::async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Fetch a user by id
    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Fetch a product by id
    async fn find_product(&self, product_id: i64) -> Result<Option<Product>>;

    /// Atomically replace the stock of a product, returning the previous stock.
    /// `None` if the product has no inventory record.
    async fn replace_stock(&self, product_id: i64, stock: i32) -> Result<Option<i32>>;
}

#[async_trait::async_trait]
impl CatalogRepo for PgStore {
    #[tracing::instrument(name = "Fetch user by id", skip(self))]
    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("select id, name, email from users where id=$1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    #[tracing::instrument(name = "Fetch product by id", skip(self))]
    async fn find_product(&self, product_id: i64) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "select id, name, description from products where id=$1",
        )
        .bind(product_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(product)
    }

    #[tracing::instrument(name = "Replace product stock", skip(self))]
    async fn replace_stock(&self, product_id: i64, stock: i32) -> Result<Option<i32>> {
        // The locking subquery serializes concurrent writers, each observing the
        // value committed by the one before it
        let previous: Option<(i32,)> = sqlx::query_as(
            r#"
            update inventory as i set stock=$2, updated_at=now()
            from (select product_id, stock from inventory where product_id=$1 for update) as old
            where i.product_id = old.product_id
            returning old.stock
            "#,
        )
        .bind(product_id)
        .bind(stock)
        .fetch_optional(self.pool())
        .await?;

        Ok(previous.map(|(stock,)| stock))
    }
}
