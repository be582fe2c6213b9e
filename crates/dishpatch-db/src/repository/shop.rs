//! # Shop Repository

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Tx;
use dishpatch_core::Shop;

const SELECT_SHOP: &str = r#"
    SELECT id, owner_id, name, latitude, longitude, created_at
    FROM shops
"#;

#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(&format!("{SELECT_SHOP} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(shop)
    }

    pub async fn get_by_id_tx(&self, tx: &mut Tx, id: &str) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(&format!("{SELECT_SHOP} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(shop)
    }

    /// Shops owned by a user, by name.
    pub async fn list_by_owner(&self, owner_id: &str) -> DbResult<Vec<Shop>> {
        let shops = sqlx::query_as::<_, Shop>(&format!(
            "{SELECT_SHOP} WHERE owner_id = ?1 ORDER BY name"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(shops)
    }

    /// Inserts a new shop.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Name already taken
    /// * `Err(DbError::ForeignKeyViolation)` - Owner doesn't exist
    pub async fn insert(&self, shop: &Shop) -> DbResult<Shop> {
        debug!(id = %shop.id, name = %shop.name, "Inserting shop");

        sqlx::query(
            r#"
            INSERT INTO shops (id, owner_id, name, latitude, longitude, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&shop.id)
        .bind(&shop.owner_id)
        .bind(&shop.name)
        .bind(shop.latitude)
        .bind(shop.longitude)
        .bind(shop.created_at)
        .execute(&self.pool)
        .await?;

        Ok(shop.clone())
    }
}

/// Builds a new shop with a fresh ID.
pub fn new_shop(
    owner_id: impl Into<String>,
    name: impl Into<String>,
    latitude: f64,
    longitude: f64,
) -> Shop {
    Shop {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.into(),
        name: name.into(),
        latitude,
        longitude,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::user::new_user;
    use dishpatch_core::UserRole;

    #[tokio::test]
    async fn test_insert_list_and_unique_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let owner = new_user("Bo", UserRole::Owner, 0.0, 0.0);
        db.users().insert(&owner).await.unwrap();

        let shop = new_shop(&owner.id, "Noodle Bar", 24.8, 121.0);
        db.shops().insert(&shop).await.unwrap();

        let found = db.shops().get_by_id(&shop.id).await.unwrap().unwrap();
        assert_eq!(found.owner_id, owner.id);
        assert_eq!(db.shops().list_by_owner(&owner.id).await.unwrap().len(), 1);

        let clash = new_shop(&owner.id, "Noodle Bar", 0.0, 0.0);
        let err = db.shops().insert(&clash).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_owner_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .shops()
            .insert(&new_shop("ghost", "Nowhere", 0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
