use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// One stack of items a user owns.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct InventoryItem {
    pub user_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub acquired_at: time::OffsetDateTime,
}

impl InventoryItem {
    /// Grant `quantity` of an item inside the caller's transaction,
    /// stacking onto an existing row.
    pub async fn grant_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (user_id, item_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = inventory_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// A purchasable catalog entry.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoreItem {
    pub item_id: String,
    pub name: String,
    pub price_besitos: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
/// Look up a catalog entry for purchase.
pub struct GetStoreItem {
    pub item_id: String,
}

impl Processor<GetStoreItem> for DatabaseProcessor {
    type Output = Option<StoreItem>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetStoreItem")]
    async fn process(&self, query: GetStoreItem) -> Result<Option<StoreItem>, sqlx::Error> {
        sqlx::query_as::<_, StoreItem>(
            "SELECT item_id, name, price_besitos, enabled FROM store_items WHERE item_id = $1",
        )
        .bind(&query.item_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// A user's inventory, newest acquisitions first.
pub struct GetInventory {
    pub user_id: String,
}

impl Processor<GetInventory> for DatabaseProcessor {
    type Output = Vec<InventoryItem>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetInventory")]
    async fn process(&self, query: GetInventory) -> Result<Vec<InventoryItem>, sqlx::Error> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT user_id, item_id, quantity, acquired_at
            FROM inventory_items
            WHERE user_id = $1
            ORDER BY acquired_at DESC
            "#,
        )
        .bind(&query.user_id)
        .fetch_all(&self.pool)
        .await
    }
}
