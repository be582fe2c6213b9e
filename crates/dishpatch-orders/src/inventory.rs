//! # Inventory Ledger
//!
//! Stock side of an order: reserve (validate and snapshot), commit
//! (decrement), restore (increment on cancel).
//!
//! ```text
//!   reserve ───── read-only, any connection ─────► Vec<LineSnapshot>
//!      │
//!      ▼
//!   commit  ───── inside the order's transaction ─► quantity -= snapshot.qty
//!                 (re-checked in the UPDATE)
//!   restore ───── inside the cancel transaction ──► quantity += snapshot.qty
//!                 (deleted product: skipped)
//! ```

use tracing::debug;

use dishpatch_core::{inventory, CoreError, LineSnapshot, OrderLine, Product};
use dishpatch_db::{Database, Tx};

use crate::error::{OrderError, OrderResult};

#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    /// Validates `lines` against the live catalog and snapshots them.
    ///
    /// With `shop_id`, products from other shops count as missing. Every
    /// problem is reported at once; nothing is written.
    pub async fn reserve(
        &self,
        lines: &[OrderLine],
        shop_id: Option<&str>,
    ) -> OrderResult<Vec<LineSnapshot>> {
        let products = self.db.products().get_many(&product_ids(lines)).await?;
        snapshot(lines, products, shop_id)
    }

    /// Like [`reserve`](Self::reserve), reading through `tx`.
    pub async fn reserve_in(
        &self,
        tx: &mut Tx,
        lines: &[OrderLine],
        shop_id: Option<&str>,
    ) -> OrderResult<Vec<LineSnapshot>> {
        let products = self
            .db
            .products()
            .get_many_tx(tx, &product_ids(lines))
            .await?;
        snapshot(lines, products, shop_id)
    }

    /// Takes the snapshot quantities out of stock.
    ///
    /// Each decrement re-checks stock in its own `WHERE` clause. Lines that
    /// no longer fit are collected into one `InsufficientInventory`; the
    /// caller rolls back the whole unit.
    pub async fn commit(&self, tx: &mut Tx, lines: &[LineSnapshot]) -> OrderResult<()> {
        let products = self.db.products();
        let mut short = Vec::new();

        for line in lines {
            if !products
                .decrement_stock(tx, &line.product_id, line.quantity)
                .await?
            {
                short.push(line.name.clone());
            }
        }

        if !short.is_empty() {
            return Err(OrderError::InsufficientInventory { products: short });
        }

        Ok(())
    }

    /// Puts the snapshot quantities back. Returns how many lines were
    /// restored; lines whose product was deleted are skipped.
    pub async fn restore(&self, tx: &mut Tx, lines: &[LineSnapshot]) -> OrderResult<usize> {
        let products = self.db.products();
        let mut restored = 0;

        for line in lines {
            if products
                .restore_stock(tx, &line.product_id, line.quantity)
                .await?
            {
                restored += 1;
            } else {
                debug!(product_id = %line.product_id, "Product gone, nothing to restore");
            }
        }

        Ok(restored)
    }
}

fn product_ids(lines: &[OrderLine]) -> Vec<String> {
    lines.iter().map(|l| l.product_id.clone()).collect()
}

fn snapshot(
    lines: &[OrderLine],
    mut products: Vec<Product>,
    shop_id: Option<&str>,
) -> OrderResult<Vec<LineSnapshot>> {
    if let Some(shop_id) = shop_id {
        products.retain(|p| p.shop_id == shop_id);
    }

    inventory::reserve(lines, &products).map_err(|e| CoreError::from(e).into())
}
