//! Client-resident cart aggregate.
//!
//! The cart never talks to the server: its operations are local and always
//! succeed, and the stock ceiling each line carries is an advisory snapshot
//! from the last catalog sync. The authoritative stock check happens at
//! checkout, inside the order-placement transaction.
//!
//! Persistence goes through a single versioned blob ([`Cart::to_blob`] /
//! [`Cart::from_blob`]); the embedding client writes that blob to durable
//! storage after every mutation and drops it on logout or after a successful
//! checkout.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const CART_BLOB_VERSION: u32 = 1;

/// Catalog data a line is created from, captured at add-time.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub image: Option<String>,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub quantity: u32,
    pub image: Option<String>,
    /// Stock known at last catalog sync. Advisory only; may be stale.
    pub stock_ceiling: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CartBlob {
    version: u32,
    lines: Vec<CartLine>,
}

#[derive(Debug, Error)]
pub enum CartBlobError {
    #[error("Unsupported cart blob version {0}")]
    UnsupportedVersion(u32),
    #[error("Malformed cart blob: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` of a product. If the product is already in the cart the
    /// quantities merge, clamped to the product's stock ceiling; the line's
    /// snapshot fields are refreshed from the newer catalog data. For a new
    /// line the caller must have ensured `1 <= quantity <= product.stock`.
    pub fn add(&mut self, product: &ProductSnapshot, quantity: u32) {
        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product.product_id)
        {
            Some(line) => {
                line.quantity = (line.quantity + quantity).min(product.stock);
                line.name = product.name.clone();
                line.unit_price = product.unit_price.clone();
                line.image = product.image.clone();
                line.stock_ceiling = product.stock;
            }
            None => self.lines.push(CartLine {
                product_id: product.product_id,
                name: product.name.clone(),
                unit_price: product.unit_price.clone(),
                quantity,
                image: product.image.clone(),
                stock_ceiling: product.stock,
            }),
        }
    }

    /// Sets a line's quantity verbatim. The caller clamps to
    /// `[1, stock_ceiling]` first; the UI disables increments at the ceiling.
    /// Unknown products are ignored.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
    }

    pub fn remove(&mut self, product_id: Uuid) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    /// Empties the cart; called on logout and after a successful checkout.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of `unit_price * quantity` over all lines.
    pub fn items_price(&self) -> BigDecimal {
        self.lines
            .iter()
            .map(|l| &l.unit_price * BigDecimal::from(l.quantity))
            .sum()
    }

    /// Serializes the cart to its single durable-storage representation.
    pub fn to_blob(&self) -> String {
        let blob = CartBlob {
            version: CART_BLOB_VERSION,
            lines: self.lines.clone(),
        };
        // CartBlob contains only plain data; serialization cannot fail.
        serde_json::to_string(&blob).unwrap_or_default()
    }

    pub fn from_blob(blob: &str) -> Result<Self, CartBlobError> {
        let blob: CartBlob = serde_json::from_str(blob)?;
        if blob.version != CART_BLOB_VERSION {
            return Err(CartBlobError::UnsupportedVersion(blob.version));
        }
        Ok(Cart { lines: blob.lines })
    }

    /// Session-start hook: restores a saved cart, or starts empty when there
    /// is no blob or the blob is unreadable.
    pub fn load_or_default(blob: Option<&str>) -> Self {
        blob.and_then(|b| Cart::from_blob(b).ok()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn snapshot(stock: u32, price: &str) -> ProductSnapshot {
        ProductSnapshot {
            product_id: Uuid::new_v4(),
            name: "Widget".to_string(),
            unit_price: BigDecimal::from_str(price).expect("valid decimal"),
            image: Some("/images/widget.jpg".to_string()),
            stock,
        }
    }

    #[test]
    fn add_inserts_new_line() {
        let mut cart = Cart::new();
        let product = snapshot(5, "10.00");

        cart.add(&product, 2);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[0].stock_ceiling, 5);
    }

    #[test]
    fn add_merges_and_clamps_to_stock() {
        let mut cart = Cart::new();
        let product = snapshot(5, "10.00");

        cart.add(&product, 3);
        cart.add(&product, 4);

        // 3 + 4 exceeds stock 5, so the merge clamps.
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn add_refreshes_snapshot_fields_on_merge() {
        let mut cart = Cart::new();
        let mut product = snapshot(10, "10.00");
        cart.add(&product, 1);

        product.unit_price = BigDecimal::from_str("12.50").expect("valid decimal");
        product.stock = 3;
        cart.add(&product, 1);

        assert_eq!(
            cart.lines()[0].unit_price,
            BigDecimal::from_str("12.50").expect("valid decimal")
        );
        assert_eq!(cart.lines()[0].stock_ceiling, 3);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn set_quantity_is_verbatim() {
        let mut cart = Cart::new();
        let product = snapshot(5, "10.00");
        cart.add(&product, 1);

        cart.set_quantity(product.product_id, 4);

        assert_eq!(cart.lines()[0].quantity, 4);
    }

    #[test]
    fn set_quantity_ignores_unknown_product() {
        let mut cart = Cart::new();
        cart.add(&snapshot(5, "10.00"), 1);

        cart.set_quantity(Uuid::new_v4(), 4);

        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn remove_drops_only_the_named_line() {
        let mut cart = Cart::new();
        let keep = snapshot(5, "10.00");
        let drop = snapshot(5, "20.00");
        cart.add(&keep, 1);
        cart.add(&drop, 1);

        cart.remove(drop.product_id);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].product_id, keep.product_id);
    }

    #[test]
    fn clear_empties_the_cart() {
        let mut cart = Cart::new();
        cart.add(&snapshot(5, "10.00"), 2);

        cart.clear();

        assert!(cart.is_empty());
    }

    #[test]
    fn items_price_sums_line_totals() {
        let mut cart = Cart::new();
        cart.add(&snapshot(10, "10.00"), 2); // 20.00
        cart.add(&snapshot(10, "3.50"), 3); // 10.50

        assert_eq!(
            cart.items_price(),
            BigDecimal::from_str("30.50").expect("valid decimal")
        );
    }

    #[test]
    fn blob_roundtrip_preserves_lines() {
        let mut cart = Cart::new();
        cart.add(&snapshot(5, "9.99"), 2);

        let restored = Cart::from_blob(&cart.to_blob()).expect("decode");

        assert_eq!(restored, cart);
    }

    #[test]
    fn unknown_blob_version_is_rejected() {
        let blob = serde_json::json!({ "version": 99, "lines": [] }).to_string();

        assert!(matches!(
            Cart::from_blob(&blob),
            Err(CartBlobError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn malformed_blob_is_rejected() {
        assert!(matches!(
            Cart::from_blob("{not json"),
            Err(CartBlobError::Malformed(_))
        ));
    }

    #[test]
    fn load_or_default_starts_empty_without_a_blob() {
        assert!(Cart::load_or_default(None).is_empty());
        assert!(Cart::load_or_default(Some("{not json")).is_empty());
    }

    #[test]
    fn load_or_default_restores_a_saved_cart() {
        let mut cart = Cart::new();
        cart.add(&snapshot(5, "1.00"), 1);
        let blob = cart.to_blob();

        assert_eq!(Cart::load_or_default(Some(&blob)), cart);
    }
}
