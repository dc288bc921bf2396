use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::CartError;

/// Products below this many units are flagged to the customer.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

// ============================================================================
// Cart Value Objects
// ============================================================================

/// Product as the customer saw it when choosing it: price and stock are
/// snapshots and may be stale by checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub available_stock: u32,
}

impl ProductSnapshot {
    pub fn is_low_stock(&self) -> bool {
        self.available_stock < LOW_STOCK_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub available_stock: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

// ============================================================================
// Cart - in-progress selection of one customer session
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Number of units across all lines.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn get(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Add `quantity` units of `product`.
    ///
    /// Adding a product already in the cart merges into the existing line,
    /// clamped to the product's available stock. The line keeps its original
    /// price snapshot and picks up the newer stock figure.
    pub fn add(&mut self, product: &ProductSnapshot, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity(product.product_id));
        }
        if quantity > product.available_stock {
            return Err(CartError::ExceedsStock {
                product_id: product.product_id,
                requested: quantity,
                available: product.available_stock,
            });
        }

        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.product_id)
        {
            Some(existing) => {
                existing.available_stock = product.available_stock;
                existing.quantity = existing
                    .quantity
                    .saturating_add(quantity)
                    .min(product.available_stock);
            }
            None => self.items.push(CartItem {
                product_id: product.product_id,
                supplier_id: product.supplier_id,
                name: product.name.clone(),
                unit_price: product.unit_price,
                quantity,
                available_stock: product.available_stock,
            }),
        }

        Ok(())
    }

    /// Set a line's quantity, clamped to `[1, available_stock]`. Zero removes
    /// the line. A line whose product has no stock left cannot be set and is
    /// left untouched.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self
                .remove(product_id)
                .map(|_| ())
                .ok_or(CartError::ItemNotFound(product_id));
        }

        let item = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .ok_or(CartError::ItemNotFound(product_id))?;

        if item.available_stock == 0 {
            return Err(CartError::ExceedsStock {
                product_id,
                requested: quantity,
                available: 0,
            });
        }

        item.quantity = quantity.clamp(1, item.available_stock);
        Ok(())
    }

    pub fn remove(&mut self, product_id: Uuid) -> Option<CartItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)?;
        Some(self.items.remove(index))
    }

    /// Σ(unit_price × quantity) over all lines.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
