//! Buyer cart.

use chrono::{DateTime, Utc};
use common::BuyerId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;
use crate::product::ProductId;

/// A line in a buyer's cart.
///
/// `unit_price`, `name` and `image` are snapshots taken when the line was
/// added; checkout re-reads the catalog and never trusts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            image: String::new(),
            unit_price,
            quantity,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

/// A buyer's saved selections, possibly spanning many vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub buyer_id: BuyerId,
    lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart, as returned for buyers who never added anything.
    pub fn empty(buyer_id: BuyerId) -> Self {
        let now = Utc::now();
        Self {
            buyer_id,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a cart from stored parts.
    pub fn from_parts(
        buyer_id: BuyerId,
        lines: Vec<CartLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            buyer_id,
            lines,
            created_at,
            updated_at,
        }
    }

    /// Lines in the order they were first added.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Quantity currently held for a product, zero if absent.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| &l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Adds a line, merging into an existing line for the same product.
    ///
    /// A merge adds the quantities and refreshes the display name and image,
    /// but keeps the originally captured price.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), DomainError> {
        if line.quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }
        if line.unit_price.is_negative() {
            return Err(DomainError::InvalidPrice {
                cents: line.unit_price.cents(),
            });
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.name = line.name;
                existing.image = line.image;
            }
            None => self.lines.push(line),
        }
        self.touch();
        Ok(())
    }

    /// Removes the line for a product. Returns false if there was none.
    pub fn remove_line(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Replaces the quantity of an existing line.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| &l.product_id == product_id)
            .ok_or_else(|| DomainError::ItemNotFound {
                product_id: product_id.to_string(),
            })?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Empties the cart but keeps it.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
