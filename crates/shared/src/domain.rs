use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A catalog entry. Identity within a cart is the title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Product {
    pub fn new(title: impl Into<String>, price: f64) -> Result<Self, DomainError> {
        validate_price(price)?;
        Ok(Self {
            title: title.into(),
            price,
            description: None,
            image_url: None,
        })
    }
}

/// One line of a cart: a product and how many of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: Product, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::ZeroQuantity {
                title: product.title,
            });
        }
        validate_price(product.price)?;
        Ok(Self { product, quantity })
    }

    pub fn title(&self) -> &str {
        &self.product.title
    }

    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

pub(crate) fn validate_price(price: f64) -> Result<(), DomainError> {
    if !price.is_finite() || price < 0.0 {
        return Err(DomainError::InvalidPrice(price));
    }
    Ok(())
}

/// Sum of `price * quantity` over every line; zero for an empty snapshot.
pub fn subtotal(items: &[CartItem]) -> f64 {
    items.iter().map(CartItem::line_total).sum()
}

/// Ordered line items with at most one line per product title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from lines, merging repeated titles into one line.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            match cart.position(item.title()) {
                Some(index) => {
                    cart.items[index].quantity =
                        cart.items[index].quantity.saturating_add(item.quantity)
                }
                None => cart.items.push(item),
            }
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.title() == title)
    }

    /// Adds one unit of `product`. A product not yet in the cart gets a new line
    /// holding `initial_quantity` units (clamped to at least one).
    pub fn add(&mut self, product: &Product, initial_quantity: u32) -> &CartItem {
        let index = match self.position(&product.title) {
            Some(index) => {
                let line = &mut self.items[index];
                line.quantity = line.quantity.saturating_add(1);
                index
            }
            None => {
                self.items.push(CartItem {
                    product: product.clone(),
                    quantity: initial_quantity.max(1),
                });
                self.items.len() - 1
            }
        };
        &self.items[index]
    }

    /// Removes one unit of the product titled `title`, dropping the line when it
    /// reaches zero. Returns `false` when the product is not in the cart.
    pub fn remove(&mut self, title: &str) -> bool {
        let Some(index) = self.position(title) else {
            return false;
        };
        let line = &mut self.items[index];
        line.quantity = line.quantity.saturating_sub(1);
        if line.quantity == 0 {
            self.items.remove(index);
        }
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn subtotal(&self) -> f64 {
        subtotal(&self.items)
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.items.iter().position(|item| item.title() == title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartEventKind {
    Added,
    Removed,
}

/// An add/remove signal. `item` describes the delta, not the resulting line, so
/// consumers refetch instead of applying it.
#[derive(Debug, Clone, PartialEq)]
pub struct CartNotification {
    pub kind: CartEventKind,
    pub item: CartItem,
}
