use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("line item {title:?} has zero quantity")]
    ZeroQuantity { title: String },
    #[error("line item {title:?} has out-of-range quantity {quantity}")]
    QuantityOutOfRange { title: String, quantity: i64 },
    #[error("price must be a finite non-negative number, got {0}")]
    InvalidPrice(f64),
}
