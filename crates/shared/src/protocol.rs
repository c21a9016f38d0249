//! Wire shapes spoken by the cart service.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{CartEventKind, CartItem, CartNotification, Product},
    error::DomainError,
};

/// Body of `GET /cart/{cart_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub products: Vec<CartProductRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartProductRecord {
    #[serde(default)]
    pub cart_id: String,
    #[serde(default)]
    pub product_id: String,
    /// Signed so a negative count fails adaptation of this line only.
    pub quantity: i64,
    pub product: ProductRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartEvent {
    ProductAdded,
    ProductRemoved,
}

impl From<CartEvent> for CartEventKind {
    fn from(value: CartEvent) -> Self {
        match value {
            CartEvent::ProductAdded => CartEventKind::Added,
            CartEvent::ProductRemoved => CartEventKind::Removed,
        }
    }
}

/// Text frame pushed on `/cart/{cart_id}/ws`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEventNotification {
    pub event: CartEvent,
    pub cart_product: CartProductRecord,
}

impl TryFrom<CartProductRecord> for CartItem {
    type Error = DomainError;

    fn try_from(record: CartProductRecord) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(record.quantity).map_err(|_| {
            DomainError::QuantityOutOfRange {
                title: record.product.name.clone(),
                quantity: record.quantity,
            }
        })?;
        let ProductRecord {
            name,
            price,
            image_url,
            description,
            ..
        } = record.product;
        CartItem::new(
            Product {
                title: name,
                price,
                description,
                image_url,
            },
            quantity,
        )
    }
}

impl TryFrom<CartEventNotification> for CartNotification {
    type Error = DomainError;

    fn try_from(value: CartEventNotification) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: value.event.into(),
            item: CartItem::try_from(value.cart_product)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapts_minimal_cart_response() {
        let body = r#"{"products":[{"quantity":3,"product":{"name":"X","price":5,"image_url":"u"}}]}"#;
        let response: CartResponse = serde_json::from_str(body).expect("decode");
        let items = response
            .products
            .into_iter()
            .map(CartItem::try_from)
            .collect::<Result<Vec<_>, _>>()
            .expect("adapt");

        assert_eq!(
            items,
            vec![CartItem {
                product: Product {
                    title: "X".into(),
                    price: 5.0,
                    description: None,
                    image_url: Some("u".into()),
                },
                quantity: 3,
            }]
        );
    }

    #[test]
    fn null_optional_fields_are_absent() {
        let body = r#"{"cart_id":"2","product_id":"7","quantity":1,"product":{"id":"7","name":"Tang","price":1.99,"image_url":null,"description":null}}"#;
        let record: CartProductRecord = serde_json::from_str(body).expect("decode");
        let item = CartItem::try_from(record).expect("adapt");
        assert_eq!(item.product.image_url, None);
        assert_eq!(item.product.description, None);
    }

    #[test]
    fn decodes_removal_notification() {
        let frame = r#"{"event":"product_removed","cart_product":{"quantity":2,"product":{"name":"Chamyto","price":5.99,"description":"kids"}}}"#;
        let wire: CartEventNotification = serde_json::from_str(frame).expect("decode");
        let notification = CartNotification::try_from(wire).expect("adapt");
        assert_eq!(notification.kind, CartEventKind::Removed);
        assert_eq!(notification.item.quantity, 2);
        assert_eq!(notification.item.product.description.as_deref(), Some("kids"));
    }

    #[test]
    fn unknown_event_tag_is_rejected() {
        let frame = r#"{"event":"product_renamed","cart_product":{"quantity":1,"product":{"name":"Tang","price":1}}}"#;
        assert!(serde_json::from_str::<CartEventNotification>(frame).is_err());
    }

    #[test]
    fn zero_quantity_line_fails_adaptation() {
        let body = r#"{"quantity":0,"product":{"name":"Tang","price":1.99}}"#;
        let record: CartProductRecord = serde_json::from_str(body).expect("decode");
        assert!(matches!(
            CartItem::try_from(record),
            Err(DomainError::ZeroQuantity { .. })
        ));
    }

    #[test]
    fn negative_or_oversized_quantity_fails_adaptation() {
        for quantity in [-1_i64, i64::from(u32::MAX) + 1] {
            let body = format!(r#"{{"quantity":{quantity},"product":{{"name":"Tang","price":1.99}}}}"#);
            let record: CartProductRecord = serde_json::from_str(&body).expect("decode");
            assert_eq!(
                CartItem::try_from(record),
                Err(DomainError::QuantityOutOfRange {
                    title: "Tang".into(),
                    quantity,
                })
            );
        }
    }
}
