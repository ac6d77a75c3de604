// core/src/model/product.rs

use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use super::PRODUCTS_PARTITION_KEY;

/// A product row as stored in the table.
///
/// `etag` and `timestamp` are owned by the table service: they are read back
/// from query results but never sent on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
  pub partition_key: String,
  pub row_key: String,
  #[serde(default)]
  pub product_id: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stock_quantity: Option<i32>,
  #[serde(rename = "ImageURL", default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(rename = "odata.etag", default, skip_serializing)]
  pub etag: Option<String>,
  #[serde(default, skip_serializing)]
  pub timestamp: Option<DateTime<Utc>>,
}

impl Product {
  /// Builds a new, not yet numbered, product row from a request payload.
  ///
  /// The partition key is always the fixed products partition and the row key
  /// a fresh v4 UUID; nothing the client sent can influence either.
  pub fn from_payload(payload: ProductPayload) -> Self {
    Product {
      partition_key: PRODUCTS_PARTITION_KEY.to_string(),
      row_key: Uuid::new_v4().to_string(),
      product_id: 0,
      product_name: payload.product_name,
      description: payload.description,
      category: payload.category,
      price: payload.price,
      stock_quantity: payload.stock_quantity,
      image_url: payload.image_url,
      etag: None,
      timestamp: None,
    }
  }

  /// Name as rendered in confirmation messages (empty when absent).
  pub fn display_name(&self) -> &str {
    self.product_name.as_deref().unwrap_or_default()
  }
}

/// The request body accepted by the ingest endpoint.
///
/// Field names are matched case-insensitively (`ProductName`, `productName`
/// and `productname` are the same field); when a body repeats a field under
/// different casings the last one wins. Key fields (`ProductId`,
/// `PartitionKey`, `RowKey`) are not part of the shape, so whatever the client
/// sends for them is dropped on parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPayload {
  pub product_name: Option<String>,
  pub description: Option<String>,
  pub category: Option<String>,
  pub price: Option<f64>,
  pub stock_quantity: Option<i32>,
  pub image_url: Option<String>,
}

impl ProductPayload {
  /// Parses a raw request body.
  ///
  /// Returns `None` for an empty body, a JSON `null`, or anything that is not
  /// an object of the expected shape.
  pub fn parse(body: &[u8]) -> Option<Self> {
    serde_json::from_slice::<ProductPayload>(body)
      .map_err(|e| tracing::debug!(error = %e, "Request body is not a product object"))
      .ok()
  }
}

impl<'de> Deserialize<'de> for ProductPayload {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    struct PayloadVisitor;

    impl<'de> Visitor<'de> for PayloadVisitor {
      type Value = ProductPayload;

      fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object describing a product")
      }

      fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
      where
        A: MapAccess<'de>,
      {
        let mut payload = ProductPayload::default();
        while let Some(key) = map.next_key::<String>()? {
          match key.to_ascii_lowercase().as_str() {
            "productname" => payload.product_name = map.next_value()?,
            "description" => payload.description = map.next_value()?,
            "category" => payload.category = map.next_value()?,
            "price" => payload.price = map.next_value()?,
            "stockquantity" => payload.stock_quantity = map.next_value()?,
            "imageurl" => payload.image_url = map.next_value()?,
            _ => {
              map.next_value::<IgnoredAny>()?;
            }
          }
        }
        Ok(payload)
      }
    }

    deserializer.deserialize_map(PayloadVisitor)
  }
}
