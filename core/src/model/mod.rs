// core/src/model/mod.rs

//! Entities persisted in the products table.

pub mod product;

pub use product::{Product, ProductPayload};

/// Table the function writes to unless configured otherwise.
pub const DEFAULT_TABLE_NAME: &str = "Products";

/// Every product lives in this one partition.
pub const PRODUCTS_PARTITION_KEY: &str = "ProductsPartition";

/// Partition holding sequence (counter) entities. Kept apart from the product
/// partition so that partition scans never see them.
pub const SEQUENCE_PARTITION_KEY: &str = "ProductSequences";

/// Row key of the sequence that issues ProductIds.
pub const PRODUCT_ID_SEQUENCE: &str = "ProductId";
