// apps/ingest_function/src/web/handlers/mod.rs

// Declare handler modules
pub mod product_handlers;
