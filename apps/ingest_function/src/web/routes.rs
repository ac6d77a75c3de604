// apps/ingest_function/src/web/routes.rs

use actix_web::web;

/// Largest request body accepted for a product.
const MAX_BODY_BYTES: usize = 256 * 1024;

// The Functions host forwards `/api/<FunctionName>` unchanged to the custom handler.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
      .route(
        "/AddProductFunction",
        web::post().to(crate::web::handlers::product_handlers::add_product_handler),
      ),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::AppState;
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use product_ingest::{IdStrategy, InMemoryTableStore, ProductIngestService, PRODUCTS_PARTITION_KEY};
  use std::sync::Arc;

  fn app_state(store: &Arc<InMemoryTableStore>, strategy: IdStrategy) -> web::Data<AppState> {
    let ingest = ProductIngestService::with_strategy(store.clone(), strategy, 5);
    web::Data::new(AppState {
      ingest: Arc::new(ingest),
    })
  }

  fn post(body: &'static str) -> test::TestRequest {
    test::TestRequest::post()
      .uri("/api/AddProductFunction")
      .insert_header(("content-type", "application/json"))
      .set_payload(body)
  }

  #[actix_web::test]
  async fn adds_products_with_sequential_ids() {
    let store = Arc::new(InMemoryTableStore::new());
    let app = test::init_service(
      App::new()
        .app_data(app_state(&store, IdStrategy::default()))
        .configure(configure_app_routes),
    )
    .await;

    let body = r#"{"ProductName":"Widget","Price":9.99,"StockQuantity":10}"#;
    let first = test::call_service(&app, post(body).to_request()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
      first.headers().get("content-type").and_then(|v| v.to_str().ok()),
      Some("text/plain; charset=utf-8")
    );
    assert_eq!(
      test::read_body(first).await,
      "Product Widget added successfully with ProductId 1."
    );

    let second = test::call_service(&app, post(body).to_request()).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
      test::read_body(second).await,
      "Product Widget added successfully with ProductId 2."
    );

    let rows = store.products();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|p| p.partition_key == PRODUCTS_PARTITION_KEY));
    assert!(rows.iter().all(|p| uuid::Uuid::parse_str(&p.row_key).is_ok()));
  }

  #[actix_web::test]
  async fn rejects_invalid_bodies_with_fixed_message() {
    let store = Arc::new(InMemoryTableStore::new());
    let app = test::init_service(
      App::new()
        .app_data(app_state(&store, IdStrategy::Scan))
        .configure(configure_app_routes),
    )
    .await;

    for body in ["", "null", "{not json"] {
      let resp = test::call_service(&app, post(body).to_request()).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
      assert_eq!(test::read_body(resp).await, "Invalid product data.");
    }
    assert_eq!(store.insert_calls(), 0);
    assert_eq!(store.query_calls(), 0);
  }

  #[actix_web::test]
  async fn store_failure_is_an_empty_500() {
    let store = Arc::new(InMemoryTableStore::new());
    store.fail_inserts(true);
    let app = test::init_service(
      App::new()
        .app_data(app_state(&store, IdStrategy::Scan))
        .configure(configure_app_routes),
    )
    .await;

    let resp = test::call_service(&app, post(r#"{"ProductName":"Widget"}"#).to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(test::read_body(resp).await.is_empty());
    assert!(store.is_empty());
  }

  #[actix_web::test]
  async fn client_keys_are_ignored() {
    let store = Arc::new(InMemoryTableStore::new());
    let app = test::init_service(
      App::new()
        .app_data(app_state(&store, IdStrategy::Scan))
        .configure(configure_app_routes),
    )
    .await;

    let resp = test::call_service(
      &app,
      post(r#"{"ProductName":"Widget","ProductId":50,"PartitionKey":"x","RowKey":"y"}"#).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      test::read_body(resp).await,
      "Product Widget added successfully with ProductId 1."
    );
    let row = store.products().pop().expect("one row");
    assert_eq!(row.partition_key, PRODUCTS_PARTITION_KEY);
    assert_ne!(row.row_key, "y");
  }

  #[actix_web::test]
  async fn retry_after_failed_write_still_gets_first_id() {
    let store = Arc::new(InMemoryTableStore::new());
    let app = test::init_service(
      App::new()
        .app_data(app_state(&store, IdStrategy::default()))
        .configure(configure_app_routes),
    )
    .await;

    store.fail_inserts(true);
    let failed = test::call_service(&app, post(r#"{"ProductName":"Widget"}"#).to_request()).await;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    store.fail_inserts(false);

    let resp = test::call_service(
      &app,
      post(r#"{"productname":"Gadget","ProductName":"Widget"}"#).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      test::read_body(resp).await,
      "Product Widget added successfully with ProductId 1."
    );
  }
}
