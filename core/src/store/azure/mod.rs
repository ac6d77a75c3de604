// core/src/store/azure/mod.rs

//! Azure Table Storage over its REST API.

mod auth;
pub mod connection;

use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

pub use connection::{Credentials, StorageAccount};

use super::{CasOutcome, SequenceRecord, SequenceStore, TableStore};
use crate::error::{StoreError, StoreResult};
use crate::model::{Product, SEQUENCE_PARTITION_KEY};

const API_VERSION: &str = "2019-02-02";
const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";

/// Characters left unescaped in query values and key literals.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Client for one table of one storage account.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct AzureTableClient {
  http: reqwest::Client,
  account: StorageAccount,
  table_name: String,
}

#[derive(Deserialize)]
struct QueryPage<T> {
  value: Vec<T>,
}

#[derive(Deserialize)]
struct ODataErrorBody {
  #[serde(rename = "odata.error")]
  error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
  code: String,
  message: ODataMessage,
}

#[derive(Deserialize)]
struct ODataMessage {
  value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SequenceEntity {
  partition_key: String,
  row_key: String,
  value: i32,
  #[serde(rename = "odata.etag", default, skip_serializing)]
  etag: Option<String>,
}

impl AzureTableClient {
  pub fn new(account: StorageAccount, table_name: impl Into<String>) -> StoreResult<Self> {
    let http = reqwest::Client::builder().build()?;
    Self::with_http_client(http, account, table_name)
  }

  pub fn with_http_client(
    http: reqwest::Client,
    account: StorageAccount,
    table_name: impl Into<String>,
  ) -> StoreResult<Self> {
    let table_name = table_name.into();
    validate_table_name(&table_name)?;
    Ok(AzureTableClient {
      http,
      account,
      table_name,
    })
  }

  pub fn from_connection_string(connection_string: &str, table_name: impl Into<String>) -> StoreResult<Self> {
    Self::new(StorageAccount::from_connection_string(connection_string)?, table_name)
  }

  pub fn table_name(&self) -> &str {
    &self.table_name
  }

  pub fn account_name(&self) -> &str {
    &self.account.account_name
  }

  fn url(&self, resource: &str, query: &[(&str, &str)]) -> StoreResult<Url> {
    let base = self.account.table_endpoint.as_str().trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/{}", base, resource))
      .map_err(|e| StoreError::InvalidRequest(format!("cannot build url for '{}': {}", resource, e)))?;

    let mut parts: Vec<String> = query
      .iter()
      .map(|(name, value)| format!("{}={}", name, utf8_percent_encode(value, UNRESERVED)))
      .collect();
    if let Credentials::SharedAccessSignature(sas) = &self.account.credentials {
      parts.push(sas.clone());
    }
    if !parts.is_empty() {
      url.set_query(Some(&parts.join("&")));
    }
    Ok(url)
  }

  fn entity_resource(&self, partition_key: &str, row_key: &str) -> String {
    format!(
      "{}(PartitionKey='{}',RowKey='{}')",
      self.table_name,
      key_literal(partition_key),
      key_literal(row_key)
    )
  }

  fn request(&self, method: Method, url: Url) -> StoreResult<RequestBuilder> {
    let date = auth::ms_date(Utc::now());
    let mut headers = HeaderMap::new();
    headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
    headers.insert("dataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
    headers.insert("maxdataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
    headers.insert("x-ms-date", header_value(&date)?);

    if let Credentials::SharedKey(key) = &self.account.credentials {
      let authorization = auth::shared_key_lite(&self.account.account_name, key, &date, &url)?;
      headers.insert(AUTHORIZATION, header_value(&authorization)?);
    }

    Ok(self.http.request(method, url).headers(headers))
  }

  fn with_json_body<T: Serialize>(builder: RequestBuilder, body: &T) -> StoreResult<RequestBuilder> {
    let bytes = serde_json::to_vec(body)?;
    Ok(
      builder
        .header(CONTENT_TYPE, "application/json")
        .header("Prefer", "return-no-content")
        .body(bytes),
    )
  }

  async fn post_entity<T: Serialize>(&self, entity: &T) -> StoreResult<Response> {
    let url = self.url(&self.table_name, &[])?;
    let request = Self::with_json_body(self.request(Method::POST, url)?, entity)?;
    Ok(request.send().await?)
  }

  async fn get_entity<T: DeserializeOwned>(&self, partition_key: &str, row_key: &str) -> StoreResult<Option<(T, Option<String>)>> {
    let url = self.url(&self.entity_resource(partition_key, row_key), &[])?;
    let response = self.request(Method::GET, url)?.send().await?;
    match response.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => {
        let etag = etag_of(&response);
        let entity = response.json::<T>().await?;
        Ok(Some((entity, etag)))
      }
      _ => Err(status_error(response).await),
    }
  }

  async fn replace_entity<T: Serialize>(&self, partition_key: &str, row_key: &str, entity: &T, etag: &str) -> StoreResult<CasOutcome> {
    let url = self.url(&self.entity_resource(partition_key, row_key), &[])?;
    let request = Self::with_json_body(self.request(Method::PUT, url)?, entity)?.header(IF_MATCH, header_value(etag)?);
    let response = request.send().await?;
    match response.status() {
      StatusCode::PRECONDITION_FAILED | StatusCode::NOT_FOUND => Ok(CasOutcome::Conflict),
      status if status.is_success() => Ok(CasOutcome::Applied {
        etag: etag_of(&response).unwrap_or_default(),
      }),
      _ => Err(status_error(response).await),
    }
  }
}

#[async_trait]
impl TableStore for AzureTableClient {
  #[instrument(skip(self), fields(account = %self.account.account_name, table = %self.table_name))]
  async fn ensure_table_exists(&self) -> StoreResult<()> {
    let url = self.url("Tables", &[])?;
    let body = serde_json::json!({ "TableName": self.table_name });
    let response = Self::with_json_body(self.request(Method::POST, url)?, &body)?.send().await?;
    match response.status() {
      StatusCode::CONFLICT => {
        debug!("Table already exists.");
        Ok(())
      }
      status if status.is_success() => {
        info!("Created table.");
        Ok(())
      }
      _ => Err(status_error(response).await),
    }
  }

  #[instrument(skip(self), fields(table = %self.table_name))]
  async fn query_partition(&self, partition_key: &str) -> StoreResult<Vec<Product>> {
    let filter = format!("PartitionKey eq '{}'", partition_key.replace('\'', "''"));
    let resource = format!("{}()", self.table_name);
    let mut products = Vec::new();
    let mut continuation: Option<(String, Option<String>)> = None;
    let mut pages = 0usize;

    loop {
      let mut query = vec![("$filter", filter.as_str())];
      if let Some((next_pk, next_rk)) = &continuation {
        query.push(("NextPartitionKey", next_pk.as_str()));
        if let Some(next_rk) = next_rk {
          query.push(("NextRowKey", next_rk.as_str()));
        }
      }
      let url = self.url(&resource, &query)?;
      let response = self.request(Method::GET, url)?.send().await?;
      if !response.status().is_success() {
        return Err(status_error(response).await);
      }

      let next_pk = header_string(&response, NEXT_PARTITION_KEY);
      let next_rk = header_string(&response, NEXT_ROW_KEY);
      let page = response.json::<QueryPage<Product>>().await?;
      pages += 1;
      products.extend(page.value);

      match next_pk {
        Some(pk) => continuation = Some((pk, next_rk)),
        None => break,
      }
    }

    debug!(pages, rows = products.len(), "Partition scan finished.");
    Ok(products)
  }

  #[instrument(skip(self, product), fields(table = %self.table_name, row_key = %product.row_key))]
  async fn insert(&self, product: &Product) -> StoreResult<()> {
    let response = self.post_entity(product).await?;
    match response.status() {
      StatusCode::CONFLICT => Err(StoreError::EntityAlreadyExists {
        partition_key: product.partition_key.clone(),
        row_key: product.row_key.clone(),
      }),
      status if status.is_success() => Ok(()),
      _ => {
        let err = status_error(response).await;
        error!(error = %err, "Insert rejected by table service.");
        Err(err)
      }
    }
  }
}

#[async_trait]
impl SequenceStore for AzureTableClient {
  #[instrument(skip(self), fields(table = %self.table_name))]
  async fn read_sequence(&self, name: &str) -> StoreResult<Option<SequenceRecord>> {
    let found = self.get_entity::<SequenceEntity>(SEQUENCE_PARTITION_KEY, name).await?;
    Ok(found.map(|(entity, header_etag)| SequenceRecord {
      value: entity.value,
      etag: header_etag.or(entity.etag).unwrap_or_default(),
    }))
  }

  #[instrument(skip(self), fields(table = %self.table_name))]
  async fn create_sequence(&self, name: &str, value: i32) -> StoreResult<CasOutcome> {
    let entity = SequenceEntity {
      partition_key: SEQUENCE_PARTITION_KEY.to_string(),
      row_key: name.to_string(),
      value,
      etag: None,
    };
    let response = self.post_entity(&entity).await?;
    match response.status() {
      StatusCode::CONFLICT => Ok(CasOutcome::Conflict),
      status if status.is_success() => Ok(CasOutcome::Applied {
        etag: etag_of(&response).unwrap_or_default(),
      }),
      _ => Err(status_error(response).await),
    }
  }

  #[instrument(skip(self, etag), fields(table = %self.table_name))]
  async fn advance_sequence(&self, name: &str, value: i32, etag: &str) -> StoreResult<CasOutcome> {
    let entity = SequenceEntity {
      partition_key: SEQUENCE_PARTITION_KEY.to_string(),
      row_key: name.to_string(),
      value,
      etag: None,
    };
    self.replace_entity(SEQUENCE_PARTITION_KEY, name, &entity, etag).await
  }
}

/// Table names: 3-63 alphanumerics, not starting with a digit.
fn validate_table_name(name: &str) -> StoreResult<()> {
  let valid = (3..=63).contains(&name.len())
    && name.chars().all(|c| c.is_ascii_alphanumeric())
    && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
  if valid {
    Ok(())
  } else {
    Err(StoreError::InvalidRequest(format!("invalid table name '{}'", name)))
  }
}

fn key_literal(key: &str) -> String {
  utf8_percent_encode(&key.replace('\'', "''"), UNRESERVED).to_string()
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
  HeaderValue::from_str(value).map_err(|e| StoreError::InvalidRequest(format!("invalid header value: {}", e)))
}

fn header_string(response: &Response, name: &str) -> Option<String> {
  response
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string)
}

fn etag_of(response: &Response) -> Option<String> {
  header_string(response, ETAG.as_str())
}

async fn status_error(response: Response) -> StoreError {
  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  match serde_json::from_str::<ODataErrorBody>(&body) {
    Ok(parsed) => StoreError::status(status.as_u16(), parsed.error.code, parsed.error.message.value),
    Err(_) => StoreError::status(
      status.as_u16(),
      status.canonical_reason().unwrap_or("Unknown"),
      body,
    ),
  }
}
