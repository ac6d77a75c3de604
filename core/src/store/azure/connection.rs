// core/src/store/azure/connection.rs

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Well-known account of the local storage emulator (Azurite).
pub const DEVSTORE_ACCOUNT_NAME: &str = "devstoreaccount1";
pub const DEVSTORE_ACCOUNT_KEY: &str =
  "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVSTORE_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// How requests to the table service are authorized.
#[derive(Clone)]
pub enum Credentials {
  /// Decoded account key, used for `SharedKeyLite` signatures.
  SharedKey(Vec<u8>),
  /// Shared access signature query string, without the leading `?`.
  SharedAccessSignature(String),
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Credentials::SharedKey(_) => f.write_str("SharedKey([REDACTED])"),
      Credentials::SharedAccessSignature(_) => f.write_str("SharedAccessSignature([REDACTED])"),
    }
  }
}

/// A storage account resolved from a connection string.
#[derive(Debug, Clone)]
pub struct StorageAccount {
  pub account_name: String,
  pub table_endpoint: Url,
  pub credentials: Credentials,
}

impl StorageAccount {
  /// Parses an Azure Storage connection string such as the one the Functions
  /// host exposes in `AzureWebJobsStorage`.
  ///
  /// Supports account-key and SAS strings, explicit `TableEndpoint`s and
  /// `UseDevelopmentStorage=true`. Setting names are matched case-insensitively.
  pub fn from_connection_string(connection_string: &str) -> StoreResult<Self> {
    let settings = parse_settings(connection_string)?;
    let get = |name: &str| settings.get(&name.to_ascii_lowercase()).map(String::as_str);

    if get("UseDevelopmentStorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
      return Self::development_storage();
    }

    let explicit_endpoint = get("TableEndpoint").map(parse_endpoint).transpose()?;

    let account_name = match (get("AccountName"), &explicit_endpoint) {
      (Some(name), _) => name.to_string(),
      (None, Some(endpoint)) => account_from_host(endpoint)?,
      (None, None) => {
        return Err(StoreError::connection_string(
          "AccountName or TableEndpoint is required",
        ))
      }
    };

    let table_endpoint = match explicit_endpoint {
      Some(endpoint) => endpoint,
      None => {
        let protocol = get("DefaultEndpointsProtocol").unwrap_or(DEFAULT_PROTOCOL);
        let suffix = get("EndpointSuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
        parse_endpoint(&format!("{}://{}.table.{}", protocol, account_name, suffix))?
      }
    };

    let credentials = match (get("AccountKey"), get("SharedAccessSignature")) {
      (Some(key), _) => Credentials::SharedKey(decode_key(key)?),
      (None, Some(sas)) => Credentials::SharedAccessSignature(sas.trim_start_matches('?').to_string()),
      (None, None) => {
        return Err(StoreError::connection_string(
          "AccountKey or SharedAccessSignature is required",
        ))
      }
    };

    Ok(StorageAccount {
      account_name,
      table_endpoint,
      credentials,
    })
  }

  /// The local emulator account.
  pub fn development_storage() -> StoreResult<Self> {
    Ok(StorageAccount {
      account_name: DEVSTORE_ACCOUNT_NAME.to_string(),
      table_endpoint: parse_endpoint(DEVSTORE_TABLE_ENDPOINT)?,
      credentials: Credentials::SharedKey(decode_key(DEVSTORE_ACCOUNT_KEY)?),
    })
  }
}

fn parse_settings(connection_string: &str) -> StoreResult<HashMap<String, String>> {
  let mut settings = HashMap::new();
  for segment in connection_string.split(';').map(str::trim).filter(|s| !s.is_empty()) {
    // Values (keys, signatures) may themselves contain '='.
    let (name, value) = segment
      .split_once('=')
      .ok_or_else(|| StoreError::connection_string(format!("setting without '=': '{}'", redact(segment))))?;
    settings.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
  }
  if settings.is_empty() {
    return Err(StoreError::connection_string("connection string is empty"));
  }
  Ok(settings)
}

fn parse_endpoint(raw: &str) -> StoreResult<Url> {
  let trimmed = raw.trim_end_matches('/');
  let url = Url::parse(trimmed).map_err(|e| StoreError::connection_string(format!("invalid endpoint '{}': {}", trimmed, e)))?;
  if url.cannot_be_a_base() || url.host_str().is_none() {
    return Err(StoreError::connection_string(format!("invalid endpoint '{}'", trimmed)));
  }
  Ok(url)
}

fn account_from_host(endpoint: &Url) -> StoreResult<String> {
  endpoint
    .host_str()
    .and_then(|host| host.split('.').next())
    .filter(|label| !label.is_empty())
    .map(str::to_string)
    .ok_or_else(|| StoreError::connection_string("cannot derive AccountName from TableEndpoint"))
}

fn decode_key(key: &str) -> StoreResult<Vec<u8>> {
  STANDARD
    .decode(key)
    .map_err(|e| StoreError::InvalidKey(format!("AccountKey is not valid base64: {}", e)))
}

fn redact(segment: &str) -> String {
  segment.chars().take(12).collect::<String>() + "..."
}
