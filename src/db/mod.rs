pub mod conversation_repository;
pub mod financial_profile_repository;
pub mod message_repository;
pub mod models;
pub mod profile_repository;

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::{SupabaseConfig, SUPABASE_SERVICE_KEY_VAR};
use crate::errors::{ConfigError, DbError};

use self::models::Table;

static GLOBAL: OnceLock<SupabaseClient> = OnceLock::new();

/// Authenticated handle to the hosted backend's REST interface.
///
/// Built once from a validated [`SupabaseConfig`] and read-only afterwards.
/// Clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    rest_url: String,
    config: SupabaseConfig,
}

impl SupabaseClient {
    /// Builds a handle authenticated with the public (anon) key.
    pub fn new(config: SupabaseConfig) -> Result<Self, ConfigError> {
        let key = config.anon_key().to_string();
        Self::with_key(config, &key)
    }

    /// Validates `url` and `anon_key` and builds a handle in one step.
    pub fn connect(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        Self::new(SupabaseConfig::new(url, anon_key)?)
    }

    fn with_key(config: SupabaseConfig, key: &str) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let mut api_key = header_value(key)?;
        api_key.set_sensitive(true);
        let mut bearer = header_value(&format!("Bearer {key}"))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", config.url()),
            config,
        })
    }

    /// A separate handle authenticated with the service-role key.
    pub fn admin(&self) -> Result<Self, ConfigError> {
        let key = self
            .config
            .service_key()
            .ok_or(ConfigError::Missing { var: SUPABASE_SERVICE_KEY_VAR })?
            .to_string();
        Self::with_key(self.config.clone(), &key)
    }

    /// Installs the process-wide handle. Fails if one is already installed.
    pub fn init_global(config: SupabaseConfig) -> Result<&'static SupabaseClient, ConfigError> {
        let client = Self::new(config)?;
        let mut installed = false;
        let handle = GLOBAL.get_or_init(|| {
            installed = true;
            client
        });
        if installed {
            debug!("Backend handle installed for {}", handle.config.url());
            Ok(handle)
        } else {
            Err(ConfigError::AlreadyInitialized)
        }
    }

    /// The process-wide handle, if [`SupabaseClient::init_global`] has run.
    pub fn global() -> Option<&'static SupabaseClient> {
        GLOBAL.get()
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Starts a `select=*` query on `T`'s table.
    pub fn from<T: Table>(&self) -> TableQuery<'_, T> {
        TableQuery {
            client: self,
            params: vec![("select".to_string(), "*".to_string())],
            _row: PhantomData,
        }
    }

    /// Inserts one row and returns it as stored.
    pub async fn insert<T: Table>(&self, row: &impl Serialize) -> Result<T, DbError> {
        let req = self
            .http
            .post(self.table_url(T::NAME))
            .header("Prefer", "return=representation")
            .json(row);
        let rows: Vec<T> = execute(T::NAME, req).await?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NoRowsReturned { table: T::NAME })
    }

    /// Applies `patch` to every row where `column` equals `value`.
    pub async fn update<T: Table>(
        &self,
        column: &str,
        value: impl Display,
        patch: &impl Serialize,
    ) -> Result<Vec<T>, DbError> {
        let req = self
            .http
            .patch(self.table_url(T::NAME))
            .query(&[(column.to_string(), format!("eq.{value}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        execute(T::NAME, req).await
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }
}

/// Builder for a filtered read of one table.
pub struct TableQuery<'a, T> {
    client: &'a SupabaseClient,
    params: Vec<(String, String)>,
    _row: PhantomData<fn() -> T>,
}

impl<T: Table> TableQuery<'_, T> {
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params.push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    pub async fn fetch(self) -> Result<Vec<T>, DbError> {
        let req = self
            .client
            .http
            .get(self.client.table_url(T::NAME))
            .query(&self.params);
        execute(T::NAME, req).await
    }

    pub async fn fetch_optional(self) -> Result<Option<T>, DbError> {
        Ok(self.limit(1).fetch().await?.into_iter().next())
    }

    /// Like [`TableQuery::fetch_optional`], but a missing row is
    /// [`DbError::NotFound`] naming the first equality filter.
    pub async fn fetch_one(self) -> Result<T, DbError> {
        let (column, value) = self
            .params
            .iter()
            .find_map(|(k, v)| v.strip_prefix("eq.").map(|v| (k.clone(), v.to_string())))
            .unwrap_or_default();
        self.fetch_optional()
            .await?
            .ok_or_else(|| DbError::not_found(T::NAME, column, value))
    }
}

async fn execute<T: Table>(table: &'static str, req: RequestBuilder) -> Result<Vec<T>, DbError> {
    let resp = req.send().await.map_err(|e| {
        error!("Request on table {table} failed: {e}");
        DbError::Http(e)
    })?;

    let status = resp.status();
    debug!("{} {status}", resp.url().path());
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("Request on table {table} returned {status}: {body}");
        return Err(DbError::Status { table, status, body });
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| {
        error!("Failed to decode rows from {table}: {source}");
        DbError::Decode { table, source }
    })
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::HttpClient(format!("invalid API key: {e}")))
}
