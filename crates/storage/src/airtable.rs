//! Airtable REST backend.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Filters are rendered to `filterByFormula`,
//! sorts to `sort[0][field]` / `sort[0][direction]`, and limits to
//! `maxRecords`. Listing follows the `offset` cursor until the limit is
//! reached or the table is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::record::{Fields, Filter, Query, Record};
use crate::traits::RecordStore;

/// Public Airtable API root.
pub const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

/// Airtable caps page size at 100 records.
const MAX_PAGE_SIZE: usize = 100;

/// Connection settings for [`AirtableStore`].
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    /// API root, normally [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Base identifier (`app...`).
    pub base_id: String,
    /// Personal access token.
    pub token: String,
    /// Global per-request deadline. `None` = ureq defaults.
    pub timeout: Option<Duration>,
}

/// A `RecordStore` backed by an Airtable base.
#[derive(Debug, Clone)]
pub struct AirtableStore {
    config: AirtableConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

impl AirtableStore {
    pub fn new(config: AirtableConfig) -> Self {
        Self { config }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.base_id,
            urlencoded(table)
        )
    }

    fn agent(timeout: Option<Duration>) -> ureq::Agent {
        match timeout {
            Some(t) => ureq::Agent::config_builder()
                .timeout_global(Some(t))
                .build()
                .into(),
            None => ureq::Agent::new_with_defaults(),
        }
    }

    /// Run one blocking request on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Agent, String) -> Result<T, StoreError> + Send + 'static,
    {
        let agent = Self::agent(self.config.timeout);
        let auth = format!("Bearer {}", self.config.token);
        tokio::task::spawn_blocking(move || op(agent, auth))
            .await
            .map_err(|e| StoreError::Backend(format!("task join error: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError> {
        let url = self.table_url(table);
        let body = serde_json::json!({ "fields": fields, "typecast": true });
        tracing::debug!(table, "airtable create");
        self.blocking(move |agent, auth| {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .send_json(&body)
                .map_err(classify_error)?;
            response
                .into_body()
                .read_json::<Record>()
                .map_err(|e| StoreError::Backend(format!("could not parse create response: {}", e)))
        })
        .await
    }

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        let url = format!("{}/{}", self.table_url(table), urlencoded(id));
        let body = serde_json::json!({ "fields": fields, "typecast": true });
        let (table_name, record_id) = (table.to_string(), id.to_string());
        tracing::debug!(table, id, "airtable update");
        self.blocking(move |agent, auth| {
            let response = agent
                .patch(&url)
                .header("Authorization", &auth)
                .send_json(&body)
                .map_err(|e| not_found_or(e, &table_name, &record_id))?;
            response
                .into_body()
                .read_json::<Record>()
                .map_err(|e| StoreError::Backend(format!("could not parse update response: {}", e)))
        })
        .await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let url = format!("{}/{}", self.table_url(table), urlencoded(id));
        let (table_name, record_id) = (table.to_string(), id.to_string());
        self.blocking(move |agent, auth| {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(|e| not_found_or(e, &table_name, &record_id))?;
            response
                .into_body()
                .read_json::<Record>()
                .map_err(|e| StoreError::Backend(format!("could not parse record: {}", e)))
        })
        .await
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let base = format!("{}?{}", self.table_url(table), query_string(query));
        let limit = query.limit;
        tracing::debug!(table, url = %base, "airtable query");
        self.blocking(move |agent, auth| {
            let mut out = Vec::new();
            let mut offset: Option<String> = None;
            loop {
                let url = match &offset {
                    Some(o) => format!("{}&offset={}", base, urlencoded(o)),
                    None => base.clone(),
                };
                let page = agent
                    .get(&url)
                    .header("Authorization", &auth)
                    .call()
                    .map_err(classify_error)?
                    .into_body()
                    .read_json::<ListResponse>()
                    .map_err(|e| {
                        StoreError::Backend(format!("could not parse list response: {}", e))
                    })?;
                out.extend(page.records);
                if limit.is_some_and(|l| out.len() >= l) {
                    break;
                }
                match page.offset {
                    Some(next) => offset = Some(next),
                    None => break,
                }
            }
            if let Some(l) = limit {
                out.truncate(l);
            }
            Ok(out)
        })
        .await
    }
}

// ─── Formula rendering ────────────────────────────────────────────────────────

/// Render a filter as an Airtable formula.
pub fn formula(filter: &Filter) -> String {
    match filter {
        Filter::Eq(field, value) => format!("{{{}}}={}", field, literal(value)),
        Filter::Blank(field) => format!("{{{}}}=BLANK()", field),
        Filter::Gte(field, value) => format!("{{{}}}>={}", field, literal(value)),
        Filter::Lte(field, value) => format!("{{{}}}<={}", field, literal(value)),
        Filter::And(parts) => {
            let rendered: Vec<String> = parts.iter().map(formula).collect();
            format!("AND({})", rendered.join(","))
        }
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Null => "BLANK()".to_string(),
        other => other.to_string(),
    }
}

/// Render filter, sort, and limit as URL query parameters.
pub fn query_string(query: &Query) -> String {
    let mut params = Vec::new();
    if let Some(filter) = &query.filter {
        params.push(format!("filterByFormula={}", urlencoded(&formula(filter))));
    }
    if let Some(sort) = &query.sort {
        params.push(format!(
            "{}={}",
            urlencoded("sort[0][field]"),
            urlencoded(&sort.field)
        ));
        params.push(format!(
            "{}={}",
            urlencoded("sort[0][direction]"),
            sort.direction.as_str()
        ));
    }
    match query.limit {
        Some(limit) => {
            params.push(format!("maxRecords={}", limit));
            params.push(format!("pageSize={}", limit.clamp(1, MAX_PAGE_SIZE)));
        }
        None => params.push(format!("pageSize={}", MAX_PAGE_SIZE)),
    }
    params.join("&")
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Percent-encode a path segment or query value.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn classify_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::StatusCode(status) => StoreError::Status {
            status,
            message: format!("airtable returned HTTP {}", status),
        },
        other => StoreError::Backend(other.to_string()),
    }
}

fn not_found_or(err: ureq::Error, table: &str, id: &str) -> StoreError {
    match err {
        ureq::Error::StatusCode(404) => StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        },
        other => classify_error(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Sort;

    #[test]
    fn formula_renders_conjunction_of_eq_and_blank() {
        let f = Filter::eq("Motor ID", "motor-1").and(Filter::blank("Horómetro Fin"));
        assert_eq!(
            formula(&f),
            "AND({Motor ID}='motor-1',{Horómetro Fin}=BLANK())"
        );
    }

    #[test]
    fn formula_escapes_quotes_and_renders_numbers() {
        assert_eq!(
            formula(&Filter::eq("Operador", "O'Higgins")),
            "{Operador}='O\\'Higgins'"
        );
        assert_eq!(formula(&Filter::gte("Kw", 1000)), "{Kw}>=1000");
        assert_eq!(formula(&Filter::eq("Activo", true)), "{Activo}=TRUE()");
    }

    #[test]
    fn query_string_includes_sort_and_limit() {
        let q = Query::new()
            .filter(Filter::blank("Fecha Fin"))
            .sort(Sort::desc("Fecha Inicio"))
            .limit(1);
        let qs = query_string(&q);
        assert!(qs.starts_with("filterByFormula=%7BFecha%20Fin%7D%3DBLANK%28%29"));
        assert!(qs.contains("sort%5B0%5D%5Bfield%5D=Fecha%20Inicio"));
        assert!(qs.contains("sort%5B0%5D%5Bdirection%5D=desc"));
        assert!(qs.contains("maxRecords=1"));
        assert!(qs.contains("pageSize=1"));
    }

    #[test]
    fn unlimited_query_uses_max_page_size() {
        assert_eq!(query_string(&Query::new()), "pageSize=100");
    }

    #[test]
    fn table_url_encodes_table_names() {
        let store = AirtableStore::new(AirtableConfig {
            base_url: "https://api.airtable.com/v0/".to_string(),
            base_id: "appXYZ".to_string(),
            token: "tok".to_string(),
            timeout: None,
        });
        assert_eq!(
            store.table_url("Estado Motores"),
            "https://api.airtable.com/v0/appXYZ/Estado%20Motores"
        );
    }
}
