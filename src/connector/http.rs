//! ClickHouse HTTP interface driver
//!
//! Reads: POST the statement as the body, results come back as `JSONCompact`.
//! Inserts: the statement template goes in the `query` URL parameter and the
//! row batch is the body, encoded in the `Values` input format.

use crate::config::{ConnectionParams, Settings};
use crate::connector::driver::{decode_cell, ColumnMeta, Driver, DriverError, ResultSet, Session};
use crate::query_builder::QueryPlan;
use crate::table::{format_timestamp, Value};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

#[derive(Debug, Deserialize)]
struct CompactResponse {
    meta: Vec<ColumnMeta>,
    data: Vec<Vec<JsonValue>>,
}

/// Opens HTTP sessions against a ClickHouse server
#[derive(Debug, Clone)]
pub struct HttpDriver {
    timeout: Duration,
    connect_timeout: Duration,
}

impl HttpDriver {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.timeout, settings.connect_timeout)
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Driver for HttpDriver {
    type Session = HttpSession;

    /// Build the client and verify the session with a single `SELECT 1`
    fn connect(&self, params: &ConnectionParams) -> Result<HttpSession, DriverError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| DriverError::new(format!("failed to create HTTP client: {}", e)))?;

        let mut session = HttpSession {
            client,
            endpoint: params.endpoint(),
            params: params.clone(),
        };
        session.execute(&QueryPlan::read("SELECT 1"))?;
        Ok(session)
    }
}

/// One authenticated HTTP session
pub struct HttpSession {
    client: Client,
    endpoint: String,
    params: ConnectionParams,
}

impl HttpSession {
    fn request(&self) -> RequestBuilder {
        let mut request = self.client.post(&self.endpoint);

        if let Some(token) = &self.params.auth_token {
            request = request.bearer_auth(token);
        } else if let Some(user) = &self.params.user {
            request = request
                .header("X-ClickHouse-User", user)
                .header("X-ClickHouse-Key", self.params.password.as_deref().unwrap_or(""));
        }

        if let Some(database) = &self.params.database {
            request = request.header("X-ClickHouse-Database", database);
        }

        request
    }

    fn send(&self, request: RequestBuilder) -> Result<String, DriverError> {
        let response = request
            .send()
            .map_err(|e| DriverError::new(format!("request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        let code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let body = response
            .text()
            .map_err(|e| DriverError::new(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = format!("HTTP {}: {}", status, body.trim());
            return Err(match code {
                Some(code) => DriverError::with_code(code, message),
                None => DriverError::new(message),
            });
        }

        Ok(body)
    }
}

impl Session for HttpSession {
    fn execute(&mut self, plan: &QueryPlan) -> Result<ResultSet, DriverError> {
        match plan.rows() {
            Some(rows) => {
                let request = self
                    .request()
                    .query(&[("query", plan.statement())])
                    .body(encode_values(rows));
                self.send(request)?;
                Ok(ResultSet::empty())
            }
            None => {
                let request = self
                    .request()
                    .query(&[
                        ("default_format", "JSONCompact"),
                        ("output_format_json_quote_64bit_integers", "0"),
                    ])
                    .body(plan.statement().to_string());
                let body = self.send(request)?;
                decode_compact(&body)
            }
        }
    }
}

/// Parse a `JSONCompact` body; statements without a result set return nothing.
pub fn decode_compact(body: &str) -> Result<ResultSet, DriverError> {
    if body.trim().is_empty() {
        return Ok(ResultSet::empty());
    }

    let response: CompactResponse = serde_json::from_str(body)
        .map_err(|e| DriverError::new(format!("unexpected response from server: {}", e)))?;

    let rows = response
        .data
        .iter()
        .map(|row| {
            response
                .meta
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    row.get(idx)
                        .map(|cell| decode_cell(&column.type_name, cell))
                        .unwrap_or(Value::Null)
                })
                .collect()
        })
        .collect::<Vec<Vec<Value>>>();

    debug!("Decoded {} rows x {} columns", rows.len(), response.meta.len());

    Ok(ResultSet {
        columns: response.meta,
        rows,
    })
}

/// Encode rows in the ClickHouse `Values` format: `(1,'a'),(2,NULL)`
pub fn encode_values(rows: &[Vec<Value>]) -> String {
    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push('(');
        for (col, value) in row.iter().enumerate() {
            if col > 0 {
                out.push(',');
            }
            encode_value(value, &mut out);
        }
        out.push(')');
    }
    out
}

fn encode_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => out.push(if *b { '1' } else { '0' }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) if f.is_nan() => out.push_str("nan"),
        Value::Float(f) if f.is_infinite() => out.push_str(if *f > 0.0 { "inf" } else { "-inf" }),
        Value::Float(f) => out.push_str(&f.to_string()),
        Value::String(s) => push_quoted(s, out),
        Value::Timestamp(ts) => push_quoted(&format_timestamp(ts), out),
    }
}

fn push_quoted(s: &str, out: &mut String) {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
}
