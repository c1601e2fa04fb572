//! In-memory driver standing in for a ClickHouse server

#![allow(dead_code)]

use ch_ingest::connector::ColumnMeta;
use ch_ingest::{ConnectionParams, Driver, DriverError, QueryPlan, ResultSet, Session, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    refuse_connections: bool,
    connect_attempts: usize,
    plans: Vec<QueryPlan>,
    /// (statement prefix, canned outcome); first match wins
    responses: Vec<(String, Result<ResultSet, DriverError>)>,
}

/// Clones share one log, so a test keeps a handle while the pipeline owns another
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().refuse_connections = true;
        driver
    }

    pub fn respond(&self, prefix: &str, result: ResultSet) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((prefix.to_string(), Ok(result)));
        self
    }

    pub fn fail(&self, prefix: &str, error: DriverError) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((prefix.to_string(), Err(error)));
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn plans(&self) -> Vec<QueryPlan> {
        self.state.lock().unwrap().plans.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.plans().iter().map(|p| p.statement().to_string()).collect()
    }
}

impl Driver for FakeDriver {
    type Session = FakeSession;

    fn connect(&self, params: &ConnectionParams) -> Result<FakeSession, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.refuse_connections {
            return Err(DriverError::new(format!(
                "error trying to connect: tcp connect error: Connection refused ({}:{})",
                params.host, params.port
            )));
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl Session for FakeSession {
    fn execute(&mut self, plan: &QueryPlan) -> Result<ResultSet, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.plans.push(plan.clone());
        state
            .responses
            .iter()
            .find(|(prefix, _)| plan.statement().starts_with(prefix.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| Ok(ResultSet::empty()))
    }
}

/// Result set with String-typed columns
pub fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
    typed_result_set(
        &columns.iter().map(|c| (*c, "String")).collect::<Vec<_>>(),
        rows,
    )
}

pub fn typed_result_set(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet {
        columns: columns
            .iter()
            .map(|(name, type_name)| ColumnMeta {
                name: name.to_string(),
                type_name: type_name.to_string(),
            })
            .collect(),
        rows,
    }
}

pub fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn params() -> ConnectionParams {
    ConnectionParams::new("localhost", 8123).with_database("default")
}
