//! State held by the fake service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

/// Behaviour knobs for the fake service.
#[derive(Debug, Clone, Default)]
pub struct FakeConfig {
    /// Answer apply calls with `pending` and report this many in-flight
    /// processes, one fewer per status query, before the operations land.
    pub pending_polls: usize,

    /// Hold every response for this long before answering.
    pub response_delay: Duration,
}

/// Operations accepted but not yet applied.
#[derive(Debug, Clone)]
pub struct PendingWork {
    pub remaining: usize,
    pub operations: Vec<Value>,
}

/// A project held by the fake service.
#[derive(Debug, Clone)]
pub struct FakeProject {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub pending: Option<PendingWork>,
}

impl FakeProject {
    /// Parse an uploaded delimited file; the first line holds the headers.
    pub fn from_upload(name: String, contents: &str, separator: &str) -> Self {
        let mut lines = contents.lines().filter(|l| !l.is_empty());
        let columns = lines
            .next()
            .map(|l| split_line(l, separator))
            .unwrap_or_default();
        let rows = lines.map(|l| split_line(l, separator)).collect();

        Self {
            name,
            columns,
            rows,
            pending: None,
        }
    }

    /// Apply text transforms in order.
    pub fn apply(&mut self, operations: &[Value]) -> Result<(), String> {
        for op in operations {
            let column = op["columnName"]
                .as_str()
                .ok_or_else(|| "operation without columnName".to_string())?;
            let index = self
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| format!("no column named {}", column))?;
            let transform = text_transform(op)?;

            for row in &mut self.rows {
                if let Some(cell) = row.get_mut(index) {
                    *cell = transform(cell);
                }
            }
        }
        Ok(())
    }

    /// Render all rows with a header line.
    pub fn render(&self, separator: &str) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join(separator));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join(separator));
            out.push('\n');
        }
        out
    }
}

/// Check that every operation is one the fake understands.
pub fn validate_operations(operations: &[Value]) -> Result<(), String> {
    for op in operations {
        text_transform(op)?;
    }
    Ok(())
}

fn text_transform(op: &Value) -> Result<fn(&str) -> String, String> {
    if op["op"].as_str() != Some("core/text-transform") {
        return Err(format!("unsupported operation {}", op["op"]));
    }
    match op["expression"].as_str() {
        Some("value.toUppercase()") => Ok(uppercase),
        Some("value.toLowercase()") => Ok(lowercase),
        Some("value.trim()") => Ok(trim),
        other => Err(format!("unsupported expression {:?}", other)),
    }
}

fn uppercase(s: &str) -> String {
    s.to_uppercase()
}

fn lowercase(s: &str) -> String {
    s.to_lowercase()
}

fn trim(s: &str) -> String {
    s.trim().to_string()
}

fn split_line(line: &str, separator: &str) -> Vec<String> {
    line.split(separator).map(str::to_string).collect()
}

/// Shared state of the fake service.
#[derive(Default)]
pub struct FakeState {
    pub config: FakeConfig,

    /// Issued CSRF tokens.
    pub tokens: RwLock<HashSet<String>>,

    /// Live projects indexed by id.
    pub projects: RwLock<HashMap<String, FakeProject>>,

    /// Ids of deleted projects, in deletion order.
    pub deleted: RwLock<Vec<String>>,

    /// Names every project was created with.
    pub created_names: RwLock<Vec<String>>,

    pub next_id: AtomicU64,
    pub token_requests: AtomicUsize,
}

impl FakeState {
    pub fn new(config: FakeConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1_700_000_000_000),
            ..Self::default()
        }
    }

    /// Wait out the configured response delay.
    pub async fn delay(&self) {
        if !self.config.response_delay.is_zero() {
            tokio::time::sleep(self.config.response_delay).await;
        }
    }

    pub async fn token_valid(&self, token: Option<&str>) -> bool {
        match token {
            Some(t) => self.tokens.read().await.contains(t),
            None => false,
        }
    }
}
