//! Test utilities for Quarry integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use quarry::engine::Engine;
use quarry::reasoning::{Fields, Reasoner, Role, fields};
use quarry::retrieval::{RELEVANCE_FLOOR, Retriever};
use quarry::store::SqliteStore;
use quarry::trace::{TraceEvent, TraceSink};
use quarry::{QuarryError, Result};
use quarry_types::Fragment;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ============================================================================
// Reasoner
// ============================================================================

/// Reasoner that replays canned outputs per role.
///
/// Each role's replies are consumed in order; the last one repeats once the
/// queue is down to it. A role with no replies yields no fields.
#[derive(Default)]
pub struct ScriptedReasoner {
    script: Mutex<HashMap<Role, VecDeque<Fields>>>,
    calls: Mutex<Vec<(Role, Fields)>>,
    fail_question: Option<String>,
    panic_question: Option<String>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, role: Role, pairs: &[(&str, &str)]) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(fields(pairs.iter().copied()));
        self
    }

    /// Return an LLM error whenever this question is asked
    pub fn failing_on(mut self, question: &str) -> Self {
        self.fail_question = Some(question.to_string());
        self
    }

    /// Panic whenever this question is asked
    pub fn panicking_on(mut self, question: &str) -> Self {
        self.panic_question = Some(question.to_string());
        self
    }

    pub fn roles(&self) -> Vec<Role> {
        self.calls.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }

    pub fn count(&self, role: Role) -> usize {
        self.roles().into_iter().filter(|r| *r == role).count()
    }

    /// Inputs of the most recent call for `role`
    pub fn last_inputs(&self, role: Role) -> Option<Fields> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| *r == role)
            .map(|(_, f)| f.clone())
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn invoke(&self, role: Role, inputs: &Fields) -> Result<Fields> {
        self.calls.lock().unwrap().push((role, inputs.clone()));

        let question = inputs.get("question").map(String::as_str);
        if question.is_some() && question == self.panic_question.as_deref() {
            panic!("scripted panic");
        }
        if question.is_some() && question == self.fail_question.as_deref() {
            return Err(QuarryError::Llm("connection refused".into()));
        }

        let mut script = self.script.lock().unwrap();
        let Some(queue) = script.get_mut(&role) else {
            return Ok(Fields::new());
        };
        let out = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(out.unwrap_or_default())
    }
}

// ============================================================================
// Retriever
// ============================================================================

/// Retriever returning fixed fragments, honouring the relevance floor and top_k
pub struct StaticRetriever {
    fragments: Vec<Fragment>,
}

impl StaticRetriever {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Retriever for StaticRetriever {
    fn search(&self, query: &str, top_k: usize) -> Vec<Fragment> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        self.fragments
            .iter()
            .filter(|f| f.score > RELEVANCE_FLOOR)
            .take(top_k)
            .cloned()
            .collect()
    }
}

pub fn fragment(id: &str, content: &str, score: f32) -> Fragment {
    Fragment {
        id: id.to_string(),
        content: content.to_string(),
        score,
    }
}

// ============================================================================
// Trace sink
// ============================================================================

/// Keeps every event in memory
#[derive(Default)]
pub struct RecordingTraceSink {
    events: Mutex<Vec<(String, TraceEvent)>>,
}

impl RecordingTraceSink {
    pub fn steps(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.step()).collect()
    }

    pub fn events(&self) -> Vec<(String, TraceEvent)> {
        self.events.lock().unwrap().clone()
    }
}

impl TraceSink for RecordingTraceSink {
    fn record(&self, run_id: &str, event: TraceEvent) {
        self.events.lock().unwrap().push((run_id.to_string(), event));
    }
}

// ============================================================================
// SQLite fixture
// ============================================================================

/// Small Northwind-shaped database
pub fn fixture_db(dir: &Path) -> PathBuf {
    let path = dir.join("northwind.sqlite");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Customers (CustomerID TEXT PRIMARY KEY, CompanyName TEXT);
         CREATE TABLE Products (ProductID INTEGER PRIMARY KEY, ProductName TEXT, CategoryID INTEGER);
         CREATE TABLE Orders (OrderID INTEGER PRIMARY KEY, CustomerID TEXT, OrderDate TEXT);
         CREATE TABLE [Order Details] (OrderID INTEGER, ProductID INTEGER, UnitPrice REAL, Quantity INTEGER, Discount REAL);
         CREATE VIEW order_items AS SELECT OrderID, ProductID, UnitPrice, Quantity, Discount FROM [Order Details];
         INSERT INTO Customers VALUES ('ALFKI', 'Alfreds Futterkiste'), ('ANATR', 'Ana Trujillo');
         INSERT INTO Products VALUES (1, 'Chai', 1), (2, 'Chang', 1), (3, 'Aniseed Syrup', 2);
         INSERT INTO Orders VALUES (10248, 'ALFKI', '1997-06-04'), (10249, 'ANATR', '1997-06-05');
         INSERT INTO [Order Details] VALUES
            (10248, 1, 18.0, 12, 0.0),
            (10248, 2, 19.0, 10, 0.0),
            (10249, 3, 10.0, 5, 0.05);",
    )
    .unwrap();
    path
}

/// Everything an engine test needs, with handles kept for assertions
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub reasoner: Arc<ScriptedReasoner>,
    pub trace: Arc<RecordingTraceSink>,
    pub engine: Engine,
}

impl Harness {
    pub fn new(reasoner: ScriptedReasoner, retriever: impl Retriever + 'static) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = fixture_db(dir.path());
        let reasoner = Arc::new(reasoner);
        let trace = Arc::new(RecordingTraceSink::default());
        let store = Arc::new(SqliteStore::open(&db).unwrap());

        let engine = Engine::new(reasoner.clone(), Arc::new(retriever), store)
            .with_trace(trace.clone());
        Self {
            dir,
            reasoner,
            trace,
            engine,
        }
    }
}
