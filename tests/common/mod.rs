//! Scripted backend and wire helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use zero_pgwire::backend::{
    Backend, Completion, ExecOutcome, ExecuteRequest, QueryResult, Row, Submission,
};
use zero_pgwire::error::ErrorFields;
use zero_pgwire::protocol::frontend;
use zero_pgwire::protocol::backend::{CommandComplete, DataRow, ErrorResponse, RawMessage, ReadyForQuery};
use zero_pgwire::protocol::types::{FormatCode, Oid, TransactionStatus};
use zero_pgwire::session::SessionContext;
use zero_pgwire::state::{ProtocolInterpreter, Transition};
use zero_pgwire::statement::{ColumnInfo, StatementDescription};
use zero_pgwire::{FlushPolicy, Opts};

pub const INT4: Oid = 23;
pub const TEXT: Oid = 25;

/// Route server logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// When the mock answers `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `Submission::Ready`
    Inline,
    /// Keep the completion until [`MockBackend::complete_pending`].
    Deferred,
    /// Complete from a spawned thread.
    Threaded,
}

/// Backend understanding a handful of statements:
///
/// - `BEGIN`, `START TRANSACTION`, `COMMIT`, `ROLLBACK`, `SET ...`: command tags
/// - `INSERT ...`: `INSERT 0 1`
/// - `SELECT SERIES n`: one int4 column with the values 1..=n
/// - `SELECT WIDE n`: one row of `n` text columns
/// - `SELECT $1`: echoes the parameter as text
/// - `SELECT x`: one text column holding `x`
/// - `FAIL`: division_by_zero
/// - `<statement> THEN FAIL`: the statement's result, then division_by_zero
/// - anything else: syntax_error
#[derive(Debug)]
pub struct MockBackend {
    pub mode: Mode,
    pub executed: Arc<Mutex<Vec<String>>>,
    pending: VecDeque<(Completion, ExecOutcome)>,
}

impl MockBackend {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            executed: Arc::new(Mutex::new(Vec::new())),
            pending: VecDeque::new(),
        }
    }

    pub fn inline() -> Self {
        Self::new(Mode::Inline)
    }

    pub fn deferred() -> Self {
        Self::new(Mode::Deferred)
    }

    /// Deliver the oldest stashed result. Returns false if none was waiting.
    pub fn complete_pending(&mut self) -> bool {
        match self.pending.pop_front() {
            Some((completion, outcome)) => {
                completion.complete(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop the oldest stashed completion without answering it.
    pub fn abandon_pending(&mut self) -> bool {
        self.pending.pop_front().is_some()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl Backend for MockBackend {
    fn prepare(
        &mut self,
        _session: &SessionContext,
        query: &str,
        param_types: &[Oid],
    ) -> Result<StatementDescription, ErrorFields> {
        let count = param_count(query).max(param_types.len());
        let resolved: Vec<Oid> = (0..count)
            .map(|i| match param_types.get(i) {
                Some(&oid) if oid != 0 => oid,
                _ => TEXT,
            })
            .collect();

        let keyword = first_word(query);
        match keyword.as_str() {
            "SELECT" => Ok(StatementDescription::rows(resolved, columns(query))),
            "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SET" | "INSERT" | "FAIL" => {
                Ok(StatementDescription::no_data(resolved))
            }
            _ => Err(syntax_error(&keyword)),
        }
    }

    fn execute(
        &mut self,
        _session: &SessionContext,
        request: ExecuteRequest,
        completion: Completion,
    ) -> Submission {
        self.executed.lock().unwrap().push(request.query().to_string());
        let outcome = match &request {
            ExecuteRequest::Simple { query } => evaluate(query, &[]),
            ExecuteRequest::Portal {
                query,
                params,
                result_formats,
                ..
            } => encode_binary(evaluate(query, params), result_formats),
        };
        match self.mode {
            Mode::Inline => Submission::Ready(outcome),
            Mode::Deferred => {
                self.pending.push_back((completion, outcome));
                Submission::Pending
            }
            Mode::Threaded => {
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    completion.complete(outcome);
                });
                Submission::Pending
            }
        }
    }
}

fn first_word(query: &str) -> String {
    query
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(';')
        .to_ascii_uppercase()
}

fn param_count(query: &str) -> usize {
    let bytes = query.as_bytes();
    let mut max = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'$' {
            let digits: String = bytes[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .map(|&c| c as char)
                .collect();
            if let Ok(n) = digits.parse::<usize>() {
                max = max.max(n);
            }
        }
    }
    max
}

fn division_by_zero() -> ErrorFields {
    ErrorFields::error("22012", "division by zero")
}

fn syntax_error(word: &str) -> ErrorFields {
    ErrorFields::error("42601", format!("syntax error at or near \"{word}\""))
}

fn columns(statement: &str) -> Vec<ColumnInfo> {
    let rest = statement.trim()[6..].trim();
    if let Some(n) = wide(rest) {
        vec![ColumnInfo::new("c", TEXT, -1); n]
    } else if rest.to_ascii_uppercase().starts_with("SERIES") {
        vec![ColumnInfo::new("n", INT4, 4)]
    } else if rest.starts_with('$') {
        vec![ColumnInfo::new("echo", TEXT, -1)]
    } else {
        vec![ColumnInfo::new("?column?", TEXT, -1)]
    }
}

fn wide(rest: &str) -> Option<usize> {
    rest.to_ascii_uppercase()
        .strip_prefix("WIDE")
        .and_then(|n| n.trim().parse().ok())
}

fn rows(statement: &str, params: &[Option<Vec<u8>>]) -> Vec<Row> {
    let rest = statement.trim()[6..].trim();
    if let Some(n) = wide(rest) {
        return vec![vec![Some(b"x".to_vec()); n]];
    }
    if let Some(n) = rest
        .to_ascii_uppercase()
        .strip_prefix("SERIES")
        .and_then(|n| n.trim().parse::<u32>().ok())
    {
        (1..=n).map(|i| vec![Some(i.to_string().into_bytes())]).collect()
    } else if rest.starts_with('$') {
        vec![vec![params.first().cloned().flatten()]]
    } else {
        vec![vec![Some(rest.as_bytes().to_vec())]]
    }
}

fn run_statement(statement: &str, params: &[Option<Vec<u8>>]) -> Result<QueryResult, ErrorFields> {
    let keyword = first_word(statement);
    match keyword.as_str() {
        "BEGIN" | "COMMIT" | "ROLLBACK" | "SET" => Ok(QueryResult::command(keyword)),
        "START" => Ok(QueryResult::command("START TRANSACTION")),
        "INSERT" => Ok(QueryResult::command("INSERT 0 1")),
        "SELECT" => Ok(QueryResult::rows(columns(statement), rows(statement, params))),
        "FAIL" => Err(division_by_zero()),
        _ => Err(syntax_error(&keyword)),
    }
}

/// Re-encode int4 columns requested in binary.
fn encode_binary(mut outcome: ExecOutcome, formats: &[FormatCode]) -> ExecOutcome {
    for result in &mut outcome.results {
        let Some(columns) = &result.columns else {
            continue;
        };
        for (i, column) in columns.iter().enumerate() {
            if column.type_oid() != INT4 || formats.get(i) != Some(&FormatCode::Binary) {
                continue;
            }
            for row in &mut result.rows {
                if let Some(Some(value)) = row.get_mut(i) {
                    let n: i32 = std::str::from_utf8(value).unwrap().parse().unwrap();
                    *value = n.to_be_bytes().to_vec();
                }
            }
        }
    }
    outcome
}

/// Run every `;`-separated statement, stopping at the first error.
pub fn evaluate(query: &str, params: &[Option<Vec<u8>>]) -> ExecOutcome {
    let mut results = Vec::new();
    for statement in query.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (statement, fails_after) = match statement.strip_suffix(" THEN FAIL") {
            Some(statement) => (statement, true),
            None => (statement, false),
        };
        match run_statement(statement, params) {
            Ok(result) => results.push(result),
            Err(fields) => return ExecOutcome::ok(results).with_error(fields),
        }
        if fails_after {
            return ExecOutcome::ok(results).with_error(division_by_zero());
        }
    }
    ExecOutcome::ok(results)
}

pub fn interpreter() -> ProtocolInterpreter {
    ProtocolInterpreter::with_session(&Opts::default(), SessionContext::new())
}

pub fn batched_interpreter() -> ProtocolInterpreter {
    let opts = Opts {
        flush_policy: FlushPolicy::Batched,
        ..Opts::default()
    };
    ProtocolInterpreter::with_session(&opts, SessionContext::new())
}

/// Step until the input is exhausted, resolving deferred results as they
/// come up. Returns the released output and the last transition.
pub fn drive(interpreter: &mut ProtocolInterpreter, backend: &mut MockBackend) -> (Vec<u8>, Transition) {
    let transition = loop {
        match interpreter.step(backend) {
            Transition::Proceed => {}
            Transition::NeedResult => {
                assert!(backend.complete_pending(), "suspended without a pending result");
                interpreter.try_resume().expect("result was delivered");
            }
            other => break other,
        }
    };
    let output = interpreter.output().to_vec();
    interpreter.consume_output(output.len());
    (output, transition)
}

/// Feed `input` and drive it.
pub fn run(interpreter: &mut ProtocolInterpreter, backend: &mut MockBackend, input: &[u8]) -> Vec<u8> {
    interpreter.feed(input);
    drive(interpreter, backend).0
}

/// A backend message, decoded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    ParseComplete,
    BindComplete,
    CloseComplete,
    NoData,
    PortalSuspended,
    EmptyQuery,
    ParameterDescription,
    RowDescription,
    DataRow(Vec<Option<String>>),
    Complete(String),
    Error(String),
    Ready(TransactionStatus),
    Other(u8),
}

pub fn replies(bytes: &[u8]) -> Vec<Reply> {
    RawMessage::split_all(bytes)
        .unwrap()
        .into_iter()
        .map(|m| match m.type_byte {
            b'1' => Reply::ParseComplete,
            b'2' => Reply::BindComplete,
            b'3' => Reply::CloseComplete,
            b'n' => Reply::NoData,
            b's' => Reply::PortalSuspended,
            b'I' => Reply::EmptyQuery,
            b't' => Reply::ParameterDescription,
            b'T' => Reply::RowDescription,
            b'D' => Reply::DataRow(
                DataRow::parse(m.payload)
                    .unwrap()
                    .iter()
                    .map(|v| v.map(|b| String::from_utf8_lossy(b).into_owned()))
                    .collect(),
            ),
            b'C' => Reply::Complete(
                CommandComplete::parse(m.payload).unwrap().tag.to_string(),
            ),
            b'E' => Reply::Error(
                ErrorResponse::parse(m.payload)
                    .unwrap()
                    .code()
                    .unwrap_or("")
                    .to_string(),
            ),
            b'Z' => Reply::Ready(
                ReadyForQuery::parse(m.payload)
                    .unwrap()
                    .transaction_status()
                    .unwrap(),
            ),
            other => Reply::Other(other),
        })
        .collect()
}

pub fn row(values: &[&str]) -> Reply {
    Reply::DataRow(values.iter().map(|v| Some(v.to_string())).collect())
}

pub fn complete(tag: &str) -> Reply {
    Reply::Complete(tag.to_string())
}

pub fn error(code: &str) -> Reply {
    Reply::Error(code.to_string())
}

/// Client message builder.
#[derive(Debug, Default, Clone)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, sql: &str) -> Self {
        frontend::write_query(&mut self.0, sql);
        self
    }

    pub fn parse(mut self, name: &str, sql: &str, types: &[Oid]) -> Self {
        frontend::write_parse(&mut self.0, name, sql, types);
        self
    }

    /// Bind with text parameters and text results.
    pub fn bind(mut self, portal: &str, statement: &str, params: &[Option<&str>]) -> Self {
        let params: Vec<Option<&[u8]>> = params.iter().map(|p| p.map(str::as_bytes)).collect();
        frontend::write_bind(&mut self.0, portal, statement, &[], &params, &[]);
        self
    }

    pub fn bind_formats(
        mut self,
        portal: &str,
        statement: &str,
        param_formats: &[FormatCode],
        params: &[Option<&[u8]>],
        result_formats: &[FormatCode],
    ) -> Self {
        frontend::write_bind(&mut self.0, portal, statement, param_formats, params, result_formats);
        self
    }

    pub fn describe_statement(mut self, name: &str) -> Self {
        frontend::write_describe_statement(&mut self.0, name);
        self
    }

    pub fn describe_portal(mut self, name: &str) -> Self {
        frontend::write_describe_portal(&mut self.0, name);
        self
    }

    pub fn execute(mut self, portal: &str, max_rows: u32) -> Self {
        frontend::write_execute(&mut self.0, portal, max_rows);
        self
    }

    pub fn close_statement(mut self, name: &str) -> Self {
        frontend::write_close_statement(&mut self.0, name);
        self
    }

    pub fn close_portal(mut self, name: &str) -> Self {
        frontend::write_close_portal(&mut self.0, name);
        self
    }

    pub fn sync(mut self) -> Self {
        frontend::write_sync(&mut self.0);
        self
    }

    pub fn flush(mut self) -> Self {
        frontend::write_flush(&mut self.0);
        self
    }

    pub fn terminate(mut self) -> Self {
        frontend::write_terminate(&mut self.0);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Run `script` and decode the replies.
pub fn exchange(interpreter: &mut ProtocolInterpreter, backend: &mut MockBackend, script: Script) -> Vec<Reply> {
    replies(&run(interpreter, backend, script.bytes()))
}
