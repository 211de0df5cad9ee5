//! Concurrent workload execution.
//!
//! A single producer drives a lazy statement stream into a bounded pool of
//! worker threads, each owning its own lazily-opened database connection.
//! Schema-changing statements act as fences: the producer drains all
//! outstanding work, runs the DDL alone on its own connection with retries,
//! then resumes dispatch. Failures are data here, not exceptions; every
//! completion is classified into a one-character outcome and counted.

use crate::{
    error::Error,
    shape::query_shape,
    stats::{ExecutionStats, Outcome, Symbol},
};
use crossbeam_channel::{Receiver, Sender};
use postgres::{error::SqlState, Client, NoTls};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// Statements whose leading keyword makes them a DDL fence.
const DDL_KEYWORDS: &[&str] = &["CREATE", "ALTER", "DROP", "TRUNCATE"];

/// Attempts for a fenced DDL statement hitting retryable failures.
const DDL_ATTEMPTS: u32 = 5;

/// Characters per line of the progress stream.
const LINE_WIDTH: usize = 80;

/// A classified driver-level failure.
///
/// Workers never propagate these; they are folded into [`Outcome`]s and
/// counted.
#[derive(Debug, Clone)]
pub enum ExecError {
    /// The SQL parser rejected the statement.
    Syntax(String),
    /// The statement was cancelled by the statement timeout.
    Timeout(String),
    /// Transport-level failure; the connection is unusable.
    Connection(String),
    /// Serialization failure, retryable for fenced DDL.
    Serialization(String),
    /// Any other driver error, tagged for aggregation.
    Other {
        /// Stable tag, an SQLSTATE code where available.
        tag: String,
        /// Human-readable message.
        message: String,
    },
}

impl ExecError {
    /// Folds the error into an outcome symbol and tag.
    pub fn outcome(&self) -> Outcome {
        match self {
            ExecError::Syntax(_) => Outcome::failure(Symbol::Syntax, "SyntaxError"),
            ExecError::Timeout(_) => Outcome::failure(Symbol::Timeout, "Timeout"),
            ExecError::Connection(_) => Outcome::failure(Symbol::Crash, "Crash/ConnectionLost"),
            ExecError::Serialization(_) => Outcome::failure(Symbol::Error, "SerializationFailure"),
            ExecError::Other { tag, .. } => Outcome::failure(Symbol::Error, tag.clone()),
        }
    }

    /// Whether the worker must drop and reopen its connection.
    fn forces_reconnect(&self) -> bool {
        matches!(self, ExecError::Connection(_))
    }

    /// Whether a fenced DDL statement should be retried.
    fn is_retryable_ddl(&self) -> bool {
        matches!(self, ExecError::Connection(_) | ExecError::Serialization(_))
    }
}

/// The minimal statement-execution capability workers need.
pub trait Connection {
    /// Executes one statement, discarding any result rows.
    fn execute(&mut self, sql: &str) -> Result<(), ExecError>;
}

/// Opens [`Connection`]s for workers and the producer's DDL path.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Conn: Connection;

    /// Opens a new connection.
    fn connect(&self) -> Result<Self::Conn, ExecError>;
}

/// Connects to PostgreSQL with the sync driver, applying a statement
/// timeout on every fresh connection.
#[derive(Debug, Clone)]
pub struct PgConnector {
    dsn: String,
    statement_timeout_ms: Option<u64>,
}

impl PgConnector {
    /// Creates a connector for the DSN with an optional statement timeout
    /// in milliseconds.
    pub fn new(dsn: impl Into<String>, statement_timeout_ms: Option<u64>) -> Self {
        Self { dsn: dsn.into(), statement_timeout_ms }
    }
}

impl Connector for PgConnector {
    type Conn = PgConnection;

    fn connect(&self) -> Result<PgConnection, ExecError> {
        let mut client = Client::connect(&self.dsn, NoTls).map_err(classify_pg)?;
        if let Some(ms) = self.statement_timeout_ms {
            client
                .batch_execute(&format!("SET statement_timeout = {ms}"))
                .map_err(classify_pg)?;
        }
        Ok(PgConnection { client })
    }
}

/// A live PostgreSQL connection.
pub struct PgConnection {
    client: Client,
}

impl Connection for PgConnection {
    fn execute(&mut self, sql: &str) -> Result<(), ExecError> {
        self.client.batch_execute(sql).map_err(classify_pg)
    }
}

/// Maps a driver error onto the executor taxonomy. Errors carrying an
/// SQLSTATE are tagged with the code; transport-level errors force a
/// reconnect.
fn classify_pg(err: postgres::Error) -> ExecError {
    if let Some(db) = err.as_db_error() {
        let code = db.code();
        let message = db.message().to_owned();
        return if *code == SqlState::SYNTAX_ERROR {
            ExecError::Syntax(message)
        } else if *code == SqlState::QUERY_CANCELED {
            ExecError::Timeout(message)
        } else if *code == SqlState::T_R_SERIALIZATION_FAILURE {
            ExecError::Serialization(message)
        } else if code.code().starts_with("08")
            || *code == SqlState::ADMIN_SHUTDOWN
            || *code == SqlState::CRASH_SHUTDOWN
        {
            ExecError::Connection(message)
        } else {
            ExecError::Other { tag: code.code().to_owned(), message }
        };
    }
    // no SQLSTATE: transport or protocol failure
    ExecError::Connection(err.to_string())
}

/// Executes a grammar-driven statement stream against a database.
pub struct WorkloadExecutor<C: Connector> {
    connector: Arc<C>,
    threads: usize,
    progress_interval: u64,
    retry_pause: Duration,
    interrupt: Arc<AtomicBool>,
    out: Box<dyn Write>,
}

impl WorkloadExecutor<PgConnector> {
    /// Creates an executor against PostgreSQL.
    pub fn postgres(dsn: impl Into<String>, threads: usize, statement_timeout_ms: u64) -> Self {
        Self::with_connector(PgConnector::new(dsn, Some(statement_timeout_ms)), threads)
    }
}

impl<C: Connector> WorkloadExecutor<C> {
    /// Creates an executor over any connector.
    pub fn with_connector(connector: C, threads: usize) -> Self {
        Self {
            connector: Arc::new(connector),
            threads: threads.max(1),
            progress_interval: 10_000,
            retry_pause: Duration::from_secs(1),
            interrupt: Arc::new(AtomicBool::new(false)),
            out: Box::new(io::stdout()),
        }
    }

    /// Overrides how many completed statements separate summaries.
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Overrides the pause between fenced-DDL retries.
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Redirects the progress stream.
    pub fn output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// A flag that aborts submission when set. Wire it to a signal handler
    /// to stop a run gracefully: in-flight statements are drained, the
    /// final summary is printed and the statistics returned.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Runs the workload to completion (or interruption) and returns the
    /// collected statistics.
    ///
    /// Empty statements and `--` comment lines are skipped. At most
    /// `threads * 10` submissions are outstanding at any moment; the
    /// producer blocks on completions beyond that.
    pub fn run<I>(&mut self, statements: I) -> Result<ExecutionStats, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut stats = ExecutionStats::new();
        let max_in_flight = self.threads * 10;
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<String>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Outcome>();

        let connector = &self.connector;
        let threads = self.threads;
        let progress_interval = self.progress_interval;
        let retry_pause = self.retry_pause;
        let interrupt = Arc::clone(&self.interrupt);
        let mut progress = Progress::new(&mut self.out);

        let run_result: Result<(), Error> = thread::scope(|scope| {
            for _ in 0..threads {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let connector = Arc::clone(connector);
                scope.spawn(move || worker_loop(&*connector, &jobs, &results));
            }
            drop(result_tx);

            let mut in_flight = 0_usize;
            let mut ddl_conn: Option<C::Conn> = None;

            for statement in statements {
                if interrupt.load(Ordering::Relaxed) {
                    break;
                }
                let trimmed = statement.trim();
                if trimmed.is_empty() || trimmed.starts_with("--") {
                    continue;
                }
                stats.note_statement(query_shape(trimmed));

                if in_flight >= max_in_flight {
                    // backpressure: block until at least one completes
                    if let Ok(outcome) = result_rx.recv() {
                        in_flight -= 1;
                        stats.record(&outcome);
                        progress.symbol(outcome.symbol)?;
                    }
                } else if in_flight >= threads {
                    while let Ok(outcome) = result_rx.try_recv() {
                        in_flight -= 1;
                        stats.record(&outcome);
                        progress.symbol(outcome.symbol)?;
                    }
                }

                if stats.total % progress_interval == 0 {
                    progress.summary(&stats)?;
                }

                if is_ddl(trimmed) {
                    while in_flight > 0 {
                        match result_rx.recv() {
                            Ok(outcome) => {
                                in_flight -= 1;
                                stats.record(&outcome);
                                progress.symbol(outcome.symbol)?;
                            }
                            Err(_) => break,
                        }
                    }
                    let outcome = execute_ddl_with_retry(
                        connector.as_ref(),
                        &mut ddl_conn,
                        trimmed,
                        retry_pause,
                    );
                    stats.record(&outcome);
                    progress.symbol(outcome.symbol)?;
                } else {
                    if job_tx.send(statement).is_err() {
                        break;
                    }
                    in_flight += 1;
                    stats.note_in_flight(in_flight);
                }
            }

            while in_flight > 0 {
                match result_rx.recv() {
                    Ok(outcome) => {
                        in_flight -= 1;
                        stats.record(&outcome);
                        progress.symbol(outcome.symbol)?;
                    }
                    Err(_) => break,
                }
            }
            drop(job_tx);

            progress.summary(&stats)?;
            Ok(())
        });
        run_result?;

        Ok(stats)
    }
}

/// Runs a fenced DDL statement on the producer's own connection, retrying
/// serialization and connection failures with a pause in between.
fn execute_ddl_with_retry<C: Connector>(
    connector: &C,
    conn: &mut Option<C::Conn>,
    sql: &str,
    pause: Duration,
) -> Outcome {
    let mut attempt = 0;
    loop {
        match try_execute(connector, conn, sql) {
            Ok(()) => return Outcome::ok(),
            Err(err) => {
                attempt += 1;
                if err.is_retryable_ddl() && attempt < DDL_ATTEMPTS {
                    tracing::debug!(attempt, "retrying fenced DDL after failure: {err:?}");
                    thread::sleep(pause);
                    continue;
                }
                return err.outcome();
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for WorkloadExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadExecutor")
            .field("threads", &self.threads)
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

/// Whether the statement's leading keyword makes it a DDL fence.
fn is_ddl(sql: &str) -> bool {
    let keyword = sql.split_whitespace().next().unwrap_or("");
    DDL_KEYWORDS.iter().any(|ddl| keyword.eq_ignore_ascii_case(ddl))
}

fn worker_loop<C: Connector>(connector: &C, jobs: &Receiver<String>, results: &Sender<Outcome>) {
    let mut conn: Option<C::Conn> = None;
    for sql in jobs.iter() {
        let outcome = match try_execute(connector, &mut conn, &sql) {
            Ok(()) => Outcome::ok(),
            Err(err) => err.outcome(),
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
    // dropping the connection closes it, best effort
}

/// Executes one statement over a lazily-opened connection slot. On
/// connection-level failure the slot is cleared, so the next call
/// reconnects.
fn try_execute<C: Connector>(
    connector: &C,
    slot: &mut Option<C::Conn>,
    sql: &str,
) -> Result<(), ExecError> {
    let mut conn = match slot.take() {
        Some(conn) => conn,
        None => match connector.connect() {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("connection attempt failed: {err:?}");
                return Err(err);
            }
        },
    };
    match conn.execute(sql) {
        Ok(()) => {
            *slot = Some(conn);
            Ok(())
        }
        Err(err) => {
            if !err.forces_reconnect() {
                *slot = Some(conn);
            }
            Err(err)
        }
    }
}

/// Writes the per-statement character stream and periodic summaries,
/// keeping both interleavable.
struct Progress<'a> {
    out: &'a mut dyn Write,
    chars_on_line: usize,
}

impl<'a> Progress<'a> {
    fn new(out: &'a mut dyn Write) -> Self {
        Self { out, chars_on_line: 0 }
    }

    fn symbol(&mut self, symbol: Symbol) -> Result<(), Error> {
        write!(self.out, "{}", symbol.as_char())?;
        self.chars_on_line += 1;
        if self.chars_on_line % LINE_WIDTH == 0 {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn summary(&mut self, stats: &ExecutionStats) -> Result<(), Error> {
        writeln!(self.out)?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "[{}] Progress: {} statements ({}s elapsed).",
            chrono::Local::now().format("%H:%M:%S"),
            stats.total,
            stats.elapsed_seconds(),
        )?;
        for &symbol in Symbol::ALL {
            writeln!(
                self.out,
                "  {} ({}): {}",
                symbol.describe(),
                symbol.as_char(),
                stats.symbol_count(symbol),
            )?;
        }
        writeln!(self.out, "  Unique shapes: {}", stats.unique_shapes())?;
        let top = stats.top_errors(5);
        if !top.is_empty() {
            writeln!(self.out, "  Top errors:")?;
            for (tag, count) in top {
                writeln!(self.out, "    - {tag}: {count}")?;
            }
        }
        writeln!(self.out, "{}", "-".repeat(LINE_WIDTH))?;
        writeln!(self.out)?;
        self.out.flush()?;
        self.chars_on_line = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Shared observation point for the scripted connector.
    #[derive(Debug, Default)]
    struct Script {
        active: AtomicUsize,
        max_active: AtomicUsize,
        ddl_overlap: AtomicUsize,
        executed: Mutex<Vec<String>>,
        connects: AtomicUsize,
    }

    #[derive(Debug, Clone)]
    struct ScriptedConnector {
        script: Arc<Script>,
        fail_connect: bool,
    }

    impl ScriptedConnector {
        fn new() -> Self {
            Self { script: Arc::new(Script::default()), fail_connect: false }
        }
    }

    struct ScriptedConnection {
        script: Arc<Script>,
    }

    impl Connector for ScriptedConnector {
        type Conn = ScriptedConnection;

        fn connect(&self) -> Result<ScriptedConnection, ExecError> {
            self.script.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(ExecError::Connection("refused".to_owned()));
            }
            Ok(ScriptedConnection { script: Arc::clone(&self.script) })
        }
    }

    impl Connection for ScriptedConnection {
        fn execute(&mut self, sql: &str) -> Result<(), ExecError> {
            let script = &self.script;
            let active = script.active.fetch_add(1, Ordering::SeqCst) + 1;
            script.max_active.fetch_max(active, Ordering::SeqCst);
            if is_ddl(sql) && active > 1 {
                script.ddl_overlap.fetch_add(1, Ordering::SeqCst);
            }
            script.executed.lock().unwrap().push(sql.to_owned());

            let result = match sql.split_whitespace().next().unwrap_or("") {
                "SELEC" => Err(ExecError::Syntax("syntax error".to_owned())),
                "SLOW" => {
                    thread::sleep(Duration::from_millis(2));
                    Ok(())
                }
                "TIMEOUT" => Err(ExecError::Timeout("cancelled".to_owned())),
                "KILL" => Err(ExecError::Connection("socket closed".to_owned())),
                "BOOM" => {
                    Err(ExecError::Other { tag: "42P01".to_owned(), message: "oops".to_owned() })
                }
                _ => Ok(()),
            };
            script.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn run_executor(connector: ScriptedConnector, statements: Vec<&str>) -> ExecutionStats {
        WorkloadExecutor::with_connector(connector, 4)
            .retry_pause(Duration::from_millis(1))
            .output(Box::new(io::sink()))
            .run(statements.into_iter().map(str::to_owned))
            .unwrap()
    }

    #[test]
    fn test_outcome_classification() {
        let connector = ScriptedConnector::new();
        let stats = run_executor(
            connector,
            vec!["SELECT 1", "SELEC 1", "TIMEOUT now", "KILL connection"],
        );
        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.symbol_count(Symbol::Ok), 1);
        assert_eq!(stats.symbol_count(Symbol::Syntax), 1);
        assert_eq!(stats.symbol_count(Symbol::Timeout), 1);
        assert_eq!(stats.symbol_count(Symbol::Crash), 1);
        assert_eq!(stats.errors["SyntaxError"], 1);
        assert_eq!(stats.errors["Timeout"], 1);
        assert_eq!(stats.errors["Crash/ConnectionLost"], 1);
        let symbol_sum: u64 = stats.symbols.values().sum();
        assert_eq!(symbol_sum, stats.total);
    }

    #[test]
    fn test_blank_and_comment_statements_skipped() {
        let connector = ScriptedConnector::new();
        let script = Arc::clone(&connector.script);
        let stats = run_executor(connector, vec!["", "   ", "-- a comment", "SELECT 1"]);
        assert_eq!(stats.total, 1);
        assert_eq!(script.executed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_ddl_barrier_no_overlap() {
        let connector = ScriptedConnector::new();
        let script = Arc::clone(&connector.script);
        let mut statements = Vec::new();
        for round in 0..5 {
            for i in 0..30 {
                statements.push(format!("SLOW query {round} {i}"));
            }
            statements.push(format!("CREATE TABLE fence_{round} (id INTEGER)"));
        }
        let stats = WorkloadExecutor::with_connector(connector, 4)
            .retry_pause(Duration::from_millis(1))
            .output(Box::new(io::sink()))
            .run(statements.into_iter())
            .unwrap();
        assert_eq!(stats.total, 155);
        assert_eq!(stats.success, 155);
        assert_eq!(
            script.ddl_overlap.load(Ordering::SeqCst),
            0,
            "DDL must never overlap with other statements",
        );
    }

    #[test]
    fn test_backpressure_bound() {
        let connector = ScriptedConnector::new();
        let script = Arc::clone(&connector.script);
        let statements: Vec<String> = (0..300).map(|i| format!("SLOW q{i}")).collect();
        let stats = WorkloadExecutor::with_connector(connector, 2)
            .output(Box::new(io::sink()))
            .run(statements.into_iter())
            .unwrap();
        assert_eq!(stats.total, 300);
        assert!(stats.max_in_flight <= 20, "in flight {}", stats.max_in_flight);
        assert!(script.max_active.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_connect_failure_is_crash_outcome() {
        let mut connector = ScriptedConnector::new();
        connector.fail_connect = true;
        let stats = run_executor(connector, vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(stats.symbol_count(Symbol::Crash), 2);
        assert_eq!(stats.success, 0);
    }

    #[test]
    fn test_connection_loss_forces_reconnect() {
        let connector = ScriptedConnector::new();
        let script = Arc::clone(&connector.script);
        let stats = WorkloadExecutor::with_connector(connector, 1)
            .output(Box::new(io::sink()))
            .run(
                vec!["SELECT 1", "KILL it", "SELECT 2"]
                    .into_iter()
                    .map(str::to_owned),
            )
            .unwrap();
        assert_eq!(stats.success, 2);
        assert_eq!(stats.symbol_count(Symbol::Crash), 1);
        // one initial connect plus one after the loss
        assert_eq!(script.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_interrupt_stops_submission() {
        let connector = ScriptedConnector::new();
        let mut executor = WorkloadExecutor::with_connector(connector, 2)
            .output(Box::new(io::sink()));
        let flag = executor.interrupt_flag();
        let statements = (0..1000).map(move |i| {
            if i == 10 {
                flag.store(true, Ordering::Relaxed);
            }
            format!("SELECT {i}")
        });
        let stats = executor.run(statements).unwrap();
        assert!(stats.total <= 11, "total {}", stats.total);
        let symbol_sum: u64 = stats.symbols.values().sum();
        assert_eq!(symbol_sum, stats.total);
    }

    #[test]
    fn test_progress_stream_width() {
        #[derive(Clone, Default)]
        struct SharedBuf(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = SharedBuf::default();
        let connector = ScriptedConnector::new();
        let statements: Vec<String> = (0..200).map(|i| format!("SELECT {i}")).collect();
        WorkloadExecutor::with_connector(connector, 2)
            .output(Box::new(buffer.clone()))
            .run(statements.into_iter())
            .unwrap();
        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let dot_lines: Vec<&str> =
            output.lines().filter(|line| line.chars().all(|c| c == '.') && !line.is_empty()).collect();
        assert!(!dot_lines.is_empty());
        for line in dot_lines {
            assert!(line.len() <= LINE_WIDTH, "line too long: {}", line.len());
        }
        // final summary is delimited by a dash line
        assert!(output.contains(&"-".repeat(LINE_WIDTH)));
        assert!(output.contains("Unique shapes:"));
    }

    #[test]
    fn test_is_ddl() {
        assert!(is_ddl("CREATE TABLE t (id INTEGER)"));
        assert!(is_ddl("  alter table t add column x integer"));
        assert!(is_ddl("DROP TABLE t"));
        assert!(is_ddl("TRUNCATE t"));
        assert!(!is_ddl("SELECT * FROM created"));
        assert!(!is_ddl("INSERT INTO t VALUES (1)"));
    }
}
