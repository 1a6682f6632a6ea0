//! `regorus` backend.
//!
//! Every evaluation loads the modules into a fresh interpreter with strict
//! built-in errors. A failure is classified by running the query again with
//! lenient built-ins: if that succeeds, a built-in raised it. Collect-all
//! mode then evaluates each rule the query reaches in its own strict
//! interpreter and gathers every built-in failure in source order.

use super::{
    BuiltinErrorMode, CompileOptions, Engine, EngineError, EngineOutput, EvalRequest,
    ModuleSource,
};
use crate::coverage::CoverageReport;
use crate::error::CompileError;
use crate::types::{
    BuiltinError, ExpressionValue, PrintRecord, QueryResult, TraceEvent, TraceOp,
};
use capability::capabilities;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use syntax::{
    Dialect, Location, Module, ParserOptions, Position, Report, TokenKind, refs, tokenize,
};
use tracing::{debug, warn};

/// Prepended to generated `__name__` variables while regorus runs, so that
/// their bindings are reported like any user variable.
const ALIAS_PREFIX: &str = "rp";

/// File name regorus reports for locations inside the query itself.
const QUERY_FILE: &str = "<query.rego>";

/// Messages passed to `trace`, shared with the extension that records them.
type Notes = Arc<Mutex<Vec<String>>>;

/// Modules accepted by [`RegorusEngine::compile`].
///
/// `regorus` interpreters are not shareable across threads, so the sources
/// are kept and loaded into a fresh interpreter for every evaluation.
#[derive(Debug, Clone)]
pub struct RegorusModules {
    sources: Vec<(String, String)>,
    /// Paths of every non-function rule, in source order.
    rules: Vec<String>,
    dialect: Dialect,
}

impl RegorusModules {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Rule paths such as `data.play.allow`.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    fn file_index(&self, file: &str) -> usize {
        self.sources
            .iter()
            .position(|(name, _)| name == file)
            .unwrap_or(usize::MAX)
    }

    fn load(&self) -> anyhow::Result<regorus::Engine> {
        let mut engine = regorus::Engine::new();
        engine.set_rego_v0(self.dialect == Dialect::V0);
        for (name, text) in &self.sources {
            engine.add_policy(name.clone(), text.clone())?;
        }
        Ok(engine)
    }
}

/// Engine backed by the `regorus` interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegorusEngine;

impl RegorusEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for RegorusEngine {
    type Modules = RegorusModules;

    fn compile(
        &self,
        modules: &[ModuleSource<'_>],
        options: CompileOptions<'_>,
    ) -> Result<RegorusModules, CompileError> {
        let mut rules: Vec<String> = Vec::new();
        for source in modules {
            let Ok(module) = Module::parse(source.name, source.text, options.dialect) else {
                continue;
            };
            for rule in module.rules.iter().filter(|r| !r.is_function()) {
                let path = module.package.path.child(&rule.name).to_string();
                if !rules.contains(&path) {
                    rules.push(path);
                }
            }
        }
        let compiled = RegorusModules {
            sources: modules
                .iter()
                .map(|m| (m.name.to_string(), m.text.to_string()))
                .collect(),
            rules,
            dialect: options.dialect,
        };
        compiled
            .load()
            .map_err(|err| CompileError::Parse(syntax::Error::parse(err.to_string()).into()))?;
        debug!(modules = compiled.len(), "regorus accepted modules");
        Ok(compiled)
    }

    fn evaluate(
        &self,
        modules: &RegorusModules,
        request: EvalRequest,
    ) -> Result<EngineOutput, EngineError> {
        let (query, aliases) = alias_generated(&request.query);
        let restore = |results: Vec<QueryResult>| -> Vec<QueryResult> {
            results
                .into_iter()
                .map(|result| restore_aliases(result, &aliases))
                .collect()
        };

        let mut strict = Interpreter::prepare(modules, &request, true)?;
        let failure = match strict.query(&query, request.trace) {
            Ok(results) => return strict.finish(&request, restore(results)),
            Err(err) => err.to_string(),
        };
        check_deadline(&request)?;

        let mut lenient = Interpreter::prepare(modules, &request, false)?;
        let results = match lenient.query(&query, request.trace) {
            Ok(results) => results,
            Err(_) => {
                check_deadline(&request)?;
                return Err(EngineError::Eval(failure));
            }
        };
        let first = builtin_error(&failure);
        if request.builtin_errors != BuiltinErrorMode::CollectAll {
            return Err(EngineError::Builtin(first));
        }

        let mut output = lenient.finish(&request, restore(results))?;
        output.builtin_errors = collect_builtin_errors(modules, &request, first)?;
        debug!(errors = output.builtin_errors.len(), "collected built-in errors");
        Ok(output)
    }
}

/// One prepared interpreter and the `trace` notes it gathers.
struct Interpreter {
    engine: regorus::Engine,
    notes: Notes,
}

impl Interpreter {
    fn prepare(
        modules: &RegorusModules,
        request: &EvalRequest,
        strict: bool,
    ) -> Result<Self, EngineError> {
        check_deadline(request)?;
        let mut engine = modules
            .load()
            .map_err(|err| EngineError::Internal(err.to_string()))?;

        if let Some(data) = &request.data {
            let data = to_regorus(&Value::Object(data.clone()))?;
            engine
                .add_data(data)
                .map_err(|err| EngineError::Eval(err.to_string()))?;
        }
        if let Some(input) = &request.input {
            engine.set_input(to_regorus(input)?);
        }

        engine.set_strict_builtin_errors(strict);
        engine.set_gather_prints(true);
        engine.set_enable_coverage(request.coverage);
        let notes = Notes::default();
        install_extensions(&mut engine, request, &notes);
        Ok(Self { engine, notes })
    }

    fn query(&mut self, query: &str, trace: bool) -> anyhow::Result<Vec<QueryResult>> {
        let results = self.engine.eval_query(query.to_string(), trace)?;
        Ok(convert_results(serde_json::to_value(&results)?))
    }

    fn finish(
        mut self,
        request: &EvalRequest,
        results: Vec<QueryResult>,
    ) -> Result<EngineOutput, EngineError> {
        let mut output = EngineOutput {
            results,
            ..EngineOutput::default()
        };

        if request.trace {
            let notes = self
                .notes
                .lock()
                .map(|mut notes| std::mem::take(&mut *notes))
                .unwrap_or_default();
            output.trace = notes
                .into_iter()
                .map(|note| TraceEvent::new(TraceOp::Note, 0, note))
                .collect();
        }

        match self.engine.take_prints() {
            Ok(lines) => output.prints = lines.iter().map(|line| parse_print(line)).collect(),
            Err(err) => warn!(error = %err, "failed to collect print output"),
        }

        if request.coverage {
            let report = self
                .engine
                .get_coverage_report()
                .map_err(|err| EngineError::Internal(err.to_string()))?;
            output.coverage = Some(CoverageReport::from_files(
                report
                    .files
                    .into_iter()
                    .map(|file| (file.path, file.covered, file.not_covered)),
            ));
        }

        Ok(output)
    }
}

fn check_deadline(request: &EvalRequest) -> Result<(), EngineError> {
    if Instant::now() >= request.deadline {
        return Err(EngineError::Cancelled);
    }
    Ok(())
}

/// Evaluate every rule the query reaches, each in its own strict
/// interpreter, and gather the built-in failures. Module failures come in
/// module then row order; failures inside the query itself come last.
fn collect_builtin_errors(
    modules: &RegorusModules,
    request: &EvalRequest,
    first: BuiltinError,
) -> Result<Vec<BuiltinError>, EngineError> {
    let mut errors = vec![first];
    for path in reached_rules(modules, &request.query) {
        let mut strict = Interpreter::prepare(modules, request, true)?;
        let Err(err) = strict.engine.eval_rule(path.to_string()) else {
            continue;
        };
        let failure = err.to_string();
        let mut lenient = Interpreter::prepare(modules, request, false)?;
        if lenient.engine.eval_rule(path.to_string()).is_err() {
            debug!(rule = path, error = %failure, "rule fails without built-in errors too");
            continue;
        }
        let error = builtin_error(&failure);
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    errors.sort_by_key(|error| match &error.location {
        Some(location) => (0, modules.file_index(&location.file), location.row, location.col),
        None => (1, usize::MAX, 0, 0),
    });
    Ok(errors)
}

/// Rules under any `data` reference of `query`, or above it.
fn reached_rules<'a>(modules: &'a RegorusModules, query: &str) -> Vec<&'a str> {
    let Ok(tokens) = tokenize("", query) else {
        return Vec::new();
    };
    let options = ParserOptions::new(modules.dialect);
    let roots: Vec<String> = refs(&tokens, &options)
        .map(|r| r.name)
        .filter(|name| name == "data" || name.starts_with("data."))
        .collect();
    modules
        .rules
        .iter()
        .map(String::as_str)
        .filter(|rule| roots.iter().any(|root| nested(root, rule) || nested(rule, root)))
        .collect()
}

/// Whether dotted path `inner` equals `outer` or lies below it.
fn nested(outer: &str, inner: &str) -> bool {
    inner
        .strip_prefix(outer)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

fn builtin_error(text: &str) -> BuiltinError {
    let report = Report::parse(text);
    let location = match (&report.file, report.position) {
        (Some(file), Some(position)) if file != QUERY_FILE => {
            Some(Location::new(file.as_str(), position))
        }
        _ => None,
    };
    BuiltinError {
        name: builtin_name(text, &report.message),
        message: report.message,
        location,
    }
}

/// The failing built-in, spelled as in the capability catalog.
fn builtin_name(text: &str, message: &str) -> String {
    let named = match message {
        "divide by zero" => Some("div".to_string()),
        "modulo by zero" | "modulo on floating-point number" => Some("rem".to_string()),
        _ => message
            .strip_prefix('`')
            .and_then(|rest| rest.split_once('`'))
            .map(|(name, _)| operator_name(name).to_string()),
    };
    named
        .or_else(|| Report::pointed_identifier(text))
        .filter(|name| capabilities().contains(name))
        .unwrap_or_else(|| "unknown".to_string())
}

/// regorus names arithmetic operators after their enum variants.
fn operator_name(name: &str) -> &str {
    match name {
        "add" => "plus",
        "sub" => "minus",
        "mod" => "rem",
        other => other,
    }
}

/// Rewrite every generated identifier in `query` to its alias. Returns the
/// rewritten text and the alias to original name table.
fn alias_generated(query: &str) -> (String, BTreeMap<String, String>) {
    let Ok(tokens) = tokenize("", query) else {
        return (query.to_string(), BTreeMap::new());
    };
    let mut aliases = BTreeMap::new();
    let mut text = String::with_capacity(query.len());
    let mut last = 0;
    for token in tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Ident && is_generated(&t.text))
    {
        let alias = format!("{ALIAS_PREFIX}{}", token.text);
        text.push_str(&query[last..token.span.start]);
        text.push_str(&alias);
        last = token.span.end;
        aliases.insert(alias, token.text.clone());
    }
    text.push_str(&query[last..]);
    (text, aliases)
}

fn is_generated(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn restore_aliases(result: QueryResult, aliases: &BTreeMap<String, String>) -> QueryResult {
    if aliases.is_empty() {
        return result;
    }
    let bindings = result
        .bindings
        .into_iter()
        .map(|(name, value)| match aliases.get(&name) {
            Some(original) => (original.clone(), value),
            None => (name, value),
        })
        .collect();
    let expressions = result
        .expressions
        .into_iter()
        .map(|mut expr| {
            for (alias, original) in aliases {
                expr.text = expr.text.replace(alias.as_str(), original);
            }
            expr
        })
        .collect();
    QueryResult {
        expressions,
        bindings,
    }
}

fn to_regorus(value: &Value) -> Result<regorus::Value, EngineError> {
    regorus::Value::from_json_str(&value.to_string())
        .map_err(|err| EngineError::Internal(err.to_string()))
}

fn install_extensions(engine: &mut regorus::Engine, request: &EvalRequest, notes: &Notes) {
    let deadline = request.deadline;

    let runtime = request.runtime.to_string();
    add_extension(engine, "opa.runtime", 0, move |_| {
        still_running(deadline)?;
        regorus::Value::from_json_str(&runtime)
    });

    let now = request.now.timestamp_nanos_opt().unwrap_or_default();
    add_extension(engine, "time.now_ns", 0, move |_| {
        still_running(deadline)?;
        Ok(regorus::Value::from(now))
    });

    let rng = Arc::new(Mutex::new(SeededInts::new(request.seed)));
    add_extension(engine, "rand.intn", 2, move |args| {
        still_running(deadline)?;
        let [key, n] = args.as_slice() else {
            anyhow::bail!("rand.intn: expected 2 arguments");
        };
        let key = key.as_string()?.to_string();
        let n = n.as_i64()?;
        let mut rng = rng
            .lock()
            .map_err(|_| anyhow::anyhow!("rand.intn: generator poisoned"))?;
        Ok(regorus::Value::from(rng.intn(key, n)))
    });

    // regorus keeps `trace` messages to itself; record them here instead.
    if request.trace {
        let notes = Arc::clone(notes);
        add_extension(engine, "trace", 1, move |args| {
            still_running(deadline)?;
            let [message] = args.as_slice() else {
                anyhow::bail!("trace: expected 1 argument");
            };
            let message = message.as_string()?.to_string();
            notes
                .lock()
                .map_err(|_| anyhow::anyhow!("trace: notes poisoned"))?
                .push(message);
            Ok(regorus::Value::from(true))
        });
    }
}

fn add_extension<F>(engine: &mut regorus::Engine, name: &str, nargs: u8, extension: F)
where
    F: FnMut(Vec<regorus::Value>) -> anyhow::Result<regorus::Value> + Clone + Send + Sync + 'static,
{
    if let Err(err) = engine.add_extension(name.to_string(), nargs, Box::new(extension)) {
        warn!(extension = name, error = %err, "could not install extension");
    }
}

/// Extensions are the only hook into a running evaluation, so they are
/// where an evaluation past its deadline stops.
fn still_running(deadline: Instant) -> anyhow::Result<()> {
    if Instant::now() >= deadline {
        anyhow::bail!("evaluation deadline exceeded");
    }
    Ok(())
}

/// `rand.intn` state: one seeded generator and a cache so that repeated
/// calls with the same arguments agree within an evaluation.
struct SeededInts {
    rng: StdRng,
    cache: HashMap<(String, i64), i64>,
}

impl SeededInts {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cache: HashMap::new(),
        }
    }

    fn intn(&mut self, key: String, n: i64) -> i64 {
        if n == 0 {
            return 0;
        }
        let bound = n.saturating_abs();
        let rng = &mut self.rng;
        *self
            .cache
            .entry((key, n))
            .or_insert_with(|| rng.random_range(0..bound))
    }
}

fn convert_results(value: Value) -> Vec<QueryResult> {
    let rows = match value {
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        Value::Array(rows) => rows,
        _ => Vec::new(),
    };
    rows.into_iter().map(convert_result).collect()
}

fn convert_result(row: Value) -> QueryResult {
    let Value::Object(mut row) = row else {
        return QueryResult::default();
    };
    let bindings = match row.remove("bindings") {
        Some(Value::Object(bindings)) => bindings,
        _ => serde_json::Map::new(),
    };
    let expressions = match row.remove("expressions") {
        Some(Value::Array(exprs)) => exprs.into_iter().map(convert_expression).collect(),
        _ => Vec::new(),
    };
    QueryResult {
        expressions,
        bindings,
    }
}

fn convert_expression(expr: Value) -> ExpressionValue {
    let location = expr.get("location").and_then(|loc| {
        let row = loc.get("row")?.as_u64()?;
        let col = loc.get("col")?.as_u64()?;
        Some(Position::new(
            u32::try_from(row).ok()?,
            u32::try_from(col).ok()?,
        ))
    });
    ExpressionValue {
        value: expr.get("value").cloned().unwrap_or(Value::Null),
        text: expr
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        location,
    }
}

/// Split `file:row: message` print lines.
fn parse_print(line: &str) -> PrintRecord {
    let located = line.split_once(": ").and_then(|(prefix, message)| {
        let (file, row) = prefix.rsplit_once(':')?;
        let row: u32 = row.parse().ok()?;
        Some(PrintRecord {
            location: Some(Location::new(file, Position::new(row, 1))),
            message: message.to_string(),
        })
    });
    located.unwrap_or_else(|| PrintRecord {
        location: None,
        message: line.to_string(),
    })
}
