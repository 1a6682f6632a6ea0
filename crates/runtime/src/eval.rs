//! Bounded evaluation of a compiled selection.

use crate::compile::CompileResult;
use crate::coverage::CoverageReport;
use crate::engine::{BuiltinErrorMode, Engine, EngineOutput, EvalRequest};
use crate::error::EvalError;
use crate::project::project;
use crate::types::{QueryResult, TraceEvent};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use syntax::{TokenKind, tokenize};
use tracing::{debug, instrument, warn};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Returned by `opa.runtime()` in place of real process information.
pub const RUNTIME_DISCLAIMER: &str =
    "This playground does not provide runtime information during policy execution.";

/// Diagnostics requested for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    pub trace: bool,
    pub coverage: bool,
    pub builtin_errors_all: bool,
    pub builtin_errors_strict: bool,
}

impl EvalOptions {
    /// Strict wins when both built-in error flags are set.
    pub fn builtin_error_mode(&self) -> BuiltinErrorMode {
        if self.builtin_errors_strict {
            BuiltinErrorMode::Strict
        } else if self.builtin_errors_all {
            BuiltinErrorMode::CollectAll
        } else {
            BuiltinErrorMode::Default
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalResult {
    pub results: Vec<QueryResult>,
    pub eval_time_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
    /// Captured `print` output, one line per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Evaluate `compiled` on a blocking thread, abandoning it after `deadline`.
#[instrument(skip_all, fields(query = %compiled.query.body, deadline = ?deadline))]
pub async fn evaluate<E: Engine>(
    engine: Arc<E>,
    compiled: &CompileResult<E::Modules>,
    options: EvalOptions,
    deadline: Duration,
) -> Result<EvalResult, EvalError> {
    let mode = options.builtin_error_mode();
    let now = Utc::now();
    let request = EvalRequest {
        query: compiled.query.text(),
        input: compiled.input.clone(),
        data: compiled.store.clone(),
        trace: options.trace,
        coverage: options.coverage,
        builtin_errors: mode,
        runtime: json!({ "message": RUNTIME_DISCLAIMER }),
        seed: now.timestamp_nanos_opt().unwrap_or_default().unsigned_abs(),
        now,
        deadline: Instant::now() + deadline,
    };
    let modules = Arc::clone(compiled.graph.compiled());

    let started = Instant::now();
    let task = tokio::task::spawn_blocking(move || engine.evaluate(&modules, request));
    let joined = match tokio::time::timeout(deadline, task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(?deadline, "evaluation exceeded deadline");
            return Err(EvalError::DeadlineExceeded(deadline));
        }
    };
    let eval_time_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

    let output = match joined {
        Ok(result) => result?,
        Err(err) if err.is_panic() => {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(EvalError::Panic(message));
        }
        Err(_) => return Err(EvalError::Cancelled),
    };
    debug!(results = output.results.len(), eval_time_ns, "evaluation finished");

    let EngineOutput {
        results,
        builtin_errors,
        trace,
        coverage,
        prints,
    } = output;

    if mode == BuiltinErrorMode::CollectAll && !builtin_errors.is_empty() {
        return Err(EvalError::BuiltinErrors(builtin_errors));
    }

    let results = results
        .into_iter()
        .map(|result| rename_bindings(result, &compiled.query.rewritten_vars))
        .collect();

    let output = (!prints.is_empty()).then(|| {
        prints
            .iter()
            .map(|p| format!("{p}\n"))
            .collect::<String>()
    });

    Ok(EvalResult {
        results: project(results, &compiled.synthetic),
        eval_time_ns,
        trace: options.trace.then_some(trace),
        coverage: if options.coverage { coverage } else { None },
        output,
    })
}

fn rename_bindings(result: QueryResult, rewritten: &BTreeMap<String, String>) -> QueryResult {
    let bindings: Map<String, Value> = result
        .bindings
        .into_iter()
        .map(|(name, value)| match rewritten.get(&name) {
            Some(original) => (original.clone(), value),
            None => (name, value),
        })
        .collect();
    let expressions = result
        .expressions
        .into_iter()
        .map(|mut expr| {
            expr.text = rename_text(&expr.text, rewritten);
            expr
        })
        .collect();
    QueryResult {
        expressions,
        bindings,
    }
}

/// Replace rewritten variable names in expression text, token by token.
fn rename_text(text: &str, rewritten: &BTreeMap<String, String>) -> String {
    if rewritten.is_empty() {
        return text.to_string();
    }
    let Ok(tokens) = tokenize("", text) else {
        return text.to_string();
    };
    let mut renamed = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Ident) {
        if let Some(original) = rewritten.get(&token.text) {
            renamed.push_str(&text[cursor..token.span.start]);
            renamed.push_str(original);
            cursor = token.span.end;
        }
    }
    renamed.push_str(&text[cursor..]);
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities;
    use crate::compile::compile;
    use crate::engine::EngineError;
    use crate::engine::scripted::{Reply, ScriptedEngine};
    use crate::request::CompilationRequest;
    use crate::types::{BuiltinError, PrintRecord};
    use syntax::{Location, Position};

    const POLICY: &str = "package play\n\ndefault hello := false\n\nhello if input.message == \"world\"";

    fn compiled(engine: &ScriptedEngine, query: &str) -> CompileResult<Vec<String>> {
        let request = CompilationRequest::new(query)
            .with_module("play.rego", POLICY)
            .with_input(json!({"message": "world"}));
        compile(engine, &request, capabilities()).unwrap().result
    }

    fn div_error(row: u32) -> BuiltinError {
        BuiltinError {
            name: "div".into(),
            message: "divide by zero".into(),
            location: Some(Location::new("play.rego", Position::new(row, 10))),
        }
    }

    #[test]
    fn test_strict_wins_over_collect_all() {
        let options = EvalOptions {
            builtin_errors_all: true,
            builtin_errors_strict: true,
            ..EvalOptions::default()
        };
        assert_eq!(options.builtin_error_mode(), BuiltinErrorMode::Strict);
        let options = EvalOptions {
            builtin_errors_all: true,
            ..EvalOptions::default()
        };
        assert_eq!(options.builtin_error_mode(), BuiltinErrorMode::CollectAll);
    }

    #[tokio::test]
    async fn test_request_carries_query_input_and_runtime() {
        let engine = Arc::new(ScriptedEngine::new());
        let compiled = compiled(&engine, "hello");
        evaluate(Arc::clone(&engine), &compiled, EvalOptions::default(), DEFAULT_DEADLINE)
            .await
            .unwrap();
        let requests = engine.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "data.play.hello");
        assert_eq!(requests[0].input, Some(json!({"message": "world"})));
        assert_eq!(requests[0].runtime["message"], RUNTIME_DISCLAIMER);
        assert_eq!(requests[0].builtin_errors, BuiltinErrorMode::Default);
    }

    #[tokio::test]
    async fn test_bindings_are_renamed_and_projected() {
        let output = EngineOutput {
            results: vec![
                QueryResult::default()
                    .with_binding("__local0__", json!([true]))
                    .with_binding("__local2__", json!(3)),
            ],
            ..EngineOutput::default()
        };
        let engine = Arc::new(ScriptedEngine::new().reply(Reply::Output(output)));
        let compiled = compiled(&engine, "hello if input.message == \"world\"\ny := 3");
        let result = evaluate(engine, &compiled, EvalOptions::default(), DEFAULT_DEADLINE)
            .await
            .unwrap();
        let bindings = &result.results[0].bindings;
        assert_eq!(bindings["hello"], json!(true));
        assert_eq!(bindings["y"], json!(3));
    }

    #[test]
    fn test_expression_text_uses_written_names() {
        let rewritten = BTreeMap::from([
            ("__local0__".to_string(), "x".to_string()),
            ("__local1__".to_string(), "y".to_string()),
        ]);
        let result = QueryResult {
            expressions: vec![crate::types::ExpressionValue {
                value: json!(true),
                text: "__local0__ := {__local1__ | __local1__ := data.p.__local0__x}".into(),
                location: None,
            }],
            bindings: Map::new(),
        };
        let renamed = rename_bindings(result, &rewritten);
        assert_eq!(
            renamed.expressions[0].text,
            "x := {y | y := data.p.__local0__x}"
        );
    }

    #[tokio::test]
    async fn test_collect_all_reports_every_builtin_error() {
        let output = EngineOutput {
            builtin_errors: vec![div_error(5), div_error(7)],
            ..EngineOutput::default()
        };
        let engine = Arc::new(ScriptedEngine::new().reply(Reply::Output(output)));
        let compiled = compiled(&engine, "hello");
        let options = EvalOptions {
            builtin_errors_all: true,
            ..EvalOptions::default()
        };
        let err = evaluate(engine, &compiled, options, DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "2 errors occurred:\nplay.rego:5: eval_builtin_error: div: divide by zero\nplay.rego:7: eval_builtin_error: div: divide by zero"
        );
    }

    #[tokio::test]
    async fn test_first_builtin_error_aborts_by_default() {
        let engine = Arc::new(
            ScriptedEngine::new().reply(Reply::Error(EngineError::Builtin(div_error(5)))),
        );
        let compiled = compiled(&engine, "hello");
        let err = evaluate(engine, &compiled, EvalOptions::default(), DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Builtin(_)));
    }

    #[tokio::test]
    async fn test_deadline_is_enforced() {
        let engine = Arc::new(
            ScriptedEngine::new().reply(Reply::Sleep(Duration::from_millis(500))),
        );
        let compiled = compiled(&engine, "hello");
        let err = evaluate(
            engine,
            &compiled,
            EvalOptions::default(),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EvalError::DeadlineExceeded(_)));
        assert!(crate::error::classify(err).is_internal());
    }

    #[tokio::test]
    async fn test_engine_panic_is_internal() {
        let engine = Arc::new(ScriptedEngine::new().reply(Reply::Panic("engine exploded")));
        let compiled = compiled(&engine, "hello");
        let err = evaluate(engine, &compiled, EvalOptions::default(), DEFAULT_DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "evaluation aborted: engine exploded");
        assert!(crate::error::classify(err).is_internal());
    }

    #[tokio::test]
    async fn test_diagnostics_only_when_requested() {
        let output = EngineOutput {
            trace: vec![TraceEvent::new(crate::types::TraceOp::Enter, 0, "q")],
            coverage: Some(CoverageReport::default()),
            prints: vec![PrintRecord {
                location: Some(Location::new("play.rego", Position::new(4, 1))),
                message: "hi".into(),
            }],
            ..EngineOutput::default()
        };
        let engine = Arc::new(
            ScriptedEngine::new()
                .reply(Reply::Output(output.clone()))
                .reply(Reply::Output(output)),
        );
        let compiled = compiled(&engine, "hello");

        let plain = evaluate(Arc::clone(&engine), &compiled, EvalOptions::default(), DEFAULT_DEADLINE)
            .await
            .unwrap();
        assert!(plain.trace.is_none());
        assert!(plain.coverage.is_none());
        assert_eq!(plain.output.as_deref(), Some("play.rego:4: hi\n"));

        let options = EvalOptions {
            trace: true,
            coverage: true,
            ..EvalOptions::default()
        };
        let full = evaluate(engine, &compiled, options, DEFAULT_DEADLINE)
            .await
            .unwrap();
        assert_eq!(full.trace.unwrap().len(), 1);
        assert!(full.coverage.is_some());
    }
}
