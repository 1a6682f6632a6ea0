//! The playground facade.

use crate::compile::{self, CompileFailure, CompileResult, Compiled};
use crate::engine::{Engine, RegorusEngine};
use crate::error::{ClassifiedError, classify};
use crate::eval::{self, DEFAULT_DEADLINE, EvalOptions, EvalResult};
use crate::request::CompilationRequest;
use crate::vars;
use capability::{CapabilitySet, capabilities};
use std::sync::Arc;
use std::time::Duration;
use syntax::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Wall-clock limit for one evaluation.
    pub deadline: Duration,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Compiles selections against module sets and evaluates them. Cheap to
/// share: wrap it in an `Arc` and call it from any task.
pub struct Playground<E: Engine> {
    engine: Arc<E>,
    config: EvalConfig,
    capabilities: &'static CapabilitySet,
}

impl<E: Engine> Playground<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            config: EvalConfig::default(),
            capabilities: capabilities(),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn compile(
        &self,
        request: &CompilationRequest,
    ) -> Result<Compiled<E::Modules>, CompileFailure> {
        compile::compile(self.engine.as_ref(), request, self.capabilities)
    }

    pub async fn evaluate(
        &self,
        compiled: &CompileResult<E::Modules>,
        options: EvalOptions,
    ) -> Result<EvalResult, ClassifiedError> {
        eval::evaluate(
            Arc::clone(&self.engine),
            compiled,
            options,
            self.config.deadline,
        )
        .await
        .map_err(classify)
    }

    /// Variables bound by `selection` when run against `module`.
    pub fn resolve_selection_vars(
        &self,
        module: &str,
        selection: &str,
        dialect: Option<Dialect>,
    ) -> Result<Vec<String>, ClassifiedError> {
        vars::resolve_vars(
            self.engine.as_ref(),
            module,
            selection,
            dialect.unwrap_or_default(),
        )
        .map_err(classify)
    }
}

impl Playground<RegorusEngine> {
    /// A playground backed by `regorus`.
    pub fn regorus() -> Self {
        Self::new(RegorusEngine::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use serde_json::json;

    const POLICY: &str = "package play\n\ndefault hello := false\n\nhello if input.message == \"world\"";

    #[tokio::test]
    async fn test_rule_selection_end_to_end() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("hello if input.message == \"world\"")
            .with_module("play.rego", POLICY)
            .with_input(json!({"message": "world"}));
        let compiled = playground.compile(&request).unwrap();
        assert!(compiled.diagnostics.is_empty());
        let result = playground
            .evaluate(&compiled.result, EvalOptions::default())
            .await
            .unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].bindings["hello"], json!(true));
    }

    #[tokio::test]
    async fn test_package_query_end_to_end() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("").with_module("play.rego", POLICY);
        let compiled = playground.compile(&request).unwrap();
        let result = playground
            .evaluate(&compiled.result, EvalOptions::default())
            .await
            .unwrap();
        assert_eq!(
            result.results[0].expressions[0].value,
            json!({"hello": false})
        );
    }

    #[test]
    fn test_unsafe_module_is_bad_request() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("x").with_module(
            "play.rego",
            "package play\n\nx := http.send({\"method\": \"get\", \"url\": \"https://example.com\"})",
        );
        let failure = playground.compile(&request).unwrap_err();
        assert!(!failure.is_parse_error());
        assert_eq!(classify(failure.error).class, ErrorClass::BadRequest);
    }

    #[test]
    fn test_substituted_unsafe_builtin_is_rejected() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow").with_module(
            "play.rego",
            "package play\n\nallow if {\n\ttime.now_ns() > 0 with time.now_ns as http.send\n}",
        );
        let failure = playground.compile(&request).unwrap_err();
        assert!(!failure.is_parse_error());
        let classified = classify(failure.error);
        assert_eq!(classified.class, ErrorClass::BadRequest);
        assert!(
            classified
                .to_string()
                .contains("unsafe built-in function calls in expression: http.send")
        );
    }

    #[tokio::test]
    async fn test_runtime_reports_disclaimer() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("here := opa.runtime()\nfrom_rule := data.play.rt")
            .with_module("play.rego", "package play\n\nrt := opa.runtime()");
        let compiled = playground.compile(&request).unwrap();
        let result = playground
            .evaluate(&compiled.result, EvalOptions::default())
            .await
            .unwrap();
        let expected = json!({ "message": crate::RUNTIME_DISCLAIMER });
        assert_eq!(result.results[0].bindings["here"], expected);
        assert_eq!(result.results[0].bindings["from_rule"], expected);
    }

    #[tokio::test]
    async fn test_collect_all_lists_failing_rules_in_order() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("x := data.play")
            .with_module("play.rego", "package play\n\na := 1 / 0\n\nb := 2 / 0\n\nc := 3");
        let compiled = playground.compile(&request).unwrap();
        let options = EvalOptions {
            builtin_errors_all: true,
            ..EvalOptions::default()
        };
        let err = playground
            .evaluate(&compiled.result, options)
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::BadRequest);
        let crate::Error::Eval(crate::EvalError::BuiltinErrors(errors)) = err.source else {
            panic!("expected every built-in error");
        };
        let rows: Vec<u32> = errors
            .iter()
            .map(|e| e.location.as_ref().unwrap().row)
            .collect();
        assert_eq!(rows, [3, 5]);
        assert!(errors.iter().all(|e| e.name == "div"));
    }

    #[tokio::test]
    async fn test_rand_intn_is_seeded_per_evaluation() {
        let playground = Playground::regorus();
        // A negative bound is undefined for the stock built-in.
        let request = CompilationRequest::new(
            "a := rand.intn(\"k\", -5)\nb := rand.intn(\"k\", -5)\nc := rand.intn(\"z\", 0)",
        )
        .with_module("play.rego", POLICY);
        let compiled = playground.compile(&request).unwrap();
        let result = playground
            .evaluate(&compiled.result, EvalOptions::default())
            .await
            .unwrap();
        let bindings = &result.results[0].bindings;
        let a = bindings["a"].as_i64().unwrap();
        assert!((0..5).contains(&a));
        assert_eq!(bindings["b"], json!(a));
        assert_eq!(bindings["c"], json!(0));
    }

    #[test]
    fn test_resolve_selection_vars() {
        let playground = Playground::regorus();
        let vars = playground
            .resolve_selection_vars(POLICY, "msg := input.message\nmsg == \"world\"", None)
            .unwrap();
        assert_eq!(vars, ["msg"]);
    }

    #[test]
    fn test_playground_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Playground<RegorusEngine>>();
    }
}
