//! Dialect fallback for requests that do not name a rego version.

use runtime::{CompilationRequest, CompileFailure, Compiled, Engine, Playground};
use syntax::Dialect;
use tracing::info;

/// Compile `request`. When it names no dialect and the default one fails
/// to parse, retry once under the previous dialect and keep that result if
/// it compiles. A request that names its dialect is never retried.
pub fn compile_with_fallback<E: Engine>(
    playground: &Playground<E>,
    request: &CompilationRequest,
) -> Result<Compiled<E::Modules>, CompileFailure> {
    let failure = match playground.compile(request) {
        Ok(compiled) => return Ok(compiled),
        Err(failure) => failure,
    };
    if request.dialect.is_some() || !failure.is_parse_error() {
        return Err(failure);
    }
    let Some(older) = Dialect::default().previous() else {
        return Err(failure);
    };

    let retry = request.clone().with_dialect(older);
    match playground.compile(&retry) {
        Ok(compiled) => {
            info!(version = older.version(), "compiled after falling back to older rego version");
            Ok(compiled)
        }
        Err(_) => Err(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0_POLICY: &str = "package play\n\nallow {\n\tinput.ok == true\n}";

    #[test]
    fn test_omitted_version_falls_back_to_v0() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow").with_module("play.rego", V0_POLICY);
        let compiled = compile_with_fallback(&playground, &request).unwrap();
        assert_eq!(compiled.result.graph.dialect(), Dialect::V0);
    }

    #[test]
    fn test_explicit_version_is_not_retried() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow")
            .with_module("play.rego", V0_POLICY)
            .with_dialect(Dialect::V1);
        assert!(compile_with_fallback(&playground, &request).is_err());
    }

    #[test]
    fn test_v1_policy_compiles_without_fallback() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow")
            .with_module("play.rego", "package play\n\nallow if input.ok");
        let compiled = compile_with_fallback(&playground, &request).unwrap();
        assert_eq!(compiled.result.graph.dialect(), Dialect::V1);
    }

    #[test]
    fn test_compile_stage_errors_are_not_retried() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow").with_module(
            "play.rego",
            "package play\n\nallow if http.send({\"url\": \"https://example.com\"})",
        );
        let failure = compile_with_fallback(&playground, &request).unwrap_err();
        assert!(!failure.is_parse_error());
    }

    #[test]
    fn test_original_failure_kept_when_retry_fails() {
        let playground = Playground::regorus();
        let request = CompilationRequest::new("allow").with_module("play.rego", "package play\n\nallow if {");
        let failure = compile_with_fallback(&playground, &request).unwrap_err();
        assert!(failure.is_parse_error());
    }
}
