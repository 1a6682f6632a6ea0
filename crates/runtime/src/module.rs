//! Module compilation.
//!
//! Modules are handed to the engine as one unit, outlined, then run through
//! the late checks: the network safety guard, the capability scan and, in
//! strict mode, the strict checks. Any stage that reports errors stops the
//! compile.

use crate::engine::{CompileOptions, Engine, ModuleSource};
use crate::error::CompileError;
use crate::strict;
use capability::{CapabilitySet, SafetyGuard, Scope, capabilities, undefined_calls};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use syntax::{Dialect, Errors, Module, Path, Rule};
use tracing::{debug, instrument};

/// An immutable, compiled module set.
#[derive(Debug)]
pub struct ModuleGraph<M> {
    modules: Vec<Module>,
    compiled: Arc<M>,
    dialect: Dialect,
}

impl<M> Clone for ModuleGraph<M> {
    fn clone(&self) -> Self {
        Self {
            modules: self.modules.clone(),
            compiled: Arc::clone(&self.compiled),
            dialect: self.dialect,
        }
    }
}

impl<M> ModuleGraph<M> {
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The module, when the set holds exactly one.
    pub fn sole_module(&self) -> Option<&Module> {
        match self.modules.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// First module by name.
    pub fn first_module(&self) -> Option<&Module> {
        self.modules.first()
    }

    /// Every rule declared under `package` across all modules.
    pub fn rules_in<'a>(&'a self, package: &'a Path) -> impl Iterator<Item = &'a Rule> + 'a {
        self.modules
            .iter()
            .filter(move |m| &m.package.path == package)
            .flat_map(|m| m.rules.iter())
    }

    pub fn compiled(&self) -> &Arc<M> {
        &self.compiled
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

pub struct ModuleCompiler<'a, E: Engine> {
    engine: &'a E,
    dialect: Dialect,
    strict: bool,
    capabilities: &'a CapabilitySet,
}

impl<'a, E: Engine> ModuleCompiler<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            dialect: Dialect::default(),
            strict: false,
            capabilities: capabilities(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_capabilities(mut self, capabilities: &'a CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[instrument(skip_all, fields(modules = sources.len(), dialect = self.dialect.version(), strict = self.strict))]
    pub fn compile(
        &self,
        sources: &BTreeMap<String, String>,
    ) -> Result<ModuleGraph<E::Modules>, CompileError> {
        let handles: Vec<ModuleSource<'_>> = sources
            .iter()
            .map(|(name, text)| ModuleSource { name, text })
            .collect();
        let compiled = self.engine.compile(
            &handles,
            CompileOptions {
                dialect: self.dialect,
                strict: self.strict,
                capabilities: self.capabilities,
            },
        )?;
        debug!("engine accepted modules");

        let mut modules = Vec::with_capacity(sources.len());
        let mut errors = Errors::new();
        for (name, text) in sources {
            match Module::parse(name, text, self.dialect) {
                Ok(module) => modules.push(module),
                Err(errs) => errors.extend(errs),
            }
        }
        errors.into_result().map_err(CompileError::Parse)?;

        self.late_stage(&modules, |module, scope| {
            let mut errors = Errors::new();
            for rule in &module.rules {
                for violation in SafetyGuard::check(module.rule_tokens(rule), scope) {
                    errors.push(violation.to_error(&module.name));
                }
            }
            errors
        })?;

        self.late_stage(&modules, |module, scope| {
            let mut errors = Errors::new();
            for rule in &module.rules {
                for violation in undefined_calls(module.rule_tokens(rule), scope, self.capabilities)
                {
                    errors.push(violation.to_error(&module.name));
                }
            }
            errors
        })?;

        if self.strict {
            self.late_stage(&modules, strict::check)?;
        }

        Ok(ModuleGraph {
            modules,
            compiled: Arc::new(compiled),
            dialect: self.dialect,
        })
    }

    fn late_stage<F>(&self, modules: &[Module], check: F) -> Result<(), CompileError>
    where
        F: Fn(&Module, Scope<'_>) -> Errors,
    {
        let mut errors = Errors::new();
        for module in modules {
            let options = module.parser_options();
            let locals = local_names(modules, module);
            errors.extend(check(module, Scope::new(&options, &locals)));
        }
        errors.into_result().map_err(CompileError::Compile)
    }
}

/// Names that resolve inside `module` before any built-in: the rules of its
/// package and the names its imports bind.
fn local_names(modules: &[Module], module: &Module) -> BTreeSet<String> {
    let mut locals: BTreeSet<String> = modules
        .iter()
        .filter(|m| m.package.path == module.package.path)
        .flat_map(|m| m.rules.iter().map(|r| r.name.clone()))
        .collect();
    locals.extend(
        module
            .imports
            .iter()
            .filter(|i| !i.is_keyword_import())
            .map(|i| i.local_name().to_string()),
    );
    locals
}
