//! Shared test fixtures
//!
//! `probe` builds an expression around a closure with an evaluation counter,
//! which is how the tests observe exactly which expressions the engine
//! touches. `TableCompiler` is a registry-backed `ExpressionCompiler` so
//! loader tests can feed declarative JSON without a real expression parser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use dimensional::core::error::{DimensionalError, Result};
use dimensional::expr::{Bindings, Expression, ExpressionCompiler};

struct Probe<F> {
    vars: Vec<String>,
    f: F,
    count: Arc<AtomicUsize>,
}

impl<F: Fn(&Bindings) -> f64 + Send + Sync> Expression for Probe<F> {
    fn evaluate(&self, bindings: &Bindings) -> Result<f64> {
        for var in &self.vars {
            if !bindings.contains_key(var) {
                return Err(DimensionalError::MissingBinding(var.clone()));
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok((self.f)(bindings))
    }

    fn free_variables(&self) -> &[String] {
        &self.vars
    }
}

/// Build a counting expression over the named free variables
pub fn probe<F>(vars: &[&str], f: F) -> (Arc<dyn Expression>, Arc<AtomicUsize>)
where
    F: Fn(&Bindings) -> f64 + Send + Sync + 'static,
{
    let count = Arc::new(AtomicUsize::new(0));
    let expr = Arc::new(Probe {
        vars: vars.iter().map(|v| v.to_string()).collect(),
        f,
        count: count.clone(),
    });
    (expr, count)
}

/// Compiler mapping pre-registered source strings to expressions
pub struct TableCompiler {
    table: AHashMap<String, Arc<dyn Expression>>,
}

impl TableCompiler {
    pub fn new() -> Self {
        Self {
            table: AHashMap::new(),
        }
    }

    pub fn register(&mut self, source: &str, expr: Arc<dyn Expression>) -> &mut Self {
        self.table.insert(source.to_string(), expr);
        self
    }
}

impl ExpressionCompiler for TableCompiler {
    fn compile(&self, source: &str) -> Result<Arc<dyn Expression>> {
        self.table
            .get(source)
            .cloned()
            .ok_or_else(|| DimensionalError::ExpressionCompile(source.to_string()))
    }
}
