//! Boolean conditions over structured parameter trees.
//!
//! Conditions are Jinja expressions (`ExitCode != 0`,
//! `Comment.HasMeta and Comment.Meta.TemplateKey == "default"`) evaluated by
//! truthiness. Compilation and evaluation are split so a condition is parsed
//! once and replayed against many candidates.

use minijinja::{Environment, Expression};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CommentError, ConditionEvalError, ConditionSyntaxError};

/// A compiled condition.
pub trait Program {
    /// Evaluate against one parameter tree.
    fn run(&self, params: &Value) -> Result<bool, ConditionEvalError>;
}

/// Compiles condition expressions into [`Program`]s.
pub trait ConditionEngine: Send + Sync {
    fn compile<'a>(&'a self, expression: &str)
        -> Result<Box<dyn Program + 'a>, ConditionSyntaxError>;
}

/// Serialize a typed parameter record into the tree conditions see.
pub fn params_tree<T: Serialize>(params: &T) -> Result<Value, ConditionEvalError> {
    serde_json::to_value(params).map_err(|e| ConditionEvalError(e.to_string()))
}

/// Compile `expression` and evaluate it once.
///
/// Both failure kinds are fatal here: this is used for rule guards, where a
/// broken expression is a configuration defect.
pub fn matches<T: Serialize>(
    engine: &dyn ConditionEngine,
    expression: &str,
    params: &T,
) -> Result<bool, CommentError> {
    let program = engine.compile(expression)?;
    params_tree(params)
        .and_then(|tree| program.run(&tree))
        .map_err(|source| CommentError::GuardEval {
            expression: expression.to_string(),
            source,
        })
}

fn syntax_error(expression: &str, message: String) -> ConditionSyntaxError {
    ConditionSyntaxError {
        expression: expression.to_string(),
        message,
    }
}

/// [`ConditionEngine`] backed by minijinja's expression compiler.
#[derive(Debug, Default)]
pub struct ExprEngine {
    env: Environment<'static>,
}

impl ExprEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConditionEngine for ExprEngine {
    fn compile<'a>(
        &'a self,
        expression: &str,
    ) -> Result<Box<dyn Program + 'a>, ConditionSyntaxError> {
        let expr = self
            .env
            .compile_expression_owned(expression.to_string())
            .map_err(|e| syntax_error(expression, e.to_string()))?;
        Ok(Box::new(CompiledExpression { expr }))
    }
}

struct CompiledExpression<'env> {
    expr: Expression<'env, 'static>,
}

impl Program for CompiledExpression<'_> {
    fn run(&self, params: &Value) -> Result<bool, ConditionEvalError> {
        self.expr
            .eval(params)
            .map(|value| value.is_true())
            .map_err(|e| ConditionEvalError(e.to_string()))
    }
}
