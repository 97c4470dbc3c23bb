//! Restricted expression language used by guards and computed actions.
//!
//! Only literals, names from the supplied context and operators are
//! understood; there are no calls, attribute access or assignments.

pub mod lexer;
pub mod parser;

use crate::domain::{ModelResult, Scalar};
use crate::tree::CallArgs;

/// Evaluates expression text against a name→value context.
pub trait Evaluator {
    fn evaluate(&self, text: &str, context: &CallArgs) -> ModelResult<Scalar>;

    /// Syntax check without evaluation.
    fn check(&self, text: &str) -> ModelResult<()> {
        let _ = text;
        Ok(())
    }
}

/// Default evaluator backed by [`parser`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, text: &str, context: &CallArgs) -> ModelResult<Scalar> {
        let expr = parser::parse(text)?;
        parser::eval(&expr, text, context)
    }

    fn check(&self, text: &str) -> ModelResult<()> {
        parser::parse(text).map(|_| ())
    }
}
