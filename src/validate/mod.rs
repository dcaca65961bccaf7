//! # Semantic Validation
//!
//! Two sub-passes run in order over the parsed AST and each rebuilds it:
//! variable resolution (renaming, scope checking, goto/label checking) and
//! loop/switch labeling (attaching fresh labels, resolving `break`/
//! `continue` targets, checking `case`/`default` placement).

pub mod loops;
pub mod resolve;

use crate::counter::Counter;
use crate::error::CompileResult;
use crate::parser::ast::Program;

#[must_use]
pub fn validate(program: Program, counter: &mut Counter) -> CompileResult<Program> {
    let span = tracing::debug_span!("validate");
    let _enter = span.enter();

    let program = resolve::resolve_program(program, counter)?;
    let program = loops::label_program(program, counter)?;

    tracing::debug!(functions = program.functions.len(), "validated");
    Ok(program)
}
