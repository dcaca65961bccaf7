//! # tackyc
//!
//! A small ahead-of-time compiler for a C subset, emitting x86-64 assembly.
//!
//! ## Pipeline
//!
//! Source runs through five pure, independent stages, sharing only a
//! monotonic fresh-name [`counter::Counter`]:
//!
//! 1. **Lexer** ([`lexer`]) - tokenizes source text
//! 2. **Parser** ([`parser`]) - builds an AST via recursive descent
//! 3. **Validation** ([`validate`]) - resolves variables, checks gotos and
//!    labels, and labels loops/switches for break/continue
//! 4. **TACKY lowering** ([`tacky`]) - expands the AST into a flat,
//!    three-address IR with explicit control flow
//! 5. **Code generation** ([`codegen`]) - selects x86 instructions, assigns
//!    stack slots, fixes up operand constraints, and emits AT&T assembly
//!
//! ## Example
//!
//! ```rust,no_run
//! use tackyc::{compile_to_stage, Stage};
//!
//! let source = std::fs::read_to_string("program.c").unwrap();
//! match compile_to_stage(&source, None) {
//!     Ok(output) => println!("{output}"),
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

pub mod codegen;
pub mod counter;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod tacky;
pub mod validate;

use counter::Counter;
use error::CompileResult;

/// Which stage to stop after. `None` (the CLI's default) runs the full
/// pipeline through code generation and emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Validate,
    Tacky,
    Codegen,
}

/// The result of stopping at a given stage: each variant is the
/// `Debug`-formatted intermediate representation, except the final stage,
/// which is the emitted assembly text.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Tokens(Vec<lexer::token::Token>),
    Ast(parser::ast::Program),
    ValidatedAst(parser::ast::Program),
    Tacky(tacky::ir::Program),
    Assembly(String),
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Tokens(tokens) => write!(f, "{tokens:#?}"),
            Output::Ast(ast) | Output::ValidatedAst(ast) => write!(f, "{ast:#?}"),
            Output::Tacky(program) => write!(f, "{program:#?}"),
            Output::Assembly(text) => write!(f, "{text}"),
        }
    }
}

/// Threads source text through the pipeline, stopping after `stop` (or
/// running to completion if `None`).
pub fn compile_to_stage(source: &str, stop: Option<Stage>) -> CompileResult<Output> {
    let tokens = lexer::tokenize(source)?;
    if stop == Some(Stage::Lex) {
        return Ok(Output::Tokens(tokens));
    }

    let ast = parser::parse(&tokens)?;
    if stop == Some(Stage::Parse) {
        return Ok(Output::Ast(ast));
    }

    let mut counter = Counter::new();
    let validated = validate::validate(ast, &mut counter)?;
    if stop == Some(Stage::Validate) {
        return Ok(Output::ValidatedAst(validated));
    }

    let tacky_program = tacky::lower(&validated, &mut counter)?;
    if stop == Some(Stage::Tacky) {
        return Ok(Output::Tacky(tacky_program));
    }

    let asm_program = codegen::generate(&tacky_program)?;
    let text = codegen::emit::emit_program(&asm_program);
    Ok(Output::Assembly(text))
}
