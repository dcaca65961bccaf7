//! Loop and switch labeling.
//!
//! Attaches a fresh label to every loop and switch, and rewrites `break`
//! and `continue` to carry the label of the construct they bind to.
//! `break` binds to the nearest enclosing switch if there is one, even
//! across an intervening loop boundary; `continue` always binds to the
//! nearest enclosing loop.

use crate::counter::Counter;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::parser::ast::*;

pub fn label_program(program: Program, counter: &mut Counter) -> CompileResult<Program> {
    let functions = program
        .functions
        .into_iter()
        .map(|f| label_function(f, counter))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(Program { functions })
}

fn label_function(function: Function, counter: &mut Counter) -> CompileResult<Function> {
    let mut labeler = Labeler { counter };
    let ctx = Ctx {
        loop_label: None,
        switch_label: None,
    };
    let body = labeler.label_block(function.body, &ctx)?;
    Ok(Function {
        name: function.name,
        body,
    })
}

#[derive(Clone)]
struct Ctx {
    loop_label: Option<String>,
    switch_label: Option<String>,
}

struct Labeler<'a> {
    counter: &'a mut Counter,
}

impl<'a> Labeler<'a> {
    fn label_block(&mut self, block: Block, ctx: &Ctx) -> CompileResult<Block> {
        let items = block
            .items
            .into_iter()
            .map(|item| match item {
                BlockItem::Decl(d) => Ok(BlockItem::Decl(d)),
                BlockItem::Stmt(s) => Ok(BlockItem::Stmt(self.label_stmt(s, ctx)?)),
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Block { items })
    }

    fn label_stmt(&mut self, stmt: Statement, ctx: &Ctx) -> CompileResult<Statement> {
        Ok(match stmt {
            Statement::Return(e) => Statement::Return(e),
            Statement::Expression(e) => Statement::Expression(e),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Statement::If {
                cond,
                then_branch: Box::new(self.label_stmt(*then_branch, ctx)?),
                else_branch: else_branch
                    .map(|b| self.label_stmt(*b, ctx))
                    .transpose()?
                    .map(Box::new),
            },
            Statement::Goto(label) => Statement::Goto(label),
            Statement::LabeledStmt(label, inner) => {
                Statement::LabeledStmt(label, Box::new(self.label_stmt(*inner, ctx)?))
            }
            Statement::Compound(block) => Statement::Compound(self.label_block(block, ctx)?),
            Statement::Break { .. } => {
                let target = ctx.switch_label.clone().or_else(|| ctx.loop_label.clone());
                match target {
                    Some(target) => Statement::Break {
                        target: Some(target),
                    },
                    None => {
                        return Err(CompileError::semantic(
                            ErrorKind::UnboundControl,
                            "'break' outside of a loop or switch",
                        ))
                    }
                }
            }
            Statement::Continue { .. } => match ctx.loop_label.clone() {
                Some(target) => Statement::Continue {
                    target: Some(target),
                },
                None => {
                    return Err(CompileError::semantic(
                        ErrorKind::UnboundControl,
                        "'continue' outside of a loop",
                    ))
                }
            },
            Statement::While { cond, body, .. } => {
                let label = self.counter.fresh("while");
                let inner_ctx = Ctx {
                    loop_label: Some(label.clone()),
                    switch_label: ctx.switch_label.clone(),
                };
                Statement::While {
                    cond,
                    body: Box::new(self.label_stmt(*body, &inner_ctx)?),
                    label: Some(label),
                }
            }
            Statement::DoWhile { body, cond, .. } => {
                let label = self.counter.fresh("do_while");
                let inner_ctx = Ctx {
                    loop_label: Some(label.clone()),
                    switch_label: ctx.switch_label.clone(),
                };
                Statement::DoWhile {
                    body: Box::new(self.label_stmt(*body, &inner_ctx)?),
                    cond,
                    label: Some(label),
                }
            }
            Statement::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                let label = self.counter.fresh("for");
                let inner_ctx = Ctx {
                    loop_label: Some(label.clone()),
                    switch_label: ctx.switch_label.clone(),
                };
                Statement::For {
                    init,
                    cond,
                    post,
                    body: Box::new(self.label_stmt(*body, &inner_ctx)?),
                    label: Some(label),
                }
            }
            Statement::Switch { expr, body, .. } => {
                let label = self.counter.fresh("switch");
                let mut cases = Vec::new();
                let mut has_default = false;
                collect_cases(&body, &mut cases, &mut has_default)?;
                let inner_ctx = Ctx {
                    loop_label: ctx.loop_label.clone(),
                    switch_label: Some(label.clone()),
                };
                Statement::Switch {
                    expr,
                    body: Box::new(self.label_stmt(*body, &inner_ctx)?),
                    label: Some(label),
                    cases,
                    has_default,
                }
            }
            Statement::Case { const_expr, body } => {
                if ctx.switch_label.is_none() {
                    return Err(CompileError::semantic(
                        ErrorKind::Switch,
                        "'case' outside of a switch",
                    ));
                }
                Statement::Case {
                    const_expr,
                    body: Box::new(self.label_stmt(*body, ctx)?),
                }
            }
            Statement::Default { body } => {
                if ctx.switch_label.is_none() {
                    return Err(CompileError::semantic(
                        ErrorKind::Switch,
                        "'default' outside of a switch",
                    ));
                }
                Statement::Default {
                    body: Box::new(self.label_stmt(*body, ctx)?),
                }
            }
            Statement::Null => Statement::Null,
        })
    }
}

/// Gathers every `case`/`default` belonging to this switch, stopping at a
/// nested switch (which owns its own cases). Errors on a duplicate case
/// constant or a second `default`.
fn collect_cases(stmt: &Statement, cases: &mut Vec<i64>, has_default: &mut bool) -> CompileResult<()> {
    match stmt {
        Statement::Case { const_expr, body } => {
            let value = case_const(const_expr)?;
            if cases.contains(&value) {
                return Err(CompileError::semantic(
                    ErrorKind::Switch,
                    format!("duplicate case value {value}"),
                ));
            }
            cases.push(value);
            collect_cases(body, cases, has_default)
        }
        Statement::Default { body } => {
            if *has_default {
                return Err(CompileError::semantic(
                    ErrorKind::Switch,
                    "switch has more than one 'default'",
                ));
            }
            *has_default = true;
            collect_cases(body, cases, has_default)
        }
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_cases(then_branch, cases, has_default)?;
            if let Some(else_branch) = else_branch {
                collect_cases(else_branch, cases, has_default)?;
            }
            Ok(())
        }
        Statement::Compound(block) => {
            for item in &block.items {
                if let BlockItem::Stmt(s) = item {
                    collect_cases(s, cases, has_default)?;
                }
            }
            Ok(())
        }
        Statement::LabeledStmt(_, inner) => collect_cases(inner, cases, has_default),
        Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. } => collect_cases(body, cases, has_default),
        Statement::Switch { .. } => Ok(()),
        _ => Ok(()),
    }
}

fn case_const(expr: &Expr) -> CompileResult<i64> {
    match expr {
        Expr::Constant(n) => Ok(*n),
        _ => Err(CompileError::semantic(
            ErrorKind::Switch,
            "case label must be a constant expression",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn label_source(source: &str) -> CompileResult<Program> {
        let tokens = tokenize(source).unwrap();
        let program = parse(&tokens).unwrap();
        let mut counter = Counter::new();
        label_program(program, &mut counter)
    }

    #[test]
    fn while_loop_gets_a_label() {
        let program = label_source("int main(void) { while (1) { break; } return 0; }").unwrap();
        let BlockItem::Stmt(Statement::While { label, body, .. }) = &program.functions[0].body.items[0] else {
            panic!()
        };
        assert!(label.is_some());
        let BlockItem::Stmt(Statement::Break { target }) = &body_first_stmt(body) else {
            panic!()
        };
        assert_eq!(target, label);
    }

    fn body_first_stmt(stmt: &Statement) -> BlockItem {
        match stmt {
            Statement::Compound(block) => block.items[0].clone(),
            other => BlockItem::Stmt(other.clone()),
        }
    }

    #[test]
    fn break_inside_switch_inside_loop_binds_to_switch() {
        let program = label_source(
            "int main(void) { while (1) { switch (1) { case 1: break; } } return 0; }",
        )
        .unwrap();
        let BlockItem::Stmt(Statement::While { body, .. }) = &program.functions[0].body.items[0] else {
            panic!()
        };
        let Statement::Compound(while_block) = body.as_ref() else { panic!() };
        let BlockItem::Stmt(Statement::Switch { label: switch_label, body: switch_body, .. }) =
            &while_block.items[0]
        else {
            panic!()
        };
        let Statement::Compound(switch_block) = switch_body.as_ref() else { panic!() };
        let BlockItem::Stmt(Statement::Case { body: case_body, .. }) = &switch_block.items[0] else {
            panic!()
        };
        let Statement::Break { target } = case_body.as_ref() else { panic!() };
        assert_eq!(target, switch_label);
    }

    #[test]
    fn break_outside_loop_or_switch_is_an_error() {
        let err = label_source("int main(void) { break; return 0; }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundControl);
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        let err = label_source("int main(void) { continue; return 0; }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundControl);
    }

    #[test]
    fn case_outside_switch_is_an_error() {
        let tokens = tokenize("int main(void) { case 1: return 0; }").unwrap();
        // The parser accepts a bare `case` anywhere a statement is allowed;
        // the switch-membership check is this pass's job.
        if let Ok(program) = parse(&tokens) {
            let mut counter = Counter::new();
            let err = label_program(program, &mut counter).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Switch);
        }
    }

    #[test]
    fn duplicate_case_constant_is_an_error() {
        let err = label_source(
            "int main(void) { switch (1) { case 1: break; case 1: break; } return 0; }",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Switch);
    }

    #[test]
    fn two_defaults_is_an_error() {
        let err = label_source(
            "int main(void) { switch (1) { default: break; default: break; } return 0; }",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Switch);
    }
}
