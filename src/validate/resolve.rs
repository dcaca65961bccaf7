//! Variable resolution and goto/label checking.
//!
//! Walks the AST rebuilding it with every `Var` renamed to a function-wide
//! unique name. Label names live in a separate namespace from variables and
//! are left untouched; they are only checked for uniqueness and for
//! goto/label agreement.

use std::collections::{HashMap, HashSet};

use crate::counter::Counter;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::parser::ast::*;

/// `fromCurrentBlock` distinguishes "declared in this exact block" (so a
/// second declaration of the same name here is an error) from "visible
/// here because an enclosing block declared it" (so a nested block may
/// shadow it).
type Scope = HashMap<String, (String, bool)>;

pub fn resolve_program(program: Program, counter: &mut Counter) -> CompileResult<Program> {
    let functions = program
        .functions
        .into_iter()
        .map(|f| resolve_function(f, counter))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(Program { functions })
}

fn resolve_function(function: Function, counter: &mut Counter) -> CompileResult<Function> {
    let mut resolver = Resolver {
        counter,
        defined_labels: HashSet::new(),
        referenced_labels: HashSet::new(),
    };
    let scope = Scope::new();
    let body = resolver.resolve_block(function.body, &scope)?;

    for label in &resolver.referenced_labels {
        if !resolver.defined_labels.contains(label) {
            return Err(CompileError::semantic(
                ErrorKind::UndefinedLabel,
                format!("goto references undefined label '{label}'"),
            ));
        }
    }

    Ok(Function {
        name: function.name,
        body,
    })
}

struct Resolver<'a> {
    counter: &'a mut Counter,
    defined_labels: HashSet<String>,
    referenced_labels: HashSet<String>,
}

fn enter_scope(outer: &Scope) -> Scope {
    outer
        .iter()
        .map(|(name, (unique, _))| (name.clone(), (unique.clone(), false)))
        .collect()
}

impl<'a> Resolver<'a> {
    fn resolve_block(&mut self, block: Block, outer: &Scope) -> CompileResult<Block> {
        let mut scope = enter_scope(outer);
        let items = block
            .items
            .into_iter()
            .map(|item| match item {
                BlockItem::Decl(decl) => Ok(BlockItem::Decl(self.resolve_decl(decl, &mut scope)?)),
                BlockItem::Stmt(stmt) => Ok(BlockItem::Stmt(self.resolve_stmt(stmt, &mut scope)?)),
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Block { items })
    }

    fn resolve_decl(&mut self, decl: Declaration, scope: &mut Scope) -> CompileResult<Declaration> {
        if matches!(scope.get(&decl.name), Some((_, true))) {
            return Err(CompileError::semantic(
                ErrorKind::Redeclaration,
                format!("'{}' is already declared in this block", decl.name),
            ));
        }
        let unique = self.counter.fresh(&decl.name);
        scope.insert(decl.name.clone(), (unique.clone(), true));
        let init = decl
            .init
            .map(|e| self.resolve_expr(e, scope))
            .transpose()?;
        Ok(Declaration { name: unique, init })
    }

    fn resolve_stmt(&mut self, stmt: Statement, scope: &mut Scope) -> CompileResult<Statement> {
        Ok(match stmt {
            Statement::Return(e) => Statement::Return(self.resolve_expr(e, scope)?),
            Statement::Expression(e) => Statement::Expression(self.resolve_expr(e, scope)?),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Statement::If {
                cond: self.resolve_expr(cond, scope)?,
                then_branch: Box::new(self.resolve_stmt(*then_branch, scope)?),
                else_branch: else_branch
                    .map(|b| self.resolve_stmt(*b, scope))
                    .transpose()?
                    .map(Box::new),
            },
            Statement::Goto(label) => {
                self.referenced_labels.insert(label.clone());
                Statement::Goto(label)
            }
            Statement::LabeledStmt(label, inner) => {
                if !self.defined_labels.insert(label.clone()) {
                    return Err(CompileError::semantic(
                        ErrorKind::LabelRedefinition,
                        format!("label '{label}' is defined more than once"),
                    ));
                }
                Statement::LabeledStmt(label, Box::new(self.resolve_stmt(*inner, scope)?))
            }
            Statement::Compound(block) => Statement::Compound(self.resolve_block(block, scope)?),
            Statement::Break { target } => Statement::Break { target },
            Statement::Continue { target } => Statement::Continue { target },
            Statement::While { cond, body, label } => Statement::While {
                cond: self.resolve_expr(cond, scope)?,
                body: Box::new(self.resolve_stmt(*body, scope)?),
                label,
            },
            Statement::DoWhile { body, cond, label } => Statement::DoWhile {
                body: Box::new(self.resolve_stmt(*body, scope)?),
                cond: self.resolve_expr(cond, scope)?,
                label,
            },
            Statement::For {
                init,
                cond,
                post,
                body,
                label,
            } => {
                // `for` owns a scope of its own, covering the init declaration,
                // condition, post-expression, and body.
                let mut for_scope = enter_scope(scope);
                let init = match init {
                    ForInit::Decl(decl) => ForInit::Decl(self.resolve_decl(decl, &mut for_scope)?),
                    ForInit::Expr(expr) => ForInit::Expr(
                        expr.map(|e| self.resolve_expr(e, &mut for_scope)).transpose()?,
                    ),
                };
                let cond = cond
                    .map(|e| self.resolve_expr(e, &mut for_scope))
                    .transpose()?;
                let post = post
                    .map(|e| self.resolve_expr(e, &mut for_scope))
                    .transpose()?;
                let body = Box::new(self.resolve_stmt(*body, &mut for_scope)?);
                Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    label,
                }
            }
            Statement::Switch {
                expr,
                body,
                label,
                cases,
                has_default,
            } => Statement::Switch {
                expr: self.resolve_expr(expr, scope)?,
                body: Box::new(self.resolve_stmt(*body, scope)?),
                label,
                cases,
                has_default,
            },
            Statement::Case { const_expr, body } => Statement::Case {
                const_expr: self.resolve_expr(const_expr, scope)?,
                body: Box::new(self.resolve_stmt(*body, scope)?),
            },
            Statement::Default { body } => Statement::Default {
                body: Box::new(self.resolve_stmt(*body, scope)?),
            },
            Statement::Null => Statement::Null,
        })
    }

    fn resolve_expr(&mut self, expr: Expr, scope: &mut Scope) -> CompileResult<Expr> {
        Ok(match expr {
            Expr::Constant(n) => Expr::Constant(n),
            Expr::Var(name) => match scope.get(&name) {
                Some((unique, _)) => Expr::Var(unique.clone()),
                None => {
                    return Err(CompileError::semantic(
                        ErrorKind::UndeclaredVar,
                        format!("use of undeclared variable '{name}'"),
                    ))
                }
            },
            Expr::Unary(op, inner) => {
                if matches!(
                    op,
                    UnaryOp::PreIncrement
                        | UnaryOp::PreDecrement
                        | UnaryOp::PostIncrement
                        | UnaryOp::PostDecrement
                ) {
                    check_lvalue(&inner)?;
                }
                Expr::Unary(op, Box::new(self.resolve_expr(*inner, scope)?))
            }
            Expr::Binary(op, lhs, rhs) => Expr::Binary(
                op,
                Box::new(self.resolve_expr(*lhs, scope)?),
                Box::new(self.resolve_expr(*rhs, scope)?),
            ),
            Expr::Assignment(lhs, rhs) => {
                check_lvalue(&lhs)?;
                let lhs = self.resolve_expr(*lhs, scope)?;
                let rhs = self.resolve_expr(*rhs, scope)?;
                Expr::Assignment(Box::new(lhs), Box::new(rhs))
            }
            Expr::Conditional(cond, then_e, else_e) => Expr::Conditional(
                Box::new(self.resolve_expr(*cond, scope)?),
                Box::new(self.resolve_expr(*then_e, scope)?),
                Box::new(self.resolve_expr(*else_e, scope)?),
            ),
        })
    }
}

fn check_lvalue(expr: &Expr) -> CompileResult<()> {
    match expr {
        Expr::Var(_) => Ok(()),
        _ => Err(CompileError::semantic(
            ErrorKind::Lvalue,
            "left-hand side of assignment or increment/decrement must be a variable",
        )),
    }
}
