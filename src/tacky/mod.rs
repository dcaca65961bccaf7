//! # TACKY Lowering
//!
//! Translates the validated AST into the flat three-address IR, expanding
//! every construct that assembly can't express directly: short-circuit
//! `&&`/`||`, the ternary conditional, loops, switch dispatch, and pre/post
//! increment and decrement.

pub mod ir;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::counter::Counter;
use crate::error::{CompileError, CompileResult};
use crate::parser::ast;
use ir::{BinaryOp, Function, Instruction, Program, UnaryOp, Value};

#[must_use]
pub fn lower(program: &ast::Program, counter: &mut Counter) -> CompileResult<Program> {
    let span = tracing::debug_span!("tacky");
    let _enter = span.enter();

    let functions = program
        .functions
        .iter()
        .map(|f| lower_function(f, counter))
        .collect::<CompileResult<Vec<_>>>()?;

    let instr_count: usize = functions.iter().map(|f| f.instructions.len()).sum();
    tracing::debug!(instructions = instr_count, "lowered to tacky");
    Ok(Program { functions })
}

fn lower_function(function: &ast::Function, counter: &mut Counter) -> CompileResult<Function> {
    let mut translator = Translator {
        counter,
        instructions: Vec::new(),
        switch_stack: Vec::new(),
    };
    translator.lower_block(&function.body)?;
    // Every function falls through to an implicit `return 0`.
    translator.emit(Instruction::Return(Value::Constant(0)));
    Ok(Function {
        name: function.name.clone(),
        instructions: translator.instructions,
    })
}

/// Case/default labels for the switch currently being lowered, established
/// before the body is walked so `Case`/`Default` nodes reuse the same
/// labels the dispatch chain jumps to.
struct SwitchFrame {
    case_labels: HashMap<i64, String>,
    default_label: Option<String>,
}

struct Translator<'a> {
    counter: &'a mut Counter,
    instructions: Vec<Instruction>,
    switch_stack: Vec<SwitchFrame>,
}

impl<'a> Translator<'a> {
    fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn fresh_var(&mut self) -> Value {
        Value::Variable(self.counter.fresh("tmp"))
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        self.counter.fresh(prefix)
    }

    fn lower_block(&mut self, block: &ast::Block) -> CompileResult<()> {
        for item in &block.items {
            match item {
                ast::BlockItem::Decl(decl) => self.lower_decl(decl)?,
                ast::BlockItem::Stmt(stmt) => self.lower_stmt(stmt)?,
            }
        }
        Ok(())
    }

    fn lower_decl(&mut self, decl: &ast::Declaration) -> CompileResult<()> {
        if let Some(init) = &decl.init {
            let v = self.lower_expr(init)?;
            self.emit(Instruction::Copy(v, Value::Variable(decl.name.clone())));
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &ast::Statement) -> CompileResult<()> {
        match stmt {
            ast::Statement::Return(e) => {
                let v = self.lower_expr(e)?;
                self.emit(Instruction::Return(v));
            }
            ast::Statement::Expression(e) => {
                self.lower_expr(e)?;
            }
            ast::Statement::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref())?,
            ast::Statement::Goto(label) => self.emit(Instruction::Jump(label.clone())),
            ast::Statement::LabeledStmt(label, inner) => {
                self.emit(Instruction::Label(label.clone()));
                self.lower_stmt(inner)?;
            }
            ast::Statement::Compound(block) => self.lower_block(block)?,
            ast::Statement::Null => {}
            ast::Statement::Break { target } => {
                let target = target
                    .as_ref()
                    .ok_or_else(|| CompileError::internal("break without a bound target"))?;
                self.emit(Instruction::Jump(format!("break_{target}")));
            }
            ast::Statement::Continue { target } => {
                let target = target
                    .as_ref()
                    .ok_or_else(|| CompileError::internal("continue without a bound target"))?;
                self.emit(Instruction::Jump(format!("continue_{target}")));
            }
            ast::Statement::While { cond, body, label } => self.lower_while(cond, body, label)?,
            ast::Statement::DoWhile { body, cond, label } => self.lower_do_while(body, cond, label)?,
            ast::Statement::For {
                init,
                cond,
                post,
                body,
                label,
            } => self.lower_for(init, cond.as_ref(), post.as_ref(), body, label)?,
            ast::Statement::Switch {
                expr,
                body,
                label,
                cases,
                has_default,
            } => self.lower_switch(expr, body, label, cases, *has_default)?,
            ast::Statement::Case { const_expr, body } => self.lower_case(const_expr, body)?,
            ast::Statement::Default { body } => self.lower_default(body)?,
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        cond: &ast::Expr,
        then_branch: &ast::Statement,
        else_branch: Option<&ast::Statement>,
    ) -> CompileResult<()> {
        let c = self.lower_expr(cond)?;
        match else_branch {
            None => {
                let end = self.fresh_label("if_end");
                self.emit(Instruction::JumpIfZero(c, end.clone()));
                self.lower_stmt(then_branch)?;
                self.emit(Instruction::Label(end));
            }
            Some(else_branch) => {
                let else_k = self.fresh_label("if_else");
                let end = self.fresh_label("if_end");
                self.emit(Instruction::JumpIfZero(c, else_k.clone()));
                self.lower_stmt(then_branch)?;
                self.emit(Instruction::Jump(end.clone()));
                self.emit(Instruction::Label(else_k));
                self.lower_stmt(else_branch)?;
                self.emit(Instruction::Label(end));
            }
        }
        Ok(())
    }

    fn lower_while(
        &mut self,
        cond: &ast::Expr,
        body: &ast::Statement,
        label: &Option<String>,
    ) -> CompileResult<()> {
        let label = loop_label(label)?;
        let continue_l = format!("continue_{label}");
        let break_l = format!("break_{label}");
        self.emit(Instruction::Label(continue_l.clone()));
        let c = self.lower_expr(cond)?;
        self.emit(Instruction::JumpIfZero(c, break_l.clone()));
        self.lower_stmt(body)?;
        self.emit(Instruction::Jump(continue_l));
        self.emit(Instruction::Label(break_l));
        Ok(())
    }

    fn lower_do_while(
        &mut self,
        body: &ast::Statement,
        cond: &ast::Expr,
        label: &Option<String>,
    ) -> CompileResult<()> {
        let label = loop_label(label)?;
        let start = self.fresh_label("do_start");
        let continue_l = format!("continue_{label}");
        let break_l = format!("break_{label}");
        self.emit(Instruction::Label(start.clone()));
        self.lower_stmt(body)?;
        self.emit(Instruction::Label(continue_l));
        let c = self.lower_expr(cond)?;
        self.emit(Instruction::JumpIfNotZero(c, start));
        self.emit(Instruction::Label(break_l));
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: &ast::ForInit,
        cond: Option<&ast::Expr>,
        post: Option<&ast::Expr>,
        body: &ast::Statement,
        label: &Option<String>,
    ) -> CompileResult<()> {
        match init {
            ast::ForInit::Decl(decl) => self.lower_decl(decl)?,
            ast::ForInit::Expr(Some(e)) => {
                self.lower_expr(e)?;
            }
            ast::ForInit::Expr(None) => {}
        }
        let label = loop_label(label)?;
        let start = self.fresh_label("for_start");
        let continue_l = format!("continue_{label}");
        let break_l = format!("break_{label}");
        self.emit(Instruction::Label(start.clone()));
        if let Some(cond) = cond {
            let c = self.lower_expr(cond)?;
            self.emit(Instruction::JumpIfZero(c, break_l.clone()));
        }
        self.lower_stmt(body)?;
        self.emit(Instruction::Label(continue_l));
        if let Some(post) = post {
            self.lower_expr(post)?;
        }
        self.emit(Instruction::Jump(start));
        self.emit(Instruction::Label(break_l));
        Ok(())
    }

    fn lower_switch(
        &mut self,
        expr: &ast::Expr,
        body: &ast::Statement,
        label: &Option<String>,
        cases: &[i64],
        has_default: bool,
    ) -> CompileResult<()> {
        let label = loop_label(label)?;
        let break_l = format!("break_{label}");
        let v = self.lower_expr(expr)?;

        let mut case_labels = HashMap::new();
        for value in cases {
            let case_label = self.fresh_label(&format!("case_{label}"));
            case_labels.insert(*value, case_label);
        }
        let default_label = has_default.then(|| self.fresh_label(&format!("default_{label}")));

        for value in cases {
            let case_label = case_labels[value].clone();
            let t = self.fresh_var();
            self.emit(Instruction::Binary(
                BinaryOp::Equal,
                v.clone(),
                Value::Constant(*value),
                t.clone(),
            ));
            self.emit(Instruction::JumpIfNotZero(t, case_label));
        }
        match &default_label {
            Some(d) => self.emit(Instruction::Jump(d.clone())),
            None => self.emit(Instruction::Jump(break_l.clone())),
        }

        self.switch_stack.push(SwitchFrame {
            case_labels,
            default_label,
        });
        self.lower_stmt(body)?;
        self.switch_stack.pop();

        self.emit(Instruction::Label(break_l));
        Ok(())
    }

    fn lower_case(&mut self, const_expr: &ast::Expr, body: &ast::Statement) -> CompileResult<()> {
        let value = case_const(const_expr)?;
        let case_label = self
            .switch_stack
            .last()
            .and_then(|frame| frame.case_labels.get(&value))
            .cloned()
            .ok_or_else(|| CompileError::internal("case reached outside its switch frame"))?;
        self.emit(Instruction::Label(case_label));
        self.lower_stmt(body)
    }

    fn lower_default(&mut self, body: &ast::Statement) -> CompileResult<()> {
        let default_label = self
            .switch_stack
            .last()
            .and_then(|frame| frame.default_label.clone())
            .ok_or_else(|| CompileError::internal("default reached outside its switch frame"))?;
        self.emit(Instruction::Label(default_label));
        self.lower_stmt(body)
    }

    fn lower_expr(&mut self, expr: &ast::Expr) -> CompileResult<Value> {
        match expr {
            ast::Expr::Constant(n) => Ok(Value::Constant(*n)),
            ast::Expr::Var(id) => Ok(Value::Variable(id.clone())),
            ast::Expr::Unary(op, inner) => self.lower_unary(*op, inner),
            ast::Expr::Binary(ast::BinaryOp::And, a, b) => self.lower_and(a, b),
            ast::Expr::Binary(ast::BinaryOp::Or, a, b) => self.lower_or(a, b),
            ast::Expr::Binary(op, a, b) => {
                let v1 = self.lower_expr(a)?;
                let v2 = self.lower_expr(b)?;
                let t = self.fresh_var();
                self.emit(Instruction::Binary(map_binary(*op), v1, v2, t.clone()));
                Ok(t)
            }
            ast::Expr::Assignment(lhs, rhs) => {
                let name = match lhs.as_ref() {
                    ast::Expr::Var(name) => name.clone(),
                    _ => return Err(CompileError::internal("assignment target is not a variable")),
                };
                let v = self.lower_expr(rhs)?;
                self.emit(Instruction::Copy(v.clone(), Value::Variable(name)));
                Ok(v)
            }
            ast::Expr::Conditional(cond, then_e, else_e) => {
                let result = self.fresh_var();
                let else_k = self.fresh_label("cond_else");
                let end_k = self.fresh_label("cond_end");
                let c = self.lower_expr(cond)?;
                self.emit(Instruction::JumpIfZero(c, else_k.clone()));
                let then_v = self.lower_expr(then_e)?;
                self.emit(Instruction::Copy(then_v, result.clone()));
                self.emit(Instruction::Jump(end_k.clone()));
                self.emit(Instruction::Label(else_k));
                let else_v = self.lower_expr(else_e)?;
                self.emit(Instruction::Copy(else_v, result.clone()));
                self.emit(Instruction::Label(end_k));
                Ok(result)
            }
        }
    }

    fn lower_unary(&mut self, op: ast::UnaryOp, inner: &ast::Expr) -> CompileResult<Value> {
        use ast::UnaryOp::*;
        match op {
            Negate | Complement | Not => {
                let v = self.lower_expr(inner)?;
                let t = self.fresh_var();
                self.emit(Instruction::Unary(map_unary(op), v, t.clone()));
                Ok(t)
            }
            PreIncrement | PreDecrement => {
                let v = self.lower_expr(inner)?;
                let delta = if op == PreIncrement { BinaryOp::Add } else { BinaryOp::Subtract };
                self.emit(Instruction::Binary(delta, v.clone(), Value::Constant(1), v.clone()));
                let t = self.fresh_var();
                self.emit(Instruction::Copy(v, t.clone()));
                Ok(t)
            }
            PostIncrement | PostDecrement => {
                let v = self.lower_expr(inner)?;
                let t = self.fresh_var();
                self.emit(Instruction::Copy(v.clone(), t.clone()));
                let delta = if op == PostIncrement { BinaryOp::Add } else { BinaryOp::Subtract };
                self.emit(Instruction::Binary(delta, v.clone(), Value::Constant(1), v));
                Ok(t)
            }
        }
    }

    fn lower_and(&mut self, a: &ast::Expr, b: &ast::Expr) -> CompileResult<Value> {
        let result = self.fresh_var();
        let false_k = self.fresh_label("and_false");
        let end_k = self.fresh_label("and_end");
        let av = self.lower_expr(a)?;
        self.emit(Instruction::JumpIfZero(av, false_k.clone()));
        let bv = self.lower_expr(b)?;
        self.emit(Instruction::JumpIfZero(bv, false_k.clone()));
        self.emit(Instruction::Copy(Value::Constant(1), result.clone()));
        self.emit(Instruction::Jump(end_k.clone()));
        self.emit(Instruction::Label(false_k));
        self.emit(Instruction::Copy(Value::Constant(0), result.clone()));
        self.emit(Instruction::Label(end_k));
        Ok(result)
    }

    fn lower_or(&mut self, a: &ast::Expr, b: &ast::Expr) -> CompileResult<Value> {
        let result = self.fresh_var();
        let true_k = self.fresh_label("or_true");
        let end_k = self.fresh_label("or_end");
        let av = self.lower_expr(a)?;
        self.emit(Instruction::JumpIfNotZero(av, true_k.clone()));
        let bv = self.lower_expr(b)?;
        self.emit(Instruction::JumpIfNotZero(bv, true_k.clone()));
        self.emit(Instruction::Copy(Value::Constant(0), result.clone()));
        self.emit(Instruction::Jump(end_k.clone()));
        self.emit(Instruction::Label(true_k));
        self.emit(Instruction::Copy(Value::Constant(1), result.clone()));
        self.emit(Instruction::Label(end_k));
        Ok(result)
    }
}

fn loop_label(label: &Option<String>) -> CompileResult<String> {
    label
        .clone()
        .ok_or_else(|| CompileError::internal("loop/switch reached lowering without a label"))
}

fn case_const(expr: &ast::Expr) -> CompileResult<i64> {
    match expr {
        ast::Expr::Constant(n) => Ok(*n),
        _ => Err(CompileError::internal("case constant did not reduce to a literal")),
    }
}

fn map_unary(op: ast::UnaryOp) -> UnaryOp {
    match op {
        ast::UnaryOp::Negate => UnaryOp::Negate,
        ast::UnaryOp::Complement => UnaryOp::Complement,
        ast::UnaryOp::Not => UnaryOp::Not,
        _ => unreachable!("increment/decrement handled by lower_unary directly"),
    }
}

fn map_binary(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Subtract => BinaryOp::Subtract,
        ast::BinaryOp::Multiply => BinaryOp::Multiply,
        ast::BinaryOp::Divide => BinaryOp::Divide,
        ast::BinaryOp::Remainder => BinaryOp::Remainder,
        ast::BinaryOp::BitAnd => BinaryOp::BitAnd,
        ast::BinaryOp::BitOr => BinaryOp::BitOr,
        ast::BinaryOp::BitXor => BinaryOp::BitXor,
        ast::BinaryOp::ShiftLeft => BinaryOp::ShiftLeft,
        ast::BinaryOp::ShiftRight => BinaryOp::ShiftRight,
        ast::BinaryOp::Equal => BinaryOp::Equal,
        ast::BinaryOp::NotEqual => BinaryOp::NotEqual,
        ast::BinaryOp::Less => BinaryOp::Less,
        ast::BinaryOp::LessEqual => BinaryOp::LessEqual,
        ast::BinaryOp::Greater => BinaryOp::Greater,
        ast::BinaryOp::GreaterEqual => BinaryOp::GreaterEqual,
        ast::BinaryOp::And | ast::BinaryOp::Or => {
            unreachable!("&&/|| are expanded by lower_and/lower_or before reaching map_binary")
        }
    }
}
