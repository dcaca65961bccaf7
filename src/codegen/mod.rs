//! # Code Generation
//!
//! Three sub-phases turn a TACKY function into text: instruction selection
//! over pseudo-operands, pseudo-to-stack-slot assignment, and a fix-up pass
//! that rewrites instructions to respect x86's two-operand constraints.
//! Emission (turning the fixed-up IR into AT&T assembly text) is a separate
//! final step so callers can stop right before it runs.

pub mod ir;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::error::CompileResult;
use crate::tacky;
use ir::{BinaryOp, CondCode, Function, Instruction, Operand, Program, Reg, UnaryOp};

#[must_use]
pub fn generate(program: &tacky::ir::Program) -> CompileResult<Program> {
    let span = tracing::debug_span!("codegen");
    let _enter = span.enter();

    let functions = program
        .functions
        .iter()
        .map(|f| generate_function(f))
        .collect::<CompileResult<Vec<_>>>()?;

    tracing::debug!(functions = functions.len(), "generated assembly ir");
    Ok(Program { functions })
}

fn generate_function(function: &tacky::ir::Function) -> CompileResult<Function> {
    let selected = select::select_instructions(function);
    let (assigned, frame_size) = stack::assign_stack_slots(selected);
    let fixed = fixup::fix_up(assigned, frame_size);
    Ok(Function {
        name: function.name.clone(),
        instructions: fixed,
    })
}

/// Instruction selection: one TACKY instruction becomes one or more
/// assembly instructions over `Pseudo`/`Imm` operands, per the fixed
/// TACKY-to-assembly mapping table.
mod select {
    use super::*;
    use tacky::ir as t;

    pub fn select_instructions(function: &t::Function) -> Vec<Instruction> {
        let mut out = Vec::new();
        for instr in &function.instructions {
            select_one(instr, &mut out);
        }
        out
    }

    fn operand(value: &t::Value) -> Operand {
        match value {
            t::Value::Constant(n) => Operand::Imm(*n),
            t::Value::Variable(id) => Operand::Pseudo(id.clone()),
        }
    }

    fn cond_code(op: t::BinaryOp) -> CondCode {
        match op {
            t::BinaryOp::Equal => CondCode::E,
            t::BinaryOp::NotEqual => CondCode::Ne,
            t::BinaryOp::Less => CondCode::L,
            t::BinaryOp::LessEqual => CondCode::Le,
            t::BinaryOp::Greater => CondCode::G,
            t::BinaryOp::GreaterEqual => CondCode::Ge,
            _ => unreachable!("cond_code called on a non-relational operator"),
        }
    }

    fn binary_op(op: t::BinaryOp) -> BinaryOp {
        match op {
            t::BinaryOp::Add => BinaryOp::Add,
            t::BinaryOp::Subtract => BinaryOp::Sub,
            t::BinaryOp::Multiply => BinaryOp::Mult,
            t::BinaryOp::BitAnd => BinaryOp::And,
            t::BinaryOp::BitOr => BinaryOp::Or,
            t::BinaryOp::BitXor => BinaryOp::Xor,
            t::BinaryOp::ShiftLeft => BinaryOp::Shl,
            t::BinaryOp::ShiftRight => BinaryOp::Shr,
            _ => unreachable!("binary_op called on divide/remainder/relational"),
        }
    }

    fn select_one(instr: &t::Instruction, out: &mut Vec<Instruction>) {
        match instr {
            t::Instruction::Return(v) => {
                out.push(Instruction::Mov(operand(v), Operand::Register(Reg::Ax)));
                out.push(Instruction::Ret);
            }
            t::Instruction::Unary(t::UnaryOp::Not, src, dst) => {
                out.push(Instruction::Cmp(Operand::Imm(0), operand(src)));
                out.push(Instruction::Mov(Operand::Imm(0), operand(dst)));
                out.push(Instruction::SetCC(CondCode::E, operand(dst)));
            }
            t::Instruction::Unary(t::UnaryOp::Negate, src, dst) => {
                out.push(Instruction::Mov(operand(src), operand(dst)));
                out.push(Instruction::Unary(UnaryOp::Neg, operand(dst)));
            }
            t::Instruction::Unary(t::UnaryOp::Complement, src, dst) => {
                out.push(Instruction::Mov(operand(src), operand(dst)));
                out.push(Instruction::Unary(UnaryOp::Not, operand(dst)));
            }
            t::Instruction::Binary(t::BinaryOp::Divide, a, b, dst) => {
                out.push(Instruction::Mov(operand(a), Operand::Register(Reg::Ax)));
                out.push(Instruction::Cdq);
                out.push(Instruction::Idiv(operand(b)));
                out.push(Instruction::Mov(Operand::Register(Reg::Ax), operand(dst)));
            }
            t::Instruction::Binary(t::BinaryOp::Remainder, a, b, dst) => {
                out.push(Instruction::Mov(operand(a), Operand::Register(Reg::Ax)));
                out.push(Instruction::Cdq);
                out.push(Instruction::Idiv(operand(b)));
                out.push(Instruction::Mov(Operand::Register(Reg::Dx), operand(dst)));
            }
            t::Instruction::Binary(op, a, b, dst) if op.is_relational() => {
                out.push(Instruction::Cmp(operand(b), operand(a)));
                out.push(Instruction::Mov(Operand::Imm(0), operand(dst)));
                out.push(Instruction::SetCC(cond_code(*op), operand(dst)));
            }
            t::Instruction::Binary(op, a, b, dst) => {
                out.push(Instruction::Mov(operand(a), operand(dst)));
                out.push(Instruction::Binary(binary_op(*op), operand(b), operand(dst)));
            }
            t::Instruction::Copy(src, dst) => {
                out.push(Instruction::Mov(operand(src), operand(dst)));
            }
            t::Instruction::Jump(label) => out.push(Instruction::Jmp(label.clone())),
            t::Instruction::JumpIfZero(v, label) => {
                out.push(Instruction::Cmp(Operand::Imm(0), operand(v)));
                out.push(Instruction::JmpCC(CondCode::E, label.clone()));
            }
            t::Instruction::JumpIfNotZero(v, label) => {
                out.push(Instruction::Cmp(Operand::Imm(0), operand(v)));
                out.push(Instruction::JmpCC(CondCode::Ne, label.clone()));
            }
            t::Instruction::Label(label) => out.push(Instruction::Label(label.clone())),
        }
    }
}

/// Pseudo-to-stack assignment: every distinct `Pseudo(id)` gets a 4-byte
/// slot at `-4*k(%rbp)`, numbered in first-use order.
mod stack {
    use super::*;

    pub fn assign_stack_slots(instructions: Vec<Instruction>) -> (Vec<Instruction>, i64) {
        let mut slots: HashMap<String, i64> = HashMap::new();
        let mut next = 1i64;

        let mut slot_for = |id: &str, slots: &mut HashMap<String, i64>| -> i64 {
            if let Some(&offset) = slots.get(id) {
                return offset;
            }
            let offset = -4 * next;
            slots.insert(id.to_string(), offset);
            next += 1;
            offset
        };

        let mut out = Vec::with_capacity(instructions.len());
        for instr in instructions {
            out.push(rewrite_instruction(instr, &mut slots, &mut slot_for));
        }
        (out, 4 * (next - 1))
    }

    fn rewrite_instruction(
        instr: Instruction,
        slots: &mut HashMap<String, i64>,
        slot_for: &mut impl FnMut(&str, &mut HashMap<String, i64>) -> i64,
    ) -> Instruction {
        let mut op = |o: Operand| match o {
            Operand::Pseudo(id) => Operand::Stack(slot_for(&id, slots)),
            other => other,
        };
        match instr {
            Instruction::Mov(a, b) => Instruction::Mov(op(a), op(b)),
            Instruction::Unary(u, a) => Instruction::Unary(u, op(a)),
            Instruction::Binary(b, a, c) => Instruction::Binary(b, op(a), op(c)),
            Instruction::Cmp(a, b) => Instruction::Cmp(op(a), op(b)),
            Instruction::Idiv(a) => Instruction::Idiv(op(a)),
            Instruction::SetCC(cc, a) => Instruction::SetCC(cc, op(a)),
            other @ (Instruction::Cdq
            | Instruction::Jmp(_)
            | Instruction::JmpCC(_, _)
            | Instruction::Label(_)
            | Instruction::AllocStack(_)
            | Instruction::Ret) => other,
        }
    }
}

/// Fix-up: rewrites instructions that violate x86's "at most one memory
/// operand" constraint, via the `%r10d`/`%r11d` scratch registers. Order
/// matters only in that each pattern is checked before falling through to
/// the next; none of them overlap in practice.
mod fixup {
    use super::*;

    const SCRATCH_1: Operand = Operand::Register(Reg::R10);
    const SCRATCH_2: Operand = Operand::Register(Reg::R11);

    pub fn fix_up(instructions: Vec<Instruction>, frame_size: i64) -> Vec<Instruction> {
        let mut out = vec![Instruction::AllocStack(frame_size)];
        for instr in instructions {
            fix_one(instr, &mut out);
        }
        out
    }

    fn is_stack(op: &Operand) -> bool {
        matches!(op, Operand::Stack(_))
    }

    fn is_imm(op: &Operand) -> bool {
        matches!(op, Operand::Imm(_))
    }

    fn fix_one(instr: Instruction, out: &mut Vec<Instruction>) {
        match instr {
            Instruction::Mov(src, dst) if is_stack(&src) && is_stack(&dst) => {
                out.push(Instruction::Mov(src, SCRATCH_1));
                out.push(Instruction::Mov(SCRATCH_1, dst));
            }
            Instruction::Idiv(src) if is_stack(&src) || is_imm(&src) => {
                out.push(Instruction::Mov(src, SCRATCH_1));
                out.push(Instruction::Idiv(SCRATCH_1));
            }
            Instruction::Binary(op @ (BinaryOp::Add | BinaryOp::Sub | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor), src, dst)
                if is_stack(&src) && is_stack(&dst) =>
            {
                out.push(Instruction::Mov(src, SCRATCH_1));
                out.push(Instruction::Binary(op, SCRATCH_1, dst));
            }
            Instruction::Binary(BinaryOp::Mult, src, dst) if is_stack(&dst) => {
                out.push(Instruction::Mov(dst.clone(), SCRATCH_2));
                out.push(Instruction::Binary(BinaryOp::Mult, src, SCRATCH_2));
                out.push(Instruction::Mov(SCRATCH_2, dst));
            }
            Instruction::Cmp(a, b) if is_stack(&a) && is_stack(&b) => {
                out.push(Instruction::Mov(a, SCRATCH_1));
                out.push(Instruction::Cmp(SCRATCH_1, b));
            }
            Instruction::Cmp(a, b) if is_imm(&b) => {
                out.push(Instruction::Mov(b, SCRATCH_2));
                out.push(Instruction::Cmp(a, SCRATCH_2));
            }
            other => out.push(other),
        }
    }
}

/// Emission: the fixed-up IR to AT&T-syntax, Darwin-style text.
pub mod emit {
    use super::*;

    pub fn emit_program(program: &Program) -> String {
        let mut text = String::new();
        for function in &program.functions {
            emit_function(function, &mut text);
        }
        text
    }

    fn emit_function(function: &Function, text: &mut String) {
        text.push_str(&format!("\t.globl _{}\n", function.name));
        text.push_str(&format!("_{}:\n", function.name));
        text.push_str("\tpushq %rbp\n");
        text.push_str("\tmovq %rsp, %rbp\n");
        for instr in &function.instructions {
            emit_instruction(instr, text);
        }
    }

    fn fmt_operand(op: &Operand) -> String {
        match op {
            Operand::Imm(n) => format!("${n}"),
            Operand::Register(r) => r.as_str().to_string(),
            Operand::Pseudo(id) => format!("%pseudo_{id}"),
            Operand::Stack(offset) => format!("{offset}(%rbp)"),
        }
    }

    fn emit_instruction(instr: &Instruction, text: &mut String) {
        match instr {
            Instruction::Mov(src, dst) => {
                text.push_str(&format!("\tmovl {}, {}\n", fmt_operand(src), fmt_operand(dst)))
            }
            Instruction::Unary(op, dst) => {
                let mnemonic = match op {
                    UnaryOp::Neg => "negl",
                    UnaryOp::Not => "notl",
                };
                text.push_str(&format!("\t{mnemonic} {}\n", fmt_operand(dst)));
            }
            Instruction::Binary(op, src, dst) => {
                let mnemonic = match op {
                    BinaryOp::Add => "addl",
                    BinaryOp::Sub => "subl",
                    BinaryOp::Mult => "imull",
                    BinaryOp::And => "andl",
                    BinaryOp::Or => "orl",
                    BinaryOp::Xor => "xorl",
                    BinaryOp::Shl => "shll",
                    BinaryOp::Shr => "shrl",
                };
                text.push_str(&format!("\t{mnemonic} {}, {}\n", fmt_operand(src), fmt_operand(dst)));
            }
            Instruction::Cmp(a, b) => {
                text.push_str(&format!("\tcmpl {}, {}\n", fmt_operand(a), fmt_operand(b)))
            }
            Instruction::Idiv(src) => text.push_str(&format!("\tidivl {}\n", fmt_operand(src))),
            Instruction::Cdq => text.push_str("\tcdq\n"),
            Instruction::Jmp(label) => text.push_str(&format!("\tjmp .L{label}\n")),
            Instruction::JmpCC(cc, label) => {
                text.push_str(&format!("\tj{} .L{label}\n", cc.suffix()))
            }
            Instruction::SetCC(cc, dst) => {
                text.push_str(&format!("\tset{} {}\n", cc.suffix(), fmt_operand_byte(dst)))
            }
            Instruction::Label(label) => text.push_str(&format!(".L{label}:\n")),
            Instruction::AllocStack(size) => text.push_str(&format!("\tsubq ${size}, %rsp\n")),
            Instruction::Ret => {
                text.push_str("\tmovq %rbp, %rsp\n");
                text.push_str("\tpopq %rbp\n");
                text.push_str("\tret\n");
            }
        }
    }

    /// `setCC` takes an 8-bit operand; registers print their byte-sized form.
    fn fmt_operand_byte(op: &Operand) -> String {
        match op {
            Operand::Register(Reg::Ax) => "%al".to_string(),
            Operand::Register(Reg::Dx) => "%dl".to_string(),
            Operand::Register(Reg::R10) => "%r10b".to_string(),
            Operand::Register(Reg::R11) => "%r11b".to_string(),
            other => fmt_operand(other),
        }
    }
}
