use super::ir::*;
use super::lower;
use crate::counter::Counter;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::validate::validate;

fn lower_source(source: &str) -> Program {
    let tokens = tokenize(source).unwrap();
    let ast = parse(&tokens).unwrap();
    let mut counter = Counter::new();
    let ast = validate(ast, &mut counter).unwrap();
    lower(&ast, &mut counter).unwrap_or_else(|e| panic!("expected {source:?} to lower, got {e}"))
}

/// Every jump target in a function must be the label of some `Label`
/// instruction in that same function.
fn assert_jumps_resolve(function: &Function) {
    let labels: std::collections::HashSet<&str> = function
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Label(l) => Some(l.as_str()),
            _ => None,
        })
        .collect();
    for instr in &function.instructions {
        let target = match instr {
            Instruction::Jump(l) | Instruction::JumpIfZero(_, l) | Instruction::JumpIfNotZero(_, l) => Some(l.as_str()),
            _ => None,
        };
        if let Some(target) = target {
            assert!(labels.contains(target), "unresolved jump target '{target}'");
        }
    }
}

#[test]
fn function_ends_with_a_fallback_return() {
    let program = lower_source("int main(void) { return 2; }");
    let func = &program.functions[0];
    assert!(matches!(func.instructions.last(), Some(Instruction::Return(_))));
}

#[test]
fn constant_return_has_no_extra_instructions() {
    let program = lower_source("int main(void) { return 2; }");
    let func = &program.functions[0];
    assert_eq!(func.instructions, vec![Instruction::Return(Value::Constant(2))]);
}

#[test]
fn short_circuit_and_expands_to_jumps() {
    let program = lower_source("int main(void) { int a = 0; if (1 && 0) a = 1; return a; }");
    let func = &program.functions[0];
    assert!(func
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::JumpIfZero(_, _))));
    assert_jumps_resolve(func);
}

#[test]
fn short_circuit_or_expands_to_jumps() {
    let program = lower_source("int main(void) { int a = 0; if (0 || 1) a = 1; return a; }");
    let func = &program.functions[0];
    assert!(func
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::JumpIfNotZero(_, _))));
    assert_jumps_resolve(func);
}

#[test]
fn conditional_expression_expands_with_a_shared_result_temp() {
    let program = lower_source("int main(void) { return 1 ? 2 : 3; }");
    let func = &program.functions[0];
    let copies: Vec<&Value> = func
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Copy(_, dst) => Some(dst),
            _ => None,
        })
        .collect();
    assert_eq!(copies.len(), 2);
    assert_eq!(copies[0], copies[1]);
    assert_jumps_resolve(func);
}

#[test]
fn for_loop_lowers_to_labeled_control_flow() {
    let program = lower_source("int main(void) { int a=0; for (int i=0;i<5;i=i+1) a=a+i; return a; }");
    let func = &program.functions[0];
    assert_jumps_resolve(func);
    assert!(func.instructions.iter().any(|i| matches!(i, Instruction::JumpIfZero(_, _))));
}

#[test]
fn switch_dispatch_covers_every_case_and_falls_back_to_default() {
    let program = lower_source(
        "int main(void) { int x=3; int y=0; switch(x){ case 1: y=10; break; case 3: y=30; break; default: y=99; } return y; }",
    );
    let func = &program.functions[0];
    let equal_checks = func
        .instructions
        .iter()
        .filter(|i| matches!(i, Instruction::Binary(BinaryOp::Equal, ..)))
        .count();
    assert_eq!(equal_checks, 2);
    assert_jumps_resolve(func);
}

#[test]
fn post_increment_copies_old_value_before_mutating() {
    let program = lower_source("int main(void) { int a = 1; int b = a++; return b; }");
    let func = &program.functions[0];
    // Copy(a, t) must precede the Binary(Add, a, 1, a) that mutates `a`.
    let copy_idx = func
        .instructions
        .iter()
        .position(|i| matches!(i, Instruction::Copy(Value::Variable(_), _)))
        .unwrap();
    let add_idx = func
        .instructions
        .iter()
        .position(|i| matches!(i, Instruction::Binary(BinaryOp::Add, ..)))
        .unwrap();
    assert!(copy_idx < add_idx);
}

#[test]
fn compound_assignment_reads_the_variable_once_as_a_value_not_an_instruction() {
    let program = lower_source("int main(void) { int a = 1; a += 2; return a; }");
    let func = &program.functions[0];
    // Reading a plain Var never emits an instruction, so the only
    // instructions touching `a` are its init copy, the += add, and the
    // final assignment copy.
    let touching_a = func
        .instructions
        .iter()
        .filter(|i| {
            matches!(i, Instruction::Copy(_, Value::Variable(_)))
                || matches!(i, Instruction::Binary(BinaryOp::Add, ..))
        })
        .count();
    assert_eq!(touching_a, 3);
}
