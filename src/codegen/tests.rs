use super::ir::*;
use super::{emit, generate};
use crate::counter::Counter;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::tacky;
use crate::validate::validate;

fn generate_source(source: &str) -> Program {
    let tokens = tokenize(source).unwrap();
    let ast = parse(&tokens).unwrap();
    let mut counter = Counter::new();
    let ast = validate(ast, &mut counter).unwrap();
    let tacky = tacky::lower(&ast, &mut counter).unwrap();
    generate(&tacky).unwrap_or_else(|e| panic!("expected {source:?} to generate, got {e}"))
}

fn no_double_stack_operands(function: &Function) {
    for instr in &function.instructions {
        match instr {
            Instruction::Mov(a, b) => assert!(
                !(matches!(a, Operand::Stack(_)) && matches!(b, Operand::Stack(_))),
                "mov with two stack operands: {instr:?}"
            ),
            Instruction::Idiv(a) => assert!(
                !matches!(a, Operand::Stack(_) | Operand::Imm(_)),
                "idiv with a stack or immediate operand: {instr:?}"
            ),
            Instruction::Binary(BinaryOp::Add | BinaryOp::Sub, a, b) => assert!(
                !(matches!(a, Operand::Stack(_)) && matches!(b, Operand::Stack(_))),
                "add/sub with two stack operands: {instr:?}"
            ),
            Instruction::Binary(BinaryOp::Mult, _, dst) => assert!(
                !matches!(dst, Operand::Stack(_)),
                "imul with a stack destination: {instr:?}"
            ),
            Instruction::Cmp(a, b) => {
                assert!(
                    !(matches!(a, Operand::Stack(_)) && matches!(b, Operand::Stack(_))),
                    "cmp with two stack operands: {instr:?}"
                );
                assert!(!matches!(b, Operand::Imm(_)), "cmp with an immediate second operand: {instr:?}");
            }
            _ => {}
        }
    }
}

#[test]
fn return_constant_moves_into_eax() {
    let program = generate_source("int main(void) { return 2; }");
    let func = &program.functions[0];
    assert_eq!(
        func.instructions[1..],
        vec![
            Instruction::Mov(Operand::Imm(2), Operand::Register(Reg::Ax)),
            Instruction::Ret,
        ]
    );
}

#[test]
fn frame_size_matches_distinct_pseudo_count() {
    let program = generate_source("int main(void) { int a = 1; int b = 2; int c = a + b; return c; }");
    let func = &program.functions[0];
    match func.instructions.first() {
        Some(Instruction::AllocStack(size)) => assert_eq!(*size, 12),
        other => panic!("expected AllocStack as the first instruction, got {other:?}"),
    }
}

#[test]
fn no_instruction_violates_the_two_operand_memory_constraint() {
    let program = generate_source(
        "int main(void) { int a=1; int b=2; int c=3; int d=4; int e=5; return a*b + c/d - e; }",
    );
    for func in &program.functions {
        no_double_stack_operands(func);
    }
}

#[test]
fn division_fixup_loads_stack_operand_through_scratch_register() {
    let program = generate_source("int main(void) { int a=7; int b=2; return a/b; }");
    let func = &program.functions[0];
    no_double_stack_operands(func);
    assert!(func
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::Idiv(Operand::Register(Reg::R10)))));
}

#[test]
fn relational_comparison_swaps_operands_for_cmp() {
    let program = generate_source("int main(void) { int a=1; int b=2; return a < b; }");
    let func = &program.functions[0];
    assert!(func.instructions.iter().any(|i| matches!(i, Instruction::SetCC(CondCode::L, _))));
    no_double_stack_operands(func);
}

#[test]
fn emitted_text_contains_globl_and_label_for_function_name() {
    let program = generate_source("int main(void) { return 0; }");
    let text = emit::emit_program(&program);
    assert!(text.contains(".globl _main"));
    assert!(text.contains("_main:"));
    assert!(text.contains("ret"));
}

#[test]
fn labels_round_trip_from_tacky_jumps_to_dot_l_labels() {
    let program = generate_source("int main(void) { int a=0; if (a) a=1; else a=2; return a; }");
    let text = emit::emit_program(&program);
    assert!(text.contains(".L"));
}
