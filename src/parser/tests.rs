use super::ast::*;
use super::parse;
use crate::error::ErrorKind;
use crate::lexer::tokenize;

fn parse_ok(source: &str) -> Program {
    let tokens = tokenize(source).expect("source should lex");
    parse(&tokens).unwrap_or_else(|e| panic!("expected {source:?} to parse, got {e}"))
}

fn parse_err(source: &str) -> ErrorKind {
    let tokens = tokenize(source).expect("source should lex");
    parse(&tokens).expect_err("expected a parse error").kind
}

fn only_function(program: &Program) -> &Function {
    assert_eq!(program.functions.len(), 1);
    &program.functions[0]
}

#[test]
fn minimal_return() {
    let program = parse_ok("int main(void) { return 2; }");
    let func = only_function(&program);
    assert_eq!(func.name, "main");
    assert_eq!(func.body.items.len(), 1);
    assert_eq!(
        func.body.items[0],
        BlockItem::Stmt(Statement::Return(Expr::Constant(2)))
    );
}

#[test]
fn arithmetic_precedence() {
    let program = parse_ok("int main(void) { return 1 + 2 * 3; }");
    let func = only_function(&program);
    match &func.body.items[0] {
        BlockItem::Stmt(Statement::Return(Expr::Binary(BinaryOp::Add, lhs, rhs))) => {
            assert_eq!(**lhs, Expr::Constant(1));
            assert_eq!(
                **rhs,
                Expr::Binary(BinaryOp::Multiply, Box::new(Expr::Constant(2)), Box::new(Expr::Constant(3)))
            );
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn unary_minus_binds_tighter_than_multiply() {
    let program = parse_ok("int main(void) { return -2 * 3; }");
    let func = only_function(&program);
    match &func.body.items[0] {
        BlockItem::Stmt(Statement::Return(Expr::Binary(BinaryOp::Multiply, lhs, _))) => {
            assert_eq!(**lhs, Expr::Unary(UnaryOp::Negate, Box::new(Expr::Constant(2))));
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn assignment_is_right_associative() {
    let program = parse_ok("int main(void) { int a; int b; a = b = 3; return a; }");
    let func = only_function(&program);
    match &func.body.items[2] {
        BlockItem::Stmt(Statement::Expression(Expr::Assignment(lhs, rhs))) => {
            assert_eq!(**lhs, Expr::Var("a".into()));
            assert!(matches!(**rhs, Expr::Assignment(_, _)));
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn compound_assignment_desugars_to_binary() {
    let program = parse_ok("int main(void) { int a = 1; a += 2; return a; }");
    let func = only_function(&program);
    match &func.body.items[1] {
        BlockItem::Stmt(Statement::Expression(Expr::Assignment(lhs, rhs))) => {
            assert_eq!(**lhs, Expr::Var("a".into()));
            assert_eq!(
                **rhs,
                Expr::Binary(
                    BinaryOp::Add,
                    Box::new(Expr::Var("a".into())),
                    Box::new(Expr::Constant(2))
                )
            );
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn ternary_is_right_associative_and_low_precedence() {
    let program = parse_ok("int main(void) { return 1 ? 2 : 0 ? 3 : 4; }");
    let func = only_function(&program);
    match &func.body.items[0] {
        BlockItem::Stmt(Statement::Return(Expr::Conditional(cond, then_e, else_e))) => {
            assert_eq!(**cond, Expr::Constant(1));
            assert_eq!(**then_e, Expr::Constant(2));
            assert!(matches!(**else_e, Expr::Conditional(_, _, _)));
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn postfix_and_prefix_increment() {
    let program = parse_ok("int main(void) { int a = 0; a++; ++a; return a; }");
    let func = only_function(&program);
    assert_eq!(
        func.body.items[1],
        BlockItem::Stmt(Statement::Expression(Expr::Unary(
            UnaryOp::PostIncrement,
            Box::new(Expr::Var("a".into()))
        )))
    );
    assert_eq!(
        func.body.items[2],
        BlockItem::Stmt(Statement::Expression(Expr::Unary(
            UnaryOp::PreIncrement,
            Box::new(Expr::Var("a".into()))
        )))
    );
}

#[test]
fn labeled_statement_and_goto() {
    let program = parse_ok("int main(void) { goto end; end: return 0; }");
    let func = only_function(&program);
    assert_eq!(func.body.items[0], BlockItem::Stmt(Statement::Goto("end".into())));
    assert!(matches!(
        func.body.items[1],
        BlockItem::Stmt(Statement::LabeledStmt(_, _))
    ));
}

#[test]
fn for_loop_with_declaration_init() {
    let program = parse_ok("int main(void) { int a=0; for (int i=0;i<5;i=i+1) a=a+i; return a; }");
    let func = only_function(&program);
    match &func.body.items[1] {
        BlockItem::Stmt(Statement::For { init, cond, post, .. }) => {
            assert!(matches!(init, ForInit::Decl(_)));
            assert!(cond.is_some());
            assert!(post.is_some());
        }
        other => panic!("unexpected statement shape: {other:?}"),
    }
}

#[test]
fn switch_with_case_and_default() {
    let program = parse_ok(
        "int main(void) { int x=3; int y=0; switch(x){ case 1: y=10; break; case 3: y=30; break; default: y=99; } return y; }",
    );
    let func = only_function(&program);
    assert!(matches!(
        func.body.items[2],
        BlockItem::Stmt(Statement::Switch { .. })
    ));
}

#[test]
fn trailing_tokens_after_program_is_a_parse_error() {
    assert_eq!(parse_err("int main(void) { return 0; } }"), ErrorKind::Parse);
}

#[test]
fn missing_semicolon_is_a_parse_error() {
    assert_eq!(parse_err("int main(void) { return 0 }"), ErrorKind::Parse);
}
