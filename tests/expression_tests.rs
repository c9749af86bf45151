mod common;

use common::*;
use jetgen::ast::*;
use jetgen::codegen::insn::Insn;
use jetgen::codegen::opcodes::*;
use jetgen::codegen::ClassFileFactory;
use jetgen::samples::{class_decl, function_decl, property_decl, ProgramBuilder};
use jetgen::{Config, Result};

const FACADE: &str = "demo/expr/namespace";
const CELL: &str = "demo/expr/Cell";

/// ```text
/// package demo.expr
///
/// class Cell { var x = 0 }
/// fun pick(c: Cell): Cell = c
/// fun bump(c: Cell): Int { pick(c).x += 2; return pick(c).x++ }
/// fun max(a: Int, b: Int): Int = if (a > b) a else b
/// fun isOne(x: Int?): Boolean = x == 1
/// fun present(x: Int?): Int = if (x != null) 1 else 0
/// fun differs(a: Int?, b: Int?): Int = if (a != b) 1 else 0
/// ```
fn generate() -> Result<ClassFileFactory> {
    init_logging();
    let mut p = ProgramBuilder::new("demo.expr");
    let ns = p.namespace();
    let int = SemanticType::int();

    let cell = p.class(ns, "Cell", ClassKind::Class, Modality::Final);
    let cell_type = SemanticType::class(cell);
    let x = p.property(cell, "x", int.clone(), true);

    let pick = p.function(ns, "pick", cell_type.clone());
    let picked = p.parameter(pick, "c", cell_type.clone());

    let bump = p.function(ns, "bump", int.clone());
    let c = p.parameter(bump, "c", cell_type.clone());

    let max = p.function(ns, "max", int.clone());
    let a = p.parameter(max, "a", int.clone());
    let b = p.parameter(max, "b", int.clone());

    let nullable_int = SemanticType::int().make_nullable();
    let is_one = p.function(ns, "isOne", SemanticType::boolean());
    let one_x = p.parameter(is_one, "x", nullable_int.clone());
    let present = p.function(ns, "present", int.clone());
    let present_x = p.parameter(present, "x", nullable_int.clone());
    let differs = p.function(ns, "differs", int.clone());
    let left = p.parameter(differs, "a", nullable_int.clone());
    let right = p.parameter(differs, "b", nullable_int.clone());

    let one_or_zero = |condition: Expr| {
        Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(Expr::int(1)),
                else_branch: Some(Box::new(Expr::int(0))),
            },
            SemanticType::int(),
        )
    };
    let is_one_body = Expr::binary(
        BinaryOp::Eq,
        Expr::variable(one_x, nullable_int.clone()),
        Expr::int(1),
        SemanticType::boolean(),
    );
    let present_body = one_or_zero(Expr::binary(
        BinaryOp::NotEq,
        Expr::variable(present_x, nullable_int.clone()),
        Expr::new(ExprKind::Constant(Constant::Null), nullable_int.clone()),
        SemanticType::boolean(),
    ));
    let differs_body = one_or_zero(Expr::binary(
        BinaryOp::NotEq,
        Expr::variable(left, nullable_int.clone()),
        Expr::variable(right, nullable_int.clone()),
        SemanticType::boolean(),
    ));

    let x_of_pick = || {
        let call = Expr::call(Call::new(pick, vec![ResolvedArgument::Expression(Expr::variable(c, cell_type.clone()))]), cell_type.clone());
        Expr::new(ExprKind::Property { receiver: Some(Box::new(call)), property: x }, SemanticType::int())
    };

    let bump_body = vec![
        Stmt::Expr(Expr::new(
            ExprKind::CompoundAssign { op: BinaryOp::Add, target: Box::new(x_of_pick()), value: Box::new(Expr::int(2)) },
            SemanticType::Unit,
        )),
        Stmt::ret(Some(Expr::new(
            ExprKind::IncDec { op: IncDecOp::PostIncrement, target: Box::new(x_of_pick()) },
            int.clone(),
        ))),
    ];

    let max_body = Expr::new(
        ExprKind::If {
            condition: Box::new(Expr::binary(
                BinaryOp::Gt,
                Expr::variable(a, int.clone()),
                Expr::variable(b, int.clone()),
                SemanticType::boolean(),
            )),
            then_branch: Box::new(Expr::variable(a, int.clone())),
            else_branch: Some(Box::new(Expr::variable(b, int.clone()))),
        },
        int.clone(),
    );

    let file = p.file(
        "expr.jet",
        vec![
            Declaration::Class(class_decl(cell, vec![Declaration::Property(property_decl(x, Some(Expr::int(0))))])),
            Declaration::Function(function_decl(
                pick,
                vec![ParameterDecl::new(picked)],
                FunctionBody::Expression(Expr::variable(picked, cell_type.clone())),
            )),
            Declaration::Function(function_decl(bump, vec![ParameterDecl::new(c)], FunctionBody::Block(bump_body))),
            Declaration::Function(function_decl(
                max,
                vec![ParameterDecl::new(a), ParameterDecl::new(b)],
                FunctionBody::Expression(max_body),
            )),
            Declaration::Function(function_decl(is_one, vec![ParameterDecl::new(one_x)], FunctionBody::Expression(is_one_body))),
            Declaration::Function(function_decl(
                present,
                vec![ParameterDecl::new(present_x)],
                FunctionBody::Expression(present_body),
            )),
            Declaration::Function(function_decl(
                differs,
                vec![ParameterDecl::new(left), ParameterDecl::new(right)],
                FunctionBody::Expression(differs_body),
            )),
        ],
    );
    let program = p.finish(vec![file]);
    jetgen::generate_files(&program.files, program.bindings, Config::default())
}

#[test]
fn test_receiver_is_evaluated_once_per_update() -> Result<()> {
    let factory = generate()?;
    let facade = class(&factory, FACADE);
    let bump = method(facade, "bump", &format!("(L{};)I", CELL));

    let pick = format!("{}.pick", FACADE);
    let get = format!("{}.getX", CELL);
    let set = format!("{}.setX", CELL);
    assert_eq!(
        calls(bump),
        vec![pick.clone(), get.clone(), set.clone(), pick, get, set]
    );

    let insns = code(bump);
    // one DUP of the receiver for each read-modify-write
    assert_eq!(insns.iter().filter(|i| **i == Insn::Op(DUP)).count(), 2, "{:?}", insns);
    // the old value of x++ is kept beneath the receiver
    assert!(insns.contains(&Insn::Op(DUP_X1)), "{:?}", insns);
    assert_eq!(insns.last(), Some(&Insn::Op(IRETURN)));
    Ok(())
}

#[test]
fn test_comparison_jumps_directly() -> Result<()> {
    let factory = generate()?;
    let facade = class(&factory, FACADE);
    let max = method(facade, "max", "(II)I");

    let insns = code(max);
    assert_eq!(&insns[..2], &[Insn::Var(ILOAD, 0), Insn::Var(ILOAD, 1)]);
    assert!(matches!(insns[2], Insn::Jump(op, _) if op == IF_ICMPLE), "{:?}", insns);
    // no boolean is materialized for the condition
    assert!(!insns.contains(&Insn::Op(ICONST_0)));
    assert!(!insns.contains(&Insn::Op(ICONST_1)));
    Ok(())
}

#[test]
fn test_public_class_property_uses_accessors() -> Result<()> {
    let factory = generate()?;
    let cell = class(&factory, CELL);

    let field = cell.field("x").expect("backing field");
    assert_eq!(field.descriptor, "I");
    method(cell, "getX", "()I");
    method(cell, "setX", "(I)V");
    let init = method(cell, "<init>", "()V");
    assert_eq!(calls(init), vec!["java/lang/Object.<init>".to_string()]);
    assert_eq!(field_accesses(init), vec![format!("{}.x", CELL)]);
    Ok(())
}

#[test]
fn test_nullable_equality_boxes_the_primitive_side() -> Result<()> {
    let factory = generate()?;
    let facade = class(&factory, FACADE);
    let is_one = method(facade, "isOne", "(Ljava/lang/Integer;)Z");

    // the nullable side is never unboxed
    assert_eq!(
        calls(is_one),
        vec!["java/lang/Integer.valueOf".to_string(), "jet/runtime/Intrinsics.areEqual".to_string()]
    );
    let insns = code(is_one);
    assert_eq!(insns[0], Insn::Var(ALOAD, 0));
    assert_eq!(insns.last(), Some(&Insn::Op(IRETURN)));
    Ok(())
}

#[test]
fn test_null_check_jumps_directly() -> Result<()> {
    let factory = generate()?;
    let facade = class(&factory, FACADE);
    let present = method(facade, "present", "(Ljava/lang/Integer;)I");

    let insns = code(present);
    assert_eq!(insns[0], Insn::Var(ALOAD, 0));
    assert!(matches!(insns[1], Insn::Jump(op, _) if op == IFNULL), "{:?}", insns);
    assert!(calls(present).is_empty());
    Ok(())
}

#[test]
fn test_negated_equality_inverts_the_jump() -> Result<()> {
    let factory = generate()?;
    let facade = class(&factory, FACADE);
    let differs = method(facade, "differs", "(Ljava/lang/Integer;Ljava/lang/Integer;)I");

    let insns = code(differs);
    assert_eq!(&insns[..2], &[Insn::Var(ALOAD, 0), Insn::Var(ALOAD, 1)]);
    assert!(matches!(&insns[2], Insn::Method { name, .. } if name == "areEqual"), "{:?}", insns);
    // `a != b` leaves the else branch when the values are equal
    assert!(matches!(insns[3], Insn::Jump(op, _) if op == IFNE), "{:?}", insns);
    Ok(())
}
