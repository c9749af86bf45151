mod common;

use common::*;
use jetgen::ast::*;
use jetgen::codegen::defs::access::*;
use jetgen::codegen::insn::Insn;
use jetgen::codegen::opcodes::NEW;
use jetgen::codegen::ClassFileFactory;
use jetgen::samples::{class_decl, function_decl, property_decl, property_ref, ProgramBuilder};
use jetgen::{Config, Result};

const FACADE: &str = "demo/counter/namespace";
const LITERAL: &str = "demo/counter/namespace$1";
const INT_CELL: &str = "jet/runtime/SharedVar$Int";

#[test]
fn test_literal_class_shape() -> Result<()> {
    let factory = generate_sample("counter", Config::default())?;
    let literal = class(&factory, LITERAL);

    assert_eq!(literal.super_name, "jet/FunctionImpl1");
    assert!(has_flag(literal.access, ACC_FINAL));
    assert_eq!(literal.source_file.as_deref(), Some("counter.jet"));

    let typed = method(literal, "invoke", "(I)I");
    assert!(!has_flag(typed.access, ACC_BRIDGE));
    let bridge = method(literal, "invoke", "(Ljava/lang/Object;)Ljava/lang/Object;");
    assert!(has_flag(bridge.access, ACC_BRIDGE));
    assert!(has_flag(bridge.access, ACC_SYNTHETIC));
    assert!(calls(bridge).contains(&format!("{}.invoke", LITERAL)));
    Ok(())
}

#[test]
fn test_captures_are_numbered_in_reference_order() -> Result<()> {
    let factory = generate_sample("counter", Config::default())?;
    let literal = class(&factory, LITERAL);

    let names: Vec<&str> = literal.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["$1", "$2"]);

    // the written var travels as its cell, the val by value
    let shared = literal.field("$1").expect("$1");
    assert_eq!(shared.descriptor, format!("L{};", INT_CELL));
    let plain = literal.field("$2").expect("$2");
    assert_eq!(plain.descriptor, "I");
    for field in &literal.fields {
        assert!(has_flag(field.access, ACC_PRIVATE));
        assert!(has_flag(field.access, ACC_FINAL));
    }

    method(literal, "<init>", &format!("(L{};I)V", INT_CELL));
    Ok(())
}

#[test]
fn test_shared_var_is_read_through_its_cell() -> Result<()> {
    let factory = generate_sample("counter", Config::default())?;
    let literal = class(&factory, LITERAL);
    let invoke = method(literal, "invoke", "(I)I");

    let fields = field_accesses(invoke);
    assert!(fields.contains(&format!("{}.$1", LITERAL)), "{:?}", fields);
    assert!(fields.contains(&format!("{}.$2", LITERAL)), "{:?}", fields);
    assert!(fields.contains(&format!("{}.ref", INT_CELL)), "{:?}", fields);
    Ok(())
}

#[test]
fn test_enclosing_function_allocates_cell_and_literal() -> Result<()> {
    let factory = generate_sample("counter", Config::default())?;
    let facade = class(&factory, FACADE);
    let count = method(facade, "count", "(I)I");

    let calls = calls(count);
    let cell = calls.iter().position(|c| c == &format!("{}.<init>", INT_CELL)).expect("cell allocated");
    let literal = calls.iter().position(|c| c == &format!("{}.<init>", LITERAL)).expect("literal created");
    assert!(cell < literal);
    assert!(calls.contains(&"jet/Function1.invoke".to_string()), "{:?}", calls);
    assert!(field_accesses(count).contains(&format!("{}.ref", INT_CELL)));
    Ok(())
}

#[test]
fn test_literal_counter_is_per_outer_class() -> Result<()> {
    let factory = generate_sample("counter", Config::default())?;
    let names: Vec<&str> = factory.class_names().collect();
    assert!(names.contains(&LITERAL));
    assert!(!names.iter().any(|n| n.ends_with("$2")));
    Ok(())
}

const VAULT: &str = "demo/vault/Vault";

/// ```text
/// package demo.vault
///
/// class Vault {
///     private val code = 7
///     fun peek(): Int {
///         val f = { code }
///         return f() as Int
///     }
/// }
/// ```
fn generate_vault(config: Config) -> Result<ClassFileFactory> {
    init_logging();
    let mut p = ProgramBuilder::new("demo.vault");
    let ns = p.namespace();
    let int = SemanticType::int();
    let vault = p.class(ns, "Vault", ClassKind::Class, Modality::Final);
    let code = p.add_property(PropertyDescriptor {
        name: "code".to_string(),
        container: vault,
        visibility: Visibility::Private,
        modality: Modality::Final,
        ty: int.clone(),
        mutable: false,
        has_backing_field: true,
        custom_accessors: false,
    });
    let peek = p.function(vault, "peek", int.clone());
    let f_type = SemanticType::Function { parameters: Vec::new(), return_type: Box::new(int.clone()) };
    let f = p.local(peek, "f", f_type.clone(), false);
    let literal = p.literal(peek, int.clone());

    let literal_expr = Expr::new(
        ExprKind::FunctionLiteral(Box::new(FunctionLiteral {
            descriptor: literal,
            parameters: Vec::new(),
            body: vec![Stmt::Expr(property_ref(code, int.clone()))],
        })),
        f_type.clone(),
    )
    .at(SourceLocation::new("vault.jet", 6, 17));
    let peek_body = vec![
        Stmt::local(f, literal_expr),
        Stmt::ret(Some(Expr::new(
            ExprKind::Cast {
                expr: Box::new(Expr::new(
                    ExprKind::Invoke { callee: Box::new(Expr::variable(f, f_type)), arguments: Vec::new() },
                    SemanticType::any().make_nullable(),
                )),
                ty: int.clone(),
            },
            int,
        ))),
    ];
    let file = p.file(
        "vault.jet",
        vec![Declaration::Class(class_decl(
            vault,
            vec![
                Declaration::Property(property_decl(code, Some(Expr::int(7)))),
                Declaration::Function(function_decl(peek, Vec::new(), FunctionBody::Block(peek_body))),
            ],
        ))],
    );
    let program = p.finish(vec![file]);
    jetgen::generate_files(&program.files, program.bindings, config)
}

#[test]
fn test_private_val_reached_through_getter_accessor() -> Result<()> {
    let factory = generate_vault(Config::default())?;
    let vault = class(&factory, VAULT);

    let getter = method(vault, "getCode$b$0", &format!("(L{};)I", VAULT));
    assert!(has_flag(getter.access, ACC_STATIC));
    assert!(has_flag(getter.access, ACC_SYNTHETIC));
    assert_eq!(field_accesses(getter), vec![format!("{}.code", VAULT)]);
    // a val gets no setter unless asked for
    assert!(vault.methods.iter().all(|m| !m.name.starts_with("setCode")));

    let invoke = method(class(&factory, &format!("{}$1", VAULT)), "invoke", "()I");
    assert!(calls(invoke).contains(&format!("{}.getCode$b$0", VAULT)), "{:?}", calls(invoke));
    Ok(())
}

#[test]
fn test_read_only_accessor_setter_follows_config() -> Result<()> {
    let factory = generate_vault(Config::default().with_read_only_accessor_setters(true))?;
    let vault = class(&factory, VAULT);

    method(vault, "getCode$b$0", &format!("(L{};)I", VAULT));
    let setter = method(vault, "setCode$b$0", &format!("(L{};I)V", VAULT));
    // nothing to write for a val
    assert!(field_accesses(setter).is_empty());
    Ok(())
}

#[test]
fn test_literal_allocation_carries_its_line() -> Result<()> {
    let factory = generate_vault(Config::default())?;
    let peek = method(class(&factory, VAULT), "peek", "()I");
    let insns: Vec<&Insn> = peek
        .code
        .as_ref()
        .expect("peek has code")
        .insns
        .iter()
        .filter(|i| !matches!(i, Insn::Label(_)))
        .collect();

    let new = insns
        .iter()
        .position(|i| **i == Insn::Type(NEW, format!("{}$1", VAULT)))
        .expect("literal allocated");
    assert!(matches!(insns[new - 1], Insn::Line(6, _)), "{:?}", insns);
    Ok(())
}
