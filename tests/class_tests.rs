mod common;

use common::*;
use jetgen::codegen::defs::access::*;
use jetgen::codegen::insn::Insn;
use jetgen::codegen::opcodes::*;
use jetgen::{Config, Result};

const SHAPE: &str = "demo/shapes/Shape";
const SHAPE_IMPL: &str = "demo/shapes/Shape$$TImpl";
const RECT: &str = "demo/shapes/Rect";
const SQUARE: &str = "demo/shapes/Square";

#[test]
fn test_trait_becomes_interface() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let shape = class(&factory, SHAPE);

    assert!(has_flag(shape.access, ACC_INTERFACE));
    assert!(has_flag(shape.access, ACC_ABSTRACT));
    assert_eq!(shape.super_name, "java/lang/Object");
    for m in &shape.methods {
        assert!(has_flag(m.access, ACC_ABSTRACT), "{} should be abstract", m.name);
        assert!(m.code.is_none());
    }
    method(shape, "area", "()I");
    method(shape, "describe", "()Ljava/lang/String;");
    Ok(())
}

#[test]
fn test_trait_bodies_live_in_static_holder() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let holder = class(&factory, SHAPE_IMPL);

    assert!(has_flag(holder.access, ACC_FINAL));
    let describe = method(holder, "describe", &format!("(L{};)Ljava/lang/String;", SHAPE));
    assert!(has_flag(describe.access, ACC_STATIC));
    assert!(calls(describe).contains(&format!("{}.area", SHAPE)));
    // abstract members have no body to hold
    assert!(holder.methods.iter().all(|m| m.name != "area"));
    Ok(())
}

#[test]
fn test_class_forwards_inherited_trait_body() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let rect = class(&factory, RECT);

    assert_eq!(rect.interfaces, vec![SHAPE.to_string()]);
    assert!(!has_flag(rect.access, ACC_FINAL));
    let forwarder = method(rect, "describe", "()Ljava/lang/String;");
    assert!(!has_flag(forwarder.access, ACC_STATIC));
    assert_eq!(calls(forwarder), vec![format!("{}.describe", SHAPE_IMPL)]);
    assert_eq!(code(forwarder).first(), Some(&Insn::Var(ALOAD, 0)));

    // the subclass inherits the forwarder instead of getting its own
    let square = class(&factory, SQUARE);
    assert!(square.method("describe", "()Ljava/lang/String;").is_none());
    Ok(())
}

#[test]
fn test_constructor_properties() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let rect = class(&factory, RECT);

    for name in ["width", "height"] {
        let field = rect.field(name).expect("backing field");
        assert_eq!(field.descriptor, "I");
        assert!(has_flag(field.access, ACC_PRIVATE));
        assert!(has_flag(field.access, ACC_FINAL));
    }
    method(rect, "getWidth", "()I");
    method(rect, "getHeight", "()I");
    assert!(rect.method("setWidth", "(I)V").is_none());

    let init = method(rect, "<init>", "(II)V");
    assert_eq!(calls(init), vec!["java/lang/Object.<init>".to_string()]);
    assert_eq!(field_accesses(init), vec![format!("{}.width", RECT), format!("{}.height", RECT)]);
    Ok(())
}

#[test]
fn test_super_constructor_call_and_initializers() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let square = class(&factory, SQUARE);

    assert_eq!(square.super_name, RECT);
    let init = method(square, "<init>", "(I)V");
    let insns = code(init);
    assert_eq!(&insns[..3], &[Insn::Var(ALOAD, 0), Insn::Var(ILOAD, 1), Insn::Var(ILOAD, 1)]);
    assert_eq!(calls(init), vec![format!("{}.<init>", RECT)]);
    assert_eq!(field_accesses(init), vec![format!("{}.label", SQUARE)]);
    assert_eq!(insns.last(), Some(&Insn::Op(RETURN)));

    let label = square.field("label").expect("label field");
    assert!(!has_flag(label.access, ACC_FINAL));
    method(square, "getLabel", "()Ljava/lang/String;");
    method(square, "setLabel", "(Ljava/lang/String;)V");
    Ok(())
}

#[test]
fn test_private_member_reached_from_closure_through_accessor() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let square = class(&factory, SQUARE);
    let literal = class(&factory, "demo/shapes/Square$1");

    let secret = method(square, "secret", "()I");
    assert!(has_flag(secret.access, ACC_PRIVATE));

    let accessor = method(square, "secret$b$0", &format!("(L{};)I", SQUARE));
    assert!(has_flag(accessor.access, ACC_STATIC));
    assert!(has_flag(accessor.access, ACC_SYNTHETIC));
    assert_eq!(calls(accessor), vec![format!("{}.secret", SQUARE)]);
    assert!(code(accessor).iter().any(|i| matches!(i, Insn::Method { opcode, .. } if *opcode == INVOKESPECIAL)));

    // the closure holds the outer instance and calls the accessor with it
    assert_eq!(literal.super_name, "jet/FunctionImpl0");
    let outer = literal.field("this$0").expect("captured outer instance");
    assert_eq!(outer.descriptor, format!("L{};", SQUARE));
    let invoke = method(literal, "invoke", "()I");
    let calls = calls(invoke);
    assert!(calls.contains(&format!("{}.secret$b$0", SQUARE)), "{:?}", calls);
    assert!(calls.contains(&format!("{}.getWidth", RECT)), "{:?}", calls);
    assert!(!calls.contains(&format!("{}.secret", SQUARE)));
    Ok(())
}

#[test]
fn test_cast_of_invoke_result_unboxes() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let square = class(&factory, SQUARE);
    let reveal = method(square, "reveal", "()I");

    let insns = code(reveal);
    assert!(insns.contains(&Insn::Type(NEW, "demo/shapes/Square$1".to_string())));
    assert!(calls(reveal).contains(&"jet/Function0.invoke".to_string()));
    assert!(insns.contains(&Insn::Type(CHECKCAST, "java/lang/Number".to_string())), "{:?}", insns);
    assert!(calls(reveal).contains(&"java/lang/Number.intValue".to_string()));
    assert_eq!(insns.last(), Some(&Insn::Op(IRETURN)));
    Ok(())
}

#[test]
fn test_accessor_is_created_once_per_requester() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let square = class(&factory, SQUARE);
    let accessors: Vec<&str> = square
        .methods
        .iter()
        .filter(|m| m.name.contains("$b$"))
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(accessors, vec!["secret$b$0"]);
    Ok(())
}
