mod common;

use common::*;
use jetgen::codegen::defs::access::*;
use jetgen::codegen::insn::Insn;
use jetgen::codegen::opcodes::*;
use jetgen::{Config, Result};

const COUNTER: &str = "demo/objects/Counter";
const FACADE: &str = "demo/objects/namespace";
const ANONYMOUS: &str = "demo/objects/namespace$1";

#[test]
fn test_object_declaration_singleton() -> Result<()> {
    let factory = generate_sample("objects", Config::default())?;
    let counter = class(&factory, COUNTER);

    assert!(has_flag(counter.access, ACC_FINAL));
    let instance = counter.field("$instance").expect("instance field");
    assert_eq!(instance.descriptor, format!("L{};", COUNTER));
    assert_eq!(instance.access, ACC_PUBLIC | ACC_STATIC | ACC_FINAL);

    let init = method(counter, "<init>", "()V");
    assert!(has_flag(init.access, ACC_PRIVATE));

    let clinit = method(counter, "<clinit>", "()V");
    assert_eq!(
        code(clinit),
        vec![
            Insn::Type(NEW, COUNTER.to_string()),
            Insn::Op(DUP),
            Insn::Method {
                opcode: INVOKESPECIAL,
                owner: COUNTER.to_string(),
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
                interface: false,
            },
            Insn::Field {
                opcode: PUTSTATIC,
                owner: COUNTER.to_string(),
                name: "$instance".to_string(),
                descriptor: format!("L{};", COUNTER),
            },
            Insn::Op(RETURN),
        ]
    );
    Ok(())
}

#[test]
fn test_object_members_are_instance_members() -> Result<()> {
    let factory = generate_sample("objects", Config::default())?;
    let counter = class(&factory, COUNTER);

    let next = method(counter, "next", "()I");
    assert!(!has_flag(next.access, ACC_STATIC));
    let total = counter.field("total").expect("total field");
    assert!(has_flag(total.access, ACC_PRIVATE));
    assert!(!has_flag(total.access, ACC_FINAL));
    method(counter, "getTotal", "()I");
    method(counter, "setTotal", "(I)V");

    // the initializer of `total` runs in the constructor
    let init = method(counter, "<init>", "()V");
    assert_eq!(field_accesses(init), vec![format!("{}.total", COUNTER)]);
    Ok(())
}

#[test]
fn test_outside_access_goes_through_instance_field() -> Result<()> {
    let factory = generate_sample("objects", Config::default())?;
    let facade = class(&factory, FACADE);
    let twice = method(facade, "twice", "()I");

    let instance = format!("{}.$instance", COUNTER);
    assert_eq!(field_accesses(twice), vec![instance.clone(), instance]);
    let next = format!("{}.next", COUNTER);
    assert_eq!(calls(twice), vec![next.clone(), next]);
    // the first result is dropped
    assert!(code(twice).contains(&Insn::Op(POP)));
    Ok(())
}

#[test]
fn test_object_literal_captures_parameter() -> Result<()> {
    let factory = generate_sample("objects", Config::default())?;
    let anonymous = class(&factory, ANONYMOUS);

    assert_eq!(anonymous.super_name, "java/lang/Object");
    assert!(has_flag(anonymous.access, ACC_FINAL));
    let captured = anonymous.field("$1").expect("captured parameter");
    assert_eq!(captured.descriptor, "I");

    let init = method(anonymous, "<init>", "(I)V");
    assert!(has_flag(init.access, ACC_PUBLIC));
    assert_eq!(field_accesses(init), vec![format!("{}.$1", ANONYMOUS)]);

    let value = method(anonymous, "value", "()I");
    assert_eq!(field_accesses(value), vec![format!("{}.$1", ANONYMOUS)]);
    assert!(code(value).contains(&Insn::Op(IADD)));
    Ok(())
}

#[test]
fn test_object_literal_is_instantiated_in_place() -> Result<()> {
    let factory = generate_sample("objects", Config::default())?;
    let facade = class(&factory, FACADE);
    let offset = method(facade, "offset", "(I)Ljava/lang/Object;");

    let insns = code(offset);
    assert_eq!(insns[0], Insn::Type(NEW, ANONYMOUS.to_string()));
    assert_eq!(insns[1], Insn::Op(DUP));
    assert_eq!(insns[2], Insn::Var(ILOAD, 0));
    assert_eq!(calls(offset), vec![format!("{}.<init>", ANONYMOUS)]);
    assert_eq!(insns.last(), Some(&Insn::Op(ARETURN)));
    Ok(())
}
