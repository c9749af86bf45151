mod common;

use common::*;
use jetgen::ast::*;
use jetgen::codegen::defs::access::*;
use jetgen::codegen::insn::{Insn, LdcValue};
use jetgen::codegen::opcodes::*;
use jetgen::samples::{function_decl, ProgramBuilder};
use jetgen::{Config, Error, FailurePolicy, Result};

const FACADE: &str = "demo/greeter/namespace";

#[test]
fn test_facade_holds_top_level_members() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    let facade = class(&factory, FACADE);

    assert_eq!(facade.super_name, "java/lang/Object");
    assert!(has_flag(facade.access, ACC_PUBLIC));
    assert!(has_flag(facade.access, ACC_FINAL));
    assert_eq!(facade.source_file.as_deref(), Some("greeter.jet"));

    let field = facade.field("greeting").expect("backing field");
    assert_eq!(field.descriptor, "Ljava/lang/String;");
    assert!(has_flag(field.access, ACC_STATIC));
    assert!(has_flag(field.access, ACC_FINAL));

    let getter = method(facade, "getGreeting", "()Ljava/lang/String;");
    assert!(has_flag(getter.access, ACC_STATIC));
    assert!(facade.method("setGreeting", "(Ljava/lang/String;)V").is_none());

    method(facade, "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
    method(facade, "main", "()Ljava/lang/String;");
    Ok(())
}

#[test]
fn test_static_initializer_runs_property_initializers() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    let facade = class(&factory, FACADE);
    let clinit = method(facade, "<clinit>", "()V");

    assert!(has_flag(clinit.access, ACC_STATIC));
    let insns = code(clinit);
    assert_eq!(insns.first(), Some(&Insn::Ldc(LdcValue::String("Hello".to_string()))));
    assert_eq!(field_accesses(clinit), vec![format!("{}.greeting", FACADE)]);
    assert_eq!(insns.last(), Some(&Insn::Op(RETURN)));
    Ok(())
}

#[test]
fn test_default_overload_and_mask() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    let facade = class(&factory, FACADE);

    let overload = method(
        facade,
        "greet$default",
        "(Ljava/lang/String;Ljava/lang/String;I)Ljava/lang/String;",
    );
    assert!(has_flag(overload.access, ACC_STATIC));
    assert!(has_flag(overload.access, ACC_SYNTHETIC));
    assert_eq!(calls(overload).last().map(String::as_str), Some("demo/greeter/namespace.greet"));
    // each default is guarded by its bit of the mask
    let masks: Vec<i32> = code(overload)
        .iter()
        .filter_map(|i| match i {
            Insn::Op(op) if (ICONST_0..=ICONST_5).contains(op) => Some(i32::from(*op) - i32::from(ICONST_0)),
            _ => None,
        })
        .collect();
    assert!(masks.contains(&1) && masks.contains(&2), "masks {:?}", masks);

    // greet(punctuation = "?") leaves the first parameter to its default
    let main = method(facade, "main", "()Ljava/lang/String;");
    let insns = code(main);
    assert_eq!(calls(main), vec!["demo/greeter/namespace.greet$default".to_string()]);
    let invoke = insns
        .iter()
        .position(|i| matches!(i, Insn::Method { name, .. } if name == "greet$default"))
        .expect("call of the overload");
    assert_eq!(insns[invoke - 1], Insn::Op(ICONST_1));
    assert_eq!(insns[invoke - 2], Insn::Ldc(LdcValue::String("?".to_string())));
    Ok(())
}

#[test]
fn test_extension_function_takes_receiver_first() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    let facade = class(&factory, FACADE);
    let twice = method(facade, "twice", "(I)I");

    assert!(has_flag(twice.access, ACC_STATIC));
    assert_eq!(
        code(twice),
        vec![Insn::Var(ILOAD, 0), Insn::Op(ICONST_2), Insn::Op(IMUL), Insn::Op(IRETURN)]
    );
    Ok(())
}

#[test]
fn test_template_concatenates_through_string_builder() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    let facade = class(&factory, FACADE);
    let greet = method(facade, "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");

    let calls = calls(greet);
    assert_eq!(calls.first().map(String::as_str), Some("java/lang/StringBuilder.<init>"));
    assert_eq!(calls.last().map(String::as_str), Some("java/lang/StringBuilder.toString"));
    assert_eq!(calls.iter().filter(|c| c.ends_with(".append")).count(), 4);
    Ok(())
}

#[test]
fn test_namespace_parts_move_bodies() -> Result<()> {
    let factory = generate_sample("greeter", Config::default().with_namespace_parts(true))?;
    let part_name = "demo/greeter/namespace$src$greeter";
    let part = class(&factory, part_name);
    let facade = class(&factory, FACADE);

    let body = method(part, "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
    assert!(has_flag(body.access, ACC_STATIC));
    assert!(part.method("greet$default", "(Ljava/lang/String;Ljava/lang/String;I)Ljava/lang/String;").is_none());

    let forwarder = method(facade, "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
    assert_eq!(calls(forwarder), vec![format!("{}.greet", part_name)]);
    method(facade, "greet$default", "(Ljava/lang/String;Ljava/lang/String;I)Ljava/lang/String;");

    // properties stay on the facade
    assert!(facade.field("greeting").is_some());
    assert!(part.field("greeting").is_none());

    // calls from the part still target the facade
    let main = method(part, "main", "()Ljava/lang/String;");
    assert_eq!(calls(main), vec![format!("{}.greet$default", FACADE)]);
    Ok(())
}

#[test]
fn test_classes_only_namespace_has_no_facade() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    assert!(factory.model("demo/shapes/namespace").is_none());
    assert!(factory.model("demo/shapes/Rect").is_some());
    Ok(())
}

/// `fun wide(p0: Int, ..., p<n-1>: Int = 0): Int = 0`
fn wide_program(count: usize) -> (Vec<JetFile>, BindingContext) {
    let mut p = ProgramBuilder::new("demo.wide");
    let ns = p.namespace();
    let int = SemanticType::int();
    let wide = p.function(ns, "wide", int.clone());
    let mut parameters = Vec::new();
    for index in 0..count {
        let name = format!("p{}", index);
        if index + 1 == count {
            let parameter = p.parameter_with_default(wide, &name, int.clone());
            parameters.push(ParameterDecl::with_default(parameter, Expr::int(0)));
        } else {
            parameters.push(ParameterDecl::new(p.parameter(wide, &name, int.clone())));
        }
    }
    let file = p.file(
        "wide.jet",
        vec![Declaration::Function(function_decl(wide, parameters, FunctionBody::Expression(Expr::int(0))))],
    );
    let program = p.finish(vec![file]);
    (program.files, program.bindings)
}

#[test]
fn test_default_mask_covers_thirty_two_parameters() -> Result<()> {
    init_logging();
    let (files, bindings) = wide_program(32);
    let factory = jetgen::generate_files(&files, bindings, Config::default())?;
    let facade = class(&factory, "demo/wide/namespace");
    let descriptor = format!("({}I)I", "I".repeat(32));
    let default = method(facade, "wide$default", &descriptor);
    // the last parameter owns the sign bit
    assert!(code(default).contains(&Insn::Ldc(LdcValue::Int(i32::MIN))), "{:?}", code(default));
    Ok(())
}

#[test]
fn test_too_many_defaulted_parameters_are_rejected() -> Result<()> {
    init_logging();
    let (files, bindings) = wide_program(33);
    let error = jetgen::generate_files(&files, bindings, Config::default())
        .err()
        .expect("33 parameters do not fit a default mask");
    match error.root_cause() {
        Error::Unsupported { construct, .. } => assert!(construct.contains("at most 32"), "{}", construct),
        other => panic!("unexpected root cause {}", other),
    }

    let (files, bindings) = wide_program(33);
    let config = Config::default().with_failure_policy(FailurePolicy::RecordAndContinue);
    let factory = jetgen::generate_files(&files, bindings, config)?;
    assert_eq!(factory.failures().len(), 1);
    let facade = class(&factory, "demo/wide/namespace");
    assert!(facade.methods.iter().all(|m| m.name != "wide" && m.name != "wide$default"));
    Ok(())
}
