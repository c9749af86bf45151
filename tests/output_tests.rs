mod common;

use common::*;
use jetgen::ast::*;
use jetgen::codegen::defs::MAGIC;
use jetgen::samples::{function_decl, property_decl, ProgramBuilder};
use jetgen::{BuiltinsMapping, Config, Error, FailurePolicy, OutputMode, Result};

#[test]
fn test_binary_output() -> Result<()> {
    let factory = generate_sample("greeter", Config::default())?;
    assert_eq!(factory.mode(), OutputMode::Binary);

    let files = factory.files();
    assert!(files.contains(&"demo/greeter/namespace.class".to_string()), "{:?}", files);
    let bytes = factory.as_bytes("demo/greeter/namespace.class")?;
    assert_eq!(&bytes[..4], &MAGIC.to_be_bytes());
    // major version follows the configured target
    assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 50);

    match factory.as_text("demo/greeter/namespace.class") {
        Err(Error::OutputMode { requested, actual }) => {
            assert_eq!(requested, "text");
            assert_eq!(actual, "binary");
        }
        other => panic!("expected output mode mismatch, got {:?}", other.map(str::len)),
    }
    Ok(())
}

#[test]
fn test_text_output() -> Result<()> {
    let config = Config::default().with_output_mode(OutputMode::Text);
    let factory = generate_sample("objects", config)?;

    let files = factory.files();
    assert!(files.iter().all(|f| f.ends_with(".txt")), "{:?}", files);
    let listing = factory.as_text("demo/objects/Counter.txt")?;
    assert!(listing.contains("public final class demo/objects/Counter extends java/lang/Object"), "{}", listing);
    assert!(listing.contains("$instance"));
    assert!(listing.contains("<clinit>"));
    assert!(listing.contains("PUTSTATIC demo/objects/Counter.$instance"), "{}", listing);

    assert!(matches!(factory.as_bytes("demo/objects/Counter.txt"), Err(Error::OutputMode { .. })));
    Ok(())
}

#[test]
fn test_write_to_directory() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let dir = tempfile::tempdir()?;

    let written = factory.write_to(dir.path())?;
    assert_eq!(written, factory.files().len());
    for file in factory.files() {
        let path = dir.path().join(&file);
        assert!(path.is_file(), "missing {}", path.display());
    }
    let bytes = std::fs::read(dir.path().join("demo/shapes/Shape$$TImpl.class"))?;
    assert_eq!(&bytes[..4], &MAGIC.to_be_bytes());
    Ok(())
}

#[test]
fn test_classes_are_listed_in_generation_order() -> Result<()> {
    let factory = generate_sample("shapes", Config::default())?;
    let names: Vec<&str> = factory.class_names().collect();
    let position = |name: &str| names.iter().position(|n| *n == name).expect(name);

    // the holder is finished right after its interface
    assert_eq!(position("demo/shapes/Shape") + 1, position("demo/shapes/Shape$$TImpl"));
    // literal classes are finished before the class creating them
    assert!(position("demo/shapes/Square$1") < position("demo/shapes/Square"));
    Ok(())
}

/// Two files of one namespace; `bad.jet` uses `break` outside of a loop
fn program_with_failing_file() -> (Vec<JetFile>, BindingContext) {
    let mut p = ProgramBuilder::new("demo.failing");
    let ns = p.namespace();
    let good = p.function(ns, "good", SemanticType::int());
    let bad = p.function(ns, "bad", SemanticType::Unit);

    let good_file = p.file(
        "good.jet",
        vec![Declaration::Function(function_decl(good, Vec::new(), FunctionBody::Expression(Expr::int(1))))],
    );
    let bad_file = p.file(
        "bad.jet",
        vec![Declaration::Function(function_decl(
            bad,
            Vec::new(),
            FunctionBody::Block(vec![Stmt::Break { location: SourceLocation::new("bad.jet", 2, 5) }]),
        ))],
    );
    let program = p.finish(vec![bad_file, good_file]);
    (program.files, program.bindings)
}

#[test]
fn test_abort_policy_stops_at_first_failure() {
    init_logging();
    let (files, bindings) = program_with_failing_file();
    let error = jetgen::generate_files(&files, bindings, Config::default())
        .err()
        .expect("generation should fail");

    assert!(matches!(error, Error::Declaration { .. }), "{}", error);
    match error.root_cause() {
        Error::Unsupported { construct, location } => {
            assert_eq!(construct, "break outside of a loop");
            assert_eq!(location.line, 2);
        }
        other => panic!("unexpected root cause {}", other),
    }
}

#[test]
fn test_record_policy_keeps_going() -> Result<()> {
    init_logging();
    let (files, bindings) = program_with_failing_file();
    let config = Config::default().with_failure_policy(FailurePolicy::RecordAndContinue);
    let factory = jetgen::generate_files(&files, bindings, config)?;

    let failures = factory.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].file, "bad.jet");
    assert!(!failures[0].error.is_internal());

    let facade = class(&factory, "demo/failing/namespace");
    method(facade, "good", "()I");
    assert!(facade.method("bad", "()V").is_none());
    Ok(())
}

#[test]
fn test_compile_reports_recorded_failures() {
    init_logging();
    let (files, bindings) = program_with_failing_file();
    let config = Config::default().with_failure_policy(FailurePolicy::RecordAndContinue);

    match jetgen::compile(&files, bindings, config) {
        Err(Error::Compilation { failures }) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].to_string().starts_with("bad.jet: "));
        }
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("compile should report the failing file"),
    }
}

#[test]
fn test_builtins_disabled_maps_to_own_classes() -> Result<()> {
    init_logging();
    let mut p = ProgramBuilder::new("jet");
    let ns = p.namespace();
    let string = SemanticType::string();
    let name = p.property(ns, "name", string.clone(), false);
    let id = p.function(ns, "id", string.clone());
    let s = p.parameter(id, "s", string.clone());

    let file = p.file(
        "Builtins.jet",
        vec![
            Declaration::Property(property_decl(name, Some(Expr::string("x")))),
            Declaration::Function(function_decl(
                id,
                vec![ParameterDecl::new(s)],
                FunctionBody::Expression(Expr::variable(s, string)),
            )),
        ],
    );
    let program = p.finish(vec![file]);
    let config = Config::default().with_builtins_mapping(BuiltinsMapping::Disabled);
    let factory = jetgen::generate_files(&program.files, program.bindings, config)?;

    let facade = class(&factory, "jet/namespace");
    assert_eq!(facade.field("name").expect("field").descriptor, "Ljet/String;");
    method(facade, "id", "(Ljet/String;)Ljet/String;");
    method(facade, "getName", "()Ljet/String;");
    Ok(())
}

#[test]
fn test_signature_annotations_follow_config() -> Result<()> {
    let with = generate_sample("greeter", Config::default())?;
    let greet = method(class(&with, "demo/greeter/namespace"), "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
    assert!(greet.annotations.iter().any(|a| a.descriptor == "Ljet/runtime/typeinfo/JetMethod;"));
    assert_eq!(greet.parameter_annotations.len(), 2);

    let without = generate_sample("greeter", Config::default().with_signature_annotations(false))?;
    let greet = method(class(&without, "demo/greeter/namespace"), "greet", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;");
    assert!(greet.annotations.is_empty());
    assert!(greet.parameter_annotations.is_empty());
    Ok(())
}

#[test]
fn test_oversized_string_constant_fails() {
    init_logging();
    let mut p = ProgramBuilder::new("demo.large");
    let ns = p.namespace();
    let text = p.function(ns, "text", SemanticType::string());
    let file = p.file(
        "large.jet",
        vec![Declaration::Function(function_decl(
            text,
            Vec::new(),
            FunctionBody::Expression(Expr::string("x".repeat(70_000))),
        ))],
    );
    let program = p.finish(vec![file]);

    let error = jetgen::generate_files(&program.files, program.bindings, Config::default())
        .err()
        .expect("a 70000 byte constant cannot be written");
    assert!(error.root_cause().is_internal(), "{}", error);
    assert!(error.root_cause().to_string().contains("exceeds 65535"), "{}", error);
}

/// `a.jet` declares `total`, `ok` and a failing `bad`; `b.jet` declares `other`
fn program_with_partly_failing_file() -> (Vec<JetFile>, BindingContext) {
    let mut p = ProgramBuilder::new("demo.parts");
    let ns = p.namespace();
    let int = SemanticType::int();
    let total = p.property(ns, "total", int.clone(), false);
    let ok = p.function(ns, "ok", int.clone());
    let bad = p.function(ns, "bad", SemanticType::Unit);
    let other = p.function(ns, "other", int);

    let a = p.file(
        "a.jet",
        vec![
            Declaration::Property(property_decl(total, Some(Expr::int(3)))),
            Declaration::Function(function_decl(ok, Vec::new(), FunctionBody::Expression(Expr::int(1)))),
            Declaration::Function(function_decl(
                bad,
                Vec::new(),
                FunctionBody::Block(vec![Stmt::Break { location: SourceLocation::new("a.jet", 4, 5) }]),
            )),
        ],
    );
    let b = p.file(
        "b.jet",
        vec![Declaration::Function(function_decl(other, Vec::new(), FunctionBody::Expression(Expr::int(2))))],
    );
    let program = p.finish(vec![a, b]);
    (program.files, program.bindings)
}

#[test]
fn test_failed_file_leaves_nothing_on_the_facade() -> Result<()> {
    init_logging();
    for parts in [false, true] {
        let (files, bindings) = program_with_partly_failing_file();
        let config = Config::default()
            .with_failure_policy(FailurePolicy::RecordAndContinue)
            .with_namespace_parts(parts);
        let factory = jetgen::generate_files(&files, bindings, config)?;

        let failures = factory.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "a.jet");

        let facade = class(&factory, "demo/parts/namespace");
        method(facade, "other", "()I");
        assert!(facade.method("ok", "()I").is_none(), "parts: {}", parts);
        assert!(facade.method("getTotal", "()I").is_none());
        assert!(facade.field("total").is_none());
        assert!(facade.method("<clinit>", "()V").is_none());

        // no forwarder may point at a part that was never finished
        assert!(factory.model("demo/parts/namespace$src$a").is_none());
        if parts {
            class(&factory, "demo/parts/namespace$src$b");
            let other = method(facade, "other", "()I");
            assert_eq!(calls(other), vec!["demo/parts/namespace$src$b.other".to_string()]);
        }
    }
    Ok(())
}

fn mentions(bytes: &[u8], name: &str) -> bool {
    bytes.windows(name.len()).any(|w| w == name.as_bytes())
}

#[test]
fn test_debug_info_follows_config() -> Result<()> {
    const SQUARE: &str = "demo/shapes/Square.class";

    let with = generate_sample("shapes", Config::default())?;
    let bytes = with.as_bytes(SQUARE)?;
    assert!(mentions(bytes, "LineNumberTable"));
    assert!(mentions(bytes, "LocalVariableTable"));
    assert!(mentions(bytes, "SourceFile"));

    let without = generate_sample("shapes", Config::default().with_debug_info(false))?;
    let bytes = without.as_bytes(SQUARE)?;
    assert!(!mentions(bytes, "LineNumberTable"));
    assert!(!mentions(bytes, "LocalVariableTable"));
    assert!(!mentions(bytes, "SourceFile"));

    let reveal = method(class(&without, "demo/shapes/Square"), "reveal", "()I");
    let body = reveal.code.as_ref().expect("reveal has code");
    assert!(!body.insns.iter().any(|i| matches!(i, jetgen::codegen::insn::Insn::Line(..))));
    Ok(())
}
