//! End-to-end rewriting through the registry: signature-attached transforms
//! applied at the load boundary.

use sigweave::{
    CallSignature, Constant, FinderRegistry, InjectEntry, Instruction, InterceptCall, InvokeKind,
    LoadEvent, MethodSignature, ModuleBuilder, ModuleSignature, ReplaceBody, SubstConstants,
    SubstLiteral, TypeDesc,
};

fn brand_image(module_name: &str) -> Vec<u8> {
    let module = ModuleBuilder::new(module_name)
        .public()
        .constant_member(
            "v",
            "S",
            sigweave::MemberFlags::STATIC,
            Constant::str("vanilla"),
        )
        .unwrap()
        .method("a", |m| {
            m.returns(TypeDesc::Str).public().body(|asm| {
                asm.load_str("vanilla")?.ret_value()?;
                Ok(())
            })
        })
        .unwrap()
        .method("b", |m| {
            let owner = module_name.to_string();
            m.public().body(move |asm| {
                asm.load_this()?
                    .invoke(InvokeKind::Virtual, &owner, "a", "()S")?
                    .pop()?
                    .ret()?;
                Ok(())
            })
        })
        .unwrap()
        .build()
        .unwrap();
    sigweave::write_module(&module).unwrap()
}

#[test]
fn member_transform_forces_a_fixed_return() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_constant("vanilla")
                .method(
                    "name",
                    MethodSignature::new().arity(0).returns(TypeDesc::Str),
                )
                .member_transform("name", ReplaceBody::fixed_return(Constant::str("sigweave")))
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .expect("an interested finder produces a rewrite");

    let module = sigweave::parse_module(&rewritten).unwrap();
    assert_eq!(
        module.exec_member("a").unwrap().code,
        vec![
            Instruction::LoadConst(Constant::str("sigweave")),
            Instruction::ReturnValue,
        ]
    );
    // The untargeted member is untouched.
    assert_eq!(module.exec_member("b").unwrap().code.len(), 4);
}

#[test]
fn later_matching_builds_are_never_rewritten() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_constant("vanilla")
                .method(
                    "name",
                    MethodSignature::new().arity(0).returns(TypeDesc::Str),
                )
                .member_transform("name", ReplaceBody::fixed_return(Constant::str("patched")))
                .build()
                .unwrap(),
        )
        .unwrap();

    let first = brand_image("obf/br");
    assert!(registry.transform(&LoadEvent::new("obf/br", &first)).is_some());

    // A second build with the same fingerprint under a different identity
    // loads after the binding is made; it passes through untouched.
    let second = brand_image("obf/zz");
    assert!(registry.transform(&LoadEvent::new("obf/zz", &second)).is_none());

    // The bound module itself is still rewritten on redefinition.
    let replay = LoadEvent {
        loader: None,
        name: "obf/br",
        previous_version: Some(1),
        protection: None,
        bytes: &first,
    };
    assert!(registry.transform(&replay).is_some());
}

#[test]
fn constant_substitution_reaches_inline_and_data_constants() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_constant("vanilla")
                .transform(
                    SubstConstants::new().map(Constant::str("vanilla"), Constant::str("custom")),
                )
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .unwrap();
    let module = sigweave::parse_module(&rewritten).unwrap();

    assert!(!module.has_constant(&Constant::str("vanilla")));
    assert!(module.has_constant(&Constant::str("custom")));
    assert_eq!(
        module.data_member("v").unwrap().constant,
        Some(Constant::str("custom"))
    );
}

#[test]
fn literal_substitution_edits_inside_strings() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_containing("vanil")
                .transform(SubstLiteral::new("nilla", "nguard"))
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .unwrap();
    assert!(sigweave::parse_module(&rewritten)
        .unwrap()
        .has_constant(&Constant::str("vanguard")));
}

#[test]
fn entry_injection_and_call_interception_compose() {
    let probe = Instruction::Invoke(
        InvokeKind::Static,
        sigweave::MemberRef::new("probe/Trace", "enter", "()V"),
    );
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_constant("vanilla")
                .method("caller", MethodSignature::new().named("b"))
                .member_transform("caller", InjectEntry::new(vec![probe.clone()]))
                .member_transform(
                    "caller",
                    InterceptCall::new(CallSignature::new().named("a"))
                        .before(vec![Instruction::Dup])
                        .after(vec![Instruction::Nop]),
                )
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .unwrap();
    let module = sigweave::parse_module(&rewritten).unwrap();

    let code = &module.exec_member("b").unwrap().code;
    assert_eq!(code[0], probe);
    let call_at = code
        .iter()
        .position(|ins| matches!(ins, Instruction::Invoke(_, r) if r.name == "a"))
        .unwrap();
    assert_eq!(code[call_at - 1], Instruction::Dup);
    assert_eq!(code[call_at + 1], Instruction::Nop);
}

#[test]
fn pipelines_from_multiple_finders_merge_in_registration_order() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("first")
                .string_constant("vanilla")
                .transform(
                    SubstConstants::new().map(Constant::str("vanilla"), Constant::str("midway")),
                )
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ModuleSignature::builder("second")
                .string_constant("vanilla")
                .transform(
                    SubstConstants::new().map(Constant::str("midway"), Constant::str("final")),
                )
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .unwrap();
    assert!(sigweave::parse_module(&rewritten)
        .unwrap()
        .has_constant(&Constant::str("final")));
}

#[test]
fn rewritten_images_always_reparse() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("brand")
                .string_constant("vanilla")
                .method("name", MethodSignature::new().named("a"))
                .member_transform("name", ReplaceBody::default_return(&TypeDesc::Str))
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = brand_image("obf/br");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/br", &bytes))
        .unwrap();
    let module = sigweave::parse_module(&rewritten).unwrap();
    assert_eq!(
        module.exec_member("a").unwrap().code,
        vec![Instruction::LoadNull, Instruction::ReturnValue]
    );
}
