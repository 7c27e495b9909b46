//! Registry behavior at the host boundary: configuration, fail-open
//! rewriting and the retransform path.

use std::sync::{Arc, Mutex};

use sigweave::{
    Constant, DataMember, FinderRegistry, HostRuntime, Instruction, LoadEvent, MemberDecl,
    MethodSignature, ModuleBuilder, ModuleHeader, ModuleSignature, ModuleSink, ModuleTransform,
    RegistryConfig, ReplaceBody, TypeDesc,
};

fn marker_image(module_name: &str, marker: &str) -> Vec<u8> {
    let module = ModuleBuilder::new(module_name)
        .public()
        .method("a", |m| {
            let marker = marker.to_string();
            m.returns(TypeDesc::Str).public().body(move |asm| {
                asm.load_str(&marker)?.ret_value()?;
                Ok(())
            })
        })
        .unwrap()
        .build()
        .unwrap();
    sigweave::write_module(&module).unwrap()
}

/// A transform that fails during emission, standing in for a buggy rewrite.
struct ExplodingTransform;

struct ExplodingSink;

impl ModuleSink for ExplodingSink {
    fn begin(&mut self, _header: &ModuleHeader) -> sigweave::Result<()> {
        Err(sigweave::Error::Emission("deliberate failure".to_string()))
    }

    fn data_member(&mut self, _member: &DataMember) -> sigweave::Result<()> {
        Ok(())
    }

    fn exec_member(&mut self, _decl: &MemberDecl, _code: &[Instruction]) -> sigweave::Result<()> {
        Ok(())
    }

    fn end(&mut self) -> sigweave::Result<()> {
        Ok(())
    }
}

impl ModuleTransform for ExplodingTransform {
    fn apply(&self, _downstream: Box<dyn ModuleSink>) -> Box<dyn ModuleSink> {
        Box::new(ExplodingSink)
    }
}

#[test]
fn platform_modules_are_never_offered() {
    let config = RegistryConfig::from_toml_str("platform_prefixes = [\"java/\", \"sun/\"]").unwrap();
    let registry = FinderRegistry::with_config(config);
    let finder = registry
        .register(
            ModuleSignature::builder("any")
                .string_constant("marker")
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = marker_image("java/lang/String", "marker");
    assert!(registry
        .transform(&LoadEvent::new("java/lang/String", &bytes))
        .is_none());
    assert!(finder.resolved().is_none());

    // The same image under a non-platform name is evaluated.
    let bytes = marker_image("obf/aa", "marker");
    registry.transform(&LoadEvent::new("obf/aa", &bytes));
    assert!(finder.resolved().is_some());
}

#[test]
fn broken_transforms_fail_open() {
    let registry = FinderRegistry::new();
    registry
        .register(
            ModuleSignature::builder("exploder")
                .string_constant("marker")
                .transform(ExplodingTransform)
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = marker_image("obf/aa", "marker");
    // The rewrite fails; the module is left untouched rather than broken.
    assert!(registry.transform(&LoadEvent::new("obf/aa", &bytes)).is_none());
}

#[test]
fn one_broken_finder_does_not_block_another() {
    let registry = FinderRegistry::new();
    // A lazy signature that always fails to rebuild.
    registry
        .register(ModuleSignature::lazy("broken", || {
            Err(sigweave::Error::Generation("deliberate".to_string()))
        }))
        .unwrap();
    registry
        .register(
            ModuleSignature::builder("healthy")
                .string_constant("marker")
                .method("name", MethodSignature::new().named("a"))
                .member_transform("name", ReplaceBody::fixed_return(Constant::str("patched")))
                .build()
                .unwrap(),
        )
        .unwrap();

    let bytes = marker_image("obf/aa", "marker");
    let rewritten = registry
        .transform(&LoadEvent::new("obf/aa", &bytes))
        .expect("the healthy finder still rewrites");
    assert!(sigweave::parse_module(&rewritten)
        .unwrap()
        .has_constant(&Constant::str("patched")));
}

#[test]
fn resolve_now_triggers_a_host_retransform() {
    struct RecordingHost(Mutex<Vec<String>>);
    impl HostRuntime for RecordingHost {
        fn retransform(&self, name: &str) -> sigweave::Result<()> {
            self.0
                .lock()
                .map_err(|_| sigweave::Error::LockError)?
                .push(name.to_string());
            Ok(())
        }
    }

    let registry = FinderRegistry::new();
    let host = Arc::new(RecordingHost(Mutex::new(Vec::new())));
    registry.install(host.clone()).unwrap();
    assert!(registry.install(host.clone()).is_err());

    let finder = registry
        .register(
            ModuleSignature::builder("late")
                .string_constant("marker")
                .method("name", MethodSignature::new().named("a"))
                .member_transform("name", ReplaceBody::fixed_return(Constant::str("patched")))
                .build()
                .unwrap(),
        )
        .unwrap();

    // The module loaded before the signature was registered; resolve it
    // against the already-loaded image and let the host replay the load.
    let bytes = marker_image("obf/aa", "marker");
    let module = sigweave::parse_module(&bytes).unwrap();
    assert!(registry.resolve_now(&finder, &module).unwrap());
    assert_eq!(host.0.lock().unwrap().as_slice(), ["obf/aa"]);

    // The replayed load event carries a previous version; the resolved
    // finder still requests its transform.
    let replay = LoadEvent {
        loader: None,
        name: "obf/aa",
        previous_version: Some(1),
        protection: None,
        bytes: &bytes,
    };
    let rewritten = registry.transform(&replay).unwrap();
    assert!(sigweave::parse_module(&rewritten)
        .unwrap()
        .has_constant(&Constant::str("patched")));
}

#[test]
fn reset_detaches_finders_from_future_offers() {
    let registry = FinderRegistry::new();
    let finder = registry
        .register(
            ModuleSignature::builder("short-lived")
                .string_constant("marker")
                .build()
                .unwrap(),
        )
        .unwrap();

    registry.reset();
    let bytes = marker_image("obf/aa", "marker");
    registry.transform(&LoadEvent::new("obf/aa", &bytes));
    assert!(finder.resolved().is_none());
}

#[test]
fn config_round_trips_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sigweave.toml");
    std::fs::write(
        &path,
        "platform_prefixes = [\"java/\"]\nverify_rewrites = false\nfull_reflection = true\n",
    )
    .unwrap();

    let config = RegistryConfig::from_path(&path).unwrap();
    assert_eq!(config.platform_prefixes, ["java/"]);
    assert!(!config.verify_rewrites);
    assert!(config.full_reflection);
}
