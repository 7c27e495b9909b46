//! Bridge synthesis: from contract plus resolution to generated modules.

use std::sync::{Arc, Mutex, OnceLock};

use crate::build::{InstructionAssembler, ModuleBuilder};
use crate::finder::{FinderHandle, Resolution};
use crate::module::{
    CodeModule, DataMember, ExecutableMember, HandleKind, InvokeKind, MemberFlags, ModuleFlags,
    TypeDesc,
};
use crate::Result;

use super::{AccessorRegistry, Contract, ContractMember};

/// The pair of synthesized bridge modules for one [`AccessorSpec`].
#[derive(Debug)]
pub struct GeneratedAccessor {
    /// Bridge implementing the instance contract, holding one target.
    pub instance: Arc<CodeModule>,
    /// Bridge implementing the statics contract, plus `isInstance`/`cast`.
    pub statics: Arc<CodeModule>,
}

/// One accessor declaration: a finder plus the typed contracts its bridges
/// expose.
///
/// Generation is memoized: the first successful [`Self::generate`] is the
/// one every later call observes. Failures are never cached, so a spec whose
/// finder resolves later can be retried.
pub struct AccessorSpec {
    finder: FinderHandle,
    instance: Contract,
    statics: Contract,
    full_reflection: Option<bool>,
    gate: Mutex<()>,
    cell: OnceLock<Arc<GeneratedAccessor>>,
}

impl AccessorSpec {
    /// Declare an accessor over `finder` with the given contracts.
    #[must_use]
    pub fn new(finder: FinderHandle, instance: Contract, statics: Contract) -> Self {
        AccessorSpec {
            finder,
            instance,
            statics,
            full_reflection: None,
            gate: Mutex::new(()),
            cell: OnceLock::new(),
        }
    }

    /// Override the registry's reflection default for this spec alone.
    #[must_use]
    pub fn full_reflection(mut self, enabled: bool) -> Self {
        self.full_reflection = Some(enabled);
        self
    }

    /// The instance contract's interface name, also the spec's registry key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    /// The backing finder.
    #[must_use]
    pub fn finder(&self) -> &FinderHandle {
        &self.finder
    }

    /// Synthesize both bridges, or return the memoized pair.
    ///
    /// # Errors
    /// Returns [`crate::Error::Unresolved`] while the backing finder (or
    /// that of a wrapped contract) has not matched, and
    /// [`crate::Error::Generation`] when a contract member binds nothing.
    pub fn generate(&self, registry: &AccessorRegistry) -> Result<Arc<GeneratedAccessor>> {
        if let Some(generated) = self.cell.get() {
            return Ok(generated.clone());
        }
        let _gate = self.gate.lock().map_err(|_| crate::Error::LockError)?;
        if let Some(generated) = self.cell.get() {
            return Ok(generated.clone());
        }

        let resolution = self.finder.assume()?;
        let reflect = self
            .full_reflection
            .unwrap_or(registry.default_full_reflection());

        let instance = BridgeCx::new(&self.instance, resolution, registry, reflect, false)
            .synthesize()?;
        let statics =
            BridgeCx::new(&self.statics, resolution, registry, reflect, true).synthesize()?;

        let generated = Arc::new(GeneratedAccessor {
            instance: Arc::new(instance),
            statics: Arc::new(statics),
        });
        let _ = self.cell.set(generated.clone());
        tracing::debug!(accessor = self.name(), module = %resolution.module.name, "accessor generated");
        Ok(generated)
    }
}

/// What one contract member binds to in the resolution.
enum Target<'a> {
    Getter(&'a DataMember),
    Setter(&'a DataMember),
    Method(&'a ExecutableMember),
}

impl Target<'_> {
    fn flags(&self) -> MemberFlags {
        match self {
            Target::Getter(f) | Target::Setter(f) => f.flags,
            Target::Method(m) => m.flags,
        }
    }

    fn is_static(&self) -> bool {
        self.flags().is_static()
    }

    /// The type the underlying dispatch leaves on the stack.
    fn produced(&self) -> TypeDesc {
        match self {
            Target::Getter(f) => f.ty.clone(),
            Target::Setter(_) => TypeDesc::Void,
            Target::Method(m) => m.signature.ret.clone(),
        }
    }
}

struct BridgeCx<'a> {
    contract: &'a Contract,
    resolution: &'a Resolution,
    registry: &'a AccessorRegistry,
    reflect: bool,
    is_static: bool,
    bridge_name: String,
    target_desc: String,
}

impl<'a> BridgeCx<'a> {
    fn new(
        contract: &'a Contract,
        resolution: &'a Resolution,
        registry: &'a AccessorRegistry,
        reflect: bool,
        is_static: bool,
    ) -> Self {
        BridgeCx {
            contract,
            resolution,
            registry,
            reflect,
            is_static,
            bridge_name: format!("{}$Bridge", contract.name),
            target_desc: format!("T{};", resolution.module.name),
        }
    }

    fn owner(&self) -> &str {
        &self.resolution.module.name
    }

    fn resolve_target(&self, member: &ContractMember) -> Result<Target<'a>> {
        if let Some(key) = member.property_key() {
            if let Some(field) = self.resolution.data(&key) {
                return Ok(if member.is_setter() {
                    Target::Setter(field)
                } else {
                    Target::Getter(field)
                });
            }
        }
        if let Some(method) = self.resolution.exec(&member.name) {
            return Ok(Target::Method(method));
        }

        let mut keys: Vec<&str> = self.resolution.members.keys().map(String::as_str).collect();
        keys.sort_unstable();
        Err(crate::Error::Generation(format!(
            "Contract '{}' member '{}' binds no resolved member of '{}'; declared keys: [{}]",
            self.contract.name,
            member.name,
            self.owner(),
            keys.join(", ")
        )))
    }

    fn is_reflective(&self, target: &Target<'_>) -> bool {
        self.reflect || !target.flags().is_public()
    }

    fn handle_field(member: &ContractMember) -> String {
        format!("{}$handle", member.name)
    }

    fn handle_kind(target: &Target<'_>) -> HandleKind {
        match (target, target.is_static()) {
            (Target::Getter(_), false) => HandleKind::FieldGet,
            (Target::Getter(_), true) => HandleKind::StaticFieldGet,
            (Target::Setter(_), false) => HandleKind::FieldSet,
            (Target::Setter(_), true) => HandleKind::StaticFieldSet,
            (Target::Method(_), false) => HandleKind::Method,
            (Target::Method(_), true) => HandleKind::StaticMethod,
        }
    }

    fn target_ref(&self, target: &Target<'_>) -> (String, String) {
        match target {
            Target::Getter(f) | Target::Setter(f) => (f.name.clone(), f.desc.clone()),
            Target::Method(m) => (m.name.clone(), m.desc.clone()),
        }
    }

    fn synthesize(&self) -> Result<CodeModule> {
        // Bind every member first so the constructor knows which handle
        // fields to resolve.
        let mut bound: Vec<(&ContractMember, Target<'a>, bool)> = Vec::new();
        for member in &self.contract.members {
            if self.is_static && matches!(member.name.as_str(), "isInstance" | "cast") {
                continue; // synthesized below, contract or not
            }
            let target = self.resolve_target(member)?;
            if self.is_static && !target.is_static() {
                return Err(crate::Error::Generation(format!(
                    "Contract '{}' member '{}' binds an instance member of '{}'",
                    self.contract.name,
                    member.name,
                    self.owner()
                )));
            }
            let reflective = self.is_reflective(&target);
            bound.push((member, target, reflective));
        }

        let mut builder = ModuleBuilder::new(&self.bridge_name)
            .flags(ModuleFlags::PUBLIC | ModuleFlags::SYNTHETIC)
            .interface(&self.contract.name);

        let handle_flags = if self.is_static {
            MemberFlags::PRIVATE | MemberFlags::STATIC | MemberFlags::FINAL | MemberFlags::SYNTHETIC
        } else {
            MemberFlags::PRIVATE | MemberFlags::FINAL | MemberFlags::SYNTHETIC
        };
        if !self.is_static {
            builder = builder.data_member(
                "target",
                &self.target_desc,
                MemberFlags::PRIVATE | MemberFlags::FINAL | MemberFlags::SYNTHETIC,
            )?;
        }
        for (member, _, reflective) in &bound {
            if *reflective {
                builder = builder.data_member(&Self::handle_field(member), "H", handle_flags)?;
            }
        }

        builder = self.emit_initializer(builder, &bound)?;
        if self.is_static {
            builder = self.emit_statics_intrinsics(builder)?;
        }
        for (member, target, reflective) in &bound {
            builder = self.emit_member(builder, member, target, *reflective)?;
        }
        builder.build()
    }

    /// The instance constructor always exists; the static initializer only
    /// when some member dispatches reflectively.
    fn emit_initializer(
        &self,
        builder: ModuleBuilder,
        bound: &[(&ContractMember, Target<'a>, bool)],
    ) -> Result<ModuleBuilder> {
        let reflective: Vec<&(&ContractMember, Target<'a>, bool)> =
            bound.iter().filter(|(_, _, r)| *r).collect();

        if self.is_static {
            if reflective.is_empty() {
                return Ok(builder);
            }
            return builder.method(".cctor", |m| {
                m.static_member().body(|asm| {
                    for (member, target, _) in &reflective {
                        let (name, desc) = self.target_ref(target);
                        asm.resolve_handle(Self::handle_kind(target), self.owner(), &name, &desc)?
                            .put_static(&self.bridge_name, &Self::handle_field(member), "H")?;
                    }
                    asm.ret()?;
                    Ok(())
                })
            });
        }

        builder.method(".ctor", |m| {
            m.param(TypeDesc::Named(self.owner().to_string()))
                .public()
                .body(|asm| {
                    asm.load_this()?
                        .load_arg(0)?
                        .put_field(&self.bridge_name, "target", &self.target_desc)?;
                    for (member, target, _) in &reflective {
                        let (name, desc) = self.target_ref(target);
                        asm.load_this()?
                            .resolve_handle(
                                Self::handle_kind(target),
                                self.owner(),
                                &name,
                                &desc,
                            )?
                            .put_field(&self.bridge_name, &Self::handle_field(member), "H")?;
                    }
                    asm.ret()?;
                    Ok(())
                })
        })
    }

    /// `isInstance` and `cast` exist on every statics bridge, whether or not
    /// the contract declares them.
    fn emit_statics_intrinsics(&self, builder: ModuleBuilder) -> Result<ModuleBuilder> {
        let owner = self.owner().to_string();
        let builder = builder.method("isInstance", |m| {
            m.param(TypeDesc::AnyRef)
                .returns(TypeDesc::Bool)
                .public()
                .static_member()
                .body(|asm| {
                    asm.load_arg(0)?.is_instance(&owner)?.ret_value()?;
                    Ok(())
                })
        })?;
        let owner = self.owner().to_string();
        builder.method("cast", |m| {
            m.param(TypeDesc::AnyRef)
                .returns(TypeDesc::Named(owner.clone()))
                .public()
                .static_member()
                .body(|asm| {
                    asm.load_arg(0)?.cast_to(&owner)?.ret_value()?;
                    Ok(())
                })
        })
    }

    fn emit_member(
        &self,
        builder: ModuleBuilder,
        member: &ContractMember,
        target: &Target<'a>,
        reflective: bool,
    ) -> Result<ModuleBuilder> {
        builder.method(&member.name, |mut m| {
            for param in &member.params {
                m = m.param(param.clone());
            }
            m = m.returns(member.ret.clone()).public();
            if self.is_static {
                m = m.static_member();
            }
            m.body(|asm| {
                if reflective {
                    self.emit_reflective_dispatch(asm, member, target)?;
                } else {
                    self.emit_direct_dispatch(asm, member, target)?;
                }
                self.emit_return(asm, member, target, reflective)
            })
        })
    }

    fn load_target(&self, asm: &mut InstructionAssembler) -> Result<()> {
        asm.load_this()?
            .get_field(&self.bridge_name, "target", &self.target_desc)?;
        Ok(())
    }

    fn emit_direct_dispatch(
        &self,
        asm: &mut InstructionAssembler,
        member: &ContractMember,
        target: &Target<'a>,
    ) -> Result<()> {
        let (name, desc) = self.target_ref(target);
        match target {
            Target::Getter(_) if target.is_static() => {
                asm.get_static(self.owner(), &name, &desc)?;
            }
            Target::Getter(_) => {
                self.load_target(asm)?;
                asm.get_field(self.owner(), &name, &desc)?;
            }
            Target::Setter(_) if target.is_static() => {
                asm.load_arg(0)?.put_static(self.owner(), &name, &desc)?;
            }
            Target::Setter(_) => {
                self.load_target(asm)?;
                asm.load_arg(0)?.put_field(self.owner(), &name, &desc)?;
            }
            Target::Method(_) if target.is_static() => {
                for index in 0..member.params.len() {
                    asm.load_arg(index as u16)?;
                }
                asm.invoke(InvokeKind::Static, self.owner(), &name, &desc)?;
            }
            Target::Method(_) => {
                self.load_target(asm)?;
                for index in 0..member.params.len() {
                    asm.load_arg(index as u16)?;
                }
                asm.invoke(InvokeKind::Virtual, self.owner(), &name, &desc)?;
            }
        }
        Ok(())
    }

    /// Handle, receiver, packed arguments: the invoke-handle protocol.
    fn emit_reflective_dispatch(
        &self,
        asm: &mut InstructionAssembler,
        member: &ContractMember,
        target: &Target<'a>,
    ) -> Result<()> {
        let handle_field = Self::handle_field(member);
        if self.is_static {
            asm.get_static(&self.bridge_name, &handle_field, "H")?;
        } else {
            asm.load_this()?
                .get_field(&self.bridge_name, &handle_field, "H")?;
        }

        if target.is_static() {
            asm.load_null()?;
        } else {
            self.load_target(asm)?;
        }

        let packed = match target {
            Target::Getter(_) => 0,
            Target::Setter(_) => {
                asm.load_arg(0)?;
                1
            }
            Target::Method(_) => {
                for index in 0..member.params.len() {
                    asm.load_arg(index as u16)?;
                }
                member.params.len() as u16
            }
        };
        asm.pack_args(packed)?;
        asm.invoke_handle()?;
        Ok(())
    }

    fn emit_return(
        &self,
        asm: &mut InstructionAssembler,
        member: &ContractMember,
        target: &Target<'a>,
        reflective: bool,
    ) -> Result<()> {
        if member.ret == TypeDesc::Void {
            // Reflective dispatch always leaves a result to discard.
            if reflective {
                asm.pop()?;
            }
            asm.ret()?;
            return Ok(());
        }

        // The handle protocol produces an untyped reference; cast back to the
        // produced type, unboxing primitives.
        let produced = target.produced();
        if reflective && produced != TypeDesc::Void {
            match produced.named() {
                Some(name) => asm.cast_to(name)?,
                None => asm.cast_to(&produced.to_string())?,
            };
        }

        if let TypeDesc::Named(contract_name) = &member.ret {
            if let Some(other) = self.registry.spec(contract_name) {
                return self.emit_wrap(asm, &other);
            }
        }
        asm.ret_value()?;
        Ok(())
    }

    /// Wrap the produced reference in the other contract's bridge, passing
    /// null through untouched.
    fn emit_wrap(&self, asm: &mut InstructionAssembler, other: &AccessorSpec) -> Result<()> {
        let other_owner = other.finder().assume()?.module.name.clone();
        let other_bridge = format!("{}$Bridge", other.name());
        let ctor_desc = format!("(T{};)V", other_owner);

        let done = asm.new_label();
        asm.dup()?
            .branch_null(done)?
            .store_local(0)?
            .new_object(&other_bridge)?
            .dup()?
            .load_local(0)?
            .invoke(InvokeKind::Special, &other_bridge, ".ctor", &ctor_desc)?
            .mark(done)?
            .ret_value()?;
        Ok(())
    }
}
