//! Access flag bit sets for modules and members.

use bitflags::bitflags;

bitflags! {
    /// Access flags of a [`crate::CodeModule`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModuleFlags: u32 {
        /// Visible outside its defining scope
        const PUBLIC = 0x0001;
        /// May not be extended
        const FINAL = 0x0002;
        /// An interface rather than a concrete module
        const INTERFACE = 0x0004;
        /// Must not be instantiated directly
        const ABSTRACT = 0x0008;
        /// Generated by tooling rather than compiled from source
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags of an executable or data member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MemberFlags: u32 {
        /// Visible outside the owning module
        const PUBLIC = 0x0001;
        /// Visible only inside the owning module
        const PRIVATE = 0x0002;
        /// Visible to the owning module and its extensions
        const PROTECTED = 0x0004;
        /// Not bound to an instance
        const STATIC = 0x0008;
        /// May not be overridden or reassigned
        const FINAL = 0x0010;
        /// Generated by tooling rather than compiled from source
        const SYNTHETIC = 0x1000;
    }
}

impl MemberFlags {
    /// Whether the member is publicly visible. Drives the accessor
    /// synthesizer's direct-vs-reflective dispatch decision.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.contains(MemberFlags::PUBLIC)
    }

    /// Whether the member is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.contains(MemberFlags::STATIC)
    }
}
