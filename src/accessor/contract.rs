//! Accessor contracts: the typed surface callers program against.

use crate::module::{MethodDesc, TypeDesc};

/// One named surface of typed members, implemented by a synthesized bridge.
///
/// A contract is pure description; it never references the obfuscated names
/// of the resolved module. Member names bind through the owning finder's
/// declaration keys: `getFoo`/`setFoo` reach the data member declared under
/// key `foo`, any other name reaches the executable member declared under
/// that exact key.
///
/// # Examples
///
/// ```rust
/// use sigweave::{Contract, TypeDesc};
///
/// let contract = Contract::new("Window")
///     .member("getTitle", vec![], TypeDesc::Str)
///     .member("resize", vec![TypeDesc::Int32, TypeDesc::Int32], TypeDesc::Void);
/// assert_eq!(contract.members.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Contract {
    /// The interface name the bridge implements.
    pub name: String,
    /// Declared members, in declaration order.
    pub members: Vec<ContractMember>,
}

/// One typed member of a [`Contract`].
#[derive(Debug, Clone)]
pub struct ContractMember {
    /// The surface name, also the binding key.
    pub name: String,
    /// Parameter types.
    pub params: Vec<TypeDesc>,
    /// Return type.
    pub ret: TypeDesc,
}

impl Contract {
    /// Start an empty contract with the given interface name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Contract {
            name: name.to_string(),
            members: Vec::new(),
        }
    }

    /// Declare one member.
    #[must_use]
    pub fn member(mut self, name: &str, params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        self.members.push(ContractMember {
            name: name.to_string(),
            params,
            ret,
        });
        self
    }
}

impl ContractMember {
    /// The member's descriptor on the bridge surface.
    #[must_use]
    pub fn desc(&self) -> String {
        MethodDesc::new(self.params.clone(), self.ret.clone()).to_string()
    }

    /// The finder declaration key a `get`/`set` name binds to, when the name
    /// carries such a prefix.
    #[must_use]
    pub fn property_key(&self) -> Option<String> {
        let stripped = self
            .name
            .strip_prefix("get")
            .or_else(|| self.name.strip_prefix("set"))?;
        let mut chars = stripped.chars();
        let first = chars.next()?;
        Some(first.to_lowercase().chain(chars).collect())
    }

    /// Whether the name carries the `set` prefix.
    #[must_use]
    pub fn is_setter(&self) -> bool {
        self.name.strip_prefix("set").is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_keys_strip_and_lowercase() {
        let contract = Contract::new("Window")
            .member("getTitle", vec![], TypeDesc::Str)
            .member("setWidth", vec![TypeDesc::Int32], TypeDesc::Void)
            .member("resize", vec![], TypeDesc::Void)
            .member("get", vec![], TypeDesc::Void);

        assert_eq!(contract.members[0].property_key().as_deref(), Some("title"));
        assert_eq!(contract.members[1].property_key().as_deref(), Some("width"));
        assert!(contract.members[1].is_setter());
        assert!(contract.members[2].property_key().is_none());
        // A bare prefix names nothing.
        assert!(contract.members[3].property_key().is_none());
    }

    #[test]
    fn descriptors_follow_the_wire_grammar() {
        let member = ContractMember {
            name: "resize".to_string(),
            params: vec![TypeDesc::Int32, TypeDesc::Int32],
            ret: TypeDesc::Named("game/Window".to_string()),
        };
        assert_eq!(member.desc(), "(II)Tgame/Window;");
    }
}
