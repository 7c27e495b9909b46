//! Constant values referenced by module members.

use std::fmt;

/// One constant value.
///
/// Constants appear as [`crate::Instruction::LoadConst`] operands, as the
/// bootstrap arguments of [`crate::Instruction::InvokeDynamic`] sites, and as
/// the initial values of data members. A module's aggregated constant set
/// collects all three sources.
///
/// Floats compare and hash by bit pattern so constants can live in hash sets
/// and serve as substitution-map keys.
#[derive(Debug, Clone)]
pub enum Constant {
    /// A signed integer literal (covers all integral widths)
    Int(i64),
    /// A floating point literal
    Float(f64),
    /// A string literal
    Str(String),
}

impl Constant {
    /// Convenience constructor for string constants.
    #[must_use]
    pub fn str(value: &str) -> Self {
        Constant::Str(value.to_string())
    }

    /// Returns the string payload, `None` for non-string constants.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl std::hash::Hash for Constant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Constant::Int(value) => {
                state.write_u8(0);
                value.hash(state);
            }
            Constant::Float(value) => {
                state.write_u8(1);
                value.to_bits().hash(state);
            }
            Constant::Str(value) => {
                state.write_u8(2);
                value.hash(state);
            }
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{value}"),
            Constant::Float(value) => write!(f, "{value}"),
            Constant::Str(value) => write!(f, "{value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Constant::Float(1.5), Constant::Float(1.5));
        assert_ne!(Constant::Float(0.0), Constant::Float(-0.0));
        assert_eq!(Constant::Float(f64::NAN), Constant::Float(f64::NAN));
    }

    #[test]
    fn usable_as_set_element() {
        let mut set = HashSet::new();
        set.insert(Constant::Int(7));
        set.insert(Constant::str("seven"));
        set.insert(Constant::Int(7));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Constant::str("seven")));
    }
}
