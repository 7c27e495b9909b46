//! Type and method descriptor grammar.
//!
//! Descriptors are the compact textual encoding of member types inside a module
//! image. The grammar mirrors the constant-width primitive codes used by the
//! container format:
//!
//! | Code | Type |
//! |------|------|
//! | `V`  | void |
//! | `Z`  | bool |
//! | `C`  | char |
//! | `I`  | 32-bit integer |
//! | `J`  | 64-bit integer |
//! | `F`  | 32-bit float |
//! | `D`  | 64-bit float |
//! | `S`  | string |
//! | `A`  | any reference |
//! | `H`  | reflective handle |
//!
//! Named module types are written `T<name>;` and arrays prefix their element
//! type with `[`. Method descriptors are `(<params>)<ret>`, e.g. `(IS)Z` for a
//! bool-returning method taking an int and a string.
//!
//! # Examples
//!
//! ```rust
//! use sigweave::{MethodDesc, TypeDesc};
//!
//! let desc = MethodDesc::parse("(ITgame/Window;)S")?;
//! assert_eq!(desc.params.len(), 2);
//! assert_eq!(desc.ret, TypeDesc::Str);
//! assert_eq!(desc.to_string(), "(ITgame/Window;)S");
//! # Ok::<(), sigweave::Error>(())
//! ```

use std::fmt;

use crate::Result;

/// One type in the descriptor grammar.
///
/// `TypeDesc` is the parsed form of a single type code. It appears as the
/// declared type of data members, as parameter and return types of executable
/// members, and as the member types of accessor contracts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// `V` - no value
    Void,
    /// `Z` - boolean
    Bool,
    /// `C` - character
    Char,
    /// `I` - 32-bit signed integer
    Int32,
    /// `J` - 64-bit signed integer
    Int64,
    /// `F` - 32-bit float
    Float32,
    /// `D` - 64-bit float
    Float64,
    /// `S` - string
    Str,
    /// `A` - any reference
    AnyRef,
    /// `H` - reflective handle captured by [`crate::Instruction::ResolveHandle`]
    Handle,
    /// `T<name>;` - a named module type
    Named(String),
    /// `[<elem>` - array of the element type
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Parse a single type descriptor, requiring the entire input to be consumed.
    ///
    /// # Arguments
    /// * `text` - The descriptor text, e.g. `"I"` or `"Tgame/Window;"`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the text is not exactly one
    /// well-formed type descriptor.
    pub fn parse(text: &str) -> Result<TypeDesc> {
        let mut chars = text.char_indices().peekable();
        let desc = Self::parse_partial(text, &mut chars)?;
        if chars.next().is_some() {
            return Err(malformed_error!(
                "Trailing characters after type descriptor - '{}'",
                text
            ));
        }
        Ok(desc)
    }

    /// Returns `true` for descriptor codes that carry a value by copy rather
    /// than by reference (`Z C I J F D`).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
                | TypeDesc::Char
                | TypeDesc::Int32
                | TypeDesc::Int64
                | TypeDesc::Float32
                | TypeDesc::Float64
        )
    }

    /// Returns the module name for a `T<name>;` descriptor, `None` otherwise.
    #[must_use]
    pub fn named(&self) -> Option<&str> {
        match self {
            TypeDesc::Named(name) => Some(name),
            _ => None,
        }
    }

    fn parse_partial(
        text: &str,
        chars: &mut std::iter::Peekable<std::str::CharIndices>,
    ) -> Result<TypeDesc> {
        let Some((_, code)) = chars.next() else {
            return Err(malformed_error!("Empty type descriptor"));
        };

        match code {
            'V' => Ok(TypeDesc::Void),
            'Z' => Ok(TypeDesc::Bool),
            'C' => Ok(TypeDesc::Char),
            'I' => Ok(TypeDesc::Int32),
            'J' => Ok(TypeDesc::Int64),
            'F' => Ok(TypeDesc::Float32),
            'D' => Ok(TypeDesc::Float64),
            'S' => Ok(TypeDesc::Str),
            'A' => Ok(TypeDesc::AnyRef),
            'H' => Ok(TypeDesc::Handle),
            '[' => Ok(TypeDesc::Array(Box::new(Self::parse_partial(
                text, chars,
            )?))),
            'T' => {
                let mut name = String::new();
                for (_, c) in chars.by_ref() {
                    if c == ';' {
                        if name.is_empty() {
                            return Err(malformed_error!("Empty module type name - '{}'", text));
                        }
                        return Ok(TypeDesc::Named(name));
                    }
                    name.push(c);
                }
                Err(malformed_error!(
                    "Unterminated module type name - '{}'",
                    text
                ))
            }
            _ => Err(malformed_error!(
                "Unknown type descriptor code '{}' - '{}'",
                code,
                text
            )),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "V"),
            TypeDesc::Bool => write!(f, "Z"),
            TypeDesc::Char => write!(f, "C"),
            TypeDesc::Int32 => write!(f, "I"),
            TypeDesc::Int64 => write!(f, "J"),
            TypeDesc::Float32 => write!(f, "F"),
            TypeDesc::Float64 => write!(f, "D"),
            TypeDesc::Str => write!(f, "S"),
            TypeDesc::AnyRef => write!(f, "A"),
            TypeDesc::Handle => write!(f, "H"),
            TypeDesc::Named(name) => write!(f, "T{name};"),
            TypeDesc::Array(elem) => write!(f, "[{elem}"),
        }
    }
}

/// Parsed form of a method descriptor `(<params>)<ret>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDesc {
    /// Parameter types in declaration order
    pub params: Vec<TypeDesc>,
    /// Return type, [`TypeDesc::Void`] for none
    pub ret: TypeDesc,
}

impl MethodDesc {
    /// Create a descriptor from parts.
    #[must_use]
    pub fn new(params: Vec<TypeDesc>, ret: TypeDesc) -> Self {
        MethodDesc { params, ret }
    }

    /// Parse a full method descriptor.
    ///
    /// # Arguments
    /// * `text` - The descriptor text, e.g. `"(IS)Z"`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the parentheses are missing or
    /// any contained type descriptor is invalid.
    pub fn parse(text: &str) -> Result<MethodDesc> {
        let Some(rest) = text.strip_prefix('(') else {
            return Err(malformed_error!("Method descriptor must start with '(' - '{}'", text));
        };
        let Some(close) = rest.find(')') else {
            return Err(malformed_error!("Method descriptor missing ')' - '{}'", text));
        };

        let (param_text, ret_text) = (&rest[..close], &rest[close + 1..]);

        let mut params = Vec::new();
        let mut chars = param_text.char_indices().peekable();
        while chars.peek().is_some() {
            params.push(TypeDesc::parse_partial(param_text, &mut chars)?);
        }

        Ok(MethodDesc {
            params,
            ret: TypeDesc::parse(ret_text)?,
        })
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        for code in ["V", "Z", "C", "I", "J", "F", "D", "S", "A", "H"] {
            let desc = TypeDesc::parse(code).unwrap();
            assert_eq!(desc.to_string(), code);
        }
    }

    #[test]
    fn named_and_array() {
        let desc = TypeDesc::parse("Tgame/Window;").unwrap();
        assert_eq!(desc, TypeDesc::Named("game/Window".to_string()));

        let desc = TypeDesc::parse("[[I").unwrap();
        assert_eq!(
            desc,
            TypeDesc::Array(Box::new(TypeDesc::Array(Box::new(TypeDesc::Int32))))
        );
        assert_eq!(desc.to_string(), "[[I");
    }

    #[test]
    fn method_descriptors() {
        let desc = MethodDesc::parse("()V").unwrap();
        assert!(desc.params.is_empty());
        assert_eq!(desc.ret, TypeDesc::Void);

        let desc = MethodDesc::parse("(ITgame/Window;[S)Z").unwrap();
        assert_eq!(desc.arity(), 3);
        assert_eq!(desc.params[0], TypeDesc::Int32);
        assert_eq!(desc.params[2], TypeDesc::Array(Box::new(TypeDesc::Str)));
        assert_eq!(desc.to_string(), "(ITgame/Window;[S)Z");
    }

    #[test]
    fn rejects_malformed() {
        assert!(TypeDesc::parse("").is_err());
        assert!(TypeDesc::parse("X").is_err());
        assert!(TypeDesc::parse("T;").is_err());
        assert!(TypeDesc::parse("Tgame/Window").is_err());
        assert!(TypeDesc::parse("II").is_err());
        assert!(MethodDesc::parse("IV").is_err());
        assert!(MethodDesc::parse("(I").is_err());
        assert!(MethodDesc::parse("(X)V").is_err());
    }
}
