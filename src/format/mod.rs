//! The SWM container codec.
//!
//! Modules cross the host boundary as raw bytes in the SWM container format:
//! a little-endian image holding a deduplicated constant pool, the module
//! header, and the encoded members. This module provides both directions plus
//! the cursor they share:
//!
//! - [`parser::Parser`] - bounds-checked little-endian cursor
//! - [`reader`] - [`reader::parse_module`] (bytes to model) and
//!   [`reader::emit_module`] (model into a sink chain)
//! - [`writer`] - [`writer::ModuleWriter`], the terminal emission sink, and
//!   [`writer::write_module`] for transform-free encoding
//! - [`io`] - [`io::read_module_file`] for disk-backed images
//!
//! # Image Layout
//!
//! ```text
//! magic "SWM1" | u16 version | u32 module flags
//! u16 pool count | pool entries (tag u8: 01 Utf8, 02 Int, 03 Float, 04 Str)
//! u16 name | u16 superclass (0 = none) | u16 n + interface refs
//! u16 n + data members   (u32 flags, name, desc, u16 constant (0 = none))
//! u16 n + exec members   (u32 flags, name, desc, u16 max_stack,
//!                         u16 max_locals, u32 code bytes, instructions)
//! ```
//!
//! Branch targets are instruction indices on the wire; in the model they are
//! symbolic labels (see [`reader`]).

pub mod io;
pub mod op;
pub mod parser;
pub mod reader;
pub mod writer;

pub use io::read_module_file;
pub use parser::Parser;
pub use reader::{emit_module, parse_module};
pub use writer::{write_module, ModuleWriter, WriterOutput};
