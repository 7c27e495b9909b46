use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! emission_error {
    ($msg:expr) => {
        crate::Error::Emission($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Emission(format!($fmt, $($arg)*))
    };
}

macro_rules! misuse_error {
    ($msg:expr) => {
        crate::Error::Misuse($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Misuse(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the engine: decoding module images, evaluating
/// signatures, rewriting instruction streams, and synthesizing accessor bridges. Each variant
/// provides specific context about the failure mode to enable appropriate error handling.
///
/// Note that an ordinary signature mismatch is **not** an error: matching reports absence
/// through [`crate::Offer::NoMatch`], and this type is reserved for genuine faults.
///
/// # Error Categories
///
/// ## Module Image Errors
/// - [`Error::Malformed`] - Corrupted or invalid module image structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond image boundaries
/// - [`Error::NotSupported`] - Unsupported container version or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## Rewriting and Synthesis Errors
/// - [`Error::Emission`] - Instruction emission failed (undefined label, pool overflow,
///   stack underflow during recomputation)
/// - [`Error::Generation`] - Accessor synthesis could not satisfy a contract
///
/// ## Usage Errors
/// - [`Error::Misuse`] - Inconsistent signature or registry wiring by the caller
/// - [`Error::Unresolved`] - A finder was consumed before it resolved
/// - [`Error::Config`] - Registry configuration could not be loaded
///
/// # Examples
///
/// ```rust
/// use sigweave::{parse_module, Error};
///
/// match parse_module(&[0xFF, 0xFF]) {
///     Ok(module) => println!("parsed {}", module.name),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The module image is damaged and could not be parsed.
    ///
    /// This error indicates that the byte stream does not conform to the expected
    /// SWM container format. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing a module image.
    ///
    /// This error occurs when trying to read data beyond the end of the image.
    /// It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This module image is not supported.
    ///
    /// Indicates that the input is not an SWM container, or uses a container
    /// version that is not implemented by this library.
    #[error("This module image is not supported")]
    NotSupported,

    /// Provided input was empty.
    ///
    /// This error occurs when an empty buffer is provided where actual module
    /// image data was expected.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading module images
    /// from disk, such as permission issues or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Instruction emission failed while writing a module image.
    ///
    /// Raised by the terminal writer sink or by a transform: an undefined branch
    /// label, a constant pool index overflow, or an operand stack underflow during
    /// `max_stack` recomputation. At the registry boundary this is treated as a
    /// transform failure and the original bytes are delivered unmodified.
    #[error("Emission failed - {0}")]
    Emission(String),

    /// Inconsistent signature or registry wiring by the caller.
    ///
    /// Examples: attaching a transform to a member key that was never declared,
    /// installing a registry hook twice, or a lazy signature builder returning
    /// another lazy signature. Surfaced immediately and never retried.
    #[error("Misuse - {0}")]
    Misuse(String),

    /// Accessor synthesis found an unsatisfiable contract.
    ///
    /// A contract member could not be mapped onto any member of the resolved
    /// module. The message lists every available member of the target so the
    /// contract can be corrected. Fatal for the affected accessor only.
    #[error("Generation failed - {0}")]
    Generation(String),

    /// A finder was consumed before it resolved.
    ///
    /// Returned by [`crate::FinderHandle::assume`] when the finder has
    /// not yet bound a module. The associated value names the signature.
    #[error("Finder '{0}' has not resolved")]
    Unresolved(String),

    /// Registry configuration could not be loaded.
    ///
    /// Covers TOML syntax errors and unknown configuration keys; the message
    /// carries the file path when the configuration came from disk.
    #[error("Configuration error - {0}")]
    Config(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when
    /// trying to acquire a mutex or rwlock that is in a poisoned state.
    #[error("Failed to lock target")]
    LockError,
}
