// Conduit Error Handling Framework
// Coded errors carrying an append-only call-site history

use std::error::Error as StdError;

// Re-export for crates that define their own error enums
pub use thiserror;

// Module structure
mod aggregate;
mod coder;
pub mod codes;
pub mod frame;
mod macros;
mod stack;

// Public exports
pub use aggregate::Aggregate;
pub use coder::{Coder, CoderRegistry, RegistryError, LOCALE_EN, LOCALE_ZH};
pub use frame::{CallSite, ModuleInfo, StackFrame};
pub use stack::StackError;

/// Any error that can be normalized into a [`StackError`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Standard Result type for coded errors
pub type Result<T> = std::result::Result<T, StackError>;
