// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// Why [`crate::context::RuntimeContext::create`] failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CreateError {
    InvalidAllocator,
    InvalidPhf,
    FailMemory,
    FailCreateAllocator,
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CreateError::InvalidAllocator => "allocator recipe failed validation",
            CreateError::InvalidPhf => "perfect-hash-function recipe failed validation",
            CreateError::FailMemory => "out of memory",
            CreateError::FailCreateAllocator => "allocator construction failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for CreateError {}

/// Why creating a named type failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NamedTypeError {
    NameAlreadyExists,
    FailMemory,
    FailPhf,
}

impl fmt::Display for NamedTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NamedTypeError::NameAlreadyExists => "a type with this name already exists",
            NamedTypeError::FailMemory => "out of memory",
            NamedTypeError::FailPhf => "perfect-hash-function construction failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for NamedTypeError {}

/// Why a member lookup failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LookupError {
    /// The lookup target is not a named type.
    ExpectedNamed,
    /// A member with this name exists but at a different type.
    TypeMismatch,
    /// No member with this name exists.
    NotFound,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LookupError::ExpectedNamed => "lookup target is not a named type",
            LookupError::TypeMismatch => "member exists but has a different type",
            LookupError::NotFound => "no member with this name",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for LookupError {}

/// Why constructing an [`crate::any::Any`] by copy failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CopyError {
    /// The type does not provide a copy function.
    NotCopyable,
    FailMemory,
    /// The type's copy function reported failure.
    FailCopy,
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CopyError::NotCopyable => "type has no copy function",
            CopyError::FailMemory => "out of memory",
            CopyError::FailCopy => "the type's copy function failed",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for CopyError {}
