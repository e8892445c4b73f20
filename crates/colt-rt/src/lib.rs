// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A runtime type-erasure and reflection engine: named types built up
//! from member lists and a chosen layout policy, pointer/array/
//! function descriptors deduplicated by structure, perfect-hash-backed
//! member lookup, and type-erased values ([`any::Any`],
//! [`shared::SharedAny`]/[`shared::WeakAny`]) that move/copy/destroy
//! themselves through a type's synthesized lifetime functions. See
//! [`context::RuntimeContext`] for the entry point.

pub mod abi;
pub mod any;
pub mod context;
pub mod error;
pub mod named;
pub mod phf;
pub mod reflect;
pub mod shared;
pub mod types;

pub use any::Any;
pub use context::{ErasedAllocator, PreparedMember, RuntimeContext};
pub use error::{CopyError, CreateError, LookupError, NamedTypeError};
pub use named::{LayoutPolicy, Member, MemberInfo, NamedType};
pub use phf::{DefaultPhfRecipe, PerfectHash, PhfRecipe};
pub use shared::{SharedAny, WeakAny};
pub use types::{
    ArrayType, BuiltinKind, FunctionType, Lifetime, LifetimeBits, PointerType, TypeDescriptor,
    TypeId,
};
