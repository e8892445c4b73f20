// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A type-erased value ([`Any`]) holding an instance of some
//! [`TypeId`] known to a [`RuntimeContext`], either inline in a small
//! buffer or on the type's default heap. Small-buffer optimization: a
//! value is stored inline iff its type is movable and its worst-case
//! aligned placement fits the inline buffer, so a later move between
//! two `Any`s (which may differ in required alignment padding) stays
//! infallible for inline values.

use std::alloc::{alloc, dealloc, Layout as StdLayout};

use crate::context::RuntimeContext;
use crate::error::CopyError;
use crate::types::TypeId;

/// Bytes available for inline storage, sized to a handful of machine
/// words — enough for most small named types without forcing a heap
/// allocation.
const INLINE_CAPACITY: usize = 4 * size_of::<usize>();
const INLINE_ALIGN: usize = align_of::<usize>();

// Fixed at 8: the widest alignment this buffer needs to satisfy on
// any target this crate supports.
#[repr(align(8))]
struct InlineBuf([u8; INLINE_CAPACITY]);

static_assertions::const_assert!(align_of::<InlineBuf>() == INLINE_ALIGN);

enum Storage {
    Empty,
    Inline(InlineBuf),
    Heap(*mut u8, StdLayout),
}

/// A type-erased, owned value of some type known to a
/// [`RuntimeContext`]. See the module docs for the inline/heap
/// placement rule.
pub struct Any {
    type_id: Option<TypeId>,
    storage: Storage,
}

fn fits_inline(size: usize, align: usize, movable: bool) -> bool {
    movable && align <= INLINE_ALIGN && size + (align.saturating_sub(1)) <= INLINE_CAPACITY
}

impl Any {
    /// An empty `Any`, holding no value.
    #[must_use]
    pub fn construct_empty() -> Self {
        Any {
            type_id: None,
            storage: Storage::Empty,
        }
    }

    /// Allocates (inline or on heap) room for a `type_id`-typed value
    /// without initializing it. The caller is responsible for leaving
    /// the storage holding a valid instance before any read/move/
    /// destroy, typically via [`Self::construct_from_move`] or
    /// [`Self::construct_from_copy`].
    #[must_use]
    pub fn construct(ctx: &RuntimeContext, type_id: TypeId) -> Self {
        let size = ctx.size_of(type_id);
        let align = ctx.align_of(type_id);
        let movable = ctx.is_movable(type_id);
        let storage = if fits_inline(size, align, movable) {
            Storage::Inline(InlineBuf([0u8; INLINE_CAPACITY]))
        } else {
            let layout = StdLayout::from_size_align(size.max(1), align)
                .expect("type size/align must form a valid layout");
            // SAFETY: `layout` has nonzero size (via `.max(1)`) and a
            // valid power-of-two alignment.
            let ptr = unsafe { alloc(layout) };
            assert!(!ptr.is_null(), "allocation failure");
            Storage::Heap(ptr, layout)
        };
        Any {
            type_id: Some(type_id),
            storage,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_id.is_none()
    }

    /// Raw pointer to the stored object's bytes, or null if empty.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        match &self.storage {
            Storage::Empty => std::ptr::null(),
            Storage::Inline(buf) => buf.0.as_ptr(),
            Storage::Heap(ptr, _) => *ptr,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.storage {
            Storage::Empty => std::ptr::null_mut(),
            Storage::Inline(buf) => buf.0.as_mut_ptr(),
            Storage::Heap(ptr, _) => *ptr,
        }
    }

    /// Moves `src`'s value into a freshly emptied `self`: steals the
    /// heap pointer if `src` is on heap, otherwise invokes the type's
    /// move (or a bitwise copy if trivially movable) into a new inline
    /// buffer. `src` is left empty.
    pub fn construct_from_move(&mut self, ctx: &RuntimeContext, src: &mut Any) {
        self.destroy(ctx);
        let Some(type_id) = src.type_id.take() else {
            self.storage = Storage::Empty;
            self.type_id = None;
            return;
        };
        match std::mem::replace(&mut src.storage, Storage::Empty) {
            Storage::Empty => unreachable!("non-empty type_id implies non-empty storage"),
            Storage::Heap(ptr, layout) => {
                self.storage = Storage::Heap(ptr, layout);
                self.type_id = Some(type_id);
            }
            Storage::Inline(mut buf) => {
                let mut dst = Any::construct(ctx, type_id);
                // SAFETY: `buf` holds a live `type_id` instance;
                // `dst`'s storage is freshly allocated for the same
                // type and doesn't overlap `buf`.
                unsafe { ctx.move_any(type_id, dst.as_mut_ptr(), buf.0.as_mut_ptr()) };
                *self = dst;
            }
        }
    }

    /// Copy-constructs `self` from `src`.
    ///
    /// # Errors
    /// [`CopyError::NotCopyable`] if `src`'s type has no copy
    /// capability; [`CopyError::FailCopy`] if the type's copy function
    /// reports failure (storage is freed and `self` left empty).
    pub fn construct_from_copy(&mut self, ctx: &RuntimeContext, src: &Any) -> Result<(), CopyError> {
        self.destroy(ctx);
        let Some(type_id) = src.type_id else {
            self.type_id = None;
            self.storage = Storage::Empty;
            return Ok(());
        };
        let descriptor = ctx.descriptor(type_id);
        if let Some(named) = descriptor.as_named() {
            if !named.lifetime.is_copyable() {
                return Err(CopyError::NotCopyable);
            }
        }
        let mut dst = Any::construct(ctx, type_id);
        // SAFETY: `src.as_ptr()` points at a live `type_id` instance;
        // `dst`'s storage is freshly allocated for the same type and
        // doesn't overlap `src`'s.
        let ok = unsafe { ctx.copy_any(type_id, dst.as_mut_ptr(), src.as_ptr()) };
        if !ok {
            dst.type_id = None;
            return Err(CopyError::FailCopy);
        }
        *self = dst;
        Ok(())
    }

    /// Runs the stored type's destructor (if any), frees heap storage,
    /// and resets to empty.
    pub fn destroy(&mut self, ctx: &RuntimeContext) {
        if let Some(type_id) = self.type_id.take() {
            let ptr = self.as_mut_ptr();
            // SAFETY: `ptr` points at a live `type_id` instance owned
            // by `self`, about to be discarded.
            unsafe { ctx.destroy_any(type_id, ptr) };
            if let Storage::Heap(ptr, layout) = self.storage {
                // SAFETY: `ptr`/`layout` were produced together by
                // `Self::construct`'s `alloc` call for this same type.
                unsafe { dealloc(ptr, layout) };
            }
        }
        self.storage = Storage::Empty;
    }
}

impl Drop for Any {
    fn drop(&mut self) {
        if let Storage::Heap(ptr, layout) = self.storage {
            if self.type_id.is_some() {
                // Caller didn't route through `destroy` with a
                // context; we can still free the allocation, but the
                // stored value's destructor (if non-trivial) will not
                // run. Matches the original's "destroy before drop"
                // contract: `Any` values with non-trivial types must
                // be destroyed via `destroy(ctx)` before going out of
                // scope.
                // SAFETY: `ptr`/`layout` were produced by `alloc` in
                // `Self::construct` and not yet freed.
                unsafe { dealloc(ptr, layout) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::LayoutPolicy;
    use crate::phf::DefaultPhfRecipe;
    use crate::types::{BuiltinKind, Lifetime};
    use colt_alloc::leaves::System;

    fn test_context() -> RuntimeContext {
        RuntimeContext::create(System, DefaultPhfRecipe).unwrap()
    }

    #[test]
    fn small_builtin_is_stored_inline() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let any = Any::construct(&ctx, i32_ty);
        assert!(matches!(any.storage, Storage::Inline(_)));
    }

    #[test]
    fn large_array_spills_to_heap() {
        let mut ctx = test_context();
        let i64_ty = ctx.builtin(BuiltinKind::I64);
        let big_array = ctx.create_array(i64_ty, 64);
        let any = Any::construct(&ctx, big_array);
        assert!(matches!(any.storage, Storage::Heap(..)));
    }

    #[test]
    fn move_from_inline_leaves_source_empty() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let mut src = Any::construct(&ctx, i32_ty);
        // SAFETY: storage was just allocated for `i32_ty`, a 4-byte
        // trivially constructible type; writing a valid i32 is sound.
        unsafe { (src.as_mut_ptr().cast::<i32>()).write(42) };

        let mut dst = Any::construct_empty();
        dst.construct_from_move(&ctx, &mut src);
        assert!(src.is_empty());
        assert_eq!(dst.type_id(), Some(i32_ty));
        // SAFETY: `dst` now owns a live `i32` value written above.
        let value = unsafe { *dst.as_ptr().cast::<i32>() };
        assert_eq!(value, 42);
        dst.destroy(&ctx);
    }

    #[test]
    fn copy_of_non_copyable_named_type_fails() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let named = ctx
            .create_named_computed(
                "NoCopy",
                vec![("v".into(), String::new(), i32_ty)],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial()],
            )
            .unwrap();
        if let crate::types::TypeDescriptor::Named(n) = ctx.descriptor_mut(named) {
            n.lifetime.bits.trivially_copyable = false;
        }
        let src = Any::construct(&ctx, named);
        let mut dst = Any::construct_empty();
        let result = dst.construct_from_copy(&ctx, &src);
        assert_eq!(result.unwrap_err(), CopyError::NotCopyable);
    }

    #[test]
    fn non_movable_small_type_still_spills_to_heap() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let named = ctx
            .create_named_computed(
                "NoMove",
                vec![("v".into(), String::new(), i32_ty)],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial()],
            )
            .unwrap();
        if let crate::types::TypeDescriptor::Named(n) = ctx.descriptor_mut(named) {
            n.lifetime.bits.trivially_movable = false;
        }
        assert!(ctx.size_of(named) <= INLINE_CAPACITY);
        let any = Any::construct(&ctx, named);
        assert!(matches!(any.storage, Storage::Heap(..)));
    }
}
