// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Reference-counted type-erased values: [`SharedAny`] (a strong
//! reference) and [`WeakAny`] (a non-owning reference that can try to
//! upgrade). Object and control block are a single co-allocated chunk
//! `[object][pad][control block]`, obtained from the type's instance
//! allocator. A single implicit weak reference is held on behalf of
//! all strong references, so the object frees as soon as the last
//! strong reference drops even if weak references remain; the chunk
//! itself frees once the last weak reference (implicit or explicit)
//! drops.

use std::alloc::{alloc, dealloc, Layout as StdLayout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::RuntimeContext;
use crate::error::CopyError;
use crate::types::TypeId;

/// Padded to a cache line so that concurrent strong/weak traffic
/// (producers bumping one counter, consumers bumping the other) don't
/// false-share.
#[repr(align(64))]
struct CachePadded(AtomicUsize);

struct ControlBlock {
    strong: CachePadded,
    // Bumps `weak`'s offset past one cache line from `strong`'s, so
    // the two counters differ by more than 64 bytes even though each
    // `CachePadded` alone is exactly 64.
    _pad: u8,
    weak: CachePadded,
    type_id: TypeId,
}

static_assertions::const_assert!(align_of::<CachePadded>() == 64);

struct Chunk {
    ptr: NonNull<u8>,
    layout: StdLayout,
    control_offset: usize,
}

impl Chunk {
    fn new(ctx: &RuntimeContext, type_id: TypeId) -> Self {
        let obj_layout =
            StdLayout::from_size_align(ctx.size_of(type_id).max(1), ctx.align_of(type_id))
                .expect("type size/align must form a valid layout");
        let required_align = obj_layout.align().max(align_of::<ControlBlock>());
        let control_layout = StdLayout::from_size_align(size_of::<ControlBlock>(), required_align)
            .expect("control block layout must be valid");
        let (extended, control_offset) = obj_layout
            .extend(control_layout)
            .expect("object + control block layout must not overflow");
        let chunk_layout = extended.pad_to_align();
        // SAFETY: `chunk_layout` has nonzero size and a valid
        // power-of-two alignment.
        let ptr = unsafe { alloc(chunk_layout) };
        assert!(!ptr.is_null(), "allocation failure");
        let control_ptr = ptr.wrapping_add(control_offset).cast::<ControlBlock>();
        // SAFETY: `control_ptr` is within the just-allocated chunk and
        // aligned to `ControlBlock`'s alignment by construction.
        unsafe {
            control_ptr.write(ControlBlock {
                strong: CachePadded(AtomicUsize::new(1)),
                _pad: 0,
                weak: CachePadded(AtomicUsize::new(1)),
                type_id,
            });
        }
        Chunk {
            // SAFETY: `alloc` just returned a non-null pointer.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
            layout: chunk_layout,
            control_offset,
        }
    }

    fn object_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn control(&self) -> &ControlBlock {
        // SAFETY: the control block was written by `Chunk::new` at
        // `control_offset` and lives as long as the chunk.
        unsafe { &*self.ptr.as_ptr().add(self.control_offset).cast::<ControlBlock>() }
    }

    fn type_id(&self) -> TypeId {
        self.control().type_id
    }
}

fn release_shared(chunk: &Chunk, ctx: &RuntimeContext) {
    if chunk.control().strong.0.fetch_sub(1, Ordering::AcqRel) == 1 {
        let type_id = chunk.type_id();
        // SAFETY: strong count just hit zero, so no other reference
        // can observe or touch the object; `chunk.object_ptr()` still
        // points at a live instance that hasn't been destroyed yet.
        unsafe { ctx.destroy_any(type_id, chunk.object_ptr()) };
        release_weak_raw(chunk);
    }
}

fn release_weak_raw(chunk: &Chunk) {
    if chunk.control().weak.0.fetch_sub(1, Ordering::AcqRel) == 1 {
        // SAFETY: `ptr`/`layout` were produced by `Chunk::new`'s
        // `alloc` call and not yet freed; weak count hitting zero
        // means no strong or weak reference remains.
        unsafe { dealloc(chunk.ptr.as_ptr(), chunk.layout) };
    }
}

/// A strong, owning reference to a type-erased value. Cloning shares
/// the same co-allocation and bumps the strong count; the last clone
/// to drop runs the type's destructor. An empty `SharedAny` (from
/// [`Self::construct_empty`]) holds no co-allocation at all.
pub struct SharedAny {
    chunk: Option<Chunk>,
}

impl SharedAny {
    /// A `SharedAny` holding nothing; every accessor degrades to its
    /// empty-case default (`None`/null/0) and [`Self::destroy`] is a
    /// no-op.
    #[must_use]
    pub fn construct_empty() -> Self {
        SharedAny { chunk: None }
    }

    /// Allocates a co-allocated `(object, control block)` chunk for
    /// `type_id` with the object bytes left uninitialized. The caller
    /// must initialize the object (e.g. via [`RuntimeContext::move_any`]
    /// or [`RuntimeContext::copy_any`] into [`Self::object_ptr`])
    /// before any read, further move, or drop.
    #[must_use]
    pub fn construct_uninit(ctx: &RuntimeContext, type_id: TypeId) -> Self {
        SharedAny {
            chunk: Some(Chunk::new(ctx, type_id)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk.is_none()
    }

    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.chunk.as_ref().map(Chunk::type_id)
    }

    /// Raw pointer to the stored object's bytes, or null if empty.
    #[must_use]
    pub fn object_ptr(&self) -> *mut u8 {
        self.chunk.as_ref().map_or(std::ptr::null_mut(), Chunk::object_ptr)
    }

    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.chunk
            .as_ref()
            .map_or(0, |c| c.control().strong.0.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.chunk
            .as_ref()
            .map_or(0, |c| c.control().weak.0.load(Ordering::Acquire))
    }

    /// Copy-constructs a new, independent co-allocation holding a copy
    /// of `self`'s object, or an empty `SharedAny` if `src` is empty.
    ///
    /// # Errors
    /// See [`Any::construct_from_copy`](crate::any::Any::construct_from_copy).
    pub fn construct_from_copy(ctx: &RuntimeContext, src: &SharedAny) -> Result<Self, CopyError> {
        let Some(type_id) = src.type_id() else {
            return Ok(SharedAny::construct_empty());
        };
        if let Some(named) = ctx.descriptor(type_id).as_named() {
            if !named.lifetime.is_copyable() {
                return Err(CopyError::NotCopyable);
            }
        }
        let dst = SharedAny::construct_uninit(ctx, type_id);
        // SAFETY: `src.object_ptr()` holds a live `type_id` instance;
        // `dst.object_ptr()` is freshly allocated for the same type
        // and doesn't overlap `src`'s.
        let ok = unsafe { ctx.copy_any(type_id, dst.object_ptr(), src.object_ptr().cast_const()) };
        if ok {
            Ok(dst)
        } else {
            Err(CopyError::FailCopy)
        }
    }

    /// Explicit drop entry point taking the context the object was
    /// constructed in (the type's destructor needs it to recurse into
    /// composite lifetimes). A no-op for an empty `SharedAny`.
    pub fn destroy(self, ctx: &RuntimeContext) {
        if let Some(chunk) = &self.chunk {
            release_shared(chunk, ctx);
        }
        std::mem::forget(self);
    }

    /// Shares this reference, bumping the strong count. Sharing an
    /// empty `SharedAny` yields another empty one.
    #[must_use]
    pub fn share(&self) -> Self {
        match &self.chunk {
            Some(c) => {
                c.control().strong.0.fetch_add(1, Ordering::Relaxed);
                SharedAny {
                    chunk: Some(Chunk {
                        ptr: c.ptr,
                        layout: c.layout,
                        control_offset: c.control_offset,
                    }),
                }
            }
            None => SharedAny::construct_empty(),
        }
    }
}

// `SharedAny`'s `Drop` can't run the type's destructor (it has no
// `RuntimeContext` to recurse with); the best it can do is release the
// reference count and, below a strong count of 0, refuse to leak the
// object's destructor by panicking loudly in debug builds would be
// surprising in `Drop`, so this matches `Any`: callers with
// non-trivial types must call `destroy(ctx)` explicitly.
impl Drop for SharedAny {
    fn drop(&mut self) {
        if let Some(chunk) = &self.chunk {
            if chunk.control().strong.0.fetch_sub(1, Ordering::AcqRel) == 1 {
                release_weak_raw(chunk);
            }
        }
    }
}

/// A non-owning reference to a [`SharedAny`]'s co-allocation. Holds a
/// cached object address so a successful [`Self::try_lock`] doesn't
/// need to dereference the control block to report it.
pub struct WeakAny {
    chunk: Chunk,
    cached_object: *mut u8,
}

// SAFETY: `WeakAny` only ever touches the control block through
// atomics and the cached address, which is `Send`/`Sync` the same way
// a raw pointer is.
unsafe impl Send for WeakAny {}
// SAFETY: see above.
unsafe impl Sync for WeakAny {}

impl WeakAny {
    /// Derives a weak reference from `strong`, incrementing the weak
    /// count.
    ///
    /// # Panics (aborts)
    /// `strong` must not be empty; there is no co-allocation to derive
    /// a weak reference from.
    #[must_use]
    pub fn from_sany(strong: &SharedAny) -> Self {
        colt_contracts::precondition!(!strong.is_empty(), "strong must not be empty");
        let chunk = strong.chunk.as_ref().expect("checked by precondition above");
        chunk.control().weak.0.fetch_add(1, Ordering::Relaxed);
        WeakAny {
            chunk: Chunk {
                ptr: chunk.ptr,
                layout: chunk.layout,
                control_offset: chunk.control_offset,
            },
            cached_object: strong.object_ptr(),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.chunk.type_id()
    }

    /// Attempts to upgrade to a strong reference: a CAS loop that
    /// increments `strong` only while it is nonzero.
    #[must_use]
    pub fn try_lock(&self) -> Option<SharedAny> {
        let strong = &self.chunk.control().strong.0;
        let mut current = strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return None;
            }
            match strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(SharedAny {
                        chunk: Some(Chunk {
                            ptr: self.chunk.ptr,
                            layout: self.chunk.layout,
                            control_offset: self.chunk.control_offset,
                        }),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Same as [`Self::try_lock`], but on success this weak reference
    /// is consumed (its weak count contribution released) rather than
    /// left outstanding. On failure, `self` is returned unchanged so
    /// the caller can retry or drop it normally.
    ///
    /// # Errors
    /// Returns `Err(self)` if the strong count had already reached
    /// zero.
    pub fn try_lock_consume(self) -> Result<SharedAny, Self> {
        match self.try_lock() {
            Some(shared) => {
                release_weak_raw(&self.chunk);
                std::mem::forget(self);
                Ok(shared)
            }
            None => Err(self),
        }
    }

    #[must_use]
    pub fn cached_object_addr(&self) -> *mut u8 {
        self.cached_object
    }
}

impl Clone for WeakAny {
    fn clone(&self) -> Self {
        self.chunk.control().weak.0.fetch_add(1, Ordering::Relaxed);
        WeakAny {
            chunk: Chunk {
                ptr: self.chunk.ptr,
                layout: self.chunk.layout,
                control_offset: self.chunk.control_offset,
            },
            cached_object: self.cached_object,
        }
    }
}

impl Drop for WeakAny {
    fn drop(&mut self) {
        release_weak_raw(&self.chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phf::DefaultPhfRecipe;
    use crate::types::BuiltinKind;
    use colt_alloc::leaves::System;

    fn test_context() -> RuntimeContext {
        RuntimeContext::create(System, DefaultPhfRecipe).unwrap()
    }

    #[test]
    fn control_block_counters_are_well_separated() {
        let strong_offset = std::mem::offset_of!(ControlBlock, strong);
        let weak_offset = std::mem::offset_of!(ControlBlock, weak);
        assert!(weak_offset.abs_diff(strong_offset) > 64);
    }

    #[test]
    fn share_bumps_strong_and_drop_brings_it_back_down() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let a = SharedAny::construct_uninit(&ctx, i32_ty);
        // SAFETY: freshly allocated storage for a 4-byte builtin type.
        unsafe { a.object_ptr().cast::<i32>().write(7) };
        assert_eq!(a.strong_count(), 1);
        let b = a.share();
        assert_eq!(a.strong_count(), 2);
        drop(b);
        assert_eq!(a.strong_count(), 1);
        a.destroy(&ctx);
    }

    #[test]
    fn weak_upgrade_fails_after_last_strong_drops() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let a = SharedAny::construct_uninit(&ctx, i32_ty);
        // SAFETY: freshly allocated storage for a 4-byte builtin type.
        unsafe { a.object_ptr().cast::<i32>().write(7) };
        let w = WeakAny::from_sany(&a);
        match w.try_lock() {
            Some(s) => s.destroy(&ctx),
            None => panic!("expected successful upgrade"),
        }
        a.destroy(&ctx);
        assert!(w.try_lock().is_none());
    }

    #[test]
    fn try_lock_consume_releases_weak_on_success() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let a = SharedAny::construct_uninit(&ctx, i32_ty);
        // SAFETY: freshly allocated storage for a 4-byte builtin type.
        unsafe { a.object_ptr().cast::<i32>().write(7) };
        let w = WeakAny::from_sany(&a);
        assert_eq!(a.weak_count(), 2);
        let upgraded = w.try_lock_consume().ok().expect("strong count is nonzero");
        assert_eq!(a.weak_count(), 1);
        upgraded.destroy(&ctx);
        a.destroy(&ctx);
    }

    #[test]
    fn empty_shared_any_has_no_type_and_destroys_as_a_no_op() {
        let ctx = test_context();
        let empty = SharedAny::construct_empty();
        assert!(empty.is_empty());
        assert_eq!(empty.type_id(), None);
        assert!(empty.object_ptr().is_null());
        assert_eq!(empty.strong_count(), 0);
        empty.destroy(&ctx);
    }

    #[test]
    fn copy_of_empty_shared_any_is_empty() {
        let ctx = test_context();
        let empty = SharedAny::construct_empty();
        let copy = SharedAny::construct_from_copy(&ctx, &empty).unwrap();
        assert!(copy.is_empty());
        empty.destroy(&ctx);
        copy.destroy(&ctx);
    }
}
