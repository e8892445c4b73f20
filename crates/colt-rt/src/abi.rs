// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `extern "C"` surface over [`crate::context::RuntimeContext`].
//! Every handle crossing this boundary is a raw pointer or an opaque
//! index; callers own what they get back from a `*_create`/`*_init`
//! function and must route it through the matching `*_destroy`.
//!
//! Two deliberate narrowings from the wider Rust API:
//! - `colt_rt_create`'s `alloc_recipe`/`phf_recipe` parameters are
//!   acceptance checks, not injection points — a C caller cannot hand
//!   across a Rust generic allocator type, so both must be null and
//!   the context always uses the default leaf allocator and the
//!   hashmap perfect-hash recipe. A non-null recipe is reported as
//!   invalid rather than silently ignored.
//! - `type_create`/`type_create_runtime` don't accept
//!   `alloc_override`/`phf_override`; every named type uses the
//!   context's defaults.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;

use crate::any::Any;
use crate::context::{PreparedMember, RuntimeContext};
use crate::error::{CopyError, CreateError, LookupError, NamedTypeError};
use crate::named::{LayoutPolicy, Member};
use crate::phf::DefaultPhfRecipe;
use crate::shared::{SharedAny, WeakAny};
use crate::types::{BuiltinKind, Lifetime, LifetimeBits, TypeId};

/// An opaque type handle. Only meaningful relative to the
/// [`RuntimeContext`] that produced it.
pub type TypeHandle = u32;

fn to_handle(id: TypeId) -> TypeHandle {
    id.0
}

fn from_handle(handle: TypeHandle) -> TypeId {
    TypeId(handle)
}

#[repr(C)]
pub enum ResultContext {
    Success(*mut RuntimeContext),
    FailInvalidAllocator,
    FailInvalidPhf,
    FailMemory,
    FailCreateAllocator,
}

impl From<CreateError> for ResultContext {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::InvalidAllocator => ResultContext::FailInvalidAllocator,
            CreateError::InvalidPhf => ResultContext::FailInvalidPhf,
            CreateError::FailMemory => ResultContext::FailMemory,
            CreateError::FailCreateAllocator => ResultContext::FailCreateAllocator,
        }
    }
}

/// # Safety
/// `alloc_recipe`/`phf_recipe` must each be null or a pointer this
/// function is documented to reject; both are currently rejected
/// whenever non-null (see the module docs).
#[no_mangle]
pub unsafe extern "C" fn colt_rt_create(
    alloc_recipe: *const c_void,
    phf_recipe: *const c_void,
) -> ResultContext {
    if !alloc_recipe.is_null() {
        return ResultContext::FailInvalidAllocator;
    }
    if !phf_recipe.is_null() {
        return ResultContext::FailInvalidPhf;
    }
    match RuntimeContext::create(colt_alloc::leaves::System, DefaultPhfRecipe) {
        Ok(ctx) => ResultContext::Success(Box::into_raw(Box::new(ctx))),
        Err(e) => e.into(),
    }
}

/// # Safety
/// `ctx` must be a pointer returned by [`colt_rt_create`] and not
/// already destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_destroy(ctx: *mut RuntimeContext) {
    colt_contracts::precondition!(!ctx.is_null(), "ctx must not be null");
    // SAFETY: caller contract above.
    drop(unsafe { Box::from_raw(ctx) });
}

#[repr(C)]
pub enum ResultType {
    Success(TypeHandle),
    FailExists,
    FailMemory,
    FailCreatePhf,
    FailInvalidKind,
}

impl From<NamedTypeError> for ResultType {
    fn from(e: NamedTypeError) -> Self {
        match e {
            NamedTypeError::NameAlreadyExists => ResultType::FailExists,
            NamedTypeError::FailMemory => ResultType::FailMemory,
            NamedTypeError::FailPhf => ResultType::FailCreatePhf,
        }
    }
}

/// # Safety
/// `ctx` must be a live pointer from [`colt_rt_create`].
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create_builtin(ctx: *mut RuntimeContext, kind: u8) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    match BuiltinKind::ALL.get(kind as usize) {
        Some(&k) => ResultType::Success(to_handle(ctx.builtin(k))),
        None => ResultType::FailInvalidKind,
    }
}

/// # Safety
/// `ctx` must be a live pointer from [`colt_rt_create`]; `pointee`
/// must be a handle it previously returned.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create_ptr(
    ctx: *mut RuntimeContext,
    pointee: TypeHandle,
    is_const: bool,
) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    ResultType::Success(to_handle(ctx.create_pointer(from_handle(pointee), is_const)))
}

/// # Safety
/// Same as [`colt_rt_type_create_ptr`].
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create_array(
    ctx: *mut RuntimeContext,
    element: TypeHandle,
    count: u64,
) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    ResultType::Success(to_handle(ctx.create_array(from_handle(element), count)))
}

/// # Safety
/// `ctx` must be live; `ret` is a handle or `TypeHandle::MAX` meaning
/// "unit"; `args`/`args_len` describe a valid slice of handles (or
/// `args` is null with `args_len == 0`).
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create_fn(
    ctx: *mut RuntimeContext,
    ret: TypeHandle,
    args: *const TypeHandle,
    args_len: usize,
) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    let ret = if ret == TypeHandle::MAX {
        ctx.builtin(BuiltinKind::Unit)
    } else {
        from_handle(ret)
    };
    // SAFETY: caller guarantees `args` describes `args_len` handles.
    let args: &[TypeHandle] = if args.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(args, args_len) }
    };
    let args: Vec<TypeId> = args.iter().copied().map(from_handle).collect();
    ResultType::Success(to_handle(ctx.create_function(ret, &args)))
}

/// A single named-type member with an explicit offset, as handed
/// across the ABI boundary.
#[repr(C)]
pub struct CMember {
    pub name: *const c_char,
    pub description: *const c_char,
    pub type_id: TypeHandle,
    pub offset: usize,
}

/// A named-type member without a precomputed offset, for
/// [`colt_rt_type_create_runtime`].
#[repr(C)]
pub struct CMemberInfo {
    pub name: *const c_char,
    pub description: *const c_char,
    pub type_id: TypeHandle,
}

/// The trivial/non-trivial lifetime contract for a named type created
/// across the ABI boundary.
#[repr(C)]
pub struct CLifetime {
    pub trivially_movable: bool,
    pub trivially_copyable: bool,
    pub trivially_destructible: bool,
    pub move_fn: Option<extern "C" fn(*mut u8, *mut u8)>,
    pub copy_fn: Option<extern "C" fn(*mut u8, *const u8) -> bool>,
    pub destroy_fn: Option<extern "C" fn(*mut u8)>,
}

fn lifetime_from_c(c: &CLifetime) -> Lifetime {
    Lifetime {
        bits: LifetimeBits {
            trivially_movable: c.trivially_movable,
            trivially_copyable: c.trivially_copyable,
            trivially_destructible: c.trivially_destructible,
        },
        move_fn: c.move_fn,
        copy_fn: c.copy_fn,
        destroy_fn: c.destroy_fn,
    }
}

/// # Safety
/// `ctx`/`name` must be valid; `members` must point at `members_len`
/// valid [`CMember`] entries whose `name`/`description` are valid
/// nul-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create(
    ctx: *mut RuntimeContext,
    name: *const c_char,
    members: *const CMember,
    members_len: usize,
    size: usize,
    align: usize,
    lifetime: *const CLifetime,
) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    // SAFETY: caller guarantees `name` is a valid C string.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    // SAFETY: caller guarantees `members` describes `members_len` entries.
    let members = unsafe { std::slice::from_raw_parts(members, members_len) };
    let members: Vec<(String, String, TypeId, usize)> = members
        .iter()
        .map(|m| {
            // SAFETY: caller guarantees valid C strings per entry.
            let member_name = unsafe { CStr::from_ptr(m.name) }.to_string_lossy().into_owned();
            // SAFETY: same as above.
            let description = unsafe { CStr::from_ptr(m.description) }.to_string_lossy().into_owned();
            (member_name, description, from_handle(m.type_id), m.offset)
        })
        .collect();
    // SAFETY: caller guarantees `lifetime` is valid.
    let lifetime = lifetime_from_c(unsafe { &*lifetime });
    match ctx.create_named_explicit(&name, members, size, align, lifetime) {
        Ok(id) => ResultType::Success(to_handle(id)),
        Err(e) => e.into(),
    }
}

/// # Safety
/// Same contract as [`colt_rt_type_create`], but `members` is a
/// [`CMemberInfo`] array (no offsets) and each entry in
/// `member_lifetimes` (length `members_len`) aggregates into the
/// synthesized type's own lifetime bits.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_create_runtime(
    ctx: *mut RuntimeContext,
    name: *const c_char,
    members: *const CMemberInfo,
    members_len: usize,
    member_lifetimes: *const CLifetime,
    layout_optimize: bool,
) -> ResultType {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    // SAFETY: caller guarantees `name` is a valid C string.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    // SAFETY: caller guarantees `members` describes `members_len` entries.
    let members = unsafe { std::slice::from_raw_parts(members, members_len) };
    let member_infos: Vec<(String, String, TypeId)> = members
        .iter()
        .map(|m| {
            // SAFETY: caller guarantees valid C strings per entry.
            let member_name = unsafe { CStr::from_ptr(m.name) }.to_string_lossy().into_owned();
            // SAFETY: same as above.
            let description = unsafe { CStr::from_ptr(m.description) }.to_string_lossy().into_owned();
            (member_name, description, from_handle(m.type_id))
        })
        .collect();
    // SAFETY: caller guarantees `member_lifetimes` describes `members_len` entries.
    let lifetimes = unsafe { std::slice::from_raw_parts(member_lifetimes, members_len) };
    let lifetimes: Vec<Lifetime> = lifetimes.iter().map(lifetime_from_c).collect();
    let policy = if layout_optimize {
        LayoutPolicy::OptimizeSizeFast
    } else {
        LayoutPolicy::AsDeclared
    };
    match ctx.create_named_computed(&name, member_infos, policy, &lifetimes) {
        Ok(id) => ResultType::Success(to_handle(id)),
        Err(e) => e.into(),
    }
}

#[repr(C)]
pub enum ResultLookup {
    Found(usize),
    MismatchType(TypeHandle),
    NotFound,
    ExpectedNamed,
}

fn lookup_result(result: Result<&Member, LookupError>) -> ResultLookup {
    match result {
        Ok(m) => ResultLookup::Found(m.offset),
        Err(LookupError::ExpectedNamed) => ResultLookup::ExpectedNamed,
        Err(LookupError::NotFound) => ResultLookup::NotFound,
        Err(LookupError::TypeMismatch) => ResultLookup::NotFound,
    }
}

/// # Safety
/// `ctx` must be live; `name` a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_lookup_fast(
    ctx: *const RuntimeContext,
    named: TypeHandle,
    name: *const c_char,
    expected: TypeHandle,
) -> ResultLookup {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    // SAFETY: caller guarantees `name` is a valid C string.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    lookup_result(ctx.lookup_fast(from_handle(named), &name, from_handle(expected)))
}

/// # Safety
/// Same as [`colt_rt_type_lookup_fast`].
#[no_mangle]
pub unsafe extern "C" fn colt_rt_type_lookup(
    ctx: *const RuntimeContext,
    named: TypeHandle,
    name: *const c_char,
    expected: TypeHandle,
) -> ResultLookup {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    // SAFETY: caller guarantees `name` is a valid C string.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    lookup_result(ctx.lookup(from_handle(named), &name, from_handle(expected)))
}

/// An opaque, repeatedly resolvable member lookup, as handed across
/// the ABI boundary. Only meaningful against the [`RuntimeContext`]
/// that produced it and the `named` type it was prepared for.
#[repr(C)]
pub struct CPreparedMember {
    pub named: TypeHandle,
    pub phf_index: u64,
    pub name_hash: u64,
}

fn prepared_to_c(pm: PreparedMember) -> CPreparedMember {
    CPreparedMember {
        named: to_handle(pm.named),
        phf_index: pm.phf_index,
        name_hash: pm.name_hash,
    }
}

fn prepared_from_c(pm: &CPreparedMember) -> PreparedMember {
    PreparedMember {
        named: from_handle(pm.named),
        phf_index: pm.phf_index,
        name_hash: pm.name_hash,
    }
}

#[repr(C)]
pub enum ResultPrepare {
    Success(CPreparedMember),
    ExpectedNamed,
    NotFound,
}

/// # Safety
/// `ctx` must be live; `name` a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_prepare_member(
    ctx: *const RuntimeContext,
    named: TypeHandle,
    name: *const c_char,
) -> ResultPrepare {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    // SAFETY: caller guarantees `name` is a valid C string.
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    match ctx.prepare_member(from_handle(named), &name) {
        Ok(pm) => ResultPrepare::Success(prepared_to_c(pm)),
        Err(LookupError::ExpectedNamed) => ResultPrepare::ExpectedNamed,
        Err(LookupError::NotFound | LookupError::TypeMismatch) => ResultPrepare::NotFound,
    }
}

/// # Safety
/// `ctx` must be live; `pm` must have been produced by
/// [`colt_rt_prepare_member`] against this same context.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_resolve_prepared_member(
    ctx: *const RuntimeContext,
    pm: *const CPreparedMember,
    expected: TypeHandle,
) -> ResultLookup {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    // SAFETY: caller guarantees `pm` is valid.
    let pm = prepared_from_c(unsafe { &*pm });
    lookup_result(ctx.resolve_prepared(&pm, from_handle(expected)))
}

/// # Safety
/// Same as [`colt_rt_type_lookup_fast`].
#[no_mangle]
pub unsafe extern "C" fn colt_rt_register_set_type(
    ctx: *mut RuntimeContext,
    opaque_id: usize,
    type_id: TypeHandle,
) -> bool {
    // SAFETY: caller contract above.
    let ctx = unsafe { &mut *ctx };
    ctx.register_opaque(opaque_id, from_handle(type_id));
    true
}

/// Returns `TypeHandle::MAX` if nothing is registered under `opaque_id`.
///
/// # Safety
/// `ctx` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_register_get_type(
    ctx: *const RuntimeContext,
    opaque_id: usize,
) -> TypeHandle {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    ctx.resolve_opaque(opaque_id).map_or(TypeHandle::MAX, to_handle)
}

/// An in-progress reflection walk over a named type's members. See
/// [`colt_rt_reflect_create`].
pub struct ReflectIter {
    ctx: *const RuntimeContext,
    named: TypeId,
    index: usize,
}

/// Reflected fields for one member, filled in by
/// [`colt_rt_reflect_read`]. `name`/`description` are `(ptr, len)`
/// pairs into the context's own storage, not necessarily
/// nul-terminated — Rust's `String` doesn't guarantee a trailing nul,
/// so length accompanies the pointer rather than promising C-string
/// framing.
#[repr(C)]
pub struct CReflectedMember {
    pub name: *const c_char,
    pub name_len: usize,
    pub description: *const c_char,
    pub description_len: usize,
    pub type_id: TypeHandle,
    pub offset: usize,
}

/// # Safety
/// `ctx` must be live and `named` one of its named-type handles.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_reflect_create(
    ctx: *const RuntimeContext,
    named: TypeHandle,
) -> *mut ReflectIter {
    Box::into_raw(Box::new(ReflectIter {
        ctx,
        named: from_handle(named),
        index: 0,
    }))
}

/// Writes the member at the iterator's current position into `out`
/// and returns `true`, or returns `false` (leaving `out` untouched) if
/// the walk is exhausted or `named` wasn't a named type. The returned
/// `name`/`description` pointers alias the context's own storage and
/// are valid only until the context is destroyed.
///
/// # Safety
/// `it`/`out` must be valid, non-aliasing pointers.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_reflect_read(it: *const ReflectIter, out: *mut CReflectedMember) -> bool {
    // SAFETY: caller contract above.
    let it = unsafe { &*it };
    // SAFETY: `it.ctx` was captured live by `colt_rt_reflect_create`
    // and the contract requires the context to still be alive.
    let ctx = unsafe { &*it.ctx };
    let Some(named) = ctx.descriptor(it.named).as_named() else {
        return false;
    };
    let Some(member) = named.members.get(it.index) else {
        return false;
    };
    // SAFETY: `out` is a valid, writable pointer per caller contract.
    unsafe {
        out.write(CReflectedMember {
            name: member.name.as_ptr().cast::<c_char>(),
            name_len: member.name.len(),
            description: member.description.as_ptr().cast::<c_char>(),
            description_len: member.description.len(),
            type_id: to_handle(member.type_id),
            offset: member.offset,
        });
    }
    true
}

/// # Safety
/// `it` must be a live pointer from [`colt_rt_reflect_create`].
#[no_mangle]
pub unsafe extern "C" fn colt_rt_reflect_advance(it: *mut ReflectIter) {
    // SAFETY: caller contract above.
    let it = unsafe { &mut *it };
    it.index += 1;
}

/// # Safety
/// `it` must be a live pointer from [`colt_rt_reflect_create`] and not
/// already destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_reflect_destroy(it: *mut ReflectIter) {
    colt_contracts::precondition!(!it.is_null(), "it must not be null");
    // SAFETY: caller contract above.
    drop(unsafe { Box::from_raw(it) });
}

/// Returns the named type's name as a pointer into the context's own
/// storage (with its byte length written to `out_len`), or null if
/// `named` isn't a named type.
///
/// # Safety
/// `ctx`/`out_len` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_reflect_name(
    ctx: *const RuntimeContext,
    named: TypeHandle,
    out_len: *mut usize,
) -> *const c_char {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    match ctx.descriptor(from_handle(named)).as_named() {
        Some(n) => {
            // SAFETY: caller guarantees `out_len` is writable.
            unsafe { out_len.write(n.name.len()) };
            n.name.as_ptr().cast::<c_char>()
        }
        None => ptr::null(),
    }
}

#[no_mangle]
pub extern "C" fn colt_rt_any_construct_empty() -> *mut Any {
    Box::into_raw(Box::new(Any::construct_empty()))
}

/// # Safety
/// `ctx` must be live; `type_id` must be one of its handles.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_any_init(ctx: *const RuntimeContext, type_id: TypeHandle) -> *mut Any {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    Box::into_raw(Box::new(Any::construct(ctx, from_handle(type_id))))
}

/// # Safety
/// `ctx`/`dst`/`src` must be live, distinct pointers.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_any_construct_from_move(
    ctx: *const RuntimeContext,
    dst: *mut Any,
    src: *mut Any,
) {
    // SAFETY: caller contract above.
    let (ctx, dst, src) = unsafe { (&*ctx, &mut *dst, &mut *src) };
    dst.construct_from_move(ctx, src);
}

#[repr(C)]
pub enum ResultCopy {
    Success,
    NotCopyable,
    FailMemory,
    FailCopy,
}

impl From<CopyError> for ResultCopy {
    fn from(e: CopyError) -> Self {
        match e {
            CopyError::NotCopyable => ResultCopy::NotCopyable,
            CopyError::FailMemory => ResultCopy::FailMemory,
            CopyError::FailCopy => ResultCopy::FailCopy,
        }
    }
}

/// # Safety
/// `ctx`/`dst`/`src` must be live, distinct pointers.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_any_construct_from_copy(
    ctx: *const RuntimeContext,
    dst: *mut Any,
    src: *const Any,
) -> ResultCopy {
    // SAFETY: caller contract above.
    let (ctx, dst, src) = unsafe { (&*ctx, &mut *dst, &*src) };
    match dst.construct_from_copy(ctx, src) {
        Ok(()) => ResultCopy::Success,
        Err(e) => e.into(),
    }
}

/// # Safety
/// `ctx`/`any` must be live; `any` must not already be destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_any_destroy(ctx: *const RuntimeContext, any: *mut Any) {
    colt_contracts::precondition!(!any.is_null(), "any must not be null");
    // SAFETY: caller contract above.
    let (ctx, mut boxed) = unsafe { (&*ctx, Box::from_raw(any)) };
    boxed.destroy(ctx);
}

/// A `SharedAny` holding nothing; every accessor degrades to its
/// empty-case default and destroying it is a no-op.
#[no_mangle]
pub extern "C" fn colt_rt_sany_construct_empty() -> *mut SharedAny {
    Box::into_raw(Box::new(SharedAny::construct_empty()))
}

/// # Safety
/// `ctx` must be live; `type_id` one of its handles.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_sany_init(ctx: *const RuntimeContext, type_id: TypeHandle) -> *mut SharedAny {
    // SAFETY: caller contract above.
    let ctx = unsafe { &*ctx };
    Box::into_raw(Box::new(SharedAny::construct_uninit(ctx, from_handle(type_id))))
}

/// # Safety
/// `ctx`/`src` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_sany_construct_from_copy(
    ctx: *const RuntimeContext,
    src: *const SharedAny,
) -> *mut SharedAny {
    // SAFETY: caller contract above.
    let (ctx, src) = unsafe { (&*ctx, &*src) };
    match SharedAny::construct_from_copy(ctx, src) {
        Ok(shared) => Box::into_raw(Box::new(shared)),
        Err(_) => ptr::null_mut(),
    }
}

/// # Safety
/// `ctx`/`sany` must be live; `sany` must not already be destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_sany_destroy(ctx: *const RuntimeContext, sany: *mut SharedAny) {
    colt_contracts::precondition!(!sany.is_null(), "sany must not be null");
    // SAFETY: caller contract above.
    let (ctx, boxed) = unsafe { (&*ctx, Box::from_raw(sany)) };
    boxed.destroy(ctx);
}

/// # Safety
/// `sany` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_wany_from_sany(sany: *const SharedAny) -> *mut WeakAny {
    // SAFETY: caller contract above.
    let sany = unsafe { &*sany };
    Box::into_raw(Box::new(WeakAny::from_sany(sany)))
}

/// Duplicates a weak reference (bumps the weak count), the same way
/// cloning a `SharedAny` bumps the strong count.
///
/// # Safety
/// `weak` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_wany_construct_from_copy(weak: *const WeakAny) -> *mut WeakAny {
    // SAFETY: caller contract above.
    let weak = unsafe { &*weak };
    Box::into_raw(Box::new(weak.clone()))
}

/// Returns a newly boxed [`SharedAny`], or null if the strong count
/// had already reached zero.
///
/// # Safety
/// `weak` must be live.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_wany_try_lock(weak: *const WeakAny) -> *mut SharedAny {
    // SAFETY: caller contract above.
    let weak = unsafe { &*weak };
    match weak.try_lock() {
        Some(shared) => Box::into_raw(Box::new(shared)),
        None => ptr::null_mut(),
    }
}

/// Same as [`colt_rt_wany_try_lock`] but consumes (and frees) `weak`
/// regardless of outcome.
///
/// # Safety
/// `weak` must be a live pointer not already destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_wany_try_lock_consume(weak: *mut WeakAny) -> *mut SharedAny {
    colt_contracts::precondition!(!weak.is_null(), "weak must not be null");
    // SAFETY: caller contract above.
    let boxed = unsafe { Box::from_raw(weak) };
    match boxed.try_lock_consume() {
        Ok(shared) => Box::into_raw(Box::new(shared)),
        Err(_weak_still_outstanding) => ptr::null_mut(),
    }
}

/// # Safety
/// `weak` must be a live pointer not already destroyed.
#[no_mangle]
pub unsafe extern "C" fn colt_rt_wany_destroy(weak: *mut WeakAny) {
    colt_contracts::precondition!(!weak.is_null(), "weak must not be null");
    // SAFETY: caller contract above.
    drop(unsafe { Box::from_raw(weak) });
}
