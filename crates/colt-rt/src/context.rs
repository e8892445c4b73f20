// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! [`RuntimeContext`]: owns a default allocator, a perfect-hash-function
//! recipe, and every type descriptor it has created. Pointer, array,
//! and function descriptors are deduplicated by structural key; named
//! descriptors are keyed by name.
//!
//! Teardown in the original system is a manually ordered walk (PHF and
//! allocator destructors per named type, then free the descriptor
//! blobs, then pointer/array nodes, then function bucket chains,
//! finally the context's own allocator). Here every descriptor and the
//! context's own allocator box are owned by the arena `Vec`, so an
//! ordinary `Drop` performs the equivalent teardown in the equivalent
//! order (each `NamedType`'s boxed `PhfRecipe`/allocator state drops
//! before the arena `Vec` itself is freed) — [`RuntimeContext::destroy`]
//! exists for symmetry with `create` but is just `drop(self)`.

use hashbrown::HashMap;

use colt_alloc::{Allocator, Block, Layout};

use crate::error::{CreateError, LookupError, NamedTypeError};
use crate::named::{aggregate_lifetime, compute_layout, LayoutPolicy, Member, MemberInfo, NamedType};
use crate::phf::PhfRecipe;
use crate::types::{
    ArrayType, BuiltinKind, FunctionType, Lifetime, PointerType, TypeDescriptor, TypeId,
};

/// An object-safe façade over [`Allocator`]; `Allocator`'s associated
/// `const INFO` makes the trait itself non-object-safe, so a context's
/// default allocator is erased through this narrower interface instead.
pub trait ErasedAllocator: Send + Sync {
    fn allocate(&self, layout: Layout) -> Block;
    fn deallocate(&self, block: Block);
}

impl<A: Allocator + Send + Sync> ErasedAllocator for A {
    fn allocate(&self, layout: Layout) -> Block {
        Allocator::allocate(self, layout)
    }

    fn deallocate(&self, block: Block) {
        Allocator::deallocate(self, block);
    }
}

fn hash_name(name: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

fn hash_function_key(ret: TypeId, args: &[TypeId]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    ret.0.hash(&mut hasher);
    args.iter().for_each(|a| a.0.hash(&mut hasher));
    hasher.finish()
}

/// An opaque, repeatedly resolvable member lookup prepared against a
/// named type. See [`RuntimeContext::prepare_member`].
#[derive(Debug, Clone, Copy)]
pub struct PreparedMember {
    pub(crate) named: TypeId,
    pub(crate) phf_index: u64,
    pub(crate) name_hash: u64,
}

/// A runtime type-erasure context. See the module docs.
pub struct RuntimeContext {
    alloc: Box<dyn ErasedAllocator>,
    phf_recipe: Box<dyn PhfRecipe>,
    types: Vec<TypeDescriptor>,
    builtins: HashMap<BuiltinKind, TypeId>,
    pointer_dedup: HashMap<(TypeId, bool), TypeId>,
    array_dedup: HashMap<(TypeId, u64), TypeId>,
    function_buckets: HashMap<u64, Vec<TypeId>>,
    named_by_name: HashMap<String, TypeId>,
    opaque_registry: HashMap<usize, TypeId>,
}

impl RuntimeContext {
    /// Validates `alloc`/`phf_recipe` and builds a context pre-populated
    /// with the builtin type descriptors.
    ///
    /// # Errors
    /// See [`CreateError`].
    pub fn create<A>(alloc: A, phf_recipe: impl PhfRecipe + 'static) -> Result<Self, CreateError>
    where
        A: Allocator + Send + Sync + 'static,
    {
        if A::INFO.alignment == 0 || !A::INFO.alignment.is_power_of_two() {
            return Err(CreateError::InvalidAllocator);
        }
        let probe = phf_recipe.construct(&[]).map_err(|()| CreateError::InvalidPhf)?;
        drop(probe);

        let mut ctx = RuntimeContext {
            alloc: Box::new(alloc),
            phf_recipe: Box::new(phf_recipe),
            types: Vec::new(),
            builtins: HashMap::new(),
            pointer_dedup: HashMap::new(),
            array_dedup: HashMap::new(),
            function_buckets: HashMap::new(),
            named_by_name: HashMap::new(),
            opaque_registry: HashMap::new(),
        };
        for kind in BuiltinKind::ALL {
            let id = ctx.push_type(TypeDescriptor::Builtin(kind));
            ctx.builtins.insert(kind, id);
        }
        Ok(ctx)
    }

    /// Symmetric with [`Self::create`]; equivalent to `drop(self)`.
    pub fn destroy(self) {
        drop(self);
    }

    fn push_type(&mut self, desc: TypeDescriptor) -> TypeId {
        let id = TypeId(u32::try_from(self.types.len()).expect("type arena overflow"));
        self.types.push(desc);
        id
    }

    #[must_use]
    pub fn builtin(&self, kind: BuiltinKind) -> TypeId {
        self.builtins[&kind]
    }

    #[must_use]
    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.0 as usize]
    }

    pub(crate) fn descriptor_mut(&mut self, id: TypeId) -> &mut TypeDescriptor {
        &mut self.types[id.0 as usize]
    }

    #[must_use]
    pub fn size_of(&self, id: TypeId) -> usize {
        self.descriptor(id).size(|t| self.size_of(t))
    }

    #[must_use]
    pub fn align_of(&self, id: TypeId) -> usize {
        self.descriptor(id).align(|t| self.align_of(t))
    }

    /// Whether a value of `id` can be relocated to a new address
    /// (bitwise, or via its move function). Arrays are movable iff
    /// their element is; builtins, pointers, and function types are
    /// always bitwise-movable.
    #[must_use]
    pub fn is_movable(&self, id: TypeId) -> bool {
        match self.descriptor(id) {
            TypeDescriptor::Named(n) => n.lifetime.is_movable(),
            TypeDescriptor::Array(a) => self.is_movable(a.element),
            TypeDescriptor::Builtin(_) | TypeDescriptor::Pointer(_) | TypeDescriptor::Function(_) => true,
        }
    }

    /// Returns the deduplicated pointer type `(pointee, is_const)`.
    pub fn create_pointer(&mut self, pointee: TypeId, is_const: bool) -> TypeId {
        if let Some(&id) = self.pointer_dedup.get(&(pointee, is_const)) {
            return id;
        }
        let id = self.push_type(TypeDescriptor::Pointer(PointerType { pointee, is_const }));
        self.pointer_dedup.insert((pointee, is_const), id);
        id
    }

    /// Returns the deduplicated array type `(element, count)`.
    pub fn create_array(&mut self, element: TypeId, count: u64) -> TypeId {
        if let Some(&id) = self.array_dedup.get(&(element, count)) {
            return id;
        }
        let id = self.push_type(TypeDescriptor::Array(ArrayType { element, count }));
        self.array_dedup.insert((element, count), id);
        id
    }

    /// Returns the deduplicated function type `(ret, args)`, hashed
    /// into a bucket and full-compared within it.
    pub fn create_function(&mut self, ret: TypeId, args: &[TypeId]) -> TypeId {
        let key = hash_function_key(ret, args);
        if let Some(bucket) = self.function_buckets.get(&key) {
            for &candidate in bucket {
                if let TypeDescriptor::Function(f) = self.descriptor(candidate) {
                    if f.ret == ret && f.args.as_slice() == args {
                        return candidate;
                    }
                }
            }
        }
        let id = self.push_type(TypeDescriptor::Function(FunctionType {
            ret,
            args: args.iter().copied().collect(),
        }));
        self.function_buckets.entry(key).or_default().push(id);
        id
    }

    /// Creates a named type from members with explicit offsets.
    ///
    /// # Errors
    /// [`NamedTypeError::NameAlreadyExists`] if `name` is already registered.
    pub fn create_named_explicit(
        &mut self,
        name: &str,
        members: Vec<(String, String, TypeId, usize)>,
        size: usize,
        align: usize,
        lifetime: Lifetime,
    ) -> Result<TypeId, NamedTypeError> {
        if self.named_by_name.contains_key(name) {
            return Err(NamedTypeError::NameAlreadyExists);
        }
        let keys: Vec<&[u8]> = members.iter().map(|(n, ..)| n.as_bytes()).collect();
        let phf = self
            .phf_recipe
            .construct(&keys)
            .map_err(|()| NamedTypeError::FailPhf)?;

        let members: Vec<Member> = members
            .into_iter()
            .map(|(member_name, description, type_id, offset)| Member {
                name_hash: hash_name(&member_name),
                name: member_name,
                description,
                type_id,
                offset,
            })
            .collect();

        let named = NamedType {
            name: name.to_string(),
            size,
            align,
            lifetime,
            members,
            phf: Some(phf),
        };
        let id = self.push_type(TypeDescriptor::Named(Box::new(named)));
        self.named_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Creates a named type computing member offsets per `policy`.
    ///
    /// # Errors
    /// See [`Self::create_named_explicit`].
    pub fn create_named_computed(
        &mut self,
        name: &str,
        member_infos: Vec<(String, String, TypeId)>,
        policy: LayoutPolicy,
        member_lifetimes: &[Lifetime],
    ) -> Result<TypeId, NamedTypeError> {
        let infos: Vec<MemberInfo> = member_infos
            .iter()
            .map(|(member_name, description, type_id)| MemberInfo {
                name: member_name.clone(),
                description: description.clone(),
                type_id: *type_id,
                size: self.size_of(*type_id),
                align: self.align_of(*type_id),
            })
            .collect();
        let (offsets, size, align) = compute_layout(policy, &infos);
        let bits = aggregate_lifetime(member_lifetimes);
        let lifetime = Lifetime {
            bits,
            move_fn: None,
            copy_fn: None,
            destroy_fn: None,
        };
        let members: Vec<(String, String, TypeId, usize)> = member_infos
            .into_iter()
            .zip(offsets)
            .map(|((member_name, description, type_id), offset)| {
                (member_name, description, type_id, offset)
            })
            .collect();
        self.create_named_explicit(name, members, size, align, lifetime)
    }

    /// Applies the named type's PHF to `name` and compares only the
    /// entry's type pointer and name hash — a false positive is
    /// possible on a `hash(name)` collision, by design.
    ///
    /// # Errors
    /// See [`LookupError`].
    pub fn lookup_fast(
        &self,
        named: TypeId,
        name: &str,
        expected_type: TypeId,
    ) -> Result<&Member, LookupError> {
        let n = self
            .descriptor(named)
            .as_named()
            .ok_or(LookupError::ExpectedNamed)?;
        let member = n.member_by_phf(name).ok_or(LookupError::NotFound)?;
        if member.name_hash != hash_name(name) {
            return Err(LookupError::NotFound);
        }
        if member.type_id != expected_type {
            return Err(LookupError::TypeMismatch);
        }
        Ok(member)
    }

    /// Same as [`Self::lookup_fast`] but also memcmp-compares the
    /// member name; false-positive free.
    ///
    /// # Errors
    /// See [`LookupError`].
    pub fn lookup(
        &self,
        named: TypeId,
        name: &str,
        expected_type: TypeId,
    ) -> Result<&Member, LookupError> {
        let n = self
            .descriptor(named)
            .as_named()
            .ok_or(LookupError::ExpectedNamed)?;
        let member = n.member_by_name(name).ok_or(LookupError::NotFound)?;
        if member.type_id != expected_type {
            return Err(LookupError::TypeMismatch);
        }
        Ok(member)
    }

    /// Packages `name`'s PHF index and hash against `named` into an
    /// opaque value a caller can resolve repeatedly without redoing
    /// the PHF lookup. Valid only as long as `named` itself exists.
    ///
    /// # Errors
    /// [`LookupError::ExpectedNamed`] if `named` isn't a named type,
    /// [`LookupError::NotFound`] if it has no PHF installed.
    pub fn prepare_member(&self, named: TypeId, name: &str) -> Result<PreparedMember, LookupError> {
        let n = self
            .descriptor(named)
            .as_named()
            .ok_or(LookupError::ExpectedNamed)?;
        let phf = n.phf.as_ref().ok_or(LookupError::NotFound)?;
        Ok(PreparedMember {
            named,
            phf_index: phf.lookup(name.as_bytes()),
            name_hash: hash_name(name),
        })
    }

    /// Resolves a [`PreparedMember`]: a bounds check, a name-hash
    /// compare, and a type compare.
    ///
    /// # Errors
    /// See [`LookupError`].
    pub fn resolve_prepared(
        &self,
        pm: &PreparedMember,
        expected_type: TypeId,
    ) -> Result<&Member, LookupError> {
        let n = self
            .descriptor(pm.named)
            .as_named()
            .ok_or(LookupError::ExpectedNamed)?;
        let member = n
            .members
            .get(pm.phf_index as usize)
            .ok_or(LookupError::NotFound)?;
        if member.name_hash != pm.name_hash {
            return Err(LookupError::NotFound);
        }
        if member.type_id != expected_type {
            return Err(LookupError::TypeMismatch);
        }
        Ok(member)
    }

    /// Tags `addr` (typically a process-local static's address) as
    /// identifying `type_id`, so independently compiled modules can
    /// converge on the same named type.
    pub fn register_opaque(&mut self, addr: usize, type_id: TypeId) {
        self.opaque_registry.insert(addr, type_id);
    }

    #[must_use]
    pub fn resolve_opaque(&self, addr: usize) -> Option<TypeId> {
        self.opaque_registry.get(&addr).copied()
    }

    #[must_use]
    pub fn default_allocator(&self) -> &dyn ErasedAllocator {
        self.alloc.as_ref()
    }

    /// Runs `type_id`'s destructor on `obj`; recurses into arrays in
    /// reverse index order. No-op if trivially destructible.
    ///
    /// # Safety
    /// `obj` must point at a live, properly aligned instance of
    /// `type_id` with at least `size_of(type_id)` bytes available.
    pub unsafe fn destroy_any(&self, type_id: TypeId, obj: *mut u8) {
        match self.descriptor(type_id) {
            TypeDescriptor::Named(n) => {
                if n.lifetime.bits.trivially_destructible {
                    return;
                }
                if let Some(f) = n.lifetime.destroy_fn {
                    f(obj);
                }
            }
            TypeDescriptor::Array(a) => {
                if self.descriptor(a.element).as_named().is_none_or(|n| {
                    n.lifetime.bits.trivially_destructible
                }) {
                    return;
                }
                let elem_size = self.size_of(a.element);
                for i in (0..a.count).rev() {
                    let idx = usize::try_from(i).expect("array index overflow");
                    // SAFETY: caller guarantees `obj` covers
                    // `count * elem_size` bytes of live elements; `i`
                    // ranges within `count`.
                    let elem = unsafe { obj.add(idx * elem_size) };
                    // SAFETY: see `destroy_any`'s own contract.
                    unsafe { self.destroy_any(a.element, elem) };
                }
            }
            _ => {}
        }
    }

    /// Moves `src` into `dst` per `type_id`'s move function, or a
    /// bitwise copy if trivially movable.
    ///
    /// # Safety
    /// `dst`/`src` must be non-overlapping, each large enough for
    /// `size_of(type_id)` bytes; `src` must hold a live instance.
    pub unsafe fn move_any(&self, type_id: TypeId, dst: *mut u8, src: *mut u8) {
        let size = self.size_of(type_id);
        match self.descriptor(type_id) {
            TypeDescriptor::Named(n) if !n.lifetime.bits.trivially_movable => {
                if let Some(f) = n.lifetime.move_fn {
                    f(dst, src);
                }
            }
            TypeDescriptor::Array(a) => {
                let elem_size = self.size_of(a.element);
                for i in 0..a.count {
                    let idx = usize::try_from(i).expect("array index overflow");
                    // SAFETY: caller guarantees both buffers cover
                    // `count * elem_size` bytes; ranges don't overlap.
                    let (d, s) = unsafe { (dst.add(idx * elem_size), src.add(idx * elem_size)) };
                    // SAFETY: see `move_any`'s own contract.
                    unsafe { self.move_any(a.element, d, s) };
                }
            }
            _ => {
                // SAFETY: caller guarantees `size` non-overlapping bytes.
                unsafe { std::ptr::copy_nonoverlapping(src, dst, size) };
            }
        }
    }

    /// Copies `src` into `dst` per `type_id`'s copy function, or a
    /// bitwise copy if trivially copyable. On partial array-copy
    /// failure, already-copied elements are destroyed in order before
    /// reporting failure.
    ///
    /// # Safety
    /// `dst`/`src` must be non-overlapping, each large enough for
    /// `size_of(type_id)` bytes; `src` must hold a live instance.
    #[must_use]
    pub unsafe fn copy_any(&self, type_id: TypeId, dst: *mut u8, src: *const u8) -> bool {
        let size = self.size_of(type_id);
        match self.descriptor(type_id) {
            TypeDescriptor::Named(n) if !n.lifetime.bits.trivially_copyable => {
                n.lifetime.copy_fn.is_some_and(|f| f(dst, src))
            }
            TypeDescriptor::Array(a) => {
                let elem_size = self.size_of(a.element);
                for i in 0..a.count {
                    let idx = usize::try_from(i).expect("array index overflow");
                    // SAFETY: caller guarantees both buffers cover
                    // `count * elem_size` bytes; ranges don't overlap.
                    let (d, s) = unsafe {
                        (dst.add(idx * elem_size), src.add(idx * elem_size) as *const u8)
                    };
                    // SAFETY: see `copy_any`'s own contract.
                    if !unsafe { self.copy_any(a.element, d, s) } {
                        for j in (0..idx).rev() {
                            // SAFETY: elements `0..idx` were just
                            // successfully copy-constructed above.
                            let copied = unsafe { dst.add(j * elem_size) };
                            // SAFETY: see `destroy_any`'s own contract.
                            unsafe { self.destroy_any(a.element, copied) };
                        }
                        return false;
                    }
                }
                true
            }
            _ => {
                // SAFETY: caller guarantees `size` non-overlapping bytes.
                unsafe { std::ptr::copy_nonoverlapping(src, dst, size) };
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phf::DefaultPhfRecipe;
    use colt_alloc::leaves::System;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn test_context() -> RuntimeContext {
        RuntimeContext::create(System, DefaultPhfRecipe).unwrap()
    }

    #[test]
    fn builtins_have_expected_sizes() {
        init_tracing();
        let ctx = test_context();
        assert_eq!(ctx.size_of(ctx.builtin(BuiltinKind::I32)), 4);
        assert_eq!(ctx.size_of(ctx.builtin(BuiltinKind::F64)), 8);
    }

    #[test]
    fn pointer_and_array_types_are_deduplicated() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let p1 = ctx.create_pointer(i32_ty, false);
        let p2 = ctx.create_pointer(i32_ty, false);
        assert_eq!(p1, p2);
        let p3 = ctx.create_pointer(i32_ty, true);
        assert_ne!(p1, p3);

        let a1 = ctx.create_array(i32_ty, 10);
        let a2 = ctx.create_array(i32_ty, 10);
        assert_eq!(a1, a2);
        assert_eq!(ctx.size_of(a1), 40);
    }

    #[test]
    fn function_types_are_deduplicated_within_bucket() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let unit = ctx.builtin(BuiltinKind::Unit);
        let f1 = ctx.create_function(unit, &[i32_ty, i32_ty]);
        let f2 = ctx.create_function(unit, &[i32_ty, i32_ty]);
        assert_eq!(f1, f2);
        let f3 = ctx.create_function(i32_ty, &[i32_ty, i32_ty]);
        assert_ne!(f1, f3);
    }

    #[test]
    fn named_type_rejects_duplicate_name() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        ctx.create_named_computed(
            "Point",
            vec![("x".into(), String::new(), i32_ty), ("y".into(), String::new(), i32_ty)],
            LayoutPolicy::AsDeclared,
            &[Lifetime::trivial(), Lifetime::trivial()],
        )
        .unwrap();
        let result = ctx.create_named_computed(
            "Point",
            vec![("x".into(), String::new(), i32_ty)],
            LayoutPolicy::AsDeclared,
            &[Lifetime::trivial()],
        );
        assert_eq!(result.unwrap_err(), NamedTypeError::NameAlreadyExists);
    }

    #[test]
    fn lookup_tiers_agree_on_a_real_member() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let point = ctx
            .create_named_computed(
                "Point",
                vec![("x".into(), String::new(), i32_ty), ("y".into(), String::new(), i32_ty)],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial(), Lifetime::trivial()],
            )
            .unwrap();
        let fast = ctx.lookup_fast(point, "y", i32_ty).unwrap();
        let precise = ctx.lookup(point, "y", i32_ty).unwrap();
        assert_eq!(fast.offset, precise.offset);
        assert_eq!(fast.offset, 4);
    }

    #[test]
    fn prepared_member_resolves_to_same_member_as_lookup() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let point = ctx
            .create_named_computed(
                "Point",
                vec![("x".into(), String::new(), i32_ty), ("y".into(), String::new(), i32_ty)],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial(), Lifetime::trivial()],
            )
            .unwrap();
        let pm = ctx.prepare_member(point, "y").unwrap();
        let resolved = ctx.resolve_prepared(&pm, i32_ty).unwrap();
        let direct = ctx.lookup(point, "y", i32_ty).unwrap();
        assert_eq!(resolved.offset, direct.offset);

        let mismatch = ctx.resolve_prepared(&pm, point);
        assert_eq!(mismatch.unwrap_err(), LookupError::TypeMismatch);
    }

    #[test]
    fn lookup_against_non_named_type_reports_expected_named() {
        let ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let result = ctx.lookup(i32_ty, "whatever", i32_ty);
        assert_eq!(result.unwrap_err(), LookupError::ExpectedNamed);
    }

    #[test]
    fn array_destroy_visits_elements_in_reverse() {
        let mut ctx = test_context();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        static mut ORDER: Vec<usize> = Vec::new();
        extern "C" fn destroy(obj: *mut u8) {
            // SAFETY: test-only instrumentation; single-threaded.
            unsafe {
                #[allow(static_mut_refs)]
                ORDER.push(obj as usize);
            }
        }
        let tracked = ctx
            .create_named_computed(
                "Tracked",
                vec![("v".into(), String::new(), i32_ty)],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial()],
            )
            .unwrap();
        if let TypeDescriptor::Named(n) = ctx.descriptor_mut(tracked) {
            n.lifetime.bits.trivially_destructible = false;
            n.lifetime.destroy_fn = Some(destroy);
        }
        let array = ctx.create_array(tracked, 3);
        let elem_size = ctx.size_of(tracked);
        let mut buf = vec![0u8; elem_size * 3];
        // SAFETY: `buf` is freshly allocated with enough space for 3
        // trivially-constructible `Tracked` instances (all-zero is a
        // valid bit pattern for a single `i32` field).
        unsafe { ctx.destroy_any(array, buf.as_mut_ptr()) };
        // SAFETY: single-threaded test, no concurrent access.
        let order = unsafe {
            #[allow(static_mut_refs)]
            ORDER.clone()
        };
        let base = buf.as_ptr() as usize;
        let relative: Vec<usize> = order.iter().map(|a| (a - base) / elem_size).collect();
        assert_eq!(relative, vec![2, 1, 0]);
    }
}
