// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Member reflection over a named type. The original walks a
//! descriptor's member array to a sentinel entry; a [`NamedType`]
//! already knows its own length as a `Vec`, so there's no sentinel to
//! walk to — [`members`] is a plain iterator adapter instead.

use crate::context::RuntimeContext;
use crate::named::Member;
use crate::types::{TypeDescriptor, TypeId};

/// One reflected field, as handed back to a caller walking a named
/// type's members.
#[derive(Debug, Clone, Copy)]
pub struct ReflectedMember<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub type_id: TypeId,
    pub offset: usize,
}

impl<'a> From<&'a Member> for ReflectedMember<'a> {
    fn from(m: &'a Member) -> Self {
        ReflectedMember {
            name: &m.name,
            description: &m.description,
            type_id: m.type_id,
            offset: m.offset,
        }
    }
}

/// Returns `named`'s declared name, or `None` if `named` isn't a named
/// type.
#[must_use]
pub fn reflect_name(ctx: &RuntimeContext, named: TypeId) -> Option<&str> {
    ctx.descriptor(named).as_named().map(|n| n.name.as_str())
}

/// Iterates `named`'s members in declaration order. Returns `None` if
/// `named` isn't a named type, rather than an empty iterator, so
/// callers can't mistake "not a named type" for "zero members".
#[must_use]
pub fn members(
    ctx: &RuntimeContext,
    named: TypeId,
) -> Option<impl Iterator<Item = ReflectedMember<'_>>> {
    match ctx.descriptor(named) {
        TypeDescriptor::Named(n) => Some(n.members.iter().map(ReflectedMember::from)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::LayoutPolicy;
    use crate::phf::DefaultPhfRecipe;
    use crate::types::{BuiltinKind, Lifetime};
    use colt_alloc::leaves::System;

    #[test]
    fn members_walks_in_declaration_order() {
        let mut ctx = RuntimeContext::create(System, DefaultPhfRecipe).unwrap();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        let f64_ty = ctx.builtin(BuiltinKind::F64);
        let point = ctx
            .create_named_computed(
                "Point3",
                vec![
                    ("x".into(), String::new(), f64_ty),
                    ("y".into(), String::new(), f64_ty),
                    ("flags".into(), String::new(), i32_ty),
                ],
                LayoutPolicy::AsDeclared,
                &[Lifetime::trivial(), Lifetime::trivial(), Lifetime::trivial()],
            )
            .unwrap();
        let names: Vec<&str> = members(&ctx, point).unwrap().map(|m| m.name).collect();
        assert_eq!(names, vec!["x", "y", "flags"]);
        assert_eq!(reflect_name(&ctx, point), Some("Point3"));
    }

    #[test]
    fn members_of_non_named_type_is_none() {
        let ctx = RuntimeContext::create(System, DefaultPhfRecipe).unwrap();
        let i32_ty = ctx.builtin(BuiltinKind::I32);
        assert!(members(&ctx, i32_ty).is_none());
        assert_eq!(reflect_name(&ctx, i32_ty), None);
    }
}
