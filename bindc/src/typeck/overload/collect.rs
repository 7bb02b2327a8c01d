//! Viable function collection.
//!
//! Candidates come from three places:
//!
//! - the built-in repositories of the argument types, plus the members and
//!   synthesized special members of a class for constructor, assignment and
//!   destructor groups
//! - the scope lookups the caller supplies; file scopes are searched once
//!   however many lookups ask for them
//! - the widening pass, which turns the conversion functions of the second
//!   argument's class into constructors of the first argument's type

use indexmap::IndexSet;
use tracing::trace;

use crate::bound::{BoundBody, BoundExpr, BoundStatement};
use crate::symbols::{
    FunctionFlags, FunctionId, FunctionKind, FunctionScopeLookup, FunctionSymbol, LookupTarget, ScopeLookup,
    SpecialMembers, TypeId, TypeKind, ASSIGNMENT, CONSTRUCTOR, DESTRUCTOR,
};
use crate::typeck::synth::SpecialMemberKind;
use crate::typeck::Binder;

use super::OverloadRequest;

/// Whether the group operates on the object its first argument points to.
pub(crate) fn is_object_group(group: &str) -> bool {
    matches!(group, CONSTRUCTOR | ASSIGNMENT | DESTRUCTOR)
}

impl Binder {
    /// `T` for a `T*` argument type.
    pub(crate) fn pointee(&mut self, ty: TypeId) -> Option<TypeId> {
        let types = self.symbols.types_mut();
        let value = types.remove_const_reference(ty);
        let d = types.derivations(value);
        (d.pointers > 0 && d.arrays.is_empty()).then(|| types.remove_pointer(value))
    }

    /// Collect candidate functions; also returns the first synthesis failure.
    pub(crate) fn collect_viable_functions(
        &mut self,
        request: &OverloadRequest,
    ) -> (IndexSet<FunctionId>, Option<String>) {
        let group = request.group_name.as_str();
        let mut candidates = IndexSet::new();
        let mut failure = None;

        let mut subjects: Vec<TypeId> = Vec::new();
        if is_object_group(group) {
            subjects.extend(request.arguments.first().and_then(|arg| self.pointee(arg.ty)));
        } else {
            for arg in &request.arguments {
                let value = self.symbols.types_mut().remove_const_reference(arg.ty);
                if !subjects.contains(&value) {
                    subjects.push(value);
                }
            }
        }
        for subject in subjects {
            self.collect_type_functions(subject, request, &mut candidates, &mut failure);
        }

        let mut file_scopes_searched = false;
        for lookup in &request.lookups {
            if lookup.target == LookupTarget::FileScopes {
                if file_scopes_searched {
                    continue;
                }
                file_scopes_searched = true;
            }
            candidates.extend(self.symbols.lookup_functions(lookup, group));
        }

        trace!(group, count = candidates.len(), "collected candidates");
        (candidates, failure)
    }

    fn collect_type_functions(
        &mut self,
        subject: TypeId,
        request: &OverloadRequest,
        candidates: &mut IndexSet<FunctionId>,
        failure: &mut Option<String>,
    ) {
        let group = request.group_name.as_str();
        let types = self.symbols.types();
        if types.basic_kind(subject).is_some() {
            candidates.extend(self.basic_type_functions(subject, group));
            return;
        }
        if types.is_pointer(subject) || (types.is_array(subject) && !types.is_reference(subject)) {
            candidates.extend(self.derived_type_functions(subject, group));
            return;
        }
        match &types.get(subject).kind {
            TypeKind::Enum(_) | TypeKind::Delegate(_) => {
                candidates.extend(self.derived_type_functions(subject, group));
            }
            TypeKind::Interface(_) => {
                let source = request.arguments.get(1).map(|arg| arg.ty);
                candidates.extend(self.interface_type_functions(subject, group, source));
            }
            TypeKind::Class(info) if is_object_group(group) => {
                if let Some(scope) = info.scope {
                    let members = self.symbols.lookup_functions(&FunctionScopeLookup::new(scope, ScopeLookup::THIS), group);
                    candidates.extend(members);
                }
                self.collect_synthesized(subject, request, candidates, failure);
            }
            _ => {}
        }
    }

    /// Special members the class does not declare itself.
    fn collect_synthesized(
        &mut self,
        class: TypeId,
        request: &OverloadRequest,
        candidates: &mut IndexSet<FunctionId>,
        failure: &mut Option<String>,
    ) {
        let Some(user_defined) = self.symbols.types().class(class).map(|info| info.user_defined) else {
            return;
        };
        let source = request.arguments.get(1).copied();
        let copy_source = source.is_some_and(|arg| {
            let types = self.symbols.types();
            types.pointer_count(arg.ty) == 0
                && types.class_of(arg.ty).is_some_and(|c| types.base_class_distance(c, class).is_some())
        });
        let movable = source.is_some_and(|arg| arg.bind_to_rvalue_ref || self.symbols.types().is_rvalue_reference(arg.ty));

        let mut wanted = Vec::new();
        match (request.group_name.as_str(), request.arguments.len()) {
            (CONSTRUCTOR, 1) => wanted.push((SpecialMemberKind::DefaultConstructor, SpecialMembers::DEFAULT_CONSTRUCTOR)),
            (CONSTRUCTOR, 2) if copy_source => {
                wanted.push((SpecialMemberKind::CopyConstructor, SpecialMembers::COPY_CONSTRUCTOR));
                if movable {
                    wanted.push((SpecialMemberKind::MoveConstructor, SpecialMembers::MOVE_CONSTRUCTOR));
                }
            }
            (ASSIGNMENT, 2) if copy_source => {
                wanted.push((SpecialMemberKind::CopyAssignment, SpecialMembers::COPY_ASSIGNMENT));
                if movable {
                    wanted.push((SpecialMemberKind::MoveAssignment, SpecialMembers::MOVE_ASSIGNMENT));
                }
            }
            (DESTRUCTOR, 1) => wanted.push((SpecialMemberKind::Destructor, SpecialMembers::DESTRUCTOR)),
            _ => {}
        }

        for (kind, member) in wanted {
            if user_defined.contains(member) {
                continue;
            }
            match self.generate_special_member(class, kind) {
                Ok(function) => {
                    candidates.insert(function);
                }
                Err(error) => {
                    trace!(%error, "special member not synthesized");
                    failure.get_or_insert_with(|| error.to_string());
                }
            }
        }
    }

    /// Constructors of the first argument's pointee built from the second
    /// argument's conversion functions.
    pub(crate) fn widening_candidates(&mut self, request: &OverloadRequest) -> Vec<FunctionId> {
        if request.group_name != CONSTRUCTOR || request.arguments.len() != 2 {
            return Vec::new();
        }
        let Some(target) = self.pointee(request.arguments[0].ty) else {
            return Vec::new();
        };
        let source = self.symbols.types_mut().remove_const_reference(request.arguments[1].ty);
        if !self.symbols.types().derivations(source).is_empty() || !self.symbols.types().is_class(source) {
            return Vec::new();
        }

        let mut widened = Vec::new();
        for conversion in self.class_conversions(source) {
            let function = self.symbols.function(conversion);
            let matches_target = function.kind == FunctionKind::Conversion
                && function.conversion.is_some_and(|info| info.target == target);
            if !matches_target {
                continue;
            }
            if let Some(&existing) = self.widened_constructors.get(&(conversion, target)) {
                widened.push(existing);
                continue;
            }
            let types = self.symbols.types_mut();
            let this = types.make_pointer(target);
            let that = types.make_const_reference(source);
            let mut body = BoundBody::default();
            body.push(BoundStatement::Expression(BoundExpr::conversion(
                conversion,
                BoundExpr::parameter(1, that),
                target,
            )));
            let mut constructor = FunctionSymbol::new(CONSTRUCTOR, FunctionKind::Constructor)
                .with_parent(target)
                .with_param("this", this)
                .with_param("that", that)
                .with_flags(FunctionFlags::GENERATED);
            constructor.body = Some(body);
            let id = self.symbols.add_detached_function(constructor);
            self.widened_constructors.insert((conversion, target), id);
            widened.push(id);
        }
        trace!(count = widened.len(), "widening pass");
        widened
    }
}
