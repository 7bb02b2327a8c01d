//! Argument matching and the conversion table.
//!
//! Classifies how one call argument fits one parameter type and produces an
//! [`ArgumentMatch`] that overload resolution ranks.
//!
//! # Algorithm
//!
//! The steps run in order; the first one that applies decides:
//!
//! ```text
//! 1. identical types              exact (an rvalue class object passed by
//!                                 value ranks as a distance-1 conversion)
//! 2. reference legality           T& rejects rvalues and const arguments,
//!                                 T&& needs an rvalue-bindable argument
//! 3. same plain type and shape    exact, scored by derivation counts
//! 4. array to pointer decay       distance 1
//! 5. class pointer/reference      up-cast by base hops; down-cast only in
//!                                 explicit context
//! 6. conversion table             one built-in or user conversion
//! ```
//!
//! There is never more than one user conversion on an argument.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::symbols::{
    BasicKind, ConversionInfo, DerivationCounts, FunctionFlags, FunctionId, FunctionKind, FunctionSymbol, Intrinsic,
    RefKind, TypeId, TypeKind, CONVERSION,
};
use crate::value::{common_type, ValueKind};

use super::Binder;

/// Value category of a call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentCategory {
    Lvalue,
    Rvalue,
}

/// A call-site argument. Built fresh per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Argument {
    pub ty: TypeId,
    pub category: ArgumentCategory,
    /// May bind to an rvalue reference parameter.
    pub bind_to_rvalue_ref: bool,
}

impl Argument {
    pub fn lvalue(ty: TypeId) -> Self {
        Self { ty, category: ArgumentCategory::Lvalue, bind_to_rvalue_ref: false }
    }

    /// A temporary; temporaries bind to rvalue references.
    pub fn rvalue(ty: TypeId) -> Self {
        Self { ty, category: ArgumentCategory::Rvalue, bind_to_rvalue_ref: true }
    }

    /// An lvalue explicitly marked movable.
    pub fn moved(ty: TypeId) -> Self {
        Self { ty, category: ArgumentCategory::Lvalue, bind_to_rvalue_ref: true }
    }

    pub fn is_rvalue(&self) -> bool {
        self.category == ArgumentCategory::Rvalue
    }
}

/// Whether explicit-only conversions may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConversionContext {
    #[default]
    Implicit,
    Explicit,
}

/// Coarse rank of an argument match. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversionRank {
    ExactMatch,
    Conversion,
}

/// How one argument fits one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgumentMatch {
    pub rank: ConversionRank,
    /// Base-class hops, lattice distance or conversion function distance.
    pub distance: u32,
    pub param_derivations: DerivationCounts,
    pub arg_derivations: DerivationCounts,
    /// Conversion function to insert around the argument.
    pub conversion: Option<FunctionId>,
    /// The conversion is a user-declared one.
    pub user_defined: bool,
}

impl ArgumentMatch {
    pub fn exact(param_derivations: DerivationCounts, arg_derivations: DerivationCounts) -> Self {
        Self {
            rank: ConversionRank::ExactMatch,
            distance: 0,
            param_derivations,
            arg_derivations,
            conversion: None,
            user_defined: false,
        }
    }

    pub fn conversion(distance: u32, conversion: Option<FunctionId>) -> Self {
        Self {
            rank: ConversionRank::Conversion,
            distance,
            param_derivations: DerivationCounts::default(),
            arg_derivations: DerivationCounts::default(),
            conversion,
            user_defined: false,
        }
    }

    fn with_derivations(mut self, param: DerivationCounts, arg: DerivationCounts) -> Self {
        self.param_derivations = param;
        self.arg_derivations = arg;
        self
    }

    /// (pointer, reference, const) differences between parameter and argument.
    fn derivation_mismatch(&self) -> (u8, u8, u8) {
        let p = self.param_derivations;
        let a = self.arg_derivations;
        (
            p.pointers.abs_diff(a.pointers).saturating_add(p.arrays.abs_diff(a.arrays)),
            u8::from(p.reference != a.reference),
            u8::from(p.is_const != a.is_const),
        )
    }
}

/// Whether `left` is a strictly better argument match than `right`.
///
/// Rank first, then conversion distance, then the derivation counts:
/// the parameter whose derivations differ least from the argument's wins.
pub fn better_argument_match(left: &ArgumentMatch, right: &ArgumentMatch) -> bool {
    if left.rank != right.rank {
        return left.rank < right.rank;
    }
    if left.distance != right.distance {
        return left.distance < right.distance;
    }
    left.derivation_mismatch() < right.derivation_mismatch()
}

/// Lazily populated conversion functions of one compile unit.
#[derive(Debug, Default)]
pub struct ConversionTable {
    /// Built-in conversions by (source, target); `None` records a miss.
    builtin: FxHashMap<(TypeId, TypeId), Option<FunctionId>>,
    /// User conversions contributed by each scanned class.
    user: FxHashMap<TypeId, Vec<FunctionId>>,
    /// Classes whose conversion lists were scanned.
    scanned: FxHashSet<TypeId>,
}

impl ConversionTable {
    pub fn is_scanned(&self, class: TypeId) -> bool {
        self.scanned.contains(&class)
    }
}

/// Position of a numeric kind on the widening ladder.
fn lattice_index(kind: ValueKind) -> Option<u32> {
    let index = match kind {
        ValueKind::SByte => 0,
        ValueKind::Byte => 1,
        ValueKind::Short => 2,
        ValueKind::UShort => 3,
        ValueKind::Int => 4,
        ValueKind::UInt => 5,
        ValueKind::Long => 6,
        ValueKind::ULong => 7,
        ValueKind::Float => 8,
        ValueKind::Double => 9,
        _ => return None,
    };
    Some(index)
}

/// Distance added to conversions that need a cast.
const EXPLICIT_DISTANCE: u32 = 100;

impl Binder {
    /// Derivation counts of an argument; rvalues count as `&&`.
    fn argument_derivations(&self, arg: &Argument) -> DerivationCounts {
        let mut counts = self.symbols.types().derivations(arg.ty).counts();
        if counts.reference == RefKind::None && (arg.is_rvalue() || arg.bind_to_rvalue_ref) {
            counts.reference = RefKind::Rvalue;
        }
        counts
    }

    /// Match one argument against one parameter type.
    pub fn match_argument(
        &mut self,
        param: TypeId,
        arg: &Argument,
        context: ConversionContext,
    ) -> Option<ArgumentMatch> {
        let param_d = self.symbols.types().derivations(param);
        let arg_d = self.symbols.types().derivations(arg.ty);
        let param_counts = param_d.counts();
        let arg_counts = self.argument_derivations(arg);

        // Step 1: identical types.
        if param == arg.ty {
            let by_value_class = param_d.is_empty() && self.symbols.types().is_class(param);
            if by_value_class && (arg.is_rvalue() || arg.bind_to_rvalue_ref) {
                return Some(ArgumentMatch::conversion(1, None).with_derivations(param_counts, arg_counts));
            }
            return Some(ArgumentMatch::exact(param_counts, arg_counts));
        }

        // Step 2: reference binding legality.
        if param_d.reference == RefKind::Lvalue && !param_d.is_const && (arg.is_rvalue() || arg_d.is_const) {
            return None;
        }
        if param_d.reference == RefKind::Rvalue && !arg.bind_to_rvalue_ref && arg_d.reference != RefKind::Rvalue {
            return None;
        }

        // Step 3: same plain type and indirection.
        let param_plain = self.symbols.types().make_plain(param);
        let arg_plain = self.symbols.types().make_plain(arg.ty);
        if param_plain == arg_plain && param_d.same_shape(&arg_d) {
            if param_d.pointers > 0 && arg_d.is_const && !param_d.is_const {
                return None;
            }
            return Some(ArgumentMatch::exact(param_counts, arg_counts));
        }

        // Step 4: array to pointer decay.
        if !arg_d.arrays.is_empty() && param_d.pointers > 0 {
            let types = self.symbols.types_mut();
            let array = types.remove_const_reference(arg.ty);
            let element = types.element_type(array);
            let decayed = types.make_pointer(element);
            let target = types.remove_const_reference(param);
            if decayed == target || (types.make_plain(decayed) == types.make_plain(target)
                && types.derivations(decayed).same_shape(&types.derivations(target)))
            {
                let decay = self.array_decay(array);
                return Some(ArgumentMatch::conversion(1, Some(decay)).with_derivations(param_counts, arg_counts));
            }
        }

        // Step 5: class hierarchy casts.
        let types = self.symbols.types();
        if types.is_class(param_plain)
            && types.is_class(arg_plain)
            && param_d.same_shape(&arg_d)
            && param_d.arrays.is_empty()
        {
            if param_d.pointers > 0 && arg_d.is_const && !param_d.is_const {
                return None;
            }
            if let Some(hops) = types.base_class_distance(arg_plain, param_plain) {
                let cast = self.class_cast(arg.ty, param, Intrinsic::UpCast, hops);
                trace!(hops, "derived-to-base argument conversion");
                return Some(ArgumentMatch::conversion(hops, Some(cast)).with_derivations(param_counts, arg_counts));
            }
            if context == ConversionContext::Explicit {
                if let Some(hops) = self.symbols.types().base_class_distance(param_plain, arg_plain) {
                    let cast = self.class_cast(arg.ty, param, Intrinsic::DownCast, hops);
                    return Some(ArgumentMatch::conversion(hops, Some(cast)).with_derivations(param_counts, arg_counts));
                }
            }
            return None;
        }

        // Step 6: the conversion table. A conversion yields a temporary, which a
        // non-const lvalue reference cannot bind.
        if param_d.reference == RefKind::Lvalue && !param_d.is_const {
            return None;
        }
        let source = self.symbols.types_mut().remove_const_reference(arg.ty);
        let target = self.symbols.types_mut().remove_const_reference(param);
        let function = self.find_conversion(source, target, context)?;
        let info = self.symbols.function(function).conversion?;
        let mut matched = ArgumentMatch::conversion(info.distance, Some(function))
            .with_derivations(param_counts, arg_counts);
        matched.user_defined = info.user_defined;
        Some(matched)
    }

    /// The best single conversion from `source` to `target`.
    ///
    /// Ties at the best distance are ambiguous and yield `None`.
    pub fn find_conversion(
        &mut self,
        source: TypeId,
        target: TypeId,
        context: ConversionContext,
    ) -> Option<FunctionId> {
        let mut candidates = Vec::new();
        if let Some(builtin) = self.builtin_conversion(source, target) {
            candidates.push(builtin);
        }
        candidates.extend(self.user_conversions(source, target));

        let mut best: Option<(u32, FunctionId)> = None;
        let mut tied = false;
        for id in candidates {
            let Some(info) = self.symbols.function(id).conversion else { continue };
            if context == ConversionContext::Implicit && !info.implicit {
                continue;
            }
            match best {
                Some((distance, _)) if info.distance > distance => {}
                Some((distance, _)) if info.distance == distance => tied = true,
                _ => {
                    best = Some((info.distance, id));
                    tied = false;
                }
            }
        }
        if tied {
            trace!(
                source = self.symbols.types().name(source),
                target = self.symbols.types().name(target),
                "ambiguous conversion"
            );
            return None;
        }
        best.map(|(_, id)| id)
    }

    // === Built-in conversions ===

    fn builtin_conversion(&mut self, source: TypeId, target: TypeId) -> Option<FunctionId> {
        if let Some(cached) = self.conversions.builtin.get(&(source, target)) {
            return *cached;
        }
        let created = self.create_builtin_conversion(source, target);
        self.conversions.builtin.insert((source, target), created);
        created
    }

    fn create_builtin_conversion(&mut self, source: TypeId, target: TypeId) -> Option<FunctionId> {
        let types = self.symbols.types();
        let (intrinsic, distance, implicit) = match (types.get(source).kind.clone(), types.get(target).kind.clone()) {
            (TypeKind::Basic(from), TypeKind::Basic(to)) => {
                if from == BasicKind::Null {
                    return None;
                }
                let from = ValueKind::of_basic(from)?;
                let to = ValueKind::of_basic(to)?;
                let (distance, implicit) = basic_conversion_rank(from, to)?;
                (Intrinsic::NumericConversion, distance, implicit)
            }
            (TypeKind::Basic(BasicKind::Null), _) if types.is_pointer(target) => {
                (Intrinsic::NullToPointer, 1, true)
            }
            (TypeKind::Enum(info), _) if info.underlying == target => (Intrinsic::EnumToUnderlying, 1, false),
            (_, TypeKind::Enum(info)) if info.underlying == source => (Intrinsic::UnderlyingToEnum, 1, false),
            (TypeKind::Class(_), TypeKind::Interface(_)) if types.implements(source, target) => {
                (Intrinsic::InterfaceFromClass, 1, true)
            }
            _ if types.is_pointer(source) && types.is_pointer(target) => {
                let void_ptr = self.symbols.types_mut().void_ptr();
                if target == void_ptr {
                    (Intrinsic::PointerToVoid, 1, true)
                } else if source == void_ptr {
                    (Intrinsic::VoidToPointer, 1, false)
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        let function = FunctionSymbol::new(CONVERSION, FunctionKind::Conversion)
            .with_param("from", source)
            .returns(target)
            .with_intrinsic(intrinsic)
            .with_flags(if implicit { FunctionFlags::empty() } else { FunctionFlags::EXPLICIT })
            .with_conversion(ConversionInfo { source, target, distance, implicit, user_defined: false });
        Some(self.symbols.add_detached_function(function))
    }

    // === User conversions ===

    /// User conversions from `source` to `target` contributed by either class.
    fn user_conversions(&mut self, source: TypeId, target: TypeId) -> Vec<FunctionId> {
        let mut classes = Vec::with_capacity(2);
        for ty in [source, target] {
            let types = self.symbols.types();
            if types.derivations(ty).is_empty() && types.is_class(ty) && !classes.contains(&ty) {
                classes.push(ty);
            }
        }
        let mut found = Vec::new();
        for class in classes {
            for id in self.class_conversions(class) {
                match self.symbols.function(id).conversion {
                    Some(info) if info.source == source && info.target == target => found.push(id),
                    _ => {}
                }
            }
        }
        found
    }

    /// The conversion functions of `class`, scanned once per compile unit.
    pub(crate) fn class_conversions(&mut self, class: TypeId) -> Vec<FunctionId> {
        if let Some(cached) = self.conversions.user.get(&class) {
            return cached.clone();
        }
        self.stats.user_conversion_scans += 1;
        let declared_on = |binder: &Binder, ty: TypeId| {
            binder.symbols.types().class(ty).map(|c| c.conversions.clone()).unwrap_or_default()
        };
        let conversions: Vec<FunctionId> = match self.symbols.types().instance_of(class) {
            Some((subject, args)) => declared_on(self, subject)
                .into_iter()
                .map(|id| self.instantiate_class_member(id, subject, class, &args))
                .collect(),
            None => declared_on(self, class),
        };
        trace!(class = self.symbols.types().name(class), count = conversions.len(), "scanned class conversions");
        self.conversions.scanned.insert(class);
        self.conversions.user.insert(class, conversions.clone());
        conversions
    }

    /// A copy of a generic class member with the instance's arguments
    /// substituted. Memoized per (member, arguments).
    pub(crate) fn instantiate_class_member(
        &mut self,
        member: FunctionId,
        subject: TypeId,
        instance: TypeId,
        args: &[TypeId],
    ) -> FunctionId {
        let key = (member, args.to_vec());
        if let Some(&existing) = self.instantiations.get(&key) {
            return existing;
        }
        let mut mapping = self.symbols.types().instance_mapping(instance);
        mapping.insert(subject, instance);
        let mut copy = self.symbols.function(member).clone();
        let types = self.symbols.types_mut();
        for param in &mut copy.params {
            param.ty = types.substitute(param.ty, &mapping);
        }
        copy.return_type = copy.return_type.map(|ty| types.substitute(ty, &mapping));
        copy.conversion = copy.conversion.map(|info| ConversionInfo {
            source: types.substitute(info.source, &mapping),
            target: types.substitute(info.target, &mapping),
            ..info
        });
        copy.parent = Some(instance);
        copy.instance_of = Some(member);
        copy.template_args = args.to_vec();
        let id = self.symbols.add_detached_function(copy);
        self.instantiations.insert(key, id);
        self.stats.function_instantiations += 1;
        id
    }
}

/// Distance and implicitness of a conversion between two basic value kinds.
fn basic_conversion_rank(from: ValueKind, to: ValueKind) -> Option<(u32, bool)> {
    if from == to {
        return None;
    }
    match (lattice_index(from), lattice_index(to)) {
        (Some(f), Some(t)) => {
            let widening = matches!(common_type(from, to), Ok(common) if common == to);
            if widening {
                Some((t.abs_diff(f), true))
            } else {
                Some((EXPLICIT_DISTANCE + t.abs_diff(f), false))
            }
        }
        _ => {
            let castable = |k: ValueKind| k.is_numeric() || matches!(k, ValueKind::Bool | ValueKind::Char);
            (castable(from) && castable(to)).then_some((EXPLICIT_DISTANCE, false))
        }
    }
}
