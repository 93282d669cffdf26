//! Reference-counting classification of types.
//!
//! Walks the type pool to classify each type as [`Trivial`](RcClass::Trivial),
//! [`Reference`](RcClass::Reference) or [`NonTrivial`](RcClass::NonTrivial).
//! Uses memoization and cycle detection to handle recursive enums.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::types::{TypeId, TypeKind, TypePool};

/// How values of a type participate in reference counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RcClass {
    /// No reference counting needed: integers, floats, raw pointers,
    /// addresses, thick metatypes, and aggregates of those.
    Trivial,

    /// A single strong reference. Retained with `strong_retain`,
    /// released with `strong_release`.
    Reference,

    /// A value that owns references without being one (structs, tuples and
    /// enums with non-trivial fields, unowned references). Retained with
    /// `retain_value`, released with `release_value`.
    NonTrivial,
}

/// Classification trait for reference-counting decisions.
///
/// Implemented by [`TypeClassifier`]. Optimizer passes take
/// `&dyn RcClassification` so tests can substitute fixed answers.
pub trait RcClassification {
    /// Classify a type.
    fn rc_class(&self, ty: TypeId) -> RcClass;

    /// Returns `true` if values of this type need no RC operations.
    fn is_trivial(&self, ty: TypeId) -> bool {
        self.rc_class(ty) == RcClass::Trivial
    }

    /// Returns `true` if this type has reference semantics.
    fn is_reference_counted(&self, ty: TypeId) -> bool {
        self.rc_class(ty) == RcClass::Reference
    }
}

/// Type classifier over a [`TypePool`].
///
/// # Interior Mutability
///
/// Uses `RefCell` for the cache and cycle-detection set because the
/// [`RcClassification`] trait takes `&self`.
pub struct TypeClassifier<'pool> {
    pool: &'pool TypePool,
    cache: RefCell<FxHashMap<TypeId, RcClass>>,
    /// Types currently being classified. Re-entering one means the type is
    /// recursive, which requires indirection and is thus `NonTrivial`.
    classifying: RefCell<FxHashSet<TypeId>>,
}

impl<'pool> TypeClassifier<'pool> {
    /// Create a new classifier for the given type pool.
    pub fn new(pool: &'pool TypePool) -> Self {
        Self {
            pool,
            cache: RefCell::new(FxHashMap::default()),
            classifying: RefCell::new(FxHashSet::default()),
        }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &'pool TypePool {
        self.pool
    }

    fn classify(&self, ty: TypeId) -> RcClass {
        if let Some(&cached) = self.cache.borrow().get(&ty) {
            return cached;
        }

        if !self.classifying.borrow_mut().insert(ty) {
            return RcClass::NonTrivial;
        }

        let result = self.classify_by_kind(ty);

        self.classifying.borrow_mut().remove(&ty);
        self.cache.borrow_mut().insert(ty, result);
        result
    }

    fn classify_by_kind(&self, ty: TypeId) -> RcClass {
        match self.pool.kind(ty) {
            TypeKind::Int { .. }
            | TypeKind::Float
            | TypeKind::RawPointer
            | TypeKind::Address { .. }
            | TypeKind::Metatype { .. } => RcClass::Trivial,

            TypeKind::Class { .. } => RcClass::Reference,

            // Unowned references carry their own (unowned) count.
            TypeKind::Unowned { .. } => RcClass::NonTrivial,

            TypeKind::Struct { fields, .. } => self.classify_children(fields),
            TypeKind::Tuple(elems) => self.classify_children(elems),
            TypeKind::Enum { cases, .. } => {
                let payloads: Vec<TypeId> = cases.iter().filter_map(|c| c.payload).collect();
                self.classify_children(&payloads)
            }
        }
    }

    /// An aggregate is `Trivial` only if every child is; otherwise the
    /// aggregate owns references without being one.
    fn classify_children(&self, children: &[TypeId]) -> RcClass {
        if children
            .iter()
            .all(|&child| self.classify(child) == RcClass::Trivial)
        {
            RcClass::Trivial
        } else {
            RcClass::NonTrivial
        }
    }
}

impl RcClassification for TypeClassifier<'_> {
    fn rc_class(&self, ty: TypeId) -> RcClass {
        self.classify(ty)
    }
}
