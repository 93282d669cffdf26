//! Type pool for the rcm IR.
//!
//! Types are interned into a [`TypePool`] and referenced by [`TypeId`].
//! Structural types (integers, tuples, addresses, ...) are deduplicated so
//! that two `TypeId`s compare equal exactly when the types are identical.
//! Enums are nominal and may be recursive: declare first with
//! [`TypePool::declare_enum`], then fill in the cases with
//! [`TypePool::define_enum`].

use rustc_hash::FxHashMap;

use crate::Name;

// ── TypeId ──────────────────────────────────────────────────────────

/// Index of a type in a [`TypePool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // Pre-interned builtins (indices 0-3).

    /// `Builtin.Int1`, the type of branch conditions.
    pub const I1: Self = Self(0);
    /// `Builtin.Int64`.
    pub const I64: Self = Self(1);
    /// `Builtin.FPIEEE64`.
    pub const FLOAT: Self = Self(2);
    /// `Builtin.RawPointer`.
    pub const RAW_POINTER: Self = Self(3);

    /// Create a type ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Type kinds ──────────────────────────────────────────────────────

/// A single case of an enum type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumCase {
    pub name: Name,
    /// Payload carried by this case, if any.
    pub payload: Option<TypeId>,
}

/// Identifies one case of one enum type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId {
    pub enum_ty: TypeId,
    pub index: u32,
}

impl CaseId {
    #[inline]
    pub fn new(enum_ty: TypeId, index: u32) -> Self {
        Self { enum_ty, index }
    }
}

/// The structure of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Builtin integer of the given width.
    Int { bits: u16 },
    /// Builtin 64-bit float.
    Float,
    /// Untyped pointer. Not reference counted.
    RawPointer,
    /// Address of a memory location holding a `pointee`.
    Address { pointee: TypeId },
    /// Thick metatype. A pointer that is *not* reference counted.
    Metatype { instance: Name },
    /// Class instance reference with strong reference semantics.
    Class { name: Name },
    /// Unowned reference to a class instance.
    Unowned { referent: TypeId },
    /// Nominal struct with ordered fields.
    Struct { name: Name, fields: Vec<TypeId> },
    /// Anonymous tuple.
    Tuple(Vec<TypeId>),
    /// Nominal enum with ordered cases.
    Enum { name: Name, cases: Vec<EnumCase> },
}

// ── Pool ────────────────────────────────────────────────────────────

/// Interning storage for all types used by a module.
#[derive(Clone, Debug)]
pub struct TypePool {
    types: Vec<TypeKind>,
    interned: FxHashMap<TypeKind, TypeId>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with the builtin types pre-interned.
    pub fn new() -> Self {
        let mut pool = Self {
            types: Vec::new(),
            interned: FxHashMap::default(),
        };
        let i1 = pool.intern(TypeKind::Int { bits: 1 });
        let i64 = pool.intern(TypeKind::Int { bits: 64 });
        let float = pool.intern(TypeKind::Float);
        let raw = pool.intern(TypeKind::RawPointer);
        debug_assert_eq!(
            [i1, i64, float, raw],
            [TypeId::I1, TypeId::I64, TypeId::FLOAT, TypeId::RAW_POINTER]
        );
        pool
    }

    /// Intern a type, returning the existing ID for an identical type.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = self.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId::new(
            u32::try_from(self.types.len())
                .unwrap_or_else(|_| panic!("type count exceeds u32::MAX")),
        );
        self.types.push(kind);
        id
    }

    /// Number of types in the pool.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if the pool holds no types (never, after `new`).
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up the structure of a type.
    #[inline]
    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.types[ty.index()]
    }

    // Convenience constructors

    pub fn int(&mut self, bits: u16) -> TypeId {
        self.intern(TypeKind::Int { bits })
    }

    pub fn class(&mut self, name: Name) -> TypeId {
        self.intern(TypeKind::Class { name })
    }

    pub fn unowned(&mut self, referent: TypeId) -> TypeId {
        self.intern(TypeKind::Unowned { referent })
    }

    pub fn metatype(&mut self, instance: Name) -> TypeId {
        self.intern(TypeKind::Metatype { instance })
    }

    pub fn address(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Address { pointee })
    }

    pub fn structure(&mut self, name: Name, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Struct { name, fields })
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Tuple(elems))
    }

    /// Create an enum type with its cases in one step.
    pub fn enumeration(&mut self, name: Name, cases: Vec<EnumCase>) -> TypeId {
        let ty = self.declare_enum(name);
        self.define_enum(ty, cases);
        ty
    }

    /// Reserve a nominal enum type whose cases are filled in later.
    ///
    /// Needed for recursive enums whose payloads mention the enum itself.
    pub fn declare_enum(&mut self, name: Name) -> TypeId {
        self.push(TypeKind::Enum {
            name,
            cases: Vec::new(),
        })
    }

    /// Set the cases of an enum created by [`declare_enum`](Self::declare_enum).
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not an enum.
    pub fn define_enum(&mut self, ty: TypeId, new_cases: Vec<EnumCase>) {
        match &mut self.types[ty.index()] {
            TypeKind::Enum { cases, .. } => *cases = new_cases,
            other => panic!("define_enum on non-enum type {other:?}"),
        }
    }

    // Queries

    /// The cases of an enum type, or `None` for non-enum types.
    pub fn enum_cases(&self, ty: TypeId) -> Option<&[EnumCase]> {
        match self.kind(ty) {
            TypeKind::Enum { cases, .. } => Some(cases),
            _ => None,
        }
    }

    /// Iterate over every case of an enum type. Empty for non-enums.
    pub fn case_ids(&self, ty: TypeId) -> impl Iterator<Item = CaseId> + '_ {
        let count = self.enum_cases(ty).map_or(0, <[EnumCase]>::len);
        (0..count).filter_map(move |i| u32::try_from(i).ok().map(|i| CaseId::new(ty, i)))
    }

    /// The payload type of a case, or `None` if the case carries no payload.
    ///
    /// # Panics
    ///
    /// Panics if the case does not belong to an enum of this pool. A case
    /// reference that does not resolve means the IR is malformed.
    pub fn case_payload(&self, case: CaseId) -> Option<TypeId> {
        let Some(cases) = self.enum_cases(case.enum_ty) else {
            panic!("case {case:?} refers to a non-enum type");
        };
        match cases.get(case.index as usize) {
            Some(c) => c.payload,
            None => panic!("case {case:?} out of range ({} cases)", cases.len()),
        }
    }

    /// Returns `true` if the case carries a payload.
    pub fn case_has_payload(&self, case: CaseId) -> bool {
        self.case_payload(case).is_some()
    }

    /// Returns `true` if `ty` is a builtin integer.
    pub fn is_integer(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Int { .. })
    }

    /// Returns `true` if `ty` is an enum.
    pub fn is_enum(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Enum { .. })
    }

    /// The stored type of an address type.
    pub fn address_pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Address { pointee } => Some(*pointee),
            _ => None,
        }
    }
}
