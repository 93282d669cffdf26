//! Interned identifiers.
//!
//! Function names, callees, class names and enum case names are all
//! referenced through [`Name`]. The IR never needs the spelling of a name,
//! only its identity, so no interner lives in this crate.

/// An interned identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty name.
    pub const EMPTY: Name = Name(0);

    /// Create a name from its raw interner index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    /// Get the raw interner index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
