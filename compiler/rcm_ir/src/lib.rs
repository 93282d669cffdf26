//! Reference-counted SSA IR for the rcm optimizer.
//!
//! This crate provides:
//!
//! - **Types** ([`TypePool`], [`TypeId`]): interned structural types plus
//!   nominal (possibly recursive) enums whose cases are named by [`CaseId`].
//!
//! - **Type classification** ([`RcClass`], [`TypeClassifier`]): every type
//!   is [`Trivial`](RcClass::Trivial), a single strong
//!   [`Reference`](RcClass::Reference), or a
//!   [`NonTrivial`](RcClass::NonTrivial) aggregate that owns references.
//!
//! - **IR** ([`Function`], [`Block`], [`Instr`], [`InstrKind`], [`Terminator`]):
//!   basic blocks with block parameters, explicit `strong_retain` /
//!   `release_value` style RC operations, and the in-place mutation
//!   primitives that code-motion passes use.
//!
//! - **CFG queries** ([`Cfg`], [`PostOrder`]), a [`FunctionBuilder`], and a
//!   structural verifier ([`verify_function`]).

pub mod builder;
mod classify;
mod function;
pub mod graph;
pub mod ir;
mod name;
pub mod types;
pub mod verify;

pub use builder::FunctionBuilder;
pub use classify::{RcClass, RcClassification, TypeClassifier};
pub use function::Function;
pub use graph::{single_successor, Cfg, PostOrder};
pub use ir::{
    Block, BlockId, BuiltinOp, Effects, Instr, InstrKind, InstrPos, Terminator, ValueId,
};
pub use name::Name;
pub use types::{CaseId, EnumCase, TypeId, TypeKind, TypePool};
pub use verify::{verify_function, VerifyError};
