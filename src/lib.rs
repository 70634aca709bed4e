//! Top-level module for the regbank library.
//!
//! This crate decides, for every operand of a machine-level instruction,
//! which register bank (a hardware partition of the register file, e.g.
//! general-purpose integer vs. floating point) a value should live in, and
//! at what bit granularity. It is the piece of an instruction selector
//! that runs after generic opcodes are formed but before register
//! allocation proper: downstream passes use the produced mappings to
//! insert cross-bank copies.

mod data_structures;
mod inference;
mod interface;
mod mapping;
mod registry;

#[cfg(test)]
mod test_fixtures;

pub use crate::interface::*;
