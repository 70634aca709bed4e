//! The bit-exact mapping model: how a value's bits decompose across
//! register banks, per partial slice, per operand, and per instruction.
//!
//! These are plain values with single-owner semantics: constructed by the
//! inference engine (or a target override), optionally verified, handed to
//! exactly one caller, and discarded. The `verify` routines return `bool`
//! so that test builds can actively check every invariant; normal callers
//! wrap them in `debug_assert!`.

use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

use crate::data_structures::{BankId, Reg};
use crate::interface::{MappableInstr, RegClassHierarchy};
use crate::registry::BankRegistry;
use crate::VRegInfo;

//=============================================================================
// PartialMapping

/// One (bit-range, bank) slice of a value: bits
/// `[start_bit, start_bit + length - 1]` of the original value live in
/// `bank`.
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PartialMapping {
    /// LSB-relative offset within the original value.
    pub start_bit: u32,
    /// Number of bits covered. Must be non-zero.
    pub length: u32,
    /// The bank holding this slice.
    pub bank: BankId,
}

impl PartialMapping {
    pub fn new(start_bit: u32, length: u32, bank: BankId) -> PartialMapping {
        PartialMapping {
            start_bit,
            length,
            bank,
        }
    }

    /// The highest bit index covered, inclusive.
    pub fn high_bit(&self) -> u32 {
        self.start_bit + self.length - 1
    }

    /// Check well-formedness: non-empty range, no overflow, and a bank
    /// wide enough to hold the slice.
    ///
    /// A one-bit slice (`length == 1`, `start_bit == high_bit`) is legal:
    /// single-bit values (e.g. condition flags) are mapped like any other.
    pub fn verify(&self, registry: &BankRegistry) -> bool {
        if self.length == 0 {
            return false;
        }
        if self.start_bit > self.high_bit() {
            return false;
        }
        let bank = registry.bank(self.bank);
        if bank.size() < self.length {
            // The bank is physically too narrow for the slice.
            return false;
        }
        true
    }
}

impl fmt::Debug for PartialMapping {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{{{}..{} => {}}}",
            self.start_bit,
            self.high_bit(),
            self.bank
        )
    }
}

//=============================================================================
// ValueMapping

/// The complete decomposition of one operand's bits into partial mappings.
/// Almost always a single slice, so the breakdown is inlined for that
/// case.
///
/// The default (empty) value is the never-verified placeholder used for
/// non-register operands.
#[derive(Clone, Default, PartialEq)]
pub struct ValueMapping {
    parts: SmallVec<[PartialMapping; 1]>,
}

impl ValueMapping {
    /// The placeholder mapping for operands that map nothing.
    pub fn empty() -> ValueMapping {
        ValueMapping {
            parts: SmallVec::new(),
        }
    }

    /// A whole value of `length` bits held contiguously in one bank.
    pub fn contiguous(length: u32, bank: BankId) -> ValueMapping {
        ValueMapping {
            parts: smallvec::smallvec![PartialMapping::new(0, length, bank)],
        }
    }

    /// A value split across the given slices.
    pub fn from_parts(parts: impl IntoIterator<Item = PartialMapping>) -> ValueMapping {
        ValueMapping {
            parts: parts.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[PartialMapping] {
        &self.parts
    }

    /// Check that the breakdown is non-empty, each slice verifies, and the
    /// slices cover bits `0..expected_bit_width` exactly once: no gaps, no
    /// overlaps, and nothing past the end.
    pub fn verify(&self, expected_bit_width: u32, registry: &BankRegistry) -> bool {
        if self.parts.is_empty() {
            return false;
        }
        if expected_bit_width == 0 {
            return false;
        }
        // Accumulate a coverage mask over the value's bits. Widths can
        // exceed 64 (vectors), so use 64-bit blocks.
        let num_blocks = (expected_bit_width as usize + 63) / 64;
        let mut mask = vec![0u64; num_blocks];
        let mut max_high_bit = 0;
        for pm in &self.parts {
            if !pm.verify(registry) {
                return false;
            }
            if pm.high_bit() >= expected_bit_width {
                return false;
            }
            max_high_bit = max_high_bit.max(pm.high_bit());
            for bit in pm.start_bit..=pm.high_bit() {
                let block = bit as usize / 64;
                let bit_mask = 1u64 << (bit % 64);
                if mask[block] & bit_mask != 0 {
                    // Overlap.
                    return false;
                }
                mask[block] |= bit_mask;
            }
        }
        if max_high_bit + 1 != expected_bit_width {
            return false;
        }
        // No gaps: every bit below the width must be set.
        for bit in 0..expected_bit_width {
            if mask[bit as usize / 64] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for ValueMapping {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_list().entries(self.parts.iter()).finish()
    }
}

//=============================================================================
// MappingId

/// Identifies which of possibly several candidate mappings this one is.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum MappingId {
    /// No mapping could be produced.
    Invalid,
    /// Synthesized by the generic inference engine.
    Default,
    /// A target-specific alternative, distinguished by the payload.
    Target(u32),
}

//=============================================================================
// InstructionMapping

/// The full per-operand bank assignment for one instruction: one
/// `ValueMapping` slot per operand (non-register operands keep the empty
/// placeholder), plus an identifier and a relative cost.
#[derive(Clone, PartialEq)]
pub struct InstructionMapping {
    id: MappingId,
    cost: u32,
    operand_mappings: Vec<ValueMapping>,
}

impl InstructionMapping {
    pub fn new(id: MappingId, cost: u32, num_operands: usize) -> InstructionMapping {
        InstructionMapping {
            id,
            cost,
            operand_mappings: vec![ValueMapping::empty(); num_operands],
        }
    }

    /// The "no mapping could be produced" sentinel.
    pub fn invalid() -> InstructionMapping {
        InstructionMapping {
            id: MappingId::Invalid,
            cost: 0,
            operand_mappings: vec![],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != MappingId::Invalid
    }

    pub fn id(&self) -> MappingId {
        self.id
    }

    /// Relative cost among candidate mappings of the same instruction;
    /// lower is better. Meaningless across instructions.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn num_operands(&self) -> usize {
        self.operand_mappings.len()
    }

    pub fn operand_mapping(&self, ix: usize) -> &ValueMapping {
        &self.operand_mappings[ix]
    }

    /// Map operand `ix` wholly into `bank` at `bit_width` bits: the
    /// common single-slice case.
    pub fn set_operand_mapping(
        &mut self,
        ix: usize,
        bit_width: u32,
        bank: BankId,
        registry: &BankRegistry,
    ) {
        let bank_size = registry.bank(bank).size();
        assert!(
            bit_width <= bank_size,
            "set_operand_mapping: operand {} needs {} bits but {} holds only {}",
            ix,
            bit_width,
            registry.bank(bank).name(),
            bank_size
        );
        self.operand_mappings[ix] = ValueMapping::contiguous(bit_width, bank);
    }

    /// Install an arbitrary (possibly split) value mapping for operand
    /// `ix`. Used by target-supplied alternative mappings.
    pub fn set_operand_value_mapping(&mut self, ix: usize, vm: ValueMapping) {
        self.operand_mappings[ix] = vm;
    }

    /// Check this mapping against a concrete instruction: one slot per
    /// operand, and every register operand's mapping covers that
    /// register's width. Non-register operands (and register operands
    /// naming no register) are ignored.
    pub fn verify<I: MappableInstr, H: RegClassHierarchy>(
        &self,
        instr: &I,
        vregs: &VRegInfo,
        hierarchy: &H,
        registry: &BankRegistry,
    ) -> bool {
        if !self.is_valid() {
            return false;
        }
        if self.operand_mappings.len() != instr.num_operands() {
            return false;
        }
        for ix in 0..instr.num_operands() {
            let reg = match instr.operand_reg(ix) {
                Some(reg) if reg.is_valid() => reg,
                _ => continue,
            };
            let width = vregs.size_in_bits(reg, hierarchy);
            if !self.operand_mappings[ix].verify(width, registry) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for InstructionMapping {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "InstructionMapping(id={:?}, cost={}, operands={:?})",
            self.id, self.cost, self.operand_mappings
        )
    }
}

/// The candidate set for one instruction. Element 0 is always the default
/// mapping; the rest are target-supplied alternatives.
pub type InstructionMappings = SmallVec<[InstructionMapping; 4]>;

// Convenience for skipping operands that name no register.
pub(crate) fn real_operand_reg<I: MappableInstr>(instr: &I, ix: usize) -> Option<Reg> {
    match instr.operand_reg(ix) {
        Some(reg) if reg.is_valid() => Some(reg),
        _ => None,
    }
}
