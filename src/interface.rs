//! The top level interface for the regbank library: re-exports of the
//! library-defined types, plus the traits a client (the target backend and
//! the surrounding instruction selector) must implement.

use std::fmt;

// Maps of things. The interface needs some way to speak about them, so use
// the library-provided version.
pub use crate::data_structures::Map;

// Register classes, banks and primitive types.
pub use crate::data_structures::{BankId, PrimitiveType, RegClassId, NUM_PRIMITIVE_TYPES};

// The dense class bitset.
pub use crate::data_structures::{ClassSet, ClassSetIter};

// Registers, both real and virtual, and ways to create them.
pub use crate::data_structures::{mk_real_reg, mk_virtual_reg};
pub use crate::data_structures::{RealReg, Reg, VirtualReg};

// The per-function virtual register side table.
pub use crate::data_structures::{RegAssignment, VRegInfo};

// The banks themselves and the registry that owns them.
pub use crate::data_structures::RegisterBank;
pub use crate::registry::BankRegistry;

// The bit-exact mapping model.
pub use crate::mapping::{
    InstructionMapping, InstructionMappings, MappingId, PartialMapping, ValueMapping,
};

// The inference engine.
pub use crate::inference::MappingEngine;

/// A trait describing the target's register class hierarchy: a read-only
/// structure, fixed per target, that gives meaning to `RegClassId` and
/// defines the two relations the coverage closure walks.
pub trait RegClassHierarchy {
    /// Total number of register classes. Valid class ids are
    /// `0..num_classes()`.
    fn num_classes(&self) -> usize;

    /// Bit width of the registers in the given class.
    fn class_width(&self, rc: RegClassId) -> u32;

    /// The classes that are direct sub-classes of `rc` (strict subsets of
    /// its register set).
    fn direct_subclasses(&self, rc: RegClassId) -> &ClassSet;

    /// The classes of which `rc` is a sub-register view: if any of these
    /// is covered by a bank, `rc` is reachable from it by taking a
    /// sub-register.
    fn subreg_super_classes(&self, rc: RegClassId) -> &[RegClassId];

    /// The primitive value types the class can hold. Feeds the
    /// type-to-default-bank table; may be empty.
    fn primitive_types(&self, rc: RegClassId) -> &[PrimitiveType];
}

/// A trait defined by the client to let the inference engine look at one
/// instruction: its operands, its encoding constraints, and whether it is
/// copy-like.
///
/// `Debug` is required so that a failed mapping can name the instruction
/// in its diagnostic.
pub trait MappableInstr: fmt::Debug {
    /// Number of operands, including non-register ones.
    fn num_operands(&self) -> usize;

    /// The register named by operand `ix`, or `None` for a non-register
    /// operand (immediate, basic block, ...). A register operand that
    /// names no register returns `Some(Reg::invalid())`.
    fn operand_reg(&self, ix: usize) -> Option<Reg>;

    /// Whether this instruction is a plain register copy or a phi/merge
    /// point. Copy-like instructions impose no bank constraint of their
    /// own and simply propagate whatever bank their operands already use.
    fn is_copy_like(&self) -> bool;

    /// The register class operand `ix` is constrained to by the concrete
    /// machine encoding, if any. Fully generic opcodes return `None`.
    fn constraint_class(&self, ix: usize) -> Option<RegClassId>;

    /// The single well-defined result type of the instruction, if it has
    /// one. Used as a fallback source of bank information when the
    /// encoding constrains nothing.
    fn result_type(&self) -> Option<PrimitiveType>;
}

/// Target-overridable policy hooks consumed by the inference engine.
pub trait TargetBankPolicy {
    /// The bank holding the given register class. Must be total over the
    /// classes the target actually uses; the target's class table makes
    /// this a pure lookup.
    fn bank_for_class(&self, rc: RegClassId) -> BankId;

    /// Relative cost of copying a value of `size` bits from bank `from`
    /// to bank `to`. Used by downstream consumers to rank candidate
    /// mappings; same-bank copies are free by default.
    fn copy_cost(&self, from: BankId, to: BankId, _size: u32) -> u32 {
        if from == to {
            0
        } else {
            1
        }
    }

    /// Additional candidate mappings for this instruction beyond the
    /// default one (e.g. a scalarized rendition of a vector op). The
    /// generic engine supplies none.
    fn alternative_mappings<I: MappableInstr>(&self, _instr: &I) -> Vec<InstructionMapping> {
        vec![]
    }
}

/// A ready-made `TargetBankPolicy` backed by an explicit class-to-bank
/// table, for targets whose class/bank relation is a plain lookup.
/// Classes missing from the table are a bug in the target description.
#[derive(Default)]
pub struct TableBankPolicy {
    bank_by_class: Map<RegClassId, BankId>,
}

impl TableBankPolicy {
    pub fn new() -> TableBankPolicy {
        TableBankPolicy {
            bank_by_class: Map::default(),
        }
    }

    pub fn set(&mut self, rc: RegClassId, bank: BankId) {
        self.bank_by_class.insert(rc, bank);
    }
}

impl TargetBankPolicy for TableBankPolicy {
    fn bank_for_class(&self, rc: RegClassId) -> BankId {
        match self.bank_by_class.get(&rc) {
            Some(&bank) => bank,
            None => panic!("TableBankPolicy::bank_for_class: no bank for {}", rc),
        }
    }
}
