//! Core data structures: registers, register classes, register banks, and
//! the dense class bitset.

use rustc_hash::FxHashMap;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

//=============================================================================
// Maps

pub type Map<K, V> = FxHashMap<K, V>;

//=============================================================================
// Register classes and banks: identifiers.
//
// Both are plain indices into statically-sized tables owned elsewhere (the
// class hierarchy for classes, the bank registry for banks). The index is
// the identity; there is no separate handle type.

/// Identifier of a register class: an index into the target's register
/// class table.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct RegClassId(u32);

impl RegClassId {
    pub const fn new(ix: usize) -> RegClassId {
        RegClassId(ix as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegClassId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "rc{}", self.0)
    }
}

/// Identifier of a register bank: an index into the bank registry.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BankId(u32);

impl BankId {
    pub const fn new(ix: usize) -> BankId {
        BankId(ix as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "bank{}", self.0)
    }
}

//=============================================================================
// Primitive machine value types.
//
// A closed enumeration of the simple types an operand can have. Only used
// to feed the type-to-default-bank fallback in the inference engine; the
// bit-exact mapping model below works purely in bit widths.

#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F16,
    F32,
    F64,
    V64,
    V128,
    V256,
}

pub const NUM_PRIMITIVE_TYPES: usize = 12;

impl PrimitiveType {
    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveType::I1 => 1,
            PrimitiveType::I8 => 8,
            PrimitiveType::I16 => 16,
            PrimitiveType::I32 => 32,
            PrimitiveType::I64 => 64,
            PrimitiveType::I128 => 128,
            PrimitiveType::F16 => 16,
            PrimitiveType::F32 => 32,
            PrimitiveType::F64 => 64,
            PrimitiveType::V64 => 64,
            PrimitiveType::V128 => 128,
            PrimitiveType::V256 => 256,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PrimitiveType::I1 => 0,
            PrimitiveType::I8 => 1,
            PrimitiveType::I16 => 2,
            PrimitiveType::I32 => 3,
            PrimitiveType::I64 => 4,
            PrimitiveType::I128 => 5,
            PrimitiveType::F16 => 6,
            PrimitiveType::F32 => 7,
            PrimitiveType::F64 => 8,
            PrimitiveType::V64 => 9,
            PrimitiveType::V128 => 10,
            PrimitiveType::V256 => 11,
        }
    }
}

//=============================================================================
// ClassSet
//
// A dense bitset of register classes. The universe of classes is small and
// statically known (tens, rarely low hundreds), so a flat `Vec<u64>` of
// blocks sized once at construction is the right representation.

const BLOCK_SIZE: usize = 64;

#[derive(Clone, PartialEq)]
pub struct ClassSet {
    bits: Vec<u64>,
}

impl ClassSet {
    /// Return an empty set able to hold `num_classes` classes.
    pub fn empty(num_classes: usize) -> Self {
        Self {
            bits: vec![0; (num_classes + BLOCK_SIZE - 1) / BLOCK_SIZE],
        }
    }

    /// Set the bit for `rc`. Returns true if the bit was not previously
    /// set.
    pub fn insert(&mut self, rc: RegClassId) -> bool {
        let ix = rc.index();
        let block = ix / BLOCK_SIZE;
        let mask = 1u64 << (ix % BLOCK_SIZE);
        let was_set = self.bits[block] & mask != 0;
        self.bits[block] |= mask;
        !was_set
    }

    pub fn contains(&self, rc: RegClassId) -> bool {
        let ix = rc.index();
        self.bits[ix / BLOCK_SIZE] & (1u64 << (ix % BLOCK_SIZE)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn card(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> ClassSetIter {
        ClassSetIter {
            set: self,
            next: 0,
        }
    }
}

pub struct ClassSetIter<'a> {
    set: &'a ClassSet,
    next: usize,
}

impl<'a> Iterator for ClassSetIter<'a> {
    type Item = RegClassId;
    fn next(&mut self) -> Option<RegClassId> {
        while self.next < self.set.bits.len() * BLOCK_SIZE {
            let ix = self.next;
            self.next += 1;
            let rc = RegClassId::new(ix);
            if self.set.contains(rc) {
                return Some(rc);
            }
        }
        None
    }
}

impl fmt::Debug for ClassSet {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_set().entries(self.iter()).finish()
    }
}

//=============================================================================
// Registers.
//
// Reg represents both real and virtual registers. For compactness and
// speed, the fields are packed into a single u32. The format is:
//
// Virtual Reg:   1  index:31
// Real Reg:      0  uu:7  class:8  index:16
//
// |class| is the id of the minimal register class containing the real
// register; a real reg carries it so that resolving the register to a bank
// never needs a side table. |index| is a zero based index: the virtual
// register number for a virtual reg, the entry number in the target's
// register table for a real reg.
//
// The all-ones pattern is reserved as the "no register" sentinel, used for
// instruction operands that name no register at all.

const INVALID_REG_BITS: u32 = 0xFFFF_FFFF;

#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Reg {
    bits: u32,
}

impl Reg {
    /// The "no register" sentinel.
    pub fn invalid() -> Reg {
        Reg {
            bits: INVALID_REG_BITS,
        }
    }

    pub fn is_valid(self) -> bool {
        self.bits != INVALID_REG_BITS
    }

    pub fn is_virtual(self) -> bool {
        debug_assert!(self.is_valid());
        self.bits & 0x8000_0000 != 0
    }

    pub fn get_index(self) -> usize {
        debug_assert!(self.is_valid());
        if self.is_virtual() {
            (self.bits & 0x7FFF_FFFF) as usize
        } else {
            (self.bits & 0xFFFF) as usize
        }
    }

    /// The minimal register class containing this real register.
    pub fn get_min_class(self) -> RegClassId {
        if self.is_virtual() {
            panic!("Reg::get_min_class on virtual register");
        }
        RegClassId::new(((self.bits >> 16) & 0xFF) as usize)
    }

    pub fn to_real_reg(self) -> RealReg {
        if self.is_virtual() {
            panic!("Reg::to_real_reg: this is a virtual register");
        }
        RealReg { reg: self }
    }

    pub fn to_virtual_reg(self) -> VirtualReg {
        if self.is_virtual() {
            VirtualReg { reg: self }
        } else {
            panic!("Reg::to_virtual_reg: this is a real register");
        }
    }

    pub fn as_virtual_reg(self) -> Option<VirtualReg> {
        if self.is_valid() && self.is_virtual() {
            Some(VirtualReg { reg: self })
        } else {
            None
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_valid() {
            write!(fmt, "r<invalid>")
        } else if self.is_virtual() {
            write!(fmt, "v{}", self.get_index())
        } else {
            write!(fmt, "r{}", self.get_index())
        }
    }
}

pub fn mk_real_reg(min_class: RegClassId, index: u16) -> Reg {
    if min_class.index() >= 256 {
        panic!("mk_real_reg(): class id too large");
    }
    Reg {
        bits: ((min_class.index() as u32) << 16) | index as u32,
    }
}

pub fn mk_virtual_reg(index: u32) -> Reg {
    if index >= 0x7FFF_FFFF {
        panic!("mk_virtual_reg(): index too large");
    }
    Reg {
        bits: 0x8000_0000 | index,
    }
}

// RealReg and VirtualReg are merely wrappers around Reg, which dynamically
// ensure that they are really wrapping the correct flavour of register.

#[derive(Copy, Clone, Hash, PartialEq, Eq)]
pub struct RealReg {
    reg: Reg,
}

impl RealReg {
    pub fn get_index(self) -> usize {
        self.reg.get_index()
    }
    pub fn get_min_class(self) -> RegClassId {
        self.reg.get_min_class()
    }
    pub fn to_reg(self) -> Reg {
        self.reg
    }
}

impl fmt::Debug for RealReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.reg.fmt(fmt)
    }
}

#[derive(Copy, Clone, Hash, PartialEq, Eq)]
pub struct VirtualReg {
    reg: Reg,
}

impl VirtualReg {
    pub fn get_index(self) -> usize {
        self.reg.get_index()
    }
    pub fn to_reg(self) -> Reg {
        self.reg
    }
}

impl fmt::Debug for VirtualReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.reg.fmt(fmt)
    }
}

//=============================================================================
// RegisterBank
//
// A register bank is a hardware partition of the register file. Identity
// (the id) is assigned exactly once by the registry; the coverage set and
// the width grow only during the one-time coverage-building phase and are
// read-only afterwards.

const INVALID_BANK_ID: u32 = 0xFFFF_FFFF;

pub struct RegisterBank {
    id: u32,
    name: String,
    size: u32,
    covered: ClassSet,
}

impl RegisterBank {
    /// A bank slot with no identity yet. Only the registry creates these.
    pub(crate) fn uninit(num_classes: usize) -> RegisterBank {
        RegisterBank {
            id: INVALID_BANK_ID,
            name: String::new(),
            size: 0,
            covered: ClassSet::empty(num_classes),
        }
    }

    pub(crate) fn init(&mut self, id: BankId, name: &str) {
        assert!(
            self.id == INVALID_BANK_ID,
            "RegisterBank::init: bank {} already created",
            self.name
        );
        self.id = id.index() as u32;
        self.name = name.to_string();
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_BANK_ID
    }

    pub fn id(&self) -> BankId {
        debug_assert!(self.is_valid());
        BankId::new(self.id as usize)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum bit width among all covered register classes. Zero until
    /// the first coverage addition.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn covers(&self, rc: RegClassId) -> bool {
        self.covered.contains(rc)
    }

    pub fn covered_classes(&self) -> ClassSetIter {
        self.covered.iter()
    }

    pub(crate) fn add_class(&mut self, rc: RegClassId) -> bool {
        self.covered.insert(rc)
    }

    pub(crate) fn grow_size(&mut self, width: u32) {
        if width > self.size {
            self.size = width;
        }
    }
}

impl fmt::Debug for RegisterBank {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_valid() {
            return write!(fmt, "<uninit bank>");
        }
        write!(
            fmt,
            "{}(id={}, size={}, classes={:?})",
            self.name, self.id, self.size, self.covered
        )
    }
}

//=============================================================================
// Per-function virtual register state.
//
// VRegInfo is the caller-owned side table recording, for each virtual
// register, its bit width and whatever bank or class has been assigned to
// it so far. The inference engine reads it; whoever applies the produced
// mappings writes the assignments back.

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RegAssignment {
    /// Nothing has been decided for this register yet.
    None,
    /// An explicit bank assignment.
    Bank(BankId),
    /// A register class constraint, from which a bank can be derived.
    Class(RegClassId),
}

#[derive(Copy, Clone)]
struct VRegSlot {
    assignment: RegAssignment,
    bit_width: u32,
}

pub struct VRegInfo {
    slots: Vec<VRegSlot>,
}

impl VRegInfo {
    pub fn new() -> VRegInfo {
        VRegInfo { slots: vec![] }
    }

    /// Create a fresh virtual register of the given width, with no
    /// assignment.
    pub fn alloc_vreg(&mut self, bit_width: u32) -> VirtualReg {
        assert!(bit_width > 0, "VRegInfo::alloc_vreg: zero-width register");
        let index = self.slots.len() as u32;
        self.slots.push(VRegSlot {
            assignment: RegAssignment::None,
            bit_width,
        });
        mk_virtual_reg(index).to_virtual_reg()
    }

    pub fn num_vregs(&self) -> usize {
        self.slots.len()
    }

    pub fn set_bank(&mut self, vreg: VirtualReg, bank: BankId) {
        self.slots[vreg.get_index()].assignment = RegAssignment::Bank(bank);
    }

    pub fn set_class(&mut self, vreg: VirtualReg, rc: RegClassId) {
        self.slots[vreg.get_index()].assignment = RegAssignment::Class(rc);
    }

    pub fn assignment_of(&self, vreg: VirtualReg) -> RegAssignment {
        self.slots[vreg.get_index()].assignment
    }

    pub fn bit_width_of(&self, vreg: VirtualReg) -> u32 {
        self.slots[vreg.get_index()].bit_width
    }

    /// Bit width of any register: recorded width for a virtual register,
    /// the width of the minimal containing class for a real one.
    pub fn size_in_bits<H: crate::interface::RegClassHierarchy>(
        &self,
        reg: Reg,
        hierarchy: &H,
    ) -> u32 {
        assert!(reg.is_valid(), "VRegInfo::size_in_bits: invalid register");
        if reg.is_virtual() {
            self.bit_width_of(reg.to_virtual_reg())
        } else {
            hierarchy.class_width(reg.get_min_class())
        }
    }
}
