//! Shared test fixtures: a small register class hierarchy, a bank
//! registry built over it, a trivial target policy, and a configurable
//! test instruction.
//!
//! The hierarchy models a toy target:
//!
//! ```text
//!   GPR16 (16-bit ints) --subclass--> GPR16_LO --subclass--> GPR8
//!   GPR16_TWIN (16-bit ints, unrelated to the above)
//!   FPR32 (32-bit floats) <--subreg-view-- FPR16
//! ```
//!
//! Banks: GPR covers the integer classes (size 16), FPR the float classes
//! (size 32).

use crate::data_structures::{BankId, ClassSet, PrimitiveType, Reg, RegClassId};
use crate::interface::{MappableInstr, RegClassHierarchy, TableBankPolicy};
use crate::registry::BankRegistry;

pub const GPR16: RegClassId = RegClassId::new(0);
pub const GPR16_LO: RegClassId = RegClassId::new(1);
pub const GPR8: RegClassId = RegClassId::new(2);
pub const GPR16_TWIN: RegClassId = RegClassId::new(3);
pub const FPR32: RegClassId = RegClassId::new(4);
pub const FPR16: RegClassId = RegClassId::new(5);
const NUM_TEST_CLASSES: usize = 6;

pub const GPR: BankId = BankId::new(0);
pub const FPR: BankId = BankId::new(1);

struct TestClass {
    width: u32,
    subclasses: ClassSet,
    subreg_supers: Vec<RegClassId>,
    types: Vec<PrimitiveType>,
}

pub struct TestHierarchy {
    classes: Vec<TestClass>,
}

impl TestHierarchy {
    fn class(
        width: u32,
        subclasses: &[RegClassId],
        subreg_supers: &[RegClassId],
        types: &[PrimitiveType],
    ) -> TestClass {
        let mut set = ClassSet::empty(NUM_TEST_CLASSES);
        for &rc in subclasses {
            set.insert(rc);
        }
        TestClass {
            width,
            subclasses: set,
            subreg_supers: subreg_supers.to_vec(),
            types: types.to_vec(),
        }
    }
}

impl RegClassHierarchy for TestHierarchy {
    fn num_classes(&self) -> usize {
        self.classes.len()
    }
    fn class_width(&self, rc: RegClassId) -> u32 {
        self.classes[rc.index()].width
    }
    fn direct_subclasses(&self, rc: RegClassId) -> &ClassSet {
        &self.classes[rc.index()].subclasses
    }
    fn subreg_super_classes(&self, rc: RegClassId) -> &[RegClassId] {
        &self.classes[rc.index()].subreg_supers
    }
    fn primitive_types(&self, rc: RegClassId) -> &[PrimitiveType] {
        &self.classes[rc.index()].types
    }
}

pub fn make_hierarchy() -> TestHierarchy {
    TestHierarchy {
        classes: vec![
            // GPR16
            TestHierarchy::class(16, &[GPR16_LO], &[], &[PrimitiveType::I16]),
            // GPR16_LO
            TestHierarchy::class(16, &[GPR8], &[], &[PrimitiveType::I16]),
            // GPR8
            TestHierarchy::class(8, &[], &[], &[PrimitiveType::I8, PrimitiveType::I1]),
            // GPR16_TWIN
            TestHierarchy::class(16, &[], &[], &[PrimitiveType::I16]),
            // FPR32
            TestHierarchy::class(32, &[], &[], &[PrimitiveType::F32]),
            // FPR16, reachable from FPR32 only as a sub-register view
            TestHierarchy::class(16, &[], &[FPR32], &[PrimitiveType::F16]),
        ],
    }
}

/// A two-bank registry, fully covered and sane, plus the hierarchy it was
/// built from.
pub fn make_banks() -> (BankRegistry, TestHierarchy) {
    let hier = make_hierarchy();
    let mut registry = BankRegistry::new(2, hier.num_classes());
    registry.create_bank(GPR, "GPR");
    registry.create_bank(FPR, "FPR");
    registry.add_coverage(GPR, GPR16, &hier, true);
    registry.add_coverage(FPR, FPR32, &hier, true);
    registry.check_is_sane();
    (registry, hier)
}

/// The toy target's class-to-bank function.
pub fn make_policy() -> TableBankPolicy {
    let mut policy = TableBankPolicy::new();
    for &rc in &[GPR16, GPR16_LO, GPR8, GPR16_TWIN] {
        policy.set(rc, GPR);
    }
    for &rc in &[FPR32, FPR16] {
        policy.set(rc, FPR);
    }
    policy
}

/// A test instruction with every knob the engine looks at exposed as a
/// plain field.
#[derive(Debug)]
pub struct TestInstr {
    pub copy_like: bool,
    pub operands: Vec<Option<Reg>>,
    pub constraints: Vec<Option<RegClassId>>,
    pub result_type: Option<PrimitiveType>,
}

impl TestInstr {
    pub fn copy(dst: Reg, src: Reg) -> TestInstr {
        TestInstr {
            copy_like: true,
            operands: vec![Some(dst), Some(src)],
            constraints: vec![None, None],
            result_type: None,
        }
    }

    pub fn phi(regs: Vec<Reg>) -> TestInstr {
        let n = regs.len();
        TestInstr {
            copy_like: true,
            operands: regs.into_iter().map(Some).collect(),
            constraints: vec![None; n],
            result_type: None,
        }
    }

    pub fn generic(regs: Vec<Reg>) -> TestInstr {
        let n = regs.len();
        TestInstr {
            copy_like: false,
            operands: regs.into_iter().map(Some).collect(),
            constraints: vec![None; n],
            result_type: None,
        }
    }
}

impl MappableInstr for TestInstr {
    fn num_operands(&self) -> usize {
        self.operands.len()
    }
    fn operand_reg(&self, ix: usize) -> Option<Reg> {
        self.operands[ix]
    }
    fn is_copy_like(&self) -> bool {
        self.copy_like
    }
    fn constraint_class(&self, ix: usize) -> Option<RegClassId> {
        self.constraints[ix]
    }
    fn result_type(&self) -> Option<PrimitiveType> {
        self.result_type
    }
}
