//! The default mapping inference engine: given an instruction the target
//! has not supplied a mapping for, synthesize a best-effort
//! `InstructionMapping` from whatever information is available, in order:
//! encoding constraints, the result type's default bank, and banks already
//! assigned to the operands. Copy-like instructions (plain copies and
//! phis) skip straight to propagation, since they impose no constraint of
//! their own.

use log::trace;

use crate::data_structures::{BankId, Reg, VRegInfo};
use crate::interface::{MappableInstr, RegClassHierarchy, TargetBankPolicy};
use crate::mapping::{real_operand_reg, InstructionMapping, InstructionMappings, MappingId};
use crate::registry::BankRegistry;
use crate::RegAssignment;

/// The engine itself: a read-only bundle of the registry, the class
/// hierarchy, and the target's policy hooks. One instance per target;
/// invoked per instruction during selection.
pub struct MappingEngine<'a, H: RegClassHierarchy, P: TargetBankPolicy> {
    registry: &'a BankRegistry,
    hierarchy: &'a H,
    policy: &'a P,
}

impl<'a, H: RegClassHierarchy, P: TargetBankPolicy> MappingEngine<'a, H, P> {
    pub fn new(registry: &'a BankRegistry, hierarchy: &'a H, policy: &'a P) -> Self {
        MappingEngine {
            registry,
            hierarchy,
            policy,
        }
    }

    pub fn registry(&self) -> &BankRegistry {
        self.registry
    }

    /// The bank `reg` currently lives in, if that has been decided. A
    /// real register resolves through its minimal containing class; a
    /// virtual register resolves through whatever bank or class has been
    /// assigned to it so far.
    pub fn reg_bank_of(&self, reg: Reg, vregs: &VRegInfo) -> Option<BankId> {
        if !reg.is_valid() {
            return None;
        }
        if reg.is_virtual() {
            match vregs.assignment_of(reg.to_virtual_reg()) {
                RegAssignment::None => None,
                RegAssignment::Bank(bank) => Some(bank),
                RegAssignment::Class(rc) => Some(self.policy.bank_for_class(rc)),
            }
        } else {
            Some(self.policy.bank_for_class(reg.get_min_class()))
        }
    }

    /// The bank operand `ix` is pinned to by the instruction's encoding
    /// constraints, if any. `None` means the opcode is fully generic and
    /// constrains nothing.
    pub fn bank_from_constraints<I: MappableInstr>(&self, instr: &I, ix: usize) -> Option<BankId> {
        let rc = instr.constraint_class(ix)?;
        let bank = self.policy.bank_for_class(rc);
        // The target's class-to-bank function and its coverage data must
        // agree; a mismatch is a bug in the target description.
        debug_assert!(
            self.registry.bank(bank).covers(rc),
            "constraint class {} not covered by {}",
            rc,
            self.registry.bank(bank).name()
        );
        Some(bank)
    }

    /// Best-effort inference. May return an invalid mapping when the
    /// instruction gives no usable information; callers that cannot
    /// tolerate that go through `instr_mapping` instead.
    pub fn instr_mapping_impl<I: MappableInstr>(
        &self,
        instr: &I,
        vregs: &VRegInfo,
    ) -> InstructionMapping {
        let num_operands = instr.num_operands();
        let mut mapping = InstructionMapping::new(MappingId::Default, 1, num_operands);
        let is_copy_like = instr.is_copy_like();
        let mut complete = true;
        // The last bank (and width) we managed to determine; for
        // copy-like instructions this is what gets propagated to
        // operands that told us nothing.
        let mut last_bank: Option<BankId> = None;
        let mut last_width = 0;

        for ix in 0..num_operands {
            let reg = match real_operand_reg(instr, ix) {
                Some(reg) => reg,
                None => continue,
            };

            // What the register already uses, if anything.
            let alt_bank = self.reg_bank_of(reg, vregs);
            // What this instruction itself requires. A copy imposes
            // nothing, so for it the existing bank is the answer.
            let cur_bank = if is_copy_like {
                alt_bank
            } else {
                self.bank_from_constraints(instr, ix)
                    .or_else(|| {
                        instr
                            .result_type()
                            .and_then(|ty| self.registry.default_bank_for_type(ty))
                    })
                    .or(alt_bank)
            };

            match cur_bank {
                None => {
                    complete = false;
                    if !is_copy_like {
                        // A non-copy instruction with an undetermined
                        // operand cannot be mapped generically at all.
                        trace!(
                            "instr_mapping_impl: no bank for operand {} of {:?}",
                            ix,
                            instr
                        );
                        return InstructionMapping::invalid();
                    }
                    // For a copy, one determined operand is enough to fix
                    // every other one; keep scanning only while we have
                    // nothing.
                    if last_bank.is_some() {
                        break;
                    }
                }
                Some(bank) => {
                    last_bank = Some(bank);
                    last_width = vregs.size_in_bits(reg, self.hierarchy);
                    mapping.set_operand_mapping(ix, last_width, bank, self.registry);
                }
            }
        }

        if complete {
            return mapping;
        }

        // Only copies reach here. If no operand contributed a bank there
        // is nothing to propagate; otherwise fill in every register
        // operand still unmapped with the bank we found.
        let bank = match last_bank {
            Some(bank) => bank,
            None => {
                trace!("instr_mapping_impl: no bank anywhere in copy {:?}", instr);
                return InstructionMapping::invalid();
            }
        };
        for ix in 0..num_operands {
            if real_operand_reg(instr, ix).is_none() {
                continue;
            }
            if !mapping.operand_mapping(ix).is_empty() {
                continue;
            }
            mapping.set_operand_mapping(ix, last_width, bank, self.registry);
        }
        mapping
    }

    /// The mapping for `instr`. The generic engine is a convenience
    /// fallback, not a universal solution: if inference fails, the target
    /// must implement a dedicated mapping for this instruction shape, and
    /// this panics with a diagnostic naming the instruction.
    pub fn instr_mapping<I: MappableInstr>(
        &self,
        instr: &I,
        vregs: &VRegInfo,
    ) -> InstructionMapping {
        let mapping = self.instr_mapping_impl(instr, vregs);
        if !mapping.is_valid() {
            panic!(
                "MappingEngine::instr_mapping: cannot infer a mapping for {:?}; \
                 the target must provide one",
                instr
            );
        }
        debug_assert!(mapping.verify(instr, vregs, self.hierarchy, self.registry));
        mapping
    }

    /// All candidate mappings for `instr`: the default mapping first,
    /// then any target-supplied alternatives. Never empty.
    pub fn instr_possible_mappings<I: MappableInstr>(
        &self,
        instr: &I,
        vregs: &VRegInfo,
    ) -> InstructionMappings {
        let mut mappings = InstructionMappings::new();
        mappings.push(self.instr_mapping(instr, vregs));
        mappings.extend(self.policy.alternative_mappings(instr));
        debug_assert!(mappings
            .iter()
            .all(|m| m.verify(instr, vregs, self.hierarchy, self.registry)));
        mappings
    }

    /// Relative cost of moving `size` bits from one bank to another;
    /// forwarded to the target policy. Downstream consumers use this to
    /// weigh a candidate mapping against the cross-bank copies it would
    /// force.
    pub fn copy_cost(&self, from: BankId, to: BankId, size: u32) -> u32 {
        self.policy.copy_cost(from, to, size)
    }
}
