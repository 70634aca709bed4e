//! The bank registry: owns the fixed set of register banks, the
//! type-to-default-bank table, and the coverage closure that populates
//! each bank's covered-class set from the target's class hierarchy.
//!
//! The registry is built once per target description and is read-only
//! afterwards. It may be shared across concurrently compiled functions as
//! long as construction happens-before any read.

use log::debug;

use crate::data_structures::{BankId, PrimitiveType, RegClassId, RegisterBank, NUM_PRIMITIVE_TYPES};
use crate::interface::RegClassHierarchy;

pub struct BankRegistry {
    // Contiguous storage; a bank's id is its index here.
    banks: Vec<RegisterBank>,
    num_classes: usize,
    // "Default" bank per primitive type, populated first-wins during
    // coverage building. Feeds a fallback heuristic only.
    default_bank_for_type: [Option<BankId>; NUM_PRIMITIVE_TYPES],
}

impl BankRegistry {
    /// A registry with `num_banks` uncreated bank slots, over a class
    /// universe of `num_classes` classes.
    pub fn new(num_banks: usize, num_classes: usize) -> BankRegistry {
        let banks = (0..num_banks)
            .map(|_| RegisterBank::uninit(num_classes))
            .collect();
        BankRegistry {
            banks,
            num_classes,
            default_bank_for_type: [None; NUM_PRIMITIVE_TYPES],
        }
    }

    /// Assign identity and name to the bank slot `id`. Each slot may be
    /// created exactly once; creating it twice is a bug in the target
    /// description.
    pub fn create_bank(&mut self, id: BankId, name: &str) {
        self.banks[id.index()].init(id, name);
    }

    pub fn num_banks(&self) -> usize {
        self.banks.len()
    }

    /// Look up a created bank. Out-of-range ids and uncreated slots are
    /// programming errors and panic.
    pub fn bank(&self, id: BankId) -> &RegisterBank {
        let bank = &self.banks[id.index()];
        assert!(bank.is_valid(), "BankRegistry::bank: bank {} not created", id);
        bank
    }

    /// Record `bank` as the default home for values of type `ty`. The
    /// first writer wins unless `force` is set; whichever bank builds its
    /// coverage first claims the type.
    pub fn record_default_bank_for_type(&mut self, ty: PrimitiveType, bank: BankId, force: bool) {
        let slot = &mut self.default_bank_for_type[ty.index()];
        if force || slot.is_none() {
            *slot = Some(bank);
        }
    }

    pub fn default_bank_for_type(&self, ty: PrimitiveType) -> Option<BankId> {
        self.default_bank_for_type[ty.index()]
    }

    /// Add to `id`'s coverage every class reachable from `start`, walking
    /// both relations of the hierarchy: transitively down sub-classes, and
    /// across to any class accessible as a sub-register view of a covered
    /// class. Grows the bank's size to the widest covered class, and (if
    /// `record_types`) claims each covered class's primitive types for
    /// this bank, first-wins.
    ///
    /// Idempotent: if the bank already covers `start`, this is a no-op, so
    /// callers can add coverage incrementally across several top-level
    /// classes.
    pub fn add_coverage<H: RegClassHierarchy>(
        &mut self,
        id: BankId,
        start: RegClassId,
        hierarchy: &H,
        record_types: bool,
    ) {
        assert!(
            hierarchy.num_classes() == self.num_classes,
            "BankRegistry::add_coverage: hierarchy has {} classes, registry sized for {}",
            hierarchy.num_classes(),
            self.num_classes
        );
        // Split borrow: the bank's covered set and the type table are
        // written in the same loop.
        let defaults = &mut self.default_bank_for_type;
        let bank = &mut self.banks[id.index()];
        assert!(bank.is_valid(), "BankRegistry::add_coverage: bank {} not created", id);

        if bank.covers(start) {
            return;
        }

        debug!("add_coverage: bank {} from class {}", bank.name(), start);

        let mut worklist = vec![start];
        bank.add_class(start);
        while let Some(cur) = worklist.pop() {
            let width = hierarchy.class_width(cur);
            debug!("  covering {} (width {})", cur, width);
            bank.grow_size(width);

            if record_types {
                for &ty in hierarchy.primitive_types(cur) {
                    let slot = &mut defaults[ty.index()];
                    if slot.is_none() {
                        debug!("  default bank for {:?} is {}", ty, bank.name());
                        *slot = Some(bank.id());
                    }
                }
            }

            // Walk down: every sub-class of a covered class is covered.
            for sub in hierarchy.direct_subclasses(cur).iter() {
                if bank.add_class(sub) {
                    worklist.push(sub);
                }
            }

            // Walk across: every class obtainable as a sub-register view
            // of a covered class is covered too.
            for ix in 0..hierarchy.num_classes() {
                let other = RegClassId::new(ix);
                if bank.covers(other) {
                    continue;
                }
                if hierarchy.subreg_super_classes(other).contains(&cur) {
                    bank.add_class(other);
                    worklist.push(other);
                }
            }
        }
    }

    /// Check that the registry satisfies its invariants, and panic if
    /// not: every bank slot created, id equal to its index, and non-empty
    /// coverage. Call once after the initialization phase.
    pub fn check_is_sane(&self) {
        let mut ok = true;
        for (ix, bank) in self.banks.iter().enumerate() {
            if !bank.is_valid() || bank.id().index() != ix {
                ok = false;
            }
            if ok && (bank.size() == 0 || bank.covered_classes().next().is_none()) {
                ok = false;
            }
        }
        if !ok {
            panic!("BankRegistry::check_is_sane: invalid BankRegistry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;

    #[test]
    fn create_and_look_up_banks() {
        let (registry, _hier) = make_banks();
        assert_eq!(registry.num_banks(), 2);
        assert_eq!(registry.bank(GPR).name(), "GPR");
        assert_eq!(registry.bank(FPR).name(), "FPR");
        assert_eq!(registry.bank(GPR).id(), GPR);
        registry.check_is_sane();
    }

    #[test]
    #[should_panic]
    fn double_create_panics() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "GPR");
        registry.create_bank(BankId::new(0), "GPR again");
    }

    #[test]
    #[should_panic]
    fn uncreated_bank_lookup_panics() {
        let hier = make_hierarchy();
        let registry = BankRegistry::new(1, hier.num_classes());
        registry.bank(BankId::new(0));
    }

    #[test]
    fn coverage_follows_subclasses_transitively() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "GPR");
        // GPR16's subclass chain reaches GPR8 through GPR16_LO.
        registry.add_coverage(BankId::new(0), GPR16, &hier, true);

        let bank = registry.bank(BankId::new(0));
        assert!(bank.covers(GPR16));
        assert!(bank.covers(GPR16_LO));
        assert!(bank.covers(GPR8));
        assert!(!bank.covers(FPR32));
        assert_eq!(bank.size(), 16);
    }

    #[test]
    fn coverage_follows_subreg_views() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "FPR");
        // FPR16 is not a subclass of FPR32, but it is a sub-register view
        // of it, so covering FPR32 must pull it in.
        registry.add_coverage(BankId::new(0), FPR32, &hier, true);

        let bank = registry.bank(BankId::new(0));
        assert!(bank.covers(FPR32));
        assert!(bank.covers(FPR16));
        assert!(!bank.covers(GPR16));
        assert_eq!(bank.size(), 32);
    }

    #[test]
    fn coverage_is_idempotent() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "GPR");
        registry.add_coverage(BankId::new(0), GPR16, &hier, true);
        let covered_once: Vec<_> = registry.bank(BankId::new(0)).covered_classes().collect();
        let size_once = registry.bank(BankId::new(0)).size();

        registry.add_coverage(BankId::new(0), GPR16, &hier, true);
        let covered_twice: Vec<_> = registry.bank(BankId::new(0)).covered_classes().collect();
        assert_eq!(covered_once, covered_twice);
        assert_eq!(registry.bank(BankId::new(0)).size(), size_once);
    }

    #[test]
    fn coverage_size_is_monotonic() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "GPR");
        assert_eq!(registry.bank(BankId::new(0)).size(), 0);

        // Seeding from the narrow class first, then the wide one: size
        // only ever grows.
        registry.add_coverage(BankId::new(0), GPR8, &hier, true);
        assert_eq!(registry.bank(BankId::new(0)).size(), 8);
        registry.add_coverage(BankId::new(0), GPR16, &hier, true);
        assert_eq!(registry.bank(BankId::new(0)).size(), 16);
    }

    #[test]
    fn default_type_bank_is_first_wins() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(2, hier.num_classes());
        registry.create_bank(BankId::new(0), "A");
        registry.create_bank(BankId::new(1), "B");

        // Both banks cover classes holding I16; whoever runs first claims
        // the type.
        registry.add_coverage(BankId::new(0), GPR16, &hier, true);
        registry.add_coverage(BankId::new(1), GPR16_TWIN, &hier, true);
        assert_eq!(
            registry.default_bank_for_type(crate::PrimitiveType::I16),
            Some(BankId::new(0))
        );

        // A later caller can force an override.
        registry.record_default_bank_for_type(crate::PrimitiveType::I16, BankId::new(1), true);
        assert_eq!(
            registry.default_bank_for_type(crate::PrimitiveType::I16),
            Some(BankId::new(1))
        );

        // Unclaimed types stay unclaimed.
        assert_eq!(registry.default_bank_for_type(crate::PrimitiveType::V256), None);
    }

    #[test]
    fn record_types_can_be_suppressed() {
        let hier = make_hierarchy();
        let mut registry = BankRegistry::new(1, hier.num_classes());
        registry.create_bank(BankId::new(0), "GPR");
        registry.add_coverage(BankId::new(0), GPR16, &hier, false);
        assert_eq!(registry.default_bank_for_type(crate::PrimitiveType::I16), None);
    }

    #[test]
    #[should_panic]
    fn sanity_check_rejects_uncreated_banks() {
        let hier = make_hierarchy();
        let registry = BankRegistry::new(1, hier.num_classes());
        registry.check_is_sane();
    }
}
