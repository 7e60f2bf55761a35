//! Property tests over generated structured programs
//!
//! Every generated program is optimized and then checked for idempotence,
//! equivalence with the original under the reference interpreter, and a
//! well-formed result.

mod common;

use common::{program, run, Execution};
use jfold::bytecode::ConstantValue;
use jfold::{optimize_class, MethodOutcome, OptimizerConfig};
use proptest::prelude::*;

const ARGUMENTS: [i32; 6] = [0, 1, -7, 3, 1000, i32::MAX];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A second run over optimized output changes nothing
    #[test]
    fn prop_optimizer_is_idempotent(program in program()) {
        let mut class = program.class();
        optimize_class(&mut class, OptimizerConfig::default());
        let once = class.to_listing();

        let (reports, _) = optimize_class(&mut class, OptimizerConfig::default());
        prop_assert_eq!(class.to_listing(), once);
        prop_assert!(reports.iter().all(|r| r.lost_targets().is_empty()));
    }

    /// Original and optimized methods compute the same result
    #[test]
    fn prop_optimized_method_is_equivalent(program in program()) {
        let original = program.class();
        let mut optimized = original.clone();
        optimize_class(&mut optimized, OptimizerConfig::default());

        for arg in ARGUMENTS {
            let args = [ConstantValue::Int(arg)];
            let expected = run(&original, "run", &args);
            prop_assume!(expected != Execution::StepLimit);
            prop_assert_eq!(run(&optimized, "run", &args), expected, "argument {}", arg);
        }
    }

    /// Structured code never loses a branch target, and never grows
    #[test]
    fn prop_optimized_method_is_well_formed(program in program()) {
        let original = program.class();
        let mut optimized = original.clone();
        let (reports, stats) = optimize_class(&mut optimized, OptimizerConfig::default());

        prop_assert_eq!(reports.len(), 1);
        prop_assert!(matches!(&reports[0].outcome, MethodOutcome::Optimized { lost_targets } if lost_targets.is_empty()), "expected Optimized outcome with no lost targets");
        prop_assert_eq!(stats.lost_targets, 0);
        prop_assert!(optimized.validate().is_ok());

        let before = original.method("run").map(|m| m.code.len()).unwrap_or(0);
        let after = optimized.method("run").map(|m| m.code.len()).unwrap_or(0);
        prop_assert!(after <= before);
        prop_assert_eq!(before - after, stats.instructions_removed);
    }

    /// Each pass alone also preserves behavior
    #[test]
    fn prop_single_pass_configs_are_equivalent(program in program(), which in 0usize..3) {
        let config = OptimizerConfig {
            fold_constants: which == 0,
            resolve_branches: which == 1,
            eliminate_dead_stores: which == 2,
            ..OptimizerConfig::default()
        };
        let original = program.class();
        let mut optimized = original.clone();
        optimize_class(&mut optimized, config);

        for arg in ARGUMENTS {
            let args = [ConstantValue::Int(arg)];
            let expected = run(&original, "run", &args);
            prop_assume!(expected != Execution::StepLimit);
            prop_assert_eq!(run(&optimized, "run", &args), expected, "argument {}", arg);
        }
    }
}
