//! End-to-end tests: listings in, optimized listings out
//!
//! Sample classes mirror what `javac` emits for small constant-heavy
//! methods; results are checked both structurally and by running the
//! methods through the reference interpreter.

mod common;

use std::path::PathBuf;

use common::{run, Execution};
use jfold::bytecode::{ConstantValue, Instruction, Push};
use jfold::{optimize_class, ClassModel, ModelError, OptimizerConfig};

const SIMPLE_FOLDING: &str = "
class comp0012/target/SimpleFolding
method simple ()I
  ldc 67
  sipush 1234
  iadd
  ireturn
end
";

const CONSTANT_VARIABLE_FOLDING: &str = "
class comp0012/target/ConstantVariableFolding
; int a = 62; int b = (a + 764) * 3; return b + 1234 - a;
method methodOne ()I
  bipush 62
  istore_1
  iload_1
  sipush 764
  iadd
  iconst_3
  imul
  istore_2
  iload_2
  sipush 1234
  iadd
  iload_1
  isub
  ireturn
end
; double i = 0.67; int j = 1; return i + j;
method methodTwo ()D
  ldc2_w 0.67d
  dstore_1
  iconst_1
  istore_3
  dload_1
  iload_3
  i2d
  dadd
  dreturn
end
; long x = 12345; int y = 54321; return x > y;
method methodThree ()Z
  ldc2_w 12345L
  lstore_1
  ldc 54321
  istore_3
  lload_1
  iload_3
  i2l
  lcmp
  ifle False
  iconst_1
  goto Done
False:
  iconst_0
Done:
  ireturn
end
";

const DYNAMIC_VARIABLE_FOLDING: &str = "
class comp0012/target/DynamicVariableFolding
; int a = 42; int b = a + 764 - 3; a = 22; return b * a;
method methodOne ()I
  bipush 42
  istore_1
  iload_1
  sipush 764
  iadd
  iconst_3
  isub
  istore_2
  bipush 22
  istore_1
  iload_2
  iload_1
  imul
  ireturn
end
; int sum = 0; for (int i = 0; i < 10; i++) sum += i; return sum;
method methodTwo ()I
  iconst_0
  istore_1
  iconst_0
  istore_2
Head:
  iload_2
  bipush 10
  if_icmpge Exit
  iload_1
  iload_2
  iadd
  istore_1
  iinc 2 1
  goto Head
Exit:
  iload_1
  ireturn
end
";

fn pushed(class: &ClassModel, method: &str) -> Vec<ConstantValue> {
    class
        .method(method)
        .unwrap()
        .code
        .iter()
        .filter_map(|(_, instruction)| match instruction {
            Instruction::Push(push) => push.value(&class.constant_pool),
            _ => None,
        })
        .collect()
}

fn code_len(class: &ClassModel, method: &str) -> usize {
    class.method(method).unwrap().code.len()
}

fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jfold-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn test_simple_folding() {
    let mut class = ClassModel::from_listing(SIMPLE_FOLDING).unwrap();
    let (_, stats) = optimize_class(&mut class, OptimizerConfig::default());

    assert_eq!(pushed(&class, "simple"), vec![ConstantValue::Int(1301)]);
    assert_eq!(code_len(&class, "simple"), 2);
    assert_eq!(stats.arithmetic_folded, 1);
}

#[test]
fn test_constant_variable_folding() {
    let original = ClassModel::from_listing(CONSTANT_VARIABLE_FOLDING).unwrap();
    let mut class = original.clone();
    let (_, stats) = optimize_class(&mut class, OptimizerConfig::default());

    assert_eq!(pushed(&class, "methodOne"), vec![ConstantValue::Int(3650)]);
    assert_eq!(code_len(&class, "methodOne"), 2);

    assert_eq!(pushed(&class, "methodTwo"), vec![ConstantValue::Double(0.67 + 1.0)]);
    assert_eq!(code_len(&class, "methodTwo"), 2);

    // 12345 > 54321 is false: only the else arm survives
    assert_eq!(pushed(&class, "methodThree"), vec![ConstantValue::Int(0)]);
    assert_eq!(code_len(&class, "methodThree"), 2);

    assert_eq!(stats.methods_optimized, 3);
    assert_eq!(stats.branches_resolved, 1);
    assert_eq!(stats.dead_stores_removed, 6);

    for method in ["methodOne", "methodTwo", "methodThree"] {
        assert_eq!(run(&class, method, &[]), run(&original, method, &[]), "{}", method);
    }
}

#[test]
fn test_dynamic_variable_folding() {
    let original = ClassModel::from_listing(DYNAMIC_VARIABLE_FOLDING).unwrap();
    let mut class = original.clone();
    optimize_class(&mut class, OptimizerConfig::default());

    // (42 + 764 - 3) * 22
    assert_eq!(pushed(&class, "methodOne"), vec![ConstantValue::Int(17666)]);

    // The loop keeps its loads; only the folded-away parts may change
    let loop_code: Vec<String> = class
        .method("methodTwo")
        .unwrap()
        .code
        .iter()
        .map(|(_, instruction)| instruction.opcode().mnemonic().to_string())
        .collect();
    assert!(loop_code.contains(&"iload_1".to_string()));
    assert!(loop_code.contains(&"iload_2".to_string()));
    assert_eq!(
        run(&class, "methodTwo", &[]),
        Execution::Returned(Some(ConstantValue::Int(45)))
    );

    for method in ["methodOne", "methodTwo"] {
        assert_eq!(run(&class, method, &[]), run(&original, method, &[]), "{}", method);
    }
}

#[test]
fn test_large_results_reuse_pool_entries() {
    let mut class = ClassModel::from_listing(
        "class C
const #1 = int 300000
method m ()I
  ldc 100000
  iconst_3
  imul
  ireturn
end",
    )
    .unwrap();
    let pool_len = class.constant_pool.len();
    optimize_class(&mut class, OptimizerConfig::default());

    let code = &class.method("m").unwrap().code;
    let first = code.first().and_then(|h| code.get(h)).cloned();
    // 300000 was already in the pool, only 100000 was added by the listing
    assert_eq!(first, Some(Instruction::Push(Push::Ldc(1))));
    assert_eq!(class.constant_pool.len(), pool_len);
}

#[test]
fn test_save_and_reload_optimized_class() {
    let mut class = ClassModel::from_listing(CONSTANT_VARIABLE_FOLDING).unwrap();
    optimize_class(&mut class, OptimizerConfig::default());

    let path = scratch_path("ConstantVariableFolding.jasm");
    class.save(&path).unwrap();
    let reloaded = ClassModel::load(&path).unwrap();

    assert_eq!(reloaded.to_listing(), class.to_listing());
    assert_eq!(pushed(&reloaded, "methodOne"), vec![ConstantValue::Int(3650)]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_store_reached_by_jump_chain_keeps_its_value() {
    let original = ClassModel::from_listing(
        "class C
method m ()I
  goto Set
Read:
  iload_1
  ireturn
Hop:
  goto Read
  nop
Set:
  iconst_5
  istore_1
  goto Hop
end",
    )
    .unwrap();
    let mut class = original.clone();
    let (_, stats) = optimize_class(&mut class, OptimizerConfig::default());

    assert_eq!(stats.dead_stores_removed, 0);
    assert_eq!(
        run(&class, "m", &[]),
        Execution::Returned(Some(ConstantValue::Int(5)))
    );
    assert_eq!(run(&class, "m", &[]), run(&original, "m", &[]));
}

#[test]
fn test_lost_targets_block_saving() {
    let mut class = ClassModel::from_listing(
        "class C
method m (I)I
  iload_0
  ifne Inner
  iconst_0
  ifeq Else
Inner:
  iconst_1
  ireturn
Else:
  iconst_2
  ireturn
end",
    )
    .unwrap();
    let (reports, _) = optimize_class(&mut class, OptimizerConfig::default());
    assert_eq!(reports[0].lost_targets().len(), 1);

    let path = scratch_path("Lost.jasm");
    let _ = std::fs::remove_file(&path);
    assert!(matches!(class.save(&path), Err(ModelError::DanglingTarget { .. })));
    assert!(!path.exists());
}

#[test]
fn test_config_file_limits_passes() {
    let path = scratch_path("jfold.toml");
    std::fs::write(
        &path,
        "eliminate_dead_stores = false\nclass_filter = \"ConstantVariableFolding\"\n",
    )
    .unwrap();
    let config = OptimizerConfig::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let mut class = ClassModel::from_listing(CONSTANT_VARIABLE_FOLDING).unwrap();
    let (_, stats) = optimize_class(&mut class, config.clone());
    assert_eq!(stats.dead_stores_removed, 0);
    assert!(stats.arithmetic_folded > 0);
    // The stores stay, their values folded
    assert_eq!(code_len(&class, "methodOne"), 6);

    let mut other = ClassModel::from_listing(SIMPLE_FOLDING).unwrap();
    let (reports, _) = optimize_class(&mut other, config);
    assert!(reports.is_empty());
    assert_eq!(code_len(&other, "simple"), 4);
}
