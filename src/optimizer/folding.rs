//! Compile-time evaluation of numeric instructions.
//!
//! Integer arithmetic wraps in two's complement and division truncates toward
//! zero; float and double arithmetic is IEEE-754. These are the JVM rules and
//! also the rules of Rust's `wrapping_*` integer methods and primitive float
//! operators.

use std::cmp::Ordering;

use crate::bytecode::{ArithOp, Condition, ConstantValue, Instruction, Narrowing, NumericKind};
use crate::error::{OptimizeError, OptimizeResult};

/// Whether folding `op` would divide by a zero divisor
pub fn divides_by_zero(op: ArithOp, operands: &[ConstantValue]) -> bool {
    op == ArithOp::Div && operands.get(1).is_some_and(ConstantValue::is_zero)
}

/// Fold an arithmetic instruction over known operands (pushed order).
///
/// Returns `Ok(None)` when the fold must not happen: a zero divisor, or
/// operands whose kinds do not match the instruction. Operators outside
/// `add`/`sub`/`mul`/`div` are [`OptimizeError::UnsupportedOperation`].
pub fn fold_arithmetic(
    kind: NumericKind,
    op: ArithOp,
    operands: &[ConstantValue],
) -> OptimizeResult<Option<ConstantValue>> {
    if !matches!(op, ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div) {
        let instruction = Instruction::Arithmetic { kind, op };
        return Err(OptimizeError::UnsupportedOperation(
            instruction.opcode().mnemonic().to_string(),
        ));
    }
    if divides_by_zero(op, operands) {
        return Ok(None);
    }

    let result = match (operands, op) {
        ([ConstantValue::Int(a), ConstantValue::Int(b)], _) if kind == NumericKind::Int => {
            ConstantValue::Int(match op {
                ArithOp::Add => a.wrapping_add(*b),
                ArithOp::Sub => a.wrapping_sub(*b),
                ArithOp::Mul => a.wrapping_mul(*b),
                _ => a.wrapping_div(*b),
            })
        }
        ([ConstantValue::Long(a), ConstantValue::Long(b)], _) if kind == NumericKind::Long => {
            ConstantValue::Long(match op {
                ArithOp::Add => a.wrapping_add(*b),
                ArithOp::Sub => a.wrapping_sub(*b),
                ArithOp::Mul => a.wrapping_mul(*b),
                _ => a.wrapping_div(*b),
            })
        }
        ([ConstantValue::Float(a), ConstantValue::Float(b)], _) if kind == NumericKind::Float => {
            ConstantValue::Float(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                _ => a / b,
            })
        }
        ([ConstantValue::Double(a), ConstantValue::Double(b)], _)
            if kind == NumericKind::Double =>
        {
            ConstantValue::Double(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                _ => a / b,
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// Fold a widening or narrowing conversion between numeric kinds
pub fn fold_conversion(
    from: NumericKind,
    to: NumericKind,
    value: ConstantValue,
) -> Option<ConstantValue> {
    (value.kind() == from).then(|| value.convert(to))
}

/// Fold `i2b`, `i2c` or `i2s`
pub fn fold_narrowing(narrowing: Narrowing, value: ConstantValue) -> Option<ConstantValue> {
    let ConstantValue::Int(v) = value else {
        return None;
    };
    let narrowed = match narrowing {
        Narrowing::Byte => v as i8 as i32,
        Narrowing::Char => v as u16 as i32,
        Narrowing::Short => v as i16 as i32,
    };
    Some(ConstantValue::Int(narrowed))
}

/// Fold `lcmp`: -1, 0 or 1
pub fn fold_lcmp(a: ConstantValue, b: ConstantValue) -> Option<ConstantValue> {
    match (a, b) {
        (ConstantValue::Long(a), ConstantValue::Long(b)) => Some(ConstantValue::Int(match a.cmp(&b) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        })),
        _ => None,
    }
}

/// Decide whether a conditional branch jumps, given its known operands in
/// pushed order. Reference comparisons are never decided.
pub fn evaluate_condition(condition: Condition, operands: &[ConstantValue]) -> Option<bool> {
    match (condition, operands) {
        (Condition::Zero(relation), [ConstantValue::Int(v)]) => Some(relation.holds(v.cmp(&0))),
        (Condition::IntCompare(relation), [ConstantValue::Int(a), ConstantValue::Int(b)]) => {
            Some(relation.holds(a.cmp(b)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Relation;

    #[test]
    fn test_int_division_wraps_on_min_over_minus_one() {
        let folded = fold_arithmetic(
            NumericKind::Int,
            ArithOp::Div,
            &[ConstantValue::Int(i32::MIN), ConstantValue::Int(-1)],
        );
        assert_eq!(folded.ok().flatten(), Some(ConstantValue::Int(i32::MIN)));
    }

    #[test]
    fn test_zero_divisor_refused_for_every_kind() {
        let cases = [
            (NumericKind::Int, [ConstantValue::Int(1), ConstantValue::Int(0)]),
            (NumericKind::Long, [ConstantValue::Long(1), ConstantValue::Long(0)]),
            (NumericKind::Float, [ConstantValue::Float(1.0), ConstantValue::Float(0.0)]),
            (NumericKind::Double, [ConstantValue::Double(1.0), ConstantValue::Double(-0.0)]),
        ];
        for (kind, operands) in cases {
            assert!(divides_by_zero(ArithOp::Div, &operands));
            assert_eq!(fold_arithmetic(kind, ArithOp::Div, &operands).ok(), Some(None));
        }
    }

    #[test]
    fn test_unsupported_operator_is_an_error() {
        let result = fold_arithmetic(
            NumericKind::Int,
            ArithOp::Rem,
            &[ConstantValue::Int(7), ConstantValue::Int(2)],
        );
        assert!(matches!(
            result,
            Err(OptimizeError::UnsupportedOperation(ref m)) if m == "irem"
        ));
    }

    #[test]
    fn test_mismatched_kinds_do_not_fold() {
        let folded = fold_arithmetic(
            NumericKind::Long,
            ArithOp::Add,
            &[ConstantValue::Int(1), ConstantValue::Int(2)],
        );
        assert_eq!(folded.ok(), Some(None));
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(
            fold_narrowing(Narrowing::Byte, ConstantValue::Int(200)),
            Some(ConstantValue::Int(-56))
        );
        assert_eq!(
            fold_narrowing(Narrowing::Char, ConstantValue::Int(-1)),
            Some(ConstantValue::Int(65535))
        );
        assert_eq!(fold_narrowing(Narrowing::Short, ConstantValue::Long(1)), None);
    }

    #[test]
    fn test_lcmp_and_conditions() {
        assert_eq!(
            fold_lcmp(ConstantValue::Long(3), ConstantValue::Long(9)),
            Some(ConstantValue::Int(-1))
        );
        assert_eq!(
            evaluate_condition(Condition::Zero(Relation::Le), &[ConstantValue::Int(-1)]),
            Some(true)
        );
        assert_eq!(
            evaluate_condition(
                Condition::IntCompare(Relation::Gt),
                &[ConstantValue::Int(2), ConstantValue::Int(5)]
            ),
            Some(false)
        );
        assert_eq!(evaluate_condition(Condition::Null(true), &[]), None);
    }
}
