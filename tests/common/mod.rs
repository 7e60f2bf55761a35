//! Test utilities for optimizer integration tests
//!
//! This module provides:
//! - A reference interpreter for the instruction model, so original and
//!   optimized methods can be run side by side
//! - A small structured source language (assignments, `if`/`else`, counted
//!   loops) compiled to listings the way `javac` lays out such code
//! - `proptest` strategies generating programs in that language
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Write;

use jfold::bytecode::{ArithOp, Condition, ConstantPool, ConstantValue, Instruction, InstructionList, Narrowing, Opcode, Relation};
use jfold::ClassModel;
use proptest::prelude::*;

/// Instructions executed before a run is abandoned
pub const STEP_LIMIT: usize = 100_000;

/// How a method run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Returned(Option<ConstantValue>),
    /// `ArithmeticException` from an integer division by zero
    DivideByZero,
    StepLimit,
}

/// Run one method of a class with the given arguments in slots 0..
pub fn run(class: &ClassModel, method: &str, args: &[ConstantValue]) -> Execution {
    let method = class
        .method(method)
        .unwrap_or_else(|| panic!("no method {}", method));
    execute(&method.code, &class.constant_pool, args)
}

/// Interpret an instruction list.
///
/// Only the numeric subset is modeled; reaching anything else panics, since
/// test programs never contain it.
pub fn execute(code: &InstructionList, pool: &ConstantPool, args: &[ConstantValue]) -> Execution {
    let mut locals: HashMap<u16, ConstantValue> = HashMap::new();
    let mut next_slot = 0;
    for arg in args {
        locals.insert(next_slot, *arg);
        next_slot += arg.kind().width();
    }

    let mut stack: Vec<ConstantValue> = Vec::new();
    let mut pc = code.first();
    let mut steps = 0;

    while let Some(handle) = pc {
        steps += 1;
        if steps > STEP_LIMIT {
            return Execution::StepLimit;
        }
        let instruction = code.get(handle).expect("live instruction");
        let mut next = code.next(handle);

        match instruction {
            Instruction::Push(push) => {
                stack.push(push.value(pool).expect("numeric constant"));
            }
            Instruction::Load { slot, .. } => {
                let value = locals
                    .get(slot)
                    .unwrap_or_else(|| panic!("slot {} read before written", slot));
                stack.push(*value);
            }
            Instruction::Store { slot, .. } => {
                locals.insert(*slot, stack.pop().expect("value to store"));
            }
            Instruction::Arithmetic { op, .. } => {
                let right = stack.pop().expect("right operand");
                let left = stack.pop().expect("left operand");
                match arithmetic(*op, left, right) {
                    Some(result) => stack.push(result),
                    None => return Execution::DivideByZero,
                }
            }
            Instruction::Convert { to, .. } => {
                let value = stack.pop().expect("operand");
                stack.push(value.convert(*to));
            }
            Instruction::Narrow(narrowing) => {
                let value = stack.pop().expect("operand").as_i32();
                stack.push(ConstantValue::Int(match narrowing {
                    Narrowing::Byte => value as i8 as i32,
                    Narrowing::Char => value as u16 as i32,
                    Narrowing::Short => value as i16 as i32,
                }));
            }
            Instruction::CompareLong => {
                let right = stack.pop().expect("right operand").as_i64();
                let left = stack.pop().expect("left operand").as_i64();
                stack.push(ConstantValue::Int(left.cmp(&right) as i32));
            }
            Instruction::If { condition, target } => {
                let jumps = match condition {
                    Condition::Zero(relation) => {
                        let value = stack.pop().expect("operand").as_i32();
                        relation.holds(value.cmp(&0))
                    }
                    Condition::IntCompare(relation) => {
                        let right = stack.pop().expect("right operand").as_i32();
                        let left = stack.pop().expect("left operand").as_i32();
                        relation.holds(left.cmp(&right))
                    }
                    other => panic!("reference comparison {:?} in a numeric program", other),
                };
                if jumps {
                    next = Some(*target);
                }
            }
            Instruction::Goto { target } => next = Some(*target),
            Instruction::Increment { slot, delta } => {
                let value = locals.get(slot).expect("incremented slot").as_i32();
                locals.insert(*slot, ConstantValue::Int(value.wrapping_add(*delta as i32)));
            }
            Instruction::Other { opcode, .. } => match opcode {
                Opcode::Nop => {}
                Opcode::Ireturn | Opcode::Lreturn | Opcode::Freturn | Opcode::Dreturn => {
                    return Execution::Returned(stack.pop());
                }
                Opcode::Return => return Execution::Returned(None),
                other => panic!("`{}` is outside the interpreted subset", other),
            },
        }
        pc = next;
    }
    Execution::Returned(None)
}

/// `None` for an integral division by zero
fn arithmetic(op: ArithOp, left: ConstantValue, right: ConstantValue) -> Option<ConstantValue> {
    use ConstantValue::*;

    let result = match (left, right) {
        (Int(a), Int(b)) => Int(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => a.checked_div(b).or_else(|| (b == -1).then_some(a))?,
            ArithOp::Rem => a.checked_rem(b).or_else(|| (b == -1).then_some(0))?,
            other => panic!("{:?} is outside the interpreted subset", other),
        }),
        (Long(a), Long(b)) => Long(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => a.checked_div(b).or_else(|| (b == -1).then_some(a))?,
            ArithOp::Rem => a.checked_rem(b).or_else(|| (b == -1).then_some(0))?,
            other => panic!("{:?} is outside the interpreted subset", other),
        }),
        (Float(a), Float(b)) => Float(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            other => panic!("{:?} is outside the interpreted subset", other),
        }),
        (Double(a), Double(b)) => Double(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            other => panic!("{:?} is outside the interpreted subset", other),
        }),
        (left, right) => panic!("mismatched operands {:?} and {:?}", left, right),
    };
    Some(result)
}

// ============================================================================
// Structured programs
// ============================================================================

/// Slots a program may assign; slot 0 is the `int` parameter
pub const VARIABLES: u16 = 4;
/// First slot used for loop counters, one per nesting level
const COUNTER_BASE: u16 = VARIABLES + 1;

#[derive(Debug, Clone)]
pub enum Expr {
    Const(i32),
    Var(u16),
    Binary(ArithOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Test {
    /// `left <relation> right`
    Compare(Relation, Expr, Expr),
    /// `value <relation> 0`
    Zero(Relation, Expr),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assign(u16, Expr),
    If {
        test: Test,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// Counted loop running `times` iterations
    Repeat { times: u8, body: Vec<Stmt> },
}

/// `static int run(int p)`: every variable starts at zero and the value of
/// `result` is returned
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub result: u16,
}

impl Program {
    pub fn to_listing(&self) -> String {
        let mut compiler = Compiler::default();
        compiler.line("class Generated");
        compiler.line("method run (I)I");
        for slot in 1..=VARIABLES {
            compiler.line("  iconst_0");
            compiler.line(&format!("  {}", local("istore", slot)));
        }
        compiler.block(&self.body, 0);
        compiler.line(&format!("  {}", local("iload", self.result)));
        compiler.line("  ireturn");
        compiler.line("end");
        compiler.out
    }

    pub fn class(&self) -> ClassModel {
        ClassModel::from_listing(&self.to_listing()).expect("generated listing assembles")
    }
}

#[derive(Default)]
struct Compiler {
    out: String,
    labels: usize,
}

impl Compiler {
    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn label(&mut self) -> String {
        self.labels += 1;
        format!("L{}", self.labels)
    }

    fn block(&mut self, body: &[Stmt], depth: u16) {
        for stmt in body {
            self.stmt(stmt, depth);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, depth: u16) {
        match stmt {
            Stmt::Assign(slot, value) => {
                self.expr(value);
                self.line(&format!("  {}", local("istore", *slot)));
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                let skip_then = self.label();
                // Jump over the then block when the test fails
                match test {
                    Test::Compare(relation, left, right) => {
                        self.expr(left);
                        self.expr(right);
                        self.line(&format!("  if_icmp{} {}", suffix(negate(*relation)), skip_then));
                    }
                    Test::Zero(relation, value) => {
                        self.expr(value);
                        self.line(&format!("  if{} {}", suffix(negate(*relation)), skip_then));
                    }
                }
                self.block(then, depth);
                if otherwise.is_empty() {
                    self.line(&format!("{}:", skip_then));
                } else {
                    let join = self.label();
                    self.line(&format!("  goto {}", join));
                    self.line(&format!("{}:", skip_then));
                    self.block(otherwise, depth);
                    self.line(&format!("{}:", join));
                }
            }
            Stmt::Repeat { times, body } => {
                let counter = COUNTER_BASE + depth;
                let head = self.label();
                let exit = self.label();
                self.line("  iconst_0");
                self.line(&format!("  {}", local("istore", counter)));
                self.line(&format!("{}:", head));
                self.line(&format!("  {}", local("iload", counter)));
                self.constant(*times as i32);
                self.line(&format!("  if_icmpge {}", exit));
                self.block(body, depth + 1);
                self.line(&format!("  iinc {} 1", counter));
                self.line(&format!("  goto {}", head));
                self.line(&format!("{}:", exit));
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Const(value) => self.constant(*value),
            Expr::Var(slot) => self.line(&format!("  {}", local("iload", *slot))),
            Expr::Binary(op, left, right) => {
                self.expr(left);
                self.expr(right);
                let mnemonic = match op {
                    ArithOp::Add => "iadd",
                    ArithOp::Sub => "isub",
                    ArithOp::Mul => "imul",
                    ArithOp::Div => "idiv",
                    other => panic!("{:?} is not generated", other),
                };
                self.line(&format!("  {}", mnemonic));
            }
        }
    }

    fn constant(&mut self, value: i32) {
        let text = match value {
            0..=5 => format!("iconst_{}", value),
            -128..=127 => format!("bipush {}", value),
            -32768..=32767 => format!("sipush {}", value),
            _ => format!("ldc {}", value),
        };
        self.line(&format!("  {}", text));
    }
}

fn local(mnemonic: &str, slot: u16) -> String {
    if slot <= 3 {
        format!("{}_{}", mnemonic, slot)
    } else {
        format!("{} {}", mnemonic, slot)
    }
}

fn negate(relation: Relation) -> Relation {
    match relation {
        Relation::Eq => Relation::Ne,
        Relation::Ne => Relation::Eq,
        Relation::Lt => Relation::Ge,
        Relation::Ge => Relation::Lt,
        Relation::Gt => Relation::Le,
        Relation::Le => Relation::Gt,
    }
}

fn suffix(relation: Relation) -> &'static str {
    match relation {
        Relation::Eq => "eq",
        Relation::Ne => "ne",
        Relation::Lt => "lt",
        Relation::Ge => "ge",
        Relation::Gt => "gt",
        Relation::Le => "le",
    }
}

// ============================================================================
// Strategies
// ============================================================================

fn constant() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => -2i32..=8,
        2 => 100i32..=40_000,
        1 => any::<i32>(),
    ]
}

fn relation() -> impl Strategy<Value = Relation> {
    prop_oneof![
        Just(Relation::Eq),
        Just(Relation::Ne),
        Just(Relation::Lt),
        Just(Relation::Ge),
        Just(Relation::Gt),
        Just(Relation::Le),
    ]
}

fn operator() -> impl Strategy<Value = ArithOp> {
    prop_oneof![
        Just(ArithOp::Add),
        Just(ArithOp::Sub),
        Just(ArithOp::Mul),
        Just(ArithOp::Div),
    ]
}

pub fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        constant().prop_map(Expr::Const),
        (0..=VARIABLES).prop_map(Expr::Var),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        (operator(), inner.clone(), inner)
            .prop_map(|(op, left, right)| Expr::Binary(op, Box::new(left), Box::new(right)))
    })
}

/// Right-hand side of an assignment. A bare variable copy is left out:
/// removing a dead copy exposes the store it read from, which a single
/// dead-store pass does not revisit.
fn assigned_value() -> impl Strategy<Value = Expr> {
    prop_oneof![
        constant().prop_map(Expr::Const),
        (operator(), expr(), expr())
            .prop_map(|(op, left, right)| Expr::Binary(op, Box::new(left), Box::new(right))),
    ]
}

fn branch_test() -> impl Strategy<Value = Test> {
    prop_oneof![
        (relation(), expr(), expr()).prop_map(|(r, left, right)| Test::Compare(r, left, right)),
        (relation(), expr()).prop_map(|(r, value)| Test::Zero(r, value)),
    ]
}

pub fn stmt() -> impl Strategy<Value = Stmt> {
    let assign = (1..=VARIABLES, assigned_value()).prop_map(|(slot, value)| Stmt::Assign(slot, value));
    assign.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (
                branch_test(),
                prop::collection::vec(inner.clone(), 0..4),
                prop::collection::vec(inner.clone(), 0..4),
            )
                .prop_map(|(test, then, otherwise)| Stmt::If {
                    test,
                    then,
                    otherwise,
                }),
            (0u8..4, prop::collection::vec(inner, 0..4))
                .prop_map(|(times, body)| Stmt::Repeat { times, body }),
        ]
    })
}

pub fn program() -> impl Strategy<Value = Program> {
    (prop::collection::vec(stmt(), 1..8), 1..=VARIABLES)
        .prop_map(|(body, result)| Program { body, result })
}
