//! Text listing of a class: assembler and disassembler
//!
//! ```text
//! class Sample
//! const #1 = int 300000
//! const #2 = utf8 "hello"
//!
//! method run (I)I
//!   locals 2
//!   stack 2
//!   0000: iload_1
//!   0001: ifle L0
//!   0004: ldc #1 ; 300000
//!   0006: ireturn
//! L0:
//!   0007: iconst_0
//!   0008: ireturn
//! end
//! ```
//!
//! `;` starts a comment, the `xxxx:` offset prefix is optional on input and
//! labels start with a letter. `ldc`-family instructions also accept a
//! literal (`ldc 2.5f`, `ldc2_w 7L`, `ldc "text"`) which is added to the
//! pool.

use std::collections::HashMap;

use itertools::Itertools;
use smallvec::SmallVec;

use super::class::{ClassModel, Method};
use super::instruction::{ArithOp, Condition, Instruction, Narrowing, Push, Relation};
use super::list::InstructionHandle;
use super::opcodes::Opcode;
use super::pool::{ConstantPool, MemberKind, PoolEntry};
use super::value::{ConstantValue, LocalKind, NumericKind};
use crate::error::{ModelError, ModelResult};

const KINDS: [LocalKind; 5] = [
    LocalKind::Numeric(NumericKind::Int),
    LocalKind::Numeric(NumericKind::Long),
    LocalKind::Numeric(NumericKind::Float),
    LocalKind::Numeric(NumericKind::Double),
    LocalKind::Reference,
];

const NUMERIC: [NumericKind; 4] = [
    NumericKind::Int,
    NumericKind::Long,
    NumericKind::Float,
    NumericKind::Double,
];

const RELATIONS: [Relation; 6] = [
    Relation::Eq,
    Relation::Ne,
    Relation::Lt,
    Relation::Ge,
    Relation::Gt,
    Relation::Le,
];

fn parse_error(line: usize, message: impl Into<String>) -> ModelError {
    ModelError::Parse {
        line,
        message: message.into(),
    }
}

// ============================================================================
// Assembler
// ============================================================================

struct BodyLine {
    line: usize,
    labels: Vec<String>,
    text: String,
}

struct MethodDraft {
    method: Method,
    body: Vec<BodyLine>,
    pending_labels: Vec<String>,
    /// Line of the first pending label
    pending_line: usize,
    declared_locals: bool,
    declared_stack: bool,
}

/// Assemble a listing into a class model
pub fn parse(text: &str) -> ModelResult<ClassModel> {
    let mut class: Option<ClassModel> = None;
    let mut draft: Option<MethodDraft> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = strip_comment(raw).trim();
        if content.is_empty() {
            continue;
        }
        let (keyword, rest) = split_word(content);

        if let Some(current) = draft.as_mut() {
            match keyword {
                "end" => {
                    let finished = draft.take().ok_or_else(|| parse_error(line, "no method"))?;
                    let class = class
                        .as_mut()
                        .ok_or_else(|| parse_error(line, "method outside class"))?;
                    let method = assemble_method(finished, &mut class.constant_pool)?;
                    class.methods.push(method);
                }
                "locals" => {
                    current.method.max_locals = parse_number(line, rest)?;
                    current.declared_locals = true;
                }
                "stack" => {
                    current.method.max_stack = parse_number(line, rest)?;
                    current.declared_stack = true;
                }
                _ => push_body_line(current, line, content)?,
            }
            continue;
        }

        match keyword {
            "class" => {
                if class.is_some() {
                    return Err(parse_error(line, "duplicate class header"));
                }
                if rest.is_empty() {
                    return Err(parse_error(line, "missing class name"));
                }
                class = Some(ClassModel::new(rest));
            }
            "const" => {
                let class = class
                    .as_mut()
                    .ok_or_else(|| parse_error(line, "constant outside class"))?;
                parse_constant(line, rest, &mut class.constant_pool)?;
            }
            "method" => {
                if class.is_none() {
                    return Err(parse_error(line, "method outside class"));
                }
                let (name, descriptor) = split_word(rest);
                if name.is_empty() || descriptor.is_empty() {
                    return Err(parse_error(line, "expected `method <name> <descriptor>`"));
                }
                draft = Some(MethodDraft {
                    method: Method::new(name, descriptor),
                    body: Vec::new(),
                    pending_labels: Vec::new(),
                    pending_line: 0,
                    declared_locals: false,
                    declared_stack: false,
                });
            }
            other => return Err(parse_error(line, format!("unexpected `{}`", other))),
        }
    }

    if draft.is_some() {
        return Err(parse_error(text.lines().count(), "missing `end`"));
    }
    class.ok_or_else(|| parse_error(1, "missing class header"))
}

fn push_body_line(draft: &mut MethodDraft, line: usize, content: &str) -> ModelResult<()> {
    let mut rest = content;
    loop {
        let (word, tail) = split_word(rest);
        let Some(name) = word.strip_suffix(':') else {
            break;
        };
        if is_offset(name) {
            // Printed offsets are recomputed on output
        } else if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            if draft.pending_labels.is_empty() {
                draft.pending_line = line;
            }
            draft.pending_labels.push(name.to_string());
        } else {
            return Err(parse_error(line, format!("invalid label `{}`", name)));
        }
        rest = tail;
    }
    if !rest.is_empty() {
        draft.body.push(BodyLine {
            line,
            labels: std::mem::take(&mut draft.pending_labels),
            text: rest.to_string(),
        });
    }
    Ok(())
}

fn assemble_method(draft: MethodDraft, pool: &mut ConstantPool) -> ModelResult<Method> {
    let MethodDraft {
        mut method,
        body,
        pending_labels,
        pending_line,
        declared_locals,
        declared_stack,
    } = draft;
    if let Some(label) = pending_labels.first() {
        return Err(parse_error(
            pending_line,
            format!("label `{}` does not precede an instruction", label),
        ));
    }

    // Branches are placeholders until every label has a handle
    let mut labels: HashMap<&str, InstructionHandle> = HashMap::new();
    let mut branches = Vec::new();
    for body_line in &body {
        let decoded = decode(body_line.line, &body_line.text, pool)?;
        let handle = match decoded {
            Decoded::Plain(instruction) => method.code.push(instruction),
            Decoded::Branch(branch, label) => {
                let handle = method.code.push(Instruction::other(Opcode::Nop));
                branches.push((handle, branch, label, body_line.line));
                handle
            }
        };
        for label in &body_line.labels {
            if labels.insert(label.as_str(), handle).is_some() {
                return Err(parse_error(body_line.line, format!("duplicate label `{}`", label)));
            }
        }
    }

    for (handle, branch, label, line) in branches {
        let target = *labels
            .get(label.as_str())
            .ok_or_else(|| parse_error(line, format!("undefined label `{}`", label)))?;
        let instruction = match branch {
            Branch::If(condition) => Instruction::If { condition, target },
            Branch::Goto => Instruction::Goto { target },
        };
        method.code.replace(handle, instruction)?;
    }

    if !declared_locals || !declared_stack {
        method.recompute_limits();
    }
    Ok(method)
}

enum Branch {
    If(Condition),
    Goto,
}

enum Decoded {
    Plain(Instruction),
    Branch(Branch, String),
}

fn decode(line: usize, text: &str, pool: &mut ConstantPool) -> ModelResult<Decoded> {
    let (mnemonic, rest) = split_word(text);
    let opcode = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| parse_error(line, format!("unknown instruction `{}`", mnemonic)))?;
    if opcode.is_unrepresentable() {
        return Err(parse_error(line, format!("`{}` is not supported", mnemonic)));
    }
    let operands: Vec<&str> = rest.split_whitespace().collect();
    let byte = opcode.to_byte();
    let int_operand = |i: usize| -> ModelResult<i32> {
        operands
            .get(i)
            .and_then(|s| s.trim_start_matches('#').parse().ok())
            .ok_or_else(|| parse_error(line, format!("`{}` expects an integer operand", mnemonic)))
    };

    let instruction = match opcode {
        Opcode::IconstM1
        | Opcode::Iconst0
        | Opcode::Iconst1
        | Opcode::Iconst2
        | Opcode::Iconst3
        | Opcode::Iconst4
        | Opcode::Iconst5 => Instruction::Push(Push::IConst(
            (byte as i32 - Opcode::Iconst0.to_byte() as i32) as i8,
        )),
        Opcode::Lconst0 | Opcode::Lconst1 => {
            Instruction::Push(Push::LConst(byte - Opcode::Lconst0.to_byte()))
        }
        Opcode::Fconst0 | Opcode::Fconst1 | Opcode::Fconst2 => {
            Instruction::Push(Push::FConst(byte - Opcode::Fconst0.to_byte()))
        }
        Opcode::Dconst0 | Opcode::Dconst1 => {
            Instruction::Push(Push::DConst(byte - Opcode::Dconst0.to_byte()))
        }
        Opcode::Bipush => {
            let value = i8::try_from(int_operand(0)?)
                .map_err(|_| parse_error(line, "bipush operand out of range"))?;
            Instruction::Push(Push::BiPush(value))
        }
        Opcode::Sipush => {
            let value = i16::try_from(int_operand(0)?)
                .map_err(|_| parse_error(line, "sipush operand out of range"))?;
            Instruction::Push(Push::SiPush(value))
        }
        Opcode::Ldc | Opcode::LdcW | Opcode::Ldc2W => {
            Instruction::Push(decode_ldc(line, opcode, rest.trim(), pool)?)
        }
        Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
            Instruction::Load {
                kind: KINDS[(byte - Opcode::Iload.to_byte()) as usize],
                slot: parse_slot(line, int_operand(0)?)?,
            }
        }
        Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore => {
            Instruction::Store {
                kind: KINDS[(byte - Opcode::Istore.to_byte()) as usize],
                slot: parse_slot(line, int_operand(0)?)?,
            }
        }
        _ if (Opcode::Iload0.to_byte()..=Opcode::Aload3.to_byte()).contains(&byte) => {
            let index = (byte - Opcode::Iload0.to_byte()) as usize;
            Instruction::Load {
                kind: KINDS[index / 4],
                slot: (index % 4) as u16,
            }
        }
        _ if (Opcode::Istore0.to_byte()..=Opcode::Astore3.to_byte()).contains(&byte) => {
            let index = (byte - Opcode::Istore0.to_byte()) as usize;
            Instruction::Store {
                kind: KINDS[index / 4],
                slot: (index % 4) as u16,
            }
        }
        _ if (Opcode::Iadd.to_byte()..=Opcode::Dneg.to_byte()).contains(&byte) => {
            const OPS: [ArithOp; 6] = [
                ArithOp::Add,
                ArithOp::Sub,
                ArithOp::Mul,
                ArithOp::Div,
                ArithOp::Rem,
                ArithOp::Neg,
            ];
            let index = (byte - Opcode::Iadd.to_byte()) as usize;
            Instruction::Arithmetic {
                kind: NUMERIC[index % 4],
                op: OPS[index / 4],
            }
        }
        _ if (Opcode::Ishl.to_byte()..=Opcode::Lxor.to_byte()).contains(&byte) => {
            const OPS: [ArithOp; 6] = [
                ArithOp::Shl,
                ArithOp::Shr,
                ArithOp::Ushr,
                ArithOp::And,
                ArithOp::Or,
                ArithOp::Xor,
            ];
            let index = (byte - Opcode::Ishl.to_byte()) as usize;
            Instruction::Arithmetic {
                kind: NUMERIC[index % 2],
                op: OPS[index / 2],
            }
        }
        _ if (Opcode::I2l.to_byte()..=Opcode::D2f.to_byte()).contains(&byte) => {
            let index = (byte - Opcode::I2l.to_byte()) as usize;
            let from = NUMERIC[index / 3];
            let to = NUMERIC
                .iter()
                .copied()
                .filter(|kind| *kind != from)
                .nth(index % 3)
                .unwrap_or(from);
            Instruction::Convert { from, to }
        }
        Opcode::I2b => Instruction::Narrow(Narrowing::Byte),
        Opcode::I2c => Instruction::Narrow(Narrowing::Char),
        Opcode::I2s => Instruction::Narrow(Narrowing::Short),
        Opcode::Lcmp => Instruction::CompareLong,
        Opcode::Iinc => {
            let delta = i16::try_from(int_operand(1)?)
                .map_err(|_| parse_error(line, "iinc increment out of range"))?;
            Instruction::Increment {
                slot: parse_slot(line, int_operand(0)?)?,
                delta,
            }
        }
        _ if (Opcode::Ifeq.to_byte()..=Opcode::IfIcmple.to_byte()).contains(&byte) => {
            let index = (byte - Opcode::Ifeq.to_byte()) as usize;
            let condition = if index < 6 {
                Condition::Zero(RELATIONS[index])
            } else {
                Condition::IntCompare(RELATIONS[index - 6])
            };
            return branch(line, mnemonic, Branch::If(condition), &operands);
        }
        Opcode::IfAcmpeq | Opcode::IfAcmpne => {
            let condition = Condition::RefEqual(opcode == Opcode::IfAcmpeq);
            return branch(line, mnemonic, Branch::If(condition), &operands);
        }
        Opcode::Ifnull | Opcode::Ifnonnull => {
            let condition = Condition::Null(opcode == Opcode::Ifnull);
            return branch(line, mnemonic, Branch::If(condition), &operands);
        }
        Opcode::Goto | Opcode::GotoW => {
            return branch(line, mnemonic, Branch::Goto, &operands);
        }
        Opcode::Newarray => {
            let atype = match operands.first().copied() {
                Some("boolean") => 4,
                Some("char") => 5,
                Some("float") => 6,
                Some("double") => 7,
                Some("byte") => 8,
                Some("short") => 9,
                Some("int") => 10,
                Some("long") => 11,
                _ => int_operand(0)?,
            };
            Instruction::Other {
                opcode,
                operands: SmallVec::from_slice(&[atype]),
            }
        }
        _ => {
            let operands = (0..operands.len())
                .map(int_operand)
                .collect::<ModelResult<SmallVec<[i32; 2]>>>()?;
            Instruction::Other { opcode, operands }
        }
    };
    Ok(Decoded::Plain(instruction))
}

fn branch(line: usize, mnemonic: &str, kind: Branch, operands: &[&str]) -> ModelResult<Decoded> {
    match operands {
        [label] => Ok(Decoded::Branch(kind, label.to_string())),
        _ => Err(parse_error(line, format!("`{}` expects one label", mnemonic))),
    }
}

fn decode_ldc(line: usize, opcode: Opcode, operand: &str, pool: &mut ConstantPool) -> ModelResult<Push> {
    let wide = opcode == Opcode::Ldc2W;
    let index = if let Some(index) = operand.strip_prefix('#') {
        let index: u16 = index
            .parse()
            .map_err(|_| parse_error(line, format!("invalid pool index `{}`", operand)))?;
        let entry = pool
            .get(index)
            .ok_or_else(|| parse_error(line, format!("no constant #{}", index)))?;
        let two_words = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
        if two_words != wide {
            return Err(parse_error(line, format!("constant #{} has the wrong width", index)));
        }
        index
    } else if operand.starts_with('"') {
        if wide {
            return Err(parse_error(line, "ldc2_w cannot load a string"));
        }
        let text = unquote(operand)
            .ok_or_else(|| parse_error(line, format!("invalid string literal {}", operand)))?;
        pool.add_string(&text)?
    } else {
        let value = ConstantValue::parse_literal(operand)
            .ok_or_else(|| parse_error(line, format!("invalid literal `{}`", operand)))?;
        let value = match (value, wide) {
            (ConstantValue::Int(v), true) => ConstantValue::Long(v as i64),
            (ConstantValue::Double(v), false) => ConstantValue::Float(v as f32),
            (ConstantValue::Int(_) | ConstantValue::Float(_), false)
            | (ConstantValue::Long(_) | ConstantValue::Double(_), true) => value,
            _ => {
                return Err(parse_error(
                    line,
                    format!("`{}` cannot load {} literal", opcode, value.kind()),
                ))
            }
        };
        pool.add(value)?
    };

    Ok(match opcode {
        Opcode::Ldc2W => Push::Ldc2W(index),
        Opcode::Ldc if index <= u8::MAX as u16 => Push::Ldc(index),
        _ => Push::LdcW(index),
    })
}

fn parse_constant(line: usize, text: &str, pool: &mut ConstantPool) -> ModelResult<()> {
    let (index, rest) = split_word(text);
    let index: usize = index
        .strip_prefix('#')
        .and_then(|i| i.parse().ok())
        .ok_or_else(|| parse_error(line, "expected `const #<index> = <entry>`"))?;
    let rest = rest
        .strip_prefix('=')
        .ok_or_else(|| parse_error(line, "expected `=`"))?
        .trim();
    if index != pool.len() {
        return Err(parse_error(
            line,
            format!("constant #{} out of order, expected #{}", index, pool.len()),
        ));
    }

    let (kind, value) = split_word(rest);
    let refs = || -> ModelResult<(u16, u16)> {
        let parsed: Vec<u16> = value
            .split_whitespace()
            .map(|r| r.strip_prefix('#').and_then(|r| r.parse().ok()))
            .collect::<Option<_>>()
            .ok_or_else(|| parse_error(line, format!("invalid references `{}`", value)))?;
        match parsed[..] {
            [a] => Ok((a, 0)),
            [a, b] => Ok((a, b)),
            _ => Err(parse_error(line, format!("invalid references `{}`", value))),
        }
    };
    let invalid = || parse_error(line, format!("invalid {} constant `{}`", kind, value));

    let entry = match kind {
        "int" => PoolEntry::Integer(value.parse().map_err(|_| invalid())?),
        "long" => PoolEntry::Long(value.parse().map_err(|_| invalid())?),
        "float" => PoolEntry::Float(value.parse().map_err(|_| invalid())?),
        "double" => PoolEntry::Double(value.parse().map_err(|_| invalid())?),
        "utf8" => PoolEntry::Utf8(unquote(value).ok_or_else(invalid)?),
        "string" => PoolEntry::String(refs()?.0),
        "class" => PoolEntry::Class(refs()?.0),
        "nameandtype" => {
            let (name, descriptor) = refs()?;
            PoolEntry::NameAndType { name, descriptor }
        }
        "fieldref" | "methodref" | "interfacemethodref" => {
            let (class, name_and_type) = refs()?;
            let kind = match kind {
                "fieldref" => MemberKind::Field,
                "methodref" => MemberKind::Method,
                _ => MemberKind::InterfaceMethod,
            };
            PoolEntry::Member {
                kind,
                class,
                name_and_type,
            }
        }
        other => return Err(parse_error(line, format!("unknown constant kind `{}`", other))),
    };
    pool.push(entry)?;
    Ok(())
}

fn parse_number(line: usize, text: &str) -> ModelResult<u16> {
    text.parse()
        .map_err(|_| parse_error(line, format!("expected a number, found `{}`", text)))
}

fn parse_slot(line: usize, value: i32) -> ModelResult<u16> {
    u16::try_from(value).map_err(|_| parse_error(line, format!("invalid local slot {}", value)))
}

/// Four or more hex digits, as printed by the disassembler
fn is_offset(word: &str) -> bool {
    word.len() >= 4 && word.chars().all(|c| c.is_ascii_hexdigit())
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

/// Cut a `;` comment, ignoring semicolons inside string literals
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (at, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..at],
            _ => {}
        }
    }
    line
}

/// Decode a double-quoted literal written with Rust `{:?}` escapes
fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'u' => {
                if chars.next()? != '{' {
                    return None;
                }
                let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

// ============================================================================
// Disassembler
// ============================================================================

/// Render a class model as a listing
pub fn print(class: &ClassModel) -> String {
    let mut out = format!("class {}\n", class.name);
    for (index, entry) in class.constant_pool.iter() {
        out.push_str(&format!("const #{} = {}\n", index, entry));
    }
    let methods = class
        .methods
        .iter()
        .map(|method| print_method(method, &class.constant_pool))
        .join("\n");
    if !methods.is_empty() {
        out.push('\n');
        out.push_str(&methods);
    }
    out
}

fn print_method(method: &Method, pool: &ConstantPool) -> String {
    let labels: HashMap<InstructionHandle, usize> = method
        .code
        .iter()
        .filter_map(|(_, instruction)| instruction.target())
        .unique()
        .sorted_by_key(|target| method.code.position(*target))
        .enumerate()
        .map(|(n, target)| (target, n))
        .collect();

    let mut out = format!("method {} {}\n", method.name, method.descriptor);
    out.push_str(&format!("  locals {}\n", method.max_locals));
    out.push_str(&format!("  stack {}\n", method.max_stack));

    let mut offset = 0usize;
    for (handle, instruction) in method.code.iter() {
        if let Some(label) = labels.get(&handle) {
            out.push_str(&format!("L{}:\n", label));
        }
        let text = match instruction.target() {
            Some(target) => match labels.get(&target) {
                Some(label) => format!("{} L{}", instruction.opcode(), label),
                None => format!("{} {}", instruction.opcode(), target),
            },
            None => instruction.to_string(),
        };
        let comment = match instruction {
            Instruction::Push(push @ (Push::Ldc(_) | Push::LdcW(_) | Push::Ldc2W(_))) => {
                push.value(pool).map(|value| format!(" ; {}", value))
            }
            _ => None,
        };
        out.push_str(&format!(
            "  {:04x}: {}{}\n",
            offset,
            text,
            comment.unwrap_or_default()
        ));
        offset += instruction.encoded_len();
    }
    out.push_str("end\n");
    out
}
