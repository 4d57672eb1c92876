use ast::{BinOp, UnOp};
use indexmap::IndexMap;
use std::fmt::{self, Debug, Formatter, Write};
use std::rc::Rc;
use support::Range;

/// An abstract storage slot. Slot K of a function lives at
/// `-4K(%rbp)` once instructions are selected; slots start at 1 and
/// only ever grow.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pseudo {
  pub fun: Rc<str>,
  pub slot: u32,
}

impl Debug for Pseudo {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}.{}", self.fun, self.slot)
  }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Operand {
  Imm(i64),
  Pseudo(Pseudo),
  /// The absent operand: `return;` carries it.
  None,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Instr {
  Fun(Rc<str>),
  /// Stack reservation; sized from the final slot counter at
  /// instruction selection.
  AllocateStack,
  Label(Rc<str>),
  Jump(Rc<str>),
  JumpIfZero { cond: Operand, target: Rc<str> },
  JumpIfNotZero { cond: Operand, target: Rc<str> },
  Store { dest: Pseudo, src: Operand },
  Unary { dest: Pseudo, op: UnOp, src: Operand },
  Binary { dest: Pseudo, op: BinOp, lhs: Operand, rhs: Operand },
  Return(Operand),
}

/// One function's worth of three-address code, built incrementally by
/// the lowering pass and consumed by instruction selection.
pub struct FunctionBody {
  pub name: Rc<str>,
  pub variable_count: u32,
  pub label_count: u32,
  pub code: Vec<(Range, Instr)>,
  pub vars: IndexMap<String, Pseudo>,
}

impl FunctionBody {
  pub fn new(name: impl Into<Rc<str>>) -> Self {
    Self {
      name: name.into(),
      variable_count: 0,
      label_count: 0,
      code: vec![],
      vars: IndexMap::new(),
    }
  }

  /// The next never-used stack slot.
  pub fn fresh_slot(&mut self) -> Pseudo {
    self.variable_count += 1;
    Pseudo {
      fun: Rc::clone(&self.name),
      slot: self.variable_count,
    }
  }

  /// The next never-used label number.
  pub fn fresh_label_index(&mut self) -> u32 {
    let index = self.label_count;
    self.label_count += 1;
    index
  }

  /// Give a resolved variable name a slot of its own.
  pub fn bind(&mut self, name: &str) -> Pseudo {
    let pseudo = self.fresh_slot();
    self.vars.insert(name.to_owned(), pseudo.clone());
    pseudo
  }

  pub fn lookup(&self, name: &str) -> Option<&Pseudo> {
    self.vars.get(name)
  }

  pub fn push(&mut self, range: Range, instr: Instr) {
    self.code.push((range, instr));
  }

  /// `main` falls back to returning 0 when control reaches its end.
  pub fn add_default_return(&mut self, range: Range) {
    match self.code.last() {
      Some((_, Instr::Return(_))) => {}
      _ => self.push(range, Instr::Return(Operand::Imm(0))),
    }
  }

  pub fn to_string_pretty(&self) -> String {
    let mut buf = String::new();
    for (_, instr) in &self.code {
      match instr {
        Instr::Fun(name) => writeln!(&mut buf, "{}:", name).unwrap(),
        Instr::Label(label) => writeln!(&mut buf, "{}:", label).unwrap(),
        instr => writeln!(&mut buf, "    {:?}", instr).unwrap(),
      }
    }
    buf
  }
}

impl Debug for Operand {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Imm(n) => write!(f, "{}", n),
      Self::Pseudo(pseudo) => pseudo.fmt(f),
      Self::None => f.write_str("none"),
    }
  }
}

impl Debug for Instr {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Fun(name) => write!(f, "function {}", name),
      Self::AllocateStack => f.write_str("allocate-stack"),
      Self::Label(label) => write!(f, "label {}", label),
      Self::Jump(target) => write!(f, "goto {}", target),
      Self::JumpIfZero { cond, target } => {
        write!(f, "if-zero {:?} goto {}", cond, target)
      }
      Self::JumpIfNotZero { cond, target } => {
        write!(f, "if-nonzero {:?} goto {}", cond, target)
      }
      Self::Store { dest, src } => write!(f, "{:?} = {:?}", dest, src),
      Self::Unary { dest, op, src } => {
        write!(f, "{:?} = {}{:?}", dest, op.symbol(), src)
      }
      Self::Binary { dest, op, lhs, rhs } => {
        write!(f, "{:?} = {:?} {} {:?}", dest, lhs, op.symbol(), rhs)
      }
      Self::Return(Operand::None) => f.write_str("return"),
      Self::Return(val) => write!(f, "return {:?}", val),
    }
  }
}
