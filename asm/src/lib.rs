//! x86-64 instruction model for the emitter, AT&T flavor. The ALU
//! vocabulary is 32-bit (`-l` suffixes); the only 64-bit traffic is
//! the frame setup in the prologue and epilogue.

use std::fmt::{self, Debug, Display, Formatter, Write};

#[derive(Debug, Clone)]
pub struct Program {
  pub code: Vec<Instr>,
}

#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Instr {
  Globl(String),
  Label(String),
  Push(Reg),
  Pop(Reg),
  MovQ { src: Arg, dest: Arg },
  SubQ { src: Arg, dest: Arg },
  Mov { src: Arg, dest: Arg },
  Add { src: Arg, dest: Arg },
  Sub { src: Arg, dest: Arg },
  Imul { src: Arg, dest: Arg },
  And { src: Arg, dest: Arg },
  Or { src: Arg, dest: Arg },
  Xor { src: Arg, dest: Arg },
  Shl { count: Arg, dest: Arg },
  Sar { count: Arg, dest: Arg },
  Neg(Arg),
  Not(Arg),
  Cmp { src: Arg, dest: Arg },
  SetIf(CmpResult, Arg),
  Cdq,
  Idiv(Arg),
  Jmp(String),
  JumpIf(CmpResult, String),
  Ret,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CmpResult {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Arg {
  Imm(i64),
  Reg(Reg),
  ByteReg(ByteReg),
  /// A memory operand `offset(%reg)`.
  Deref(Reg, i32),
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reg {
  Eax,
  Ecx,
  Edx,
  R10d,
  R11d,
  Rbp,
  Rsp,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ByteReg {
  Cl,
}

impl Program {
  /// Render the whole program as AT&T text, one instruction per
  /// line, labels and directives flush left.
  pub fn to_att(&self) -> String {
    let mut buf = String::new();
    for instr in &self.code {
      match instr {
        Instr::Globl(_) | Instr::Label(_) => {
          writeln!(&mut buf, "{}", instr).unwrap();
        }
        instr => writeln!(&mut buf, "    {}", instr).unwrap(),
      }
    }
    buf
  }
}

impl Display for Instr {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Globl(name) => write!(f, ".global {}", name),
      Self::Label(label) => write!(f, "{}:", label),
      Self::Push(reg) => write!(f, "pushq {}", reg),
      Self::Pop(reg) => write!(f, "popq {}", reg),
      Self::MovQ { src, dest } => write!(f, "movq {}, {}", src, dest),
      Self::SubQ { src, dest } => write!(f, "subq {}, {}", src, dest),
      Self::Mov { src, dest } => write!(f, "movl {}, {}", src, dest),
      Self::Add { src, dest } => write!(f, "addl {}, {}", src, dest),
      Self::Sub { src, dest } => write!(f, "subl {}, {}", src, dest),
      Self::Imul { src, dest } => write!(f, "imull {}, {}", src, dest),
      Self::And { src, dest } => write!(f, "andl {}, {}", src, dest),
      Self::Or { src, dest } => write!(f, "orl {}, {}", src, dest),
      Self::Xor { src, dest } => write!(f, "xorl {}, {}", src, dest),
      Self::Shl { count, dest } => write!(f, "shll {}, {}", count, dest),
      Self::Sar { count, dest } => write!(f, "sarl {}, {}", count, dest),
      Self::Neg(dest) => write!(f, "negl {}", dest),
      Self::Not(dest) => write!(f, "notl {}", dest),
      Self::Cmp { src, dest } => write!(f, "cmpl {}, {}", src, dest),
      Self::SetIf(cmp, dest) => write!(f, "set{} {}", cmp, dest),
      Self::Cdq => f.write_str("cdq"),
      Self::Idiv(arg) => write!(f, "idivl {}", arg),
      Self::Jmp(label) => write!(f, "jmp {}", label),
      Self::JumpIf(cmp, label) => write!(f, "j{} {}", cmp, label),
      Self::Ret => f.write_str("ret"),
    }
  }
}

impl Debug for Instr {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Display for Arg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Imm(n) => write!(f, "${}", n),
      Self::Reg(reg) => Display::fmt(reg, f),
      Self::ByteReg(reg) => Display::fmt(reg, f),
      Self::Deref(reg, 0) => write!(f, "({})", reg),
      Self::Deref(reg, offset) => write!(f, "{}({})", offset, reg),
    }
  }
}

impl Debug for Arg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Display for Reg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let name = match self {
      Reg::Eax => "%eax",
      Reg::Ecx => "%ecx",
      Reg::Edx => "%edx",
      Reg::R10d => "%r10d",
      Reg::R11d => "%r11d",
      Reg::Rbp => "%rbp",
      Reg::Rsp => "%rsp",
    };
    f.write_str(name)
  }
}

impl Debug for Reg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Display for ByteReg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      ByteReg::Cl => f.write_str("%cl"),
    }
  }
}

impl Debug for ByteReg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Display for CmpResult {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let code = match self {
      CmpResult::Eq => "e",
      CmpResult::Ne => "ne",
      CmpResult::Lt => "l",
      CmpResult::Le => "le",
      CmpResult::Gt => "g",
      CmpResult::Ge => "ge",
    };
    f.write_str(code)
  }
}

impl Debug for CmpResult {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    Display::fmt(self, f)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn att_operand_rendering() {
    assert_eq!(Arg::Imm(42).to_string(), "$42");
    assert_eq!(Arg::Imm(-1).to_string(), "$-1");
    assert_eq!(Arg::Reg(Reg::R10d).to_string(), "%r10d");
    assert_eq!(Arg::ByteReg(ByteReg::Cl).to_string(), "%cl");
    assert_eq!(Arg::Deref(Reg::Rbp, -4).to_string(), "-4(%rbp)");
    assert_eq!(Arg::Deref(Reg::Rbp, 0).to_string(), "(%rbp)");
  }

  #[test]
  fn att_instruction_rendering() {
    let instr = Instr::Mov {
      src: Arg::Deref(Reg::Rbp, -8),
      dest: Arg::Reg(Reg::R10d),
    };
    assert_eq!(instr.to_string(), "movl -8(%rbp), %r10d");
    assert_eq!(
      Instr::SetIf(CmpResult::Le, Arg::Deref(Reg::Rbp, -4)).to_string(),
      "setle -4(%rbp)"
    );
    assert_eq!(
      Instr::JumpIf(CmpResult::Ne, ".main.0.end".to_owned()).to_string(),
      "jne .main.0.end"
    );
    assert_eq!(
      Instr::Shl {
        count: Arg::ByteReg(ByteReg::Cl),
        dest: Arg::Reg(Reg::R10d),
      }
      .to_string(),
      "shll %cl, %r10d"
    );
  }

  #[test]
  fn program_layout() {
    let prog = Program {
      code: vec![
        Instr::Globl("main".to_owned()),
        Instr::Label("main".to_owned()),
        Instr::Push(Reg::Rbp),
        Instr::MovQ {
          src: Arg::Reg(Reg::Rsp),
          dest: Arg::Reg(Reg::Rbp),
        },
        Instr::Mov {
          src: Arg::Imm(0),
          dest: Arg::Reg(Reg::Eax),
        },
        Instr::Ret,
      ],
    };
    let expected = [
      ".global main",
      "main:",
      "    pushq %rbp",
      "    movq %rsp, %rbp",
      "    movl $0, %eax",
      "    ret",
      "",
    ]
    .join("\n");
    assert_eq!(prog.to_att(), expected);
  }
}
