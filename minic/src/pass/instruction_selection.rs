use asm::{Arg, ByteReg, CmpResult, Instr, Program, Reg};
use ast::{BinOp, UnOp};
use support::{CompileError, Range};
use tac::{FunctionBody, Operand};

/// Map three-address code onto the fixed-register x86-64 convention:
/// every value lives in its stack slot, `%r10d`/`%r11d`/`%eax`/
/// `%ecx`/`%edx` are scratch, and memory-to-memory traffic is split
/// through `%r10d`.
pub fn select_instruction(body: &FunctionBody) -> Result<Program, CompileError> {
  let mut codegen = CodeGen {
    code: vec![],
    stack_slots: body.variable_count,
  };
  for (range, instr) in &body.code {
    codegen.instr(*range, instr)?;
  }
  Ok(Program { code: codegen.code })
}

struct CodeGen {
  code: Vec<Instr>,
  stack_slots: u32,
}

impl CodeGen {
  fn instr(
    &mut self,
    range: Range,
    instr: &tac::Instr,
  ) -> Result<(), CompileError> {
    match instr {
      tac::Instr::Fun(name) => {
        self.code.push(Instr::Globl(name.to_string()));
        self.code.push(Instr::Label(name.to_string()));
        self.code.push(Instr::Push(Reg::Rbp));
        self.code.push(Instr::MovQ {
          src: Arg::Reg(Reg::Rsp),
          dest: Arg::Reg(Reg::Rbp),
        });
      }
      tac::Instr::AllocateStack => {
        self.code.push(Instr::SubQ {
          src: Arg::Imm(4 * self.stack_slots as i64),
          dest: Arg::Reg(Reg::Rsp),
        });
      }
      tac::Instr::Label(label) => {
        self.code.push(Instr::Label(label.to_string()));
      }
      tac::Instr::Jump(target) => {
        self.code.push(Instr::Jmp(target.to_string()));
      }
      tac::Instr::JumpIfZero { cond, target } => {
        self.jump_if(range, cond, target.as_ref(), CmpResult::Eq)?;
      }
      tac::Instr::JumpIfNotZero { cond, target } => {
        self.jump_if(range, cond, target.as_ref(), CmpResult::Ne)?;
      }
      tac::Instr::Store { dest, src } => {
        let dest = slot_arg(dest);
        match src {
          Operand::Imm(n) => {
            self.code.push(Instr::Mov {
              src: Arg::Imm(*n),
              dest,
            });
          }
          // Two memory operands never meet in one instruction.
          Operand::Pseudo(_) => {
            self.code.push(Instr::Mov {
              src: self.arg(range, src)?,
              dest: Arg::Reg(Reg::R10d),
            });
            self.code.push(Instr::Mov {
              src: Arg::Reg(Reg::R10d),
              dest,
            });
          }
          Operand::None => {
            return Err(CompileError::internal(
              range,
              "store of an absent operand",
            ));
          }
        }
      }
      tac::Instr::Unary { dest, op, src } => {
        let dest = slot_arg(dest);
        let src = self.arg(range, src)?;
        self.code.push(Instr::Mov {
          src,
          dest: Arg::Reg(Reg::R10d),
        });
        match op {
          UnOp::Neg => {
            self.code.push(Instr::Mov {
              src: Arg::Reg(Reg::R10d),
              dest: dest.clone(),
            });
            self.code.push(Instr::Neg(dest));
          }
          UnOp::BitNot => {
            self.code.push(Instr::Mov {
              src: Arg::Reg(Reg::R10d),
              dest: dest.clone(),
            });
            self.code.push(Instr::Not(dest));
          }
          UnOp::LogNot => {
            // The zero fill must precede set<cc>: the byte store
            // alone would leave stale upper bytes in the slot.
            self.code.push(Instr::Cmp {
              src: Arg::Imm(0),
              dest: Arg::Reg(Reg::R10d),
            });
            self.code.push(Instr::Mov {
              src: Arg::Imm(0),
              dest: dest.clone(),
            });
            self.code.push(Instr::SetIf(CmpResult::Eq, dest));
          }
          UnOp::Plus => {
            return Err(CompileError::internal(
              range,
              "unary plus reached instruction selection",
            ));
          }
        }
      }
      tac::Instr::Binary { dest, op, lhs, rhs } => {
        self.binary(range, dest, *op, lhs, rhs)?;
      }
      tac::Instr::Return(val) => {
        match val {
          Operand::None => {}
          val => {
            self.code.push(Instr::Mov {
              src: self.arg(range, val)?,
              dest: Arg::Reg(Reg::Eax),
            });
          }
        }
        self.code.push(Instr::MovQ {
          src: Arg::Reg(Reg::Rbp),
          dest: Arg::Reg(Reg::Rsp),
        });
        self.code.push(Instr::Pop(Reg::Rbp));
        self.code.push(Instr::Ret);
      }
    }
    Ok(())
  }

  fn binary(
    &mut self,
    range: Range,
    dest: &tac::Pseudo,
    op: BinOp,
    lhs: &Operand,
    rhs: &Operand,
  ) -> Result<(), CompileError> {
    let dest = slot_arg(dest);
    let lhs = self.arg(range, lhs)?;
    let rhs = self.arg(range, rhs)?;
    match op {
      BinOp::Add | BinOp::Sub | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
        self.code.push(Instr::Mov {
          src: lhs,
          dest: Arg::Reg(Reg::R10d),
        });
        let src = match rhs {
          imm @ Arg::Imm(_) => imm,
          rhs => {
            self.code.push(Instr::Mov {
              src: rhs,
              dest: Arg::Reg(Reg::R11d),
            });
            Arg::Reg(Reg::R11d)
          }
        };
        let dest_reg = Arg::Reg(Reg::R10d);
        self.code.push(match op {
          BinOp::Add => Instr::Add {
            src,
            dest: dest_reg,
          },
          BinOp::Sub => Instr::Sub {
            src,
            dest: dest_reg,
          },
          BinOp::BitAnd => Instr::And {
            src,
            dest: dest_reg,
          },
          BinOp::BitOr => Instr::Or {
            src,
            dest: dest_reg,
          },
          BinOp::BitXor => Instr::Xor {
            src,
            dest: dest_reg,
          },
          _ => unreachable!(),
        });
        self.code.push(Instr::Mov {
          src: Arg::Reg(Reg::R10d),
          dest,
        });
      }
      BinOp::Shl | BinOp::Shr => {
        self.code.push(Instr::Mov {
          src: lhs,
          dest: Arg::Reg(Reg::R10d),
        });
        // A non-immediate count goes through %cl.
        let count = match rhs {
          imm @ Arg::Imm(_) => imm,
          rhs => {
            self.code.push(Instr::Mov {
              src: rhs,
              dest: Arg::Reg(Reg::Ecx),
            });
            Arg::ByteReg(ByteReg::Cl)
          }
        };
        self.code.push(match op {
          BinOp::Shl => Instr::Shl {
            count,
            dest: Arg::Reg(Reg::R10d),
          },
          BinOp::Shr => Instr::Sar {
            count,
            dest: Arg::Reg(Reg::R10d),
          },
          _ => unreachable!(),
        });
        self.code.push(Instr::Mov {
          src: Arg::Reg(Reg::R10d),
          dest,
        });
      }
      BinOp::Mul => {
        self.code.push(Instr::Mov {
          src: lhs,
          dest: Arg::Reg(Reg::R11d),
        });
        let src = match rhs {
          imm @ Arg::Imm(_) => imm,
          rhs => {
            self.code.push(Instr::Mov {
              src: rhs,
              dest: Arg::Reg(Reg::R10d),
            });
            Arg::Reg(Reg::R10d)
          }
        };
        self.code.push(Instr::Imul {
          src,
          dest: Arg::Reg(Reg::R11d),
        });
        self.code.push(Instr::Mov {
          src: Arg::Reg(Reg::R11d),
          dest,
        });
      }
      BinOp::Div | BinOp::Rem => {
        self.code.push(Instr::Mov {
          src: lhs,
          dest: Arg::Reg(Reg::Eax),
        });
        self.code.push(Instr::Cdq);
        self.code.push(Instr::Mov {
          src: rhs,
          dest: Arg::Reg(Reg::Ecx),
        });
        self.code.push(Instr::Idiv(Arg::Reg(Reg::Ecx)));
        let result = if op == BinOp::Div { Reg::Eax } else { Reg::Edx };
        self.code.push(Instr::Mov {
          src: Arg::Reg(result),
          dest,
        });
      }
      BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
        self.code.push(Instr::Mov {
          src: lhs,
          dest: Arg::Reg(Reg::Edx),
        });
        self.code.push(Instr::Cmp {
          src: rhs,
          dest: Arg::Reg(Reg::Edx),
        });
        self.code.push(Instr::Mov {
          src: Arg::Imm(0),
          dest: dest.clone(),
        });
        let cc = match op {
          BinOp::Eq => CmpResult::Eq,
          BinOp::Ne => CmpResult::Ne,
          BinOp::Lt => CmpResult::Lt,
          BinOp::Le => CmpResult::Le,
          BinOp::Gt => CmpResult::Gt,
          BinOp::Ge => CmpResult::Ge,
          _ => unreachable!(),
        };
        self.code.push(Instr::SetIf(cc, dest));
      }
      BinOp::LogAnd | BinOp::LogOr => {
        return Err(CompileError::internal(
          range,
          "short-circuit operator reached instruction selection",
        ));
      }
    }
    Ok(())
  }

  fn jump_if(
    &mut self,
    range: Range,
    cond: &Operand,
    target: &str,
    cc: CmpResult,
  ) -> Result<(), CompileError> {
    self.code.push(Instr::Mov {
      src: self.arg(range, cond)?,
      dest: Arg::Reg(Reg::Edx),
    });
    self.code.push(Instr::Cmp {
      src: Arg::Imm(0),
      dest: Arg::Reg(Reg::Edx),
    });
    self.code.push(Instr::JumpIf(cc, target.to_owned()));
    Ok(())
  }

  fn arg(&self, range: Range, operand: &Operand) -> Result<Arg, CompileError> {
    match operand {
      Operand::Imm(n) => Ok(Arg::Imm(*n)),
      Operand::Pseudo(pseudo) => Ok(slot_arg(pseudo)),
      Operand::None => Err(CompileError::internal(
        range,
        "absent operand in a value position",
      )),
    }
  }
}

/// Slot K lives at -4K(%rbp).
fn slot_arg(pseudo: &tac::Pseudo) -> Arg {
  Arg::Deref(Reg::Rbp, -4 * pseudo.slot as i32)
}
