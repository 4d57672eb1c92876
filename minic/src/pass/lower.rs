use ast::{
  BinOp, Block, BlockItem, Declaration, Exp, ExpKind, ForInit, LValue,
  LValueKind, Program, Stmt, StmtKind, UnOp,
};
use std::rc::Rc;
use support::CompileError;
use tac::{FunctionBody, Instr, Operand, Pseudo};

/// Lower the resolved AST into three-address code: a post-order walk
/// where every sub-expression lands in a fresh pseudo-register and
/// control flow becomes jumps between symbolic labels.
pub fn lower(prog: &Program) -> Result<FunctionBody, CompileError> {
  let fun = &prog.main;
  let mut lowerer = Lowerer {
    body: FunctionBody::new(fun.name.as_str()),
  };
  let name = Rc::clone(&lowerer.body.name);
  lowerer.body.push(fun.range, Instr::Fun(name));
  lowerer.body.push(fun.range, Instr::AllocateStack);
  lowerer.lower_block(&fun.body)?;
  if fun.name == "main" {
    lowerer.body.add_default_return(fun.range);
  }
  Ok(lowerer.body)
}

struct Lowerer {
  body: FunctionBody,
}

impl Lowerer {
  fn lower_block(&mut self, block: &Block) -> Result<(), CompileError> {
    for item in &block.items {
      match item {
        BlockItem::Decl(decl) => self.lower_declaration(decl)?,
        BlockItem::Stmt(stmt) => self.lower_stmt(stmt)?,
      }
    }
    Ok(())
  }

  fn lower_declaration(
    &mut self,
    decl: &Declaration,
  ) -> Result<(), CompileError> {
    let pseudo = self.body.bind(&decl.name);
    if let Some(init) = &decl.init {
      let src = self.lower_exp(init)?;
      self.body.push(
        decl.range,
        Instr::Store { dest: pseudo, src },
      );
    }
    Ok(())
  }

  fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
    let range = stmt.range;
    match &stmt.kind {
      StmtKind::Return(exp) => {
        let val = match exp {
          Some(exp) => self.lower_exp(exp)?,
          None => Operand::None,
        };
        self.body.push(range, Instr::Return(val));
        Ok(())
      }
      StmtKind::Expression(exp) => {
        self.lower_exp(exp)?;
        Ok(())
      }
      StmtKind::If { cond, then, els } => {
        let index = self.body.fresh_label_index();
        let end = self.make_label(index, "end");
        let cond = self.lower_exp(cond)?;
        match els {
          None => {
            self.body.push(
              range,
              Instr::JumpIfZero {
                cond,
                target: Rc::clone(&end),
              },
            );
            self.lower_stmt(then)?;
            self.body.push(range, Instr::Label(end));
          }
          Some(els) => {
            let else_label = self.make_label(index, "else");
            self.body.push(
              range,
              Instr::JumpIfZero {
                cond,
                target: Rc::clone(&else_label),
              },
            );
            self.lower_stmt(then)?;
            self.body.push(range, Instr::Jump(Rc::clone(&end)));
            self.body.push(range, Instr::Label(else_label));
            self.lower_stmt(els)?;
            self.body.push(range, Instr::Label(end));
          }
        }
        Ok(())
      }
      StmtKind::Compound(block) => self.lower_block(block),
      StmtKind::While {
        cond,
        body,
        label,
        is_do_while,
      } => {
        let start = loop_label(label, "start");
        let end = loop_label(label, "end");
        if *is_do_while {
          // The condition sits at start.loop so `continue` tests it;
          // the first iteration enters the body directly.
          let body_label = loop_label(label, "body");
          self.body.push(range, Instr::Jump(Rc::clone(&body_label)));
          self.body.push(range, Instr::Label(Rc::clone(&start)));
          let cond = self.lower_exp(cond)?;
          self.body.push(
            range,
            Instr::JumpIfZero {
              cond,
              target: Rc::clone(&end),
            },
          );
          self.body.push(range, Instr::Label(body_label));
          self.lower_stmt(body)?;
          self.body.push(range, Instr::Jump(start));
          self.body.push(range, Instr::Label(end));
        } else {
          self.body.push(range, Instr::Label(Rc::clone(&start)));
          let cond = self.lower_exp(cond)?;
          self.body.push(
            range,
            Instr::JumpIfZero {
              cond,
              target: Rc::clone(&end),
            },
          );
          self.lower_stmt(body)?;
          self.body.push(range, Instr::Jump(start));
          self.body.push(range, Instr::Label(end));
        }
        Ok(())
      }
      StmtKind::For {
        init,
        cond,
        step,
        body,
        label,
      } => {
        let start = loop_label(label, "start");
        let end = loop_label(label, "end");
        let increment = loop_label(label, "increment");
        match init {
          ForInit::Decl(decl) => self.lower_declaration(decl)?,
          ForInit::Exp(exp) => {
            self.lower_exp(exp)?;
          }
          ForInit::None => {}
        }
        self.body.push(range, Instr::Label(Rc::clone(&start)));
        // An absent condition means "always true".
        if let Some(cond) = cond {
          let cond = self.lower_exp(cond)?;
          self.body.push(
            range,
            Instr::JumpIfZero {
              cond,
              target: Rc::clone(&end),
            },
          );
        }
        self.lower_stmt(body)?;
        self.body.push(range, Instr::Label(increment));
        if let Some(step) = step {
          self.lower_exp(step)?;
        }
        self.body.push(range, Instr::Jump(start));
        self.body.push(range, Instr::Label(end));
        Ok(())
      }
      StmtKind::Break { label } => {
        self
          .body
          .push(range, Instr::Jump(loop_label(label, "end")));
        Ok(())
      }
      StmtKind::Continue { label, is_for } => {
        let target = if *is_for {
          loop_label(label, "increment")
        } else {
          loop_label(label, "start")
        };
        self.body.push(range, Instr::Jump(target));
        Ok(())
      }
      StmtKind::Null => Ok(()),
    }
  }

  fn lower_exp(&mut self, exp: &Exp) -> Result<Operand, CompileError> {
    let range = exp.range;
    match &exp.kind {
      ExpKind::Const(n) => Ok(Operand::Imm(*n)),
      ExpKind::Var(name) => match self.body.lookup(name) {
        Some(pseudo) => Ok(Operand::Pseudo(pseudo.clone())),
        // The resolver should have rejected this already.
        None => Err(CompileError::semantic(
          range,
          format!("variable `{}` not found", name),
        )),
      },
      // Unary plus passes its operand through untouched.
      ExpKind::Unary(UnOp::Plus, operand) => self.lower_exp(operand),
      ExpKind::Unary(op, operand) => {
        let src = self.lower_exp(operand)?;
        let dest = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Unary {
            dest: dest.clone(),
            op: *op,
            src,
          },
        );
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Binary(BinOp::LogAnd, left, right) => {
        let index = self.body.fresh_label_index();
        let false_label = self.make_label(index, "false");
        let end = self.make_label(index, "end");
        let left = self.lower_exp(left)?;
        self.body.push(
          range,
          Instr::JumpIfZero {
            cond: left,
            target: Rc::clone(&false_label),
          },
        );
        let right = self.lower_exp(right)?;
        self.body.push(
          range,
          Instr::JumpIfZero {
            cond: right,
            target: Rc::clone(&false_label),
          },
        );
        let dest = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: Operand::Imm(1),
          },
        );
        self.body.push(range, Instr::Jump(Rc::clone(&end)));
        self.body.push(range, Instr::Label(false_label));
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: Operand::Imm(0),
          },
        );
        self.body.push(range, Instr::Label(end));
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Binary(BinOp::LogOr, left, right) => {
        let index = self.body.fresh_label_index();
        let true_label = self.make_label(index, "true");
        let end = self.make_label(index, "end");
        let left = self.lower_exp(left)?;
        self.body.push(
          range,
          Instr::JumpIfNotZero {
            cond: left,
            target: Rc::clone(&true_label),
          },
        );
        let right = self.lower_exp(right)?;
        self.body.push(
          range,
          Instr::JumpIfNotZero {
            cond: right,
            target: Rc::clone(&true_label),
          },
        );
        let dest = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: Operand::Imm(0),
          },
        );
        self.body.push(range, Instr::Jump(Rc::clone(&end)));
        self.body.push(range, Instr::Label(true_label));
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: Operand::Imm(1),
          },
        );
        self.body.push(range, Instr::Label(end));
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Binary(op, left, right) => {
        let lhs = self.lower_exp(left)?;
        let rhs = self.lower_exp(right)?;
        let dest = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Binary {
            dest: dest.clone(),
            op: *op,
            lhs,
            rhs,
          },
        );
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Assignment { target, value } => {
        let src = self.lower_exp(value)?;
        let dest = self.lower_lvalue(target)?;
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src,
          },
        );
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Conditional { cond, then, els } => {
        let index = self.body.fresh_label_index();
        let else_label = self.make_label(index, "else");
        let end = self.make_label(index, "end");
        let dest = self.body.fresh_slot();
        let cond = self.lower_exp(cond)?;
        self.body.push(
          range,
          Instr::JumpIfZero {
            cond,
            target: Rc::clone(&else_label),
          },
        );
        let then = self.lower_exp(then)?;
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: then,
          },
        );
        self.body.push(range, Instr::Jump(Rc::clone(&end)));
        self.body.push(range, Instr::Label(else_label));
        let els = self.lower_exp(els)?;
        self.body.push(
          range,
          Instr::Store {
            dest: dest.clone(),
            src: els,
          },
        );
        self.body.push(range, Instr::Label(end));
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Prefix(op, target) => {
        let dest = self.lower_lvalue(target)?;
        self.body.push(
          range,
          Instr::Binary {
            dest: dest.clone(),
            op: op.binop(),
            lhs: Operand::Pseudo(dest.clone()),
            rhs: Operand::Imm(1),
          },
        );
        Ok(Operand::Pseudo(dest))
      }
      ExpKind::Postfix(op, target) => {
        let reg = self.lower_lvalue(target)?;
        let old = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Store {
            dest: old.clone(),
            src: Operand::Pseudo(reg.clone()),
          },
        );
        let new = self.body.fresh_slot();
        self.body.push(
          range,
          Instr::Binary {
            dest: new.clone(),
            op: op.binop(),
            lhs: Operand::Pseudo(reg.clone()),
            rhs: Operand::Imm(1),
          },
        );
        self.body.push(
          range,
          Instr::Store {
            dest: reg,
            src: Operand::Pseudo(new),
          },
        );
        Ok(Operand::Pseudo(old))
      }
    }
  }

  /// An lvalue lowers to the slot it denotes; a prefix target applies
  /// its increment on the way.
  fn lower_lvalue(&mut self, lvalue: &LValue) -> Result<Pseudo, CompileError> {
    let range = lvalue.range;
    match &lvalue.kind {
      LValueKind::Var(name) => match self.body.lookup(name) {
        Some(pseudo) => Ok(pseudo.clone()),
        None => Err(CompileError::semantic(
          range,
          format!("variable `{}` not found", name),
        )),
      },
      LValueKind::Prefix(op, target) => {
        let dest = self.lower_lvalue(target)?;
        self.body.push(
          range,
          Instr::Binary {
            dest: dest.clone(),
            op: op.binop(),
            lhs: Operand::Pseudo(dest.clone()),
            rhs: Operand::Imm(1),
          },
        );
        Ok(dest)
      }
    }
  }

  fn make_label(&self, index: u32, tag: &str) -> Rc<str> {
    format!(".{}.{}.{}", self.body.name, index, tag).into()
  }
}

fn loop_label(label: &str, tag: &str) -> Rc<str> {
  format!(".{}.{}.loop", label, tag).into()
}
