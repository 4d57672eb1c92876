use crate::lexer::{self, AmbiguousOp, Keyword, Symbol, Token};
use crate::{
  BinOp, Block, BlockItem, Declaration, Exp, ExpKind, ForInit, FunctionDef,
  LValue, LValueKind, Program, Stmt, StmtKind, UnOp,
};
use support::{CompileError, Range};

pub type Result<T> = std::result::Result<T, CompileError>;

/// Parse a whole translation unit: one `int <name>() { ... }`.
pub fn parse<S: AsRef<str>>(input: S) -> Result<Program> {
  let tokens = lexer::lex(input.as_ref())?;
  let mut parser = Parser { tokens, pos: 0 };
  let main = parser.parse_function()?;
  match parser.peek() {
    (_, Token::Eof) => {}
    (range, token) => {
      return Err(CompileError::syntax(
        *range,
        format!("expected end of input but got `{}`", token),
      ));
    }
  }
  Ok(Program { main })
}

struct Parser {
  tokens: Vec<(Range, Token)>,
  pos: usize,
}

/// Binding strength of an infix symbol. Left-associative levels
/// recurse with `prec + 1`; `?:` and the assignments are
/// right-associative and recurse with their own level.
fn precedence(symbol: &Symbol) -> Option<u8> {
  match symbol {
    Symbol::Binary(op) => Some(match op {
      BinOp::Mul | BinOp::Div | BinOp::Rem => 50,
      BinOp::Add | BinOp::Sub => 45,
      BinOp::Shl | BinOp::Shr => 40,
      BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 35,
      BinOp::Eq | BinOp::Ne => 30,
      BinOp::BitAnd => 25,
      BinOp::BitXor => 20,
      BinOp::BitOr => 15,
      BinOp::LogAnd => 10,
      BinOp::LogOr => 5,
    }),
    Symbol::Ambiguous(_) => Some(45),
    Symbol::Question => Some(3),
    Symbol::Assign | Symbol::Compound(_) => Some(1),
    _ => None,
  }
}

impl Parser {
  fn peek(&self) -> &(Range, Token) {
    // The token stream always ends with Eof; stay on it.
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn advance(&mut self) -> (Range, Token) {
    let entry = self.peek().clone();
    if self.pos < self.tokens.len() - 1 {
      self.pos += 1;
    }
    entry
  }

  fn eat_symbol(&mut self, symbol: Symbol) -> Option<Range> {
    match self.peek() {
      (range, Token::Symbol(s)) if *s == symbol => {
        let range = *range;
        self.advance();
        Some(range)
      }
      _ => None,
    }
  }

  fn expect_symbol(&mut self, symbol: Symbol) -> Result<Range> {
    self.eat_symbol(symbol).ok_or_else(|| {
      let (range, token) = self.peek();
      CompileError::syntax(
        *range,
        format!("expected `{}` but got `{}`", symbol, token),
      )
    })
  }

  fn expect_keyword(&mut self, keyword: Keyword) -> Result<Range> {
    match self.peek() {
      (range, Token::Keyword(k)) if *k == keyword => {
        let range = *range;
        self.advance();
        Ok(range)
      }
      (range, token) => Err(CompileError::syntax(
        *range,
        format!("expected `{}` but got `{}`", keyword, token),
      )),
    }
  }

  fn expect_ident(&mut self) -> Result<(Range, String)> {
    match self.peek() {
      (range, Token::Ident(name)) => {
        let entry = (*range, name.clone());
        self.advance();
        Ok(entry)
      }
      (range, token) => Err(CompileError::syntax(
        *range,
        format!("expected identifier but got `{}`", token),
      )),
    }
  }

  fn parse_function(&mut self) -> Result<FunctionDef> {
    let start = self.expect_keyword(Keyword::Int)?;
    let (_, name) = self.expect_ident()?;
    self.expect_symbol(Symbol::OpenParen)?;
    self.expect_symbol(Symbol::CloseParen)?;
    let (body, end) = self.parse_block()?;
    Ok(FunctionDef {
      range: start.to(end),
      name,
      body,
    })
  }

  /// `{ item* }`; returns the block and the range of the braces.
  fn parse_block(&mut self) -> Result<(Block, Range)> {
    let open = self.expect_symbol(Symbol::OpenBrace)?;
    let mut items = vec![];
    loop {
      match self.peek() {
        (_, Token::Symbol(Symbol::CloseBrace)) => break,
        (range, Token::Eof) => {
          return Err(CompileError::syntax(
            *range,
            "expected `}` but got `end of input`",
          ));
        }
        _ => items.push(self.parse_block_item()?),
      }
    }
    let close = self.expect_symbol(Symbol::CloseBrace)?;
    Ok((Block { items }, open.to(close)))
  }

  fn parse_block_item(&mut self) -> Result<BlockItem> {
    if matches!(self.peek().1, Token::Keyword(Keyword::Int)) {
      let decl = self.parse_declaration()?;
      self.expect_symbol(Symbol::Semicolon)?;
      Ok(BlockItem::Decl(decl))
    } else {
      Ok(BlockItem::Stmt(self.parse_statement()?))
    }
  }

  /// `int <name> [= <exp>]`; the terminating `;` belongs to the
  /// caller, because a `for` init reuses this production.
  fn parse_declaration(&mut self) -> Result<Declaration> {
    let start = self.expect_keyword(Keyword::Int)?;
    let (name_range, name) = self.expect_ident()?;
    if let Some(init) = self
      .eat_symbol(Symbol::Assign)
      .map(|_| self.parse_exp(0))
      .transpose()?
    {
      Ok(Declaration {
        range: start.to(init.range),
        name,
        init: Some(init),
      })
    } else {
      Ok(Declaration {
        range: start.to(name_range),
        name,
        init: None,
      })
    }
  }

  fn parse_statement(&mut self) -> Result<Stmt> {
    let (start, token) = self.peek().clone();
    match token {
      Token::Keyword(Keyword::Return) => {
        self.advance();
        if let Some(end) = self.eat_symbol(Symbol::Semicolon) {
          return Ok(Stmt {
            range: start.to(end),
            kind: StmtKind::Return(None),
          });
        }
        let exp = self.parse_exp(0)?;
        let end = self.expect_symbol(Symbol::Semicolon)?;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::Return(Some(exp)),
        })
      }
      Token::Keyword(Keyword::If) => {
        self.advance();
        self.expect_symbol(Symbol::OpenParen)?;
        let cond = self.parse_exp(0)?;
        self.expect_symbol(Symbol::CloseParen)?;
        let then = Box::new(self.parse_statement()?);
        // The dangling else binds to the nearest open `if`.
        let els = if matches!(self.peek().1, Token::Keyword(Keyword::Else)) {
          self.advance();
          Some(Box::new(self.parse_statement()?))
        } else {
          None
        };
        let end = els.as_ref().map(|s| s.range).unwrap_or(then.range);
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::If { cond, then, els },
        })
      }
      Token::Keyword(Keyword::Else) => Err(CompileError::syntax(
        start,
        "`else` without a preceding `if`",
      )),
      Token::Keyword(Keyword::While) => {
        self.advance();
        self.expect_symbol(Symbol::OpenParen)?;
        let cond = self.parse_exp(0)?;
        self.expect_symbol(Symbol::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        let end = body.range;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::While {
            cond,
            body,
            label: String::new(),
            is_do_while: false,
          },
        })
      }
      Token::Keyword(Keyword::Do) => {
        self.advance();
        let body = Box::new(self.parse_statement()?);
        self.expect_keyword(Keyword::While)?;
        self.expect_symbol(Symbol::OpenParen)?;
        let cond = self.parse_exp(0)?;
        self.expect_symbol(Symbol::CloseParen)?;
        let end = self.expect_symbol(Symbol::Semicolon)?;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::While {
            cond,
            body,
            label: String::new(),
            is_do_while: true,
          },
        })
      }
      Token::Keyword(Keyword::For) => {
        self.advance();
        self.expect_symbol(Symbol::OpenParen)?;
        let init = self.parse_for_init()?;
        let cond = if matches!(self.peek().1, Token::Symbol(Symbol::Semicolon)) {
          None
        } else {
          Some(self.parse_exp(0)?)
        };
        self.expect_symbol(Symbol::Semicolon)?;
        let step = if matches!(self.peek().1, Token::Symbol(Symbol::CloseParen)) {
          None
        } else {
          Some(self.parse_exp(0)?)
        };
        self.expect_symbol(Symbol::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        let end = body.range;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::For {
            init,
            cond,
            step,
            body,
            label: String::new(),
          },
        })
      }
      Token::Keyword(Keyword::Break) => {
        self.advance();
        let end = self.expect_symbol(Symbol::Semicolon)?;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::Break {
            label: String::new(),
          },
        })
      }
      Token::Keyword(Keyword::Continue) => {
        self.advance();
        let end = self.expect_symbol(Symbol::Semicolon)?;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::Continue {
            label: String::new(),
            is_for: false,
          },
        })
      }
      Token::Keyword(Keyword::Int) => Err(CompileError::syntax(
        start,
        "a declaration is not a statement here",
      )),
      Token::Symbol(Symbol::OpenBrace) => {
        let (block, range) = self.parse_block()?;
        Ok(Stmt {
          range,
          kind: StmtKind::Compound(block),
        })
      }
      Token::Symbol(Symbol::Semicolon) => {
        self.advance();
        Ok(Stmt {
          range: start,
          kind: StmtKind::Null,
        })
      }
      _ => {
        let exp = self.parse_exp(0)?;
        let end = self.expect_symbol(Symbol::Semicolon)?;
        Ok(Stmt {
          range: start.to(end),
          kind: StmtKind::Expression(exp),
        })
      }
    }
  }

  /// The first `for` header slot, including its terminating `;`.
  fn parse_for_init(&mut self) -> Result<ForInit> {
    match self.peek().1 {
      Token::Keyword(Keyword::Int) => {
        let decl = self.parse_declaration()?;
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(ForInit::Decl(decl))
      }
      Token::Symbol(Symbol::Semicolon) => {
        self.advance();
        Ok(ForInit::None)
      }
      _ => {
        let exp = self.parse_exp(0)?;
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(ForInit::Exp(exp))
      }
    }
  }

  /// Precedence climbing over the infix operator table.
  fn parse_exp(&mut self, min_prec: u8) -> Result<Exp> {
    let mut left = self.parse_unary()?;
    loop {
      let (symbol, prec) = match &self.peek().1 {
        Token::Symbol(s) => match precedence(s) {
          Some(prec) => (*s, prec),
          None => break,
        },
        _ => break,
      };
      if prec < min_prec {
        break;
      }
      self.advance();
      left = match symbol {
        Symbol::Assign => {
          let target = into_lvalue(left)?;
          let value = self.parse_exp(prec)?;
          Exp {
            range: target.range.to(value.range),
            kind: ExpKind::Assignment {
              target: Box::new(target),
              value: Box::new(value),
            },
          }
        }
        Symbol::Compound(op) => {
          // `x OP= e` becomes `x = x OP e`; the second `x` is a
          // structural clone of the lvalue subtree.
          let target = into_lvalue(left)?;
          let read = lvalue_exp(target.clone());
          let rhs = self.parse_exp(prec)?;
          let range = target.range.to(rhs.range);
          let value = Exp {
            range: read.range.to(rhs.range),
            kind: ExpKind::Binary(op, Box::new(read), Box::new(rhs)),
          };
          Exp {
            range,
            kind: ExpKind::Assignment {
              target: Box::new(target),
              value: Box::new(value),
            },
          }
        }
        Symbol::Question => {
          let then = self.parse_exp(0)?;
          self.expect_symbol(Symbol::Colon)?;
          let els = self.parse_exp(prec)?;
          Exp {
            range: left.range.to(els.range),
            kind: ExpKind::Conditional {
              cond: Box::new(left),
              then: Box::new(then),
              els: Box::new(els),
            },
          }
        }
        Symbol::Binary(op) => {
          let right = self.parse_exp(prec + 1)?;
          Exp {
            range: left.range.to(right.range),
            kind: ExpKind::Binary(op, Box::new(left), Box::new(right)),
          }
        }
        Symbol::Ambiguous(amb) => {
          let op = match amb {
            AmbiguousOp::Plus => BinOp::Add,
            AmbiguousOp::Minus => BinOp::Sub,
          };
          let right = self.parse_exp(prec + 1)?;
          Exp {
            range: left.range.to(right.range),
            kind: ExpKind::Binary(op, Box::new(left), Box::new(right)),
          }
        }
        _ => unreachable!(),
      };
    }
    Ok(left)
  }

  fn parse_unary(&mut self) -> Result<Exp> {
    let (start, token) = self.peek().clone();
    match token {
      Token::Symbol(Symbol::Unary(op)) => {
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Exp {
          range: start.to(operand.range),
          kind: ExpKind::Unary(op, Box::new(operand)),
        })
      }
      Token::Symbol(Symbol::Ambiguous(amb)) => {
        self.advance();
        let op = match amb {
          AmbiguousOp::Plus => UnOp::Plus,
          AmbiguousOp::Minus => UnOp::Neg,
        };
        let operand = self.parse_unary()?;
        Ok(Exp {
          range: start.to(operand.range),
          kind: ExpKind::Unary(op, Box::new(operand)),
        })
      }
      Token::Symbol(Symbol::IncDec(op)) => {
        self.advance();
        let operand = self.parse_unary()?;
        let range = start.to(operand.range);
        let target = into_lvalue(operand)?;
        Ok(Exp {
          range,
          kind: ExpKind::Prefix(op, Box::new(target)),
        })
      }
      _ => self.parse_postfix(),
    }
  }

  /// Postfix `++`/`--` bind to the immediately preceding primary.
  fn parse_postfix(&mut self) -> Result<Exp> {
    let mut exp = self.parse_primary()?;
    while let Token::Symbol(Symbol::IncDec(op)) = self.peek().1 {
      let (op_range, _) = self.advance();
      let range = exp.range.to(op_range);
      let target = into_lvalue(exp)?;
      exp = Exp {
        range,
        kind: ExpKind::Postfix(op, Box::new(target)),
      };
    }
    Ok(exp)
  }

  fn parse_primary(&mut self) -> Result<Exp> {
    let (range, token) = self.peek().clone();
    match token {
      Token::Number(value) => {
        self.advance();
        Ok(Exp {
          range,
          kind: ExpKind::Const(value as i64),
        })
      }
      Token::Ident(name) => {
        self.advance();
        Ok(Exp {
          range,
          kind: ExpKind::Var(name),
        })
      }
      Token::Symbol(Symbol::OpenParen) => {
        self.advance();
        let inner = self.parse_exp(0)?;
        let close = self.expect_symbol(Symbol::CloseParen)?;
        Ok(Exp {
          range: range.to(close),
          kind: inner.kind,
        })
      }
      token => Err(CompileError::syntax(
        range,
        format!("expected expression but got `{}`", token),
      )),
    }
  }
}

/// The fallible expression-to-lvalue conversion; anything but a
/// variable or a prefix increment denotes no storage location.
fn into_lvalue(exp: Exp) -> Result<LValue> {
  match exp.kind {
    ExpKind::Var(name) => Ok(LValue {
      range: exp.range,
      kind: LValueKind::Var(name),
    }),
    ExpKind::Prefix(op, target) => Ok(LValue {
      range: exp.range,
      kind: LValueKind::Prefix(op, target),
    }),
    _ => Err(CompileError::semantic(exp.range, "expected an lvalue")),
  }
}

/// Reads an lvalue back as an expression (the right-hand occurrence
/// introduced by compound-assignment rewriting).
fn lvalue_exp(lvalue: LValue) -> Exp {
  match lvalue.kind {
    LValueKind::Var(name) => Exp {
      range: lvalue.range,
      kind: ExpKind::Var(name),
    },
    LValueKind::Prefix(op, target) => Exp {
      range: lvalue.range,
      kind: ExpKind::Prefix(op, target),
    },
  }
}
