use crate::ast::*;
use crate::lexer::{tokenize, Token};
use crate::{Error, Result};

/// Nesting depth of groupings, lambdas, lists, calls and unary operators
/// beyond which parsing fails.
pub const MAX_DEPTH: usize = 256;
/// Number of binary operators an operand may be nested under.
pub const MAX_OPERATORS: usize = 1024;

/// Parse a TICKscript into its Program.
#[tracing::instrument(level = "debug", skip_all, err)]
pub fn parse(script: &str) -> Result<Program> {
    let mut parser = Parser {
        tokens: tokenize(script)?,
        pos: 0,
        depth: 0,
        operators: 0,
    };

    let mut statements = Vec::new();
    while parser.peek() != &Token::Eof {
        statements.push(parser.statement()?);
    }
    Ok(Program { statements })
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token != Token::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let (found, line) = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        Error::Unexpected {
            found: found.to_string(),
            expected: expected.to_string(),
            line: *line,
        }
    }

    fn too_deep(&self, limit: usize) -> Error {
        Error::TooDeep {
            limit,
            line: self.tokens[self.pos.min(self.tokens.len() - 1)].1,
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.eat(&Token::Var) {
            let name = self.ident()?;
            self.expect(&Token::Assign)?;
            let value = self.expr()?;
            return Ok(Statement::Declaration { name, value });
        }
        Ok(Statement::Expression(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr> {
        self.binary(1)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        // Each operator nests `lhs` one level deeper.
        let mut nested = 0;

        while let Some(op) = self.binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            self.operators += 1;
            nested += 1;
            if self.operators > MAX_OPERATORS {
                return Err(self.too_deep(MAX_OPERATORS));
            }
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.operators -= nested;
        Ok(lhs)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Mod,
            Token::Eq => BinaryOp::Eq,
            Token::Neq => BinaryOp::Neq,
            Token::Lt => BinaryOp::Lt,
            Token::Lte => BinaryOp::Lte,
            Token::Gt => BinaryOp::Gt,
            Token::Gte => BinaryOp::Gte,
            Token::RegexEq => BinaryOp::RegexEq,
            Token::RegexNeq => BinaryOp::RegexNeq,
            Token::And => BinaryOp::And,
            Token::Or => BinaryOp::Or,
            _ => return None,
        })
    }

    fn unary(&mut self) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep(MAX_DEPTH));
        }
        let expr = self.operand();
        self.depth -= 1;
        expr
    }

    fn operand(&mut self) -> Result<Expr> {
        let op = if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else if self.eat(&Token::Not) {
            UnaryOp::Not
        } else {
            return self.primary();
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.unary()?),
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let expr = match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                if self.peek() == &Token::LParen {
                    return Ok(Expr::Call {
                        name,
                        args: self.args()?,
                    });
                }
                return self.chain(Expr::Identifier(name));
            }
            Token::Reference(name) => Expr::Reference(name),
            Token::Str { value, triple } => Expr::String { value, triple },
            Token::Int(i) => Expr::Int(i),
            Token::Float(n) => Expr::Float(n),
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Duration(literal) => Expr::Duration(literal),
            Token::Regex(r) => Expr::Regex(r),
            Token::Star => Expr::Star,
            Token::Lambda => {
                self.advance();
                return Ok(Expr::Lambda(Box::new(self.expr()?)));
            }
            Token::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::Paren(Box::new(inner)));
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                return Ok(Expr::List(items));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn chain(&mut self, source: Expr) -> Result<Expr> {
        let mut links = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Pipe => ChainOp::Pipe,
                Token::Dot => ChainOp::Property,
                Token::At => ChainOp::Udf,
                _ => break,
            };
            self.advance();
            let name = self.ident()?;
            let args = self.args()?;
            links.push(Link { op, name, args });
        }

        if links.is_empty() {
            Ok(source)
        } else {
            Ok(Expr::Chain {
                source: Box::new(source),
                links,
            })
        }
    }
}
