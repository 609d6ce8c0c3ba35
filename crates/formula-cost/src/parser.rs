use crate::error::{CostError, CostResult};
use crate::names::{scan_word, starts_word, WordKind};

/// Maximum combined nesting of parentheses and unary operators.
const MAX_NESTING: usize = 256;

/// Parsed cost formula.
///
/// Identifiers stay as leaves and are looked up in the symbol table at evaluation time; the
/// formula text is never rewritten.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Ident {
        name: String,
        offset: usize,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        offset: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Returns the next token and the byte offset it starts at.
    fn next_token(&mut self) -> CostResult<(Token, usize)> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(ch) = self.input[start..].chars().next() else {
            return Ok((Token::Eof, start));
        };

        if starts_word(self.input, start) {
            let word = scan_word(self.input, start);
            self.pos = word.end;
            let token = match word.kind {
                WordKind::Number => {
                    let n: f64 = word.text.parse().map_err(|_| {
                        CostError::syntax(format!("invalid number {:?}", word.text), start)
                    })?;
                    if !n.is_finite() {
                        return Err(CostError::syntax(
                            format!("number {:?} is out of range", word.text),
                            start,
                        ));
                    }
                    Token::Number(n)
                }
                WordKind::Name => Token::Ident(word.text.to_string()),
            };
            return Ok((token, start));
        }

        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(CostError::syntax(
                    format!("unexpected character {other:?}"),
                    start,
                ))
            }
        };
        self.pos += ch.len_utf8();
        Ok((token, start))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    lookahead_pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> CostResult<Self> {
        let mut lexer = Lexer::new(input);
        let (lookahead, lookahead_pos) = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            lookahead_pos,
            depth: 0,
        })
    }

    fn bump(&mut self) -> CostResult<Token> {
        let (next, next_pos) = self.lexer.next_token()?;
        self.lookahead_pos = next_pos;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn parse(&mut self) -> CostResult<Expr> {
        if self.lookahead == Token::Eof {
            return Err(CostError::syntax("empty formula", self.lookahead_pos));
        }
        let expr = self.parse_expr(0)?;
        if self.lookahead != Token::Eof {
            return Err(CostError::syntax(
                format!("unexpected {}", describe(&self.lookahead)),
                self.lookahead_pos,
            ));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self, min_prec: u8) -> CostResult<Expr> {
        let mut left = self.parse_prefix()?;
        while let Some((op, prec)) = self.infix_binding_power() {
            if prec < min_prec {
                break;
            }
            let offset = self.lookahead_pos;
            self.bump()?;
            // `prec + 1` on the right keeps same-precedence operators left-associative.
            let right = self.parse_expr(prec + 1)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                offset,
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> CostResult<Expr> {
        let offset = self.lookahead_pos;
        match self.bump()? {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Ident(name) => Ok(Expr::Ident { name, offset }),
            Token::Minus => Ok(Expr::UnaryOp {
                op: UnaryOp::Negate,
                expr: Box::new(self.nested(offset, |p| p.parse_expr(3))?),
            }),
            Token::Plus => Ok(Expr::UnaryOp {
                op: UnaryOp::Plus,
                expr: Box::new(self.nested(offset, |p| p.parse_expr(3))?),
            }),
            Token::LParen => {
                let inner = self.nested(offset, |p| p.parse_expr(0))?;
                if self.lookahead != Token::RParen {
                    return Err(CostError::syntax(
                        format!("expected ')', found {}", describe(&self.lookahead)),
                        self.lookahead_pos,
                    ));
                }
                self.bump()?;
                Ok(inner)
            }
            other => Err(CostError::syntax(
                format!("expected a value, found {}", describe(&other)),
                offset,
            )),
        }
    }

    /// Runs `f` one nesting level deeper; `offset` is the token that opened the level.
    fn nested(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> CostResult<Expr>,
    ) -> CostResult<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(CostError::syntax(
                format!("expression nesting exceeds the {MAX_NESTING}-level limit"),
                offset,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        match self.lookahead {
            Token::Plus => Some((BinaryOp::Add, 1)),
            Token::Minus => Some((BinaryOp::Subtract, 1)),
            Token::Star => Some((BinaryOp::Multiply, 2)),
            Token::Slash => Some((BinaryOp::Divide, 2)),
            _ => None,
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Ident(name) => format!("name {name:?}"),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Eof => "end of formula".to_string(),
    }
}

pub fn parse(input: &str) -> CostResult<Expr> {
    Parser::new(input)?.parse()
}
