use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Var,
    Lambda,
    True,
    False,
    /// Double-quoted field or tag reference.
    Reference(String),
    Str { value: String, triple: bool },
    Int(i64),
    Float(f64),
    Duration(String),
    Regex(String),
    Pipe,
    Dot,
    At,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    RegexEq,
    RegexNeq,
    And,
    Or,
    Not,
    Eof,
}

impl Token {
    fn ends_value(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::True
                | Token::False
                | Token::Reference(_)
                | Token::Str { .. }
                | Token::Int(_)
                | Token::Float(_)
                | Token::Duration(_)
                | Token::Regex(_)
                | Token::RParen
                | Token::RBracket
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Token::Ident(name) => return f.write_str(name),
            Token::Reference(name) => return write!(f, "\"{name}\""),
            Token::Str { value, .. } => return write!(f, "'{value}'"),
            Token::Int(i) => return write!(f, "{i}"),
            Token::Float(n) => return write!(f, "{n}"),
            Token::Duration(d) => return f.write_str(d),
            Token::Regex(r) => return write!(f, "/{r}/"),
            Token::Var => "var",
            Token::Lambda => "lambda:",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Pipe => "|",
            Token::Dot => ".",
            Token::At => "@",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Eq => "==",
            Token::Neq => "!=",
            Token::Lt => "<",
            Token::Lte => "<=",
            Token::Gt => ">",
            Token::Gte => ">=",
            Token::RegexEq => "=~",
            Token::RegexNeq => "!~",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "!",
            Token::Eof => "EOF",
        };
        f.write_str(s)
    }
}

/// Split a TICKscript into tokens paired with their 1-based line numbers.
/// Comments are discarded. The final token is always `Token::Eof`.
pub fn tokenize(script: &str) -> Result<Vec<(Token, usize)>> {
    let mut lexer = Lexer {
        chars: script.chars().collect(),
        pos: 0,
        line: 1,
    };
    let mut out: Vec<(Token, usize)> = Vec::new();

    loop {
        lexer.skip_whitespace();
        let line = lexer.line;
        let regex_allowed = out.last().map_or(true, |(t, _)| !t.ends_value());

        let token = lexer.next(regex_allowed)?;
        let eof = token == Token::Eof;
        out.push((token, line));

        if eof {
            return Ok(out);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.bump(), None | Some('\n')) {}
                }
                _ => return,
            }
        }
    }

    fn next(&mut self, regex_allowed: bool) -> Result<Token> {
        let line = self.line;
        let Some(c) = self.bump() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '|' => Token::Pipe,
            '.' => Token::Dot,
            '@' => Token::At,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '%' => Token::Percent,
            '=' => match self.peek() {
                Some('=') => self.bumped(Token::Eq),
                Some('~') => self.bumped(Token::RegexEq),
                _ => Token::Assign,
            },
            '!' => match self.peek() {
                Some('=') => self.bumped(Token::Neq),
                Some('~') => self.bumped(Token::RegexNeq),
                _ => Token::Not,
            },
            '<' => match self.peek() {
                Some('=') => self.bumped(Token::Lte),
                _ => Token::Lt,
            },
            '>' => match self.peek() {
                Some('=') => self.bumped(Token::Gte),
                _ => Token::Gt,
            },
            '/' if regex_allowed => Token::Regex(self.regex(line)?),
            '/' => Token::Slash,
            '"' => Token::Reference(self.quoted('"', "reference", line)?),
            '\'' if self.starts_with("''") => {
                self.pos += 2;
                Token::Str {
                    value: self.triple(line)?,
                    triple: true,
                }
            }
            '\'' => Token::Str {
                value: self.quoted('\'', "string", line)?,
                triple: false,
            },
            c if c.is_ascii_digit() => self.number(c)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                    word.push(c);
                    self.pos += 1;
                }
                match word.as_str() {
                    "var" => Token::Var,
                    "TRUE" => Token::True,
                    "FALSE" => Token::False,
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "lambda" if self.peek() == Some(':') => self.bumped(Token::Lambda),
                    _ => Token::Ident(word),
                }
            }
            c => {
                return Err(Error::Unexpected {
                    found: c.to_string(),
                    expected: "a token".to_string(),
                    line,
                })
            }
        };
        Ok(token)
    }

    fn bumped(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn number(&mut self, first: char) -> Result<Token> {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            text.push(c);
            self.pos += 1;
        }

        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            text.push('.');
            self.pos += 1;
            while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                text.push(c);
                self.pos += 1;
            }
            return text
                .parse()
                .map(Token::Float)
                .map_err(|_| Error::InvalidNumber(text));
        }

        if self.peek().map_or(false, |c| c.is_alphabetic()) {
            while let Some(c) = self.peek().filter(|c| c.is_alphanumeric()) {
                text.push(c);
                self.pos += 1;
            }
            influxql::parse_duration(&text)?;
            return Ok(Token::Duration(text));
        }

        text.parse()
            .map(Token::Int)
            .map_err(|_| Error::InvalidNumber(text))
    }

    fn quoted(&mut self, delim: char, what: &'static str, line: usize) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::Unterminated { what, line }),
                Some(c) if c == delim => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(Error::Unterminated { what, line }),
                    Some(c) if c == delim || c == '\\' => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn triple(&mut self, line: usize) -> Result<String> {
        let mut out = String::new();
        loop {
            if self.starts_with("'''") {
                self.pos += 3;
                return Ok(out);
            }
            match self.bump() {
                None => {
                    return Err(Error::Unterminated {
                        what: "string",
                        line,
                    })
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn regex(&mut self, line: usize) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(Error::Unterminated { what: "regex", line }),
                Some('/') => return Ok(out),
                Some('\\') if self.peek() == Some('/') => {
                    self.pos += 1;
                    out.push('/');
                }
                Some(c) => out.push(c),
            }
        }
    }
}
