use crate::{Error, Result};

/// Keywords which may not be used as bare identifiers.
pub(crate) const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "FILL", "ORDER", "LIMIT", "OFFSET", "SLIMIT",
    "SOFFSET", "AS", "AND", "OR", "INTO", "TZ", "ASC", "DESC",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident { name: String, quoted: bool },
    Str(String),
    Integer(i64),
    Number(f64),
    Duration(String),
    Regex(String),
    /// Dashboard template variable, like `:interval:`.
    Template(String),
    Comma,
    Semicolon,
    Dot,
    DoubleColon,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    EqRegex,
    NeqRegex,
    Eof,
}

impl Token {
    /// Is this an unquoted identifier matching `keyword`, ignoring case?
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident { name, quoted: false } if name.eq_ignore_ascii_case(keyword))
    }

    fn is_reserved(&self) -> bool {
        RESERVED.iter().any(|kw| self.is_keyword(kw))
    }

    // A slash directly after a token which ends a value is division.
    // Anywhere else it opens a regex.
    fn ends_value(&self) -> bool {
        match self {
            Token::Ident { .. } => !self.is_reserved(),
            Token::Str(_)
            | Token::Integer(_)
            | Token::Number(_)
            | Token::Duration(_)
            | Token::Regex(_)
            | Token::Template(_)
            | Token::RParen
            | Token::Star => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident { name, quoted: true } => write!(f, "\"{name}\""),
            Token::Ident { name, .. } => f.write_str(name),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Integer(i) => write!(f, "{i}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Duration(d) => f.write_str(d),
            Token::Regex(r) => write!(f, "/{r}/"),
            Token::Template(t) => write!(f, ":{t}:"),
            Token::Comma => f.write_str(","),
            Token::Semicolon => f.write_str(";"),
            Token::Dot => f.write_str("."),
            Token::DoubleColon => f.write_str("::"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::BitAnd => f.write_str("&"),
            Token::BitOr => f.write_str("|"),
            Token::BitXor => f.write_str("^"),
            Token::Eq => f.write_str("="),
            Token::Neq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Lte => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Gte => f.write_str(">="),
            Token::EqRegex => f.write_str("=~"),
            Token::NeqRegex => f.write_str("!~"),
            Token::Eof => f.write_str("EOF"),
        }
    }
}

/// Split `input` into tokens, each paired with its character offset.
/// The final token is always `Token::Eof`.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut out: Vec<(Token, usize)> = Vec::new();

    loop {
        lexer.skip_whitespace();
        let offset = lexer.pos;
        let regex_allowed = out.last().map(|(t, _)| !t.ends_value()).unwrap_or(true);

        let token = lexer.next(regex_allowed)?;
        let eof = token == Token::Eof;
        out.push((token, offset));

        if eof {
            return Ok(out);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('-') if self.peek_at(1) == Some('-') => {
                    while !matches!(self.bump(), None | Some('\n')) {}
                }
                _ => return,
            }
        }
    }

    fn next(&mut self, regex_allowed: bool) -> Result<Token> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '%' => Token::Percent,
            '&' => Token::BitAnd,
            '|' => Token::BitOr,
            '^' => Token::BitXor,
            '=' => match self.peek() {
                Some('~') => self.bumped(Token::EqRegex),
                Some('=') => self.bumped(Token::Eq),
                _ => Token::Eq,
            },
            '!' => match self.peek() {
                Some('=') => self.bumped(Token::Neq),
                Some('~') => self.bumped(Token::NeqRegex),
                _ => return Err(self.unexpected("!", "!= or !~", start)),
            },
            '<' => match self.peek() {
                Some('=') => self.bumped(Token::Lte),
                Some('>') => self.bumped(Token::Neq),
                _ => Token::Lt,
            },
            '>' => match self.peek() {
                Some('=') => self.bumped(Token::Gte),
                _ => Token::Gt,
            },
            ':' => match self.peek() {
                Some(':') => self.bumped(Token::DoubleColon),
                _ => self.template(start)?,
            },
            '/' if regex_allowed => Token::Regex(self.delimited('/', "regex", start)?),
            '/' => Token::Slash,
            '\'' => Token::Str(self.delimited('\'', "string", start)?),
            '"' => Token::Ident {
                name: self.delimited('"', "identifier", start)?,
                quoted: true,
            },
            '.' if self.peek().map_or(false, |c| c.is_ascii_digit()) => {
                self.pos = start;
                self.number()?
            }
            '.' => Token::Dot,
            c if c.is_ascii_digit() => {
                self.pos = start;
                self.number()?
            }
            c if is_ident_start(c) => {
                let mut name = String::from(c);
                while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
                    name.push(c);
                    self.pos += 1;
                }
                Token::Ident {
                    name,
                    quoted: false,
                }
            }
            c => return Err(self.unexpected(&c.to_string(), "a token", start)),
        };
        Ok(token)
    }

    fn bumped(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    // Integers, floats, and duration literals. A digit run followed by
    // letters is a duration, and must be valid as one.
    fn number(&mut self) -> Result<Token> {
        let mut text = String::new();
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
            if text.starts_with('.') {
                text.insert(0, '0');
            }
            return text
                .parse::<f64>()
                .map(Token::Number)
                .map_err(|_| Error::InvalidNumber(text));
        }

        if self.peek().map_or(false, is_ident_char) {
            while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
                text.push(c);
                self.pos += 1;
            }
            crate::parse_duration(&text)?;
            return Ok(Token::Duration(text));
        }

        text.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| Error::InvalidNumber(text))
    }

    fn template(&mut self, start: usize) -> Result<Token> {
        let mut name = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
            name.push(c);
            self.pos += 1;
        }
        if name.is_empty() || self.bump() != Some(':') {
            return Err(self.unexpected(":", "a template variable", start));
        }
        Ok(Token::Template(name))
    }

    // Read through the closing `delim`. An escaped delimiter is unescaped.
    // Within strings and identifiers, escaped backslashes and newlines are
    // unescaped too. Regexes keep all other escapes verbatim.
    fn delimited(&mut self, delim: char, what: &'static str, start: usize) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::Unterminated { what, offset: start }),
                Some(c) if c == delim => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(Error::Unterminated { what, offset: start }),
                    Some(c) if c == delim => out.push(c),
                    Some('\\') if delim != '/' => out.push('\\'),
                    Some('n') if delim != '/' => out.push('\n'),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some('\n') if delim != '/' => {
                    return Err(Error::Unterminated { what, offset: start })
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn unexpected(&self, found: &str, expected: &str, offset: usize) -> Error {
        Error::Unexpected {
            found: found.to_string(),
            expected: expected.to_string(),
            offset,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    fn ident(name: &str) -> Token {
        Token::Ident {
            name: name.to_string(),
            quoted: false,
        }
    }

    #[test]
    fn test_select_tokens() {
        assert_eq!(
            tokens(r#"SELECT mean("usage") FROM cpu WHERE time > now() - 1h"#),
            vec![
                ident("SELECT"),
                ident("mean"),
                Token::LParen,
                Token::Ident {
                    name: "usage".to_string(),
                    quoted: true
                },
                Token::RParen,
                ident("FROM"),
                ident("cpu"),
                ident("WHERE"),
                ident("time"),
                Token::Gt,
                ident("now"),
                Token::LParen,
                Token::RParen,
                Token::Minus,
                Token::Duration("1h".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        assert_eq!(
            tokens(r"FROM /^cpu\d/"),
            vec![ident("FROM"), Token::Regex(r"^cpu\d".to_string()), Token::Eof]
        );
        assert_eq!(
            tokens(r"host =~ /a\/b/"),
            vec![
                ident("host"),
                Token::EqRegex,
                Token::Regex("a/b".to_string()),
                Token::Eof
            ]
        );
        assert_eq!(
            tokens("x / 2"),
            vec![ident("x"), Token::Slash, Token::Integer(2), Token::Eof]
        );
        assert_eq!(
            tokens("max(x) / 2"),
            vec![
                ident("max"),
                Token::LParen,
                ident("x"),
                Token::RParen,
                Token::Slash,
                Token::Integer(2),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_literals_and_operators() {
        assert_eq!(
            tokens("'it\\'s' 1.5 .25 42 1h30m :interval: :: == <> != !~ <= >= -- trailing"),
            vec![
                Token::Str("it's".to_string()),
                Token::Number(1.5),
                Token::Number(0.25),
                Token::Integer(42),
                Token::Duration("1h30m".to_string()),
                Token::Template("interval".to_string()),
                Token::DoubleColon,
                Token::Eq,
                Token::Neq,
                Token::Neq,
                Token::NeqRegex,
                Token::Lte,
                Token::Gte,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_errors() {
        assert_eq!(
            tokenize("'open"),
            Err(Error::Unterminated {
                what: "string",
                offset: 0
            })
        );
        assert_eq!(
            tokenize("a = 10x"),
            Err(Error::InvalidDuration("10x".to_string()))
        );
        assert_eq!(
            tokenize("99999999999999999999"),
            Err(Error::InvalidNumber("99999999999999999999".to_string()))
        );
        assert!(matches!(tokenize("a ! b"), Err(Error::Unexpected { .. })));
    }
}
