use crate::ast::*;
use crate::lexer::{tokenize, Token};
use crate::{Error, Result};

// Leading keywords of InfluxQL statements which are recognized but not modeled.
const OTHER_STATEMENTS: &[&str] = &[
    "SHOW", "CREATE", "DROP", "DELETE", "ALTER", "GRANT", "REVOKE", "KILL", "EXPLAIN",
];

/// Nesting depth of groupings, calls and subqueries beyond which parsing fails.
pub const MAX_DEPTH: usize = 256;
/// Number of binary operators an operand may be nested under.
pub const MAX_OPERATORS: usize = 1024;

/// Parse `text` as a sequence of `;`-separated InfluxQL statements.
pub fn parse_query(text: &str) -> Result<Query> {
    let mut parser = Parser::new(text)?;
    let mut statements = Vec::new();

    loop {
        while parser.eat(&Token::Semicolon) {}
        if parser.peek() == &Token::Eof {
            break;
        }
        statements.push(parser.statement()?);

        if !parser.eat(&Token::Semicolon) {
            parser.expect(&Token::Eof, "; or EOF")?;
            break;
        }
    }

    if statements.is_empty() {
        return Err(Error::Empty);
    }
    Ok(Query { statements })
}

/// Parse `text` as a single standalone expression.
pub fn parse_expr(text: &str) -> Result<Expr> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expr()?;
    parser.expect(&Token::Eof, "EOF")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
            depth: 0,
            operators: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        // The token stream always ends with Eof, which is never consumed.
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].0
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

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep(MAX_DEPTH));
        }
        Ok(())
    }

    fn too_deep(&self, limit: usize) -> Error {
        let index = self.pos.min(self.tokens.len() - 1);
        Error::TooDeep {
            limit,
            offset: self.tokens[index].1,
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let index = self.pos.min(self.tokens.len() - 1);
        Error::Unexpected {
            found: self.tokens[index].0.to_string(),
            expected: expected.to_string(),
            offset: self.tokens[index].1,
        }
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.peek().is_keyword("SELECT") {
            return Ok(Statement::Select(self.select()?));
        }
        if let Some(keyword) = OTHER_STATEMENTS
            .iter()
            .find(|kw| self.peek().is_keyword(kw))
        {
            while !matches!(self.peek(), Token::Semicolon | Token::Eof) {
                self.advance();
            }
            return Ok(Statement::Other(keyword.to_string()));
        }
        Err(self.unexpected("SELECT"))
    }

    fn select(&mut self) -> Result<SelectStatement> {
        self.expect_keyword("SELECT")?;
        let mut stmt = SelectStatement::default();

        loop {
            let expr = self.expr()?;
            let alias = if self.eat_keyword("AS") {
                Some(self.ident()?)
            } else {
                None
            };
            stmt.fields.push(SelectField { expr, alias });

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        if self.eat_keyword("INTO") {
            stmt.target = Some(self.measurement()?);
        }

        self.expect_keyword("FROM")?;
        loop {
            if self.eat(&Token::LParen) {
                self.descend()?;
                let inner = self.select()?;
                self.depth -= 1;
                self.expect(&Token::RParen, ")")?;
                stmt.sources.push(Source::Subquery(Box::new(inner)));
            } else {
                stmt.sources.push(Source::Measurement(self.measurement()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        if self.eat_keyword("WHERE") {
            stmt.condition = Some(self.expr()?);
        }

        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            loop {
                stmt.dimensions.push(self.expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        if self.eat_keyword("FILL") {
            self.expect(&Token::LParen, "(")?;
            stmt.fill = Some(self.fill()?);
            self.expect(&Token::RParen, ")")?;
        }

        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let name = self.ident()?;
                let ascending = !self.eat_keyword("DESC");
                if ascending {
                    self.eat_keyword("ASC");
                }
                stmt.order_by.push(SortField { name, ascending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        for (keyword, slot) in [
            ("LIMIT", &mut stmt.limit),
            ("OFFSET", &mut stmt.offset),
            ("SLIMIT", &mut stmt.slimit),
            ("SOFFSET", &mut stmt.soffset),
        ] {
            if self.eat_keyword(keyword) {
                let Token::Integer(n) = *self.peek() else {
                    return Err(self.unexpected("integer"));
                };
                self.advance();
                *slot = Some(n);
            }
        }

        if self.eat_keyword("TZ") {
            self.expect(&Token::LParen, "(")?;
            let Token::Str(tz) = self.peek().clone() else {
                return Err(self.unexpected("string"));
            };
            self.advance();
            stmt.timezone = Some(tz);
            self.expect(&Token::RParen, ")")?;
        }

        Ok(stmt)
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Token::Ident { name, quoted } if *quoted || !is_reserved(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // Measurements are `[db.[rp].]name`, where name may be a regex.
    fn measurement(&mut self) -> Result<Measurement> {
        enum Segment {
            Name(String),
            Regex(String),
            Empty,
        }

        let mut segments = Vec::new();
        loop {
            let segment = match self.peek().clone() {
                Token::Regex(r) => {
                    self.advance();
                    Segment::Regex(r)
                }
                Token::Ident { .. } => Segment::Name(self.ident()?),
                Token::Dot => Segment::Empty,
                _ => return Err(self.unexpected("measurement")),
            };
            segments.push(segment);

            if !self.eat(&Token::Dot) {
                break;
            }
            if segments.len() == 3 {
                return Err(self.unexpected("measurement"));
            }
        }

        let mut measurement = Measurement::default();
        let mut segments = segments.into_iter().rev();

        match segments.next() {
            Some(Segment::Name(name)) => measurement.name = name,
            Some(Segment::Regex(regex)) => measurement.regex = Some(regex),
            _ => return Err(self.unexpected("measurement")),
        }
        for slot in [&mut measurement.retention_policy, &mut measurement.database] {
            match segments.next() {
                Some(Segment::Name(name)) => *slot = name,
                Some(Segment::Empty) | None => {}
                Some(Segment::Regex(_)) => return Err(self.unexpected("identifier")),
            }
        }
        Ok(measurement)
    }

    // Fill options are matched case-sensitively.
    fn fill(&mut self) -> Result<Fill> {
        let negative = self.eat(&Token::Minus);

        match self.advance() {
            Token::Ident { name, quoted: false } if !negative => match name.as_str() {
                "null" => Ok(Fill::Null),
                "none" => Ok(Fill::None),
                "previous" => Ok(Fill::Previous),
                "linear" => Ok(Fill::Linear),
                _ => Err(Error::InvalidFill(name)),
            },
            Token::Integer(n) => Ok(Fill::Integer(if negative { -n } else { n })),
            Token::Number(n) => Ok(Fill::Number(if negative { -n } else { n })),
            other => Err(Error::InvalidFill(other.to_string())),
        }
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
        let op = match self.peek() {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Mod,
            Token::BitAnd => BinaryOp::BitAnd,
            Token::BitOr => BinaryOp::BitOr,
            Token::BitXor => BinaryOp::BitXor,
            Token::Eq => BinaryOp::Eq,
            Token::Neq => BinaryOp::Neq,
            Token::Lt => BinaryOp::Lt,
            Token::Lte => BinaryOp::Lte,
            Token::Gt => BinaryOp::Gt,
            Token::Gte => BinaryOp::Gte,
            Token::EqRegex => BinaryOp::EqRegex,
            Token::NeqRegex => BinaryOp::NeqRegex,
            t if t.is_keyword("AND") => BinaryOp::And,
            t if t.is_keyword("OR") => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    // Unary minus applies only to numeric and duration literals.
    fn unary(&mut self) -> Result<Expr> {
        if !self.eat(&Token::Minus) {
            return self.primary();
        }
        let expr = match self.peek().clone() {
            Token::Integer(n) => Expr::Integer(-n),
            Token::Number(n) => Expr::Number(-n),
            Token::Duration(literal) => {
                let literal = format!("-{literal}");
                Expr::Duration {
                    nanos: crate::parse_duration(&literal)?,
                    literal,
                }
            }
            _ => return Err(self.unexpected("number or duration")),
        };
        self.advance();
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        self.descend()?;
        let expr = self.operand();
        self.depth -= 1;
        expr
    }

    fn operand(&mut self) -> Result<Expr> {
        let expr = match self.advance() {
            Token::Integer(n) => Expr::Integer(n),
            Token::Number(n) => Expr::Number(n),
            Token::Str(s) => Expr::String(s),
            Token::Duration(literal) => Expr::Duration {
                nanos: crate::parse_duration(&literal)?,
                literal,
            },
            Token::Regex(r) => Expr::Regex(r),
            Token::Template(t) => Expr::Template(t),
            Token::Star => Expr::Wildcard { cast: self.cast()? },
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, ")")?;
                Expr::Paren(Box::new(inner))
            }
            Token::Ident { name, quoted: false } if name.eq_ignore_ascii_case("true") => {
                Expr::Boolean(true)
            }
            Token::Ident { name, quoted: false } if name.eq_ignore_ascii_case("false") => {
                Expr::Boolean(false)
            }
            Token::Ident { name, quoted: false } if is_reserved(&name) => {
                self.pos -= 1;
                return Err(self.unexpected("expression"));
            }
            Token::Ident { name, quoted: false } if self.peek() == &Token::LParen => {
                self.advance();
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, ", or )")?;
                }
                Expr::Call { name, args }
            }
            Token::Ident { name, .. } => Expr::VarRef {
                name,
                cast: self.cast()?,
            },
            Token::Eof => return Err(self.unexpected("expression")),
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expression"));
            }
        };
        Ok(expr)
    }

    fn cast(&mut self) -> Result<Option<String>> {
        if self.eat(&Token::DoubleColon) {
            Ok(Some(self.ident()?))
        } else {
            Ok(None)
        }
    }
}

fn is_reserved(name: &str) -> bool {
    crate::lexer::RESERVED
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod test {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::VarRef {
            name: name.to_string(),
            cast: None,
        }
    }

    fn select(text: &str) -> SelectStatement {
        match parse_query(text).unwrap().statements.remove(0) {
            Statement::Select(s) => s,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn test_select_clauses() {
        let stmt = select(
            r#"SELECT mean("usage_idle") AS idle, max(x) FROM "telegraf"."autogen"."cpu"
               WHERE "host" = 'a' AND time > now() - 1h
               GROUP BY time(5m), "host" FILL(previous) ORDER BY time DESC LIMIT 10 SLIMIT 2 TZ('UTC')"#,
        );

        assert_eq!(stmt.fields.len(), 2);
        assert_eq!(stmt.fields[0].alias.as_deref(), Some("idle"));
        assert_eq!(
            stmt.fields[0].expr,
            Expr::Call {
                name: "mean".to_string(),
                args: vec![var("usage_idle")]
            }
        );
        assert_eq!(
            stmt.sources,
            vec![Source::Measurement(Measurement {
                database: "telegraf".to_string(),
                retention_policy: "autogen".to_string(),
                name: "cpu".to_string(),
                regex: None,
            })]
        );
        assert_eq!(
            stmt.condition.as_ref().map(ToString::to_string).as_deref(),
            Some("host = 'a' AND time > now() - 1h")
        );
        assert_eq!(stmt.dimensions.len(), 2);
        assert_eq!(stmt.fill, Some(Fill::Previous));
        assert_eq!(
            stmt.order_by,
            vec![SortField {
                name: "time".to_string(),
                ascending: false
            }]
        );
        assert_eq!(stmt.limit, Some(10));
        assert_eq!(stmt.slimit, Some(2));
        assert_eq!(stmt.timezone.as_deref(), Some("UTC"));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("a = 1 OR b = 2 AND c = 3 + 4 * 5").unwrap();
        let Expr::Binary { op, rhs, .. } = &expr else {
            panic!("not binary: {expr:?}");
        };
        assert_eq!(*op, BinaryOp::Or);
        let Expr::Binary { op, .. } = rhs.as_ref() else {
            panic!("not binary: {rhs:?}");
        };
        assert_eq!(*op, BinaryOp::And);

        // Subtraction is left-associative.
        let expr = parse_expr("now() - 1h - 1h").unwrap();
        let Expr::Binary { lhs, .. } = &expr else {
            panic!("not binary: {expr:?}");
        };
        assert_eq!(lhs.to_string(), "now() - 1h");
    }

    #[test]
    fn test_measurement_forms() {
        let cases = [
            ("SELECT x FROM cpu", ("", "", "cpu")),
            ("SELECT x FROM autogen.cpu", ("", "autogen", "cpu")),
            ("SELECT x FROM db..cpu", ("db", "", "cpu")),
            ("SELECT x FROM db.rp.cpu", ("db", "rp", "cpu")),
        ];
        for (text, (db, rp, name)) in cases {
            let stmt = select(text);
            let Source::Measurement(m) = &stmt.sources[0] else {
                panic!("not a measurement");
            };
            assert_eq!(
                (m.database.as_str(), m.retention_policy.as_str(), m.name.as_str()),
                (db, rp, name),
                "{text}"
            );
        }

        let stmt = select("SELECT x FROM db.rp./^c/");
        assert_eq!(
            stmt.sources,
            vec![Source::Measurement(Measurement {
                database: "db".to_string(),
                retention_policy: "rp".to_string(),
                name: String::new(),
                regex: Some("^c".to_string()),
            })]
        );
        assert!(parse_query("SELECT x FROM a.b.c.d").is_err());
    }

    #[test]
    fn test_fill_options() {
        for (text, expect) in [
            ("null", Fill::Null),
            ("none", Fill::None),
            ("previous", Fill::Previous),
            ("linear", Fill::Linear),
            ("42", Fill::Integer(42)),
            ("-3", Fill::Integer(-3)),
            ("1.5", Fill::Number(1.5)),
        ] {
            let stmt = select(&format!("SELECT x FROM m GROUP BY time(1m) FILL({text})"));
            assert_eq!(stmt.fill, Some(expect));
        }
        assert_eq!(
            parse_query("SELECT x FROM m GROUP BY time(1m) FILL(LINEAR)"),
            Err(Error::InvalidFill("LINEAR".to_string()))
        );
    }

    #[test]
    fn test_statements() {
        let query = parse_query("SHOW DATABASES; select x from m;").unwrap();
        assert_eq!(query.statements.len(), 2);
        assert_eq!(query.statements[0], Statement::Other("SHOW".to_string()));

        assert_eq!(parse_query(""), Err(Error::Empty));
        assert_eq!(parse_query(" ; ;"), Err(Error::Empty));
        assert!(matches!(
            parse_query("INSERT cpu value=1"),
            Err(Error::Unexpected { .. })
        ));
        assert!(matches!(
            parse_query("SELECT FROM m"),
            Err(Error::Unexpected { .. })
        ));
        assert!(matches!(
            parse_query("SELECT x FROM m WHERE"),
            Err(Error::Unexpected { .. })
        ));
    }

    #[test]
    fn test_casts_and_templates() {
        let stmt = select("SELECT usage::float, *::field FROM m WHERE time > :dashboardTime: GROUP BY :interval:");
        assert_eq!(
            stmt.fields[0].expr,
            Expr::VarRef {
                name: "usage".to_string(),
                cast: Some("float".to_string())
            }
        );
        assert_eq!(
            stmt.fields[1].expr,
            Expr::Wildcard {
                cast: Some("field".to_string())
            }
        );
        assert_eq!(stmt.dimensions, vec![Expr::Template("interval".to_string())]);
    }

    #[test]
    fn test_nesting_limits() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expr(&nested(MAX_DEPTH - 1)).is_ok());
        assert!(matches!(
            parse_expr(&nested(50_000)),
            Err(Error::TooDeep { limit: MAX_DEPTH, .. })
        ));

        let calls = format!("{}x{}", "abs(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse_expr(&calls), Err(Error::TooDeep { .. })));

        let subqueries = format!(
            "SELECT x FROM {}m{}",
            "(SELECT x FROM ".repeat(MAX_DEPTH),
            ")".repeat(MAX_DEPTH)
        );
        assert!(matches!(parse_query(&subqueries), Err(Error::TooDeep { .. })));

        let chain = |n: usize| vec!["x = 1"; n].join(" OR ");
        assert!(parse_expr(&chain(MAX_OPERATORS / 2)).is_ok());
        assert!(matches!(
            parse_expr(&chain(MAX_OPERATORS)),
            Err(Error::TooDeep { limit: MAX_OPERATORS, .. })
        ));
    }
}
