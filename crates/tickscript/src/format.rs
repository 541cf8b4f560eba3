use itertools::Itertools;

use crate::ast::{ChainOp, Expr, Program, Statement, UnaryOp};

/// Pretty-print a Program in canonical form.
///
/// Statements are separated by a blank line. Each link of a chain is placed
/// on its own line: nodes (and UDFs) are indented four spaces, and properties
/// eight. Formatting a formatted script again yields the same text.
pub fn format(program: &Program) -> String {
    program
        .statements
        .iter()
        .map(|stmt| match stmt {
            Statement::Declaration { name, value } => format!("var {name} = {}\n", expr(value)),
            Statement::Expression(value) => format!("{}\n", expr(value)),
        })
        .join("\n")
}

/// Format a single expression, as it would appear within a statement.
pub fn format_expr(e: &Expr) -> String {
    expr(e)
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Identifier(name) => name.clone(),
        Expr::Reference(name) => format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\"")),
        Expr::String {
            value,
            triple: true,
        } => format!("'''{value}'''"),
        Expr::String { value, .. } => {
            format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
        }
        Expr::Int(i) => i.to_string(),
        Expr::Float(n) => float(*n),
        Expr::Bool(true) => "TRUE".to_string(),
        Expr::Bool(false) => "FALSE".to_string(),
        Expr::Duration(literal) => literal.clone(),
        Expr::Regex(r) => format!("/{}/", r.replace('/', "\\/")),
        Expr::Star => "*".to_string(),
        Expr::List(items) => format!("[{}]", items.iter().map(expr).join(", ")),
        Expr::Lambda(body) => format!("lambda: {}", expr(body)),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => format!("-{}", expr(operand)),
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } => format!("!{}", expr(operand)),
        Expr::Binary { op, lhs, rhs } => format!("{} {} {}", expr(lhs), op.symbol(), expr(rhs)),
        Expr::Paren(inner) => format!("({})", expr(inner)),
        Expr::Call { name, args } => format!("{name}({})", args.iter().map(expr).join(", ")),
        Expr::Chain { source, links } => {
            let mut out = expr(source);
            for link in links {
                let indent = match link.op {
                    ChainOp::Pipe | ChainOp::Udf => "    ",
                    ChainOp::Property => "        ",
                };
                out.push('\n');
                out.push_str(indent);
                out.push_str(link.op.symbol());
                out.push_str(&link.name);
                out.push('(');
                out.push_str(&link.args.iter().map(expr).join(", "));
                out.push(')');
            }
            out
        }
    }
}

// Floats always carry a decimal point, so they re-parse as floats.
fn float(n: f64) -> String {
    let s = n.to_string();
    if s.contains('.') || !n.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}
