//! Infix expression parser.
//!
//! Accepts the common expression syntax produced by the renderer:
//! numbers (`2` is an integer, `2.0` and `1e-3` are floats), `true`/`false`,
//! double-quoted strings (`""` escapes a quote), variables, function calls
//! and the operators of the enabled opcode set. Binding follows each
//! opcode's precedence and associativity.

use super::context::ProgramContext;
use super::eval::MAX_TREE_DEPTH;
use super::node::ProgramNode;
use super::opcode::{NodeType, Opcode};
use super::value::ExpressionValue;
use crate::error::{ProgramError, PrgResult};

/// Symbolic operators, longest first so `<=` wins over `<`.
const OPERATORS: [&str; 15] = [
    "<>", "<=", ">=", "<", ">", "=", "^", "*", "/", "%", "+", "-", "&", "|", "!",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number { text: String, is_float: bool },
    Ident(String),
    Str(String),
    Symbol(&'static str),
    LeftParen,
    RightParen,
    Comma,
}

/// Parse `text` into a node tree using the opcodes and variables of `context`.
///
/// # Errors
///
/// Returns [`ProgramError::Parse`] for malformed input, disabled opcodes or
/// nesting past [`MAX_TREE_DEPTH`], and [`ProgramError::UndefinedVariable`]
/// for unknown names.
pub fn parse(context: &ProgramContext, text: &str) -> PrgResult<ProgramNode> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        context,
        tokens,
        pos: 0,
        end: text.len(),
        nesting: 0,
    };
    let root = parser.expression(u8::MAX)?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(parse_error(*offset, format!("unexpected {token:?}")));
    }
    Ok(root)
}

fn parse_error(position: usize, message: impl Into<String>) -> ProgramError {
    ProgramError::Parse {
        position,
        message: message.into(),
    }
}

fn tokenize(text: &str) -> PrgResult<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let mut text_num = String::new();
            let mut is_float = false;
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    text_num.push(c);
                } else if c == '.' {
                    is_float = true;
                    text_num.push(c);
                } else if c == 'e' || c == 'E' {
                    is_float = true;
                    text_num.push(c);
                    chars.next();
                    if let Some(&(_, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            text_num.push(sign);
                            chars.next();
                        }
                    }
                    continue;
                } else {
                    break;
                }
                chars.next();
            }
            tokens.push((
                start,
                Token::Number {
                    text: text_num,
                    is_float,
                },
            ));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((start, Token::Ident(ident)));
            continue;
        }

        match ch {
            '(' => {
                chars.next();
                tokens.push((start, Token::LeftParen));
            }
            ')' => {
                chars.next();
                tokens.push((start, Token::RightParen));
            }
            ',' => {
                chars.next();
                tokens.push((start, Token::Comma));
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == '"' {
                        if chars.peek().is_some_and(|&(_, n)| n == '"') {
                            s.push('"');
                            chars.next();
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        s.push(c);
                    }
                }
                if !closed {
                    return Err(parse_error(start, "unterminated string"));
                }
                tokens.push((start, Token::Str(s)));
            }
            _ => {
                let rest = &text[start..];
                let symbol = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| parse_error(start, format!("unparsable character `{ch}`")))?;
                for _ in 0..symbol.len() {
                    chars.next();
                }
                tokens.push((start, Token::Symbol(*symbol)));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    context: &'a ProgramContext,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: &Token) -> PrgResult<()> {
        let offset = self.offset();
        match self.next() {
            Some(ref t) if t == want => Ok(()),
            Some(t) => Err(parse_error(offset, format!("expected {want:?}, found {t:?}"))),
            None => Err(parse_error(offset, format!("expected {want:?}"))),
        }
    }

    fn enabled(&self, opcode: Opcode, offset: usize) -> PrgResult<Opcode> {
        if self.context.is_enabled(opcode) {
            Ok(opcode)
        } else {
            Err(parse_error(
                offset,
                format!("`{}` is not enabled", opcode.name()),
            ))
        }
    }

    /// Build an operator node, refusing trees deeper than evaluation allows.
    fn node(&self, op: Opcode, children: Vec<ProgramNode>, offset: usize) -> PrgResult<ProgramNode> {
        let depth = 1 + children.iter().map(ProgramNode::depth).max().unwrap_or(0);
        if depth > MAX_TREE_DEPTH {
            return Err(parse_error(
                offset,
                format!("expression nests deeper than {MAX_TREE_DEPTH} levels"),
            ));
        }
        ProgramNode::operator(op, children)
    }

    /// Parse operators binding at least as tight as `max_prec`.
    fn expression(&mut self, max_prec: u8) -> PrgResult<ProgramNode> {
        let mut lhs = self.unary()?;
        while let Some(Token::Symbol(sym)) = self.peek() {
            let Some(op) = Opcode::find(sym, 2) else {
                break;
            };
            let template = op.template();
            if template.precedence > max_prec {
                break;
            }
            let offset = self.offset();
            self.next();
            let op = self.enabled(op, offset)?;
            let rhs_prec = match template.node_type {
                NodeType::OperatorRight => template.precedence,
                _ => template.precedence.saturating_sub(1),
            };
            let rhs = self.expression(rhs_prec)?;
            lhs = self.node(op, vec![lhs, rhs], offset)?;
        }
        Ok(lhs)
    }

    /// Every recursive path passes through here, so this bounds the call depth.
    fn unary(&mut self) -> PrgResult<ProgramNode> {
        if self.nesting >= MAX_TREE_DEPTH {
            return Err(parse_error(
                self.offset(),
                format!("expression nests deeper than {MAX_TREE_DEPTH} levels"),
            ));
        }
        self.nesting += 1;
        let node = self.prefixed();
        self.nesting -= 1;
        node
    }

    fn prefixed(&mut self) -> PrgResult<ProgramNode> {
        let offset = self.offset();
        match self.peek() {
            Some(Token::Symbol("+")) => {
                self.next();
                self.unary()
            }
            Some(Token::Symbol(sym @ ("-" | "!"))) => {
                let op = Opcode::find(sym, 1).ok_or_else(|| parse_error(offset, "bad unary"))?;
                self.next();
                let operand = self.expression(op.template().precedence)?;
                if op == Opcode::Neg {
                    match operand.constant {
                        Some(ExpressionValue::Float(v)) if operand.is_leaf() => {
                            return Ok(ProgramNode::float(-v));
                        }
                        Some(ExpressionValue::Int(v)) if operand.is_leaf() => {
                            return Ok(ProgramNode::constant(ExpressionValue::Int(-v)));
                        }
                        _ => {}
                    }
                }
                let op = self.enabled(op, offset)?;
                self.node(op, vec![operand], offset)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> PrgResult<ProgramNode> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Number { text, is_float }) => {
                if is_float {
                    let v: f64 = text
                        .parse()
                        .map_err(|_| parse_error(offset, format!("bad number `{text}`")))?;
                    Ok(ProgramNode::float(v))
                } else {
                    let v: i64 = text
                        .parse()
                        .map_err(|_| parse_error(offset, format!("bad number `{text}`")))?;
                    Ok(ProgramNode::constant(ExpressionValue::Int(v)))
                }
            }
            Some(Token::Str(s)) => Ok(ProgramNode::constant(ExpressionValue::Str(s))),
            Some(Token::LeftParen) => {
                let inner = self.expression(u8::MAX)?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.identifier(&name, offset),
            Some(t) => Err(parse_error(offset, format!("unexpected {t:?}"))),
            None => Err(parse_error(offset, "unexpected end of expression")),
        }
    }

    fn identifier(&mut self, name: &str, offset: usize) -> PrgResult<ProgramNode> {
        match name {
            "true" => return Ok(ProgramNode::constant(ExpressionValue::Bool(true))),
            "false" => return Ok(ProgramNode::constant(ExpressionValue::Bool(false))),
            _ => {}
        }

        if self.peek() != Some(&Token::LeftParen) {
            let index = self
                .context
                .variable_index(name)
                .ok_or_else(|| ProgramError::UndefinedVariable(name.to_string()))?;
            return Ok(ProgramNode::variable(index));
        }

        self.next();
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RightParen) {
            loop {
                args.push(self.expression(u8::MAX)?);
                if self.peek() == Some(&Token::Comma) {
                    self.next();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RightParen)?;

        let op = Opcode::find(name, args.len())
            .filter(|op| op.template().node_type == NodeType::Function)
            .ok_or_else(|| {
                parse_error(offset, format!("undefined function `{name}` with {} arguments", args.len()))
            })?;
        let op = self.enabled(op, offset)?;
        self.node(op, args, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ProgramContext {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        ctx.define_variable("y").unwrap();
        ctx
    }

    fn parse_ok(text: &str) -> ProgramNode {
        parse(&context(), text).unwrap()
    }

    #[test]
    fn test_precedence() {
        let node = parse_ok("x + y * 2");
        assert_eq!(node.opcode, Opcode::Add);
        assert_eq!(node.children[1].opcode, Opcode::Mul);
    }

    #[test]
    fn test_left_associative_subtraction() {
        // (x - y) - 1
        let node = parse_ok("x - y - 1");
        assert_eq!(node.opcode, Opcode::Sub);
        assert_eq!(node.children[0].opcode, Opcode::Sub);
    }

    #[test]
    fn test_right_associative_power() {
        // x ^ (y ^ 2)
        let node = parse_ok("x ^ y ^ 2");
        assert_eq!(node.children[1].opcode, Opcode::Power);
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(parse_ok("2").constant, Some(ExpressionValue::Int(2)));
        assert_eq!(parse_ok("2.5").constant, Some(ExpressionValue::Float(2.5)));
        assert_eq!(parse_ok("1e-3").constant, Some(ExpressionValue::Float(0.001)));
        assert_eq!(parse_ok("-3").constant, Some(ExpressionValue::Int(-3)));
        assert_eq!(
            parse_ok("\"a\"\"b\"").constant,
            Some(ExpressionValue::Str("a\"b".into()))
        );
        assert_eq!(parse_ok("true").constant, Some(ExpressionValue::Bool(true)));
    }

    #[test]
    fn test_unary_minus_on_expression() {
        let node = parse_ok("-x * 2");
        assert_eq!(node.opcode, Opcode::Mul);
        assert_eq!(node.children[0].opcode, Opcode::Neg);
    }

    #[test]
    fn test_functions_and_comparisons() {
        let node = parse_ok("iff(x >= 1, max(x, y), sin(y))");
        assert_eq!(node.opcode, Opcode::Iff);
        assert_eq!(node.children[0].opcode, Opcode::GreaterEqual);
        assert_eq!(node.children[1].opcode, Opcode::Max);
    }

    #[test]
    fn test_errors() {
        let ctx = context();
        assert!(matches!(parse(&ctx, "x +"), Err(ProgramError::Parse { .. })));
        assert!(matches!(parse(&ctx, "(x"), Err(ProgramError::Parse { .. })));
        assert!(matches!(parse(&ctx, "x $ y"), Err(ProgramError::Parse { position: 2, .. })));
        assert!(matches!(parse(&ctx, "nope(x)"), Err(ProgramError::Parse { .. })));
        assert_eq!(
            parse(&ctx, "z + 1"),
            Err(ProgramError::UndefinedVariable("z".into()))
        );
    }

    #[test]
    fn test_disabled_opcode_rejected() {
        let mut ctx = ProgramContext::new();
        ctx.enable_numeric_operators(true);
        ctx.define_variable("x").unwrap();
        assert!(parse(&ctx, "x % 2").is_ok());
        assert!(matches!(parse(&ctx, "x / 2"), Err(ProgramError::Parse { .. })));
        assert!(matches!(parse(&ctx, "sin(x)"), Err(ProgramError::Parse { .. })));
    }

    #[test]
    fn test_deep_parentheses_rejected() {
        let text = format!("{}x{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(parse(&context(), &text), Err(ProgramError::Parse { .. })));
        let text = format!("{}x{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_ok(&text), ProgramNode::variable(0));
    }

    #[test]
    fn test_deep_trees_rejected() {
        let ctx = context();
        let chain = vec!["x"; 2_000].join(" + ");
        assert!(matches!(parse(&ctx, &chain), Err(ProgramError::Parse { .. })));
        let negations = format!("{}x", "-".repeat(MAX_TREE_DEPTH + 1));
        assert!(matches!(parse(&ctx, &negations), Err(ProgramError::Parse { .. })));
        let chain = vec!["x"; 300].join(" + ");
        assert_eq!(parse(&ctx, &chain).unwrap().depth(), 300);
    }
}
