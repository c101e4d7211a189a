//! Text renderers for program trees.

use super::context::ProgramContext;
use super::node::ProgramNode;
use super::opcode::NodeType;
use super::value::ExpressionValue;
use std::fmt::Write;

/// Render in common infix form with the minimum parentheses needed to
/// parse back to the same tree.
#[must_use]
pub fn render_infix(context: &ProgramContext, node: &ProgramNode) -> String {
    let mut out = String::new();
    write_infix(context, node, &mut out);
    out
}

/// Render in postfix (reverse Polish) form, tokens separated by spaces.
#[must_use]
pub fn render_rpn(context: &ProgramContext, node: &ProgramNode) -> String {
    let mut tokens = Vec::with_capacity(node.size());
    collect_rpn(context, node, &mut tokens);
    tokens.join(" ")
}

fn collect_rpn(context: &ProgramContext, node: &ProgramNode, tokens: &mut Vec<String>) {
    for child in &node.children {
        collect_rpn(context, child, tokens);
    }
    tokens.push(if node.is_leaf() {
        render_leaf(context, node)
    } else {
        node.opcode.name().to_string()
    });
}

fn render_leaf(context: &ProgramContext, node: &ProgramNode) -> String {
    if let Some(value) = &node.constant {
        return render_constant(value);
    }
    let index = node.variable.unwrap_or(0);
    context
        .variables()
        .get(index)
        .map_or_else(|| format!("#var{index}"), |v| v.name.clone())
}

fn render_constant(value: &ExpressionValue) -> String {
    match value {
        // Debug formatting always keeps a `.` or exponent, so floats parse back as floats
        ExpressionValue::Float(v) => format!("{v:?}"),
        ExpressionValue::Int(v) => v.to_string(),
        ExpressionValue::Bool(v) => v.to_string(),
        ExpressionValue::Str(s) => format!("\"{}\"", s.replace('"', "\"\"")),
    }
}

fn is_negative_constant(node: &ProgramNode) -> bool {
    node.numeric_constant().is_some_and(|v| v < 0.0)
}

/// True if `child` needs parentheses as operand `slot` of `parent`.
fn needs_parens(parent: &ProgramNode, child: &ProgramNode, slot: usize) -> bool {
    if is_negative_constant(child) {
        return true;
    }
    let pt = parent.opcode.template();
    let ct = child.opcode.template();
    if !ct.is_operator() {
        return false;
    }
    if ct.precedence != pt.precedence {
        return ct.precedence > pt.precedence;
    }
    match pt.node_type {
        NodeType::OperatorLeft => slot == 1,
        NodeType::OperatorRight => slot == 0,
        _ => false,
    }
}

fn write_operand(context: &ProgramContext, parent: &ProgramNode, slot: usize, out: &mut String) {
    let child = &parent.children[slot];
    if needs_parens(parent, child, slot) {
        out.push('(');
        write_infix(context, child, out);
        out.push(')');
    } else {
        write_infix(context, child, out);
    }
}

fn write_infix(context: &ProgramContext, node: &ProgramNode, out: &mut String) {
    let template = node.opcode.template();
    match template.node_type {
        NodeType::Leaf => out.push_str(&render_leaf(context, node)),
        NodeType::Unary => {
            out.push_str(template.name);
            let child = &node.children[0];
            if child.opcode.template().is_operator() || is_negative_constant(child) {
                out.push('(');
                write_infix(context, child, out);
                out.push(')');
            } else {
                write_infix(context, child, out);
            }
        }
        NodeType::OperatorLeft | NodeType::OperatorRight => {
            write_operand(context, node, 0, out);
            out.push_str(template.name);
            write_operand(context, node, 1, out);
        }
        NodeType::Function => {
            let _ = write!(out, "{}(", template.name);
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_infix(context, child, out);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::parse::parse;

    fn context() -> ProgramContext {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        ctx.define_variable("y").unwrap();
        ctx
    }

    fn infix(text: &str) -> String {
        let ctx = context();
        render_infix(&ctx, &parse(&ctx, text).unwrap())
    }

    #[test]
    fn test_minimal_parentheses() {
        assert_eq!(infix("(x + 2) * y"), "(x+2)*y");
        assert_eq!(infix("x + (2 * y)"), "x+2*y");
        assert_eq!(infix("x - (y - 1)"), "x-(y-1)");
        assert_eq!(infix("(x ^ y) ^ 2"), "(x^y)^2");
        assert_eq!(infix("-(x + y)"), "-(x+y)");
    }

    #[test]
    fn test_constants_and_functions() {
        assert_eq!(infix("max(x, 2.0)"), "max(x,2.0)");
        assert_eq!(infix("x * -3"), "x*(-3)");
        assert_eq!(infix("cstr(\"a\"\"b\")"), "cstr(\"a\"\"b\")");
    }

    #[test]
    fn test_round_trip() {
        let ctx = context();
        for text in ["(x+2)*y", "x-(y-1)", "iff(x>=1,x,y)", "-(x*y)+2.5", "(-2)^x"] {
            let first = parse(&ctx, text).unwrap();
            let again = parse(&ctx, &render_infix(&ctx, &first)).unwrap();
            assert_eq!(first, again, "{text}");
        }
    }

    #[test]
    fn test_rpn() {
        let ctx = context();
        let node = parse(&ctx, "(x + 2) * sin(y)").unwrap();
        assert_eq!(render_rpn(&ctx, &node), "x 2 + y sin *");
    }
}
