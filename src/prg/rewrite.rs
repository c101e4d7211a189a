//! Rewrite rules applied to offspring before scoring.
//!
//! Rules work on the mapped node tree and re-encode the program when they
//! change something. A rule never introduces an opcode the context has not
//! enabled.

use super::context::ProgramContext;
use super::eval::Evaluator;
use super::node::ProgramNode;
use super::opcode::Opcode;
use super::program::Program;
use super::value::{ExpressionValue, ValueType};
use crate::ea::RewriteRule;
use log::trace;
use std::sync::Arc;

/// Passes before a rule stops looking for a fixpoint.
const MAX_PASSES: usize = 16;

/// Algebraic simplification (`--x`, `x-0`, `0*x`, `x+x`, `x^0`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteAlgebraic;

impl RewriteRule<Program> for RewriteAlgebraic {
    fn rewrite(&self, program: &mut Program) -> bool {
        rewrite_with(program, simplify)
    }
}

/// Folds subtrees without variables into a single constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteConstants;

impl RewriteRule<Program> for RewriteConstants {
    fn rewrite(&self, program: &mut Program) -> bool {
        rewrite_with(program, fold_constants)
    }
}

fn rewrite_with(
    program: &mut Program,
    pass: fn(&ProgramContext, ProgramNode, &mut bool) -> ProgramNode,
) -> bool {
    let Ok(mut root) = program.map_program() else {
        return false;
    };
    let context = Arc::clone(program.context());
    let mut any = false;
    for _ in 0..MAX_PASSES {
        let mut changed = false;
        root = pass(&context, root, &mut changed);
        if !changed {
            break;
        }
        any = true;
    }
    if any {
        trace!("rewrote program to {} nodes", root.size());
        program.set_root(&root);
    }
    any
}

fn konst(v: f64) -> ProgramNode {
    ProgramNode::float(v)
}

fn negated_constant(node: &ProgramNode) -> Option<ProgramNode> {
    match &node.constant {
        Some(ExpressionValue::Float(v)) if *v < 0.0 => Some(konst(-v)),
        Some(ExpressionValue::Int(v)) if *v < 0 => {
            Some(ProgramNode::constant(ExpressionValue::Int(v.wrapping_neg())))
        }
        _ => None,
    }
}

fn same_variable(a: &ProgramNode, b: &ProgramNode) -> bool {
    a.opcode == Opcode::Var && b.opcode == Opcode::Var && a.variable == b.variable
}

/// Bottom-up algebraic simplification of one tree.
fn simplify(ctx: &ProgramContext, mut node: ProgramNode, changed: &mut bool) -> ProgramNode {
    node.children = std::mem::take(&mut node.children)
        .into_iter()
        .map(|c| simplify(ctx, c, changed))
        .collect();

    match try_simplify(ctx, &node) {
        Some(rewritten) => {
            *changed = true;
            rewritten
        }
        None => node,
    }
}

/// Type a subtree evaluates to, when it is known without evaluating.
fn inferred_type(ctx: &ProgramContext, node: &ProgramNode) -> Option<ValueType> {
    match node.opcode {
        Opcode::Const => node.constant.as_ref().map(ExpressionValue::value_type),
        Opcode::Var => node
            .variable
            .and_then(|i| ctx.variables().get(i))
            .map(|v| v.variable_type),
        Opcode::Neg | Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::ProtectedDiv => {
            let mut out = ValueType::Int;
            for child in &node.children {
                match inferred_type(ctx, child)? {
                    ValueType::Int => {}
                    ValueType::Float => out = ValueType::Float,
                    ValueType::Str if node.opcode == Opcode::Add => return Some(ValueType::Str),
                    _ => return None,
                }
            }
            Some(out)
        }
        op => {
            let returns = op.template().returns;
            if returns.len() == 1 {
                returns.iter().next()
            } else {
                None
            }
        }
    }
}

/// Result type of numeric `a - b`, `a * b` or `a / b`.
fn numeric_result(ctx: &ProgramContext, a: &ProgramNode, b: &ProgramNode) -> Option<ValueType> {
    match (inferred_type(ctx, a)?, inferred_type(ctx, b)?) {
        (ValueType::Int, ValueType::Int) => Some(ValueType::Int),
        (ValueType::Int | ValueType::Float, ValueType::Int | ValueType::Float) => Some(ValueType::Float),
        _ => None,
    }
}

/// True if dropping the zero operand leaves the type of `kept` unchanged.
fn absorbs(ctx: &ProgramContext, kept: &ProgramNode, zero: &ProgramNode) -> bool {
    numeric_result(ctx, kept, zero).is_some_and(|t| Some(t) == inferred_type(ctx, kept))
}

fn typed_constant(value_type: ValueType, v: i32) -> Option<ProgramNode> {
    match value_type {
        ValueType::Float => Some(konst(f64::from(v))),
        ValueType::Int => Some(ProgramNode::constant(ExpressionValue::Int(i64::from(v)))),
        ValueType::Bool | ValueType::Str => None,
    }
}

fn try_simplify(ctx: &ProgramContext, node: &ProgramNode) -> Option<ProgramNode> {
    let op = node.opcode;
    let c = &node.children;
    let build = |opcode: Opcode, children: Vec<ProgramNode>| {
        if ctx.is_enabled(opcode) {
            ProgramNode::operator(opcode, children).ok()
        } else {
            None
        }
    };

    // Every rule keeps the node's result type
    match op {
        // --x => x
        Opcode::Neg if c[0].opcode == Opcode::Neg => Some(c[0].children[0].clone()),
        Opcode::Sub => {
            let numeric = numeric_result(ctx, &c[0], &c[1])?;
            if c[1].is_constant_value(0.0) && absorbs(ctx, &c[0], &c[1]) {
                // x - 0 => x
                Some(c[0].clone())
            } else if same_variable(&c[0], &c[1]) {
                typed_constant(numeric, 0)
            } else if let Some(pos) = negated_constant(&c[1]) {
                // x - (-c) => x + c
                build(Opcode::Add, vec![c[0].clone(), pos])
            } else {
                None
            }
        }
        Opcode::Add => {
            if c[0].is_constant_value(0.0) && absorbs(ctx, &c[1], &c[0]) {
                Some(c[1].clone())
            } else if c[1].is_constant_value(0.0) && absorbs(ctx, &c[0], &c[1]) {
                Some(c[0].clone())
            } else {
                let numeric = numeric_result(ctx, &c[0], &c[1])?;
                if same_variable(&c[0], &c[1]) {
                    // x + x => 2 * x
                    build(Opcode::Mul, vec![typed_constant(numeric, 2)?, c[0].clone()])
                } else if c[1].opcode == Opcode::Neg {
                    // x + -y => x - y
                    build(Opcode::Sub, vec![c[0].clone(), c[1].children[0].clone()])
                } else if let Some(pos) = negated_constant(&c[1]) {
                    build(Opcode::Sub, vec![c[0].clone(), pos])
                } else {
                    None
                }
            }
        }
        Opcode::Mul => {
            let numeric = numeric_result(ctx, &c[0], &c[1])?;
            if c[0].is_constant_value(0.0) || c[1].is_constant_value(0.0) {
                typed_constant(numeric, 0)
            } else if same_variable(&c[0], &c[1]) && numeric == ValueType::Float {
                // x * x => x ^ 2
                build(Opcode::Power, vec![c[0].clone(), konst(2.0)])
            } else {
                None
            }
        }
        Opcode::Div => {
            let numeric = numeric_result(ctx, &c[0], &c[1])?;
            if same_variable(&c[0], &c[1]) {
                typed_constant(numeric, 1)
            } else if c[0].is_constant_value(0.0) && !c[1].is_constant_value(0.0) {
                typed_constant(numeric, 0)
            } else {
                None
            }
        }
        // Powers always produce a float
        Opcode::Power | Opcode::Pow => {
            if c[1].is_constant_value(0.0) {
                Some(konst(1.0))
            } else if c[0].is_constant_value(0.0) {
                Some(konst(0.0))
            } else if c[0].is_constant_value(1.0) {
                Some(konst(1.0))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn has_variable(node: &ProgramNode) -> bool {
    node.opcode == Opcode::Var || node.children.iter().any(has_variable)
}

/// Replace variable-free operator subtrees with their value.
fn fold_constants(ctx: &ProgramContext, node: ProgramNode, changed: &mut bool) -> ProgramNode {
    if node.is_leaf() {
        return node;
    }
    if !has_variable(&node) {
        let buffer = node.to_buffer();
        if let Ok(value) = Evaluator::new(&buffer, &[], ctx).run(0) {
            let foldable = match value {
                ExpressionValue::Float(v) => v.is_finite(),
                _ => true,
            };
            if foldable {
                *changed = true;
                return ProgramNode::constant(value);
            }
        }
        return node;
    }
    let mut node = node;
    node.children = std::mem::take(&mut node.children)
        .into_iter()
        .map(|c| fold_constants(ctx, c, changed))
        .collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Arc<ProgramContext> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        ctx.define_variable("y").unwrap();
        Arc::new(ctx)
    }

    fn simplified(text: &str) -> String {
        let mut p = Program::from_expression(context(), text).unwrap();
        RewriteAlgebraic.rewrite(&mut p);
        p.to_string()
    }

    #[test]
    fn test_algebraic_rules() {
        assert_eq!(simplified("-(-x)"), "x");
        assert_eq!(simplified("x - 0"), "x");
        assert_eq!(simplified("0 + y"), "y");
        assert_eq!(simplified("x * 0"), "0.0");
        assert_eq!(simplified("x - x"), "0.0");
        assert_eq!(simplified("x + x"), "2.0*x");
        assert_eq!(simplified("x * x"), "x^2.0");
        assert_eq!(simplified("x / x"), "1.0");
        assert_eq!(simplified("y ^ 0"), "1.0");
        assert_eq!(simplified("1 ^ y"), "1.0");
        assert_eq!(simplified("x - -3"), "x+3");
        assert_eq!(simplified("x + -y"), "x-y");
    }

    #[test]
    fn test_rewrites_keep_operand_type() {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_typed_variable("n", ValueType::Int).unwrap();
        ctx.define_typed_variable("s", ValueType::Str).unwrap();
        let ctx = Arc::new(ctx);
        let rewrite = |text: &str| {
            let mut p = Program::from_expression(Arc::clone(&ctx), text).unwrap();
            RewriteAlgebraic.rewrite(&mut p);
            p
        };

        assert_eq!(rewrite("n - n").to_string(), "0");
        assert_eq!(rewrite("n / n").to_string(), "1");
        assert_eq!(rewrite("n * 0").to_string(), "0");
        assert_eq!(rewrite("n + n").to_string(), "2*n");
        // Float zero would widen the result
        assert_eq!(rewrite("n - 0.0").to_string(), "n-0.0");

        for text in ["s - s", "s / s", "s + s", "s + 0"] {
            let before = Program::from_expression(Arc::clone(&ctx), text).unwrap();
            let mut p = before.clone();
            assert!(!RewriteAlgebraic.rewrite(&mut p), "{text}");
            assert_eq!(p.buffer(), before.buffer());
        }

        let mut p = rewrite("n - n");
        p.set_variable(0, ExpressionValue::Int(4)).unwrap();
        assert_eq!(p.evaluate().unwrap(), ExpressionValue::Int(0));
    }

    #[test]
    fn test_nested_rewrites_reach_fixpoint() {
        // (x - 0) * 0 + y collapses to y
        assert_eq!(simplified("(x - 0) * 0 + y"), "y");
    }

    #[test]
    fn test_no_change_reported() {
        let mut p = Program::from_expression(context(), "x + y").unwrap();
        assert!(!RewriteAlgebraic.rewrite(&mut p));
    }

    #[test]
    fn test_disabled_opcode_not_introduced() {
        let mut ctx = ProgramContext::new();
        for opcode in [Opcode::Var, Opcode::Const, Opcode::Mul] {
            ctx.enable(opcode);
        }
        ctx.define_variable("x").unwrap();
        let mut p = Program::from_expression(Arc::new(ctx), "x * x").unwrap();
        assert!(!RewriteAlgebraic.rewrite(&mut p));
    }

    #[test]
    fn test_constant_folding() {
        let mut p = Program::from_expression(context(), "x + (2 * 3 - 1)").unwrap();
        assert!(RewriteConstants.rewrite(&mut p));
        assert_eq!(p.to_string(), "x+5");

        // Division by zero is left for evaluation to report
        let mut p = Program::from_expression(context(), "x + 1 / 0").unwrap();
        assert!(!RewriteConstants.rewrite(&mut p));
    }
}
