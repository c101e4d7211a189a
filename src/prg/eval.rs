//! Stack evaluator for flat program buffers.
//!
//! Evaluation starts at a node index, evaluates the children left to right
//! (each child begins where the previous one ended), then pops `arity`
//! operands and pushes the opcode's result. `iff` evaluates only the branch
//! it selects.

use super::context::ProgramContext;
use super::holder;
use super::opcode::Opcode;
use super::value::ExpressionValue;
use crate::error::{ProgramError, PrgResult};

/// Per-evaluation state.
#[derive(Debug)]
pub(crate) struct Evaluator<'a> {
    buffer: &'a [u64],
    values: &'a [Option<ExpressionValue>],
    context: &'a ProgramContext,
    stack: Vec<ExpressionValue>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        buffer: &'a [u64],
        values: &'a [Option<ExpressionValue>],
        context: &'a ProgramContext,
    ) -> Self {
        Self {
            buffer,
            values,
            context,
            stack: Vec::with_capacity(16),
        }
    }

    /// Evaluate the subtree rooted at `index`.
    pub(crate) fn run(mut self, index: usize) -> PrgResult<ExpressionValue> {
        self.eval_node(index)?;
        let result = self.stack.pop().ok_or(ProgramError::StackUnderflow { opcode: "<root>" })?;
        if !self.stack.is_empty() {
            return Err(ProgramError::StackUnderflow { opcode: "<root>" });
        }
        Ok(result)
    }

    /// Evaluate the node at `pc`, push its value and return the index just past it.
    fn eval_node(&mut self, pc: usize) -> PrgResult<usize> {
        let (opcode, header) = holder::read_header(self.buffer, pc)?;
        let width = holder::header_width(self.buffer, pc)?;

        match opcode {
            Opcode::Const => {
                self.stack.push(holder::read_const(self.buffer, pc)?);
                return Ok(pc + width);
            }
            Opcode::Var => {
                self.stack.push(self.read_variable(header.param1)?);
                return Ok(pc + width);
            }
            Opcode::Iff => return self.eval_iff(pc + width),
            _ => {}
        }

        let template = opcode.template();
        let arity = template.arity();
        let mut next = pc + width;
        for _ in 0..arity {
            next = self.eval_node(next)?;
        }

        if self.stack.len() < arity {
            return Err(ProgramError::StackUnderflow {
                opcode: template.name,
            });
        }
        let eval = template
            .eval
            .ok_or(ProgramError::UnknownOpcode {
                opcode: opcode.as_u16(),
                index: pc,
            })?;
        let args = self.stack.split_off(self.stack.len() - arity);
        self.stack.push(eval(&args)?);
        Ok(next)
    }

    fn eval_iff(&mut self, cond: usize) -> PrgResult<usize> {
        let when_true = self.eval_node(cond)?;
        let flag = self
            .stack
            .pop()
            .ok_or(ProgramError::StackUnderflow { opcode: "iff" })?
            .to_bool()?;
        let when_false = when_true + node_len(self.buffer, when_true)?;
        let end = when_false + node_len(self.buffer, when_false)?;
        self.eval_node(if flag { when_true } else { when_false })?;
        Ok(end)
    }

    fn read_variable(&self, param1: i32) -> PrgResult<ExpressionValue> {
        let slot = usize::try_from(param1)
            .ok()
            .and_then(|i| self.values.get(i).map(|v| (i, v)));
        match slot {
            Some((_, Some(v))) => Ok(v.clone()),
            Some((i, None)) => {
                let name = self
                    .context
                    .variables()
                    .get(i)
                    .map_or_else(|| format!("#{i}"), |v| v.name.clone());
                Err(ProgramError::UnsetVariable(name))
            }
            None => Err(ProgramError::UndefinedVariable(format!("#{param1}"))),
        }
    }
}

/// Deepest tree a program may hold. Evaluation, mapping and rendering
/// recurse once per level.
pub const MAX_TREE_DEPTH: usize = 512;

/// Depth of the subtree rooted at `index`; a leaf has depth 1.
///
/// Walks forward keeping one counter per open ancestor, so it never
/// recurses.
///
/// # Errors
///
/// Fails on unknown opcodes or a truncated buffer.
pub fn tree_depth(buffer: &[u64], index: usize) -> PrgResult<usize> {
    let mut open: Vec<usize> = Vec::new();
    let mut deepest = 0;
    let mut pc = index;
    loop {
        let (opcode, _) = holder::read_header(buffer, pc)?;
        pc += holder::header_width(buffer, pc)?;
        deepest = deepest.max(open.len() + 1);
        if opcode.arity() > 0 {
            open.push(opcode.arity());
            continue;
        }
        // A finished leaf may complete a run of ancestors
        loop {
            match open.last_mut() {
                None => return Ok(deepest),
                Some(remaining) if *remaining > 1 => {
                    *remaining -= 1;
                    break;
                }
                Some(_) => {
                    open.pop();
                }
            }
        }
    }
}

/// Fail with [`ProgramError::TooDeep`] if the tree at `index` nests past
/// [`MAX_TREE_DEPTH`].
///
/// # Errors
///
/// Also fails on unknown opcodes or a truncated buffer.
pub(crate) fn check_depth(buffer: &[u64], index: usize) -> PrgResult<()> {
    let depth = tree_depth(buffer, index)?;
    if depth > MAX_TREE_DEPTH {
        return Err(ProgramError::TooDeep {
            depth,
            max: MAX_TREE_DEPTH,
        });
    }
    Ok(())
}

/// Encoded length of the subtree rooted at `index`.
///
/// Walks forward counting outstanding children, so the cost is linear in the
/// subtree size.
///
/// # Errors
///
/// Fails on unknown opcodes or a truncated buffer.
pub fn node_len(buffer: &[u64], index: usize) -> PrgResult<usize> {
    let mut pending = 1usize;
    let mut pc = index;
    while pending > 0 {
        let (opcode, _) = holder::read_header(buffer, pc)?;
        pc += holder::header_width(buffer, pc)?;
        pending = pending - 1 + opcode.arity();
    }
    Ok(pc - index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::node::ProgramNode;

    fn eval(tree: &ProgramNode, values: &[Option<ExpressionValue>]) -> PrgResult<ExpressionValue> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let buf = tree.to_buffer();
        Evaluator::new(&buf, values, &ctx).run(0)
    }

    #[test]
    fn test_nested_arithmetic() {
        // (x + 2) * 3
        let add = ProgramNode::operator(
            Opcode::Add,
            vec![ProgramNode::variable(0), ProgramNode::float(2.0)],
        )
        .unwrap();
        let mul = ProgramNode::operator(Opcode::Mul, vec![add, ProgramNode::float(3.0)]).unwrap();
        let v = eval(&mul, &[Some(ExpressionValue::Float(4.0))]).unwrap();
        assert_eq!(v, ExpressionValue::Float(18.0));
    }

    #[test]
    fn test_operand_order() {
        let sub = ProgramNode::operator(
            Opcode::Sub,
            vec![ProgramNode::float(10.0), ProgramNode::float(4.0)],
        )
        .unwrap();
        assert_eq!(eval(&sub, &[None]).unwrap(), ExpressionValue::Float(6.0));
    }

    #[test]
    fn test_unset_variable() {
        let err = eval(&ProgramNode::variable(0), &[None]).unwrap_err();
        assert_eq!(err, ProgramError::UnsetVariable("x".into()));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_iff_skips_unselected_branch() {
        let cond = ProgramNode::constant(ExpressionValue::Bool(true));
        let ok = ProgramNode::float(1.0);
        let bad = ProgramNode::operator(
            Opcode::Div,
            vec![ProgramNode::float(1.0), ProgramNode::float(0.0)],
        )
        .unwrap();
        let iff = ProgramNode::operator(Opcode::Iff, vec![cond, ok, bad]).unwrap();
        assert_eq!(eval(&iff, &[None]).unwrap(), ExpressionValue::Float(1.0));
    }

    #[test]
    fn test_unknown_opcode_fails_fast() {
        let buf = vec![holder::Header::new(Opcode::Add, 0, 0).encode(), 0xBEEF, 0xBEEF];
        let ctx = ProgramContext::new();
        let err = Evaluator::new(&buf, &[], &ctx).run(0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_node_len() {
        let add = ProgramNode::operator(
            Opcode::Add,
            vec![ProgramNode::variable(0), ProgramNode::float(2.0)],
        )
        .unwrap();
        let buf = add.to_buffer();
        assert_eq!(node_len(&buf, 0).unwrap(), 4);
        assert_eq!(node_len(&buf, 2).unwrap(), 2);
        assert!(node_len(&buf[..3], 0).unwrap_err().is_fatal());
    }

    #[test]
    fn test_tree_depth_counts_levels() {
        // -(x + 2) beside a leaf: depth 3 on the left branch
        let add = ProgramNode::operator(
            Opcode::Add,
            vec![ProgramNode::variable(0), ProgramNode::float(2.0)],
        )
        .unwrap();
        let neg = ProgramNode::operator(Opcode::Neg, vec![add]).unwrap();
        let mul = ProgramNode::operator(Opcode::Mul, vec![ProgramNode::float(1.0), neg]).unwrap();
        let buf = mul.to_buffer();
        assert_eq!(tree_depth(&buf, 0).unwrap(), mul.depth());
        assert_eq!(tree_depth(&buf, 0).unwrap(), 4);
        assert_eq!(tree_depth(&ProgramNode::float(1.0).to_buffer(), 0).unwrap(), 1);
    }

    #[test]
    fn test_long_unary_chain_is_too_deep() {
        let mut buf = Vec::new();
        for _ in 0..100_000 {
            holder::push_op(&mut buf, Opcode::Neg);
        }
        holder::push_var(&mut buf, 0);
        assert_eq!(tree_depth(&buf, 0).unwrap(), 100_001);
        let err = check_depth(&buf, 0).unwrap_err();
        assert!(matches!(err, ProgramError::TooDeep { depth: 100_001, .. }));
        assert!(!err.is_fatal());
    }
}
