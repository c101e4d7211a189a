//! Transient tree view of a program buffer.
//!
//! A [`ProgramNode`] tree is rebuilt on demand from the flat buffer (see
//! [`ProgramNode::map`]) and re-encoded after structural edits. It is never
//! stored inside a program.

use super::holder::{self, Header};
use super::opcode::Opcode;
use super::value::{ExpressionValue, DEFAULT_DOUBLE_EQUAL};
use crate::error::{ProgramError, PrgResult};

/// One node of a mapped program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramNode {
    /// Buffer index the node was mapped from, `None` for freshly built nodes.
    pub index: Option<usize>,
    /// The node's opcode.
    pub opcode: Opcode,
    /// Constant value for `#const` nodes.
    pub constant: Option<ExpressionValue>,
    /// Variable index for `#var` nodes.
    pub variable: Option<usize>,
    /// Children in declaration order.
    pub children: Vec<ProgramNode>,
}

impl ProgramNode {
    /// A `#const` leaf.
    #[must_use]
    pub fn constant(value: ExpressionValue) -> Self {
        Self {
            index: None,
            opcode: Opcode::Const,
            constant: Some(value),
            variable: None,
            children: Vec::new(),
        }
    }

    /// A float `#const` leaf.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::constant(ExpressionValue::Float(value))
    }

    /// A `#var` leaf.
    #[must_use]
    pub fn variable(index: usize) -> Self {
        Self {
            index: None,
            opcode: Opcode::Var,
            constant: None,
            variable: Some(index),
            children: Vec::new(),
        }
    }

    /// An operator or function node.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::StackUnderflow`] if the child count does not
    /// match the opcode's arity.
    pub fn operator(opcode: Opcode, children: Vec<ProgramNode>) -> PrgResult<Self> {
        if opcode.is_leaf() || children.len() != opcode.arity() {
            return Err(ProgramError::StackUnderflow {
                opcode: opcode.name(),
            });
        }
        Ok(Self {
            index: None,
            opcode,
            constant: None,
            variable: None,
            children,
        })
    }

    /// Rebuild the subtree rooted at buffer index `index`.
    ///
    /// # Errors
    ///
    /// Fails on unknown opcodes or a truncated buffer.
    pub fn map(buffer: &[u64], index: usize) -> PrgResult<Self> {
        let (opcode, header) = holder::read_header(buffer, index)?;
        let width = holder::header_width(buffer, index)?;
        let mut node = Self {
            index: Some(index),
            opcode,
            constant: None,
            variable: None,
            children: Vec::with_capacity(opcode.arity()),
        };
        match opcode {
            Opcode::Const => node.constant = Some(holder::read_const(buffer, index)?),
            Opcode::Var => {
                let var = usize::try_from(header.param1)
                    .map_err(|_| ProgramError::UndefinedVariable(header.param1.to_string()))?;
                node.variable = Some(var);
            }
            _ => {
                let mut child = index + width;
                for _ in 0..opcode.arity() {
                    let mapped = Self::map(buffer, child)?;
                    child += mapped.encoded_len();
                    node.children.push(mapped);
                }
            }
        }
        Ok(node)
    }

    /// Append this subtree to `out` in prefix order.
    pub fn encode(&self, out: &mut Vec<u64>) {
        match self.opcode {
            Opcode::Const => {
                let value = self.constant.clone().unwrap_or(ExpressionValue::Float(0.0));
                holder::push_const(out, &value);
            }
            Opcode::Var => holder::push_var(out, self.variable.unwrap_or(0)),
            op => {
                holder::push_op(out, op);
                for child in &self.children {
                    child.encode(out);
                }
            }
        }
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_buffer(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }

    /// Width of this node's own header and payload.
    #[must_use]
    pub fn header_width(&self) -> usize {
        match (&self.opcode, &self.constant) {
            (Opcode::Const, Some(ExpressionValue::Float(_) | ExpressionValue::Int(_))) => 2,
            (Opcode::Const, Some(ExpressionValue::Str(s))) => 1 + s.len().div_ceil(8),
            _ => 1,
        }
    }

    /// Buffer words of the whole subtree.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.header_width() + self.children.iter().map(Self::encoded_len).sum::<usize>()
    }

    /// Number of nodes in the subtree.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }

    /// Depth of the subtree; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }

    /// True for `#const` and `#var`.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.opcode.is_leaf()
    }

    /// Numeric value of a numeric constant.
    #[must_use]
    pub fn numeric_constant(&self) -> Option<f64> {
        match &self.constant {
            Some(v @ (ExpressionValue::Float(_) | ExpressionValue::Int(_))) => v.to_float().ok(),
            _ => None,
        }
    }

    /// True if this is a numeric constant within tolerance of `v`.
    #[must_use]
    pub fn is_constant_value(&self, v: f64) -> bool {
        self.numeric_constant()
            .is_some_and(|c| (c - v).abs() < DEFAULT_DOUBLE_EQUAL)
    }

    /// Header this node encodes to.
    #[must_use]
    pub fn header(&self) -> Header {
        let mut buf = Vec::with_capacity(self.header_width());
        match self.opcode {
            Opcode::Const | Opcode::Var => self.encode(&mut buf),
            op => holder::push_op(&mut buf, op),
        }
        Header::decode(buf[0])
    }
}
