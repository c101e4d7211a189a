//! Programs: a flat instruction buffer plus its shared context.
//!
//! The buffer stores nodes in prefix order. A node's header is followed by
//! its payload and then its children, left to right. Node "pointers" are
//! buffer indices; child offsets are recomputed by walking forward.

// Numeric inputs are converted to the declared variable types
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use super::context::ProgramContext;
use super::eval::{self, Evaluator};
use super::holder::{self, Header};
use super::node::ProgramNode;
use super::opcode::Opcode;
use super::value::{ExpressionValue, TypeSet, ValueType};
use super::{parse, render};
use crate::error::{ProgramError, PrgResult};
use std::fmt;
use std::sync::Arc;

/// An evolvable program.
#[derive(Debug, Clone)]
pub struct Program {
    buffer: Vec<u64>,
    context: Arc<ProgramContext>,
    values: Vec<Option<ExpressionValue>>,
    pub(crate) score: f64,
    pub(crate) adjusted_score: f64,
    pub(crate) birth_generation: u64,
}

impl Program {
    /// Wrap an encoded buffer after checking it decodes to exactly one tree.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is empty, truncated, holds unknown opcodes, has
    /// trailing words after the root or nests past [`MAX_TREE_DEPTH`](crate::prg::MAX_TREE_DEPTH).
    pub fn from_buffer(context: Arc<ProgramContext>, buffer: Vec<u64>) -> PrgResult<Self> {
        let len = eval::node_len(&buffer, 0)?;
        if len != buffer.len() {
            return Err(ProgramError::Truncated { index: len });
        }
        eval::check_depth(&buffer, 0)?;
        Ok(Self::from_buffer_unchecked(context, buffer))
    }

    pub(crate) fn from_buffer_unchecked(context: Arc<ProgramContext>, buffer: Vec<u64>) -> Self {
        let values = vec![None; context.variables().len()];
        Self {
            buffer,
            context,
            values,
            score: f64::NAN,
            adjusted_score: f64::NAN,
            birth_generation: 0,
        }
    }

    /// Encode a node tree.
    #[must_use]
    pub fn from_node(context: Arc<ProgramContext>, root: &ProgramNode) -> Self {
        Self::from_buffer_unchecked(context, root.to_buffer())
    }

    /// Parse an infix expression such as `x * 2 + sin(y)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Parse`] for malformed input and
    /// [`ProgramError::UndefinedVariable`] for unknown names.
    pub fn from_expression(context: Arc<ProgramContext>, text: &str) -> PrgResult<Self> {
        let root = parse::parse(&context, text)?;
        Ok(Self::from_node(context, &root))
    }

    /// The raw instruction buffer.
    #[must_use]
    pub fn buffer(&self) -> &[u64] {
        &self.buffer
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<ProgramContext> {
        &self.context
    }

    /// Buffer length in words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True for an empty buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of nodes.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pc = 0;
        while pc < self.buffer.len() {
            match holder::header_width(&self.buffer, pc) {
                Ok(w) => pc += w,
                Err(_) => break,
            }
            count += 1;
        }
        count
    }

    /// Decoded header at `index`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or an index past the end.
    pub fn header(&self, index: usize) -> PrgResult<(Opcode, Header)> {
        holder::read_header(&self.buffer, index)
    }

    /// Header plus payload width of the node at `index`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn header_width(&self, index: usize) -> PrgResult<usize> {
        holder::header_width(&self.buffer, index)
    }

    /// Encoded length of the subtree rooted at `index`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn node_len(&self, index: usize) -> PrgResult<usize> {
        eval::node_len(&self.buffer, index)
    }

    /// Buffer indices of the children of the node at `index`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn children(&self, index: usize) -> PrgResult<Vec<usize>> {
        let (opcode, _) = self.header(index)?;
        let mut next = index + self.header_width(index)?;
        let mut out = Vec::with_capacity(opcode.arity());
        for _ in 0..opcode.arity() {
            out.push(next);
            next += self.node_len(next)?;
        }
        Ok(out)
    }

    /// Buffer index of the `ordinal`-th node in depth-first order.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NodeOutOfRange`] past the last node.
    pub fn node_index(&self, ordinal: usize) -> PrgResult<usize> {
        let mut pc = 0;
        for _ in 0..ordinal {
            if pc >= self.buffer.len() {
                return Err(ProgramError::NodeOutOfRange(ordinal));
            }
            pc += self.header_width(pc)?;
        }
        if pc >= self.buffer.len() {
            return Err(ProgramError::NodeOutOfRange(ordinal));
        }
        Ok(pc)
    }

    /// Buffer indices of every node in depth-first, left-to-right order.
    ///
    /// Uses an explicit stack and checks every child offset, so a malformed
    /// buffer is reported instead of silently mis-walked.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn traverse(&self) -> PrgResult<Vec<usize>> {
        let mut order = Vec::new();
        if self.buffer.is_empty() {
            return Ok(order);
        }
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            order.push(index);
            let children = self.children(index)?;
            stack.extend(children.into_iter().rev());
        }
        Ok(order)
    }

    /// Rebuild the node tree.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn map_program(&self) -> PrgResult<ProgramNode> {
        ProgramNode::map(&self.buffer, 0)
    }

    /// Words of the subtree rooted at `index`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn subtree(&self, index: usize) -> PrgResult<&[u64]> {
        let len = self.node_len(index)?;
        Ok(&self.buffer[index..index + len])
    }

    /// Replace the subtree rooted at `index` with `words`.
    ///
    /// The score is reset since the program changed. The program is left
    /// untouched if the result would nest past [`MAX_TREE_DEPTH`](crate::prg::MAX_TREE_DEPTH).
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer, and with
    /// [`ProgramError::TooDeep`] for an over-deep result.
    pub fn replace_subtree(&mut self, index: usize, words: &[u64]) -> PrgResult<()> {
        let len = self.node_len(index)?;
        let mut buffer = Vec::with_capacity(self.buffer.len() - len + words.len());
        buffer.extend_from_slice(&self.buffer[..index]);
        buffer.extend_from_slice(words);
        buffer.extend_from_slice(&self.buffer[index + len..]);
        eval::check_depth(&buffer, 0)?;
        self.buffer = buffer;
        self.invalidate();
        Ok(())
    }

    /// Replace the whole program with `root`.
    pub fn set_root(&mut self, root: &ProgramNode) {
        self.buffer = root.to_buffer();
        self.invalidate();
    }

    /// Value of the `#const` node at `index`.
    ///
    /// # Errors
    ///
    /// Fails unless `index` holds a constant.
    pub fn constant(&self, index: usize) -> PrgResult<ExpressionValue> {
        holder::read_const(&self.buffer, index)
    }

    /// Overwrite the float constant at `index` in place.
    ///
    /// # Errors
    ///
    /// Fails unless `index` holds a float constant.
    pub fn set_float_constant(&mut self, index: usize, value: f64) -> PrgResult<()> {
        holder::write_float_const(&mut self.buffer, index, value)?;
        self.invalidate();
        Ok(())
    }

    /// Types the parent's slot requires of the node at `index`.
    ///
    /// The root must produce the context's result type.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NodeOutOfRange`] if `index` is not a node start.
    pub fn expected_types(&self, index: usize) -> PrgResult<TypeSet> {
        let mut desired = TypeSet::single(self.context.result().variable_type);
        let mut current = 0usize;
        loop {
            if current == index {
                return Ok(desired);
            }
            let (opcode, _) = self.header(current)?;
            let template = opcode.template();
            let mut found = None;
            for (slot, child) in self.children(current)?.into_iter().enumerate() {
                let end = child + self.node_len(child)?;
                if (child..end).contains(&index) {
                    found = Some((slot, child));
                    break;
                }
            }
            let (slot, child) = found.ok_or(ProgramError::NodeOutOfRange(index))?;
            desired = template.param_types(slot, desired);
            current = child;
        }
    }

    /// Depth of the tree; a single leaf has depth 1.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn depth(&self) -> PrgResult<usize> {
        eval::tree_depth(&self.buffer, 0)
    }

    /// Bind a value to variable `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::UndefinedVariable`] for an unknown index.
    pub fn set_variable(&mut self, index: usize, value: ExpressionValue) -> PrgResult<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| ProgramError::UndefinedVariable(format!("#{index}")))?;
        *slot = Some(value);
        Ok(())
    }

    /// Bind a value to the variable called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::UndefinedVariable`] for an unknown name.
    pub fn set_variable_by_name(&mut self, name: &str, value: ExpressionValue) -> PrgResult<()> {
        let index = self
            .context
            .variable_index(name)
            .ok_or_else(|| ProgramError::UndefinedVariable(name.to_string()))?;
        self.set_variable(index, value)
    }

    /// Current value of variable `index`.
    #[must_use]
    pub fn variable(&self, index: usize) -> Option<&ExpressionValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Evaluate the program with the bound variables.
    ///
    /// # Errors
    ///
    /// Fatal errors (see [`ProgramError::is_fatal`]) indicate a corrupt
    /// buffer; the rest are ordinary evaluation failures.
    pub fn evaluate(&self) -> PrgResult<ExpressionValue> {
        Evaluator::new(&self.buffer, &self.values, &self.context).run(0)
    }

    /// Evaluate with `inputs` bound to the variables in definition order and
    /// convert the result to a float according to the context result type.
    ///
    /// The program's own variable bindings are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::InputCount`] if `inputs` does not match the
    /// number of variables and [`ProgramError::TypeMismatch`] if the result
    /// cannot be converted.
    pub fn compute(&self, inputs: &[f64]) -> PrgResult<f64> {
        let expected = self.context.variables().len();
        if inputs.len() != expected {
            return Err(ProgramError::InputCount {
                expected,
                actual: inputs.len(),
            });
        }
        let values: Vec<Option<ExpressionValue>> = inputs
            .iter()
            .zip(self.context.variables())
            .map(|(&input, var)| {
                Some(match var.variable_type {
                    ValueType::Float => ExpressionValue::Float(input),
                    ValueType::Int => ExpressionValue::Int(input as i64),
                    ValueType::Bool => ExpressionValue::Bool(input != 0.0),
                    ValueType::Str => ExpressionValue::Str(input.to_string()),
                })
            })
            .collect();

        let value = Evaluator::new(&self.buffer, &values, &self.context).run(0)?;
        let result_type = self.context.result().variable_type;
        match (result_type, &value) {
            (ValueType::Float, v) if v.is_numeric() => v.to_float(),
            (ValueType::Int, v) if v.is_numeric() => Ok(v.to_int()? as f64),
            (ValueType::Bool, ExpressionValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            (ValueType::Str, v) => v.to_float(),
            (expected, v) => Err(ProgramError::TypeMismatch {
                expected: expected.name(),
                actual: v.value_type().name(),
            }),
        }
    }

    /// Postfix rendering, e.g. `[x 2 +]`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn render_rpn(&self) -> PrgResult<String> {
        Ok(render::render_rpn(&self.context, &self.map_program()?))
    }

    /// Common infix rendering.
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or a truncated buffer.
    pub fn render_infix(&self) -> PrgResult<String> {
        Ok(render::render_infix(&self.context, &self.map_program()?))
    }

    /// Generation the program was created in.
    #[must_use]
    pub fn birth_generation(&self) -> u64 {
        self.birth_generation
    }

    /// Set the generation the program was created in.
    pub fn set_birth_generation(&mut self, generation: u64) {
        self.birth_generation = generation;
    }

    fn invalidate(&mut self) {
        self.score = f64::NAN;
        self.adjusted_score = f64::NAN;
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render_infix() {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<invalid program: {e}>"),
        }
    }
}
