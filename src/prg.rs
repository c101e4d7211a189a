//! Program genomes: tree-structured expressions stored as a flat buffer.
//!
//! A program is a prefix-ordered sequence of instructions. Each instruction
//! is one header word (opcode, two parameters) plus an optional payload, and
//! a node's children follow it directly. Evaluation walks the buffer with a
//! value stack.
//!
//! # Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ header │ payload.. │ child 0 .. │ child 1 .. │
//! └────────────────────────────────────────────────┘
//!   bits 0..16 opcode | 16..48 param1 | 48..64 param2
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stackgp::prg::{Program, ProgramContext};
//!
//! let mut context = ProgramContext::with_all_functions();
//! context.define_variable("x").unwrap();
//! let program = Program::from_expression(Arc::new(context), "x * x + 1").unwrap();
//! assert_eq!(program.compute(&[3.0]).unwrap(), 10.0);
//! ```

mod context;
mod crossover;
mod eval;
mod generator;
mod holder;
mod mutation;
mod node;
mod opcode;
mod parse;
mod program;
mod render;
mod rewrite;
mod value;

pub use context::{ProgramContext, VariableMapping};
pub use crossover::SubtreeCrossover;
pub use eval::{MAX_TREE_DEPTH, node_len, tree_depth};
pub use generator::{GenerationMethod, ProgramGenerator};
pub(crate) use generator::check_const_range;
pub use holder::{Header, header_width, payload_words, read_const, read_header};
pub use mutation::{ConstMutation, SubtreeMutation};
pub use node::ProgramNode;
pub use opcode::{EvalFn, NO_PRECEDENCE, NodeType, Opcode, OpcodeTemplate};
pub use parse::parse;
pub use program::Program;
pub use render::{render_infix, render_rpn};
pub use rewrite::{RewriteAlgebraic, RewriteConstants};
pub use value::{DEFAULT_DOUBLE_EQUAL, ExpressionValue, TypeSet, ValueType};
