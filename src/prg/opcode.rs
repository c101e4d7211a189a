//! Opcode set and the static dispatch table.
//!
//! Every opcode maps to an [`OpcodeTemplate`] describing its name, node type,
//! parameter and return types, infix precedence and evaluation routine. The
//! table is resolved once; evaluation never looks opcodes up by name.

// Conversions between numeric domains are part of the opcode semantics
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use super::value::{self, ExpressionValue, TypeSet};
use crate::error::PrgResult;
use serde::{Deserialize, Serialize};

/// Precedence used for leaves and function-call syntax.
pub const NO_PRECEDENCE: u8 = 100;

/// Evaluation routine: receives the operands in declaration order.
pub type EvalFn = fn(&[ExpressionValue]) -> PrgResult<ExpressionValue>;

/// How a node is written in infix form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Constant or variable.
    Leaf,
    /// Prefix operator such as `-x` or `!b`.
    Unary,
    /// Left-associative binary operator.
    OperatorLeft,
    /// Right-associative binary operator.
    OperatorRight,
    /// Function call syntax `name(a, b)`.
    Function,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeTemplate {
    /// Symbol or function name.
    pub name: &'static str,
    /// Rendering and parsing category.
    pub node_type: NodeType,
    /// Accepted types for each child, in order.
    pub params: &'static [TypeSet],
    /// Types this opcode may produce.
    pub returns: TypeSet,
    /// Infix binding strength; lower binds tighter.
    pub precedence: u8,
    /// Evaluation routine, `None` for leaves.
    pub eval: Option<EvalFn>,
}

impl OpcodeTemplate {
    /// Number of children.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// True for operators (unary or binary), false for leaves and functions.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        matches!(
            self.node_type,
            NodeType::Unary | NodeType::OperatorLeft | NodeType::OperatorRight
        )
    }

    /// Types the child at `slot` may have when this node must produce one of `desired`.
    ///
    /// A parameter declared with the same type set as the return value passes
    /// the desired types through; any other parameter keeps its own set.
    #[must_use]
    pub fn param_types(&self, slot: usize, desired: TypeSet) -> TypeSet {
        match self.params.get(slot) {
            Some(&p) if p == self.returns => p.intersect(desired),
            Some(&p) => p,
            None => TypeSet::EMPTY,
        }
    }
}

/// Every opcode the engine understands.
///
/// The discriminant is the value stored in the low 16 bits of a header word.
#[allow(missing_docs)] // Names mirror the rendered symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Opcode {
    // ==================== Leaves ====================
    Const = 0,
    Var,

    // ==================== Operators ====================
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    ProtectedDiv,
    Power,
    And,
    Or,
    Not,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,

    // ==================== Functions ====================
    Abs,
    Acos,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Floor,
    Log,
    Log10,
    Max,
    Min,
    Pow,
    Round,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    ToDeg,
    ToRad,
    Clamp,
    Iff,
    CInt,
    CFloat,
    CStr,
    CBool,
    Length,
    Left,
    Right,
}

impl Opcode {
    /// Every opcode in discriminant order.
    pub const ALL: [Opcode; 50] = [
        Self::Const,
        Self::Var,
        Self::Neg,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::ProtectedDiv,
        Self::Power,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::Less,
        Self::GreaterEqual,
        Self::LessEqual,
        Self::Abs,
        Self::Acos,
        Self::Asin,
        Self::Atan,
        Self::Atan2,
        Self::Ceil,
        Self::Cos,
        Self::Cosh,
        Self::Exp,
        Self::Floor,
        Self::Log,
        Self::Log10,
        Self::Max,
        Self::Min,
        Self::Pow,
        Self::Round,
        Self::Sin,
        Self::Sinh,
        Self::Sqrt,
        Self::Tan,
        Self::Tanh,
        Self::ToDeg,
        Self::ToRad,
        Self::Clamp,
        Self::Iff,
        Self::CInt,
        Self::CFloat,
        Self::CStr,
        Self::CBool,
        Self::Length,
        Self::Left,
        Self::Right,
    ];

    /// Decode a raw opcode value.
    #[must_use]
    pub fn from_u16(raw: u16) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Raw opcode value.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// The template for this opcode.
    #[must_use]
    pub fn template(self) -> &'static OpcodeTemplate {
        &TEMPLATES[self as usize]
    }

    /// Symbol or function name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.template().name
    }

    /// Number of children.
    #[must_use]
    pub fn arity(self) -> usize {
        self.template().arity()
    }

    /// True for `#const` and `#var`.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.template().node_type == NodeType::Leaf
    }

    /// Find an opcode by name and arity.
    ///
    /// Arity disambiguates unary and binary `-`.
    #[must_use]
    pub fn find(name: &str, arity: usize) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == name && op.arity() == arity)
    }
}

// ==================== Template table ====================

const P_NUM1: &[TypeSet] = &[TypeSet::NUMERIC];
const P_NUM2: &[TypeSet] = &[TypeSet::NUMERIC, TypeSet::NUMERIC];
const P_ADD: &[TypeSet] = &[TypeSet::NUMERIC_STR, TypeSet::NUMERIC_STR];
const P_F1: &[TypeSet] = &[TypeSet::FLOAT];
const P_F2: &[TypeSet] = &[TypeSet::FLOAT, TypeSet::FLOAT];
const P_F3: &[TypeSet] = &[TypeSet::FLOAT, TypeSet::FLOAT, TypeSet::FLOAT];
const P_B1: &[TypeSet] = &[TypeSet::BOOL];
const P_B2: &[TypeSet] = &[TypeSet::BOOL, TypeSet::BOOL];
const P_ANY1: &[TypeSet] = &[TypeSet::ANY];
const P_ANY2: &[TypeSet] = &[TypeSet::ANY, TypeSet::ANY];
const P_IFF: &[TypeSet] = &[TypeSet::BOOL, TypeSet::ANY, TypeSet::ANY];
const P_I1: &[TypeSet] = &[TypeSet::INT];
const P_S1: &[TypeSet] = &[TypeSet::STR];
const P_SI: &[TypeSet] = &[TypeSet::STR, TypeSet::INT];

const fn leaf(name: &'static str) -> OpcodeTemplate {
    OpcodeTemplate {
        name,
        node_type: NodeType::Leaf,
        params: &[],
        returns: TypeSet::ANY,
        precedence: NO_PRECEDENCE,
        eval: None,
    }
}

const fn op(
    name: &'static str,
    node_type: NodeType,
    precedence: u8,
    params: &'static [TypeSet],
    returns: TypeSet,
    eval: EvalFn,
) -> OpcodeTemplate {
    OpcodeTemplate {
        name,
        node_type,
        params,
        returns,
        precedence,
        eval: Some(eval),
    }
}

const fn func(
    name: &'static str,
    params: &'static [TypeSet],
    returns: TypeSet,
    eval: EvalFn,
) -> OpcodeTemplate {
    op(name, NodeType::Function, NO_PRECEDENCE, params, returns, eval)
}

static TEMPLATES: [OpcodeTemplate; 50] = [
    leaf("#const"),
    leaf("#var"),
    op("-", NodeType::Unary, 3, P_NUM1, TypeSet::NUMERIC, eval_neg),
    op("+", NodeType::OperatorLeft, 6, P_ADD, TypeSet::NUMERIC_STR, |a| {
        value::add(&a[0], &a[1])
    }),
    op("-", NodeType::OperatorLeft, 6, P_NUM2, TypeSet::NUMERIC, |a| {
        value::sub(&a[0], &a[1])
    }),
    op("*", NodeType::OperatorLeft, 5, P_NUM2, TypeSet::NUMERIC, |a| {
        value::mul(&a[0], &a[1])
    }),
    op("/", NodeType::OperatorLeft, 5, P_NUM2, TypeSet::NUMERIC, |a| {
        value::div(&a[0], &a[1])
    }),
    op("%", NodeType::OperatorLeft, 5, P_NUM2, TypeSet::NUMERIC, |a| {
        value::protected_div(&a[0], &a[1])
    }),
    op("^", NodeType::OperatorRight, 1, P_NUM2, TypeSet::NUMERIC, |a| {
        value::pow(&a[0], &a[1])
    }),
    op("&", NodeType::OperatorLeft, 10, P_B2, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(a[0].to_bool()? && a[1].to_bool()?))
    }),
    op("|", NodeType::OperatorLeft, 12, P_B2, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(a[0].to_bool()? || a[1].to_bool()?))
    }),
    op("!", NodeType::Unary, 3, P_B1, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(!a[0].to_bool()?))
    }),
    op("=", NodeType::OperatorRight, 9, P_ANY2, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(value::equ(&a[0], &a[1])?))
    }),
    op("<>", NodeType::OperatorRight, 9, P_ANY2, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(!value::equ(&a[0], &a[1])?))
    }),
    op(">", NodeType::OperatorRight, 8, P_NUM2, TypeSet::BOOL, |a| {
        compare(a, |x, y| x > y)
    }),
    op("<", NodeType::OperatorRight, 8, P_NUM2, TypeSet::BOOL, |a| {
        compare(a, |x, y| x < y)
    }),
    op(">=", NodeType::OperatorRight, 8, P_NUM2, TypeSet::BOOL, |a| {
        compare(a, |x, y| x >= y)
    }),
    op("<=", NodeType::OperatorRight, 8, P_NUM2, TypeSet::BOOL, |a| {
        compare(a, |x, y| x <= y)
    }),
    func("abs", P_NUM1, TypeSet::NUMERIC, eval_abs),
    func("acos", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::acos)),
    func("asin", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::asin)),
    func("atan", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::atan)),
    func("atan2", P_F2, TypeSet::FLOAT, |a| {
        binary_float(a, f64::atan2)
    }),
    func("ceil", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::ceil)),
    func("cos", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::cos)),
    func("cosh", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::cosh)),
    func("exp", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::exp)),
    func("floor", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::floor)),
    func("log", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::ln)),
    func("log10", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::log10)),
    func("max", P_NUM2, TypeSet::FLOAT, |a| binary_float(a, f64::max)),
    func("min", P_NUM2, TypeSet::FLOAT, |a| binary_float(a, f64::min)),
    func("pow", P_F2, TypeSet::FLOAT, |a| binary_float(a, f64::powf)),
    func("round", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::round)),
    func("sin", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::sin)),
    func("sinh", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::sinh)),
    func("sqrt", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::sqrt)),
    func("tan", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::tan)),
    func("tanh", P_F1, TypeSet::FLOAT, |a| unary_float(a, f64::tanh)),
    func("todeg", P_F1, TypeSet::FLOAT, |a| {
        unary_float(a, f64::to_degrees)
    }),
    func("torad", P_F1, TypeSet::FLOAT, |a| {
        unary_float(a, f64::to_radians)
    }),
    func("clamp", P_F3, TypeSet::FLOAT, eval_clamp),
    // Evaluated lazily by the evaluator; the routine covers eager callers.
    func("iff", P_IFF, TypeSet::ANY, |a| {
        Ok(if a[0].to_bool()? { a[1].clone() } else { a[2].clone() })
    }),
    func("cint", P_F1, TypeSet::INT, |a| Ok(ExpressionValue::Int(a[0].to_int()?))),
    func("cfloat", P_I1, TypeSet::FLOAT, |a| {
        Ok(ExpressionValue::Float(a[0].to_float()?))
    }),
    func("cstr", P_ANY1, TypeSet::STR, |a| {
        Ok(ExpressionValue::Str(a[0].to_string_value()))
    }),
    func("cbool", P_NUM1, TypeSet::BOOL, |a| {
        Ok(ExpressionValue::Bool(a[0].to_float()? != 0.0))
    }),
    func("length", P_S1, TypeSet::INT, |a| {
        Ok(ExpressionValue::Int(a[0].to_string_value().chars().count() as i64))
    }),
    func("left", P_SI, TypeSet::STR, |a| substring(a, false)),
    func("right", P_SI, TypeSet::STR, |a| substring(a, true)),
];

fn eval_neg(a: &[ExpressionValue]) -> PrgResult<ExpressionValue> {
    match &a[0] {
        ExpressionValue::Int(v) => Ok(ExpressionValue::Int(v.wrapping_neg())),
        other => Ok(ExpressionValue::Float(-other.to_float()?)),
    }
}

fn eval_abs(a: &[ExpressionValue]) -> PrgResult<ExpressionValue> {
    match &a[0] {
        ExpressionValue::Int(v) => Ok(ExpressionValue::Int(v.wrapping_abs())),
        other => Ok(ExpressionValue::Float(other.to_float()?.abs())),
    }
}

fn eval_clamp(a: &[ExpressionValue]) -> PrgResult<ExpressionValue> {
    let v = a[0].to_float()?;
    let lo = a[1].to_float()?;
    let hi = a[2].to_float()?;
    let clamped = if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    };
    Ok(ExpressionValue::Float(clamped))
}

fn unary_float(a: &[ExpressionValue], f: fn(f64) -> f64) -> PrgResult<ExpressionValue> {
    Ok(ExpressionValue::Float(f(a[0].to_float()?)))
}

fn binary_float(a: &[ExpressionValue], f: fn(f64, f64) -> f64) -> PrgResult<ExpressionValue> {
    Ok(ExpressionValue::Float(f(a[0].to_float()?, a[1].to_float()?)))
}

fn compare(a: &[ExpressionValue], f: fn(f64, f64) -> bool) -> PrgResult<ExpressionValue> {
    Ok(ExpressionValue::Bool(f(a[0].to_float()?, a[1].to_float()?)))
}

fn substring(a: &[ExpressionValue], from_end: bool) -> PrgResult<ExpressionValue> {
    let s = a[0].to_string_value();
    // Negative counts take nothing
    let n = usize::try_from(a[1].to_int()?).unwrap_or(0);
    let len = s.chars().count();
    let n = n.min(len);
    let out: String = if from_end {
        s.chars().skip(len - n).collect()
    } else {
        s.chars().take(n).collect()
    };
    Ok(ExpressionValue::Str(out))
}
