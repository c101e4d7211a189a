//! Typed values produced and consumed by program evaluation.

// Value conversions intentionally truncate floats to integers
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::error::{ProgramError, PrgResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used for float equality and protected division.
pub const DEFAULT_DOUBLE_EQUAL: f64 = 1e-7;

/// The type of an expression value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 64-bit float.
    Float,
    /// 64-bit signed integer.
    Int,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Str,
}

impl ValueType {
    /// All value types, in tag order.
    pub const ALL: [ValueType; 4] = [Self::Float, Self::Int, Self::Bool, Self::Str];

    /// Tag stored in the `param2` field of a constant header.
    #[must_use]
    pub fn tag(self) -> i16 {
        match self {
            Self::Float => 0,
            Self::Int => 1,
            Self::Bool => 2,
            Self::Str => 3,
        }
    }

    /// Decode a constant tag.
    #[must_use]
    pub fn from_tag(tag: i16) -> Option<Self> {
        match tag {
            0 => Some(Self::Float),
            1 => Some(Self::Int),
            2 => Some(Self::Bool),
            3 => Some(Self::Str),
            _ => None,
        }
    }

    /// Human-readable type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "boolean",
            Self::Str => "string",
        }
    }

    fn bit(self) -> u8 {
        1 << self.tag()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of value types, used for opcode signatures and type-directed generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet(u8);

impl TypeSet {
    /// No types.
    pub const EMPTY: TypeSet = TypeSet(0);
    /// Floats only.
    pub const FLOAT: TypeSet = TypeSet(0b0001);
    /// Integers only.
    pub const INT: TypeSet = TypeSet(0b0010);
    /// Booleans only.
    pub const BOOL: TypeSet = TypeSet(0b0100);
    /// Strings only.
    pub const STR: TypeSet = TypeSet(0b1000);
    /// Floats and integers.
    pub const NUMERIC: TypeSet = TypeSet(0b0011);
    /// Floats, integers and strings.
    pub const NUMERIC_STR: TypeSet = TypeSet(0b1011);
    /// Every type.
    pub const ANY: TypeSet = TypeSet(0b1111);

    /// A set holding a single type.
    #[must_use]
    pub fn single(t: ValueType) -> Self {
        Self(t.bit())
    }

    /// True if `t` is in the set.
    #[must_use]
    pub fn contains(self, t: ValueType) -> bool {
        self.0 & t.bit() != 0
    }

    /// Set intersection.
    #[must_use]
    pub fn intersect(self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 & other.0)
    }

    /// True if the set is empty.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the member types in tag order.
    pub fn iter(self) -> impl Iterator<Item = ValueType> {
        ValueType::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    /// Number of member types.
    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A value on the evaluator stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionValue {
    /// Float value.
    Float(f64),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    Str(String),
}

impl ExpressionValue {
    /// The type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Float(_) => ValueType::Float,
            Self::Int(_) => ValueType::Int,
            Self::Bool(_) => ValueType::Bool,
            Self::Str(_) => ValueType::Str,
        }
    }

    /// True for floats and integers.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Float(_) | Self::Int(_))
    }

    /// Convert to a float. Strings are parsed.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch for booleans and unparsable strings.
    pub fn to_float(&self) -> PrgResult<f64> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            Self::Str(s) => s.trim().parse().map_err(|_| mismatch("float", self)),
            Self::Bool(_) => Err(mismatch("float", self)),
        }
    }

    /// Convert to an integer. Floats truncate, strings are parsed.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch for booleans and unparsable strings.
    pub fn to_int(&self) -> PrgResult<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Float(v) => Ok(*v as i64),
            Self::Str(s) => s.trim().parse().map_err(|_| mismatch("int", self)),
            Self::Bool(_) => Err(mismatch("int", self)),
        }
    }

    /// Convert to a boolean. Only booleans convert.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch for every other type.
    pub fn to_bool(&self) -> PrgResult<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(mismatch("boolean", self)),
        }
    }

    /// Render as a string. Every type converts.
    #[must_use]
    pub fn to_string_value(&self) -> String {
        match self {
            Self::Float(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{s}\""),
            other => f.write_str(&other.to_string_value()),
        }
    }
}

fn mismatch(expected: &'static str, actual: &ExpressionValue) -> ProgramError {
    ProgramError::TypeMismatch {
        expected,
        actual: actual.value_type().name(),
    }
}

/// Addition; concatenates when either side is a string.
pub(crate) fn add(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<ExpressionValue> {
    use ExpressionValue::{Int, Str};
    match (a, b) {
        (Str(_), _) | (_, Str(_)) => Ok(Str(a.to_string_value() + &b.to_string_value())),
        (Int(x), Int(y)) => Ok(Int(x.wrapping_add(*y))),
        _ => Ok(ExpressionValue::Float(a.to_float()? + b.to_float()?)),
    }
}

pub(crate) fn sub(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<ExpressionValue> {
    match (a, b) {
        (ExpressionValue::Int(x), ExpressionValue::Int(y)) => {
            Ok(ExpressionValue::Int(x.wrapping_sub(*y)))
        }
        _ => Ok(ExpressionValue::Float(a.to_float()? - b.to_float()?)),
    }
}

pub(crate) fn mul(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<ExpressionValue> {
    match (a, b) {
        (ExpressionValue::Int(x), ExpressionValue::Int(y)) => {
            Ok(ExpressionValue::Int(x.wrapping_mul(*y)))
        }
        _ => Ok(ExpressionValue::Float(a.to_float()? * b.to_float()?)),
    }
}

/// Division; a zero divisor is an evaluation error.
pub(crate) fn div(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<ExpressionValue> {
    if let (ExpressionValue::Int(x), ExpressionValue::Int(y)) = (a, b) {
        if *y == 0 {
            return Err(ProgramError::DivisionByZero);
        }
        return Ok(ExpressionValue::Int(x.wrapping_div(*y)));
    }
    let denom = b.to_float()?;
    if denom.abs() < DEFAULT_DOUBLE_EQUAL {
        return Err(ProgramError::DivisionByZero);
    }
    Ok(ExpressionValue::Float(a.to_float()? / denom))
}

/// Protected division; a zero divisor yields 1.
pub(crate) fn protected_div(
    a: &ExpressionValue,
    b: &ExpressionValue,
) -> PrgResult<ExpressionValue> {
    if let (ExpressionValue::Int(x), ExpressionValue::Int(y)) = (a, b) {
        if *y == 0 {
            return Ok(ExpressionValue::Int(1));
        }
        return Ok(ExpressionValue::Int(x.wrapping_div(*y)));
    }
    let denom = b.to_float()?;
    if denom.abs() < DEFAULT_DOUBLE_EQUAL {
        return Ok(ExpressionValue::Float(1.0));
    }
    Ok(ExpressionValue::Float(a.to_float()? / denom))
}

pub(crate) fn pow(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<ExpressionValue> {
    Ok(ExpressionValue::Float(a.to_float()?.powf(b.to_float()?)))
}

/// Equality, typed by the left operand.
pub(crate) fn equ(a: &ExpressionValue, b: &ExpressionValue) -> PrgResult<bool> {
    match a {
        ExpressionValue::Bool(x) => Ok(*x == b.to_bool()?),
        ExpressionValue::Str(x) => Ok(*x == b.to_string_value()),
        _ => Ok((a.to_float()? - b.to_float()?).abs() < DEFAULT_DOUBLE_EQUAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_types() {
        let r = add(&ExpressionValue::Int(2), &ExpressionValue::Int(3)).unwrap();
        assert_eq!(r, ExpressionValue::Int(5));

        let r = add(&ExpressionValue::Int(2), &ExpressionValue::Float(0.5)).unwrap();
        assert_eq!(r, ExpressionValue::Float(2.5));

        let r = add(&ExpressionValue::Str("a".into()), &ExpressionValue::Int(1)).unwrap();
        assert_eq!(r, ExpressionValue::Str("a1".into()));
    }

    #[test]
    fn test_division() {
        assert_eq!(
            div(&ExpressionValue::Float(1.0), &ExpressionValue::Float(0.0)),
            Err(ProgramError::DivisionByZero)
        );
        assert_eq!(
            protected_div(&ExpressionValue::Float(1.0), &ExpressionValue::Float(0.0)).unwrap(),
            ExpressionValue::Float(1.0)
        );
        assert_eq!(
            div(&ExpressionValue::Int(7), &ExpressionValue::Int(2)).unwrap(),
            ExpressionValue::Int(3)
        );
    }

    #[test]
    fn test_bool_conversion_mismatch() {
        let err = ExpressionValue::Float(1.0).to_bool().unwrap_err();
        assert!(matches!(err, ProgramError::TypeMismatch { expected: "boolean", .. }));
        assert!(ExpressionValue::Bool(true).to_float().is_err());
    }

    #[test]
    fn test_type_set() {
        let set = TypeSet::NUMERIC;
        assert!(set.contains(ValueType::Float));
        assert!(set.contains(ValueType::Int));
        assert!(!set.contains(ValueType::Bool));
        assert_eq!(set.len(), 2);
        assert!(set.intersect(TypeSet::BOOL).is_empty());
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![ValueType::Float, ValueType::Int]);
    }

    #[test]
    fn test_tag_roundtrip() {
        for t in ValueType::ALL {
            assert_eq!(ValueType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(ValueType::from_tag(9), None);
    }
}
