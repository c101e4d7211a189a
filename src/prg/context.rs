//! Program context: enabled opcodes, variables and the result type.
//!
//! A context is built once and then shared by every program of a population
//! through an `Arc`.

use super::opcode::Opcode;
use super::value::{TypeSet, ValueType};
use crate::error::{ProgramError, PrgResult};
use serde::{Deserialize, Serialize};

/// A named, typed program variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMapping {
    /// Variable name as written in expressions.
    pub name: String,
    /// Declared type.
    pub variable_type: ValueType,
}

impl VariableMapping {
    /// Create a mapping.
    #[must_use]
    pub fn new(name: impl Into<String>, variable_type: ValueType) -> Self {
        Self {
            name: name.into(),
            variable_type,
        }
    }
}

/// The opcode set, variables and result type shared by a family of programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramContext {
    opcodes: Vec<Opcode>,
    variables: Vec<VariableMapping>,
    result: VariableMapping,
}

impl Default for ProgramContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramContext {
    /// An empty context producing floats.
    #[must_use]
    pub fn new() -> Self {
        Self {
            opcodes: Vec::new(),
            variables: Vec::new(),
            result: VariableMapping::new("result", ValueType::Float),
        }
    }

    /// A context with every opcode enabled.
    #[must_use]
    pub fn with_all_functions() -> Self {
        let mut ctx = Self::new();
        ctx.load_all_functions();
        ctx
    }

    /// Enable one opcode. Enabling twice is a no-op.
    pub fn enable(&mut self, opcode: Opcode) {
        if !self.opcodes.contains(&opcode) {
            self.opcodes.push(opcode);
        }
    }

    fn enable_all(&mut self, opcodes: &[Opcode]) {
        for &op in opcodes {
            self.enable(op);
        }
    }

    /// Enable every opcode.
    pub fn load_all_functions(&mut self) {
        self.enable_all(&Opcode::ALL);
    }

    /// Leaves plus arithmetic; `protected_div` picks `%` over `/`.
    pub fn enable_numeric_operators(&mut self, protected_div: bool) {
        use Opcode::{Add, Const, Div, Mul, Neg, Power, ProtectedDiv, Sub, Var};
        self.enable_all(&[Var, Const, Neg, Add, Sub, Mul]);
        self.enable(if protected_div { ProtectedDiv } else { Div });
        self.enable(Power);
    }

    /// `abs ceil exp floor log log10 max min pow round sqrt clamp`.
    pub fn enable_basic_functions(&mut self) {
        use Opcode::{Abs, Ceil, Clamp, Exp, Floor, Log, Log10, Max, Min, Pow, Round, Sqrt};
        self.enable_all(&[Abs, Ceil, Exp, Floor, Log, Log10, Max, Min, Pow, Round, Sqrt, Clamp]);
    }

    /// Trigonometric and hyperbolic functions.
    pub fn enable_trig_functions(&mut self) {
        use Opcode::{Acos, Asin, Atan, Atan2, Cos, Cosh, Sin, Sinh, Tan, Tanh, ToDeg, ToRad};
        self.enable_all(&[Acos, Asin, Atan, Atan2, Cos, Cosh, Sin, Sinh, Tan, Tanh, ToDeg, ToRad]);
    }

    /// Logical and comparison operators plus `iff`.
    pub fn enable_boolean_operators(&mut self) {
        use Opcode::{
            And, Equal, Greater, GreaterEqual, Iff, Less, LessEqual, Not, NotEqual, Or,
        };
        self.enable_all(&[
            And,
            Or,
            Equal,
            Less,
            Greater,
            LessEqual,
            GreaterEqual,
            Iff,
            NotEqual,
            Not,
        ]);
    }

    /// `cint cfloat cstr cbool`.
    pub fn enable_conversion_functions(&mut self) {
        self.enable_all(&[Opcode::CInt, Opcode::CFloat, Opcode::CStr, Opcode::CBool]);
    }

    /// `length left right`.
    pub fn enable_string_functions(&mut self) {
        self.enable_all(&[Opcode::Length, Opcode::Left, Opcode::Right]);
    }

    /// Enabled opcodes in the order they were enabled.
    #[must_use]
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    /// True if `opcode` is enabled.
    #[must_use]
    pub fn is_enabled(&self, opcode: Opcode) -> bool {
        self.opcodes.contains(&opcode)
    }

    /// Define a float variable.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::DuplicateVariable`] if the name is taken.
    pub fn define_variable(&mut self, name: &str) -> PrgResult<usize> {
        self.define_typed_variable(name, ValueType::Float)
    }

    /// Define a variable of the given type and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::DuplicateVariable`] if the name is taken.
    pub fn define_typed_variable(&mut self, name: &str, variable_type: ValueType) -> PrgResult<usize> {
        if self.variable_index(name).is_some() {
            return Err(ProgramError::DuplicateVariable(name.to_string()));
        }
        self.variables.push(VariableMapping::new(name, variable_type));
        Ok(self.variables.len() - 1)
    }

    /// Remove every variable.
    pub fn clear_defined_variables(&mut self) {
        self.variables.clear();
    }

    /// Defined variables in definition order.
    #[must_use]
    pub fn variables(&self) -> &[VariableMapping] {
        &self.variables
    }

    /// Index of the variable named `name`.
    #[must_use]
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Indices of variables whose type is in `types`.
    #[must_use]
    pub fn find_variables_by_types(&self, types: TypeSet) -> Vec<usize> {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| types.contains(v.variable_type))
            .map(|(i, _)| i)
            .collect()
    }

    /// The declared result.
    #[must_use]
    pub fn result(&self) -> &VariableMapping {
        &self.result
    }

    /// Set the program result type.
    pub fn set_result_type(&mut self, result_type: ValueType) {
        self.result.variable_type = result_type;
    }

    /// True if `opcode` can produce one of `types` given the defined variables.
    #[must_use]
    pub fn is_possible_return(&self, opcode: Opcode, types: TypeSet) -> bool {
        match opcode {
            Opcode::Var => !self.find_variables_by_types(types).is_empty(),
            Opcode::Const => !types.is_empty(),
            other => !other.template().returns.intersect(types).is_empty(),
        }
    }

    /// Enabled opcodes able to return one of `types`.
    ///
    /// Terminals are leaves (`#const`, `#var`); functions are everything else.
    #[must_use]
    pub fn find_opcodes(&self, types: TypeSet, include_terminal: bool, include_function: bool) -> Vec<Opcode> {
        self.opcodes
            .iter()
            .copied()
            .filter(|&op| self.is_possible_return(op, types))
            .filter(|op| if op.arity() == 0 { include_terminal } else { include_function })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_context() -> ProgramContext {
        let mut ctx = ProgramContext::new();
        ctx.enable_numeric_operators(true);
        ctx.define_variable("x").unwrap();
        ctx
    }

    #[test]
    fn test_duplicate_variable() {
        let mut ctx = numeric_context();
        assert_eq!(
            ctx.define_variable("x"),
            Err(ProgramError::DuplicateVariable("x".into()))
        );
        assert_eq!(ctx.define_variable("y").unwrap(), 1);
        assert_eq!(ctx.variable_index("y"), Some(1));
    }

    #[test]
    fn test_numeric_operators_protected() {
        let ctx = numeric_context();
        assert!(ctx.is_enabled(Opcode::ProtectedDiv));
        assert!(!ctx.is_enabled(Opcode::Div));
        assert!(ctx.is_enabled(Opcode::Power));
    }

    #[test]
    fn test_find_opcodes_split() {
        let ctx = numeric_context();
        let terminals = ctx.find_opcodes(TypeSet::FLOAT, true, false);
        assert_eq!(terminals, vec![Opcode::Var, Opcode::Const]);

        let functions = ctx.find_opcodes(TypeSet::FLOAT, false, true);
        assert!(functions.contains(&Opcode::Add));
        assert!(!functions.contains(&Opcode::Const));

        // No boolean-producing operators are enabled
        assert!(ctx.find_opcodes(TypeSet::BOOL, false, true).is_empty());
    }

    #[test]
    fn test_var_requires_matching_variable() {
        let ctx = numeric_context();
        assert!(ctx.is_possible_return(Opcode::Var, TypeSet::FLOAT));
        assert!(!ctx.is_possible_return(Opcode::Var, TypeSet::STR));
    }

    #[test]
    fn test_load_all_functions() {
        let ctx = ProgramContext::with_all_functions();
        assert_eq!(ctx.opcodes().len(), Opcode::ALL.len());
    }
}
