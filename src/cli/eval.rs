//! CLI command for evaluating one program.

#![allow(clippy::needless_pass_by_value)]

use crate::cli::CliError;
use stackgp::persistence::load_program;
use stackgp::{ExpressionValue, Program, ProgramContext};
use std::path::PathBuf;
use std::sync::Arc;

/// Execute the eval command.
pub(crate) fn execute(
    expression: Option<String>,
    program: Option<PathBuf>,
    vars: Vec<String>,
    rpn: bool,
) -> Result<(), CliError> {
    let bindings = vars
        .iter()
        .map(|v| parse_binding(v))
        .collect::<Result<Vec<_>, _>>()?;

    let mut program = match (program, expression) {
        (Some(path), _) => load_program(&path)?,
        (None, Some(text)) => {
            let mut context = ProgramContext::with_all_functions();
            for (name, value) in &bindings {
                context.define_typed_variable(name, value.value_type())?;
            }
            Program::from_expression(Arc::new(context), &text)?
        }
        (None, None) => return Err(CliError::new("give an expression or --program")),
    };
    for (name, value) in bindings {
        program.set_variable_by_name(&name, value)?;
    }

    println!("{}", program.render_infix()?);
    if rpn {
        println!("{}", program.render_rpn()?);
    }
    println!("= {}", program.evaluate()?);
    Ok(())
}

/// Split `name=value`, typing the value as int, float, bool, then string.
fn parse_binding(text: &str) -> Result<(String, ExpressionValue), CliError> {
    let (name, raw) = text
        .split_once('=')
        .ok_or_else(|| CliError::new(format!("expected NAME=VALUE, got `{text}`")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::new(format!("missing variable name in `{text}`")));
    }
    let raw = raw.trim();
    let value = if let Ok(i) = raw.parse::<i64>() {
        ExpressionValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        ExpressionValue::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        ExpressionValue::Bool(b)
    } else {
        ExpressionValue::Str(raw.to_string())
    };
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding_types() {
        assert_eq!(parse_binding("n=3").unwrap().1, ExpressionValue::Int(3));
        assert_eq!(parse_binding("x = 2.5").unwrap().1, ExpressionValue::Float(2.5));
        assert_eq!(parse_binding("b=true").unwrap().1, ExpressionValue::Bool(true));
        assert_eq!(
            parse_binding("s=abc").unwrap(),
            ("s".to_string(), ExpressionValue::Str("abc".into()))
        );
        assert!(parse_binding("novalue").is_err());
        assert!(parse_binding("=1").is_err());
    }
}
