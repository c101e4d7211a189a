use super::simple::recoverable;
use crate::ea::CalculateScore;
use crate::error::EaResult;
use crate::prg::Program;

/// Scores 0.0 if the program evaluates with every input at zero, NaN if it
/// fails. Used to reject broken programs during generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroEvalScore;

impl CalculateScore<Program> for ZeroEvalScore {
    fn calculate_score(&self, genome: &Program) -> EaResult<f64> {
        let zeros = vec![0.0; genome.context().variables().len()];
        Ok(match recoverable(genome.compute(&zeros))? {
            Some(_) => 0.0,
            None => f64::NAN,
        })
    }

    fn should_minimize(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::ProgramContext;
    use std::sync::Arc;

    #[test]
    fn test_zero_eval() {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let ctx = Arc::new(ctx);
        let ok = Program::from_expression(Arc::clone(&ctx), "x + 1").unwrap();
        assert_eq!(ZeroEvalScore.calculate_score(&ok).unwrap(), 0.0);
        let broken = Program::from_expression(ctx, "1 / x").unwrap();
        assert!(ZeroEvalScore.calculate_score(&broken).unwrap().is_nan());
    }
}
