//! Argument lists of resolved calls

use crate::ast::{Expr, ResolvedArgument};
use crate::common::error::{Error, Result};

use super::jvm_type::JvmType;

/// Receives each argument of a call in parameter order
pub trait ArgumentGenerator {
    fn generate_expression(&mut self, index: usize, expr: &Expr, ty: &JvmType) -> Result<()>;

    /// Placeholder for a parameter the callee fills from its default value
    fn generate_default(&mut self, index: usize, ty: &JvmType) -> Result<()>;

    fn generate_vararg(&mut self, index: usize, elements: &[Expr], ty: &JvmType) -> Result<()>;
}

/// Emits every argument and returns the default mask: bit `i` is set
/// exactly when parameter `i` takes its default value.
pub fn generate_arguments<G>(generator: &mut G, arguments: &[ResolvedArgument], parameter_types: &[JvmType]) -> Result<u32>
where
    G: ArgumentGenerator + ?Sized,
{
    if arguments.len() != parameter_types.len() {
        return Err(Error::internal(format!(
            "{} arguments resolved for {} parameters",
            arguments.len(),
            parameter_types.len()
        )));
    }
    if arguments.len() > 32 {
        return Err(Error::internal(format!("{} parameters do not fit a default mask", arguments.len())));
    }
    let mut mask = 0u32;
    for (index, (argument, ty)) in arguments.iter().zip(parameter_types).enumerate() {
        match argument {
            ResolvedArgument::Expression(expr) => generator.generate_expression(index, expr, ty)?,
            ResolvedArgument::Default => {
                generator.generate_default(index, ty)?;
                mask |= 1 << index;
            }
            ResolvedArgument::Vararg(elements) => generator.generate_vararg(index, elements, ty)?,
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ArgumentGenerator for Recorder {
        fn generate_expression(&mut self, index: usize, _expr: &Expr, _ty: &JvmType) -> Result<()> {
            self.events.push(format!("expr {}", index));
            Ok(())
        }

        fn generate_default(&mut self, index: usize, _ty: &JvmType) -> Result<()> {
            self.events.push(format!("default {}", index));
            Ok(())
        }

        fn generate_vararg(&mut self, index: usize, elements: &[Expr], _ty: &JvmType) -> Result<()> {
            self.events.push(format!("vararg {} x{}", index, elements.len()));
            Ok(())
        }
    }

    #[test]
    fn test_mask_marks_only_defaults() {
        let arguments = vec![
            ResolvedArgument::Expression(Expr::int(1)),
            ResolvedArgument::Default,
            ResolvedArgument::Vararg(vec![Expr::int(2), Expr::int(3)]),
            ResolvedArgument::Default,
        ];
        let types = vec![JvmType::Int, JvmType::Int, JvmType::array_of(JvmType::Int), JvmType::Int];
        let mut recorder = Recorder::default();
        let mask = generate_arguments(&mut recorder, &arguments, &types).unwrap();
        assert_eq!(mask, 0b1010);
        assert_eq!(recorder.events, vec!["expr 0", "default 1", "vararg 2 x2", "default 3"]);
    }

    #[test]
    fn test_arity_mismatch_is_internal() {
        let mut recorder = Recorder::default();
        let err = generate_arguments(&mut recorder, &[ResolvedArgument::Default], &[]).unwrap_err();
        assert!(err.is_internal());
    }
}
