use std::collections::HashMap;

use log::debug;
use tabula_solver::{LpProblem, ProblemError};
use thiserror::Error;

use crate::ast::*;
use crate::lexer::Span;
use crate::parser::{ParseError, Parser};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Missing objective: add a line starting with max or min")]
    MissingObjective,
    #[error("Duplicate objective at position {span:?}")]
    DuplicateObjective { span: Span },
    #[error("The model has no variables")]
    NoVariables,
    #[error(
        "Constraint {constraint} has right-hand side {value} once written as <=; \
         negative right-hand sides need an artificial variable, which is not supported"
    )]
    NegativeRhs {
        constraint: String,
        value: f64,
        span: Span,
    },
    #[error("Invalid problem: {0}")]
    Problem(#[from] ProblemError),
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Parse(e) => e.span(),
            CompileError::DuplicateObjective { span } | CompileError::NegativeRhs { span, .. } => {
                Some(*span)
            }
            CompileError::MissingObjective | CompileError::NoVariables | CompileError::Problem(_) => None,
        }
    }
}

/// Lowers a parsed model into a `<=` standard-form [`LpProblem`].
///
/// Variables are numbered in order of first appearance, objective first.
/// Every constraint is rewritten as `row . x <= rhs`: variables move to the
/// left, constants to the right, `>=` is negated and `=` becomes a pair.
/// Lone non-negativity bounds such as `x >= 0` are implied and dropped.
#[derive(Debug, Default)]
pub struct Compiler {
    variables: Vec<String>,
    index: HashMap<String, usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_source(source: &str) -> Result<LpProblem, CompileError> {
        let program = Parser::parse(source)?;
        Compiler::new().compile(&program)
    }

    pub fn compile(&mut self, program: &Program) -> Result<LpProblem, CompileError> {
        self.variables.clear();
        self.index.clear();

        let mut objectives = program.objectives();
        let objective = objectives.next().ok_or(CompileError::MissingObjective)?;
        if let Some(duplicate) = objectives.next() {
            return Err(CompileError::DuplicateObjective {
                span: duplicate.span,
            });
        }

        self.register(&objective.expr);
        for c in program.constraints() {
            self.register(&c.lhs);
            self.register(&c.rhs);
        }
        if self.variables.is_empty() {
            return Err(CompileError::NoVariables);
        }

        let mut coefficients = vec![0.0; self.variables.len()];
        for (name, coef) in objective.expr.variables() {
            coefficients[self.index[name]] += coef;
        }
        if objective.expr.constant() != 0.0 {
            debug!("Dropping constant {} from the objective", objective.expr.constant());
        }

        let mut problem = LpProblem::new(self.variables.clone());
        problem.set_objective(coefficients, objective.sense == Sense::Minimize);

        for (k, c) in program.constraints().enumerate() {
            let name = c.label.clone().unwrap_or_else(|| format!("c{}", k + 1));
            let (row, rhs) = self.normalize(c);

            match c.relation {
                Relation::Le => self.push(&mut problem, name, row, rhs, c.span)?,
                Relation::Ge => self.push(&mut problem, name, negate(&row), -rhs + 0.0, c.span)?,
                Relation::Eq => {
                    let lower = negate(&row);
                    self.push(&mut problem, format!("{}.le", name), row, rhs, c.span)?;
                    self.push(&mut problem, format!("{}.ge", name), lower, -rhs + 0.0, c.span)?;
                }
            }
        }

        problem.validate()?;

        debug!(
            "Compiled {} variables and {} constraints",
            problem.num_variables(),
            problem.num_constraints()
        );

        Ok(problem)
    }

    fn register(&mut self, expr: &LinearExpr) {
        for (name, _) in expr.variables() {
            if !self.index.contains_key(name) {
                self.index.insert(name.to_string(), self.variables.len());
                self.variables.push(name.to_string());
            }
        }
    }

    /// `lhs - rhs` over the variables, and the constants moved to the right
    fn normalize(&self, c: &Constraint) -> (Vec<f64>, f64) {
        let mut row = vec![0.0; self.variables.len()];
        for (name, coef) in c.lhs.variables() {
            row[self.index[name]] += coef;
        }
        for (name, coef) in c.rhs.variables() {
            row[self.index[name]] -= coef;
        }
        (row, c.rhs.constant() - c.lhs.constant())
    }

    fn push(
        &self,
        problem: &mut LpProblem,
        name: String,
        row: Vec<f64>,
        rhs: f64,
        span: Span,
    ) -> Result<(), CompileError> {
        if is_non_negativity(&row, rhs) {
            debug!("Dropping implied bound {}", name);
            return Ok(());
        }
        if rhs < 0.0 {
            return Err(CompileError::NegativeRhs {
                constraint: name,
                value: rhs,
                span,
            });
        }
        problem.add_constraint(name, row, rhs);
        Ok(())
    }
}

// `0.0` is added so zeros never come out as `-0.0`
fn negate(row: &[f64]) -> Vec<f64> {
    row.iter().map(|v| -v + 0.0).collect()
}

/// `-a x <= 0` with `a > 0`, i.e. `x >= 0`
fn is_non_negativity(row: &[f64], rhs: f64) -> bool {
    let mut nonzero = row.iter().filter(|v| **v != 0.0);
    rhs == 0.0 && matches!((nonzero.next(), nonzero.next()), (Some(v), None) if *v < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_solver::{SolutionStatus, Solver};

    const PRODUCTION: &str = r#"
        maximize 3x + 5y
        subject to
        plant1: x <= 4
        plant2: 2y <= 12
        plant3: 3x + 2y <= 18
        x >= 0
        y >= 0
    "#;

    #[test]
    fn test_compile_production_plan() {
        let problem = Compiler::compile_source(PRODUCTION).unwrap();
        assert_eq!(problem.variables, vec!["x", "y"]);
        assert_eq!(problem.objective.coefficients, vec![3.0, 5.0]);
        assert!(!problem.objective.minimize);

        let names: Vec<_> = problem.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["plant1", "plant2", "plant3"]);
        assert_eq!(problem.constraints[2].coefficients, vec![3.0, 2.0]);
        assert_eq!(problem.constraints[2].rhs, 18.0);
    }

    #[test]
    fn test_solve_production_plan() {
        let problem = Compiler::compile_source(PRODUCTION).unwrap();
        let report = Solver::new().solve_problem(&problem).unwrap();
        assert_eq!(report.status, SolutionStatus::Optimal);

        let solution = report.solution.unwrap();
        assert!((solution.values[0] - 2.0).abs() < 1e-9, "x = {} (expected 2)", solution.values[0]);
        assert!((solution.values[1] - 6.0).abs() < 1e-9, "y = {} (expected 6)", solution.values[1]);
        assert!((solution.objective_value - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_ge_is_negated() {
        let problem = Compiler::compile_source("max x\n-x - y >= -4").unwrap();
        assert_eq!(problem.variables, vec!["x", "y"]);
        assert_eq!(problem.constraints[0].name, "c1");
        assert_eq!(problem.constraints[0].coefficients, vec![1.0, 1.0]);
        assert_eq!(problem.constraints[0].rhs, 4.0);
    }

    #[test]
    fn test_terms_move_across_relation() {
        let problem = Compiler::compile_source("max x + y\nx + 1 <= y + 3\nx + x <= 8").unwrap();
        assert_eq!(problem.constraints[0].coefficients, vec![1.0, -1.0]);
        assert_eq!(problem.constraints[0].rhs, 2.0);
        assert_eq!(problem.constraints[1].coefficients, vec![2.0, 0.0]);
    }

    #[test]
    fn test_equality_becomes_pair() {
        let problem = Compiler::compile_source("max x\nbal: x - y = 0").unwrap();
        let names: Vec<_> = problem.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["bal.le", "bal.ge"]);
        assert_eq!(problem.constraints[1].coefficients, vec![-1.0, 1.0]);
        assert_eq!(problem.constraints[1].rhs, 0.0);
    }

    #[test]
    fn test_negative_rhs_is_rejected() {
        let err = Compiler::compile_source("min x + y\ndemand: x + y >= 2").unwrap_err();
        match err {
            CompileError::NegativeRhs { constraint, value, span } => {
                assert_eq!(constraint, "demand");
                assert_eq!(value, -2.0);
                assert_eq!(span.start, 10);
            }
            other => panic!("Expected negative rhs, got {:?}", other),
        }
    }

    #[test]
    fn test_objective_errors() {
        assert_eq!(
            Compiler::compile_source("x <= 4").unwrap_err(),
            CompileError::MissingObjective
        );
        assert!(matches!(
            Compiler::compile_source("max x\nmin x").unwrap_err(),
            CompileError::DuplicateObjective { .. }
        ));
        assert_eq!(Compiler::compile_source("max 3").unwrap_err(), CompileError::NoVariables);
    }

    #[test]
    fn test_parse_error_passes_through() {
        let err = Compiler::compile_source("max x\nx <= 4 4").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert!(err.span().is_some());
    }

    #[test]
    fn test_constraint_only_variable_has_zero_cost() {
        let problem = Compiler::compile_source("min x\nx + s <= 10").unwrap();
        assert_eq!(problem.variables, vec!["x", "s"]);
        assert_eq!(problem.objective.coefficients, vec![1.0, 0.0]);
        assert!(problem.objective.minimize);
    }
}
