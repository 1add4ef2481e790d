use thiserror::Error;

use crate::tableau::{Tableau, TableauError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Objective has {found} coefficients but the problem has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {constraint} has {found} coefficients but the problem has {expected} variables")]
    ConstraintLength {
        constraint: String,
        expected: usize,
        found: usize,
    },
    #[error("Constraint {constraint} has negative right-hand side {value}; an artificial variable would be required")]
    NegativeRhs { constraint: String, value: f64 },
    #[error("Invalid tableau: {0}")]
    Tableau(#[from] TableauError),
}

/// A linear program in `<=` standard form over non-negative variables
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Objective function
    pub objective: Objective,
    /// Constraints, each `coefficients . x <= rhs`
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Minimize instead of maximize
    #[cfg_attr(feature = "serde", serde(default))]
    pub minimize: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Right-hand side value
    pub rhs: f64,
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: false,
            },
            constraints: Vec::new(),
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(ProblemError::ConstraintLength {
                    constraint: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if c.rhs < 0.0 {
                return Err(ProblemError::NegativeRhs {
                    constraint: c.name.clone(),
                    value: c.rhs,
                });
            }
        }
        Ok(())
    }

    /// Build the initial tableau.
    ///
    /// Columns are the problem variables, then one slack per constraint, then
    /// the right-hand side. Row 0 holds the objective negated for
    /// maximization; a minimization is solved as maximizing `-c . x`, so its
    /// coefficients go in unchanged.
    pub fn to_tableau(&self) -> Result<Tableau, ProblemError> {
        self.validate()?;

        let n_vars = self.num_variables();
        let n_constraints = self.num_constraints();
        let total_cols = n_vars + n_constraints + 1;

        let mut data = vec![vec![0.0; total_cols]; n_constraints + 1];

        for (j, &coef) in self.objective.coefficients.iter().enumerate() {
            data[0][j] = if self.objective.minimize { coef } else { -coef };
        }

        for (i, c) in self.constraints.iter().enumerate() {
            let row = &mut data[i + 1];
            row[..n_vars].copy_from_slice(&c.coefficients);
            row[n_vars + i] = 1.0;
            row[total_cols - 1] = c.rhs;
        }

        Ok(Tableau::new(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production_plan() -> LpProblem {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![3.0, 5.0], false);
        problem.add_constraint("plant1", vec![1.0, 0.0], 4.0);
        problem.add_constraint("plant2", vec![0.0, 2.0], 12.0);
        problem.add_constraint("plant3", vec![3.0, 2.0], 18.0);
        problem
    }

    #[test]
    fn test_tableau_layout() {
        let tableau = production_plan().to_tableau().unwrap();
        assert_eq!(tableau.num_constraints(), 3);
        assert_eq!(tableau.num_vars(), 5);
        assert_eq!(tableau.row(0), &[-3.0, -5.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(tableau.row(1), &[1.0, 0.0, 1.0, 0.0, 0.0, 4.0]);
        assert_eq!(tableau.row(2), &[0.0, 2.0, 0.0, 1.0, 0.0, 12.0]);
        assert_eq!(tableau.row(3), &[3.0, 2.0, 0.0, 0.0, 1.0, 18.0]);
    }

    #[test]
    fn test_minimize_keeps_coefficients() {
        let mut problem = production_plan();
        problem.set_objective(vec![2.0, -1.0], true);
        let tableau = problem.to_tableau().unwrap();
        assert_eq!(&tableau.objective_row()[..2], &[2.0, -1.0]);
    }

    #[test]
    fn test_rejects_negative_rhs() {
        let mut problem = production_plan();
        problem.add_constraint("floor", vec![-1.0, -1.0], -2.0);
        let err = problem.to_tableau().unwrap_err();
        assert_eq!(
            err,
            ProblemError::NegativeRhs {
                constraint: "floor".to_string(),
                value: -2.0
            }
        );
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut problem = production_plan();
        problem.add_constraint("short", vec![1.0], 2.0);
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::ConstraintLength { found: 1, .. })
        ));

        let mut problem = production_plan();
        problem.set_objective(vec![1.0, 2.0, 3.0], false);
        assert!(matches!(
            problem.to_tableau(),
            Err(ProblemError::ObjectiveLength { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_non_finite_surfaces_as_tableau_error() {
        let mut problem = production_plan();
        problem.add_constraint("bad", vec![f64::INFINITY, 0.0], 1.0);
        assert!(matches!(
            problem.to_tableau(),
            Err(ProblemError::Tableau(TableauError::NonFinite { row: 4, col: 0 }))
        ));
    }
}
