use crate::simplex::DEFAULT_TOLERANCE;
use crate::tableau::{Tableau, TableauError};

/// Variable values read off a terminal tableau
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Value of each structural variable
    pub values: Vec<f64>,
    /// Objective value recomputed from the original coefficients
    pub objective_value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The iteration cap ran out; the solution may not be optimal
    IterationLimit,
    /// The objective can grow without limit
    Unbounded,
    /// The ratio test found no leaving row
    InfeasiblePivot,
}

/// Everything the caller needs to report a solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Report {
    pub status: SolutionStatus,
    /// Present for `Optimal` and `IterationLimit`
    pub solution: Option<Solution>,
    /// Slack value of each constraint
    pub slack: Vec<f64>,
    /// Pivots performed
    pub iterations: usize,
    /// Terminal tableau, when the engine handed one back
    pub tableau: Option<Tableau>,
}

impl Report {
    pub(crate) fn failed(status: SolutionStatus, iterations: usize) -> Self {
        Self {
            status,
            solution: None,
            slack: Vec::new(),
            iterations,
            tableau: None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Indices of constraints whose slack is zero at the reported point
    pub fn binding_constraints(&self, tolerance: f64) -> Vec<usize> {
        self.slack
            .iter()
            .enumerate()
            .filter(|(_, s)| s.abs() <= tolerance)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Reads variable values off a terminal tableau.
///
/// A variable is basic only when its column is a clean unit vector over the
/// constraint rows: exactly one entry within tolerance of 1 and every other
/// entry within tolerance of 0. Anything else, including a column with a 1
/// in one row and a stray non-zero in another, is treated as non-basic and
/// the variable is 0.
///
/// Only the constraint rows are inspected, so a structural column that
/// happens to equal a basic slack column (one no pivot has touched) also
/// reads as basic and takes that slack's right-hand side. Basic values are
/// clamped at 0 to absorb negative rounding drift.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    tolerance: f64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Row holding the unit entry of column `col`, if the column is basic
    pub fn basic_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let mut one_row = None;
        for i in 1..=tableau.num_constraints() {
            let v = tableau.get(i, col);
            if (v - 1.0).abs() <= self.tolerance {
                if one_row.is_some() {
                    return None;
                }
                one_row = Some(i);
            } else if v.abs() > self.tolerance {
                return None;
            }
        }
        one_row
    }

    pub fn column_value(&self, tableau: &Tableau, col: usize) -> f64 {
        self.basic_row(tableau, col)
            .map_or(0.0, |row| tableau.rhs(row).max(0.0))
    }

    /// Values of the first `num_structural_vars` columns
    pub fn values(&self, tableau: &Tableau, num_structural_vars: usize) -> Result<Vec<f64>, TableauError> {
        if num_structural_vars > tableau.num_vars() {
            return Err(TableauError::TooManyStructural {
                requested: num_structural_vars,
                available: tableau.num_vars(),
            });
        }
        Ok((0..num_structural_vars)
            .map(|j| self.column_value(tableau, j))
            .collect())
    }

    /// Values for one structural variable per objective coefficient, plus
    /// the objective value computed from those coefficients rather than
    /// from the tableau's objective row.
    pub fn extract(&self, tableau: &Tableau, objective: &[f64]) -> Result<Solution, TableauError> {
        let values = self.values(tableau, objective.len())?;
        let objective_value = objective.iter().zip(&values).map(|(c, x)| c * x).sum();
        Ok(Solution {
            values,
            objective_value,
        })
    }
}
