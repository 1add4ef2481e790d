use crate::problem::{LpProblem, ProblemError};
use crate::solution::{Extractor, Report, SolutionStatus};
use crate::tableau::Tableau;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Terminal state of the pivoting loop
#[derive(Debug, Clone, PartialEq)]
pub enum PivotOutcome {
    /// Every objective row coefficient is non-negative
    Optimal(Tableau),
    /// The entering column has no positive constraint entry
    Unbounded { column: usize },
    /// The ratio test produced no usable leaving row
    InfeasiblePivot { column: usize },
    /// The cap ran out before optimality; the tableau is a best effort
    IterationLimitReached(Tableau),
}

impl PivotOutcome {
    pub fn tableau(&self) -> Option<&Tableau> {
        match self {
            PivotOutcome::Optimal(t) | PivotOutcome::IterationLimitReached(t) => Some(t),
            PivotOutcome::Unbounded { .. } | PivotOutcome::InfeasiblePivot { .. } => None,
        }
    }

    pub fn into_tableau(self) -> Option<Tableau> {
        match self {
            PivotOutcome::Optimal(t) | PivotOutcome::IterationLimitReached(t) => Some(t),
            PivotOutcome::Unbounded { .. } | PivotOutcome::InfeasiblePivot { .. } => None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, PivotOutcome::Optimal(_))
    }
}

impl From<&PivotOutcome> for SolutionStatus {
    fn from(outcome: &PivotOutcome) -> Self {
        match outcome {
            PivotOutcome::Optimal(_) => SolutionStatus::Optimal,
            PivotOutcome::IterationLimitReached(_) => SolutionStatus::IterationLimit,
            PivotOutcome::Unbounded { .. } => SolutionStatus::Unbounded,
            PivotOutcome::InfeasiblePivot { .. } => SolutionStatus::InfeasiblePivot,
        }
    }
}

/// One pivot performed by the engine
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pivot {
    /// 1-based pivot count
    pub iteration: usize,
    /// Leaving row
    pub row: usize,
    /// Entering column
    pub column: usize,
}

enum Step {
    Optimal,
    Pivoted { row: usize, column: usize },
    Unbounded { column: usize },
    InfeasiblePivot { column: usize },
}

/// Tableau simplex solver for maximization in `<=` standard form
#[derive(Debug, Clone, Copy)]
pub struct Solver {
    /// Maximum pivots before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Run the simplex iterations on a tableau whose objective row is
    /// already negated and whose slack columns form an identity basis.
    pub fn solve(&self, tableau: Tableau) -> PivotOutcome {
        self.solve_with(tableau, |_, _| {})
    }

    /// Like [`Solver::solve`], calling `on_pivot` after every pivot with the
    /// updated tableau
    pub fn solve_with<F>(&self, mut tableau: Tableau, mut on_pivot: F) -> PivotOutcome
    where
        F: FnMut(&Pivot, &Tableau),
    {
        for iteration in 1..=self.max_iterations {
            match self.step(&mut tableau) {
                Step::Optimal => return PivotOutcome::Optimal(tableau),
                Step::Pivoted { row, column } => {
                    on_pivot(&Pivot { iteration, row, column }, &tableau);
                }
                Step::Unbounded { column } => return PivotOutcome::Unbounded { column },
                Step::InfeasiblePivot { column } => {
                    return PivotOutcome::InfeasiblePivot { column };
                }
            }
        }

        // The last allowed pivot may have reached the optimum
        if self.is_optimal(&tableau) {
            PivotOutcome::Optimal(tableau)
        } else {
            PivotOutcome::IterationLimitReached(tableau)
        }
    }

    /// True when no objective row coefficient is below `-tolerance`
    pub fn is_optimal(&self, tableau: &Tableau) -> bool {
        let n_vars = tableau.num_vars();
        tableau.objective_row()[..n_vars]
            .iter()
            .all(|&c| c >= -self.tolerance)
    }

    fn step(&self, tableau: &mut Tableau) -> Step {
        let Some(column) = self.find_pivot_column(tableau) else {
            return Step::Optimal;
        };
        if self.is_unbounded_column(tableau, column) {
            return Step::Unbounded { column };
        }
        let Some(row) = self.find_pivot_row(tableau, column) else {
            return Step::InfeasiblePivot { column };
        };
        tableau.pivot(row, column);
        Step::Pivoted { row, column }
    }

    /// Most negative objective coefficient; the leftmost one wins ties
    fn find_pivot_column(&self, tableau: &Tableau) -> Option<usize> {
        let n_vars = tableau.num_vars();

        let mut min_val = -self.tolerance;
        let mut min_col = None;

        for (j, &c) in tableau.objective_row()[..n_vars].iter().enumerate() {
            if c < min_val {
                min_val = c;
                min_col = Some(j);
            }
        }

        min_col
    }

    fn is_unbounded_column(&self, tableau: &Tableau, col: usize) -> bool {
        (1..=tableau.num_constraints()).all(|i| tableau.get(i, col) <= self.tolerance)
    }

    /// Minimum ratio test; the topmost row wins ties
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.rhs_col();

        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 1..=tableau.num_constraints() {
            let val = tableau.get(i, col);
            if val > self.tolerance {
                // Overflowed ratios stay at infinity and are never chosen
                let ratio = tableau.get(i, rhs_col) / val;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    /// Build, solve and extract a problem in one go
    pub fn solve_problem(&self, problem: &LpProblem) -> Result<Report, ProblemError> {
        self.solve_problem_with(problem, |_, _| {})
    }

    pub fn solve_problem_with<F>(&self, problem: &LpProblem, mut on_pivot: F) -> Result<Report, ProblemError>
    where
        F: FnMut(&Pivot, &Tableau),
    {
        let tableau = problem.to_tableau()?;

        let mut iterations = 0;
        let outcome = self.solve_with(tableau, |pivot, tableau| {
            iterations = pivot.iteration;
            on_pivot(pivot, tableau);
        });

        let status = SolutionStatus::from(&outcome);
        let Some(tableau) = outcome.into_tableau() else {
            return Ok(Report::failed(status, iterations));
        };

        let extractor = Extractor::new().with_tolerance(self.tolerance);
        let solution = extractor.extract(&tableau, &problem.objective.coefficients)?;
        let n_vars = problem.num_variables();
        let slack = (0..problem.num_constraints())
            .map(|i| extractor.column_value(&tableau, n_vars + i))
            .collect();

        Ok(Report {
            status,
            solution: Some(solution),
            slack,
            iterations,
            tableau: Some(tableau),
        })
    }
}
