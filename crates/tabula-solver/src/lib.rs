mod problem;
mod simplex;
mod solution;
mod tableau;

pub use problem::{Constraint, LpProblem, Objective, ProblemError};
pub use simplex::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, Pivot, PivotOutcome, Solver};
pub use solution::{Extractor, Report, Solution, SolutionStatus};
pub use tableau::{Tableau, TableauError};
