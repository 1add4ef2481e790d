use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use tabula_lang::Compiler;
use tabula_solver::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, Extractor, LpProblem, Pivot, PivotOutcome, Report, SolutionStatus,
    Solver, Tableau,
};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Solve small linear programs with the tableau simplex method", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a model and print the optimal solution
    Solve {
        /// The model file
        file: PathBuf,
        #[command(flatten)]
        options: SolveOptions,
        /// Print the tableau after every pivot
        #[arg(short, long)]
        trace: bool,
    },
    /// Print the initial tableau of a model
    Tableau {
        /// The model file
        file: PathBuf,
    },
    /// Solve a raw tableau given as a JSON array of rows
    Pivot {
        /// JSON file; row 0 is the negated objective, slack columns form an identity block
        file: PathBuf,
        /// Number of leading structural variable columns
        #[arg(short, long)]
        structural: usize,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Check a model file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct SolveOptions {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    format: Format,
    /// Maximum number of pivots
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,
}

impl SolveOptions {
    fn solver(&self) -> Solver {
        Solver::new()
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Solve { file, options, trace } => {
            let problem = load_problem(&file);
            let solver = options.solver();
            debug!(
                "Solving {} with max_iterations={} tolerance={:e}",
                file.display(),
                solver.max_iterations(),
                solver.tolerance()
            );

            let result = if trace {
                let format = options.format;
                let initial = initial_tableau(&problem);
                emit_trace(format, &format!("Initial tableau:\n{}", tableau_text(&problem, &initial)));
                solver.solve_problem_with(&problem, |pivot, tableau| {
                    emit_trace(format, &pivot_text(&problem, pivot, tableau));
                })
            } else {
                solver.solve_problem(&problem)
            };

            let report = match result {
                Ok(r) => r,
                Err(e) => fail(&format!("Problem error: {}", e)),
            };
            info!("Finished after {} pivots with status {:?}", report.iterations, report.status);

            match options.format {
                Format::Json => print_json(&report_json(&problem, &report, options.tolerance)),
                Format::Pretty => print_report(&problem, &report, options.tolerance),
            }
            exit_for(report.status);
        }
        Commands::Tableau { file } => {
            let problem = load_problem(&file);
            print!("{}", tableau_text(&problem, &initial_tableau(&problem)));
        }
        Commands::Pivot {
            file,
            structural,
            options,
        } => {
            let source = read_source(&file);
            let tableau: Tableau = match serde_json::from_str(&source) {
                Ok(t) => t,
                Err(e) => fail(&format!("Invalid tableau: {}", e)),
            };
            let objective = match tableau.objective_coefficients(structural) {
                Ok(c) => c,
                Err(e) => fail(&format!("Invalid tableau: {}", e)),
            };

            let outcome = options.solver().solve(tableau);
            match &outcome {
                PivotOutcome::Unbounded { column } => {
                    debug!("Entering column {} has no positive entry", column);
                }
                PivotOutcome::InfeasiblePivot { column } => {
                    debug!("Ratio test failed for entering column {}", column);
                }
                PivotOutcome::Optimal(_) | PivotOutcome::IterationLimitReached(_) => {}
            }
            let status = SolutionStatus::from(&outcome);

            let solution = outcome.tableau().map(|t| {
                Extractor::new()
                    .with_tolerance(options.tolerance)
                    .extract(t, &objective)
            });
            let solution = match solution.transpose() {
                Ok(s) => s,
                Err(e) => fail(&format!("Invalid tableau: {}", e)),
            };

            match options.format {
                Format::Json => print_json(&serde_json::json!({
                    "status": status,
                    "solution": solution,
                    "tableau": outcome.tableau(),
                })),
                Format::Pretty => {
                    print_status(status);
                    if let (Some(solution), Some(tableau)) = (&solution, outcome.tableau()) {
                        println!("Objective: {:.4}", solution.objective_value);
                        println!();
                        println!("Variables:");
                        for (j, value) in solution.values.iter().enumerate() {
                            println!("  x{:<19} {:12.4}", j + 1, value);
                        }
                        println!();
                        println!("Final tableau:");
                        print!("{}", tableau);
                    }
                }
            }
            exit_for(status);
        }
        Commands::Check { file } => {
            let problem = load_problem(&file);
            println!("✓ {} is valid", file.display());
            println!(
                "  {} ({})",
                if problem.objective.minimize { "minimize" } else { "maximize" },
                problem.variables.join(", ")
            );
            println!("  {} variables", problem.num_variables());
            println!("  {} constraints", problem.num_constraints());
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn read_source(file: &Path) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => fail(&format!("Error reading file: {}", e)),
    }
}

fn load_problem(file: &Path) -> LpProblem {
    let source = read_source(file);
    match Compiler::compile_source(&source) {
        Ok(p) => {
            debug!(
                "Loaded {} with {} variables and {} constraints",
                file.display(),
                p.num_variables(),
                p.num_constraints()
            );
            p
        }
        Err(e) => {
            let location = e
                .span()
                .map(|s| format!(" at {}", line_col(&source, s.start)))
                .unwrap_or_default();
            fail(&format!("✗ {}{}: {}", file.display(), location, e))
        }
    }
}

/// 1-based `line:column` of a byte offset
fn line_col(source: &str, offset: usize) -> String {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let col = prefix.rfind('\n').map_or(prefix.len(), |i| prefix.len() - i - 1) + 1;
    format!("{}:{}", line, col)
}

fn exit_for(status: SolutionStatus) {
    match status {
        SolutionStatus::Optimal | SolutionStatus::IterationLimit => {}
        SolutionStatus::Unbounded | SolutionStatus::InfeasiblePivot => std::process::exit(1),
    }
}

fn print_status(status: SolutionStatus) {
    match status {
        SolutionStatus::Optimal => println!("Status: OPTIMAL"),
        SolutionStatus::IterationLimit => {
            warn!("Maximum iterations reached");
            println!("Status: ITERATION LIMIT");
            println!("Maximum iterations reached. Solution may not be optimal.");
        }
        SolutionStatus::Unbounded => {
            println!("Status: UNBOUNDED");
            println!("Problem is unbounded: no valid pivot row found.");
        }
        SolutionStatus::InfeasiblePivot => {
            println!("Status: INFEASIBLE PIVOT");
            println!("No feasible pivot found.");
        }
    }
}

fn print_report(problem: &LpProblem, report: &Report, tolerance: f64) {
    print_status(report.status);

    let Some(solution) = &report.solution else {
        println!("The simplex algorithm could not find a solution.");
        return;
    };

    println!("Objective: {:.4}", solution.objective_value);
    println!("Pivots: {}", report.iterations);
    println!();
    println!("Variables:");
    for (name, value) in problem.variables.iter().zip(&solution.values) {
        println!("  {:20} {:12.4}", name, value);
    }

    println!();
    println!("Constraints:");
    let binding = report.binding_constraints(tolerance);
    for (i, (c, slack)) in problem.constraints.iter().zip(&report.slack).enumerate() {
        let note = if binding.contains(&i) { "binding" } else { "" };
        println!("  {:20} slack {:12.4}  {}", c.name, slack, note);
    }
}

fn report_json(problem: &LpProblem, report: &Report, tolerance: f64) -> serde_json::Value {
    let binding = report.binding_constraints(tolerance);
    let variables: Vec<_> = match &report.solution {
        Some(solution) => problem
            .variables
            .iter()
            .zip(&solution.values)
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect(),
        None => Vec::new(),
    };
    let constraints: Vec<_> = problem
        .constraints
        .iter()
        .zip(&report.slack)
        .enumerate()
        .map(|(i, (c, slack))| {
            serde_json::json!({ "name": c.name, "slack": slack, "binding": binding.contains(&i) })
        })
        .collect();

    serde_json::json!({
        "status": report.status,
        "objective_value": report.solution.as_ref().map(|s| s.objective_value),
        "iterations": report.iterations,
        "variables": variables,
        "constraints": constraints,
        "tableau": report.tableau,
    })
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(&format!("Error writing JSON: {}", e)),
    }
}

fn initial_tableau(problem: &LpProblem) -> Tableau {
    match problem.to_tableau() {
        Ok(t) => t,
        Err(e) => fail(&format!("Problem error: {}", e)),
    }
}

fn tableau_text(problem: &LpProblem, tableau: &Tableau) -> String {
    let mut text = String::new();
    for name in &problem.variables {
        text.push_str(&format!("{:>10}", truncate(name, 9)));
    }
    for i in 0..problem.num_constraints() {
        text.push_str(&format!("{:>10}", format!("s{}", i + 1)));
    }
    text.push_str(&format!(" | {:>10}\n", "rhs"));
    text.push_str(&tableau.to_string());
    text
}

fn pivot_text(problem: &LpProblem, pivot: &Pivot, tableau: &Tableau) -> String {
    let entering = problem
        .variables
        .get(pivot.column)
        .cloned()
        .unwrap_or_else(|| format!("s{}", pivot.column - problem.num_variables() + 1));
    format!(
        "\nPivot {}: {} enters, row {} leaves\n{}",
        pivot.iteration,
        entering,
        pivot.row,
        tableau_text(problem, tableau)
    )
}

/// Stdout is reserved for the JSON document in JSON mode
fn trace_to_stderr(format: Format) -> bool {
    format == Format::Json
}

fn emit_trace(format: Format, text: &str) {
    if trace_to_stderr(format) {
        eprint!("{}", text);
    } else {
        print!("{}", text);
    }
}

fn truncate(name: &str, max: usize) -> &str {
    match name.char_indices().nth(max) {
        Some((i, _)) => &name[..i],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let source = "max x\nx <= 4 4";
        assert_eq!(line_col(source, 0), "1:1");
        assert_eq!(line_col(source, 6), "2:1");
        assert_eq!(line_col(source, 13), "2:8");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("capacity", 9), "capacity");
        assert_eq!(truncate("very_long_name", 9), "very_long");
    }

    #[test]
    fn test_report_json_shape() {
        let problem = Compiler::compile_source("max 3x + 5y\nx <= 4\n2y <= 12\n3x + 2y <= 18").unwrap();
        let report = Solver::new().solve_problem(&problem).unwrap();
        let json = report_json(&problem, &report, DEFAULT_TOLERANCE);

        assert_eq!(json["status"], "Optimal");
        assert_eq!(json["iterations"], 2);
        assert_eq!(json["variables"][1]["name"], "y");
        assert_eq!(json["constraints"][0]["binding"], false);
        assert_eq!(json["constraints"][2]["binding"], true);
        assert_eq!(json["tableau"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn test_trace_text() {
        let problem = Compiler::compile_source("max 3x + 5y\nx <= 4\n2y <= 12\n3x + 2y <= 18").unwrap();
        let mut pivots = Vec::new();
        Solver::new()
            .solve_problem_with(&problem, |pivot, tableau| pivots.push(pivot_text(&problem, pivot, tableau)))
            .unwrap();

        assert_eq!(pivots.len(), 2);
        assert!(pivots[0].starts_with("\nPivot 1: y enters, row 2 leaves\n"), "{}", pivots[0]);
        assert!(pivots[1].contains("Pivot 2: x enters, row 3 leaves"), "{}", pivots[1]);
        assert!(pivots[1].contains("s3"));
    }

    #[test]
    fn test_json_trace_goes_to_stderr() {
        assert!(trace_to_stderr(Format::Json));
        assert!(!trace_to_stderr(Format::Pretty));
    }

    #[test]
    fn test_pivot_input_is_validated() {
        let tableau: Tableau = serde_json::from_str("[[-3,-5,0,0,0],[1,0,1,0,4],[0,2,0,1,12]]").unwrap();
        assert_eq!(tableau.rows()[2], vec![0.0, 2.0, 0.0, 1.0, 12.0]);
        let json = serde_json::to_string(&tableau).unwrap();
        assert_eq!(serde_json::from_str::<Tableau>(&json).unwrap(), tableau);

        let ragged = serde_json::from_str::<Tableau>("[[-1,0,0],[1,1]]").unwrap_err();
        assert!(ragged.to_string().contains("Row 1 has 2 entries, expected 3"), "{}", ragged);

        let negative = serde_json::from_str::<Tableau>("[[-1,0,0],[1,1,-2]]").unwrap_err();
        assert!(negative.to_string().contains("negative right-hand side -2"), "{}", negative);

        assert!(serde_json::from_str::<Tableau>("[[-1,0,0],[1e999,1,2]]").is_err());
    }

    #[test]
    fn test_cli_parses_solve_flags() {
        let cli = Cli::try_parse_from(["tabula", "solve", "plan.lp", "--format", "json", "--max-iterations", "5"]).unwrap();
        match cli.command {
            Commands::Solve { options, trace, .. } => {
                assert!(options.format == Format::Json);
                assert_eq!(options.max_iterations, 5);
                assert_eq!(options.tolerance, DEFAULT_TOLERANCE);
                assert!(!trace);
            }
            _ => panic!("Expected solve"),
        }
    }
}
