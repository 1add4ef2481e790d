//! WASM bindings for Tabula
//!
//! JavaScript-friendly entry points for a browser form: solve a model
//! written in the text format, or hand a raw tableau straight to the engine.

use wasm_bindgen::prelude::*;

use crate::compiler::Compiler;
use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;
use tabula_solver::{Extractor, Report, SolutionStatus, Solver, Tableau, DEFAULT_TOLERANCE};

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn solver(max_iterations: Option<usize>) -> Solver {
    match max_iterations {
        Some(max) => Solver::new().with_max_iterations(max),
        None => Solver::new(),
    }
}

/// Parse source code and return the AST as JSON
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsValue> {
    let program = Parser::parse(source).map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&program).map_err(to_js_error)
}

/// Tokenize source code for syntax highlighting
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<TokenInfo> = Lexer::tokenize(source)
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Eof))
        .map(|t| TokenInfo {
            kind: token_class(t.kind).to_string(),
            text: t.text,
            start: t.span.start,
            end: t.span.end,
        })
        .collect();
    serde_wasm_bindgen::to_value(&tokens).map_err(to_js_error)
}

#[derive(serde::Serialize)]
struct TokenInfo {
    kind: String,
    text: String,
    start: usize,
    end: usize,
}

fn token_class(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Max | TokenKind::Min | TokenKind::Subject | TokenKind::To => "keyword",
        TokenKind::Ident => "variable",
        TokenKind::Number => "number",
        TokenKind::Comment => "comment",
        TokenKind::Plus | TokenKind::Minus | TokenKind::Star => "operator",
        TokenKind::Le | TokenKind::Ge | TokenKind::Eq => "operator",
        TokenKind::Colon | TokenKind::Semicolon => "delimiter",
        TokenKind::Newline => "whitespace",
        TokenKind::Error | TokenKind::Eof => "error",
    }
}

#[derive(serde::Serialize)]
struct Diagnostic {
    start: usize,
    end: usize,
    severity: String,
    message: String,
}

/// Validate source code and return diagnostics as JSON
#[wasm_bindgen]
pub fn validate(source: &str) -> JsValue {
    let diagnostics = get_diagnostics(source);
    serde_wasm_bindgen::to_value(&diagnostics).unwrap_or(JsValue::NULL)
}

fn get_diagnostics(source: &str) -> Vec<Diagnostic> {
    match Compiler::compile_source(source) {
        Ok(_) => Vec::new(),
        Err(e) => {
            let (start, end) = e
                .span()
                .map(|s| (s.start, s.end))
                .unwrap_or((0, source.len()));
            vec![Diagnostic {
                start,
                end,
                severity: "error".to_string(),
                message: e.to_string(),
            }]
        }
    }
}

#[derive(serde::Serialize)]
struct SolveResult {
    status: SolutionStatus,
    message: String,
    objective_value: Option<f64>,
    variables: Vec<VariableResult>,
    constraints: Vec<ConstraintResult>,
    iterations: usize,
    tableau: Option<Tableau>,
}

#[derive(serde::Serialize)]
struct VariableResult {
    name: String,
    value: f64,
}

#[derive(serde::Serialize)]
struct ConstraintResult {
    name: String,
    slack: f64,
    binding: bool,
}

fn status_message(status: SolutionStatus) -> &'static str {
    match status {
        SolutionStatus::Optimal => "Optimal solution found",
        SolutionStatus::IterationLimit => "Maximum iterations reached. Solution may not be optimal.",
        SolutionStatus::Unbounded => "Problem is unbounded: no valid pivot row found.",
        SolutionStatus::InfeasiblePivot => "No feasible pivot found.",
    }
}

/// Compile and solve a model, returning the report as JSON
#[wasm_bindgen]
pub fn solve(source: &str, max_iterations: Option<usize>) -> Result<JsValue, JsValue> {
    let problem = Compiler::compile_source(source).map_err(to_js_error)?;
    let report: Report = solver(max_iterations)
        .solve_problem(&problem)
        .map_err(to_js_error)?;

    let binding = report.binding_constraints(DEFAULT_TOLERANCE);
    let variables = match &report.solution {
        Some(solution) => problem
            .variables
            .iter()
            .zip(&solution.values)
            .map(|(name, &value)| VariableResult {
                name: name.clone(),
                value,
            })
            .collect(),
        None => Vec::new(),
    };
    let constraints = problem
        .constraints
        .iter()
        .zip(&report.slack)
        .enumerate()
        .map(|(i, (c, &slack))| ConstraintResult {
            name: c.name.clone(),
            slack,
            binding: binding.contains(&i),
        })
        .collect();

    let result = SolveResult {
        status: report.status,
        message: status_message(report.status).to_string(),
        objective_value: report.solution.as_ref().map(|s| s.objective_value),
        variables,
        constraints,
        iterations: report.iterations,
        tableau: report.tableau,
    };
    serde_wasm_bindgen::to_value(&result).map_err(to_js_error)
}

#[derive(serde::Serialize)]
struct TableauResult {
    status: SolutionStatus,
    message: String,
    values: Vec<f64>,
    objective_value: Option<f64>,
    tableau: Option<Tableau>,
}

/// Solve a raw tableau given as an array of rows (arrays or `Float64Array`s).
///
/// Row 0 must already hold the negated objective and the slack columns must
/// form an identity block; `num_structural` counts the leading decision
/// variable columns.
#[wasm_bindgen]
pub fn solve_tableau(
    rows: &js_sys::Array,
    num_structural: usize,
    max_iterations: Option<usize>,
) -> Result<JsValue, JsValue> {
    let data: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| js_sys::Float64Array::new(&row).to_vec())
        .collect();
    let tableau = Tableau::new(data).map_err(to_js_error)?;
    let objective = tableau
        .objective_coefficients(num_structural)
        .map_err(to_js_error)?;

    let outcome = solver(max_iterations).solve(tableau);
    let status = SolutionStatus::from(&outcome);

    let result = match outcome.into_tableau() {
        Some(tableau) => {
            let solution = Extractor::new()
                .extract(&tableau, &objective)
                .map_err(to_js_error)?;
            TableauResult {
                status,
                message: status_message(status).to_string(),
                values: solution.values,
                objective_value: Some(solution.objective_value),
                tableau: Some(tableau),
            }
        }
        None => TableauResult {
            status,
            message: status_message(status).to_string(),
            values: Vec::new(),
            objective_value: None,
            tableau: None,
        },
    };
    serde_wasm_bindgen::to_value(&result).map_err(to_js_error)
}
