use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableauError {
    #[error("Tableau needs an objective row and at least one variable column besides the right-hand side")]
    TooSmall,
    #[error("Row {row} has {found} entries, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Entry ({row}, {col}) is not a finite number")]
    NonFinite { row: usize, col: usize },
    #[error("Constraint row {row} has negative right-hand side {value}")]
    NegativeRhs { row: usize, value: f64 },
    #[error("Requested {requested} structural variables but the tableau has only {available} variable columns")]
    TooManyStructural { requested: usize, available: usize },
}

/// Dense simplex tableau.
///
/// Row 0 is the objective row, rows `1..=M` are constraints. The last column
/// holds the right-hand side; the columns before it are variable
/// coefficients (structural variables followed by slacks).
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    data: Vec<Vec<f64>>,
}

impl Tableau {
    pub fn new(data: Vec<Vec<f64>>) -> Result<Self, TableauError> {
        let width = data.first().map_or(0, Vec::len);
        if width < 2 {
            return Err(TableauError::TooSmall);
        }

        for (i, row) in data.iter().enumerate() {
            if row.len() != width {
                return Err(TableauError::Ragged {
                    row: i,
                    expected: width,
                    found: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(TableauError::NonFinite { row: i, col: j });
            }
            let rhs = row[width - 1];
            if i > 0 && rhs < 0.0 {
                return Err(TableauError::NegativeRhs { row: i, value: rhs });
            }
        }

        Ok(Self { data })
    }

    /// Number of constraint rows (M)
    pub fn num_constraints(&self) -> usize {
        self.data.len() - 1
    }

    /// Number of variable columns (N), excluding the right-hand side
    pub fn num_vars(&self) -> usize {
        self.data[0].len() - 1
    }

    pub fn rhs_col(&self) -> usize {
        self.num_vars()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row]
    }

    pub fn objective_row(&self) -> &[f64] {
        &self.data[0]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.data[row][self.rhs_col()]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.data
    }

    /// Maximization coefficients of the first `num_structural_vars` columns,
    /// undoing the negation of an initial objective row. Only meaningful
    /// before any pivot.
    pub fn objective_coefficients(&self, num_structural_vars: usize) -> Result<Vec<f64>, TableauError> {
        if num_structural_vars > self.num_vars() {
            return Err(TableauError::TooManyStructural {
                requested: num_structural_vars,
                available: self.num_vars(),
            });
        }
        Ok(self.data[0][..num_structural_vars]
            .iter()
            .map(|c| -c + 0.0)
            .collect())
    }

    /// Gauss-Jordan elimination around `(row, col)`.
    ///
    /// The pivot row is scaled so the pivot entry becomes 1, then a multiple
    /// of it is subtracted from every other row (objective row included) so
    /// the rest of the column becomes 0. Whole rows are updated, right-hand
    /// side included.
    pub fn pivot(&mut self, row: usize, col: usize) {
        let pivot_value = self.data[row][col];
        for v in self.data[row].iter_mut() {
            *v /= pivot_value;
        }
        self.data[row][col] = 1.0;

        let pivot_row = self.data[row].clone();
        for (i, other) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor == 0.0 {
                continue;
            }
            for (v, p) in other.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
            other[col] = 0.0;
        }
    }
}

impl TryFrom<Vec<Vec<f64>>> for Tableau {
    type Error = TableauError;

    fn try_from(data: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Tableau::new(data)
    }
}

impl From<Tableau> for Vec<Vec<f64>> {
    fn from(tableau: Tableau) -> Self {
        tableau.data
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rhs_col = self.rhs_col();
        for (i, row) in self.data.iter().enumerate() {
            for v in &row[..rhs_col] {
                write!(f, "{:>10.4}", v)?;
            }
            writeln!(f, " | {:>10.4}", row[rhs_col])?;
            if i == 0 {
                writeln!(f, "{}", "-".repeat(10 * rhs_col + 13))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textbook() -> Tableau {
        Tableau::new(vec![
            vec![-3.0, -5.0, 0.0, 0.0, 0.0, 0.0],
            vec![1.0, 0.0, 1.0, 0.0, 0.0, 4.0],
            vec![0.0, 2.0, 0.0, 1.0, 0.0, 12.0],
            vec![3.0, 2.0, 0.0, 0.0, 1.0, 18.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let t = textbook();
        assert_eq!(t.num_constraints(), 3);
        assert_eq!(t.num_vars(), 5);
        assert_eq!(t.rhs_col(), 5);
        assert_eq!(t.rhs(3), 18.0);
        assert_eq!(t.objective_row()[1], -5.0);
    }

    #[test]
    fn test_objective_coefficients() {
        let t = textbook();
        assert_eq!(t.objective_coefficients(2).unwrap(), vec![3.0, 5.0]);
        assert_eq!(t.objective_coefficients(3).unwrap()[2], 0.0);
        assert!(matches!(
            t.objective_coefficients(6),
            Err(TableauError::TooManyStructural { requested: 6, available: 5 })
        ));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Tableau::new(vec![vec![-1.0, 0.0, 0.0], vec![1.0, 1.0]]).unwrap_err();
        assert_eq!(
            err,
            TableauError::Ragged {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(Tableau::new(vec![]).unwrap_err(), TableauError::TooSmall);
        assert_eq!(Tableau::new(vec![vec![0.0]]).unwrap_err(), TableauError::TooSmall);

        let err = Tableau::new(vec![vec![-1.0, 0.0, 0.0], vec![1.0, f64::NAN, 2.0]]).unwrap_err();
        assert_eq!(err, TableauError::NonFinite { row: 1, col: 1 });

        let err = Tableau::new(vec![vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, -2.0]]).unwrap_err();
        assert_eq!(err, TableauError::NegativeRhs { row: 1, value: -2.0 });
    }

    #[test]
    fn test_objective_row_may_have_any_rhs() {
        assert!(Tableau::new(vec![vec![-1.0, 0.0, -7.0], vec![1.0, 1.0, 2.0]]).is_ok());
    }

    #[test]
    fn test_pivot_makes_unit_column() {
        let mut t = textbook();
        t.pivot(2, 1);

        assert_eq!(t.row(2), &[0.0, 1.0, 0.0, 0.5, 0.0, 6.0]);
        assert_eq!(t.row(0), &[-3.0, 0.0, 0.0, 2.5, 0.0, 30.0]);
        assert_eq!(t.row(3), &[3.0, 0.0, 0.0, -1.0, 1.0, 6.0]);
        // row 1 has a zero in the pivot column and is left alone
        assert_eq!(t.row(1), &[1.0, 0.0, 1.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_display_separates_objective_and_rhs() {
        let t = Tableau::new(vec![vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, 2.0]]).unwrap();
        let text = t.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains('|'));
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].ends_with("2.0000"));
    }
}
