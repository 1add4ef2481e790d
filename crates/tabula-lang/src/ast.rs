use crate::lexer::Span;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Objective(Objective),
    Constraint(Constraint),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub span: Span,
    pub sense: Sense,
    pub expr: LinearExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// `[label:] lhs relation rhs`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub span: Span,
    pub label: Option<String>,
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: LinearExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le, // <=
    Ge, // >=
    Eq, // =
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearExpr {
    pub span: Span,
    pub terms: Vec<Term>,
}

/// A signed coefficient, optionally attached to a variable. A term without a
/// variable is a constant.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub span: Span,
    pub coefficient: f64,
    pub variable: Option<String>,
}

impl LinearExpr {
    /// Sum of the constant terms
    pub fn constant(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable.is_none())
            .map(|t| t.coefficient)
            .sum()
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms
            .iter()
            .filter_map(|t| t.variable.as_deref().map(|v| (v, t.coefficient)))
    }
}

impl Program {
    pub fn objectives(&self) -> impl Iterator<Item = &Objective> {
        self.items.iter().filter_map(|item| match item {
            Item::Objective(o) => Some(o),
            Item::Constraint(_) => None,
        })
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.items.iter().filter_map(|item| match item {
            Item::Constraint(c) => Some(c),
            Item::Objective(_) => None,
        })
    }
}
