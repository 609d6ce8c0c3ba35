//! Cost engine for catalog products priced by free-text formulas.
//!
//! A product formula such as `Peso 50x50 * (1 + Perda) + Moldura` mixes numeric literals,
//! arithmetic, cost variables, and the costs of other products. [`resolve_cost`] resolves the
//! referenced products recursively (detecting cycles and sharing results within one query)
//! and evaluates the formula with a small arithmetic parser; no general-purpose interpreter is
//! involved at any point.
//!
//! ```
//! use formula_cost::{resolve_cost, ProductTable, VariableTable};
//!
//! let variables = VariableTable::from_pairs([("Cimento", 2.5), ("Areia", 1.0)]).unwrap();
//! let products = ProductTable::from_pairs([
//!     ("Massa", "cimento + areia * 2"),
//!     ("Placa", "Massa * 3"),
//! ])
//! .unwrap();
//!
//! assert_eq!(resolve_cost("Placa", &variables, &products), Ok(13.5));
//! ```
mod catalog;
mod context;
mod error;
mod eval;
mod names;
mod parser;
mod resolver;

pub use crate::catalog::{Catalog, Product, ProductTable, Variable, VariableTable};
pub use crate::context::ResolutionContext;
pub use crate::error::{CatalogError, CostError, CostResult};
pub use crate::eval::{eval_expr, evaluate, SymbolTable};
pub use crate::names::{extract_candidate_names, normalize};
pub use crate::parser::{parse, BinaryOp, Expr, UnaryOp};
pub use crate::resolver::{
    resolve_cost, Dependencies, NamePrecedence, ProductCost, Resolver, ResolverOptions,
    UnresolvedSymbolPolicy,
};
