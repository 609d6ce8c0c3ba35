pub type CostResult<T> = Result<T, CostError>;

/// Errors produced while resolving or evaluating a cost formula.
///
/// Errors that cross a product boundary are wrapped in [`CostError::InProduct`], so a failure
/// deep inside a dependency chain still names every product that was being resolved when it
/// happened. Use [`CostError::root_cause`] to get at the underlying failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CostError {
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic overflowed to infinity (or NaN) at the operator or name at `offset`.
    #[error("result at offset {offset} is not a finite number")]
    NonFinite { offset: usize },

    /// `cause` is rendered into the message and is not reported as `source()`.
    #[error("in product {product}: {cause}")]
    InProduct {
        product: String,
        cause: Box<CostError>,
    },
}

impl CostError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        CostError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub(crate) fn in_product(self, product: &str) -> Self {
        CostError::InProduct {
            product: product.to_string(),
            cause: Box::new(self),
        }
    }

    /// The innermost error, with every [`CostError::InProduct`] layer removed.
    pub fn root_cause(&self) -> &CostError {
        let mut err = self;
        while let CostError::InProduct { cause, .. } = err {
            err = cause;
        }
        err
    }

    /// Products that were being resolved when the error happened, outermost first.
    pub fn product_trail(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut err = self;
        while let CostError::InProduct { product, cause } = err {
            trail.push(product.as_str());
            err = cause;
        }
        trail
    }
}

/// Errors raised while assembling a catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate variable {name:?} (collides with {existing:?})")]
    DuplicateVariable { name: String, existing: String },

    #[error("duplicate product {name:?} (collides with {existing:?})")]
    DuplicateProduct { name: String, existing: String },

    #[error("name {0:?} is empty after normalization")]
    EmptyName(String),

    #[error("invalid catalog json: {0}")]
    Json(String),
}
