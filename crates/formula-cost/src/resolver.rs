//! Recursive product cost resolution.
//!
//! A product's formula may mention variables and other products. Before a formula is
//! evaluated, every product it mentions is resolved first (depth-first, sharing one
//! [`ResolutionContext`]), so the evaluator only ever sees a flat [`SymbolTable`] of numbers.
//! Re-entering a product that is still on the active path is a circular dependency.
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductTable, Variable, VariableTable};
use crate::context::ResolutionContext;
use crate::error::{CostError, CostResult};
use crate::eval::{evaluate, SymbolTable};
use crate::names::{extract_candidate_names, normalize};

/// What to do with a formula name that matches neither a variable nor a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnresolvedSymbolPolicy {
    /// Fail the query with [`CostError::UnknownSymbol`].
    #[default]
    Fail,
    /// Treat the name as `0.0` and log a warning.
    Zero,
}

/// Which namespace wins when a name exists both as a variable and as a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamePrecedence {
    #[default]
    Products,
    Variables,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    pub unresolved_symbols: UnresolvedSymbolPolicy,
    pub precedence: NamePrecedence,
}

/// Direct references made by one product's formula, by stored name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    pub products: Vec<String>,
    pub variables: Vec<String>,
    /// Names as written in the formula that match nothing in the catalog.
    pub unresolved: Vec<String>,
}

/// Result of costing one product as part of [`Resolver::report`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProductCost {
    pub name: String,
    pub cost: CostResult<f64>,
}

enum Reference<'a> {
    Variable(&'a Variable),
    Product(&'a Product),
    Unresolved,
}

#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    variables: &'a VariableTable,
    products: &'a ProductTable,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(variables: &'a VariableTable, products: &'a ProductTable) -> Self {
        Self {
            variables,
            products,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Cost of `target`, computed with a fresh [`ResolutionContext`].
    pub fn cost(&self, target: &str) -> CostResult<f64> {
        let mut ctx = ResolutionContext::new();
        self.cost_in(target, &mut ctx)
    }

    /// Cost of `target`, reusing (and extending) the memo in `ctx`.
    pub fn cost_in(&self, target: &str, ctx: &mut ResolutionContext) -> CostResult<f64> {
        let key = normalize(target);

        if ctx.is_resolving(&key) {
            let name = self
                .products
                .get_normalized(&key)
                .map_or_else(|| target.trim(), |p| p.name.as_str());
            return Err(CostError::CircularDependency {
                path: ctx.cycle_to(name),
            });
        }

        if let Some(cost) = ctx.memo_get(&key) {
            log::trace!("memo hit for product {target:?}");
            return Ok(cost);
        }

        let product = self
            .products
            .get_normalized(&key)
            .ok_or_else(|| CostError::UnknownProduct(target.trim().to_string()))?;

        log::debug!(
            "resolving product {:?} (depth {})",
            product.name,
            ctx.depth()
        );

        let symbols = {
            let mut scope = ctx.enter(key.clone(), product.name.clone());
            self.collect_symbols(product, &mut scope)
                .map_err(|err| err.in_product(&product.name))?
        };

        ctx.record_evaluation();
        let cost = evaluate(&product.formula, &symbols)
            .map_err(|err| err.in_product(&product.name))?;
        log::debug!("product {:?} costs {cost}", product.name);

        ctx.remember(key, cost);
        Ok(cost)
    }

    /// Resolves every name in `product`'s formula into a symbol table.
    fn collect_symbols(
        &self,
        product: &Product,
        ctx: &mut ResolutionContext,
    ) -> CostResult<SymbolTable> {
        let mut symbols = SymbolTable::new();
        for raw in extract_candidate_names(&product.formula) {
            let key = normalize(&raw);
            if symbols.contains_normalized(&key) {
                continue;
            }
            let value = match self.classify(&key) {
                Reference::Variable(variable) => variable.value,
                Reference::Product(dependency) => self.cost_in(&dependency.name, ctx)?,
                Reference::Unresolved => match self.options.unresolved_symbols {
                    UnresolvedSymbolPolicy::Fail => return Err(CostError::UnknownSymbol(raw)),
                    UnresolvedSymbolPolicy::Zero => {
                        log::warn!(
                            "product {:?} references unknown name {raw:?}; using 0",
                            product.name
                        );
                        0.0
                    }
                },
            };
            symbols.insert_normalized(key, value);
        }
        Ok(symbols)
    }

    fn classify(&self, key: &str) -> Reference<'a> {
        let variable = self.variables.get_normalized(key);
        let product = self.products.get_normalized(key);
        match (self.options.precedence, variable, product) {
            (_, Some(variable), None) => Reference::Variable(variable),
            (_, None, Some(product)) => Reference::Product(product),
            (NamePrecedence::Products, _, Some(product)) => Reference::Product(product),
            (NamePrecedence::Variables, Some(variable), _) => Reference::Variable(variable),
            _ => Reference::Unresolved,
        }
    }

    /// Direct references of `target`'s formula, without evaluating anything.
    pub fn dependencies(&self, target: &str) -> CostResult<Dependencies> {
        let product = self
            .products
            .get(target)
            .ok_or_else(|| CostError::UnknownProduct(target.trim().to_string()))?;

        let mut deps = Dependencies::default();
        let mut seen = std::collections::HashSet::new();
        for raw in extract_candidate_names(&product.formula) {
            let key = normalize(&raw);
            if !seen.insert(key.clone()) {
                continue;
            }
            match self.classify(&key) {
                Reference::Variable(variable) => deps.variables.push(variable.name.clone()),
                Reference::Product(dependency) => deps.products.push(dependency.name.clone()),
                Reference::Unresolved => deps.unresolved.push(raw),
            }
        }
        deps.products.sort();
        deps.variables.sort();
        Ok(deps)
    }

    /// Costs every product in the catalog, each with its own fresh context.
    pub fn report(&self) -> Vec<ProductCost> {
        self.products
            .iter()
            .map(|product| ProductCost {
                name: product.name.clone(),
                cost: self.cost(&product.name),
            })
            .collect()
    }
}

/// Cost of `target` with default [`ResolverOptions`] and a fresh context.
pub fn resolve_cost(
    target: &str,
    variables: &VariableTable,
    products: &ProductTable,
) -> CostResult<f64> {
    Resolver::new(variables, products).cost(target)
}
