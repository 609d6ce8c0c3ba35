//! Immutable catalog snapshots handed to the resolver.
//!
//! Both tables index their entries by [`normalize`]d name, so lookups from formula tokens are
//! case- and spacing-insensitive, and two entries that normalize to the same key are rejected
//! when the snapshot is built rather than discovered during resolution.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::names::normalize;
use crate::resolver::{Resolver, ResolverOptions};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            category: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit of measure the cost refers to (e.g. `m²`, `un`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: formula.into(),
            description: None,
            unit: None,
            category: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VariableTable {
    entries: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, N>(pairs: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (N, f64)>,
        N: Into<String>,
    {
        let mut table = Self::new();
        for (name, value) in pairs {
            table.insert(Variable::new(name, value))?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, variable: Variable) -> Result<(), CatalogError> {
        let key = normalize(&variable.name);
        if key.is_empty() {
            return Err(CatalogError::EmptyName(variable.name));
        }
        if let Some(&existing) = self.index.get(&key) {
            return Err(CatalogError::DuplicateVariable {
                name: variable.name,
                existing: self.entries[existing].name.clone(),
            });
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(variable);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.get_normalized(&normalize(name))
    }

    pub(crate) fn get_normalized(&self, key: &str) -> Option<&Variable> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProductTable {
    entries: Vec<Product>,
    index: HashMap<String, usize>,
}

impl ProductTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, N, F>(pairs: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: Into<String>,
    {
        let mut table = Self::new();
        for (name, formula) in pairs {
            table.insert(Product::new(name, formula))?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, product: Product) -> Result<(), CatalogError> {
        let key = normalize(&product.name);
        if key.is_empty() {
            return Err(CatalogError::EmptyName(product.name));
        }
        if let Some(&existing) = self.index.get(&key) {
            return Err(CatalogError::DuplicateProduct {
                name: product.name,
                existing: self.entries[existing].name.clone(),
            });
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(product);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Product> {
        self.get_normalized(&normalize(name))
    }

    pub(crate) fn get_normalized(&self, key: &str) -> Option<&Product> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    /// Products in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A variable snapshot, a product snapshot, and the options to resolve them with.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub variables: VariableTable,
    pub products: ProductTable,
    pub options: ResolverOptions,
}

impl Catalog {
    pub fn new(variables: VariableTable, products: ProductTable) -> Self {
        Self {
            variables,
            products,
            options: ResolverOptions::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct CatalogJson {
            #[serde(default)]
            variables: Vec<Variable>,
            #[serde(default)]
            products: Vec<Product>,
            #[serde(default)]
            options: ResolverOptions,
        }

        let parsed: CatalogJson =
            serde_json::from_str(json).map_err(|err| CatalogError::Json(err.to_string()))?;

        let mut variables = VariableTable::new();
        for variable in parsed.variables {
            variables.insert(variable)?;
        }
        let mut products = ProductTable::new();
        for product in parsed.products {
            products.insert(product)?;
        }

        Ok(Self {
            variables,
            products,
            options: parsed.options,
        })
    }

    pub fn to_json_string(&self) -> Result<String, CatalogError> {
        #[derive(Debug, Serialize)]
        struct CatalogJson<'a> {
            variables: Vec<&'a Variable>,
            products: Vec<&'a Product>,
            options: &'a ResolverOptions,
        }

        serde_json::to_string_pretty(&CatalogJson {
            variables: self.variables.iter().collect(),
            products: self.products.iter().collect(),
            options: &self.options,
        })
        .map_err(|err| CatalogError::Json(err.to_string()))
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.variables, &self.products).with_options(self.options)
    }
}
