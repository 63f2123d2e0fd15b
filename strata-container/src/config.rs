//! Container options.
//!
//! Options describe the tier layout and where each tier's services are
//! scanned from. They are plain builder-style structs and also derive
//! [`serde::Deserialize`], so a layout can be kept in a config file:
//!
//! ```
//! use strata_container::config::ServiceOptions;
//!
//! let options: ServiceOptions = serde_json::from_str(r#"{
//!     "strict_mode": true,
//!     "assemblies": ["shop"],
//!     "namespaces": ["shop::services"],
//!     "dependencies": { "name": "repositories", "assemblies": ["shop"] },
//!     "shared": { "assemblies": ["shop"], "namespaces": ["shop::db"] }
//! }"#).unwrap();
//!
//! assert!(options.strict_mode);
//! assert_eq!(options.dependencies.unwrap().name, "repositories");
//! ```

use serde::Deserialize;

/// How constructor dependencies are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerModel {
    /// Dependencies come from the next tier of the chain.
    #[default]
    MultiLevel,
    /// Every dependency is resolved within the requesting tier.
    Single,
}

/// Options of the root tier and, through it, the whole chain.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceOptions {
    /// Reject a second registration for the same (contract, name).
    pub strict_mode: bool,
    /// Module paths scanned for root services; empty means all.
    pub namespaces: Vec<String>,
    /// Crates scanned for root services; empty means no scan.
    pub assemblies: Vec<String>,
    pub model: ContainerModel,
    /// First dependency tier below the root.
    pub dependencies: Option<Box<DependencyOptions>>,
    pub shared: SharedOptions,
}

impl ServiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn assemblies<I, S>(mut self, assemblies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assemblies = assemblies.into_iter().map(Into::into).collect();
        self
    }

    pub fn model(mut self, model: ContainerModel) -> Self {
        self.model = model;
        self
    }

    pub fn dependencies(mut self, dependencies: DependencyOptions) -> Self {
        self.dependencies = Some(Box::new(dependencies));
        self
    }

    pub fn shared(mut self, shared: SharedOptions) -> Self {
        self.shared = shared;
        self
    }

    /// The dependency tiers in chain order.
    pub fn dependency_chain(&self) -> Vec<&DependencyOptions> {
        let mut chain = Vec::new();
        let mut next = self.dependencies.as_deref();
        while let Some(options) = next {
            chain.push(options);
            next = options.dependencies.as_deref();
        }
        chain
    }
}

/// Options of one named dependency tier.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyOptions {
    pub name: String,
    pub namespaces: Vec<String>,
    pub assemblies: Vec<String>,
    /// The tier below this one, if any.
    pub dependencies: Option<Box<DependencyOptions>>,
}

impl DependencyOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn assemblies<I, S>(mut self, assemblies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assemblies = assemblies.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependencies(mut self, dependencies: DependencyOptions) -> Self {
        self.dependencies = Some(Box::new(dependencies));
        self
    }
}

/// Options of the shared tier at the bottom of the chain.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharedOptions {
    pub namespaces: Vec<String>,
    pub assemblies: Vec<String>,
}

impl SharedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn assemblies<I, S>(mut self, assemblies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assemblies = assemblies.into_iter().map(Into::into).collect();
        self
    }
}
