//! Provider trait: a module of related registrations.
//!
//! Providers group the programmatic registrations of one area of an
//! application, across whichever tiers they belong to.
//!
//! # Examples
//! ```rust,ignore
//! struct PersistenceProvider;
//!
//! impl Provider for PersistenceProvider {
//!     fn register(&self, container: &Container) -> Result<()> {
//!         container.dependency_tier("repositories")?.add::<dyn CustomerRepository, SqlCustomers>()?;
//!         container.shared().add_singleton::<dyn DbContext, PgContext>()?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::container::Container;
use crate::error::Result;

/// A module that registers related services into a container.
///
/// Installed with [`Container::install`] or
/// [`ContainerBuilder::provider`](crate::container::ContainerBuilder::provider).
pub trait Provider: Send + Sync {
    /// Registers services. Called once per installation.
    fn register(&self, container: &Container) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DependencyOptions, ServiceOptions};
    use crate::error::StrataError;
    use crate::key::ContractKey;
    use crate::service::{Casts, Constructor, Injectable};
    use std::sync::Arc;

    trait Greeting: Send + Sync {
        fn text(&self) -> String;
    }

    #[derive(Default)]
    struct Hello;

    impl Greeting for Hello {
        fn text(&self) -> String {
            "hello".into()
        }
    }

    impl Injectable for Hello {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_new()]
        }

        fn contracts(casts: &mut Casts<Self>) {
            casts.add::<dyn Greeting>(|s| s);
        }
    }

    struct GreetingProvider;

    impl Provider for GreetingProvider {
        fn register(&self, container: &Container) -> Result<()> {
            container.root().add::<dyn Greeting, Hello>()?;
            container.dependency_tier("texts")?.add_instance::<String>(None, Arc::new("hi".to_string()))?;
            Ok(())
        }
    }

    fn container() -> Container {
        Container::builder()
            .options(ServiceOptions::new().dependencies(DependencyOptions::new("texts")))
            .build()
            .unwrap()
    }

    #[test]
    fn provider_registers_services() {
        let container = container();
        container.install(&GreetingProvider).unwrap();

        assert_eq!(container.get_service::<dyn Greeting>().unwrap().text(), "hello");
        assert!(container.dependency("texts").unwrap().contains(&ContractKey::of::<String>()));
    }

    #[test]
    fn builder_installs_providers() {
        let container = Container::builder()
            .options(ServiceOptions::new().dependencies(DependencyOptions::new("texts")))
            .provider(GreetingProvider)
            .build()
            .unwrap();
        assert_eq!(container.all_contracts().len(), 1);
    }

    #[test]
    fn provider_errors_propagate() {
        let container = Container::builder().build().unwrap();
        match container.install(&GreetingProvider) {
            Err(StrataError::DependencyTierNotFound { name }) => assert_eq!(name, "texts"),
            other => panic!("Expected DependencyTierNotFound, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn provider_has_name() {
        assert!(GreetingProvider.name().contains("GreetingProvider"));
    }
}
