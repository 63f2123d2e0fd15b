//! Discovery of services declared with [`register_service!`].
//!
//! Each declaration submits a [`ServiceDescriptor`] to an
//! [`inventory`] collection. When a container is built every tier picks
//! the descriptors whose crate is listed in its `assemblies` and whose
//! module is listed in its `namespaces` (an empty namespace list accepts
//! every module), and registers the type under every contract it declares.
//!
//! ```ignore
//! mod repositories {
//!     strata_container::register_service!(SqlCustomerRepository);
//!     strata_container::register_service!(MemoryCustomerRepository, name = "memory");
//! }
//! ```
//!
//! [`register_service!`]: crate::register_service

use tracing::trace;

use crate::service::ServiceType;

/// A service declared for discovery.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    module_path: &'static str,
    name: Option<&'static str>,
    reusable: Option<bool>,
    service: fn() -> ServiceType,
}

impl ServiceDescriptor {
    /// Declares the service built by `service`, living in `module_path`
    /// (normally `module_path!()`).
    pub const fn new(module_path: &'static str, service: fn() -> ServiceType) -> Self {
        Self { module_path, name: None, reusable: None, service }
    }

    /// Registers the service under `name` instead of as the default.
    pub const fn named(self, name: &'static str) -> Self {
        Self { name: Some(name), ..self }
    }

    /// Overrides the reuse flag declared by the type.
    pub const fn reusable(self, reusable: bool) -> Self {
        Self { reusable: Some(reusable), ..self }
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    /// The crate the service was declared in.
    pub fn crate_name(&self) -> &'static str {
        self.module_path.split("::").next().unwrap_or(self.module_path)
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn reuse_override(&self) -> Option<bool> {
        self.reusable
    }

    pub fn service_type(&self) -> ServiceType {
        (self.service)()
    }

    /// `true` if the descriptor is selected by the given filters.
    pub fn matches(&self, assemblies: &[String], namespaces: &[String]) -> bool {
        assemblies.iter().any(|a| a == self.crate_name())
            && (namespaces.is_empty() || namespaces.iter().any(|n| n == self.module_path))
    }
}

inventory::collect!(ServiceDescriptor);

/// Every declared service selected by the filters, in a stable order.
pub fn discover(assemblies: &[String], namespaces: &[String]) -> Vec<&'static ServiceDescriptor> {
    if assemblies.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<&'static ServiceDescriptor> = inventory::iter::<ServiceDescriptor>
        .into_iter()
        .filter(|d| d.matches(assemblies, namespaces))
        .collect();
    found.sort_by_key(|d| (d.module_path, d.name, d.service_type().type_name()));

    trace!(count = found.len(), ?assemblies, ?namespaces, "Discovered services");
    found
}

/// Declares an [`Injectable`](crate::service::Injectable) type for
/// discovery.
///
/// ```ignore
/// register_service!(CustomerService);
/// register_service!(SeniorEmployee, name = "Senior");
/// register_service!(ReferenceData, reusable = true);
/// ```
#[macro_export]
macro_rules! register_service {
    ($service:ty) => {
        $crate::inventory::submit! {
            $crate::scan::ServiceDescriptor::new(
                module_path!(),
                $crate::service::ServiceType::of::<$service>,
            )
        }
    };
    ($service:ty, name = $name:expr) => {
        $crate::inventory::submit! {
            $crate::scan::ServiceDescriptor::new(
                module_path!(),
                $crate::service::ServiceType::of::<$service>,
            )
            .named($name)
        }
    };
    ($service:ty, reusable = $reusable:expr) => {
        $crate::inventory::submit! {
            $crate::scan::ServiceDescriptor::new(
                module_path!(),
                $crate::service::ServiceType::of::<$service>,
            )
            .reusable($reusable)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Constructor, Injectable};

    #[derive(Default)]
    struct Ledger;

    impl Injectable for Ledger {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::default_new()]
        }
    }

    fn ledger() -> ServiceType {
        ServiceType::of::<Ledger>()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn crate_name_is_the_first_segment() {
        let descriptor = ServiceDescriptor::new("shop::billing::ledger", ledger);
        assert_eq!(descriptor.crate_name(), "shop");
        assert_eq!(ServiceDescriptor::new("shop", ledger).crate_name(), "shop");
    }

    #[test]
    fn filters() {
        let descriptor = ServiceDescriptor::new("shop::billing", ledger).named("main").reusable(true);
        assert_eq!(descriptor.name(), Some("main"));
        assert_eq!(descriptor.reuse_override(), Some(true));

        assert!(descriptor.matches(&strings(&["shop"]), &[]));
        assert!(descriptor.matches(&strings(&["other", "shop"]), &strings(&["shop::billing"])));
        assert!(!descriptor.matches(&strings(&["shop"]), &strings(&["shop"])));
        assert!(!descriptor.matches(&strings(&["other"]), &[]));
        assert!(!descriptor.matches(&[], &[]));
    }

    #[test]
    fn no_assemblies_means_no_scan() {
        assert!(discover(&[], &strings(&["anything"])).is_empty());
    }
}
