//! Process-wide container.
//!
//! Code that cannot be handed a [`Container`] can reach one configured at
//! startup through [`ServiceManager`]. Passing containers explicitly stays
//! the primary API.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::container::{Container, ContainerBuilder};
use crate::error::{Result, StrataError};

static GLOBAL: Lazy<RwLock<Option<Arc<Container>>>> = Lazy::new(|| RwLock::new(None));

/// Builds the container and installs it as the process-wide one,
/// replacing any previous one.
pub fn configure(builder: ContainerBuilder) -> Result<Arc<Container>> {
    let container = Arc::new(builder.build()?);
    let replaced = GLOBAL.write().replace(container.clone()).is_some();
    info!(replaced, "Global container configured");
    Ok(container)
}

/// The process-wide container.
///
/// # Errors
/// [`StrataError::Unconfigured`] before [`configure`] was called.
pub fn container() -> Result<Arc<Container>> {
    GLOBAL.read().clone().ok_or(StrataError::Unconfigured)
}

/// Static access to the process-wide container.
#[derive(Debug, Clone, Copy)]
pub struct ServiceManager;

impl ServiceManager {
    pub fn is_configured() -> bool {
        GLOBAL.read().is_some()
    }

    /// See [`Container::get_service`].
    pub fn get_service<C: ?Sized + Send + Sync + 'static>() -> Result<Arc<C>> {
        container()?.get_service::<C>()
    }

    /// See [`Container::get_service_named`].
    pub fn get_service_named<C: ?Sized + Send + Sync + 'static>(name: &str) -> Result<Option<Arc<C>>> {
        container()?.get_service_named::<C>(name)
    }
}
