//! Per-tag decorator recipes resolved from configuration.
//!
//! Resolution happens once, when the registry is built. Configuration problems
//! are never fatal: the offending tag or listener is left out, a warning is
//! logged and kept in [`DecoratorRegistry::warnings`].

use crate::catalog::{DecorateResult, DecoratorCatalog, DecoratorConstructor, ListenerFactory};
use crate::connection::Connection;
use crate::instrument::Listener;
use crate::properties::{
    LISTENERS_ATTRIBUTE, NestedProperties, WRAPPER_ATTRIBUTE, WrapperProperties, split_list,
};
use std::collections::HashMap;
use std::fmt;

/// A configuration problem found while resolving the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWarning {
    /// The tag has no `connection.wrapper` attribute.
    MissingWrapper { tag: String },
    /// The named decorator type is not in the catalog.
    UnknownDecorator { tag: String, name: String },
    /// The decorator type provides neither supported factory shape.
    NoCompatibleConstructor { tag: String, name: String },
    /// The named listener type is not in the catalog.
    UnknownListener { tag: String, name: String },
}

impl RegistryWarning {
    /// The connection-type tag the warning refers to.
    pub fn tag(&self) -> &str {
        match self {
            Self::MissingWrapper { tag }
            | Self::UnknownDecorator { tag, .. }
            | Self::NoCompatibleConstructor { tag, .. }
            | Self::UnknownListener { tag, .. } => tag,
        }
    }
}

impl fmt::Display for RegistryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWrapper { tag } => {
                write!(f, "'{tag}': no {WRAPPER_ATTRIBUTE} configured")
            }
            Self::UnknownDecorator { tag, name } => {
                write!(f, "'{tag}': decorator type '{name}' not found")
            }
            Self::NoCompatibleConstructor { tag, name } => write!(
                f,
                "'{tag}': decorator type '{name}' has no (Connection) or (Connection, listeners) factory"
            ),
            Self::UnknownListener { tag, name } => {
                write!(f, "'{tag}': listener type '{name}' not found")
            }
        }
    }
}

/// Resolved recipe for one connection-type tag.
#[derive(Clone)]
pub struct ConnectionMetadata {
    tag: String,
    decorator_name: String,
    constructor: DecoratorConstructor,
    listeners: Vec<(String, ListenerFactory)>,
}

impl ConnectionMetadata {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn decorator_name(&self) -> &str {
        &self.decorator_name
    }

    /// Whether the selected factory takes a listener sequence.
    pub fn accepts_connection_listeners(&self) -> bool {
        self.constructor.accepts_listeners()
    }

    /// Names of the resolved listener recipes, in configuration order.
    pub fn listener_names(&self) -> impl Iterator<Item = &str> {
        self.listeners.iter().map(|(name, _)| name.as_str())
    }

    /// Create fresh listener instances in configuration order.
    ///
    /// A factory that fails is logged and skipped.
    pub fn instantiate_listeners(&self) -> Vec<Box<dyn Listener>> {
        self.listeners
            .iter()
            .filter_map(|(name, factory)| match factory() {
                Ok(listener) => Some(listener),
                Err(e) => {
                    tracing::warn!(
                        tag = %self.tag,
                        listener = %name,
                        error = %e,
                        "listener could not be instantiated, skipped"
                    );
                    None
                }
            })
            .collect()
    }

    /// Invoke the decorator factory on `connection`.
    pub fn construct(
        &self,
        connection: Box<dyn Connection>,
        listeners: Vec<Box<dyn Listener>>,
    ) -> DecorateResult {
        self.constructor.construct(connection, listeners)
    }
}

impl fmt::Debug for ConnectionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMetadata")
            .field("tag", &self.tag)
            .field("decorator_name", &self.decorator_name)
            .field("constructor", &self.constructor)
            .field("listeners", &self.listener_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Tag → [`ConnectionMetadata`], built once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DecoratorRegistry {
    entries: HashMap<String, ConnectionMetadata>,
    warnings: Vec<RegistryWarning>,
}

impl DecoratorRegistry {
    /// A registry that decorates nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve flat properties against `catalog`.
    pub fn from_properties(properties: &WrapperProperties, catalog: &DecoratorCatalog) -> Self {
        Self::resolve(&properties.nested(), catalog)
    }

    /// Resolve every tag of `nested` against `catalog`.
    pub fn resolve(nested: &NestedProperties, catalog: &DecoratorCatalog) -> Self {
        let mut registry = Self::default();
        for tag in nested.identifiers() {
            if let Some(metadata) = registry.resolve_tag(tag, nested, catalog) {
                tracing::debug!(
                    tag,
                    decorator = %metadata.decorator_name,
                    accepts_listeners = metadata.accepts_connection_listeners(),
                    listeners = metadata.listeners.len(),
                    "resolved connection decorator"
                );
                registry.entries.insert(tag.to_string(), metadata);
            }
        }
        registry
    }

    fn resolve_tag(
        &mut self,
        tag: &str,
        nested: &NestedProperties,
        catalog: &DecoratorCatalog,
    ) -> Option<ConnectionMetadata> {
        let Some(name) = nested
            .attribute(tag, WRAPPER_ATTRIBUTE)
            .filter(|name| !name.is_empty())
        else {
            self.warn(RegistryWarning::MissingWrapper {
                tag: tag.to_string(),
            });
            return None;
        };

        let Some(factory) = catalog.decorator(name) else {
            self.warn(RegistryWarning::UnknownDecorator {
                tag: tag.to_string(),
                name: name.to_string(),
            });
            return None;
        };

        let Some(constructor) = factory.select() else {
            self.warn(RegistryWarning::NoCompatibleConstructor {
                tag: tag.to_string(),
                name: name.to_string(),
            });
            return None;
        };

        let mut listeners = Vec::new();
        for listener in nested
            .attribute(tag, LISTENERS_ATTRIBUTE)
            .map(split_list)
            .unwrap_or_default()
        {
            match catalog.listener(listener) {
                Some(factory) => listeners.push((listener.to_string(), factory.clone())),
                None => self.warn(RegistryWarning::UnknownListener {
                    tag: tag.to_string(),
                    name: listener.to_string(),
                }),
            }
        }

        Some(ConnectionMetadata {
            tag: tag.to_string(),
            decorator_name: name.to_string(),
            constructor,
            listeners,
        })
    }

    fn warn(&mut self, warning: RegistryWarning) {
        tracing::warn!(tag = %warning.tag(), "{warning}");
        self.warnings.push(warning);
    }

    /// Metadata for `tag`, if that tag resolved successfully.
    pub fn get(&self, tag: &str) -> Option<&ConnectionMetadata> {
        self.entries.get(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags that resolved successfully.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every problem encountered during resolution.
    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }
}
