//! Applies a resolved recipe to a raw connection.

use crate::connection::Connection;
use crate::registry::DecoratorRegistry;

/// Decorate `connection` according to the recipe registered for `tag`.
///
/// Without a tag, or without a recipe for it, the connection is returned
/// unchanged. A failing decorator factory is logged and the raw connection is
/// returned; this function never fails.
pub fn wrap_connection(
    connection: Box<dyn Connection>,
    tag: Option<&str>,
    registry: &DecoratorRegistry,
) -> Box<dyn Connection> {
    let Some(tag) = tag else {
        return connection;
    };
    let Some(metadata) = registry.get(tag) else {
        tracing::trace!(tag, "no decorator configured, connection left unwrapped");
        return connection;
    };

    let listeners = if metadata.accepts_connection_listeners() {
        metadata.instantiate_listeners()
    } else {
        Vec::new()
    };
    let listener_count = listeners.len();

    match metadata.construct(connection, listeners) {
        Ok(decorated) => {
            tracing::debug!(
                tag,
                decorator = %metadata.decorator_name(),
                listeners = listener_count,
                "connection decorated"
            );
            decorated
        }
        Err(e) => {
            let (raw, error) = e.into_parts();
            tracing::warn!(
                tag,
                decorator = %metadata.decorator_name(),
                error = %error,
                "decorator could not be instantiated, using raw connection"
            );
            raw
        }
    }
}
