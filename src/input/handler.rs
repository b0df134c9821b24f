use crate::{
    input::events::{GestureKind, MapEvent, MapEventKind},
    traits::ListenerId,
};
use fxhash::FxHashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Event callback function type
pub type EventCallback = Arc<dyn Fn(&MapEvent) + Send + Sync>;

/// Current handler per event kind
///
/// Listeners registered on the engine never capture a handler directly; they
/// resolve it through a table at dispatch time, so swapping a handler is a
/// table write instead of an unbind/rebind pair.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: FxHashMap<MapEventKind, EventCallback>,
}

/// Handler table shared between a binder and the router entries it owns
pub type SharedHandlers = Arc<RwLock<HandlerTable>>;

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `kind`
    pub fn on<F>(&mut self, kind: MapEventKind, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(callback));
    }

    /// Builder form of [`on`](Self::on)
    pub fn with<F>(mut self, kind: MapEventKind, callback: F) -> Self
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.on(kind, callback);
        self
    }

    pub fn off(&mut self, kind: &MapEventKind) -> Option<EventCallback> {
        self.handlers.remove(kind)
    }

    pub fn get(&self, kind: &MapEventKind) -> Option<EventCallback> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &MapEventKind) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes the handler for the event's kind, if one is registered
    pub fn dispatch(&self, event: &MapEvent) -> bool {
        match self.handlers.get(&event.kind) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    pub fn into_shared(self) -> SharedHandlers {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(MapEventKind::name).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerTable").field("kinds", &kinds).finish()
    }
}

/// Replaces the contents of a shared table, tolerating a poisoned lock
pub fn replace_shared(shared: &SharedHandlers, table: HandlerTable) {
    match shared.write() {
        Ok(mut guard) => *guard = table,
        Err(poisoned) => *poisoned.into_inner() = table,
    }
}

/// Dispatches through a shared table, tolerating a poisoned lock
pub fn dispatch_shared(shared: &SharedHandlers, event: &MapEvent) -> bool {
    let handler = match shared.read() {
        Ok(table) => table.get(&event.kind),
        Err(poisoned) => poisoned.into_inner().get(&event.kind),
    };
    // The lock is released before the callback runs so it may update props
    match handler {
        Some(handler) => {
            handler(event);
            true
        }
        None => false,
    }
}

/// Where an engine listener's events are delivered
#[derive(Clone)]
pub enum Route {
    /// Camera and lifecycle events, resolved against the map props handlers
    Map(MapEventKind),
    /// Layer-scoped gesture
    Layer {
        layer_id: String,
        gesture: GestureKind,
        handlers: SharedHandlers,
    },
    /// Marker or popup widget event
    Overlay(SharedHandlers),
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Map(kind) => f.debug_tuple("Map").field(kind).finish(),
            Route::Layer {
                layer_id, gesture, ..
            } => f
                .debug_struct("Layer")
                .field("layer_id", layer_id)
                .field("gesture", gesture)
                .finish(),
            Route::Overlay(_) => f.write_str("Overlay"),
        }
    }
}

/// Maps engine listener ids to their delivery route
#[derive(Debug, Default)]
pub struct EventRouter {
    routes: FxHashMap<ListenerId, Route>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, listener: ListenerId, route: Route) {
        self.routes.insert(listener, route);
    }

    pub fn remove(&mut self, listener: ListenerId) -> Option<Route> {
        self.routes.remove(&listener)
    }

    pub fn get(&self, listener: ListenerId) -> Option<&Route> {
        self.routes.get(&listener)
    }

    /// Listener ids routed to the given layer
    pub fn layer_listeners(&self, layer_id: &str) -> Vec<ListenerId> {
        let mut listeners: Vec<ListenerId> = self
            .routes
            .iter()
            .filter(|(_, route)| matches!(route, Route::Layer { layer_id: id, .. } if id == layer_id))
            .map(|(listener, _)| *listener)
            .collect();
        listeners.sort_unstable();
        listeners
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) -> Vec<ListenerId> {
        self.routes.drain().map(|(listener, _)| listener).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_uses_current_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = HandlerTable::new().into_shared();
        let event = MapEvent::new(MapEventKind::Zoom);
        assert!(!dispatch_shared(&shared, &event));

        let counter = calls.clone();
        replace_shared(
            &shared,
            HandlerTable::new().with(MapEventKind::Zoom, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(dispatch_shared(&shared, &event));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_router_layer_listeners() {
        let mut router = EventRouter::new();
        let shared = HandlerTable::new().into_shared();
        for (i, gesture) in GestureKind::ALL.iter().enumerate() {
            router.insert(
                ListenerId(i as u64),
                Route::Layer {
                    layer_id: "roads".to_string(),
                    gesture: *gesture,
                    handlers: shared.clone(),
                },
            );
        }
        router.insert(ListenerId(99), Route::Map(MapEventKind::Load));
        assert_eq!(router.layer_listeners("roads").len(), 10);
        assert!(router.layer_listeners("water").is_empty());
        assert_eq!(router.len(), 11);
    }
}
