pub mod events;
pub mod handler;

// Re-export the essential types
pub use events::{GestureKind, MapEvent, MapEventKind};
pub use handler::{EventCallback, EventRouter, HandlerTable, Route, SharedHandlers};
