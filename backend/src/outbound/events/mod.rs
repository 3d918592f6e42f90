//! In-process event bus and its listeners.

mod broadcast;
mod instructor_listener;

pub use self::broadcast::BroadcastEventBus;
pub use self::instructor_listener::InstructorNotificationListener;
