//! Completion notifications: message assembly, subscriber registry,
//! transports and the fan-out that ties them together.

pub mod channel;
pub mod fanout;
pub mod message;
pub mod registry;

pub use channel::{HttpPushChannel, LocalPushChannel, PushChannel};
pub use fanout::{Delivery, FanoutReport, NotificationFanout};
pub use message::{NotificationMessage, NotificationPage};
pub use registry::{MemoryRegistry, RegistryError, SqliteRegistry, SubscriberRegistry};
