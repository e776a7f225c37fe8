pub mod addr;
pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod frame;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod seq;

pub use addr::{Address, ControllerIdentity, Instance, MacAddr};
pub use config::{ListenerConfig, SessionConfig};
pub use conn::{DatagramSink, Session, SessionError};
pub use error::WireError;
pub use frame::{EventFrame, Packet, RequestFrame, ResponseFrame, ResponseKind};
pub use listener::{EventFilter, Ingest, Listener, SubscriptionId};
pub use protocol::Command;
pub use protocol::colour::Colour;
pub use protocol::event::{Event, EventKind, EventType};
pub use protocol::response::{ErrorCode, Response};
pub use registry::ControllerRegistry;
