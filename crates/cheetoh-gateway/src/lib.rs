pub mod connection;
pub mod coordinator;
pub mod dispatcher;

pub use coordinator::Coordinator;
pub use dispatcher::{ConnectionSignal, Dispatcher};
