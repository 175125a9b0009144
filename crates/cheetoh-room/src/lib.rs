//! Shared state of the single chat room.
//!
//! Everything in here is synchronous and takes the current time as an
//! argument. The gateway owns one [`Room`] behind a mutex and delivers the
//! [`Outbox`] each operation returns before releasing it.

pub mod commands;
pub mod directory;
pub mod elevation;
pub mod error;
pub mod filter;
pub mod gate;
pub mod identity;
pub mod ledger;
pub mod moderation;
pub mod outbox;
pub mod requests;
pub mod room;

pub use error::{Result, RoomError};
pub use gate::Admission;
pub use outbox::{Delivery, Outbox};
pub use room::Room;
