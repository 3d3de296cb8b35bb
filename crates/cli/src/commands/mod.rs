//! sm-tool command handlers

mod channel;
mod secure_messaging;

pub use channel::*;
pub use secure_messaging::*;
