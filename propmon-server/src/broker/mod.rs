//! Bus side of the monitor: connection setup and the subscription loops
//! feeding the proposal store.

pub mod listener;

pub use listener::{BrokerError, BrokerListener, connect_with_retry};
