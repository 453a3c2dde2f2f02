pub mod rate_limit;

pub use rate_limit::{client_key, rate_limit};
