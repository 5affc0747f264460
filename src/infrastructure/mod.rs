pub mod cache;
pub mod http;
pub mod notify;
pub mod store;
pub mod worker;
