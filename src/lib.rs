pub mod backup;
pub mod hashing;
pub mod ipc;
pub mod migrate;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;
