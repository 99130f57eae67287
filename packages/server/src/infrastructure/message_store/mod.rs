//! Message store implementations
//!
//! - [`InMemoryMessageStore`]: process-local store for development and tests
//! - [`RemoteMessageStore`]: client of the remote message-store service,
//!   reached through a bounded [`ConnectionPool`]

pub mod inmemory;
pub mod link;
pub mod pool;
pub mod remote;

pub use inmemory::InMemoryMessageStore;
pub use link::{
    FailureCategory, StoreFailure, StoreOp, StoreRequest, StoreResponse, TcpDialer, TcpLink,
};
pub use pool::{ConnectionPool, Dialer, PoolConfig, PoolError, PooledLink, StoreLink};
pub use remote::RemoteMessageStore;
