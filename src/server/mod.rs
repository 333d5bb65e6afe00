mod chat_service;
mod payload;
mod replication_service;
mod server;
mod session;
mod shutdown;

pub use server::RpcServer;
pub use server::RpcServerConfig;
pub use shutdown::shutdown_signal;
pub use shutdown::RpcServerShutdownHandle;
