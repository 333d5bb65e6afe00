use std::future::Future;
use tokio::sync::oneshot;

/// Dropping the handle (or letting the node handle that owns it go) shuts
/// the RPC server down.
pub struct RpcServerShutdownHandle {
    _tx: oneshot::Sender<()>,
}

/// Returns the handle plus the future the server selects on. The future
/// completes when the handle is dropped; we never send an explicit value.
pub fn shutdown_signal() -> (RpcServerShutdownHandle, impl Future<Output = ()>) {
    let (tx, rx) = oneshot::channel::<()>();
    let signal = async move {
        // Err(RecvError) on handle drop is the expected path.
        let _ = rx.await;
    };

    (RpcServerShutdownHandle { _tx: tx }, signal)
}
