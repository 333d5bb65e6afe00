use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

/// SessionRegistry tracks which username each client connection has
/// authenticated as. Purely in-memory and keyed by the client's socket
/// address: nothing is persisted, and after a reconnect (or a leader change)
/// the client must LOGIN again.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SocketAddr, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticate(&self, addr: SocketAddr, username: &str) {
        self.lock().insert(addr, username.to_string());
    }

    pub fn is_authenticated_as(&self, addr: SocketAddr, username: &str) -> bool {
        self.lock().get(&addr).map(String::as_str) == Some(username)
    }

    /// Ends every session of `username`, e.g. after account deletion.
    pub fn drop_user(&self, username: &str) {
        self.lock().retain(|_, session_user| session_user != username);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, String>> {
        self.sessions.lock().expect("session registry mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn sessions_are_per_connection() {
        let sessions = SessionRegistry::new();
        sessions.authenticate(addr(1000), "alice");

        assert!(sessions.is_authenticated_as(addr(1000), "alice"));
        assert!(!sessions.is_authenticated_as(addr(1000), "bob"));
        assert!(!sessions.is_authenticated_as(addr(2000), "alice"));

        // Re-login on the same connection switches users.
        sessions.authenticate(addr(1000), "bob");
        assert!(!sessions.is_authenticated_as(addr(1000), "alice"));
        assert!(sessions.is_authenticated_as(addr(1000), "bob"));
    }

    #[test]
    fn drop_user_ends_every_session_of_that_user() {
        let sessions = SessionRegistry::new();
        sessions.authenticate(addr(1000), "alice");
        sessions.authenticate(addr(2000), "alice");
        sessions.authenticate(addr(3000), "bob");

        sessions.drop_user("alice");
        assert!(!sessions.is_authenticated_as(addr(1000), "alice"));
        assert!(!sessions.is_authenticated_as(addr(2000), "alice"));
        assert!(sessions.is_authenticated_as(addr(3000), "bob"));
    }
}
