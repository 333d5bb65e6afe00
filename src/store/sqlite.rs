use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// ChatStore is the durable tabular store backing one server: accounts,
/// messages and the per-message delivery/read flags.
///
/// Every mutating call commits (and fsyncs, via `synchronous=FULL`) before
/// returning. One replicated operation maps to one call here, so calls that
/// touch multiple rows run inside a single transaction. There is no
/// multi-operation transaction API on purpose.
///
/// Replicated applies are idempotent by id: re-applying an operation a
/// follower has already seen must succeed without erroring.
pub struct ChatStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chat store failure: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A message row joined with its delivery/read flags.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: u64,
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: f64,
    pub delivered: bool,
    pub read: bool,
}

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub username: String,
    pub password_verifier: Vec<u8>,
    pub created_at: f64,
}

#[derive(Debug)]
pub struct Conversation {
    pub messages: Vec<StoredMessage>,
    pub total: u64,
}

#[derive(Debug, PartialEq)]
pub enum LoginCheck {
    Ok,
    NoSuchUser,
    BadCredentials,
}

/// Committed state of one replica, used to bootstrap a fresh joiner and to
/// serve peer catch-up.
#[derive(Debug, Default)]
pub struct SnapshotRecords {
    pub accounts: Vec<AccountRecord>,
    pub messages: Vec<StoredMessage>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        username TEXT PRIMARY KEY,
        password_verifier BLOB NOT NULL,
        created_at REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY,
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS delivery_flags (
        message_id INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS read_flags (
        message_id INTEGER PRIMARY KEY
    );
    CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient);
    CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);
";

impl ChatStore {
    /// Opens (creating if absent) the store at `path`. A file that exists but
    /// cannot be read as a database is reported as an error; callers treat
    /// that as corrupt durable state and abort startup.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // journal_mode responds with a row, so it can't go through execute().
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = FULL;")?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(ChatStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("chat store mutex poisoned")
    }

    // ---------- accounts ----------

    /// Creates an account. Returns false (without writing) when the username
    /// is already taken.
    pub fn create_account(
        &self,
        username: &str,
        verifier: &[u8],
        created_at: f64,
    ) -> Result<bool, StoreError> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO accounts (username, password_verifier, created_at) \
             VALUES (?1, ?2, ?3)",
            params![username, verifier, created_at],
        )?;
        Ok(inserted == 1)
    }

    /// Follower-side apply of a replicated account. Re-applying an account
    /// that already exists is a success.
    pub fn apply_account(
        &self,
        username: &str,
        verifier: &[u8],
        created_at: f64,
    ) -> Result<(), StoreError> {
        self.create_account(username, verifier, created_at)?;
        Ok(())
    }

    pub fn verify_login(&self, username: &str, verifier: &[u8]) -> Result<LoginCheck, StoreError> {
        let conn = self.lock();
        let stored: Option<Vec<u8>> = conn
            .query_row(
                "SELECT password_verifier FROM accounts WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match stored {
            None => LoginCheck::NoSuchUser,
            Some(stored) if stored == verifier => LoginCheck::Ok,
            Some(_) => LoginCheck::BadCredentials,
        })
    }

    pub fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM accounts WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Shell-glob account listing (`*` and `?`, via SQLite GLOB). The empty
    /// pattern lists everything.
    pub fn list_accounts(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let glob = if pattern.is_empty() { "*" } else { pattern };
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT username FROM accounts WHERE username GLOB ?1 ORDER BY username")?;
        let rows = stmt.query_map(params![glob], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Deletes an account and every message where it is sender or recipient
    /// (flags included). Returns false when no such account existed.
    pub fn delete_account(&self, username: &str) -> Result<bool, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM delivery_flags WHERE message_id IN \
             (SELECT id FROM messages WHERE sender = ?1 OR recipient = ?1)",
            params![username],
        )?;
        tx.execute(
            "DELETE FROM read_flags WHERE message_id IN \
             (SELECT id FROM messages WHERE sender = ?1 OR recipient = ?1)",
            params![username],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE sender = ?1 OR recipient = ?1",
            params![username],
        )?;
        let removed = tx.execute("DELETE FROM accounts WHERE username = ?1", params![username])?;
        tx.commit()?;
        Ok(removed == 1)
    }

    pub fn account_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ---------- messages ----------

    /// Inserts a message under the id the leader assigned. Idempotent: a row
    /// already present under `id` is left untouched.
    pub fn insert_message(
        &self,
        id: u64,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: f64,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO messages (id, sender, recipient, content, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id as i64, sender, recipient, content, timestamp],
        )?;
        Ok(())
    }

    pub fn highest_message_id(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let max: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM messages", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) as u64)
    }

    /// Conversation between `user` and `partner`, newest first, bounded by the
    /// commit watermark. `before_id` pages further back in history.
    pub fn fetch_conversation(
        &self,
        user: &str,
        partner: &str,
        limit: u64,
        before_id: Option<u64>,
        visible_up_to: u64,
    ) -> Result<Conversation, StoreError> {
        let conn = self.lock();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages \
             WHERE ((sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)) \
               AND id <= ?3",
            params![user, partner, visible_up_to as i64],
            |row| row.get(0),
        )?;

        let before = before_id.map(|b| b as i64).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages m \
             WHERE ((m.sender = ?1 AND m.recipient = ?2) OR (m.sender = ?2 AND m.recipient = ?1)) \
               AND m.id <= ?3 AND m.id < ?4 \
             ORDER BY m.id DESC LIMIT ?5",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![user, partner, visible_up_to as i64, before, limit as i64],
            row_to_message,
        )?;

        Ok(Conversation {
            messages: rows.collect::<Result<Vec<_>, _>>()?,
            total: total as u64,
        })
    }

    /// Distinct counterparts of `user` over all visible messages.
    pub fn list_chat_partners(
        &self,
        user: &str,
        visible_up_to: u64,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT CASE WHEN sender = ?1 THEN recipient ELSE sender END AS partner \
             FROM messages WHERE (sender = ?1 OR recipient = ?1) AND id <= ?2 \
             ORDER BY partner",
        )?;
        let rows = stmt.query_map(params![user, visible_up_to as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Unread (no read flag) messages from `partner` addressed to `user`.
    pub fn unread_count_from(
        &self,
        user: &str,
        partner: &str,
        visible_up_to: u64,
    ) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages m \
             WHERE m.recipient = ?1 AND m.sender = ?2 AND m.id <= ?3 \
               AND NOT EXISTS (SELECT 1 FROM read_flags r WHERE r.message_id = m.id)",
            params![user, partner, visible_up_to as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Committed messages addressed to `recipient` that no replica has pushed
    /// yet, oldest first. Feeds the subscription backlog.
    pub fn undelivered_messages(
        &self,
        recipient: &str,
        visible_up_to: u64,
        limit: Option<u64>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages m \
             WHERE m.recipient = ?1 AND m.id <= ?2 \
               AND NOT EXISTS (SELECT 1 FROM delivery_flags d WHERE d.message_id = m.id) \
             ORDER BY m.id ASC LIMIT ?3",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                recipient,
                visible_up_to as i64,
                limit.map(|l| l as i64).unwrap_or(-1)
            ],
            row_to_message,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Messages with ids in `(after, up_to]`, ascending. Feeds the commit
    /// push path and peer catch-up.
    pub fn messages_in_range(&self, after: u64, up_to: u64) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages m WHERE m.id > ?1 AND m.id <= ?2 ORDER BY m.id ASC",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![after as i64, up_to as i64], row_to_message)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Deletes the subset of `ids` that `requester` sent or received, and
    /// returns that subset. Ids the requester does not own are omitted, not
    /// an error.
    pub fn delete_messages(&self, requester: &str, ids: &[u64]) -> Result<Vec<u64>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let placeholders = sql_placeholders(ids.len());

        let owned: Vec<u64> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT id FROM messages WHERE id IN ({}) AND (sender = ?{} OR recipient = ?{}) \
                 ORDER BY id",
                placeholders,
                ids.len() + 1,
                ids.len() + 1,
            ))?;
            let params_iter = ids
                .iter()
                .map(|id| rusqlite::types::Value::from(*id as i64))
                .chain(std::iter::once(rusqlite::types::Value::from(
                    requester.to_string(),
                )));
            let rows = stmt.query_map(params_from_iter(params_iter), |row| row.get::<_, i64>(0))?;
            rows.map(|r| r.map(|id| id as u64))
                .collect::<Result<Vec<_>, _>>()?
        };

        if !owned.is_empty() {
            let owned_placeholders = sql_placeholders(owned.len());
            let owned_params = || {
                params_from_iter(owned.iter().map(|id| *id as i64))
            };
            tx.execute(
                &format!(
                    "DELETE FROM delivery_flags WHERE message_id IN ({})",
                    owned_placeholders
                ),
                owned_params(),
            )?;
            tx.execute(
                &format!(
                    "DELETE FROM read_flags WHERE message_id IN ({})",
                    owned_placeholders
                ),
                owned_params(),
            )?;
            tx.execute(
                &format!("DELETE FROM messages WHERE id IN ({})", owned_placeholders),
                owned_params(),
            )?;
        }
        tx.commit()?;
        Ok(owned)
    }

    /// Flags the subset of `ids` addressed to `requester` as read. Ids the
    /// requester did not receive are a no-op.
    pub fn mark_read(&self, requester: &str, ids: &[u64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock();
        let placeholders = sql_placeholders(ids.len());
        let params_iter = ids
            .iter()
            .map(|id| rusqlite::types::Value::from(*id as i64))
            .chain(std::iter::once(rusqlite::types::Value::from(
                requester.to_string(),
            )));
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO read_flags (message_id) \
                 SELECT id FROM messages WHERE id IN ({}) AND recipient = ?{}",
                placeholders,
                ids.len() + 1,
            ),
            params_from_iter(params_iter),
        )?;
        Ok(())
    }

    /// Flags a message as delivered. Local bookkeeping only (never
    /// replicated); a flag for an unknown id is silently skipped.
    pub fn mark_delivered(&self, id: u64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO delivery_flags (message_id) \
             SELECT id FROM messages WHERE id = ?1",
            params![id as i64],
        )?;
        Ok(())
    }

    // ---------- snapshot ----------

    /// Committed state for peer catch-up and fresh-joiner bootstrap.
    pub fn snapshot_for_catchup(&self, visible_up_to: u64) -> Result<SnapshotRecords, StoreError> {
        let conn = self.lock();
        let accounts = {
            let mut stmt = conn.prepare(
                "SELECT username, password_verifier, created_at FROM accounts ORDER BY username",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(AccountRecord {
                    username: row.get(0)?,
                    password_verifier: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let messages = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m WHERE m.id <= ?1 ORDER BY m.id ASC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![visible_up_to as i64], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(SnapshotRecords { accounts, messages })
    }

    /// Applies a snapshot on top of local state, idempotently; existing rows
    /// win. Read flags travel with the snapshot, delivery flags do not (they
    /// are per-replica).
    pub fn apply_snapshot(&self, snapshot: &SnapshotRecords) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for account in &snapshot.accounts {
            tx.execute(
                "INSERT OR IGNORE INTO accounts (username, password_verifier, created_at) \
                 VALUES (?1, ?2, ?3)",
                params![
                    account.username,
                    account.password_verifier,
                    account.created_at
                ],
            )?;
        }
        for message in &snapshot.messages {
            tx.execute(
                "INSERT OR IGNORE INTO messages (id, sender, recipient, content, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id as i64,
                    message.sender,
                    message.recipient,
                    message.content,
                    message.timestamp
                ],
            )?;
            if message.read {
                tx.execute(
                    "INSERT OR IGNORE INTO read_flags (message_id) VALUES (?1)",
                    params![message.id as i64],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

const MESSAGE_COLUMNS: &str = "m.id, m.sender, m.recipient, m.content, m.timestamp, \
     EXISTS(SELECT 1 FROM delivery_flags d WHERE d.message_id = m.id), \
     EXISTS(SELECT 1 FROM read_flags r WHERE r.message_id = m.id)";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        id: row.get::<_, i64>(0)? as u64,
        sender: row.get(1)?,
        recipient: row.get(2)?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
        delivered: row.get(5)?,
        read: row.get(6)?,
    })
}

fn sql_placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_users(users: &[&str]) -> ChatStore {
        let store = ChatStore::open_in_memory().unwrap();
        for user in users {
            assert!(store.create_account(user, b"pw", 1000.0).unwrap());
        }
        store
    }

    #[test]
    fn create_account_rejects_duplicate_username() {
        let store = store_with_users(&["alice"]);
        assert!(!store.create_account("alice", b"other", 2000.0).unwrap());
        // The original verifier survives the rejected second create.
        assert_eq!(store.verify_login("alice", b"pw").unwrap(), LoginCheck::Ok);
    }

    #[test]
    fn login_distinguishes_unknown_user_from_bad_credentials() {
        let store = store_with_users(&["alice"]);
        assert_eq!(
            store.verify_login("bob", b"pw").unwrap(),
            LoginCheck::NoSuchUser
        );
        assert_eq!(
            store.verify_login("alice", b"wrong").unwrap(),
            LoginCheck::BadCredentials
        );
        assert_eq!(store.verify_login("alice", b"pw").unwrap(), LoginCheck::Ok);
    }

    #[test]
    fn list_accounts_glob_patterns() {
        let store = store_with_users(&["alice", "alina", "bob"]);
        assert_eq!(store.list_accounts("*").unwrap(), ["alice", "alina", "bob"]);
        assert_eq!(store.list_accounts("").unwrap(), ["alice", "alina", "bob"]);
        assert_eq!(store.list_accounts("ali*").unwrap(), ["alice", "alina"]);
        assert_eq!(store.list_accounts("?ob").unwrap(), ["bob"]);
        assert!(store.list_accounts("zzz*").unwrap().is_empty());
    }

    #[test]
    fn insert_message_is_idempotent_by_id() {
        let store = store_with_users(&["alice", "bob"]);
        store.insert_message(7, "alice", "bob", "hi", 1.0).unwrap();
        // A follower re-applying id 7 must not clobber or error.
        store
            .insert_message(7, "alice", "bob", "different", 2.0)
            .unwrap();
        assert_eq!(store.highest_message_id().unwrap(), 7);

        let convo = store.fetch_conversation("alice", "bob", 50, None, 100).unwrap();
        assert_eq!(convo.total, 1);
        assert_eq!(convo.messages[0].content, "hi");
    }

    #[test]
    fn conversation_is_newest_first_and_commit_bounded() {
        let store = store_with_users(&["alice", "bob"]);
        for id in 1..=5 {
            store
                .insert_message(id, "alice", "bob", &format!("m{}", id), id as f64)
                .unwrap();
        }

        // Only ids <= 3 are committed.
        let convo = store.fetch_conversation("bob", "alice", 50, None, 3).unwrap();
        assert_eq!(convo.total, 3);
        let ids: Vec<u64> = convo.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, [3, 2, 1]);

        // Page back past id 3.
        let older = store
            .fetch_conversation("bob", "alice", 50, Some(3), 5)
            .unwrap();
        let ids: Vec<u64> = older.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, [2, 1]);
    }

    #[test]
    fn chat_partners_are_derived_from_both_directions() {
        let store = store_with_users(&["alice", "bob", "carol"]);
        store.insert_message(1, "alice", "bob", "x", 1.0).unwrap();
        store.insert_message(2, "carol", "alice", "y", 2.0).unwrap();

        assert_eq!(store.list_chat_partners("alice", 10).unwrap(), ["bob", "carol"]);
        assert_eq!(store.list_chat_partners("bob", 10).unwrap(), ["alice"]);
        assert_eq!(store.unread_count_from("alice", "carol", 10).unwrap(), 1);
    }

    #[test]
    fn delete_messages_skips_ids_the_requester_does_not_own() {
        let store = store_with_users(&["alice", "bob", "carol"]);
        store.insert_message(1, "alice", "bob", "a", 1.0).unwrap();
        store.insert_message(2, "bob", "alice", "b", 2.0).unwrap();
        store.insert_message(3, "bob", "carol", "c", 3.0).unwrap();

        // Alice owns 1 (sender) and 2 (recipient) but not 3; 99 doesn't exist.
        let deleted = store.delete_messages("alice", &[1, 2, 3, 99]).unwrap();
        assert_eq!(deleted, [1, 2]);

        assert_eq!(store.fetch_conversation("alice", "bob", 50, None, 10).unwrap().total, 0);
        assert_eq!(store.fetch_conversation("bob", "carol", 50, None, 10).unwrap().total, 1);
    }

    #[test]
    fn delete_account_cascades_to_both_sides_of_conversations() {
        let store = store_with_users(&["alice", "bob"]);
        store.insert_message(1, "alice", "bob", "a", 1.0).unwrap();
        store.insert_message(2, "alice", "bob", "b", 2.0).unwrap();
        store.insert_message(3, "bob", "alice", "c", 3.0).unwrap();
        store.mark_read("bob", &[1]).unwrap();

        assert!(store.delete_account("alice").unwrap());
        assert!(!store.delete_account("alice").unwrap());

        assert!(!store.user_exists("alice").unwrap());
        assert_eq!(store.list_accounts("*").unwrap(), ["bob"]);
        assert_eq!(store.fetch_conversation("bob", "alice", 50, None, 10).unwrap().total, 0);
        assert!(store.list_chat_partners("bob", 10).unwrap().is_empty());
    }

    #[test]
    fn mark_read_ignores_messages_the_requester_did_not_receive() {
        let store = store_with_users(&["alice", "bob"]);
        store.insert_message(1, "alice", "bob", "a", 1.0).unwrap();

        // Alice is the sender, not the recipient: no-op.
        store.mark_read("alice", &[1]).unwrap();
        assert_eq!(store.unread_count_from("bob", "alice", 10).unwrap(), 1);

        store.mark_read("bob", &[1]).unwrap();
        assert_eq!(store.unread_count_from("bob", "alice", 10).unwrap(), 0);
        // Re-applying is fine (follower idempotence).
        store.mark_read("bob", &[1]).unwrap();
    }

    #[test]
    fn undelivered_backlog_shrinks_as_messages_are_delivered() {
        let store = store_with_users(&["alice", "bob"]);
        for id in 1..=3 {
            store
                .insert_message(id, "alice", "bob", &format!("m{}", id), id as f64)
                .unwrap();
        }

        // Only committed ids (<= 2) are eligible.
        let backlog = store.undelivered_messages("bob", 2, None).unwrap();
        assert_eq!(backlog.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2]);

        store.mark_delivered(1).unwrap();
        let backlog = store.undelivered_messages("bob", 3, None).unwrap();
        assert_eq!(backlog.iter().map(|m| m.id).collect::<Vec<_>>(), [2, 3]);

        // Delivery flag for an unknown id is skipped, not an error.
        store.mark_delivered(42).unwrap();
    }

    #[test]
    fn snapshot_round_trips_committed_state_onto_a_fresh_store() {
        let store = store_with_users(&["alice", "bob"]);
        store.insert_message(1, "alice", "bob", "a", 1.0).unwrap();
        store.insert_message(2, "bob", "alice", "b", 2.0).unwrap();
        store.insert_message(3, "alice", "bob", "uncommitted", 3.0).unwrap();
        store.mark_read("bob", &[1]).unwrap();

        let snapshot = store.snapshot_for_catchup(2).unwrap();
        assert_eq!(snapshot.accounts.len(), 2);
        assert_eq!(snapshot.messages.len(), 2);

        let fresh = ChatStore::open_in_memory().unwrap();
        fresh.apply_snapshot(&snapshot).unwrap();
        assert!(fresh.user_exists("alice").unwrap());
        assert_eq!(fresh.highest_message_id().unwrap(), 2);
        assert_eq!(fresh.verify_login("bob", b"pw").unwrap(), LoginCheck::Ok);
        let convo = fresh.fetch_conversation("alice", "bob", 50, None, 2).unwrap();
        assert_eq!(convo.total, 2);
        assert!(convo.messages.iter().any(|m| m.id == 1 && m.read));
    }
}
