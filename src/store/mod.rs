mod sqlite;

pub use sqlite::AccountRecord;
pub use sqlite::ChatStore;
pub use sqlite::Conversation;
pub use sqlite::LoginCheck;
pub use sqlite::SnapshotRecords;
pub use sqlite::StoreError;
pub use sqlite::StoredMessage;
