pub mod local;
pub mod sqlite;

pub use local::LocalStorage;
pub use sqlite::SqliteStore;
