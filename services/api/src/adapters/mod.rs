pub mod db;
pub mod email;
pub mod memory;
pub mod storage;

pub use db::DbAdapter;
pub use email::{HttpEmailAdapter, LogEmailAdapter};
pub use memory::{MemoryDatabase, MemoryFileStorage};
pub use storage::LocalFileStorage;
