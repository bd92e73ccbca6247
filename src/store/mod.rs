//! Persistence layer — resilient client over an external tabular store.

pub mod client;
pub mod game;
pub mod memory;
pub mod sheets;
pub mod traits;

pub use client::ResilientTables;
pub use game::{GameStore, GameStoreOptions, NodeConfig, Runner};
pub use memory::MemoryBackend;
pub use sheets::SheetsBackend;
pub use traits::TableBackend;
