//! 高分榜、累计统计与本地存储。

pub mod high_scores;
pub mod keeper;
pub mod stats;
pub mod store;

pub use high_scores::{HighScoreTable, ScoreRecord};
pub use keeper::{GameOver, ScoreKeeper};
pub use stats::{GameStats, PlayerResult};
pub use store::{
    keys, load_json, save_json, BrowserStorage, KeyValueStore, MemoryStore, StorageError,
};
