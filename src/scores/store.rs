use std::collections::HashMap;

use derive_more::{Display, Error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

/// 持久化使用的键，与页面旧版脚本保持一致。
pub mod keys {
    pub const HIGH_SCORES: &str = "ticTacToeHighScores";
    pub const PLAYER_NAME: &str = "lastPlayerName";
    pub const GAME_STATS: &str = "gameStatistics";
    pub const DIFFICULTY: &str = "aiDifficulty";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum StorageError {
    #[display("storage unavailable: {reason}")]
    Unavailable { reason: String },
    #[display("stored value for {key} is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

/// 字符串键值存储。读写都可能失败，调用方应降级处理而不是中断游戏。
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| StorageError::Malformed {
            key: key.to_string(),
            reason: error.to_string(),
        })
}

pub fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|error| StorageError::Malformed {
        key: key.to_string(),
        reason: error.to_string(),
    })?;
    store.set(key, &raw)
}

/// 内存存储，可切换为“不可用”以模拟隐私模式下的 localStorage。
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    available: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            available: false,
        }
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable {
                reason: "memory store disabled".into(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_available()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// `window.localStorage`。
pub struct BrowserStorage {
    storage: web_sys::Storage,
}

fn js_reason(error: JsValue) -> String {
    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}

impl BrowserStorage {
    pub fn local() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or_else(|| StorageError::Unavailable {
            reason: "no window".into(),
        })?;
        let storage = window
            .local_storage()
            .map_err(|error| StorageError::Unavailable {
                reason: js_reason(error),
            })?
            .ok_or_else(|| StorageError::Unavailable {
                reason: "localStorage disabled".into(),
            })?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|error| StorageError::Unavailable {
                reason: js_reason(error),
            })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|error| StorageError::Unavailable {
                reason: js_reason(error),
            })
    }
}
