use serde::{Deserialize, Serialize};

use super::high_scores::{HighScoreTable, ScoreRecord};
use super::stats::{GameStats, PlayerResult};
use super::store::{keys, load_json, save_json, KeyValueStore, StorageError};
use crate::ai::AiDifficulty;
use crate::utils::{console_warn, Clock};

/// 一局结束时交给计分的信息。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameOver {
    pub result: PlayerResult,
    pub player_name: String,
    /// 本次会话中玩家的累计胜场。
    pub player_score: u32,
    pub difficulty: AiDifficulty,
}

/// 高分榜、统计与偏好设置的持有者。存储失败只记日志，内存状态照常工作。
pub struct ScoreKeeper<S, C> {
    store: S,
    clock: C,
    high_scores: HighScoreTable,
    stats: GameStats,
}

fn warn_storage(action: &str, error: &StorageError) {
    console_warn!("Error {action}: {error}");
}

impl<S: KeyValueStore, C: Clock> ScoreKeeper<S, C> {
    pub fn load(store: S, clock: C, capacity: usize) -> Self {
        let entries: Vec<ScoreRecord> = match load_json(&store, keys::HIGH_SCORES) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(error) => {
                warn_storage("loading high scores", &error);
                Vec::new()
            }
        };
        let stats = match load_json(&store, keys::GAME_STATS) {
            Ok(stats) => stats.unwrap_or_default(),
            Err(error) => {
                warn_storage("loading game stats", &error);
                GameStats::default()
            }
        };

        Self {
            store,
            clock,
            high_scores: HighScoreTable::from_entries(entries, capacity),
            stats,
        }
    }

    pub fn high_scores(&self) -> &HighScoreTable {
        &self.high_scores
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// 终局通知：更新统计，玩家获胜时写入高分榜。
    pub fn record(&mut self, game_over: &GameOver) {
        let now = self.clock.now_iso();

        if game_over.result == PlayerResult::Win {
            let record = ScoreRecord::new(
                game_over.player_name.clone(),
                game_over.player_score,
                game_over.difficulty,
                now.clone(),
            );
            self.high_scores.insert(record);
            self.save_high_scores();
        }

        self.stats.record(game_over.result, now);
        self.save_stats();
    }

    pub fn reset_stats(&mut self) {
        self.stats = GameStats::default();
        self.save_stats();
    }

    pub fn last_player_name(&self) -> Option<String> {
        match self.store.get(keys::PLAYER_NAME) {
            Ok(name) => name.filter(|name| !name.is_empty()),
            Err(error) => {
                warn_storage("loading last player name", &error);
                None
            }
        }
    }

    pub fn save_player_name(&mut self, name: &str) {
        if let Err(error) = self.store.set(keys::PLAYER_NAME, name) {
            warn_storage("saving player name", &error);
        }
    }

    /// 读取保存的难度；缺失或无法识别时返回 `None`。
    pub fn saved_difficulty(&self) -> Option<AiDifficulty> {
        match self.store.get(keys::DIFFICULTY) {
            Ok(Some(raw)) => {
                let parsed = raw.parse().ok();
                if parsed.is_none() {
                    console_warn!("Ignoring unknown saved difficulty {raw:?}");
                }
                parsed
            }
            Ok(None) => None,
            Err(error) => {
                warn_storage("loading difficulty", &error);
                None
            }
        }
    }

    pub fn save_difficulty(&mut self, difficulty: AiDifficulty) {
        if let Err(error) = self.store.set(keys::DIFFICULTY, difficulty.key()) {
            warn_storage("saving difficulty", &error);
        }
    }

    fn save_high_scores(&mut self) {
        let entries = self.high_scores.entries();
        if let Err(error) = save_json(&mut self.store, keys::HIGH_SCORES, entries) {
            warn_storage("saving high scores", &error);
        }
    }

    fn save_stats(&mut self) {
        if let Err(error) = save_json(&mut self.store, keys::GAME_STATS, &self.stats) {
            warn_storage("saving game stats", &error);
        }
    }
}
