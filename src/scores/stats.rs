use serde::{Deserialize, Serialize};

/// 从玩家视角看的单局结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerResult {
    Win,
    Loss,
    Tie,
}

/// 累计统计，只增不减（除非外部显式重置）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    #[serde(default)]
    pub total_games: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub ties: u32,
    #[serde(default)]
    pub last_played: Option<String>,
}

impl GameStats {
    pub fn record(&mut self, result: PlayerResult, now: String) {
        self.total_games = self.total_games.saturating_add(1);
        let counter = match result {
            PlayerResult::Win => &mut self.wins,
            PlayerResult::Loss => &mut self.losses,
            PlayerResult::Tie => &mut self.ties,
        };
        *counter = counter.saturating_add(1);
        self.last_played = Some(now);
    }
}
