use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::ai::AiDifficulty;
use crate::game::Symbol;

/// 页面传入的游戏配置，所有字段都有默认值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub ai_delay_ms: u32,
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub max_high_scores: usize,
    pub human_symbol: Symbol,
    pub ai_symbol: Symbol,
    pub default_difficulty: AiDifficulty,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ai_delay_ms: 500,
            min_name_length: 2,
            max_name_length: 20,
            max_high_scores: 5,
            human_symbol: Symbol::X,
            ai_symbol: Symbol::O,
            default_difficulty: AiDifficulty::Amateur,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum ConfigError {
    #[display("malformed config: {reason}")]
    Malformed { reason: String },
    #[display("human and AI cannot both play {symbol}")]
    SameSymbol { symbol: Symbol },
    #[display("name length bounds {min}..={max} are inverted")]
    NameBounds { min: usize, max: usize },
    #[display("high score table needs room for at least one entry")]
    EmptyHighScores,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json).map_err(|error| {
            ConfigError::Malformed {
                reason: error.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.human_symbol == self.ai_symbol {
            return Err(ConfigError::SameSymbol {
                symbol: self.human_symbol,
            });
        }
        if self.min_name_length > self.max_name_length {
            return Err(ConfigError::NameBounds {
                min: self.min_name_length,
                max: self.max_name_length,
            });
        }
        if self.max_high_scores == 0 {
            return Err(ConfigError::EmptyHighScores);
        }
        Ok(())
    }
}
