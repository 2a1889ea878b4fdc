//! AI 对手：带难度随机化的 minimax 搜索。

pub mod minimax;

pub use minimax::{
    minimax, AiAgent, AiConfig, AiDecision, AiDifficulty, AiError, MoveSource, WIN_SCORE,
};
