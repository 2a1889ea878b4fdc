use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{Board, Symbol, BOARD_SIZE};

/// 终局基础分：胜 `WIN_SCORE - depth`，负 `depth - WIN_SCORE`。
pub const WIN_SCORE: i32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AiDifficulty {
    Beginner,
    #[default]
    Amateur,
    Pro,
}

impl AiDifficulty {
    pub const ALL: [AiDifficulty; 3] = [
        AiDifficulty::Beginner,
        AiDifficulty::Amateur,
        AiDifficulty::Pro,
    ];

    /// 放弃搜索、随机落子的概率。
    pub fn random_move_chance(self) -> f64 {
        match self {
            AiDifficulty::Beginner => 0.7,
            AiDifficulty::Amateur => 0.3,
            AiDifficulty::Pro => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AiDifficulty::Beginner => "Beginner",
            AiDifficulty::Amateur => "Amateur",
            AiDifficulty::Pro => "Pro",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AiDifficulty::Beginner => "AI makes many mistakes",
            AiDifficulty::Amateur => "AI sometimes makes mistakes",
            AiDifficulty::Pro => "AI never makes mistakes",
        }
    }

    /// 持久化使用的键值，如 `PRO`。
    pub fn key(self) -> &'static str {
        match self {
            AiDifficulty::Beginner => "BEGINNER",
            AiDifficulty::Amateur => "AMATEUR",
            AiDifficulty::Pro => "PRO",
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" | "easy" => Ok(AiDifficulty::Beginner),
            "amateur" | "normal" | "medium" => Ok(AiDifficulty::Amateur),
            "pro" | "hard" | "expert" => Ok(AiDifficulty::Pro),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub random_move_chance: f64,
    pub symbol: Symbol,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        Self {
            difficulty,
            random_move_chance: difficulty.random_move_chance(),
            symbol: Symbol::O,
        }
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = symbol;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::default())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MoveSource {
    Random,
    Minimax,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiDecision {
    pub index: usize,
    pub source: MoveSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i32>,
    pub nodes: u64,
    pub depth_reached: u8,
    pub difficulty: AiDifficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum AiError {
    #[display("no empty cell left for the AI to play")]
    NoMoveAvailable,
}

struct SearchStats {
    nodes: u64,
    depth_reached: u8,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
        }
    }
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn set_difficulty(&mut self, difficulty: AiDifficulty) {
        self.config = AiConfig::from_difficulty(difficulty).with_symbol(self.config.symbol);
    }

    fn random_decision(&mut self, open: &[usize]) -> Result<AiDecision, AiError> {
        let index = *open.choose(&mut self.rng).ok_or(AiError::NoMoveAvailable)?;
        Ok(AiDecision {
            index,
            source: MoveSource::Random,
            evaluation: None,
            nodes: 0,
            depth_reached: 0,
            difficulty: self.config.difficulty,
        })
    }

    /// 为 `config.symbol` 选一步。满盘返回 `NoMoveAvailable`。
    ///
    /// 先按难度掷一次随机数决定是否随机落子；否则对每个空格做完整的
    /// minimax，取第一个严格最高分（同分取最小下标）。
    pub fn select_move(&mut self, board: &Board) -> Result<AiDecision, AiError> {
        let open = board.empty_cells();
        if open.is_empty() {
            return Err(AiError::NoMoveAvailable);
        }

        if self.rng.gen::<f64>() < self.config.random_move_chance {
            return self.random_decision(&open);
        }

        let ai = self.config.symbol;
        let mut scratch = *board;
        let mut stats = SearchStats::new();
        let mut best: Option<(usize, i32)> = None;

        for index in open {
            scratch.place(index, ai);
            let score = minimax_rec(&mut scratch, 0, false, ai, &mut stats);
            scratch.clear(index);

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        debug_assert_eq!(&scratch, board, "search must undo every placement");

        let (index, evaluation) = best.ok_or(AiError::NoMoveAvailable)?;
        Ok(AiDecision {
            index,
            source: MoveSource::Minimax,
            evaluation: Some(evaluation),
            nodes: stats.nodes,
            depth_reached: stats.depth_reached,
            difficulty: self.config.difficulty,
        })
    }
}

/// 以 `ai` 为最大化方评估局面。`depth` 为已假设的步数。
pub fn minimax(board: &mut Board, depth: i32, maximizing: bool, ai: Symbol) -> i32 {
    let mut stats = SearchStats::new();
    minimax_rec(board, depth, maximizing, ai, &mut stats)
}

fn minimax_rec(
    board: &mut Board,
    depth: i32,
    maximizing: bool,
    ai: Symbol,
    stats: &mut SearchStats,
) -> i32 {
    stats.nodes += 1;
    let depth_explored = u8::try_from(depth).unwrap_or(u8::MAX);
    if depth_explored > stats.depth_reached {
        stats.depth_reached = depth_explored;
    }

    match board.winner() {
        Some(winner) if winner == ai => return WIN_SCORE - depth,
        Some(_) => return depth - WIN_SCORE,
        None => {}
    }
    if board.is_full() {
        return 0;
    }

    if maximizing {
        let mut value = i32::MIN;
        for index in 0..BOARD_SIZE {
            if !board.is_empty_at(index) {
                continue;
            }
            board.place(index, ai);
            let score = minimax_rec(board, depth + 1, false, ai, stats);
            board.clear(index);
            value = value.max(score);
        }
        value
    } else {
        let opponent = ai.opponent();
        let mut value = i32::MAX;
        for index in 0..BOARD_SIZE {
            if !board.is_empty_at(index) {
                continue;
            }
            board.place(index, opponent);
            let score = minimax_rec(board, depth + 1, true, ai, stats);
            board.clear(index);
            value = value.min(score);
        }
        value
    }
}
