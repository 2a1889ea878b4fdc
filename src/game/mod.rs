//! 游戏核心逻辑模块（棋盘、状态机、规则引擎）。

pub mod rules;
pub mod state;

pub use rules::{is_full, winner, GameEngine, InvalidMoveReason, MoveOutcome, RuleError};
pub use state::{
    Board,
    Cell,
    GamePhase,
    GameResult,
    GameState,
    IntegrityError,
    MoveRecord,
    ParseBoardError,
    Symbol,
    BOARD_SIZE,
    WIN_LINES,
};
