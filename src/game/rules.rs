use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use super::state::{Board, GamePhase, GameResult, GameState, IntegrityError, Symbol, BOARD_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(tag = "type")]
pub enum InvalidMoveReason {
    #[display("game is {phase}, not playing")]
    GameNotActive { phase: GamePhase },
    #[display("cell {index} is outside the board")]
    OutOfBounds { index: usize },
    #[display("cell {index} is already taken")]
    CellOccupied { index: usize },
    #[display("it is {expected}'s turn, not {actual}'s")]
    NotYourTurn { expected: Symbol, actual: Symbol },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error, From)]
#[serde(tag = "type")]
pub enum RuleError {
    #[display("invalid move: {reason}")]
    #[from(ignore)]
    InvalidMove {
        reason: InvalidMoveReason,
    },
    #[display("integrity violation: {error}")]
    IntegrityViolation { error: IntegrityError },
}

impl RuleError {
    fn invalid(reason: InvalidMoveReason) -> Self {
        RuleError::InvalidMove { reason }
    }
}

/// 一步落子后的结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MoveOutcome {
    Continue { next_turn: Symbol },
    Win { winner: Symbol, line: [usize; 3] },
    Draw,
}

impl MoveOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MoveOutcome::Continue { .. })
    }

    pub fn result(&self) -> Option<GameResult> {
        match *self {
            MoveOutcome::Continue { .. } => None,
            MoveOutcome::Win { winner, line } => Some(GameResult::Win { winner, line }),
            MoveOutcome::Draw => Some(GameResult::Draw),
        }
    }
}

/// 对局状态机：只管棋盘、轮次与阶段，不做任何 I/O。
#[derive(Debug, Clone, Default)]
pub struct GameEngine {
    state: GameState,
}

impl GameEngine {
    pub fn new() -> Self {
        Self {
            state: GameState::new(),
        }
    }

    /// 从序列化状态恢复，先做一致性检查。
    pub fn with_state(state: GameState) -> Result<Self, RuleError> {
        state.integrity_check()?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn current_turn(&self) -> Symbol {
        self.state.turn
    }

    pub fn new_game(&mut self) -> &GameState {
        self.state = GameState {
            phase: GamePhase::Playing,
            ..GameState::new()
        };
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = GameState::new();
    }

    fn ensure_playing(&self) -> Result<(), RuleError> {
        if self.state.phase != GamePhase::Playing {
            return Err(RuleError::invalid(InvalidMoveReason::GameNotActive {
                phase: self.state.phase,
            }));
        }
        Ok(())
    }

    fn ensure_turn_owner(&self, symbol: Symbol) -> Result<(), RuleError> {
        if self.state.turn != symbol {
            return Err(RuleError::invalid(InvalidMoveReason::NotYourTurn {
                expected: self.state.turn,
                actual: symbol,
            }));
        }
        Ok(())
    }

    fn ensure_open_cell(&self, index: usize) -> Result<(), RuleError> {
        if index >= BOARD_SIZE {
            return Err(RuleError::invalid(InvalidMoveReason::OutOfBounds { index }));
        }
        if !self.state.board.is_empty_at(index) {
            return Err(RuleError::invalid(InvalidMoveReason::CellOccupied { index }));
        }
        Ok(())
    }

    /// 校验全部通过之前不修改任何状态。
    pub fn apply_move(&mut self, index: usize, symbol: Symbol) -> Result<MoveOutcome, RuleError> {
        self.ensure_playing()?;
        self.ensure_open_cell(index)?;
        self.ensure_turn_owner(symbol)?;

        self.state.board.place(index, symbol);
        self.state.record_move(index, symbol);

        let outcome = evaluate(&self.state.board, symbol);
        match outcome {
            MoveOutcome::Continue { next_turn } => self.state.turn = next_turn,
            _ => {
                self.state.phase = GamePhase::Ended;
                self.state.result = outcome.result();
            }
        }
        Ok(outcome)
    }
}

/// 胜负判定先于满盘判定：满盘且成线算胜。
fn evaluate(board: &Board, last_mover: Symbol) -> MoveOutcome {
    if let Some((winner, line)) = board.winning_line() {
        MoveOutcome::Win { winner, line }
    } else if board.is_full() {
        MoveOutcome::Draw
    } else {
        MoveOutcome::Continue {
            next_turn: last_mover.opponent(),
        }
    }
}

pub fn winner(board: &Board) -> Option<Symbol> {
    board.winner()
}

pub fn is_full(board: &Board) -> bool {
    board.is_full()
}
