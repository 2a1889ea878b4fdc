use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// 棋盘格子数量（3×3）。
pub const BOARD_SIZE: usize = 9;

/// 八条连线：三行、三列、两条对角线，按此顺序检查。
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// 棋子符号。X 先手。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl FromStr for Symbol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Symbol::X),
            "O" | "o" => Ok(Symbol::O),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Symbol::X),
            Cell::O => Some(Symbol::O),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Symbol> for Cell {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::X => Cell::X,
            Symbol::O => Cell::O,
        }
    }
}

/// 3×3 棋盘，按行优先存储。序列化为 `["X", "", "O", ...]`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct Board {
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Cell; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell; BOARD_SIZE] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// 越界时返回 `false`，不会 panic。
    pub fn is_empty_at(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Cell::Empty))
    }

    pub(crate) fn place(&mut self, index: usize, symbol: Symbol) {
        self.cells[index] = symbol.into();
    }

    pub(crate) fn clear(&mut self, index: usize) {
        self.cells[index] = Cell::Empty;
    }

    pub fn empty_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        let target = Cell::from(symbol);
        self.cells.iter().filter(|cell| **cell == target).count()
    }

    /// 按 `WIN_LINES` 顺序返回第一条同色连线。
    pub fn winning_line(&self) -> Option<(Symbol, [usize; 3])> {
        WIN_LINES.iter().find_map(|&[a, b, c]| {
            let symbol = self.cells[a].symbol()?;
            if self.cells[a] == self.cells[b] && self.cells[a] == self.cells[c] {
                Some((symbol, [a, b, c]))
            } else {
                None
            }
        })
    }

    pub fn winner(&self) -> Option<Symbol> {
        self.winning_line().map(|(symbol, _)| symbol)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| !cell.is_empty())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.cells.chunks(3).enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            for cell in chunk {
                let ch = match cell {
                    Cell::Empty => '.',
                    Cell::X => 'X',
                    Cell::O => 'O',
                };
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("invalid board: {reason}")]
pub struct ParseBoardError {
    pub reason: String,
}

/// 解析九个字符，`X`/`O` 为棋子，`.`、`-`、`_` 或空格为空格子；换行忽略。
impl FromStr for Board {
    type Err = ParseBoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = [Cell::Empty; BOARD_SIZE];
        let mut count = 0;
        for ch in s.chars().filter(|ch| *ch != '\n' && *ch != '\r') {
            let cell = match ch {
                'X' | 'x' => Cell::X,
                'O' | 'o' => Cell::O,
                '.' | '-' | '_' | ' ' => Cell::Empty,
                other => {
                    return Err(ParseBoardError {
                        reason: format!("unexpected character {other:?}"),
                    })
                }
            };
            if count >= BOARD_SIZE {
                return Err(ParseBoardError {
                    reason: "more than nine cells".into(),
                });
            }
            cells[count] = cell;
            count += 1;
        }
        if count != BOARD_SIZE {
            return Err(ParseBoardError {
                reason: format!("expected nine cells, found {count}"),
            });
        }
        Ok(Board { cells })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Waiting,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveRecord {
    pub index: usize,
    pub symbol: Symbol,
}

/// 终局结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameResult {
    Win { winner: Symbol, line: [usize; 3] },
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[display("turn {turn} does not match {x_count} X and {o_count} O on the board")]
    TurnMismatch {
        turn: Symbol,
        x_count: usize,
        o_count: usize,
    },
    #[display("piece counts {x_count} X / {o_count} O are unbalanced")]
    UnbalancedPieces { x_count: usize, o_count: usize },
    #[display("board has a winner but the game is still playing")]
    UnfinishedWin,
    #[display("move log disagrees with the board")]
    MoveLogMismatch,
}

/// 单局完整状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub turn: Symbol,
    pub phase: GamePhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<MoveRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            turn: Symbol::X,
            phase: GamePhase::Waiting,
            moves: Vec::new(),
            result: None,
        }
    }

    /// 以给定棋盘进入对局，用于恢复或测试。
    pub fn with_board(board: Board, turn: Symbol) -> Self {
        Self {
            board,
            turn,
            phase: GamePhase::Playing,
            moves: Vec::new(),
            result: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    pub fn record_move(&mut self, index: usize, symbol: Symbol) {
        self.moves.push(MoveRecord { index, symbol });
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let x_count = self.board.count(Symbol::X);
        let o_count = self.board.count(Symbol::O);

        if x_count < o_count || x_count > o_count + 1 {
            return Err(IntegrityError::UnbalancedPieces { x_count, o_count });
        }

        if self.phase == GamePhase::Playing {
            let expected = if x_count == o_count {
                Symbol::X
            } else {
                Symbol::O
            };
            if self.turn != expected {
                return Err(IntegrityError::TurnMismatch {
                    turn: self.turn,
                    x_count,
                    o_count,
                });
            }
            if self.board.winner().is_some() {
                return Err(IntegrityError::UnfinishedWin);
            }
        }

        if !self.moves.is_empty() {
            let consistent = self.moves.len() <= x_count + o_count
                && self
                    .moves
                    .iter()
                    .all(|record| self.board.get(record.index) == Some(record.symbol.into()));
            if !consistent {
                return Err(IntegrityError::MoveLogMismatch);
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
