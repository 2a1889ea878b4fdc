pub mod ai;
pub mod config;
pub mod game;
pub mod scores;
pub mod session;
pub mod utils;

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAgent, AiConfig, AiDecision, AiDifficulty, AiError, MoveSource};
pub use config::{ConfigError, GameConfig};
pub use game::{
    Board, Cell, GameEngine, GamePhase, GameResult, GameState, IntegrityError, InvalidMoveReason,
    MoveOutcome, RuleError, Symbol,
};
pub use scores::{
    BrowserStorage, GameStats, HighScoreTable, KeyValueStore, MemoryStore, ScoreKeeper,
    ScoreRecord, StorageError,
};
pub use session::{GameSession, PendingAiMove, SessionError, SessionScores, TurnReport};
pub use utils::{BrowserClock, Clock};

use utils::{console_log, console_warn};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

type BrowserSession = GameSession<Box<dyn KeyValueStore>, BrowserClock>;

fn to_js_error<E: Serialize + std::fmt::Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn open_storage() -> Box<dyn KeyValueStore> {
    match BrowserStorage::local() {
        Ok(storage) => Box::new(storage),
        Err(error) => {
            console_warn!("localStorage is not available, scores will not persist: {error}");
            Box::new(MemoryStore::new())
        }
    }
}

fn parse_difficulty(value: &str) -> Result<AiDifficulty, JsValue> {
    AiDifficulty::from_str(value)
        .map_err(|_| JsValue::from_str(&format!("unknown difficulty: {value}")))
}

#[wasm_bindgen]
pub struct TicTacToe {
    session: Rc<RefCell<BrowserSession>>,
}

#[wasm_bindgen]
impl TicTacToe {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TicTacToe, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(to_js_error)?,
            None => GameConfig::default(),
        };
        let session = GameSession::new(config, open_storage(), BrowserClock);
        console_log!("Tic-tac-toe ready, difficulty {}", session.difficulty().name());
        Ok(TicTacToe {
            session: Rc::new(RefCell::new(session)),
        })
    }

    #[wasm_bindgen(js_name = "snapshotJson")]
    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        to_json(&self.session.borrow().snapshot())
    }

    #[wasm_bindgen(js_name = "setPlayerName")]
    pub fn set_player_name(&self, name: &str) -> Result<String, JsValue> {
        self.session
            .borrow_mut()
            .set_player_name(name)
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "setDifficulty")]
    pub fn set_difficulty(&self, difficulty: &str) -> Result<(), JsValue> {
        let difficulty = parse_difficulty(difficulty)?;
        self.session
            .borrow_mut()
            .set_difficulty(difficulty)
            .map_err(to_js_error)
    }

    /// 开局后返回快照；AI 先手时需随后调用 `thinkAi`。
    #[wasm_bindgen(js_name = "startGame")]
    pub fn start_game(&self) -> Result<String, JsValue> {
        let mut session = self.session.borrow_mut();
        session.start_game().map_err(to_js_error)?;
        to_json(&session.snapshot())
    }

    #[wasm_bindgen(js_name = "playMove")]
    pub fn play_move(&self, index: usize) -> Result<String, JsValue> {
        let report = self
            .session
            .borrow_mut()
            .play_move(index)
            .map_err(to_js_error)?;
        to_json(&report)
    }

    /// 等待 `aiDelayMs` 后执行排队的 AI 落子。票据过期或没有排队时得到 `null`。
    #[wasm_bindgen(js_name = "thinkAi")]
    pub fn think_ai(&self) -> Promise {
        let session = Rc::clone(&self.session);
        let (ticket, delay) = {
            let current = session.borrow();
            (current.pending(), current.config().ai_delay_ms)
        };

        future_to_promise(async move {
            let Some(ticket) = ticket else {
                return Ok(JsValue::NULL);
            };
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let resolved = session
                .borrow_mut()
                .resolve_ai_move(ticket)
                .map_err(to_js_error)?;
            match resolved {
                Some(report) => Ok(JsValue::from_str(&to_json(&report)?)),
                None => Ok(JsValue::NULL),
            }
        })
    }

    #[wasm_bindgen(js_name = "cancelAi")]
    pub fn cancel_ai(&self) {
        self.session.borrow_mut().cancel_pending_ai_move();
    }

    pub fn reset(&self) {
        self.session.borrow_mut().reset();
    }

    #[wasm_bindgen(js_name = "returnToLobby")]
    pub fn return_to_lobby(&self) {
        self.session.borrow_mut().return_to_lobby();
    }

    #[wasm_bindgen(js_name = "resetStats")]
    pub fn reset_stats(&self) {
        self.session.borrow_mut().reset_stats();
    }
}

#[derive(Serialize)]
struct WinnerResponse {
    winner: Option<Symbol>,
    line: Option<[usize; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DifficultyLevel {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    random_move_chance: f64,
}

#[wasm_bindgen(js_name = "checkWinner")]
pub fn check_winner(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let line = board.winning_line();
    let response = WinnerResponse {
        winner: line.map(|(winner, _)| winner),
        line: line.map(|(_, cells)| cells),
    };
    to_value(&response).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "isBoardFull")]
pub fn is_board_full(board: JsValue) -> Result<bool, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    Ok(game::is_full(&board))
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(
    board: JsValue,
    difficulty: Option<String>,
    symbol: Option<String>,
) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let difficulty = difficulty
        .as_deref()
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or_default();
    let mut config = AiConfig::from_difficulty(difficulty);
    if let Some(symbol) = symbol
        .as_deref()
        .and_then(|value| Symbol::from_str(value).ok())
    {
        config = config.with_symbol(symbol);
    }
    let mut agent = AiAgent::new(config);
    let decision = agent.select_move(&board).map_err(to_js_error)?;
    to_value(&decision).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "difficultyLevels")]
pub fn difficulty_levels() -> Result<JsValue, JsValue> {
    let levels: Vec<DifficultyLevel> = AiDifficulty::ALL
        .iter()
        .map(|difficulty| DifficultyLevel {
            key: difficulty.key(),
            name: difficulty.name(),
            description: difficulty.description(),
            random_move_chance: difficulty.random_move_chance(),
        })
        .collect();
    to_value(&levels).map_err(JsValue::from)
}
