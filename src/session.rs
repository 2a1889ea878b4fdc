//! 一次浏览会话：引擎、AI、计分与玩家设置的组合。

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::ai::{AiAgent, AiConfig, AiDecision, AiDifficulty, AiError};
use crate::config::GameConfig;
use crate::game::{GameEngine, GamePhase, GameState, MoveOutcome, RuleError, Symbol};
use crate::scores::{
    GameOver, GameStats, KeyValueStore, PlayerResult, ScoreKeeper, ScoreRecord,
};
use crate::utils::{console_error, console_log, sanitize_input, Clock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error, From)]
#[serde(tag = "type")]
pub enum SessionError {
    #[display("{error}")]
    Rule { error: RuleError },
    #[display("{error}")]
    Ai { error: AiError },
    #[display("please enter your name")]
    #[from(ignore)]
    NameMissing,
    #[display("name must be at least {min} characters")]
    #[from(ignore)]
    NameTooShort { min: usize },
    #[display("name must be at most {max} characters")]
    #[from(ignore)]
    NameTooLong { max: usize },
    #[display("name contains invalid characters")]
    #[from(ignore)]
    InvalidCharacters,
    #[display("cannot change the player name during a game")]
    #[from(ignore)]
    GameInProgress,
    #[display("difficulty can only change before a game starts")]
    #[from(ignore)]
    DifficultyLocked,
}

/// 名字中不允许出现的字符。
const FORBIDDEN_NAME_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

/// 本次会话的比分，刷新页面即清零。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionScores {
    pub player: u32,
    pub ai: u32,
}

/// 排队中的 AI 落子。只有与当前代号一致的票据才会被执行。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingAiMove {
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnReport {
    pub outcome: MoveOutcome,
    pub state: GameState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<AiDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingAiMove>,
}

/// 给界面渲染用的只读视图。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: GameState,
    pub player_name: Option<String>,
    pub human_symbol: Symbol,
    pub ai_symbol: Symbol,
    pub difficulty: AiDifficulty,
    pub difficulty_name: &'static str,
    pub scores: SessionScores,
    pub high_scores: Vec<ScoreRecord>,
    pub stats: GameStats,
    pub ai_thinking: bool,
}

pub struct GameSession<S, C> {
    config: GameConfig,
    engine: GameEngine,
    ai: AiAgent,
    keeper: ScoreKeeper<S, C>,
    player_name: Option<String>,
    scores: SessionScores,
    generation: u64,
    pending: Option<PendingAiMove>,
}

impl<S: KeyValueStore, C: Clock> GameSession<S, C> {
    pub fn new(config: GameConfig, store: S, clock: C) -> Self {
        let keeper = ScoreKeeper::load(store, clock, config.max_high_scores);
        let difficulty = keeper.saved_difficulty().unwrap_or(config.default_difficulty);
        let agent =
            AiAgent::new(AiConfig::from_difficulty(difficulty).with_symbol(config.ai_symbol));
        Self::assemble(config, keeper, agent)
    }

    /// 固定随机种子，便于测试复现。
    pub fn with_seed(config: GameConfig, store: S, clock: C, seed: u64) -> Self {
        let keeper = ScoreKeeper::load(store, clock, config.max_high_scores);
        let difficulty = keeper.saved_difficulty().unwrap_or(config.default_difficulty);
        let agent = AiAgent::with_seed(
            AiConfig::from_difficulty(difficulty).with_symbol(config.ai_symbol),
            seed,
        );
        Self::assemble(config, keeper, agent)
    }

    fn assemble(config: GameConfig, keeper: ScoreKeeper<S, C>, ai: AiAgent) -> Self {
        let player_name = keeper.last_player_name();
        Self {
            config,
            engine: GameEngine::new(),
            ai,
            keeper,
            player_name,
            scores: SessionScores::default(),
            generation: 0,
            pending: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn difficulty(&self) -> AiDifficulty {
        self.ai.config().difficulty
    }

    pub fn scores(&self) -> SessionScores {
        self.scores
    }

    pub fn keeper(&self) -> &ScoreKeeper<S, C> {
        &self.keeper
    }

    pub fn pending(&self) -> Option<PendingAiMove> {
        self.pending
    }

    /// 去掉首尾空白、校验长度与字符、转义后保存。返回最终使用的名字。
    pub fn set_player_name(&mut self, raw: &str) -> Result<String, SessionError> {
        if self.engine.phase() == GamePhase::Playing {
            return Err(SessionError::GameInProgress);
        }

        let trimmed = raw.trim();
        let length = trimmed.chars().count();
        if length == 0 {
            return Err(SessionError::NameMissing);
        }
        if length < self.config.min_name_length {
            return Err(SessionError::NameTooShort {
                min: self.config.min_name_length,
            });
        }
        if length > self.config.max_name_length {
            return Err(SessionError::NameTooLong {
                max: self.config.max_name_length,
            });
        }

        if trimmed.chars().any(|ch| FORBIDDEN_NAME_CHARS.contains(&ch)) {
            return Err(SessionError::InvalidCharacters);
        }

        let name = sanitize_input(trimmed);
        self.keeper.save_player_name(&name);
        self.player_name = Some(name.clone());
        Ok(name)
    }

    pub fn set_difficulty(&mut self, difficulty: AiDifficulty) -> Result<(), SessionError> {
        if self.engine.phase() != GamePhase::Waiting {
            return Err(SessionError::DifficultyLocked);
        }
        self.ai.set_difficulty(difficulty);
        self.keeper.save_difficulty(difficulty);
        console_log!("AI difficulty set to {}", difficulty.name());
        Ok(())
    }

    /// 开局（或再来一局）。AI 执先手时返回它的票据。
    pub fn start_game(&mut self) -> Result<Option<PendingAiMove>, SessionError> {
        if self.player_name.is_none() {
            return Err(SessionError::NameMissing);
        }

        self.cancel_pending_ai_move();
        self.engine.new_game();
        console_log!(
            "Game started against {} AI",
            self.ai.config().difficulty.name()
        );
        Ok(self.schedule_ai_move())
    }

    /// 玩家落子。对局继续时排队一步 AI 落子。
    pub fn play_move(&mut self, index: usize) -> Result<TurnReport, SessionError> {
        let outcome = self.engine.apply_move(index, self.config.human_symbol)?;
        let pending = if outcome.is_terminal() {
            self.finish(outcome);
            None
        } else {
            self.schedule_ai_move()
        };

        Ok(TurnReport {
            outcome,
            state: self.engine.state().clone(),
            decision: None,
            pending,
        })
    }

    /// 轮到 AI 且尚无排队时发出一张新票据。每张票据的代号都不同。
    pub fn schedule_ai_move(&mut self) -> Option<PendingAiMove> {
        if self.pending.is_none()
            && self.engine.phase() == GamePhase::Playing
            && self.engine.current_turn() == self.config.ai_symbol
        {
            self.generation = self.generation.wrapping_add(1);
            self.pending = Some(PendingAiMove {
                generation: self.generation,
            });
        }
        self.pending
    }

    /// 执行排队的 AI 落子。票据已过期时返回 `Ok(None)`，棋盘不变。
    pub fn resolve_ai_move(
        &mut self,
        ticket: PendingAiMove,
    ) -> Result<Option<TurnReport>, SessionError> {
        if self.pending != Some(ticket) {
            console_log!("Dropping stale AI move from generation {}", ticket.generation);
            return Ok(None);
        }
        self.pending = None;

        let decision = self.ai.select_move(self.engine.board()).map_err(|error| {
            console_error!("AI could not move: {error}");
            error
        })?;
        let outcome = self.engine.apply_move(decision.index, self.config.ai_symbol)?;
        if outcome.is_terminal() {
            self.finish(outcome);
        }

        Ok(Some(TurnReport {
            outcome,
            state: self.engine.state().clone(),
            decision: Some(decision),
            pending: None,
        }))
    }

    pub fn cancel_pending_ai_move(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
    }

    /// 完全重置：回到等待状态并清零本次比分。
    pub fn reset(&mut self) {
        self.cancel_pending_ai_move();
        self.engine.reset();
        self.scores = SessionScores::default();
        console_log!("Game reset");
    }

    /// 回到大厅，保留本次比分。
    pub fn return_to_lobby(&mut self) {
        self.cancel_pending_ai_move();
        self.engine.reset();
    }

    pub fn reset_stats(&mut self) {
        self.keeper.reset_stats();
        console_log!("Game statistics reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let difficulty = self.difficulty();
        SessionSnapshot {
            state: self.engine.state().clone(),
            player_name: self.player_name.clone(),
            human_symbol: self.config.human_symbol,
            ai_symbol: self.config.ai_symbol,
            difficulty,
            difficulty_name: difficulty.name(),
            scores: self.scores,
            high_scores: self.keeper.high_scores().entries().to_vec(),
            stats: self.keeper.stats().clone(),
            ai_thinking: self.pending.is_some(),
        }
    }

    fn finish(&mut self, outcome: MoveOutcome) {
        let result = match outcome {
            MoveOutcome::Win { winner, .. } if winner == self.config.human_symbol => {
                self.scores.player += 1;
                console_log!("Game over: player wins");
                PlayerResult::Win
            }
            MoveOutcome::Win { .. } => {
                self.scores.ai += 1;
                console_log!("Game over: AI wins");
                PlayerResult::Loss
            }
            MoveOutcome::Draw => {
                console_log!("Game over: draw");
                PlayerResult::Tie
            }
            MoveOutcome::Continue { .. } => return,
        };

        let game_over = GameOver {
            result,
            player_name: self.player_name.clone().unwrap_or_default(),
            player_score: self.scores.player,
            difficulty: self.difficulty(),
        };
        self.keeper.record(&game_over);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Board, InvalidMoveReason};
    use crate::scores::keeper::test_support::StepClock;
    use crate::scores::{keys, MemoryStore};

    type TestSession = GameSession<MemoryStore, StepClock>;

    fn session_with(store: MemoryStore) -> TestSession {
        let mut session =
            GameSession::with_seed(GameConfig::default(), store, StepClock::default(), 7);
        session
            .set_difficulty(AiDifficulty::Pro)
            .expect("lobby allows difficulty changes");
        session
    }

    fn named_session() -> TestSession {
        let mut session = session_with(MemoryStore::new());
        session.set_player_name("Ann").expect("valid name");
        session
    }

    /// 人类执 X 走在 2 号格即可连成顶行。
    fn force_human_win(session: &mut TestSession) -> TurnReport {
        session.start_game().expect("named player can start");
        let board: Board = "XX.OO....".parse().expect("valid board");
        session.engine =
            GameEngine::with_state(GameState::with_board(board, Symbol::X)).expect("consistent");
        session.play_move(2).expect("winning move")
    }

    #[test]
    fn start_requires_a_name() {
        let mut session = session_with(MemoryStore::new());
        assert_eq!(session.start_game(), Err(SessionError::NameMissing));
        assert_eq!(session.state().phase, GamePhase::Waiting);
    }

    #[test]
    fn name_is_trimmed_validated_and_escaped() {
        let mut session = session_with(MemoryStore::new());
        assert_eq!(session.set_player_name("   "), Err(SessionError::NameMissing));
        assert_eq!(
            session.set_player_name(" A "),
            Err(SessionError::NameTooShort { min: 2 })
        );
        assert_eq!(
            session.set_player_name(&"x".repeat(21)),
            Err(SessionError::NameTooLong { max: 20 })
        );

        for name in ["<b>", "Ann's", "Tom & Jerry", "say \"hi\"", "a>b"] {
            assert_eq!(
                session.set_player_name(name),
                Err(SessionError::InvalidCharacters),
                "{name:?} should be rejected"
            );
        }
        assert_eq!(session.player_name(), None);
        assert_eq!(session.keeper().store().raw(keys::PLAYER_NAME), None);

        assert_eq!(session.set_player_name("  Ann\u{a0}Lee ").as_deref(), Ok("Ann&nbsp;Lee"));
        assert_eq!(session.player_name(), Some("Ann&nbsp;Lee"));
        assert_eq!(session.keeper().store().raw(keys::PLAYER_NAME), Some("Ann&nbsp;Lee"));
    }

    #[test]
    fn settings_are_restored_from_storage() {
        let store = MemoryStore::new()
            .with_entry(keys::PLAYER_NAME, "Bo")
            .with_entry(keys::DIFFICULTY, "BEGINNER");
        let session: TestSession =
            GameSession::with_seed(GameConfig::default(), store, StepClock::default(), 1);
        assert_eq!(session.player_name(), Some("Bo"));
        assert_eq!(session.difficulty(), AiDifficulty::Beginner);
    }

    #[test]
    fn human_move_queues_one_ai_reply() {
        let mut session = named_session();
        assert_eq!(session.start_game(), Ok(None));

        let report = session.play_move(4).expect("center is open");
        assert_eq!(report.outcome, MoveOutcome::Continue { next_turn: Symbol::O });
        let ticket = report.pending.expect("AI should be queued");
        assert!(session.snapshot().ai_thinking);

        // AI 思考期间玩家不能抢着落子
        assert_eq!(
            session.play_move(0),
            Err(SessionError::Rule {
                error: RuleError::InvalidMove {
                    reason: InvalidMoveReason::NotYourTurn {
                        expected: Symbol::O,
                        actual: Symbol::X,
                    },
                },
            })
        );

        let reply = session
            .resolve_ai_move(ticket)
            .expect("AI can move")
            .expect("ticket is current");
        let decision = reply.decision.expect("AI reply carries its decision");
        assert_eq!(decision.index, 0);
        assert_eq!(reply.state.board.get(0), Some(crate::game::Cell::O));
        assert_eq!(session.state().turn, Symbol::X);
        assert_eq!(session.pending(), None);
    }

    #[test]
    fn restart_invalidates_pending_ai_move() {
        let mut session = named_session();
        session.start_game().expect("start");
        let ticket = session
            .play_move(4)
            .expect("move")
            .pending
            .expect("queued");

        session.start_game().expect("restart");
        assert_eq!(session.resolve_ai_move(ticket), Ok(None));
        assert_eq!(session.state().board, Board::new());
        assert_eq!(session.state().turn, Symbol::X);
    }

    #[test]
    fn cancelled_ticket_is_never_applied() {
        let mut session = named_session();
        session.start_game().expect("start");
        let ticket = session.play_move(0).expect("move").pending.expect("queued");

        session.cancel_pending_ai_move();
        assert_eq!(session.resolve_ai_move(ticket), Ok(None));
        assert_eq!(session.state().board.count(Symbol::O), 0);

        // 同一张票据也不能用两次
        session.return_to_lobby();
        assert_eq!(session.resolve_ai_move(ticket), Ok(None));
    }

    #[test]
    fn consumed_ticket_cannot_play_the_next_ai_move() {
        let mut session = named_session();
        session.start_game().expect("start");
        let first = session.play_move(4).expect("move").pending.expect("queued");
        session
            .resolve_ai_move(first)
            .expect("AI can move")
            .expect("ticket is current");

        let second = session.play_move(8).expect("move").pending.expect("queued");
        assert_ne!(first, second);

        // 重复回调带着已用过的票据到达，不能提前执行下一步
        assert_eq!(session.resolve_ai_move(first), Ok(None));
        assert_eq!(session.state().board.count(Symbol::O), 1);
        assert_eq!(session.pending(), Some(second));

        let reply = session
            .resolve_ai_move(second)
            .expect("AI can move")
            .expect("real ticket still applies");
        assert!(reply.decision.is_some());
        assert_eq!(session.state().board.count(Symbol::O), 2);
    }

    #[test]
    fn human_win_updates_scores_and_high_scores() {
        let mut session = named_session();
        let report = force_human_win(&mut session);
        assert!(matches!(report.outcome, MoveOutcome::Win { winner: Symbol::X, line: [0, 1, 2] }));
        assert_eq!(report.pending, None);
        assert_eq!(session.scores(), SessionScores { player: 1, ai: 0 });
        assert_eq!(session.keeper().stats().wins, 1);

        force_human_win(&mut session);
        let best = session
            .keeper()
            .high_scores()
            .best_for("Ann", AiDifficulty::Pro)
            .expect("Ann is listed");
        assert_eq!(best.score, 2);
        assert_eq!(session.keeper().high_scores().entries().len(), 1);
    }

    #[test]
    fn pro_ai_never_lets_first_empty_cell_strategy_win() {
        let mut session = named_session();
        session.start_game().expect("start");

        while session.state().is_playing() {
            let index = session.state().board.empty_cells()[0];
            let report = session.play_move(index).expect("legal move");
            if let Some(ticket) = report.pending {
                session
                    .resolve_ai_move(ticket)
                    .expect("AI can move")
                    .expect("ticket is current");
            }
        }

        let stats = session.keeper().stats();
        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.wins, 0);
        assert_eq!(session.scores().player, 0);
        assert_eq!(stats.losses, session.scores().ai);
        assert_eq!(stats.losses + stats.ties, 1);
        assert!(session.keeper().high_scores().is_empty());
    }

    #[test]
    fn difficulty_is_locked_during_play() {
        let mut session = named_session();
        session.start_game().expect("start");
        assert_eq!(
            session.set_difficulty(AiDifficulty::Beginner),
            Err(SessionError::DifficultyLocked)
        );
        assert_eq!(session.set_player_name("Bob"), Err(SessionError::GameInProgress));

        session.return_to_lobby();
        session
            .set_difficulty(AiDifficulty::Beginner)
            .expect("lobby allows changes");
        assert_eq!(session.keeper().store().raw(keys::DIFFICULTY), Some("BEGINNER"));
        assert_eq!(session.snapshot().difficulty_name, "Beginner");
    }

    #[test]
    fn reset_clears_session_scores_but_lobby_keeps_them() {
        let mut session = named_session();
        force_human_win(&mut session);

        session.return_to_lobby();
        assert_eq!(session.state().phase, GamePhase::Waiting);
        assert_eq!(session.scores().player, 1);

        session.reset();
        assert_eq!(session.scores(), SessionScores::default());
        // 持久化的统计不受会话重置影响
        assert_eq!(session.keeper().stats().wins, 1);

        session.reset_stats();
        assert_eq!(session.keeper().stats(), &GameStats::default());
    }

    #[test]
    fn game_runs_without_storage() {
        let mut session = session_with(MemoryStore::unavailable());
        session.set_player_name("Ann").expect("name is kept in memory");
        let report = force_human_win(&mut session);
        assert!(report.outcome.is_terminal());
        assert_eq!(session.keeper().stats().wins, 1);
        assert_eq!(session.keeper().high_scores().entries().len(), 1);
    }

    #[test]
    fn ai_playing_x_opens_the_game() {
        let config = GameConfig {
            human_symbol: Symbol::O,
            ai_symbol: Symbol::X,
            default_difficulty: AiDifficulty::Pro,
            ..GameConfig::default()
        };
        let mut session: TestSession =
            GameSession::with_seed(config, MemoryStore::new(), StepClock::default(), 3);
        session.set_player_name("Ann").expect("valid");

        let ticket = session.start_game().expect("start").expect("AI opens");
        let reply = session
            .resolve_ai_move(ticket)
            .expect("AI can move")
            .expect("current ticket");
        assert_eq!(reply.decision.map(|decision| decision.index), Some(0));
        assert_eq!(session.state().turn, Symbol::O);
        session.play_move(4).expect("human answers as O");
    }

    #[test]
    fn snapshot_serializes_for_the_page() {
        let mut session = named_session();
        session.start_game().expect("start");
        session.play_move(4).expect("move");

        let json = serde_json::to_value(session.snapshot()).expect("serialize");
        assert_eq!(json["playerName"], "Ann");
        assert_eq!(json["difficulty"], "PRO");
        assert_eq!(json["aiThinking"], true);
        assert_eq!(json["state"]["phase"], "playing");
        assert_eq!(json["state"]["board"][4], "X");
        assert_eq!(json["scores"]["player"], 0);
    }
}
