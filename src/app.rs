//! App: terminal init, main loop, animation driving and key handling.
//!
//! The app is the board's "presentation layer": it resolves the cursor to a
//! block (pick resolution), delivers phase signals (start/end/restart),
//! plays the staged destroy/fall animations for a fixed duration before
//! reporting completion, and drains the score event channel.

use crate::board::{AnimationKind, Board, BoardEvent, Coord};
use crate::input::{key_to_action, Action};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Destroy/fall animation hold, matching the original 0.3 s tween.
pub const ANIM_MS: u64 = 300;

/// Score popup lifetime.
const POPUP_MS: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    BoardCleared,
    NoMatchesLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTab {
    Difficulty,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub current_tab: MenuTab,
    pub selected_difficulty: crate::Difficulty,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            current_tab: MenuTab::Difficulty,
            selected_difficulty: crate::Difficulty::Medium,
        }
    }
}

/// Cursor on the grid: plan position plus active layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub x: usize,
    pub z: usize,
    pub y: usize,
}

/// Floating "+1" over a cleared cell.
#[derive(Debug, Clone, Copy)]
pub struct ScorePopup {
    pub coord: Coord,
    pub age_ms: u32,
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    board: Board,
    events: Receiver<BoardEvent>,
    screen: Screen,
    cursor: Cursor,
    game_over_reason: Option<GameOverReason>,
    /// When the currently staged animations started; completion is reported
    /// once ANIM_MS have elapsed.
    anim_started: Option<Instant>,
    /// Cells of the pair being destroyed, for popups and the fade effect.
    clearing_cells: Vec<Coord>,
    /// TachyonFX fade for the clearing pair (created when the wait starts).
    clear_effect: Option<Effect>,
    clear_effect_process_time: Option<Instant>,
    popups: Vec<ScorePopup>,
    /// Score as received over the event channel (what the HUD shows).
    display_score: u32,
    /// Best score this session.
    best_score: u32,
    menu_state: MenuState,
    quit_selected: QuitOption,
    last_frame: Instant,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let (board, events) = Self::make_board(&config);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let cursor = Cursor {
            x: config.width / 2,
            z: config.width / 2,
            y: 0,
        };
        let menu_state = MenuState {
            current_tab: MenuTab::Difficulty,
            selected_difficulty: args.difficulty,
        };
        let mut app = Self {
            args,
            config,
            theme,
            board,
            events,
            screen,
            cursor,
            game_over_reason: None,
            anim_started: None,
            clearing_cells: Vec::new(),
            clear_effect: None,
            clear_effect_process_time: None,
            popups: Vec::new(),
            display_score: 0,
            best_score: 0,
            menu_state,
            quit_selected: QuitOption::Resume,
            last_frame: Instant::now(),
        };
        if app.screen == Screen::Playing {
            app.board.start();
        }
        Ok(app)
    }

    fn make_board(config: &GameConfig) -> (Board, Receiver<BoardEvent>) {
        let (tx, rx) = channel();
        let board = Board::new(config.width, config.layers, config.types, config.seed, tx);
        (board, rx)
    }

    /// Fresh board with current settings (difficulty may have changed on the
    /// menu), then straight into play.
    fn start_new_game(&mut self) {
        self.config.types = self
            .args
            .types
            .unwrap_or_else(|| self.config.difficulty.types());
        let (board, events) = Self::make_board(&self.config);
        self.board = board;
        self.events = events;
        self.begin_round();
    }

    /// Same board settings, rebuilt grid: the restart phase signal.
    fn restart_game(&mut self) {
        self.board.restart();
        self.begin_round();
    }

    fn begin_round(&mut self) {
        self.board.start();
        self.screen = Screen::Playing;
        self.game_over_reason = None;
        self.anim_started = None;
        self.clearing_cells.clear();
        self.clear_effect = None;
        self.clear_effect_process_time = None;
        self.popups.clear();
        self.display_score = 0;
        self.cursor = Cursor {
            x: self.board.width() / 2,
            z: self.board.depth() / 2,
            y: 0,
        };
    }

    fn move_cursor(&mut self, action: Action) {
        let w = self.board.width();
        let d = self.board.depth();
        let h = self.board.height();
        match action {
            Action::CursorLeft => self.cursor.x = self.cursor.x.saturating_sub(1),
            Action::CursorRight => self.cursor.x = (self.cursor.x + 1).min(w - 1),
            Action::CursorUp => self.cursor.z = self.cursor.z.saturating_sub(1),
            Action::CursorDown => self.cursor.z = (self.cursor.z + 1).min(d - 1),
            Action::LayerUp => self.cursor.y = (self.cursor.y + 1).min(h - 1),
            Action::LayerDown => self.cursor.y = self.cursor.y.saturating_sub(1),
            _ => {}
        }
    }

    /// Pick resolution: the cursor names a cell; clicking an empty cell is
    /// not a click at all.
    fn select_under_cursor(&mut self) {
        let Cursor { x, z, y } = self.cursor;
        if let Some(block) = self.board.get_block(y, z, x) {
            let id = block.id();
            self.board.handle_click(id);
            self.note_staged_animations();
        }
    }

    /// Remember where a destroy pair sits so popups and the fade effect can
    /// anchor to it after the cells empty.
    fn note_staged_animations(&mut self) {
        let destroys: Vec<Coord> = self
            .board
            .pending_animations()
            .iter()
            .filter(|a| a.kind == AnimationKind::Destroy)
            .map(|a| a.coord)
            .collect();
        if !destroys.is_empty() {
            self.clearing_cells = destroys;
        }
    }

    /// Drive staged animations: instant with --no-animation, otherwise hold
    /// each wave for ANIM_MS before reporting completion to the board.
    fn tick_animations(&mut self, now: Instant) {
        if self.config.no_animation {
            while !self.board.pending_animations().is_empty() {
                self.board.animations_done();
            }
            self.anim_started = None;
            self.clear_effect = None;
            self.clear_effect_process_time = None;
            return;
        }
        if self.board.pending_animations().is_empty() {
            self.anim_started = None;
            return;
        }
        match self.anim_started {
            None => self.anim_started = Some(now),
            Some(started) if now.duration_since(started) >= Duration::from_millis(ANIM_MS) => {
                self.board.animations_done();
                self.anim_started = None;
                self.clear_effect = None;
                self.clear_effect_process_time = None;
            }
            Some(_) => {}
        }
    }

    fn drain_board_events(&mut self) {
        while let Ok(ev) = self.events.try_recv() {
            match ev {
                BoardEvent::ScoreChanged(score) => {
                    self.display_score = score;
                    self.best_score = self.best_score.max(score);
                    if let Some(&coord) = self.clearing_cells.first() {
                        self.popups.push(ScorePopup { coord, age_ms: 0 });
                    }
                }
            }
        }
    }

    fn tick_popups(&mut self, delta_ms: u32) {
        self.popups.retain_mut(|p| {
            p.age_ms += delta_ms;
            p.age_ms < POPUP_MS
        });
    }

    /// Once the board is idle, decide whether the round is over: the whole
    /// grid cleared, or no matching pair left anywhere. The board itself
    /// leaves this call to its controller.
    fn check_round_over(&mut self) {
        if self.board.is_resolving() {
            return;
        }
        let reason = if self.board.is_cleared() {
            Some(GameOverReason::BoardCleared)
        } else if !self.board.has_matches() {
            Some(GameOverReason::NoMatchesLeft)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.board.end();
            self.game_over_reason = Some(reason);
            self.screen = Screen::GameOver;
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{
                disable_raw_mode, enable_raw_mode, size, EnterAlternateScreen,
                LeaveAlternateScreen,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        // Clamp the board plan so all layer panels plus sidebar fit.
        let (term_cols, term_rows) = size()?;
        let fit = crate::ui::max_plan_width_for_terminal(term_cols, term_rows, self.config.layers);
        if self.config.width > fit.max(2) {
            self.config.width = fit.max(2);
            let (board, events) = Self::make_board(&self.config);
            self.board = board;
            self.events = events;
            if self.screen == Screen::Playing {
                self.board.start();
            }
            self.cursor = Cursor {
                x: self.board.width() / 2,
                z: self.board.depth() / 2,
                y: 0,
            };
        }

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let delta_ms = now.duration_since(self.last_frame).as_millis().min(250) as u32;
            self.last_frame = now;

            if self.screen == Screen::Playing {
                self.tick_animations(now);
                self.drain_board_events();
                self.tick_popups(delta_ms);
                self.check_round_over();
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.board,
                    &self.theme,
                    self.cursor,
                    self.display_score,
                    self.best_score,
                    &self.popups,
                    &self.menu_state,
                    if self.screen == Screen::QuitMenu {
                        Some(self.quit_selected)
                    } else {
                        None
                    },
                    self.game_over_reason,
                    self.anim_started,
                    &self.clearing_cells,
                    &mut self.clear_effect,
                    &mut self.clear_effect_process_time,
                    now,
                )
            })?;

            // ~60 fps frame budget for effects and popup aging.
            let timeout = Duration::from_millis(16).saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let action = key_to_action(key);
                match self.screen {
                    Screen::Menu => {
                        if self.handle_menu_key(action) {
                            return Ok(());
                        }
                    }
                    Screen::Playing => match action {
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        Action::Restart => self.restart_game(),
                        Action::Select => self.select_under_cursor(),
                        Action::CursorLeft
                        | Action::CursorRight
                        | Action::CursorUp
                        | Action::CursorDown
                        | Action::LayerUp
                        | Action::LayerDown => self.move_cursor(action),
                        Action::None => {}
                    },
                    Screen::QuitMenu => {
                        if self.handle_quit_menu_key(action) {
                            return Ok(());
                        }
                    }
                    Screen::GameOver => match action {
                        Action::Quit => return Ok(()),
                        Action::Restart | Action::Select => self.restart_game(),
                        _ => {}
                    },
                }
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_menu_key(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::CursorLeft if self.menu_state.current_tab == MenuTab::Difficulty => {
                self.menu_state.selected_difficulty = match self.menu_state.selected_difficulty {
                    crate::Difficulty::Easy => crate::Difficulty::Hard,
                    crate::Difficulty::Medium => crate::Difficulty::Easy,
                    crate::Difficulty::Hard => crate::Difficulty::Medium,
                };
            }
            Action::CursorRight if self.menu_state.current_tab == MenuTab::Difficulty => {
                self.menu_state.selected_difficulty = match self.menu_state.selected_difficulty {
                    crate::Difficulty::Easy => crate::Difficulty::Medium,
                    crate::Difficulty::Medium => crate::Difficulty::Hard,
                    crate::Difficulty::Hard => crate::Difficulty::Easy,
                };
            }
            Action::CursorUp | Action::CursorDown => {
                self.menu_state.current_tab = match self.menu_state.current_tab {
                    MenuTab::Difficulty => MenuTab::Start,
                    MenuTab::Start => MenuTab::Difficulty,
                };
            }
            Action::Select => {
                if self.menu_state.current_tab == MenuTab::Start {
                    self.args.difficulty = self.menu_state.selected_difficulty;
                    self.config.difficulty = self.args.difficulty;
                    self.start_new_game();
                } else {
                    self.menu_state.current_tab = MenuTab::Start;
                }
            }
            _ => {}
        }
        false
    }

    /// Returns true when the app should exit.
    fn handle_quit_menu_key(&mut self, action: Action) -> bool {
        match action {
            Action::CursorDown | Action::CursorRight => {
                self.quit_selected = match self.quit_selected {
                    QuitOption::Resume => QuitOption::MainMenu,
                    QuitOption::MainMenu => QuitOption::Exit,
                    QuitOption::Exit => QuitOption::Resume,
                };
            }
            Action::CursorUp | Action::CursorLeft => {
                self.quit_selected = match self.quit_selected {
                    QuitOption::Resume => QuitOption::Exit,
                    QuitOption::MainMenu => QuitOption::Resume,
                    QuitOption::Exit => QuitOption::MainMenu,
                };
            }
            Action::Select => match self.quit_selected {
                QuitOption::Resume => self.screen = Screen::Playing,
                QuitOption::MainMenu => {
                    self.board.restart();
                    self.screen = Screen::Menu;
                }
                QuitOption::Exit => return true,
            },
            Action::Quit => self.screen = Screen::Playing,
            _ => {}
        }
        false
    }
}
