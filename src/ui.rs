//! Layout and drawing: menu, layer panels, sidebar, quit and game-over popups.

use crate::app::{Cursor, GameOverReason, MenuState, MenuTab, QuitOption, ScorePopup, Screen};
use crate::board::{AnimationKind, Board, Coord};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each grid cell is two terminal columns wide.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 26;
/// Duration of the pair-clear fade (TachyonFX), matching the animation hold.
const CLEAR_FADE_MS: u32 = 300;

/// Outer size of one layer panel (border included).
fn panel_size(board: &Board) -> (u16, u16) {
    (
        board.width() as u16 * CELL_WIDTH + 2,
        board.depth() as u16 + 2,
    )
}

/// Largest plan width whose layer panels plus sidebar fit the terminal.
pub fn max_plan_width_for_terminal(term_cols: u16, term_rows: u16, layers: usize) -> usize {
    let layers = layers.max(1) as u16;
    let boards = term_cols
        .saturating_sub(SIDEBAR_WIDTH + 1)
        .saturating_sub(layers - 1);
    let per_panel = boards / layers;
    let from_cols = per_panel.saturating_sub(2) / CELL_WIDTH;
    let from_rows = term_rows.saturating_sub(4);
    from_cols.min(from_rows) as usize
}

/// Panel rects (one per layer, bottom layer leftmost) and the sidebar rect,
/// centred in `area`.
fn game_rects(area: Rect, board: &Board) -> (Vec<Rect>, Rect) {
    let (pw, ph) = panel_size(board);
    let layers = board.height() as u16;
    let boards_w = layers * pw + layers.saturating_sub(1);
    let total_w = boards_w + 1 + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    // Clip to the frame so a shrunken terminal never indexes past the buffer.
    let panels: Vec<Rect> = (0..layers)
        .map(|i| {
            Rect {
                x: x + i * (pw + 1),
                y,
                width: pw.min(area.width),
                height: ph.min(area.height),
            }
            .intersection(area)
        })
        .collect();
    let sidebar = Rect {
        x: (x + boards_w + 1).min(area.x + area.width.saturating_sub(SIDEBAR_WIDTH)),
        y,
        width: SIDEBAR_WIDTH.min(area.width),
        height: ph.min(area.height),
    };
    (panels, sidebar.intersection(area))
}

/// Buffer position of a grid cell inside its layer panel.
fn cell_buffer_pos(panel: Rect, z: usize, x: usize) -> (u16, u16) {
    (
        panel.x + 1 + x as u16 * CELL_WIDTH,
        panel.y + 1 + z as u16,
    )
}

/// Draw current screen (menu, game, quit menu, game over).
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    board: &Board,
    theme: &Theme,
    cursor: Cursor,
    display_score: u32,
    best_score: u32,
    popups: &[ScorePopup],
    menu_state: &MenuState,
    quit_selected: Option<QuitOption>,
    game_over_reason: Option<GameOverReason>,
    anim_started: Option<Instant>,
    clearing_cells: &[Coord],
    clear_effect: &mut Option<Effect>,
    clear_effect_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    match screen {
        Screen::Menu => draw_menu(frame, theme, menu_state, area),
        Screen::Playing => {
            draw_game(
                frame,
                board,
                theme,
                cursor,
                display_score,
                best_score,
                popups,
                anim_started,
                area,
            );
            let destroying = anim_started.is_some()
                && board
                    .pending_animations()
                    .iter()
                    .any(|a| a.kind == AnimationKind::Destroy);
            if destroying && !clearing_cells.is_empty() {
                apply_clear_effect(
                    frame,
                    board,
                    theme,
                    area,
                    clearing_cells,
                    clear_effect,
                    clear_effect_process_time,
                    now,
                );
            }
        }
        Screen::QuitMenu => {
            draw_game(
                frame,
                board,
                theme,
                cursor,
                display_score,
                best_score,
                popups,
                anim_started,
                area,
            );
            if let Some(opt) = quit_selected {
                draw_quit_menu(frame, theme, opt);
            }
        }
        Screen::GameOver => {
            draw_game_over(frame, theme, display_score, best_score, game_over_reason, area);
        }
    }
}

fn draw_menu(frame: &mut Frame, theme: &Theme, menu_state: &MenuState, area: Rect) {
    let popup_w = 46u16;
    let popup_h = 18u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(" Cube ", Style::default().fg(theme.cubes[0]).bold()),
        Span::styled("match ", Style::default().fg(theme.main_fg).bold()),
    ]);

    let highlight_style = Style::default().fg(Color::Black).bg(theme.title).bold();
    let selected_style = Style::default().fg(theme.title).bold();
    let normal_style = Style::default().fg(theme.main_fg);

    let diff_span = |d: crate::Difficulty, label: &'static str| {
        let current = menu_state.current_tab == MenuTab::Difficulty
            && menu_state.selected_difficulty == d;
        let style = if current {
            highlight_style
        } else if menu_state.selected_difficulty == d {
            selected_style
        } else {
            normal_style
        };
        Span::styled(label, style)
    };

    let start_btn = if menu_state.current_tab == MenuTab::Start {
        Span::styled(" [ START ] ", highlight_style)
    } else {
        Span::styled(" [ START ] ", normal_style)
    };

    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(Span::styled(
            " match pairs ∙ clear the cube ",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " ─ COLOURS ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(vec![
            diff_span(crate::Difficulty::Easy, " EASY ∙ 4 "),
            Span::from("  "),
            diff_span(crate::Difficulty::Medium, " MEDIUM ∙ 7 "),
            Span::from("  "),
            diff_span(crate::Difficulty::Hard, " HARD ∙ 10 "),
        ]),
        Line::from(""),
        Line::from(""),
        Line::from(start_btn),
        Line::from(""),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↕ ", Style::default().fg(theme.title)),
            Span::from("NAVIGATE   "),
            Span::styled(" ↔ ", Style::default().fg(theme.title)),
            Span::from("CHANGE   "),
            Span::styled(" ENTER ", Style::default().fg(theme.title)),
            Span::from("GO"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(Color::Rgb(255, 80, 80)),
        )),
    ];

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw the board as side-by-side top-down layer slices plus the sidebar.
fn draw_game(
    frame: &mut Frame,
    board: &Board,
    theme: &Theme,
    cursor: Cursor,
    display_score: u32,
    best_score: u32,
    popups: &[ScorePopup],
    anim_started: Option<Instant>,
    area: Rect,
) {
    let (panels, sidebar) = game_rects(area, board);

    // Cells whose block is mid-fall this wave get a drop marker.
    let falling: HashSet<(usize, usize, usize)> = if anim_started.is_some() {
        board
            .pending_animations()
            .iter()
            .filter(|a| matches!(a.kind, AnimationKind::Fall { .. }))
            .map(|a| (a.coord.y, a.coord.z, a.coord.x))
            .collect()
    } else {
        HashSet::new()
    };
    let destroying: HashSet<(usize, usize, usize)> = if anim_started.is_some() {
        board
            .pending_animations()
            .iter()
            .filter(|a| a.kind == AnimationKind::Destroy)
            .map(|a| (a.coord.y, a.coord.z, a.coord.x))
            .collect()
    } else {
        HashSet::new()
    };

    for (y, panel) in panels.iter().enumerate() {
        let active = y == cursor.y;
        let label = if y == 0 {
            format!(" L{} ∙ bottom ", y + 1)
        } else if y == board.height() - 1 {
            format!(" L{} ∙ top ", y + 1)
        } else {
            format!(" L{} ", y + 1)
        };
        let border_fg = if active { theme.title } else { theme.div_line };
        let title_fg = if active { theme.title } else { theme.inactive_fg };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_fg).bg(theme.bg))
            .title(Span::styled(label, Style::default().fg(title_fg)));
        block.render(*panel, frame.buffer_mut());

        let buf = frame.buffer_mut();
        for z in 0..board.depth() {
            for x in 0..board.width() {
                let (bx, by) = cell_buffer_pos(*panel, z, x);
                if bx + 1 >= panel.x + panel.width
                    || by + 1 >= panel.y + panel.height.max(1)
                {
                    continue;
                }
                let under_cursor = active && cursor.z == z && cursor.x == x;
                let (ch, mut style) = match board.get_block(y, z, x) {
                    Some(b) => {
                        let color = theme.cube_color(b.kind());
                        if destroying.contains(&(y, z, x)) {
                            ("▒", Style::default().fg(Color::White).bg(theme.bg))
                        } else if b.is_highlighted() {
                            ("▓", Style::default().fg(color).bg(Color::White))
                        } else if falling.contains(&(y, z, x)) {
                            ("▼", Style::default().fg(color).bg(theme.bg))
                        } else {
                            ("█", Style::default().fg(color).bg(theme.bg))
                        }
                    }
                    None => ("·", Style::default().fg(theme.inactive_fg).bg(theme.bg)),
                };
                if under_cursor {
                    style = style.bg(theme.title);
                }
                buf[(bx, by)].set_symbol(ch);
                buf[(bx, by)].set_style(style);
                buf[(bx + 1, by)].set_symbol(ch);
                buf[(bx + 1, by)].set_style(style);
            }
        }
    }

    // Floating "+1" popups over the cleared cells.
    for popup in popups {
        let Some(panel) = panels.get(popup.coord.y) else {
            continue;
        };
        let (bx, by) = cell_buffer_pos(*panel, popup.coord.z, popup.coord.x);
        let lift = (popup.age_ms / 400).min(2) as u16;
        let py = by.saturating_sub(lift).max(panel.y + 1);
        if bx + 1 < panel.x + panel.width {
            let style = Style::default().fg(theme.title).bg(theme.bg).bold();
            frame.buffer_mut().set_string(bx, py, "+1", style);
        }
    }

    draw_sidebar(frame, board, theme, cursor, display_score, best_score, sidebar);
}

fn draw_sidebar(
    frame: &mut Frame,
    board: &Board,
    theme: &Theme,
    cursor: Cursor,
    display_score: u32,
    best_score: u32,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Cubematch ", title_style));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(display_score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best: ", title_style),
            Span::styled(best_score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Blocks: ", title_style),
            Span::styled(board.blocks_left().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Layer: ", title_style),
            Span::styled(format!("{}/{}", cursor.y + 1, board.height()), fg_style),
        ]),
        Line::from(""),
        Line::from(Span::styled("Colours", title_style)),
    ];
    // Palette strip: one swatch per kind in play.
    let mut strip = Vec::new();
    for kind in 1..=board.types() {
        let c = theme.cube_color(kind);
        strip.push(Span::styled("██", Style::default().fg(c)));
    }
    lines.push(Line::from(strip));
    lines.extend([
        Line::from(""),
        Line::from(Span::styled("arrows  move", dim_style)),
        Line::from(Span::styled("pgup/dn layer", dim_style)),
        Line::from(Span::styled("enter   select", dim_style)),
        Line::from(Span::styled("r       restart", dim_style)),
        Line::from(Span::styled("q       quit", dim_style)),
    ]);
    Paragraph::new(ratatui::text::Text::from(lines)).render(inner, frame.buffer_mut());
}

/// Create or update the pair-clear fade and process it (TachyonFX: fade the
/// two clearing cells to the background over the animation hold).
fn apply_clear_effect(
    frame: &mut Frame,
    board: &Board,
    theme: &Theme,
    area: Rect,
    clearing_cells: &[Coord],
    clear_effect: &mut Option<Effect>,
    clear_effect_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let (panels, _) = game_rects(area, board);
    let bounds = panels
        .iter()
        .copied()
        .reduce(|a, b| a.union(b))
        .unwrap_or(area);

    let delta = clear_effect_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *clear_effect_process_time = Some(now);

    if clear_effect.is_none() {
        let mut positions: HashSet<(u16, u16)> = HashSet::new();
        for c in clearing_cells {
            if let Some(panel) = panels.get(c.y) {
                let (bx, by) = cell_buffer_pos(*panel, c.z, c.x);
                positions.insert((bx, by));
                positions.insert((bx + 1, by));
            }
        }
        let filter = CellFilter::PositionFn(ref_count(move |pos: ratatui::layout::Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(bounds);
        *clear_effect = Some(effect);
    }

    if let Some(effect) = clear_effect {
        frame.render_effect(effect, bounds, tfx_delta);
    }
}

fn draw_game_over(
    frame: &mut Frame,
    theme: &Theme,
    display_score: u32,
    best_score: u32,
    reason: Option<GameOverReason>,
    area: Rect,
) {
    let popup_w = 34u16;
    let popup_h = 11u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let (title, title_bg) = match reason {
        Some(GameOverReason::BoardCleared) => (" Board cleared! ", Color::Green),
        _ => (" No matches left ", Color::Red),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::White).bg(title_bg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {} ", display_score),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Best: {} ", best_score),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " R — Restart    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Cubematch ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24;
    let qh = 8;
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw,
        height: qh,
    }
    .intersection(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use std::sync::mpsc::channel;

    fn board() -> Board {
        let (tx, _rx) = channel();
        Board::new(4, 3, 6, Some(7), tx)
    }

    #[test]
    fn layer_panels_are_clipped_to_the_frame() {
        let b = board();
        // Too narrow for three panels plus the sidebar.
        let area = Rect::new(0, 0, 20, 6);
        let (panels, sidebar) = game_rects(area, &b);
        assert_eq!(panels.len(), 3);
        for p in &panels {
            assert_eq!(p.intersection(area), *p, "panel {p:?} leaks past the frame");
        }
        assert_eq!(sidebar.intersection(area), sidebar);
    }

    #[test]
    fn quit_menu_draws_on_a_tiny_terminal() {
        let backend = TestBackend::new(10, 4);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::default();
        terminal
            .draw(|f| draw_quit_menu(f, &theme, QuitOption::MainMenu))
            .unwrap();
    }

    #[test]
    fn plan_width_fit_shrinks_with_layers_and_bottoms_at_zero() {
        let one = max_plan_width_for_terminal(120, 30, 1);
        let three = max_plan_width_for_terminal(120, 30, 3);
        assert!(three < one);
        assert_eq!(max_plan_width_for_terminal(10, 4, 3), 0);
    }
}
