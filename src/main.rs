//! Cubematch — 3D pair-matching block puzzle in the terminal.

mod app;
mod board;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect game behaviour (board size, palette
/// size, seed, animation).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub layers: usize,
    pub types: u8,
    pub seed: Option<u64>,
    pub no_animation: bool,
    pub difficulty: Difficulty,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        width: args.width.max(2) as usize,
        layers: args.layers.max(1) as usize,
        types: args.types.unwrap_or_else(|| args.difficulty.types()),
        seed: args.seed,
        no_animation: args.no_animation,
        difficulty: args.difficulty,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// 3D pair-matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "cubematch",
    version,
    about = "Match pairs of coloured blocks in a 3D grid. Cleared cells are refilled by blocks falling from the layers above.",
    long_about = "Cubematch is a terminal take on a 3D tile-matching puzzle.\n\n\
        The board is a cubic grid of coloured blocks shown as top-down layer slices. \
        Select two blocks of the same colour to clear them; blocks above the cleared \
        cells drop down layer by layer, and every pair is worth one point. Clear the \
        whole board, or play until no matching pair remains.\n\n\
        CONTROLS (normal):\n  Arrows      Move cursor   PgUp/PgDn  Change layer   Enter/Space  Select\n  R           Restart       Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/j/k/l     Move cursor   K/J        Change layer   x or Space   Select\n\n\
        Use --theme to load a btop-style theme file (keys cube1..cube10, bg, main_fg, ...)."
)]
pub struct Args {
    /// Difficulty: easy (4 colours), medium (7), hard (10). Fewer colours
    /// means more matches on the board.
    #[arg(short, long, default_value = "medium")]
    pub difficulty: Difficulty,

    /// Board plan size in columns (the board is width × width per layer).
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: u16,

    /// Number of layers (board height).
    #[arg(long, default_value = "3", value_name = "N")]
    pub layers: u16,

    /// Override the number of block colours (1..=10); defaults to the
    /// difficulty's palette size.
    #[arg(long, value_name = "N")]
    pub types: Option<u8>,

    /// Seed for the block layout (same seed, same board).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]="value").
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable clear/fall animations (instant resolution).
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start playing immediately.
    #[arg(long)]
    pub no_menu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Palette size for this difficulty.
    pub fn types(self) -> u8 {
        match self {
            Self::Easy => 4,
            Self::Medium => 7,
            Self::Hard => 10,
        }
    }
}
