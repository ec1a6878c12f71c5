//! Board core: 3D grid of coloured blocks, selection, match/clear, gravity.
//!
//! The board is presentation-agnostic. It hands staged animations to the
//! caller (`pending_animations`) and only mutates further once the caller
//! reports completion (`animations_done`). Score updates go out over an
//! mpsc channel supplied at construction.

use std::sync::mpsc::Sender;

/// Lattice spacing between block centres (presentation units).
pub const SPACING: f32 = 1.2;

/// Number of colours in the palette; block kinds are `1..=PALETTE_SIZE`.
pub const PALETTE_SIZE: u8 = 10;

/// Stable block identity. Selection equality is identity, not kind.
pub type BlockId = u32;

/// Grid coordinate: `y` = layer (0 = bottom), `z` = row, `x` = column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub y: usize,
    pub z: usize,
    pub x: usize,
}

/// One coloured block. Grid indices are authoritative for where it is;
/// `pos` is the derived lattice position carried for the presentation layer.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    kind: u8,
    highlighted: bool,
    pos: [f32; 3],
}

impl Block {
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Colour/type id, `1..=types`. Immutable after creation.
    #[inline]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    #[inline]
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Centred lattice position (x, y, z).
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        self.pos
    }
}

/// Top-level game mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Playing,
    Over,
}

/// Events the board emits toward the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    ScoreChanged(u32),
}

/// What the presentation layer should play for a staged animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationKind {
    /// Visual destroy effect; the cell is emptied once completion is reported.
    Destroy,
    /// Drop by `distance` lattice units; the grid already holds the block at
    /// its destination.
    Fall { distance: f32 },
}

/// A staged animation. `coord` is where the block currently sits in the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animation {
    pub id: BlockId,
    pub coord: Coord,
    pub kind: AnimationKind,
}

/// In-flight clear/fall sequence; clicks are suppressed while one is active.
#[derive(Debug, Clone, Copy)]
enum Resolution {
    Clearing { first: Coord, second: Coord },
    Falling,
}

pub struct Board {
    width: usize,
    height: usize,
    /// Flat `[y][z][x]` storage; depth equals width.
    cells: Vec<Option<Block>>,
    selected: Option<BlockId>,
    score: u32,
    phase: Phase,
    resolving: Option<Resolution>,
    pending: Vec<Animation>,
    types: u8,
    next_id: BlockId,
    rng: fastrand::Rng,
    events: Sender<BoardEvent>,
}

impl Board {
    /// New fully populated board in `Ready` phase. `width` is the plan size
    /// (depth equals width), `height` the number of layers, `types` the
    /// number of distinct colours drawn from the palette.
    pub fn new(
        width: usize,
        height: usize,
        types: u8,
        seed: Option<u64>,
        events: Sender<BoardEvent>,
    ) -> Self {
        let rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let mut board = Self {
            width,
            height,
            cells: Vec::new(),
            selected: None,
            score: 0,
            phase: Phase::Ready,
            resolving: None,
            pending: Vec::new(),
            types: types.clamp(1, PALETTE_SIZE),
            next_id: 0,
            rng,
            events,
        };
        board.populate();
        board
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows per layer; always equals `width`.
    #[inline]
    pub fn depth(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[inline]
    pub fn selected(&self) -> Option<BlockId> {
        self.selected
    }

    #[inline]
    pub fn types(&self) -> u8 {
        self.types
    }

    /// True while a clear/fall sequence is waiting on animations.
    #[inline]
    pub fn is_resolving(&self) -> bool {
        self.resolving.is_some()
    }

    /// Animations staged for the current resolution step, if any.
    #[inline]
    pub fn pending_animations(&self) -> &[Animation] {
        &self.pending
    }

    /// Bounds-checked cell lookup; `None` when any axis is out of range or
    /// the cell is empty.
    pub fn get_block(&self, y: usize, z: usize, x: usize) -> Option<&Block> {
        if y >= self.height || z >= self.width || x >= self.width {
            return None;
        }
        self.cells[self.index(Coord { y, z, x })].as_ref()
    }

    /// Start signal: Ready → Playing. No-op in any other phase.
    pub fn start(&mut self) {
        if self.phase == Phase::Ready {
            self.phase = Phase::Playing;
        }
    }

    /// End signal: any → Over. Drops the current selection and its highlight.
    pub fn end(&mut self) {
        self.phase = Phase::Over;
        if let Some(id) = self.selected.take() {
            if let Some(coord) = self.position_of(id) {
                self.set_highlight(coord, false);
            }
        }
    }

    /// Restart signal: discard all blocks, reset score and selection, refill
    /// the grid with freshly randomised types, phase back to Ready.
    pub fn restart(&mut self) {
        self.phase = Phase::Ready;
        self.score = 0;
        self.selected = None;
        self.resolving = None;
        self.pending.clear();
        self.populate();
    }

    /// Click on a block, delivered by the pick layer.
    ///
    /// Exactly four branches: first selection, same-block toggle, same-kind
    /// match (clear both), different-kind swap. Ignored when the phase is not
    /// `Playing`, while a resolution is in flight, or when `id` is not
    /// present in the grid.
    pub fn handle_click(&mut self, id: BlockId) {
        if self.phase != Phase::Playing || self.resolving.is_some() {
            return;
        }
        let coord = match self.position_of(id) {
            Some(c) => c,
            None => return,
        };
        match self.selected {
            None => {
                self.set_highlight(coord, true);
                self.selected = Some(id);
            }
            Some(sel) if sel == id => {
                // Same block: toggle the selection off.
                self.set_highlight(coord, false);
                self.selected = None;
            }
            Some(sel) => {
                let sel_coord = match self.position_of(sel) {
                    Some(c) => c,
                    None => {
                        // Selection no longer in the grid; treat as fresh.
                        self.selected = None;
                        self.set_highlight(coord, true);
                        self.selected = Some(id);
                        return;
                    }
                };
                let sel_kind = self.kind_at(sel_coord);
                if sel_kind == self.kind_at(coord) {
                    self.set_highlight(sel_coord, false);
                    self.set_highlight(coord, false);
                    self.selected = None;
                    self.begin_clear(sel, sel_coord, id, coord);
                } else {
                    self.set_highlight(sel_coord, false);
                    self.set_highlight(coord, true);
                    self.selected = Some(id);
                }
            }
        }
    }

    /// Completion notification from the presentation layer: all animations in
    /// `pending_animations` have finished. Advances the resolution sequence
    /// one step (apply clear + first gravity pass, or the next gravity pass).
    pub fn animations_done(&mut self) {
        self.pending.clear();
        match self.resolving.take() {
            None => {}
            Some(Resolution::Clearing { first, second }) => {
                let i = self.index(first);
                self.cells[i] = None;
                let j = self.index(second);
                self.cells[j] = None;
                self.score += 1;
                let _ = self.events.send(BoardEvent::ScoreChanged(self.score));
                self.start_fall_pass();
            }
            Some(Resolution::Falling) => self.start_fall_pass(),
        }
    }

    /// True when every cell is empty.
    pub fn is_cleared(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// True when at least one kind occurs twice, i.e. a clear is still
    /// possible somewhere.
    pub fn has_matches(&self) -> bool {
        let mut seen = [false; PALETTE_SIZE as usize + 1];
        for block in self.cells.iter().flatten() {
            let k = block.kind as usize;
            if seen[k] {
                return true;
            }
            seen[k] = true;
        }
        false
    }

    /// Blocks remaining on the board.
    pub fn blocks_left(&self) -> usize {
        self.cells.iter().flatten().count()
    }

    #[inline]
    fn index(&self, c: Coord) -> usize {
        (c.y * self.width + c.z) * self.width + c.x
    }

    fn kind_at(&self, c: Coord) -> u8 {
        let i = self.index(c);
        self.cells[i].as_ref().map_or(0, |b| b.kind)
    }

    fn set_highlight(&mut self, c: Coord, on: bool) {
        let i = self.index(c);
        if let Some(block) = self.cells[i].as_mut() {
            block.highlighted = on;
        }
    }

    /// Where a block currently sits. Linear scan; the grid is the single
    /// source of truth, and at this scale (≤ a few hundred cells) an index
    /// is not worth the extra invariant.
    fn position_of(&self, id: BlockId) -> Option<Coord> {
        for y in 0..self.height {
            for z in 0..self.width {
                for x in 0..self.width {
                    let c = Coord { y, z, x };
                    if let Some(block) = &self.cells[self.index(c)] {
                        if block.id == id {
                            return Some(c);
                        }
                    }
                }
            }
        }
        None
    }

    /// Centred lattice position for a grid coordinate.
    fn lattice_position(&self, c: Coord) -> [f32; 3] {
        let off = |n: usize| (n as f32 - 1.0) * SPACING / 2.0;
        [
            c.x as f32 * SPACING - off(self.width),
            c.y as f32 * SPACING - off(self.height),
            c.z as f32 * SPACING - off(self.width),
        ]
    }

    fn populate(&mut self) {
        let n = self.height * self.width * self.width;
        self.cells.clear();
        self.cells.resize(n, None);
        for y in 0..self.height {
            for z in 0..self.width {
                for x in 0..self.width {
                    let c = Coord { y, z, x };
                    let kind = self.rng.u8(1..=self.types);
                    let id = self.next_id;
                    self.next_id += 1;
                    let pos = self.lattice_position(c);
                    let i = self.index(c);
                    self.cells[i] = Some(Block {
                        id,
                        kind,
                        highlighted: false,
                        pos,
                    });
                }
            }
        }
    }

    fn begin_clear(&mut self, a: BlockId, a_coord: Coord, b: BlockId, b_coord: Coord) {
        self.resolving = Some(Resolution::Clearing {
            first: a_coord,
            second: b_coord,
        });
        self.pending = vec![
            Animation {
                id: a,
                coord: a_coord,
                kind: AnimationKind::Destroy,
            },
            Animation {
                id: b,
                coord: b_coord,
                kind: AnimationKind::Destroy,
            },
        ];
    }

    /// One gravity pass. Snapshots the cells that are empty now, lowest layer
    /// first, and pulls the nearest occupied cell above each one down into
    /// it. Empties created by this pass are left for the next pass, so
    /// stacked gaps settle as discrete successive drops. Sets up the next
    /// wait when anything moved.
    fn start_fall_pass(&mut self) {
        let mut empties: Vec<Coord> = Vec::new();
        for y in 0..self.height {
            for z in 0..self.width {
                for x in 0..self.width {
                    let c = Coord { y, z, x };
                    if self.cells[self.index(c)].is_none() {
                        empties.push(c);
                    }
                }
            }
        }
        // Scan order above is already ascending in y.

        let mut moved = false;
        for gap in empties {
            for y in gap.y + 1..self.height {
                let src = Coord { y, ..gap };
                let src_i = self.index(src);
                if let Some(mut block) = self.cells[src_i].take() {
                    let distance = (y - gap.y) as f32 * SPACING;
                    block.pos[1] -= distance;
                    let id = block.id;
                    let dst_i = self.index(gap);
                    self.cells[dst_i] = Some(block);
                    self.pending.push(Animation {
                        id,
                        coord: gap,
                        kind: AnimationKind::Fall { distance },
                    });
                    moved = true;
                    break;
                }
            }
        }

        if moved {
            self.resolving = Some(Resolution::Falling);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{channel, Receiver};

    fn board(width: usize, height: usize, types: u8) -> (Board, Receiver<BoardEvent>) {
        let (tx, rx) = channel();
        (Board::new(width, height, types, Some(7), tx), rx)
    }

    /// Overwrite every block kind from `layers[y][z][x]`.
    fn set_kinds(b: &mut Board, layers: &[&[&[u8]]]) {
        for (y, layer) in layers.iter().enumerate() {
            for (z, row) in layer.iter().enumerate() {
                for (x, &kind) in row.iter().enumerate() {
                    let i = b.index(Coord { y, z, x });
                    b.cells[i].as_mut().unwrap().kind = kind;
                }
            }
        }
    }

    fn id_at(b: &Board, y: usize, z: usize, x: usize) -> BlockId {
        b.get_block(y, z, x).unwrap().id()
    }

    fn resolve(b: &mut Board) {
        while b.is_resolving() {
            b.animations_done();
        }
    }

    /// No empty cell may have an occupied cell above it in the same column.
    fn assert_settled(b: &Board) {
        for z in 0..b.depth() {
            for x in 0..b.width() {
                let mut seen_empty = false;
                for y in 0..b.height() {
                    match b.get_block(y, z, x) {
                        None => seen_empty = true,
                        Some(_) => assert!(!seen_empty, "block floats above gap at z={z} x={x}"),
                    }
                }
            }
        }
    }

    #[test]
    fn construction_fills_every_cell_within_palette() {
        let (b, _rx) = board(4, 3, 6);
        for y in 0..3 {
            for z in 0..4 {
                for x in 0..4 {
                    let block = b.get_block(y, z, x).expect("cell populated");
                    assert!((1..=6).contains(&block.kind()));
                    assert!(!block.is_highlighted());
                }
            }
        }
        assert_eq!(b.phase(), Phase::Ready);
        assert_eq!(b.score(), 0);
    }

    #[test]
    fn get_block_out_of_bounds_per_axis() {
        let (b, _rx) = board(4, 3, 6);
        assert!(b.get_block(3, 0, 0).is_none());
        assert!(b.get_block(0, 4, 0).is_none());
        assert!(b.get_block(0, 0, 4).is_none());
        assert!(b.get_block(0, 0, 0).is_some());
    }

    #[test]
    fn lattice_is_centred() {
        let (b, _rx) = board(3, 3, 6);
        let mut sum = [0.0f32; 3];
        for y in 0..3 {
            for z in 0..3 {
                for x in 0..3 {
                    let p = b.get_block(y, z, x).unwrap().position();
                    for (s, v) in sum.iter_mut().zip(p) {
                        *s += v;
                    }
                }
            }
        }
        for s in sum {
            assert!(s.abs() < 1e-4);
        }
    }

    #[test]
    fn click_ignored_outside_playing_phase() {
        let (mut b, _rx) = board(3, 2, 6);
        let id = id_at(&b, 0, 0, 0);
        b.handle_click(id);
        assert_eq!(b.selected(), None);
        b.start();
        b.end();
        b.handle_click(id);
        assert_eq!(b.selected(), None);
        assert_eq!(b.score(), 0);
    }

    #[test]
    fn click_unknown_id_is_noop() {
        let (mut b, _rx) = board(3, 2, 6);
        b.start();
        b.handle_click(9_999_999);
        assert_eq!(b.selected(), None);
    }

    #[test]
    fn same_block_click_toggles_selection() {
        let (mut b, _rx) = board(3, 2, 6);
        b.start();
        let id = id_at(&b, 0, 0, 0);
        b.handle_click(id);
        assert_eq!(b.selected(), Some(id));
        assert!(b.get_block(0, 0, 0).unwrap().is_highlighted());
        b.handle_click(id);
        assert_eq!(b.selected(), None);
        assert!(!b.get_block(0, 0, 0).unwrap().is_highlighted());
        assert_eq!(b.score(), 0);
    }

    #[test]
    fn different_kind_click_swaps_selection() {
        let (mut b, _rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        let first = id_at(&b, 0, 0, 0);
        let second = id_at(&b, 0, 0, 1);
        b.handle_click(first);
        b.handle_click(second);
        assert_eq!(b.selected(), Some(second));
        assert!(!b.get_block(0, 0, 0).unwrap().is_highlighted());
        assert!(b.get_block(0, 0, 1).unwrap().is_highlighted());
        // Grid untouched, no score.
        assert_eq!(b.score(), 0);
        assert_eq!(b.blocks_left(), 8);
    }

    #[test]
    fn matching_pair_clears_scores_and_settles() {
        let (mut b, mut rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        // The two kind-1 blocks sit at layer 0, column x=0, rows z=0 and z=1.
        let a = id_at(&b, 0, 0, 0);
        let c = id_at(&b, 0, 1, 0);
        b.handle_click(a);
        b.handle_click(c);
        assert!(b.is_resolving());
        assert_eq!(b.selected(), None);
        // Two destroy animations staged; cells still occupied until done.
        assert_eq!(b.pending_animations().len(), 2);
        assert!(b.get_block(0, 0, 0).is_some());

        resolve(&mut b);
        assert_eq!(b.score(), 1);
        assert_eq!(next_score(&mut rx), Some(1));
        // Kind-3 blocks fell from layer 1 into the cleared layer-0 cells.
        assert_eq!(b.get_block(0, 0, 0).unwrap().kind(), 3);
        assert_eq!(b.get_block(0, 1, 0).unwrap().kind(), 3);
        assert!(b.get_block(1, 0, 0).is_none());
        assert!(b.get_block(1, 1, 0).is_none());
        assert_settled(&b);
    }

    fn next_score(rx: &mut Receiver<BoardEvent>) -> Option<u32> {
        rx.try_recv().ok().map(|BoardEvent::ScoreChanged(s)| s)
    }

    #[test]
    fn mismatched_clicks_never_clear() {
        let (mut b, _rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        // kind 1 vs kind 2, then kind 1 vs kind 3 (layer above).
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 0, 0, 1));
        assert!(!b.is_resolving());
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 1, 0, 0));
        assert!(!b.is_resolving());
        assert_eq!(b.score(), 0);
        assert_eq!(b.blocks_left(), 8);
    }

    #[test]
    fn clicks_suppressed_while_resolving() {
        let (mut b, _rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 0, 1, 0));
        assert!(b.is_resolving());
        // A rapid follow-up click must not select anything mid-resolution.
        let other = id_at(&b, 0, 0, 1);
        b.handle_click(other);
        assert_eq!(b.selected(), None);
        resolve(&mut b);
        assert_eq!(b.selected(), None);
    }

    #[test]
    fn gaps_settle_as_discrete_successive_passes() {
        // Column bottom-up: 1, 2, 1, 3. Clearing both 1s leaves gaps at
        // layers 0 and 2 with blocks between/above them.
        let (mut b, _rx) = board(1, 4, 4);
        set_kinds(&mut b, &[&[&[1]], &[&[2]], &[&[1]], &[&[3]]]);
        b.start();
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 2, 0, 0));
        // Clear step, then the first gravity pass: each snapshot gap pulls
        // only the nearest block above it down one step.
        b.animations_done();
        assert!(b.is_resolving());
        assert_eq!(b.pending_animations().len(), 2);
        assert_eq!(b.get_block(0, 0, 0).unwrap().kind(), 2);
        assert_eq!(b.get_block(2, 0, 0).unwrap().kind(), 3);
        // Second pass: the kind-3 block drops again into the gap its own
        // move left behind. Third pass moves nothing and terminates.
        b.animations_done();
        assert_eq!(b.pending_animations().len(), 1);
        b.animations_done();
        assert!(!b.is_resolving());
        assert_eq!(b.get_block(0, 0, 0).unwrap().kind(), 2);
        assert_eq!(b.get_block(1, 0, 0).unwrap().kind(), 3);
        assert_settled(&b);
    }

    #[test]
    fn gravity_idempotent_once_settled() {
        let (mut b, _rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 0, 1, 0));
        resolve(&mut b);
        assert_settled(&b);
        // An extra pass on a settled board moves nothing.
        b.start_fall_pass();
        assert!(b.pending_animations().is_empty());
        assert!(!b.is_resolving());
    }

    #[test]
    fn fall_distance_and_position_track_layers() {
        let (mut b, _rx) = board(1, 3, 4);
        set_kinds(&mut b, &[&[&[1]], &[&[1]], &[&[2]]]);
        b.start();
        let top = id_at(&b, 2, 0, 0);
        let top_y = b.get_block(2, 0, 0).unwrap().position()[1];
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 1, 0, 0));
        b.animations_done();
        let anim = b.pending_animations()[0];
        assert_eq!(anim.id, top);
        assert_eq!(anim.coord, Coord { y: 0, z: 0, x: 0 });
        assert_eq!(anim.kind, AnimationKind::Fall { distance: 2.0 * SPACING });
        resolve(&mut b);
        let new_y = b.get_block(0, 0, 0).unwrap().position()[1];
        assert!((top_y - new_y - 2.0 * SPACING).abs() < 1e-5);
    }

    #[test]
    fn end_clears_selection_and_highlight() {
        let (mut b, _rx) = board(3, 2, 6);
        b.start();
        let id = id_at(&b, 0, 1, 1);
        b.handle_click(id);
        assert!(b.get_block(0, 1, 1).unwrap().is_highlighted());
        b.end();
        assert_eq!(b.phase(), Phase::Over);
        assert_eq!(b.selected(), None);
        assert!(!b.get_block(0, 1, 1).unwrap().is_highlighted());
    }

    #[test]
    fn restart_resets_everything() {
        let (mut b, _rx) = board(2, 2, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[1, 2]], &[&[3, 4], &[3, 4]]]);
        b.start();
        b.handle_click(id_at(&b, 0, 0, 0));
        b.handle_click(id_at(&b, 0, 1, 0));
        resolve(&mut b);
        assert_eq!(b.score(), 1);
        b.restart();
        assert_eq!(b.phase(), Phase::Ready);
        assert_eq!(b.score(), 0);
        assert_eq!(b.selected(), None);
        assert_eq!(b.blocks_left(), 8);
        for y in 0..2 {
            for z in 0..2 {
                for x in 0..2 {
                    assert!((1..=4).contains(&b.get_block(y, z, x).unwrap().kind()));
                }
            }
        }
    }

    #[test]
    fn match_queries() {
        let (mut b, _rx) = board(2, 1, 4);
        set_kinds(&mut b, &[&[&[1, 2], &[3, 1]]]);
        assert!(b.has_matches());
        assert!(!b.is_cleared());
        set_kinds(&mut b, &[&[&[1, 2], &[3, 4]]]);
        assert!(!b.has_matches());
    }
}
