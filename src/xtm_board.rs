// Mine field model and reveal engine
// Tiles are stored row-major and addressed as (row, col)

use rand::Rng;

use crate::xtm_error::GameError;

/// A single tile of the mine field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pub mine: bool,     // Set once when mines are placed
    pub flagged: bool,  // Player mark, never set on a revealed tile
    pub revealed: bool, // Exposed by a click or a cascade
    pub adj: u8,        // Adjacent mine count (0-8), unused on mines
}

/// What the player is allowed to see of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileView {
    Hidden,
    Flagged,
    Revealed(u8),
    RevealedMine,
}

/// Fixed-size grid of tiles
#[derive(Debug, Clone)]
pub struct Board {
    rows: usize,
    cols: usize,
    mines: usize,
    tiles: Vec<Tile>,
}

/// In-bounds 8-neighborhood of (row, col), clipped at the edges
fn neighbors(
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let row_range = row.saturating_sub(1)..=(row + 1).min(rows - 1);
    row_range
        .flat_map(move |r| (col.saturating_sub(1)..=(col + 1).min(cols - 1)).map(move |c| (r, c)))
        .filter(move |&pos| pos != (row, col))
}

impl Board {
    /// Create a board of untouched tiles with no mines
    pub fn new(rows: usize, cols: usize) -> Self {
        Board {
            rows,
            cols,
            mines: 0,
            tiles: vec![Tile::default(); rows * cols],
        }
    }

    /// Return every tile to its initial state
    pub fn clear(&mut self) {
        self.mines = 0;
        self.tiles.fill(Tile::default());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn mine_count(&self) -> usize {
        self.mines
    }

    /// Convert (row, col) to a flat tile index
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols, "tile ({row}, {col}) out of bounds");
        row * self.cols + col
    }

    pub fn tile(&self, row: usize, col: usize) -> &Tile {
        &self.tiles[self.index(row, col)]
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Scatter `count` mines over distinct random tiles
    ///
    /// Uses rejection sampling, so the mine count must leave at least one free
    /// tile or the draw loop could never finish.
    pub fn place_mines<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Result<(), GameError> {
        let tiles = self.rows * self.cols;
        if tiles == 0 {
            return Err(GameError::EmptyBoard);
        }
        if count >= tiles {
            return Err(GameError::TooManyMines { mines: count, tiles });
        }
        let mut placed = 0;
        while placed < count {
            let i = rng.gen_range(0..tiles);
            if !self.tiles[i].mine {
                self.tiles[i].mine = true;
                placed += 1;
            }
        }
        self.mines += placed;
        Ok(())
    }

    /// Store the number of neighboring mines on every non-mine tile
    pub fn compute_adjacency(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let idx = self.index(row, col);
                if self.tiles[idx].mine {
                    self.tiles[idx].adj = 0;
                    continue;
                }
                let adj = neighbors(self.rows, self.cols, row, col)
                    .filter(|&(r, c)| self.tiles[r * self.cols + c].mine)
                    .count();
                self.tiles[idx].adj = adj as u8;
            }
        }
    }

    /// Reveal the tile at (row, col), cascading through zero tiles
    ///
    /// Flagged and already revealed tiles are left alone. A mine is revealed
    /// only when it is the clicked tile; the cascade never steps onto mines,
    /// flags or tiles that are already open. Returns how many tiles opened.
    pub fn reveal(&mut self, row: usize, col: usize) -> usize {
        let start = self.index(row, col);
        let tile = &mut self.tiles[start];
        if tile.flagged || tile.revealed {
            return 0;
        }
        tile.revealed = true;
        if tile.mine || tile.adj > 0 {
            return 1;
        }

        let mut opened = 1;
        let mut pending = vec![(row, col)];
        while let Some((r, c)) = pending.pop() {
            for (nr, nc) in neighbors(self.rows, self.cols, r, c) {
                let next = &mut self.tiles[nr * self.cols + nc];
                if next.mine || next.revealed || next.flagged {
                    continue;
                }
                next.revealed = true;
                opened += 1;
                if next.adj == 0 {
                    pending.push((nr, nc));
                }
            }
        }
        opened
    }

    /// Flip the flag on a hidden tile, returning the new flag state
    /// Revealed tiles cannot be flagged and yield None
    pub fn toggle_flag(&mut self, row: usize, col: usize) -> Option<bool> {
        let idx = self.index(row, col);
        let tile = &mut self.tiles[idx];
        if tile.revealed {
            return None;
        }
        tile.flagged = !tile.flagged;
        Some(tile.flagged)
    }

    /// True once any mine has been revealed
    pub fn exploded(&self) -> bool {
        self.tiles.iter().any(|t| t.revealed && t.mine)
    }

    pub fn revealed_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.revealed).count()
    }

    pub fn view(&self, row: usize, col: usize) -> TileView {
        let tile = self.tile(row, col);
        match (tile.revealed, tile.mine, tile.flagged) {
            (true, true, _) => TileView::RevealedMine,
            (true, false, _) => TileView::Revealed(tile.adj),
            (false, _, true) => TileView::Flagged,
            (false, _, false) => TileView::Hidden,
        }
    }

    /// Build a board with mines at fixed positions and counts computed
    #[cfg(test)]
    pub fn with_mines(rows: usize, cols: usize, mines: &[(usize, usize)]) -> Self {
        let mut board = Board::new(rows, cols);
        for &(r, c) in mines {
            let idx = board.index(r, c);
            if !board.tiles[idx].mine {
                board.tiles[idx].mine = true;
                board.mines += 1;
            }
        }
        board.compute_adjacency();
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_board(rows: usize, cols: usize, mines: usize, seed: u64) -> Board {
        let mut board = Board::new(rows, cols);
        let mut rng = StdRng::seed_from_u64(seed);
        board.place_mines(mines, &mut rng).unwrap();
        board.compute_adjacency();
        board
    }

    fn brute_force_adj(board: &Board, row: usize, col: usize) -> u8 {
        let mut n = 0;
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if r >= 0
                    && c >= 0
                    && (r as usize) < board.rows()
                    && (c as usize) < board.cols()
                    && board.tile(r as usize, c as usize).mine
                {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn new_board_is_blank() {
        let board = Board::new(4, 4);
        assert!(board.tiles().iter().all(|t| *t == Tile::default()));
        assert_eq!(board.mine_count(), 0);
    }

    #[test]
    fn place_mines_places_exact_count() {
        let board = random_board(10, 10, 25, 7);
        assert_eq!(board.tiles().iter().filter(|t| t.mine).count(), 25);
        assert_eq!(board.mine_count(), 25);
    }

    #[test]
    fn place_mines_rejects_full_board() {
        let mut board = Board::new(2, 2);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            board.place_mines(4, &mut rng),
            Err(GameError::TooManyMines { mines: 4, tiles: 4 })
        );
        assert_eq!(board.place_mines(3, &mut rng), Ok(()));
    }

    #[test]
    fn place_mines_rejects_empty_board() {
        let mut board = Board::new(0, 5);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(board.place_mines(0, &mut rng), Err(GameError::EmptyBoard));
    }

    #[test]
    fn adjacency_is_clipped_at_edges() {
        let board = Board::with_mines(3, 3, &[(0, 0), (2, 2)]);
        assert_eq!(board.tile(0, 1).adj, 1);
        assert_eq!(board.tile(1, 1).adj, 2);
        assert_eq!(board.tile(2, 0).adj, 0);
        assert_eq!(board.tile(0, 2).adj, 0);
    }

    #[test]
    fn empty_board_opens_in_one_click() {
        let mut board = random_board(10, 10, 0, 3);
        assert_eq!(board.reveal(4, 6), 100);
        assert!(board.tiles().iter().all(|t| t.revealed));
    }

    #[test]
    fn numbered_tile_does_not_cascade() {
        let mut board = Board::with_mines(2, 2, &[(0, 0)]);
        assert_eq!(board.tile(1, 1).adj, 1);
        assert_eq!(board.reveal(1, 1), 1);
        assert!(board.tile(1, 1).revealed);
        assert!(!board.tile(0, 1).revealed);
        assert!(!board.tile(1, 0).revealed);
        assert!(!board.tile(0, 0).revealed);
    }

    #[test]
    fn cascade_stops_at_numbered_boundary() {
        // Mine column on the right edge of a 3x4 board
        let mut board = Board::with_mines(3, 4, &[(0, 3), (1, 3), (2, 3)]);
        board.reveal(1, 0);
        for row in 0..3 {
            assert!(board.tile(row, 0).revealed);
            assert!(board.tile(row, 1).revealed);
            assert!(board.tile(row, 2).revealed);
            assert!(!board.tile(row, 3).revealed);
        }
        assert!(!board.exploded());
    }

    #[test]
    fn flagged_tile_is_protected() {
        let mut board = Board::with_mines(3, 3, &[(2, 2)]);
        board.toggle_flag(0, 0);
        assert_eq!(board.reveal(0, 0), 0);
        assert!(!board.tile(0, 0).revealed);
    }

    #[test]
    fn cascade_skips_flagged_neighbors() {
        let mut board = Board::with_mines(3, 3, &[]);
        board.toggle_flag(1, 1);
        assert_eq!(board.reveal(0, 0), 8);
        assert!(!board.tile(1, 1).revealed);
        assert_eq!(board.view(1, 1), TileView::Flagged);
    }

    #[test]
    fn clicking_a_mine_explodes() {
        let mut board = Board::with_mines(3, 3, &[(1, 1)]);
        assert_eq!(board.reveal(1, 1), 1);
        assert!(board.exploded());
        assert_eq!(board.view(1, 1), TileView::RevealedMine);
        assert_eq!(board.revealed_count(), 1);
    }

    #[test]
    fn flag_on_revealed_tile_is_refused() {
        let mut board = Board::with_mines(2, 2, &[(0, 0)]);
        board.reveal(1, 1);
        assert_eq!(board.toggle_flag(1, 1), None);
        assert_eq!(board.toggle_flag(0, 1), Some(true));
        assert_eq!(board.toggle_flag(0, 1), Some(false));
    }

    #[test]
    fn clear_resets_every_tile() {
        let mut board = random_board(6, 6, 8, 11);
        board.reveal(0, 0);
        board.toggle_flag(5, 5);
        board.clear();
        assert!(board.tiles().iter().all(|t| *t == Tile::default()));
        assert_eq!(board.mine_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_adjacency_matches_neighbors(rows in 1usize..12, cols in 1usize..12, density in 0usize..100, seed: u64) {
            let mines = (rows * cols - 1) * density / 100;
            let board = random_board(rows, cols, mines, seed);
            for row in 0..rows {
                for col in 0..cols {
                    if !board.tile(row, col).mine {
                        prop_assert_eq!(board.tile(row, col).adj, brute_force_adj(&board, row, col));
                    }
                }
            }
        }

        #[test]
        fn prop_reveal_is_idempotent(rows in 1usize..12, cols in 1usize..12, density in 0usize..40, seed: u64, pick: usize) {
            let mines = (rows * cols - 1) * density / 100;
            let mut once = random_board(rows, cols, mines, seed);
            let (row, col) = ((pick / cols) % rows, pick % cols);
            once.reveal(row, col);
            let mut twice = once.clone();
            prop_assert_eq!(twice.reveal(row, col), 0);
            prop_assert_eq!(once.tiles(), twice.tiles());
        }

        #[test]
        fn prop_cascade_never_opens_mines_or_flags(
            rows in 1usize..12,
            cols in 1usize..12,
            density in 0usize..40,
            seed: u64,
            pick: usize,
            flags in proptest::collection::vec(any::<usize>(), 0..6),
        ) {
            let mines = (rows * cols - 1) * density / 100;
            let mut board = random_board(rows, cols, mines, seed);
            for f in &flags {
                board.toggle_flag((f / cols) % rows, f % cols);
            }
            let (row, col) = ((pick / cols) % rows, pick % cols);
            let opened = board.reveal(row, col);
            prop_assert_eq!(opened, board.revealed_count());
            prop_assert!(opened <= rows * cols);
            for r in 0..rows {
                for c in 0..cols {
                    let t = board.tile(r, c);
                    prop_assert!(!(t.revealed && t.flagged));
                    if t.revealed && t.mine {
                        prop_assert_eq!((r, c), (row, col));
                    }
                }
            }
        }
    }
}
