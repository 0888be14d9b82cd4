use crate::domain::GridCoord;

/// Records which physical grid cells a traversal has already visited.
///
/// Probes that share a physical location must be counted, scaled and floored
/// once. Callers reset the grid at the start of every traversal that
/// deduplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenGrid {
    cols: usize,
    cells: Vec<bool>,
}

impl SeenGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            cells: vec![false; rows * cols],
        }
    }

    pub fn reset(&mut self) {
        self.cells.fill(false);
    }

    pub fn is_seen(&self, coord: GridCoord) -> bool {
        self.cells[self.index(coord)]
    }

    pub fn mark(&mut self, coord: GridCoord) {
        let index = self.index(coord);
        self.cells[index] = true;
    }

    /// Marks the cell and reports whether this was its first visit.
    pub fn visit(&mut self, coord: GridCoord) -> bool {
        let index = self.index(coord);
        !std::mem::replace(&mut self.cells[index], true)
    }

    fn index(&self, coord: GridCoord) -> usize {
        coord.x * self.cols + coord.y
    }
}
