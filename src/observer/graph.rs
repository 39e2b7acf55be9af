//! Braille occupancy graph.
//!
//! Each observed request becomes one row of dots: the content's blocks are
//! spread over `2 * width` dot columns and a column is lit when any block
//! mapped to it is cached. A Braille cell has four rows, so four requests
//! stack into one terminal line (redrawn in place with `\r`) before the graph
//! moves to the next line.

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::debug;

use crate::observer::{CacheObserver, Occupancy};

const BRAILLE_BASE: u32 = 0x2800;

/// (left, right) dot bits for each of the four rows of a Braille cell.
const ROW_DOTS: [(u8, u8); 4] = [(0x01, 0x08), (0x02, 0x10), (0x04, 0x20), (0x40, 0x80)];

struct GraphState {
    out: Box<dyn Write + Send>,
    /// Dot bits per cell of the line being drawn.
    cells: Vec<u8>,
    /// Rows of `cells` already filled (0..=4).
    rows: usize,
}

/// Draws cache occupancy to a writer, usually stdout.
pub struct BrailleGraph {
    state: Mutex<GraphState>,
    width: usize,
    content_len: u64,
}

impl BrailleGraph {
    /// Create a graph `width` cells wide for content of `content_len` bytes.
    ///
    /// Writes a `=` rule of the same width as a header.
    pub fn new(out: Box<dyn Write + Send>, width: usize, content_len: u64) -> io::Result<Self> {
        if width == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "graph width must be positive",
            ));
        }
        let mut out = out;
        writeln!(out, "{}", "=".repeat(width))?;
        out.flush()?;
        Ok(Self {
            state: Mutex::new(GraphState {
                out,
                cells: vec![0; width],
                rows: 0,
            }),
            width,
            content_len,
        })
    }

    /// Graph on stdout.
    pub fn stdout(width: usize, content_len: u64) -> io::Result<Self> {
        Self::new(Box::new(io::stdout()), width, content_len)
    }

    /// Dot columns lit by the cached blocks, as a `2 * width` bitmap.
    fn lit_columns(&self, occupancy: &Occupancy<'_>) -> Vec<bool> {
        let columns = 2 * self.width as u64;
        let mut lit = vec![false; columns as usize];
        let total_blocks = self.content_len.div_ceil(occupancy.block_size).max(1);
        for &index in occupancy.cached {
            if index >= total_blocks {
                continue;
            }
            let first = columns * index / total_blocks;
            let next = columns * (index + 1) / total_blocks;
            for column in first..next {
                lit[column as usize] = true;
            }
        }
        lit
    }

    fn draw(&self, occupancy: &Occupancy<'_>) -> io::Result<()> {
        let lit = self.lit_columns(occupancy);

        // Observers are best effort: skip this frame if another draw is running.
        let Some(mut state) = self.state.try_lock() else {
            return Ok(());
        };

        let new_line = state.rows == ROW_DOTS.len();
        if state.rows == 0 || new_line {
            state.cells.iter_mut().for_each(|cell| *cell = 0);
            state.rows = 0;
        }

        let (left, right) = ROW_DOTS[state.rows];
        for (cell, pair) in state.cells.iter_mut().zip(lit.chunks(2)) {
            if pair[0] {
                *cell |= left;
            }
            if pair.get(1).copied().unwrap_or(false) {
                *cell |= right;
            }
        }
        let first_row = state.rows == 0;
        state.rows += 1;

        let line: String = state
            .cells
            .iter()
            .map(|&dots| char::from_u32(BRAILLE_BASE + u32::from(dots)).unwrap_or(' '))
            .collect();

        let prefix = match (first_row, new_line) {
            (true, true) => "\n",
            (true, false) => "",
            (false, _) => "\r",
        };
        write!(state.out, "{prefix}{line}")?;
        state.out.flush()
    }
}

impl CacheObserver for BrailleGraph {
    fn on_exclusive_request(&self, occupancy: &Occupancy<'_>) {
        if let Err(e) = self.draw(occupancy) {
            debug!(error = %e, "Failed to draw occupancy graph");
        }
    }
}

impl Drop for BrailleGraph {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.rows > 0 {
            let _ = writeln!(state.out);
            let _ = state.out.flush();
        }
    }
}
