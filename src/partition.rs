//! Work partitioning - splits the M output rows across cores
//!
//! Rows are dealt out in contiguous blocks of `ceil(M / cores)`; the last
//! block may be short, and a core whose block would start past the last row
//! gets no assignment at all.
//!
//! ```text
//! M=10, cores=3  ->  rows_per_core=4
//!   core 0: [0, 3]   core 1: [4, 7]   core 2: [8, 9]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Contiguous inclusive row range owned by one core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub core_id: usize,
    pub start_row: usize,
    pub end_row: usize,
}

impl WorkAssignment {
    /// Rows assigned (at least one)
    pub const fn row_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    /// Rows as an inclusive range
    pub fn rows(&self) -> RangeInclusive<usize> {
        self.start_row..=self.end_row
    }
}

impl fmt::Display for WorkAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Core {}: Rows {} to {} ({} rows)",
            self.core_id,
            self.start_row,
            self.end_row,
            self.row_count()
        )
    }
}

/// Result of splitting rows across cores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Cores asked for
    pub requested_cores: usize,
    /// Cores after clamping to the row count
    pub effective_cores: usize,
    /// Block size (ceil(M / effective_cores))
    pub rows_per_core: usize,
    /// Non-empty assignments, ordered by core id
    pub assignments: Vec<WorkAssignment>,
}

impl Partition {
    /// True if fewer cores were used than requested because M < cores
    pub fn clamped(&self) -> bool {
        self.effective_cores < self.requested_cores
    }

    /// Warning to show when the core count was clamped
    pub fn clamp_warning(&self) -> Option<String> {
        self.clamped().then(|| {
            format!(
                "More cores ({}) than matrix rows ({}). Using only {} cores.",
                self.requested_cores,
                self.total_rows(),
                self.effective_cores
            )
        })
    }

    /// Total rows covered
    pub fn total_rows(&self) -> usize {
        self.assignments.iter().map(WorkAssignment::row_count).sum()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Split `rows` across `cores`
///
/// Asking for more cores than rows clamps to one row per core and logs a
/// warning. Zero rows or zero cores give an empty partition.
pub fn partition(rows: usize, cores: usize) -> Partition {
    if rows == 0 || cores == 0 {
        return Partition {
            requested_cores: cores,
            effective_cores: 0,
            rows_per_core: 0,
            assignments: Vec::new(),
        };
    }

    let effective_cores = cores.min(rows);
    let rows_per_core = rows.div_ceil(effective_cores);
    log::debug!(
        "Distributing {} rows across {} cores (approx. {} rows per core)",
        rows, effective_cores, rows_per_core
    );

    let assignments = (0..effective_cores)
        .filter_map(|core_id| {
            let start_row = core_id * rows_per_core;
            let end_row = ((core_id + 1) * rows_per_core - 1).min(rows - 1);
            (start_row <= end_row).then_some(WorkAssignment {
                core_id,
                start_row,
                end_row,
            })
        })
        .inspect(|work| log::debug!("  {}", work))
        .collect();

    let partition = Partition {
        requested_cores: cores,
        effective_cores,
        rows_per_core,
        assignments,
    };
    if let Some(warning) = partition.clamp_warning() {
        log::warn!("{}", warning);
    }
    partition
}
