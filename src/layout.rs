//! Memory layout - places A, B and C in consecutive physical rows
//!
//! ```text
//! row 0                  base_b                 base_c
//! |-- A (M*K elements) --|-- B (K*N elements) --|-- C (M*N elements) --|
//! ```
//!
//! Each matrix is stored row-major and packed densely across physical rows
//! of `RowCapacity` elements, so a logical matrix row may straddle a physical
//! row boundary or span several physical rows.

use crate::dims::Dimensions;
use crate::error::{PimError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::ops::Range;

/// Elements per physical memory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RowCapacity(NonZeroU32);

impl RowCapacity {
    /// Capacity of the reference PIM subarray
    pub const DEFAULT: Self = match NonZeroU32::new(512) {
        Some(v) => Self(v),
        None => unreachable!(),
    };

    /// Create a capacity; zero is a configuration error
    pub fn new(elements: u32) -> Result<Self> {
        NonZeroU32::new(elements)
            .map(Self)
            .ok_or(PimError::InvalidRowCapacity(elements as u64))
    }

    /// Capacity as `usize` for address arithmetic
    pub const fn get(self) -> usize {
        self.0.get() as usize
    }

    /// Physical rows needed to hold `elements` (ceiling division)
    pub const fn rows_for(self, elements: usize) -> usize {
        elements.div_ceil(self.get())
    }
}

impl Default for RowCapacity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for RowCapacity {
    type Error = PimError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RowCapacity> for u32 {
    fn from(value: RowCapacity) -> Self {
        value.0.get()
    }
}

impl fmt::Display for RowCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Matrix identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Matrix {
    A,
    B,
    C,
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        })
    }
}

/// Physical rows owned by one matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRegion {
    pub matrix: Matrix,
    /// First physical row
    pub base: usize,
    /// Physical rows occupied
    pub rows: usize,
    /// Elements stored
    pub elements: usize,
}

impl MatrixRegion {
    /// Physical row range `[base, base + rows)`
    pub fn row_range(&self) -> Range<usize> {
        self.base..self.base + self.rows
    }

    /// True if the two regions share a physical row
    pub fn overlaps(&self, other: &MatrixRegion) -> bool {
        let (a, b) = (self.row_range(), other.row_range());
        a.start < b.end && b.start < a.end
    }
}

/// Placement of A, B and C in physical memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub base_addr_a: usize,
    pub base_addr_b: usize,
    pub base_addr_c: usize,
    /// Elements per logical row (K, N, N)
    pub row_size_a: usize,
    pub row_size_b: usize,
    pub row_size_c: usize,
    /// Physical rows spanned by one logical row
    pub rows_per_matrix_row_a: usize,
    pub rows_per_matrix_row_b: usize,
    pub rows_per_matrix_row_c: usize,
    /// Capacity the map was planned with
    pub row_capacity: RowCapacity,
    /// Element counts of A, B, C
    sizes: [usize; 3],
}

impl MemoryMap {
    /// The three matrix regions in address order
    pub fn regions(&self) -> [MatrixRegion; 3] {
        let [size_a, size_b, size_c] = self.sizes;
        [
            self.make_region(Matrix::A, self.base_addr_a, size_a),
            self.make_region(Matrix::B, self.base_addr_b, size_b),
            self.make_region(Matrix::C, self.base_addr_c, size_c),
        ]
    }

    /// Region owning `matrix`
    pub fn region(&self, matrix: Matrix) -> MatrixRegion {
        let [a, b, c] = self.regions();
        match matrix {
            Matrix::A => a,
            Matrix::B => b,
            Matrix::C => c,
        }
    }

    /// Physical rows used by all three matrices
    pub fn total_rows(&self) -> usize {
        self.base_addr_c + self.row_capacity.rows_for(self.sizes[2])
    }

    /// Physical row and in-row offset of linear element `index` of `matrix`
    pub fn locate(&self, matrix: Matrix, index: usize) -> (usize, usize) {
        let base = match matrix {
            Matrix::A => self.base_addr_a,
            Matrix::B => self.base_addr_b,
            Matrix::C => self.base_addr_c,
        };
        let cap = self.row_capacity.get();
        (base + index / cap, index % cap)
    }

    fn make_region(&self, matrix: Matrix, base: usize, elements: usize) -> MatrixRegion {
        MatrixRegion {
            matrix,
            base,
            rows: self.row_capacity.rows_for(elements),
            elements,
        }
    }
}

/// Plan the memory layout for `dims` with physical rows of `capacity` elements
pub fn plan(dims: &Dimensions, capacity: RowCapacity) -> MemoryMap {
    let size_a = dims.size_a();
    let size_b = dims.size_b();
    let size_c = dims.size_c();

    let base_addr_a = 0;
    let base_addr_b = base_addr_a + capacity.rows_for(size_a);
    let base_addr_c = base_addr_b + capacity.rows_for(size_b);

    let map = MemoryMap {
        base_addr_a,
        base_addr_b,
        base_addr_c,
        row_size_a: dims.k,
        row_size_b: dims.n,
        row_size_c: dims.n,
        rows_per_matrix_row_a: capacity.rows_for(dims.k),
        rows_per_matrix_row_b: capacity.rows_for(dims.n),
        rows_per_matrix_row_c: capacity.rows_for(dims.n),
        row_capacity: capacity,
        sizes: [size_a, size_b, size_c],
    };

    for region in map.regions() {
        log::debug!(
            "Matrix {}: base row {}, {} elements ({} rows)",
            region.matrix, region.base, region.elements, region.rows
        );
    }
    log::debug!(
        "Matrix row layout: A={}, B={}, C={} physical rows per matrix row",
        map.rows_per_matrix_row_a, map.rows_per_matrix_row_b, map.rows_per_matrix_row_c
    );

    map
}
