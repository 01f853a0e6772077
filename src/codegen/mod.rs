//! Code generation - per-core matrix-multiply programs
//!
//! Each core receives a linear program for its row block:
//!
//! ```text
//! PROG  MATMUL
//! for i in rows:
//!     load A[i]                       (2 ops, or 2 per physical segment)
//!     for j in 0..N:
//!         clear accumulator           (1 op)
//!         for k in 0..K:
//!             load B[k][j], mac       (3 ops)
//!         store C[i][j]               (2 ops)
//! END
//! ```
//!
//! The controller on each core is single-threaded; the micro-op order
//! emitted here is the execution order.

mod compile;
mod stats;

pub use compile::{compile, CompiledProgram};
pub use stats::ProgramStats;

use crate::dims::Dimensions;
use crate::isa::{Instruction, KernelFunction, MicroOp};
use crate::layout::{Matrix, MemoryMap};
use crate::partition::WorkAssignment;

/// First character of every non-instruction line
pub const ANNOTATION_MARKER: char = '#';

/// One line of a core program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramLine {
    /// Human-readable note (rendered with a leading `#`)
    Annotation(String),
    /// A micro-operation, lowered with the core id when encoded
    Op(MicroOp),
}

/// The complete program for one core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreProgram {
    pub assignment: WorkAssignment,
    pub lines: Vec<ProgramLine>,
}

impl CoreProgram {
    pub fn core_id(&self) -> usize {
        self.assignment.core_id
    }

    /// Micro-ops in execution order
    pub fn micro_ops(&self) -> impl Iterator<Item = &MicroOp> + '_ {
        self.lines.iter().filter_map(|line| match line {
            ProgramLine::Op(op) => Some(op),
            ProgramLine::Annotation(_) => None,
        })
    }

    /// Encoded instructions in execution order
    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        let core = self.core_id();
        self.micro_ops().map(move |op| op.lower(core))
    }

    pub fn instruction_count(&self) -> usize {
        self.micro_ops().count()
    }

    /// Render as listing lines (annotations and 6-digit hex words)
    pub fn to_lines(&self) -> Vec<String> {
        let core = self.core_id();
        self.lines
            .iter()
            .map(|line| match line {
                ProgramLine::Annotation(text) => format!("{} {}", ANNOTATION_MARKER, text),
                ProgramLine::Op(op) => op.lower(core).to_hex(),
            })
            .collect()
    }
}

/// Accumulates lines for one core
struct ProgramBuilder<'a> {
    map: &'a MemoryMap,
    lines: Vec<ProgramLine>,
    annotate: bool,
}

impl<'a> ProgramBuilder<'a> {
    fn new(map: &'a MemoryMap, annotate: bool) -> Self {
        Self {
            map,
            lines: Vec::new(),
            annotate,
        }
    }

    fn op(&mut self, op: MicroOp) {
        self.lines.push(ProgramLine::Op(op));
    }

    fn note(&mut self, text: impl FnOnce() -> String) {
        if self.annotate {
            self.lines.push(ProgramLine::Annotation(text()));
        }
    }

    /// Bring row `i` of A into the core
    fn load_a_row(&mut self, i: usize) {
        let map = self.map;
        match map.rows_per_matrix_row_a {
            0 => {}
            1 => {
                let (row, offset) = map.locate(Matrix::A, i * map.row_size_a);
                self.op(MicroOp::LoadAddress { row });
                self.op(MicroOp::LoadOffset { offset });
            }
            segments => {
                // Wide rows are loaded whole, one physical row per segment
                let first = map.base_addr_a + i * segments;
                for segment in 0..segments {
                    self.op(MicroOp::LoadAddress { row: first + segment });
                    self.op(MicroOp::LoadOffset { offset: 0 });
                }
            }
        }
    }

    /// Compute and store C[i][j]
    fn output_element(&mut self, i: usize, j: usize, k_steps: usize) {
        let map = self.map;
        self.note(|| format!("Computing element C[{}][{}]", i, j));
        self.op(MicroOp::ClearAccumulator);

        for k in 0..k_steps {
            let (row, offset) = map.locate(Matrix::B, k * map.row_size_b + j);
            self.op(MicroOp::LoadAddress { row });
            self.op(MicroOp::LoadOffset { offset });
            self.op(MicroOp::MultiplyAccumulate);
        }

        let (row, offset) = map.locate(Matrix::C, i * map.row_size_c + j);
        self.op(MicroOp::StoreAddress { row });
        self.op(MicroOp::StoreOffset { offset });
    }
}

/// Generate the program for one core's row block
///
/// `N = 0` or `K = 0` is tolerated: the program is still bracketed by
/// PROG and END, with an empty body.
pub fn generate_core_program(
    assignment: &WorkAssignment,
    dims: &Dimensions,
    map: &MemoryMap,
    annotate: bool,
) -> CoreProgram {
    let mut builder = ProgramBuilder::new(map, annotate);

    builder.note(|| {
        format!(
            "Instructions for Core {} (Rows {} to {})",
            assignment.core_id, assignment.start_row, assignment.end_row
        )
    });
    builder.op(MicroOp::ProgramCore { function: KernelFunction::MatMul });

    for i in assignment.rows() {
        builder.note(|| format!("Processing row {}", i));
        builder.load_a_row(i);
        for j in 0..dims.n {
            builder.output_element(i, j, dims.k);
        }
    }

    builder.op(MicroOp::EndCore);

    let program = CoreProgram {
        assignment: *assignment,
        lines: builder.lines,
    };
    log::debug!(
        "Core {}: {} instructions for rows {} to {}",
        assignment.core_id,
        program.instruction_count(),
        assignment.start_row,
        assignment.end_row
    );
    program
}

/// Instructions a core program contains, in closed form
///
/// `2 + rows * (load + N * (3K + 3))`, where `load` is 2 for a logical A row
/// that fits one physical row and 2 per physical segment otherwise.
/// `None` when the count does not fit in a `usize`.
pub fn expected_instruction_count(
    rows: usize,
    n: usize,
    k: usize,
    rows_per_matrix_row_a: usize,
) -> Option<usize> {
    let load = if rows_per_matrix_row_a == 1 {
        2
    } else {
        rows_per_matrix_row_a.checked_mul(2)?
    };
    let per_column = k.checked_mul(3)?.checked_add(3)?;
    let per_row = n.checked_mul(per_column)?.checked_add(load)?;
    rows.checked_mul(per_row)?.checked_add(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode;
    use crate::layout::{plan, RowCapacity};

    fn setup(m: usize, n: usize, k: usize, cap: u32) -> (Dimensions, MemoryMap) {
        let dims = Dimensions::new(m, n, k).unwrap();
        let map = plan(&dims, RowCapacity::new(cap).unwrap());
        (dims, map)
    }

    fn work(core_id: usize, start_row: usize, end_row: usize) -> WorkAssignment {
        WorkAssignment {
            core_id,
            start_row,
            end_row,
        }
    }

    #[test]
    fn test_unit_matmul_sequence() {
        let (dims, map) = setup(1, 1, 1, 512);
        let program = generate_core_program(&work(0, 0, 0), &dims, &map, false);

        let ops: Vec<MicroOp> = program.micro_ops().copied().collect();
        assert_eq!(
            ops,
            vec![
                MicroOp::ProgramCore { function: KernelFunction::MatMul },
                MicroOp::LoadAddress { row: 0 },
                MicroOp::LoadOffset { offset: 0 },
                MicroOp::ClearAccumulator,
                MicroOp::LoadAddress { row: 1 },
                MicroOp::LoadOffset { offset: 0 },
                MicroOp::MultiplyAccumulate,
                MicroOp::StoreAddress { row: 2 },
                MicroOp::StoreOffset { offset: 0 },
                MicroOp::EndCore,
            ]
        );
        assert_eq!(
            program.to_lines(),
            vec![
                "020401", "040400", "040000", "040000", "040401", "040000", "040002", "040202",
                "040000", "060000"
            ]
        );
    }

    #[test]
    fn test_brackets_and_core_pointer() {
        let (dims, map) = setup(8, 3, 2, 512);
        let program = generate_core_program(&work(5, 4, 7), &dims, &map, true);
        let instrs: Vec<Instruction> = program.instructions().collect();

        assert_eq!(instrs.first().unwrap().opcode, Opcode::Prog);
        assert_eq!(instrs.last().unwrap().opcode, Opcode::End);
        assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::Prog).count(), 1);
        assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::End).count(), 1);
        assert!(instrs.iter().all(|i| i.core == 5));
        assert_eq!(instrs[0].to_hex(), "022c01");
    }

    #[test]
    fn test_instruction_count_closed_form() {
        for &(m, n, k, cap) in &[(4, 3, 2, 512), (2, 5, 1000, 512), (6, 4, 7, 3), (3, 1, 1, 1)] {
            let (dims, map) = setup(m, n, k, cap);
            let assignment = work(0, 0, m - 1);
            let program = generate_core_program(&assignment, &dims, &map, true);
            assert_eq!(
                Some(program.instruction_count()),
                expected_instruction_count(m, n, k, map.rows_per_matrix_row_a),
                "M={} N={} K={} cap={}",
                m, n, k, cap
            );
        }
    }

    #[test]
    fn test_instruction_count_overflow_is_none() {
        assert_eq!(expected_instruction_count(1_000_000_000, 1_000_000_000, 30, 1), None);
        assert_eq!(expected_instruction_count(usize::MAX, 0, 0, 1), None);
        assert_eq!(expected_instruction_count(1, 0, 0, usize::MAX), None);
        assert_eq!(expected_instruction_count(1, 1, 1, 1), Some(10));
    }

    #[test]
    fn test_a_row_straddles_physical_rows() {
        // K=3, cap=4: row 1 of A starts at element 3 -> physical row 0, offset 3
        let (dims, map) = setup(3, 1, 3, 4);
        let program = generate_core_program(&work(0, 1, 2), &dims, &map, false);
        let ops: Vec<MicroOp> = program.micro_ops().copied().collect();
        assert_eq!(ops[1], MicroOp::LoadAddress { row: 0 });
        assert_eq!(ops[2], MicroOp::LoadOffset { offset: 3 });

        // Row 2 starts at element 6 -> physical row 1, offset 2
        let row2 = 1 + 2 + (1 + 3 * 3 + 2);
        assert_eq!(ops[row2], MicroOp::LoadAddress { row: 1 });
        assert_eq!(ops[row2 + 1], MicroOp::LoadOffset { offset: 2 });
    }

    #[test]
    fn test_wide_a_rows_load_every_segment() {
        // K=10, cap=4: each A row spans 3 physical rows
        let (dims, map) = setup(2, 1, 10, 4);
        assert_eq!(map.rows_per_matrix_row_a, 3);
        let program = generate_core_program(&work(0, 1, 1), &dims, &map, false);
        let ops: Vec<MicroOp> = program.micro_ops().copied().collect();
        assert_eq!(
            &ops[1..7],
            &[
                MicroOp::LoadAddress { row: 3 },
                MicroOp::LoadOffset { offset: 0 },
                MicroOp::LoadAddress { row: 4 },
                MicroOp::LoadOffset { offset: 0 },
                MicroOp::LoadAddress { row: 5 },
                MicroOp::LoadOffset { offset: 0 },
            ]
        );
    }

    #[test]
    fn test_b_and_c_addressing() {
        // M=2, N=3, K=2, cap=4: A rows 0, B rows 1-2, C rows 3-4
        let (dims, map) = setup(2, 3, 2, 4);
        assert_eq!((map.base_addr_b, map.base_addr_c), (1, 3));
        let program = generate_core_program(&work(0, 1, 1), &dims, &map, false);
        let ops: Vec<MicroOp> = program.micro_ops().copied().collect();

        // C[1][2]: last output element, starts after PROG + A load + 2 elements
        let elem = 1 + 2 + 2 * (1 + 2 * 3 + 2);
        assert_eq!(ops[elem], MicroOp::ClearAccumulator);
        // B[0][2] = index 2 -> row 1, offset 2; B[1][2] = index 5 -> row 2, offset 1
        assert_eq!(ops[elem + 1], MicroOp::LoadAddress { row: 1 });
        assert_eq!(ops[elem + 2], MicroOp::LoadOffset { offset: 2 });
        assert_eq!(ops[elem + 3], MicroOp::MultiplyAccumulate);
        assert_eq!(ops[elem + 4], MicroOp::LoadAddress { row: 2 });
        assert_eq!(ops[elem + 5], MicroOp::LoadOffset { offset: 1 });
        // C index 1*3+2 = 5 -> row 3 + 1, offset 1
        assert_eq!(ops[elem + 7], MicroOp::StoreAddress { row: 4 });
        assert_eq!(ops[elem + 8], MicroOp::StoreOffset { offset: 1 });
        assert_eq!(ops[elem + 9], MicroOp::EndCore);
    }

    #[test]
    fn test_degenerate_dims_still_bracketed() {
        let dims = Dimensions {
            m: 2,
            n: 0,
            k: 0,
        };
        let map = plan(&dims, RowCapacity::DEFAULT);
        let program = generate_core_program(&work(0, 0, 1), &dims, &map, false);
        let ops: Vec<MicroOp> = program.micro_ops().copied().collect();
        assert_eq!(
            ops,
            vec![
                MicroOp::ProgramCore {
                    function: KernelFunction::MatMul
                },
                MicroOp::EndCore
            ]
        );
        assert_eq!(
            Some(program.instruction_count()),
            expected_instruction_count(2, 0, 0, 0)
        );
    }

    #[test]
    fn test_annotations() {
        let (dims, map) = setup(2, 2, 1, 512);
        let program = generate_core_program(&work(1, 1, 1), &dims, &map, true);
        let lines = program.to_lines();

        assert_eq!(lines[0], "# Instructions for Core 1 (Rows 1 to 1)");
        assert!(lines.contains(&"# Processing row 1".to_string()));
        assert!(lines.contains(&"# Computing element C[1][0]".to_string()));
        assert!(lines.contains(&"# Computing element C[1][1]".to_string()));

        let hex_lines = lines.iter().filter(|l| !l.starts_with(ANNOTATION_MARKER)).count();
        assert_eq!(hex_lines, program.instruction_count());
        assert!(lines
            .iter()
            .filter(|l| !l.starts_with(ANNOTATION_MARKER))
            .all(|l| Instruction::from_hex(l).is_ok()));
    }

    #[test]
    fn test_annotations_do_not_change_instructions() {
        let (dims, map) = setup(3, 4, 5, 8);
        let assignment = work(2, 0, 2);
        let with = generate_core_program(&assignment, &dims, &map, true);
        let without = generate_core_program(&assignment, &dims, &map, false);
        assert!(with.instructions().eq(without.instructions()));
    }
}
