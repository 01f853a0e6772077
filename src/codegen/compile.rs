//! Compiler driver - layout, partition and per-core generation
//!
//! Core programs share nothing mutable, so they are generated on the rayon
//! pool. The output order is fixed by core id regardless of which worker
//! finishes first: identical inputs always give an identical stream.

use super::{generate_core_program, CoreProgram, ProgramStats, ANNOTATION_MARKER};
use crate::config::CompilerConfig;
use crate::dims::Dimensions;
use crate::error::Result;
use crate::isa::{Instruction, ADDRESS_SPACE};
use crate::layout::{plan, MemoryMap};
use crate::listing::render_listing;
use crate::partition::{partition, Partition, WorkAssignment};
use rayon::prelude::*;

/// Output of one compile: every core's program plus the plan behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    pub dims: Dimensions,
    /// Kernel name from the dimension contract, if any
    pub name: Option<String>,
    pub memory_map: MemoryMap,
    pub partition: Partition,
    /// Core programs ordered by core id
    pub cores: Vec<CoreProgram>,
    /// Whether annotation lines were generated
    pub annotated: bool,
}

impl CompiledProgram {
    /// Attach a kernel name for the listing header
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Header annotations (empty when compiled without annotations)
    pub fn header_lines(&self) -> Vec<String> {
        if !self.annotated {
            return Vec::new();
        }
        let mut lines = vec![format!(
            "{} PIM Instructions for Matrix Multiplication",
            ANNOTATION_MARKER
        )];
        if let Some(name) = &self.name {
            lines.push(format!("{} Kernel: {}", ANNOTATION_MARKER, name));
        }
        lines.push(format!("{} Matrix dimensions: {}", ANNOTATION_MARKER, self.dims));
        lines.push(format!("{} Using {} cores", ANNOTATION_MARKER, self.cores.len()));
        lines.push(String::new());
        lines
    }

    /// The whole stream: header, then each core's program in core order
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = self.header_lines();
        for core in &self.cores {
            if self.annotated && lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
            lines.extend(core.to_lines());
        }
        lines
    }

    /// Listing text with a `# Binary:` note on every instruction
    pub fn render_listing(&self) -> String {
        render_listing(&self.to_lines())
    }

    /// All encoded instructions in stream order
    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.cores.iter().flat_map(|core| core.instructions())
    }

    pub fn instruction_count(&self) -> usize {
        self.cores.iter().map(CoreProgram::instruction_count).sum()
    }

    pub fn stats(&self) -> ProgramStats {
        let mut stats = ProgramStats::default();
        for line in self.to_lines() {
            if line.is_empty() {
                stats.add_blank();
            } else if line.starts_with(ANNOTATION_MARKER) {
                stats.add_annotation();
            }
        }
        for instr in self.instructions() {
            stats.add_instruction(&instr);
        }
        stats
    }
}

/// Compile `C = A * B` for `dims` under `config`
///
/// All-or-nothing: either every core's program is returned or an error is.
pub fn compile(dims: &Dimensions, config: &CompilerConfig) -> Result<CompiledProgram> {
    config.validate()?;

    let partition = partition(dims.m, config.cores);
    let memory_map = plan(dims, config.row_capacity);

    if memory_map.total_rows() > ADDRESS_SPACE || config.row_capacity.get() > ADDRESS_SPACE {
        log::warn!(
            "Layout spans {} rows of {} elements; addresses above {} wrap in the 9-bit field",
            memory_map.total_rows(),
            config.row_capacity,
            ADDRESS_SPACE - 1
        );
    }

    let generate =
        |work: &WorkAssignment| generate_core_program(work, dims, &memory_map, config.annotate);
    let cores: Vec<CoreProgram> = if config.parallel {
        partition.assignments.par_iter().map(generate).collect()
    } else {
        partition.assignments.iter().map(generate).collect()
    };

    let program = CompiledProgram {
        dims: *dims,
        name: None,
        memory_map,
        partition,
        cores,
        annotated: config.annotate,
    };
    log::debug!(
        "Compiled {} for {} cores: {} instructions",
        dims,
        program.cores.len(),
        program.instruction_count()
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::expected_instruction_count;
    use crate::error::PimError;
    use crate::isa::Opcode;
    use crate::layout::RowCapacity;

    fn dims(m: usize, n: usize, k: usize) -> Dimensions {
        Dimensions::new(m, n, k).unwrap()
    }

    #[test]
    fn test_cores_in_order() {
        let program = compile(&dims(10, 3, 2), &CompilerConfig::default().with_cores(3)).unwrap();
        let ids: Vec<usize> = program.cores.iter().map(CoreProgram::core_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let progs: Vec<u8> = program
            .instructions()
            .filter(|i| i.opcode == Opcode::Prog)
            .map(|i| i.core)
            .collect();
        assert_eq!(progs, vec![0, 1, 2]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let d = dims(37, 5, 9);
        let config = CompilerConfig::default()
            .with_cores(8)
            .with_row_capacity(RowCapacity::new(7).unwrap());
        let parallel = compile(&d, &config).unwrap();
        let sequential = compile(&d, &config.clone().with_parallel(false)).unwrap();
        let again = compile(&d, &config).unwrap();

        assert_eq!(parallel.to_lines(), sequential.to_lines());
        assert_eq!(parallel.render_listing(), again.render_listing());
    }

    #[test]
    fn test_total_instruction_count() {
        let d = dims(10, 3, 2);
        let program = compile(&d, &CompilerConfig::default().with_cores(3)).unwrap();
        let expected: usize = program
            .partition
            .assignments
            .iter()
            .filter_map(|w| expected_instruction_count(w.row_count(), 3, 2, 1))
            .sum();
        assert_eq!(program.instruction_count(), expected);
        assert_eq!(program.stats().instructions, expected);
        assert_eq!(program.stats().count(Opcode::Prog), 3);
        assert_eq!(program.stats().count(Opcode::End), 3);
    }

    #[test]
    fn test_header_and_separators() {
        let program = compile(&dims(4, 3, 2), &CompilerConfig::default().with_cores(2))
            .unwrap()
            .with_name("tiny");
        let lines = program.to_lines();
        assert_eq!(lines[0], "# PIM Instructions for Matrix Multiplication");
        assert_eq!(lines[1], "# Kernel: tiny");
        assert_eq!(lines[2], "# Matrix dimensions: 4x2 * 2x3");
        assert_eq!(lines[3], "# Using 2 cores");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "# Instructions for Core 0 (Rows 0 to 1)");

        let core1 = lines
            .iter()
            .position(|l| l == "# Instructions for Core 1 (Rows 2 to 3)")
            .unwrap();
        assert_eq!(lines[core1 - 1], "");
        assert_eq!(lines[core1 - 2], "060000");
    }

    #[test]
    fn test_unannotated_stream_is_pure_hex() {
        let config = CompilerConfig::default().with_cores(2).with_annotations(false);
        let program = compile(&dims(4, 3, 2), &config).unwrap();
        let lines = program.to_lines();
        assert_eq!(lines.len(), program.instruction_count());
        assert!(lines.iter().all(|l| l.len() == 6));
    }

    #[test]
    fn test_clamped_cores() {
        let program = compile(&dims(3, 2, 2), &CompilerConfig::default().with_cores(5)).unwrap();
        assert!(program.partition.clamped());
        assert_eq!(program.cores.len(), 3);
        assert!(program.cores.iter().all(|c| c.assignment.row_count() == 1));
        let warning = program.partition.clamp_warning().unwrap();
        assert!(warning.contains("More cores (5) than matrix rows (3)"));
        assert_eq!(program.partition.effective_cores, program.cores.len());

        let exact = compile(&dims(3, 2, 2), &CompilerConfig::default().with_cores(3)).unwrap();
        assert!(exact.partition.clamp_warning().is_none());
    }

    #[test]
    fn test_zero_cores_is_an_error() {
        let err = compile(&dims(3, 2, 2), &CompilerConfig::default().with_cores(0)).unwrap_err();
        assert!(matches!(err, PimError::InvalidCoreCount(0)));
    }
}
