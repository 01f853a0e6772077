//! Three-address code for the reference triple loop
//!
//! A human-readable lowering of `C = A * B` over row-major flat arrays,
//! written next to the listing as `<output>.tac`:
//!
//! ```text
//! i = 0
//! L1: if i >= M goto END_L1
//!     j = 0
//!     L2: if j >= N goto END_L2
//!         sum = 0
//!         k = 0
//!         L3: if k >= K goto END_L3
//!             t1 = i * K
//!             ...
//! ```

use crate::dims::Dimensions;
use crate::error::Result;
use std::fmt;
use std::path::Path;

/// Spaces per nesting level
const INDENT: usize = 4;

/// Right-hand-side operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Var(&'static str),
    Const(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Const(value) => write!(f, "{}", value),
        }
    }
}

/// One three-address statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacOp {
    /// `dst = src`
    Copy { dst: &'static str, src: Operand },
    /// `dst = lhs op rhs`
    Binary {
        dst: &'static str,
        lhs: Operand,
        op: char,
        rhs: Operand,
    },
    /// `dst = array[index]`
    Load {
        dst: &'static str,
        array: char,
        index: &'static str,
    },
    /// `array[index] = src`
    Store {
        array: char,
        index: &'static str,
        src: &'static str,
    },
    /// `label: if var >= bound goto exit`
    LoopTest {
        label: &'static str,
        var: &'static str,
        bound: usize,
        exit: &'static str,
    },
    Goto(&'static str),
    Label(&'static str),
}

impl TacOp {
    const fn copy(dst: &'static str, src: Operand) -> Self {
        Self::Copy { dst, src }
    }

    const fn binary(dst: &'static str, lhs: Operand, op: char, rhs: Operand) -> Self {
        Self::Binary { dst, lhs, op, rhs }
    }

    const fn load(dst: &'static str, array: char, index: &'static str) -> Self {
        Self::Load { dst, array, index }
    }

    const fn store(array: char, index: &'static str, src: &'static str) -> Self {
        Self::Store { array, index, src }
    }

    const fn loop_test(
        label: &'static str,
        var: &'static str,
        bound: usize,
        exit: &'static str,
    ) -> Self {
        Self::LoopTest {
            label,
            var,
            bound,
            exit,
        }
    }
}

impl fmt::Display for TacOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacOp::Copy { dst, src } => write!(f, "{} = {}", dst, src),
            TacOp::Binary { dst, lhs, op, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op, rhs),
            TacOp::Load { dst, array, index } => write!(f, "{} = {}[{}]", dst, array, index),
            TacOp::Store { array, index, src } => write!(f, "{}[{}] = {}", array, index, src),
            TacOp::LoopTest { label, var, bound, exit } => {
                write!(f, "{}: if {} >= {} goto {}", label, var, bound, exit)
            }
            TacOp::Goto(label) => write!(f, "goto {}", label),
            TacOp::Label(label) => write!(f, "{}:", label),
        }
    }
}

/// Statement with its loop nesting depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TacStatement {
    pub depth: usize,
    pub op: TacOp,
}

impl fmt::Display for TacStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:width$}{}", "", self.op, width = self.depth * INDENT)
    }
}

/// Three-address program for one matrix multiply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeAddressCode {
    pub dims: Dimensions,
    pub statements: Vec<TacStatement>,
}

impl ThreeAddressCode {
    /// Statement lines, indented by depth
    pub fn lines(&self) -> Vec<String> {
        self.statements.iter().map(ToString::to_string).collect()
    }

    /// File contents: a two-line header, a blank line, then the statements
    pub fn render(&self) -> String {
        let mut out = String::from("# Three-Address Code for Matrix Multiplication\n");
        out.push_str("# =====================================\n\n");
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Build the triple-loop three-address code for `dims`
pub fn generate_three_address_code(dims: &Dimensions) -> ThreeAddressCode {
    use Operand::{Const, Var};

    let mut statements = Vec::new();
    let mut emit = |depth: usize, op: TacOp| statements.push(TacStatement { depth, op });
    let mul = |dst, lhs, rhs| TacOp::binary(dst, lhs, '*', rhs);
    let add = |dst, lhs, rhs| TacOp::binary(dst, lhs, '+', rhs);

    // i loop over rows of A
    emit(0, TacOp::copy("i", Const(0)));
    emit(0, TacOp::loop_test("L1", "i", dims.m, "END_L1"));

    // j loop over columns of B
    emit(1, TacOp::copy("j", Const(0)));
    emit(1, TacOp::loop_test("L2", "j", dims.n, "END_L2"));
    emit(2, TacOp::copy("sum", Const(0)));

    // k loop: dot product
    emit(2, TacOp::copy("k", Const(0)));
    emit(2, TacOp::loop_test("L3", "k", dims.k, "END_L3"));
    emit(3, mul("t1", Var("i"), Const(dims.k)));
    emit(3, add("t2", Var("t1"), Var("k")));
    emit(3, mul("t3", Var("k"), Const(dims.n)));
    emit(3, add("t4", Var("t3"), Var("j")));
    emit(3, TacOp::load("t5", 'A', "t2"));
    emit(3, TacOp::load("t6", 'B', "t4"));
    emit(3, mul("t7", Var("t5"), Var("t6")));
    emit(3, add("sum", Var("sum"), Var("t7")));
    emit(3, add("k", Var("k"), Const(1)));
    emit(3, TacOp::Goto("L3"));
    emit(2, TacOp::Label("END_L3"));

    emit(2, mul("t8", Var("i"), Const(dims.n)));
    emit(2, add("t9", Var("t8"), Var("j")));
    emit(2, TacOp::store('C', "t9", "sum"));
    emit(2, add("j", Var("j"), Const(1)));
    emit(2, TacOp::Goto("L2"));
    emit(1, TacOp::Label("END_L2"));

    emit(1, add("i", Var("i"), Const(1)));
    emit(1, TacOp::Goto("L1"));
    emit(0, TacOp::Label("END_L1"));

    ThreeAddressCode {
        dims: *dims,
        statements,
    }
}
