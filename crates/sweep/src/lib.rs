//! # toolchain-sweep
//!
//! Builds embedded GCC and Clang/LLVM tool chains (with binutils and newlib)
//! for every combination in a version matrix, one job at a time, by handing
//! each combination to an external build driver.
//!
//! ## Usage
//!
//! ```bash
//! toolchain-sweep                  # List the matrix, build nothing
//! toolchain-sweep --gcc            # Every GCC tool chain
//! toolchain-sweep --gcc --clang    # Everything
//! ```
//!
//! ## Layout under the sweep root
//!
//! - `gnu/{gcc,binutils-gdb,newlib}`, `llvm/llvm-project` - git source trees
//! - `build/` - scratch directory, emptied around every job
//! - `install/<job>/`, `logs/<job>/` - per-job trees
//! - `logs/sweep-*.log`, `logs/summary.json` - sweep log and results

pub mod app;
pub mod cli;
pub mod config;
pub mod driver;
pub mod logging;
pub mod matrix;
pub mod summary;
pub mod sweep;
