use crate::matrix::Selection;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "toolchain-sweep", version)]
#[command(about = "Build embedded GCC and Clang tool chains across a version matrix")]
#[command(long_about = "Build embedded GCC and Clang tool chains across a version matrix.\n\n\
    With neither --gcc nor --clang the candidate matrix is listed and nothing is built.\n\
    Settings come from TOOLCHAIN_SWEEP_ROOT, TOOLCHAIN_SWEEP_DRIVER, TOOLCHAIN_SWEEP_JOBS \
    and TOOLCHAIN_SWEEP_MATRIX.")]
#[command(args_override_self = true)]
pub struct Cli {
    /// Build the GCC tool chains.
    #[arg(long)]
    pub gcc: bool,

    /// Build the Clang/LLVM tool chains.
    #[arg(long)]
    pub clang: bool,
}

impl Cli {
    pub fn selection(&self) -> Selection {
        Selection {
            gcc: self.gcc,
            clang: self.clang,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Selection {
        let argv = std::iter::once("toolchain-sweep").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().selection()
    }

    #[test]
    fn test_no_flags_is_listing_only() {
        assert!(parse(&[]).is_empty());
    }

    #[test]
    fn test_flag_combinations() {
        assert_eq!(parse(&["--gcc"]), Selection { gcc: true, clang: false });
        assert_eq!(parse(&["--clang"]), Selection { gcc: false, clang: true });
        assert_eq!(parse(&["--clang", "--gcc"]), Selection { gcc: true, clang: true });
    }

    #[test]
    fn test_repeated_flags_accepted() {
        assert_eq!(parse(&["--gcc", "--gcc"]), Selection { gcc: true, clang: false });
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["toolchain-sweep", "--llvm"]).is_err());
    }
}
