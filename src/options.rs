use std::{ffi::OsString, path::PathBuf};

use crate::{gc::HeapConfig, utils::env::read_uint_from_str};

pub const USAGE: &str = "\
Usage: botlisp [options] [file]
Options:
  -h, --help: Print this help message
  -e, --eval <expr>: Evaluate <expr> and print the result
  --gc-threshold <size>: Bytes allocated before the first collection (default: 1m)
  --gc-growth <factor>: Threshold growth factor after each collection (default: 2.0)
  --stats: Print heap statistics before exiting
Without a file or expression an interactive session is started.";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub heap: HeapConfig,
    pub help: bool,
    pub stats: bool,
    pub expr: Option<String>,
    pub filename: Option<PathBuf>,
}

impl Options {
    pub fn parse() -> Result<Self, String> {
        parse_from(std::env::args_os().skip(1).collect())
    }
}

/// Parses command line arguments. Heap settings start from the
/// `BOTLISP_GC_*` environment and are overridden by flags.
pub fn parse_from(args: Vec<OsString>) -> Result<Options, String> {
    let mut args = pico_args::Arguments::from_vec(args);
    let mut heap = HeapConfig::from_env();

    let help = args.contains(["-h", "--help"]);
    let stats = args.contains("--stats");

    match args.opt_value_from_str::<_, String>("--gc-threshold") {
        Ok(Some(size)) => {
            heap.initial_threshold = read_uint_from_str(&size)
                .ok_or_else(|| format!("invalid --gc-threshold '{}'", size))?;
        }
        Ok(None) => (),
        Err(e) => return Err(e.to_string()),
    }

    match args.opt_value_from_str::<_, f64>("--gc-growth") {
        Ok(Some(growth)) if growth >= 1.0 => heap.growth_factor = growth,
        Ok(Some(growth)) => return Err(format!("--gc-growth must be at least 1.0, got {}", growth)),
        Ok(None) => (),
        Err(e) => return Err(e.to_string()),
    }

    let expr = args
        .opt_value_from_str::<_, String>(["-e", "--eval"])
        .map_err(|e| e.to_string())?;

    let filename = args
        .opt_free_from_str::<PathBuf>()
        .map_err(|e| e.to_string())?;

    let rest = args.finish();
    if !rest.is_empty() {
        return Err(format!("unexpected arguments: {:?}", rest));
    }

    Ok(Options {
        heap,
        help,
        stats,
        expr,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        parse_from(args.iter().map(OsString::from).collect())
    }

    #[test]
    fn defaults() {
        let options = parse(&[]).unwrap();
        assert!(!options.help);
        assert!(!options.stats);
        assert_eq!(options.expr, None);
        assert_eq!(options.filename, None);
    }

    #[test]
    fn all_flags() {
        let options = parse(&[
            "--stats",
            "--gc-threshold",
            "64k",
            "--gc-growth",
            "1.5",
            "-e",
            "(+ 1 2)",
            "script.lisp",
        ])
        .unwrap();
        assert!(options.stats);
        assert_eq!(options.heap.initial_threshold, 64 * 1024);
        assert_eq!(options.heap.growth_factor, 1.5);
        assert_eq!(options.expr.as_deref(), Some("(+ 1 2)"));
        assert_eq!(options.filename, Some(PathBuf::from("script.lisp")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--gc-growth", "0.5"]).is_err());
        assert!(parse(&["--gc-threshold", "lots"]).is_err());
        assert!(parse(&["a.lisp", "b.lisp"]).is_err());
    }
}
