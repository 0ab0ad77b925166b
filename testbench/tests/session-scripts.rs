//! Operator scripts runner
//!
//! Runs every testbench/scripts/*.explore file through the shell with the
//! built-in batch application and checks the `#>` / `#!` expectations.

use anyhow::Result;
use glob::glob;
use libtest_mimic::{Arguments, Failed, Trial};
use std::path::Path;
use testbench::run_script_file;

const SCRIPTS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scripts");

fn main() -> Result<()> {
    let args = Arguments::from_args();
    let tests = discover_tests()?;
    libtest_mimic::run(&args, tests).exit();
}

fn discover_tests() -> Result<Vec<Trial>> {
    let mut trials = Vec::new();
    for script_path in glob(&format!("{SCRIPTS_PATH}/*.explore"))? {
        let script_path = script_path?;
        let Some(test_name) = script_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_owned)
        else {
            continue;
        };
        trials.push(Trial::test(format!("script::{}", test_name), move || {
            run_test(&script_path)
        }));
    }
    Ok(trials)
}

fn run_test(script_path: &Path) -> Result<(), Failed> {
    match run_script_file(script_path) {
        Ok(()) => Ok(()),
        Err(e) => Err(format!("{:#}", e).into()),
    }
}
