//! Restart address fixtures
//!
//! Each entry of fixtures/restart-names.yaml becomes one trial, so a single
//! wrong strip length shows up by name.

use anyhow::{Context, Result};
use explorer::translate;
use libtest_mimic::{Arguments, Failed, Trial};
use serde::Deserialize;

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/restart-names.yaml");

#[derive(Debug, Clone, Deserialize)]
struct Case {
    state: String,
    #[serde(default)]
    restart: Option<String>,
    #[serde(default)]
    error: bool,
}

fn main() -> Result<()> {
    let args = Arguments::from_args();
    let tests = discover_tests()?;
    libtest_mimic::run(&args, tests).exit();
}

fn discover_tests() -> Result<Vec<Trial>> {
    let text = std::fs::read_to_string(FIXTURES).context("Failed to read fixtures")?;
    let cases: Vec<Case> = serde_yaml::from_str(&text).context("Malformed fixtures")?;

    Ok(cases
        .into_iter()
        .enumerate()
        .map(|(index, case)| {
            let name = if case.state.is_empty() {
                format!("restart::{index}::<empty>")
            } else {
                format!("restart::{index}::{}", case.state)
            };
            Trial::test(name, move || run_test(&case))
        })
        .collect())
}

fn run_test(case: &Case) -> Result<(), Failed> {
    match run_test_impl(case) {
        Ok(()) => Ok(()),
        Err(e) => Err(format!("{:#}", e).into()),
    }
}

fn run_test_impl(case: &Case) -> Result<()> {
    match (translate(&case.state), &case.restart, case.error) {
        (Ok(actual), Some(expected), false) if &actual == expected => Ok(()),
        (Ok(actual), Some(expected), false) => {
            anyhow::bail!("expected `{}`, got `{}`", expected, actual)
        }
        (Err(_), None, true) => Ok(()),
        (Ok(actual), _, true) => anyhow::bail!("expected an error, got `{}`", actual),
        (Err(err), _, false) => Err(err).context("translation failed"),
        (_, None, false) | (Err(_), Some(_), true) => {
            anyhow::bail!("fixture must give exactly one of `restart` and `error`")
        }
    }
}
