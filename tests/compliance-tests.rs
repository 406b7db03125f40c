use std::{
    env,
    error::Error,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use jsonpath_types::{find, Query};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct TestSuite {
    tests: Vec<Case>,
}

#[derive(Deserialize)]
struct Case {
    name: String,
    selector: String,

    #[serde(default)]
    document: Value,

    #[serde(default)]
    result: Vec<Value>,

    #[serde(default)]
    result_paths: Option<Vec<String>>,

    /// Every acceptable result, for queries whose output order isn't fixed.
    #[serde(default)]
    results: Option<Vec<Vec<Value>>>,

    #[serde(default)]
    invalid_selector: bool,
}

fn run_suite(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let test_suite: TestSuite = serde_json::from_reader(reader)?;

    for case in test_suite.tests {
        println!("{}", case.name);
        if case.invalid_selector {
            assert!(
                Query::standard(&case.selector).is_err(),
                "{} did not fail",
                case.name
            );
        } else {
            let rv = find(&case.selector, &case.document)?;
            let values: Vec<Value> = rv.iter().map(|n| n.value.clone()).collect();

            if let Some(results) = case.results {
                assert!(
                    results.contains(&values),
                    "{}: {}",
                    case.name,
                    case.selector
                );
                continue;
            }

            assert_eq!(values, case.result, "{}: {}", case.name, case.selector);

            if let Some(paths) = case.result_paths {
                let rv_paths: Vec<String> = rv.iter().map(|n| n.normalized_path()).collect();
                assert_eq!(rv_paths, paths, "{}: {}", case.name, case.selector);
            }
        }
    }

    Ok(())
}

#[test]
fn compliance() -> Result<(), Box<dyn Error>> {
    // Path is relative to the crate root.
    run_suite(Path::new("tests/cts/cts.json"))
}

/// The full jsonpath-compliance-test-suite, when checked out into `cts/`
/// (or wherever `JSONPATH_CTS` points).
#[test]
fn upstream_compliance() -> Result<(), Box<dyn Error>> {
    let path = env::var_os("JSONPATH_CTS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cts/cts.json"));

    if !path.exists() {
        eprintln!("skipping upstream compliance suite, {} not found", path.display());
        return Ok(());
    }

    run_suite(&path)
}

#[test]
fn invalid_queries_still_parse() -> Result<(), Box<dyn Error>> {
    let file = File::open("tests/cts/cts.json")?;
    let test_suite: TestSuite = serde_json::from_reader(BufReader::new(file))?;

    for case in test_suite.tests {
        let query = Query::parse(&case.selector);
        assert_eq!(query.to_source(), case.selector, "{}", case.name);
    }

    Ok(())
}
