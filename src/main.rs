use std::{
    env,
    fs::File,
    io::{self, BufReader, Read},
    process::ExitCode,
};

use jsonpath_types::{checker, Query, ENV};
use serde_json::Value;

fn read_document(path: Option<&str>) -> io::Result<Value> {
    let document = match path {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?)),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            serde_json::from_str(&buf)
        }
    };
    document.map_err(io::Error::from)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(expr) = args.first() else {
        eprintln!("usage: jsonpath-types QUERY [FILE]");
        return ExitCode::from(2);
    };

    let query = Query::parse(expr);
    let mut diagnostics = query.diagnostics.clone();
    diagnostics.extend(checker::check(&query, &ENV));

    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }

    if diagnostics.iter().any(|d| d.is_error()) {
        return ExitCode::FAILURE;
    }

    let value = match read_document(args.get(1).map(String::as_str)) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("error reading document: {}", err);
            return ExitCode::FAILURE;
        }
    };

    for node in query.find(&value, &ENV) {
        println!("{}\t{}", node.normalized_path(), node.value);
    }

    ExitCode::SUCCESS
}
