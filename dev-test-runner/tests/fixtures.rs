use dev_test_runner::{discover, Fixture};

#[test]
fn json_fixtures() {
    let paths = discover(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/*.json")).unwrap();
    assert!(!paths.is_empty(), "no fixtures found");

    let mut failures = Vec::new();
    for path in &paths {
        let fixture = match Fixture::load(path) {
            Ok(fixture) => fixture,
            Err(err) => {
                failures.push(format!("{err}"));
                continue;
            }
        };
        match fixture.check() {
            Ok(mismatches) => {
                failures.extend(mismatches.into_iter().map(|m| format!("{}: {m}", path.display())));
            }
            Err(err) => failures.push(format!("{}: {err}", path.display())),
        }
    }
    assert!(failures.is_empty(), "{} fixture failure(s):\n{}", failures.len(), failures.join("\n"));
}
