use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_MODULE: &str = r#"{
    "name": "admin-panel",
    "request": {"method": "GET", "path": "/admin"},
    "response": {"matches": [{"type": "status", "code": 200}]}
}"#;

fn module_dir(modules: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("modules")).unwrap();
    for (name, content) in modules {
        fs::write(dir.path().join("modules").join(name), content).unwrap();
    }
    dir
}

/// Dry run lists every module against every non-blank stdin line.
#[test]
fn test_dry_run_lists_pairs() {
    let dir = module_dir(&[("admin.json", ADMIN_MODULE)]);

    cargo_bin_cmd!("ugly-duckling")
        .current_dir(dir.path())
        .arg("--dry-run")
        .write_stdin("http://target1.com\n\n  http://target2.com  \n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[DRY RUN] Would run admin-panel against http://target1.com",
        ))
        .stdout(predicate::str::contains(
            "[DRY RUN] Would run admin-panel against http://target2.com",
        ));
}

/// Explicit module paths bypass the modules/ directory.
#[test]
fn test_explicit_module_path() {
    let dir = TempDir::new().unwrap();
    let module = dir.path().join("custom.json");
    fs::write(&module, ADMIN_MODULE).unwrap();

    cargo_bin_cmd!("ugly-duckling")
        .args(&["--dry-run", module.to_str().unwrap()])
        .write_stdin("http://example.com\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("admin-panel against http://example.com"));
}

/// Invalid modules are skipped; with none left the run fails.
#[test]
fn test_no_valid_modules_fails() {
    let dir = module_dir(&[("bad.json", r#"{"request": {"path": "/"}}"#)]);

    cargo_bin_cmd!("ugly-duckling")
        .current_dir(dir.path())
        .write_stdin("http://example.com\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one match"))
        .stderr(predicate::str::contains("no modules loaded"));
}

/// A hit is printed as `finding: <message>`, a miss prints nothing.
#[tokio::test]
async fn test_reports_hits_only() {
    let hit = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&hit)
        .await;

    let miss = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&miss)
        .await;

    let dir = module_dir(&[("admin.json", ADMIN_MODULE)]);

    cargo_bin_cmd!("ugly-duckling")
        .current_dir(dir.path())
        .args(&["-c", "4"])
        .write_stdin(format!("{}\n{}\n", hit.uri(), miss.uri()))
        .assert()
        .success()
        .stdout(predicate::str::contains("finding: "))
        .stdout(predicate::str::contains(format!("{}/admin (1 matches)", hit.uri())))
        .stdout(predicate::str::contains(miss.uri()).not());
}

/// Unreachable targets are not fatal.
#[test]
fn test_unreachable_target_is_not_fatal() {
    let dir = module_dir(&[("admin.json", ADMIN_MODULE)]);

    cargo_bin_cmd!("ugly-duckling")
        .current_dir(dir.path())
        .args(&["--timeout", "2"])
        .write_stdin("http://127.0.0.1:1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("finding:").not());
}

/// A line that is not valid UTF-8 is scanned like any other and does not
/// stop the targets after it.
#[tokio::test]
async fn test_non_utf8_stdin_line_is_skipped_over() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = module_dir(&[("admin.json", ADMIN_MODULE)]);
    let mut stdin = b"garbage\xff\n".to_vec();
    stdin.extend_from_slice(format!("{}\n", server.uri()).as_bytes());

    cargo_bin_cmd!("ugly-duckling")
        .current_dir(dir.path())
        .write_stdin(stdin)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{}/admin (1 matches)", server.uri())));
}
