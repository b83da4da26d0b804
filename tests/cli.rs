//! End-to-end runs of the `pagefit` binary

use std::process::Command;

fn pagefit(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pagefit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pagefit")
}

#[test]
fn snapshot_that_fits_exits_zero() {
    let out = pagefit(&["check", "--snapshot", "tests/fixtures/fits.json"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("fits on A4 page"));
}

#[test]
fn overflow_exits_two_with_message() {
    let out = pagefit(&["check", "--snapshot", "tests/fixtures/wide_panel.json"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("Element panel is too wide to fit on an A4 page, (800 pixels wide)"),
        "{stderr}"
    );
    assert_eq!(stderr.matches("is too wide").count(), 1, "{stderr}");
}

#[test]
fn flags_override_the_budget() {
    let out = pagefit(&[
        "check",
        "--snapshot",
        "--page-width",
        "1000",
        "tests/fixtures/wide_panel.json",
    ]);
    assert_eq!(out.status.code(), Some(0));

    let out = pagefit(&[
        "check",
        "--snapshot",
        "--avoid-break",
        "element",
        "tests/fixtures/avoid_break.json",
    ]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn operational_errors_exit_one() {
    let out = pagefit(&["check", "--snapshot", "tests/fixtures/does-not-exist.json"]);
    assert_eq!(out.status.code(), Some(1));

    let out = pagefit(&["check", "--snapshot", "--page-height", "0", "tests/fixtures/fits.json"]);
    assert_eq!(out.status.code(), Some(1));
}

#[cfg(feature = "html")]
#[test]
fn html_templates_are_rendered_and_checked() {
    let out = pagefit(&["check", "tests/fixtures/invoice.html"]);
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let out = pagefit(&["check", "tests/fixtures/wide_table.html"]);
    assert_eq!(out.status.code(), Some(2));
}

#[cfg(feature = "html")]
#[test]
fn measure_prints_a_checkable_snapshot() {
    let out = pagefit(&["measure", "tests/fixtures/wide_table.html"]);
    assert_eq!(out.status.code(), Some(0));
    let snapshot = pagefit::snapshot::MeasuredElement::from_json(&String::from_utf8_lossy(&out.stdout))
        .expect("measure output is a snapshot");
    assert_eq!(snapshot.tag, "body");
    assert!(pagefit::check_document(&snapshot).unwrap_err().is_overflow());
}
