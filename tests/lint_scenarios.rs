//! Lint checks resolving names against an indexed project

mod common;

use common::{Project, MY_CLASS};
use phptags::lint::{FileLint, LintReport, LintResult};

fn lint(project: &Project, name: &str, source: &str) -> LintReport {
    let path = project.write(name, source);
    match project.linter().lint_file(&path).unwrap() {
        FileLint::Checked(report) => report,
        FileLint::Skipped { .. } => panic!("{} was skipped", name),
    }
}

#[test]
fn self_parent_and_static_are_never_unknown() {
    let project = Project::new();
    project.write("Util/MyClass.php", MY_CLASS);
    project.index();

    let report = lint(
        &project,
        "NextClass.php",
        r#"<?php
class NextClass extends \Util\MyClass
{
    public function __construct()
    {
        parent::__construct();
        $this->__construct();
        echo self::MISSING, parent::MAX, static::$nothing;
        parent::gone();
    }
}
"#,
    );
    assert_eq!(report.results, vec![]);
    assert!(!report.has_error());
}

#[test]
fn unknown_class_is_reported_once() {
    let project = Project::new();
    project.write("Util/MyClass.php", MY_CLASS);
    project.index();

    let report = lint(
        &project,
        "main.php",
        "<?php\n$known = new \\Util\\MyClass();\n$missing = new NoneClass();\n",
    );
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].status_code(), "UNKNOWN_CLASS");
    assert_eq!(report.results[0].identifier(), "NoneClass");
    assert_eq!(report.results[0].line(), 3);
}

#[test]
fn call_arity_against_indexed_signature() {
    let project = Project::new();
    project.write("helpers.php", "<?php\nfunction stamp(string $format, $timestamp = now()) {}\n");
    project.index();

    let report = lint(&project, "calls.php", "<?php\nstamp();\nstamp('Y');\nstamp('Y', 1, 2);\n");
    assert_eq!(report.results.len(), 2);
    assert_eq!(
        report.results[0],
        LintResult::ArgumentCount {
            mismatch: phptags::lint::ArityMismatch::TooFew,
            identifier: "stamp".into(),
            expected: 1,
            maximum: 2,
            actual: 0,
            line: 2,
            offset: report.results[0].offset(),
        }
    );
    assert_eq!(report.results[1].status_code(), "TOO_MANY_ARGS");
    assert!(matches!(
        report.results[1],
        LintResult::ArgumentCount { expected: 1, actual: 3, line: 4, .. }
    ));
}

#[test]
fn lint_walk_counts_files() {
    let project = Project::new();
    project.write("Util/MyClass.php", MY_CLASS);
    project.index();

    let clean = project.write("clean.php", "<?php\n$a = new \\Util\\MyClass();\n$a->work(2);\n");
    let broken = project.write("broken.php", "<?php\nfunction (\n");
    let unknown = project.write("unknown.php", "<?php\nundefined_helper();\n");
    let missing = project.src.join("missing.php");

    let summary = project.linter().lint_paths([&clean, &broken, &unknown, &missing]);
    assert_eq!(summary.with_errors, 2);
    assert_eq!(summary.with_no_errors, 1);
    assert_eq!(summary.with_skip, 1);

    let codes: Vec<&str> = summary
        .reports
        .iter()
        .flat_map(|r| r.results.iter().map(|x| x.status_code()))
        .collect();
    assert_eq!(codes, vec!["SYNTAX_ERROR", "UNKNOWN_FUNCTION"]);
}
