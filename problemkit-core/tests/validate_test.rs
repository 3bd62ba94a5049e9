use std::{fs, path::Path};

use problemkit_core::{
    compiler::CompilerCache,
    package::Problem,
    settings::{Settings, ValidationMode},
    validate::{validate, ValidatorKind},
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_validate_inputs_and_answers() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "input_validators/positive.sh",
        "read n\n[ \"$n\" -gt 0 ] && exit 42\nexit 43\n",
    );
    write(
        root,
        "output_validators/even.sh",
        "read a\n[ $((a % 2)) -eq 0 ] && exit 42\nexit 43\n",
    );
    write(root, "data/sample/1.in", "3\n");
    write(root, "data/sample/1.ans", "6\n");
    write(root, "data/secret/2.in", "-1\n");
    write(root, "data/secret/2.ans", "-2\n");
    // Inputs are validated even without an answer.
    write(root, "data/secret/3.in", "0\n");

    let problem = Problem::new(root).unwrap();
    let build_dir = tempfile::tempdir().unwrap();
    let cache = CompilerCache::new(build_dir.path().to_path_buf());
    let settings = Settings::default();

    assert!(!validate(&problem, ValidatorKind::Input, &settings, &cache).unwrap());
    assert!(validate(&problem, ValidatorKind::Output, &settings, &cache).unwrap());

    fs::write(root.join("data/secret/2.in"), "1\n").unwrap();
    assert!(!validate(&problem, ValidatorKind::Input, &settings, &cache).unwrap());
    fs::write(root.join("data/secret/3.in"), "4\n").unwrap();
    assert!(validate(&problem, ValidatorKind::Input, &settings, &cache).unwrap());

    fs::write(root.join("data/sample/1.ans"), "7\n").unwrap();
    assert!(!validate(&problem, ValidatorKind::Output, &settings, &cache).unwrap());

    let interactive = Settings {
        validation: ValidationMode::CustomInteractive,
        ..Settings::default()
    };
    assert!(validate(&problem, ValidatorKind::Output, &interactive, &cache).unwrap());
}

#[test]
fn test_input_without_answer_is_validated() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "input_validators/positive.sh",
        "read n\n[ \"$n\" -gt 0 ] && exit 42\nexit 43\n",
    );
    write(dir.path(), "data/secret/bad.in", "-5\n");
    let problem = Problem::new(dir.path()).unwrap();
    let build_dir = tempfile::tempdir().unwrap();
    let cache = CompilerCache::new(build_dir.path().to_path_buf());

    assert!(!validate(&problem, ValidatorKind::Input, &Settings::default(), &cache).unwrap());
    // Answer validation only looks at testcases with an answer.
    assert!(validate(&problem, ValidatorKind::Output, &Settings::default(), &cache).unwrap());
}

#[test]
fn test_nothing_to_validate() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/secret/1.in", "1\n");
    write(dir.path(), "data/secret/1.ans", "2\n");
    let problem = Problem::new(dir.path()).unwrap();
    let build_dir = tempfile::tempdir().unwrap();
    let cache = CompilerCache::new(build_dir.path().to_path_buf());

    assert!(validate(&problem, ValidatorKind::Input, &Settings::default(), &cache).unwrap());
}

#[test]
fn test_unbuildable_validator_is_an_error() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "input_validators/broken.c", "not C at all\n");
    write(dir.path(), "data/secret/1.in", "1\n");
    write(dir.path(), "data/secret/1.ans", "2\n");
    let problem = Problem::new(dir.path()).unwrap();
    let build_dir = tempfile::tempdir().unwrap();
    let cache = CompilerCache::new(build_dir.path().to_path_buf());

    assert!(validate(&problem, ValidatorKind::Input, &Settings::default(), &cache).is_err());
}
