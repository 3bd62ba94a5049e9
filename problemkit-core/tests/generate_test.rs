use std::{fs, path::Path, time::Duration};

use problemkit_core::{
    compiler::CompilerCache,
    generate::{self, seed::seed},
    package::Problem,
    settings::Settings,
};
use tempfile::TempDir;

const GEN_SH: &str = "echo \"$1\"\necho \"$2\"\n";
const DOUBLE_SH: &str = "read n\nread s\necho $((n * 2))\n";
/// Accepts inputs whose first line is at most 5.
const SMALL_ONLY_SH: &str = "read n\n[ \"$n\" -le 5 ] && exit 42\nexit 43\n";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn problem_dir(gen_yaml: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "generators/gen.yaml", gen_yaml);
    write(dir.path(), "generators/gen.sh", GEN_SH);
    write(dir.path(), "submissions/accepted/double.sh", DOUBLE_SH);
    dir
}

fn settings() -> Settings {
    Settings {
        jobs: 2,
        ..Default::default()
    }
}

fn cache() -> (TempDir, CompilerCache) {
    let build_dir = tempfile::tempdir().unwrap();
    let cache = CompilerCache::new(build_dir.path().to_path_buf());
    (build_dir, cache)
}

#[test]
fn test_generate_inputs_and_answers() {
    init();
    let dir = problem_dir(
        r#"
data:
  secret:
    type: directory
    data:
      small: gen.sh 3 $SEED
      other: gen.sh 4 $SEED
"#,
    );
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    assert!(generate::generate(&problem, &settings(), &cache).unwrap());

    let expected_seed = seed("gen.sh 3 $SEED", "", 0);
    assert_eq!(
        read(&problem.path, "data/secret/small.in"),
        format!("3\n{}\n", expected_seed)
    );
    assert_eq!(read(&problem.path, "data/secret/small.ans"), "6\n");
    assert_eq!(read(&problem.path, "data/secret/other.ans"), "8\n");

    // A second run reproduces the same files.
    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(
        read(&problem.path, "data/secret/small.in"),
        format!("3\n{}\n", expected_seed)
    );
}

#[test]
fn test_rejected_input_is_not_published() {
    init();
    let dir = problem_dir(
        r#"
data:
  secret:
    type: directory
    data:
      small: gen.sh 3 $SEED
      big: gen.sh 7 $SEED
"#,
    );
    write(dir.path(), "input_validators/small_only.sh", SMALL_ONLY_SH);
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    assert!(!generate::generate(&problem, &settings(), &cache).unwrap());
    assert!(problem.path.join("data/secret/small.in").is_file());
    assert!(problem.path.join("data/secret/small.ans").is_file());
    assert!(!problem.path.join("data/secret/big.in").exists());
    assert!(!problem.path.join("data/secret/big.ans").exists());
}

#[test]
fn test_changed_testcase_needs_force() {
    init();
    let dir = problem_dir("data:\n  secret:\n    type: directory\n    data:\n      a: gen.sh 1 x\n");
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();
    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(read(&problem.path, "data/secret/a.in"), "1\nx\n");

    write(
        &problem.path,
        "generators/gen.yaml",
        "data:\n  secret:\n    type: directory\n    data:\n      a: gen.sh 2 x\n",
    );
    assert!(!generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(read(&problem.path, "data/secret/a.in"), "1\nx\n");

    let forced = Settings {
        force: true,
        ..settings()
    };
    assert!(generate::generate(&problem, &forced, &cache).unwrap());
    assert_eq!(read(&problem.path, "data/secret/a.in"), "2\nx\n");
    assert_eq!(read(&problem.path, "data/secret/a.ans"), "4\n");
}

#[test]
fn test_failing_generator_is_retried() {
    init();
    // Fails unless the seed of the current attempt is odd.
    let dir = problem_dir(
        "retries: 10\ndata:\n  secret:\n    type: directory\n    data:\n      a: flaky.sh $SEED\n",
    );
    write(
        dir.path(),
        "generators/flaky.sh",
        "[ $(($1 % 2)) -eq 1 ] || exit 1\necho 1\necho \"$1\"\n",
    );
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    let content = read(&problem.path, "data/secret/a.in");
    let used: u32 = content.lines().nth(1).unwrap().parse().unwrap();
    let first_odd = (0..10)
        .map(|retry| seed("flaky.sh $SEED", "", retry))
        .find(|seed| seed % 2 == 1)
        .unwrap();
    assert_eq!(used, first_odd);
}

#[test]
fn test_include_and_clean() {
    init();
    let dir = problem_dir(
        r#"
data:
  secret:
    type: directory
    data:
      group1:
        type: directory
        data:
          a: gen.sh 1 $SEED
      group2:
        type: directory
        include:
          - secret/group1
        data:
          b: gen.sh 2 $SEED
"#,
    );
    write(dir.path(), "data/secret/handmade.in", "5\n");
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(
        read(&problem.path, "data/secret/group2/a.in"),
        read(&problem.path, "data/secret/group1/a.in")
    );
    assert!(problem.path.join("data/secret/group2/a.ans").is_file());

    assert!(generate::clean(&problem).unwrap());
    assert!(!problem.path.join("data/secret/group1").exists());
    assert!(!problem.path.join("data/secret/group2").exists());
    assert!(problem.path.join("data/secret/handmade.in").is_file());
}

#[test]
fn test_generate_answers_keeps_equivalent_answers() {
    init();
    let dir = problem_dir("data: {}\n");
    write(dir.path(), "data/secret/1.in", "3\n0\n");
    write(dir.path(), "data/secret/1.ans", "  6\n");
    write(dir.path(), "data/secret/2.in", "4\n0\n");
    write(dir.path(), "data/secret/2.ans", "9\n");
    write(dir.path(), "data/secret/3.in", "5\n0\n");
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    let stats = generate::generate_answers(&problem, &settings(), &cache).unwrap();
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.new, 1);
    assert_eq!(read(&problem.path, "data/secret/1.ans"), "  6\n");
    assert_eq!(read(&problem.path, "data/secret/2.ans"), "9\n");
    assert_eq!(read(&problem.path, "data/secret/3.ans"), "10\n");

    let forced = Settings {
        force: true,
        ..settings()
    };
    let stats = generate::generate_answers(&problem, &forced, &cache).unwrap();
    assert_eq!(stats.changed, 1);
    assert_eq!(read(&problem.path, "data/secret/2.ans"), "8\n");
}

#[test]
fn test_samples_need_force_and_samples() {
    init();
    let gen_yaml = |n: u32| {
        format!(
            "data:\n  sample:\n    type: directory\n    data:\n      s: gen.sh {} x\n",
            n
        )
    };
    let dir = problem_dir(&gen_yaml(1));
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();
    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(read(&problem.path, "data/sample/s.in"), "1\nx\n");

    write(&problem.path, "generators/gen.yaml", &gen_yaml(2));
    let forced = Settings {
        force: true,
        ..settings()
    };
    assert!(!generate::generate(&problem, &forced, &cache).unwrap());
    assert_eq!(read(&problem.path, "data/sample/s.in"), "1\nx\n");
    assert_eq!(read(&problem.path, "data/sample/s.ans"), "2\n");

    let with_samples = Settings {
        samples: true,
        ..forced
    };
    assert!(generate::generate(&problem, &with_samples, &cache).unwrap());
    assert_eq!(read(&problem.path, "data/sample/s.in"), "2\nx\n");
    assert_eq!(read(&problem.path, "data/sample/s.ans"), "4\n");
}

#[test]
fn test_generator_timeout_is_a_failed_attempt() {
    init();
    // Hangs on its first run only; the marker lives next to the script.
    let slow_sh = "marker=\"$0.ran\"\nif [ ! -e \"$marker\" ]; then touch \"$marker\"; sleep 10; fi\necho 1\necho \"$1\"\n";
    let dir = problem_dir(
        r#"
retries: 2
data:
  secret:
    type: directory
    data:
      a: slow.sh $SEED
"#,
    );
    write(dir.path(), "generators/slow.sh", slow_sh);
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();
    let settings = Settings {
        generator_timeout: Duration::from_millis(500),
        ..settings()
    };

    assert!(generate::generate(&problem, &settings, &cache).unwrap());
    assert!(problem.path.join("generators/slow.sh.ran").is_file());
    assert_eq!(
        read(&problem.path, "data/secret/a.in"),
        format!("1\n{}\n", seed("slow.sh $SEED", "", 1))
    );
}

#[test]
fn test_generator_timeout_without_retries_fails() {
    init();
    let dir = problem_dir("data:\n  secret:\n    type: directory\n    data:\n      a: hang.sh\n");
    write(dir.path(), "generators/hang.sh", "sleep 10\necho 1\n");
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();
    let settings = Settings {
        generator_timeout: Duration::from_millis(300),
        ..settings()
    };

    assert!(!generate::generate(&problem, &settings, &cache).unwrap());
    assert!(!problem.path.join("data/secret/a.in").exists());
}

#[test]
fn test_manual_testcases_testdata_yaml_and_visualizer() {
    init();
    let dir = problem_dir(
        r#"
visualizer: /visualizers/vis.sh
data:
  sample:
    type: directory
    testdata.yaml:
      on_reject: continue
    data:
      "1": hand.in
  secret:
    type: directory
    data:
      a: gen.sh 2 x
"#,
    );
    write(dir.path(), "generators/hand.in", "4\n0\n");
    write(dir.path(), "generators/hand.ans", "8\n");
    write(dir.path(), "visualizers/vis.sh", "cat \"$2\" > \"${1%.in}.vis\"\n");
    let problem = Problem::new(dir.path()).unwrap();
    let (_build_dir, cache) = cache();

    assert!(generate::generate(&problem, &settings(), &cache).unwrap());
    assert_eq!(read(&problem.path, "data/sample/1.in"), "4\n0\n");
    assert_eq!(read(&problem.path, "data/sample/1.ans"), "8\n");
    // The sources stay where they are.
    assert!(problem.path.join("generators/hand.in").is_file());
    assert!(read(&problem.path, "data/sample/testdata.yaml").contains("on_reject: continue"));
    assert_eq!(read(&problem.path, "data/sample/1.vis"), "8\n");
    assert_eq!(read(&problem.path, "data/secret/a.vis"), "4\n");
}
