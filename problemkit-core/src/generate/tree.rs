use std::{
    collections::{BTreeSet, HashMap},
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde_derive::Serialize;
use serde_yaml::{Mapping, Value};

use super::seed;
use crate::error::SpecError;

pub const GEN_YAML: &str = "generators/gen.yaml";
pub const DEFAULT_RETRIES: u32 = 1;

/// Options a node inherits from its parent unless it overrides them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub solution: Option<String>,
    pub visualizer: Option<String>,
    pub random_salt: String,
}

impl Config {
    /// `parent` with the keys present in `yaml` replaced. An explicit null
    /// clears the inherited value.
    fn inherit(parent: &Config, yaml: &Mapping, path: &str) -> Result<Config, SpecError> {
        let mut config = parent.clone();
        if let Some(value) = yaml.get("solution") {
            config.solution = scalar_string(value, path, "solution")?;
        }
        if let Some(value) = yaml.get("visualizer") {
            config.visualizer = scalar_string(value, path, "visualizer")?;
        }
        if let Some(value) = yaml.get("random_salt") {
            config.random_salt = scalar_string(value, path, "random_salt")?.unwrap_or_default();
        }
        Ok(config)
    }
}

/// One generator call: `<generator> <arguments...>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// The invocation as written, which is what the seed is derived from.
    pub command: String,
    pub generator: String,
    pub arguments: Vec<String>,
    salt: String,
}

impl Invocation {
    fn parse(command: &str, config: &Config, path: &str) -> Result<Self, SpecError> {
        let mut words = split_words(command).map_err(|msg| SpecError::Invalid {
            path: path.to_owned(),
            msg,
        })?;
        if words.is_empty() {
            return Err(SpecError::Invalid {
                path: path.to_owned(),
                msg: "empty generator invocation".to_owned(),
            });
        }
        let generator = words.remove(0);
        if generator.starts_with('/') {
            return Err(SpecError::AbsoluteGenerator {
                path: path.to_owned(),
                generator,
            });
        }
        Ok(Self {
            command: command.to_owned(),
            generator,
            arguments: words,
            salt: config.random_salt.clone(),
        })
    }

    pub fn seed(&self, retry: u32) -> u32 {
        seed::seed(&self.command, &self.salt, retry)
    }

    /// Arguments with `$SEED`/`{seed}` and `{name}` filled in.
    pub fn arguments_for(&self, retry: u32, name: &str) -> Vec<String> {
        let seed = self.seed(retry);
        self.arguments
            .iter()
            .map(|argument| seed::substitute_seed(argument, seed).replace("{name}", name))
            .collect()
    }
}

/// Testcase whose files are written by hand.
#[derive(Debug, Clone, Serialize)]
pub struct ManualTestcase {
    pub name: String,
    pub path: PathBuf,
    pub config: Config,
    /// Source file under `generators/`. `None` when the files are placed in
    /// `data/` directly.
    pub input: Option<String>,
}

/// Testcase produced by a chain of generator invocations, each one reading
/// the previous one's stdout.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedTestcase {
    pub name: String,
    pub path: PathBuf,
    pub config: Config,
    pub chain: Vec<Invocation>,
}

impl GeneratedTestcase {
    pub fn seed(&self) -> u32 {
        self.chain.first().map(|invocation| invocation.seed(0)).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Directory {
    pub name: String,
    pub path: PathBuf,
    pub config: Config,
    pub numbered: bool,
    /// Root-relative paths of directories whose testcases are reused here.
    pub include: Vec<PathBuf>,
    pub testdata_yaml: Option<Value>,
    pub data: Vec<Node>,
}

impl Directory {
    fn walk<'a>(&'a self, nodes: &mut Vec<&'a Node>) {
        for node in self.data.iter() {
            nodes.push(node);
            if let Node::Directory(directory) = node {
                directory.walk(nodes);
            }
        }
    }

    /// Root-relative paths of every testcase below this directory.
    pub fn testcase_paths(&self) -> Vec<PathBuf> {
        let mut nodes = vec![];
        self.walk(&mut nodes);
        nodes
            .into_iter()
            .filter(|node| !matches!(node, Node::Directory(_)))
            .map(|node| node.path().to_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Node {
    Manual(ManualTestcase),
    Generated(GeneratedTestcase),
    Directory(Directory),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Manual(testcase) => &testcase.name,
            Node::Generated(testcase) => &testcase.name,
            Node::Directory(directory) => &directory.name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Node::Manual(testcase) => &testcase.path,
            Node::Generated(testcase) => &testcase.path,
            Node::Directory(directory) => &directory.path,
        }
    }

    pub fn config(&self) -> &Config {
        match self {
            Node::Manual(testcase) => &testcase.config,
            Node::Generated(testcase) => &testcase.config,
            Node::Directory(directory) => &directory.config,
        }
    }
}

/// Parsed `gen.yaml`.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorConfig {
    pub root_dir: Directory,
    /// `None` leaves the decision to the validation mode.
    pub generate_ans: Option<bool>,
    pub submission: Option<String>,
    pub retries: u32,
    pub generators_used: BTreeSet<String>,
    pub solutions_used: BTreeSet<String>,
    pub visualizers_used: BTreeSet<String>,
    pub num_testcases: usize,
}

impl GeneratorConfig {
    /// Read `generators/gen.yaml` of `problem_dir`.
    pub fn load(problem_dir: &Path) -> Result<Self, SpecError> {
        let yaml_path = problem_dir.join(GEN_YAML);
        if !yaml_path.is_file() {
            return Err(SpecError::NotFound(yaml_path));
        }
        let content = fs::read_to_string(&yaml_path).map_err(|e| SpecError::Invalid {
            path: yaml_path.to_string_lossy().into_owned(),
            msg: e.to_string(),
        })?;
        let yaml: Value = serde_yaml::from_str(&content)?;
        Self::parse(&yaml)
    }

    pub fn parse(yaml: &Value) -> Result<Self, SpecError> {
        let empty = Mapping::new();
        let root = match yaml {
            Value::Null => &empty,
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(SpecError::Invalid {
                    path: String::new(),
                    msg: "gen.yaml must be a mapping".to_owned(),
                })
            }
        };

        let generate_ans = match root.get("generate_ans") {
            None | Some(Value::Null) => None,
            Some(value) => Some(scalar_bool(value, "generate_ans")?),
        };
        let submission = match root.get("submission") {
            Some(value) => scalar_string(value, "", "submission")?.filter(|s| !s.is_empty()),
            None => None,
        };
        let retries = match root.get("retries") {
            None | Some(Value::Null) => DEFAULT_RETRIES,
            Some(value) => scalar_u32(value, "retries")?.max(1),
        };

        let mut ctx = ParseContext::default();
        let root_dir = ctx.parse_directory(String::new(), PathBuf::new(), root, &Config::default(), false)?;
        log::debug!(
            "parsed gen.yaml: {} testcases, generators {:?}",
            ctx.num_testcases,
            ctx.generators_used
        );

        Ok(Self {
            root_dir,
            generate_ans,
            submission,
            retries,
            generators_used: ctx.generators_used,
            solutions_used: ctx.solutions_used,
            visualizers_used: ctx.visualizers_used,
            num_testcases: ctx.num_testcases,
        })
    }

    /// Every node below the root, parents before children.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes = vec![];
        self.root_dir.walk(&mut nodes);
        nodes
    }

    pub fn generated_testcases(&self) -> Vec<&GeneratedTestcase> {
        self.nodes()
            .into_iter()
            .filter_map(|node| match node {
                Node::Generated(testcase) => Some(testcase),
                _ => None,
            })
            .collect()
    }

    pub fn manual_testcases(&self) -> Vec<&ManualTestcase> {
        self.nodes()
            .into_iter()
            .filter_map(|node| match node {
                Node::Manual(testcase) => Some(testcase),
                _ => None,
            })
            .collect()
    }

    /// The root followed by every directory, parents before children.
    pub fn directories(&self) -> Vec<&Directory> {
        let mut directories = vec![&self.root_dir];
        directories.extend(self.nodes().into_iter().filter_map(|node| match node {
            Node::Directory(directory) => Some(directory),
            _ => None,
        }));
        directories
    }

    pub fn directory(&self, path: &Path) -> Option<&Directory> {
        self.directories()
            .into_iter()
            .find(|directory| directory.path == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Testcase,
    Directory,
}

/// State threaded through one parse.
#[derive(Debug)]
struct ParseContext {
    /// Shared by all numbered directories, so numbers are unique in the tree.
    next_number: usize,
    paths: HashMap<PathBuf, NodeKind>,
    generators_used: BTreeSet<String>,
    solutions_used: BTreeSet<String>,
    visualizers_used: BTreeSet<String>,
    num_testcases: usize,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            next_number: 1,
            paths: HashMap::new(),
            generators_used: BTreeSet::new(),
            solutions_used: BTreeSet::new(),
            visualizers_used: BTreeSet::new(),
            num_testcases: 0,
        }
    }
}

impl ParseContext {
    fn register(&mut self, path: &Path, kind: NodeKind) -> Result<(), SpecError> {
        if self.paths.insert(path.to_owned(), kind).is_some() {
            return Err(SpecError::DuplicatePath(display(path)));
        }
        Ok(())
    }

    fn parse_node(
        &mut self,
        name: String,
        yaml: &Value,
        parent: &Directory,
    ) -> Result<Node, SpecError> {
        let path = parent.path.join(&name);
        if is_testcase(yaml) {
            self.register(&path, NodeKind::Testcase)?;
            let node = parse_testcase(name, path, yaml, &parent.config)?;
            self.num_testcases += 1;
            if let Node::Generated(testcase) = &node {
                for invocation in testcase.chain.iter() {
                    self.generators_used.insert(invocation.generator.clone());
                }
            }
            let config = node.config();
            if let Some(solution) = &config.solution {
                self.solutions_used.insert(solution.clone());
            }
            if let Some(visualizer) = &config.visualizer {
                self.visualizers_used.insert(visualizer.clone());
            }
            return Ok(node);
        }
        if let (true, Value::Mapping(mapping)) = (is_directory(yaml), yaml) {
            let directory =
                self.parse_directory(name, path, mapping, &parent.config, parent.numbered)?;
            return Ok(Node::Directory(directory));
        }
        Err(SpecError::UnknownShape { path: display(&path) })
    }

    fn parse_directory(
        &mut self,
        name: String,
        path: PathBuf,
        yaml: &Mapping,
        parent_config: &Config,
        parent_numbered: bool,
    ) -> Result<Directory, SpecError> {
        let shown = display(&path);
        self.register(&path, NodeKind::Directory)?;

        let include = match yaml.get("include") {
            None | Some(Value::Null) => vec![],
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| self.resolve_include(&path, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(item) => vec![self.resolve_include(&path, item)?],
        };

        let mut directory = Directory {
            name,
            config: Config::inherit(parent_config, yaml, &shown)?,
            path,
            numbered: false,
            include,
            testdata_yaml: yaml.get("testdata.yaml").cloned(),
            data: vec![],
        };

        match yaml.get("data") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(children)) => {
                if !children.is_empty() && parent_numbered {
                    return Err(SpecError::MixedNumbering { path: shown });
                }
                for (child_name, child_yaml) in sorted_children(children, &shown)? {
                    let child = self.parse_node(child_name, child_yaml, &directory)?;
                    directory.data.push(child);
                }
            }
            Some(Value::Sequence(items)) => {
                directory.numbered = !items.is_empty();
                for item in items {
                    let entry = match item {
                        Value::Mapping(entry) => entry,
                        _ => return Err(SpecError::MixedNumbering { path: shown }),
                    };
                    let prefix = format!("{}-", self.next_number);
                    self.next_number += 1;
                    for (child_name, child_yaml) in sorted_children(entry, &shown)? {
                        let child =
                            self.parse_node(format!("{}{}", prefix, child_name), child_yaml, &directory)?;
                        directory.data.push(child);
                    }
                }
            }
            Some(_) => {
                return Err(SpecError::Invalid {
                    path: shown,
                    msg: "data must be a mapping or a list".to_owned(),
                })
            }
        }
        Ok(directory)
    }

    fn resolve_include(&self, path: &Path, item: &Value) -> Result<PathBuf, SpecError> {
        let include = scalar_string(item, &display(path), "include")?.unwrap_or_default();
        let include_path = PathBuf::from(include.trim_matches('/'));
        if self.paths.get(&include_path) != Some(&NodeKind::Directory) || path.starts_with(&include_path) {
            return Err(SpecError::UnknownInclude {
                path: display(path),
                include,
            });
        }
        Ok(include_path)
    }
}

fn parse_testcase(
    name: String,
    path: PathBuf,
    yaml: &Value,
    parent_config: &Config,
) -> Result<Node, SpecError> {
    let shown = display(&path);
    let (config, input) = match yaml {
        Value::Mapping(mapping) => (
            Config::inherit(parent_config, mapping, &shown)?,
            mapping.get("input").cloned().unwrap_or(Value::Null),
        ),
        other => (parent_config.clone(), other.clone()),
    };

    let invalid = |msg: &str| SpecError::Invalid {
        path: shown.clone(),
        msg: msg.to_owned(),
    };
    let node = match as_text(input) {
        Value::Null => Node::Manual(ManualTestcase {
            name,
            path,
            config,
            input: None,
        }),
        Value::String(input) if input.trim().is_empty() => Node::Manual(ManualTestcase {
            name,
            path,
            config,
            input: None,
        }),
        Value::String(input) if input.ends_with(".in") => {
            if input.starts_with('/') {
                return Err(invalid("manual testcase must not be an absolute path"));
            }
            Node::Manual(ManualTestcase {
                name,
                path,
                config,
                input: Some(input),
            })
        }
        Value::String(input) => Node::Generated(GeneratedTestcase {
            chain: vec![Invocation::parse(&input, &config, &shown)?],
            name,
            path,
            config,
        }),
        Value::Sequence(items) => {
            if items.is_empty() {
                return Err(invalid("empty generator chain"));
            }
            let mut chain = vec![];
            for item in items {
                match as_text(item) {
                    Value::String(command) => chain.push(Invocation::parse(&command, &config, &shown)?),
                    _ => return Err(invalid("generator chain entries must be strings")),
                }
            }
            Node::Generated(GeneratedTestcase {
                name,
                path,
                config,
                chain,
            })
        }
        _ => return Err(invalid("input must be a string, a list or empty")),
    };
    Ok(node)
}

/// Numbers and booleans read as the text they were written as.
fn as_text(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other,
    }
}

fn is_testcase(yaml: &Value) -> bool {
    match yaml {
        Value::Null | Value::String(_) | Value::Number(_) | Value::Bool(_) => true,
        Value::Mapping(mapping) => mapping.contains_key("input"),
        _ => false,
    }
}

fn is_directory(yaml: &Value) -> bool {
    match yaml {
        Value::Mapping(mapping) => mapping.get("type").and_then(Value::as_str) == Some("directory"),
        _ => false,
    }
}

/// Children of a mapping, keys stringified and sorted.
fn sorted_children<'a>(
    mapping: &'a Mapping,
    path: &str,
) -> Result<Vec<(String, &'a Value)>, SpecError> {
    let mut children = vec![];
    for (key, value) in mapping.iter() {
        let name = match key {
            Value::String(name) => name.clone(),
            Value::Number(number) => number.to_string(),
            _ => {
                return Err(SpecError::Invalid {
                    path: path.to_owned(),
                    msg: format!("invalid name {:?}", key),
                })
            }
        };
        children.push((name, value));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

fn scalar_string(value: &Value, path: &str, key: &str) -> Result<Option<String>, SpecError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(SpecError::Invalid {
            path: path.to_owned(),
            msg: format!("{} must be a scalar", key),
        }),
    }
}

fn scalar_bool(value: &Value, key: &str) -> Result<bool, SpecError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(SpecError::Invalid {
            path: String::new(),
            msg: format!("{} must be a boolean", key),
        }),
    }
}

fn scalar_u32(value: &Value, key: &str) -> Result<u32, SpecError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SpecError::Invalid {
        path: String::new(),
        msg: format!("{} must be a non-negative integer", key),
    })
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `data/<path>.<extension>` below `data_dir`.
pub fn data_file(data_dir: &Path, path: &Path, extension: &str) -> PathBuf {
    let mut file: OsString = data_dir.join(path).into_os_string();
    file.push(".");
    file.push(extension);
    PathBuf::from(file)
}

/// Split a command line into words the way a POSIX shell would, without
/// any expansion.
pub fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err("unterminated single quote".to_owned()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err("unterminated double quote".to_owned()),
                        },
                        Some(c) => current.push(c),
                        None => return Err("unterminated double quote".to_owned()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => return Err("trailing backslash".to_owned()),
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
pub mod tree_tests {
    use super::*;

    fn parse(yaml: &str) -> Result<GeneratorConfig, SpecError> {
        GeneratorConfig::parse(&serde_yaml::from_str(yaml).unwrap())
    }

    fn names(directory: &Directory) -> Vec<&str> {
        directory.data.iter().map(|node| node.name()).collect()
    }

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("gen.py 1 'two words' \"a \\\"b\\\"\" c\\ d").unwrap(),
            vec!["gen.py", "1", "two words", "a \"b\"", "c d"]
        );
        assert_eq!(split_words("  ").unwrap(), Vec::<String>::new());
        assert!(split_words("gen 'open").is_err());
    }

    #[test]
    fn test_parse_recognizes_shapes() {
        let config = parse(
            r#"
solution: /submissions/accepted/sol.py
data:
  sample:
    type: directory
    data:
      "1": ""
      "2": sample2.in
  secret:
    type: directory
    data:
      small: gen.py 10 $SEED
      chained:
        input: ["gen.py 5", "shuffle.py {seed}"]
"#,
        )
        .unwrap();

        assert_eq!(config.num_testcases, 4);
        assert_eq!(config.retries, DEFAULT_RETRIES);
        assert_eq!(config.generate_ans, None);
        assert_eq!(names(&config.root_dir), vec!["sample", "secret"]);

        let sample = config.directory(Path::new("sample")).unwrap();
        assert!(!sample.numbered);
        match &sample.data[0] {
            Node::Manual(testcase) => assert_eq!(testcase.input, None),
            other => panic!("{:?}", other),
        }
        match &sample.data[1] {
            Node::Manual(testcase) => assert_eq!(testcase.input.as_deref(), Some("sample2.in")),
            other => panic!("{:?}", other),
        }

        let generated = config.generated_testcases();
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[0].path, PathBuf::from("secret/chained"));
        assert_eq!(generated[0].chain.len(), 2);
        assert_eq!(generated[1].chain[0].generator, "gen.py");
        assert_eq!(generated[1].chain[0].arguments, vec!["10", "$SEED"]);
        assert_eq!(
            config.generators_used.iter().collect::<Vec<_>>(),
            vec!["gen.py", "shuffle.py"]
        );
        assert_eq!(config.solutions_used.len(), 1);
    }

    #[test]
    fn test_seed_substitution() {
        let config = parse("data:\n  a: gen 1 2 $SEED\n  b: gen 1 2 $SEED\n").unwrap();
        let generated = config.generated_testcases();
        let a = &generated[0].chain[0];
        let b = &generated[1].chain[0];
        assert_eq!(a.arguments_for(0, "a"), b.arguments_for(0, "b"));
        assert_eq!(generated[0].seed(), seed::seed("gen 1 2 $SEED", "", 0));
        assert_eq!(
            a.arguments_for(1, "a")[2],
            seed::seed("gen 1 2 $SEED", "", 1).to_string()
        );
    }

    #[test]
    fn test_config_inheritance() {
        let config = parse(
            r#"
solution: root.py
random_salt: abc
data:
  group:
    type: directory
    visualizer: vis.py
    data:
      inherit: gen.py
      override:
        input: gen.py 2
        solution: other.py
        random_salt: xyz
      cleared:
        input: gen.py 3
        visualizer: null
"#,
        )
        .unwrap();
        let group = config.directory(Path::new("group")).unwrap();
        assert_eq!(group.config.solution.as_deref(), Some("root.py"));

        let by_name = |name: &str| {
            group
                .data
                .iter()
                .find(|node| node.name() == name)
                .unwrap()
                .config()
                .clone()
        };
        let inherit = by_name("inherit");
        assert_eq!(inherit, group.config);
        assert_eq!(inherit.random_salt, "abc");

        let overridden = by_name("override");
        assert_eq!(overridden.solution.as_deref(), Some("other.py"));
        assert_eq!(overridden.visualizer.as_deref(), Some("vis.py"));
        assert_eq!(overridden.random_salt, "xyz");

        assert_eq!(by_name("cleared").visualizer, None);

        let generated = config.generated_testcases();
        let inherit = generated.iter().find(|t| t.name == "inherit").unwrap();
        assert_eq!(inherit.seed(), seed::seed("gen.py", "abc", 0));
    }

    #[test]
    fn test_numbering() {
        let config = parse(
            r#"
data:
  secret:
    type: directory
    data:
      - small: gen.py 1
      - large: gen.py 2
  extra:
    type: directory
    data:
      - tiny: gen.py 3
"#,
        )
        .unwrap();
        let secret = config.directory(Path::new("secret")).unwrap();
        assert!(secret.numbered);
        assert_eq!(names(secret), vec!["1-small", "2-large"]);
        // Numbers continue across directories in traversal order.
        let extra = config.directory(Path::new("extra")).unwrap();
        assert_eq!(names(extra), vec!["1-tiny"]);
    }

    #[test]
    fn test_integer_names() {
        let config = parse("data:\n  1: a.in\n  2: b.in\n").unwrap();
        assert_eq!(names(&config.root_dir), vec!["1", "2"]);
    }

    #[test]
    fn test_scalar_leaves_are_text() {
        let config = parse("data:\n  a: 17\n  b:\n    input: [gen.py, 5]\n").unwrap();
        let generated = config.generated_testcases();
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[0].chain[0].generator, "17");
        assert_eq!(generated[1].chain[1].generator, "5");
        assert!(config.generators_used.contains("17"));
    }

    #[test]
    fn test_duplicate_path() {
        match parse("data:\n  1: a.in\n  \"1\": b.in\n") {
            Err(SpecError::DuplicatePath(path)) => assert_eq!(path, "1"),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_reparse_is_stable() {
        let yaml = "data:\n  secret:\n    type: directory\n    data:\n      - a: gen 1\n      - b: gen 2\n";
        let first = parse(yaml).unwrap();
        let second = parse(yaml).unwrap();
        let paths = |config: &GeneratorConfig| {
            config
                .nodes()
                .iter()
                .map(|node| node.path().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(paths(&first), paths(&second));
    }

    #[test]
    fn test_mixed_numbering() {
        let result = parse(
            r#"
data:
  - group:
      type: directory
      data:
        a: gen.py 1
"#,
        );
        assert!(matches!(result, Err(SpecError::MixedNumbering { .. })));
        assert!(matches!(
            parse("data:\n  - plain string\n"),
            Err(SpecError::MixedNumbering { .. })
        ));
    }

    #[test]
    fn test_include() {
        let config = parse(
            r#"
data:
  a:
    type: directory
    data:
      x: gen.py 1
  b:
    type: directory
    include: [a]
    data:
      y: gen.py 2
"#,
        )
        .unwrap();
        let b = config.directory(Path::new("b")).unwrap();
        assert_eq!(b.include, vec![PathBuf::from("a")]);
        let a = config.directory(Path::new("a")).unwrap();
        assert_eq!(a.testcase_paths(), vec![PathBuf::from("a/x")]);

        // `b` is parsed after `a`, so `a` cannot see it yet.
        let result = parse(
            r#"
data:
  a:
    type: directory
    include: [b]
  b:
    type: directory
"#,
        );
        assert!(matches!(result, Err(SpecError::UnknownInclude { .. })));
    }

    #[test]
    fn test_include_of_testcase_or_ancestor() {
        let testcase = parse("data:\n  x: gen 1\n  y:\n    type: directory\n    include: [x]\n");
        assert!(matches!(testcase, Err(SpecError::UnknownInclude { .. })));
        let ancestor = parse(
            "data:\n  a:\n    type: directory\n    data:\n      b:\n        type: directory\n        include: [a]\n",
        );
        assert!(matches!(ancestor, Err(SpecError::UnknownInclude { .. })));
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            parse("data:\n  a:\n    foo: bar\n"),
            Err(SpecError::UnknownShape { .. })
        ));
        assert!(matches!(
            parse("data:\n  a: 17\n"),
            Err(SpecError::UnknownShape { .. })
        ));
        assert!(matches!(
            parse("data:\n  a: /usr/bin/gen 1\n"),
            Err(SpecError::AbsoluteGenerator { .. })
        ));
    }

    #[test]
    fn test_root_keys() {
        let config = parse("generate_ans: false\nsubmission: submissions/accepted/a.py\nretries: 0\n").unwrap();
        assert_eq!(config.generate_ans, Some(false));
        assert_eq!(config.submission.as_deref(), Some("submissions/accepted/a.py"));
        assert_eq!(config.retries, 1);
        assert_eq!(config.num_testcases, 0);

        let config = parse("retries: 5\n").unwrap();
        assert_eq!(config.retries, 5);
    }

    #[test]
    fn test_data_file() {
        assert_eq!(
            data_file(Path::new("/p/data"), Path::new("secret/1-a.b"), "in"),
            PathBuf::from("/p/data/secret/1-a.b.in")
        );
    }
}
