/// Turning source files into run commands, compiled once per process
pub mod compiler;
pub mod error;
/// Test data generation from `generators/gen.yaml`
pub mod generate;
/// Verdicts, output comparison and judging of submissions
pub mod judge;
/// Problem directory layout
pub mod package;
/// Running programs with redirection and timeouts
pub mod run;
pub mod settings;
pub mod utils;
/// Input and answer validation
pub mod validate;
