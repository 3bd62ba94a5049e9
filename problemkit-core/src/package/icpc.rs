use std::path::Path;

use super::PackageAgent;
use crate::validate::ValidatorKind;

pub const SAMPLE_DIR: &str = "data/sample";
pub const SECRET_DIR: &str = "data/secret";
pub const BAD_DIR: &str = "data/bad";

/// Problem package in the problemarchive layout: `data/{sample,secret,bad}`,
/// `submissions/<outcome>/`, `{input,output}_validators/`.
pub struct ICPCPackageAgent;

impl PackageAgent for ICPCPackageAgent {
    fn validate(&self, package_path: &Path) -> bool {
        if !package_path.exists() || package_path.is_file() {
            return false;
        }
        package_path.join("data").is_dir()
            || package_path.join("generators").is_dir()
            || package_path.join("submissions").is_dir()
    }

    fn testcase_dirs(&self, only_sample: bool) -> Vec<&'static str> {
        if only_sample {
            vec![SAMPLE_DIR]
        } else {
            vec![SAMPLE_DIR, SECRET_DIR]
        }
    }

    fn validator_dirs(&self, kind: ValidatorKind) -> Vec<&'static str> {
        match kind {
            ValidatorKind::Input => vec!["input_validators", "input_format_validators"],
            ValidatorKind::Output => vec!["output_validators"],
        }
    }
}
