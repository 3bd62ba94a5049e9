use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use serde_derive::{Deserialize, Serialize};

/// Outcome of a run, in increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RunTimeError,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::TimeLimitExceeded,
        Verdict::RunTimeError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::WrongAnswer => "WRONG_ANSWER",
            Self::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Self::RunTimeError => "RUN_TIME_ERROR",
        }
    }

    /// Name of the `submissions/` subdirectory holding submissions that
    /// should get this verdict.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::WrongAnswer => "wrong_answer",
            Self::TimeLimitExceeded => "time_limit_exceeded",
            Self::RunTimeError => "run_time_error",
        }
    }

    /// Whether lazy judging stops at this verdict.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TimeLimitExceeded | Self::RunTimeError)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verdict| verdict.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Verdict not found: {}", s))
    }
}

/// Answer of an output comparison: pass or fail plus the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorResult {
    pub passed: bool,
    pub remark: String,
}

impl ValidatorResult {
    pub fn accept(remark: impl Into<String>) -> Self {
        Self {
            passed: true,
            remark: remark.into(),
        }
    }

    pub fn reject(remark: impl Into<String>) -> Self {
        Self {
            passed: false,
            remark: remark.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestcaseOutcome {
    pub testcase: String,
    pub verdict: Verdict,
    pub duration: Duration,
    pub remark: String,
}

/// Per-verdict testcase counts of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCount(pub BTreeMap<Verdict, usize>);

impl VerdictCount {
    pub fn add(&mut self, verdict: Verdict) {
        *self.0.entry(verdict).or_insert(0) += 1;
    }

    pub fn get(&self, verdict: Verdict) -> usize {
        self.0.get(&verdict).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Most severe verdict seen. No testcases at all counts as accepted.
    pub fn overall(&self) -> Verdict {
        Verdict::ALL
            .into_iter()
            .rev()
            .find(|verdict| self.get(*verdict) > 0)
            .unwrap_or(Verdict::Accepted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub name: String,
    pub expected: Verdict,
    pub verdict: Verdict,
    pub counts: VerdictCount,
    /// In testcase order; testcases skipped by lazy judging are absent.
    pub outcomes: Vec<TestcaseOutcome>,
    pub time_max: Duration,
    pub time_total: Duration,
    /// Set when the submission could not be built.
    pub build_error: Option<String>,
}

impl SubmissionReport {
    pub fn passed(&self) -> bool {
        self.build_error.is_none() && self.verdict == self.expected
    }

    pub fn outcome(&self, testcase: &str) -> Option<&TestcaseOutcome> {
        self.outcomes.iter().find(|outcome| outcome.testcase == testcase)
    }
}
