use std::{collections::HashMap, fmt};

use serde_derive::Serialize;

use super::{SubmissionReport, Verdict};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub testcase: String,
    /// One character per submission: `1` accepted, `0` rejected, `-` not run.
    pub profile: String,
    /// Shared by all testcases with a profile that occurs often enough.
    pub group: Option<usize>,
}

/// Per-testcase verdict profiles across a batch of submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerdictTable {
    pub rows: Vec<TableRow>,
}

impl VerdictTable {
    /// Profiles for `testcases` over `reports`, in report order.
    ///
    /// Group ids count up in testcase order, a profile getting its id when
    /// its `threshold`-th occurrence is seen.
    pub fn build(testcases: &[String], reports: &[SubmissionReport], threshold: usize) -> Self {
        let threshold = threshold.max(1);
        let profiles: Vec<String> = testcases
            .iter()
            .map(|testcase| {
                reports
                    .iter()
                    .map(|report| match report.outcome(testcase) {
                        Some(outcome) if outcome.verdict == Verdict::Accepted => '1',
                        Some(_) => '0',
                        None => '-',
                    })
                    .collect()
            })
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut groups: HashMap<&str, usize> = HashMap::new();
        for profile in profiles.iter() {
            let count = counts.entry(profile.as_str()).or_insert(0);
            *count += 1;
            if *count == threshold {
                let id = groups.len() + 1;
                groups.insert(profile.as_str(), id);
            }
        }

        let rows = testcases
            .iter()
            .zip(profiles.iter())
            .map(|(testcase, profile)| TableRow {
                testcase: testcase.clone(),
                profile: profile.clone(),
                group: groups.get(profile.as_str()).copied(),
            })
            .collect();
        Self { rows }
    }
}

impl fmt::Display for VerdictTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Verdict analysis table. Submissions are ordered as above.")?;
        for row in self.rows.iter() {
            write!(f, "{:<60}{}", row.testcase, row.profile)?;
            if let Some(group) = row.group {
                write!(f, "  (Type {})", group)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod table_tests {
    use super::*;
    use crate::judge::{TestcaseOutcome, VerdictCount};
    use std::time::Duration;

    fn report(verdicts: &[(&str, Verdict)]) -> SubmissionReport {
        let mut counts = VerdictCount::default();
        let outcomes = verdicts
            .iter()
            .map(|(testcase, verdict)| {
                counts.add(*verdict);
                TestcaseOutcome {
                    testcase: testcase.to_string(),
                    verdict: *verdict,
                    duration: Duration::ZERO,
                    remark: String::new(),
                }
            })
            .collect();
        SubmissionReport {
            name: "s".to_owned(),
            expected: Verdict::Accepted,
            verdict: counts.overall(),
            counts,
            outcomes,
            time_max: Duration::ZERO,
            time_total: Duration::ZERO,
            build_error: None,
        }
    }

    #[test]
    fn test_profiles_and_groups() {
        use Verdict::*;
        let testcases: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let reports = vec![
            report(&[("a", Accepted), ("b", Accepted), ("c", Accepted), ("d", Accepted)]),
            report(&[("a", Accepted), ("b", WrongAnswer), ("c", WrongAnswer), ("d", Accepted)]),
            // Stopped early after b.
            report(&[("a", Accepted), ("b", RunTimeError)]),
        ];

        let table = VerdictTable::build(&testcases, &reports, 2);
        let profiles: Vec<&str> = table.rows.iter().map(|row| row.profile.as_str()).collect();
        assert_eq!(profiles, vec!["111", "100", "10-", "11-"]);
        assert!(table.rows.iter().all(|row| row.group.is_none()));

        let table = VerdictTable::build(&testcases, &reports[..2], 2);
        let groups: Vec<Option<usize>> = table.rows.iter().map(|row| row.group).collect();
        assert_eq!(groups, vec![Some(2), Some(1), Some(1), Some(2)]);
        assert!(table.to_string().contains("(Type 2)"));
    }
}
