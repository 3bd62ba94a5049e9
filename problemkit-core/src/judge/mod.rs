/// Default and custom output comparison
pub mod compare;
/// Judging one testcase and one submission
pub mod common;
pub mod result;
pub mod submissions;
/// Verdict profiles across submissions
pub mod table;

pub use result::{
    SubmissionReport, TestcaseOutcome, ValidatorResult, Verdict, VerdictCount,
};
pub use submissions::{run_submissions, RunReport};
