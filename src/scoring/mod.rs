// Scoring: turning classifier output into a verdict.

pub mod verdict;
