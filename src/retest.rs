/// Chat commands that re-trigger CI on a PR.
pub const RETEST_TRIGGERS: [&str; 2] = ["/retest", "/retest-required"];

/// Count lines of a comment body that are exactly one of `triggers` once trimmed.
pub fn count_retests(body: &str, triggers: &[&str]) -> usize {
    body.lines()
        .map(str::trim)
        .filter(|line| triggers.contains(line))
        .count()
}

/// Sum of retest triggers over every comment body of a PR.
pub fn count_retests_in_comments<'a>(bodies: impl IntoIterator<Item = &'a str>) -> usize {
    bodies
        .into_iter()
        .map(|body| count_retests(body, &RETEST_TRIGGERS))
        .sum()
}
