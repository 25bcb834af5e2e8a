/// Column-name constants for the year-end pull tables.
/// Single source of truth - exported to Python via PyO3.

// ── Work period columns ─────────────────────────────────────────────────────
pub mod work_period {
    pub const MONTHS_SINCE_ADD: &str = "MonthsSinceAdd";
    pub const MONTHS_SINCE_DEL: &str = "MonthsSinceDel";

    pub const BOUNDS: [&str; 2] = [MONTHS_SINCE_ADD, MONTHS_SINCE_DEL];
}

// ── Window output columns ───────────────────────────────────────────────────
pub mod window {
    pub const PULL_YEAR: &str = "PullYear";
    pub const ACTIVE_COUNT: &str = "ActiveCount";
}

// ── Query / table names ─────────────────────────────────────────────────────
pub mod table {
    pub const TRANSACTIONS: &str = "transactions";
    pub const WORK_PERIODS: &str = "work_periods";
    pub const WORKSITE_HISTORIES: &str = "worksite_histories";
    pub const WINDOWS: &str = "windows";
    pub const WINDOW_COUNTS: &str = "window_counts";
}
