use std::fmt;

/// Bar interval. HistData ASCII bar exports only come in one minute, so
/// that is the only value; it renders as the `timeframe` label `1m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFrame {
    minutes: u32,
}

impl TimeFrame {
    pub const fn one_minute() -> Self {
        Self { minutes: 1 }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes)
    }
}
