// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn parse(value: &str) -> Option<Self> {
        let parsed = value.trim().parse::<i64>().ok()?;
        (parsed > 0).then_some(Self(parsed))
    }
}

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::JobId;

    #[test]
    fn parse_accepts_positive_keys_only() {
        assert_eq!(JobId::parse(" 42 "), Some(JobId::new(42)));
        assert_eq!(JobId::parse("0"), None);
        assert_eq!(JobId::parse("-3"), None);
        assert_eq!(JobId::parse("abc"), None);
    }
}
