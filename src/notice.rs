//! User-facing messages about the session

use serde::Serialize;
use std::fmt;

use crate::TimingError;
use crate::connection::Remediation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Toast-style message produced by a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    pub remediation: Option<Remediation>,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, description)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, description)
    }

    fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { level, title: title.into(), description: description.into(), remediation: None }
    }
}

impl From<&TimingError> for Notice {
    fn from(error: &TimingError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: error.title().to_string(),
            description: error.to_string(),
            remediation: error.remediation().cloned(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}: {}", self.title, self.description)?;
        if let Some(remediation) = &self.remediation {
            match &remediation.target {
                Some(target) => write!(f, " ({} -> {target})", remediation.label)?,
                None => write!(f, " ({})", remediation.label)?,
            }
        }
        Ok(())
    }
}
