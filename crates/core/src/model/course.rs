use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course level must be > 0")]
    InvalidLevel,

    #[error("unknown course status: {0}")]
    InvalidStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Publishing lifecycle of a course.
///
/// Transitions between statuses are left to the editorial workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Published,
    Archived,
}

impl CourseStatus {
    pub const ALL: [CourseStatus; 5] = [
        CourseStatus::Draft,
        CourseStatus::InReview,
        CourseStatus::Approved,
        CourseStatus::Published,
        CourseStatus::Archived,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Draft => "DRAFT",
            CourseStatus::InReview => "IN_REVIEW",
            CourseStatus::Approved => "APPROVED",
            CourseStatus::Published => "PUBLISHED",
            CourseStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CourseError::InvalidStatus(s.to_owned()))
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Author input for a new course, before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    pub level: u32,
    pub title: String,
    pub status: CourseStatus,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl CourseDraft {
    #[must_use]
    pub fn new(level: u32, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            status: CourseStatus::Draft,
            summary: None,
            description: None,
            thumbnail: None,
        }
    }

    /// Validate the draft and stamp it with `now`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::InvalidLevel` for level 0 and
    /// `CourseError::EmptyTitle` for a blank title.
    pub fn validate(self, id: CourseId, now: DateTime<Utc>) -> Result<Course, CourseError> {
        if self.level == 0 {
            return Err(CourseError::InvalidLevel);
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        Ok(Course {
            id,
            level: self.level,
            title: title.to_owned(),
            status: self.status,
            summary: non_blank(self.summary),
            description: non_blank(self.description),
            thumbnail: non_blank(self.thumbnail),
            updated_at: now,
        })
    }
}

/// A leveled course: the root of the lesson/card hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    level: u32,
    title: String,
    status: CourseStatus,
    summary: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    updated_at: DateTime<Utc>,
}

impl Course {
    // Accessors
    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        self.status
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move the course to another status. Any status may follow any other.
    pub fn set_status(&mut self, status: CourseStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
