use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::serde_ext::double_option;

pub const DEFAULT_NOTE_COLOR: &str = "default";
const MAX_COLOR_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Bad,
    Awful,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Great => "great",
            Mood::Good => "good",
            Mood::Okay => "okay",
            Mood::Bad => "bad",
            Mood::Awful => "awful",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "great" => Some(Mood::Great),
            "good" => Some(Mood::Good),
            "okay" => Some(Mood::Okay),
            "bad" => Some(Mood::Bad),
            "awful" => Some(Mood::Awful),
            _ => None,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One calendar day of a user's journal. Holds the mood; notes hang off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: i64,
    pub entry_date: NaiveDate,
    pub mood: Option<Mood>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalNote {
    pub id: i64,
    pub journal_entry_id: i64,
    pub title: Option<String>,
    pub color: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-day row of the month overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDaySummary {
    pub date: NaiveDate,
    pub mood: Option<Mood>,
    pub notes_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMood {
    pub entry_date: NaiveDate,
    pub mood: Option<Mood>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJournalNote {
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub content: String,
}

impl CreateJournalNote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_content(&self.content)?;
        if let Some(ref color) = self.color {
            validate_color(color)?;
        }
        Ok(())
    }

    /// The color as stored: trimmed, or the default when absent.
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().map_or(DEFAULT_NOTE_COLOR, str::trim)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateJournalNote {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UpdateJournalNote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref content) = self.content {
            validate_content(content)?;
        }
        if let Some(ref color) = self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

/// First and last day of a calendar month, or `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_first.pred_opt()?;
    debug_assert_eq!(last.month(), month);
    Some((first, last))
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::new("content", "must not be empty"));
    }
    Ok(())
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    let len = color.chars().count();
    if color.trim().is_empty() || len > MAX_COLOR_LEN {
        return Err(ValidationError::new(
            "color",
            format!("must be 1 to {MAX_COLOR_LEN} characters"),
        ));
    }
    Ok(())
}
