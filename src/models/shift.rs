use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Shift classification derived from the start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Day,
    Afternoon,
    Night,
}

impl ShiftType {
    /// hour <= 8 is a day shift, 8 < hour < 16 an afternoon shift, anything later a night shift.
    pub fn from_start_time(start: NaiveTime) -> Self {
        match start.hour() {
            h if h <= 8 => ShiftType::Day,
            h if h < 16 => ShiftType::Afternoon,
            _ => ShiftType::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Day => "day",
            ShiftType::Afternoon => "afternoon",
            ShiftType::Night => "night",
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(ShiftType::Day),
            "afternoon" => Ok(ShiftType::Afternoon),
            "night" => Ok(ShiftType::Night),
            other => Err(format!("unknown shift type: {}", other)),
        }
    }
}

/// One scheduled work period. The type is never stored; see [`Shift::shift_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Shift {
    pub id: Uuid,
    pub worker_id: i32,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "07:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "15:00:00")]
    pub end_time: NaiveTime,
}

impl Shift {
    pub fn shift_type(&self) -> ShiftType {
        ShiftType::from_start_time(self.start_time)
    }
}
