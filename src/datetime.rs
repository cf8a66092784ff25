//! FAT date/time packing.
//!
//! FAT date: `[year-1980:7][month:4][day:5]`.
//! FAT time: `[hour:5][minute:6][second/2:5]`.
//!
//! Both fields are stored big-endian on disk (like every other multi-byte
//! numeric field in a FATX directory entry); byte order is handled by the
//! caller (`dirent.rs`) — this module only deals with the 16-bit values
//! once they're already host-endian.

use chrono::{Datelike, Local, LocalResult, TimeZone, Timelike};

/// A decoded FAT date/time pair, still in local broken-down form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl FatDateTime {
    /// Decode a FAT date/time pair as stored in a directory entry.
    pub fn from_raw(date: u16, time: u16) -> Self {
        FatDateTime {
            year: 1980 + ((date >> 9) & 0x7F) as i32,
            month: ((date >> 5) & 0x0F) as u32,
            day: (date & 0x1F) as u32,
            hour: ((time >> 11) & 0x1F) as u32,
            minute: ((time >> 5) & 0x3F) as u32,
            second: ((time & 0x1F) as u32) * 2,
        }
    }

    /// Encode back to the on-disk `(date, time)` pair.
    pub fn to_raw(self) -> (u16, u16) {
        let date = (((self.year - 1980) as u16) << 9)
            | ((self.month as u16) << 5)
            | (self.day as u16);
        let time = ((self.hour as u16) << 11) | ((self.minute as u16) << 6) | ((self.second / 2) as u16);
        (date, time)
    }

    /// Convert to seconds-since-epoch using the host's local-time rules.
    ///
    /// A month/day/time combination of all zeros (the FATX zero-timestamp
    /// convention used for the synthetic root and for freshly created
    /// entries) maps to epoch zero rather than being run through
    /// `chrono`, since `year=1980,month=0,day=0` is not a valid calendar
    /// date.
    pub fn to_unix_timestamp(self) -> i64 {
        if self.month == 0 && self.day == 0 {
            return 0;
        }

        match Local.with_ymd_and_hms(
            self.year,
            self.month.max(1),
            self.day.max(1),
            self.hour,
            self.minute,
            self.second,
        ) {
            LocalResult::Single(dt) => dt.timestamp(),
            LocalResult::Ambiguous(dt, _) => dt.timestamp(),
            LocalResult::None => 0,
        }
    }

    /// Build from seconds-since-epoch using the host's local-time rules.
    pub fn from_unix_timestamp(secs: i64) -> Self {
        let dt = Local
            .timestamp_opt(secs, 0)
            .single()
            .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
        FatDateTime {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

/// All-zero FAT date/time, used for freshly created entries (`mkfile`
/// leaves timestamps zero per `spec.md` §4.H) and the synthesized root.
pub const ZERO_DATE: u16 = 0;
pub const ZERO_TIME: u16 = 0;
