//! Кодек времени: `hh:mm:ss.mmm` <-> тики (десятые доли секунды)
//!
//! Миллисекунды при разборе усекаются до десятых (целочисленное деление на 100),
//! поэтому `format_time(parse_time(s))` может не совпасть с `s` побайтно.
//! Обратное направление точное: `parse_time(format_time(t)) == t` для `t >= 0`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, TimelineError};
use crate::segment::Tick;

/// Количество тиков в секунде
pub const TICKS_PER_SECOND: Tick = 10;

lazy_static! {
    static ref TIME_RE: Regex = Regex::new(r"^(\d+):(\d+):(\d+)\.(\d{1,3})$").unwrap();
}

/// Разбор строки `hh:mm:ss.mmm` в тики
pub fn parse_time(s: &str) -> Result<Tick> {
    let malformed = || TimelineError::MalformedTime(s.to_string());
    let caps = TIME_RE.captures(s.trim()).ok_or_else(malformed)?;

    let field = |i: usize| -> Result<Tick> {
        caps[i].parse::<Tick>().map_err(|_| malformed())
    };
    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let millis = field(4)?;

    let total_seconds = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(malformed)?;

    total_seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(millis / 100))
        .ok_or_else(malformed)
}

/// Форматирование тиков в `hh:mm:ss.mmm`
pub fn format_time(ticks: Tick) -> String {
    // валидный таймлайн не содержит отрицательных позиций
    let ticks = ticks.max(0);
    let millis = (ticks % TICKS_PER_SECOND) * 100;
    let seconds = ticks / TICKS_PER_SECOND % 60;
    let minutes = ticks / TICKS_PER_SECOND / 60 % 60;
    let hours = ticks / TICKS_PER_SECOND / 3600;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Тики -> `Duration`
pub fn ticks_to_duration(ticks: Tick) -> Duration {
    Duration::from_millis(ticks.max(0) as u64 * 100)
}

/// `Duration` -> тики, с усечением
pub fn duration_to_ticks(duration: Duration) -> Tick {
    (duration.as_millis() / 100) as Tick
}

/// Временная метка на таймлайне
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode(pub Tick);

impl FromStr for Timecode {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self> {
        parse_time(s).map(Timecode)
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_time(self.0))
    }
}

impl From<Timecode> for Tick {
    fn from(t: Timecode) -> Tick {
        t.0
    }
}
