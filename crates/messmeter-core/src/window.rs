use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};

use messmeter_types::api::{MealTimeSettingsDto, MealWindowConfig};
use messmeter_types::models::MealType;

use crate::error::ConfigError;

/// A wall-clock time of day, stored as minutes since midnight.
/// Parsed once from "HH:MM" at config load; malformed strings are a
/// `ConfigError`, never an evaluation-time fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime(u16);

impl WallTime {
    pub fn from_hm(hour: u16, minute: u16) -> Self {
        WallTime(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl FromStr for WallTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTime(s.to_string());

        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        if hour >= 24 || minute >= 60 {
            return Err(invalid());
        }
        Ok(WallTime::from_hm(hour, minute))
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// A daily time window. When `start > end` the window wraps past midnight
/// (e.g. breakfast toggling from 18:00 the previous evening to 07:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: WallTime,
    pub end: WallTime,
}

impl Window {
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        Ok(Window {
            start: start.parse()?,
            end: end.parse()?,
        })
    }

    /// Whether `now` falls inside the window. Start-inclusive, end-exclusive.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let n = (now.hour() * 60 + now.minute()) as u16;
        let (start, end) = (self.start.minutes(), self.end.minutes());
        if start <= end {
            start <= n && n < end
        } else {
            // Overnight wraparound
            n >= start || n < end
        }
    }
}

/// Toggle + scan window pair for one meal.
#[derive(Debug, Clone, Copy)]
pub struct MealWindows {
    pub toggle: Window,
    pub scan: Window,
}

/// Per-meal windows governing all users. Admin-mutable; read on every
/// gating decision.
#[derive(Debug, Clone, Copy)]
pub struct MealTimeSettings {
    pub breakfast: MealWindows,
    pub lunch: MealWindows,
    pub dinner: MealWindows,
}

impl MealTimeSettings {
    pub fn for_meal(&self, meal: MealType) -> &MealWindows {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn is_toggle_open(&self, meal: MealType, now: NaiveTime) -> bool {
        self.for_meal(meal).toggle.contains(now)
    }

    pub fn is_scan_open(&self, meal: MealType, now: NaiveTime) -> bool {
        self.for_meal(meal).scan.contains(now)
    }

    /// Validate a settings DTO in full before any of it takes effect.
    pub fn from_dto(dto: &MealTimeSettingsDto) -> Result<Self, ConfigError> {
        Ok(MealTimeSettings {
            breakfast: parse_windows(&dto.breakfast)?,
            lunch: parse_windows(&dto.lunch)?,
            dinner: parse_windows(&dto.dinner)?,
        })
    }

    pub fn to_dto(&self) -> MealTimeSettingsDto {
        MealTimeSettingsDto {
            breakfast: windows_to_config(&self.breakfast),
            lunch: windows_to_config(&self.lunch),
            dinner: windows_to_config(&self.dinner),
        }
    }
}

fn parse_windows(config: &MealWindowConfig) -> Result<MealWindows, ConfigError> {
    Ok(MealWindows {
        toggle: Window::parse(&config.toggle_start, &config.toggle_end)?,
        scan: Window::parse(&config.scan_start, &config.scan_end)?,
    })
}

fn windows_to_config(windows: &MealWindows) -> MealWindowConfig {
    MealWindowConfig {
        toggle_start: windows.toggle.start.to_string(),
        toggle_end: windows.toggle.end.to_string(),
        scan_start: windows.scan.start.to_string(),
        scan_end: windows.scan.end.to_string(),
    }
}

impl Default for MealTimeSettings {
    /// Documented fallback used until an admin configures real windows.
    /// Breakfast intent toggling wraps overnight.
    fn default() -> Self {
        MealTimeSettings {
            breakfast: MealWindows {
                toggle: Window {
                    start: WallTime::from_hm(18, 0),
                    end: WallTime::from_hm(7, 0),
                },
                scan: Window {
                    start: WallTime::from_hm(7, 0),
                    end: WallTime::from_hm(9, 30),
                },
            },
            lunch: MealWindows {
                toggle: Window {
                    start: WallTime::from_hm(7, 0),
                    end: WallTime::from_hm(11, 0),
                },
                scan: Window {
                    start: WallTime::from_hm(12, 0),
                    end: WallTime::from_hm(14, 30),
                },
            },
            dinner: MealWindows {
                toggle: Window {
                    start: WallTime::from_hm(11, 0),
                    end: WallTime::from_hm(17, 0),
                },
                scan: Window {
                    start: WallTime::from_hm(19, 0),
                    end: WallTime::from_hm(21, 30),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn same_day_window() {
        let w = Window::parse("08:00", "11:00").unwrap();
        assert!(!w.contains(at(7, 59)));
        assert!(w.contains(at(8, 0)));
        assert!(w.contains(at(10, 59)));
        assert!(!w.contains(at(11, 0)));
        assert!(!w.contains(at(23, 0)));
    }

    #[test]
    fn overnight_window_wraps_past_midnight() {
        let w = Window::parse("18:00", "08:00").unwrap();
        assert!(w.contains(at(23, 0)));
        assert!(w.contains(at(7, 59)));
        assert!(w.contains(at(18, 0)));
        assert!(!w.contains(at(8, 0)));
        assert!(!w.contains(at(12, 0)));
    }

    #[test]
    fn malformed_times_rejected_at_parse() {
        assert!("24:00".parse::<WallTime>().is_err());
        assert!("12:60".parse::<WallTime>().is_err());
        assert!("noon".parse::<WallTime>().is_err());
        assert!("12".parse::<WallTime>().is_err());
        assert!("07:30".parse::<WallTime>().is_ok());
    }

    #[test]
    fn wall_time_round_trips_display() {
        let t: WallTime = "09:05".parse().unwrap();
        assert_eq!(t.to_string(), "09:05");
    }

    #[test]
    fn meal_gating_selects_the_right_window() {
        let settings = MealTimeSettings::default();
        // Lunch scan 12:00-14:30
        assert!(settings.is_scan_open(MealType::Lunch, at(13, 0)));
        assert!(!settings.is_scan_open(MealType::Lunch, at(15, 0)));
        // Breakfast toggle wraps overnight 18:00-07:00
        assert!(settings.is_toggle_open(MealType::Breakfast, at(22, 0)));
        assert!(settings.is_toggle_open(MealType::Breakfast, at(6, 30)));
        assert!(!settings.is_toggle_open(MealType::Breakfast, at(12, 0)));
    }

    #[test]
    fn dto_round_trip() {
        let settings = MealTimeSettings::default();
        let dto = settings.to_dto();
        assert_eq!(dto.lunch.scan_start, "12:00");
        let parsed = MealTimeSettings::from_dto(&dto).unwrap();
        assert_eq!(parsed.lunch.scan, settings.lunch.scan);
    }

    #[test]
    fn dto_with_bad_time_fails_fast() {
        let mut dto = MealTimeSettings::default().to_dto();
        dto.dinner.scan_end = "25:99".into();
        assert!(MealTimeSettings::from_dto(&dto).is_err());
    }
}
