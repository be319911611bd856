use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DosageParseError {
    #[error("expected 3 dose slots, got {0}")]
    WrongSlotCount(usize),

    #[error("invalid dose flag {0:?}, expected 0 or 1")]
    InvalidFlag(String),
}

/// The three administration slots a prescription dosage code can mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoseSlot {
    Morning,
    Noon,
    Night,
}

impl DoseSlot {
    /// Fixed local time of day at which the slot's dose is taken.
    pub fn time(self) -> NaiveTime {
        let (hour, minute) = match self {
            DoseSlot::Morning => (8, 0),
            DoseSlot::Noon => (13, 0),
            DoseSlot::Night => (20, 0),
        };
        NaiveTime::from_hms_opt(hour, minute, 0).expect("Will never fail.")
    }
}

/// Three binary flags parsed from a textual triplet such as `"1 0 1"`,
/// marking the morning/noon/night slots of one prescription line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosageCode {
    morning: bool,
    noon: bool,
    night: bool,
}

/// One concrete administration produced by resolving a dosage code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseTime {
    pub slot: DoseSlot,
    pub at: NaiveDateTime,
}

impl DosageCode {
    pub fn new(morning: bool, noon: bool, night: bool) -> Self {
        Self {
            morning,
            noon,
            night,
        }
    }

    /// True when no slot is marked. An all-zero code is valid input and
    /// simply produces no reminders.
    pub fn is_empty(&self) -> bool {
        !(self.morning || self.noon || self.night)
    }

    /// Marked slots in morning → noon → night order.
    pub fn slots(&self) -> impl Iterator<Item = DoseSlot> + '_ {
        [
            (self.morning, DoseSlot::Morning),
            (self.noon, DoseSlot::Noon),
            (self.night, DoseSlot::Night),
        ]
        .into_iter()
        .filter_map(|(set, slot)| set.then_some(slot))
    }

    /// Resolves the code into concrete future instants relative to
    /// `reference`. A slot whose time has already elapsed on the reference
    /// day (boundary included) lands on the same time the next day, so the
    /// result is always strictly in the future. Evaluated once at reminder
    /// creation; the produced instants live on in the reminder records.
    pub fn resolve(&self, reference: NaiveDateTime) -> Vec<DoseTime> {
        let today = reference.date();
        self.slots()
            .map(|slot| {
                let same_day = today.and_time(slot.time());
                let at = if same_day <= reference {
                    same_day
                        .checked_add_signed(TimeDelta::days(1))
                        .expect("Not realistic to overflow")
                } else {
                    same_day
                };
                DoseTime { slot, at }
            })
            .collect()
    }
}

impl FromStr for DosageCode {
    type Err = DosageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(DosageParseError::WrongSlotCount(tokens.len()));
        }

        let mut flags = [false; 3];
        for (flag, token) in flags.iter_mut().zip(&tokens) {
            *flag = match *token {
                "0" => false,
                "1" => true,
                other => return Err(DosageParseError::InvalidFlag(other.to_owned())),
            };
        }

        Ok(Self::new(flags[0], flags[1], flags[2]))
    }
}

impl fmt::Display for DosageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.morning as u8, self.noon as u8, self.night as u8
        )
    }
}
