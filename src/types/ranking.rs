//! Daily ranking snapshots keyed by date and ranking mode.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ranking modes offered by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RankingKind {
    Day = 0,
    Week = 1,
    Month = 2,
    DayMale = 3,
    DayFemale = 4,
    WeekOriginal = 5,
    WeekRookie = 6,
    DayManga = 7,
    DayR18 = 8,
    DayMaleR18 = 9,
    DayFemaleR18 = 10,
    WeekR18 = 11,
    WeekR18g = 12,
}

impl RankingKind {
    pub const ALL: [Self; 13] = [
        Self::Day,
        Self::Week,
        Self::Month,
        Self::DayMale,
        Self::DayFemale,
        Self::WeekOriginal,
        Self::WeekRookie,
        Self::DayManga,
        Self::DayR18,
        Self::DayMaleR18,
        Self::DayFemaleR18,
        Self::WeekR18,
        Self::WeekR18g,
    ];

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    /// The `mode` query value used by the ranking endpoint.
    #[must_use]
    pub fn as_mode(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::DayMale => "day_male",
            Self::DayFemale => "day_female",
            Self::WeekOriginal => "week_original",
            Self::WeekRookie => "week_rookie",
            Self::DayManga => "day_manga",
            Self::DayR18 => "day_r18",
            Self::DayMaleR18 => "day_male_r18",
            Self::DayFemaleR18 => "day_female_r18",
            Self::WeekR18 => "week_r18",
            Self::WeekR18g => "week_r18g",
        }
    }
}

/// `(date, kind)` to the ordered artwork ids of that ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingTable {
    pub(crate) entries: BTreeMap<(NaiveDate, RankingKind), Vec<u64>>,
}

impl RankingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ranking for `(date, kind)`, returning the previous list.
    pub fn set(&mut self, date: NaiveDate, kind: RankingKind, ids: Vec<u64>) -> Option<Vec<u64>> {
        self.entries.insert((date, kind), ids)
    }

    #[must_use]
    pub fn get(&self, date: NaiveDate, kind: RankingKind) -> Option<&[u64]> {
        self.entries.get(&(date, kind)).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, RankingKind, &[u64])> {
        self.entries
            .iter()
            .map(|(&(date, kind), ids)| (date, kind, ids.as_slice()))
    }
}
