use chrono::{Datelike, NaiveDate};
use std::fmt;

use super::tables::{Branch, Element, Stem};

/// Ages at which the first decade cycle begins.
const DECADE_START_AGE: i64 = 3;

/// Anchor of the sexagenary year cycle: 2024 is 甲辰 (stem 0, branch 4).
const YEAR_ANCHOR: i64 = 2024;
const YEAR_ANCHOR_BRANCH: i64 = 4;

/// A stem/branch pair (干支).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GanZhi {
    pub stem: Stem,
    pub branch: Branch,
}

impl GanZhi {
    pub fn new(stem: Stem, branch: Branch) -> Self {
        Self { stem, branch }
    }

    /// Build a pair from raw cycle positions; both indices wrap.
    pub fn from_indices(stem: i64, branch: i64) -> Self {
        Self {
            stem: Stem::from_index(stem),
            branch: Branch::from_index(branch),
        }
    }
}

impl fmt::Display for GanZhi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem.hanzi(), self.branch.hanzi())
    }
}

/// Year, month, day and hour pillars.
///
/// This is an index approximation keyed off the Gregorian fields only,
/// not a solar-term calendar conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourPillars {
    pub year: GanZhi,
    pub month: GanZhi,
    pub day: GanZhi,
    pub hour: GanZhi,
}

impl FourPillars {
    pub fn derive(birth_date: NaiveDate, hour: u32) -> Self {
        let year = i64::from(birth_date.year());
        let month = i64::from(birth_date.month());
        let day = i64::from(birth_date.day());
        let hour = i64::from(hour);

        let day_stem = (day - 1).rem_euclid(10);
        let hour_branch = ((hour + 1) / 2).rem_euclid(12);
        let hour_stem = day_stem * 2 + hour_branch;

        Self {
            year: GanZhi::from_indices(year - 4, year - 4),
            month: GanZhi::from_indices(month - 1, month - 1),
            day: GanZhi::from_indices(day_stem, day - 1),
            hour: GanZhi::from_indices(hour_stem, hour_branch),
        }
    }

    /// Pillars in year, month, day, hour order.
    pub fn as_array(&self) -> [GanZhi; 4] {
        [self.year, self.month, self.day, self.hour]
    }

    pub fn branches(&self) -> [Branch; 4] {
        self.as_array().map(|p| p.branch)
    }
}

impl fmt::Display for FourPillars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.month, self.day, self.hour)
    }
}

/// Element counts over the eight stem/branch symbols of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementTally {
    counts: [u8; 5],
}

impl ElementTally {
    pub fn from_pillars(pillars: &FourPillars) -> Self {
        let mut counts = [0u8; 5];
        for pillar in pillars.as_array() {
            counts[pillar.stem.element().index()] += 1;
            counts[pillar.branch.element().index()] += 1;
        }
        Self { counts }
    }

    pub fn count(&self, element: Element) -> u8 {
        self.counts[element.index()]
    }

    pub fn total(&self) -> u8 {
        self.counts.iter().sum()
    }

    /// Least represented element; ties go to the earlier element in `Element::ALL`.
    pub fn weakest(&self) -> Element {
        self.pick(|candidate, best| candidate < best)
    }

    /// Most represented element; ties go to the earlier element in `Element::ALL`.
    pub fn dominant(&self) -> Element {
        self.pick(|candidate, best| candidate > best)
    }

    fn pick(&self, better: impl Fn(u8, u8) -> bool) -> Element {
        let mut best = Element::Wood;
        for element in Element::ALL.into_iter().skip(1) {
            if better(self.count(element), self.count(best)) {
                best = element;
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (Element, u8)> + '_ {
        Element::ALL.into_iter().map(|e| (e, self.count(e)))
    }
}

/// Clash and harmony pairs found among the four branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionCounts {
    pub clash: u8,
    pub harmony: u8,
}

impl InteractionCounts {
    pub fn from_branches(branches: &[Branch; 4]) -> Self {
        let mut counts = Self::default();
        for (i, a) in branches.iter().enumerate() {
            for b in &branches[i + 1..] {
                if a.clashes_with(*b) {
                    counts.clash += 1;
                }
                if a.harmonizes_with(*b) {
                    counts.harmony += 1;
                }
            }
        }
        counts
    }
}

/// Favorable element (用神) and its generator (喜神).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavorableElement {
    pub favorable: Element,
    pub auxiliary: Element,
    pub strong: bool,
}

impl FavorableElement {
    pub fn from_tally(tally: &ElementTally) -> Self {
        let favorable = tally.weakest();
        let mean = f64::from(tally.total()) / Element::ALL.len() as f64;
        Self {
            favorable,
            auxiliary: favorable.generator(),
            strong: f64::from(tally.count(favorable)) > mean,
        }
    }
}

/// Everything derived from the birth date and hour alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chart {
    pub birth_date: NaiveDate,
    pub pillars: FourPillars,
    pub elements: ElementTally,
    pub interactions: InteractionCounts,
    pub favorable: FavorableElement,
}

impl Chart {
    pub fn derive(birth_date: NaiveDate, hour: u32) -> Self {
        let pillars = FourPillars::derive(birth_date, hour);
        let elements = ElementTally::from_pillars(&pillars);
        Self {
            birth_date,
            pillars,
            elements,
            interactions: InteractionCounts::from_branches(&pillars.branches()),
            favorable: FavorableElement::from_tally(&elements),
        }
    }
}

/// The ten-year luck pillar (大運) in effect for a target year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecadeCycle {
    pub pillar: GanZhi,
    pub cycle: i64,
    pub start_age: i64,
    pub end_age: i64,
    pub start_year: i64,
}

impl DecadeCycle {
    /// Decade cycles advance forward from the month pillar, one step per ten
    /// years of (Korean-count) age. Ages before the first cycle give negative
    /// cycle numbers and wrap backwards.
    pub fn for_year(chart: &Chart, target_year: i32) -> Self {
        let birth_year = i64::from(chart.birth_date.year());
        let age = i64::from(target_year) - birth_year + 1;
        let cycle = (age - DECADE_START_AGE).div_euclid(10);
        let start_age = DECADE_START_AGE + cycle * 10;
        let month = chart.pillars.month;

        Self {
            pillar: GanZhi::from_indices(
                month.stem.index() as i64 + cycle + 1,
                month.branch.index() as i64 + cycle + 1,
            ),
            cycle,
            start_age,
            end_age: start_age + 10,
            start_year: birth_year + start_age - 1,
        }
    }
}

/// The sexagenary pillar of a calendar year (歲運).
pub fn year_pillar(year: i32) -> GanZhi {
    let offset = i64::from(year) - YEAR_ANCHOR;
    GanZhi::from_indices(offset, offset + YEAR_ANCHOR_BRANCH)
}
