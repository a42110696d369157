//! Work item enumeration
//!
//! Expands a date range and a region list into the ordered set of
//! `(date, region)` work items for one run. Enumeration is pure and
//! deterministic: re-invoking with the same inputs yields the same sequence,
//! which is what makes failed-key retry runs possible. Ordering is day-major -
//! every region of day N appears before any region of day N+1 - so the
//! pipeline can fully resolve one day (persist results, record failures)
//! before touching the next.

use crate::{Polygon, Region, TimeWindow};
use chrono::NaiveDate;

/// Unique key of one work item within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkKey {
    /// Calendar date of the extraction window
    pub date: NaiveDate,
    /// Sub-region identifier
    pub region_id: u32,
}

impl std::fmt::Display for WorkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/r{}", self.date.format("%Y-%m-%d"), self.region_id)
    }
}

/// One `(date, region)` unit of extraction work. Created by the enumerator,
/// read-only thereafter; owned by exactly one worker while being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Unique key within the run
    pub key: WorkKey,
    /// Region polygon, carried verbatim to the compute service
    pub geometry: Polygon,
    /// Extraction window for the day
    pub window: TimeWindow,
}

impl WorkItem {
    /// Build the work item for a region on a date.
    pub fn new(date: NaiveDate, region: &Region) -> Self {
        Self {
            key: WorkKey {
                date,
                region_id: region.id,
            },
            geometry: region.geometry.clone(),
            window: TimeWindow::for_date(date),
        }
    }
}

/// Day-major work item enumerator over an inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enumerator {
    start: NaiveDate,
    end: NaiveDate,
}

impl Enumerator {
    /// Create an enumerator over `[start, end]` inclusive. A reversed range
    /// enumerates nothing.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Create an enumerator covering whole months of one year,
    /// `[year-start_month-01, last day of year-end_month]`.
    pub fn from_months(year: i32, start_month: u32, end_month: u32) -> Result<Self, String> {
        let start = NaiveDate::from_ymd_opt(year, start_month, 1)
            .ok_or_else(|| format!("invalid start month: {year}-{start_month}"))?;

        let next_month_start = if end_month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, end_month + 1, 1)
        }
        .ok_or_else(|| format!("invalid end month: {year}-{end_month}"))?;
        let end = next_month_start
            .pred_opt()
            .ok_or_else(|| format!("invalid end month: {year}-{end_month}"))?;

        Ok(Self::new(start, end))
    }

    /// First day of the range.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Iterate the days of the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Number of days in the range.
    pub fn day_count(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as u64 + 1
        }
    }

    /// All work items for a single day, in region order.
    pub fn day_batch(&self, date: NaiveDate, regions: &[Region]) -> Vec<WorkItem> {
        regions.iter().map(|r| WorkItem::new(date, r)).collect()
    }

    /// Lazy day-major sequence of all work items in the range.
    pub fn work_items<'a>(
        &self,
        regions: &'a [Region],
    ) -> impl Iterator<Item = WorkItem> + 'a {
        self.days()
            .flat_map(move |date| regions.iter().map(move |r| WorkItem::new(date, r)))
    }
}
