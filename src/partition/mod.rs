//! Splitting over-cap queries into page, dimension, and date partitions.
//!
//! Morningstar's screener silently caps any one query at 10,000 rows and 20
//! pages, and the intraday timeseries endpoint rejects spans longer than 18
//! business days. This module turns one logical query into the set of
//! sub-queries whose union reconstitutes the full result, and degrades to a
//! logged truncation (never an error) where the caps make completeness
//! impossible.
//!
//! The flow is always probe-then-plan: issue the first request with
//! `page=1`, read the totals off the response, and hand them to [`plan`].

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde_json::Value;

use crate::core::MsError;
use crate::fetch::RequestDescriptor;

/// The sector taxonomy used for dimension splits of equity screens. Eleven
/// values, matching the screener's `sector` facet.
pub const SECTORS: [&str; 11] = [
    "Consumer Cyclical",
    "Consumer Defensive",
    "Real Estate",
    "Basic Materials",
    "Communication Services",
    "Financial Services",
    "Utilities",
    "Healthcare",
    "Technology",
    "Industrials",
    "Energy",
];

/// Ceilings observed on the live endpoints. All overridable; the defaults
/// are the values the site actually enforces (or the safety margins used
/// against them), not guesses.
#[derive(Clone, Debug)]
pub struct PartitionConfig {
    /// Hard page ceiling per query; pages beyond this are dropped with a
    /// warning.
    pub max_pages: u32,
    /// Row count above which a query is split by dimension. 9500 leaves a
    /// margin under the server's 10,000-row truncation point.
    pub row_cap: u64,
    /// Rows per screener page.
    pub page_size: u32,
    /// Longest span one intraday timeseries call will accept.
    pub max_chunk_business_days: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_pages: 20,
            row_cap: 9500,
            page_size: 500,
            max_chunk_business_days: 18,
        }
    }
}

/// Totals learned from the first page of a result set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Probe {
    /// Total matching rows across all pages.
    pub total_results: u64,
    /// Total pages the server reports.
    pub total_pages: u32,
}

impl Probe {
    /// Reads `total` and `pages` off a screener-style first-page response.
    ///
    /// A response that reports `total` but omits `pages` gets its page count
    /// derived as `ceil(total / page_size)`; a response with neither plans
    /// to a no-op single page.
    #[must_use]
    pub fn from_response(value: &Value, config: &PartitionConfig) -> Self {
        let total_results = value.get("total").and_then(Value::as_u64).unwrap_or(0);
        let total_pages = value
            .get("pages")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or_else(|| {
                let derived = total_results
                    .div_ceil(u64::from(config.page_size.max(1)))
                    .max(1);
                u32::try_from(derived).unwrap_or(u32::MAX)
            });
        Self {
            total_results,
            total_pages,
        }
    }
}

/// A dimension to split an over-cap query along: the query parameter to
/// rewrite and the facet values to enumerate.
pub struct Dimension<'a> {
    /// The query parameter carrying the filter expression.
    pub param: &'a str,
    /// Facet values, one sub-query each.
    pub values: &'a [&'a str],
    /// Renders the parameter value for one facet value (e.g. appends
    /// `AND (sector = '...')` to the base filter expression).
    pub render: &'a dyn Fn(&str) -> String,
}

/// How a logical query gets executed after probing.
#[derive(Clone, Debug)]
pub enum PartitionPlan {
    /// The probe response already holds everything.
    Single,
    /// Fetch the remaining pages; `truncated` marks pages dropped at the
    /// ceiling.
    Pages {
        /// Descriptors for pages 2..=min(total, ceiling).
        requests: Vec<RequestDescriptor>,
        /// True when the page ceiling cut the result short.
        truncated: bool,
    },
    /// Re-issue the query once per dimension value, page 1 each; callers
    /// probe-and-plan each partition again for its own pagination.
    Dimension {
        /// One descriptor per facet value.
        requests: Vec<RequestDescriptor>,
    },
}

impl PartitionPlan {
    /// The follow-up descriptors this plan wants fetched (empty for
    /// [`PartitionPlan::Single`]).
    #[must_use]
    pub fn requests(&self) -> &[RequestDescriptor] {
        match self {
            Self::Single => &[],
            Self::Pages { requests, .. } | Self::Dimension { requests } => requests,
        }
    }
}

/// Decides how to execute a logical query given its probe totals.
///
/// Over the row cap with a dimension available: one sub-query per facet
/// value. Otherwise multi-page: descriptors for the remaining pages, cut at
/// the page ceiling with a warning. One page: [`PartitionPlan::Single`].
///
/// A dimension partition can itself land over the cap when re-probed; the
/// split never recurses into a second dimension. Planning an over-cap probe
/// with no dimension left warns and falls back to plain pagination, which
/// the page ceiling may truncate.
#[must_use]
pub fn plan(
    probe: &Probe,
    base: &RequestDescriptor,
    config: &PartitionConfig,
    dimension: Option<&Dimension<'_>>,
) -> PartitionPlan {
    if probe.total_results > config.row_cap {
        if let Some(dim) = dimension {
            tracing::debug!(
                total = probe.total_results,
                cap = config.row_cap,
                param = dim.param,
                partitions = dim.values.len(),
                "row cap exceeded, splitting by dimension"
            );
            let requests = dim
                .values
                .iter()
                .map(|&value| {
                    base.clone()
                        .set_param(dim.param, (dim.render)(value))
                        .set_param("page", "1")
                        .meta("partition", value)
                })
                .collect();
            return PartitionPlan::Dimension { requests };
        }
        tracing::warn!(
            total = probe.total_results,
            cap = config.row_cap,
            "row cap exceeded with no dimension to split on, pagination may truncate"
        );
    }

    page_plan(probe, base, config)
}

/// Builds descriptors for pages 2..=N of a paginated result, honoring the
/// page ceiling.
#[must_use]
pub fn page_plan(
    probe: &Probe,
    base: &RequestDescriptor,
    config: &PartitionConfig,
) -> PartitionPlan {
    if probe.total_pages <= 1 {
        return PartitionPlan::Single;
    }

    let truncated = probe.total_pages > config.max_pages;
    let last_page = probe.total_pages.min(config.max_pages);
    if truncated {
        tracing::warn!(
            total_pages = probe.total_pages,
            max_pages = config.max_pages,
            dropped = probe.total_pages - config.max_pages,
            "page ceiling reached, result will be incomplete"
        );
    }

    let requests = (2..=last_page)
        .map(|page| base.clone().set_param("page", page.to_string()))
        .collect();
    PartitionPlan::Pages {
        requests,
        truncated,
    }
}

/// Splits `[start, end]` into contiguous chunks of at most `max_days`
/// business days (Mon-Fri), returned as inclusive (first, last) date pairs.
///
/// # Errors
///
/// Returns [`MsError::InvalidDates`] when `start > end` or the range holds
/// no business day at all.
pub fn business_day_chunks(
    start: NaiveDate,
    end: NaiveDate,
    max_days: usize,
) -> Result<Vec<(NaiveDate, NaiveDate)>, MsError> {
    if start > end || max_days == 0 {
        return Err(MsError::InvalidDates);
    }

    let mut business_days = Vec::new();
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            business_days.push(day);
        }
        day = day
            .checked_add_days(Days::new(1))
            .ok_or(MsError::InvalidDates)?;
    }

    if business_days.is_empty() {
        return Err(MsError::InvalidDates);
    }

    Ok(business_days
        .chunks(max_days)
        .map(|chunk| (chunk[0], chunk[chunk.len() - 1]))
        .collect())
}

/// Turns a date range into one descriptor per business-day chunk, with
/// `startDate`/`endDate` set per chunk. Results must be re-sorted after
/// fetch; chunks can complete out of order relative to each other.
///
/// # Errors
///
/// Returns [`MsError::InvalidDates`] for a reversed or business-day-free
/// range.
pub fn time_chunk_plan(
    base: &RequestDescriptor,
    start: NaiveDate,
    end: NaiveDate,
    config: &PartitionConfig,
) -> Result<Vec<RequestDescriptor>, MsError> {
    let chunks = business_day_chunks(start, end, config.max_chunk_business_days)?;
    Ok(chunks
        .into_iter()
        .map(|(first, last)| {
            base.clone()
                .set_param("startDate", first.format("%Y-%m-%d").to_string())
                .set_param("endDate", last.format("%Y-%m-%d").to_string())
        })
        .collect())
}

/// Concatenates the `results` arrays of successive page responses in
/// submission order. Pages with a missing or non-array `results` field
/// contribute nothing.
#[must_use]
pub fn merge_pages(pages: &[Value]) -> Vec<Value> {
    let mut rows = Vec::new();
    for page in pages {
        if let Some(items) = page.get("results").and_then(Value::as_array) {
            rows.extend(items.iter().cloned());
        }
    }
    rows
}

/// Sorts merged time-series rows into canonical order. Partitioned chunks
/// complete in arbitrary order, so callers sort by (security, date) after
/// the merge; the key extractor decides what those mean for their row type.
pub fn sort_series_rows<R, K: Ord>(rows: &mut [R], key: impl Fn(&R) -> K) {
    rows.sort_by_key(key);
}
