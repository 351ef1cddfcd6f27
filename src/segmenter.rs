//! Month-boundary flight segmentation.
//!
//! A flight whose date range crosses a calendar month is cut at each month
//! boundary and its cost and units are redistributed in proportion to the
//! days each segment covers. Every segment except the last takes the rounded
//! share; the last segment takes the exact remainder, so the totals always
//! reconstruct to the cent.

use chrono::{Datelike, NaiveDate};

use crate::schema::{FlightRecord, FlightSegment};
use crate::utils::{
    first_day_of_next_month, from_cents, inclusive_days, last_day_of_month, same_calendar_month,
    to_cents,
};

/// Split one flight at calendar-month boundaries.
///
/// Flights with a missing or inverted date range are passed through as a
/// single segment; the flight-dates validator flags them downstream.
pub fn segment_flight(flight: &FlightRecord) -> Vec<FlightSegment> {
    let (start, end) = match (flight.parsed_start(), flight.parsed_end()) {
        (Some(start), Some(end)) => (start, end),
        _ => return vec![passthrough(flight)],
    };

    if start > end {
        return vec![passthrough(flight)];
    }

    let total_days = inclusive_days(start, end);

    if same_calendar_month(start, end) {
        return vec![FlightSegment {
            flight: flight.clone(),
            segment_days: total_days,
            proration_factor: 1.0,
        }];
    }

    let ranges = month_ranges(start, end);
    let last_index = ranges.len() - 1;

    let total_cost_cents = flight.cost.map(to_cents);
    let total_units = flight.units.map(|u| u as i64);

    let mut cost_assigned: i64 = 0;
    let mut units_assigned: i64 = 0;
    let mut segments = Vec::with_capacity(ranges.len());

    for (position, (range_start, range_end)) in ranges.into_iter().enumerate() {
        let segment_days = inclusive_days(range_start, range_end);
        let factor = segment_days as f64 / total_days as f64;
        let is_last = position == last_index;

        let cost = total_cost_cents.map(|total| {
            let allocated = if is_last {
                total - cost_assigned
            } else {
                prorate(total, factor, total - cost_assigned)
            };
            cost_assigned += allocated;
            from_cents(allocated)
        });

        let units = total_units.map(|total| {
            let allocated = if is_last {
                total - units_assigned
            } else {
                prorate(total, factor, total - units_assigned)
            };
            units_assigned += allocated;
            allocated as u64
        });

        let mut segment_flight = flight.clone();
        segment_flight.start = Some(format_date(range_start));
        segment_flight.end = Some(format_date(range_end));
        segment_flight.cost = cost;
        segment_flight.units = units;

        segments.push(FlightSegment {
            flight: segment_flight,
            segment_days,
            proration_factor: factor,
        });
    }

    segments
}

/// Month-aligned sub-ranges of [start, end], in chronological order.
fn month_ranges(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges = Vec::new();
    let mut cursor = start;

    while !same_calendar_month(cursor, end) {
        let month_end = last_day_of_month(cursor.year(), cursor.month());
        ranges.push((cursor, month_end));
        cursor = first_day_of_next_month(cursor);
    }

    ranges.push((cursor, end));
    ranges
}

/// Rounded proportional share, capped at what is still unassigned so the
/// remainder handed to the last segment can never go negative.
fn prorate(total: i64, factor: f64, remaining: i64) -> i64 {
    let rounded = (total as f64 * factor).round() as i64;
    rounded.min(remaining)
}

fn passthrough(flight: &FlightRecord) -> FlightSegment {
    let segment_days = match (flight.parsed_start(), flight.parsed_end()) {
        (Some(start), Some(end)) if start <= end => inclusive_days(start, end),
        _ => 0,
    };

    FlightSegment {
        flight: flight.clone(),
        segment_days,
        proration_factor: 1.0,
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
