//! Field and flight validation rules.
//!
//! Every rule is a pure function returning a [`ValidatorOutcome`]: either a
//! scored component to fold into the field's average, or a hard reject that
//! short-circuits the aggregate regardless of the other components. The
//! aggregator switches on the variant; it never re-inspects component names
//! to find special cases.

use std::collections::HashMap;

use crate::order_number::{
    classify_order_number, is_plausible_candidate, normalize_order_number, OrderNumberFormat,
};
use crate::schema::{ConfidenceComponent, DateWindow, FlightRecord, Provenance};
use crate::utils::{from_cents, to_cents};

/// Tagged result of one validation rule.
#[derive(Debug, Clone)]
pub enum ValidatorOutcome {
    /// Fold the component into the field's weighted average.
    Continue(ConfidenceComponent),
    /// The component is retained for the audit trail, but the field or
    /// flight it belongs to is rejected outright.
    HardReject(ConfidenceComponent),
}

impl ValidatorOutcome {
    pub fn component(&self) -> &ConfidenceComponent {
        match self {
            ValidatorOutcome::Continue(c) | ValidatorOutcome::HardReject(c) => c,
        }
    }

    pub fn into_component(self) -> ConfidenceComponent {
        match self {
            ValidatorOutcome::Continue(c) | ValidatorOutcome::HardReject(c) => c,
        }
    }

    pub fn is_hard_reject(&self) -> bool {
        matches!(self, ValidatorOutcome::HardReject(_))
    }
}

/// Canonical field id -> ordered candidate keys in the provenance list.
/// Resolved once per document; no per-call-site string fallthrough.
pub const FIELD_LOOKUP: &[(&str, &[&str])] = &[
    (
        "advertiser_name",
        &["advertiser_name", "advertiser", "client_name", "client"],
    ),
    ("agency_name", &["agency_name", "agency", "buyer"]),
    (
        "campaign_dates",
        &["campaign_total_flight", "campaign_dates", "flight_dates"],
    ),
    (
        "total_campaign_spend",
        &["total_campaign_spend", "total_spend", "budget", "total_cost"],
    ),
    (
        "total_contracted_impressions",
        &[
            "total_contracted_impressions",
            "total_impressions",
            "impressions",
        ],
    ),
    ("currency", &["currency"]),
    ("po_number", &["po_number", "order_number", "po"]),
    (
        "account_executive_name",
        &["account_executive_name", "account_executive", "ae_name"],
    ),
    ("cpm", &["rate_cpm", "cpm", "rate"]),
];

/// Resolve each canonical field to its provenance entry, first candidate
/// key wins. Keys compare case-insensitively.
pub fn resolve_provenance(entries: &[Provenance]) -> HashMap<&'static str, &Provenance> {
    let mut resolved = HashMap::new();

    for (canonical, candidates) in FIELD_LOOKUP {
        let hit = candidates.iter().find_map(|candidate| {
            entries.iter().find(|entry| {
                entry
                    .field
                    .as_deref()
                    .is_some_and(|f| f.eq_ignore_ascii_case(candidate))
            })
        });

        if let Some(entry) = hit {
            resolved.insert(*canonical, entry);
        }
    }

    resolved
}

// --- Format validators ---------------------------------------------------

pub fn budget_format(value: Option<f64>) -> ValidatorOutcome {
    let (score, notes) = match value {
        Some(v) if v.is_finite() && v > 0.0 => (1.0, format!("budget {:.2} is a positive amount", v)),
        Some(v) => (0.0, format!("budget {} is not a positive amount", v)),
        None => (0.0, "budget missing".to_string()),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("budget_format", score, notes))
}

pub fn cpm_format(value: Option<f64>) -> ValidatorOutcome {
    let (score, notes) = match value {
        Some(v) if v.is_finite() && v > 0.0 => (1.0, format!("CPM {:.2} is a positive rate", v)),
        Some(v) => (0.0, format!("CPM {} is not a positive rate", v)),
        None => (0.0, "CPM missing".to_string()),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("cpm_format", score, notes))
}

pub fn impressions_format(value: Option<u64>) -> ValidatorOutcome {
    let (score, notes) = match value {
        Some(v) if v > 1000 => (1.0, format!("{} impressions is a plausible volume", v)),
        Some(v) => (
            0.0,
            format!("{} impressions is below the plausible minimum of 1000", v),
        ),
        None => (0.0, "impressions missing".to_string()),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("impressions_format", score, notes))
}

pub fn currency_format(value: &str) -> ValidatorOutcome {
    let ok = value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase());
    let (score, notes) = if ok {
        (1.0, format!("{} is a well-formed ISO 4217 code", value))
    } else {
        (0.0, format!("'{}' is not an ISO 4217 code", value))
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("currency_format", score, notes))
}

pub fn po_number_format(value: Option<&str>) -> ValidatorOutcome {
    let (score, notes) = match value {
        None => (0.0, "order number missing".to_string()),
        Some(raw) => {
            let normalized = normalize_order_number(raw);
            if !is_plausible_candidate(&normalized) {
                (0.0, format!("'{}' is not a plausible order number", raw))
            } else {
                match classify_order_number(&normalized) {
                    OrderNumberFormat::Dashed => {
                        (1.0, format!("'{}' matches the dashed id format", normalized))
                    }
                    OrderNumberFormat::Numeric => {
                        (1.0, format!("'{}' matches the numeric format", normalized))
                    }
                    OrderNumberFormat::Alphanumeric => (
                        1.0,
                        format!("'{}' matches the alphanumeric format", normalized),
                    ),
                    OrderNumberFormat::Unrecognized => (
                        0.5,
                        format!("'{}' present but matches no known format", normalized),
                    ),
                }
            }
        }
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("po_number_format", score, notes))
}

// --- Date validators -----------------------------------------------------

pub fn date_ordering(window: &DateWindow) -> ValidatorOutcome {
    let (score, notes) = match window.resolve() {
        Some((start, end)) if start <= end => {
            (1.0, format!("{} to {} is correctly ordered", start, end))
        }
        Some((start, end)) => (0.0, format!("start {} is after end {}", start, end)),
        None => (
            0.0,
            format!(
                "dates did not parse: start={:?} end={:?}",
                window.start, window.end
            ),
        ),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("date_ordering", score, notes))
}

// --- Span / location quality ---------------------------------------------

struct SpanTiers {
    primary: &'static [&'static str],
    good: &'static [&'static str],
    acceptable: &'static [&'static str],
}

fn span_tiers(field: &str) -> Option<&'static SpanTiers> {
    const ADVERTISER: SpanTiers = SpanTiers {
        primary: &["advertiser"],
        good: &["client", "brand"],
        acceptable: &["order header", "campaign summary"],
    };
    const AGENCY: SpanTiers = SpanTiers {
        primary: &["agency"],
        good: &["buyer", "media buyer"],
        acceptable: &["order header"],
    };
    const CAMPAIGN_DATES: SpanTiers = SpanTiers {
        primary: &["flight dates", "campaign dates"],
        good: &["schedule", "flight"],
        acceptable: &["summary"],
    };
    const SPEND: SpanTiers = SpanTiers {
        primary: &["grand total", "total cost"],
        good: &["budget", "spend", "total"],
        acceptable: &["summary", "cost"],
    };
    const IMPRESSIONS: SpanTiers = SpanTiers {
        primary: &["total impressions", "impressions total"],
        good: &["impressions"],
        acceptable: &["units", "summary"],
    };
    const PO: SpanTiers = SpanTiers {
        primary: &["order number", "po number", "po #"],
        good: &["order #", "reference"],
        acceptable: &["header"],
    };
    const AE: SpanTiers = SpanTiers {
        primary: &["account executive"],
        good: &["sales contact", "ae"],
        acceptable: &["signature", "contact"],
    };
    const CPM: SpanTiers = SpanTiers {
        primary: &["cpm", "rate"],
        good: &["pricing"],
        acceptable: &["summary"],
    };

    match field {
        "advertiser_name" => Some(&ADVERTISER),
        "agency_name" => Some(&AGENCY),
        "campaign_dates" => Some(&CAMPAIGN_DATES),
        "total_campaign_spend" => Some(&SPEND),
        "total_contracted_impressions" => Some(&IMPRESSIONS),
        "po_number" => Some(&PO),
        "account_executive_name" => Some(&AE),
        "cpm" => Some(&CPM),
        _ => None,
    }
}

const GENERIC_SECTIONS: &[&str] = &["header", "section", "page", "table", "footer", "row"];

/// Score how well the reported extraction location fits the field.
pub fn span_quality(field: &str, location_hint: Option<&str>) -> ValidatorOutcome {
    let Some(hint) = location_hint.filter(|h| !h.trim().is_empty()) else {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "span_quality",
            0.6,
            "no location hint reported",
        ));
    };

    let lowered = hint.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    let (score, tier) = match span_tiers(field) {
        Some(tiers) if contains_any(tiers.primary) => (1.0, "primary location"),
        Some(tiers) if contains_any(tiers.good) => (0.9, "good location"),
        Some(tiers) if contains_any(tiers.acceptable) => (0.7, "acceptable location"),
        _ if contains_any(GENERIC_SECTIONS) => (0.6, "generic document section"),
        _ => (0.5, "unrecognized location"),
    };

    ValidatorOutcome::Continue(ConfidenceComponent::new(
        "span_quality",
        score,
        format!("{}: '{}'", tier, hint),
    ))
}

// --- Cross-field consistency ---------------------------------------------

/// Budget / CPM / impressions triangle: impressions ~= budget / (CPM/1000).
pub fn numeric_triangle(
    budget: Option<f64>,
    cpm: Option<f64>,
    impressions: Option<u64>,
) -> ValidatorOutcome {
    let (Some(budget), Some(cpm), Some(impressions)) = (budget, cpm, impressions) else {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "numeric_triangle",
            0.7,
            "triangle input missing; not penalized",
        ));
    };

    if cpm <= 0.0 {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "numeric_triangle",
            0.7,
            "CPM is zero; triangle not applicable",
        ));
    }

    let implied = budget / (cpm / 1000.0);
    let deviation = (impressions as f64 - implied).abs() / implied;

    let score = if deviation < 0.05 {
        1.0
    } else if deviation < 0.15 {
        0.8
    } else if deviation < 0.30 {
        0.5
    } else {
        0.2
    };

    ValidatorOutcome::Continue(ConfidenceComponent::new(
        "numeric_triangle",
        score,
        format!(
            "implied {:.0} impressions vs declared {} ({:.1}% deviation)",
            implied,
            impressions,
            deviation * 100.0
        ),
    ))
}

/// Zero-tolerance reconciliation of declared spend against the flight cost
/// sum. Within one cent passes; any other delta is a parsing defect.
pub fn totals_match_sums(declared_spend: f64, flight_cost_sum: f64) -> ValidatorOutcome {
    let declared_cents = to_cents(declared_spend);
    let sum_cents = to_cents(flight_cost_sum);
    let delta_cents = sum_cents - declared_cents;

    if delta_cents.abs() <= 1 {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "totals_match_sums",
            1.0,
            format!(
                "flight costs sum to {:.2} against declared {:.2}",
                flight_cost_sum, declared_spend
            ),
        ));
    }

    ValidatorOutcome::HardReject(ConfidenceComponent::new(
        "totals_match_sums",
        0.0,
        format!(
            "flight costs sum to {:.2} but the order declares {:.2} (delta {:.2})",
            flight_cost_sum,
            declared_spend,
            from_cents(delta_cents)
        ),
    ))
}

/// Zero-tolerance reconciliation of declared impressions against the flight
/// unit sum. Units are integers, so only an exact match passes.
pub fn total_impressions_match_flights(
    declared_impressions: u64,
    flight_unit_sum: u64,
) -> ValidatorOutcome {
    if declared_impressions == flight_unit_sum {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "total_impressions_match_flights",
            1.0,
            format!(
                "flight units sum to {} matching the declared total",
                flight_unit_sum
            ),
        ));
    }

    let delta = flight_unit_sum as i64 - declared_impressions as i64;
    ValidatorOutcome::HardReject(ConfidenceComponent::new(
        "total_impressions_match_flights",
        0.0,
        format!(
            "flight units sum to {} but the order declares {} (delta {})",
            flight_unit_sum, declared_impressions, delta
        ),
    ))
}

// --- Flight-level validators ---------------------------------------------

pub fn flight_dates(flight: &FlightRecord) -> ValidatorOutcome {
    let (score, notes) = match (flight.parsed_start(), flight.parsed_end()) {
        (Some(start), Some(end)) if start <= end => {
            (1.0, format!("{} to {} is correctly ordered", start, end))
        }
        (Some(start), Some(end)) => (0.0, format!("start {} is after end {}", start, end)),
        _ => (
            0.0,
            format!(
                "dates did not parse: start={:?} end={:?}",
                flight.start, flight.end
            ),
        ),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("flight_dates", score, notes))
}

pub fn flight_cpm_range(flight: &FlightRecord) -> ValidatorOutcome {
    let (score, notes) = match flight.rate_cpm {
        None => (0.6, "no rate on this flight".to_string()),
        Some(rate) if rate == 0.0 => (0.8, "zero rate: added-value flight".to_string()),
        Some(rate) if rate > 0.0 && rate <= 200.0 => {
            (1.0, format!("CPM {:.2} in nominal range", rate))
        }
        Some(rate) if rate <= 1000.0 => (0.7, format!("CPM {:.2} unusually high", rate)),
        Some(rate) => (0.3, format!("CPM {:.2} outside plausible range", rate)),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("flight_cpm_range", score, notes))
}

pub fn flight_units_range(flight: &FlightRecord) -> ValidatorOutcome {
    let (score, notes) = match flight.units {
        None => (0.6, "no units on this flight".to_string()),
        Some(0) => (0.8, "zero units".to_string()),
        Some(units) if units <= 1_000_000_000 => {
            (1.0, format!("{} units in plausible range", units))
        }
        Some(units) => (0.5, format!("{} units implausibly large", units)),
    };
    ValidatorOutcome::Continue(ConfidenceComponent::new("flight_units_range", score, notes))
}

/// Cost must equal CPM x units / 1000 to within 0.1%. Anything further off
/// is a hard parsing-error signal that rejects the whole flight.
pub fn flight_cost_consistency(flight: &FlightRecord) -> ValidatorOutcome {
    let (Some(rate), Some(units), Some(cost)) = (flight.rate_cpm, flight.units, flight.cost)
    else {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "cost_cpm_consistency",
            0.7,
            "rate, units or cost missing; consistency not checkable",
        ));
    };

    let implied = rate * units as f64 / 1000.0;

    if implied == 0.0 {
        return if cost == 0.0 {
            ValidatorOutcome::Continue(ConfidenceComponent::new(
                "cost_cpm_consistency",
                1.0,
                "zero-cost flight matches zero implied cost",
            ))
        } else {
            ValidatorOutcome::HardReject(ConfidenceComponent::new(
                "cost_cpm_consistency",
                0.0,
                format!("implied cost 0.00 but flight carries cost {:.2}", cost),
            ))
        };
    }

    let deviation = (cost - implied).abs() / implied;

    if deviation < 0.001 {
        ValidatorOutcome::Continue(ConfidenceComponent::new(
            "cost_cpm_consistency",
            1.0,
            format!("cost {:.2} matches implied {:.2}", cost, implied),
        ))
    } else {
        ValidatorOutcome::HardReject(ConfidenceComponent::new(
            "cost_cpm_consistency",
            0.0,
            format!(
                "cost {:.2} vs implied {:.2} (delta {:.2}, {:.2}% deviation)",
                cost,
                implied,
                cost - implied,
                deviation * 100.0
            ),
        ))
    }
}

/// A flight escaping the campaign window is rejected outright.
pub fn flight_containment(
    flight: &FlightRecord,
    campaign_start: chrono::NaiveDate,
    campaign_end: chrono::NaiveDate,
) -> ValidatorOutcome {
    let (Some(start), Some(end)) = (flight.parsed_start(), flight.parsed_end()) else {
        return ValidatorOutcome::Continue(ConfidenceComponent::new(
            "campaign_period_containment",
            0.7,
            "flight dates unavailable; containment not checkable",
        ));
    };

    if start >= campaign_start && end <= campaign_end {
        ValidatorOutcome::Continue(ConfidenceComponent::new(
            "campaign_period_containment",
            1.0,
            format!(
                "{} to {} inside campaign window {} to {}",
                start, end, campaign_start, campaign_end
            ),
        ))
    } else {
        ValidatorOutcome::HardReject(ConfidenceComponent::new(
            "campaign_period_containment",
            0.0,
            format!(
                "{} to {} escapes campaign window {} to {}",
                start, end, campaign_start, campaign_end
            ),
        ))
    }
}

// --- Identity guard ------------------------------------------------------

/// Penalty multipliers for identity collisions between the parties named on
/// the order. A penalty scales the affected field's cross-field components;
/// it never overrides them.
#[derive(Debug, Clone)]
pub struct IdentityGuard {
    pub advertiser_multiplier: f64,
    pub agency_multiplier: f64,
    pub notes: Vec<String>,
}

impl IdentityGuard {
    pub fn multiplier_for(&self, field: &str) -> f64 {
        match field {
            "advertiser_name" => self.advertiser_multiplier,
            "agency_name" => self.agency_multiplier,
            _ => 1.0,
        }
    }
}

const SUSPICIOUS_LOCATIONS: &[&str] = &["supplier", "vendor", "publisher"];

pub fn identity_guard(
    advertiser_name: &str,
    agency_name: Option<&str>,
    resolved: &HashMap<&'static str, &Provenance>,
) -> IdentityGuard {
    let mut guard = IdentityGuard {
        advertiser_multiplier: 1.0,
        agency_multiplier: 1.0,
        notes: Vec::new(),
    };

    if let Some(agency) = agency_name {
        let collide = advertiser_name.trim().to_lowercase() == agency.trim().to_lowercase();
        if collide && !advertiser_name.trim().is_empty() {
            guard.advertiser_multiplier = 0.4;
            guard.agency_multiplier = 0.4;
            guard.notes.push(format!(
                "advertiser and agency share the name '{}'",
                advertiser_name.trim()
            ));
        }
    }

    for (field, multiplier) in [("advertiser_name", &mut guard.advertiser_multiplier), ("agency_name", &mut guard.agency_multiplier)] {
        let Some(hint) = resolved
            .get(field)
            .and_then(|p| p.location_hint.as_deref())
        else {
            continue;
        };

        let lowered = hint.to_lowercase();
        if let Some(keyword) = SUSPICIOUS_LOCATIONS.iter().find(|k| lowered.contains(**k)) {
            *multiplier = multiplier.min(0.5);
            guard
                .notes
                .push(format!("{} located near '{}' text", field, keyword));
        }
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(rate: Option<f64>, units: Option<u64>, cost: Option<f64>) -> FlightRecord {
        FlightRecord {
            index: None,
            placement_id: Some("P-1".to_string()),
            name: None,
            start: Some("2025-09-01".to_string()),
            end: Some("2025-09-30".to_string()),
            units,
            unit_type: None,
            rate_cpm: rate,
            cost_method: None,
            cost,
            currency: None,
            provenance: None,
        }
    }

    fn prov(field: &str, hint: Option<&str>) -> Provenance {
        Provenance {
            field: Some(field.to_string()),
            quote: None,
            location_hint: hint.map(|h| h.to_string()),
            find_confidence: None,
            value_confidence: None,
            rationale: None,
        }
    }

    #[test]
    fn test_format_validators() {
        assert_eq!(budget_format(Some(10_000.0)).component().score, 1.0);
        assert_eq!(budget_format(Some(0.0)).component().score, 0.0);
        assert_eq!(budget_format(None).component().score, 0.0);

        assert_eq!(impressions_format(Some(1_000_000)).component().score, 1.0);
        assert_eq!(impressions_format(Some(500)).component().score, 0.0);

        assert_eq!(currency_format("USD").component().score, 1.0);
        assert_eq!(currency_format("usd").component().score, 0.0);
        assert_eq!(currency_format("DOLLARS").component().score, 0.0);
    }

    #[test]
    fn test_po_number_format() {
        assert_eq!(po_number_format(Some("O-57GQ7-R4")).component().score, 1.0);
        assert_eq!(po_number_format(Some("40104.1")).component().score, 1.0);
        assert_eq!(po_number_format(Some("CP32K5B")).component().score, 1.0);
        assert_eq!(po_number_format(Some("Q%7")).component().score, 0.5);
        assert_eq!(po_number_format(Some("order")).component().score, 0.0);
        assert_eq!(po_number_format(None).component().score, 0.0);
    }

    #[test]
    fn test_date_ordering() {
        let window = DateWindow {
            start: Some("2025-09-01".to_string()),
            end: Some("2025-12-31".to_string()),
        };
        assert_eq!(date_ordering(&window).component().score, 1.0);

        let inverted = DateWindow {
            start: Some("2025-12-31".to_string()),
            end: Some("2025-09-01".to_string()),
        };
        assert_eq!(date_ordering(&inverted).component().score, 0.0);

        let garbled = DateWindow {
            start: Some("sometime".to_string()),
            end: Some("2025-12-31".to_string()),
        };
        assert_eq!(date_ordering(&garbled).component().score, 0.0);
    }

    #[test]
    fn test_span_quality_tiers() {
        let score = |hint: Option<&str>| span_quality("total_campaign_spend", hint).component().score;

        assert_eq!(score(Some("Grand Total row")), 1.0);
        assert_eq!(score(Some("budget line")), 0.9);
        assert_eq!(score(Some("summary box")), 0.7);
        assert_eq!(score(Some("page 3 table")), 0.6);
        assert_eq!(score(Some("margin scribble")), 0.5);
        assert_eq!(score(None), 0.6);
    }

    #[test]
    fn test_numeric_triangle_bands() {
        // 10,000 budget at 10.00 CPM implies 1,000,000 impressions.
        let score = |impressions| {
            numeric_triangle(Some(10_000.0), Some(10.0), Some(impressions))
                .component()
                .score
        };

        assert_eq!(score(1_000_000), 1.0);
        assert_eq!(score(1_100_000), 0.8);
        assert_eq!(score(1_250_000), 0.5);
        assert_eq!(score(2_000_000), 0.2);

        let neutral = numeric_triangle(None, Some(10.0), Some(1_000_000));
        assert_eq!(neutral.component().score, 0.7);
    }

    #[test]
    fn test_totals_match_zero_tolerance() {
        let pass = totals_match_sums(700.0, 700.0);
        assert!(!pass.is_hard_reject());
        assert_eq!(pass.component().score, 1.0);

        // One cent off is within measurement tolerance.
        let near = totals_match_sums(700.00, 700.01);
        assert!(!near.is_hard_reject());

        let fail = totals_match_sums(700.00, 700.02);
        assert!(fail.is_hard_reject());
        assert!(fail.component().notes.contains("0.02"));
    }

    #[test]
    fn test_impressions_match_cites_delta() {
        let fail = total_impressions_match_flights(1_000_000, 999_990);
        assert!(fail.is_hard_reject());
        assert_eq!(fail.component().score, 0.0);
        assert!(fail.component().notes.contains("-10"));
        assert!(fail.component().notes.contains("999990"));
        assert!(fail.component().notes.contains("1000000"));

        let pass = total_impressions_match_flights(1_000_000, 1_000_000);
        assert_eq!(pass.component().score, 1.0);
    }

    #[test]
    fn test_cost_consistency_exact_and_off() {
        // 10.00 CPM x 100,000 units = 1,000.00.
        let exact = flight_cost_consistency(&flight(Some(10.0), Some(100_000), Some(1_000.0)));
        assert!(!exact.is_hard_reject());
        assert_eq!(exact.component().score, 1.0);

        let off = flight_cost_consistency(&flight(Some(10.0), Some(100_000), Some(1_001.0)));
        assert!(off.is_hard_reject());
        assert_eq!(off.component().score, 0.0);

        let missing = flight_cost_consistency(&flight(None, Some(100_000), Some(1_000.0)));
        assert!(!missing.is_hard_reject());
        assert_eq!(missing.component().score, 0.7);

        let added_value = flight_cost_consistency(&flight(Some(0.0), Some(50_000), Some(0.0)));
        assert_eq!(added_value.component().score, 1.0);
    }

    #[test]
    fn test_containment_gate() {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();

        let inside = flight(Some(10.0), Some(1000), Some(10.0));
        assert!(!flight_containment(&inside, start, end).is_hard_reject());

        let mut escaping = inside.clone();
        escaping.end = Some("2026-01-15".to_string());
        let outcome = flight_containment(&escaping, start, end);
        assert!(outcome.is_hard_reject());
        assert!(outcome.component().notes.contains("escapes"));
    }

    #[test]
    fn test_resolve_provenance_candidate_order() {
        let entries = vec![
            prov("advertiser", Some("header")),
            prov("advertiser_name", Some("advertiser block")),
            prov("budget", Some("totals row")),
        ];

        let resolved = resolve_provenance(&entries);

        // First candidate key wins even when a later entry matches an
        // earlier-listed alias.
        let advertiser = resolved.get("advertiser_name").unwrap();
        assert_eq!(advertiser.location_hint.as_deref(), Some("advertiser block"));

        let spend = resolved.get("total_campaign_spend").unwrap();
        assert_eq!(spend.location_hint.as_deref(), Some("totals row"));

        assert!(!resolved.contains_key("po_number"));
    }

    #[test]
    fn test_identity_guard_collision() {
        let resolved = HashMap::new();
        let guard = identity_guard("Taco Bell", Some("taco bell"), &resolved);
        assert_eq!(guard.advertiser_multiplier, 0.4);
        assert_eq!(guard.agency_multiplier, 0.4);
        assert!(!guard.notes.is_empty());
    }

    #[test]
    fn test_identity_guard_suspicious_location() {
        let entry = prov("advertiser_name", Some("supplier block"));
        let mut resolved: HashMap<&'static str, &Provenance> = HashMap::new();
        resolved.insert("advertiser_name", &entry);

        let guard = identity_guard("Taco Bell", Some("OMD"), &resolved);
        assert_eq!(guard.advertiser_multiplier, 0.5);
        assert_eq!(guard.agency_multiplier, 1.0);
    }
}
