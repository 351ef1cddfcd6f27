//! Document-level normalization: applies flight segmentation to every line
//! item while leaving the declared order totals untouched. Proration moves
//! value between months inside a flight, never between the document header
//! and its flights.

use log::{debug, info};

use crate::schema::{NormalizedDocument, ParsedDocument};
use crate::segmenter::segment_flight;

/// Segment every flight of the document, preserving original flight order.
///
/// Each flight that was actually split gets a processing note appended to
/// `explanation.assumptions` citing the placement, the original range and
/// the number of segments, so the proration is auditable downstream.
pub fn normalize_document(document: &ParsedDocument) -> NormalizedDocument {
    let mut segments = Vec::new();
    let mut explanation = document.explanation.clone();
    let mut split_count = 0usize;

    for flight in &document.flights {
        let flight_segments = segment_flight(flight);

        if flight_segments.len() > 1 {
            split_count += 1;
            explanation.assumptions.push(format!(
                "Flight {} ({} to {}) crosses a month boundary; prorated into {} segments by active days",
                flight.label(),
                flight.start.as_deref().unwrap_or("?"),
                flight.end.as_deref().unwrap_or("?"),
                flight_segments.len(),
            ));
        }

        segments.extend(flight_segments);
    }

    info!(
        "Normalized insertion order for {}: {} flights -> {} segments ({} split)",
        document.advertiser_name,
        document.flights.len(),
        segments.len(),
        split_count,
    );
    debug!(
        "Declared totals carried through unchanged: spend={:?}, impressions={:?}",
        document.total_campaign_spend, document.total_contracted_impressions,
    );

    NormalizedDocument {
        advertiser_name: document.advertiser_name.clone(),
        agency_name: document.agency_name.clone(),
        campaign_total_flight: document.campaign_total_flight.clone(),
        total_contracted_impressions: document.total_contracted_impressions,
        total_campaign_spend: document.total_campaign_spend,
        currency: document.currency.clone(),
        po_number: document.po_number.clone(),
        account_executive_name: document.account_executive_name.clone(),
        frequency_cap: document.frequency_cap,
        period: document.period.clone(),
        flights: segments,
        explanation,
        provenance: document.provenance.clone(),
    }
}
