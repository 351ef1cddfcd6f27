//! # Insertion Order Normalizer
//!
//! A library for normalizing LLM-extracted insertion order documents into
//! month-aligned flight segments with auditable confidence scoring.
//!
//! ## Core Concepts
//!
//! - **Parse attempt**: one structured record produced by the upstream
//!   extraction pipeline. The same source document is parsed independently
//!   several times (conventionally 3).
//! - **Segmentation**: any flight crossing a calendar month is split at the
//!   month boundaries, with cost and units prorated by active days. The last
//!   segment absorbs the rounding remainder, so aggregate totals reconstruct
//!   exactly.
//! - **Confidence scoring**: every top-level field and every flight segment
//!   gets a [0, 1] score and a use/review/reject status, blended from
//!   structural validators, cross-field checks, inter-run stability, and the
//!   parser's self-reported confidence.
//! - **Hard gates**: a flight whose cost contradicts its CPM x units, or
//!   that escapes the campaign window, is rejected outright regardless of
//!   its other components.
//!
//! The whole pipeline is a pure function of its inputs: no clocks, no
//! randomness, no I/O. Identical input yields a byte-identical report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use insertion_order_normalizer::{process_insertion_order, ParsedDocument};
//!
//! let parses: Vec<ParsedDocument> = raw_parses
//!     .iter()
//!     .map(|raw| ParsedDocument::from_json(raw))
//!     .collect::<Result<_, _>>()?;
//!
//! let processed = process_insertion_order(&parses, None)?;
//! println!("{}", processed.confidence.to_markdown());
//! ```

pub mod aggregator;
pub mod error;
pub mod normalizer;
pub mod order_number;
pub mod report;
pub mod schema;
pub mod segmenter;
pub mod stability;
pub mod utils;
pub mod validators;

pub use aggregator::score_document;
pub use error::{InsertionOrderError, Result};
pub use normalizer::normalize_document;
pub use report::build_report;
pub use schema::*;
pub use segmenter::segment_flight;
pub use stability::{stability_component, string_similarity};
pub use validators::{ValidatorOutcome, FIELD_LOOKUP};

use log::{debug, info};

pub struct InsertionOrderProcessor;

impl InsertionOrderProcessor {
    /// Run the full pipeline: validate the primary parse, segment its
    /// flights, score the result against every parse attempt, and attach
    /// the report.
    pub fn process(
        parses: &[ParsedDocument],
        override_cpm: Option<f64>,
    ) -> Result<ProcessedInsertionOrder> {
        let primary = parses.first().ok_or(InsertionOrderError::EmptyParseSet)?;
        primary.validate_required()?;

        info!(
            "Processing insertion order for {} ({} parse attempts, {} flights)",
            primary.advertiser_name,
            parses.len(),
            primary.flights.len()
        );

        let document = normalize_document(primary);
        let field_confidences = score_document(&document, parses, override_cpm);
        let confidence = build_report(field_confidences);

        debug!(
            "Report: overall {:.2}, use {}, review {}, reject {}",
            confidence.overall_score,
            confidence.summary.use_count,
            confidence.summary.review_count,
            confidence.summary.reject_count
        );

        Ok(ProcessedInsertionOrder {
            document,
            confidence,
        })
    }
}

pub fn process_insertion_order(
    parses: &[ParsedDocument],
    override_cpm: Option<f64>,
) -> Result<ProcessedInsertionOrder> {
    InsertionOrderProcessor::process(parses, override_cpm)
}
