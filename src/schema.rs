use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{InsertionOrderError, Result};
use crate::utils::parse_flexible_date;

/// Source evidence attached to an extracted value.
///
/// The upstream parser reports where it found a value and how sure it is,
/// on a 0-100 scale for both locating the field and reading the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Provenance {
    #[serde(default)]
    #[schemars(
        description = "Canonical field this evidence belongs to (e.g. 'advertiser_name'). Omitted on flight-level provenance, where the owning flight is implicit."
    )]
    pub field: Option<String>,

    #[serde(default)]
    #[schemars(description = "Verbatim text quoted from the source document")]
    pub quote: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "Free-text description of where in the document the value was found (e.g. 'header', 'flight table', 'totals row')"
    )]
    pub location_hint: Option<String>,

    #[serde(default)]
    #[schemars(description = "0-100 confidence that the right field was located")]
    pub find_confidence: Option<f64>,

    #[serde(default)]
    #[schemars(description = "0-100 confidence that the value was read correctly")]
    pub value_confidence: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Parser's free-text justification for the extraction")]
    pub rationale: Option<String>,
}

/// A start/end pair of calendar dates, kept as strings so a malformed date
/// degrades a validator instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DateWindow {
    #[serde(default)]
    #[schemars(description = "Start date, YYYY-MM-DD preferred")]
    pub start: Option<String>,

    #[serde(default)]
    #[schemars(description = "End date, YYYY-MM-DD preferred")]
    pub end: Option<String>,
}

impl DateWindow {
    /// Both endpoints parsed, or None if either is missing or malformed.
    pub fn resolve(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = parse_flexible_date(self.start.as_deref()?)?;
        let end = parse_flexible_date(self.end.as_deref()?)?;
        Some((start, end))
    }
}

/// Narrative metadata the parser emits alongside the structured record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Explanation {
    #[serde(default)]
    #[schemars(description = "One-paragraph summary of the parsed order")]
    pub summary: Option<String>,

    #[serde(default)]
    #[schemars(description = "Assumptions made while parsing or normalizing")]
    pub assumptions: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Known omissions: content seen but not extracted")]
    pub omissions: Vec<String>,
}

/// One flight line item of an insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FlightRecord {
    #[serde(default)]
    #[schemars(description = "Line number within the order, if the document numbers its rows")]
    pub index: Option<u32>,

    #[serde(default)]
    #[schemars(description = "Placement or line-item identifier from the order")]
    pub placement_id: Option<String>,

    #[serde(default)]
    #[schemars(description = "Human-readable flight or placement name")]
    pub name: Option<String>,

    #[serde(default)]
    #[schemars(description = "Flight start date, YYYY-MM-DD preferred")]
    pub start: Option<String>,

    #[serde(default)]
    #[schemars(description = "Flight end date, YYYY-MM-DD preferred")]
    pub end: Option<String>,

    #[serde(default)]
    #[schemars(description = "Contracted impression units for this flight")]
    pub units: Option<u64>,

    #[serde(default)]
    #[schemars(description = "Unit of measure, e.g. 'impressions'")]
    pub unit_type: Option<String>,

    #[serde(default)]
    #[schemars(description = "Rate per thousand units. Zero for added-value flights")]
    pub rate_cpm: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Billing method, e.g. 'CPM', 'flat'")]
    pub cost_method: Option<String>,

    #[serde(default)]
    #[schemars(description = "Total cost of this flight. Zero for added-value flights")]
    pub cost: Option<f64>,

    #[serde(default)]
    #[schemars(description = "ISO 4217 currency code for the cost")]
    pub currency: Option<String>,

    #[serde(default)]
    #[schemars(description = "Evidence for this line item")]
    pub provenance: Option<Provenance>,
}

impl FlightRecord {
    pub fn parsed_start(&self) -> Option<NaiveDate> {
        parse_flexible_date(self.start.as_deref()?)
    }

    pub fn parsed_end(&self) -> Option<NaiveDate> {
        parse_flexible_date(self.end.as_deref()?)
    }

    /// Display handle for processing notes and diagnostics.
    pub fn label(&self) -> String {
        if let Some(id) = &self.placement_id {
            return id.clone();
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.index {
            Some(idx) => format!("line {}", idx),
            None => "unlabeled flight".to_string(),
        }
    }
}

/// A flight confined to a single calendar month, produced by segmentation.
/// Never authored directly by the upstream parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSegment {
    #[serde(flatten)]
    pub flight: FlightRecord,

    /// Inclusive day count of the segment's date range. Always positive.
    pub segment_days: i64,

    /// Share of the original flight's days this segment covers, in (0, 1].
    pub proration_factor: f64,
}

fn default_frequency_cap() -> u32 {
    2
}

/// One independent parse attempt of an insertion order document.
///
/// This is the wire contract handed to the structured-parsing service;
/// its JSON Schema (with the descriptions below) is exported via
/// [`ParsedDocument::schema_as_json`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParsedDocument {
    #[schemars(description = "Advertiser (client brand) legal or trading name")]
    pub advertiser_name: String,

    #[serde(default)]
    #[schemars(description = "Buying agency name, if the order was placed through one")]
    pub agency_name: Option<String>,

    #[serde(default)]
    #[schemars(description = "Overall campaign flight window declared on the order")]
    pub campaign_total_flight: DateWindow,

    #[serde(default)]
    #[schemars(description = "Declared total impressions across the whole order. Authoritative literal; never recomputed from flights")]
    pub total_contracted_impressions: Option<u64>,

    #[serde(default)]
    #[schemars(description = "Declared total spend across the whole order. Authoritative literal; never recomputed from flights")]
    pub total_campaign_spend: Option<f64>,

    #[serde(default)]
    #[schemars(description = "ISO 4217 currency code for order totals")]
    pub currency: Option<String>,

    #[serde(default)]
    #[schemars(description = "Purchase-order / order number printed on the document")]
    pub po_number: Option<String>,

    #[serde(default)]
    #[schemars(description = "Account executive named on the order")]
    pub account_executive_name: Option<String>,

    #[serde(default = "default_frequency_cap")]
    #[schemars(description = "Impression frequency cap per user, at least 1. Defaults to 2")]
    pub frequency_cap: u32,

    #[serde(default)]
    #[schemars(description = "Billing or reporting period, when distinct from the campaign flight")]
    pub period: DateWindow,

    #[schemars(description = "Flight line items in document order")]
    pub flights: Vec<FlightRecord>,

    #[serde(default)]
    #[schemars(description = "Narrative summary, assumptions and omissions")]
    pub explanation: Explanation,

    #[serde(default)]
    #[schemars(description = "Per-field evidence entries")]
    pub provenance: Vec<Provenance>,
}

impl ParsedDocument {
    /// Deserialize an upstream parse. A structurally invalid document is the
    /// one fatal error class in the pipeline.
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: ParsedDocument = serde_json::from_str(raw)
            .map_err(|e| InsertionOrderError::SchemaViolation(e.to_string()))?;
        doc.validate_required()?;
        Ok(doc)
    }

    pub fn validate_required(&self) -> Result<()> {
        if self.advertiser_name.trim().is_empty() {
            return Err(InsertionOrderError::SchemaViolation(
                "advertiser_name is empty".to_string(),
            ));
        }
        if self.frequency_cap < 1 {
            return Err(InsertionOrderError::SchemaViolation(
                "frequency_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Campaign window used for flight containment checks.
    pub fn campaign_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.campaign_total_flight.resolve()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ParsedDocument)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// The segmented document: identical top-level fields, with flights replaced
/// by month-aligned segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub advertiser_name: String,
    pub agency_name: Option<String>,
    pub campaign_total_flight: DateWindow,
    pub total_contracted_impressions: Option<u64>,
    pub total_campaign_spend: Option<f64>,
    pub currency: Option<String>,
    pub po_number: Option<String>,
    pub account_executive_name: Option<String>,
    pub frequency_cap: u32,
    pub period: DateWindow,
    pub flights: Vec<FlightSegment>,
    pub explanation: Explanation,
    pub provenance: Vec<Provenance>,
}

/// One scoring signal contributed by a validator or analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceComponent {
    pub name: String,
    pub score: f64,
    pub notes: String,
}

impl ConfidenceComponent {
    pub fn new(name: impl Into<String>, score: f64, notes: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score,
            notes: notes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Use,
    Review,
    Reject,
}

/// Scored verdict for one top-level field or one flight segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub field: String,
    pub confidence_score: f64,
    pub status: FieldStatus,
    pub components: Vec<ConfidenceComponent>,
    /// The field's value in each independent parse attempt. Empty for
    /// flight-level entries, which have no multi-run data.
    pub values_across_runs: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub use_count: usize,
    pub review_count: usize,
    pub reject_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall_score: f64,
    pub field_confidences: Vec<FieldConfidence>,
    pub summary: ReportSummary,
}

/// Final pipeline output: the segmented document with its attached report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedInsertionOrder {
    pub document: NormalizedDocument,
    pub confidence: ConfidenceReport,
}
