// 🏠 Address Record Model - Core data types
// Immutable input records, building categories, and the subname sentinel

use serde::{Deserialize, Serialize};

/// Placeholder community name for records with no Subname value
pub const NO_SUBNAME: &str = "No Subname";

// ============================================================================
// BUILDING CATEGORY
// ============================================================================

/// BuildingCategory - Closed set of building types in the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingCategory {
    #[serde(rename = "Residential")]
    Residential,
    #[serde(rename = "Commercial")]
    Commercial,
    #[serde(rename = "Competitive")]
    Competitive,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Residential - MDU")]
    ResidentialMdu,
    #[serde(rename = "SFA")]
    Sfa,
    #[serde(rename = "HOA")]
    Hoa,
    #[serde(rename = "Mobile")]
    Mobile,
}

impl BuildingCategory {
    /// Display name matching the source data spelling
    pub fn name(&self) -> &'static str {
        match self {
            BuildingCategory::Residential => "Residential",
            BuildingCategory::Commercial => "Commercial",
            BuildingCategory::Competitive => "Competitive",
            BuildingCategory::Other => "Other",
            BuildingCategory::ResidentialMdu => "Residential - MDU",
            BuildingCategory::Sfa => "SFA",
            BuildingCategory::Hoa => "HOA",
            BuildingCategory::Mobile => "Mobile",
        }
    }

    /// Lenient parse for ingestion: case-insensitive, tolerant of spacing
    /// variants around the MDU dash
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_uppercase();
        match normalized.as_str() {
            "RESIDENTIAL" => Some(BuildingCategory::Residential),
            "COMMERCIAL" => Some(BuildingCategory::Commercial),
            "COMPETITIVE" => Some(BuildingCategory::Competitive),
            "OTHER" => Some(BuildingCategory::Other),
            "RESIDENTIAL - MDU" | "RESIDENTIAL-MDU" | "RESIDENTIAL MDU" | "MDU" => {
                Some(BuildingCategory::ResidentialMdu)
            }
            "SFA" => Some(BuildingCategory::Sfa),
            "HOA" => Some(BuildingCategory::Hoa),
            "MOBILE" => Some(BuildingCategory::Mobile),
            _ => None,
        }
    }

    /// ROE candidates go through the per-community rule engine;
    /// everything else is routed by simple equality in the aggregator
    pub fn is_roe_candidate(&self) -> bool {
        matches!(
            self,
            BuildingCategory::ResidentialMdu
                | BuildingCategory::Sfa
                | BuildingCategory::Hoa
                | BuildingCategory::Mobile
        )
    }
}

// ============================================================================
// ADDRESS RECORD
// ============================================================================

/// AddressRecord - One input row
///
/// Immutable once ingested: the engine classifies records, it never
/// mutates them. Optional fields are trimmed at ingestion and empty
/// strings are normalized to None, so `Some` always holds a non-empty
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Stable identity from the source data (unique per row)
    pub id: String,

    /// Street address (required)
    pub street_address: String,

    /// Unit designator, e.g. "APT 6" / "UNIT 6" / "6"
    pub unit_number: Option<String>,

    /// Building type from the source data
    pub category: BuildingCategory,

    /// Community name; NO_SUBNAME when the source value was blank
    pub subname: String,

    pub city: Option<String>,
    pub zip: Option<String>,

    /// Plus 4 Code - 4-digit ZIP extension; malformed values signal
    /// placeholder addresses
    pub plus4: Option<String>,

    pub zone: Option<String>,
    pub street_name: Option<String>,
}

impl AddressRecord {
    pub fn has_unit(&self) -> bool {
        self.unit_number.is_some()
    }

    /// Sort key for physical adjacency: street name when present,
    /// street address otherwise
    pub fn street_sort_key(&self) -> &str {
        self.street_name.as_deref().unwrap_or(&self.street_address)
    }
}

// ============================================================================
// TESTS
// ============================================================================
