// 🔤 Unit Format Classifier - Format tags and anomaly detection
// Pure functions over the unit designator string

use serde::{Deserialize, Serialize};

// ============================================================================
// FORMAT TAGS
// ============================================================================

/// UnitFormat - Fixed set of unit designator formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitFormat {
    /// No unit designator at all
    NoUnit,
    /// "UNIT 6"
    UnitPrefix,
    /// "APT 6"
    AptPrefix,
    /// "6"
    NumberOnly,
    /// "STE 100" (commercial)
    StePrefix,
    /// "BLDG J"
    Building,
    /// "# B-1234"
    HashB,
    /// "# 6"
    Hash,
    /// Anything else
    Other,
}

impl UnitFormat {
    /// Label used in flag reasons and summaries
    pub fn label(&self) -> &'static str {
        match self {
            UnitFormat::NoUnit => "no_unit",
            UnitFormat::UnitPrefix => "unit_format",
            UnitFormat::AptPrefix => "apt_format",
            UnitFormat::NumberOnly => "number_only",
            UnitFormat::StePrefix => "ste_format",
            UnitFormat::Building => "building_format",
            UnitFormat::HashB => "hash_b_format",
            UnitFormat::Hash => "hash_format",
            UnitFormat::Other => "other_format",
        }
    }

    /// Standard residential formats; everything else (except NoUnit)
    /// is anomalous
    pub fn is_standard(&self) -> bool {
        matches!(
            self,
            UnitFormat::UnitPrefix | UnitFormat::AptPrefix | UnitFormat::NumberOnly
        )
    }
}

/// Classify a unit designator into its format tag.
///
/// Rules are checked in order against the trimmed, upper-cased value;
/// a missing or empty value is NoUnit.
pub fn classify_unit(unit: Option<&str>) -> UnitFormat {
    let trimmed = match unit {
        Some(value) => value.trim(),
        None => return UnitFormat::NoUnit,
    };
    if trimmed.is_empty() {
        return UnitFormat::NoUnit;
    }

    let upper = trimmed.to_uppercase();

    if upper.starts_with("UNIT") {
        UnitFormat::UnitPrefix
    } else if upper.starts_with("APT") {
        UnitFormat::AptPrefix
    } else if upper.chars().all(|c| c.is_ascii_digit()) {
        UnitFormat::NumberOnly
    } else if upper.starts_with("STE") {
        UnitFormat::StePrefix
    } else if upper.contains("BLDG") || upper.contains("BUILDING") {
        UnitFormat::Building
    } else if upper.starts_with('#') && upper.contains("B-") {
        UnitFormat::HashB
    } else if upper.starts_with('#') {
        UnitFormat::Hash
    } else {
        UnitFormat::Other
    }
}

// ============================================================================
// ANOMALY DETECTION
// ============================================================================

/// UnitAnomaly - Non-residential facility embedded in a residential
/// community (leasing office, clubhouse, commercial suite)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitAnomaly {
    /// OFC / OFFICE / CLUBHOUSE / LEASING / CLUB
    Office,
    /// STE / SUITE
    Suite,
}

/// Keywords marking office and clubhouse facilities
const OFFICE_KEYWORDS: [&str; 5] = ["OFC", "OFFICE", "CLUBHOUSE", "LEASING", "CLUB"];

/// Detect an anomalous unit designator.
///
/// Case-insensitive on the trimmed value; a missing value is never
/// anomalous. Independent of the format tag: "STE 100" is both
/// StePrefix and a Suite anomaly.
pub fn detect_anomaly(unit: Option<&str>) -> Option<UnitAnomaly> {
    let upper = unit?.trim().to_uppercase();

    if OFFICE_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
        return Some(UnitAnomaly::Office);
    }

    if upper.contains("STE") || upper.contains("SUITE") {
        return Some(UnitAnomaly::Suite);
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================
