// ⚖️ Per-Community Rule Engine - Keep/remove/flag decisions
// Eight sequential stages over one community's records; removed records
// never re-enter later stages

use crate::format::{classify_unit, detect_anomaly, UnitFormat};
use crate::record::{AddressRecord, BuildingCategory};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// SorterConfig - Tunable thresholds for the rule engine
///
/// Defaults carry the production values; load a JSON file to tune them
/// without touching the algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Communities larger than this get every record flagged for review
    #[serde(default = "default_oversize_threshold")]
    pub oversize_threshold: usize,

    /// Condo-style detection: at most this many distinct street addresses
    #[serde(default = "default_condo_max_unique_streets")]
    pub condo_max_unique_streets: usize,

    /// Condo-style detection: community must exceed this many records
    #[serde(default = "default_condo_min_records")]
    pub condo_min_records: usize,

    /// Condo-style detection: with-unit fraction must exceed this
    #[serde(default = "default_condo_unit_fraction")]
    pub condo_unit_fraction: f64,

    /// Isolated no-unit streets are removed when the community's
    /// with-unit fraction reaches this (assumed office/clubhouse)
    #[serde(default = "default_office_unit_fraction")]
    pub office_unit_fraction: f64,

    /// A format is a flaggable majority when it exceeds this fraction
    #[serde(default = "default_majority_fraction")]
    pub majority_fraction: f64,

    /// One-off override only fires in communities larger than this
    #[serde(default = "default_one_off_min_community")]
    pub one_off_min_community: usize,
}

fn default_oversize_threshold() -> usize {
    800
}

fn default_condo_max_unique_streets() -> usize {
    3
}

fn default_condo_min_records() -> usize {
    50
}

fn default_condo_unit_fraction() -> f64 {
    0.8
}

fn default_office_unit_fraction() -> f64 {
    0.8
}

fn default_majority_fraction() -> f64 {
    0.8
}

fn default_one_off_min_community() -> usize {
    10
}

impl Default for SorterConfig {
    fn default() -> Self {
        SorterConfig {
            oversize_threshold: default_oversize_threshold(),
            condo_max_unique_streets: default_condo_max_unique_streets(),
            condo_min_records: default_condo_min_records(),
            condo_unit_fraction: default_condo_unit_fraction(),
            office_unit_fraction: default_office_unit_fraction(),
            majority_fraction: default_majority_fraction(),
            one_off_min_community: default_one_off_min_community(),
        }
    }
}

impl SorterConfig {
    /// Load thresholds from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }
}

// ============================================================================
// DECISION TYPES
// ============================================================================

/// FlagEntry - Human-review annotation: the record plus a reason.
/// An overlay on keep/remove, never a category of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagEntry {
    pub record: AddressRecord,
    pub reason: String,
}

/// CommunityDecision - Output of one community's processing.
/// keep and remove are disjoint and together cover every input record.
#[derive(Debug, Clone, Default)]
pub struct CommunityDecision {
    pub keep: HashSet<String>,
    pub remove: HashSet<String>,
    pub flagged: Vec<FlagEntry>,
}

// ============================================================================
// RULE ENGINE
// ============================================================================

/// Run the staged decision procedure over one community's records.
///
/// Stages:
/// 1. anomalous unit designators removed outright (offices, clubhouses)
/// 2. malformed Plus 4 values removed (HOA / MDU / SFA only)
/// 3. oversize communities flagged, informational only
/// 4. condo-style detection (switches dedup policy, not the category)
/// 5. majority-format screen (declared MDU only): off-format records
///    flagged and excluded from dedup
/// 6. street-level dedup, MDU and SFA/HOA branches
/// 7. minority-format flag for non-MDU communities, post-dedup
/// 8. one-off override: a single odd record in a large community is
///    forced to remove and flagged
pub fn process_community(
    records: &[AddressRecord],
    category: BuildingCategory,
    config: &SorterConfig,
) -> CommunityDecision {
    let mut decision = CommunityDecision::default();

    // Stage 1: unit anomalies go straight to remove, no flag
    let mut survivors: Vec<&AddressRecord> = Vec::with_capacity(records.len());
    for record in records {
        if detect_anomaly(record.unit_number.as_deref()).is_some() {
            decision.remove.insert(record.id.clone());
        } else {
            survivors.push(record);
        }
    }
    if survivors.is_empty() {
        return decision;
    }

    // Stage 2: malformed Plus 4 screen. A 5-digit value (extensions are
    // 4 digits) or a value equal to the ZIP itself marks a placeholder
    // address, commonly a backyard or easement parcel.
    if matches!(
        category,
        BuildingCategory::Hoa | BuildingCategory::ResidentialMdu | BuildingCategory::Sfa
    ) {
        let mut remaining = Vec::with_capacity(survivors.len());
        for record in survivors {
            if plus4_is_malformed(record) {
                decision.remove.insert(record.id.clone());
            } else {
                remaining.push(record);
            }
        }
        survivors = remaining;
    }
    if survivors.is_empty() {
        return decision;
    }

    // Stage 3: oversize flag, informational only
    if survivors.len() > config.oversize_threshold {
        for record in &survivors {
            decision.flagged.push(FlagEntry {
                record: (*record).clone(),
                reason: format!(
                    "Community has {} addresses (>{} threshold)",
                    survivors.len(),
                    config.oversize_threshold
                ),
            });
        }
    }

    // Stage 4: condo-style detection. Attached/HOA housing that behaves
    // like a single multi-unit building gets the MDU dedup policy; the
    // declared category label is untouched.
    let is_mdu = category == BuildingCategory::ResidentialMdu;
    let unique_streets: HashSet<&str> = survivors
        .iter()
        .map(|r| r.street_address.as_str())
        .collect();
    let with_units = survivors.iter().filter(|r| r.has_unit()).count();
    let total = survivors.len();
    let is_condo_style = unique_streets.len() <= config.condo_max_unique_streets
        && with_units as f64 / total as f64 > config.condo_unit_fraction
        && total > config.condo_min_records;

    if is_condo_style && !is_mdu {
        debug!(
            "detected condo-style {} community, applying MDU dedup",
            category.name()
        );
    }

    // Format census over the stage-2 survivors; stages 5 and 7 both read
    // from this set
    let format_counts = count_formats(&survivors);

    // Stage 5: majority-format screen, declared MDU only. Condo-style
    // SFA/HOA communities deliberately skip this even though stage 6
    // treats them as MDU.
    if is_mdu && format_counts.len() > 1 {
        if let Some(majority) = majority_standard_format(&format_counts) {
            let mut remaining = Vec::with_capacity(survivors.len());
            for record in survivors {
                let format = classify_unit(record.unit_number.as_deref());
                if format != majority && format != UnitFormat::NoUnit {
                    let reason = if format.is_standard() {
                        format!(
                            "MDU minority format: {} (majority is {})",
                            format.label(),
                            majority.label()
                        )
                    } else {
                        format!(
                            "MDU anomalous format: {} (standard is {})",
                            format.label(),
                            majority.label()
                        )
                    };
                    decision.flagged.push(FlagEntry {
                        record: record.clone(),
                        reason,
                    });
                    // Excluded from dedup; lands in remove so the
                    // keep/remove partition stays exhaustive
                    decision.remove.insert(record.id.clone());
                } else {
                    remaining.push(record);
                }
            }
            survivors = remaining;
        }
    }
    if survivors.is_empty() {
        return decision;
    }

    // Stage 6: street-level deduplication
    let use_mdu_dedup = is_mdu || is_condo_style;
    let with_unit_total = survivors.iter().filter(|r| r.has_unit()).count();
    let percent_with_units = with_unit_total as f64 / survivors.len() as f64;

    for (_, street_records) in group_by_street(&survivors) {
        let (with_unit, no_unit): (Vec<&AddressRecord>, Vec<&AddressRecord>) =
            street_records.into_iter().partition(|r| r.has_unit());

        if use_mdu_dedup {
            // Each unit is a separate customer; a bare duplicate of a
            // unit-bearing street address is shared infrastructure
            if !with_unit.is_empty() && !no_unit.is_empty() {
                extend_ids(&mut decision.keep, &with_unit);
                extend_ids(&mut decision.remove, &no_unit);
            } else if !with_unit.is_empty() {
                extend_ids(&mut decision.keep, &with_unit);
            } else if percent_with_units >= config.office_unit_fraction {
                // Isolated bare street in a mostly unit-bearing
                // community: assumed office/clubhouse
                extend_ids(&mut decision.remove, &no_unit);
            } else {
                extend_ids(&mut decision.keep, &no_unit);
            }
        } else {
            // SFA/HOA: the bare address is canonical, unit-bearing
            // copies are duplicates
            if !with_unit.is_empty() && !no_unit.is_empty() {
                extend_ids(&mut decision.keep, &no_unit);
                extend_ids(&mut decision.remove, &with_unit);
            } else if !no_unit.is_empty() {
                extend_ids(&mut decision.keep, &no_unit);
            } else {
                extend_ids(&mut decision.keep, &with_unit);
            }
        }
    }

    // Stage 7: minority-format flag for non-MDU, non-condo communities.
    // Only records still unassigned after dedup qualify; stage 6 assigns
    // every survivor, so in practice this stage is vestigial. Kept
    // verbatim from the original rule set.
    if !is_mdu && !is_condo_style && format_counts.len() > 1 {
        let census_total: usize = format_counts.iter().map(|(_, count)| count).sum();
        if let Some((majority, majority_count)) = overall_majority_format(&format_counts) {
            if majority_count as f64 / census_total as f64 > config.majority_fraction {
                for record in &survivors {
                    if decision.keep.contains(&record.id) || decision.remove.contains(&record.id) {
                        continue;
                    }
                    let format = classify_unit(record.unit_number.as_deref());
                    if format != majority && format != UnitFormat::NoUnit {
                        decision.flagged.push(FlagEntry {
                            record: (*record).clone(),
                            reason: format!(
                                "Minority unit format ({}) vs majority ({})",
                                format.label(),
                                majority.label()
                            ),
                        });
                    }
                }
            }
        }
    }

    // Stage 8: one-off override. In a substantial community, exactly one
    // record on the wrong side of the unit/no-unit split is forced out,
    // overriding any prior keep.
    let total = survivors.len();
    let no_unit_count = survivors.iter().filter(|r| !r.has_unit()).count();
    let with_unit_count = total - no_unit_count;

    if total > config.one_off_min_community {
        if no_unit_count == 1 && with_unit_count > config.one_off_min_community {
            if let Some(lone) = survivors.iter().find(|r| !r.has_unit()) {
                decision.keep.remove(&lone.id);
                decision.remove.insert(lone.id.clone());
                decision.flagged.push(FlagEntry {
                    record: (*lone).clone(),
                    reason: format!(
                        "One-off: Single address without unit among {} with units",
                        with_unit_count
                    ),
                });
            }
        } else if with_unit_count == 1 && no_unit_count > config.one_off_min_community {
            if let Some(lone) = survivors.iter().find(|r| r.has_unit()) {
                decision.keep.remove(&lone.id);
                decision.remove.insert(lone.id.clone());
                decision.flagged.push(FlagEntry {
                    record: (*lone).clone(),
                    reason: format!(
                        "One-off: Single address with unit among {} without units",
                        no_unit_count
                    ),
                });
            }
        }
    }

    decision
}

// ============================================================================
// STAGE HELPERS
// ============================================================================

/// Stage 2 predicate: Plus 4 value is 5 numeric digits, or duplicates
/// the ZIP verbatim (extension was never actually assigned)
fn plus4_is_malformed(record: &AddressRecord) -> bool {
    let plus4 = match record.plus4.as_deref() {
        Some(value) => value.trim(),
        None => return false,
    };

    if plus4.len() == 5 && plus4.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    match record.zip.as_deref() {
        Some(zip) => plus4 == zip.trim(),
        None => false,
    }
}

/// Count format tags in first-encounter order
fn count_formats(records: &[&AddressRecord]) -> Vec<(UnitFormat, usize)> {
    let mut counts: Vec<(UnitFormat, usize)> = Vec::new();
    for record in records {
        let format = classify_unit(record.unit_number.as_deref());
        match counts.iter_mut().find(|(f, _)| *f == format) {
            Some((_, count)) => *count += 1,
            None => counts.push((format, 1)),
        }
    }
    counts
}

/// Most frequent standard format; ties break toward the format
/// encountered first in stage input order
fn majority_standard_format(counts: &[(UnitFormat, usize)]) -> Option<UnitFormat> {
    let mut best: Option<(UnitFormat, usize)> = None;
    for (format, count) in counts {
        if !format.is_standard() {
            continue;
        }
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((*format, *count));
        }
    }
    best.map(|(format, _)| format)
}

/// Most frequent format over the full census (NoUnit included);
/// first-encounter tie break
fn overall_majority_format(counts: &[(UnitFormat, usize)]) -> Option<(UnitFormat, usize)> {
    let mut best: Option<(UnitFormat, usize)> = None;
    for (format, count) in counts {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((*format, *count));
        }
    }
    best
}

/// Group survivors by street address, streets in first-encounter order
fn group_by_street<'a>(
    records: &[&'a AddressRecord],
) -> Vec<(&'a str, Vec<&'a AddressRecord>)> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_street: HashMap<&str, Vec<&AddressRecord>> = HashMap::new();
    for record in records {
        let street = record.street_address.as_str();
        if !by_street.contains_key(street) {
            order.push(street);
        }
        by_street.entry(street).or_default().push(record);
    }
    order
        .into_iter()
        .map(|street| {
            let group = by_street.remove(street).unwrap_or_default();
            (street, group)
        })
        .collect()
}

fn extend_ids(set: &mut HashSet<String>, records: &[&AddressRecord]) {
    for record in records {
        set.insert(record.id.clone());
    }
}

// ============================================================================
// TESTS
// ============================================================================
