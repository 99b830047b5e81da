// 📊 Aggregator - Merge community decisions into the final categories
// Routes non-ROE categories, merges keep/remove/flag outputs, orders the
// ROE sheet with spacers and unit counts, and computes the summary

use crate::engine::{process_community, FlagEntry, SorterConfig};
use crate::grouper::group_candidates;
use crate::record::{AddressRecord, BuildingCategory};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One row of the ROE presentation: either a kept record or a blank
/// spacer between communities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoeRow {
    /// Blank separator row between communities
    Spacer,
    Entry(RoeEntry),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoeEntry {
    pub record: AddressRecord,

    /// Community address count, present only on the first row of each
    /// community
    pub community_unit_count: Option<usize>,
}

/// One line of the category count summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

/// CategoryResult - The terminal artifact of a run.
/// Built once from the merged decisions; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Every input record, unchanged
    pub all: Vec<AddressRecord>,

    /// Residential (non-MDU/SFA/HOA/Mobile)
    pub public: Vec<AddressRecord>,

    pub commercial: Vec<AddressRecord>,
    pub competitive: Vec<AddressRecord>,
    pub other: Vec<AddressRecord>,

    /// Kept ROE records, ordered and spaced for presentation
    pub roe: Vec<RoeRow>,

    /// Records removed by the rule engine
    pub remove: Vec<AddressRecord>,

    /// Review overlay: may reference records in any bucket, possibly
    /// more than once with different reasons
    pub flagged: Vec<FlagEntry>,

    /// Category count summary in presentation order
    pub summary: Vec<CategoryCount>,
}

impl CategoryResult {
    /// Kept ROE records (spacers skipped)
    pub fn roe_records(&self) -> impl Iterator<Item = &AddressRecord> {
        self.roe.iter().filter_map(|row| match row {
            RoeRow::Entry(entry) => Some(&entry.record),
            RoeRow::Spacer => None,
        })
    }

    pub fn roe_kept_count(&self) -> usize {
        self.roe_records().count()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Run the full sort: route base categories, process each ROE community
/// through the rule engine, and assemble the final result.
pub fn sort_addresses(records: &[AddressRecord], config: &SorterConfig) -> CategoryResult {
    info!("sorting {} addresses", records.len());

    let all: Vec<AddressRecord> = records.to_vec();
    let public = route(records, BuildingCategory::Residential);
    let commercial = route(records, BuildingCategory::Commercial);
    let competitive = route(records, BuildingCategory::Competitive);
    let other = route(records, BuildingCategory::Other);

    // Per-community decisions
    let mut keep_ids: HashSet<String> = HashSet::new();
    let mut remove_ids: HashSet<String> = HashSet::new();
    let mut flagged: Vec<FlagEntry> = Vec::new();

    for group in group_candidates(records) {
        info!(
            "processing {} ({}) - {} addresses",
            group.subname,
            group.category.name(),
            group.records.len()
        );

        let decision = process_community(&group.records, group.category, config);
        debug!(
            "{}: keeping {}, removing {}, flagging {}",
            group.subname,
            decision.keep.len(),
            decision.remove.len(),
            decision.flagged.len()
        );

        keep_ids.extend(decision.keep);
        remove_ids.extend(decision.remove);
        flagged.extend(decision.flagged);
    }

    // Split the candidates along the merged decision sets
    let mut kept: Vec<AddressRecord> = Vec::new();
    let mut remove: Vec<AddressRecord> = Vec::new();
    for record in records {
        if keep_ids.contains(&record.id) {
            kept.push(record.clone());
        } else if remove_ids.contains(&record.id) {
            remove.push(record.clone());
        }
    }

    // Presentation order: community, then street name (records without
    // one sort after those with one), then street address
    kept.sort_by(|a, b| {
        a.subname
            .cmp(&b.subname)
            .then_with(|| compare_street_names(a, b))
            .then_with(|| a.street_address.cmp(&b.street_address))
    });

    let roe = build_roe_rows(kept);

    let summary = build_summary(
        &all,
        &public,
        &commercial,
        &competitive,
        &other,
        &roe,
        &remove,
    );

    info!(
        "final ROE count: {}, remove count: {}, flagged: {}",
        roe.iter()
            .filter(|row| matches!(row, RoeRow::Entry(_)))
            .count(),
        remove.len(),
        flagged.len()
    );

    CategoryResult {
        all,
        public,
        commercial,
        competitive,
        other,
        roe,
        remove,
        flagged,
        summary,
    }
}

fn route(records: &[AddressRecord], category: BuildingCategory) -> Vec<AddressRecord> {
    records
        .iter()
        .filter(|r| r.category == category)
        .cloned()
        .collect()
}

fn compare_street_names(a: &AddressRecord, b: &AddressRecord) -> Ordering {
    match (&a.street_name, &b.street_name) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Interleave spacer rows between communities and attach each
/// community's address count to its first row
fn build_roe_rows(kept: Vec<AddressRecord>) -> Vec<RoeRow> {
    let mut community_counts: HashMap<String, usize> = HashMap::new();
    for record in &kept {
        *community_counts.entry(record.subname.clone()).or_insert(0) += 1;
    }

    let mut rows: Vec<RoeRow> = Vec::with_capacity(kept.len());
    let mut prev_subname: Option<String> = None;

    for record in kept {
        let first_in_community = prev_subname.as_deref() != Some(record.subname.as_str());
        if first_in_community && prev_subname.is_some() {
            rows.push(RoeRow::Spacer);
        }

        let community_unit_count = if first_in_community {
            community_counts.get(&record.subname).copied()
        } else {
            None
        };

        prev_subname = Some(record.subname.clone());
        rows.push(RoeRow::Entry(RoeEntry {
            record,
            community_unit_count,
        }));
    }

    rows
}

fn build_summary(
    all: &[AddressRecord],
    public: &[AddressRecord],
    commercial: &[AddressRecord],
    competitive: &[AddressRecord],
    other: &[AddressRecord],
    roe: &[RoeRow],
    remove: &[AddressRecord],
) -> Vec<CategoryCount> {
    let mut summary = Vec::new();
    let mut push = |label: &str, count: usize| {
        summary.push(CategoryCount {
            label: label.to_string(),
            count,
        });
    };

    push("Total", all.len());
    push("Public", public.len());
    push("Commercial", commercial.len());

    // Kept ROE per building type, alphabetical by display name
    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut roe_total = 0usize;
    for row in roe {
        if let RoeRow::Entry(entry) = row {
            *by_type.entry(entry.record.category.name()).or_insert(0) += 1;
            roe_total += 1;
        }
    }
    for (name, count) in by_type {
        push(&format!("ROE - {}", name), count);
    }
    push("ROE - Total", roe_total);

    push("Competitive", competitive.len());
    push("Other", other.len());
    push("Remove", remove.len());

    summary
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(
        id: &str,
        street: &str,
        unit: Option<&str>,
        category: BuildingCategory,
        subname: &str,
    ) -> AddressRecord {
        AddressRecord {
            id: id.to_string(),
            street_address: street.to_string(),
            unit_number: unit.map(|u| u.to_string()),
            category,
            subname: subname.to_string(),
            city: None,
            zip: None,
            plus4: None,
            zone: None,
            street_name: None,
        }
    }

    #[test]
    fn test_base_category_routing() {
        let records = vec![
            make_record("1", "1 A St", None, BuildingCategory::Residential, "X"),
            make_record("2", "2 A St", None, BuildingCategory::Commercial, "X"),
            make_record("3", "3 A St", None, BuildingCategory::Competitive, "X"),
            make_record("4", "4 A St", None, BuildingCategory::Other, "X"),
            make_record("5", "5 A St", None, BuildingCategory::Sfa, "X"),
        ];

        let result = sort_addresses(&records, &SorterConfig::default());

        assert_eq!(result.all.len(), 5);
        assert_eq!(result.public.len(), 1);
        assert_eq!(result.public[0].id, "1");
        assert_eq!(result.commercial.len(), 1);
        assert_eq!(result.competitive.len(), 1);
        assert_eq!(result.other.len(), 1);
        assert_eq!(result.roe_kept_count(), 1);
        assert!(result.remove.is_empty());
    }

    #[test]
    fn test_commercial_five_digit_plus4_untouched() {
        // The Plus 4 screen lives inside ROE processing; a Commercial
        // record never reaches it
        let mut record = make_record("1", "1 A St", None, BuildingCategory::Commercial, "X");
        record.plus4 = Some("12345".to_string());

        let result = sort_addresses(&[record], &SorterConfig::default());

        assert_eq!(result.commercial.len(), 1);
        assert!(result.remove.is_empty());
    }

    #[test]
    fn test_spacer_and_unit_count_invariant() {
        let mut records: Vec<AddressRecord> = (0..12)
            .map(|i| {
                make_record(
                    &format!("a{}", i),
                    "100 Alpha St",
                    Some(&format!("APT {}", i)),
                    BuildingCategory::ResidentialMdu,
                    "Alpha",
                )
            })
            .collect();
        for i in 0..3 {
            records.push(make_record(
                &format!("b{}", i),
                &format!("{} Beta St", i),
                None,
                BuildingCategory::Sfa,
                "Beta",
            ));
        }

        let result = sort_addresses(&records, &SorterConfig::default());

        // 12 Alpha rows, one spacer, 3 Beta rows
        assert_eq!(result.roe.len(), 16);

        let first_alpha = match &result.roe[0] {
            RoeRow::Entry(entry) => entry,
            RoeRow::Spacer => panic!("first row must be a record"),
        };
        assert_eq!(first_alpha.record.subname, "Alpha");
        assert_eq!(first_alpha.community_unit_count, Some(12));

        // Remaining Alpha rows carry no count
        for row in &result.roe[1..12] {
            match row {
                RoeRow::Entry(entry) => assert_eq!(entry.community_unit_count, None),
                RoeRow::Spacer => panic!("unexpected spacer inside a community"),
            }
        }

        assert!(matches!(result.roe[12], RoeRow::Spacer));

        let first_beta = match &result.roe[13] {
            RoeRow::Entry(entry) => entry,
            RoeRow::Spacer => panic!("expected Beta's first record after the spacer"),
        };
        assert_eq!(first_beta.record.subname, "Beta");
        assert_eq!(first_beta.community_unit_count, Some(3));
    }

    #[test]
    fn test_roe_ordering_by_subname_then_street() {
        let mut r1 = make_record("1", "300 Oak St", None, BuildingCategory::Sfa, "Zeta");
        r1.street_name = Some("Oak St".to_string());
        let mut r2 = make_record("2", "100 Elm St", None, BuildingCategory::Sfa, "Alpha");
        r2.street_name = Some("Elm St".to_string());
        let mut r3 = make_record("3", "200 Ash St", None, BuildingCategory::Sfa, "Alpha");
        r3.street_name = Some("Ash St".to_string());

        let result = sort_addresses(&[r1, r2, r3], &SorterConfig::default());

        let ids: Vec<&str> = result.roe_records().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_summary_counts_and_order() {
        let mut records = vec![
            make_record("p1", "1 A St", None, BuildingCategory::Residential, "X"),
            make_record("c1", "2 A St", None, BuildingCategory::Commercial, "X"),
            make_record("s1", "3 A St", None, BuildingCategory::Sfa, "South"),
            make_record("h1", "4 A St", None, BuildingCategory::Hoa, "North"),
        ];
        // An SFA street with both versions: the unit-bearing copy is removed
        records.push(make_record(
            "s2",
            "3 A St",
            Some("UNIT 1"),
            BuildingCategory::Sfa,
            "South",
        ));

        let result = sort_addresses(&records, &SorterConfig::default());

        let labels: Vec<&str> = result.summary.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Total",
                "Public",
                "Commercial",
                "ROE - HOA",
                "ROE - SFA",
                "ROE - Total",
                "Competitive",
                "Other",
                "Remove",
            ]
        );

        let count_of = |label: &str| {
            result
                .summary
                .iter()
                .find(|c| c.label == label)
                .map(|c| c.count)
                .unwrap_or(usize::MAX)
        };
        assert_eq!(count_of("Total"), 5);
        assert_eq!(count_of("Public"), 1);
        assert_eq!(count_of("Commercial"), 1);
        assert_eq!(count_of("ROE - HOA"), 1);
        assert_eq!(count_of("ROE - SFA"), 1);
        assert_eq!(count_of("ROE - Total"), 2);
        assert_eq!(count_of("Remove"), 1);
    }

    #[test]
    fn test_flags_are_an_overlay_on_remove() {
        // One-off scenario: the lone bare record is removed AND flagged
        let mut records: Vec<AddressRecord> = (0..12)
            .map(|i| {
                make_record(
                    &format!("u{}", i),
                    "100 Oak St",
                    Some(&format!("APT {}", i)),
                    BuildingCategory::ResidentialMdu,
                    "Oakwood",
                )
            })
            .collect();
        records.push(make_record(
            "bare",
            "200 Elm St",
            None,
            BuildingCategory::ResidentialMdu,
            "Oakwood",
        ));

        let result = sort_addresses(&records, &SorterConfig::default());

        assert!(result.remove.iter().any(|r| r.id == "bare"));
        assert_eq!(result.flagged.len(), 1);
        assert_eq!(result.flagged[0].record.id, "bare");
        assert!(result.flagged[0].reason.starts_with("One-off"));
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_category() {
        let records = vec![
            make_record("1", "1 A St", None, BuildingCategory::Residential, "X"),
            make_record("2", "2 A St", None, BuildingCategory::Commercial, "X"),
            make_record("3", "3 A St", None, BuildingCategory::Sfa, "South"),
            make_record("4", "3 A St", Some("UNIT 1"), BuildingCategory::Sfa, "South"),
            make_record("5", "5 A St", Some("OFC"), BuildingCategory::Hoa, "North"),
            make_record("6", "6 A St", None, BuildingCategory::Mobile, "Park"),
        ];

        let result = sort_addresses(&records, &SorterConfig::default());

        let mut seen: Vec<String> = Vec::new();
        seen.extend(result.public.iter().map(|r| r.id.clone()));
        seen.extend(result.commercial.iter().map(|r| r.id.clone()));
        seen.extend(result.competitive.iter().map(|r| r.id.clone()));
        seen.extend(result.other.iter().map(|r| r.id.clone()));
        seen.extend(result.roe_records().map(|r| r.id.clone()));
        seen.extend(result.remove.iter().map(|r| r.id.clone()));

        seen.sort();
        let expected: Vec<String> = (1..=6).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_same_subname_across_types_shares_one_block() {
        // Same community name under two building types: one presentation
        // block, one count covering both
        let records = vec![
            make_record("1", "1 A St", None, BuildingCategory::Sfa, "Shared"),
            make_record("2", "2 A St", None, BuildingCategory::Hoa, "Shared"),
        ];

        let result = sort_addresses(&records, &SorterConfig::default());

        assert_eq!(result.roe.len(), 2);
        let first = match &result.roe[0] {
            RoeRow::Entry(entry) => entry,
            RoeRow::Spacer => panic!("no spacer expected"),
        };
        assert_eq!(first.community_unit_count, Some(2));
        let second = match &result.roe[1] {
            RoeRow::Entry(entry) => entry,
            RoeRow::Spacer => panic!("no spacer expected"),
        };
        assert_eq!(second.community_unit_count, None);
    }
}
