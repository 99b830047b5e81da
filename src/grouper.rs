// 🗂️ Community Grouper - Partition ROE candidates by community
// Groups keyed by (Subname, Building Type) with a defined intra-group order

use crate::record::{AddressRecord, BuildingCategory, NO_SUBNAME};
use std::collections::BTreeMap;

// ============================================================================
// COMMUNITY GROUP
// ============================================================================

/// One community: all ROE-candidate records sharing (Subname, Building Type)
#[derive(Debug, Clone)]
pub struct CommunityGroup {
    pub subname: String,
    pub category: BuildingCategory,
    pub records: Vec<AddressRecord>,
}

// ============================================================================
// GROUPING
// ============================================================================

/// Partition ROE-candidate records into community groups.
///
/// Non-candidate categories are ignored. Groups come back ordered by
/// (subname, category); within a group records keep input order, except
/// "No Subname" groups, which are sorted by street name (street address
/// when no street name is present) so physically adjacent addresses are
/// considered together.
pub fn group_candidates(records: &[AddressRecord]) -> Vec<CommunityGroup> {
    // Keyed by display name so groups come out in the same order the
    // source data spells the types ("HOA" before "SFA")
    let mut groups: BTreeMap<(String, &'static str), (BuildingCategory, Vec<AddressRecord>)> =
        BTreeMap::new();

    for record in records {
        if !record.category.is_roe_candidate() {
            continue;
        }
        groups
            .entry((record.subname.clone(), record.category.name()))
            .or_insert_with(|| (record.category, Vec::new()))
            .1
            .push(record.clone());
    }

    groups
        .into_iter()
        .map(|((subname, _), (category, mut records))| {
            if subname == NO_SUBNAME {
                // Stable sort keeps input order for equal street keys
                records.sort_by(|a, b| a.street_sort_key().cmp(b.street_sort_key()));
            }
            CommunityGroup {
                subname,
                category,
                records,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, street: &str, category: BuildingCategory, subname: &str) -> AddressRecord {
        AddressRecord {
            id: id.to_string(),
            street_address: street.to_string(),
            unit_number: None,
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
    fn test_non_candidates_excluded() {
        let records = vec![
            make_record("1", "1 Oak St", BuildingCategory::Residential, "Oakwood"),
            make_record("2", "2 Oak St", BuildingCategory::Commercial, "Oakwood"),
            make_record("3", "3 Oak St", BuildingCategory::Sfa, "Oakwood"),
        ];

        let groups = group_candidates(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].records.len(), 1);
        assert_eq!(groups[0].records[0].id, "3");
    }

    #[test]
    fn test_split_by_subname_and_category() {
        let records = vec![
            make_record("1", "1 Oak St", BuildingCategory::Sfa, "Oakwood"),
            make_record("2", "2 Oak St", BuildingCategory::Hoa, "Oakwood"),
            make_record("3", "3 Elm St", BuildingCategory::Sfa, "Elmwood"),
            make_record("4", "4 Oak St", BuildingCategory::Sfa, "Oakwood"),
        ];

        let groups = group_candidates(&records);
        assert_eq!(groups.len(), 3);

        // Ordered by subname, then building type display name
        assert_eq!(groups[0].subname, "Elmwood");
        assert_eq!(groups[1].subname, "Oakwood");
        assert_eq!(groups[2].subname, "Oakwood");
        assert_eq!(groups[1].category, BuildingCategory::Hoa);
        assert_eq!(groups[2].category, BuildingCategory::Sfa);

        // Input order preserved inside a named group
        let sfa_oakwood = &groups[2];
        let ids: Vec<&str> = sfa_oakwood.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_no_subname_sorted_by_street_name() {
        let mut a = make_record("1", "500 Zebra Way", BuildingCategory::Sfa, NO_SUBNAME);
        a.street_name = Some("Zebra Way".to_string());
        let mut b = make_record("2", "10 Acorn Ln", BuildingCategory::Sfa, NO_SUBNAME);
        b.street_name = Some("Acorn Ln".to_string());

        // Input order has Zebra before Acorn; grouper must reorder
        let groups = group_candidates(&[a, b]);
        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_no_subname_falls_back_to_street_address() {
        // No street names at all: street address decides the order
        let a = make_record("1", "90 Walnut St", BuildingCategory::Hoa, NO_SUBNAME);
        let b = make_record("2", "12 Birch Rd", BuildingCategory::Hoa, NO_SUBNAME);

        let groups = group_candidates(&[a, b]);
        let ids: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_named_groups_not_reordered() {
        let mut a = make_record("1", "500 Zebra Way", BuildingCategory::Sfa, "Oakwood");
        a.street_name = Some("Zebra Way".to_string());
        let mut b = make_record("2", "10 Acorn Ln", BuildingCategory::Sfa, "Oakwood");
        b.street_name = Some("Acorn Ln".to_string());

        let groups = group_candidates(&[a, b]);
        let ids: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
