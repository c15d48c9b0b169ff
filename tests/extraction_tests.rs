use leadliftr::extract::batch::BULK_MAX_LEADS;
use leadliftr::extract::{BatchProcessor, DataExtractor, PageAnalyzer};
use leadliftr::mapping::{apply_preset, parse_max_leads, resolve, ExportOptions, FieldMapping, PresetLibrary};
use leadliftr::mapping::DEFAULT_MAX_LEADS;
use proptest::prelude::*;

mod test_data;
use test_data::*;

fn crm_rows() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new("name", "Name", ".name"),
        FieldMapping::new("email", "Email", ".email"),
        FieldMapping::new("phone", "Phone", ".phone"),
        FieldMapping::new("company", "Company", ".company"),
    ]
}

#[test]
fn test_table_extraction_cleans_and_keeps_positions() {
    let request = resolve(&crm_rows(), "tr.lead-row", "100", ExportOptions::default());
    let leads = DataExtractor::new().unwrap().extract_leads(CRM_TABLE_HTML, &request).unwrap();

    assert_eq!(leads.len(), 2);

    let ada = &leads[0];
    assert_eq!(ada.extraction_index, 1);
    assert_eq!(ada.get("name"), Some("Ada Lovelace"));
    assert_eq!(ada.get("email"), Some("ada@example.com"));
    assert_eq!(ada.get("phone"), Some("(555) 123-4567"));
    assert_eq!(ada.get("company"), Some("Analytical Engines"));

    let grace = &leads[1];
    assert_eq!(grace.extraction_index, 3);
    assert_eq!(grace.get("name"), Some("Grace Hopper"));
    assert_eq!(grace.get("phone"), None);
}

#[test]
fn test_max_leads_bounds_containers_not_results() {
    // The first two containers yield one valid lead between them.
    let request = resolve(&crm_rows(), "tr.lead-row", "2", ExportOptions::default());
    let leads = DataExtractor::new().unwrap().extract_leads(CRM_TABLE_HTML, &request).unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].extraction_index, 1);
}

#[test]
fn test_whole_document_without_container() {
    let rows = vec![FieldMapping::new("email", "Email", ".email")];
    let request = resolve(&rows, "", "", ExportOptions::default());
    let leads = DataExtractor::new().unwrap().extract_leads(CRM_TABLE_HTML, &request).unwrap();

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].get("email"), Some("ada@example.com"));
    assert_eq!(leads[0].extraction_index, 1);
}

#[test]
fn test_ringy_preset_bulk_batches() {
    let library = PresetLibrary::builtin();
    let preset = library.get("ringy").unwrap();
    let rows = apply_preset(preset);
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["first_name", "last_name", "number", "city", "state", "zip_code"]);

    let request = resolve(&rows, &preset.container_selector, "", ExportOptions::default());
    let processor = BatchProcessor::new(1).unwrap();
    let batches = processor.batches(RINGY_TABLE_HTML, &request, BULK_MAX_LEADS).unwrap();

    // The empty row produces no lead but still occupies a batch slot.
    assert_eq!(batches.len(), 3);
    assert!(batches[2].is_empty());

    let john = &batches[0][0];
    assert_eq!(john.get("first_name"), Some("John"));
    assert_eq!(john.get("last_name"), Some("Smith"));
    assert_eq!(john.get("number"), Some("555 201 3344"));
    assert_eq!(john.get("city"), Some("New York"));
    assert_eq!(john.get("zip_code"), Some("10001-AB"));

    let maria = &batches[1][0];
    assert_eq!(maria.extraction_index, 2);
    assert_eq!(maria.get("last_name"), Some("Garcia"));
}

#[test]
fn test_analyzer_suggests_cards() {
    let analysis = PageAnalyzer::new().unwrap().analyze(CONTACT_CARDS_HTML);

    let contact = analysis
        .potential_containers
        .iter()
        .find(|c| c.selector == ".contact")
        .unwrap();
    assert_eq!(contact.count, 2);

    let names = analysis.field_suggestions.get("name").unwrap();
    assert_eq!(names[0].selector, "[data-field=\"name\"]");
    assert_eq!(names[0].sample_value, "Ada Lovelace");
    assert!(analysis.analysis.has_data_attributes);
}

proptest! {
    #[test]
    fn prop_resolve_drops_blank_rows(
        rows in prop::collection::vec(("[a-z_ ]{0,8}", "[.a-z ]{0,8}"), 0..12)
    ) {
        let rows: Vec<FieldMapping> = rows
            .into_iter()
            .map(|(name, selector)| FieldMapping::new(name, "", selector))
            .collect();
        let request = resolve(&rows, "", "", ExportOptions::default());

        for (name, selector) in request.field_mappings.iter() {
            prop_assert!(!name.is_empty());
            prop_assert_eq!(name, name.trim());
            prop_assert!(!selector.selector().is_empty());
        }

        // Last write wins for a repeated name.
        for (name, selector) in request.field_mappings.iter() {
            let last = rows
                .iter()
                .filter(|r| r.name.trim() == name && !r.selector.trim().is_empty())
                .last()
                .unwrap();
            prop_assert_eq!(selector.selector(), last.selector.trim());
        }
    }

    #[test]
    fn prop_resolve_is_idempotent(
        rows in prop::collection::vec(("[a-z]{0,4}", "[.a-z]{0,4}"), 0..8),
        container in "[ .a-z]{0,6}",
        max_leads in "[0-9a-z-]{0,4}"
    ) {
        let rows: Vec<FieldMapping> = rows
            .into_iter()
            .map(|(name, selector)| FieldMapping::new(name, "", selector))
            .collect();

        let first = resolve(&rows, &container, &max_leads, ExportOptions::default());
        let second = resolve(&rows, &container, &max_leads, ExportOptions::default());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_max_leads_is_always_positive(raw in ".{0,12}") {
        prop_assert!(parse_max_leads(&raw) > 0);
    }

    #[test]
    fn prop_max_leads_reads_leading_digits(n in 1usize..1_000_000, suffix in "[a-z ]{0,5}") {
        prop_assert_eq!(parse_max_leads(&format!("  {}{}", n, suffix)), n);
    }
}

#[test]
fn test_unusable_bounds_fall_back() {
    for raw in ["", "abc", "-5", "0", "   "] {
        assert_eq!(parse_max_leads(raw), DEFAULT_MAX_LEADS, "input {:?}", raw);
    }
}
