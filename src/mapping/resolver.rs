//! Turns the rows a user typed (or a preset loaded) into an [`ExtractionRequest`].
//!
//! Resolution never fails: unusable rows are dropped and an unusable bound
//! falls back to [`DEFAULT_MAX_LEADS`]. An empty mapping is a valid request
//! that will simply extract nothing.

use tracing::debug;

use super::{
    display_label, ExportOptions, ExtractionRequest, FieldMapping, FieldSelector, Preset, SelectorMap,
    DEFAULT_MAX_LEADS,
};

/// Validate and normalize mapping rows into a canonical request.
///
/// Names and selectors are trimmed; rows with either one empty are skipped.
/// A repeated name overwrites the earlier selector. Labels are display-only
/// and do not reach the request.
pub fn resolve(
    rows: &[FieldMapping],
    container_selector: &str,
    max_leads_raw: &str,
    export_options: ExportOptions,
) -> ExtractionRequest {
    let mut field_mappings = SelectorMap::new();

    for row in rows {
        let name = row.name.trim();
        let selector = row.selector.trim();
        if name.is_empty() || selector.is_empty() {
            continue;
        }
        if field_mappings
            .insert(name, FieldSelector::Css(selector.to_string()))
            .is_some()
        {
            debug!("Field '{}' mapped more than once, keeping the last selector", name);
        }
    }

    ExtractionRequest {
        field_mappings,
        container_selector: container_selector.trim().to_string(),
        max_leads: parse_max_leads(max_leads_raw),
        export_options,
    }
}

/// Parse a free-form bound the way a browser `parseInt` would: optional
/// leading whitespace and sign, then the leading run of digits. Anything that
/// does not produce a positive integer yields [`DEFAULT_MAX_LEADS`].
pub fn parse_max_leads(raw: &str) -> usize {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];

    if negative || digits.is_empty() {
        return DEFAULT_MAX_LEADS;
    }

    match digits.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_MAX_LEADS,
    }
}

/// Expand a preset into mapping rows.
///
/// A preset with an explicit field order emits exactly those fields in that
/// order; otherwise the mappings are emitted in the order they were defined.
/// Fields without a selector are skipped.
pub fn apply_preset(preset: &Preset) -> Vec<FieldMapping> {
    let order: Vec<&str> = match &preset.field_order {
        Some(order) => order.iter().map(String::as_str).collect(),
        None => preset.mappings.keys().collect(),
    };

    order
        .into_iter()
        .filter_map(|name| {
            let selector = preset.mappings.get(name)?;
            if selector.is_empty() {
                return None;
            }
            Some(FieldMapping::new(name, display_label(name), selector.as_str()))
        })
        .collect()
}
