//! Lead scrubbing: drops leads whose phone number is a landline, toll-free
//! or VOIP number, and optionally leads whose text suggests litigation risk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::extract::Lead;
use crate::mapping::SelectorMap;

/// Known landline exchanges, `NPA-NXX`.
pub const LANDLINE_PREFIXES: [&str; 53] = [
    "205-222", "205-333", "212-222", "305-222", "407-222", "415-222", "713-222", "312-222", "404-222", "503-222",
    "602-222", "702-222", "818-222", "919-222", "646-346", "718-455", "718-599", "914-220", "310-454", "212-555",
    "917-324", "516-466", "847-555", "630-620", "773-522", "312-698", "708-682", "815-759", "847-329", "203-234",
    "315-448", "518-474", "570-387", "631-444", "716-848", "718-422", "845-334", "860-486", "914-255", "978-658",
    "212-970", "214-220", "312-906", "512-465", "713-465", "972-465", "202-785", "305-810", "407-814", "504-861",
    "602-627", "702-486", "808-586",
];

pub const TOLL_FREE_AREA_CODES: [&str; 8] = ["800", "888", "877", "866", "855", "844", "833", "822"];

pub const VOIP_AREA_CODES: [&str; 9] = ["347", "646", "650", "678", "702", "704", "716", "818", "919"];

pub const LITIGATION_KEYWORDS: [&str; 9] = [
    "legal",
    "litigation",
    "lawsuit",
    "attorney",
    "lawyer",
    "court",
    "settlement",
    "claim",
    "damages",
];

/// Outcome of checking one phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhoneVerdict {
    Empty,
    InvalidFormat,
    KnownLandline,
    TollFree,
    Voip,
    Mobile,
}

impl PhoneVerdict {
    pub fn should_filter(self) -> bool {
        self != Self::Mobile
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Empty => "Empty number",
            Self::InvalidFormat => "Invalid format",
            Self::KnownLandline => "Known landline prefix",
            Self::TollFree => "Toll-free number",
            Self::Voip => "VOIP area code",
            Self::Mobile => "Valid mobile number",
        }
    }
}

impl fmt::Display for PhoneVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubConfig {
    #[serde(default = "default_filter_landlines")]
    pub filter_landlines: bool,
    #[serde(default)]
    pub filter_litigation: bool,
    #[serde(default = "default_phone_field")]
    pub phone_field: String,
}

fn default_filter_landlines() -> bool {
    true
}

fn default_phone_field() -> String {
    "number".to_string()
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            filter_landlines: default_filter_landlines(),
            filter_litigation: false,
            phone_field: default_phone_field(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubStats {
    pub original_count: usize,
    pub filtered_landlines: usize,
    pub filtered_litigation: usize,
    pub clean_count: usize,
    /// Reason text to number of leads dropped for it, in order first seen.
    pub filter_reasons: SelectorMap<usize>,
}

impl ScrubStats {
    pub fn filtered_count(&self) -> usize {
        self.original_count - self.clean_count
    }

    /// Multi-line human readable report.
    pub fn summary(&self) -> String {
        let original = self.original_count;
        let clean = self.clean_count;
        let filtered = self.filtered_count();

        let mut lines = vec![format!("Processed {} leads", thousands(original))];
        if original == 0 {
            return lines.join("\n");
        }

        lines.push(format!(
            "Kept {} clean leads ({:.1}%)",
            thousands(clean),
            percent(clean, original)
        ));

        if filtered > 0 {
            lines.push(format!(
                "Filtered out {} leads ({:.1}%)",
                thousands(filtered),
                percent(filtered, original)
            ));
            if self.filtered_landlines > 0 {
                lines.push(format!("  • {} landlines/toll-free/VOIP", thousands(self.filtered_landlines)));
            }
            if self.filtered_litigation > 0 {
                lines.push(format!("  • {} litigation risks", thousands(self.filtered_litigation)));
            }
        }

        lines.join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubReport {
    pub clean_leads: Vec<Lead>,
    pub stats: ScrubStats,
}

/// Normalize a US number into its `NPA-NXX` prefix and area code.
///
/// Numbers with an extension, and anything other than 10 digits or 11
/// digits starting with 1, give `None`.
pub fn clean_phone_number(number: &str) -> Option<(String, String)> {
    let lowered = number.to_lowercase();
    // "ext" contains an "x" as well.
    if lowered.contains('x') {
        return None;
    }

    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return None,
    };

    let area_code = &national[..3];
    Some((format!("{}-{}", area_code, &national[3..6]), area_code.to_string()))
}

pub fn classify_phone(number: &str) -> PhoneVerdict {
    if number.is_empty() {
        return PhoneVerdict::Empty;
    }

    let Some((prefix, area_code)) = clean_phone_number(number) else {
        return PhoneVerdict::InvalidFormat;
    };

    if LANDLINE_PREFIXES.contains(&prefix.as_str()) {
        PhoneVerdict::KnownLandline
    } else if TOLL_FREE_AREA_CODES.contains(&area_code.as_str()) {
        PhoneVerdict::TollFree
    } else if VOIP_AREA_CODES.contains(&area_code.as_str()) {
        PhoneVerdict::Voip
    } else {
        PhoneVerdict::Mobile
    }
}

/// First litigation keyword found in any of the lead's values.
pub fn check_litigation_risk(lead: &Lead) -> Option<&'static str> {
    let text = lead
        .fields
        .values()
        .map(|value| value.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    LITIGATION_KEYWORDS.iter().copied().find(|keyword| text.contains(keyword))
}

/// Split `leads` into the ones worth dialing and statistics on the rest.
///
/// Leads without the configured phone field are not phone-checked.
pub fn scrub(leads: Vec<Lead>, config: &ScrubConfig) -> ScrubReport {
    info!("Starting lead scrubbing for {} leads", leads.len());

    let mut stats = ScrubStats {
        original_count: leads.len(),
        ..ScrubStats::default()
    };
    let mut clean_leads = Vec::with_capacity(leads.len());

    for lead in leads {
        let mut reason = None;

        if config.filter_landlines {
            if let Some(phone) = lead.get(&config.phone_field) {
                let verdict = classify_phone(phone);
                if verdict.should_filter() {
                    reason = Some(format!("Phone: {verdict}"));
                    stats.filtered_landlines += 1;
                }
            }
        }

        if reason.is_none() && config.filter_litigation {
            if let Some(keyword) = check_litigation_risk(&lead) {
                reason = Some(format!("Litigation: Contains litigation keyword: {keyword}"));
                stats.filtered_litigation += 1;
            }
        }

        match reason {
            Some(reason) => {
                let count = stats.filter_reasons.get(&reason).copied().unwrap_or(0);
                stats.filter_reasons.insert(reason, count + 1);
            }
            None => clean_leads.push(lead),
        }
    }

    stats.clean_count = clean_leads.len();
    info!(
        "Lead scrubbing complete: {} clean leads from {} original",
        stats.clean_count, stats.original_count
    );

    ScrubReport { clean_leads, stats }
}

/// Copy a CSV from `reader` to `writer`, keeping only rows whose phone
/// column holds a mobile number.
///
/// The phone column is the first header containing "phone". Rows too short
/// to have that column are dropped. Returns the number of rows kept.
pub fn scrub_csv<R: Read, W: Write>(reader: R, writer: W) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();

    let phone_index = headers
        .iter()
        .position(|h| h.trim().to_lowercase().contains("phone"))
        .ok_or_else(|| Error::InvalidInput("Could not find a column with 'phone' in the header".to_string()))?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    writer.write_record(&headers)?;

    let mut seen = 0;
    let mut kept = 0;
    for record in reader.records() {
        let record = record?;
        seen += 1;
        let Some(phone) = record.get(phone_index) else {
            continue;
        };

        let verdict = classify_phone(phone.trim());
        debug!("Checking number {}: {}", phone, verdict);
        if !verdict.should_filter() {
            writer.write_record(&record)?;
            kept += 1;
        }
    }

    writer.flush()?;
    info!("Kept {} of {} rows", kept, seen);
    Ok(kept)
}

fn percent(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(number: &str) -> Lead {
        Lead::new(1).with_field("first_name", "Pat").with_field("number", number)
    }

    #[test]
    fn test_clean_phone_number() {
        assert_eq!(
            clean_phone_number("(415) 867-5309"),
            Some(("415-867".to_string(), "415".to_string()))
        );
        assert_eq!(
            clean_phone_number("+1 415 867 5309"),
            Some(("415-867".to_string(), "415".to_string()))
        );
        assert_eq!(clean_phone_number("415-867-5309 x12"), None);
        assert_eq!(clean_phone_number("415-867-5309 EXT 4"), None);
        assert_eq!(clean_phone_number("2415 867 5309"), None);
        assert_eq!(clean_phone_number("867-5309"), None);
    }

    #[test]
    fn test_classify_phone() {
        assert_eq!(classify_phone(""), PhoneVerdict::Empty);
        assert_eq!(classify_phone("12345"), PhoneVerdict::InvalidFormat);
        assert_eq!(classify_phone("212-555-0100"), PhoneVerdict::KnownLandline);
        assert_eq!(classify_phone("1-800-555-0100"), PhoneVerdict::TollFree);
        assert_eq!(classify_phone("(646) 123-4567"), PhoneVerdict::Voip);
        assert_eq!(classify_phone("415-867-5309"), PhoneVerdict::Mobile);
        assert!(!PhoneVerdict::Mobile.should_filter());
        assert_eq!(PhoneVerdict::TollFree.to_string(), "Toll-free number");
    }

    #[test]
    fn test_litigation_keywords() {
        let risky = Lead::new(1).with_field("notes", "Spoke with their ATTORNEY");
        assert_eq!(check_litigation_risk(&risky), Some("attorney"));
        assert_eq!(check_litigation_risk(&lead("415-867-5309")), None);
    }

    #[test]
    fn test_scrub_default_config() {
        let leads = vec![
            lead("415-867-5309"),
            lead("800-123-4567"),
            lead("888-123-4567"),
            lead("415-867-5309 x2"),
            Lead::new(5).with_field("first_name", "No Phone"),
        ];

        let report = scrub(leads, &ScrubConfig::default());
        assert_eq!(report.clean_leads.len(), 2);
        assert_eq!(report.stats.original_count, 5);
        assert_eq!(report.stats.filtered_landlines, 3);
        assert_eq!(report.stats.clean_count, 2);
        assert_eq!(report.stats.filter_reasons.get("Phone: Toll-free number"), Some(&2));
        assert_eq!(report.stats.filter_reasons.get("Phone: Invalid format"), Some(&1));
        assert_eq!(
            report.stats.filter_reasons.keys().collect::<Vec<_>>(),
            vec!["Phone: Toll-free number", "Phone: Invalid format"]
        );
    }

    #[test]
    fn test_scrub_litigation() {
        let leads = vec![
            lead("415-867-5309").with_field("notes", "pending settlement"),
            lead("415-867-5309"),
        ];
        let config = ScrubConfig {
            filter_landlines: false,
            filter_litigation: true,
            ..ScrubConfig::default()
        };

        let report = scrub(leads, &config);
        assert_eq!(report.clean_leads.len(), 1);
        assert_eq!(report.stats.filtered_litigation, 1);
        assert_eq!(
            report
                .stats
                .filter_reasons
                .get("Litigation: Contains litigation keyword: settlement"),
            Some(&1)
        );
    }

    #[test]
    fn test_summary() {
        let stats = ScrubStats {
            original_count: 2000,
            filtered_landlines: 500,
            filtered_litigation: 0,
            clean_count: 1500,
            filter_reasons: SelectorMap::new(),
        };
        assert_eq!(
            stats.summary(),
            "Processed 2,000 leads\nKept 1,500 clean leads (75.0%)\nFiltered out 500 leads (25.0%)\n  • 500 landlines/toll-free/VOIP"
        );
        assert_eq!(ScrubStats::default().summary(), "Processed 0 leads");
    }

    #[test]
    fn test_scrub_config_defaults_from_json() {
        let config: ScrubConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ScrubConfig::default());
        assert!(config.filter_landlines);
        assert_eq!(config.phone_field, "number");
    }

    #[test]
    fn test_scrub_csv() {
        let input = "Name,Mobile Phone,City\nAda,415-867-5309,SF\nBob,800-555-0100,NY\nShort\nCy,+1 (312) 555-0199,CHI\n";
        let mut output = Vec::new();

        let kept = scrub_csv(input.as_bytes(), &mut output).unwrap();
        assert_eq!(kept, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Name,Mobile Phone,City\nAda,415-867-5309,SF\nCy,+1 (312) 555-0199,CHI\n"
        );
    }

    #[test]
    fn test_scrub_csv_requires_phone_column() {
        let mut output = Vec::new();
        let result = scrub_csv("Name,City\nAda,SF\n".as_bytes(), &mut output);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
