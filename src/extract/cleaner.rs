use regex::Regex;

use super::CleaningProfile;
use crate::error::{Error, Result};

#[derive(Debug)]
struct RegexPatterns {
    whitespace: Regex,
    email: Regex,
    phone_strip: Regex,
    phone: Regex,
    name_strip: Regex,
    name: Regex,
    company: Regex,
}

impl RegexPatterns {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| Error::Config(e.to_string()));
        Ok(Self {
            whitespace: compile(r"\s+")?,
            email: compile(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            phone_strip: compile(r"[^\d+\-()\s]")?,
            phone: compile(r"^\+?\(?[1-9][\d\s\-()]{7,15}$")?,
            name_strip: compile(r"[^\w\s\-'.]")?,
            name: compile(r"^[a-zA-Z\s\-'.]{2,50}$")?,
            company: compile(r"^[a-zA-Z0-9\s\-&.,()]{1,100}$")?,
        })
    }
}

/// Normalizes raw element text into field values.
///
/// Returns `None` when a value is empty or fails the check for its field
/// type; callers leave such fields out of the record.
#[derive(Debug)]
pub struct FieldCleaner {
    profile: CleaningProfile,
    patterns: RegexPatterns,
}

impl FieldCleaner {
    pub fn new(profile: CleaningProfile) -> Result<Self> {
        Ok(Self {
            profile,
            patterns: RegexPatterns::new()?,
        })
    }

    pub fn profile(&self) -> CleaningProfile {
        self.profile
    }

    pub fn clean(&self, field_name: &str, raw: &str) -> Option<String> {
        let value = self.collapse_whitespace(raw);
        if value.is_empty() {
            return None;
        }

        match self.profile {
            CleaningProfile::Standard => self.clean_standard(field_name, value),
            CleaningProfile::Bulk => Some(Self::clean_bulk(field_name, value)),
        }
    }

    /// Trim and squeeze every whitespace run down to one space.
    pub fn collapse_whitespace(&self, raw: &str) -> String {
        self.patterns
            .whitespace
            .replace_all(raw.trim(), " ")
            .into_owned()
    }

    fn clean_standard(&self, field_name: &str, value: String) -> Option<String> {
        match field_name {
            "email" => self
                .patterns
                .email
                .find(&value)
                .map(|m| m.as_str().to_lowercase()),
            "phone" => {
                let phone = self.patterns.phone_strip.replace_all(&value, "");
                let phone = self.collapse_whitespace(&phone);
                self.patterns.phone.is_match(&phone).then_some(phone)
            }
            "name" => {
                let name = self.patterns.name_strip.replace_all(&value, "");
                let name = title_case(name.trim());
                (name.chars().count() >= 2 && self.patterns.name.is_match(&name)).then_some(name)
            }
            "company" => self.patterns.company.is_match(&value).then_some(value),
            _ => Some(value),
        }
    }

    fn clean_bulk(field_name: &str, value: String) -> String {
        match field_name {
            "first_name" | "last_name" | "city" | "state" => title_case(&value),
            "zip_code" => value.to_uppercase(),
            _ => value,
        }
    }
}

/// Capitalize the first letter of every alphabetic run and lowercase the rest:
/// `o'NEIL-smith` -> `O'Neil-Smith`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(ch);
            previous_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> FieldCleaner {
        FieldCleaner::new(CleaningProfile::Standard).unwrap()
    }

    #[test]
    fn test_generic_field_whitespace() {
        let cleaner = standard();
        assert_eq!(cleaner.clean("notes", "  call   back\n tomorrow "), Some("call back tomorrow".to_string()));
        assert_eq!(cleaner.clean("notes", "   \n\t "), None);
    }

    #[test]
    fn test_email_is_found_and_lowercased() {
        let cleaner = standard();
        assert_eq!(
            cleaner.clean("email", "Email: John.Doe@Example.COM (work)"),
            Some("john.doe@example.com".to_string())
        );
        assert_eq!(cleaner.clean("email", "no address here"), None);
    }

    #[test]
    fn test_phone_validation() {
        let cleaner = standard();
        assert_eq!(cleaner.clean("phone", "Tel: 555-123-4567"), Some("555-123-4567".to_string()));
        assert_eq!(cleaner.clean("phone", "(555) 123-4567"), Some("(555) 123-4567".to_string()));
        assert_eq!(cleaner.clean("phone", "+1 555 123 4567"), Some("+1 555 123 4567".to_string()));
        assert_eq!(cleaner.clean("phone", "123"), None);
        assert_eq!(cleaner.clean("phone", "0123456789"), None);
        assert_eq!(cleaner.clean("phone", "(055) 123-4567"), None);
        assert_eq!(cleaner.clean("phone", "((555) 123-4567"), None);
    }

    #[test]
    fn test_name_cleanup() {
        let cleaner = standard();
        assert_eq!(cleaner.clean("name", "jane   DOE!"), Some("Jane Doe".to_string()));
        assert_eq!(cleaner.clean("name", "o'neil"), Some("O'Neil".to_string()));
        assert_eq!(cleaner.clean("name", "J"), None);
        assert_eq!(cleaner.clean("name", "R2D2"), None);
    }

    #[test]
    fn test_company_validation() {
        let cleaner = standard();
        assert_eq!(cleaner.clean("company", "Acme, Inc."), Some("Acme, Inc.".to_string()));
        assert_eq!(cleaner.clean("company", "Acme™"), None);
    }

    #[test]
    fn test_bulk_profile() {
        let cleaner = FieldCleaner::new(CleaningProfile::Bulk).unwrap();
        assert_eq!(cleaner.clean("first_name", "mARY"), Some("Mary".to_string()));
        assert_eq!(cleaner.clean("city", "new york"), Some("New York".to_string()));
        assert_eq!(cleaner.clean("zip_code", "ab12 3cd"), Some("AB12 3CD".to_string()));
        assert_eq!(cleaner.clean("number", " 555   123 4567 "), Some("555 123 4567".to_string()));
        assert_eq!(cleaner.clean("email", "NOT AN EMAIL"), Some("NOT AN EMAIL".to_string()));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("o'NEIL-smith"), "O'Neil-Smith");
        assert_eq!(title_case("hello world"), "Hello World");
    }
}
