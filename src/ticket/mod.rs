//! Ticket text parsing: best-effort extraction of structured train details
//! from raw OCR output.
//!
//! This is heuristic text mining over run-on ticket text, not a grammar.
//! Garbled or partial OCR output leaves fields unset rather than failing;
//! [`parse`] is total over arbitrary input.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum raw OCR text retained on a record.
pub const MAX_RAW_TEXT_LEN: usize = 2000;

/// Where a set of train details came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Machine-extracted from a ticket image or PDF.
    #[default]
    Ocr,
    /// Supplied by the user as structured fields.
    Manual,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Ocr => write!(f, "ocr"),
            Provenance::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ocr" => Ok(Provenance::Ocr),
            "manual" => Ok(Provenance::Manual),
            _ => Err(format!("Unknown provenance: {}", s)),
        }
    }
}

/// Structured train details attached to a complaint.
///
/// Every field is optional: extraction is best-effort and users may supply
/// only a subset manually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainDetails {
    #[serde(default)]
    pub train_number: Option<String>,
    #[serde(default)]
    pub train_name: Option<String>,
    #[serde(default)]
    pub coach_number: Option<String>,
    #[serde(default)]
    pub seat_number: Option<String>,
    #[serde(default)]
    pub boarding_station: Option<String>,
    #[serde(default)]
    pub destination_station: Option<String>,
    /// Raw OCR text, truncated to [`MAX_RAW_TEXT_LEN`] characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl TrainDetails {
    /// Whether no field carries any information.
    pub fn is_empty(&self) -> bool {
        self.train_number.is_none()
            && self.train_name.is_none()
            && self.coach_number.is_none()
            && self.seat_number.is_none()
            && self.boarding_station.is_none()
            && self.destination_station.is_none()
    }

    /// Attach raw source text, truncated at a character boundary.
    pub fn with_raw_text(mut self, raw: &str) -> Self {
        if !raw.trim().is_empty() {
            self.raw_text = Some(truncate_chars(raw, MAX_RAW_TEXT_LEN));
        }
        self
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn train_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})\b|\b(\d{4})\b").expect("valid pattern"))
}

fn coach_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:Coach|Bogie|Compartment)\s*[:\-#]?\s*([A-Z0-9\-]+)")
            .expect("valid pattern")
    })
}

fn seat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:Seat|Berth|No\.?)\s*[:\-#]?\s*([A-Z0-9\-/]+)").expect("valid pattern")
    })
}

fn from_to_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:From|Boarding)\s*[:\-]?\s*([A-Za-z\s]+?)\s+(?:To|Destination|Dest)\s*[:\-]?\s*([A-Za-z\s]+?)(?:\s|$|Train)",
        )
        .expect("valid pattern")
    })
}

/// Parse raw OCR text into structured train details.
///
/// Total over any input: unmatched fields stay unset. Provenance is `ocr`;
/// callers attaching raw text should use [`TrainDetails::with_raw_text`].
pub fn parse(raw_text: &str) -> TrainDetails {
    let text = raw_text.replace(['\n', '\r'], " ");
    let mut details = TrainDetails {
        provenance: Provenance::Ocr,
        ..TrainDetails::default()
    };

    // Train number: first 5- or 4-digit run, scanned left to right.
    for caps in train_number_re().captures_iter(&text) {
        let num = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
        if let Some(num) = num {
            if num.len() >= 4 {
                details.train_number = Some(num);
                break;
            }
        }
    }

    if let Some(caps) = coach_re().captures(&text) {
        details.coach_number = Some(caps[1].trim().to_string());
    }

    if let Some(caps) = seat_re().captures(&text) {
        details.seat_number = Some(caps[1].trim().to_string());
    }

    if let Some(caps) = from_to_re().captures(&text) {
        details.boarding_station = Some(caps[1].trim().to_string());
        details.destination_station = Some(caps[2].trim().to_string());
    }

    // Train name: only meaningful next to a recognized train number,
    // e.g. "12345 Rajdhani Express".
    if let Some(number) = &details.train_number {
        let pattern = format!(
            r"(?i)\b{}\s+([A-Za-z\s]+(?:Express|Mail|Superfast|Special|Local)?)",
            regex::escape(number)
        );
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(caps) = re.captures(&text) {
                let name = caps[1].trim().to_string();
                if !name.is_empty() {
                    details.train_name = Some(name);
                }
            }
        }
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_ticket_line() {
        let details = parse("12345 Rajdhani Express Coach B2 Seat 45 From Delhi To Mumbai");
        assert_eq!(details.train_number.as_deref(), Some("12345"));
        assert!(details
            .train_name
            .as_deref()
            .unwrap()
            .starts_with("Rajdhani Express"));
        assert_eq!(details.coach_number.as_deref(), Some("B2"));
        assert_eq!(details.seat_number.as_deref(), Some("45"));
        assert!(details.boarding_station.as_deref().unwrap().contains("Delhi"));
        assert!(details
            .destination_station
            .as_deref()
            .unwrap()
            .contains("Mumbai"));
        assert_eq!(details.provenance, Provenance::Ocr);
    }

    #[test]
    fn test_parse_is_total_on_empty_and_garbage() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\r\t  ").is_empty());
        assert!(parse("%%%###@@@!!!").is_empty());
        // Unicode noise must not panic either.
        let details = parse("टिकट ◆◆◆ 証明書");
        assert!(details.is_empty());
    }

    #[test]
    fn test_parse_prefers_first_scanned_number() {
        let details = parse("PNR 4412345678 Train 12951 Coach A1");
        // The ten-digit PNR has no standalone 4/5-digit run; the train
        // number is the first bounded match.
        assert_eq!(details.train_number.as_deref(), Some("12951"));
    }

    #[test]
    fn test_parse_four_digit_train_number() {
        let details = parse("Passenger 1234 Local");
        assert_eq!(details.train_number.as_deref(), Some("1234"));
        assert!(details.train_name.as_deref().unwrap().contains("Local"));
    }

    #[test]
    fn test_parse_coach_label_variants() {
        assert_eq!(
            parse("Bogie: S-4").coach_number.as_deref(),
            Some("S-4")
        );
        assert_eq!(
            parse("COMPARTMENT # D1").coach_number.as_deref(),
            Some("D1")
        );
    }

    #[test]
    fn test_parse_seat_label_variants() {
        assert_eq!(parse("Berth - 32/UB").seat_number.as_deref(), Some("32/UB"));
        assert_eq!(parse("seat:12").seat_number.as_deref(), Some("12"));
    }

    #[test]
    fn test_parse_boarding_destination_synonyms() {
        let details = parse("Boarding: New Delhi Destination: Howrah ");
        assert!(details
            .boarding_station
            .as_deref()
            .unwrap()
            .contains("New Delhi"));
        assert!(details
            .destination_station
            .as_deref()
            .unwrap()
            .contains("Howrah"));
    }

    #[test]
    fn test_parse_no_train_name_without_number() {
        let details = parse("Rajdhani Express to Mumbai");
        assert_eq!(details.train_number, None);
        assert_eq!(details.train_name, None);
    }

    #[test]
    fn test_parse_newlines_normalized() {
        let details = parse("Train\n12345\nCoach\nB2");
        assert_eq!(details.train_number.as_deref(), Some("12345"));
        assert_eq!(details.coach_number.as_deref(), Some("B2"));
    }

    #[test]
    fn test_raw_text_truncated_to_limit() {
        let long = "x".repeat(MAX_RAW_TEXT_LEN + 500);
        let details = TrainDetails::default().with_raw_text(&long);
        assert_eq!(details.raw_text.unwrap().chars().count(), MAX_RAW_TEXT_LEN);
    }

    #[test]
    fn test_raw_text_skipped_when_blank() {
        let details = TrainDetails::default().with_raw_text("   ");
        assert_eq!(details.raw_text, None);
    }

    #[test]
    fn test_provenance_round_trip() {
        assert_eq!("ocr".parse::<Provenance>().unwrap(), Provenance::Ocr);
        assert_eq!("MANUAL".parse::<Provenance>().unwrap(), Provenance::Manual);
        assert!("typed".parse::<Provenance>().is_err());
        assert_eq!(Provenance::Ocr.to_string(), "ocr");
    }

    #[test]
    fn test_details_serialize_camel_case() {
        let details = parse("12345 Shatabdi Express Coach C1");
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["trainNumber"], "12345");
        assert_eq!(json["coachNumber"], "C1");
        assert!(json.get("raw_text").is_none());
    }
}
