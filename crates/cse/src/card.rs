//! Card values, generation time, and the plaintext payloads built from them.

use std::fmt;

use chrono::{DateTime, Utc};
use common::{protocol::CardInput, CseError};
use serde::Serialize;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

/// JSON key under which the generation time is embedded.
pub const GENERATION_TIME_KEY: &str = "generationtime";

/// `chrono` format for ISO-8601 generation times (`2024-05-01T10:15:30.123Z`).
pub const GENERATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// The card fields that can be encrypted individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    /// Primary account number.
    Number,
    /// Expiry month.
    ExpiryMonth,
    /// Expiry year.
    ExpiryYear,
    /// CVC / CVV.
    SecurityCode,
    /// Card holder name.
    HolderName,
}

impl CardField {
    /// Payload key the backend expects for this field.
    pub fn key(self) -> &'static str {
        match self {
            CardField::Number => "number",
            CardField::ExpiryMonth => "expiryMonth",
            CardField::ExpiryYear => "expiryYear",
            CardField::SecurityCode => "cvc",
            CardField::HolderName => "holderName",
        }
    }
}

impl fmt::Display for CardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Time at which the caller produced the payload, embedded verbatim so the
/// backend can enforce freshness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTime(String);

impl GenerationTime {
    /// The current UTC time in ISO-8601 with millisecond precision.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Format a UTC timestamp as `yyyy-MM-ddTHH:mm:ss.SSSZ`.
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self(time.format(GENERATION_TIME_FORMAT).to_string())
    }

    /// Epoch milliseconds as a decimal string.
    pub fn from_epoch_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// Use a caller-provided representation as is.
    pub fn verbatim(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The embedded representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<DateTime<Utc>> for GenerationTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

impl fmt::Display for GenerationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plaintext card details. Every field is optional; absent fields are simply
/// not encrypted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Card {
    /// Card number.
    pub number: Option<String>,
    /// Expiry month, `"1"`..`"12"` with or without a leading zero.
    pub expiry_month: Option<String>,
    /// Four-digit expiry year.
    pub expiry_year: Option<String>,
    /// Security code.
    pub security_code: Option<String>,
    /// Holder name.
    pub holder_name: Option<String>,
}

impl Card {
    /// Copy of this card with input noise removed.
    ///
    /// Number, expiry and security code lose all ASCII whitespace. The holder
    /// name is trimmed of control characters and spaces, and runs of two or
    /// more ASCII whitespace characters collapse to a single space; a lone tab
    /// or non-ASCII space is kept. Values that end up empty become `None`.
    pub fn normalized(&self) -> Card {
        Card {
            number: strip_whitespace(self.number.as_deref()),
            expiry_month: strip_whitespace(self.expiry_month.as_deref()),
            expiry_year: strip_whitespace(self.expiry_year.as_deref()),
            security_code: strip_whitespace(self.security_code.as_deref()),
            holder_name: collapse_whitespace(self.holder_name.as_deref()),
        }
    }

    /// Value of one field.
    pub fn get(&self, field: CardField) -> Option<&str> {
        match field {
            CardField::Number => self.number.as_deref(),
            CardField::ExpiryMonth => self.expiry_month.as_deref(),
            CardField::ExpiryYear => self.expiry_year.as_deref(),
            CardField::SecurityCode => self.security_code.as_deref(),
            CardField::HolderName => self.holder_name.as_deref(),
        }
    }

    /// Card number with all but the last four digits replaced by `*`.
    ///
    /// Returns an empty string when no number is set or it has fewer than 14
    /// digits.
    pub fn masked_number(&self) -> String {
        let Some(number) = strip_whitespace(self.number.as_deref()) else {
            return String::new();
        };
        let len = number.chars().count();
        if len < 14 {
            return String::new();
        }
        let last_four: String = number.chars().skip(len - 4).collect();
        format!("{}{last_four}", "*".repeat(len - 4))
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the masked number may appear in diagnostics.
        f.debug_struct("Card")
            .field("number", &self.masked_number())
            .field("expiry_month", &self.expiry_month.as_ref().map(|_| "[REDACTED]"))
            .field("expiry_year", &self.expiry_year.as_ref().map(|_| "[REDACTED]"))
            .field("security_code", &self.security_code.as_ref().map(|_| "[REDACTED]"))
            .field("holder_name", &self.holder_name.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl From<CardInput> for Card {
    fn from(input: CardInput) -> Self {
        Card {
            number: input.number,
            expiry_month: input.expiry_month,
            expiry_year: input.expiry_year,
            security_code: input.security_code,
            holder_name: input.holder_name,
        }
    }
}

/// `[ \t\n\x0B\f\r]`, the whitespace class the backend normalizes with.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

fn strip_whitespace(value: Option<&str>) -> Option<String> {
    let stripped: String = value?.chars().filter(|c| !is_space(*c)).collect();
    (!stripped.is_empty()).then_some(stripped)
}

fn collapse_whitespace(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim_matches(|c: char| c <= ' ');
    let mut collapsed = String::with_capacity(trimmed.len());
    let mut run = String::new();
    for c in trimmed.chars() {
        if is_space(c) {
            run.push(c);
            continue;
        }
        flush_run(&mut collapsed, &mut run);
        collapsed.push(c);
    }
    flush_run(&mut collapsed, &mut run);
    (!collapsed.is_empty()).then_some(collapsed)
}

fn flush_run(out: &mut String, run: &mut String) {
    if run.chars().count() >= 2 {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `{"<field>": "<value>", "generationtime": "<time>"}` as JSON bytes.
///
/// An empty field name, or one equal to [`GENERATION_TIME_KEY`], is refused:
/// the value would otherwise be lost from the payload.
pub(crate) fn field_payload(
    field: &str,
    value: &str,
    generation_time: &GenerationTime,
) -> Result<Zeroizing<Vec<u8>>, CseError> {
    if field.is_empty() {
        return Err(CseError::InvalidFieldName("field name is empty".into()));
    }
    if field == GENERATION_TIME_KEY {
        return Err(CseError::InvalidFieldName(format!(
            "{GENERATION_TIME_KEY:?} is reserved for the generation time"
        )));
    }

    let mut map = Map::new();
    map.insert(field.to_owned(), Value::String(value.to_owned()));
    map.insert(
        GENERATION_TIME_KEY.to_owned(),
        Value::String(generation_time.as_str().to_owned()),
    );
    serde_json::to_vec(&Value::Object(map))
        .map(Zeroizing::new)
        .map_err(|e| CseError::encryption("payload serialization failed", e))
}

#[derive(Serialize)]
struct CardPayload<'a> {
    #[serde(rename = "generationtime")]
    generation_time: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    number: Option<&'a str>,
    #[serde(rename = "holderName", skip_serializing_if = "Option::is_none")]
    holder_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cvc: Option<&'a str>,
    #[serde(rename = "expiryMonth", skip_serializing_if = "Option::is_none")]
    expiry_month: Option<&'a str>,
    #[serde(rename = "expiryYear", skip_serializing_if = "Option::is_none")]
    expiry_year: Option<&'a str>,
}

/// The whole card as one JSON object; absent fields are omitted.
pub(crate) fn card_payload(
    card: &Card,
    generation_time: &GenerationTime,
) -> Result<Zeroizing<Vec<u8>>, CseError> {
    let payload = CardPayload {
        generation_time: generation_time.as_str(),
        number: card.number.as_deref(),
        holder_name: card.holder_name.as_deref(),
        cvc: card.security_code.as_deref(),
        expiry_month: card.expiry_month.as_deref(),
        expiry_year: card.expiry_year.as_deref(),
    };
    serde_json::to_vec(&payload)
        .map(Zeroizing::new)
        .map_err(|e| CseError::encryption("payload serialization failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn generation_time_iso_format() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 30).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(GenerationTime::from(t).as_str(), "2024-05-01T10:15:30.123Z");
    }

    #[test]
    fn generation_time_epoch_and_verbatim() {
        assert_eq!(
            GenerationTime::from_epoch_millis(1_714_558_530_123).as_str(),
            "1714558530123"
        );
        assert_eq!(GenerationTime::verbatim("custom").to_string(), "custom");
    }

    #[test]
    fn field_payload_embeds_value_and_time() {
        let time = GenerationTime::verbatim("2024-05-01T10:15:30.123Z");
        let payload = field_payload(CardField::SecurityCode.key(), "737", &time).unwrap();
        let json = parse(&payload);
        assert_eq!(json["cvc"], "737");
        assert_eq!(json["generationtime"], "2024-05-01T10:15:30.123Z");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn field_payload_refuses_reserved_field_name() {
        let time = GenerationTime::verbatim("real");
        let err = field_payload(GENERATION_TIME_KEY, "SECRET-VALUE-12345", &time).unwrap_err();
        assert!(matches!(err, CseError::InvalidFieldName(_)));
        assert!(!err.to_string().contains("SECRET"));
    }

    #[test]
    fn field_payload_refuses_empty_field_name() {
        let err = field_payload("", "737", &GenerationTime::verbatim("t")).unwrap_err();
        assert!(matches!(err, CseError::InvalidFieldName(_)));
    }

    #[test]
    fn card_payload_omits_absent_fields() {
        let card = Card {
            number: Some("4111111111111111".into()),
            holder_name: Some("J. Smith".into()),
            ..Default::default()
        };
        let payload = card_payload(&card, &GenerationTime::verbatim("t")).unwrap();
        let json = parse(&payload);
        assert_eq!(json["number"], "4111111111111111");
        assert_eq!(json["holderName"], "J. Smith");
        assert_eq!(json["generationtime"], "t");
        assert!(json.get("cvc").is_none());
        assert!(json.get("expiryMonth").is_none());
    }

    #[test]
    fn normalization_strips_and_collapses() {
        let card = Card {
            number: Some(" 4111 1111\t1111 1111 ".into()),
            expiry_month: Some(" 03".into()),
            expiry_year: Some("20 30".into()),
            security_code: Some("   ".into()),
            holder_name: Some("  Jane    Q   Public ".into()),
        }
        .normalized();
        assert_eq!(card.number.as_deref(), Some("4111111111111111"));
        assert_eq!(card.expiry_month.as_deref(), Some("03"));
        assert_eq!(card.expiry_year.as_deref(), Some("2030"));
        assert_eq!(card.security_code, None);
        assert_eq!(card.holder_name.as_deref(), Some("Jane Q Public"));
    }

    #[test]
    fn holder_name_keeps_single_tab_and_unicode_space() {
        let card = Card {
            holder_name: Some("\tJane\tQ\u{00A0}Public\r\n".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(card.holder_name.as_deref(), Some("Jane\tQ\u{00A0}Public"));

        let card = Card {
            holder_name: Some("Jane \t Q\n\nPublic".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(card.holder_name.as_deref(), Some("Jane Q Public"));
    }

    #[test]
    fn number_keeps_non_ascii_space() {
        let card = Card {
            number: Some("4111\u{2007}1111 1111\t1111".into()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(card.number.as_deref(), Some("4111\u{2007}111111111111"));
    }

    #[test]
    fn masked_number_keeps_last_four() {
        let card = Card {
            number: Some("4111 1111 1111 1234".into()),
            ..Default::default()
        };
        assert_eq!(card.masked_number(), "************1234");
    }

    #[test]
    fn masked_number_empty_for_short_or_missing_number() {
        assert_eq!(Card::default().masked_number(), "");
        let short = Card {
            number: Some("4111111111".into()),
            ..Default::default()
        };
        assert_eq!(short.masked_number(), "");
    }

    #[test]
    fn debug_never_prints_values() {
        let card = Card {
            number: Some("4111111111111111".into()),
            security_code: Some("737".into()),
            holder_name: Some("Jane".into()),
            ..Default::default()
        };
        let debug = format!("{card:?}");
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("737"));
        assert!(!debug.contains("Jane"));
        assert!(debug.contains("1111"));
    }

    #[test]
    fn from_card_input() {
        let input = CardInput {
            number: Some("4111111111111111".into()),
            security_code: Some("737".into()),
            ..Default::default()
        };
        let card = Card::from(input);
        assert_eq!(card.get(CardField::SecurityCode), Some("737"));
        assert_eq!(card.get(CardField::HolderName), None);
    }
}
