//! Response structures for the JSON code sources.
//!
//! Upstream APIs changed their payload layout several times. Each known
//! layout is one variant of [`CodesPayload`]; anything else is reported as a
//! [`SourceError::Format`] instead of being guessed at. Elements of a known
//! layout are decoded one by one, so a single odd element does not hide the
//! rest of the list.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::codes::SourceError;
use crate::codes::structs::GameCode;

/// Every supported top-level payload shape.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum CodesPayload {
    /// `[ {...}, {...} ]`
    Bare(Vec<Value>),
    /// `{ "active": [ ... ], "inactive": [ ... ] }`
    Active { active: Vec<Value> },
    /// `{ "codes": [ ... ] }`
    Codes { codes: Vec<Value> },
    /// `{ "data": [ ... ] }`
    Data { data: Vec<Value> },
}

impl CodesPayload {
    fn into_elements(self) -> Vec<Value> {
        match self {
            CodesPayload::Bare(elements) => elements,
            CodesPayload::Active { active } => active,
            CodesPayload::Codes { codes } => codes,
            CodesPayload::Data { data } => data,
        }
    }
}

/// One element of a code list.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RawEntry {
    Record(RawCode),
    /// Some sources list bare code strings.
    Plain(String),
}

/// Code record as exposed by the APIs, every field being optional.
///
/// The identity may live under `code`, `key` or `name` depending on the
/// source, the reward under `rewards` or `reward`. Dates are ignored: they are
/// not unique enough to order codes published on the same day.
#[derive(Deserialize, Debug, Default)]
pub struct RawCode {
    code: Option<String>,
    key: Option<String>,
    name: Option<String>,
    rewards: Option<RewardField>,
    reward: Option<RewardField>,
    id: Option<Value>,
}

/// Reward description, either plain text or a list of items.
///
/// Any other layout is kept as [`RewardField::Unknown`] and treated as a
/// missing reward.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RewardField {
    Text(String),
    Items(Vec<String>),
    Unknown(Value),
}

impl RewardField {
    fn into_text(self) -> Option<String> {
        match self {
            RewardField::Text(text) => Some(text),
            RewardField::Items(items) => Some(
                items
                    .iter()
                    .map(|item| item.trim())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            RewardField::Unknown(value) => {
                warn!("ignoring reward of unsupported layout: {}", value);
                None
            }
        }
    }
}

impl RawCode {
    fn identity(&self) -> Option<&str> {
        [&self.code, &self.key, &self.name]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    fn sort_key(&self) -> u64 {
        match &self.id {
            Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn into_code(self) -> Option<GameCode> {
        let sort_key = self.sort_key();
        let identity = self.identity()?.to_string();
        let reward = self.rewards.or(self.reward).and_then(RewardField::into_text);

        Some(GameCode::new(&identity, reward.as_deref(), sort_key))
    }
}

/// Parses a JSON body into normalized codes.
///
/// Entries without any identity field are skipped, and so are elements that
/// are neither a code record nor a string. The order of the source list is
/// preserved.
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `source_label` - Name stamped on every returned code
///
/// # Errors
///
/// Returns [`SourceError::Format`] when the body is not JSON, matches none
/// of the shapes of [`CodesPayload`], or lists only undecodable elements.
pub fn parse_codes(body: &str, source_label: &str) -> Result<Vec<GameCode>, SourceError> {
    let payload: CodesPayload = serde_json::from_str(body).map_err(|e| {
        SourceError::Format(format!("{}: unsupported payload ({})", source_label, e))
    })?;

    let elements = payload.into_elements();
    let total = elements.len();
    let entries: Vec<RawEntry> = elements
        .into_iter()
        .filter_map(|element| match serde_json::from_value::<RawEntry>(element) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("{}: skipping undecodable element ({})", source_label, e);
                None
            }
        })
        .collect();

    if total > 0 && entries.is_empty() {
        return Err(SourceError::Format(format!(
            "{}: none of the {} elements is a code",
            source_label, total
        )));
    }

    let codes = entries
        .into_iter()
        .filter_map(|entry| match entry {
            RawEntry::Record(raw) => raw.into_code(),
            RawEntry::Plain(code) if !code.trim().is_empty() => {
                Some(GameCode::new(&code, None, 0))
            }
            RawEntry::Plain(_) => None,
        })
        .map(|code| code.with_source(source_label))
        .collect();

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[
            {"id": 12, "code": "genshingift", "rewards": "Primogem x60"},
            {"id": "13", "code": "NEWCODE", "reward": null}
        ]"#;
        let codes = parse_codes(body, "api").unwrap();

        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code, "GENSHINGIFT");
        assert_eq!(codes[0].sort_key, 12);
        assert_eq!(codes[0].reward_text.as_deref(), Some("Primogem x60"));
        assert_eq!(codes[0].source_label.as_deref(), Some("api"));
        assert_eq!(codes[1].sort_key, 13);
        assert_eq!(codes[1].reward_text, None);
    }

    #[test]
    fn test_parse_codes_object() {
        let body = r#"{"codes": [{"key": "abc123", "reward": "Mora"}], "retrieved_at": 1}"#;
        let codes = parse_codes(body, "api").unwrap();

        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "ABC123");
        assert_eq!(codes[0].sort_key, 0);
    }

    #[test]
    fn test_parse_active_object_with_reward_list() {
        let body = r#"{
            "active": [{"code": "HI3CODE", "rewards": ["Crystals x60", " ", "Asterite x10"]}],
            "inactive": [{"code": "OLDCODE"}]
        }"#;
        let codes = parse_codes(body, "ennead API").unwrap();

        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "HI3CODE");
        assert_eq!(
            codes[0].reward_text.as_deref(),
            Some("Crystals x60, Asterite x10")
        );
    }

    #[test]
    fn test_parse_name_and_plain_entries() {
        let body = r#"[{"name": "namedcode"}, "plaincode", {"date": "2024-01-01"}, ""]"#;
        let codes = parse_codes(body, "api").unwrap();

        let names: Vec<&str> = codes.iter().map(|code| code.code.as_str()).collect();
        assert_eq!(names, vec!["NAMEDCODE", "PLAINCODE"]);
    }

    #[test]
    fn test_parse_empty_list_is_not_an_error() {
        assert!(parse_codes("[]", "api").unwrap().is_empty());
        assert!(parse_codes(r#"{"codes": []}"#, "api").unwrap().is_empty());
    }

    #[test]
    fn test_parse_unknown_shape_is_format_error() {
        for body in [r#"{"items": []}"#, "not json", r#""text""#, "42", "[1, 2]"] {
            let result = parse_codes(body, "api");
            assert!(
                matches!(result, Err(SourceError::Format(_))),
                "body {} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_parse_data_object() {
        let body = r#"{"data": [{"code": "datacode", "id": 8, "rewards": "Mora"}]}"#;
        let codes = parse_codes(body, "api").unwrap();

        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "DATACODE");
        assert_eq!(codes[0].sort_key, 8);
    }

    #[test]
    fn test_odd_element_does_not_hide_the_others() {
        let body = r#"[
            {"code": "GOODCODE", "rewards": "Mora"},
            {"code": 42},
            7,
            {"code": "ODDREWARD", "rewards": [{"name": "Primogem", "count": 60}]}
        ]"#;
        let codes = parse_codes(body, "api").unwrap();

        let names: Vec<&str> = codes.iter().map(|code| code.code.as_str()).collect();
        assert_eq!(names, vec!["GOODCODE", "ODDREWARD"]);
        assert_eq!(codes[0].reward_text.as_deref(), Some("Mora"));
        assert_eq!(codes[1].reward_text, None);
    }
}
