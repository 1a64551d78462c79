//! Catalog documents
//!
//! A catalog entry as stored in the search index. Group fields are derived
//! with the query-side normalization tables; if the two sides disagree the
//! shape and color filters silently stop matching.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::normalize::{color_groups, parse_color_classes, parse_mark_codes, shape_group, ColorClasses};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("item_seq must not be empty")]
    MissingItemSeq,

    #[error("invalid catalog entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// One pill in the catalog
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PillDocument {
    /// Product identifier
    pub item_seq: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_front: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_back: Option<String>,

    pub drug_shape: String,

    /// Accepts a single color, a comma separated string or a list
    #[serde(deserialize_with = "entries")]
    pub color_classes: Vec<String>,

    #[serde(default, deserialize_with = "entries", skip_serializing_if = "Vec::is_empty")]
    pub mark_code_front_anal: Vec<String>,

    #[serde(default, deserialize_with = "entries", skip_serializing_if = "Vec::is_empty")]
    pub mark_code_back_anal: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_group: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color_group: Vec<String>,

    /// Remaining source fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn entries<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<ColorClasses>::deserialize(deserializer)?;
    Ok(value.map(|v| parse_mark_codes(&v)).unwrap_or_default())
}

impl PillDocument {
    /// Parse and prepare a catalog entry from JSON
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let doc: PillDocument = serde_json::from_value(value)?;
        doc.prepare_for_index()
    }

    /// Normalize the raw fields and derive `shape_group` / `color_group`.
    ///
    /// The color group is the union of the groups of the first two colors,
    /// matching the primary/secondary reading on the query side.
    pub fn prepare_for_index(mut self) -> Result<Self, CatalogError> {
        self.item_seq = self.item_seq.trim().to_string();
        if self.item_seq.is_empty() {
            return Err(CatalogError::MissingItemSeq);
        }

        self.drug_shape = self.drug_shape.trim().to_string();
        self.shape_group = Some(shape_group(&self.drug_shape).to_string());

        self.color_classes = parse_color_classes(&ColorClasses::Many(self.color_classes));
        let mut groups: Vec<String> = Vec::new();
        for color in self.color_classes.iter().take(2) {
            for group in color_groups(color) {
                if !groups.iter().any(|g| g == group) {
                    groups.push(group.to_string());
                }
            }
        }
        self.color_group = groups;

        self.print_front = trimmed(self.print_front);
        self.print_back = trimmed(self.print_back);
        Ok(self)
    }

    /// Full source document, as returned in search hits
    pub fn to_source(&self) -> Result<Value, CatalogError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_derives_groups() {
        let doc = PillDocument::from_value(json!({
            "item_seq": " 200808876 ",
            "print_front": " 8B ",
            "print_back": "  ",
            "drug_shape": "타원형 ",
            "color_classes": ["노랑", "청록", "검정"],
            "mark_code_front_anal": "마크, 분할선",
            "item_name": "가나다정"
        }))
        .unwrap();

        assert_eq!(doc.item_seq, "200808876");
        assert_eq!(doc.print_front.as_deref(), Some("8B"));
        assert!(doc.print_back.is_none());
        assert_eq!(doc.shape_group.as_deref(), Some("타원/장방형"));
        assert_eq!(doc.color_group, vec!["노랑계열", "초록계열", "파랑계열"]);
        assert_eq!(doc.mark_code_front_anal, vec!["마크", "분할선"]);
        assert!(doc.mark_code_back_anal.is_empty());
        assert_eq!(doc.extra["item_name"], "가나다정");
    }

    #[test]
    fn test_single_color_string() {
        let doc = PillDocument::from_value(json!({
            "item_seq": "1",
            "drug_shape": "원형",
            "color_classes": "하양"
        }))
        .unwrap();
        assert_eq!(doc.color_classes, vec!["하양"]);
        assert_eq!(doc.color_group, vec!["하양"]);
    }

    #[test]
    fn test_unknown_shape_and_color() {
        let doc = PillDocument::from_value(json!({
            "item_seq": "1",
            "drug_shape": "별모양",
            "color_classes": "무지개"
        }))
        .unwrap();
        assert_eq!(doc.shape_group.as_deref(), Some("기타"));
        assert_eq!(doc.color_group, vec!["기타"]);
    }

    #[test]
    fn test_missing_item_seq_rejected() {
        let err = PillDocument::from_value(json!({
            "item_seq": "  ",
            "drug_shape": "원형",
            "color_classes": "하양"
        }))
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingItemSeq));

        let err = PillDocument::from_value(json!({ "drug_shape": "원형" })).unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
    }

    #[test]
    fn test_source_round_trips_extra_fields() {
        let doc = PillDocument::from_value(json!({
            "item_seq": "7",
            "drug_shape": "원형",
            "color_classes": "하양",
            "entp_name": "제약"
        }))
        .unwrap();
        let source = doc.to_source().unwrap();
        assert_eq!(source["entp_name"], "제약");
        assert_eq!(source["shape_group"], "원형");
        assert_eq!(source["color_group"][0], "하양");
    }
}
