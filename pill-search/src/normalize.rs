//! Attribute normalization
//!
//! Maps free-form shape, color and imprint descriptions onto the controlled
//! vocabulary used by the catalog index. The same tables drive the indexing
//! side (see `catalog`), so a change here must be reflected in indexed data.

use serde::{Deserialize, Serialize};

use crate::variations::imprint_variations;

/// Group assigned to shapes and colors missing from the lookup tables
pub const OTHER_GROUP: &str = "기타";

/// Color group of clear/transparent capsules
pub const TRANSPARENT_GROUP: &str = "투명";

/// Imprint substring marking a manufacturer mark code rather than printed text
pub const MARK_MARKER: &str = "마크";

const SHAPE_GROUPS: &[(&str, &str)] = &[
    ("원형", "원형"),
    ("타원형", "타원/장방형"),
    ("장방형", "타원/장방형"),
    ("반원형", "반원형"),
    ("삼각형", "삼각형"),
    ("사각형", "사각형"),
    ("마름모형", "마름모형"),
    ("오각형", "다각형"),
    ("육각형", "다각형"),
    ("팔각형", "다각형"),
    ("기타", "기타"),
];

// A color may sit in two adjacent hue groups; membership is OR across the set.
const COLOR_GROUPS: &[(&str, &[&str])] = &[
    ("하양", &["하양"]),
    ("노랑", &["노랑계열", "초록계열"]),
    ("주황", &["노랑계열"]),
    ("분홍", &["노랑계열"]),
    ("빨강", &["노랑계열"]),
    ("갈색", &["노랑계열"]),
    ("베이지", &["노랑계열"]),
    ("연두", &["초록계열", "노랑계열"]),
    ("초록", &["초록계열"]),
    ("청록", &["초록계열", "파랑계열"]),
    ("하늘", &["파랑계열"]),
    ("파랑", &["파랑계열"]),
    ("남색", &["파랑계열"]),
    ("자주", &["자주계열"]),
    ("보라", &["자주계열"]),
    ("회색", &["회색"]),
    ("검정", &["검정"]),
    ("투명", &["투명"]),
];

/// Look up the coarse group of a (trimmed) shape name
pub fn shape_group(shape: &str) -> &'static str {
    SHAPE_GROUPS
        .iter()
        .find(|(name, _)| *name == shape)
        .map(|(_, group)| *group)
        .unwrap_or(OTHER_GROUP)
}

/// Look up the set of hue groups of a (trimmed) color name
pub fn color_groups(color: &str) -> &'static [&'static str] {
    COLOR_GROUPS
        .iter()
        .find(|(name, _)| *name == color)
        .map(|(_, groups)| *groups)
        .unwrap_or(&[OTHER_GROUP])
}

/// Split a comma separated color string, or trim each entry of a list.
/// Empty entries are dropped.
pub fn parse_color_classes(value: &ColorClasses) -> Vec<String> {
    split_entries(value)
}

/// Mark codes use the same comma convention as colors
pub fn parse_mark_codes(value: &ColorClasses) -> Vec<String> {
    split_entries(value)
}

fn split_entries(value: &ColorClasses) -> Vec<String> {
    match value {
        ColorClasses::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
        ColorClasses::Many(list) => list
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Strip separators the vision model emits inside imprints: spaces,
/// score-line bars and line breaks.
pub fn clean_ocr_imprint(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '|' | '\n' | '\r'))
        .collect()
}

/// A single value or an ordered list of values, primary first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColorClasses {
    One(String),
    Many(Vec<String>),
}

/// Raw search attributes as supplied by a user or the image analyzer
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug_shape: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_classes: Option<ColorClasses>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imprint: Option<String>,
}

impl RawFeatures {
    /// True when no attribute carries a non-blank value
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let no_colors = self
            .color_classes
            .as_ref()
            .map_or(true, |c| parse_color_classes(c).is_empty());
        blank(&self.drug_shape) && no_colors && blank(&self.imprint)
    }
}

/// Canonicalized search attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedFeatures {
    pub shape: Option<String>,
    pub shape_group: Option<String>,
    pub primary_color: Option<String>,
    /// Empty when no primary color was given
    pub primary_color_group: Vec<String>,
    pub secondary_color: Option<String>,
    pub secondary_color_group: Vec<String>,
    pub imprint: String,
    pub is_mark_reference: bool,
    pub imprint_variations: Vec<String>,
}

impl NormalizedFeatures {
    pub fn has_imprint(&self) -> bool {
        !self.imprint.is_empty()
    }
}

/// Normalize raw attributes. Never fails: absent or blank fields simply
/// produce no constraint.
pub fn normalize(raw: &RawFeatures) -> NormalizedFeatures {
    let mut norm = NormalizedFeatures::default();

    if let Some(shape) = raw.drug_shape.as_deref().map(str::trim) {
        if !shape.is_empty() {
            norm.shape_group = Some(shape_group(shape).to_string());
            norm.shape = Some(shape.to_string());
        }
    }

    // Only the first two colors matter: primary, then secondary.
    if let Some(colors) = &raw.color_classes {
        let listed = parse_color_classes(colors);
        let mut listed = listed.iter().map(String::as_str);

        if let Some(primary) = listed.next() {
            norm.primary_color_group = owned_groups(primary);
            norm.primary_color = Some(primary.to_string());
        }
        if let Some(secondary) = listed.next() {
            norm.secondary_color_group = owned_groups(secondary);
            norm.secondary_color = Some(secondary.to_string());
        }
    }

    let imprint = raw.imprint.as_deref().unwrap_or("").trim();
    norm.imprint = imprint.to_string();
    norm.is_mark_reference = imprint.contains(MARK_MARKER);
    norm.imprint_variations = imprint_variations(imprint);

    norm
}

fn owned_groups(color: &str) -> Vec<String> {
    color_groups(color).iter().map(|g| g.to_string()).collect()
}
