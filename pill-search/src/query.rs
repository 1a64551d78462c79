//! Query construction
//!
//! Turns normalized attributes into a weighted boolean query. Shape and
//! color become exact filters, the imprint and its variations become
//! boosted optional clauses. A second branch lets transparent capsules
//! through regardless of the requested color, since their color carries
//! no reliable signal.
//!
//! The query is engine neutral; [`QueryDocument::to_json`] renders it in
//! Elasticsearch DSL and the local index translates it to Tantivy queries.

use serde_json::{json, Value};

use crate::config::BoostConfig;
use crate::normalize::{NormalizedFeatures, TRANSPARENT_GROUP};

/// Indexed field names shared with the catalog index
pub mod fields {
    pub const SHAPE_GROUP: &str = "shape_group";
    pub const COLOR_GROUP: &str = "color_group";
    pub const PRINT_FRONT: &str = "print_front";
    pub const PRINT_FRONT_KEYWORD: &str = "print_front.keyword";
    pub const PRINT_BACK: &str = "print_back";
    pub const PRINT_BACK_KEYWORD: &str = "print_back.keyword";
    pub const MARK_CODE_FRONT: &str = "mark_code_front_anal";
    pub const MARK_CODE_BACK: &str = "mark_code_back_anal";
}

/// (text field, keyword sub-field, mark-code field) for each pill side
const IMPRINT_SIDES: [(&str, &str, &str); 2] = [
    (fields::PRINT_FRONT, fields::PRINT_FRONT_KEYWORD, fields::MARK_CODE_FRONT),
    (fields::PRINT_BACK, fields::PRINT_BACK_KEYWORD, fields::MARK_CODE_BACK),
];

/// A single query clause
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Exact keyword match
    Term {
        field: &'static str,
        value: String,
        boost: Option<f32>,
    },
    /// Exact match against any of several keywords
    Terms {
        field: &'static str,
        values: Vec<String>,
    },
    /// Analyzed text match, optionally tolerant to edits
    Match {
        field: &'static str,
        query: String,
        boost: f32,
        fuzzy: bool,
    },
    Bool(BoolQuery),
    MatchNone,
}

impl Clause {
    fn term(field: &'static str, value: &str) -> Self {
        Clause::Term {
            field,
            value: value.to_string(),
            boost: None,
        }
    }

    fn boosted_term(field: &'static str, value: &str, boost: f32) -> Self {
        Clause::Term {
            field,
            value: value.to_string(),
            boost: Some(boost),
        }
    }

    fn text(field: &'static str, query: &str, boost: f32, fuzzy: bool) -> Self {
        Clause::Match {
            field,
            query: query.to_string(),
            boost,
            fuzzy,
        }
    }

    fn terms(field: &'static str, values: &[String]) -> Self {
        Clause::Terms {
            field,
            values: values.to_vec(),
        }
    }

    /// Render as Elasticsearch query DSL
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Term {
                field,
                value,
                boost: Some(boost),
            } => json!({ "term": { *field: { "value": value, "boost": boost } } }),
            Clause::Term {
                field,
                value,
                boost: None,
            } => json!({ "term": { *field: value } }),
            Clause::Terms { field, values } => json!({ "terms": { *field: values } }),
            Clause::Match {
                field,
                query,
                boost,
                fuzzy,
            } => {
                let mut body = json!({ "query": query, "boost": boost });
                if *fuzzy {
                    body["fuzziness"] = json!("AUTO");
                }
                json!({ "match": { *field: body } })
            }
            Clause::Bool(bool_query) => bool_query.to_json(),
            Clause::MatchNone => json!({ "match_none": {} }),
        }
    }
}

/// Boolean combination: every filter must match (without scoring), and at
/// least `minimum_should_match` of the should clauses must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub filter: Vec<Clause>,
    pub should: Vec<Clause>,
    pub minimum_should_match: u32,
}

impl BoolQuery {
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty() && self.should.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        if !self.filter.is_empty() {
            body.insert(
                "filter".to_string(),
                Value::Array(self.filter.iter().map(Clause::to_json).collect()),
            );
        }
        body.insert(
            "should".to_string(),
            Value::Array(self.should.iter().map(Clause::to_json).collect()),
        );
        body.insert(
            "minimum_should_match".to_string(),
            json!(self.minimum_should_match),
        );
        json!({ "bool": body })
    }
}

/// One constructed search request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    /// Exact constraints, AND-combined
    pub filter_clauses: Vec<Clause>,
    /// Weighted optional constraints, OR-combined
    pub should_clauses: Vec<Clause>,
    pub minimum_should_match: u32,
    /// Number of results requested
    pub size: usize,
    /// Branch admitting transparent items; `None` matches nothing
    pub transparent_bypass: Option<BoolQuery>,
}

impl QueryDocument {
    /// The color/shape filtered branch
    pub fn primary(&self) -> BoolQuery {
        BoolQuery {
            filter: self.filter_clauses.clone(),
            should: self.should_clauses.clone(),
            minimum_should_match: self.minimum_should_match,
        }
    }

    pub fn bypass(&self) -> Clause {
        match &self.transparent_bypass {
            Some(branch) => Clause::Bool(branch.clone()),
            None => Clause::MatchNone,
        }
    }

    /// The complete query: primary branch OR transparent bypass
    pub fn root(&self) -> BoolQuery {
        BoolQuery {
            filter: Vec::new(),
            should: vec![Clause::Bool(self.primary()), self.bypass()],
            minimum_should_match: 1,
        }
    }

    /// Render the full `_search` request body
    pub fn to_json(&self) -> Value {
        json!({
            "size": self.size,
            "query": self.root().to_json(),
            "sort": [{ "_score": { "order": "desc" } }],
        })
    }
}

/// Builds [`QueryDocument`]s with a fixed set of boosts
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    boosts: BoostConfig,
}

impl QueryBuilder {
    pub fn new(boosts: BoostConfig) -> Self {
        Self { boosts }
    }

    /// Build the query for `norm`, requesting `top_k` results.
    pub fn build(&self, norm: &NormalizedFeatures, top_k: usize) -> QueryDocument {
        let mut filter_clauses = Vec::new();

        let shape_filter = norm
            .shape_group
            .as_deref()
            .map(|group| Clause::term(fields::SHAPE_GROUP, group));
        if let Some(clause) = &shape_filter {
            filter_clauses.push(clause.clone());
        }

        if !norm.primary_color_group.is_empty() {
            let primary = Clause::terms(fields::COLOR_GROUP, &norm.primary_color_group);
            if norm.secondary_color_group.is_empty() {
                filter_clauses.push(primary);
            } else {
                filter_clauses.push(Clause::Bool(BoolQuery {
                    filter: Vec::new(),
                    should: vec![
                        primary,
                        Clause::terms(fields::COLOR_GROUP, &norm.secondary_color_group),
                    ],
                    minimum_should_match: 1,
                }));
            }
        }

        let should_clauses = self.imprint_clauses(norm);
        let minimum_should_match = u32::from(!should_clauses.is_empty());

        let transparent_bypass = norm.has_imprint().then(|| {
            let mut filter = vec![Clause::term(fields::COLOR_GROUP, TRANSPARENT_GROUP)];
            filter.extend(shape_filter);
            BoolQuery {
                filter,
                should: should_clauses.clone(),
                minimum_should_match: 1,
            }
        });

        QueryDocument {
            filter_clauses,
            should_clauses,
            minimum_should_match,
            size: top_k,
            transparent_bypass,
        }
    }

    fn imprint_clauses(&self, norm: &NormalizedFeatures) -> Vec<Clause> {
        let mut clauses = Vec::new();
        if !norm.has_imprint() {
            return clauses;
        }

        let b = &self.boosts;
        let imprint = norm.imprint.as_str();
        let (mark_code, variation_exact, variation_mark_code) = if norm.is_mark_reference {
            (
                b.mark_code_for_mark,
                b.variation_exact_for_mark,
                b.variation_mark_code_for_mark,
            )
        } else {
            (
                b.mark_code_for_print,
                b.variation_exact_for_print,
                b.variation_mark_code_for_print,
            )
        };

        for (text_field, keyword_field, _) in IMPRINT_SIDES {
            clauses.push(Clause::boosted_term(keyword_field, imprint, b.exact));
            clauses.push(Clause::text(text_field, imprint, b.fuzzy, true));
        }
        for (_, _, mark_field) in IMPRINT_SIDES {
            clauses.push(Clause::text(mark_field, imprint, mark_code, false));
        }

        for variation in &norm.imprint_variations {
            for (_, keyword_field, _) in IMPRINT_SIDES {
                clauses.push(Clause::boosted_term(keyword_field, variation, variation_exact));
            }
            for (_, _, mark_field) in IMPRINT_SIDES {
                clauses.push(Clause::text(mark_field, variation, variation_mark_code, false));
            }
        }

        clauses
    }
}

/// Build a query with the default boosts
pub fn build_query(norm: &NormalizedFeatures, top_k: usize) -> QueryDocument {
    QueryBuilder::default().build(norm, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, ColorClasses, RawFeatures};

    fn features(shape: Option<&str>, colors: &[&str], imprint: Option<&str>) -> NormalizedFeatures {
        normalize(&RawFeatures {
            drug_shape: shape.map(str::to_string),
            color_classes: (!colors.is_empty())
                .then(|| ColorClasses::Many(colors.iter().map(|c| c.to_string()).collect())),
            imprint: imprint.map(str::to_string),
        })
    }

    fn boost_of(clauses: &[Clause], wanted_field: &str, wanted_value: &str) -> Option<f32> {
        clauses.iter().find_map(|c| match c {
            Clause::Term {
                field,
                value,
                boost,
            } if *field == wanted_field && value == wanted_value => *boost,
            Clause::Match {
                field, query, boost, ..
            } if *field == wanted_field && query == wanted_value => Some(*boost),
            _ => None,
        })
    }

    #[test]
    fn test_empty_features_unconstrained() {
        let query = build_query(&NormalizedFeatures::default(), 5);
        assert!(query.filter_clauses.is_empty());
        assert!(query.should_clauses.is_empty());
        assert_eq!(query.minimum_should_match, 0);
        assert_eq!(query.size, 5);
        assert!(query.transparent_bypass.is_none());
        assert_eq!(query.bypass(), Clause::MatchNone);
    }

    #[test]
    fn test_shape_and_single_color_filters() {
        let query = build_query(&features(Some("원형"), &["하양"], None), 5);
        assert_eq!(
            query.filter_clauses,
            vec![
                Clause::term(fields::SHAPE_GROUP, "원형"),
                Clause::terms(fields::COLOR_GROUP, &["하양".to_string()]),
            ]
        );
    }

    #[test]
    fn test_two_colors_are_or_combined() {
        let query = build_query(&features(None, &["하양", "청록"], None), 5);
        assert_eq!(query.filter_clauses.len(), 1);
        match &query.filter_clauses[0] {
            Clause::Bool(inner) => {
                assert_eq!(inner.minimum_should_match, 1);
                assert_eq!(
                    inner.should[1],
                    Clause::terms(
                        fields::COLOR_GROUP,
                        &["초록계열".to_string(), "파랑계열".to_string()]
                    )
                );
            }
            other => panic!("expected bool clause, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_boost_exceeds_fuzzy() {
        let query = build_query(&features(None, &[], Some("A10")), 5);
        for (text_field, keyword_field, _) in IMPRINT_SIDES {
            let exact = boost_of(&query.should_clauses, keyword_field, "A10").unwrap();
            let fuzzy = boost_of(&query.should_clauses, text_field, "A10").unwrap();
            assert_eq!(exact, 10.0);
            assert_eq!(fuzzy, 5.0);
            assert!(exact > fuzzy);
        }
        assert_eq!(query.minimum_should_match, 1);
    }

    #[test]
    fn test_mark_reference_boosts() {
        let mark = build_query(&features(None, &[], Some("마크 B")), 5);
        let print = build_query(&features(None, &[], Some("B")), 5);

        assert_eq!(boost_of(&mark.should_clauses, fields::MARK_CODE_FRONT, "마크 B"), Some(8.0));
        assert_eq!(boost_of(&print.should_clauses, fields::MARK_CODE_BACK, "B"), Some(4.0));

        // "B" varies to "8"
        assert_eq!(boost_of(&print.should_clauses, fields::PRINT_FRONT_KEYWORD, "8"), Some(5.0));
        assert_eq!(boost_of(&print.should_clauses, fields::MARK_CODE_FRONT, "8"), Some(3.0));
        assert_eq!(boost_of(&mark.should_clauses, fields::PRINT_BACK_KEYWORD, "마크 8"), Some(8.0));
        assert_eq!(boost_of(&mark.should_clauses, fields::MARK_CODE_BACK, "마크 8"), Some(6.0));
    }

    #[test]
    fn test_clause_count_per_variation() {
        let norm = features(None, &[], Some("8B"));
        let query = build_query(&norm, 5);
        assert_eq!(norm.imprint_variations.len(), 2);
        assert_eq!(query.should_clauses.len(), 6 + 4 * 2);
    }

    #[test]
    fn test_transparent_bypass_branch() {
        let query = build_query(&features(Some("원형"), &["하양"], Some("A10")), 5);
        let bypass = query.transparent_bypass.clone().unwrap();

        assert_eq!(
            bypass.filter,
            vec![
                Clause::term(fields::COLOR_GROUP, TRANSPARENT_GROUP),
                Clause::term(fields::SHAPE_GROUP, "원형"),
            ]
        );
        assert_eq!(bypass.should, query.should_clauses);
        assert_eq!(bypass.minimum_should_match, 1);
    }

    #[test]
    fn test_bypass_without_shape() {
        let query = build_query(&features(None, &["하양"], Some("A10")), 5);
        let bypass = query.transparent_bypass.unwrap();
        assert_eq!(bypass.filter, vec![Clause::term(fields::COLOR_GROUP, TRANSPARENT_GROUP)]);
    }

    #[test]
    fn test_custom_boosts() {
        let builder = QueryBuilder::new(BoostConfig {
            exact: 20.0,
            ..BoostConfig::default()
        });
        let query = builder.build(&features(None, &[], Some("XK")), 3);
        assert_eq!(boost_of(&query.should_clauses, fields::PRINT_FRONT_KEYWORD, "XK"), Some(20.0));
    }

    #[test]
    fn test_json_shape() {
        let body = build_query(&features(Some("원형"), &["하양"], Some("A10")), 7).to_json();

        assert_eq!(body["size"], 7);
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");

        let root = &body["query"]["bool"];
        assert_eq!(root["minimum_should_match"], 1);

        let primary = &root["should"][0]["bool"];
        assert_eq!(primary["filter"][0]["term"]["shape_group"], "원형");
        assert_eq!(primary["filter"][1]["terms"]["color_group"][0], "하양");
        assert_eq!(primary["minimum_should_match"], 1);
        assert_eq!(primary["should"][0]["term"]["print_front.keyword"]["value"], "A10");
        assert_eq!(primary["should"][0]["term"]["print_front.keyword"]["boost"], 10.0);
        assert_eq!(primary["should"][1]["match"]["print_front"]["fuzziness"], "AUTO");
        assert!(primary["should"][4]["match"]["mark_code_front_anal"]
            .get("fuzziness")
            .is_none());

        let bypass = &root["should"][1]["bool"];
        assert_eq!(bypass["filter"][0]["term"]["color_group"], "투명");
        assert_eq!(bypass["filter"][1]["term"]["shape_group"], "원형");
    }

    #[test]
    fn test_json_without_imprint_uses_match_none() {
        let body = build_query(&features(Some("원형"), &[], None), 5).to_json();
        let root = &body["query"]["bool"];
        assert_eq!(root["should"][1], json!({ "match_none": {} }));
        assert_eq!(root["should"][0]["bool"]["minimum_should_match"], 0);
    }
}
