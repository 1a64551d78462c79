//! Embedded catalog index
//!
//! A Tantivy index laid out like the remote Elasticsearch mapping, so the
//! same [`QueryDocument`] can run locally. Keyword sub-fields such as
//! `print_front.keyword` are stored as separate raw fields
//! (`print_front_keyword`).

use std::path::Path;

use serde::Serialize;
use tantivy::{
    collector::TopDocs,
    directory::MmapDirectory,
    query::{
        AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur,
        Query, TermQuery,
    },
    schema::{Field, IndexRecordOption, Schema, Value as _, STORED, STRING, TEXT},
    tokenizer::TokenStream,
    Index, IndexWriter, TantivyDocument, Term,
};
use thiserror::Error;

use crate::catalog::{CatalogError, PillDocument};
use crate::query::{fields, BoolQuery, Clause, QueryDocument};
use crate::rank::RankedHit;

/// Errors that can occur during index operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field {0} is not part of the catalog schema")]
    UnknownField(String),
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub num_docs: u64,
    pub num_segments: usize,
}

const ITEM_SEQ: &str = "item_seq";
const SOURCE: &str = "source";
const DRUG_SHAPE: &str = "drug_shape";
const PRINT_FRONT_RAW: &str = "print_front_keyword";
const PRINT_BACK_RAW: &str = "print_back_keyword";

struct CatalogFields {
    item_seq: Field,
    source: Field,
    drug_shape: Field,
    shape_group: Field,
    color_group: Field,
    print_front: Field,
    print_front_keyword: Field,
    print_back: Field,
    print_back_keyword: Field,
    mark_code_front: Field,
    mark_code_back: Field,
}

impl CatalogFields {
    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field(ITEM_SEQ, STRING | STORED);
        // full source document, returned with hits
        builder.add_text_field(SOURCE, STORED);
        builder.add_text_field(DRUG_SHAPE, STRING);
        builder.add_text_field(fields::SHAPE_GROUP, STRING);
        builder.add_text_field(fields::COLOR_GROUP, STRING);
        builder.add_text_field(fields::PRINT_FRONT, TEXT);
        builder.add_text_field(PRINT_FRONT_RAW, STRING);
        builder.add_text_field(fields::PRINT_BACK, TEXT);
        builder.add_text_field(PRINT_BACK_RAW, STRING);
        builder.add_text_field(fields::MARK_CODE_FRONT, TEXT);
        builder.add_text_field(fields::MARK_CODE_BACK, TEXT);
        builder.build()
    }

    fn resolve(schema: &Schema) -> Result<Self, IndexError> {
        Ok(Self {
            item_seq: schema.get_field(ITEM_SEQ)?,
            source: schema.get_field(SOURCE)?,
            drug_shape: schema.get_field(DRUG_SHAPE)?,
            shape_group: schema.get_field(fields::SHAPE_GROUP)?,
            color_group: schema.get_field(fields::COLOR_GROUP)?,
            print_front: schema.get_field(fields::PRINT_FRONT)?,
            print_front_keyword: schema.get_field(PRINT_FRONT_RAW)?,
            print_back: schema.get_field(fields::PRINT_BACK)?,
            print_back_keyword: schema.get_field(PRINT_BACK_RAW)?,
            mark_code_front: schema.get_field(fields::MARK_CODE_FRONT)?,
            mark_code_back: schema.get_field(fields::MARK_CODE_BACK)?,
        })
    }
}

/// Edit distance Elasticsearch's `fuzziness: AUTO` allows for a term
fn auto_fuzziness(term: &str) -> u8 {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Tantivy index holding the pill catalog
pub struct CatalogIndex {
    index: Index,
    writer: IndexWriter,
    fields: CatalogFields,
}

impl CatalogIndex {
    /// Create or open a catalog index at the specified path
    pub fn new(data_dir: &str) -> Result<Self, IndexError> {
        let path = Path::new(data_dir);
        std::fs::create_dir_all(path)?;

        let dir = MmapDirectory::open(path)?;
        let index = if path.join("meta.json").exists() {
            Index::open(dir)?
        } else {
            Index::create(dir, CatalogFields::schema(), tantivy::IndexSettings::default())?
        };
        Self::with_index(index)
    }

    /// Create an index that lives only in memory
    pub fn in_memory() -> Result<Self, IndexError> {
        Self::with_index(Index::create_in_ram(CatalogFields::schema()))
    }

    fn with_index(index: Index) -> Result<Self, IndexError> {
        let fields = CatalogFields::resolve(&index.schema())?;
        // 50MB writer buffer
        let writer = index.writer(50_000_000)?;
        Ok(Self {
            index,
            writer,
            fields,
        })
    }

    /// Add or replace a catalog entry (not committed until commit() is called)
    pub fn add_document(&mut self, pill: &PillDocument) -> Result<(), IndexError> {
        self.delete_document(&pill.item_seq)?;

        let f = &self.fields;
        let mut doc = TantivyDocument::default();
        doc.add_text(f.item_seq, &pill.item_seq);
        doc.add_text(f.source, pill.to_source()?.to_string());
        doc.add_text(f.drug_shape, &pill.drug_shape);
        if let Some(group) = &pill.shape_group {
            doc.add_text(f.shape_group, group);
        }
        for group in &pill.color_group {
            doc.add_text(f.color_group, group);
        }
        if let Some(front) = &pill.print_front {
            doc.add_text(f.print_front, front);
            doc.add_text(f.print_front_keyword, front);
        }
        if let Some(back) = &pill.print_back {
            doc.add_text(f.print_back, back);
            doc.add_text(f.print_back_keyword, back);
        }
        for code in &pill.mark_code_front_anal {
            doc.add_text(f.mark_code_front, code);
        }
        for code in &pill.mark_code_back_anal {
            doc.add_text(f.mark_code_back, code);
        }

        self.writer.add_document(doc)?;
        Ok(())
    }

    /// Delete a catalog entry by item_seq
    pub fn delete_document(&mut self, item_seq: &str) -> Result<(), IndexError> {
        let term = Term::from_field_text(self.fields.item_seq, item_seq);
        self.writer.delete_term(term);
        Ok(())
    }

    /// Commit pending changes
    pub fn commit(&mut self) -> Result<(), IndexError> {
        self.writer.commit()?;
        Ok(())
    }

    /// Clear the entire index
    pub fn clear(&mut self) -> Result<(), IndexError> {
        self.writer.delete_all_documents()?;
        self.writer.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let searcher = self.index.reader()?.searcher();
        Ok(IndexStats {
            num_docs: searcher.num_docs(),
            num_segments: searcher.segment_readers().len(),
        })
    }

    /// Fetch the stored source of one entry
    pub fn get(&self, item_seq: &str) -> Result<Option<serde_json::Value>, IndexError> {
        let searcher = self.index.reader()?.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.fields.item_seq, item_seq),
            IndexRecordOption::Basic,
        );
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top_docs.first() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher.doc(*address)?;
                self.source_of(&doc).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Execute a built query, returning hits by descending score
    pub fn search(&self, query: &QueryDocument) -> Result<Vec<RankedHit>, IndexError> {
        let searcher = self.index.reader()?.searcher();
        let compiled = self.bool_query(&query.root())?;

        let top_docs =
            searcher.search(compiled.as_ref(), &TopDocs::with_limit(query.size.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(RankedHit {
                score,
                document: self.source_of(&doc)?,
            });
        }
        Ok(hits)
    }

    fn source_of(&self, doc: &TantivyDocument) -> Result<serde_json::Value, IndexError> {
        let text = doc
            .get_first(self.fields.source)
            .and_then(|v| v.as_str())
            .unwrap_or("{}");
        Ok(serde_json::from_str(text)?)
    }

    fn field(&self, name: &str) -> Result<Field, IndexError> {
        let f = &self.fields;
        let field = match name {
            fields::SHAPE_GROUP => f.shape_group,
            fields::COLOR_GROUP => f.color_group,
            fields::PRINT_FRONT => f.print_front,
            fields::PRINT_FRONT_KEYWORD => f.print_front_keyword,
            fields::PRINT_BACK => f.print_back,
            fields::PRINT_BACK_KEYWORD => f.print_back_keyword,
            fields::MARK_CODE_FRONT => f.mark_code_front,
            fields::MARK_CODE_BACK => f.mark_code_back,
            ITEM_SEQ => f.item_seq,
            DRUG_SHAPE => f.drug_shape,
            other => return Err(IndexError::UnknownField(other.to_string())),
        };
        Ok(field)
    }

    /// Split text the way the field's analyzer does at index time
    fn analyze(&self, field: Field, text: &str) -> Result<Vec<String>, IndexError> {
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }

    fn clause_query(&self, clause: &Clause) -> Result<Box<dyn Query>, IndexError> {
        let query: Box<dyn Query> = match clause {
            Clause::Term {
                field,
                value,
                boost,
            } => {
                let term = Term::from_field_text(self.field(field)?, value);
                let query = Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                match boost {
                    Some(boost) => Box::new(BoostQuery::new(query, *boost)),
                    None => query,
                }
            }
            Clause::Terms { field, values } => {
                let field = self.field(field)?;
                let alternatives = values
                    .iter()
                    .map(|value| {
                        let term = Term::from_field_text(field, value);
                        let query: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                        (Occur::Should, query)
                    })
                    .collect();
                Box::new(BooleanQuery::new(alternatives))
            }
            Clause::Match {
                field,
                query,
                boost,
                fuzzy,
            } => {
                let field = self.field(field)?;
                let tokens = self.analyze(field, query)?;
                if tokens.is_empty() {
                    return Ok(Box::new(EmptyQuery));
                }
                let alternatives = tokens
                    .iter()
                    .map(|token| {
                        let term = Term::from_field_text(field, token);
                        let distance = if *fuzzy { auto_fuzziness(token) } else { 0 };
                        let query: Box<dyn Query> = if distance > 0 {
                            Box::new(FuzzyTermQuery::new(term, distance, true))
                        } else {
                            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
                        };
                        (Occur::Should, query)
                    })
                    .collect();
                Box::new(BoostQuery::new(Box::new(BooleanQuery::new(alternatives)), *boost))
            }
            Clause::Bool(inner) => self.bool_query(inner)?,
            Clause::MatchNone => Box::new(EmptyQuery),
        };
        Ok(query)
    }

    /// Filters become zero-scored MUST clauses; a positive
    /// `minimum_should_match` is enforced by nesting the should clauses in
    /// a required disjunction.
    fn bool_query(&self, bool_query: &BoolQuery) -> Result<Box<dyn Query>, IndexError> {
        if bool_query.is_empty() {
            return Ok(Box::new(AllQuery));
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for filter in &bool_query.filter {
            let query = ConstScoreQuery::new(self.clause_query(filter)?, 0.0);
            clauses.push((Occur::Must, Box::new(query)));
        }

        let mut optional: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for should in &bool_query.should {
            optional.push((Occur::Should, self.clause_query(should)?));
        }

        if bool_query.minimum_should_match > 0 && !clauses.is_empty() && !optional.is_empty() {
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(optional))));
        } else {
            clauses.extend(optional);
        }

        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}
