//! Reference-document search used by the benchmark stage.
//!
//! Paragraphs of the loaded documents live in a RAM-backed tantivy index
//! and are ranked by BM25. Snippets are advisory evidence only; nothing
//! here feeds a score.

use std::fmt;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CmError, Result};

const DEFAULT_LIMIT: usize = 3;
const SNIPPET_CHARS: usize = 280;
const WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// `path#paragraph` of the source passage.
    pub source: String,
    pub text: String,
    /// BM25 score of the passage for the query.
    pub score: f32,
}

/// Filters for narrowing search results
#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub limit: usize,
    /// Only passages whose source starts with this prefix.
    pub source_prefix: Option<String>,
    /// Minimum BM25 score
    pub min_score: f32,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            source_prefix: None,
            min_score: 0.0,
        }
    }
}

impl SearchFilters {
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score.max(0.0);
        self
    }

    fn matches(&self, source: &str, score: f32) -> bool {
        if score <= 0.0 || score < self.min_score {
            return false;
        }
        self.source_prefix
            .as_deref()
            .is_none_or(|prefix| source.starts_with(prefix))
    }
}

/// Document-store capability.
pub trait DocumentStore: Send + Sync {
    fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Snippet>>;

    /// Number of indexed passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy)]
struct PassageFields {
    source: Field,
    text: Field,
}

/// BM25 store over paragraphs of `.md` and `.txt` files.
pub struct InMemoryDocumentStore {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: PassageFields,
}

impl fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("passages", &self.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryDocumentStore {
    /// An empty index in RAM.
    pub fn new() -> Result<Self> {
        let schema = build_schema();
        let fields = extract_fields(&schema)?;
        let index = Index::create_in_ram(schema);
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Index one document, one passage per blank-line separated paragraph,
    /// and make it searchable. Returns the number of passages added.
    pub fn add(&self, source: &str, text: &str) -> Result<usize> {
        let mut writer = self.writer.lock();
        let mut added = 0;
        for (index, paragraph) in text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .enumerate()
        {
            if !paragraph.chars().any(char::is_alphanumeric) {
                continue;
            }
            let mut doc = TantivyDocument::new();
            doc.add_text(self.fields.source, format!("{source}#{}", index + 1));
            doc.add_text(
                self.fields.text,
                paragraph.split_whitespace().collect::<Vec<_>>().join(" "),
            );
            writer.add_document(doc)?;
            added += 1;
        }
        writer.commit()?;
        drop(writer);

        self.reader.reload()?;
        Ok(added)
    }

    /// Index every `.md` / `.txt` file under `dir`, in path order.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(CmError::DocumentStore(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let store = Self::new()?;
        let mut files: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("txt"))
            })
            .map(walkdir::DirEntry::into_path)
            .collect();
        files.sort();

        for path in files {
            let text = std::fs::read_to_string(&path).map_err(|err| {
                CmError::DocumentStore(format!("read {}: {err}", path.display()))
            })?;
            let source = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            store.add(&source, &text)?;
        }
        debug!(passages = store.len(), dir = %dir.display(), "documents indexed");
        Ok(store)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Snippet>> {
        let terms = query_terms(query);
        let total = self.len();
        if terms.is_empty() || filters.limit == 0 || total == 0 {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let parsed = parser
            .parse_query(&terms)
            .map_err(|err| CmError::DocumentStore(format!("query '{query}': {err}")))?;

        // A prefix filter is applied after scoring, so it needs every hit.
        let fetch = if filters.source_prefix.is_some() {
            total
        } else {
            filters.limit.min(total)
        };
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(fetch))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let source = doc
                .get_first(self.fields.source)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if !filters.matches(&source, score) {
                continue;
            }
            let text = doc
                .get_first(self.fields.text)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            hits.push(Snippet {
                source,
                text: truncate(text, SNIPPET_CHARS),
                score,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.source.cmp(&b.source)));
        hits.truncate(filters.limit);
        Ok(hits)
    }

    fn len(&self) -> usize {
        usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX)
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    let text_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    builder.add_text_field("source", STRING | STORED);
    builder.add_text_field("text", text_options);
    builder.build()
}

fn extract_fields(schema: &Schema) -> Result<PassageFields> {
    let field = |name: &str| {
        schema.get_field(name).map_err(|_| {
            CmError::SearchIndex(tantivy::TantivyError::SchemaError(format!(
                "missing {name} field"
            )))
        })
    };
    Ok(PassageFields {
        source: field("source")?,
        text: field("text")?,
    })
}

/// Lowercased words only, so free text never trips the query syntax.
fn query_terms(query: &str) -> String {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new().unwrap();
        store
            .add(
                "playbook.md",
                "Incident response starts with paging the on-call engineer.\n\n\
                 Postmortems are blameless and published within five days.",
            )
            .unwrap();
        store
            .add("budget.txt", "Quarterly budget forecasts are owned by finance.")
            .unwrap();
        store
    }

    #[test]
    fn search_ranks_by_bm25() {
        let hits = store()
            .search("incident response paging", &SearchFilters::default())
            .unwrap();
        assert_eq!(hits[0].source, "playbook.md#1");
        assert!(hits[0].score > 0.0);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn search_respects_filters() {
        let store = store();
        let filters = SearchFilters::default().with_source_prefix("budget");
        let hits = store.search("quarterly budget incident", &filters).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "budget.txt#1");

        let none = store
            .search("quarterly budget", &SearchFilters::default().with_limit(0))
            .unwrap();
        assert!(none.is_empty());

        let strict = SearchFilters::default().with_min_score(f32::MAX);
        assert!(store.search("quarterly budget", &strict).unwrap().is_empty());
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        let hits = store()
            .search("kubernetes autoscaling", &SearchFilters::default())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn query_syntax_characters_are_plain_text() {
        let hits = store()
            .search("Incident: response (paging) AND \"on-call\" -budget", &SearchFilters::default())
            .unwrap();
        assert_eq!(hits[0].source, "playbook.md#1");
        assert_eq!(query_terms("Month-end close: AND"), "month end close and");
    }

    #[test]
    fn add_counts_paragraphs_with_text() {
        let store = InMemoryDocumentStore::new().unwrap();
        assert!(store.is_empty());
        let added = store.add("notes.md", "First point.\n\n---\n\nSecond point.").unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.len(), 2);
        let hits = store.search("second", &SearchFilters::default()).unwrap();
        assert_eq!(hits[0].source, "notes.md#3");
    }

    #[test]
    fn load_dir_indexes_markdown_and_text_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "Capacity planning for storage clusters").unwrap();
        std::fs::write(dir.path().join("b.txt"), "Vendor contract renewals").unwrap();
        std::fs::write(dir.path().join("c.json"), "{\"ignored\": true}").unwrap();

        let store = InMemoryDocumentStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
        let hits = store.search("vendor renewals", &SearchFilters::default()).unwrap();
        assert_eq!(hits[0].source, "b.txt#1");
    }

    #[test]
    fn load_dir_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = InMemoryDocumentStore::load_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, CmError::DocumentStore(_)));
    }
}
