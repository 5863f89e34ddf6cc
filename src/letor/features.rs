/// Learning-to-rank feature vectors
///
/// Eighteen features per (query, document) pair:
///
/// | #     | feature                                   |
/// |-------|-------------------------------------------|
/// | 1     | spam score attribute                      |
/// | 2     | URL depth (`/` count without `http://`)   |
/// | 3     | Wikipedia URL indicator                   |
/// | 4     | PageRank attribute                        |
/// | 5-7   | BM25, Indri, term overlap over body       |
/// | 8-10  | the same over title                       |
/// | 11-13 | the same over url                         |
/// | 14-16 | the same over inlink                      |
/// | 17    | inlink field length                       |
/// | 18    | title field length                        |
///
/// Field scores are computed from the document's term vector; a document without the
/// field has no value for that feature.

use std::io::Write;

use crate::errors::RankError;
use crate::index::{IndexStore, TermVector};
use crate::model::{self, Bm25Params, IndriParams};
use crate::posting::DocId;

pub const FEATURE_COUNT: usize = 18;

const TEXT_FIELDS: [&str; 4] = ["body", "title", "url", "inlink"];

/// Raw values; None when the feature is disabled or unavailable for the document.
pub type FeatureVector = [Option<f64>; FEATURE_COUNT];

pub struct FeatureExtractor<'a> {
    index: &'a dyn IndexStore,
    bm25: Bm25Params,
    indri: IndriParams,
    enabled: [bool; FEATURE_COUNT],
}

impl<'a> FeatureExtractor<'a> {
    /// `disabled` holds 1-based feature numbers.
    pub fn new(
        index: &'a dyn IndexStore,
        bm25: Bm25Params,
        indri: IndriParams,
        disabled: &[usize],
    ) -> Result<Self, RankError> {
        let mut enabled = [true; FEATURE_COUNT];
        for &f in disabled {
            if !(1..=FEATURE_COUNT).contains(&f) {
                return Err(RankError::Config(format!(
                    "letor.feature_disable: no feature {} (features are 1..={})",
                    f, FEATURE_COUNT
                )));
            }
            enabled[f - 1] = false;
        }
        Ok(FeatureExtractor { index, bm25, indri, enabled })
    }

    /// 0-based indices of the enabled features.
    pub fn enabled(&self) -> impl Iterator<Item = usize> + '_ {
        (0..FEATURE_COUNT).filter(move |&i| self.enabled[i])
    }

    pub fn extract(&self, terms: &[String], docid: DocId) -> FeatureVector {
        let mut v: FeatureVector = [None; FEATURE_COUNT];
        let raw_url = self.index.attribute("rawUrl", docid);

        v[0] = self.numeric_attribute("spamScore", docid);
        v[1] = raw_url
            .as_deref()
            .map(|u| u.replace("http://", "").matches('/').count() as f64);
        v[2] = raw_url
            .as_deref()
            .map(|u| if u.contains("wikipedia.org") { 1.0 } else { 0.0 });
        v[3] = self.numeric_attribute("PageRank", docid);

        for (i, field) in TEXT_FIELDS.iter().enumerate() {
            let tv = self.index.term_vector(docid, field).filter(|tv| !tv.is_empty());
            if let Some(tv) = tv {
                let base = 4 + 3 * i;
                v[base] = Some(self.bm25_score(terms, docid, &tv));
                v[base + 1] = Some(self.indri_score(terms, docid, &tv));
                v[base + 2] = Some(overlap(terms, &tv));
            }
        }

        v[16] = Some(self.index.field_length("inlink", docid) as f64);
        v[17] = Some(self.index.field_length("title", docid) as f64);

        for (slot, on) in v.iter_mut().zip(self.enabled) {
            if !on {
                *slot = None;
            }
        }
        v
    }

    fn numeric_attribute(&self, name: &str, docid: DocId) -> Option<f64> {
        let raw = self.index.attribute(name, docid)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::debug!(name, value = %raw, docid, "Ignoring non-numeric attribute");
                None
            }
        }
    }

    fn bm25_score(&self, terms: &[String], docid: DocId, tv: &TermVector) -> f64 {
        let n = self.index.num_docs() as f64;
        let doc_len = self.index.field_length(&tv.field, docid) as f64;
        let doc_count = self.index.doc_count(&tv.field) as f64;
        let avg_len = if doc_count > 0.0 {
            self.index.sum_of_field_lengths(&tv.field) as f64 / doc_count
        } else {
            0.0
        };
        terms
            .iter()
            .filter_map(|t| tv.lookup(t))
            .map(|e| {
                model::bm25_idf(n, e.df as f64)
                    * model::bm25_tf_weight(e.tf as f64, doc_len, avg_len, &self.bm25)
            })
            .sum()
    }

    fn indri_score(&self, terms: &[String], docid: DocId, tv: &TermVector) -> f64 {
        let doc_len = self.index.field_length(&tv.field, docid) as f64;
        let total = self.index.sum_of_field_lengths(&tv.field) as f64;
        let mut matched = 0;
        let mut product = 1.0;
        for term in terms {
            let tf = match tv.lookup(term) {
                Some(e) => {
                    matched += 1;
                    e.tf as f64
                }
                None => 0.0,
            };
            let ctf = self.index.total_term_freq(&tv.field, term) as f64;
            product *= model::indri_score(tf, doc_len, ctf, total, &self.indri);
        }
        if matched == 0 {
            0.0
        } else {
            product.powf(1.0 / terms.len() as f64)
        }
    }
}

fn overlap(terms: &[String], tv: &TermVector) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| tv.lookup(t).is_some()).count();
    hits as f64 / terms.len() as f64
}

/// Min-max normalize each feature across one query's documents.
///
/// Missing values do not take part in min/max and become 0, as do features whose
/// min equals their max.
pub fn normalize(vectors: &[FeatureVector]) -> Vec<[f64; FEATURE_COUNT]> {
    let mut bounds = [(f64::INFINITY, f64::NEG_INFINITY); FEATURE_COUNT];
    for v in vectors {
        for (b, x) in bounds.iter_mut().zip(v) {
            if let Some(x) = x {
                b.0 = b.0.min(*x);
                b.1 = b.1.max(*x);
            }
        }
    }

    vectors
        .iter()
        .map(|v| {
            let mut out = [0.0; FEATURE_COUNT];
            for ((o, x), (min, max)) in out.iter_mut().zip(v).zip(bounds) {
                if let Some(x) = x {
                    if max > min {
                        *o = (x - min) / (max - min);
                    }
                }
            }
            out
        })
        .collect()
}

/// One SVM-rank line: `rel qid:Q i:v ... # externalId`, enabled features only.
pub fn write_svm_line<W: Write>(
    out: &mut W,
    relevance: i32,
    qid: &str,
    values: &[f64; FEATURE_COUNT],
    enabled: impl Iterator<Item = usize>,
    external_id: &str,
) -> std::io::Result<()> {
    write!(out, "{} qid:{}", relevance, qid)?;
    for i in enabled {
        write!(out, " {}:{}", i + 1, values[i])?;
    }
    writeln!(out, " # {}", external_id)
}
