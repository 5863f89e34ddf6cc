/// Learning-to-rank pipeline
///
/// 1. Feature vectors for every judged document of every training query
/// 2. `Ranker::train` on those vectors
/// 3. BM25 top documents of every test query, feature vectors for each
/// 4. `Ranker::classify`, then each query is re-ranked by classifier score

pub mod features;
pub mod ranker;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::Config;
use crate::errors::RankError;
use crate::index::memory::tokenize;
use crate::index::IndexStore;
use crate::model::{Bm25Params, IndriParams, RetrievalModel};
use crate::posting::DocId;
use crate::query;
use crate::ranking::ScoreList;
use crate::trec::{self, QueryLine, RunWriter};

pub use features::{FeatureExtractor, FeatureVector, FEATURE_COUNT};
pub use ranker::{Ranker, SvmRankProcess};

struct Candidate {
    docid: DocId,
    external_id: String,
    relevance: i32,
}

fn create(path: &Path) -> Result<BufWriter<File>, RankError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| RankError::io(path, e))
}

/// Append the normalized vectors of one query's candidates to `out`.
fn write_query_vectors<W: Write>(
    out: &mut W,
    out_path: &Path,
    extractor: &FeatureExtractor<'_>,
    query: &QueryLine,
    candidates: &[Candidate],
) -> Result<(), RankError> {
    let terms = tokenize(&query.text);
    let raw: Vec<FeatureVector> = candidates
        .iter()
        .map(|c| extractor.extract(&terms, c.docid))
        .collect();
    for (c, values) in candidates.iter().zip(features::normalize(&raw)) {
        features::write_svm_line(
            out,
            c.relevance,
            &query.qid,
            &values,
            extractor.enabled(),
            &c.external_id,
        )
        .map_err(|e| RankError::io(out_path, e))?;
    }
    Ok(())
}

/// Train on the judged training queries, then re-rank the BM25 results of
/// `config.query_file`. Returns the number of test queries written.
pub fn run_letor(
    config: &Config,
    index: &dyn IndexStore,
    ranker: &dyn Ranker,
) -> Result<usize, RankError> {
    let letor = &config.letor;
    let training_queries =
        trec::read_query_file(Config::require(&letor.training_query_file, "letor.training_query_file")?)?;
    let qrels =
        trec::read_qrels_file(Config::require(&letor.training_qrels_file, "letor.training_qrels_file")?)?;
    let training_path = Config::require(
        &letor.training_feature_vectors_file,
        "letor.training_feature_vectors_file",
    )?;
    let testing_path = Config::require(
        &letor.testing_feature_vectors_file,
        "letor.testing_feature_vectors_file",
    )?;
    let scores_path = Config::require(&letor.testing_document_scores, "letor.testing_document_scores")?;
    let model_path = Config::require(&letor.model_file, "letor.model_file")?;
    let test_queries = trec::read_query_file(Config::require(&config.query_file, "query_file")?)?;

    let bm25 = Bm25Params::from_config(&config.model)?;
    let indri = IndriParams::from_config(&config.model)?;
    let initial_model = RetrievalModel::Bm25(bm25);
    let extractor = FeatureExtractor::new(index, bm25, indri, &letor.feature_disable)?;

    // Training vectors
    let mut out = create(training_path)?;
    let mut judged_total = 0;
    for query in &training_queries {
        let Some(judgments) = qrels.get(&query.qid) else {
            tracing::debug!(qid = %query.qid, "No judgments for training query");
            continue;
        };
        let mut candidates = Vec::with_capacity(judgments.len());
        for (external_id, relevance) in judgments {
            match index.internal_docid(external_id) {
                Ok(docid) => candidates.push(Candidate {
                    docid,
                    external_id: external_id.clone(),
                    relevance: *relevance,
                }),
                Err(_) => tracing::debug!(qid = %query.qid, %external_id, "Judged document not in index"),
            }
        }
        judged_total += candidates.len();
        write_query_vectors(&mut out, training_path, &extractor, query, &candidates)?;
    }
    out.flush().map_err(|e| RankError::io(training_path, e))?;
    tracing::info!(
        queries = training_queries.len(),
        vectors = judged_total,
        path = %training_path.display(),
        "Training vectors written"
    );

    ranker.train(training_path, model_path)?;

    // Testing vectors over the initial BM25 ranking
    let mut out = create(testing_path)?;
    let mut order: Vec<(usize, DocId)> = Vec::new();
    for (qi, query) in test_queries.iter().enumerate() {
        let mut ranking = query::search(&query.text, &initial_model, index)?;
        ranking.truncate(config.output.length);
        let candidates = ranking
            .iter()
            .map(|e| {
                Ok(Candidate {
                    docid: e.docid,
                    external_id: index.external_docid(e.docid)?,
                    relevance: 0,
                })
            })
            .collect::<Result<Vec<_>, RankError>>()?;
        order.extend(candidates.iter().map(|c| (qi, c.docid)));
        write_query_vectors(&mut out, testing_path, &extractor, query, &candidates)?;
    }
    out.flush().map_err(|e| RankError::io(testing_path, e))?;

    let scores = ranker.classify(testing_path, model_path, scores_path)?;
    if scores.len() != order.len() {
        return Err(RankError::Ranker(format!(
            "Classifier returned {} scores for {} feature vectors",
            scores.len(),
            order.len()
        )));
    }

    let mut rankings = vec![ScoreList::new(); test_queries.len()];
    for ((qi, docid), score) in order.into_iter().zip(scores) {
        rankings[qi].push(docid, score);
    }

    let mut writer = RunWriter::create(&config.output.path, &config.output.run_tag)?;
    for (query, mut ranking) in test_queries.iter().zip(rankings) {
        ranking.sort();
        writer.write_ranking(&query.qid, &ranking, config.output.length, index)?;
        tracing::info!(qid = %query.qid, results = ranking.len(), "Query re-ranked");
    }
    writer.finish()?;
    Ok(test_queries.len())
}
