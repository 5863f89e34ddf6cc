/// Query batch runners
///
/// Each runner reads its inputs from the paths in `Config`, processes every query and
/// writes one run file. Runs are truncated at start; nothing is appended across runs.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::diversify::{self, DiversityInput, DiversityParams};
use crate::errors::RankError;
use crate::feedback::{self, Expansion, FeedbackParams};
use crate::index::IndexStore;
use crate::model::RetrievalModel;
use crate::query;
use crate::ranking::ScoreList;
use crate::trec::{self, InitialRankings, QueryLine, RunWriter};

fn progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Numeric query ids in numeric order, anything else after them by string order.
fn qid_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// Search with optional pseudo-relevance feedback
// ---------------------------------------------------------------------------

/// Feedback state for one run.
struct FeedbackRun {
    params: FeedbackParams,
    initial: Option<InitialRankings>,
    clauses: Option<(BufWriter<File>, String)>,
}

impl FeedbackRun {
    /// Parameters and initial rankings; no clause file.
    fn new(config: &Config, index: &dyn IndexStore) -> Result<Self, RankError> {
        let fb = &config.feedback;
        let initial = fb
            .initial_ranking_file
            .as_deref()
            .map(|path| InitialRankings::load(path, index))
            .transpose()?;
        Ok(FeedbackRun {
            params: FeedbackParams::from_config(fb)?,
            initial,
            clauses: None,
        })
    }

    fn from_config(config: &Config, index: &dyn IndexStore) -> Result<Self, RankError> {
        let mut run = FeedbackRun::new(config, index)?;
        if let Some(path) = config.feedback.expansion_query_file.as_deref() {
            let file = File::create(path).map_err(|e| RankError::io(path, e))?;
            run.clauses = Some((BufWriter::new(file), path.display().to_string()));
        }
        Ok(run)
    }

    /// Initial ranking of `query`: from the ranking file when it has the query,
    /// else from evaluating the query.
    fn initial_ranking(
        &self,
        query: &QueryLine,
        model: &RetrievalModel,
        index: &dyn IndexStore,
    ) -> Result<ScoreList, RankError> {
        if let Some(rankings) = &self.initial {
            if let Some(list) = rankings.base.get(&query.qid) {
                let mut list = list.clone();
                list.sort();
                return Ok(list);
            }
            tracing::warn!(qid = %query.qid, "Query missing from initial ranking file, evaluating it");
        }
        query::search(&query.text, model, index)
    }

    fn record(&mut self, qid: &str, expansion: &Expansion) -> Result<(), RankError> {
        if let Some((out, name)) = &mut self.clauses {
            writeln!(out, "{}: {}", qid, expansion).map_err(|e| RankError::io(name.as_str(), e))?;
        }
        Ok(())
    }

    fn finish(self) -> Result<(), RankError> {
        if let Some((mut out, name)) = self.clauses {
            out.flush().map_err(|e| RankError::io(name, e))?;
        }
        Ok(())
    }
}

fn rank_query(
    query: &QueryLine,
    model: &RetrievalModel,
    index: &dyn IndexStore,
    feedback: Option<&mut FeedbackRun>,
) -> Result<ScoreList, RankError> {
    let Some(fb) = feedback else {
        return query::search(&query.text, model, index);
    };

    let initial = fb.initial_ranking(query, model, index)?;
    let expansion = feedback::expand(&initial, index, &fb.params)?;
    tracing::debug!(qid = %query.qid, expansion = %expansion, "Expansion learned");
    fb.record(&query.qid, &expansion)?;

    let combined = feedback::expanded_query(
        &query.text,
        model.default_operator(),
        &expansion,
        fb.params.orig_weight,
    )?;
    tracing::debug!(qid = %query.qid, query = %combined, "Evaluating expanded query");
    let mut results = query::evaluate(&combined, model, index)?;
    results.sort();
    Ok(results)
}

/// Evaluate every query of `query_file` and write the run. Returns the number of
/// queries processed.
pub fn run_search(config: &Config, index: &dyn IndexStore) -> Result<usize, RankError> {
    let model = RetrievalModel::from_config(&config.model)?;
    let queries = trec::read_query_file(Config::require(&config.query_file, "query_file")?)?;
    let mut fb = if config.feedback.enabled {
        Some(FeedbackRun::from_config(config, index)?)
    } else {
        None
    };
    let mut writer = RunWriter::create(&config.output.path, &config.output.run_tag)?;

    tracing::info!(
        model = %model,
        queries = queries.len(),
        feedback = config.feedback.enabled,
        "Starting query batch"
    );
    let pb = progress(queries.len());
    for query in &queries {
        pb.set_message(query.qid.clone());
        let results = rank_query(query, &model, index, fb.as_mut())?;
        writer.write_ranking(&query.qid, &results, config.output.length, index)?;
        tracing::info!(qid = %query.qid, results = results.len(), "Query evaluated");
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if let Some(fb) = fb {
        fb.finish()?;
    }
    writer.finish()?;
    Ok(queries.len())
}

/// Write each query's expansion clause to `out` as `qid: #wand ( ... )` without
/// evaluating the expanded query.
pub fn run_expand<W: Write>(
    config: &Config,
    index: &dyn IndexStore,
    out: &mut W,
) -> Result<usize, RankError> {
    let model = RetrievalModel::from_config(&config.model)?;
    let queries = trec::read_query_file(Config::require(&config.query_file, "query_file")?)?;
    let fb = FeedbackRun::new(config, index)?;

    for query in &queries {
        let initial = fb.initial_ranking(query, &model, index)?;
        let expansion = feedback::expand(&initial, index, &fb.params)?;
        writeln!(out, "{}: {}", query.qid, expansion).map_err(|e| RankError::io("<stdout>", e))?;
    }
    Ok(queries.len())
}

// ---------------------------------------------------------------------------
// Diversification
// ---------------------------------------------------------------------------

fn diversity_inputs(
    config: &Config,
    index: &dyn IndexStore,
) -> Result<BTreeMap<String, DiversityInput>, RankError> {
    if let Some(path) = &config.diversity.initial_ranking_file {
        return Ok(diversify::inputs_from_rankings(InitialRankings::load(path, index)?));
    }

    let model = RetrievalModel::from_config(&config.model)?;
    let queries = trec::read_query_file(Config::require(&config.query_file, "query_file")?)?;
    let intents = trec::read_intents_file(Config::require(
        &config.diversity.intents_file,
        "diversity.intents_file",
    )?)?;

    let pb = progress(queries.len());
    let mut inputs = BTreeMap::new();
    for query in &queries {
        pb.set_message(query.qid.clone());
        let intent_queries = intents.get(&query.qid).map(Vec::as_slice).unwrap_or_default();
        let input = diversify::input_from_queries(query, intent_queries, &model, index)?;
        inputs.insert(query.qid.clone(), input);
        pb.inc(1);
    }
    pb.finish_with_message("evaluated");
    Ok(inputs)
}

/// Diversify every query and write the run in ascending query id order.
pub fn run_diversify(config: &Config, index: &dyn IndexStore) -> Result<usize, RankError> {
    let params = DiversityParams::from_config(&config.diversity)?;
    let inputs = diversity_inputs(config, index)?;
    let mut writer = RunWriter::create(&config.output.path, &config.output.run_tag)?;

    tracing::info!(
        algorithm = params.algorithm.name(),
        lambda = params.lambda,
        queries = inputs.len(),
        "Starting diversification"
    );
    let mut qids: Vec<&String> = inputs.keys().collect();
    qids.sort_by(|a, b| qid_order(a, b));
    for qid in qids {
        let input = inputs[qid].clone().truncated(params.max_input_rankings_length);
        let results = diversify::diversify(qid, &input, &params);
        writer.write_ranking(qid, &results, params.max_result_ranking_length, index)?;
        tracing::info!(qid = %qid, results = results.len(), "Query diversified");
    }
    writer.finish()?;
    Ok(inputs.len())
}

/// Resolve the index corpus path and load it.
pub fn load_index(config: &Config) -> Result<crate::index::InMemoryIndex, RankError> {
    let path: &Path = Config::require(&config.index_path, "index_path")?;
    crate::index::InMemoryIndex::load(path)
}
