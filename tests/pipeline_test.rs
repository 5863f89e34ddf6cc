use std::path::Path;

use ranklab::config::Config;
use ranklab::errors::RankError;
use ranklab::index::{DocumentRecord, IndexStore, InMemoryIndex};
use ranklab::letor::{self, Ranker};
use ranklab::pipeline;
use ranklab::trec;

fn corpus() -> InMemoryIndex {
    InMemoryIndex::from_documents(vec![
        DocumentRecord::new("apple-1")
            .with_field("body", "apple orchard harvest apple")
            .with_field("title", "apple harvest")
            .with_attribute("rawUrl", "http://en.wikipedia.org/wiki/Apple"),
        DocumentRecord::new("apple-2")
            .with_field("body", "apple computer laptop")
            .with_field("title", "laptop")
            .with_attribute("rawUrl", "http://shop.example.com/laptops/apple"),
        DocumentRecord::new("apple-3")
            .with_field("body", "apple pie recipe with apple")
            .with_attribute("PageRank", "2.5"),
        DocumentRecord::new("laptop-1").with_field("body", "laptop battery computer"),
        DocumentRecord::new("garden-1").with_field("body", "orchard garden harvest"),
        DocumentRecord::new("misc-1").with_field("body", "river boat"),
        DocumentRecord::new("misc-2").with_field("body", "mountain trail"),
    ])
    .unwrap()
}

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_config_file_drives_search() {
    let dir = tempfile::tempdir().unwrap();
    let queries = write(dir.path(), "q.txt", "5:apple\n6:#near/1(apple pie)\n");
    let run = dir.path().join("run.txt");
    let toml = format!(
        "query_file = {:?}\n[output]\npath = {:?}\nlength = 2\n[model]\nalgorithm = \"RankedBoolean\"\n",
        queries, run
    );
    let config_path = write(dir.path(), "ranklab.toml", &toml);
    let config = Config::load(Some(config_path.as_path())).unwrap();
    assert_eq!(config.output.length, 2);

    pipeline::run_search(&config, &corpus()).unwrap();
    let rows = trec::read_run_file(&run).unwrap();
    let q5: Vec<_> = rows.iter().filter(|r| r.query_id == "5").collect();
    assert_eq!(q5.len(), 2);
    // RankedBoolean scores by tf: apple-1 and apple-3 have two occurrences
    assert_eq!(q5[0].score, 2.0);
    assert_eq!(q5[0].external_id, "apple-1");
    assert_eq!(q5[1].external_id, "apple-3");

    let q6: Vec<_> = rows.iter().filter(|r| r.query_id == "6").collect();
    assert_eq!(q6.len(), 1);
    assert_eq!(q6[0].external_id, "apple-3");
}

#[test]
fn test_search_run_feeds_diversification() {
    let dir = tempfile::tempdir().unwrap();
    // Intent rankings are produced as ordinary queries with `qid.intent` ids
    let queries = write(
        dir.path(),
        "q.txt",
        "1:apple\n1.1:apple harvest orchard\n1.2:apple computer laptop\n",
    );
    let index = corpus();

    let mut config = Config::default();
    config.model.algorithm = "indri".to_string();
    config.model.indri.mu = 0.0;
    config.query_file = Some(queries);
    config.output.path = dir.path().join("initial.run");
    pipeline::run_search(&config, &index).unwrap();

    config.diversity.enabled = true;
    config.diversity.algorithm = "xquad".to_string();
    config.diversity.lambda = 0.9;
    config.diversity.initial_ranking_file = Some(dir.path().join("initial.run"));
    config.diversity.max_result_ranking_length = 2;
    config.output.path = dir.path().join("diverse.run");
    assert_eq!(pipeline::run_diversify(&config, &index).unwrap(), 1);

    let rows = trec::read_run_file(&config.output.path).unwrap();
    assert_eq!(rows.len(), 2);
    let ids: Vec<_> = rows.iter().map(|r| r.external_id.as_str()).collect();
    // one document per sense of the query
    assert!(ids.contains(&"apple-1"), "{:?}", ids);
    assert!(ids.contains(&"apple-2"), "{:?}", ids);
    assert!(rows[0].score >= rows[1].score);
}

/// Ranks test vectors by their body BM25 feature.
struct Bm25FeatureRanker;

impl Ranker for Bm25FeatureRanker {
    fn train(&self, training_vectors: &Path, model: &Path) -> Result<(), RankError> {
        let lines = std::fs::read_to_string(training_vectors).unwrap();
        std::fs::write(model, format!("{}\n", lines.lines().count())).unwrap();
        Ok(())
    }

    fn classify(&self, testing_vectors: &Path, _model: &Path, scores: &Path) -> Result<Vec<f64>, RankError> {
        let text = std::fs::read_to_string(testing_vectors).unwrap();
        let values: Vec<String> = text
            .lines()
            .map(|l| {
                l.split_whitespace()
                    .find_map(|c| c.strip_prefix("5:"))
                    .unwrap_or("nan")
                    .to_string()
            })
            .collect();
        std::fs::write(scores, values.join("\n")).unwrap();
        letor::ranker::read_scores(scores)
    }
}

#[test]
fn test_letor_with_substitute_ranker() {
    let dir = tempfile::tempdir().unwrap();
    let index = corpus();
    let mut config = Config::default();
    config.query_file = Some(write(dir.path(), "test.txt", "20:apple laptop\n21:zebra\n"));
    config.output.path = dir.path().join("letor.run");
    config.letor.training_query_file = Some(write(dir.path(), "train.txt", "10:apple harvest\n"));
    config.letor.training_qrels_file = Some(write(
        dir.path(),
        "qrels.txt",
        "10 0 apple-1 2\n10 0 garden-1 1\n10 0 misc-1 0\n",
    ));
    config.letor.training_feature_vectors_file = Some(dir.path().join("train.vec"));
    config.letor.testing_feature_vectors_file = Some(dir.path().join("test.vec"));
    config.letor.testing_document_scores = Some(dir.path().join("scores.txt"));
    config.letor.model_file = Some(dir.path().join("model"));

    assert_eq!(letor::run_letor(&config, &index, &Bm25FeatureRanker).unwrap(), 2);
    assert_eq!(std::fs::read_to_string(dir.path().join("model")).unwrap(), "3\n");

    let training = std::fs::read_to_string(dir.path().join("train.vec")).unwrap();
    for line in training.lines() {
        assert!(line.contains(" qid:10 "));
        assert_eq!(line.split_whitespace().filter(|c| c.contains(':')).count(), 19);
    }

    let rows = trec::read_run_file(&config.output.path).unwrap();
    let q20: Vec<_> = rows.iter().filter(|r| r.query_id == "20").collect();
    assert!(!q20.is_empty());
    for pair in q20.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    let q21: Vec<_> = rows.iter().filter(|r| r.query_id == "21").collect();
    assert_eq!(q21.len(), 1);
    assert_eq!(q21[0].external_id, trec::DUMMY_DOC);
    assert!(index.internal_docid(&q20[0].external_id).is_ok());
}
