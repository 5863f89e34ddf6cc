/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: ranklab.toml in the working directory, or the path given by --config
/// 3. Environment variables: prefixed RANKLAB_, `__` separates nested keys
///    (e.g., RANKLAB_MODEL__INDRI__MU=1500)

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::RankError;

pub const DEFAULT_CONFIG_FILE: &str = "ranklab.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: auto, pretty, json
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// JSON corpus file the in-memory index is built from
    #[serde(default)]
    pub index_path: Option<PathBuf>,

    /// Query file with one `qid:query` per line
    #[serde(default)]
    pub query_file: Option<PathBuf>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub diversity: DiversityConfig,

    #[serde(default)]
    pub letor: LetorConfig,
}

/// Where and how much of each ranking is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// Maximum rows written per query
    #[serde(default = "default_output_length")]
    pub length: usize,
    /// Constant last column of every run row
    #[serde(default = "default_run_tag")]
    pub run_tag: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: default_output_path(),
            length: default_output_length(),
            run_tag: default_run_tag(),
        }
    }
}

/// Retrieval model selection plus every model's constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// unrankedboolean, rankedboolean, bm25, indri, or letor
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub bm25: Bm25Config,
    #[serde(default)]
    pub indri: IndriConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            algorithm: default_algorithm(),
            bm25: Bm25Config::default(),
            indri: IndriConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
    pub k3: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config { k1: 1.2, b: 0.75, k3: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndriConfig {
    pub mu: f64,
    pub lambda: f64,
}

impl Default for IndriConfig {
    fn default() -> Self {
        IndriConfig { mu: 2500.0, lambda: 0.4 }
    }
}

/// Pseudo-relevance feedback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Number of top documents mined for expansion terms
    #[serde(default = "default_fb_docs")]
    pub docs: usize,
    /// Number of expansion terms kept
    #[serde(default = "default_fb_terms")]
    pub terms: usize,
    /// Dirichlet prior used when weighting candidate terms
    #[serde(default)]
    pub mu: f64,
    /// Weight of the original query in the combined query
    #[serde(default = "default_fb_orig_weight")]
    pub orig_weight: f64,
    /// Optional run file supplying the initial ranking instead of evaluating the query
    #[serde(default)]
    pub initial_ranking_file: Option<PathBuf>,
    /// File the learned expansion clauses are appended to
    #[serde(default)]
    pub expansion_query_file: Option<PathBuf>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig {
            enabled: false,
            docs: default_fb_docs(),
            terms: default_fb_terms(),
            mu: 0.0,
            orig_weight: default_fb_orig_weight(),
            initial_ranking_file: None,
            expansion_query_file: None,
        }
    }
}

/// Intent-aware diversification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityConfig {
    #[serde(default)]
    pub enabled: bool,
    /// pm2 or xquad
    #[serde(default = "default_diversity_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_diversity_lambda")]
    pub lambda: f64,
    #[serde(default = "default_max_input_rankings_length")]
    pub max_input_rankings_length: usize,
    #[serde(default = "default_max_result_ranking_length")]
    pub max_result_ranking_length: usize,
    /// Run file with `qid` and `qid.intent` rows; when set no query is evaluated
    #[serde(default)]
    pub initial_ranking_file: Option<PathBuf>,
    /// Lines of `qid.intent: query text`
    #[serde(default)]
    pub intents_file: Option<PathBuf>,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        DiversityConfig {
            enabled: false,
            algorithm: default_diversity_algorithm(),
            lambda: default_diversity_lambda(),
            max_input_rankings_length: default_max_input_rankings_length(),
            max_result_ranking_length: default_max_result_ranking_length(),
            initial_ranking_file: None,
            intents_file: None,
        }
    }
}

/// Learning-to-rank pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LetorConfig {
    #[serde(default)]
    pub training_query_file: Option<PathBuf>,
    /// Relevance judgments: `qid 0 externalId relevance`
    #[serde(default)]
    pub training_qrels_file: Option<PathBuf>,
    #[serde(default)]
    pub training_feature_vectors_file: Option<PathBuf>,
    #[serde(default)]
    pub testing_feature_vectors_file: Option<PathBuf>,
    #[serde(default)]
    pub testing_document_scores: Option<PathBuf>,
    #[serde(default)]
    pub svm_rank_learn_path: Option<PathBuf>,
    #[serde(default)]
    pub svm_rank_classify_path: Option<PathBuf>,
    #[serde(default)]
    pub svm_rank_param_c: Option<f64>,
    #[serde(default)]
    pub model_file: Option<PathBuf>,
    /// 1-based feature numbers left out of the vectors
    #[serde(default)]
    pub feature_disable: Vec<usize>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "auto".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("run.teIn")
}

fn default_output_length() -> usize {
    100
}

fn default_run_tag() -> String {
    "ranklab".to_string()
}

fn default_algorithm() -> String {
    "bm25".to_string()
}

fn default_fb_docs() -> usize {
    10
}

fn default_fb_terms() -> usize {
    10
}

fn default_fb_orig_weight() -> f64 {
    0.5
}

fn default_diversity_algorithm() -> String {
    "xquad".to_string()
}

fn default_diversity_lambda() -> f64 {
    0.5
}

fn default_max_input_rankings_length() -> usize {
    100
}

fn default_max_result_ranking_length() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_format: default_log_format(),
            index_path: None,
            query_file: None,
            output: OutputConfig::default(),
            model: ModelConfig::default(),
            feedback: FeedbackConfig::default(),
            diversity: DiversityConfig::default(),
            letor: LetorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: RANKLAB_OUTPUT__LENGTH=1000 overrides output.length in ranklab.toml
    pub fn load(path: Option<&Path>) -> Result<Config, RankError> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        if path.is_some() && !file.exists() {
            return Err(RankError::Config(format!(
                "Config file {} does not exist",
                file.display()
            )));
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("RANKLAB_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Resolve a setting that a command cannot run without.
    pub fn require<'a, T>(value: &'a Option<T>, key: &str) -> Result<&'a T, RankError> {
        value
            .as_ref()
            .ok_or_else(|| RankError::Config(format!("Missing required setting: {}", key)))
    }
}
