/// Out-of-process rank learners
///
/// The `Ranker` trait is the seam between the feature pipeline and whatever learns
/// from the vectors. `SvmRankProcess` runs the SVM-rank `learn` and `classify`
/// executables; both output streams are read to completion before the exit status is
/// checked, so a chatty learner can never block on a full pipe.

use std::ffi::OsStr;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, LetorConfig};
use crate::errors::RankError;

/// Regularization constant passed to the learner when none is configured.
pub const DEFAULT_SVM_C: f64 = 0.001;

pub trait Ranker {
    /// Learn a model from `training_vectors` and store it at `model`.
    fn train(&self, training_vectors: &Path, model: &Path) -> Result<(), RankError>;

    /// Score every line of `testing_vectors`, in file order.
    fn classify(
        &self,
        testing_vectors: &Path,
        model: &Path,
        scores: &Path,
    ) -> Result<Vec<f64>, RankError>;
}

#[derive(Debug, Clone)]
pub struct SvmRankProcess {
    learn: PathBuf,
    classify: PathBuf,
    c: f64,
}

impl SvmRankProcess {
    pub fn new(learn: PathBuf, classify: PathBuf, c: f64) -> Self {
        SvmRankProcess { learn, classify, c }
    }

    pub fn from_config(config: &LetorConfig) -> Result<Self, RankError> {
        Ok(SvmRankProcess::new(
            Config::require(&config.svm_rank_learn_path, "letor.svm_rank_learn_path")?.clone(),
            Config::require(&config.svm_rank_classify_path, "letor.svm_rank_classify_path")?
                .clone(),
            config.svm_rank_param_c.unwrap_or(DEFAULT_SVM_C),
        ))
    }
}

fn run(program: &Path, args: &[&OsStr]) -> Result<(), RankError> {
    tracing::info!(program = %program.display(), ?args, "Running rank learner");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| RankError::io(program, e))?;

    for line in output
        .stdout
        .as_slice()
        .lines()
        .chain(output.stderr.as_slice().lines())
        .map_while(Result::ok)
    {
        tracing::info!(program = %program.display(), "{}", line);
    }

    if !output.status.success() {
        return Err(RankError::Ranker(format!(
            "{} exited with {}",
            program.display(),
            output.status
        )));
    }
    Ok(())
}

impl Ranker for SvmRankProcess {
    fn train(&self, training_vectors: &Path, model: &Path) -> Result<(), RankError> {
        let c = self.c.to_string();
        run(
            &self.learn,
            &[
                OsStr::new("-c"),
                OsStr::new(&c),
                training_vectors.as_os_str(),
                model.as_os_str(),
            ],
        )
    }

    fn classify(
        &self,
        testing_vectors: &Path,
        model: &Path,
        scores: &Path,
    ) -> Result<Vec<f64>, RankError> {
        run(
            &self.classify,
            &[testing_vectors.as_os_str(), model.as_os_str(), scores.as_os_str()],
        )?;
        read_scores(scores)
    }
}

/// One score per line; `nan` reads as 0.
pub fn parse_scores<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<f64>, RankError> {
    let mut scores = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| RankError::io(source_name, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("nan") {
            scores.push(0.0);
            continue;
        }
        let score = line
            .parse::<f64>()
            .map_err(|_| RankError::format(source_name, i + 1, &format!("Invalid score {}", line)))?;
        scores.push(score);
    }
    Ok(scores)
}

pub fn read_scores(path: &Path) -> Result<Vec<f64>, RankError> {
    let file = std::fs::File::open(path).map_err(|e| RankError::io(path, e))?;
    parse_scores(std::io::BufReader::new(file), &path.display().to_string())
}
