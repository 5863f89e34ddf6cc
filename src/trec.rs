/// TREC-style text formats
///
/// - Run files: `qid Q0 externalId rank score tag`, one row per ranked document.
///   A query with no results is written as a single `dummy` row so every query
///   appears in the run.
/// - Query files: `qid:query text`
/// - Intent files: `qid.intent: query text`
/// - Relevance judgments: `qid 0 externalId relevance`
///
/// Run rows whose query id reads `qid.intent` carry an intent ranking; readers split
/// them from the base ranking.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::errors::RankError;
use crate::index::IndexStore;
use crate::ranking::ScoreList;

pub const DUMMY_DOC: &str = "dummy";

#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub query_id: String,
    pub external_id: String,
    pub rank: usize,
    pub score: f64,
    pub tag: String,
}

pub struct RunWriter<W: Write> {
    out: W,
    name: String,
    tag: String,
}

impl RunWriter<BufWriter<File>> {
    /// Create (or truncate) the run file at `path`.
    pub fn create(path: &Path, tag: &str) -> Result<Self, RankError> {
        let file = File::create(path).map_err(|e| RankError::io(path, e))?;
        Ok(RunWriter {
            out: BufWriter::new(file),
            name: path.display().to_string(),
            tag: tag.to_string(),
        })
    }
}

impl<W: Write> RunWriter<W> {
    pub fn new(out: W, tag: &str) -> Self {
        RunWriter {
            out,
            name: "<run>".to_string(),
            tag: tag.to_string(),
        }
    }

    /// Write the first `limit` entries of an already sorted ranking.
    pub fn write_ranking(
        &mut self,
        query_id: &str,
        ranking: &ScoreList,
        limit: usize,
        index: &dyn IndexStore,
    ) -> Result<(), RankError> {
        if ranking.is_empty() {
            return self.write_row(query_id, DUMMY_DOC, 1, 0.0);
        }
        for (i, entry) in ranking.iter().take(limit).enumerate() {
            let external_id = index.external_docid(entry.docid)?;
            self.write_row(query_id, &external_id, i + 1, entry.score)?;
        }
        Ok(())
    }

    fn write_row(&mut self, qid: &str, doc: &str, rank: usize, score: f64) -> Result<(), RankError> {
        writeln!(self.out, "{} Q0 {} {} {} {}", qid, doc, rank, score, self.tag)
            .map_err(|e| RankError::io(&self.name, e))
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, RankError> {
        self.out.flush().map_err(|e| RankError::io(&self.name, e))?;
        Ok(self.out)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, RankError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| RankError::io(path, e))
}

/// Numbered, trimmed, non-empty lines.
fn content_lines<R: BufRead>(
    reader: R,
    source_name: &str,
) -> impl Iterator<Item = Result<(usize, String), RankError>> {
    let name = source_name.to_string();
    reader
        .lines()
        .enumerate()
        .filter_map(move |(i, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Ok((i + 1, line.trim().to_string()))),
            Err(e) => Some(Err(RankError::io(&name, e))),
        })
}

pub fn parse_run<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<RunRow>, RankError> {
    let mut rows = Vec::new();
    for item in content_lines(reader, source_name) {
        let (n, line) = item?;
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 5 {
            return Err(RankError::format(
                source_name,
                n,
                &format!("Expected at least 5 columns, found {}", cols.len()),
            ));
        }
        let rank = cols[3]
            .parse()
            .map_err(|_| RankError::format(source_name, n, &format!("Invalid rank {}", cols[3])))?;
        let score = cols[4]
            .parse()
            .map_err(|_| RankError::format(source_name, n, &format!("Invalid score {}", cols[4])))?;
        rows.push(RunRow {
            query_id: cols[0].to_string(),
            external_id: cols[2].to_string(),
            rank,
            score,
            tag: cols.get(5).copied().unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

pub fn read_run_file(path: &Path) -> Result<Vec<RunRow>, RankError> {
    parse_run(open(path)?, &path.display().to_string())
}

/// Split `157.2` into ("157", Some(2)); plain ids have no intent.
pub fn split_query_id(id: &str) -> Result<(&str, Option<u32>), String> {
    match id.split_once('.') {
        None => Ok((id, None)),
        Some((qid, intent)) => intent
            .parse::<u32>()
            .map(|i| (qid, Some(i)))
            .map_err(|_| format!("Invalid intent id in {}", id)),
    }
}

/// Base and per-intent rankings read back from a run file, in file order.
#[derive(Debug, Default)]
pub struct InitialRankings {
    pub base: BTreeMap<String, ScoreList>,
    pub intents: BTreeMap<String, BTreeMap<u32, ScoreList>>,
}

impl InitialRankings {
    /// Every query id in the file gets a base ranking, empty when the query only has
    /// a `dummy` row or only intent rows.
    pub fn from_rows(rows: &[RunRow], index: &dyn IndexStore) -> Result<Self, RankError> {
        let mut out = InitialRankings::default();
        for row in rows {
            let (qid, intent) = split_query_id(&row.query_id).map_err(RankError::Index)?;
            let base = out.base.entry(qid.to_string()).or_default();
            let list = match intent {
                None => base,
                Some(i) => out
                    .intents
                    .entry(qid.to_string())
                    .or_default()
                    .entry(i)
                    .or_default(),
            };
            if row.external_id == DUMMY_DOC {
                continue;
            }
            let docid = index.internal_docid(&row.external_id)?;
            list.push(docid, row.score);
        }
        Ok(out)
    }

    pub fn load(path: &Path, index: &dyn IndexStore) -> Result<Self, RankError> {
        let rows = read_run_file(path)?;
        let rankings = Self::from_rows(&rows, index)?;
        tracing::info!(
            path = %path.display(),
            queries = rankings.base.len(),
            rows = rows.len(),
            "Initial rankings loaded"
        );
        Ok(rankings)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLine {
    pub qid: String,
    pub text: String,
}

pub fn parse_queries<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<QueryLine>, RankError> {
    Ok(numbered_queries(reader, source_name)?
        .into_iter()
        .map(|(_, q)| q)
        .collect())
}

fn numbered_queries<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<Vec<(usize, QueryLine)>, RankError> {
    let mut out = Vec::new();
    for item in content_lines(reader, source_name) {
        let (n, line) = item?;
        let (qid, text) = line
            .split_once(':')
            .ok_or_else(|| RankError::format(source_name, n, "Missing ':' in query line"))?;
        let qid = qid.trim();
        if qid.is_empty() {
            return Err(RankError::format(source_name, n, "Empty query id"));
        }
        out.push((
            n,
            QueryLine {
                qid: qid.to_string(),
                text: text.trim().to_string(),
            },
        ));
    }
    Ok(out)
}

pub fn read_query_file(path: &Path) -> Result<Vec<QueryLine>, RankError> {
    parse_queries(open(path)?, &path.display().to_string())
}

/// Intent queries grouped by query id, each list in file order.
pub fn parse_intents<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<BTreeMap<String, Vec<(u32, String)>>, RankError> {
    let mut out: BTreeMap<String, Vec<(u32, String)>> = BTreeMap::new();
    for (n, line) in numbered_queries(reader, source_name)? {
        let (qid, intent) =
            split_query_id(&line.qid).map_err(|m| RankError::format(source_name, n, &m))?;
        let intent = intent.ok_or_else(|| {
            RankError::format(source_name, n, &format!("Intent id missing in {}", line.qid))
        })?;
        out.entry(qid.to_string()).or_default().push((intent, line.text));
    }
    Ok(out)
}

pub fn read_intents_file(path: &Path) -> Result<BTreeMap<String, Vec<(u32, String)>>, RankError> {
    parse_intents(open(path)?, &path.display().to_string())
}

/// Judged documents per query: (external id, relevance), in file order.
pub fn parse_qrels<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<BTreeMap<String, Vec<(String, i32)>>, RankError> {
    let mut out: BTreeMap<String, Vec<(String, i32)>> = BTreeMap::new();
    for item in content_lines(reader, source_name) {
        let (n, line) = item?;
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 4 {
            return Err(RankError::format(
                source_name,
                n,
                &format!("Expected 4 columns, found {}", cols.len()),
            ));
        }
        let rel = cols[3].parse().map_err(|_| {
            RankError::format(source_name, n, &format!("Invalid relevance {}", cols[3]))
        })?;
        out.entry(cols[0].to_string())
            .or_default()
            .push((cols[2].to_string(), rel));
    }
    Ok(out)
}

pub fn read_qrels_file(path: &Path) -> Result<BTreeMap<String, Vec<(String, i32)>>, RankError> {
    parse_qrels(open(path)?, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentRecord, InMemoryIndex};

    fn index() -> InMemoryIndex {
        InMemoryIndex::from_documents(vec![
            DocumentRecord::new("clueweb-1"),
            DocumentRecord::new("clueweb-2"),
            DocumentRecord::new("clueweb-3"),
        ])
        .unwrap()
    }

    #[test]
    fn test_run_rows_and_dummy() {
        let ix = index();
        let ranking: ScoreList = vec![(2, 1.5), (0, 0.25)].into_iter().collect();
        let mut w = RunWriter::new(Vec::new(), "tag7");
        w.write_ranking("10", &ranking, 100, &ix).unwrap();
        w.write_ranking("11", &ScoreList::new(), 100, &ix).unwrap();
        let text = String::from_utf8(w.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "10 Q0 clueweb-3 1 1.5 tag7\n10 Q0 clueweb-1 2 0.25 tag7\n11 Q0 dummy 1 0 tag7\n"
        );
    }

    #[test]
    fn test_write_respects_limit() {
        let ix = index();
        let ranking: ScoreList = vec![(0, 3.0), (1, 2.0), (2, 1.0)].into_iter().collect();
        let mut w = RunWriter::new(Vec::new(), "t");
        w.write_ranking("1", &ranking, 2, &ix).unwrap();
        let text = String::from_utf8(w.finish().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_written_scores_read_back_exactly() {
        let ix = index();
        let ranking: ScoreList = vec![(1, 0.1 + 0.2), (2, 1.0 / 3.0), (0, -7.25e-5)]
            .into_iter()
            .collect();
        let mut w = RunWriter::new(Vec::new(), "t");
        w.write_ranking("5", &ranking, 10, &ix).unwrap();
        let bytes = w.finish().unwrap();
        let rows = parse_run(bytes.as_slice(), "mem").unwrap();
        let back = InitialRankings::from_rows(&rows, &ix).unwrap();
        assert_eq!(back.base["5"], ranking);
    }

    #[test]
    fn test_initial_rankings_split_intents() {
        let ix = index();
        let text = "7 Q0 clueweb-1 1 0.9 r\n7.1 Q0 clueweb-2 1 0.8 r\n7.2 Q0 clueweb-3 1 0.7 r\n7.1 Q0 clueweb-1 2 0.1 r\n8 Q0 dummy 1 0 r\n9.1 Q0 clueweb-2 1 0.4 r\n";
        let rows = parse_run(text.as_bytes(), "mem").unwrap();
        let r = InitialRankings::from_rows(&rows, &ix).unwrap();
        assert_eq!(r.base["7"].len(), 1);
        assert_eq!(r.intents["7"][&1].len(), 2);
        assert_eq!(r.intents["7"][&2].entries()[0].docid, 2);
        // dummy-only and intent-only queries are kept with an empty base ranking
        assert!(r.base["8"].is_empty());
        assert!(r.base["9"].is_empty());
        assert_eq!(r.intents["9"][&1].len(), 1);
    }

    #[test]
    fn test_run_format_errors_carry_line() {
        let err = parse_run("1 Q0 a 1 0.5 t\n\n1 Q0 b 2\n".as_bytes(), "run.txt").unwrap_err();
        match err {
            RankError::Format { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
        assert!(parse_run("1 Q0 a one 0.5 t\n".as_bytes(), "run.txt").is_err());
    }

    #[test]
    fn test_unknown_document_in_run_is_an_error() {
        let rows = parse_run("1 Q0 nowhere 1 0.5 t\n".as_bytes(), "mem").unwrap();
        assert!(matches!(InitialRankings::from_rows(&rows, &index()), Err(RankError::Index(_))));
    }

    #[test]
    fn test_query_lines() {
        let q = parse_queries("69:sewing instructions\n\n70: #and(a b)\n".as_bytes(), "q").unwrap();
        assert_eq!(q[0], QueryLine { qid: "69".into(), text: "sewing instructions".into() });
        assert_eq!(q[1].text, "#and(a b)");
        assert!(matches!(
            parse_queries("69 sewing\n".as_bytes(), "q"),
            Err(RankError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_intent_lines() {
        let i = parse_intents("5.1: apple pie\n5.2: apple computer\n6.1: x\n".as_bytes(), "i").unwrap();
        assert_eq!(i["5"], vec![(1, "apple pie".to_string()), (2, "apple computer".to_string())]);
        assert_eq!(i["6"].len(), 1);
        assert!(parse_intents("5: apple\n".as_bytes(), "i").is_err());
    }

    #[test]
    fn test_qrels() {
        let q = parse_qrels("1 0 d1 2\n1 0 d2 0\n2 0 d3 -1\n".as_bytes(), "qrels").unwrap();
        assert_eq!(q["1"], vec![("d1".to_string(), 2), ("d2".to_string(), 0)]);
        assert_eq!(q["2"][0].1, -1);
        assert!(parse_qrels("1 0 d1\n".as_bytes(), "qrels").is_err());
    }
}
