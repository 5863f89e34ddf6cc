/// PM2: proportional seat allocation over intents
///
/// Each intent is owed `votes` seats. Every round the intent with the largest
/// quotient `votes / (2 * slots + 1)` is served first, and the picked document's
/// scores are charged back to every intent's slot count.

use std::collections::BTreeSet;

use crate::posting::DocId;
use crate::ranking::ScoreList;

use super::intents::IntentScoreMap;

pub fn pm2(map: &IntentScoreMap, output_length: usize, lambda: f64) -> ScoreList {
    let m = map.intent_count();
    let mut out = ScoreList::new();
    if m == 0 {
        return out;
    }

    let votes = output_length.min(map.len()) as f64 / m as f64;
    let mut slots = vec![0.0; m];
    let mut placed: BTreeSet<DocId> = BTreeSet::new();

    while out.len() < output_length {
        let quotients: Vec<f64> = slots.iter().map(|s| votes / (2.0 * s + 1.0)).collect();
        let mut target = 0;
        for (i, q) in quotients.iter().enumerate() {
            if *q > quotients[target] {
                target = i;
            }
        }

        let mut best: Option<(DocId, f64)> = None;
        for (docid, row) in map.candidates() {
            if placed.contains(&docid) {
                continue;
            }
            let score: f64 = quotients
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let share = if i == target { lambda } else { 1.0 - lambda };
                    share * q * row[i + 1]
                })
                .sum();
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((docid, score));
            }
        }

        let Some((docid, score)) = best else {
            break;
        };
        placed.insert(docid);
        out.push(docid, score);

        if score > 0.0 {
            if let Some(row) = map.row(docid) {
                for (slot, s) in slots.iter_mut().zip(&row[1..]) {
                    *slot += s / score;
                }
            }
        }
    }

    out.sort();
    out
}
