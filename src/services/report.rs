//! Accuracy summaries and the `results.json` export.

use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::forecast::ScoreRecord;
use crate::utils::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeSummary {
    pub lead_days: u32,
    pub count: usize,
    pub mean_overall_percent: f64,
    pub temp_high_hits: usize,
    pub temp_low_hits: usize,
    pub precip_hits: usize,
    pub condition_hits: usize,
}

pub fn summarize_by_lead_time(scores: &[ScoreRecord]) -> Vec<LeadTimeSummary> {
    let mut groups: BTreeMap<u32, Vec<&ScoreRecord>> = BTreeMap::new();
    for s in scores {
        groups.entry(s.lead_days).or_default().push(s);
    }

    groups
        .into_iter()
        .map(|(lead_days, group)| {
            let hits = |f: fn(&ScoreRecord) -> bool| group.iter().filter(|s| f(s)).count();
            let total: f64 = group.iter().map(|s| s.overall_percent).sum();
            LeadTimeSummary {
                lead_days,
                count: group.len(),
                mean_overall_percent: round_to(total / group.len() as f64, 1),
                temp_high_hits: hits(|s| s.field_accuracy.temp_high),
                temp_low_hits: hits(|s| s.field_accuracy.temp_low),
                precip_hits: hits(|s| s.field_accuracy.precipitation),
                condition_hits: hits(|s| s.field_accuracy.condition),
            }
        })
        .collect()
}

pub fn log_summary(summaries: &[LeadTimeSummary]) {
    for s in summaries {
        info!(
            "Accuracy: lead {:>2}d n={:<4} overall={:>5.1}% high={}/{} low={}/{} precip={}/{} condition={}/{}",
            s.lead_days,
            s.count,
            s.mean_overall_percent,
            s.temp_high_hits,
            s.count,
            s.temp_low_hits,
            s.count,
            s.precip_hits,
            s.count,
            s.condition_hits,
            s.count
        );
    }
}

#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    last_updated: NaiveDate,
    scores: &'a [ScoreRecord],
    by_lead_time: BTreeMap<String, Vec<&'a ScoreRecord>>,
    summary: Vec<LeadTimeSummary>,
}

fn results_document(scores: &[ScoreRecord], today: NaiveDate) -> ResultsFile<'_> {
    let mut by_lead_time: BTreeMap<String, Vec<&ScoreRecord>> = BTreeMap::new();
    for s in scores {
        by_lead_time.entry(s.lead_days.to_string()).or_default().push(s);
    }
    ResultsFile {
        last_updated: today,
        scores,
        by_lead_time,
        summary: summarize_by_lead_time(scores),
    }
}

/// Rewrite the results file atomically (write to a sibling, then rename).
pub fn write_results(path: &Path, scores: &[ScoreRecord], today: NaiveDate) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| format!("creating {} failed: {}", dir.display(), e))?;
    }
    let body = serde_json::to_string_pretty(&results_document(scores, today))
        .map_err(|e| format!("serializing results failed: {}", e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(|e| format!("writing {} failed: {}", tmp.display(), e))?;
    std::fs::rename(&tmp, path).map_err(|e| format!("replacing {} failed: {}", path.display(), e))
}
