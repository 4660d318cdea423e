//! Program-level reporting over the registry.
//!
//! [`DashboardSummary`] is computed once per request and rendered either as a
//! terminal report, an HTML page, or JSON (via serde).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rayon::prelude::*;
use serde::Serialize;

use crate::record::{RiskAssessment, RiskLevel};
use crate::registry::MotherRegistry;
use crate::risk::RiskEngine;

pub const HISTOGRAM_BINS: usize = 10;

/// A labelled count, kept in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub label: String,
    pub count: usize,
}

/// Descriptive statistics of ANC visit counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two records.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighRiskEntry {
    pub phone_number: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_mothers: usize,
    pub model_loaded: bool,
    /// Most common language first.
    pub languages: Vec<Count>,
    /// Category stored on each record.
    pub stored_risk: Vec<Count>,
    /// Category the current model assigns, including `unknown`.
    pub predicted_risk: Vec<Count>,
    pub anc_stats: Option<AncStats>,
    pub anc_histogram: Vec<HistogramBin>,
    pub high_risk: Vec<HighRiskEntry>,
}

impl DashboardSummary {
    pub fn build(registry: &MotherRegistry, engine: &RiskEngine) -> Self {
        let mothers = registry.mothers();

        let mut by_language: BTreeMap<&str, usize> = BTreeMap::new();
        for m in mothers {
            *by_language.entry(m.language.as_str()).or_insert(0) += 1;
        }
        let mut languages: Vec<Count> = by_language
            .into_iter()
            .map(|(label, count)| Count {
                label: label.to_string(),
                count,
            })
            .collect();
        languages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        let stored_risk = RiskLevel::ALL
            .iter()
            .map(|level| Count {
                label: level.as_str().to_string(),
                count: mothers.iter().filter(|m| m.risk_level == *level).count(),
            })
            .collect();

        let predictions: Vec<RiskAssessment> =
            mothers.par_iter().map(|m| engine.predict_risk(m)).collect();
        let predicted_risk = RiskLevel::ALL
            .into_iter()
            .map(RiskAssessment::Level)
            .chain([RiskAssessment::Unknown])
            .map(|assessment| Count {
                label: assessment.as_str().to_string(),
                count: predictions.iter().filter(|p| **p == assessment).count(),
            })
            .collect();

        let visits: Vec<f64> = mothers.iter().map(|m| f64::from(m.anc_visits)).collect();
        let high_risk = engine
            .identify_high_risk(mothers)
            .into_iter()
            .map(|m| HighRiskEntry {
                phone_number: m.phone_number.clone(),
                language: m.language.clone(),
            })
            .collect();

        Self {
            total_mothers: mothers.len(),
            model_loaded: engine.is_loaded(),
            languages,
            stored_risk,
            predicted_risk,
            anc_stats: describe(&visits),
            anc_histogram: histogram(&visits, HISTOGRAM_BINS),
            high_risk,
        }
    }

    /// Plain-text report for the terminal.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}\nFURHA DASHBOARD DATA\n{rule}");
        let _ = writeln!(out, "Total mothers registered: {}", self.total_mothers);

        let _ = writeln!(out, "\nLanguage distribution:");
        for c in &self.languages {
            let _ = writeln!(out, "  {}: {} mothers", c.label, c.count);
        }

        let _ = writeln!(out, "\nRisk level distribution:");
        for c in &self.predicted_risk {
            let _ = writeln!(out, "  {}: {} mothers", c.label, c.count);
        }
        if !self.model_loaded {
            let _ = writeln!(out, "  (no trained model; run `furha train`)");
        }

        if let Some(s) = &self.anc_stats {
            let std = s.std.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
            let _ = writeln!(
                out,
                "\nANC visits: mean {:.2}, std {std}, min {}, median {}, max {}",
                s.mean, s.min, s.median, s.max
            );
        }

        let _ = writeln!(
            out,
            "\nHigh-risk mothers needing attention: {}",
            self.high_risk.len()
        );
        for entry in &self.high_risk {
            let _ = writeln!(out, "  {} ({})", entry.phone_number, entry.language);
        }
        out
    }

    /// Self-contained HTML page with CSS bar charts.
    pub fn render_html(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
             <title>FURHA Dashboard</title><style>\
             body{font-family:sans-serif;margin:2em;color:#222}\
             .chart{margin-bottom:2em}.row{display:flex;align-items:center;margin:4px 0}\
             .label{width:10em}.bar{background:#3b7dd8;height:1.2em;margin-right:.5em}\
             table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 8px}\
             </style></head><body>\n<h1>FURHA Antenatal Care Dashboard</h1>\n",
        );
        let _ = writeln!(
            html,
            "<p>Total mothers: <b>{}</b> &middot; High-risk: <b>{}</b></p>",
            self.total_mothers,
            self.high_risk.len()
        );

        let escaped = |counts: &[Count]| -> Vec<(String, usize)> {
            counts.iter().map(|c| (escape(&c.label), c.count)).collect()
        };
        bar_chart(&mut html, "Risk Level Distribution", &escaped(&self.predicted_risk));
        bar_chart(&mut html, "Language Distribution", &escaped(&self.languages));
        let bins: Vec<(String, usize)> = self
            .anc_histogram
            .iter()
            .map(|b| (format!("{:.1}&ndash;{:.1}", b.lower, b.upper), b.count))
            .collect();
        bar_chart(&mut html, "ANC Visits Distribution", &bins);

        html.push_str("<h2>High-risk mothers</h2>\n<table><tr><th>Phone</th><th>Language</th></tr>\n");
        for entry in &self.high_risk {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape(&entry.phone_number),
                escape(&entry.language)
            );
        }
        html.push_str("</table>\n</body></html>\n");
        html
    }
}

/// `rows` carry HTML-safe labels.
fn bar_chart(html: &mut String, title: &str, rows: &[(String, usize)]) {
    let max = rows.iter().map(|(_, count)| *count).max().unwrap_or(0).max(1);
    let _ = writeln!(html, "<div class=\"chart\"><h2>{title}</h2>");
    for (label, count) in rows {
        let width = count * 300 / max;
        let _ = writeln!(
            html,
            "<div class=\"row\"><span class=\"label\">{label}</span>\
             <span class=\"bar\" style=\"width:{width}px\"></span>{count}</div>"
        );
    }
    html.push_str("</div>\n");
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Count, mean, sample std, min, quartiles and max. `None` for no data.
pub fn describe(values: &[f64]) -> Option<AncStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let std = (n > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    Some(AncStats {
        count: n,
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear-interpolated quantile of sorted, non-empty data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width histogram over `[min, max]`; the last bin is closed. A
/// constant sample is spread over `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskEngineConfig;
    use crate::synth::synthetic_cohort;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    #[test]
    fn describe_interpolates_quartiles() {
        let s = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert!((s.std.unwrap() - 1.290_994_448_7).abs() < 1e-9);
        assert_eq!((s.q25, s.median, s.q75), (1.75, 2.5, 3.25));
        assert_eq!((s.min, s.max), (1.0, 4.0));
    }

    #[test]
    fn describe_single_value_has_no_std() {
        let s = describe(&[3.0]).unwrap();
        assert_eq!(s.std, None);
        assert_eq!(s.median, 3.0);
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn histogram_covers_every_value() {
        let values: Vec<f64> = (0..=8).map(f64::from).collect();
        let bins = histogram(&values, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 9);
        assert_eq!(bins[9].count, 1);
        assert_eq!(bins[0].lower, 0.0);
        assert!((bins[9].upper - 8.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_of_constant_sample() {
        let bins = histogram(&[2.0, 2.0], 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert_eq!(bins[5].count, 2);
    }

    #[test]
    fn summary_without_model_is_all_unknown() {
        let dir = TempDir::new().unwrap();
        let mut registry = MotherRegistry::empty(dir.path().join("mothers.csv"));
        registry.extend(synthetic_cohort(12, 4, today())).unwrap();
        let engine = RiskEngine::new(RiskEngineConfig {
            models_dir: dir.path().join("models"),
            ..RiskEngineConfig::default()
        });

        let summary = DashboardSummary::build(&registry, &engine);
        assert_eq!(summary.total_mothers, 12);
        assert!(!summary.model_loaded);
        assert_eq!(summary.predicted_risk.last().unwrap().label, "unknown");
        assert_eq!(summary.predicted_risk.last().unwrap().count, 12);
        assert!(summary.high_risk.is_empty());
        assert_eq!(summary.languages.iter().map(|c| c.count).sum::<usize>(), 12);
        assert_eq!(summary.stored_risk.iter().map(|c| c.count).sum::<usize>(), 12);
        assert!(summary.render_text().contains("Total mothers registered: 12"));
    }

    #[test]
    fn summary_with_model_lists_high_risk() {
        let dir = TempDir::new().unwrap();
        let mut registry = MotherRegistry::empty(dir.path().join("mothers.csv"));
        registry.extend(synthetic_cohort(150, 8, today())).unwrap();
        let engine = RiskEngine::new(RiskEngineConfig {
            models_dir: dir.path().join("models"),
            ..RiskEngineConfig::default()
        });
        engine.train(registry.path()).unwrap();

        let summary = DashboardSummary::build(&registry, &engine);
        let high = summary
            .predicted_risk
            .iter()
            .find(|c| c.label == "high")
            .unwrap();
        assert_eq!(high.count, summary.high_risk.len());
        assert_eq!(summary.predicted_risk.last().unwrap().count, 0);

        let html = summary.render_html();
        assert!(html.contains("Risk Level Distribution"));
        if let Some(first) = summary.high_risk.first() {
            assert!(html.contains(&first.phone_number));
        }
    }

    #[test]
    fn html_escapes_user_text() {
        assert_eq!(escape("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }
}
