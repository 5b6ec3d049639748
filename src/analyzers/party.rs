//! Party-pattern analysis: outcome favorability cross-tabulated by party
//! category and representation type.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::analyzers::local_confidence;
use crate::config::AnalyticsConfig;
use crate::types::{Dimension, MetricRow, OutcomeClass, PartyType, RepresentationType, WeightedCase};

#[derive(Debug, Clone, Serialize)]
pub struct PartyCellStat {
    pub party: PartyType,
    pub representation: RepresentationType,
    pub sample_size: usize,
    pub effective_sample_size: f64,
    /// Weighted share of directional outcomes favoring the tracked party.
    /// Settlements and withdrawals carry no direction and sit outside the
    /// rate.
    pub favor_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyFindings {
    /// Reportable cells only; a cell below the support floor is omitted,
    /// never shown as a zero-rate placeholder.
    pub cells: Vec<PartyCellStat>,
    /// Cells dropped for sitting under the support floor.
    pub omitted_cells: usize,
    /// Favor-rate difference, individuals minus corporations, aggregated
    /// across representation types. Present only when both sides are
    /// reportable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_vs_corporation: Option<f64>,
    /// Weighted share of verdict outcomes favoring plaintiffs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintiff_favorability: Option<f64>,
}

#[derive(Default)]
struct CellAccum {
    raw: usize,
    weight: f64,
    favorable_weight: f64,
    directional_weight: f64,
}

impl CellAccum {
    fn favor_rate(&self) -> Option<f64> {
        (self.directional_weight > 0.0).then(|| self.favorable_weight / self.directional_weight)
    }
}

pub fn analyze_parties(cases: &[WeightedCase], config: &AnalyticsConfig) -> PartyFindings {
    let mut cells: HashMap<(PartyType, RepresentationType), CellAccum> = HashMap::new();
    let mut party_totals: HashMap<PartyType, CellAccum> = HashMap::new();
    let mut plaintiff_weight = 0.0;
    let mut defendant_weight = 0.0;

    for case in cases {
        let outcome = case.record.outcome_class();

        match outcome {
            Some(OutcomeClass::PlaintiffVerdict) => plaintiff_weight += case.weight,
            Some(OutcomeClass::DefenseVerdict) => defendant_weight += case.weight,
            _ => {}
        }

        let Some(representation) = case.record.representation_type else {
            debug!("case has no representation type; excluded from party cells");
            continue;
        };
        if case.record.party_types.is_empty() {
            continue;
        }

        let favorable = outcome.and_then(|c| c.favorable());
        for &party in &case.record.party_types {
            for accum in [
                cells.entry((party, representation)).or_default(),
                party_totals.entry(party).or_default(),
            ] {
                accum.raw += 1;
                accum.weight += case.weight;
                if let Some(favored) = favorable {
                    accum.directional_weight += case.weight;
                    if favored {
                        accum.favorable_weight += case.weight;
                    }
                }
            }
        }
    }

    let mut reportable = Vec::new();
    let mut omitted = 0usize;
    for party in PartyType::ALL {
        for representation in RepresentationType::ALL {
            let Some(accum) = cells.get(&(party, representation)) else {
                continue;
            };
            if accum.weight < config.party_cell_floor {
                omitted += 1;
                continue;
            }
            let Some(rate) = accum.favor_rate() else {
                omitted += 1;
                continue;
            };
            reportable.push(PartyCellStat {
                party,
                representation,
                sample_size: accum.raw,
                effective_sample_size: accum.weight,
                favor_rate: rate,
            });
        }
    }

    let headline_rate = |party: PartyType| -> Option<f64> {
        let accum = party_totals.get(&party)?;
        if accum.weight < config.party_cell_floor {
            return None;
        }
        accum.favor_rate()
    };
    let individual_vs_corporation = match (
        headline_rate(PartyType::Individual),
        headline_rate(PartyType::Corporation),
    ) {
        (Some(ind), Some(corp)) => Some(ind - corp),
        _ => None,
    };

    let verdict_weight = plaintiff_weight + defendant_weight;
    let plaintiff_favorability = (verdict_weight >= config.party_cell_floor)
        .then(|| plaintiff_weight / verdict_weight);

    PartyFindings {
        cells: reportable,
        omitted_cells: omitted,
        individual_vs_corporation,
        plaintiff_favorability,
    }
}

impl PartyFindings {
    pub fn metric_rows(&self, config: &AnalyticsConfig) -> Vec<MetricRow> {
        let mut rows = Vec::with_capacity(self.cells.len() + 2);
        for cell in &self.cells {
            rows.push(MetricRow {
                dimension: Dimension::Party,
                label: format!(
                    "party/{}_{}/favor_rate",
                    cell.party.as_str(),
                    cell.representation.as_str()
                ),
                value: cell.favor_rate,
                sample_size: cell.sample_size,
                effective_sample_size: cell.effective_sample_size,
                confidence: local_confidence(cell.effective_sample_size, config.party_cell_floor),
                baseline_value: None,
                deviation_sigma: None,
                flagged: false,
            });
        }
        if let Some(diff) = self.individual_vs_corporation {
            let eff: f64 = self
                .cells
                .iter()
                .filter(|c| matches!(c.party, PartyType::Individual | PartyType::Corporation))
                .map(|c| c.effective_sample_size)
                .sum();
            rows.push(MetricRow {
                dimension: Dimension::Party,
                label: "party/individual_vs_corporation/differential".to_string(),
                value: diff,
                sample_size: self
                    .cells
                    .iter()
                    .filter(|c| matches!(c.party, PartyType::Individual | PartyType::Corporation))
                    .map(|c| c.sample_size)
                    .sum(),
                effective_sample_size: eff,
                confidence: local_confidence(eff, config.party_cell_floor),
                baseline_value: None,
                deviation_sigma: None,
                flagged: false,
            });
        }
        if let Some(rate) = self.plaintiff_favorability {
            let eff: f64 = self.cells.iter().map(|c| c.effective_sample_size).sum();
            rows.push(MetricRow {
                dimension: Dimension::Party,
                label: "party/plaintiff_vs_defendant/favorability".to_string(),
                value: rate,
                sample_size: self.cells.iter().map(|c| c.sample_size).sum(),
                effective_sample_size: eff,
                confidence: local_confidence(eff, config.party_cell_floor),
                baseline_value: None,
                deviation_sigma: None,
                flagged: false,
            });
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaseRecord;

    fn party_case(
        party: PartyType,
        representation: RepresentationType,
        outcome: &str,
        weight: f64,
    ) -> WeightedCase {
        WeightedCase {
            record: CaseRecord {
                outcome: Some(outcome.into()),
                party_types: vec![party],
                representation_type: Some(representation),
                ..Default::default()
            },
            weight,
        }
    }

    #[test]
    fn thin_cells_are_omitted_not_zeroed() {
        // 5 effective cases sits under the default floor of 20.
        let cases: Vec<WeightedCase> = (0..5)
            .map(|_| {
                party_case(
                    PartyType::Individual,
                    RepresentationType::ProSe,
                    "judgment for plaintiff",
                    1.0,
                )
            })
            .collect();
        let findings = analyze_parties(&cases, &AnalyticsConfig::default());
        assert!(findings.cells.is_empty());
        assert_eq!(findings.omitted_cells, 1);
    }

    #[test]
    fn favor_rate_ignores_settlements() {
        let mut cases: Vec<WeightedCase> = (0..15)
            .map(|_| {
                party_case(
                    PartyType::Corporation,
                    RepresentationType::PrivateCounsel,
                    "judgment for plaintiff",
                    1.0,
                )
            })
            .collect();
        cases.extend((0..5).map(|_| {
            party_case(
                PartyType::Corporation,
                RepresentationType::PrivateCounsel,
                "judgment for defendant",
                1.0,
            )
        }));
        cases.extend((0..10).map(|_| {
            party_case(
                PartyType::Corporation,
                RepresentationType::PrivateCounsel,
                "settled",
                1.0,
            )
        }));
        let findings = analyze_parties(&cases, &AnalyticsConfig::default());
        let cell = &findings.cells[0];
        assert_eq!(cell.sample_size, 30);
        assert!((cell.favor_rate - 0.75).abs() < 1e-12);
    }

    #[test]
    fn headline_differential_requires_both_sides() {
        let cases: Vec<WeightedCase> = (0..30)
            .map(|_| {
                party_case(
                    PartyType::Individual,
                    RepresentationType::PrivateCounsel,
                    "judgment for plaintiff",
                    1.0,
                )
            })
            .collect();
        let findings = analyze_parties(&cases, &AnalyticsConfig::default());
        assert!(findings.individual_vs_corporation.is_none());
        assert!(findings.plaintiff_favorability.is_some());
    }

    #[test]
    fn dual_party_cases_feed_both_cells() {
        let mut record = CaseRecord {
            outcome: Some("judgment for plaintiff".into()),
            party_types: vec![PartyType::Individual, PartyType::Insurance],
            representation_type: Some(RepresentationType::PrivateCounsel),
            ..Default::default()
        };
        record.case_type = Some("tort".into());
        let cases: Vec<WeightedCase> = (0..25)
            .map(|_| WeightedCase {
                record: record.clone(),
                weight: 1.0,
            })
            .collect();
        let findings = analyze_parties(&cases, &AnalyticsConfig::default());
        assert_eq!(findings.cells.len(), 2);
    }
}
