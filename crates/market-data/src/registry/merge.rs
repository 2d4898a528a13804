//! Merge of search reports from several providers.
//!
//! Results are keyed by upper-cased canonical symbol. The first report of a
//! symbol becomes the base record. A later report overwrites base fields
//! only when its provider outranks the provider currently heading the
//! provenance list, and then takes over that head position. Every reporter
//! is recorded in the provenance regardless.

use std::collections::HashMap;

use log::debug;

use crate::models::SearchResult;

/// Reports of one provider, in the order that provider returned them.
#[derive(Debug)]
pub struct ProviderReport {
    pub provider: &'static str,
    pub priority: u8,
    pub results: Vec<SearchResult>,
}

/// Fold reports into one deduplicated list. Output order is the order in
/// which each symbol was first seen.
pub fn merge_reports(reports: Vec<ProviderReport>) -> Vec<SearchResult> {
    let priorities: HashMap<&str, u8> = reports.iter().map(|r| (r.provider, r.priority)).collect();

    let mut merged: Vec<SearchResult> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for report in reports {
        for mut incoming in report.results {
            let key = incoming.key();

            let Some(&slot) = index.get(&key) else {
                incoming.provenance.retain(|s| s != report.provider);
                incoming.provenance.insert(0, report.provider.to_string());
                index.insert(key, merged.len());
                merged.push(incoming);
                continue;
            };

            let existing = &mut merged[slot];
            let head_priority = existing
                .primary_source()
                .and_then(|s| priorities.get(s).copied())
                .unwrap_or(u8::MAX);

            if report.priority < head_priority {
                debug!(
                    "Merge: {} overlays {} (priority {} < {})",
                    report.provider,
                    existing.symbol,
                    report.priority,
                    head_priority
                );
                existing.overlay(&incoming);
                existing.provenance.retain(|s| s != report.provider);
                existing.provenance.insert(0, report.provider.to_string());
            } else {
                existing.add_source(report.provider);
            }
        }
    }

    merged
}
