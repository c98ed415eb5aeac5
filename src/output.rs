//! Report rendering

use std::fmt::Write as _;

use serde::Serialize;

use crate::commands::{ResolveReport, ScrollReport, TrackReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Human-readable summary of a command result.
pub trait HumanReport {
    fn human(&self) -> String;
}

impl HumanReport for ResolveReport {
    fn human(&self) -> String {
        format!(
            "resolved {} <{}> via {} (exact matches: {})\n  rect: {}",
            self.node,
            self.tag.as_deref().unwrap_or("?"),
            self.strategy.name(),
            self.exact_matches,
            self.rect
        )
    }
}

impl HumanReport for TrackReport {
    fn human(&self) -> String {
        let mut out = self.target.human();
        let _ = write!(out, "\ncontext: {}\nphase: {}", self.context, self.phase);
        for update in &self.updates {
            let _ = write!(
                out,
                "\n  #{:<3} {:<14} {:<24} {}",
                update.attempt,
                update.phase.name(),
                format!("{:?}", update.source),
                update.rect
            );
        }
        out
    }
}

impl HumanReport for ScrollReport {
    fn human(&self) -> String {
        format!(
            "{}\noutcome: {:?}\nscroll: x={:.1} y={:.1}",
            self.target.human(),
            self.outcome,
            self.scroll.x,
            self.scroll.y
        )
    }
}

pub fn render<T>(report: &T, format: OutputFormat) -> anyhow::Result<String>
where
    T: Serialize + HumanReport,
{
    Ok(match format {
        OutputFormat::Human => report.human(),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    })
}
