//! Show the order in which config items are evaluated.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Settings, load_config};
use crate::resolver::DepGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GraphFormat {
    /// Groups of items that can be evaluated together
    #[default]
    Waves,
    /// One item per line in a valid evaluation order
    Order,
}

/// Print the config item dependency graph.
///
/// # Examples
///
/// ```bash
/// kots-render graph --config config.yaml
/// kots-render graph --config config.yaml --format order
/// ```
#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Config document (`kind: Config`)
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    #[arg(long, value_enum, default_value_t = GraphFormat::Waves)]
    format: GraphFormat,
}

impl GraphCommand {
    pub fn execute(self, _settings: Settings) -> Result<()> {
        let groups = load_config(&self.config)
            .with_context(|| format!("Failed to load config: {}", self.config.display()))?;

        let mut graph = DepGraph::new();
        graph.parse_config_group(&groups);
        tracing::debug!("Dependency graph has {} items", graph.len());

        print!("{}", format_graph(&graph, self.format)?);
        Ok(())
    }
}

fn format_graph(graph: &DepGraph, format: GraphFormat) -> Result<String> {
    let mut out = String::new();
    match format {
        GraphFormat::Waves => {
            for (i, wave) in graph.evaluation_waves()?.iter().enumerate() {
                out.push_str(&format!("{} {}\n", format!("{}:", i + 1).bold(), wave.join(", ")));
            }
        }
        GraphFormat::Order => {
            for name in graph.topological_order()? {
                out.push_str(&name);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_waves_and_order() {
        colored::control::set_override(false);
        let mut graph = DepGraph::new();
        graph.add_dep("url", "host");
        graph.add_dep("url", "port");

        assert_eq!(format_graph(&graph, GraphFormat::Waves).unwrap(), "1: host, port\n2: url\n");
        let order = format_graph(&graph, GraphFormat::Order).unwrap();
        assert!(order.ends_with("url\n"));
    }

    #[test]
    fn test_cycle_is_error() {
        let mut graph = DepGraph::new();
        graph.add_dep("a", "b");
        graph.add_dep("b", "a");
        assert!(format_graph(&graph, GraphFormat::Order).is_err());
        assert!(format_graph(&graph, GraphFormat::Waves).is_err());
    }
}
