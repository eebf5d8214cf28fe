//! Command-line plumbing shared by the binaries.

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::montecarlo::{Aggregation, SearchConfig};

/// Search options. Unset options fall back to the defaults the binary passes
/// to [`SearchArgs::to_config`].
#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Move levels expanded per tree
    #[arg(long, env = "MC2048_DEPTH")]
    pub depth: Option<u32>,

    /// Independent trees built per decision
    #[arg(long, env = "MC2048_REPS")]
    pub reps: Option<usize>,

    /// Worker threads sharing the trees (default: available hardware threads)
    #[arg(long, env = "MC2048_THREADS")]
    pub threads: Option<usize>,

    /// Tree levels that expand their subtrees in parallel
    #[arg(long, env = "MC2048_CONCURRENCY_DEPTH")]
    pub concurrency_depth: Option<u32>,

    /// How per-tree answers are combined: `vote` or `max-score`
    #[arg(long, env = "MC2048_AGGREGATE")]
    pub aggregate: Option<Aggregation>,

    /// Fixed base seed for reproducible searches
    #[arg(long, env = "MC2048_SEED")]
    pub seed: Option<u64>,
}

impl SearchArgs {
    pub fn to_config(&self, defaults: SearchConfig) -> SearchConfig {
        SearchConfig {
            depth: self.depth.unwrap_or(defaults.depth),
            reps: self.reps.unwrap_or(defaults.reps),
            parallelism: self.threads.unwrap_or(defaults.parallelism),
            concurrency_depth: self.concurrency_depth.unwrap_or(defaults.concurrency_depth),
            aggregation: self.aggregate.unwrap_or(defaults.aggregation),
            seed: self.seed.or(defaults.seed),
        }
    }
}

/// Install a stderr `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        search: SearchArgs,
    }

    #[test]
    fn unset_options_keep_defaults() {
        let defaults = SearchConfig { depth: 9, reps: 1, concurrency_depth: 2, ..SearchConfig::default() };
        let cfg = SearchArgs::default().to_config(defaults.clone());
        assert_eq!(cfg, defaults);
    }

    #[test]
    fn flags_override_defaults() {
        let h = Harness::try_parse_from([
            "t", "--depth", "4", "--reps", "10", "--threads", "3", "--aggregate", "max-score", "--seed", "5",
        ])
        .unwrap();
        let cfg = h.search.to_config(SearchConfig::default());
        assert_eq!(cfg.depth, 4);
        assert_eq!(cfg.reps, 10);
        assert_eq!(cfg.parallelism, 3);
        assert_eq!(cfg.aggregation, Aggregation::MaxScore);
        assert_eq!(cfg.seed, Some(5));
    }

    #[test]
    fn bad_aggregation_is_rejected() {
        assert!(Harness::try_parse_from(["t", "--aggregate", "median"]).is_err());
    }
}
