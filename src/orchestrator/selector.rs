//! Random choice of a control node

use rand::Rng;
use thiserror::Error;

use crate::config::NodeConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("No nodes are configured")]
    NoNodes,

    #[error("The only configured node, {0}, is excluded")]
    OnlyNodeExcluded(String),

    #[error("Every configured node matches the excluded name {0}")]
    AllExcluded(String),
}

/// Pick a node uniformly at random, never one matching `exclude`
/// (case-insensitive). Excluded picks are re-rolled, so every eligible node
/// stays equally likely.
pub fn select_node<'n, R: Rng + ?Sized>(
    nodes: &'n [NodeConfig],
    exclude: Option<&str>,
    rng: &mut R,
) -> Result<&'n NodeConfig, SelectError> {
    let excluded = |node: &NodeConfig| exclude.is_some_and(|name| node.matches(name));

    match nodes {
        [] => Err(SelectError::NoNodes),
        [only] if excluded(only) => Err(SelectError::OnlyNodeExcluded(only.name.clone())),
        [only] => Ok(only),
        _ if nodes.iter().all(|n| excluded(n)) => Err(SelectError::AllExcluded(
            exclude.unwrap_or_default().to_string(),
        )),
        _ => loop {
            let candidate = &nodes[rng.gen_range(0..nodes.len())];
            if !excluded(candidate) {
                return Ok(candidate);
            }
        },
    }
}
