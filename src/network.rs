// src/network.rs
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::types::ChannelId;

#[derive(Deserialize)]
struct NetworkFile {
    #[serde(rename = "Nodes")]
    nodes: Vec<NetworkNode>,
}

#[derive(Deserialize)]
struct NetworkNode {
    id: Value,
}

/// Channel aliases from a JSON network description: every `Nodes[*].id`,
/// parsed as an integer (numbers or numeric strings), sorted ascending.
pub fn load_neuron_aliases(path: &Path) -> Result<Vec<ChannelId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read network file {}", path.display()))?;
    parse_neuron_aliases(&text).with_context(|| format!("bad network file {}", path.display()))
}

pub fn parse_neuron_aliases(text: &str) -> Result<Vec<ChannelId>> {
    let network: NetworkFile = serde_json::from_str(text)?;
    let mut aliases = network
        .nodes
        .iter()
        .map(|node| match &node.id {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| ChannelId::try_from(v).ok())
                .ok_or_else(|| anyhow!("node id {n} is not a valid channel id")),
            Value::String(s) => s
                .trim()
                .parse::<ChannelId>()
                .with_context(|| format!("node id {s:?} is not an integer")),
            other => Err(anyhow!("unsupported node id {other}")),
        })
        .collect::<Result<Vec<_>>>()?;
    aliases.sort_unstable();
    Ok(aliases)
}

/// `all` keeps every alias; otherwise a comma-separated id list in display order.
pub fn parse_selection(ids: &str, aliases: &[ChannelId]) -> Result<Vec<ChannelId>> {
    let ids = ids.trim();
    if ids.eq_ignore_ascii_case("all") {
        return Ok(aliases.to_vec());
    }
    ids.split(',')
        .map(|id| {
            id.trim()
                .parse::<ChannelId>()
                .with_context(|| format!("bad neuron id {id:?}"))
        })
        .collect()
}
