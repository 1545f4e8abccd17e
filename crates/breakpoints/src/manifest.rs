//! Reading and patching a channel `manifest`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use eyre::WrapErr;
use regex::Regex;

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)=(.+)$").expect("valid manifest entry regex"));

static BS_CONST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*bs_const[ \t]*=[ \t]*)(.*?)[ \t]*\r?$").expect("valid bs_const regex"));

/// The `key=value` entries of a manifest. Other lines are skipped.
pub fn parse_manifest(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let captures = ENTRY.captures(line.trim())?;
            Some((captures[1].to_string(), captures[2].to_string()))
        })
        .collect()
}

pub async fn read_manifest(path: impl AsRef<Path>) -> eyre::Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("reading manifest {}", path.display()))?;
    Ok(parse_manifest(&contents))
}

/// Overwrite the values of `consts` in the `bs_const` line, leaving every
/// other constant and line alone.
///
/// Every constant in `consts` must already be declared by the manifest.
pub fn update_bs_consts(contents: &str, consts: &HashMap<String, bool>) -> eyre::Result<String> {
    let Some(captures) = BS_CONST_LINE.captures(contents) else {
        eyre::bail!("manifest has no bs_const line");
    };
    let value = captures.get(2).map_or("", |m| m.as_str());

    let mut declared: Vec<(String, String)> = Vec::new();
    for pair in value.split(';').filter(|p| !p.trim().is_empty()) {
        let (name, current) = pair
            .split_once('=')
            .ok_or_else(|| eyre::eyre!("malformed bs_const entry {pair:?}"))?;
        declared.push((name.trim().to_string(), current.trim().to_string()));
    }

    for (name, enabled) in consts {
        let entry = declared
            .iter_mut()
            .find(|(declared_name, _)| declared_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| eyre::eyre!("bs_const {name:?} is not declared in the manifest"))?;
        entry.1 = enabled.to_string();
    }

    let rewritten = declared
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(";");

    let value_range = captures.get(2).map_or(0..0, |m| m.range());
    let mut updated = String::with_capacity(contents.len());
    updated.push_str(&contents[..value_range.start]);
    updated.push_str(&rewritten);
    updated.push_str(&contents[value_range.end..]);
    Ok(updated)
}
