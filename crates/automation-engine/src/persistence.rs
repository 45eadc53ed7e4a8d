//! Rule persistence: a single JSON document at `./data/automations.json`,
//! written atomically (temp file + rename).
//! Legacy single-condition (`threshold`) records are migrated to the
//! `conditions` list on load, and the store is rewritten if any
//! migration happened.

use crate::model::{Rule, StoredRule};
use std::path::Path;
use tokio::fs;

/// The on-disk document shape: `{"rules": [...]}`.
#[derive(serde::Serialize)]
struct RulesDocument<'a> {
    rules: &'a [Rule],
}

#[derive(serde::Deserialize, Default)]
struct StoredRulesDocument {
    #[serde(default)]
    rules: Vec<StoredRule>,
}

/// Load rules from `path`. Returns `(rules, needs_rewrite)`: `needs_rewrite`
/// is set when any stored rule used the legacy `threshold` field, so the
/// caller can immediately rewrite the file in the current schema.
pub async fn load_rules(path: &Path) -> (Vec<Rule>, bool) {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "no automations file found, starting fresh");
            return (Vec::new(), false);
        }
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to read automations file");
            return (Vec::new(), false);
        }
    };

    let doc: StoredRulesDocument = match serde_json::from_str(&contents) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to parse automations file");
            return (Vec::new(), false);
        }
    };

    let needs_rewrite = doc.rules.iter().any(|r| r.threshold.is_some() && r.conditions.is_empty());
    let rules = doc.rules.into_iter().map(StoredRule::migrate).collect();
    (rules, needs_rewrite)
}

/// Save rules atomically: write to `<path>.tmp`, then rename over `path`.
#[allow(clippy::missing_errors_doc)]
pub async fn save_rules(path: &Path, rules: &[Rule]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let doc = RulesDocument { rules };
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    tracing::debug!(count = rules.len(), ?path, "saved automations");
    Ok(())
}
