use std::fs;
use std::path::Path;
use std::time::Instant;

use sg_core::policy::parser::{merge_filter_list, ParseStats};
use sg_core::{EngineConfig, PolicyConfig, PolicyStore};

#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub lines: usize,
    pub entries: ParseStats,
    pub allow: usize,
    pub block: usize,
    pub suspicious: usize,
    pub selectors: usize,
    pub total_ms: f64,
}

/// Compile filter lists into an engine config. With `with_defaults` the
/// entries are appended to the built-in policy instead of an empty one.
pub fn compile_policy(
    inputs: &[String],
    with_defaults: bool,
    verbose: bool,
) -> Result<(EngineConfig, CompileStats), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut config = if with_defaults {
        PolicyConfig::default()
    } else {
        PolicyConfig::empty()
    };
    let mut stats = CompileStats::default();

    for (list_id, path) in inputs.iter().enumerate() {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        let parsed = merge_filter_list(&mut config, &content);
        stats.lines += parsed.lines;
        stats.entries.allow += parsed.allow;
        stats.entries.block += parsed.block;
        stats.entries.suspicious += parsed.suspicious;
        stats.entries.selectors += parsed.selectors;
        stats.entries.skipped += parsed.skipped;

        if verbose {
            println!(
                "  [{}] {} - {} lines, {} allow, {} block, {} tld, {} selectors, {} skipped",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                parsed.lines,
                parsed.allow,
                parsed.block,
                parsed.suspicious,
                parsed.selectors,
                parsed.skipped
            );
        }
    }

    // Normalize and validate through the store
    let store = PolicyStore::from_config(&config)
        .map_err(|e| format!("Compiled policy failed validation: {}", e))?;
    stats.allow = store.allow_entries().len();
    stats.block = store.block_entries().len();
    stats.suspicious = store.suspicious_tlds().len();
    stats.selectors = store.container_selectors().len();
    stats.total_ms = start.elapsed().as_secs_f64() * 1000.0;

    let engine = EngineConfig {
        policy: store.to_config(),
        ..EngineConfig::default()
    };
    Ok((engine, stats))
}

pub fn write_policy(path: &Path, config: &EngineConfig) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
        }
    }
    let json = config
        .to_json()
        .map_err(|e| format!("Failed to serialize policy: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}

/// Load an engine config, or the built-in one when no path is given.
pub fn read_policy(path: Option<&str>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::from_path(Path::new(path))
            .map_err(|e| format!("Invalid policy '{}': {}", path, e)),
        None => Ok(EngineConfig::default()),
    }
}
