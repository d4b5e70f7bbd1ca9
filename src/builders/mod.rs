// src/builders/mod.rs
// Builder registry: a name-keyed map of pre-aggregated analytic builders,
// each turning a loaded set of columnar rows into a JSON payload written
// under a deterministic output path. Registration is explicit --
// `register_all` enumerates every builder by hand rather than relying on
// construct-on-import/ctor magic.

pub mod explorer;
pub mod heatmap;
pub mod popularity;
pub mod stats_builder;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;
use crate::model::ColumnarRow;

/// A registered aggregation stage. `build` never fails: every column it
/// needs is guaranteed present by the loader's fixed schema, so the source
/// contract's `MissingColumns` failure surfaces earlier, at load time,
/// rather than once per builder run.
pub trait Builder {
    fn name(&self) -> &'static str;
    fn build(&self, rows: &[ColumnarRow]) -> Value;
}

type BuilderFactory = fn() -> Box<dyn Builder>;

#[derive(Serialize)]
struct Envelope {
    builder: String,
    created_at_unix: i64,
    payload: Value,
}

/// Builds the process-wide name -> builder mapping. Call once from `main`;
/// the result is read-only afterward and safe to share across concurrent
/// builder runs.
pub fn register_all() -> Result<HashMap<&'static str, BuilderFactory>, PipelineError> {
    let mut registry: HashMap<&'static str, BuilderFactory> = HashMap::new();
    register(&mut registry, "popularity", || Box::new(popularity::PopularityBuilder))?;
    register(&mut registry, "accuracy_heatmap", || Box::new(heatmap::HeatmapBuilder))?;
    register(&mut registry, "opening_explorer", || Box::new(explorer::ExplorerBuilder))?;
    register(&mut registry, "stats", || Box::new(stats_builder::StatsBuilder))?;
    Ok(registry)
}

fn register(
    registry: &mut HashMap<&'static str, BuilderFactory>,
    name: &'static str,
    factory: BuilderFactory,
) -> Result<(), PipelineError> {
    if name.is_empty() || registry.insert(name, factory).is_some() {
        return Err(PipelineError::DuplicateBuilderRegistration { name: name.to_string() });
    }
    Ok(())
}

pub fn known_names(registry: &HashMap<&'static str, BuilderFactory>) -> Vec<String> {
    let mut names: Vec<String> = registry.keys().map(|s| s.to_string()).collect();
    names.sort();
    names
}

/// Runs one registered builder over `rows`, writes
/// `<root>/<out_dir>/<builder_name>/<filename>.json` (atomically, via a
/// temp-file-then-rename), and returns the path written.
pub fn run(
    registry: &HashMap<&'static str, BuilderFactory>,
    name: &str,
    rows: &[ColumnarRow],
    root: &Path,
    out_dir: &str,
    filename: Option<&str>,
) -> Result<PathBuf, PipelineError> {
    let factory = registry.get(name).ok_or_else(|| PipelineError::UnknownBuilder {
        name: name.to_string(),
        known: known_names(registry),
    })?;
    let builder = factory();
    let payload = builder.build(rows);
    let created_at_unix = now_unix();

    let dir = root.join(out_dir).join(builder.name());
    fs::create_dir_all(&dir).map_err(|e| PipelineError::Io {
        path: dir.clone(),
        source: e,
    })?;

    let stem = filename
        .map(String::from)
        .unwrap_or_else(|| derive_filename(rows, builder.name(), created_at_unix));
    let path = dir.join(format!("{stem}.json"));

    let envelope = Envelope {
        builder: builder.name().to_string(),
        created_at_unix,
        payload,
    };
    write_json_atomic(&path, &envelope)?;
    Ok(path)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Single-source-file stem when every row shares one `source_file`, else
/// `"all"`, with the builder name and creation timestamp appended.
fn derive_filename(rows: &[ColumnarRow], builder_name: &str, created_at_unix: i64) -> String {
    let stem = single_source_stem(rows).unwrap_or_else(|| "all".to_string());
    format!("{stem}_{builder_name}_{created_at_unix}")
}

fn single_source_stem(rows: &[ColumnarRow]) -> Option<String> {
    let first = rows.first()?.source_file.as_str();
    if rows.iter().all(|r| r.source_file == first) {
        Some(
            Path::new(first)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| first.to_string()),
        )
    } else {
        None
    }
}

fn write_json_atomic(path: &Path, envelope: &Envelope) -> Result<(), PipelineError> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = fs::File::create(&tmp).map_err(|e| PipelineError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        serde_json::to_writer_pretty(file, envelope).map_err(|e| PipelineError::Io {
            path: tmp.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
    }
    fs::rename(&tmp, path).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_all_has_every_builder() {
        let registry = register_all().unwrap();
        for name in ["popularity", "accuracy_heatmap", "opening_explorer", "stats"] {
            assert!(registry.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn unknown_builder_lists_known_names() {
        let registry = register_all().unwrap();
        let err = run(&registry, "nope", &[], Path::new("/tmp"), "build", None).unwrap_err();
        match err {
            PipelineError::UnknownBuilder { known, .. } => {
                assert!(known.contains(&"popularity".to_string()));
            }
            other => panic!("expected UnknownBuilder, got {other:?}"),
        }
    }

    #[test]
    fn filename_falls_back_to_all_when_sources_differ() {
        assert_eq!(single_source_stem(&[]), None);
    }
}
