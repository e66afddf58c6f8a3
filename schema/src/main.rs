use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use config::PipelineConfig;
use schemars::schema_for;

const DEFAULT_DIR: &str = ".vscode";

fn main() -> Result<()> {
    let schema_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR));
    fs::create_dir_all(&schema_dir)
        .with_context(|| format!("创建目录失败: {}", schema_dir.display()))?;

    let pipeline_schema = serde_json::to_string_pretty(&schema_for!(PipelineConfig))?;
    let schema_file = schema_dir.join("pipeline.schema.json");
    fs::write(&schema_file, pipeline_schema)
        .with_context(|| format!("写入文件失败: {}", schema_file.display()))?;
    println!("{}", schema_file.display());
    Ok(())
}
