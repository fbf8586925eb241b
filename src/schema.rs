use schemars::schema_for;

use crate::config::PipelineConfig;

/// JSON Schema for `PipelineConfig`, pretty-printed.
pub fn config_schema() -> anyhow::Result<String> {
    let schema = schema_for!(PipelineConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Print the configuration schema.
pub fn run() -> anyhow::Result<()> {
    println!("{}", config_schema()?);
    Ok(())
}
