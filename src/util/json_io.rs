
use anyhow::Context;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Deserializes a JSON file, such as a `SchemaConfig` override.
/// # Arguments
/// * `filename` - the JSON file to parse
/// # Errors
/// * if the file cannot be opened
/// * if the contents do not deserialize into `T`
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> anyhow::Result<T> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let result: T = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Error while deserializing {filename:?}:"))?;
    Ok(result)
}

/// Writes a serializable value as pretty JSON, used for the debug copy of the run settings.
/// # Arguments
/// * `data` - the value to save
/// * `out_filename` - destination path
/// # Errors
/// * if the file cannot be created or written
/// * if serialization fails
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let file = File::create(out_filename)
        .with_context(|| format!("Error while creating {out_filename:?}:"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("Error while serializing {out_filename:?}:"))?;
    writer.flush()
        .with_context(|| format!("Error while flushing output to {out_filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::schema::SchemaConfig;

    #[test]
    fn test_schema_round_trip() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let json_fn = tmp_dir.path().join("schema.json");
        std::fs::write(&json_fn, r#"{"sample_id": "SAMPLE", "pass_column_count": 189}"#).unwrap();

        // unspecified fields keep their defaults
        let config: SchemaConfig = load_json(&json_fn).unwrap();
        assert_eq!(config.sample_id, "SAMPLE");
        assert_eq!(config.pass_column_count, Some(189));
        assert_eq!(config.chrom, "CHROM");

        let out_fn = tmp_dir.path().join("saved.json");
        save_json(&config, &out_fn).unwrap();
        let reloaded: SchemaConfig = load_json(&out_fn).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_missing_file() {
        let result: anyhow::Result<SchemaConfig> = load_json(Path::new("test_data/does_not_exist.json"));
        assert!(result.is_err());
    }
}
