
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Returns the temporary path used while an output is being written
fn partial_path(filename: &Path) -> PathBuf {
    let mut name = filename.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Writes a delimited table to `<filename>.partial` and only moves it into place on `finish()`.
/// A writer that is dropped without finishing never leaves a file under the final name.
pub struct TableWriter {
    /// Handle on the writer
    csv_writer: csv::Writer<BufWriter<File>>,
    /// Where the data is going while we write
    partial_filename: PathBuf,
    /// Where the data ends up
    final_filename: PathBuf,
    /// Number of records written so far, including header rows
    records_written: u64,
}

impl TableWriter {
    /// Opens a new output table.
    /// The delimiter is "," if the name ends with .csv and tab otherwise.
    /// # Arguments
    /// * `filename` - final output path
    pub fn new(filename: &Path) -> anyhow::Result<Self> {
        let partial_filename = partial_path(filename);
        let file = File::create(&partial_filename)
            .with_context(|| format!("Error while creating {partial_filename:?}:"))?;

        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(csv::QuoteStyle::Never)
            .flexible(true)
            .has_headers(false)
            .from_writer(BufWriter::new(file));

        Ok(Self {
            csv_writer,
            partial_filename,
            final_filename: filename.to_path_buf(),
            records_written: 0
        })
    }

    /// Writes one record as-is
    pub fn write_record<I, T>(&mut self, record: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>
    {
        self.csv_writer.write_record(record)
            .with_context(|| format!("Error while writing to {:?}:", self.partial_filename))?;
        self.records_written += 1;
        Ok(())
    }

    /// Writes a serde struct as one record; the caller writes the header row
    pub fn serialize<S: serde::Serialize>(&mut self, row: &S) -> anyhow::Result<()> {
        self.csv_writer.serialize(row)
            .with_context(|| format!("Error while writing to {:?}:", self.partial_filename))?;
        self.records_written += 1;
        Ok(())
    }

    /// Flushes everything and moves the output into its final location.
    /// Returns the number of records written.
    pub fn finish(self) -> anyhow::Result<u64> {
        let mut inner = self.csv_writer.into_inner()
            .map_err(|e| anyhow::anyhow!("Error while flushing {:?}: {}", self.partial_filename, e.error()))?;
        inner.flush()
            .with_context(|| format!("Error while flushing {:?}:", self.partial_filename))?;
        drop(inner);

        std::fs::rename(&self.partial_filename, &self.final_filename)
            .with_context(|| format!("Error while moving {:?} to {:?}:", self.partial_filename, self.final_filename))?;
        Ok(self.records_written)
    }
}

/// Copies a file into place unchanged, through the same partial-then-rename path as `TableWriter`.
/// # Arguments
/// * `source` - file to copy
/// * `filename` - final output path
pub fn copy_passthrough(source: &Path, filename: &Path) -> anyhow::Result<u64> {
    let partial_filename = partial_path(filename);
    let bytes = std::fs::copy(source, &partial_filename)
        .with_context(|| format!("Error while copying {source:?} to {partial_filename:?}:"))?;
    std::fs::rename(&partial_filename, filename)
        .with_context(|| format!("Error while moving {partial_filename:?} to {filename:?}:"))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_moves_output() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join("out.tsv");
        let mut writer = TableWriter::new(&out_fn).unwrap();
        writer.write_record(["A", "B"]).unwrap();
        writer.write_record(["1", "say \"hi\""]).unwrap();
        assert!(!out_fn.exists());
        assert_eq!(writer.finish().unwrap(), 2);

        let contents = std::fs::read_to_string(&out_fn).unwrap();
        assert_eq!(contents, "A\tB\n1\tsay \"hi\"\n");
        assert!(!partial_path(&out_fn).exists());
    }

    #[test]
    fn test_dropped_writer_leaves_no_output() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join("out.tsv");
        {
            let mut writer = TableWriter::new(&out_fn).unwrap();
            writer.write_record(["A"]).unwrap();
        }
        assert!(!out_fn.exists());
    }

    #[test]
    fn test_csv_delimiter() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join("out.csv");
        let mut writer = TableWriter::new(&out_fn).unwrap();
        writer.write_record(["A", "B"]).unwrap();
        writer.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&out_fn).unwrap(), "A,B\n");
    }

    #[test]
    fn test_plain_text_only() {
        // outputs are never compressed, whatever the name
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join("out.tsv.gz");
        let mut writer = TableWriter::new(&out_fn).unwrap();
        writer.write_record(["A", "B"]).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&out_fn).unwrap(), "A\tB\n");
    }

    #[test]
    fn test_copy_passthrough() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let source = Path::new("test_data/tables/sample_a.snvs_indels.tiers.tsv");
        let out_fn = tmp_dir.path().join("copy.tsv");
        copy_passthrough(source, &out_fn).unwrap();
        assert_eq!(std::fs::read(source).unwrap(), std::fs::read(&out_fn).unwrap());
    }
}
