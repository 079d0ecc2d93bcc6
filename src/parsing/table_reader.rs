/*!
# Table reader
Tab-delimited readers for the annotation tables, with transparent gzip support.
`ChunkedTableReader` keeps only the requested columns and yields bounded chunks of rows.
*/
use anyhow::{bail, Context};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::data_types::table::Table;
use crate::errors::CohortError;

/// Default number of rows handed out per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Opens a file for reading, decompressing on the fly if it ends with .gz
/// # Arguments
/// * `filename` - the file to open
pub fn open_reader(filename: &Path) -> anyhow::Result<Box<dyn Read>> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let reader: Box<dyn Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Builds a raw TSV reader; headers are handled by the caller and row widths are not enforced.
/// Quoting is disabled so that annotation values containing quotes pass through untouched.
pub fn tsv_reader(filename: &Path) -> anyhow::Result<csv::Reader<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(open_reader(filename)?))
}

/// Reads just the header row of a table.
/// # Errors
/// * if the file cannot be opened or is empty
pub fn read_header(filename: &Path) -> anyhow::Result<Vec<String>> {
    let mut reader = tsv_reader(filename)?;
    let mut record = csv::StringRecord::new();
    let found = reader.read_record(&mut record)
        .with_context(|| format!("Error while reading header of {filename:?}:"))?;
    if !found {
        bail!("No header found in {filename:?}, file is empty");
    }
    Ok(record.iter().map(|s| s.to_string()).collect())
}

/// Streams a table in bounded chunks, keeping only the requested columns.
/// Peak memory is proportional to the chunk size rather than the file size.
pub struct ChunkedTableReader {
    /// Source file, for error messages
    filename: PathBuf,
    /// Underlying TSV reader, positioned after the header
    reader: csv::Reader<Box<dyn Read>>,
    /// Indices of the projected columns in the source header
    projection: Vec<usize>,
    /// The projected header
    header: Vec<String>,
    /// Maximum rows per chunk
    chunk_size: usize,
    /// Set once the reader is exhausted or has errored
    finished: bool,
}

impl ChunkedTableReader {
    /// Opens a table and resolves the projection.
    /// # Arguments
    /// * `filename` - the table to read
    /// * `columns` - the columns to keep, in output order
    /// * `chunk_size` - maximum rows per chunk
    /// # Errors
    /// * if the file cannot be opened or has no header
    /// * if any requested column is not in the header
    pub fn new(filename: &Path, columns: &[String], chunk_size: usize) -> anyhow::Result<Self> {
        let mut reader = tsv_reader(filename)?;
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)
            .with_context(|| format!("Error while reading header of {filename:?}:"))? {
            bail!("No header found in {filename:?}, file is empty");
        }

        let projection: Vec<usize> = columns.iter()
            .map(|c| {
                record.iter().position(|h| h == c)
                    .ok_or_else(|| CohortError::MissingRequiredColumn {
                        filename: filename.to_path_buf(),
                        column: c.clone()
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            filename: filename.to_path_buf(),
            reader,
            projection,
            header: columns.to_vec(),
            chunk_size: chunk_size.max(1),
            finished: false
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Reads the next chunk, returns None when the file is exhausted
    fn read_chunk(&mut self) -> anyhow::Result<Option<Vec<Vec<String>>>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut record = csv::StringRecord::new();
        while chunk.len() < self.chunk_size {
            if !self.reader.read_record(&mut record)
                .with_context(|| format!("Error while reading {:?}:", self.filename))? {
                break;
            }
            let row: Vec<String> = self.projection.iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string())
                .collect();
            chunk.push(row);
        }

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl Iterator for ChunkedTableReader {
    type Item = anyhow::Result<Vec<Vec<String>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Loads the requested columns of a table into memory, chunk by chunk.
/// # Arguments
/// * `filename` - the table to read
/// * `columns` - the columns to keep, in output order
/// * `chunk_size` - maximum rows per read chunk
pub fn load_projected_table(filename: &Path, columns: &[String], chunk_size: usize) -> anyhow::Result<Table> {
    let chunk_reader = ChunkedTableReader::new(filename, columns, chunk_size)?;
    let mut table = Table::new(chunk_reader.header().to_vec());
    for chunk in chunk_reader {
        for row in chunk? {
            table.push_row(row);
        }
    }
    Ok(table)
}
