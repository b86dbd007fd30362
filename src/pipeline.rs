use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::parser::{self, records::Record, segment::Block};
use crate::pivot::{self, WideTable};
use crate::source;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub struct ParticipantData {
    pub participant_id: String,
    pub documents: usize,
    pub blocks: Vec<Block>,
    pub records: Vec<Record>,
}

/// Read every document of one participant and segment each in file order.
/// An open block is closed at the end of its document.
pub fn extract_participant(folder: &Path, participant_id: &str, dayfirst: bool) -> Result<ParticipantData> {
    let files = source::document_files(folder)?;
    let documents = files
        .iter()
        .map(|path| source::document_lines(path))
        .collect::<Result<Vec<_>>>()?;
    let (blocks, records) = parser::process_documents(participant_id, &documents, dayfirst);

    info!(
        participant = participant_id,
        documents = files.len(),
        lines = documents.iter().map(Vec::len).sum::<usize>(),
        blocks = blocks.len(),
        records = records.len(),
        "extracted participant"
    );

    Ok(ParticipantData {
        participant_id: participant_id.to_string(),
        documents: files.len(),
        blocks,
        records,
    })
}

#[cfg(feature = "rayon")]
fn extract_each(folders: &[(String, std::path::PathBuf)], dayfirst: bool, pb: &ProgressBar) -> Vec<Result<ParticipantData>> {
    folders
        .par_iter()
        .map(|(id, path)| {
            let data = extract_participant(path, id, dayfirst);
            pb.inc(1);
            data
        })
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn extract_each(folders: &[(String, std::path::PathBuf)], dayfirst: bool, pb: &ProgressBar) -> Vec<Result<ParticipantData>> {
    folders
        .iter()
        .map(|(id, path)| {
            let data = extract_participant(path, id, dayfirst);
            pb.inc(1);
            data
        })
        .collect()
}

/// Whole run: participant folders → long records → wide table.
///
/// Records are concatenated in participant order, so the result does not
/// depend on how the per-participant work was scheduled.
pub fn extract_all(main_folder: &Path, dayfirst: bool) -> Result<WideTable> {
    let folders = source::participant_folders(main_folder)?;
    info!(folder = %main_folder.display(), participants = folders.len(), dayfirst, "starting extraction");

    let pb = ProgressBar::new(folders.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} participants")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let results = extract_each(&folders, dayfirst, &pb);
    pb.finish_and_clear();

    let mut records = Vec::new();
    let mut documents = 0;
    for data in results {
        let data = data?;
        documents += data.documents;
        records.extend(data.records);
    }

    let table = pivot::pivot(&records, dayfirst);
    match &table {
        Err(e @ PipelineError::NoRecords) => error!(
            participants = folders.len(),
            documents,
            error = %e,
            "extraction produced no usable table"
        ),
        Ok(t) if t.rows.is_empty() => warn!(records = records.len(), "no record had a usable date"),
        _ => {}
    }
    table
}
