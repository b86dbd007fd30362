pub mod dates;
pub mod records;
pub mod segment;

use records::Record;
use segment::Block;

/// Two-pass pipeline for one participant: lines → blocks → records.
///
/// Each document is segmented on its own, so a block never spans two files
/// and fields above a document's first date are dropped.
pub fn process_documents<S: AsRef<str>>(
    participant_id: &str,
    documents: &[Vec<S>],
    dayfirst: bool,
) -> (Vec<Block>, Vec<Record>) {
    let blocks: Vec<Block> = documents
        .iter()
        .flat_map(|lines| segment::segment(participant_id, lines, dayfirst))
        .collect();
    let records = records::extract_blocks(&blocks);
    (blocks, records)
}
