use super::dates::{is_date_line, parse_flexible_date};

/// A date label together with the `key: value` lines written under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub participant_id: String,
    pub date_label: String,
    pub body: Vec<String>,
}

/// What a single raw line means to the segmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A recognized date header; carries the stripped label.
    Date(String),
    Field,
    Noise,
}

/// Fold state: either no date seen yet, or a block collecting body lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Segmenter {
    #[default]
    Idle,
    Open { date_label: String, body: Vec<String> },
}

/// Drop decoration like `==== Monday 13/07/2020 ====` or `** 13 July 2020 **`.
pub fn strip_separators(line: &str) -> &str {
    line.trim_matches(|c: char| matches!(c, '=' | '*' | '-' | '–') || c.is_whitespace())
}

pub fn classify_line(line: &str, dayfirst: bool) -> LineKind {
    let candidate = strip_separators(line);
    if is_date_line(candidate) && parse_flexible_date(candidate, dayfirst).is_some() {
        LineKind::Date(candidate.to_string())
    } else if line.contains(':') {
        LineKind::Field
    } else {
        LineKind::Noise
    }
}

/// One transition of the fold. Returns the next state and, when a date line
/// closes a non-empty block, that finished block.
pub fn step(
    state: Segmenter,
    participant_id: &str,
    line: &str,
    dayfirst: bool,
) -> (Segmenter, Option<Block>) {
    match (classify_line(line, dayfirst), state) {
        (LineKind::Date(date_label), previous) => {
            let flushed = finish(previous, participant_id);
            (
                Segmenter::Open {
                    date_label,
                    body: Vec::new(),
                },
                flushed,
            )
        }
        (LineKind::Field, Segmenter::Open { date_label, mut body }) => {
            body.push(line.to_string());
            (Segmenter::Open { date_label, body }, None)
        }
        // Fields before the first date have no block to land in.
        (LineKind::Field | LineKind::Noise, state) => (state, None),
    }
}

/// Close the stream: an open block with at least one body line is emitted.
pub fn finish(state: Segmenter, participant_id: &str) -> Option<Block> {
    match state {
        Segmenter::Open { date_label, body } if !body.is_empty() => Some(Block {
            participant_id: participant_id.to_string(),
            date_label,
            body,
        }),
        _ => None,
    }
}

/// Run the fold over one participant's full line stream.
pub fn segment<I, S>(participant_id: &str, lines: I, dayfirst: bool) -> Vec<Block>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blocks = Vec::new();
    let mut state = Segmenter::Idle;
    for line in lines {
        let (next, flushed) = step(state, participant_id, line.as_ref(), dayfirst);
        state = next;
        blocks.extend(flushed);
    }
    blocks.extend(finish(state, participant_id));
    blocks
}
