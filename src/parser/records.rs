use serde::Serialize;

use super::segment::Block;

/// One `parameter: value` observation in long format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub participant_id: String,
    pub date_label: String,
    pub parameter: String,
    pub value: String,
}

/// Split every body line on its first `:`; values keep any later colons.
pub fn extract(block: &Block) -> Vec<Record> {
    block
        .body
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(parameter, value)| Record {
            participant_id: block.participant_id.clone(),
            date_label: block.date_label.clone(),
            parameter: parameter.trim().to_string(),
            value: value.trim().to_string(),
        })
        .collect()
}

pub fn extract_blocks(blocks: &[Block]) -> Vec<Record> {
    blocks.iter().flat_map(extract).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::segment::segment;

    fn block(body: &[&str]) -> Block {
        Block {
            participant_id: "p1".into(),
            date_label: "13/07/2020".into(),
            body: body.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn splits_on_first_colon() {
        let records = extract(&block(&["Wake up time: 07:15", "  Focus level :  7 / 10  "]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].parameter, "Wake up time");
        assert_eq!(records[0].value, "07:15");
        assert_eq!(records[1].parameter, "Focus level");
        assert_eq!(records[1].value, "7 / 10");
        assert!(records.iter().all(|r| r.participant_id == "p1" && r.date_label == "13/07/2020"));
    }

    #[test]
    fn ignores_lines_without_separator() {
        let records = extract(&block(&["no separator", "Mood: ok"]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parameter, "Mood");
    }

    #[test]
    fn empty_value_is_kept() {
        let records = extract(&block(&["User notes:"]));
        assert_eq!(records[0].value, "");
    }

    #[test]
    fn two_dates_three_records() {
        let lines = [
            "Header: before any date",
            "Thursday 16/07/2020",
            "Energy: 5 / 10",
            "Morning tasks: Processed emails",
            "Friday 17/07/2020",
            "Energy: 8 / 10",
        ];
        let records = extract_blocks(&segment("p1", lines, true));
        assert_eq!(records.len(), 3);
        let first: Vec<_> = records.iter().filter(|r| r.date_label == "Thursday 16/07/2020").collect();
        let second: Vec<_> = records.iter().filter(|r| r.date_label == "Friday 17/07/2020").collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(records.iter().all(|r| r.parameter != "Header"));
    }
}
