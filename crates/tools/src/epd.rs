//! EPD corpus loading.
//!
//! Each line carries a 4-field FEN followed by a `result` opcode and operand,
//! optionally followed by `white` and `black` opcodes with the players'
//! ratings. When ratings are present the position string is extended to a
//! 6-field FEN whose move counter carries the Elo difference, so a
//! rating-aware oracle can pick it up.

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use texel_core::TestRecord;

fn result_target(result: &str) -> Option<f64> {
    match result {
        "1-0" => Some(1.0),
        "0-1" => Some(0.0),
        "1/2-1/2" => Some(0.5),
        _ => None,
    }
}

fn parse_line(line: &str) -> Result<TestRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        bail!("expected 4 FEN fields and a result opcode, got {} fields", fields.len());
    }

    let mut position = fields[..4].join(" ");
    let result = fields[5].trim_end_matches(';');
    let white_target = result_target(result)
        .with_context(|| format!("unknown game result {result:?}"))?;

    if fields.len() >= 10 && fields[6] == "white" && fields[8] == "black" {
        let white_elo: i64 = fields[7]
            .trim_end_matches(';')
            .parse()
            .context("invalid white rating")?;
        let black_elo: i64 = fields[9]
            .trim_end_matches(';')
            .parse()
            .context("invalid black rating")?;
        position = format!("{position} 0 1 {}", white_elo - black_elo);
    }

    // Targets are from the side to move's point of view.
    let target = if fields[1] == "w" {
        white_target
    } else {
        1.0 - white_target
    };
    Ok(TestRecord::new(position, target))
}

/// Read labeled test positions, one per line. Blank lines are skipped; any
/// malformed line aborts the load.
pub fn read_corpus<R: BufRead>(reader: R) -> Result<Vec<TestRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = parse_line(trimmed)
            .with_context(|| format!("invalid EPD on line {}: {}", idx + 1, trimmed))?;
        records.push(record);
    }
    if records.is_empty() {
        bail!("no test positions on input");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE_WIN: &str =
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - result 1-0;";

    #[test]
    fn result_becomes_the_target_probability() {
        let record = parse_line(WHITE_WIN).unwrap();
        assert_eq!(record.target, 1.0);
        assert_eq!(
            record.position,
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq -"
        );
    }

    #[test]
    fn target_flips_for_black_to_move() {
        let line = "8/8/8/8/8/8/8/8 b - - result 1-0;";
        assert_eq!(parse_line(line).unwrap().target, 0.0);
        let line = "8/8/8/8/8/8/8/8 b - - result 1/2-1/2;";
        assert_eq!(parse_line(line).unwrap().target, 0.5);
    }

    #[test]
    fn ratings_extend_the_position_with_the_elo_difference() {
        let line = "8/8/8/8/8/8/8/8 w - - result 0-1; white 2650; black 2700;";
        let record = parse_line(line).unwrap();
        assert_eq!(record.position, "8/8/8/8/8/8/8/8 w - - 0 1 -50");
        assert_eq!(record.target, 0.0);
    }

    #[test]
    fn unknown_result_is_rejected() {
        let line = "8/8/8/8/8/8/8/8 w - - result *;";
        assert!(parse_line(line).is_err());
    }

    #[test]
    fn corpus_reports_the_offending_line() {
        let input = format!("{WHITE_WIN}\n\nnot an epd line\n");
        let err = read_corpus(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(read_corpus("\n\n".as_bytes()).is_err());
    }
}
