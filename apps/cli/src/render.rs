use std::fmt::Write;

use shared::domain::{Opening, Side};

/// Renders one side of the repertoire as an indented outline.
pub fn side_outline(side: Side, openings: &[&Opening]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {side} ==");
    if openings.is_empty() {
        let _ = writeln!(out, "  (no openings)");
        return out;
    }
    for opening in openings {
        let star = if opening.is_favorite { " *" } else { "" };
        let _ = writeln!(out, "[{}] {}{star}", opening.id, opening.name);
        let mut variations: Vec<_> = opening.variations.iter().collect();
        variations.sort_by_key(|v| (v.position, v.id));
        for variation in variations {
            let _ = writeln!(
                out,
                "    [{}] {}: {}",
                variation.id, variation.name, variation.moves
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::domain::{OpeningId, Variation, VariationId};

    fn variation(id: i64, position: i64, moves: &str) -> Variation {
        Variation {
            id: VariationId(id),
            opening_id: OpeningId(1),
            name: format!("Line {id}"),
            moves: moves.to_string(),
            lichess_link: String::new(),
            image_filename: None,
            tutorials: Vec::new(),
            notes: None,
            position,
            updated_at: Utc.timestamp_opt(0, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn outline_lists_variations_in_position_order() {
        let opening = Opening {
            id: OpeningId(1),
            name: "Italian Game".into(),
            side: Side::White,
            is_favorite: true,
            position: 0,
            updated_at: Utc.timestamp_opt(0, 0).single().expect("timestamp"),
            variations: vec![variation(8, 1, "1. e4 e5 2. Nf3"), variation(7, 0, "1. e4 e5")],
        };

        let outline = side_outline(Side::White, &[&opening]);
        assert_eq!(
            outline,
            "== white ==\n[1] Italian Game *\n    [7] Line 7: 1. e4 e5\n    [8] Line 8: 1. e4 e5 2. Nf3\n"
        );
    }

    #[test]
    fn empty_side_says_so() {
        assert_eq!(
            side_outline(Side::Black, &[]),
            "== black ==\n  (no openings)\n"
        );
    }
}
