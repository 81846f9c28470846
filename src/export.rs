use std::collections::BTreeMap;

use chrono::NaiveTime;
use csv::WriterBuilder;

use crate::schedule::condition::Condition;
use crate::schedule::slot_utils::format_hm;
use crate::schedule::solution::{Solution, SolutionGame};

/// One printable line under a physical field
struct ExportRow<'a> {
    start: NaiveTime,
    game: &'a SolutionGame,
    /// Set on the mirror copy of a paired-field game
    note: Option<String>,
}

/// Regroups the games of a solution by physical field id. A paired-field game is
/// listed under its first member and mirrored under the second with a note.
fn rows_by_field<'a>(condition: &Condition, solution: &'a Solution) -> BTreeMap<u32, Vec<ExportRow<'a>>> {
    let mut by_field: BTreeMap<u32, Vec<ExportRow<'a>>> =
        condition.fields().iter().map(|f| (f.id, Vec::new())).collect();

    for node in condition.field_nodes() {
        let Some(games) = solution.games.get(node.label()) else {
            continue;
        };
        let ids: Vec<u32> = node.members().iter().map(|&i| condition.fields()[i].id).collect();
        let note = node.is_paired().then(|| {
            let names: Vec<String> = ids.iter().map(|id| format!("field{}", id)).collect();
            format!("game on {}", names.join(", "))
        });

        for game in games {
            for (position, id) in ids.iter().enumerate() {
                by_field.entry(*id).or_default().push(ExportRow {
                    start: game.start,
                    game,
                    note: if position == 0 { None } else { note.clone() },
                });
            }
        }
    }

    for rows in by_field.values_mut() {
        rows.sort_by_key(|r| r.start);
    }
    by_field
}

/// Renders a solution as CSV: `field, time, division, team 1, team 2, note`
pub fn solution_to_csv(condition: &Condition, solution: &Solution) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(["field", "time", "division", "team 1", "team 2", "note"])?;

    for (field_id, rows) in rows_by_field(condition, solution) {
        let field = format!("field{}", field_id);
        for row in rows {
            let time = format!("{}-{}", format_hm(row.start), format_hm(row.game.end));
            match row.note {
                Some(note) => wtr.write_record([field.as_str(), time.as_str(), "", "", "", note.as_str()])?,
                None => {
                    let division = condition.division_of(row.game.team_id_1).name.as_str();
                    let team_1 = condition.team(row.game.team_id_1).name.as_str();
                    let team_2 = condition.team(row.game.team_id_2).name.as_str();
                    wtr.write_record([field.as_str(), time.as_str(), division, team_1, team_2, ""])?;
                }
            }
        }
    }

    wtr.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::condition::tests::{four_team_input, t};
    use crate::schedule::field::FieldSpec;
    use crate::schedule::types::Division;

    fn game(t1: u32, t2: u32, h: u32, m: u32) -> SolutionGame {
        SolutionGame { team_id_1: t1, team_id_2: t2, start: t(h, m), end: t(h, m + 30) }
    }

    #[test]
    fn single_field_rows_in_time_order() {
        let cond = Condition::build(&four_team_input()).unwrap();
        let solution = Solution::new(
            1,
            BTreeMap::from([(
                "[field1]".to_string(),
                vec![game(3, 4, 10, 0), game(1, 2, 9, 0)],
            )]),
        );

        let csv = String::from_utf8(solution_to_csv(&cond, &solution).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "field,time,division,team 1,team 2,note");
        assert_eq!(lines[1], "field1,09:00-09:30,U9,Team 1,Team 2,");
        assert_eq!(lines[2], "field1,10:00-10:30,U9,Team 3,Team 4,");
    }

    #[test]
    fn paired_game_is_mirrored_with_a_note() {
        let mut input = four_team_input();
        let spec = FieldSpec { format: 5, from: t(9, 0), to: t(12, 0), dur: 30 };
        input.fields = vec![spec.clone(), spec];
        input.divisions = vec![Division { id: 1, name: "U13".to_string(), format: 7 }];
        let cond = Condition::build(&input).unwrap();

        let solution = Solution::new(
            0,
            BTreeMap::from([("[field1,field2]".to_string(), vec![game(1, 2, 9, 0)])]),
        );
        let csv = String::from_utf8(solution_to_csv(&cond, &solution).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[1], "field1,09:00-09:30,U13,Team 1,Team 2,");
        assert_eq!(lines[2], "field2,09:00-09:30,,,,\"game on field1, field2\"");
        assert_eq!(lines.len(), 3);
    }
}
