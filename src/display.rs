use std::fmt::Write;

use crate::schedule::condition::Condition;
use crate::schedule::slot_utils::format_hm;
use crate::schedule::solution::Solution;

/// Formats a team as "name (division)"
pub fn format_team_name(condition: &Condition, team_id: u32) -> String {
    condition
        .teams_pretty()
        .get(&team_id)
        .cloned()
        .unwrap_or_else(|| format!("#{}", team_id))
}

/// Renders one solution as a per-field listing
pub fn render_solution(condition: &Condition, solution: &Solution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "score {}  hash {}", solution.score, &solution.hash[..12.min(solution.hash.len())]);
    for (label, games) in &solution.games {
        let _ = writeln!(out, "  {}", label.trim_matches(|c| c == '[' || c == ']'));
        for game in games {
            let _ = writeln!(
                out,
                "    {}-{}  {}  vs  {}",
                format_hm(game.start),
                format_hm(game.end),
                format_team_name(condition, game.team_id_1),
                format_team_name(condition, game.team_id_2)
            );
        }
    }
    out
}

/// Prints the best solutions of a search in a readable format
pub fn print_solutions(condition: &Condition, solutions: &[Solution], attempts: u64, limit: usize) {
    println!("\n=== {} ===", condition.tour_name);
    println!("Day: {} - {}", format_hm(condition.day_start), format_hm(condition.day_end));
    println!("Attempts: {}, solutions found: {}", attempts, solutions.len());

    if solutions.is_empty() {
        println!("No complete schedule found.");
        return;
    }
    for (i, solution) in solutions.iter().take(limit).enumerate() {
        println!("\n#{} {}", i + 1, render_solution(condition, solution).trim_end());
    }
}
