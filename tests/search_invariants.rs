use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::NaiveTime;

use timetable::config::SearchConfig;
use timetable::error::SearchError;
use timetable::schedule::field::FieldSpec;
use timetable::schedule::types::{Coach, Division, PriorGame, Team, Wish};
use timetable::schedule::{Condition, DriveOutcome, Explorer, SearchInput, SearchStatus, Searcher, Solution};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn team(id: u32, coach_id: u32, division_id: u32) -> Team {
    Team { id, name: format!("Team {}", id), coach_id, division_id }
}

fn field(format: u8, from: NaiveTime, to: NaiveTime) -> FieldSpec {
    FieldSpec { format, from, to, dur: 30 }
}

fn four_teams() -> SearchInput {
    SearchInput {
        tour_name: "Spring".to_string(),
        fields: vec![field(3, t(9, 0), t(12, 0))],
        divisions: vec![Division { id: 1, name: "U9".to_string(), format: 3 }],
        coaches: (1..=4).map(|id| Coach { id, name: format!("Coach {}", id) }).collect(),
        teams: (1..=4).map(|id| team(id, id, 1)).collect(),
        wishes: vec![],
        games: vec![],
    }
}

/// Two divisions on their own fields, with one coach running a team in each
fn two_divisions() -> SearchInput {
    let mut teams: Vec<Team> = (1..=4).map(|id| team(id, id, 1)).collect();
    teams.extend((5..=8).map(|id| team(id, id, 2)));
    teams[4].coach_id = 1;
    SearchInput {
        tour_name: "Autumn".to_string(),
        fields: vec![field(3, t(9, 0), t(13, 0)), field(5, t(9, 0), t(13, 0))],
        divisions: vec![
            Division { id: 1, name: "U9".to_string(), format: 3 },
            Division { id: 2, name: "U11".to_string(), format: 5 },
        ],
        coaches: vec![],
        teams,
        wishes: vec![Wish { team_id: 6, from: Some(t(10, 0)), to: None }],
        games: vec![PriorGame { team_id_1: 7, team_id_2: 8, tour: "Spring".into(), can_rematch: false }],
    }
}

/// Drives first-level nodes in turn and collects every complete schedule
fn explore(input: &SearchInput, max_drives: usize) -> (Condition, Vec<Solution>) {
    let condition = Condition::build(input).unwrap();
    let mut explorer = Explorer::new(std::sync::Arc::new(condition.clone())).unwrap();
    let mut solutions = Vec::new();
    let mut root = 0;
    for _ in 0..max_drives {
        if explorer.all_exhausted() {
            break;
        }
        match explorer.drive(root) {
            DriveOutcome::Complete(solution) => solutions.push(solution),
            DriveOutcome::DeadEnd => {}
            DriveOutcome::Exhausted => root = (root + 1) % explorer.root_count(),
        }
    }
    (condition, solutions)
}

fn assert_valid(input: &SearchInput, condition: &Condition, solution: &Solution) {
    let teams: HashMap<u32, &Team> = input.teams.iter().map(|t| (t.id, t)).collect();
    let blocked: HashSet<(u32, u32)> = input.games.iter().map(PriorGame::key).collect();

    let mut opponents: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut busy_fields: HashSet<(u32, NaiveTime)> = HashSet::new();
    let mut busy_coaches: HashSet<(u32, NaiveTime)> = HashSet::new();

    for node in condition.field_nodes() {
        let Some(games) = solution.games.get(node.label()) else {
            continue;
        };
        for game in games {
            let (a, b) = (teams[&game.team_id_1], teams[&game.team_id_2]);
            assert_ne!(a.id, b.id, "a team plays itself");
            assert_ne!(a.coach_id, b.coach_id, "teams of one coach meet");
            assert_eq!(a.division_id, b.division_id);
            assert!(game.team_id_1 < game.team_id_2);
            assert!(!blocked.contains(&(a.id, b.id)), "rematch of {} and {}", a.id, b.id);

            for &member in node.members() {
                let field_id = condition.fields()[member].id;
                assert!(busy_fields.insert((field_id, game.start)), "field {} double booked", field_id);
            }
            for coach in [a.coach_id, b.coach_id] {
                assert!(busy_coaches.insert((coach, game.start)), "coach {} in two places", coach);
            }
            opponents.entry(a.id).or_default().push(b.id);
            opponents.entry(b.id).or_default().push(a.id);
        }
    }

    for team in &input.teams {
        let played = &opponents[&team.id];
        assert_eq!(played.len(), 2, "team {} plays {:?}", team.id, played);
        assert_ne!(played[0], played[1], "team {} meets the same opponent twice", team.id);
    }
}

#[test]
fn four_teams_on_one_field() {
    let input = four_teams();
    let (condition, solutions) = explore(&input, 500);

    assert!(!solutions.is_empty());
    for solution in &solutions {
        assert_valid(&input, &condition, solution);
        assert_eq!(solution.games_count(), 4);
    }
}

#[test]
fn divisions_share_a_coach_without_clashes() {
    let input = two_divisions();
    let (condition, solutions) = explore(&input, 5000);

    assert!(!solutions.is_empty());
    for solution in &solutions {
        assert_valid(&input, &condition, solution);
        let late_start = solution
            .games
            .values()
            .flatten()
            .filter(|g| g.team_id_1 == 6 || g.team_id_2 == 6)
            .all(|g| g.start >= t(10, 0));
        assert!(late_start, "wish of team 6 ignored");
    }
}

#[test]
fn wide_division_plays_on_paired_fields() {
    let mut input = four_teams();
    input.fields = vec![field(5, t(9, 0), t(12, 0)), field(5, t(9, 0), t(11, 0))];
    input.divisions[0].format = 7;
    let (condition, solutions) = explore(&input, 500);

    assert!(!solutions.is_empty());
    for solution in &solutions {
        assert_valid(&input, &condition, solution);
        assert_eq!(solution.games.keys().collect::<Vec<_>>(), vec!["[field1,field2]"]);
        // the shorter field caps the pair at four slots
        assert!(solution.games.values().flatten().all(|g| g.end <= t(11, 0)));
    }
}

#[test]
fn hash_identifies_schedule_content() {
    let (_, solutions) = explore(&four_teams(), 2000);
    assert!(!solutions.is_empty());

    let mut by_hash: HashMap<&str, &Solution> = HashMap::new();
    let mut distinct: Vec<&Solution> = Vec::new();
    for solution in &solutions {
        if let Some(previous) = by_hash.insert(solution.hash.as_str(), solution) {
            assert_eq!(previous.games, solution.games);
        }
        if !distinct.iter().any(|s| s.games == solution.games) {
            distinct.push(solution);
        }
    }
    assert_eq!(distinct.len(), by_hash.len());
}

#[test]
fn narrow_wish_is_infeasible() {
    let mut input = four_teams();
    input.wishes.push(Wish { team_id: 2, from: Some(t(10, 5)), to: Some(t(10, 10)) });
    match Condition::build(&input) {
        Err(SearchError::InfeasibleTeam { team, division }) => {
            assert_eq!(team, "Team 2");
            assert_eq!(division, "U9");
        }
        other => panic!("expected InfeasibleTeam, got {:?}", other.map(|c| c.tour_name)),
    }
}

#[tokio::test]
async fn searcher_lifecycle() {
    let searcher = Searcher::new(SearchConfig {
        initial_wait: Duration::from_millis(200),
        rotation_interval: Duration::from_millis(50),
        stop_grace: Duration::from_millis(500),
        ..SearchConfig::default()
    });
    let input = two_divisions();

    let started = searcher.start(&input).await.unwrap();
    assert_eq!(started.tour.tour_name, "Autumn");
    assert_eq!(started.tour.teams.len(), 8);

    tokio::time::sleep(Duration::from_millis(200)).await;
    searcher.stop().await;

    let status = searcher.status(true);
    assert_eq!(status.status, SearchStatus::Idle);
    let report = searcher.solutions();
    assert_eq!(report.solutions.len(), status.solutions_cnt.min(5000));
    assert!(report.solutions.windows(2).all(|w| w[0].score <= w[1].score));

    let condition = searcher.condition().unwrap();
    for solution in &report.solutions {
        assert_valid(&input, &condition, solution);
    }
}
