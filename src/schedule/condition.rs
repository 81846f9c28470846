use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveTime;
use log::debug;
use serde::{Deserialize, Serialize};

use super::field::{Field, FieldNode, FieldSpec};
use super::slot_utils::slot_span;
use super::types::{
    ordered, Coach, CoachId, Division, DivisionId, PairId, PriorGame, Team, TeamId, TeamPair,
    Wish, GAMES_PER_TEAM, WIDE_FORMAT,
};
use crate::error::SearchError;

/// Raw, validated inputs of one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInput {
    pub tour_name: String,
    pub fields: Vec<FieldSpec>,
    pub divisions: Vec<Division>,
    #[serde(default)]
    pub coaches: Vec<Coach>,
    pub teams: Vec<Team>,
    #[serde(default)]
    pub wishes: Vec<Wish>,
    #[serde(default)]
    pub games: Vec<PriorGame>,
}

/// Read-only, indexed description of one search
#[derive(Debug, Clone)]
pub struct Condition {
    pub tour_name: String,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    fields: Vec<Field>,
    field_nodes: Vec<FieldNode>,
    divisions: HashMap<DivisionId, Division>,
    /// Sorted by id
    teams: Vec<Team>,
    team_index: HashMap<TeamId, usize>,
    teams_by_division: BTreeMap<DivisionId, Vec<TeamId>>,
    pairs: Vec<TeamPair>,
    pairs_by_division: BTreeMap<DivisionId, Vec<PairId>>,
    pairs_by_team: HashMap<TeamId, Vec<PairId>>,
    team_slots: HashMap<TeamId, Vec<usize>>,
    coach_teams: HashMap<CoachId, usize>,
    teams_pretty: BTreeMap<TeamId, String>,
    /// Slot clock, anchored on the first field
    clock_start: NaiveTime,
    clock_minutes: u32,
}

impl Condition {
    /// Indexes the inputs and checks that every team has at least one placeable slot
    pub fn build(input: &SearchInput) -> Result<Self, SearchError> {
        if input.fields.is_empty() {
            return Err(SearchError::NoFields);
        }
        let fields = input
            .fields
            .iter()
            .enumerate()
            .map(|(i, spec)| Field::new(i as u32 + 1, spec))
            .collect::<Result<Vec<_>, _>>()?;

        let day_start = fields.iter().map(|f| f.from).min().unwrap_or(fields[0].from);
        let day_end = fields.iter().map(|f| f.to).max().unwrap_or(fields[0].to);

        let divisions: HashMap<DivisionId, Division> =
            input.divisions.iter().map(|d| (d.id, d.clone())).collect();

        let mut seen = HashSet::new();
        let mut teams: Vec<Team> = input
            .teams
            .iter()
            .filter(|t| seen.insert(t.id))
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.id);

        let mut team_index = HashMap::with_capacity(teams.len());
        let mut teams_by_division: BTreeMap<DivisionId, Vec<TeamId>> = BTreeMap::new();
        let mut teams_pretty = BTreeMap::new();
        let mut coach_teams: HashMap<CoachId, usize> = HashMap::new();
        for (i, team) in teams.iter().enumerate() {
            let division = divisions.get(&team.division_id).ok_or(SearchError::UnknownDivision {
                team: team.id,
                division: team.division_id,
            })?;
            team_index.insert(team.id, i);
            teams_by_division.entry(team.division_id).or_default().push(team.id);
            teams_pretty.insert(team.id, format!("{} ({})", team.name, division.name));
            *coach_teams.entry(team.coach_id).or_insert(0) += 1;
        }

        // Any recorded game blocks a rematch, whatever its replay flag says
        let rematch_blocks: HashSet<(TeamId, TeamId)> = input.games.iter().map(PriorGame::key).collect();

        let mut pairs = Vec::new();
        let mut pairs_by_division: BTreeMap<DivisionId, Vec<PairId>> = BTreeMap::new();
        let mut pairs_by_team: HashMap<TeamId, Vec<PairId>> = HashMap::new();
        for (&division_id, members) in &teams_by_division {
            let division_pairs = pairs_by_division.entry(division_id).or_default();
            for (i, &id1) in members.iter().enumerate() {
                for &id2 in &members[i + 1..] {
                    let t1 = &teams[team_index[&id1]];
                    let t2 = &teams[team_index[&id2]];
                    // teams of one coach never play each other
                    if t1.coach_id == t2.coach_id {
                        continue;
                    }
                    if rematch_blocks.contains(&ordered(id1, id2)) {
                        continue;
                    }

                    let id = pairs.len();
                    pairs.push(TeamPair {
                        team_1: id1,
                        team_2: id2,
                        coach_1: t1.coach_id,
                        coach_2: t2.coach_id,
                        division_id,
                    });
                    division_pairs.push(id);
                    pairs_by_team.entry(id1).or_default().push(id);
                    pairs_by_team.entry(id2).or_default().push(id);
                }
            }
        }

        let mut field_nodes: Vec<FieldNode> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| FieldNode::single(i, f))
            .collect();
        let has_wide = divisions.values().any(|d| {
            d.format == WIDE_FORMAT && teams_by_division.get(&d.id).is_some_and(|t| !t.is_empty())
        });
        if has_wide {
            // only the first four fields are ever paired
            if fields.len() > 1 {
                field_nodes.push(FieldNode::paired((0, &fields[0]), (1, &fields[1])));
            }
            if fields.len() > 3 {
                field_nodes.push(FieldNode::paired((2, &fields[2]), (3, &fields[3])));
            }
        }

        let clock_start = fields[0].from;
        let clock_minutes = fields[0].duration_minutes;
        let clock_slots = fields.iter().map(Field::slots_count).max().unwrap_or(0);

        let wishes: HashMap<TeamId, &Wish> = input.wishes.iter().map(|w| (w.team_id, w)).collect();
        let team_slots: HashMap<TeamId, Vec<usize>> = teams
            .iter()
            .map(|team| {
                let slots = (0..clock_slots)
                    .filter(|&slot| {
                        wishes
                            .get(&team.id)
                            .map_or(true, |w| w.allows(clock_start, clock_minutes, slot))
                    })
                    .collect();
                (team.id, slots)
            })
            .collect();

        let condition = Self {
            tour_name: input.tour_name.clone(),
            day_start,
            day_end,
            fields,
            field_nodes,
            divisions,
            teams,
            team_index,
            teams_by_division,
            pairs,
            pairs_by_division,
            pairs_by_team,
            team_slots,
            coach_teams,
            teams_pretty,
            clock_start,
            clock_minutes,
        };
        condition.check_placeable()?;

        debug!(
            "condition '{}': {} fields, {} field nodes, {} teams, {} eligible pairs",
            condition.tour_name,
            condition.fields.len(),
            condition.field_nodes.len(),
            condition.teams.len(),
            condition.pairs.len()
        );

        Ok(condition)
    }

    /// Fails on the first team (by id) without any compatible field slot
    /// or with fewer eligible opponents than it has games to play
    fn check_placeable(&self) -> Result<(), SearchError> {
        for team in &self.teams {
            if self.opening_slots_count(team.id) == 0 || self.team_pairs(team.id).len() < GAMES_PER_TEAM {
                let division = self.division_of(team.id);
                return Err(SearchError::InfeasibleTeam {
                    team: team.name.clone(),
                    division: division.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Slots a team could use on an empty schedule, counting interchangeable field nodes once
    pub fn opening_slots_count(&self, team: TeamId) -> usize {
        self.opening_places(team)
            .iter()
            .map(|(_, slots)| slots.len())
            .sum()
    }

    /// Per distinct compatible field node, the team's slots on an empty schedule
    pub fn opening_places(&self, team: TeamId) -> Vec<(usize, Vec<usize>)> {
        let format = self.division_of(team).format;
        let slots = self.team_slots(team);
        let mut keys = HashSet::new();
        self.compatible_nodes(format)
            .filter(|(_, node)| keys.insert(node.key()))
            .map(|(i, node)| {
                let usable = slots.iter().copied().filter(|&s| node.is_slot_ok(s)).collect();
                (i, usable)
            })
            .collect()
    }

    /// Field nodes able to host games of the given division format
    pub fn compatible_nodes(&self, format: u8) -> impl Iterator<Item = (usize, &FieldNode)> {
        self.field_nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.format() == format)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_nodes(&self) -> &[FieldNode] {
        &self.field_nodes
    }

    pub fn field_node(&self, index: usize) -> &FieldNode {
        &self.field_nodes[index]
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[self.team_index[&id]]
    }

    pub fn division_of(&self, team: TeamId) -> &Division {
        &self.divisions[&self.team(team).division_id]
    }

    pub fn division(&self, id: DivisionId) -> Option<&Division> {
        self.divisions.get(&id)
    }

    pub fn division_teams(&self, division: DivisionId) -> &[TeamId] {
        self.teams_by_division.get(&division).map_or(&[], Vec::as_slice)
    }

    pub fn pairs(&self) -> &[TeamPair] {
        &self.pairs
    }

    pub fn pair(&self, id: PairId) -> &TeamPair {
        &self.pairs[id]
    }

    pub fn division_pairs(&self, division: DivisionId) -> &[PairId] {
        self.pairs_by_division.get(&division).map_or(&[], Vec::as_slice)
    }

    pub fn team_pairs(&self, team: TeamId) -> &[PairId] {
        self.pairs_by_team.get(&team).map_or(&[], Vec::as_slice)
    }

    /// Slots allowed for a team once its wish is applied
    pub fn team_slots(&self, team: TeamId) -> &[usize] {
        self.team_slots.get(&team).map_or(&[], Vec::as_slice)
    }

    pub fn coach_team_count(&self, coach: CoachId) -> usize {
        self.coach_teams.get(&coach).copied().unwrap_or(0)
    }

    pub fn teams_pretty(&self) -> &BTreeMap<TeamId, String> {
        &self.teams_pretty
    }

    /// Games in a complete round, which is also the depth of a finished branch
    pub fn total_games(&self) -> usize {
        self.teams.len() * GAMES_PER_TEAM / 2
    }

    pub fn slot_span(&self, slot: usize) -> (NaiveTime, NaiveTime) {
        slot_span(self.clock_start, self.clock_minutes, slot)
    }
}
