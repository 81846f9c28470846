use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::slot_utils::{hm_opt, slot_span};

pub type TeamId = u32;
pub type CoachId = u32;
pub type DivisionId = u32;
pub type PairId = usize;

/// Format value of a division playing on paired fields
pub const WIDE_FORMAT: u8 = 7;

/// Number of games every team plays in a round
pub const GAMES_PER_TEAM: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub coach_id: CoachId,
    pub division_id: DivisionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    pub id: DivisionId,
    pub name: String,
    /// Match format / team size class, 3 to 7
    pub format: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coach {
    pub id: CoachId,
    pub name: String,
}

/// Preferred time window of a team, either bound may be absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wish {
    pub team_id: TeamId,
    #[serde(with = "hm_opt", default)]
    pub from: Option<NaiveTime>,
    #[serde(with = "hm_opt", default)]
    pub to: Option<NaiveTime>,
}

impl Wish {
    /// Whether the whole slot lies inside the wished window
    pub fn allows(&self, clock_start: NaiveTime, duration_minutes: u32, slot: usize) -> bool {
        let (from, to) = slot_span(clock_start, duration_minutes, slot);
        if let Some(wish_from) = self.from {
            if wish_from > from {
                return false;
            }
        }
        if let Some(wish_to) = self.to {
            if wish_to < to {
                return false;
            }
        }
        true
    }
}

/// A game played in an earlier round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorGame {
    pub team_id_1: TeamId,
    pub team_id_2: TeamId,
    #[serde(default)]
    pub tour: String,
    /// Recorded but not honoured: any prior game blocks a rematch
    #[serde(default)]
    pub can_rematch: bool,
}

impl PriorGame {
    /// Team ids ordered low to high
    pub fn key(&self) -> (TeamId, TeamId) {
        ordered(self.team_id_1, self.team_id_2)
    }
}

/// Two teams of one division that may play each other in this round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPair {
    pub team_1: TeamId,
    pub team_2: TeamId,
    pub coach_1: CoachId,
    pub coach_2: CoachId,
    pub division_id: DivisionId,
}

impl TeamPair {
    pub fn contains(&self, team: TeamId) -> bool {
        self.team_1 == team || self.team_2 == team
    }

    pub fn teams(&self) -> [TeamId; 2] {
        [self.team_1, self.team_2]
    }

    pub fn coaches(&self) -> [CoachId; 2] {
        [self.coach_1, self.coach_2]
    }
}

pub fn ordered(a: TeamId, b: TeamId) -> (TeamId, TeamId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
