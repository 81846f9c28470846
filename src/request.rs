use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RepoError;
use crate::repository::Repository;
use crate::schedule::condition::SearchInput;
use crate::schedule::field::FieldSpec;
use crate::schedule::types::{PriorGame, TeamId, Wish};

/// Body of a search start call: field layout and selection made on the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStartRequest {
    pub tour_name: String,
    pub stadium_id: u32,
    pub fields: Vec<FieldSpec>,
    pub teams: Vec<TeamId>,
    #[serde(default)]
    pub wishes: Vec<Wish>,
    #[serde(default)]
    pub games: Vec<PriorGame>,
}

impl SearchStartRequest {
    /// Completes the request with divisions, coaches and team records from the repository
    pub fn resolve(&self, repo: &Repository) -> Result<SearchInput, RepoError> {
        // the stadium only has to exist; the request carries its own field layout
        repo.stadium(self.stadium_id)?;

        let all_teams = repo.teams()?;
        let known: HashSet<TeamId> = all_teams.iter().map(|t| t.id).collect();
        if let Some(&missing) = self.teams.iter().find(|id| !known.contains(id)) {
            return Err(RepoError::UnknownTeam(missing));
        }
        let selected: HashSet<TeamId> = self.teams.iter().copied().collect();
        let teams = all_teams.into_iter().filter(|t| selected.contains(&t.id)).collect();

        Ok(SearchInput {
            tour_name: self.tour_name.clone(),
            fields: self.fields.clone(),
            divisions: repo.divisions()?,
            coaches: repo.coaches()?,
            teams,
            wishes: self.wishes.clone(),
            games: self.games.clone(),
        })
    }
}
