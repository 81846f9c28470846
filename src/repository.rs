use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use crate::error::RepoError;
use crate::schedule::slot_utils::{hm, parse_hm};
use crate::schedule::types::{Coach, Division, PriorGame, Team, Wish};

pub const DIVISIONS_FILE: &str = "divisions.csv";
pub const COACHES_FILE: &str = "coaches.csv";
pub const TEAMS_FILE: &str = "teams.csv";
pub const STADIUMS_FILE: &str = "stadiums.csv";
pub const GAMES_FILE: &str = "games.csv";
pub const WISHES_FILE: &str = "wishes.csv";

/// Longest game a stadium may declare, in minutes
const MAX_GAME_DURATION: u32 = 150;

/// A venue with a default field layout used to prefill search requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stadium {
    pub id: u32,
    pub name: String,
    pub fields: u32,
    pub format: u8,
    #[serde(with = "hm")]
    pub time_from: NaiveTime,
    #[serde(with = "hm")]
    pub time_to: NaiveTime,
    pub game_dur: u32,
}

/// Everything the repository holds, as served to the front end
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub divisions: Vec<Division>,
    pub coaches: Vec<Coach>,
    pub teams: Vec<Team>,
    pub stadiums: Vec<Stadium>,
    pub games: Vec<PriorGame>,
    pub wishes: Vec<Wish>,
}

/// Read-only access to the reference CSV files in one directory
#[derive(Debug, Clone)]
pub struct Repository {
    data_dir: PathBuf,
}

/// A data row with its line number in the source file
struct Row {
    line: u64,
    record: StringRecord,
}

impl Row {
    fn get(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or("")
    }

    /// Parses a required column
    fn parse<T: FromStr>(&self, index: usize, column: &str) -> Result<T, String> {
        let raw = self.get(index);
        if raw.is_empty() {
            return Err(format!("missing {}", column));
        }
        raw.parse().map_err(|_| format!("invalid {} '{}'", column, raw))
    }

    fn time(&self, index: usize, column: &str) -> Result<Option<NaiveTime>, String> {
        let raw = self.get(index);
        if raw.is_empty() {
            return Ok(None);
        }
        parse_hm(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid {} '{}', expected HH:MM", column, raw))
    }
}

/// Parses a boolean value from various string representations
fn parse_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower == "yes" || lower == "true" || lower == "1"
}

impl Repository {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self { data_dir: data_dir.as_ref().to_path_buf() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reads the data rows of a file, skipping blank lines and an `id` header row
    fn read_rows(&self, file: &str) -> Result<Vec<Row>, RepoError> {
        let path = self.data_dir.join(file);
        let display = path.display().to_string();
        let handle = File::open(&path).map_err(|source| RepoError::Io { path: display.clone(), source })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(handle);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|source| RepoError::Csv { path: display.clone(), source })?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.get(0).is_some_and(|h| h.eq_ignore_ascii_case("id")) {
                continue;
            }
            let line = record.position().map_or(0, |p| p.line());
            rows.push(Row { line, record });
        }
        Ok(rows)
    }

    /// Like `read_rows`, treating a missing file as empty
    fn read_optional_rows(&self, file: &str) -> Result<Vec<Row>, RepoError> {
        if !self.data_dir.join(file).exists() {
            return Ok(Vec::new());
        }
        self.read_rows(file)
    }

    fn parse_rows<T>(
        &self,
        file: &str,
        rows: Vec<Row>,
        parse: impl Fn(&Row) -> Result<T, String>,
    ) -> Result<Vec<T>, RepoError> {
        rows.iter()
            .map(|row| {
                parse(row).map_err(|reason| RepoError::Row {
                    path: self.data_dir.join(file).display().to_string(),
                    line: row.line,
                    reason,
                })
            })
            .collect()
    }

    pub fn divisions(&self) -> Result<Vec<Division>, RepoError> {
        let rows = self.read_rows(DIVISIONS_FILE)?;
        self.parse_rows(DIVISIONS_FILE, rows, |row| {
            let format: u8 = row.parse(2, "format")?;
            if !(3..=7).contains(&format) {
                return Err(format!("format {} must be from 3 to 7", format));
            }
            Ok(Division { id: row.parse(0, "id")?, name: row.get(1).to_string(), format })
        })
    }

    pub fn coaches(&self) -> Result<Vec<Coach>, RepoError> {
        let rows = self.read_rows(COACHES_FILE)?;
        self.parse_rows(COACHES_FILE, rows, |row| {
            Ok(Coach { id: row.parse(0, "id")?, name: row.get(1).to_string() })
        })
    }

    pub fn teams(&self) -> Result<Vec<Team>, RepoError> {
        let rows = self.read_rows(TEAMS_FILE)?;
        self.parse_rows(TEAMS_FILE, rows, |row| {
            Ok(Team {
                id: row.parse(0, "id")?,
                name: row.get(1).to_string(),
                coach_id: row.parse(2, "coach_id")?,
                division_id: row.parse(3, "division_id")?,
            })
        })
    }

    pub fn stadiums(&self) -> Result<Vec<Stadium>, RepoError> {
        let rows = self.read_rows(STADIUMS_FILE)?;
        self.parse_rows(STADIUMS_FILE, rows, |row| {
            let game_dur: u32 = row.parse(6, "game_dur")?;
            if game_dur == 0 || game_dur > MAX_GAME_DURATION {
                return Err(format!("game_dur {} must be from 1 to {}", game_dur, MAX_GAME_DURATION));
            }
            let time_from = row.time(4, "time_from")?.ok_or("missing time_from")?;
            let time_to = row.time(5, "time_to")?.ok_or("missing time_to")?;
            if time_from >= time_to {
                return Err("time_from must be before time_to".to_string());
            }
            Ok(Stadium {
                id: row.parse(0, "id")?,
                name: row.get(1).to_string(),
                fields: row.parse(2, "fields")?,
                format: row.parse(3, "format")?,
                time_from,
                time_to,
                game_dur,
            })
        })
    }

    pub fn stadium(&self, id: u32) -> Result<Stadium, RepoError> {
        self.stadiums()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(RepoError::UnknownStadium(id))
    }

    /// Games of earlier rounds; an absent file means none were played
    pub fn games(&self) -> Result<Vec<PriorGame>, RepoError> {
        let rows = self.read_optional_rows(GAMES_FILE)?;
        self.parse_rows(GAMES_FILE, rows, |row| {
            Ok(PriorGame {
                tour: row.get(1).to_string(),
                team_id_1: row.parse(2, "team_id_1")?,
                team_id_2: row.parse(3, "team_id_2")?,
                can_rematch: parse_bool(row.get(4)),
            })
        })
    }

    /// Standing time wishes; an absent file means none
    pub fn wishes(&self) -> Result<Vec<Wish>, RepoError> {
        let rows = self.read_optional_rows(WISHES_FILE)?;
        self.parse_rows(WISHES_FILE, rows, |row| {
            let from = row.time(2, "time_from")?;
            let to = row.time(3, "time_to")?;
            if from.is_none() && to.is_none() {
                return Err("a wish needs time_from or time_to".to_string());
            }
            Ok(Wish { team_id: row.parse(1, "team_id")?, from, to })
        })
    }

    pub fn reference(&self) -> Result<Reference, RepoError> {
        Ok(Reference {
            divisions: self.divisions()?,
            coaches: self.coaches()?,
            teams: self.teams()?,
            stadiums: self.stadiums()?,
            games: self.games()?,
            wishes: self.wishes()?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A data directory holding the four-team reference set
    pub fn sample_repo() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| fs::write(dir.path().join(name), body).unwrap();
        write(DIVISIONS_FILE, "id,name,format\n1,U9,3\n2,U13,7\n");
        write(COACHES_FILE, "id,name\n1,Ivanov\n2,Petrov\n3,Sidorov\n4,Smirnov\n");
        write(
            TEAMS_FILE,
            "id,name,coach_id,division_id\n1,Lions,1,1\n2,Tigers,2,1\n3,Bears,3,1\n4,Wolves,4,1\n5,Eagles,1,2\n",
        );
        write(
            STADIUMS_FILE,
            "id,name,fields,format,time_from,time_to,game_dur\n1,Central,2,3,09:00,12:00,30\n",
        );
        write(GAMES_FILE, "id,tour,team_id_1,team_id_2,can_rematch\n1,Tour 0,1,4,no\n");
        let repo = Repository::new(dir.path());
        (dir, repo)
    }

    #[test]
    fn loads_every_file() {
        let (_dir, repo) = sample_repo();
        let reference = repo.reference().unwrap();

        assert_eq!(reference.divisions.len(), 2);
        assert_eq!(reference.divisions[1].format, 7);
        assert_eq!(reference.coaches[3].name, "Smirnov");
        assert_eq!(reference.teams[4], Team { id: 5, name: "Eagles".into(), coach_id: 1, division_id: 2 });
        assert_eq!(reference.stadiums[0].game_dur, 30);
        assert_eq!(reference.games[0].key(), (1, 4));
        assert!(!reference.games[0].can_rematch);
        // no wishes file
        assert!(reference.wishes.is_empty());
    }

    #[test]
    fn malformed_row_reports_file_and_line() {
        let (dir, repo) = sample_repo();
        fs::write(dir.path().join(TEAMS_FILE), "id,name,coach_id,division_id\n1,Lions,1,1\n2,Tigers,x,1\n").unwrap();

        match repo.teams() {
            Err(RepoError::Row { path, line, reason }) => {
                assert!(path.ends_with(TEAMS_FILE));
                assert_eq!(line, 3);
                assert!(reason.contains("coach_id"));
            }
            other => panic!("expected a row error, got {:?}", other),
        }
    }

    #[test]
    fn stadium_duration_and_wish_bounds_are_checked() {
        let (dir, repo) = sample_repo();
        fs::write(dir.path().join(STADIUMS_FILE), "1,Central,2,3,09:00,12:00,200\n").unwrap();
        assert!(matches!(repo.stadiums(), Err(RepoError::Row { .. })));

        fs::write(dir.path().join(WISHES_FILE), "id,team_id,time_from,time_to\n1,2,,\n").unwrap();
        assert!(matches!(repo.wishes(), Err(RepoError::Row { .. })));

        fs::write(dir.path().join(WISHES_FILE), "1,2,10:00,\n").unwrap();
        let wishes = repo.wishes().unwrap();
        assert_eq!(wishes[0].from, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(wishes[0].to, None);
    }

    #[test]
    fn missing_required_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new(dir.path());
        assert!(matches!(repo.divisions(), Err(RepoError::Io { .. })));
        assert!(matches!(repo.stadium(1), Err(RepoError::Io { .. })));
    }

    #[test]
    fn unknown_stadium() {
        let (_dir, repo) = sample_repo();
        assert!(matches!(repo.stadium(9), Err(RepoError::UnknownStadium(9))));
    }
}
