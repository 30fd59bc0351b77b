use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use crate::error::{BrewError, Result};
use crate::models::{MemberId, Round};

/// Query side of the round ledger, the seam the pairing generator depends on.
pub trait PairHistory {
    /// True iff some persisted round in `[as_of - days, as_of]` holds a pair
    /// or triple containing both members. Symmetric in `a`, `b`.
    fn was_paired_within(
        &self,
        a: &MemberId,
        b: &MemberId,
        days: i64,
        as_of: DateTime<Utc>,
    ) -> bool;

    fn last_round(&self) -> Option<&Round>;
}

/// Append-only JSONL ledger, one round per line. Loaded fully at open,
/// flushed on every append; concurrent writers are unsupported by design
/// (one scheduled invocation at a time).
#[derive(Debug)]
pub struct FileHistory {
    path: PathBuf,
    rounds: Vec<Round>,
}

impl FileHistory {
    /// Loads the full ledger. A missing file is an empty ledger; a malformed
    /// line is fatal, since backtracking correctness cannot be guaranteed
    /// over history we cannot read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(BrewError::HistoryCorruption(format!(
                    "{}: {err}",
                    path.display()
                )));
            }
        };

        let mut rounds = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let round = serde_json::from_str::<Round>(line).map_err(|err| {
                BrewError::HistoryCorruption(format!(
                    "{}: line {}: {err}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            rounds.push(round);
        }
        rounds.sort_by_key(|round| round.created_at);

        Ok(Self { path, rounds })
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Durably appends one round. The line is serialized up front and written
    /// in a single call, so a failure leaves the ledger without a partial
    /// record; existing rounds are never rewritten.
    pub fn append(&mut self, round: Round) -> Result<()> {
        let mut line = serde_json::to_string(&round)?;
        line.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        self.rounds.push(round);
        Ok(())
    }
}

impl PairHistory for FileHistory {
    fn was_paired_within(
        &self,
        a: &MemberId,
        b: &MemberId,
        days: i64,
        as_of: DateTime<Utc>,
    ) -> bool {
        let oldest = as_of - Duration::days(days);
        self.rounds
            .iter()
            .filter(|round| round.created_at >= oldest && round.created_at <= as_of)
            .any(|round| {
                round
                    .groups
                    .iter()
                    .any(|group| group.contains(a) && group.contains(b))
            })
    }

    fn last_round(&self) -> Option<&Round> {
        self.rounds.last()
    }
}
