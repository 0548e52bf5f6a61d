//! Run command implementation.

use super::script::{parse_line, Command};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;
use uniquename_core::{Canonicalizer, OwnershipRecord, RegistryConfig, UniqueNames};
use uniquename_store::MemoryStore;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One human-readable line per command.
    Text,
    /// One JSON object per command.
    Json,
}

impl Format {
    /// Parses a `--format` value. Anything but `json` is text.
    pub fn from_arg(value: &str) -> Self {
        match value {
            "json" => Format::Json,
            _ => Format::Text,
        }
    }
}

/// Registry settings taken from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Registry directory.
    pub directory: String,
    /// Compare names exactly instead of case-folded.
    pub identity: bool,
    /// Refuse transfers from expired owners.
    pub strict_transfers: bool,
    /// Output format.
    pub format: Format,
}

impl RunOptions {
    fn config(&self) -> RegistryConfig {
        let canonicalizer = if self.identity {
            Canonicalizer::identity()
        } else {
            Canonicalizer::lowercase()
        };
        RegistryConfig::default()
            .directory(self.directory.clone())
            .canonicalizer(canonicalizer)
            .strict_transfers(self.strict_transfers)
    }
}

/// A record as shown to the user.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Name as submitted.
    pub name: String,
    /// Owner id.
    pub owner: String,
    /// Expiration, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Whether the claim had lapsed when read.
    pub expired: bool,
}

impl RecordView {
    fn new(record: OwnershipRecord, now_millis: u64) -> Self {
        Self {
            expired: record.is_expired_at(now_millis),
            name: record.raw_name,
            owner: record.owner_id,
            expires_at: record.expires_at,
        }
    }

    fn text(&self) -> String {
        let mut out = format!("{} owned by {}", self.name, self.owner);
        if let Some(end) = self.expires_at {
            out.push_str(&format!(" until {end}"));
        }
        if self.expired {
            out.push_str(" (expired)");
        }
        out
    }
}

/// Result of one script command.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outcome {
    /// Result of `take`.
    Take {
        /// Requested name.
        name: String,
        /// Claiming owner.
        owner: String,
        /// Whether the owner holds the name now.
        success: bool,
    },
    /// Result of `lookup`.
    Lookup {
        /// Requested name.
        name: String,
        /// Stored record, if any.
        record: Option<RecordView>,
    },
    /// Result of `transfer`.
    Transfer {
        /// Requested name.
        name: String,
        /// Previous owner.
        from: String,
        /// New owner.
        to: String,
        /// Whether `to` holds the name now.
        success: bool,
    },
    /// Result of `release`.
    Release {
        /// Released name.
        name: String,
    },
    /// Result of `list`.
    List {
        /// Every stored record.
        records: Vec<RecordView>,
    },
}

impl Outcome {
    fn text(&self) -> String {
        let verdict = |success: bool| if success { "ok" } else { "refused" };
        match self {
            Outcome::Take {
                name,
                owner,
                success,
            } => format!("take {name} {owner}: {}", verdict(*success)),
            Outcome::Lookup { name, record } => match record {
                Some(record) => format!("lookup {name}: {}", record.text()),
                None => format!("lookup {name}: available"),
            },
            Outcome::Transfer {
                name,
                from,
                to,
                success,
            } => format!("transfer {name} {from} -> {to}: {}", verdict(*success)),
            Outcome::Release { name } => format!("release {name}: ok"),
            Outcome::List { records } => {
                let mut out = format!("list: {} record(s)", records.len());
                for record in records {
                    out.push_str("\n  ");
                    out.push_str(&record.text());
                }
                out
            }
        }
    }
}

/// Counts of what a script did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Commands executed.
    pub commands: usize,
    /// `take` and `transfer` commands that returned false.
    pub refused: usize,
}

/// Executes one command.
pub fn execute(
    names: &UniqueNames<MemoryStore>,
    command: Command,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let now = names.config().clock.now_millis();
    debug!(?command, "executing");

    let outcome = match command {
        Command::Take {
            name,
            owner,
            expiry,
        } => {
            let success = names.take(&name, &owner, expiry.resolve(now))?;
            Outcome::Take {
                name,
                owner,
                success,
            }
        }
        Command::Lookup { name } => {
            let record = names
                .entity_for_name(&name)?
                .map(|record| RecordView::new(record, now));
            Outcome::Lookup { name, record }
        }
        Command::Transfer {
            name,
            from,
            to,
            expiry,
        } => {
            let success = names.change_owner(&name, &from, &to, expiry.resolve(now))?;
            Outcome::Transfer {
                name,
                from,
                to,
                success,
            }
        }
        Command::Release { name } => {
            names.remove_name(&name)?;
            Outcome::Release { name }
        }
        Command::List => Outcome::List {
            records: names
                .entries()?
                .into_iter()
                .map(|record| RecordView::new(record, now))
                .collect(),
        },
    };
    Ok(outcome)
}

/// Runs a script against a fresh in-memory registry.
///
/// Stops at the first line that fails to parse or execute.
pub fn run<R: BufRead, W: Write>(
    input: R,
    options: &RunOptions,
    out: &mut W,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let names = UniqueNames::open(MemoryStore::new(), options.config())?;
    let mut summary = RunSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let Some(command) = parse_line(index + 1, &line)? else {
            continue;
        };

        let outcome = execute(&names, command)?;
        summary.commands += 1;
        if matches!(
            outcome,
            Outcome::Take { success: false, .. } | Outcome::Transfer { success: false, .. }
        ) {
            summary.refused += 1;
        }

        match options.format {
            Format::Json => writeln!(out, "{}", serde_json::to_string(&outcome)?)?,
            Format::Text => writeln!(out, "{}", outcome.text())?,
        }
    }

    debug!(commands = summary.commands, refused = summary.refused, "script finished");
    Ok(summary)
}

/// Runs a script file, or stdin when `path` is `None` or `-`.
pub fn run_path(
    path: Option<&Path>,
    options: &RunOptions,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .map_err(|e| format!("cannot open script {}: {e}", path.display()))?;
            run(BufReader::new(file), options, &mut out)
        }
        _ => run(io::stdin().lock(), options, &mut out),
    }
}
