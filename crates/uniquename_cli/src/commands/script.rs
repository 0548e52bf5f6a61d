//! Script parsing.
//!
//! One command per line. Blank lines and lines starting with `#` are
//! ignored.
//!
//! ```text
//! take <name> <owner> [+ttl_ms|epoch_ms]
//! lookup <name>
//! transfer <name> <from> <to> [+ttl_ms|epoch_ms]
//! release <name>
//! list
//! ```

use thiserror::Error;

/// A script line that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with it.
    pub message: String,
}

/// Requested expiration of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never expires.
    Never,
    /// Expires this many milliseconds after the command runs.
    After(u64),
    /// Expires at this epoch time in milliseconds.
    At(u64),
}

impl Expiry {
    /// Resolves to an absolute expiration time.
    pub fn resolve(self, now_millis: u64) -> Option<u64> {
        match self {
            Expiry::Never => None,
            Expiry::After(ttl) => Some(now_millis.saturating_add(ttl)),
            Expiry::At(epoch) => Some(epoch),
        }
    }

    fn parse(token: Option<&str>) -> Result<Self, String> {
        let Some(token) = token else {
            return Ok(Expiry::Never);
        };
        let (relative, digits) = match token.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid expiration {token:?}"))?;
        Ok(if relative {
            Expiry::After(value)
        } else {
            Expiry::At(value)
        })
    }
}

/// A parsed script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim a name.
    Take {
        /// Name to claim.
        name: String,
        /// Claiming owner.
        owner: String,
        /// Requested expiration.
        expiry: Expiry,
    },
    /// Show a name's record.
    Lookup {
        /// Name to look up.
        name: String,
    },
    /// Move a name between owners.
    Transfer {
        /// Name to move.
        name: String,
        /// Current owner.
        from: String,
        /// New owner.
        to: String,
        /// Expiration for the new owner.
        expiry: Expiry,
    },
    /// Delete a name's record.
    Release {
        /// Name to release.
        name: String,
    },
    /// Show every record.
    List,
}

/// Parses one line. Returns `None` for blank lines and comments.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Command>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let err = |message: String| ScriptError {
        line: line_no,
        message,
    };
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let owned = |i: usize| tokens[i].to_string();

    let command = match tokens.as_slice() {
        ["take", _, _] | ["take", _, _, _] => Command::Take {
            name: owned(1),
            owner: owned(2),
            expiry: Expiry::parse(tokens.get(3).copied()).map_err(err)?,
        },
        ["lookup", _] => Command::Lookup { name: owned(1) },
        ["transfer", _, _, _] | ["transfer", _, _, _, _] => Command::Transfer {
            name: owned(1),
            from: owned(2),
            to: owned(3),
            expiry: Expiry::parse(tokens.get(4).copied()).map_err(err)?,
        },
        ["release", _] => Command::Release { name: owned(1) },
        ["list"] => Command::List,
        [verb @ ("take" | "lookup" | "transfer" | "release" | "list"), ..] => {
            return Err(err(format!("wrong number of arguments for {verb}")));
        }
        [verb, ..] => return Err(err(format!("unknown command {verb:?}"))),
        [] => return Ok(None),
    };
    Ok(Some(command))
}
