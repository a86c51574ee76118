//! Operator command grammar.
//!
//! ```text
//! watch <owner|all> [threshold_micros]
//! unwatch <owner|all>
//! subscribe
//! unsubscribe
//! timings [reset]
//! owners
//! help
//! ```

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} is not an integer.")]
    NotAnInteger(String),

    #[error("{0} µs is too large a threshold.")]
    ThresholdTooLarge(u64),

    #[error("No matching owners.")]
    NoMatchingOwners,

    #[error("You have to be an observer to {0}.")]
    NotAnObserver(&'static str),
}

const WATCH_USAGE: &str = "watch <owner|all> [threshold_micros]";
const UNWATCH_USAGE: &str = "unwatch <owner|all>";

pub const HELP: &str = "\
watch <owner|all> [threshold_micros]  time an owner's handlers, reporting slow calls
unwatch <owner|all>                   restore an owner's original handlers
subscribe                             receive slow-call notifications
unsubscribe                           stop receiving notifications
timings [reset]                       show or reset collected timings
owners                                list loaded owners
quit                                  stop the host and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// The threshold is kept raw so owners can be resolved before it is
    /// validated.
    Watch {
        owners: String,
        threshold: Option<String>,
    },
    Unwatch {
        owners: String,
    },
    Subscribe,
    Unsubscribe,
    Timings,
    TimingsReset,
    Owners,
    Help,
}

impl OperatorCommand {
    /// Parses a whitespace separated command line. Returns `Ok(None)` for a
    /// blank line.
    pub fn parse_line(line: &str) -> Result<Option<Self>, CommandError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            return Ok(None);
        }
        Self::parse(&args).map(Some)
    }

    pub fn parse(args: &[&str]) -> Result<Self, CommandError> {
        let Some((name, rest)) = args.split_first() else {
            return Err(CommandError::Usage("<command> [args...]"));
        };

        match (name.to_ascii_lowercase().as_str(), rest) {
            ("watch", [owners]) => Ok(Self::Watch {
                owners: owners.to_string(),
                threshold: None,
            }),
            ("watch", [owners, threshold]) => Ok(Self::Watch {
                owners: owners.to_string(),
                threshold: Some(threshold.to_string()),
            }),
            ("watch", _) => Err(CommandError::Usage(WATCH_USAGE)),
            ("unwatch", [owners]) => Ok(Self::Unwatch {
                owners: owners.to_string(),
            }),
            ("unwatch", _) => Err(CommandError::Usage(UNWATCH_USAGE)),
            ("subscribe", []) => Ok(Self::Subscribe),
            ("subscribe", _) => Err(CommandError::Usage("subscribe")),
            ("unsubscribe", []) => Ok(Self::Unsubscribe),
            ("unsubscribe", _) => Err(CommandError::Usage("unsubscribe")),
            ("timings", []) => Ok(Self::Timings),
            ("timings", [sub]) if sub.eq_ignore_ascii_case("reset") => Ok(Self::TimingsReset),
            ("timings", _) => Err(CommandError::Usage("timings [reset]")),
            ("owners", []) => Ok(Self::Owners),
            ("owners", _) => Err(CommandError::Usage("owners")),
            ("help", _) => Ok(Self::Help),
            _ => Err(CommandError::UnknownCommand(name.to_string())),
        }
    }
}

/// A slow-call threshold given in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub micros: u64,
    pub nanos: u64,
}

impl Threshold {
    pub fn parse(arg: &str) -> Result<Self, CommandError> {
        let micros = arg
            .parse::<u64>()
            .map_err(|_| CommandError::NotAnInteger(arg.to_string()))?;
        let nanos = micros
            .checked_mul(1_000)
            .ok_or(CommandError::ThresholdTooLarge(micros))?;
        Ok(Self { micros, nanos })
    }
}
