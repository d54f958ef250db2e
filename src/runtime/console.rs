//! Operator console: parses command lines and executes them against an
//! organization.
//!
//! Grammar (fields after the first comma are comma-separated groups):
//!
//! ```text
//! completeMissions
//! incompleteMissions
//! sergeants
//! warehouse
//! addMission <name> <skill> <duration>, [<item> <amount> ...], [<prerequisite> ...]
//! addSergeant <name> <threads> <max-missions>, <skill> [<skill> ...], <work-hours> <priority>
//! addItem <name> <amount>
//! stop
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::builders::Organization;
use crate::config::SergeantConfig;
use crate::core::{
    normalize_items, BoardError, DispatchError, Item, MissionSpec, PendingMission,
    PriorityPolicy, SergeantReport, ShutdownReport, StockSnapshot,
};

/// Console failures. None of them stop the system.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The first word is not a known command.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// The command's arguments could not be parsed.
    #[error("malformed {command}: {reason}")]
    Malformed {
        /// Command word.
        command: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// The organization refused the operation.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List DONE missions.
    CompleteMissions,
    /// List missions that are not DONE.
    IncompleteMissions,
    /// List sergeants and their missions.
    Sergeants,
    /// List warehouse stock and loans.
    Warehouse,
    /// Create a mission; prerequisites are given by name.
    AddMission {
        /// Mission name.
        name: String,
        /// Required skill.
        skill: String,
        /// Total work hours.
        duration: u32,
        /// Item requirements.
        items: Vec<Item>,
        /// Prerequisite names.
        prerequisites: Vec<String>,
    },
    /// Register a sergeant.
    AddSergeant(SergeantConfig),
    /// Add warehouse stock.
    AddItem {
        /// Item name.
        name: String,
        /// Units to add.
        amount: u32,
    },
    /// Shut the organization down.
    Stop,
}

impl Command {
    /// Whether this command ends the console session.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

fn malformed(command: &'static str, reason: impl Into<String>) -> ConsoleError {
    ConsoleError::Malformed {
        command,
        reason: reason.into(),
    }
}

fn number<T: FromStr>(command: &'static str, field: &str, raw: Option<&str>) -> Result<T, ConsoleError>
where
    T::Err: fmt::Display,
{
    let raw = raw.ok_or_else(|| malformed(command, format!("missing {field}")))?;
    raw.parse()
        .map_err(|e| malformed(command, format!("{field} `{raw}`: {e}")))
}

fn word(command: &'static str, field: &str, raw: Option<&str>) -> Result<String, ConsoleError> {
    raw.map(str::to_string)
        .ok_or_else(|| malformed(command, format!("missing {field}")))
}

fn parse_items(command: &'static str, group: &str) -> Result<Vec<Item>, ConsoleError> {
    let words: Vec<&str> = group.split_whitespace().collect();
    if words.len() % 2 != 0 {
        return Err(malformed(command, "items must be <name> <amount> pairs"));
    }
    let items = words
        .chunks(2)
        .map(|pair| Ok(Item::new(pair[0], number(command, "item amount", Some(pair[1]))?)))
        .collect::<Result<Vec<_>, ConsoleError>>()?;
    normalize_items(items).map_err(|e| malformed(command, e.to_string()))
}

fn parse_add_mission(rest: &str) -> Result<Command, ConsoleError> {
    const CMD: &str = "addMission";
    let mut groups = rest.split(',');
    let mut head = groups.next().unwrap_or_default().split_whitespace();
    let name = word(CMD, "name", head.next())?;
    let skill = word(CMD, "skill", head.next())?;
    let duration = number(CMD, "duration", head.next())?;
    let items = parse_items(CMD, groups.next().unwrap_or_default())?;
    let prerequisites = groups
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    Ok(Command::AddMission {
        name,
        skill,
        duration,
        items,
        prerequisites,
    })
}

fn parse_add_sergeant(rest: &str) -> Result<Command, ConsoleError> {
    const CMD: &str = "addSergeant";
    let groups: Vec<&str> = rest.split(',').collect();
    if groups.len() != 3 {
        return Err(malformed(CMD, "expected three comma-separated groups"));
    }
    let mut head = groups[0].split_whitespace();
    let name = word(CMD, "name", head.next())?;
    let threads = number(CMD, "threads", head.next())?;
    let max_missions = number(CMD, "max missions", head.next())?;
    let mut tail = groups[2].split_whitespace();
    let work_hours = number(CMD, "work hours", tail.next())?;
    let priority: PriorityPolicy = word(CMD, "priority", tail.next())?.parse()?;

    let mut config = SergeantConfig::new(name)
        .with_threads(threads)
        .with_max_missions(max_missions)
        .with_work_hours(work_hours)
        .with_priority(priority);
    for skill in groups[1].split_whitespace() {
        config = config.with_skill(skill);
    }
    Ok(Command::AddSergeant(config))
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match verb {
            "completeMissions" => Ok(Self::CompleteMissions),
            "incompleteMissions" => Ok(Self::IncompleteMissions),
            "sergeants" => Ok(Self::Sergeants),
            "warehouse" => Ok(Self::Warehouse),
            "stop" => Ok(Self::Stop),
            "addMission" => parse_add_mission(rest),
            "addSergeant" => parse_add_sergeant(rest),
            "addItem" => {
                let mut args = rest.split_whitespace();
                Ok(Self::AddItem {
                    name: word("addItem", "name", args.next())?,
                    amount: number("addItem", "amount", args.next())?,
                })
            }
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

/// A DONE mission with the name of the sergeant that finished it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedEntry {
    /// Mission name.
    pub mission: String,
    /// Sergeant name.
    pub sergeant: Option<String>,
}

/// Result of a console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// DONE missions.
    Completed(Vec<CompletedEntry>),
    /// Missions that are not DONE.
    Incomplete(Vec<PendingMission>),
    /// Sergeant roster.
    Sergeants(Vec<SergeantReport>),
    /// Warehouse stock.
    Stock(Vec<StockSnapshot>),
    /// A mission was created.
    MissionAdded(String),
    /// A sergeant was registered.
    SergeantAdded(String),
    /// Stock was added.
    ItemAdded {
        /// Item name.
        name: String,
        /// Units added.
        amount: u32,
    },
    /// The organization shut down.
    Stopped(ShutdownReport),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(entries) => {
                writeln!(f, "Complete missions: {}", entries.len())?;
                for entry in entries {
                    let by = entry.sergeant.as_deref().unwrap_or("-");
                    writeln!(f, "  {} (by {by})", entry.mission)?;
                }
                Ok(())
            }
            Self::Incomplete(missions) => {
                writeln!(f, "Incomplete missions: {}", missions.len())?;
                for m in missions {
                    write!(f, "  {} [{}] remaining {}", m.name, m.status, m.remaining)?;
                    if m.prerequisites.is_empty() {
                        writeln!(f)?;
                    } else {
                        writeln!(f, ", waiting for {}", m.prerequisites.join(", "))?;
                    }
                }
                Ok(())
            }
            Self::Sergeants(roster) => {
                writeln!(f, "Sergeants: {}", roster.len())?;
                for s in roster {
                    writeln!(
                        f,
                        "  {} skills [{}] {} threads, {} max missions, {}h cycles, {}",
                        s.name,
                        s.skills.join(", "),
                        s.stats.worker_count,
                        s.max_missions,
                        s.work_hours,
                        s.priority
                    )?;
                    for m in &s.missions {
                        writeln!(f, "    {} [{}]", m.name, m.status)?;
                    }
                }
                Ok(())
            }
            Self::Stock(items) => {
                writeln!(f, "Warehouse items: {}", items.len())?;
                for item in items {
                    writeln!(
                        f,
                        "  {} {}/{} available, {} waiting",
                        item.name, item.available, item.initial, item.waiting
                    )?;
                    for loan in &item.loans {
                        writeln!(f, "    {} holds {}", loan.borrower, loan.amount)?;
                    }
                }
                Ok(())
            }
            Self::MissionAdded(name) => writeln!(f, "Mission {name} added"),
            Self::SergeantAdded(name) => writeln!(f, "Sergeant {name} added"),
            Self::ItemAdded { name, amount } => writeln!(f, "Added {amount} of {name}"),
            Self::Stopped(report) => {
                writeln!(
                    f,
                    "System terminated: {} queued cycles abandoned{}",
                    report.abandoned,
                    if report.forced { ", running cycles cancelled" } else { "" }
                )?;
                for s in &report.stragglers {
                    writeln!(f, "  {} left {} threads running", s.sergeant, s.threads)?;
                }
                Ok(())
            }
        }
    }
}

/// Executes commands against one organization.
#[derive(Debug, Clone)]
pub struct Console {
    org: Organization,
    grace: Duration,
}

impl Console {
    /// Console over `org`; `stop` waits at most about `grace` per shutdown phase.
    #[must_use]
    pub const fn new(org: Organization, grace: Duration) -> Self {
        Self { org, grace }
    }

    /// Parse and execute one line.
    ///
    /// # Errors
    ///
    /// Any parse or execution error; the organization keeps running.
    pub fn execute_line(&self, line: &str) -> Result<Reply, ConsoleError> {
        let command: Command = line.parse()?;
        self.execute(command)
    }

    /// Execute a parsed command.
    ///
    /// # Errors
    ///
    /// `ConsoleError::Dispatch` when the board, scheduler or warehouse refuses.
    pub fn execute(&self, command: Command) -> Result<Reply, ConsoleError> {
        let Organization {
            warehouse,
            board,
            chief,
        } = &self.org;
        let reply = match command {
            Command::CompleteMissions => Reply::Completed(
                board
                    .completed()
                    .into_iter()
                    .map(|m| CompletedEntry {
                        sergeant: m.completed_by.and_then(|id| chief.sergeant_name(id)),
                        mission: m.name,
                    })
                    .collect(),
            ),
            Command::IncompleteMissions => Reply::Incomplete(board.pending()),
            Command::Sergeants => Reply::Sergeants(chief.roster()),
            Command::Warehouse => Reply::Stock(warehouse.snapshot()),
            Command::AddMission {
                name,
                skill,
                duration,
                items,
                prerequisites,
            } => {
                let mut spec = MissionSpec::new(name.clone(), skill, duration);
                spec.items = items;
                for pre in &prerequisites {
                    let Some(id) = board.find_by_name(pre) else {
                        warn!(mission = %name, prerequisite = %pre, "unknown prerequisite");
                        return Err(DispatchError::from(BoardError::UnknownMission(pre.clone())).into());
                    };
                    spec = spec.with_prerequisite(id);
                }
                board.create_mission(spec).map_err(DispatchError::from)?;
                Reply::MissionAdded(name)
            }
            Command::AddSergeant(config) => {
                chief.add_sergeant(&config)?;
                Reply::SergeantAdded(config.name)
            }
            Command::AddItem { name, amount } => {
                warehouse.add_stock(&name, amount).map_err(DispatchError::from)?;
                Reply::ItemAdded { name, amount }
            }
            Command::Stop => Reply::Stopped(chief.shutdown(self.grace)),
        };
        Ok(reply)
    }
}
