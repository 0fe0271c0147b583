//! syslogdb - message logging data warehouse CLI
//!
//! Ingests log messages into the star schema and runs the named queries
//! against it. Every command prints one JSON result envelope on stdout and
//! exits non-zero when the operation failed.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/syslogdb/messages.db (~/.local/share/syslogdb/messages.db)
//! - Logs: $XDG_STATE_HOME/syslogdb/syslogdb.log (~/.local/state/syslogdb/syslogdb.log)
//! - Config: $XDG_CONFIG_HOME/syslogdb/config.toml (~/.config/syslogdb/config.toml)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use syslogdb_core::{
    parse_message_time, Config, Conditions, Envelope, LogLevel, LogMessage, MessageOrigin,
    MessageWarehouse,
};

#[derive(Parser)]
#[command(name = "syslogdb")]
#[command(about = "Store and query log messages in a star-schema warehouse")]
#[command(version)]
struct Args {
    /// Database file (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Optional time bounds, both exclusive
#[derive(ClapArgs, Debug, Default)]
struct Window {
    /// Only messages strictly after this time
    #[arg(long, value_parser = parse_time)]
    from: Option<DateTime<Utc>>,

    /// Only messages strictly before this time
    #[arg(long, value_parser = parse_time)]
    to: Option<DateTime<Utc>>,
}

/// One or more values to match, with optional time bounds
#[derive(ClapArgs, Debug)]
struct Lookup {
    /// Value(s) to match; several values match any of them
    #[arg(required = true)]
    values: Vec<String>,

    #[command(flatten)]
    window: Window,
}

#[derive(Subcommand)]
enum Command {
    /// Store one message
    Ingest(IngestArgs),

    /// Store messages from a JSON lines file ("-" reads stdin)
    IngestFile {
        path: PathBuf,
    },

    /// Messages in a time window (the last 24 hours by default)
    ByDate(Window),

    /// Messages from the given site(s)
    BySite(Lookup),

    /// Messages owned by the given user DN(s)
    ByUser(Lookup),

    /// Messages owned by the given group(s)
    ByGroup(Lookup),

    /// Messages with the given fixed text(s)
    ByFixedText(Lookup),

    /// Messages emitted by the given node(s)
    ByNode(Lookup),

    /// Arbitrary fields matching arbitrary conditions
    Messages {
        /// Field to return (repeatable, default set when omitted)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Condition FIELD=VALUE (repeatable, repeats of a field match any value)
        #[arg(long = "where", value_parser = parse_condition)]
        conditions: Vec<(String, String)>,

        #[command(flatten)]
        window: Window,
    },

    /// Count messages matching conditions
    Count {
        /// Condition FIELD=VALUE (repeatable, repeats of a field match any value)
        #[arg(long = "where", value_parser = parse_condition)]
        conditions: Vec<(String, String)>,

        #[command(flatten)]
        window: Window,
    },

    /// List the distinct values of a dimension
    List {
        #[arg(value_enum)]
        kind: ListKind,
    },
}

#[derive(ClapArgs, Debug)]
struct IngestArgs {
    /// Severity (ALWAYS, FATAL, EXCEPT, ERROR, WARN, INFO, VERBOSE, DEBUG)
    #[arg(long, value_parser = parse_level)]
    level: LogLevel,

    /// Constant part of the message
    #[arg(long)]
    fixed_text: String,

    /// Per-occurrence part of the message
    #[arg(long, default_value = "")]
    variable_text: String,

    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    sub_system: Option<String>,

    #[arg(long)]
    site: Option<String>,

    /// Fully qualified name of the emitting node
    #[arg(long)]
    node: String,

    #[arg(long)]
    user_dn: String,

    #[arg(long)]
    group: String,

    /// Remote address the message came from
    #[arg(long)]
    address: String,

    /// Emission time (now when omitted)
    #[arg(long, value_parser = parse_time)]
    time: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListKind {
    Sites,
    Systems,
    Subsystems,
    Groups,
    FixedTexts,
}

/// One line of an ingestion file
#[derive(Debug, Deserialize)]
struct IngestRecord {
    message: LogMessage,
    origin: MessageOrigin,
}

/// Accepts "YYYY-MM-DD HH:MM:SS" (UTC) or RFC 3339
fn parse_time(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Some(ts) = parse_message_time(s) {
        return Ok(ts);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| format!("invalid time '{}', expected YYYY-MM-DD HH:MM:SS or RFC 3339", s))
}

fn parse_level(s: &str) -> std::result::Result<LogLevel, String> {
    s.to_ascii_uppercase().parse()
}

fn parse_condition(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, value)) if !field.is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid condition '{}', expected FIELD=VALUE", s)),
    }
}

/// Fold FIELD=VALUE pairs into a condition map; a repeated field becomes a list
fn build_conditions(pairs: Vec<(String, String)>) -> Conditions {
    let mut conditions = Conditions::new();
    for (field, value) in pairs {
        let value = serde_json::Value::String(value);
        match conditions.get_mut(&field) {
            None => {
                conditions.insert(field, value);
            }
            Some(serde_json::Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = serde_json::Value::Array(vec![first, value]);
            }
        }
    }
    conditions
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.db {
        config.database.path = Some(path);
    }

    let _log_guard =
        syslogdb_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("syslogdb starting");

    let db_path = config.database.resolved_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let warehouse = MessageWarehouse::open(&config.database).context("failed to open database")?;

    let ok = run(&warehouse, args.command)?;

    tracing::info!(ok, "syslogdb finished");
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run one command and print its envelope. Returns whether it succeeded.
fn run(warehouse: &MessageWarehouse, command: Command) -> Result<bool> {
    match command {
        Command::Ingest(ingest) => {
            let message = LogMessage {
                time: ingest.time.unwrap_or_else(Utc::now),
                level: ingest.level,
                fixed_text: ingest.fixed_text,
                variable_text: ingest.variable_text,
                system_name: ingest.system,
                sub_system_name: ingest.sub_system,
            };
            let origin = MessageOrigin {
                site: ingest.site,
                node_fqdn: ingest.node,
                user_dn: ingest.user_dn,
                user_group: ingest.group,
                remote_address: ingest.address,
            };
            emit(warehouse.insert_message(&message, &origin))
        }
        Command::IngestFile { path } => emit_envelope(ingest_file(warehouse, &path)?),
        Command::ByDate(w) => emit(warehouse.get_messages_by_date(w.from, w.to)),
        Command::BySite(l) => {
            emit(warehouse.get_messages_by_site(l.values, l.window.from, l.window.to))
        }
        Command::ByUser(l) => {
            emit(warehouse.get_messages_by_user(l.values, l.window.from, l.window.to))
        }
        Command::ByGroup(l) => {
            emit(warehouse.get_messages_by_group(l.values, l.window.from, l.window.to))
        }
        Command::ByFixedText(l) => {
            emit(warehouse.get_messages_by_fixed_text(l.values, l.window.from, l.window.to))
        }
        Command::ByNode(l) => {
            emit(warehouse.get_messages_by_site_node(l.values, l.window.from, l.window.to))
        }
        Command::Messages {
            fields,
            conditions,
            window,
        } => {
            let conditions = build_conditions(conditions);
            emit(warehouse.get_messages(&fields[..], &conditions, window.from, window.to))
        }
        Command::Count { conditions, window } => {
            let conditions = build_conditions(conditions);
            emit(warehouse.get_count_messages(&conditions, window.from, window.to))
        }
        Command::List { kind } => {
            let rows = match kind {
                ListKind::Sites => warehouse.get_sites(),
                ListKind::Systems => warehouse.get_systems(),
                ListKind::Subsystems => warehouse.get_sub_systems(),
                ListKind::Groups => warehouse.get_groups(),
                ListKind::FixedTexts => warehouse.get_fixed_text_strings(),
            };
            emit(rows)
        }
    }
}

/// Ingest every line of a JSON lines file, stopping at the first failure.
///
/// The value is the number of messages stored.
fn ingest_file(warehouse: &MessageWarehouse, path: &Path) -> Result<Envelope<usize>> {
    let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut stored = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;

        let record: IngestRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Malformed ingestion record");
                return Ok(failed(line_no, stored, "ConfigurationError", e.to_string()));
            }
        };

        if let Err(e) = warehouse.insert_message(&record.message, &record.origin) {
            return Ok(failed(line_no, stored, e.kind().as_str(), e.to_string()));
        }
        stored += 1;
    }

    tracing::info!(path = %path.display(), stored, "Ingested message file");
    Ok(Envelope::ok(stored))
}

fn failed(line_no: usize, stored: usize, kind: &str, message: String) -> Envelope<usize> {
    Envelope {
        kind: Some(kind.to_string()),
        ..Envelope::error(format!(
            "line {}: {} ({} message(s) stored before the failure)",
            line_no, message, stored
        ))
    }
}

fn emit<T: Serialize>(result: syslogdb_core::Result<T>) -> Result<bool> {
    emit_envelope(Envelope::from(result))
}

/// Print the envelope as one JSON line
fn emit_envelope<T: Serialize>(envelope: Envelope<T>) -> Result<bool> {
    let rendered = serde_json::to_string(&envelope).context("failed to render result")?;
    println!("{}", rendered);
    if let Some(message) = &envelope.message {
        tracing::warn!(kind = ?envelope.kind, message = %message, "Command failed");
    }
    Ok(envelope.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_condition() {
        assert_eq!(
            parse_condition("SiteName=LCG.CERN.ch").unwrap(),
            ("SiteName".to_string(), "LCG.CERN.ch".to_string())
        );
        // Only the first '=' separates
        assert_eq!(
            parse_condition("FixedTextString=a=b").unwrap().1,
            "a=b".to_string()
        );
        assert!(parse_condition("SiteName").is_err());
        assert!(parse_condition("=x").is_err());
    }

    #[test]
    fn test_repeated_field_becomes_list() {
        let conditions = build_conditions(vec![
            ("SiteName".into(), "CERN".into()),
            ("LogLevel".into(), "ERROR".into()),
            ("SiteName".into(), "PIC".into()),
            ("SiteName".into(), "RAL".into()),
        ]);
        assert_eq!(conditions["SiteName"], json!(["CERN", "PIC", "RAL"]));
        assert_eq!(conditions["LogLevel"], json!("ERROR"));
    }

    #[test]
    fn test_parse_time_formats() {
        let a = parse_time("2024-03-01 10:00:00").unwrap();
        let b = parse_time("2024-03-01T11:00:00+01:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("error").unwrap(), LogLevel::Error);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
