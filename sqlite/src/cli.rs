//! Commands of the `datastore` tool.

use crate::error::{AppError, Result};
use datastore_engine::{
    KvBackend, MergeEngine, MutationOutbox, Pagination, QueryOne, Record, StoreName,
};
use std::io::Write;
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: datastore <command>

commands:
  hydrate <store> <file.json>    bulk-load a JSON array of records
  list <store> [page] [limit]    print records as JSON lines
  first <store>                  print the first indexed record
  last <store>                   print the last indexed record
  get <store> <id>               print one record
  clear                          remove every datastore key";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hydrate { store: StoreName, file: PathBuf },
    List { store: StoreName, pagination: Pagination },
    One { store: StoreName, which: QueryOne },
    Get { store: StoreName, id: String },
    Clear,
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["hydrate", store, file] => Ok(Command::Hydrate {
                store: store.to_string(),
                file: PathBuf::from(*file),
            }),
            ["list", store, rest @ ..] if rest.len() <= 2 => {
                let page = parse_number(rest.first().copied(), "page")?;
                let limit = parse_number(rest.get(1).copied(), "limit")?;
                Ok(Command::List {
                    store: store.to_string(),
                    pagination: Pagination::new(page, limit),
                })
            }
            ["first", store] => Ok(Command::One {
                store: store.to_string(),
                which: QueryOne::First,
            }),
            ["last", store] => Ok(Command::One {
                store: store.to_string(),
                which: QueryOne::Last,
            }),
            ["get", store, id] => Ok(Command::Get {
                store: store.to_string(),
                id: id.to_string(),
            }),
            ["clear"] => Ok(Command::Clear),
            _ => Err(AppError::Usage(USAGE.to_string())),
        }
    }

    /// Run the command, writing results to `out`.
    pub async fn run<B, O, W>(&self, engine: &MergeEngine<B, O>, out: &mut W) -> Result<()>
    where
        B: KvBackend,
        O: MutationOutbox,
        W: Write,
    {
        let storage = engine.storage();
        match self {
            Command::Hydrate { store, file } => {
                let contents = tokio::fs::read_to_string(file).await?;
                let records: Vec<Record> = serde_json::from_str(&contents)?;

                let merged = engine.merge_page(store, &records).await?;
                let repair = storage.persistent().reindex(store).await?;

                tracing::info!(
                    store = %store,
                    written = merged.written.len(),
                    skipped = merged.skipped_tombstones,
                    "Hydrated store"
                );
                writeln!(
                    out,
                    "{store}: {} written, {} tombstones skipped, {} indexed",
                    merged.written.len(),
                    merged.skipped_tombstones,
                    repair.appended
                )?;
            }
            Command::List { store, pagination } => {
                for record in storage.get_all(store, Some(*pagination)).await? {
                    writeln!(out, "{}", serde_json::to_string(&record)?)?;
                }
            }
            Command::One { store, which } => {
                if let Some(record) = storage.get_one(*which, store).await? {
                    writeln!(out, "{}", serde_json::to_string(&record)?)?;
                }
            }
            Command::Get { store, id } => match storage.get(id, store).await? {
                Some(record) => writeln!(out, "{}", serde_json::to_string(&record)?)?,
                None => return Err(AppError::NotFound(format!("{store}/{id}"))),
            },
            Command::Clear => {
                storage.clear().await?;
                writeln!(out, "cleared")?;
            }
        }
        Ok(())
    }
}

fn parse_number(arg: Option<&str>, name: &str) -> Result<usize> {
    match arg {
        Some(value) => value
            .parse()
            .map_err(|_| AppError::Usage(format!("invalid {name}: {value}"))),
        None => Ok(0),
    }
}
