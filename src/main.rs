//! heapdb command line: run a single operator over a heap file.

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use heapdb::access::schema::{SchemaDescriptor, SchemaItem};
use heapdb::access::tuple::Tuple;
use heapdb::access::value::FieldType;
use heapdb::catalog::TableId;
use heapdb::executor::{
    collect_all, AggregateExecutor, AggregateOp, DeleteExecutor, Executor, InsertExecutor,
    SeqScanExecutor, ValuesExecutor,
};
use heapdb::transaction::TransactionId;
use heapdb::{Database, DatabaseConfig};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// heapdb - heap-file storage with a transactional page cache
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page size in bytes
    #[arg(long, default_value = "4096")]
    page_size: usize,

    /// Number of pages the buffer pool may cache
    #[arg(long, default_value = "50")]
    pool_pages: usize,

    /// Give up on a page lock after this many milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every tuple of a table
    Scan {
        #[command(flatten)]
        table: TableArgs,

        /// Alias used to qualify field names
        #[arg(long)]
        alias: Option<String>,
    },
    /// Insert rows given as comma-separated literals
    Insert {
        #[command(flatten)]
        table: TableArgs,

        /// One row, e.g. `1,alice`; may be repeated
        #[arg(long = "row", required = true)]
        rows: Vec<String>,
    },
    /// Compute one aggregate, optionally grouped by a field
    Aggregate {
        #[command(flatten)]
        table: TableArgs,

        /// Index of the field to aggregate
        #[arg(long)]
        field: usize,

        /// min, max, sum, avg or count
        #[arg(long)]
        op: AggregateOp,

        /// Index of the field to group by
        #[arg(long)]
        group_by: Option<usize>,
    },
    /// Delete every tuple of a table
    DeleteAll {
        #[command(flatten)]
        table: TableArgs,
    },
}

#[derive(clap::Args, Debug)]
struct TableArgs {
    /// Heap file backing the table
    #[arg(short, long)]
    file: PathBuf,

    /// Table layout, e.g. `id:int,name:string`
    #[arg(short, long)]
    columns: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = DatabaseConfig::default()
        .with_page_size(args.page_size)
        .with_buffer_pool_pages(args.pool_pages)
        .with_lock_timeout(args.lock_timeout_ms.map(Duration::from_millis));
    let db = Database::new(config).context("Invalid configuration")?;

    let table = match &args.command {
        Command::Scan { table, .. }
        | Command::Insert { table, .. }
        | Command::Aggregate { table, .. }
        | Command::DeleteAll { table } => table,
    };
    let schema = parse_columns(&table.columns)?;
    let table_id = db
        .add_table(&table.file, schema.clone(), &table_name(&table.file))
        .with_context(|| format!("Failed to open {}", table.file.display()))?;

    let txn = db.begin();
    let ctx = db.context(txn);
    let mut root: Box<dyn Executor> = match args.command {
        Command::Scan { alias, .. } => {
            Box::new(SeqScanExecutor::new(ctx, table_id, alias.as_deref())?)
        }
        Command::Insert { rows, .. } => {
            let tuples = rows
                .iter()
                .map(|row| parse_row(&schema, row))
                .collect::<Result<Vec<_>>>()?;
            let values = ValuesExecutor::new(schema, tuples)?;
            Box::new(InsertExecutor::new(ctx, Box::new(values), table_id)?)
        }
        Command::Aggregate {
            field, op, group_by, ..
        } => {
            let scan = scan_of(&db, txn, table_id)?;
            Box::new(AggregateExecutor::new(Box::new(scan), field, group_by, op)?)
        }
        Command::DeleteAll { .. } => {
            let scan = scan_of(&db, txn, table_id)?;
            Box::new(DeleteExecutor::new(ctx, Box::new(scan)))
        }
    };

    match collect_all(root.as_mut()) {
        Ok(tuples) => {
            print_results(root.output_schema(), &tuples);
            db.commit(txn).context("Commit failed")?;
            info!("{} row(s)", tuples.len());
            Ok(())
        }
        Err(e) => {
            db.abort(txn)?;
            Err(e).context("Query failed")
        }
    }
}

fn scan_of(db: &Database, txn: TransactionId, table_id: TableId) -> Result<SeqScanExecutor> {
    Ok(SeqScanExecutor::with_table_name(db.context(txn), table_id)?)
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

fn parse_columns(spec: &str) -> Result<SchemaDescriptor> {
    let mut items = Vec::new();
    for column in spec.split(',') {
        let Some((name, ty)) = column.split_once(':') else {
            bail!("Column '{}' must look like name:type", column);
        };
        let field_type: FieldType = ty.trim().parse()?;
        items.push(SchemaItem::new(field_type, Some(name.trim().to_string())));
    }
    Ok(SchemaDescriptor::new(items))
}

fn parse_row(schema: &SchemaDescriptor, row: &str) -> Result<Tuple> {
    let literals: Vec<&str> = row.split(',').collect();
    if literals.len() != schema.num_fields() {
        bail!(
            "Row '{}' has {} values but the table has {} columns",
            row,
            literals.len(),
            schema.num_fields()
        );
    }

    let fields = schema
        .types()
        .zip(literals)
        .map(|(ty, literal)| ty.parse_literal(literal.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Tuple::new(fields))
}

fn print_results(schema: &SchemaDescriptor, tuples: &[Tuple]) {
    let header: Vec<&str> = schema
        .iter()
        .map(|item| item.name.as_deref().unwrap_or("null"))
        .collect();
    println!("{}", header.join("\t"));
    for tuple in tuples {
        println!("{}", tuple);
    }
}
