use std::{io::Write, path::PathBuf, process::ExitCode};

use clap::Parser as ClapParser;
use rowdb::{
    storage::storage_manager::StorageManager,
    types::{ROW_NAME_MAX_LEN, error::DatabaseError, row::Row},
};
use rustyline::{DefaultEditor, error::ReadlineError};

const HISTORY_FILE: &str = ".rowdb_history";

/// rowdb - a single-file record store with a B-tree index
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database file, created when missing
    #[arg(default_value = "rowdb.db")]
    db_path: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

enum Command {
    Insert(i32, String),
    SelectAll,
    SelectOne(i32),
    Update(i32, String),
    Delete(i32),
    Stats,
    Verify,
    Help,
    Clear,
    Exit,
    Empty,
}

fn parse_id(token: Option<&str>) -> Result<i32, String> {
    let token = token.ok_or("missing id")?;
    token
        .parse::<i32>()
        .map_err(|_| format!("'{}' is not a valid id", token))
}

/// Everything after the id is the name, cut to what a row can hold.
fn parse_name(rest: &str) -> Result<String, String> {
    let name = rest.trim();
    if name.is_empty() {
        return Err("missing name".to_string());
    }
    let mut end = name.len().min(ROW_NAME_MAX_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    Ok(name[..end].to_string())
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    match head.to_lowercase().as_str() {
        "" => Ok(Command::Empty),
        ".exit" | "exit" | "quit" | "q" => Ok(Command::Exit),
        ".help" | "help" | "h" => Ok(Command::Help),
        ".stats" => Ok(Command::Stats),
        ".verify" => Ok(Command::Verify),
        "clear" => Ok(Command::Clear),
        "select" if rest.trim().is_empty() => Ok(Command::SelectAll),
        "select" => Ok(Command::SelectOne(parse_id(rest.split_whitespace().next())?)),
        "delete" => Ok(Command::Delete(parse_id(rest.split_whitespace().next())?)),
        "insert" | "update" => {
            let rest = rest.trim_start();
            let (id, name) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let id = parse_id(Some(id))?;
            let name = parse_name(name)?;
            if head.eq_ignore_ascii_case("insert") {
                Ok(Command::Insert(id, name))
            } else {
                Ok(Command::Update(id, name))
            }
        }
        other => Err(format!("unrecognized command '{}', try .help", other)),
    }
}

fn print_row(row: &Row) {
    println!("({}, {})", row.id, row.name_str());
}

enum Flow {
    Continue,
    Exit,
    Fatal(DatabaseError),
}

/// Print the outcome of a command. Write failures end the session, every
/// other error is reported and the prompt comes back.
fn report<T>(result: Result<T, DatabaseError>, show: impl FnOnce(T)) -> Flow {
    match result {
        Ok(value) => {
            show(value);
            Flow::Continue
        }
        Err(err) if err.is_fatal() => Flow::Fatal(err),
        Err(err) => {
            println!("Error: {}", err);
            Flow::Continue
        }
    }
}

fn executed(_: ()) {
    println!("Executed.");
}

fn process_command(db: &mut StorageManager, command: Command) -> Flow {
    match command {
        Command::Exit => {
            println!("Goodbye!");
            Flow::Exit
        }
        Command::Help => {
            println!(
                r#"
Available commands:
  insert <id> <name>   - Add a row (name is cut to {} bytes)
  select               - List every row
  select <id>          - Show one row
  update <id> <name>   - Replace a row's name
  delete <id>          - Remove a row
  .stats               - Page and index statistics
  .verify              - Check that index and pages agree
  .help, help, h       - Show this help message
  clear                - Clear the screen
  .exit, exit, q       - Exit the database
"#,
                ROW_NAME_MAX_LEN
            );
            Flow::Continue
        }
        Command::Clear => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
            Flow::Continue
        }
        Command::Empty => Flow::Continue,
        Command::Insert(id, name) => report(db.insert(id, name), executed),
        Command::Update(id, name) => report(db.update(id, name), executed),
        Command::Delete(id) => report(db.delete(id), executed),
        Command::SelectOne(id) => report(db.select_one(id), |row| print_row(&row)),
        Command::SelectAll => report(db.select_all(), |rows| {
            rows.iter().for_each(print_row);
            println!("{} row(s)", rows.len());
        }),
        Command::Stats => report(db.stats(), |stats| {
            println!(
                "pages: {}, rows: {}, index height: {}, index nodes: {}, root offset: {}",
                stats.page_count,
                stats.row_count,
                stats.index_height,
                stats.index_nodes,
                stats.root_offset
            )
        }),
        Command::Verify => report(db.verify(), |()| {
            println!("Index and pages are consistent.")
        }),
    }
}

/// Returns the error that ended the session, if one did.
fn run_repl(db: &mut StorageManager) -> rustyline::Result<Option<DatabaseError>> {
    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_FILE);

    let mut fatal = None;
    loop {
        match rl.readline("db> ") {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    rl.add_history_entry(line)?;
                }
                match parse_command(line) {
                    Ok(command) => match process_command(db, command) {
                        Flow::Continue => {}
                        Flow::Exit => break,
                        Flow::Fatal(err) => {
                            fatal = Some(err);
                            break;
                        }
                    },
                    Err(message) => println!("Error: {}", message),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(fatal)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut db = match StorageManager::open(&args.db_path) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("Failed to open database {}: {}", args.db_path.display(), err);
            return ExitCode::FAILURE;
        }
    };

    match run_repl(&mut db) {
        Ok(Some(err)) => {
            eprintln!("Fatal: {}", err);
            eprintln!("The database file may be inconsistent; no further commands accepted.");
            return ExitCode::FAILURE;
        }
        Ok(None) => {}
        Err(err) => eprintln!("Console error: {}", err),
    }

    match db.close() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Failed to close database: {}", err);
            ExitCode::FAILURE
        }
    }
}
