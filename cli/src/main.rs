//! hyperlink-maker CLI - turn spreadsheet columns into hyperlinks
//!
//! Lists sheets and headered columns of a workbook and links the selected
//! columns, saving in place or to a new file.

use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use hyperlink_maker::{
    list_columns, list_sheets, ColumnId, FormatType, HyperlinkAssigner, Sheet, Workbook,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, Metadata, Record};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Turn spreadsheet columns into clickable hyperlinks
#[derive(Parser)]
#[command(
    name = "hyperlink-maker",
    author = "iyulab",
    version,
    about = "Turn spreadsheet columns into clickable hyperlinks",
    long_about = "hyperlink-maker - link every non-empty cell of the selected columns.\n\n\
                  Text starting with http:// or https:// is linked as-is, www. text gets an\n\
                  https:// prefix, anything else is used unchanged. Reads .xlsx and .xls,\n\
                  always writes .xlsx."
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Input workbook (.xlsx or .xls)
        input: PathBuf,
    },

    /// List the headered columns of a sheet
    Columns {
        /// Input workbook (.xlsx or .xls)
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Link the selected columns and save the workbook
    Apply {
        /// Input workbook (.xlsx or .xls)
        input: PathBuf,

        /// Columns to link, e.g. A,C
        #[arg(
            short,
            long,
            value_delimiter = ',',
            required_unless_present = "all",
            conflicts_with = "all"
        )]
        columns: Vec<String>,

        /// Link every headered column
        #[arg(long)]
        all: bool,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Output file path
        #[arg(
            short,
            long,
            required_unless_present = "in_place",
            conflicts_with = "in_place"
        )]
        output: Option<PathBuf>,

        /// Overwrite the input file
        #[arg(long)]
        in_place: bool,

        /// Don't ask before overwriting the input file
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sheets { input } => {
            let workbook = load(&input)?;
            for name in list_sheets(&workbook) {
                println!("{name}");
            }
        }

        Commands::Columns { input, sheet, json } => {
            let workbook = load(&input)?;
            let sheet = select_sheet(&workbook, sheet.as_deref())?;
            let columns = list_columns(sheet);

            if json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else if columns.is_empty() {
                println!("{} No headered columns in '{}'", "!".yellow().bold(), sheet.name());
            } else {
                for column in columns {
                    println!("{column}");
                }
            }
        }

        Commands::Apply {
            input,
            columns,
            all,
            sheet,
            output,
            in_place,
            yes,
        } => {
            let input = normalize_input(&input)?;
            let mut workbook = load(&input)?;
            let sheet_name = select_sheet(&workbook, sheet.as_deref())?.name().to_string();

            let selected: Vec<ColumnId> = if all {
                let sheet = select_sheet(&workbook, Some(sheet_name.as_str()))?;
                list_columns(sheet).into_iter().map(|c| c.column).collect()
            } else {
                columns
                    .iter()
                    .map(|c| c.parse::<ColumnId>())
                    .collect::<Result<_, _>>()?
            };

            let destination = match output {
                Some(path) => path,
                None => {
                    if !yes && !confirm("This will modify the original file. Continue?")? {
                        println!("{} Cancelled", "!".yellow().bold());
                        return Ok(());
                    }
                    in_place_destination(&input, workbook.format())
                }
            };

            let sheet = workbook
                .sheet_mut(&sheet_name)
                .ok_or_else(|| hyperlink_maker::Error::SheetNotFound(sheet_name.clone()))?;
            let pb = create_progress_bar(sheet)?;
            let count = HyperlinkAssigner::default().apply(
                sheet,
                &selected,
                &mut |row: u32, total: u32| {
                    pb.set_position(u64::from(row - 1));
                    pb.set_message(format!("Processing row {row} of {total}..."));
                },
            );
            pb.finish_and_clear();

            workbook.save(&destination)?;
            println!(
                "{} Linked {} cell(s) in '{}': {}",
                "✓".green().bold(),
                count.cells,
                sheet_name,
                destination.display()
            );
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn load(input: &Path) -> Result<Workbook, Box<dyn std::error::Error>> {
    let input = normalize_input(input)?;
    Ok(Workbook::open(input)?)
}

/// Strip the braces and quotes a shell or file drop may leave around a path
/// and require an Excel extension.
fn normalize_input(raw: &Path) -> Result<PathBuf, String> {
    let text = raw.to_string_lossy();
    let trimmed = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim_matches(|c| c == '"' || c == '\'');
    let path = PathBuf::from(trimmed);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("xlsx") | Some("xls") => Ok(path),
        _ => Err(format!(
            "{} is not an Excel workbook (.xlsx or .xls)",
            path.display()
        )),
    }
}

/// Legacy input can't be overwritten with zipped XML under its own name.
fn in_place_destination(input: &Path, format: Option<FormatType>) -> PathBuf {
    match format {
        Some(FormatType::Xls) => input.with_extension("xlsx"),
        _ => input.to_path_buf(),
    }
}

fn select_sheet<'a>(
    workbook: &'a Workbook,
    name: Option<&str>,
) -> Result<&'a Sheet, hyperlink_maker::Error> {
    match name {
        Some(name) => workbook
            .sheet(name)
            .ok_or_else(|| hyperlink_maker::Error::SheetNotFound(name.to_string())),
        None => workbook
            .sheets()
            .first()
            .ok_or_else(|| hyperlink_maker::Error::InvalidData("workbook has no sheets".into())),
    }
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{} {} [y/N] ", "?".cyan().bold(), question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn create_progress_bar(sheet: &Sheet) -> Result<ProgressBar, indicatif::style::TemplateError> {
    let rows = u64::from(sheet.max_row().saturating_sub(1));
    let pb = ProgressBar::new(rows);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.blue/white} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn print_version() {
    println!("{} {}", "hyperlink-maker".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Turn spreadsheet columns into clickable hyperlinks");
    println!();
    println!("Input formats: XLSX, XLS");
    println!("Output format: XLSX");
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from([
            "hyperlink-maker",
            "apply",
            "links.xlsx",
            "--columns",
            "A,c",
            "--output",
            "out.xlsx",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply { columns, output, in_place, .. } => {
                assert_eq!(columns, vec!["A", "c"]);
                assert_eq!(output, Some(PathBuf::from("out.xlsx")));
                assert!(!in_place);
            }
            _ => panic!("expected apply"),
        }

        // a destination is required, and only one
        assert!(Cli::try_parse_from(["hyperlink-maker", "apply", "a.xlsx", "--all"]).is_err());
        assert!(Cli::try_parse_from([
            "hyperlink-maker", "apply", "a.xlsx", "--all", "--in-place", "-o", "b.xlsx",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["hyperlink-maker", "apply", "a.xlsx", "--in-place"]).is_err());
    }

    #[test]
    fn test_normalize_input() {
        assert_eq!(
            normalize_input(Path::new("{C:/data/links.xlsx}")).unwrap(),
            PathBuf::from("C:/data/links.xlsx")
        );
        assert_eq!(
            normalize_input(Path::new("\"report.XLS\"")).unwrap(),
            PathBuf::from("report.XLS")
        );
        assert!(normalize_input(Path::new("notes.csv")).is_err());
    }

    #[test]
    fn test_in_place_destination() {
        assert_eq!(
            in_place_destination(Path::new("old.xls"), Some(FormatType::Xls)),
            PathBuf::from("old.xlsx")
        );
        assert_eq!(
            in_place_destination(Path::new("a.xlsx"), Some(FormatType::Xlsx)),
            PathBuf::from("a.xlsx")
        );
    }
}
