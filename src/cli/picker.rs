//! Interactive boundaries: data-file picker and cutoff selection.
//!
//! This is intentionally kept separate from clap parsing and from the
//! reduction pipeline:
//! - clap handles structured flags/subcommands
//! - the pipeline only ever receives a resolved `CutoffRange`
//! - everything that waits on a human lives here, behind one blocking call

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::domain::CutoffRange;
use crate::error::AppError;
use crate::io::is_header_line;

/// Default directory recursion depth for finding data files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// File extensions the instrument software writes.
const DATA_EXTENSIONS: [&str; 3] = ["dat", "txt", "tsv"];

/// Lines of preamble searched for the `Timestamp` header.
const HEADER_SCAN_LINES: usize = 64;

/// Index shown first when choosing cutoffs; sample 0 is usually a settling point.
pub const DEFAULT_LEFT_CUTOFF: usize = 1;

/// Source of the analysis cutoff range.
///
/// `select` blocks until a range is available. `load` is the raw load trace
/// and `reversal` the index where the angle starts decreasing.
pub trait CutoffSource {
    fn select(&mut self, load: &[f64], reversal: usize) -> Result<CutoffRange, AppError>;
}

/// Cutoffs taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedCutoff {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl CutoffSource for FixedCutoff {
    fn select(&mut self, _load: &[f64], reversal: usize) -> Result<CutoffRange, AppError> {
        Ok(CutoffRange::new(
            self.left.unwrap_or(DEFAULT_LEFT_CUTOFF),
            self.right.unwrap_or(reversal),
        ))
    }
}

/// Cutoffs typed by the user: two indices in any order.
pub struct PromptCutoff<R, W> {
    input: R,
    output: W,
}

impl PromptCutoff<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptCutoff<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, text: &str) -> Result<Option<String>, AppError> {
        write!(self.output, "{text}")
            .and_then(|_| self.output.flush())
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;
        let mut line = String::new();
        let bytes = self
            .input
            .read_line(&mut line)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> CutoffSource for PromptCutoff<R, W> {
    fn select(&mut self, load: &[f64], reversal: usize) -> Result<CutoffRange, AppError> {
        let shown = &load[..reversal.min(load.len())];
        let (lo, hi) = shown
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        writeln!(
            self.output,
            "Rising sweep: indices 0..{reversal} | load=[{lo:.5}, {hi:.5}] V"
        )
        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut picks: Vec<usize> = Vec::with_capacity(2);
        while picks.len() < 2 {
            let label = if picks.is_empty() { "first" } else { "second" };
            let Some(input) = self.prompt(&format!("Enter {label} cutoff index (q to quit): "))? else {
                return Err(AppError::new(
                    2,
                    "No input received. Provide cutoffs with `--left`/`--right`.",
                ));
            };
            if input.eq_ignore_ascii_case("q") {
                return Err(AppError::new(2, "Canceled."));
            }
            match input.parse::<usize>() {
                Ok(idx) if idx <= reversal => picks.push(idx),
                Ok(idx) => {
                    writeln!(self.output, "Index {idx} is past the reversal point ({reversal}).")
                        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;
                }
                Err(_) => {
                    writeln!(self.output, "Not an index: {input}")
                        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;
                }
            }
        }

        let range = CutoffRange::from_clicks(picks[0], picks[1]);
        writeln!(
            self.output,
            "Selection complete: left={}, right={}",
            range.left, range.right
        )
        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;
        Ok(range)
    }
}

/// Prompt the user to select a data file from the current directory tree.
///
/// Behavior:
/// - list discovered data files
/// - accept either a number (from the list) or an explicit path
/// - `q` cancels
pub fn prompt_for_data_path() -> Result<PathBuf, AppError> {
    let files = discover_data_files();
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No data files found. Provide one with `torque analyze -f <file>`.",
        ));
    }

    println!("Found {} data file(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    loop {
        print!("Select a file by number (1-{}) or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Provide a data file with `torque analyze -f <file>`.",
            ));
        }

        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        if let Ok(choice) = input.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_data_path(&files[choice - 1]);
            }
            println!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len());
            continue;
        }

        match validate_data_path(Path::new(input)) {
            Ok(path) => return Ok(path),
            Err(err) => println!("{err}"),
        }
    }
}

/// Validate the provided path points to an existing file.
pub fn validate_data_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("Data file not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// Discover sweep exports under the current directory (deterministic order).
///
/// Only files with a data extension and a `Timestamp` header line near the
/// top are listed.
pub fn discover_data_files() -> Vec<PathBuf> {
    find_data_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_data_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_data_files_inner(root, 0, max_depth, &mut out);
    out.sort_by(|a, b| pretty_path(a).cmp(&pretty_path(b)));
    out
}

fn find_data_files_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_data_files_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && has_data_extension(&path) && has_sweep_header(&path) {
            out.push(path);
        }
    }
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DATA_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}

fn has_sweep_header(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    io::BufReader::new(file)
        .lines()
        .take(HEADER_SCAN_LINES)
        .map_while(Result::ok)
        .any(|line| is_header_line(&line))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
