//! Interactive questions asked on the terminal.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PromptError {
    Io(std::io::Error),
    MissingDirectory(PathBuf),
}

impl Display for PromptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "failed to read input: {}", error),
            Self::MissingDirectory(path) => {
                write!(f, "Directory {} doesn't exist", path.display())
            }
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Asks for a single directory and checks that it exists.
pub fn read_directory<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf, PromptError> {
    write!(
        output,
        "Name a directory (use command line to enter multiple directories): "
    )
    .and_then(|_| output.flush())
    .map_err(PromptError::Io)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(PromptError::Io)?;
    let directory = PathBuf::from(line.trim_end_matches(|c| c == '\r' || c == '\n'));
    if !directory.exists() {
        return Err(PromptError::MissingDirectory(directory));
    }
    Ok(directory)
}

/// Asks whether `report` may be overwritten, repeating until the answer is
/// yes or no. End of input or a read error counts as no.
pub fn confirm_overwrite<R: BufRead, W: Write>(input: &mut R, output: &mut W, report: &Path) -> bool {
    let name = report
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.display().to_string());
    let _ = write!(
        output,
        "A save {} already exists, would you like to overwrite it? [Y] or [N] ",
        name
    )
    .and_then(|_| output.flush());

    loop {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match parse_answer(&line) {
            Some(answer) => return answer,
            None => {
                let _ = write!(output, "Try again, [Y] or [N] ").and_then(|_| output.flush());
            }
        }
    }
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_uppercase().as_str() {
        "Y" | "YES" => Some(true),
        "N" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn parses_answers_case_insensitively() {
        assert_eq!(parse_answer("y\n"), Some(true));
        assert_eq!(parse_answer("Yes\r\n"), Some(true));
        assert_eq!(parse_answer(" n "), Some(false));
        assert_eq!(parse_answer("NO"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[test]
    fn reprompts_until_valid_answer() {
        let mut input = Cursor::new("what\n\nyes\n");
        let mut output = Vec::new();
        assert!(confirm_overwrite(&mut input, &mut output, Path::new("/data/run.csv")));
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("run.csv already exists"));
        assert_eq!(shown.matches("Try again").count(), 2);
    }

    #[test]
    fn end_of_input_declines() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert!(!confirm_overwrite(&mut input, &mut output, Path::new("run.csv")));
    }

    #[test]
    fn reads_existing_directory() {
        let dir = tempdir().unwrap();
        let mut input = Cursor::new(format!("{}\n", dir.path().display()));
        let mut output = Vec::new();
        let directory = read_directory(&mut input, &mut output).unwrap();
        assert_eq!(directory, dir.path());
    }

    #[test]
    fn missing_directory_names_the_path() {
        let mut input = Cursor::new("/no/such/place\n");
        let mut output = Vec::new();
        let error = read_directory(&mut input, &mut output).unwrap_err();
        assert_eq!(error.to_string(), "Directory /no/such/place doesn't exist");
    }
}
