//! Positional text arguments (`configure` CONFIG, `note` NOTES).

use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Resolve a positional text argument.
///
/// Absent: read stdin to EOF. Names an existing file: the file's contents.
/// Anything else is taken literally.
pub fn read_text(arg: Option<&str>) -> io::Result<String> {
    read_text_from(arg, io::stdin().lock())
}

pub fn read_text_from<R: Read>(arg: Option<&str>, mut stdin: R) -> io::Result<String> {
    match arg {
        None => {
            let mut buf = String::new();
            stdin.read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(value) if Path::new(value).is_file() => fs::read_to_string(value),
        Some(value) => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn missing_argument_reads_stdin() {
        let text = read_text_from(None, Cursor::new("from stdin\n")).unwrap();
        assert_eq!(text, "from stdin\n");
    }

    #[test]
    fn existing_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"cpus\": 4}}").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let text = read_text_from(Some(&path), Cursor::new("ignored")).unwrap();
        assert_eq!(text, "{\"cpus\": 4}");
    }

    #[test]
    fn anything_else_is_literal() {
        let text = read_text_from(Some("built from template 12"), Cursor::new("ignored")).unwrap();
        assert_eq!(text, "built from template 12");
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        assert_eq!(read_text_from(Some(&path), Cursor::new("")).unwrap(), path);
    }
}
