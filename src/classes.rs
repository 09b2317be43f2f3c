use std::path::Path;

use log::{info, warn};

/// Class labels, one per line. Blank lines are skipped. A missing or
/// unreadable file gives an empty list; boxes can still be drawn, but not
/// saved until a label is typed in.
pub fn read_class_names(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let names = parse_class_names(&text);
            info!("Loaded {} class names from {}", names.len(), path.display());
            names
        }
        Err(e) => {
            warn!(
                "{} not readable ({e}); create it with one class per line",
                path.display()
            );
            Vec::new()
        }
    }
}

pub fn parse_class_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_lines() {
        assert_eq!(
            parse_class_names("cat\r\n  dog \n\n\tbird\n"),
            ["cat", "dog", "bird"]
        );
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_class_names(&dir.path().join("class_list.txt")).is_empty());
    }

    #[test]
    fn reads_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_list.txt");
        std::fs::write(&path, "zebra\napple\n").unwrap();
        assert_eq!(read_class_names(&path), ["zebra", "apple"]);
    }
}
