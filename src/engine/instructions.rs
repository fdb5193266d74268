use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

pub fn default_instructions(agent: &str) -> String {
    format!(
        "You are {agent}, a futuristic AI digital assistant. You enjoy helping humans live \
         better lives. When you reply do not prepend the response with \
         \"At yyyy-MM-dd HH:mm:ss, {agent} said:\". Just send the reply."
    )
}

/// Reads the instructions file, writing the default text first when it does
/// not exist. Any I/O failure falls back to the default text.
pub fn load_or_create(path: &Path, agent: &str) -> String {
    match fs::read_to_string(path) {
        Ok(text) => return text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read instructions, using default");
            return default_instructions(agent);
        }
    }

    let text = default_instructions(agent);
    match fs::write(path, &text) {
        Ok(()) => info!(path = %path.display(), "created default instructions"),
        Err(err) => warn!(path = %path.display(), error = %err, "cannot write default instructions"),
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_file_is_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instructions.txt");
        fs::write(&path, "Answer in haiku.").unwrap();
        assert_eq!(load_or_create(&path, "Willow"), "Answer in haiku.");
    }

    #[test]
    fn missing_file_is_created_with_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instructions.txt");

        let text = load_or_create(&path, "Willow");
        assert!(text.starts_with("You are Willow"));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn unwritable_location_still_yields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("instructions.txt");
        assert_eq!(load_or_create(&path, "Willow"), default_instructions("Willow"));
    }
}
