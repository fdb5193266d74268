use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::engine::router::{HumanInput, InputError};

pub const DEFAULT_USERNAME: &str = "Human";

pub fn is_quit_sentinel(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

/// Feeds lines from `reader` to the router until the user quits or input
/// ends. A read failure still sends the quit before being reported.
pub fn pump<R: BufRead>(reader: R, input: HumanInput) -> Result<(), InputError> {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                input.quit()?;
                return Err(err.into());
            }
        };

        if is_quit_sentinel(&line) {
            info!(component = "input", user = input.username(), "quit requested");
            return input.quit();
        }
        if line.trim().is_empty() {
            continue;
        }

        debug!(component = "input", chars = line.len(), "submitting line");
        input.submit(line)?;
    }

    info!(component = "input", "end of input");
    input.quit()
}

/// Asks for a display name; blank input or EOF yields `Human`.
pub fn prompt_username<R: BufRead, W: Write>(mut reader: R, mut writer: W) -> io::Result<String> {
    write!(writer, "Enter your username: ")?;
    writer.flush()?;

    let mut line = String::new();
    reader.read_line(&mut line)?;
    let name = line.trim();

    Ok(if name.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        name.to_string()
    })
}
