use std::io::Write;

use colored::Colorize;

use crate::engine::display::{DisplayError, DisplaySurface};
use crate::model::message::Message;
use crate::ui::settings::UiSettings;

/// Renders the chat as an ASCII table, one row per message:
/// sender (right aligned) | message (wrapped) | timestamp (centred).
pub struct TerminalSurface<W> {
    out: W,
    settings: UiSettings,
    color: bool,
    rows: usize,
}

impl<W: Write + Send + 'static> TerminalSurface<W> {
    pub fn new(out: W, settings: UiSettings, color: bool) -> Self {
        Self {
            out,
            settings,
            color,
            rows: 0,
        }
    }

    fn border(&self) -> String {
        let s = &self.settings;
        format!(
            "+{}+{}+{}+",
            "-".repeat(s.sender_width + 2),
            "-".repeat(s.message_width + 2),
            "-".repeat(s.timestamp_width + 2),
        )
    }

    pub fn render(&self, msg: &Message) -> String {
        let s = &self.settings;
        let lines = wrap(&msg.text, s.message_width);
        let sender = fit(&msg.sender, s.sender_width);
        let stamp = fit(&msg.formatted_timestamp(), s.timestamp_width);

        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            let (left, right) = if i == 0 {
                (
                    format!("{:>width$}", sender, width = s.sender_width),
                    format!("{:^width$}", stamp, width = s.timestamp_width),
                )
            } else {
                (" ".repeat(s.sender_width), " ".repeat(s.timestamp_width))
            };
            let middle = format!("{:<width$}", line, width = s.message_width);

            out.push_str(&format!(
                "| {} | {} | {} |\n",
                self.paint(&left, msg),
                self.paint(&middle, msg),
                self.paint(&right, msg),
            ));
        }
        out.push_str(&self.border());
        out.push('\n');
        out
    }

    // Padding is applied before colouring; escape codes have no width.
    fn paint(&self, cell: &str, msg: &Message) -> String {
        if self.color {
            cell.color(self.settings.color(msg.role)).to_string()
        } else {
            cell.to_string()
        }
    }
}

impl<W: Write + Send + 'static> DisplaySurface for TerminalSurface<W> {
    fn show(&mut self, message: &Message) -> Result<(), DisplayError> {
        let mut chunk = String::new();
        if self.rows == 0 {
            chunk.push_str(&self.border());
            chunk.push('\n');
        }
        chunk.push_str(&self.render(message));

        self.out.write_all(chunk.as_bytes())?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }
}

fn fit(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Greedy word wrap. Words longer than `width` are split; explicit line
/// breaks are kept. Always returns at least one line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}
