use colored::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::message::Role;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub sender_width: usize,
    pub message_width: usize,
    pub timestamp_width: usize,

    // Role → colour name (extensible)
    pub role_colors: HashMap<String, String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        let mut role_colors = HashMap::new();

        role_colors.insert("human".into(), "yellow".into());
        role_colors.insert("agent".into(), "cyan".into());
        role_colors.insert("system".into(), "magenta".into());

        Self {
            sender_width: 20,
            message_width: 55,
            timestamp_width: 25,
            role_colors,
        }
    }
}

impl UiSettings {
    pub fn color(&self, role: Role) -> Color {
        self.role_colors
            .get(role.as_str())
            .and_then(|name| name.parse().ok())
            .unwrap_or(Color::White)
    }
}
