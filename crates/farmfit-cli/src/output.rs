// Output formatting for CLI
//
// Structured formats print the whole value; text output is rendered by each
// command with the field and table helpers below.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }

    /// Print `value` in a structured format; no-op for text
    pub fn print_value<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
            OutputFormat::Text => {}
        }
        Ok(())
    }
}

/// Label/value line for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<16} {}", format!("{}:", label), value);
}

/// Optional field, `-` when absent
pub fn print_opt_field(label: &str, value: Option<&str>) {
    print_field(label, value.unwrap_or("-"));
}

/// Fixed-width text table; the header is printed on creation
pub struct Table {
    widths: Vec<usize>,
}

impl Table {
    pub fn new(columns: &[(&str, usize)]) -> Self {
        let table = Self {
            widths: columns.iter().map(|(_, width)| *width).collect(),
        };
        table.print(columns.iter().map(|(name, _)| *name));
        table
    }

    pub fn row<'a>(&self, cells: impl IntoIterator<Item = &'a str>) {
        self.print(cells);
    }

    fn print<'a>(&self, cells: impl IntoIterator<Item = &'a str>) {
        println!("{}", self.render(cells));
    }

    fn render<'a>(&self, cells: impl IntoIterator<Item = &'a str>) -> String {
        cells
            .into_iter()
            .zip(&self.widths)
            .map(|(cell, &width)| format!("{:<width$}", truncate(cell, width), width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    }
}

/// Shorten to `width` characters, marking the cut with `...`
pub fn truncate(value: &str, width: usize) -> String {
    let value = value.replace('\n', " ");
    if value.chars().count() <= width {
        return value;
    }
    let keep = width.saturating_sub(3);
    let mut s: String = value.chars().take(keep).collect();
    s.push_str("...");
    s
}
