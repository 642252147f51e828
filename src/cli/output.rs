//! Colored output helpers for the CLI

use crate::types::TraceStep;
use owo_colors::OwoColorize;

/// Longest capability result shown in a trace before it is shortened.
const TRACE_PREVIEW_CHARS: usize = 240;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the assistant banner
    pub fn banner(&self) {
        let title = "Treg Research Assistant";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n",
                title.bright_cyan().bold(),
                version.dimmed()
            );
        } else {
            println!("\n   {} {}\n", title, version);
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print the capability trace of a query, one numbered entry per step.
    pub fn trace(&self, steps: &[TraceStep]) {
        if steps.is_empty() {
            return;
        }
        self.subheader("Steps");
        for (i, step) in steps.iter().enumerate() {
            let call = format!("{}({})", step.capability_name, step.arguments);
            let result = preview(&step.result);
            if self.colored {
                println!(
                    "    {} {}",
                    format!("[{}]", i + 1).dimmed(),
                    call.bright_white()
                );
                println!("        {} {}", "→".blue(), result.dimmed());
            } else {
                println!("    [{}] {}", i + 1, call);
                println!("        -> {}", result);
            }
        }
    }

    /// Print the final answer.
    pub fn answer(&self, text: &str) {
        self.subheader("Answer");
        for line in text.lines() {
            println!("    {}", line);
        }
    }

    /// Print an empty line
    pub fn newline(&self) {
        println!();
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= TRACE_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(TRACE_PREVIEW_CHARS).collect();
    format!("{}…", cut)
}
