use crate::aircraft::AircraftClass;
use crate::violation::{Violation, ViolationSink};
use colored::Colorize;
use parking_lot::Mutex;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("ledger {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("corrupt ledger entry on line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

/// Append-only file of violation notices, one JSON record per line.
pub struct BillingLedger {
    path: PathBuf,
    file: Mutex<File>,
}

impl BillingLedger {
    /// Opens the ledger for a new run, discarding previous contents.
    pub fn create(path: &Path) -> Result<Self, BillingError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| BillingError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(BillingLedger {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(path: &Path) -> Result<Vec<Violation>, BillingError> {
        let io_err = |source| BillingError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut records = vec![];
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| BillingError::Corrupt {
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl ViolationSink for BillingLedger {
    fn record(&self, violation: &Violation) {
        let line = match serde_json::to_string(violation) {
            Ok(line) => line,
            Err(e) => {
                error!(flight = %violation.id, "cannot encode violation: {}", e);
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            error!(flight = %violation.id, path = %self.path.display(), "cannot append to ledger: {}", e);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct ClassTotal {
    #[tabled(rename = "Class")]
    pub class: AircraftClass,
    #[tabled(rename = "Notices")]
    pub notices: usize,
    #[tabled(rename = "Amount ($)")]
    pub amount: u64,
}

/// Fines owed for one run.
#[derive(Debug, Clone, Default)]
pub struct Invoice {
    pub lines: Vec<Violation>,
}

impl Invoice {
    pub fn new(lines: Vec<Violation>) -> Self {
        Invoice { lines }
    }

    pub fn total(&self) -> u64 {
        self.lines.iter().map(|v| u64::from(v.fine)).sum()
    }

    pub fn by_class(&self) -> Vec<ClassTotal> {
        [
            AircraftClass::Commercial,
            AircraftClass::Cargo,
            AircraftClass::Emergency,
        ]
        .into_iter()
        .map(|class| {
            let lines = self.lines.iter().filter(|v| v.class == class);
            ClassTotal {
                class,
                notices: lines.clone().count(),
                amount: lines.map(|v| u64::from(v.fine)).sum(),
            }
        })
        .filter(|t| t.notices > 0)
        .collect()
    }

    pub fn table(&self) -> String {
        let mut table = Table::new(&self.lines);
        table.with(Style::rounded());
        table.with(Alignment::left());
        table.to_string()
    }

    pub fn print_summary(&self) {
        println!("\n{}", "Launching Airline Billing Portal...".bold());
        if self.lines.is_empty() {
            println!("{}", "No AVNs to process. All aircraft compliant.".green());
            return;
        }
        println!("AVN Fine Summary:");
        println!("{}", self.table());
        let mut classes = Table::new(self.by_class());
        classes.with(Style::rounded());
        println!("{}", classes);
        println!("{}", format!("Total Fine Amount Due: ${}", self.total()).yellow().bold());
    }
}

#[derive(Helper, Hinter, Highlighter, Validator)]
pub struct CompleteHelper {
    pub commands: Vec<String>,
}

impl Completer for CompleteHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, _pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: format!("{} ", cmd),
            })
            .collect();
        Ok((0, candidates))
    }
}

/// Interactive billing prompt over a settled invoice.
pub struct BillingConsole {
    invoice: Invoice,
    paid: bool,
}

impl BillingConsole {
    pub fn new(invoice: Invoice) -> Self {
        BillingConsole {
            invoice,
            paid: false,
        }
    }

    /// Handles one command line. Returns `false` when the console should close.
    pub fn execute(&mut self, line: &str) -> bool {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(command) = parts.first() else {
            return true;
        };
        match *command {
            "ls" => {
                let filter = parts.get(1).copied().unwrap_or("a");
                let lines = self
                    .invoice
                    .lines
                    .iter()
                    .filter(|v| match filter {
                        "c" | "commercial" => v.class == AircraftClass::Commercial,
                        "g" | "cargo" => v.class == AircraftClass::Cargo,
                        "e" | "emergency" => v.class == AircraftClass::Emergency,
                        _ => true,
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                if lines.is_empty() {
                    println!("No matching notices found.");
                } else {
                    println!("{}", Invoice::new(lines).table());
                }
            }
            "total" => {
                let mut table = Table::new(self.invoice.by_class());
                table.with(Style::rounded());
                println!("{}", table);
                println!("Total due: ${}", self.invoice.total());
            }
            "pay" => {
                if self.paid {
                    println!("Invoice already settled.");
                } else {
                    println!("Processing payment of ${}...", self.invoice.total());
                    println!("{}", "Payment successful.".green());
                    self.paid = true;
                }
            }
            "help" | "?" => {
                println!("\nAvailable Commands:");
                println!("  ls [class]   - List notices, optionally by class: c - commercial, g - cargo, e - emergency");
                println!("  total        - Show fines per class and the amount due");
                println!("  pay          - Settle the invoice");
                println!("  help / ?     - Show this help menu");
                println!("  exit / quit  - Leave the billing portal\n");
            }
            "exit" | "quit" => return false,
            other => println!("Unknown command: {}", other),
        }
        true
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn run(&mut self) -> Result<(), BillingError> {
        let config = rustyline::Config::builder()
            .history_ignore_space(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        let helper = CompleteHelper {
            commands: ["ls", "total", "pay", "help", "exit"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        };
        let mut rl = Editor::with_config(config)?;
        rl.set_helper(Some(helper));

        loop {
            match rl.readline("billing> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;
                    if !self.execute(trimmed) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
