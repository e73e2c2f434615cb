//! Line-oriented REPL. Every line is one expression, interpreted on the same VM.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::bytecode::Vm;
use crate::config::VmConfig;
use crate::error::InterpretError;

pub struct Repl {
    vm: Vm,
    history: Vec<String>,
}

impl Repl {
    pub fn new(config: VmConfig) -> Self {
        Self {
            vm: Vm::with_config(config),
            history: Vec::new(),
        }
    }

    /// Read from stdin until end of input.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_with(stdin.lock(), &mut stdout.lock(), &mut stderr.lock())
    }

    /// Drive the REPL over arbitrary streams. Results go to `out`, diagnostics to `err`.
    pub fn run_with<R, W, E>(&mut self, input: R, out: &mut W, err: &mut E) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        let mut lines = input.lines();

        loop {
            write!(out, "> ")?;
            out.flush()?;

            let Some(line) = lines.next().transpose()? else {
                writeln!(out)?;
                break;
            };
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "exit" | ".exit" | "quit" | ".quit") {
                break;
            }

            self.history.push(line.to_string());
            if line.starts_with('.') {
                self.handle_magic_command(line, out, err)?;
            } else {
                self.execute(line, out, err)?;
            }
        }

        Ok(())
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn execute<W, E>(&mut self, line: &str, out: &mut W, err: &mut E) -> io::Result<()>
    where
        W: Write,
        E: Write,
    {
        match self.vm.interpret(line) {
            Ok(value) => writeln!(out, "{}", self.vm.format_value(value)),
            Err(e) => report_error(&e, err),
        }
    }

    fn handle_magic_command<W: Write, E: Write>(
        &mut self,
        line: &str,
        out: &mut W,
        err: &mut E,
    ) -> io::Result<()> {
        match line {
            ".help" => {
                writeln!(out, "Enter an expression to evaluate it.")?;
                writeln!(out, "  .dis <expr>  Show the bytecode for an expression")?;
                writeln!(out, "  .history     Show previous input")?;
                writeln!(out, "  .reset       Start over with a fresh VM")?;
                writeln!(out, "  .exit        Leave the REPL")
            }
            ".history" => {
                for (i, entry) in self.history.iter().enumerate() {
                    writeln!(out, "{:4}  {}", i + 1, entry)?;
                }
                Ok(())
            }
            ".reset" => {
                self.vm = Vm::with_config(self.vm.config().clone());
                writeln!(out, "VM reset.")
            }
            _ if line.starts_with(".dis ") => {
                let source = line.trim_start_matches(".dis ");
                match crate::disassemble(source) {
                    Ok(listing) => write!(out, "{}", listing),
                    Err(e) => report_error(&InterpretError::Compile(e), err),
                }
            }
            _ => writeln!(
                err,
                "Unknown command: {}. Type .help for available commands.",
                line
            ),
        }
    }
}

/// Write a diagnostic, highlighted.
pub fn report_error<E: Write>(error: &InterpretError, err: &mut E) -> io::Result<()> {
    match error {
        InterpretError::Compile(e) => {
            for diagnostic in &e.errors {
                writeln!(err, "{}", diagnostic.to_string().red())?;
            }
            Ok(())
        }
        InterpretError::Runtime(e) if e.is_internal() => {
            writeln!(err, "{} {}", "internal error:".red().bold(), e)
        }
        InterpretError::Runtime(e) => writeln!(err, "{}", e.to_string().red()),
    }
}
