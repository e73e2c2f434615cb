//! loxvm CLI: evaluate a file, a command-line expression, or run the REPL.

use std::env;
use std::io;
use std::path::Path;
use std::process;

use colored::Colorize;

use loxvm::error::LoxError;
use loxvm::repl::{report_error, Repl};
use loxvm::VmConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    disassemble: bool,
    trace: bool,
}

fn print_usage() {
    eprintln!("loxvm {} - Lox expression bytecode VM", VERSION);
    eprintln!();
    eprintln!("Usage: loxvm [options] [script.lox]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>       Evaluate code and print result");
    eprintln!("  --disassemble   Log the bytecode of each compiled chunk");
    eprintln!("  --trace         Log the stack and every instruction as it runs");
    eprintln!("  --version       Print the version");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  loxvm                         Start interactive REPL");
    eprintln!("  loxvm expr.lox                Evaluate a file");
    eprintln!("  loxvm -e '(2 + 3) * 4'        Evaluate code directly");
    eprintln!("  loxvm --trace -e '-1 + 2'     Evaluate with instruction tracing");
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        disassemble: false,
        trace: false,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" => {
                println!("loxvm {}", VERSION);
                process::exit(0);
            }
            "--disassemble" => options.disassemble = true,
            "--trace" => options.trace = true,
            "-e" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("-e requires a code argument");
                    print_usage();
                    process::exit(64);
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                process::exit(64);
            }
            _ => {
                if let Command::Run { .. } = options.command {
                    eprintln!("Only one script file can be specified");
                    print_usage();
                    process::exit(64);
                }
                options.command = Command::Run { file: arg.clone() };
            }
        }
        i += 1;
    }

    options
}

fn init_logging(options: &Options) {
    let default_level = if options.trace {
        "trace"
    } else if options.disassemble {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn config(options: &Options) -> VmConfig {
    let env = VmConfig::from_env();
    VmConfig::default()
        .with_print_code(options.disassemble || env.print_code)
        .with_trace_execution(options.trace || env.trace_execution)
}

fn main() {
    let options = parse_args();
    init_logging(&options);
    let config = config(&options);

    match &options.command {
        Command::Repl => run_repl(config),
        Command::Run { file } => run_file(file, config),
        Command::Eval { code } => run_eval(code, config),
    }
}

fn run_file(path: &str, config: VmConfig) {
    match loxvm::run_file(Path::new(path), config) {
        Ok(value) => println!("{}", value),
        Err(e) => exit_with(e),
    }
}

fn run_eval(code: &str, config: VmConfig) {
    match loxvm::run_with_config(code, config) {
        Ok(value) => println!("{}", value),
        Err(e) => exit_with(e.into()),
    }
}

fn run_repl(config: VmConfig) {
    if let Err(e) = Repl::new(config).run() {
        exit_with(e.into());
    }
}

fn exit_with(error: LoxError) -> ! {
    let code = error.exit_code();
    match &error {
        LoxError::Interpret(e) => {
            let _ = report_error(e, &mut io::stderr());
        }
        LoxError::Io(e) => eprintln!("{} {}", "Error:".red().bold(), e),
    }
    process::exit(code);
}
