//! Sono compiler CLI.
//!
//! `sono check` is the editor-time path (parse and type-check only);
//! `sono compile` runs the full pipeline and lists the compiled entry
//! points; `sono run` additionally invokes a function with scalar
//! arguments. Diagnostics render as annotated snippets unless
//! `--line-errors` asks for the compact form.

use sono_compile::{CompilerSettings, OptimizationFlags};
use sono_diagnostic::{render, ReportFormat};
use sono_jit::{Compiler, Definitions};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "check" => {
            let Some(options) = Options::parse(&args[2..]) else {
                eprintln!("Usage: sono check <file.sono> [--line-errors] [-D NAME=VALUE]");
                std::process::exit(2);
            };
            run_check(&options);
        }
        "compile" => {
            let Some(options) = Options::parse(&args[2..]) else {
                eprintln!(
                    "Usage: sono compile <file.sono> [--line-errors] [--no-opt] [-D NAME=VALUE]"
                );
                std::process::exit(2);
            };
            run_compile(&options);
        }
        "run" => {
            let Some(options) = Options::parse(&args[2..]) else {
                eprintln!(
                    "Usage: sono run <file.sono> [--call <name>] [--arg <number>] [options]"
                );
                std::process::exit(2);
            };
            run_invoke(&options);
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("error: unknown command '{other}'");
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!("Sono compiler");
    println!();
    println!("Usage: sono <command> [options]");
    println!();
    println!("Commands:");
    println!("  check <file.sono>     Parse and type-check only (no code generation)");
    println!("  compile <file.sono>   Compile and list entry points");
    println!("  run <file.sono>       Compile and call a function");
    println!();
    println!("Options:");
    println!("  --line-errors         Report errors as file:line instead of snippets");
    println!("  --no-opt              Disable all tree optimizations");
    println!("  --no-inline           Disable inlining only");
    println!("  -D NAME=VALUE         Add a preprocessor definition");
    println!("  --call <name>         Function to invoke (default: main)");
    println!("  --arg <number>        Argument to pass (int or float, repeatable)");
}

struct Options {
    path: String,
    settings: CompilerSettings,
    definitions: Definitions,
    call: String,
    call_args: Vec<f64>,
}

impl Options {
    fn parse(args: &[String]) -> Option<Options> {
        let mut options = Options {
            path: String::new(),
            settings: CompilerSettings::default(),
            definitions: Definitions::new(),
            call: "main".to_owned(),
            call_args: Vec::new(),
        };
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--line-errors" => {
                    options.settings.report_format = ReportFormat::LineOnly;
                }
                "--no-opt" => {
                    options.settings.optimizations = OptimizationFlags::empty();
                }
                "--no-inline" => {
                    options
                        .settings
                        .optimizations
                        .remove(OptimizationFlags::INLINING);
                }
                "-D" => {
                    i += 1;
                    let def = args.get(i)?;
                    let (name, value) = def.split_once('=').unwrap_or((def.as_str(), "1"));
                    options.definitions.define(name, value);
                }
                "--call" => {
                    i += 1;
                    options.call = args.get(i)?.clone();
                }
                "--arg" => {
                    i += 1;
                    options.call_args.push(args.get(i)?.parse().ok()?);
                }
                other if !other.starts_with('-') && options.path.is_empty() => {
                    options.path = other.to_owned();
                }
                _ => return None,
            }
            i += 1;
        }
        if options.path.is_empty() {
            return None;
        }
        Some(options)
    }

    fn read_source(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error: cannot read '{}': {e}", self.path);
                std::process::exit(1);
            }
        }
    }

    fn report(&self, error: &sono_diagnostic::Error, source: &str) -> ! {
        eprintln!("{}", render(error, &self.path, source, self.settings.report_format));
        std::process::exit(1);
    }
}

fn run_check(options: &Options) {
    let source = options.read_source();
    let compiler = Compiler::new(options.settings.clone());
    match compiler.check(&source, &options.definitions) {
        Ok(()) => println!("{}: ok", options.path),
        Err(e) => options.report(&e, &source),
    }
}

fn run_compile(options: &Options) {
    let source = options.read_source();
    let compiler = Compiler::new(options.settings.clone());
    match compiler.compile(&source, &options.definitions) {
        Ok(program) => {
            println!("{}: compiled {} bytes of root data", options.path, program.data().len());
            for name in program.function_names() {
                println!("  {name}");
            }
        }
        Err(e) => options.report(&e, &source),
    }
}

fn run_invoke(options: &Options) {
    let source = options.read_source();
    let compiler = Compiler::new(options.settings.clone());
    let program = match compiler.compile(&source, &options.definitions) {
        Ok(program) => program,
        Err(e) => options.report(&e, &source),
    };
    let handle = match program.function(&options.call) {
        Ok(handle) => handle,
        Err(e) => options.report(&e, &source),
    };

    // Scalar entry points only; bind by trying the common shapes.
    let result = invoke_scalar(&handle, &options.call_args);
    match result {
        Ok(text) => println!("{} => {text}", options.call),
        Err(e) => options.report(&e, &source),
    }
}

/// Try the scalar signatures a CLI invocation can express.
fn invoke_scalar(
    handle: &sono_jit::FunctionHandle<'_>,
    args: &[f64],
) -> sono_diagnostic::Result<String> {
    match args {
        [] => {
            if let Ok(f) = handle.typed0::<i32>() {
                return Ok(f.call().to_string());
            }
            if let Ok(f) = handle.typed0::<f32>() {
                return Ok(f.call().to_string());
            }
            handle.typed0::<f64>().map(|f| f.call().to_string())
        }
        [a] => {
            if let Ok(f) = handle.typed1::<i32, i32>() {
                return Ok(f.call(*a as i32).to_string());
            }
            if let Ok(f) = handle.typed1::<f32, f32>() {
                return Ok(f.call(*a as f32).to_string());
            }
            handle.typed1::<f64, f64>().map(|f| f.call(*a).to_string())
        }
        [a, b] => {
            if let Ok(f) = handle.typed2::<i32, i32, i32>() {
                return Ok(f.call(*a as i32, *b as i32).to_string());
            }
            if let Ok(f) = handle.typed2::<f32, f32, f32>() {
                return Ok(f.call(*a as f32, *b as f32).to_string());
            }
            handle
                .typed2::<f64, f64, f64>()
                .map(|f| f.call(*a, *b).to_string())
        }
        _ => Err(sono_diagnostic::Error::signature_mismatch(
            "at most two scalar arguments can be passed from the command line",
        )),
    }
}
