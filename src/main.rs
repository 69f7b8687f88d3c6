use std::env::args;
use std::io::{stdin, stdout, BufRead, Write};
use std::process::exit;

use ansi_term::Color;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strqueue::config::Options;
use strqueue::console::Console;
use strqueue::CommandError;

fn usage(program_name: &str) {
    println!(
        "Usage: {} [ARGS]
ARGS:
    -h | --help                                 Prints this message
    -f | --file <filepath>                      Reads commands from the file specified
                                                  instead of standard input
    -v | --verbose <level>                      Sets the verbosity level (0-4)
    --seed <n>                                  Seeds allocation failure injection
    --fail <percent>                            Refuses this percentage of allocations",
        program_name
    );
}

fn parse_number(args: &mut impl Iterator<Item = String>, flag: &str) -> i64 {
    match args.next() {
        Some(arg) => match arg.parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                println!("Error: {} requires a numeric argument", flag);
                exit(1)
            }
        },
        None => {
            println!("Error: {} requires an argument", flag);
            exit(1)
        }
    }
}

fn set_once(options: &mut Options, seen: &mut Vec<&'static str>, name: &'static str, flag: &str, value: i64) {
    if seen.contains(&name) {
        println!("Error: {} can only be used once", flag);
        exit(1)
    }
    seen.push(name);
    if let Err(err) = options.set(name, value) {
        println!("Error: {}: {}", flag, err);
        exit(1)
    }
}

pub fn main() {
    let program_name = "qtest";
    let mut options = Options::default();
    let mut input = String::new();
    let mut seen: Vec<&'static str> = Vec::new();

    let mut args = args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                usage(program_name);
                exit(0)
            }
            "-f" | "--file" => match args.next() {
                Some(arg) => {
                    if !input.is_empty() {
                        println!("Error: -f | --file can only be used once");
                        exit(1)
                    }
                    input = arg;
                }
                None => {
                    println!("Error: -f | --file requires an argument");
                    exit(1)
                }
            },
            "-v" | "--verbose" => {
                let value = parse_number(&mut args, "-v | --verbose");
                set_once(&mut options, &mut seen, "verbose", "-v | --verbose", value);
            }
            "--seed" => {
                let value = parse_number(&mut args, "--seed");
                set_once(&mut options, &mut seen, "seed", "--seed", value);
            }
            "--fail" => {
                let value = parse_number(&mut args, "--fail");
                set_once(&mut options, &mut seen, "malloc", "--fail", value);
            }
            _ => {
                println!("Error: Unknown command line option: {}", arg);
                usage(program_name);
                exit(1)
            }
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| options.log_directive().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let interactive = input.is_empty();
    if !interactive && !std::path::Path::new(&input).exists() {
        println!("The file '{}' does not exist.", input);
        exit(1)
    }
    if !interactive {
        options.echo = true;
    }

    let mut console = Console::new(options, stdout());
    let result = if interactive {
        run_interactive(&mut console)
    } else {
        console.run_file(&input)
    };

    if let Err(err) = result {
        println!("{}: {}", Color::Red.bold().paint("Error"), Color::White.bold().paint(err.to_string()));
    }
    match console.finish() {
        Ok(0) => exit(0),
        Ok(errors) => {
            println!("{} error(s) reported", errors);
            exit(1)
        }
        Err(err) => {
            println!("Error: {}", err);
            exit(1)
        }
    }
}

fn run_interactive<W: Write>(console: &mut Console<W>) -> Result<(), CommandError> {
    let stdin = stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("cmd> ");
        stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        console.run_line(&line)?;
        if console.has_quit() {
            break;
        }
    }
    Ok(())
}
