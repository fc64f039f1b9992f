//! `gr` loads a binary image and executes it on the G-machine.

extern crate clap;
#[macro_use]
extern crate log;
extern crate chrono;
extern crate fern;

use clap::{App, Arg, ArgMatches};

use std::path::Path;

use gmachine::machine::EXCEPTION_OK;
use gmachine::{image, Machine};

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let ifile = args.value_of("INPUT").unwrap();
    let ipath = Path::new(ifile);

    let bytes = match std::fs::read(&ipath) {
        Err(err) => {
            error!("fatal: unable to read image `{}`: {}", ipath.display(), err);
            std::process::exit(1);
        }
        Ok(bytes) => bytes,
    };

    let program = image::decode(&bytes);
    debug!("loaded {} words from `{}`", program.len(), ipath.display());

    let mut machine = Machine::new(std::io::stdout());
    machine.run_program(&program);

    if machine.e != EXCEPTION_OK {
        eprintln!("exception number: {}", machine.e);
        std::process::exit(1);
    }
}

fn process_arguments() -> ArgMatches<'static> {
    App::new("gr")
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .about("Runs a compiled G-machine binary image")
        .arg(
            Arg::with_name("INPUT")
                .help("The binary image to execute")
                .required(true)
                .multiple(false)
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .takes_value(false)
                .help("Sets the level of verbosity"),
        )
        .get_matches()
}

fn initialize_logging(verbosity: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(match verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .chain(std::io::stderr())
        .apply()
        .ok();
}
