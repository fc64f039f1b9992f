//! `gc` assembles a G-assembly source file into a binary image.

extern crate clap;
#[macro_use]
extern crate log;
extern crate chrono;
extern crate fern;
extern crate term_grid;

use clap::{App, Arg, ArgMatches};
use term_grid::{Cell, Direction, Filling, Grid, GridOptions};

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let ifile = args.value_of("INPUT").unwrap();
    let ipath = Path::new(ifile);

    let source = match std::fs::read_to_string(&ipath) {
        Err(err) => {
            error!("fatal: unable to read input file `{}`: {}", ipath.display(), err);
            std::process::exit(1);
        }
        Ok(source) => source,
    };

    let program = match gmachine::assemble(&source) {
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1);
        }
        Ok(program) => program,
    };
    debug!("assembled {} words from `{}`", program.len(), ipath.display());

    if args.is_present("print-debug") {
        let mut grid = Grid::new(GridOptions {
            filling: Filling::Spaces(1),
            direction: Direction::LeftToRight,
        });

        for (address, text) in gmachine::assembler::disassemble(&program) {
            grid.add(Cell::from(format!("0x{:04X}:", address)));
            grid.add(Cell::from(text));
        }

        println!("{}", grid.fit_into_columns(2));
    }

    // The compiled artifact defaults to the input path with its `.g` suffix
    // stripped; a path without the suffix is used as-is.
    let opath = match args.value_of("output") {
        Some(filename) => PathBuf::from(filename),
        None => PathBuf::from(ifile.strip_suffix(".g").unwrap_or(ifile)),
    };

    let mut ofile = match File::create(&opath) {
        Err(err) => {
            error!("fatal: unable to open output file `{}`: {}", opath.display(), err);
            std::process::exit(1);
        }
        Ok(file) => file,
    };

    if let Err(err) = gmachine::image::encode(&program, &mut ofile) {
        error!("fatal: unable to write to output file `{}`: {}", opath.display(), err);
        std::process::exit(1);
    }
    if let Err(err) = ofile.flush() {
        error!("fatal: unable to write to output file `{}`: {}", opath.display(), err);
        std::process::exit(1);
    }
}

fn process_arguments() -> ArgMatches<'static> {
    App::new("gc")
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .about("Assembles G-assembly source into a loadable binary image")
        .arg(
            Arg::with_name("INPUT")
                .help("The .g source file to assemble")
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
        .arg(
            Arg::with_name("output")
                .short("o")
                .takes_value(true)
                .help("Write the image to this path instead of stripping .g"),
        )
        .arg(
            Arg::with_name("print-debug")
                .short("d")
                .takes_value(false)
                .help("Print a listing of the assembled image to stdout"),
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
