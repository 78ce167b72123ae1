extern crate clap;

use clap::Parser;
use clayg::cli::Cli;

pub fn main() {
    if let Err(message) = Cli::parse().run() {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}
