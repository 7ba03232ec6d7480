pub mod cli;
pub mod compile;
pub mod config;
pub mod diag;
pub mod ir;
pub mod oracle;
pub mod pipeline;
pub mod render;
pub mod snapshot;
pub mod store;

use colored::Colorize;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(error) = command_line_interface.run() {
        // fatal: no output is written for the run
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
