mod cli;

use clap::Parser;
use cloudip::{ConfigBuilder, Dispatcher};
use log::error;
use std::process::ExitCode;

/*-------------------------------------------------------------------------------------------------
  Main CLI Function
-------------------------------------------------------------------------------------------------*/

fn main() -> ExitCode {
    let args = cli::Args::parse();
    cli::log::init(&args.verbose);

    let config = match ConfigBuilder::new().providers(args.providers()).build() {
        Ok(config) => config,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = match Dispatcher::new(&config) {
        Ok(dispatcher) => dispatcher,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let results = dispatcher.check(&args.ips);
    cli::log::check_results(&results);

    match cli::output::render(args.format, &results, args.header, &args.delimiter) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("Unable to render results: {error}");
            ExitCode::FAILURE
        }
    }
}
