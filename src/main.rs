mod cli;

use std::process;

use tasklog::config::Config;
use tasklog::logging;

fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    logging::init(config.log.as_deref());

    if let Err(e) = cli::run(&config) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
