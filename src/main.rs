use std::{env, panic, process};

use backtrace::Backtrace;
use clap::Parser;

use libmdview::cli::{AppConfig, Options};
use libmdview::logging;

fn main() {
    panic::set_hook(Box::new(|panic_info| {
        let message = match panic_info.payload().downcast_ref::<&str>() {
            Some(&message) => message.to_string(),
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(message) => message.clone(),
                None => "<no message>".to_string(),
            },
        };

        log::error!(
            "mdview crashed! You are running mdview {}.",
            env!("CARGO_PKG_VERSION")
        );
        log::error!("This is probably a bug in mdview.");
        log::error!("");
        log::error!("Details: {}", message);

        if let Some(location) = panic_info.location() {
            log::error!("in file {} on line {}", location.file(), location.line());
        }

        let should_backtrace = env::var("RUST_BACKTRACE")
            .map(|var| var == "1")
            .unwrap_or(false);

        if should_backtrace {
            eprintln!("{:?}", Backtrace::new());
        } else {
            eprintln!(
                "note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace."
            );
        }

        process::exit(1);
    }));

    let options = Options::parse();
    let (config, settings_error) = AppConfig::load();

    let file_log_level = if env::var("MDVIEW_NO_FILE_LOG").is_ok() {
        None
    } else {
        config.settings.file_log_level()
    };

    let command_name = format!("mdview-{}", options.subcommand.command_name());

    let _log_guard = logging::init_logging(
        options.global.verbosity,
        options.global.color,
        config.config_dir.as_deref(),
        file_log_level,
        &command_name,
    );

    if let Some(err) = settings_error {
        log::warn!("{}, using default settings", err);
    }

    if let Err(err) = options.run(&config) {
        log::error!("{:?}", err);
        process::exit(1);
    }
}
