//! Sourcehawk CLI binary entry point.
//! Resolves options, delegates to scan/fix/validate/flatten and prints results.

use clap::Parser;
use sourcehawk::cli::{Cli, Commands, CommonArgs, SelectionArgs};
use sourcehawk::config::{self, ExecOptions};
use sourcehawk::error::EngineError;
use sourcehawk::status::ExitStatus;
use sourcehawk::{configuration, fix, logging, output, scan, utils, validate};

fn options(common: &CommonArgs, selection: Option<&SelectionArgs>) -> ExecOptions {
    match config::resolve(&common.overrides(selection)) {
        Ok(options) => options,
        Err(err) => fail(&err),
    }
}

fn fail(err: &EngineError) -> ! {
    eprintln!("{} {err}", utils::error_prefix());
    std::process::exit(ExitStatus::for_error(err).code());
}

fn flatten(options: &ExecOptions) -> Result<String, EngineError> {
    let transport = options.transport()?;
    let access = options.open_repository(transport.clone())?;
    let location = options.effective_config_location(access.as_ref());
    Ok(configuration::flatten(&options.resolver(transport), &location)?)
}

fn main() {
    logging::init_tracing();
    // clap exits with its own status on usage errors
    let cli = Cli::parse();
    let status = match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            ExitStatus::Success
        }
        Commands::Scan { common, selection } => {
            let opts = options(&common, Some(&selection));
            match scan::run_scan(&opts) {
                Ok(verdict) => {
                    output::print_scan(&verdict, opts.output);
                    ExitStatus::for_scan(&verdict)
                }
                Err(err) => fail(&err),
            }
        }
        Commands::Fix {
            common,
            selection,
            dry_run,
        } => {
            let opts = options(&common, Some(&selection));
            match fix::run_fix(&opts, dry_run) {
                Ok(verdict) => {
                    output::print_fix(&verdict, opts.output, dry_run);
                    ExitStatus::for_fix(&verdict)
                }
                Err(err) => fail(&err),
            }
        }
        Commands::ValidateConfig { common } => {
            let opts = options(&common, None);
            match validate::validate_config(&opts) {
                Ok(report) => {
                    output::print_validation(&report, opts.output);
                    // invalid document is reported, not raised
                    if report.is_valid() {
                        ExitStatus::Success
                    } else {
                        ExitStatus::ConfigurationError
                    }
                }
                Err(err) => fail(&err),
            }
        }
        Commands::FlattenConfig { common } => {
            let opts = options(&common, None);
            match flatten(&opts) {
                Ok(yaml) => {
                    print!("{yaml}");
                    ExitStatus::Success
                }
                Err(err) => fail(&err),
            }
        }
    };
    std::process::exit(status.code());
}
