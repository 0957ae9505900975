use clap_verbosity_flag::Verbosity;
use cloudip::CheckResult;
use log::{info, warn};

/*-------------------------------------------------------------------------------------------------
  Logging Functions
-------------------------------------------------------------------------------------------------*/

/// Initialize stderr logging for the binary and the `cloudip` library at the requested
/// verbosity.
pub fn init(verbose: &Verbosity) {
    let result = stderrlog::new()
        .module("cloudip")
        .verbosity(verbose.log_level_filter())
        .init();

    if let Err(error) = result {
        eprintln!("Unable to initialize logging: {error}");
    }
}

/*--------------------------------------------------------------------------------------
  Check Results
--------------------------------------------------------------------------------------*/

pub fn check_results(results: &[CheckResult]) {
    let matched = results.iter().filter(|result| result.provider.is_some()).count();
    info!("Checked {} IP address(es); {} matched a provider", results.len(), matched);

    let failed = results.iter().filter(|result| result.is_error()).count();
    if failed > 0 {
        warn!("{failed} lookup(s) failed");
    };
}
