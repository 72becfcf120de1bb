// Standalone demo binary: load one null sink from command-line module
// arguments, let it run for a configurable duration, then unload it
// cleanly. Exists to exercise `Host`/`NullSink` end to end the way the
// library's own tests can't (they never run the demo binary's own
// signal/duration handling).

use std::time::Duration;

use sinkcore::host::Host;
use sinkcore::modargs;

fn main() {
    env_logger::init();

    let mut args_str = String::new();
    let mut run_secs: u64 = 2;

    for arg in std::env::args().skip(1) {
        if let Some(secs) = arg.strip_prefix("--run-secs=") {
            run_secs = secs.parse().unwrap_or_else(|_| {
                eprintln!("invalid --run-secs value {secs:?}");
                std::process::exit(2);
            });
        } else {
            if !args_str.is_empty() {
                args_str.push(' ');
            }
            args_str.push_str(&arg);
        }
    }

    let parsed = match modargs::parse(&args_str) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("nullsinkd: {e}");
            std::process::exit(1);
        }
    };

    log::info!(
        "loading null sink {:?} ({} ch, {} Hz, {})",
        parsed.sink_name,
        parsed.channels,
        parsed.rate,
        parsed.format
    );

    let mut host = Host::new();
    let id = match host.load_null_sink(&parsed) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("nullsinkd: failed to load sink: {e}");
            std::process::exit(1);
        }
    };

    std::thread::sleep(Duration::from_secs(run_secs));

    log::info!("unloading null sink");
    if let Err(e) = host.unload_module(id) {
        eprintln!("nullsinkd: failed to unload sink: {e}");
        std::process::exit(1);
    }
}
