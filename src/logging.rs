use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Logs go to stderr so `convert` output on stdout stays clean.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "arch_wiki_md=info",
        1 => "arch_wiki_md=debug",
        _ => "arch_wiki_md=trace,reqwest=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // a second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
