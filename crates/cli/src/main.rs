use tracing_subscriber::prelude::*;

fn main() {
    init_tracing();

    if let Err(error) = lecturemark_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("warn,lecturemark_cli=info,viewer_core=info")
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry().with(filter).with(stderr_layer).init();
}
