use anyhow::Result;
use clap::Parser;
use go_package_analyzer::{cli, logging, output, BuildContext};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init(logging::Verbosity::from_flags(args.verbose, args.quiet));

    let ctx = BuildContext::host_default();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // Every failure is reported in-band inside a record; the exit status is
    // always zero.
    for dir in &args.dirs {
        let pkg = go_package_analyzer::analyze_package(dir, &ctx);
        output::emit(&mut out, pkg);
    }

    Ok(())
}
