//! Watch command implementation for Kiln CLI.
//!
//! Compiles a module, then recompiles it whenever one of its sources changes.

use std::sync::Arc;

use kiln_core::{CompilerDriver, DriverConfig};

use crate::compile::{self, CompileArgs};
use crate::console::{self, ConsoleSink};
use crate::watcher::{SourceEvent, SourceWatcher};

/// Execute the watch command.
pub async fn execute(args: &CompileArgs, fast: bool) -> anyhow::Result<()> {
    let options = args.options()?;
    let request = args.request();

    let module_name = request
        .module
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    console::header("Kiln Watch", &module_name);
    println!(
        "{}Watching {} source(s) for changes... (Ctrl+C to stop){}",
        console::DIM,
        request.sources.len(),
        console::RESET
    );
    println!();

    let mut watcher = SourceWatcher::new(&request.sources)?;

    let sink = Arc::new(ConsoleSink::new());
    let config = if fast {
        DriverConfig::fast()
    } else {
        DriverConfig::default()
    };
    let mut driver = CompilerDriver::new(sink.clone(), config);

    // Initial build
    let outcome = compile::build_once(&mut driver, &sink, &options, &request, args.timeout()).await?;
    compile::report(&outcome, &request);

    loop {
        tokio::select! {
            event = watcher.recv() => {
                match event {
                    Some(SourceEvent::Modified(path)) => {
                        // Changes saved during the last build are covered by this one.
                        watcher.drain();
                        println!(
                            "\n{}Changed{} {}, recompiling...",
                            console::YELLOW,
                            console::RESET,
                            path.display()
                        );

                        match compile::build_once(&mut driver, &sink, &options, &request, args.timeout()).await {
                            Ok(outcome) => compile::report(&outcome, &request),
                            Err(e) => eprintln!("{}Error:{} {}", console::RED, console::RESET, e),
                        }
                    }
                    Some(SourceEvent::Removed(path)) => {
                        eprintln!(
                            "\n{}Warning:{} Source file removed: {}",
                            console::YELLOW,
                            console::RESET,
                            path.display()
                        );
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}Stopping{}", console::DIM, console::RESET);
                break;
            }
        }
    }

    // Kill the shell (fast mode keeps one alive between builds).
    driver.abort();
    Ok(())
}
