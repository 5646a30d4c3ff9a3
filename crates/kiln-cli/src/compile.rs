//! Compile command implementation for Kiln CLI.
//!
//! Builds one module from the command line and waits for the toolchain.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, ValueEnum};
use kiln_core::compile::Invocation;
use kiln_core::{
    BuildDirs, CompileOptions, CompileRequest, CompilerDriver, DriverConfig, OptimizationLevel,
};

use crate::console::{self, ConsoleSink};

/// How often a running compile is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Optimization tier as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OptArg {
    /// No optimization
    Debug,
    /// Optimize for size
    Size,
    /// Debug for debug builds of kiln, size otherwise
    Default,
}

impl From<OptArg> for OptimizationLevel {
    fn from(opt: OptArg) -> Self {
        match opt {
            OptArg::Debug => Self::Debug,
            OptArg::Size => Self::Size,
            OptArg::Default => Self::Default,
        }
    }
}

/// Arguments shared by `compile` and `watch`.
#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    /// Source files to compile
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Output module (default: .kiln/modules/ next to the first source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include directory (repeatable)
    #[arg(short = 'I', long = "include")]
    pub include_dirs: Vec<PathBuf>,

    /// Library directory (repeatable)
    #[arg(short = 'L', long = "library-dir")]
    pub library_dirs: Vec<PathBuf>,

    /// Library to link, e.g. `m` or `libfoo.a` (repeatable)
    #[arg(short = 'l', long = "link")]
    pub libraries: Vec<String>,

    /// Toolchain executable (may include a launcher, e.g. "ccache g++")
    #[arg(long)]
    pub toolchain: Option<PathBuf>,

    /// Extra compile flags
    #[arg(long, allow_hyphen_values = true)]
    pub cflags: Option<String>,

    /// Extra link flags, passed through -Wl,
    #[arg(long, allow_hyphen_values = true)]
    pub lflags: Option<String>,

    /// Optimization level
    #[arg(long, value_enum)]
    pub opt: Option<OptArg>,

    /// Intermediate directory (also the toolchain's working directory)
    #[arg(long)]
    pub intermediate: Option<PathBuf>,

    /// JSON options file; command-line flags are applied on top
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Give up on a compile after this many seconds
    #[arg(long, default_value = "300")]
    pub timeout: u64,
}

impl CompileArgs {
    /// Options from the config file (if any) with flags applied on top.
    pub fn options(&self) -> anyhow::Result<CompileOptions> {
        let mut options = match &self.config {
            Some(path) => CompileOptions::load(path)?,
            None => CompileOptions::default(),
        };

        if let Some(toolchain) = &self.toolchain {
            options.toolchain = Some(toolchain.clone());
        }
        options.include_dirs.extend(self.include_dirs.iter().cloned());
        options.library_dirs.extend(self.library_dirs.iter().cloned());
        if let Some(flags) = &self.cflags {
            options.compile_flags = join_flags(&options.compile_flags, flags);
        }
        if let Some(flags) = &self.lflags {
            options.link_flags = join_flags(&options.link_flags, flags);
        }
        if let Some(opt) = self.opt {
            options.optimization = opt.into();
        }
        if let Some(dir) = &self.intermediate {
            options.intermediate_dir = Some(dir.clone());
        }

        options.optimization = options.optimization.resolve();
        Ok(options)
    }

    /// The compile request described by the arguments.
    pub fn request(&self) -> CompileRequest {
        let module = self.output.clone().unwrap_or_else(|| self.default_module());
        self.libraries
            .iter()
            .fold(CompileRequest::new(self.sources.iter().cloned(), module), |request, lib| {
                request.link(library_arg(lib))
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn default_module(&self) -> PathBuf {
        let first = self.sources.first().map(PathBuf::as_path).unwrap_or(Path::new("module"));
        let name = first
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());
        BuildDirs::from_source_path(first).module_path(&name)
    }
}

fn join_flags(base: &str, extra: &str) -> String {
    match (base.trim(), extra.trim()) {
        ("", extra) => extra.to_string(),
        (base, "") => base.to_string(),
        (base, extra) => format!("{} {}", base, extra),
    }
}

/// `m` becomes `-lm`; flags and file names pass through.
fn library_arg(lib: &str) -> String {
    let is_file = Path::new(lib).extension().is_some() || lib.contains('/');
    if lib.starts_with('-') || is_file {
        lib.to_string()
    } else {
        format!("-l{}", lib)
    }
}

/// Result of one finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The module was produced and no errors were reported.
    Built { elapsed: Duration },
    /// The toolchain reported errors or produced nothing.
    Failed { errors: usize, module_missing: bool },
    /// The toolchain did not finish in time and was killed.
    TimedOut,
}

/// Run one compile to completion.
///
/// The previous module is removed first, so a missing module reliably
/// means the toolchain failed.
pub async fn build_once(
    driver: &mut CompilerDriver,
    sink: &ConsoleSink,
    options: &CompileOptions,
    request: &CompileRequest,
    timeout: Duration,
) -> anyhow::Result<BuildOutcome> {
    let start = Instant::now();
    sink.reset();

    if request.module.exists() {
        if let Err(e) = fs::remove_file(&request.module) {
            tracing::warn!("failed to remove previous module {}: {}", request.module.display(), e);
        }
    }
    if let Some(parent) = request.module.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    driver.run_compile(options, request)?;

    while !driver.is_complete() {
        if start.elapsed() >= timeout {
            driver.abort();
            return Ok(BuildOutcome::TimedOut);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let errors = sink.error_count();
    let module_missing = !request.module.exists();
    if errors > 0 || module_missing {
        Ok(BuildOutcome::Failed {
            errors,
            module_missing,
        })
    } else {
        Ok(BuildOutcome::Built {
            elapsed: start.elapsed(),
        })
    }
}

/// Print a build outcome.
pub fn report(outcome: &BuildOutcome, request: &CompileRequest) {
    match outcome {
        BuildOutcome::Built { elapsed } => println!(
            "{}Built{} {} in {:.2}s",
            console::GREEN,
            console::RESET,
            request.module.display(),
            elapsed.as_secs_f64()
        ),
        BuildOutcome::Failed {
            errors,
            module_missing,
        } => {
            if *errors > 0 {
                eprintln!(
                    "{}Build failed{} with {} error(s)",
                    console::RED,
                    console::RESET,
                    errors
                );
            }
            if *module_missing {
                eprintln!(
                    "{}Build failed{}: module was not produced: {}",
                    console::RED,
                    console::RESET,
                    request.module.display()
                );
            }
        }
        BuildOutcome::TimedOut => eprintln!(
            "{}Build timed out{}, toolchain was killed",
            console::RED,
            console::RESET
        ),
    }
}

/// Execute the compile command.
pub async fn execute(args: &CompileArgs, dry_run: bool) -> anyhow::Result<()> {
    let options = args.options()?;
    let request = args.request();

    if dry_run {
        let invocation = Invocation::new(&options, &request)?;
        let ready = invocation.intermediate_dir().is_some_and(Path::is_dir);
        println!("{}", invocation.command_line(ready));
        return Ok(());
    }

    let sink = Arc::new(ConsoleSink::new());
    let mut driver = CompilerDriver::new(sink.clone(), DriverConfig::default());

    let outcome = build_once(&mut driver, &sink, &options, &request, args.timeout()).await?;
    report(&outcome, &request);

    match outcome {
        BuildOutcome::Built { .. } => Ok(()),
        BuildOutcome::Failed { errors, .. } if errors > 0 => {
            anyhow::bail!("compile failed with {} error(s)", errors)
        }
        BuildOutcome::Failed { .. } => anyhow::bail!("compile produced no module"),
        BuildOutcome::TimedOut => anyhow::bail!("compile timed out after {}s", args.timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CompileArgs,
    }

    fn parse(argv: &[&str]) -> CompileArgs {
        let argv = std::iter::once("kiln").chain(argv.iter().copied());
        TestCli::parse_from(argv).args
    }

    #[test]
    fn test_flags_build_options() {
        let args = parse(&[
            "a.cpp", "b.cpp", "-o", "out.so", "-I", "inc", "-L", "lib", "-l", "m", "-l",
            "libx.a", "--cflags", "-std=c++17", "--opt", "size",
        ]);
        let options = args.options().unwrap();
        let request = args.request();

        assert_eq!(options.include_dirs, vec![PathBuf::from("inc")]);
        assert_eq!(options.library_dirs, vec![PathBuf::from("lib")]);
        assert_eq!(options.compile_flags, "-std=c++17");
        assert_eq!(options.optimization, OptimizationLevel::Size);
        assert_eq!(request.module, PathBuf::from("out.so"));
        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.link_libraries, vec!["-lm", "libx.a"]);
    }

    #[test]
    fn test_default_optimization_is_resolved() {
        let options = parse(&["a.cpp", "--opt", "default"]).options().unwrap();
        assert_ne!(options.optimization, OptimizationLevel::Default);

        let options = parse(&["a.cpp"]).options().unwrap();
        assert_ne!(options.optimization, OptimizationLevel::Default);
    }

    #[test]
    fn test_config_file_then_flags() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("kiln.json");
        fs::write(
            &config,
            r#"{ "include_dirs": ["base"], "compile_flags": "-DBASE", "optimization": "debug" }"#,
        )
        .unwrap();

        let args = parse(&[
            "a.cpp",
            "--config",
            config.to_str().unwrap(),
            "-I",
            "extra",
            "--cflags",
            "-DEXTRA",
        ]);
        let options = args.options().unwrap();

        assert_eq!(
            options.include_dirs,
            vec![PathBuf::from("base"), PathBuf::from("extra")]
        );
        assert_eq!(options.compile_flags, "-DBASE -DEXTRA");
        assert_eq!(options.optimization, OptimizationLevel::Debug);
    }

    #[test]
    fn test_default_module_path() {
        let request = parse(&["src/physics.cpp"]).request();
        assert!(request.module.starts_with("src/.kiln/modules"));
        assert!(
            request
                .module
                .to_string_lossy()
                .contains("physics")
        );
    }

    #[test]
    fn test_library_arg() {
        assert_eq!(library_arg("m"), "-lm");
        assert_eq!(library_arg("-lpthread"), "-lpthread");
        assert_eq!(library_arg("libfoo.a"), "libfoo.a");
        assert_eq!(library_arg("deps/foo"), "deps/foo");
    }

    #[test]
    fn test_join_flags() {
        assert_eq!(join_flags("", "-O1"), "-O1");
        assert_eq!(join_flags("-a", ""), "-a");
        assert_eq!(join_flags("-a", " -b "), "-a -b");
    }
}
