//! Command-line assembly for a single compile.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::error::Result;

use super::options::{CompileOptions, CompileRequest};
use super::sink::DiagnosticSink;
use super::toolchain::default_toolchain;

/// Flags every compile gets: debug symbols, position-independent code,
/// hidden default visibility and shared-library output.
const BASE_FLAGS: &str = "-g -fPIC -fvisibility=hidden -shared";

/// A validated compile invocation.
///
/// Construction fails if the optimization level was never resolved, so an
/// ambiguous command line can never be produced.
#[derive(Debug)]
pub struct Invocation<'a> {
    options: &'a CompileOptions,
    request: &'a CompileRequest,
    optimization_flag: &'static str,
}

impl<'a> Invocation<'a> {
    /// Validate options and request for a compile.
    pub fn new(options: &'a CompileOptions, request: &'a CompileRequest) -> Result<Self> {
        let optimization_flag = options.optimization.flag()?;
        Ok(Self {
            options,
            request,
            optimization_flag,
        })
    }

    /// The toolchain executable this invocation runs.
    pub fn toolchain(&self) -> Cow<'a, str> {
        match &self.options.toolchain {
            Some(path) => path.to_string_lossy(),
            None => Cow::Borrowed(default_toolchain()),
        }
    }

    /// The intermediate directory, if one is configured.
    pub fn intermediate_dir(&self) -> Option<&'a Path> {
        self.options.intermediate_dir.as_deref()
    }

    /// Assemble the command line.
    ///
    /// `intermediate_ready` says whether the intermediate directory exists;
    /// only then does the command change into it and keep temporaries.
    pub fn command_line(&self, intermediate_ready: bool) -> String {
        let options = self.options;
        let request = self.request;

        // Verbatim, so a launcher prefix such as `ccache g++` works.
        let mut args: Vec<String> = vec![self.toolchain().into_owned(), BASE_FLAGS.to_string()];

        #[cfg(not(target_pointer_width = "64"))]
        args.push("-m32".to_string());

        args.push(self.optimization_flag.to_string());

        let cd_into = options
            .intermediate_dir
            .as_deref()
            .filter(|_| intermediate_ready);
        if cd_into.is_some() {
            args.push("--save-temps".to_string());
        }

        for dir in &options.include_dirs {
            args.push(format!("-I{}", quoted(&dir.to_string_lossy())));
        }

        // -F as well as -L, for toolchains that search frameworks separately.
        for dir in &options.library_dirs {
            let dir = quoted(&dir.to_string_lossy());
            args.push(format!("-L{}", dir));
            args.push(format!("-F{}", dir));
        }

        args.push(format!("-o {}", quoted(&request.module.to_string_lossy())));

        let compile_flags = options.compile_flags.trim();
        if !compile_flags.is_empty() {
            args.push(compile_flags.to_string());
        }

        let link_flags = options.link_flags.trim();
        if !link_flags.is_empty() {
            args.push(format!("-Wl,{}", link_flags));
        }

        for source in &request.sources {
            args.push(quoted(&source.to_string_lossy()));
        }

        for library in &request.link_libraries {
            args.push(library.clone());
        }

        let command = args.join(" ");
        match cd_into {
            Some(dir) => format!("cd {}\n{}", quoted(&dir.to_string_lossy()), command),
            None => command,
        }
    }
}

/// Make sure the intermediate directory exists, creating it if needed.
///
/// The outcome is reported to the sink. Failure never stops the compile;
/// the command simply runs without an intermediate directory.
pub fn ensure_intermediate_dir(dir: &Path, sink: &dyn DiagnosticSink) -> bool {
    if dir.is_dir() {
        return true;
    }

    match fs::create_dir_all(dir) {
        Ok(()) => {
            sink.info(&format!(
                "[kiln] Created intermediate folder \"{}\"\n",
                dir.display()
            ));
            true
        }
        Err(e) => {
            sink.error(&format!(
                "[kiln] Error creating intermediate folder \"{}\": {}\n",
                dir.display(),
                e
            ));
            false
        }
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::compile::options::OptimizationLevel;
    use crate::compile::sink::{RecordingSink, Severity};
    use crate::error::Error;

    fn debug_options() -> CompileOptions {
        CompileOptions {
            optimization: OptimizationLevel::Debug,
            ..Default::default()
        }
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_single_source_debug() {
        let options = debug_options();
        let request = CompileRequest::new(["src.cpp"], "out.so");
        let line = Invocation::new(&options, &request)
            .unwrap()
            .command_line(false);

        assert!(line.starts_with(default_toolchain()));
        assert!(line.contains("-g -fPIC -fvisibility=hidden -shared"));
        assert!(line.contains("-O0"));
        assert!(!line.contains("-Os"));
        assert!(line.contains(r#"-o "out.so" "src.cpp""#));
        assert!(!line.contains("--save-temps"));
        assert!(!line.contains("-Wl,"));
        assert_eq!(count(&line, "-o "), 1);
        #[cfg(target_pointer_width = "64")]
        assert!(!line.contains("-m32"));
    }

    #[test]
    fn test_size_optimization() {
        let options = CompileOptions {
            optimization: OptimizationLevel::Size,
            ..Default::default()
        };
        let request = CompileRequest::new(["src.cpp"], "out.so");
        let line = Invocation::new(&options, &request)
            .unwrap()
            .command_line(false);

        assert!(line.contains("-Os"));
        assert!(!line.contains("-O0"));
    }

    #[test]
    fn test_default_optimization_rejected() {
        let options = CompileOptions::default();
        let request = CompileRequest::new(["src.cpp"], "out.so");
        assert!(matches!(
            Invocation::new(&options, &request),
            Err(Error::UnresolvedOptimization)
        ));
    }

    #[test]
    fn test_directory_flags_in_order() {
        let options = CompileOptions {
            include_dirs: vec![PathBuf::from("inc/a"), PathBuf::from("inc/b")],
            library_dirs: vec![PathBuf::from("lib/x"), PathBuf::from("lib/y")],
            ..debug_options()
        };
        let request = CompileRequest::new(["a.cpp", "b.cpp"], "mod.so");
        let line = Invocation::new(&options, &request)
            .unwrap()
            .command_line(false);

        assert_eq!(count(&line, "-I\""), 2);
        assert_eq!(count(&line, "-L\""), 2);
        assert_eq!(count(&line, "-F\""), 2);
        assert_eq!(count(&line, "-o "), 1);

        let pos = |needle: &str| line.find(needle).unwrap();
        assert!(pos(r#"-I"inc/a""#) < pos(r#"-I"inc/b""#));
        assert!(pos(r#"-L"lib/x""#) < pos(r#"-F"lib/x""#));
        assert!(pos(r#"-F"lib/x""#) < pos(r#"-L"lib/y""#));
        assert!(pos(r#"-I"inc/b""#) < pos(r#"-L"lib/x""#));
        assert!(pos(r#"-F"lib/y""#) < pos("-o "));
        assert!(pos(r#""a.cpp""#) < pos(r#""b.cpp""#));
    }

    #[test]
    fn test_flags_and_libraries() {
        let options = CompileOptions {
            compile_flags: "-std=c++17 -DHOT".to_string(),
            link_flags: "-rpath,.".to_string(),
            ..debug_options()
        };
        let request = CompileRequest::new(["src.cpp"], "out.so")
            .link("-lm")
            .link("libextra.a");
        let line = Invocation::new(&options, &request)
            .unwrap()
            .command_line(false);

        let pos = |needle: &str| line.find(needle).unwrap();
        assert!(pos("-o ") < pos("-std=c++17 -DHOT"));
        assert!(pos("-std=c++17 -DHOT") < pos("-Wl,-rpath,."));
        assert!(pos("-Wl,-rpath,.") < pos(r#""src.cpp""#));
        assert!(line.ends_with(r#""src.cpp" -lm libextra.a"#));
        assert!(!line.contains(r#""-lm""#));
    }

    #[test]
    fn test_intermediate_dir_prefix() {
        let options = CompileOptions {
            intermediate_dir: Some(PathBuf::from("build/tmp")),
            ..debug_options()
        };
        let request = CompileRequest::new(["src.cpp"], "out.so");
        let invocation = Invocation::new(&options, &request).unwrap();

        let ready = invocation.command_line(true);
        assert!(ready.starts_with("cd \"build/tmp\"\n"));
        assert!(ready.contains("-O0 --save-temps"));

        let missing = invocation.command_line(false);
        assert!(!missing.starts_with("cd "));
        assert!(!missing.contains("--save-temps"));
    }

    #[test]
    fn test_configured_toolchain() {
        let options = CompileOptions {
            toolchain: Some(PathBuf::from("/opt/llvm/bin/clang++")),
            ..debug_options()
        };
        let request = CompileRequest::new(["src.cpp"], "out.so");
        let line = Invocation::new(&options, &request)
            .unwrap()
            .command_line(false);
        assert!(line.starts_with("/opt/llvm/bin/clang++ -g"));
    }

    #[test]
    fn test_ensure_intermediate_dir_creates() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("obj").join("nested");
        let sink = RecordingSink::new();

        assert!(ensure_intermediate_dir(&dir, &sink));
        assert!(dir.is_dir());
        assert_eq!(sink.with_severity(Severity::Info).len(), 1);

        // Already present: nothing to report.
        assert!(ensure_intermediate_dir(&dir, &sink));
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_ensure_intermediate_dir_failure_is_logged() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let sink = RecordingSink::new();

        assert!(!ensure_intermediate_dir(&blocker.join("obj"), &sink));
        assert_eq!(sink.error_count(), 1);
    }
}
