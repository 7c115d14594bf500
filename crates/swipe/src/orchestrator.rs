//! The generation pipeline: load packages, discover entry points, build
//! models, run generators into keyed in-memory files, then clean up and
//! write.
//!
//! One package's failure does not poison the others: processing fails
//! fast on the first error inside a package and keeps aggregating
//! diagnostics across packages. Nothing is deleted or written unless
//! every in-memory emission succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use swipe_gen::{
    ConfigGenerator, DocGenerator, MarkdownGenerator, OpenapiGenerator, PrettyFormat,
    SourceGenerator, SourceWriter, TransportGenerator,
};
use swipe_model::{ConfigModel, ModelError, ServiceModel, build_config, build_service};
use swipe_parse::{ParseError, Package, Program, find_build_call, parse_option};

use crate::registry::{Processor, processor_for};

/// One emitted file, prepared in memory.
#[derive(Debug, Clone)]
pub struct GenResult {
    /// The directory the file belongs to.
    pub pkg_path: PathBuf,
    pub output_path: PathBuf,
    pub content: Vec<u8>,
    /// Per-file diagnostics (formatting failures); these do not prevent
    /// other files from being emitted.
    pub errs: Vec<String>,
}

enum Job {
    Service { model: ServiceModel, base: PathBuf },
    Config { model: ConfigModel, base: PathBuf },
}

/// One generation run over a set of package patterns.
pub struct Swipe {
    wd: PathBuf,
    version: String,
    patterns: Vec<String>,
}

impl Swipe {
    pub fn new(wd: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            wd: wd.into(),
            version: crate::VERSION.to_string(),
            patterns,
        }
    }

    /// Override the version stamped into generated banners.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Load the packages and prepare every output in memory.
    pub fn generate(&self) -> (Vec<GenResult>, Vec<String>) {
        let program = match Program::load(&self.wd, &self.patterns) {
            Ok(program) => program,
            Err(errs) => return (Vec::new(), errs.iter().map(ToString::to_string).collect()),
        };
        self.generate_program(&program)
    }

    /// Prepare every output for an already-loaded program.
    pub fn generate_program(&self, program: &Program) -> (Vec<GenResult>, Vec<String>) {
        let mut diagnostics = Vec::new();
        let mut jobs = Vec::new();

        for package in &program.packages {
            match collect_jobs(program, package) {
                Ok(mut package_jobs) => jobs.append(&mut package_jobs),
                Err(message) => diagnostics.push(message),
            }
        }

        // Service ids are the trait names; prefix the package name where
        // two entry points collide.
        let mut id_counts: BTreeMap<String, usize> = BTreeMap::new();
        for job in &jobs {
            if let Job::Service { model, .. } = job {
                *id_counts.entry(model.id.clone()).or_default() += 1;
            }
        }
        for job in &mut jobs {
            if let Job::Service { model, .. } = job
                && id_counts.get(&model.id).copied().unwrap_or_default() > 1
            {
                model.qualify_with_package();
            }
        }

        let mut sources: BTreeMap<(PathBuf, String), SourceWriter> = BTreeMap::new();
        let mut docs: BTreeMap<(PathBuf, String), Vec<u8>> = BTreeMap::new();
        let mut file_errs: BTreeMap<(PathBuf, String), Vec<String>> = BTreeMap::new();

        for job in &jobs {
            match job {
                Job::Service { model, base } => {
                    let transport = TransportGenerator::new(model.clone());
                    run_source(&mut sources, base, &transport, &mut file_errs);
                    if model.transport.openapi.enable {
                        let openapi = OpenapiGenerator::new(model, &program.index);
                        run_doc(&mut docs, base, &openapi, &mut file_errs);
                    }
                    if model.transport.markdown.enable && model.transport.json_rpc.enable {
                        let markdown = MarkdownGenerator::new(model, &program.index);
                        run_doc(&mut docs, base, &markdown, &mut file_errs);
                    }
                }
                Job::Config { model, base } => {
                    let config = ConfigGenerator::new(model.clone());
                    run_source(&mut sources, base, &config, &mut file_errs);
                }
            }
        }

        let formatter = PrettyFormat;
        let mut results = Vec::new();
        for ((dir, filename), writer) in &sources {
            if writer.is_empty() {
                continue;
            }
            let mut errs = file_errs
                .remove(&(dir.clone(), filename.clone()))
                .unwrap_or_default();
            let content = match writer.frame(&self.version, &formatter) {
                Ok(text) => text.into_bytes(),
                Err(err) => {
                    errs.push(err.to_string());
                    Vec::new()
                }
            };
            results.push(GenResult {
                pkg_path: dir.clone(),
                output_path: dir.join(filename),
                content,
                errs,
            });
        }
        for ((dir, filename), content) in &docs {
            let errs = file_errs
                .remove(&(dir.clone(), filename.clone()))
                .unwrap_or_default();
            results.push(GenResult {
                pkg_path: dir.clone(),
                output_path: dir.join(filename),
                content: content.clone(),
                errs,
            });
        }
        // Emission errors on files that produced no content at all.
        for ((dir, filename), errs) in file_errs {
            results.push(GenResult {
                pkg_path: dir.clone(),
                output_path: dir.join(filename),
                content: Vec::new(),
                errs,
            });
        }
        results.sort_by(|a, b| a.output_path.cmp(&b.output_path));
        (results, diagnostics)
    }

    /// Generate, then delete previously generated files and write the new
    /// outputs.
    ///
    /// Package-level diagnostics leave that package's outputs out of the
    /// result set but do not block the others. If any in-memory emission
    /// failed, nothing is deleted and nothing is written.
    pub fn run(&self) -> (Vec<GenResult>, Vec<String>) {
        let program = match Program::load(&self.wd, &self.patterns) {
            Ok(program) => program,
            Err(errs) => return (Vec::new(), errs.iter().map(ToString::to_string).collect()),
        };
        let (results, mut diagnostics) = self.generate_program(&program);
        let emission_failed = results
            .iter()
            .any(|r| !r.errs.is_empty() || r.content.is_empty());
        if emission_failed || results.is_empty() {
            return (results, diagnostics);
        }

        // Only directories that produced output are cleaned; a failed
        // package's directory stays untouched.
        let base_paths: BTreeSet<PathBuf> =
            results.iter().map(|r| r.pkg_path.clone()).collect();
        for base in &base_paths {
            let pattern = format!("{}/*_gen.*", base.display());
            let Ok(paths) = glob::glob(&pattern) else {
                continue;
            };
            for path in paths.flatten() {
                tracing::debug!(path = %path.display(), "removing previously generated file");
                if let Err(err) = fs::remove_file(&path) {
                    diagnostics.push(format!("{}: {err}", path.display()));
                }
            }
        }
        if !diagnostics.is_empty() {
            return (results, diagnostics);
        }

        for result in &results {
            if result.content.is_empty() {
                continue;
            }
            if let Some(parent) = result.output_path.parent() {
                if let Err(err) = fs::create_dir_all(parent) {
                    diagnostics.push(format!("{}: {err}", parent.display()));
                    continue;
                }
            }
            if let Err(err) = fs::write(&result.output_path, &result.content) {
                diagnostics.push(format!("{}: {err}", result.output_path.display()));
            } else {
                tracing::info!(path = %result.output_path.display(), "wrote generated file");
            }
        }
        (results, diagnostics)
    }
}

fn collect_jobs(program: &Program, package: &Package) -> Result<Vec<Job>, String> {
    let base = detect_base_path(package).map_err(|err| err.to_string())?;
    let mut jobs = Vec::new();
    for file in &package.files {
        for item in &file.ast.items {
            let syn::Item::Fn(func) = item else { continue };
            let Some(arg) = find_build_call(func) else {
                continue;
            };
            let opt = parse_option(&file.path, arg).map_err(|err| err.to_string())?;
            match processor_for(&opt.name) {
                Some(Processor::Service) => {
                    let model =
                        build_service(&program.index, &opt).map_err(|err| err.to_string())?;
                    tracing::info!(
                        service = model.id.as_str(),
                        package = package.name.as_str(),
                        "building service model"
                    );
                    jobs.push(Job::Service {
                        model,
                        base: base.clone(),
                    });
                }
                Some(Processor::ConfigEnv) => {
                    let model =
                        build_config(&program.index, &opt).map_err(|err| err.to_string())?;
                    jobs.push(Job::Config {
                        model,
                        base: base.clone(),
                    });
                }
                None => {
                    return Err(ParseError::UnknownOption {
                        name: opt.name.clone(),
                        position: opt.position.clone(),
                    }
                    .to_string());
                }
            }
        }
    }
    Ok(jobs)
}

/// The directory shared by a package's files; a package straddling
/// directories is rejected rather than guessed at.
fn detect_base_path(package: &Package) -> Result<PathBuf, ModelError> {
    let mut dirs = package.files.iter().filter_map(|f| f.path.parent());
    let Some(first) = dirs.next() else {
        return Ok(package.path.clone());
    };
    for dir in dirs {
        if dir != first {
            return Err(ModelError::ConflictingDirectories {
                first: first.to_path_buf(),
                second: dir.to_path_buf(),
            });
        }
    }
    Ok(first.to_path_buf())
}

fn run_source(
    sources: &mut BTreeMap<(PathBuf, String), SourceWriter>,
    base: &Path,
    generator: &dyn SourceGenerator,
    file_errs: &mut BTreeMap<(PathBuf, String), Vec<String>>,
) {
    let dir = resolve_dir(base, generator.output_dir());
    let key = (dir, generator.filename());
    let writer = sources.entry(key.clone()).or_default();
    if let Err(err) = generator.generate(writer) {
        file_errs.entry(key).or_default().push(err.to_string());
    }
}

fn run_doc(
    docs: &mut BTreeMap<(PathBuf, String), Vec<u8>>,
    base: &Path,
    generator: &dyn DocGenerator,
    file_errs: &mut BTreeMap<(PathBuf, String), Vec<String>>,
) {
    let dir = resolve_dir(base, generator.output_dir());
    let key = (dir, generator.filename());
    match generator.generate() {
        Ok(content) => {
            docs.insert(key, content);
        }
        Err(err) => {
            file_errs.entry(key).or_default().push(err.to_string());
        }
    }
}

fn resolve_dir(base: &Path, dir: Option<PathBuf>) -> PathBuf {
    match dir {
        None => base.to_path_buf(),
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => normalize(&base.join(dir)),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
