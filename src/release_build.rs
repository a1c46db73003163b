//! Locale x architecture release matrix around the Visual Studio build
//! scripts, 7-Zip and the GitHub CLI.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ReleaseError;
use crate::release_config::{self, ReleaseConfig, BASE_LOCALE, MULTI_LOCALE};

pub type Result<T> = std::result::Result<T, ReleaseError>;

const NOTEPAD2_EXE: &str = "Notepad2.exe";
const METAPATH_EXE: &str = "metapath.exe";
const NOTEPAD2_RC: &str = "Notepad2.rc";
const METAPATH_RC: &str = "metapath.rc";

/// 32-bit ARM is only built for these locales.
const ARM_LOCALES: [&str; 2] = [MULTI_LOCALE, BASE_LOCALE];


/// Write `content` unless the file already holds exactly that. Returns
/// whether a write happened.
pub fn update_raw_file(path: &Path, content: &[u8]) -> Result<bool> {
	match fs::read(path) {
		Ok(origin) if origin == content => return Ok(false),
		_ => (),
	}

	info!("update: {}", path.display());
	fs::write(path, content).map_err(|source| ReleaseError::io(path, source))?;
	Ok(true)
}


/// `H:MM:SS.mmm`
pub fn format_duration(duration: Duration) -> String {
	let millis: u128 = (duration.as_secs_f64() * 1000.0).round() as u128;
	let (seconds, millis) = (millis / 1000, millis % 1000);
	let (hours, seconds) = (seconds / 3600, seconds % 3600);
	let (minutes, seconds) = (seconds / 60, seconds % 60);

	format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppVersion {
	pub major: String,
	pub minor: String,
	pub build: String,
	pub revision: String,
}

impl fmt::Display for AppVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "v{}.{}.{}r{}", self.major, self.minor, self.build, self.revision)
	}
}

/// Value of `#define <key> <value>` in a version header.
fn define_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
	text.lines().find_map(|line| {
		let mut items = line.split_whitespace();
		match (items.next(), items.next(), items.next()) {
			(Some("#define"), Some(name), Some(value)) if name == key => Some(value),
			_ => None,
		}
	})
}

/// Major from `Version.h`, minor, build and revision from `VersionRev.h`.
pub fn parse_app_version(version_h: &str, version_rev_h: &str) -> std::result::Result<AppVersion, &'static str> {
	Ok(AppVersion {
		major: define_value(version_h, "VERSION_MAJOR").ok_or("VERSION_MAJOR not defined")?.to_string(),
		minor: define_value(version_rev_h, "VERSION_MINOR").ok_or("VERSION_MINOR not defined")?.to_string(),
		build: define_value(version_rev_h, "VERSION_BUILD").ok_or("VERSION_BUILD not defined")?.to_string(),
		revision: define_value(version_rev_h, "VERSION_REV").ok_or("VERSION_REV not defined")?.to_string(),
	})
}

pub fn app_version(version_h: &Path, version_rev_h: &Path) -> Result<AppVersion> {
	let version_text: String = fs::read_to_string(version_h).map_err(|source| ReleaseError::io(version_h, source))?;
	let rev_text: String = fs::read_to_string(version_rev_h).map_err(|source| ReleaseError::io(version_rev_h, source))?;

	parse_app_version(&version_text, &rev_text).map_err(|reason| {
		let path: &Path = if define_value(&version_text, "VERSION_MAJOR").is_none() { version_h } else { version_rev_h };
		ReleaseError::Version { path: path.display().to_string(), reason }
	})
}


pub fn archive_name(prefix: &str, locale: &str, arch: &str, version: &AppVersion) -> String {
	format!("Notepad2_{}{}_{}_{}.zip", prefix, locale, arch, version)
}


/// Localized rc files live two folders deeper than the files they replace;
/// rewrite their include and resource paths for the shallower location.
pub fn restore_resource_include_path(text: &str, metapath: bool) -> String {
	if metapath {
		text.replace("../../metapath/src/", "").replace(r"..\\metapath\\", "")
	}
	else {
		text.replace("../../src/", "").replace(r"..\\..\\res", r"..\\res")
	}
}


/// First `7z.exe` or `7z` on `PATH`, else the bare name.
pub fn find_archiver() -> PathBuf {
	let path_var = env::var_os("PATH").unwrap_or_default();

	for dir in env::split_paths(&path_var) {
		for name in ["7z.exe", "7z"] {
			let candidate: PathBuf = dir.join(name);
			if candidate.is_file() {
				return candidate;
			}
		}
	}

	PathBuf::from("7z.exe")
}


/// Copy every file below `source` into the same relative place below `target`.
pub fn copy_tree(source: &Path, target: &Path) -> Result<usize> {
	let mut copied: usize = 0;

	for entry in WalkDir::new(source).into_iter().filter_map(|entry| entry.ok()) {
		let relative: &Path = match entry.path().strip_prefix(source) {
			Ok(relative) => relative,
			_ => continue,
		};
		let destination: PathBuf = target.join(relative);

		if entry.file_type().is_dir() {
			fs::create_dir_all(&destination).map_err(|source| ReleaseError::io(&destination, source))?;
		}
		else {
			fs::copy(entry.path(), &destination).map_err(|source| ReleaseError::io(&destination, source))?;
			copied += 1;
		}
	}

	Ok(copied)
}


/// What happened to one locale/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
	Packaged { archive: String },
	/// One of the executables was missing after the build.
	BuildFailure { locale: String, arch: String },
	ArchiveFailure { archive: String },
}

impl fmt::Display for PackageOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PackageOutcome::Packaged { archive } => write!(f, "make: {}", archive),
			PackageOutcome::BuildFailure { locale, arch } => write!(f, "{} {} build failure", locale, arch),
			PackageOutcome::ArchiveFailure { archive } => write!(f, "make zip fail: {}", archive),
		}
	}
}


pub struct ReleaseBuilder {
	config: ReleaseConfig,
	version: AppVersion,
	archiver: PathBuf,
	dry_run: bool,
}

impl ReleaseBuilder {
	/// The build folder is made absolute here: 7-Zip runs inside the staging
	/// folder and must still write archives into the build folder.
	pub fn new(mut config: ReleaseConfig, dry_run: bool) -> Result<ReleaseBuilder> {
		config.build_folder = std::path::absolute(&config.build_folder).map_err(|source| ReleaseError::io(&config.build_folder, source))?;
		let version: AppVersion = app_version(&config.resolve(&config.version_header), &config.resolve(&config.version_rev_header))?;
		let archiver: PathBuf = match &config.archiver {
			Some(archiver) => archiver.clone(),
			None => find_archiver(),
		};

		info!("app version: {}", version);
		info!("7z path: {}", archiver.display());

		Ok(ReleaseBuilder { config, version, archiver, dry_run })
	}

	pub fn version(&self) -> &AppVersion {
		&self.version
	}

	fn staging_dir(&self) -> PathBuf {
		self.config.resolve(&self.config.staging_dir)
	}

	/// Runs an external command, logging instead of failing.
	fn run(&self, command: &mut Command, tool: &str, artifact: &str) -> bool {
		info!("run: {:?}", command);
		if self.dry_run {
			return true;
		}

		match command.status() {
			Ok(status) if status.success() => true,
			Ok(status) => {
				warn!(tool, artifact, "exited with {}", status);
				false
			},
			Err(error) => {
				warn!(tool, artifact, "could not start: {}", error);
				false
			},
		}
	}

	/// Source tree writes are skipped in a dry run.
	fn write_source(&self, path: &Path, content: &[u8]) -> Result<bool> {
		if self.dry_run {
			info!("update (dry run): {}", path.display());
			return Ok(false);
		}

		update_raw_file(path, content)
	}

	fn update_config_headers(&self, locale: &str, hd: bool) -> Result<()> {
		let defines = release_config::merge_defines(&self.config.defines, &release_config::locale_override(locale, hd));
		let content: String = release_config::render_config_header(&defines);

		for header in &self.config.config_headers {
			self.write_source(&self.config.resolve(header), content.as_bytes())?;
		}

		Ok(())
	}

	/// Stage the common archive files and back up the English resources,
	/// both only once.
	pub fn prepare(&self) -> Result<()> {
		let staging: PathBuf = self.staging_dir();
		fs::create_dir_all(&staging).map_err(|source| ReleaseError::io(&staging, source))?;

		for file in &self.config.zip_files {
			let source: PathBuf = self.config.resolve(file);
			let target: PathBuf = match source.file_name() {
				Some(name) => staging.join(name),
				None => continue,
			};

			if !target.exists() {
				fs::copy(&source, &target).map_err(|error| ReleaseError::io(&source, error))?;
			}
		}

		let backup: PathBuf = self.config.locale_folder(BASE_LOCALE);
		if !backup.exists() {
			fs::create_dir_all(&backup).map_err(|source| ReleaseError::io(&backup, source))?;

			for (rc, name) in [(&self.config.metapath_rc, METAPATH_RC), (&self.config.notepad2_rc, NOTEPAD2_RC)] {
				let source: PathBuf = self.config.resolve(rc);
				fs::copy(&source, backup.join(name)).map_err(|error| ReleaseError::io(&source, error))?;
			}
		}

		Ok(())
	}

	fn copy_back_localized_resources(&self, locale: &str) -> Result<()> {
		info!("Locale: copy back localized resources for {}.", locale);
		let folder: PathBuf = self.config.locale_folder(locale);

		for (rc, name, metapath) in [(&self.config.metapath_rc, METAPATH_RC, true), (&self.config.notepad2_rc, NOTEPAD2_RC, false)] {
			let source: PathBuf = folder.join(name);
			let text: String = fs::read_to_string(&source).map_err(|error| ReleaseError::io(&source, error))?;
			let restored: String = restore_resource_include_path(&text, metapath);

			self.write_source(&self.config.resolve(rc), restored.as_bytes())?;
		}

		Ok(())
	}

	fn build_project(&self, dir: &Path, target: &str) -> bool {
		let mut command = Command::new("cmd");
		command.args(["/C", "call", "build.bat", "Build", target, "Release"]).current_dir(dir);

		self.run(&mut command, "build.bat", &format!("{} {}", dir.display(), target))
	}

	/// Zip the staged files of every built architecture for `locale`.
	pub fn package(&self, locale: &str, prefix: &str) -> Result<Vec<PackageOutcome>> {
		let staging: PathBuf = self.staging_dir();
		let output_dir: PathBuf = self.config.resolve(&self.config.output_dir);
		let mut outcomes: Vec<PackageOutcome> = Vec::new();

		for arch in &self.config.arches {
			if arch == "ARM" && !ARM_LOCALES.contains(&locale) {
				continue;
			}

			let folder: PathBuf = output_dir.join(arch);
			let notepad2: PathBuf = folder.join(NOTEPAD2_EXE);
			let metapath: PathBuf = folder.join(METAPATH_EXE);

			if !notepad2.is_file() || !metapath.is_file() {
				let outcome = PackageOutcome::BuildFailure { locale: locale.to_string(), arch: arch.clone() };
				warn!("{}", outcome);
				outcomes.push(outcome);
				continue;
			}

			for (exe, name) in [(&notepad2, NOTEPAD2_EXE), (&metapath, METAPATH_EXE)] {
				let target: PathBuf = staging.join(name);
				fs::copy(exe, &target).map_err(|source| ReleaseError::io(&target, source))?;
			}

			let staged_locale: PathBuf = staging.join("locale");
			if staged_locale.exists() {
				fs::remove_dir_all(&staged_locale).map_err(|source| ReleaseError::io(&staged_locale, source))?;
			}

			let built_locale: PathBuf = folder.join("locale");
			if locale == MULTI_LOCALE && built_locale.is_dir() {
				let count: usize = copy_tree(&built_locale, &staged_locale)?;
				debug!("staged {} locale files", count);
			}

			let archive: String = archive_name(prefix, locale, arch, &self.version);
			info!("make: {}", archive);

			let archive_path: PathBuf = self.config.resolve(Path::new(&archive));
			if archive_path.exists() && !self.dry_run {
				fs::remove_file(&archive_path).map_err(|source| ReleaseError::io(&archive_path, source))?;
			}

			let mut command = Command::new(&self.archiver);
			command.args(["a", "-tzip", "-mx=9"]).arg(&archive_path).current_dir(&staging).stdout(Stdio::null());

			if self.run(&mut command, "7z", &archive) {
				outcomes.push(PackageOutcome::Packaged { archive });
			}
			else {
				outcomes.push(PackageOutcome::ArchiveFailure { archive });
			}
		}

		Ok(outcomes)
	}

	/// Every locale for one resolution class, `HD_` prefixed for HD.
	pub fn build_variant(&self, hd: bool, prefix: &str) -> Result<Vec<PackageOutcome>> {
		let project_dir: PathBuf = self.config.resolve(&self.config.project_dir);
		let locale_dir: PathBuf = self.config.resolve(&self.config.locale_dir);
		let mut outcomes: Vec<PackageOutcome> = Vec::new();

		for locale in &self.config.locales {
			info!("build: {} {}", hd, locale);
			self.update_config_headers(locale, hd)?;

			if ARM_LOCALES.contains(&locale.as_str()) {
				self.build_project(&project_dir, "all");
				if locale == MULTI_LOCALE {
					self.build_project(&locale_dir, "all");
				}
			}
			else {
				self.copy_back_localized_resources(locale)?;
				self.build_project(&project_dir, "NoARM");
			}

			outcomes.extend(self.package(locale, prefix)?);
		}

		self.copy_back_localized_resources(BASE_LOCALE)?;
		Ok(outcomes)
	}

	/// Remove the English backup and the staging folder. Failures only warn.
	pub fn clean(&self) {
		for dir in [self.config.locale_folder(BASE_LOCALE), self.staging_dir()] {
			if dir.exists() {
				if let Err(error) = fs::remove_dir_all(&dir) {
					warn!("could not remove {}: {}", dir.display(), error);
				}
			}
		}
	}

	pub fn build_all(&self) -> Result<Vec<PackageOutcome>> {
		info!("project folder: {}", self.config.resolve(&self.config.project_dir).display());
		info!("build folder: {}", self.config.build_folder.display());
		info!("locale folder: {}", self.config.resolve(&self.config.locale_dir).display());

		let start = Instant::now();
		self.prepare()?;

		let mut outcomes: Vec<PackageOutcome> = self.build_variant(true, "HD_")?;
		outcomes.extend(self.build_variant(false, "")?);

		self.clean();
		info!("total build time: {}", format_duration(start.elapsed()));

		Ok(outcomes)
	}
}


/// Archives in the build folder, sorted by name.
pub fn release_archives(build_folder: &Path) -> Result<Vec<String>> {
	let entries = fs::read_dir(build_folder).map_err(|source| ReleaseError::io(build_folder, source))?;
	let mut names: Vec<String> = entries
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.path().is_file())
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.filter(|name| name.ends_with(".zip"))
		.collect();

	names.sort();
	Ok(names)
}

/// `gh release upload <tag> <archives>`. Returns the number of archives.
pub fn upload(config: &ReleaseConfig, tag: &str, dry_run: bool) -> Result<usize> {
	let archives: Vec<String> = release_archives(&config.build_folder)?;
	info!("total artifact: {}", archives.len());

	let mut command = Command::new("gh");
	command.args(["release", "upload", tag]).args(&archives).current_dir(&config.build_folder);
	info!("run: {:?}", command);

	if dry_run {
		return Ok(archives.len());
	}

	let start = Instant::now();
	match command.status() {
		Ok(status) if status.success() => (),
		Ok(status) => warn!(tool = "gh", artifact = tag, "exited with {}", status),
		Err(error) => warn!(tool = "gh", artifact = tag, "could not start: {}", error),
	}
	info!("total upload time: {}", format_duration(start.elapsed()));

	Ok(archives.len())
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn durations() {
		assert_eq!(format_duration(Duration::from_millis(3_723_045)), "1:02:03.045");
		assert_eq!(format_duration(Duration::from_millis(59_999)), "0:00:59.999");
		assert_eq!(format_duration(Duration::from_micros(999_600)), "0:00:01.000");
	}

	#[test]
	fn version_from_headers() {
		let version_h = "#pragma once\n#define VERSION_MAJOR\t4\n#define VERSION_MINOR_OTHER 1\n";
		let version_rev_h = "#define VERSION_MINOR\t24\n#define VERSION_BUILD\t 2\n#define VERSION_REV\t5364\n";

		let version: AppVersion = parse_app_version(version_h, version_rev_h).unwrap();
		assert_eq!(version.to_string(), "v4.24.2r5364");
		assert_eq!(archive_name("HD_", "zh-Hans", "x64", &version), "Notepad2_HD_zh-Hans_x64_v4.24.2r5364.zip");

		assert_eq!(parse_app_version("", version_rev_h), Err("VERSION_MAJOR not defined"));
	}

	#[test]
	fn resource_paths_restored() {
		let notepad2 = "#include \"../../src/resource.h\"\nIDB_TOOLBAR BITMAP \"..\\\\..\\\\res\\\\Toolbar.bmp\"\n";
		assert_eq!(
			restore_resource_include_path(notepad2, false),
			"#include \"resource.h\"\nIDB_TOOLBAR BITMAP \"..\\\\res\\\\Toolbar.bmp\"\n"
		);

		let metapath = "#include \"../../metapath/src/resource.h\"\nIDR_MAINWND ICON \"..\\\\metapath\\\\res\\\\metapath.ico\"\n";
		assert_eq!(
			restore_resource_include_path(metapath, true),
			"#include \"resource.h\"\nIDR_MAINWND ICON \"res\\\\metapath.ico\"\n"
		);
	}

	#[test]
	fn outcome_messages() {
		let failure = PackageOutcome::BuildFailure { locale: "ja".into(), arch: "AVX2".into() };
		assert_eq!(failure.to_string(), "ja AVX2 build failure");
	}
}
