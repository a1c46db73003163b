use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ReleaseError;

pub const HIDPI_IMAGE_RESOURCE: &str = "NP2_ENABLE_HIDPI_IMAGE_RESOURCE";
pub const APP_LOCALIZATION_DLL: &str = "NP2_ENABLE_APP_LOCALIZATION_DLL";
pub const LOCALIZE_LEXER_NAME: &str = "NP2_ENABLE_LOCALIZE_LEXER_NAME";
pub const LOCALIZE_STYLE_NAME: &str = "NP2_ENABLE_LOCALIZE_STYLE_NAME";

/// Locale shipping every translation as DLLs.
pub const MULTI_LOCALE: &str = "i18n";
pub const BASE_LOCALE: &str = "en";


/// One `#define` of the generated config headers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Define {
	pub name: String,
	pub value: i64,
}

impl Define {
	fn new(name: &str, value: i64) -> Define {
		Define { name: name.to_string(), value }
	}
}


/// Layout of the source tree and the build matrix. Relative paths are
/// resolved against `build_folder`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
	pub build_folder: PathBuf,
	pub project_dir: PathBuf,
	pub locale_dir: PathBuf,
	/// Folder of the per-architecture build outputs, `<arch>/Notepad2.exe`.
	pub output_dir: PathBuf,
	pub staging_dir: PathBuf,
	pub config_headers: Vec<PathBuf>,
	pub notepad2_rc: PathBuf,
	pub metapath_rc: PathBuf,
	pub version_header: PathBuf,
	pub version_rev_header: PathBuf,
	/// Copied into every archive next to the executables.
	pub zip_files: Vec<PathBuf>,
	pub locales: Vec<String>,
	pub arches: Vec<String>,
	/// Explicit 7-Zip executable; searched on `PATH` when absent.
	pub archiver: Option<PathBuf>,
	#[serde(rename = "define")]
	pub defines: Vec<Define>,
}

impl Default for ReleaseConfig {
	fn default() -> Self {
		Self {
			build_folder: PathBuf::from("."),
			project_dir: PathBuf::from("VS2017"),
			locale_dir: PathBuf::from("../locale"),
			output_dir: PathBuf::from("bin/Release"),
			staging_dir: PathBuf::from("temp_zip_dir"),
			config_headers: vec![PathBuf::from("../src/config.h"), PathBuf::from("../metapath/src/config.h")],
			notepad2_rc: PathBuf::from("../src/Notepad2.rc"),
			metapath_rc: PathBuf::from("../metapath/src/metapath.rc"),
			version_header: PathBuf::from("../src/Version.h"),
			version_rev_header: PathBuf::from("../src/VersionRev.h"),
			zip_files: vec![
				PathBuf::from("../License.txt"),
				PathBuf::from("../doc/Notepad2.ini"),
				PathBuf::from("../doc/Notepad2 DarkTheme.ini"),
				PathBuf::from("../metapath/doc/metapath.ini"),
			],
			locales: ["i18n", "en", "it", "ja", "ko", "zh-Hans", "zh-Hant"].iter().map(|s| s.to_string()).collect(),
			arches: ["ARM", "ARM64", "AVX2", "Win32", "x64"].iter().map(|s| s.to_string()).collect(),
			archiver: None,
			defines: vec![
				Define::new("NP2_ENABLE_CUSTOMIZE_TOOLBAR_LABELS", 0),
				Define::new(HIDPI_IMAGE_RESOURCE, 1),
				Define::new("NP2_ENABLE_DOT_LOG_FEATURE", 0),
				Define::new(APP_LOCALIZATION_DLL, 1),
				Define::new("NP2_ENABLE_TEST_LOCALIZATION_LAYOUT", 0),
				Define::new(LOCALIZE_LEXER_NAME, 1),
				Define::new(LOCALIZE_STYLE_NAME, 1),
			],
		}
	}
}

impl ReleaseConfig {
	/// Read `path` when given, defaults otherwise. Keys missing from the
	/// file keep their default.
	pub fn load(path: Option<&Path>) -> Result<ReleaseConfig, ReleaseError> {
		let path: &Path = match path {
			Some(path) => path,
			None => return Ok(ReleaseConfig::default()),
		};

		let text: String = fs::read_to_string(path).map_err(|source| ReleaseError::io(path, source))?;
		let config: ReleaseConfig = toml::from_str(&text).map_err(|source| ReleaseError::Config {
			path: path.display().to_string(),
			source,
		})?;

		debug!("release config {}: {} locales, {} arches", path.display(), config.locales.len(), config.arches.len());
		Ok(config)
	}

	pub fn resolve(&self, path: &Path) -> PathBuf {
		self.build_folder.join(path)
	}

	/// Localized copies of the rc files live in `<locale_dir>/<locale>/`.
	pub fn locale_folder(&self, locale: &str) -> PathBuf {
		self.resolve(&self.locale_dir).join(locale)
	}
}


/// Config changes for one locale and resolution class. HD builds keep the
/// high resolution images; only `i18n` loads localization DLLs; `en` has no
/// localized lexer or style names.
pub fn locale_override(locale: &str, hd: bool) -> Vec<Define> {
	let mut changes: Vec<Define> = Vec::new();

	if !hd {
		changes.push(Define::new(HIDPI_IMAGE_RESOURCE, 0));
	}

	if locale != MULTI_LOCALE {
		changes.push(Define::new(APP_LOCALIZATION_DLL, 0));
	}

	if locale == BASE_LOCALE {
		changes.push(Define::new(LOCALIZE_LEXER_NAME, 0));
		changes.push(Define::new(LOCALIZE_STYLE_NAME, 0));
	}

	changes
}


/// `defaults` with `changes` applied in place. Unknown names are appended.
pub fn merge_defines(defaults: &[Define], changes: &[Define]) -> Vec<Define> {
	let mut merged: Vec<Define> = defaults.to_vec();

	for change in changes {
		match merged.iter_mut().find(|define| define.name == change.name) {
			Some(define) => define.value = change.value,
			None => merged.push(change.clone()),
		}
	}

	merged
}


/// Header text: `#pragma once`, a blank line, then one define per line in
/// order, newline terminated.
pub fn render_config_header(defines: &[Define]) -> String {
	let mut lines: Vec<String> = vec!["#pragma once".to_string(), String::new()];
	lines.extend(defines.iter().map(|define| format!("#define {}\t\t{}", define.name, define.value)));
	lines.push(String::new());

	lines.join("\n")
}


#[cfg(test)]
mod tests {
	use super::*;

	fn value_of(defines: &[Define], name: &str) -> i64 {
		defines.iter().find(|define| define.name == name).map(|define| define.value).unwrap()
	}

	#[test]
	fn overrides_per_locale() {
		assert_eq!(locale_override("i18n", true), vec![]);
		assert_eq!(locale_override("ja", true), vec![Define::new(APP_LOCALIZATION_DLL, 0)]);

		let en: Vec<Define> = merge_defines(&ReleaseConfig::default().defines, &locale_override("en", false));
		assert_eq!(value_of(&en, HIDPI_IMAGE_RESOURCE), 0);
		assert_eq!(value_of(&en, APP_LOCALIZATION_DLL), 0);
		assert_eq!(value_of(&en, LOCALIZE_LEXER_NAME), 0);
		assert_eq!(value_of(&en, LOCALIZE_STYLE_NAME), 0);
		assert_eq!(value_of(&en, "NP2_ENABLE_DOT_LOG_FEATURE"), 0);
	}

	#[test]
	fn merge_keeps_declaration_order() {
		let merged: Vec<Define> = merge_defines(
			&[Define::new("A", 1), Define::new("B", 1)],
			&[Define::new("C", 5), Define::new("A", 0)],
		);
		let names: Vec<&str> = merged.iter().map(|define| define.name.as_str()).collect();

		assert_eq!(names, vec!["A", "B", "C"]);
		assert_eq!(merged[0].value, 0);
	}

	#[test]
	fn header_layout() {
		let text: String = render_config_header(&[Define::new("A", 1), Define::new("B", 0)]);
		assert_eq!(text, "#pragma once\n\n#define A\t\t1\n#define B\t\t0\n");
	}

	#[test]
	fn partial_file_keeps_defaults() {
		let config: ReleaseConfig = toml::from_str(
			"locales = [\"en\"]\narchiver = \"C:/7z/7z.exe\"\n\n[[define]]\nname = \"X\"\nvalue = 2\n",
		)
		.unwrap();

		assert_eq!(config.locales, vec!["en".to_string()]);
		assert_eq!(config.arches.len(), 5);
		assert_eq!(config.archiver, Some(PathBuf::from("C:/7z/7z.exe")));
		assert_eq!(config.defines, vec![Define::new("X", 2)]);
	}
}
