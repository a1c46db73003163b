use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use np2_tools::release_build::{self, update_raw_file, PackageOutcome, ReleaseBuilder};
use np2_tools::release_config::{locale_override, merge_defines, render_config_header, ReleaseConfig};

/// Held by tests that spawn processes or change the working directory.
static PROCESS_LOCK: Mutex<()> = Mutex::new(());

fn touch(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

/// Source tree laid out like the real one, with the build folder at `build/`.
fn source_tree(root: &Path) -> ReleaseConfig {
	let build: PathBuf = root.join("build");
	touch(&root.join("src/Version.h"), "#define VERSION_MAJOR\t4\n");
	touch(&root.join("src/VersionRev.h"), "#define VERSION_MINOR\t24\n#define VERSION_BUILD\t8\n#define VERSION_REV\t5500\n");
	touch(&root.join("License.txt"), "license");
	touch(&root.join("src/Notepad2.rc"), "notepad2 rc");
	touch(&root.join("metapath/src/metapath.rc"), "metapath rc");

	let mut config = ReleaseConfig::default();
	config.build_folder = build.clone();
	config.zip_files = vec![PathBuf::from("../License.txt")];
	config.archiver = Some(PathBuf::from("7z"));
	fs::create_dir_all(&build).unwrap();

	config
}

#[test]
fn config_header_is_written_once() {
	let dir = tempfile::tempdir().unwrap();
	let header: PathBuf = dir.path().join("config.h");
	let defines = merge_defines(&ReleaseConfig::default().defines, &locale_override("ko", true));
	let content: String = render_config_header(&defines);

	assert!(update_raw_file(&header, content.as_bytes()).unwrap());
	let modified = fs::metadata(&header).unwrap().modified().unwrap();

	assert!(!update_raw_file(&header, content.as_bytes()).unwrap());
	assert_eq!(fs::metadata(&header).unwrap().modified().unwrap(), modified);
	assert_eq!(fs::read_to_string(&header).unwrap(), content);
	assert!(content.starts_with("#pragma once\n\n#define NP2_ENABLE_CUSTOMIZE_TOOLBAR_LABELS\t\t0\n"));
	assert!(content.contains("#define NP2_ENABLE_APP_LOCALIZATION_DLL\t\t0\n"));
}

#[test]
fn packaging_reports_missing_builds() {
	let dir = tempfile::tempdir().unwrap();
	let config: ReleaseConfig = source_tree(dir.path());
	let output: PathBuf = dir.path().join("build/bin/Release");

	for arch in ["ARM64", "x64"] {
		touch(&output.join(arch).join("Notepad2.exe"), "exe");
		touch(&output.join(arch).join("metapath.exe"), "exe");
	}
	touch(&output.join("Win32/Notepad2.exe"), "exe");
	touch(&output.join("x64/locale/ja/Notepad2.dll"), "dll");

	let builder = ReleaseBuilder::new(config, true).unwrap();
	assert_eq!(builder.version().to_string(), "v4.24.8r5500");
	builder.prepare().unwrap();

	let outcomes: Vec<PackageOutcome> = builder.package("ja", "HD_").unwrap();
	assert_eq!(
		outcomes,
		vec![
			PackageOutcome::Packaged { archive: "Notepad2_HD_ja_ARM64_v4.24.8r5500.zip".to_string() },
			PackageOutcome::BuildFailure { locale: "ja".to_string(), arch: "AVX2".to_string() },
			PackageOutcome::BuildFailure { locale: "ja".to_string(), arch: "Win32".to_string() },
			PackageOutcome::Packaged { archive: "Notepad2_HD_ja_x64_v4.24.8r5500.zip".to_string() },
		]
	);

	let staging: PathBuf = dir.path().join("build/temp_zip_dir");
	assert!(staging.join("License.txt").is_file());
	assert!(staging.join("Notepad2.exe").is_file());
	assert!(!staging.join("locale").exists());

	// ARM is packaged for i18n, along with the built locale folder
	let outcomes: Vec<PackageOutcome> = builder.package("i18n", "").unwrap();
	assert_eq!(outcomes[0], PackageOutcome::BuildFailure { locale: "i18n".to_string(), arch: "ARM".to_string() });
	assert!(staging.join("locale/ja/Notepad2.dll").is_file());

	builder.clean();
	assert!(!staging.exists());
	assert!(!dir.path().join("locale/en").exists());
}

#[test]
fn upload_lists_build_folder_archives() {
	let dir = tempfile::tempdir().unwrap();
	let config: ReleaseConfig = source_tree(dir.path());

	touch(&dir.path().join("build/Notepad2_en_x64_v4.24.8r5500.zip"), "zip");
	touch(&dir.path().join("build/Notepad2_HD_en_x64_v4.24.8r5500.zip"), "zip");
	touch(&dir.path().join("build/notes.txt"), "text");

	assert_eq!(
		release_build::release_archives(&config.build_folder).unwrap(),
		vec!["Notepad2_HD_en_x64_v4.24.8r5500.zip".to_string(), "Notepad2_en_x64_v4.24.8r5500.zip".to_string()]
	);
	assert_eq!(release_build::upload(&config, "v4.24.8r5500", true).unwrap(), 2);
}


/// Executable stand-in for 7-Zip running `script` with the archive path as `$4`.
#[cfg(unix)]
fn fake_archiver(dir: &Path, script: &str) -> PathBuf {
	use std::os::unix::fs::PermissionsExt;

	let path: PathBuf = dir.join("fake7z.sh");
	fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
	fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
	path
}

#[cfg(unix)]
#[test]
fn archives_land_in_a_relative_build_folder() {
	let _lock = PROCESS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
	let dir = tempfile::tempdir().unwrap();
	let build: PathBuf = dir.path().join("build");
	let mut config: ReleaseConfig = source_tree(dir.path());

	touch(&build.join("bin/Release/x64/Notepad2.exe"), "exe");
	touch(&build.join("bin/Release/x64/metapath.exe"), "exe");
	touch(&build.join("Notepad2_en_x64_v4.24.8r5500.zip"), "stale");

	config.build_folder = PathBuf::from(".");
	config.arches = vec!["x64".to_string()];
	config.archiver = Some(fake_archiver(dir.path(), r#"printf fresh >> "$4""#));

	let previous: PathBuf = env::current_dir().unwrap();
	env::set_current_dir(&build).unwrap();
	let result = ReleaseBuilder::new(config, false).and_then(|builder| {
		builder.prepare()?;
		builder.package("en", "")
	});
	env::set_current_dir(previous).unwrap();

	assert_eq!(result.unwrap(), vec![PackageOutcome::Packaged { archive: "Notepad2_en_x64_v4.24.8r5500.zip".to_string() }]);
	assert_eq!(fs::read_to_string(build.join("Notepad2_en_x64_v4.24.8r5500.zip")).unwrap(), "fresh");
	assert!(!build.join("temp_zip_dir/Notepad2_en_x64_v4.24.8r5500.zip").exists());
}

#[cfg(unix)]
#[test]
fn full_build_restores_english_resources() {
	let _lock = PROCESS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
	let dir = tempfile::tempdir().unwrap();
	let root: &Path = dir.path();
	let mut config: ReleaseConfig = source_tree(root);

	touch(&root.join("build/bin/Release/x64/Notepad2.exe"), "exe");
	touch(&root.join("build/bin/Release/x64/metapath.exe"), "exe");
	touch(&root.join("locale/ja/Notepad2.rc"), "#include \"../../src/resource.h\"\nja\n");
	touch(&root.join("locale/ja/metapath.rc"), "ja metapath\n");

	// each archive records the config header and rc file it was built from
	let script: String = format!(
		r#"cat "{}" "{}" > "$4""#,
		root.join("src/config.h").display(),
		root.join("src/Notepad2.rc").display()
	);
	config.locales = vec!["i18n".to_string(), "en".to_string(), "ja".to_string()];
	config.arches = vec!["x64".to_string()];
	config.archiver = Some(fake_archiver(root, &script));
	let defaults = config.defines.clone();

	let builder = ReleaseBuilder::new(config, false).unwrap();
	let outcomes: Vec<PackageOutcome> = builder.build_all().unwrap();

	let archives: Vec<String> = ["HD_i18n", "HD_en", "HD_ja", "i18n", "en", "ja"]
		.iter()
		.map(|name| format!("Notepad2_{}_x64_v4.24.8r5500.zip", name))
		.collect();
	let expected: Vec<PackageOutcome> = archives.iter().map(|archive| PackageOutcome::Packaged { archive: archive.clone() }).collect();
	assert_eq!(outcomes, expected);

	let header = |locale: &str, hd: bool| render_config_header(&merge_defines(&defaults, &locale_override(locale, hd)));
	let archive = |name: &str| fs::read_to_string(root.join("build").join(name)).unwrap();

	assert_eq!(archive(&archives[0]), header("i18n", true) + "notepad2 rc");
	assert_eq!(archive(&archives[2]), header("ja", true) + "#include \"resource.h\"\nja\n");
	// the English resources are back before the second pass
	assert_eq!(archive(&archives[3]), header("i18n", false) + "notepad2 rc");
	assert_eq!(archive(&archives[5]), header("ja", false) + "#include \"resource.h\"\nja\n");

	assert_eq!(fs::read_to_string(root.join("src/Notepad2.rc")).unwrap(), "notepad2 rc");
	assert_eq!(fs::read_to_string(root.join("metapath/src/metapath.rc")).unwrap(), "metapath rc");
	assert_eq!(fs::read_to_string(root.join("src/config.h")).unwrap(), header("ja", false));
	assert_eq!(fs::read_to_string(root.join("metapath/src/config.h")).unwrap(), header("ja", false));

	assert!(!root.join("build/temp_zip_dir").exists());
	assert!(!root.join("locale/en").exists());
}
