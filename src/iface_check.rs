//! Consistency checks for Scintilla's `.iface` interface definitions:
//! message number holes and collisions, lexer and style id collisions.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// First and last style ids shared by every lexer (`StylesCommon`).
pub const STYLE_FIRST_PREDEFINED: u32 = 32;
pub const STYLE_LAST_PREDEFINED: u32 = 39;

/// API message numbers at or above this are provisional and not audited.
pub const API_ID_LIMIT: u32 = 3000;

const DEPRECATED_SENTINEL: &str = "cat Deprecated";

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+#.+").expect("valid comment pattern"));
static FEATURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(fun|get|set)\s+(\w+)\s+(\w+)\s*=\s*(\d+)").expect("valid feature pattern"));
static COMMENTED_FEATURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\s*(fun|get|set)\s+(\w+)\s+(\w+)\s*=\s*(\d+)").expect("valid feature pattern"));
static VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bval\s+(\w+)\s*=\s*(\d+)").expect("valid value pattern"));
static LEXER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blex\s+(\w+)\s*=(.+)").expect("valid lexer pattern"));


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
	Fun,
	Get,
	Set,
	Val,
}

impl FeatureKind {
	fn from_keyword(keyword: &str) -> FeatureKind {
		match keyword {
			"fun" => FeatureKind::Fun,
			"get" => FeatureKind::Get,
			"set" => FeatureKind::Set,
			_ => FeatureKind::Val,
		}
	}
}

/// One numbered declaration. `value_type` is empty for `val`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
	pub kind: FeatureKind,
	pub value_type: String,
	pub name: String,
	pub id: u32,
}

/// `lex NAME=SCLEX_X SCE_X_` line: the lexer and the prefixes it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerDecl {
	pub name: String,
	pub prefixes: Vec<String>,
}

/// Declarations of the active part of an interface file, comments removed
/// and everything from `cat Deprecated` on ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Iface {
	pub features: Vec<Feature>,
	pub lexers: Vec<LexerDecl>,
}


pub fn strip_comments(text: &str) -> String {
	COMMENT.replace_all(text, "").into_owned()
}

fn active_section(text: &str) -> &str {
	match text.find(DEPRECATED_SENTINEL) {
		Some(index) if index > 0 => &text[..index],
		_ => text,
	}
}

fn deprecated_section(text: &str) -> Option<&str> {
	match text.find(DEPRECATED_SENTINEL) {
		Some(index) if index > 0 => Some(&text[index..]),
		_ => None,
	}
}

fn features_in(text: &str, pattern: &Regex) -> Vec<Feature> {
	pattern
		.captures_iter(text)
		.filter_map(|captures| {
			let id: u32 = captures[4].parse().ok()?;
			Some(Feature {
				kind: FeatureKind::from_keyword(&captures[1]),
				value_type: captures[2].to_string(),
				name: captures[3].to_string(),
				id,
			})
		})
		.collect()
}


pub fn parse_iface(text: &str) -> Iface {
	let stripped: String = strip_comments(text);
	let active: &str = active_section(&stripped);

	let mut features: Vec<Feature> = features_in(active, &FEATURE);

	for captures in VALUE.captures_iter(active) {
		if let Ok(id) = captures[2].parse::<u32>() {
			features.push(Feature {
				kind: FeatureKind::Val,
				value_type: String::new(),
				name: captures[1].to_string(),
				id,
			});
		}
	}

	let lexers: Vec<LexerDecl> = LEXER
		.captures_iter(active)
		.map(|captures| LexerDecl {
			name: captures[1].to_string(),
			prefixes: captures[2].split_whitespace().map(str::to_string).collect(),
		})
		.collect();

	debug!("iface: {} features, {} lexers", features.len(), lexers.len());
	Iface { features, lexers }
}


/// Every integer missing between consecutive values of an ascending list.
pub fn find_holes(sorted: &[u32]) -> Vec<u32> {
	let mut holes: Vec<u32> = Vec::new();

	for pair in sorted.windows(2) {
		if pair[1] > pair[0].saturating_add(1) {
			holes.extend(pair[0] + 1..pair[1]);
		}
	}

	holes
}


/// An id claimed by more than one name, names in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
	pub id: u32,
	pub names: Vec<String>,
}

fn collect_duplicates<'a>(entries: impl Iterator<Item = (u32, &'a str)>) -> (BTreeMap<u32, Vec<String>>, Vec<Duplicate>) {
	let mut by_id: BTreeMap<u32, Vec<String>> = BTreeMap::new();
	let mut order: Vec<u32> = Vec::new();

	for (id, name) in entries {
		let names: &mut Vec<String> = by_id.entry(id).or_default();
		if names.len() == 1 {
			order.push(id);
		}
		names.push(name.to_string());
	}

	let duplicates: Vec<Duplicate> = order
		.into_iter()
		.map(|id| Duplicate { id, names: by_id[&id].clone() })
		.collect();

	(by_id, duplicates)
}


#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApiReport {
	pub duplicates: Vec<Duplicate>,
	/// Sorted distinct ids below `API_ID_LIMIT`.
	pub ids: Vec<u32>,
	pub holes: Vec<u32>,
	/// Holes held by commented-out declarations.
	pub used: Vec<(u32, String)>,
	/// Holes held by declarations in the deprecated section.
	pub deprecated: Vec<(u32, String)>,
	pub unused: Vec<u32>,
}

pub fn find_api_holes(text: &str) -> ApiReport {
	let iface: Iface = parse_iface(text);
	let api = iface.features.iter().filter(|feature| feature.kind != FeatureKind::Val);
	let (by_id, duplicates) = collect_duplicates(api.map(|feature| (feature.id, feature.name.as_str())));

	let ids: Vec<u32> = by_id.keys().copied().filter(|&id| id < API_ID_LIMIT).collect();
	let holes: Vec<u32> = find_holes(&ids);

	let mut report = ApiReport { duplicates, ids, holes, ..ApiReport::default() };
	if report.holes.is_empty() {
		return report;
	}

	let in_holes = |feature: &Feature| report.holes.binary_search(&feature.id).is_ok();
	let mut used: Vec<(u32, String)> = features_in(text, &COMMENTED_FEATURE)
		.into_iter()
		.filter(in_holes)
		.map(|feature| (feature.id, feature.name))
		.collect();

	let mut deprecated: Vec<(u32, String)> = match deprecated_section(text) {
		Some(section) => features_in(section, &FEATURE)
			.into_iter()
			.filter(in_holes)
			.map(|feature| (feature.id, feature.name))
			.collect(),
		None => Vec::new(),
	};

	used.sort();
	deprecated.sort();

	report.unused = report
		.holes
		.iter()
		.copied()
		.filter(|id| !used.iter().chain(deprecated.iter()).any(|(held, _)| held == id))
		.collect();
	report.used = used;
	report.deprecated = deprecated;

	report
}

fn join_held(held: &[(u32, String)]) -> String {
	held.iter().map(|(id, name)| format!("{} {}", id, name)).collect::<Vec<String>>().join(", ")
}

impl fmt::Display for ApiReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for duplicate in &self.duplicates {
			writeln!(f, "{}", duplicate)?;
		}

		match (self.ids.first(), self.ids.last()) {
			(Some(min), Some(max)) => writeln!(f, "min, max and holes: {} {} {:?}", min, max, self.holes)?,
			_ => writeln!(f, "no message numbers below {}", API_ID_LIMIT)?,
		}

		if !self.holes.is_empty() {
			writeln!(f, "used: {}", join_held(&self.used))?;
			writeln!(f, "deprecated: {}", join_held(&self.deprecated))?;
			writeln!(f, "unused: {:?}", self.unused)?;
		}

		Ok(())
	}
}

impl fmt::Display for Duplicate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "duplicate value: {} {}", self.id, self.names.join(" "))
	}
}


#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LexerReport {
	/// `SCLEX_` ids claimed twice.
	pub lexer_duplicates: Vec<Duplicate>,
	/// Style ids inside the predefined range, as `(id, name)`.
	pub reserved: Vec<(u32, String)>,
	/// Style ids claimed twice within one lexer, as `(lexer, duplicate)`.
	pub style_duplicates: Vec<(String, Duplicate)>,
	/// Style names whose prefix no `lex` line owns.
	pub orphans: Vec<String>,
}

/// `SCE_HTML_TAG` -> `SCE_HTML_`.
fn style_prefix(name: &str) -> Option<&str> {
	let end: usize = name.get(4..)?.find('_')? + 4;
	Some(&name[..=end])
}

pub fn check_lexer_definition(text: &str) -> LexerReport {
	let iface: Iface = parse_iface(text);
	let values = iface.features.iter().filter(|feature| feature.kind == FeatureKind::Val);

	let lexer_ids = values.clone().filter(|feature| feature.name.starts_with("SCLEX_"));
	let (_, lexer_duplicates) = collect_duplicates(lexer_ids.map(|feature| (feature.id, feature.name.as_str())));

	let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
	for lexer in &iface.lexers {
		let name: &str = if lexer.name == "XML" { "HTML" } else { &lexer.name };
		for prefix in &lexer.prefixes {
			owners.insert(prefix.as_str(), name);
		}
	}

	let mut report = LexerReport { lexer_duplicates, ..LexerReport::default() };
	let mut styles: BTreeMap<&str, Vec<(u32, &str)>> = BTreeMap::new();

	for feature in values.filter(|feature| feature.name.starts_with("SCE_")) {
		let lexer: &str = match style_prefix(&feature.name).and_then(|prefix| owners.get(prefix)) {
			Some(lexer) => *lexer,
			None => {
				report.orphans.push(feature.name.clone());
				continue;
			},
		};

		if (STYLE_FIRST_PREDEFINED..=STYLE_LAST_PREDEFINED).contains(&feature.id) {
			report.reserved.push((feature.id, feature.name.clone()));
		}

		styles.entry(lexer).or_default().push((feature.id, &feature.name));
	}

	for (lexer, entries) in styles {
		let (_, duplicates) = collect_duplicates(entries.into_iter());
		report.style_duplicates.extend(duplicates.into_iter().map(|duplicate| (lexer.to_string(), duplicate)));
	}

	report
}

impl LexerReport {
	pub fn is_clean(&self) -> bool {
		self.lexer_duplicates.is_empty() && self.reserved.is_empty() && self.style_duplicates.is_empty() && self.orphans.is_empty()
	}
}

impl fmt::Display for LexerReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for duplicate in &self.lexer_duplicates {
			writeln!(f, "{}", duplicate)?;
		}

		for (id, name) in &self.reserved {
			writeln!(f, "error value: {} {}", id, name)?;
		}

		for (lexer, duplicate) in &self.style_duplicates {
			writeln!(f, "{} in {}", duplicate, lexer)?;
		}

		for name in &self.orphans {
			writeln!(f, "no lexer for style: {}", name)?;
		}

		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	const API: &str = "\
cat Basics

fun void ClearAll=2004(,)
get int GetLength=2006(,)
set void SetSavePoint=2014(,) # mark the document clean
fun void Duplicated=2004(,)
# fun void Removed=2005(,)
fun int Provisional=4000(,)
cat Deprecated
fun void OldCall=2008(,)
";

	#[test]
	fn holes_between_sorted_values() {
		assert_eq!(find_holes(&[1, 2, 5, 6, 9]), vec![3, 4, 7, 8]);
		assert_eq!(find_holes(&[7]), Vec::<u32>::new());
		assert_eq!(find_holes(&[]), Vec::<u32>::new());
		assert_eq!(find_holes(&[u32::MAX, u32::MAX]), Vec::<u32>::new());
		assert_eq!(find_holes(&[u32::MAX - 2, u32::MAX]), vec![u32::MAX - 1]);
	}

	#[test]
	fn comments_and_deprecated_section_are_skipped() {
		let iface: Iface = parse_iface(API);
		let names: Vec<&str> = iface.features.iter().map(|feature| feature.name.as_str()).collect();

		assert_eq!(names, vec!["ClearAll", "GetLength", "SetSavePoint", "Duplicated", "Provisional"]);
		assert_eq!(iface.features[1].kind, FeatureKind::Get);
		assert_eq!(iface.features[1].value_type, "int");
	}

	#[test]
	fn api_report_classifies_holes() {
		let report: ApiReport = find_api_holes(API);

		assert_eq!(report.duplicates, vec![Duplicate { id: 2004, names: vec!["ClearAll".into(), "Duplicated".into()] }]);
		assert_eq!(report.ids, vec![2004, 2006, 2014]);
		assert_eq!(report.holes, vec![2005, 2007, 2008, 2009, 2010, 2011, 2012, 2013]);
		assert_eq!(report.used, vec![(2005, "Removed".to_string())]);
		assert_eq!(report.deprecated, vec![(2008, "OldCall".to_string())]);
		assert_eq!(report.unused, vec![2007, 2009, 2010, 2011, 2012, 2013]);

		let text: String = report.to_string();
		assert!(text.starts_with("duplicate value: 2004 ClearAll Duplicated\n"));
		assert!(text.contains("min, max and holes: 2004 2014"));
	}

	#[test]
	fn style_prefix_ends_at_second_underscore() {
		assert_eq!(style_prefix("SCE_HTML_TAG"), Some("SCE_HTML_"));
		assert_eq!(style_prefix("SCE_C_DEFAULT"), Some("SCE_C_"));
		assert_eq!(style_prefix("SCE_NOPREFIX"), None);
	}

	#[test]
	fn lexer_check_reports_every_problem() {
		let text: &str = "\
val SCLEX_CONTAINER=0
val SCLEX_CPP=3
val SCLEX_HTML=4
val SCLEX_XML=3
lex Cpp=SCLEX_CPP SCE_C_
lex HTML=SCLEX_HTML SCE_H_
lex XML=SCLEX_XML SCE_X_
val SCE_C_DEFAULT=0
val SCE_C_COMMENT=1
val SCE_C_WORD=1
val SCE_H_TAG=1
val SCE_X_TAG=1
val SCE_C_BRACE=34
val SCE_Q_STRAY=2
";
		let report: LexerReport = check_lexer_definition(text);

		assert_eq!(report.lexer_duplicates, vec![Duplicate { id: 3, names: vec!["SCLEX_CPP".into(), "SCLEX_XML".into()] }]);
		assert_eq!(report.reserved, vec![(34, "SCE_C_BRACE".to_string())]);
		assert_eq!(report.orphans, vec!["SCE_Q_STRAY".to_string()]);

		let lexers: Vec<&str> = report.style_duplicates.iter().map(|(lexer, _)| lexer.as_str()).collect();
		assert_eq!(lexers, vec!["Cpp", "HTML"]);
		assert_eq!(report.style_duplicates[1].1.names, vec!["SCE_H_TAG".to_string(), "SCE_X_TAG".to_string()]);
		assert!(!report.is_clean());
	}

	#[test]
	fn clean_lexer_file_reports_nothing() {
		let report: LexerReport = check_lexer_definition("val SCLEX_CPP=3\nlex Cpp=SCLEX_CPP SCE_C_\nval SCE_C_DEFAULT=0\n");
		assert!(report.is_clean());
		assert_eq!(report.to_string(), "");
	}
}
