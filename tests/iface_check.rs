use np2_tools::iface_check::{check_lexer_definition, find_api_holes, find_holes, ApiReport, LexerReport};

const SCINTILLA_IFACE: &str = "\
## Scintilla interface excerpt
cat Basics

# Add text to the document at current position.
fun void AddText=2001(position length, string text)
fun void InsertText=2003(position pos, string text)
get position GetLength=2006(,)
fun void ClearAll=2004(,)
set void SetUndoCollection=2012(bool collectUndo,)
fun void SetSavePoint=2014(,)
fun void AlsoClearAll=2004(,) # collides
get int GetCharacterCategoryOptimization=2721(,)

cat Provisional
fun void ChangeSelection=4010(,)

cat Deprecated
fun void SetStyleBits=2090(int bits,)
";

#[test]
fn single_hole_is_reported_as_unused() {
	let text: &str = "fun void A=2001(,)\nfun void B=2002(,)\nfun void D=2004(,)\n";
	let report: ApiReport = find_api_holes(text);

	assert_eq!(report.holes, vec![2003]);
	assert_eq!(report.unused, vec![2003]);
	assert!(report.used.is_empty());
	assert!(report.deprecated.is_empty());
}

#[test]
fn duplicate_message_numbers_list_every_name() {
	let report: ApiReport = find_api_holes(SCINTILLA_IFACE);

	assert_eq!(report.duplicates.len(), 1);
	assert_eq!(report.duplicates[0].id, 2004);
	assert_eq!(report.duplicates[0].names, vec!["ClearAll".to_string(), "AlsoClearAll".to_string()]);
	assert_eq!(report.ids.first(), Some(&2001));
	assert_eq!(report.ids.last(), Some(&2721));
	assert!(!report.ids.contains(&4010));
}

#[test]
fn holes_cover_the_whole_range() {
	let report: ApiReport = find_api_holes(SCINTILLA_IFACE);

	assert_eq!(report.holes, find_holes(&report.ids));
	assert!(report.holes.contains(&2002));
	assert!(report.holes.contains(&2090));
	assert_eq!(report.deprecated, vec![(2090, "SetStyleBits".to_string())]);
	assert!(!report.unused.contains(&2090));
	assert_eq!(report.unused.len() + report.deprecated.len() + report.used.len(), report.holes.len());
}

#[test]
fn lexer_file_with_problems_still_reports_everything() {
	let text: &str = "\
cat Default
val SCLEX_CONTAINER=0
val SCLEX_NULL=1
val SCLEX_PYTHON=2
val SCLEX_CPP=3
val SCLEX_OTHER=3
lex Python=SCLEX_PYTHON SCE_P_
lex Cpp=SCLEX_CPP SCE_C_
val SCE_P_DEFAULT=0
val SCE_P_COMMENTLINE=1
val SCE_C_DEFAULT=0
val SCE_C_COMMENT=1
val SCE_C_PREPROCESSOR=39
val SCE_C_STRAY=1
val SCE_UNKNOWN_DEFAULT=0
";
	let report: LexerReport = check_lexer_definition(text);

	assert_eq!(report.lexer_duplicates.len(), 1);
	assert_eq!(report.reserved, vec![(39, "SCE_C_PREPROCESSOR".to_string())]);
	assert_eq!(report.style_duplicates.len(), 1);
	assert_eq!(report.style_duplicates[0].0, "Cpp");
	assert_eq!(report.orphans, vec!["SCE_UNKNOWN_DEFAULT".to_string()]);

	let printed: String = report.to_string();
	assert!(printed.contains("duplicate value: 3 SCLEX_CPP SCLEX_OTHER"));
	assert!(printed.contains("error value: 39 SCE_C_PREPROCESSOR"));
}
