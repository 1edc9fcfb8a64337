use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use sheetgrade::application::{
    currency_conversion, grade_batch, income_analysis, student_name_from_stem, unit_conversions, Submission,
};
use sheetgrade::domain::{
    normalize_formula, CellValue, CountryDirectory, ExchangeRateTable, FeedbackItem, RateSnapshot, RatesError,
    StudentName, Workbook, Worksheet,
};
use sheetgrade::infrastructure::FileRepository;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn rates() -> RateSnapshot {
    ExchangeRateTable::new([("MXN", 18.0), ("ARS", 950.0), ("EUR", 0.92), ("OMR", 0.385)])
}

fn codes(feedback: &[FeedbackItem]) -> Vec<&str> {
    feedback.iter().map(|item| item.code.as_str()).collect()
}

/// A fully correct currency tab for "Maria_Lopez".
const MARIA_CURRENCY: &str = "\
tab,cell,value,format
Currency Conversion,C15,M,
Currency Conversion,D15,A,
Currency Conversion,E15,L,
Currency Conversion,F15,O,
Currency Conversion,C16,Mexico,
Currency Conversion,D16,Argentina,
Currency Conversion,E16,Luxembourg,
Currency Conversion,F16,Oman,
Currency Conversion,C17,10/01/2026,
Currency Conversion,D17,2026-10-10,
Currency Conversion,E17,10/15/2026,
Currency Conversion,F17,09/30/2026,
Currency Conversion,C18,MXN,
Currency Conversion,D18,ARS,
Currency Conversion,E18,EUR,
Currency Conversion,F18,OMR,
Currency Conversion,C19,18.1,0.000
Currency Conversion,D19,940,#.000
Currency Conversion,E19,0.93,0.000
Currency Conversion,F19,0.38,0.000
Currency Conversion,C20,=B4*C19,\"$#,##0.00\"
Currency Conversion,D20,=D19*B4,\"$#,##0.00\"
Currency Conversion,E20,= $B$4 * $E$19,\"$#,##0.00\"
Currency Conversion,F20,=(B4*F19),\"$#,##0.00\"
Currency Conversion,C21,=D4/C19,Currency
Currency Conversion,D21,=D4/D19,Currency
Currency Conversion,E21,=D4/E19,Currency
Currency Conversion,F21,=D4/F19,Currency
";

#[test]
fn test_full_marks_currency_tab_from_csv_snapshot() {
    let workbook = FileRepository::read_workbook_csv(MARIA_CURRENCY.as_bytes()).unwrap();
    let snapshot = rates();
    let reports = grade_batch(
        &[Submission::new("Maria_Lopez", workbook)],
        today(),
        &snapshot,
        CountryDirectory::builtin(),
    );

    let currency = reports[0].currency_conversion.as_ref().unwrap();
    assert_eq!(currency.row15_score, 2.0);
    assert_eq!(currency.row15_feedback[0].code, "CC15_ALL_CORRECT");
    assert_eq!(currency.row16_score, 2.0);
    assert_eq!(currency.row17_score, 2.0);
    assert_eq!(currency.row18_score, 4.0);
    assert_eq!(currency.row19_accuracy_score, 4.0);
    assert_eq!(currency.row19_format_score, 1.0);
    assert_eq!(currency.row20_formula_score, 8.0);
    assert_eq!(currency.row21_formula_score, 8.0);
    assert_eq!(currency.formatting_total, 4.0);
    assert_eq!(currency.section_total(), 34.0);

    // the other two tabs are absent from this snapshot
    assert_eq!(reports[0].failures.len(), 2);
}

#[test]
fn test_rate_fetch_failure_only_zeroes_rate_row() {
    let workbook = FileRepository::read_workbook_csv(MARIA_CURRENCY.as_bytes()).unwrap();
    let failed: RateSnapshot = Err(RatesError::Transport("timeout".into()));
    let reports = grade_batch(
        &[Submission::new("Maria_Lopez", workbook)],
        today(),
        &failed,
        CountryDirectory::builtin(),
    );

    let currency = reports[0].currency_conversion.as_ref().unwrap();
    assert_eq!(currency.row19_accuracy_score, 0.0);
    assert_eq!(currency.row19_format_score, 0.0);
    assert_eq!(codes(&currency.row19_feedback), ["CC19_API_FETCH_FAILED"]);
    assert_eq!(currency.row19_feedback[0].param_str("error"), Some("timeout"));
    assert_eq!(currency.row18_score, 4.0);
    assert_eq!(currency.row20_formula_score, 8.0);
    assert_eq!(currency.formatting_total, 3.0);
}

#[test]
fn test_fallback_letter_for_short_names() {
    assert_eq!(StudentName::parse("Al").initials(), ['A', 'L', 'A', 'L']);
    assert_eq!(StudentName::parse("A_Lopez").initials(), ['A', 'M', 'L', 'O']);

    let sheet = Worksheet::new()
        .with("C15", CellValue::Text("a".into()))
        .with("D15", CellValue::Text("m".into()));
    let result = currency_conversion::check_name_letters(&sheet, &StudentName::parse("A_Lopez"));
    assert_eq!(result.score, 1.0);
}

#[test]
fn test_scores_stay_in_bounds_for_malformed_cells() {
    let junk = [
        CellValue::Blank,
        CellValue::Text("".into()),
        CellValue::Text("???".into()),
        CellValue::Text("(((".into()),
        CellValue::Number(-1.0),
        CellValue::Number(f64::MAX),
        CellValue::Formula("=".into()),
        CellValue::Formula("=)(".into()),
        CellValue::Date(today()),
    ];

    for value in junk {
        let mut sheet = Worksheet::new();
        for col in ["A", "B", "C", "D", "E", "F", "G", "I", "J", "L", "M", "O", "P"] {
            for row in [1, 15, 16, 17, 18, 19, 20, 21, 26, 27, 28, 29, 30, 31, 35, 40, 41] {
                sheet = sheet.with(&format!("{col}{row}"), value.clone());
            }
        }
        let snapshot = rates();
        let ctx = sheetgrade::application::GradingContext::new("Maria_Lopez", today(), &snapshot);

        let currency = currency_conversion::grade_currency_conversion(&sheet, &ctx);
        assert!((0.0..=2.0).contains(&currency.row15_score));
        assert!((0.0..=2.0).contains(&currency.row16_score));
        assert!((0.0..=2.0).contains(&currency.row17_score));
        assert!((0.0..=4.0).contains(&currency.row18_score));
        assert!((0.0..=4.0).contains(&currency.row19_accuracy_score));
        assert!((0.0..=8.0).contains(&currency.row20_formula_score));
        assert!((0.0..=8.0).contains(&currency.row21_formula_score));
        assert!((1.0..=4.0).contains(&currency.formatting_total));
        assert!(!currency.row17_feedback.is_empty());

        let units = unit_conversions::grade_unit_conversions(&sheet);
        assert!((0.0..=20.0).contains(&units.formulas_score));
        assert!((0.0..=10.0).contains(&units.unit_text_score));
        assert!((0.0..=8.0).contains(&units.final_formula_score));
        assert!((0.0..=4.0).contains(&units.final_unit_score));
        assert!((0.0..=4.0).contains(&units.temp_and_celsius_score));

        let income = income_analysis::grade_income_analysis(&sheet);
        assert!((0.0..=1.0).contains(&income.name_score));
        assert!((0.0..=7.0).contains(&income.slope_score));
        assert!((0.0..=7.0).contains(&income.predictions_score));
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let samples = [
        "=B4*C19",
        "= $b$4 * c19",
        "=((B4))*((C19))",
        "=(((B30*D19)+B31))",
        "((A40-32))*(5/9)",
        "=(A1)+(B1)",
        "=((A1)+(B1))",
        "=)(",
        "(((",
        "",
        "=SLOPE( B19:B26 , A19:A26 )",
    ];
    for sample in samples {
        let once = normalize_formula(&CellValue::Formula(sample.into()));
        let twice = normalize_formula(&CellValue::Formula(once.clone()));
        assert_eq!(once, twice, "{sample}");
    }
}

#[test]
fn test_unit_row_anti_double_counting_end_to_end() {
    let sheet = Worksheet::new()
        .with("F27", CellValue::Formula("=L16/I16".into()))
        .with("I27", CellValue::Formula("=L16".into()))
        .with("G27", CellValue::Text("gal/l".into()))
        .with("J27", CellValue::Text("gal/l".into()));
    let results = unit_conversions::grade_unit_conversions(&sheet);

    assert_eq!(results.formulas_score, 2.0);
    // labels are checked against the row's set, not against the claimed ratio
    assert_eq!(results.unit_text_score, 2.0);
}

#[test]
fn test_batch_writes_results_and_summary() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    fs::write(input.path().join("Maria_Lopez_MA1.csv"), MARIA_CURRENCY).unwrap();
    let income_only = Workbook::new().with_tab(
        income_analysis::TAB_NAME,
        Worksheet::new().with("B1", CellValue::Text("Ana Li".into())),
    );
    fs::write(
        input.path().join("Ana_Li_MA1.json"),
        serde_json::to_string(&income_only).unwrap(),
    )
    .unwrap();

    let submissions: Vec<Submission> = FileRepository::discover_submissions(input.path())
        .unwrap()
        .into_iter()
        .map(|path| {
            let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
            Submission::new(
                student_name_from_stem(&stem, "_MA1"),
                FileRepository::load_workbook(&path).unwrap(),
            )
        })
        .collect();
    assert_eq!(submissions[0].student, "Ana_Li");
    assert_eq!(submissions[1].student, "Maria_Lopez");

    let snapshot = rates();
    let reports = grade_batch(&submissions, today(), &snapshot, CountryDirectory::builtin());
    for report in &reports {
        FileRepository::save_report(report, output.path()).unwrap();
    }
    let summary: Vec<_> = reports.iter().map(|report| report.summary()).collect();
    FileRepository::write_summary(&summary, &output.path().join("summary.csv")).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.path().join("Maria_Lopez.results.json")).unwrap())
            .unwrap();
    assert_eq!(saved["currency_conversion"]["row15_score"], 2.0);
    assert_eq!(saved["currency_conversion"]["row15_feedback"][0]["code"], "CC15_ALL_CORRECT");
    assert!(saved["income_analysis"].is_null());

    let summary = fs::read_to_string(output.path().join("summary.csv")).unwrap();
    let lines: Vec<_> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("Ana_Li,1.0,0.0,0.0,1.0,"));
    assert!(lines[2].starts_with("Maria_Lopez,0.0,0.0,34.0,34.0,"));
}
