use rust_data_ingest::error::ParseError;
use rust_data_ingest::ingestion::csv::{parse_csv, parse_csv_from_reader};
use rust_data_ingest::types::Value;

fn utf8(s: &str) -> Value {
    Value::Utf8(s.to_string())
}

#[test]
fn parse_csv_fixture_happy_path() {
    let bytes = std::fs::read("tests/fixtures/people.csv").unwrap();
    let parsed = parse_csv(&bytes, None).unwrap();

    assert_eq!(parsed.total_rows, 3);
    assert_eq!(parsed.row_count(), 3);

    let first = &parsed.rows[0];
    assert_eq!(first.names().collect::<Vec<_>>(), vec!["id", "name", "score", "active"]);
    assert_eq!(first.get("id"), Some(&Value::Int64(1)));
    assert_eq!(first.get("name"), Some(&utf8("Ada")));
    assert_eq!(first.get("score"), Some(&Value::Float64(98.5)));
    assert_eq!(first.get("active"), Some(&Value::Bool(true)));
}

#[test]
fn parse_csv_maps_absent_markers_to_null() {
    let bytes = std::fs::read("tests/fixtures/people.csv").unwrap();
    let parsed = parse_csv(&bytes, None).unwrap();

    // "" and "NA" both mean absent; the key is still present.
    assert_eq!(parsed.rows[1].get("score"), Some(&Value::Null));
    assert_eq!(parsed.rows[2].get("score"), Some(&Value::Null));
    assert_eq!(parsed.rows[2].get("active"), Some(&Value::Bool(true)));
}

#[test]
fn parse_csv_errors_on_field_count_mismatch() {
    let input = b"id,name\n1,Ada\n2,Grace,extra\n";
    let err = parse_csv(input, None).unwrap_err();
    match err {
        ParseError::Csv(e) => assert!(matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. })),
        other => panic!("expected csv error, got {other:?}"),
    }
}

#[test]
fn parse_csv_errors_without_header_row() {
    let err = parse_csv(b"", None).unwrap_err();
    assert!(err.to_string().contains("no header row"));
}

#[test]
fn parse_csv_header_only_yields_no_rows() {
    let parsed = parse_csv(b"id,name\n", None).unwrap();
    assert_eq!(parsed.total_rows, 0);
    assert!(parsed.rows.is_empty());
}

#[test]
fn parse_csv_cleans_up_headers() {
    let input = "\u{feff}id,,name,name\n1,x,Ada,Lovelace\n";
    let parsed = parse_csv(input.as_bytes(), None).unwrap();
    assert_eq!(
        parsed.rows[0].names().collect::<Vec<_>>(),
        vec!["id", "Unnamed: 1", "name", "name.1"]
    );
    assert_eq!(parsed.rows[0].get("name.1"), Some(&utf8("Lovelace")));
}

#[test]
fn parse_csv_max_rows_truncates_rows_but_not_total() {
    let input = b"n\n1\n2\n3\n4\n";
    let parsed = parse_csv(input, Some(2)).unwrap();
    assert_eq!(parsed.total_rows, 4);
    assert_eq!(parsed.rows.len(), 2);
    assert_eq!(parsed.rows[1].get("n"), Some(&Value::Int64(2)));
}

#[test]
fn parse_csv_recovers_gbk_input() {
    let (bytes, _, _) = encoding_rs::GBK.encode("姓名,城市\n张三,北京\n");
    let parsed = parse_csv(&bytes, None).unwrap();
    assert_eq!(parsed.rows[0].get("姓名"), Some(&utf8("张三")));
    assert_eq!(parsed.rows[0].get("城市"), Some(&utf8("北京")));
}

#[test]
fn parse_csv_from_reader_honors_reader_configuration() {
    let input = "name;score\nAda;98.5\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b';')
        .from_reader(input.as_bytes());

    let parsed = parse_csv_from_reader(&mut rdr, None).unwrap();
    assert_eq!(parsed.rows[0].get("score"), Some(&Value::Float64(98.5)));
}

#[test]
fn parse_csv_wide_header_keeps_every_column_in_order() {
    let cols = 2_000;
    let header: Vec<String> = (0..cols).map(|i| if i % 2 == 0 { "c".to_string() } else { format!("x{i}") }).collect();
    let body: Vec<String> = (0..cols).map(|i| i.to_string()).collect();
    let input = format!("{}\n{}\n{}\n", header.join(","), body.join(","), body.join(","));

    let parsed = parse_csv(input.as_bytes(), None).unwrap();
    assert_eq!(parsed.total_rows, 2);
    let row = &parsed.rows[0];
    assert_eq!(row.len(), cols);
    assert_eq!(row.get("c"), Some(&Value::Int64(0)));
    assert_eq!(row.get("c.1"), Some(&Value::Int64(2)));
    assert_eq!(row.get("x1999"), Some(&Value::Int64(1999)));
    assert_eq!(row.names().last(), Some("x1999"));
}
