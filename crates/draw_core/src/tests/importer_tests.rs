use std::io::Write;

use super::*;

fn sheet(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write sheet");
    file
}

#[tokio::test]
async fn reads_first_column_after_the_header() {
    let file = sheet("Coupon,Holder\n1, Ana\n 0002 ,Ben\n,Skipped\n17\n");
    let values = CsvImporter::new(file.path())
        .import_candidates()
        .await
        .expect("import");
    assert_eq!(values, vec!["1", "0002", "17"]);
}

#[tokio::test]
async fn header_only_sheet_is_empty() {
    let file = sheet("Coupon\n");
    let values = CsvImporter::new(file.path())
        .import_candidates()
        .await
        .expect("import");
    assert!(values.is_empty());
}

#[tokio::test]
async fn missing_sheet_names_the_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.csv");
    let err = CsvImporter::new(&path)
        .import_candidates()
        .await
        .expect_err("missing file");
    assert!(format!("{err:#}").contains("absent.csv"));
}

#[tokio::test]
async fn static_importer_returns_its_values() {
    let importer = StaticImporter(vec!["5".into(), "6".into()]);
    assert_eq!(
        importer.import_candidates().await.expect("import"),
        vec!["5", "6"]
    );
}
