//! Benchmarks for hyperlink-maker.
//!
//! Run with: cargo bench
//!
//! These benchmarks measure loading, linking and saving at various sheet sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hyperlink_maker::{ColumnId, HyperlinkAssigner, NoProgress, Workbook};
use std::io::Cursor;

/// Creates a synthetic XLSX workbook with a header row and `row_count` data rows.
fn create_test_xlsx(row_count: usize) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));

    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    // [Content_Types].xml
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#,
    )
    .unwrap();

    // _rels/.rels
    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
    )
    .unwrap();

    // xl/workbook.xml
    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Links" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
    )
    .unwrap();

    // xl/_rels/workbook.xml.rels
    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#,
    )
    .unwrap();

    // Generate sheet content
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c><c r="B1" t="inlineStr"><is><t>Site</t></is></c></row>"#,
    );

    for i in 0..row_count {
        let row = i + 2;
        content.push_str(&format!(
            r#"
    <row r="{row}"><c r="A{row}" t="inlineStr"><is><t>Company {i}</t></is></c><c r="B{row}" t="inlineStr"><is><t>www.company{i}.example</t></is></c></row>"#
        ));
    }

    content.push_str(
        r#"
  </sheetData>
</worksheet>"#,
    );

    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(content.as_bytes()).unwrap();

    zip.finish().unwrap();
    buffer
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for rows in [100, 1_000, 10_000] {
        let data = create_test_xlsx(rows);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| Workbook::from_bytes(black_box(data.clone())).unwrap())
        });
    }

    group.finish();
}

fn bench_apply_and_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_and_save");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("linked.xlsx");
    let columns: Vec<ColumnId> = vec!["B".parse().unwrap()];

    for rows in [100, 1_000, 10_000] {
        let workbook = Workbook::from_bytes(create_test_xlsx(rows)).unwrap();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &workbook, |b, workbook| {
            b.iter(|| {
                let mut workbook = workbook.clone();
                let sheet = workbook.sheet_mut("Links").unwrap();
                HyperlinkAssigner::default().apply(sheet, black_box(&columns), &mut NoProgress);
                workbook.save(&output).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load, bench_apply_and_save);
criterion_main!(benches);
