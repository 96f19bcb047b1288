use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chunk_model::{ChunkBody, ChunkKind, DocumentId, ImageAnchor, TableFormat};
use file_chunker::config::{PipelineConfig, TableChunkingStrategy, TableProcessingConfig};
use file_chunker::error::{ChunkFileError, ReaderError};
use file_chunker::reader_docx::{
    assemble_chunks, expand_table, parse_document_xml, parse_relationships, read_docx_to_chunks, BodyItem, DocxCell,
    VMerge,
};
use file_chunker::reader_excel::read_xlsx_to_chunks;
use file_chunker::table::MergeRange;
use file_chunker::{chunk_office_file, detect_format, OfficeFormat};
use rust_xlsxwriter::{Format, Workbook};
use tempfile::TempDir;

const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId6" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;

fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text)
}

fn picture(rel: &str) -> String {
    format!("<w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed=\"{}\"/></a:graphicData></a:graphic></w:drawing></w:r>", rel)
}

fn cell(text: &str, props: &str) -> String {
    format!("<w:tc><w:tcPr>{}</w:tcPr>{}</w:tc>", props, para(text))
}

fn document(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><w:document {}><w:body>{}</w:body></w:document>",
        NS, body
    )
}

/// Intro paragraph with a picture, a 2x2 table, closing paragraph.
fn sample_body() -> String {
    let intro = format!("<w:p><w:r><w:t>Intro paragraph.</w:t></w:r>{}</w:p>", picture("rId5"));
    let table = format!(
        "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
        cell("Name", ""),
        cell("Score", ""),
        cell("Ann", ""),
        cell("90", "")
    );
    format!("{}{}{}", intro, table, para("Closing text."))
}

fn write_docx(dir: &Path, name: &str, document_xml: &str, rels: Option<&str>) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create docx");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    zip.start_file("word/document.xml", options).expect("start document part");
    zip.write_all(document_xml.as_bytes()).expect("write document part");
    if let Some(rels) = rels {
        zip.start_file("word/_rels/document.xml.rels", options).expect("start rels part");
        zip.write_all(rels.as_bytes()).expect("write rels part");
    }
    zip.finish().expect("finish docx");
    path
}

fn rows_cfg() -> TableProcessingConfig {
    TableProcessingConfig { table_format: TableFormat::Markdown, table_chunking_strategy: TableChunkingStrategy::FullAndRows }
}

#[test]
fn document_xml_yields_paragraphs_and_tables_in_order() {
    let items = parse_document_xml(&document(&sample_body())).expect("parse document");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], BodyItem::Paragraph { text: "Intro paragraph.".into(), images: vec!["rId5".into()] });
    let BodyItem::Table(rows) = &items[1] else { panic!("expected a table") };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1].text, "90");
    assert!(matches!(&items[2], BodyItem::Paragraph { text, .. } if text == "Closing text."));
}

#[test]
fn tabs_and_breaks_become_whitespace() {
    let body = "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>";
    let items = parse_document_xml(&document(body)).expect("parse document");
    assert_eq!(items, vec![BodyItem::Paragraph { text: "a\tb\nc".into(), images: Vec::new() }]);
}

#[test]
fn grid_span_and_vertical_merge_are_expanded() {
    let body = format!(
        "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}</w:tr></w:tbl>",
        cell("Region", "<w:vMerge w:val=\"restart\"/>"),
        cell("Q1", ""),
        cell("", "<w:vMerge/>"),
        cell("5", ""),
        cell("Total", "<w:gridSpan w:val=\"2\"/>")
    );
    let items = parse_document_xml(&document(&body)).expect("parse document");
    let BodyItem::Table(rows) = &items[0] else { panic!("expected a table") };
    assert_eq!(rows[0][0].v_merge, Some(VMerge::Restart));
    assert_eq!(rows[1][0].v_merge, Some(VMerge::Continue));
    assert_eq!(rows[2][0].grid_span, 2);

    let expanded = expand_table(rows);
    assert_eq!(expanded.grid.row_texts(1), vec!["Region", "5"]);
    assert_eq!(expanded.grid.row_texts(2), vec!["Total", "Total"]);
    assert_eq!(expanded.grid.merges(), &[MergeRange::new(0, 0, 2, 1), MergeRange::new(2, 0, 1, 2)]);
}

#[test]
fn continue_without_restart_keeps_own_text() {
    let rows = vec![vec![DocxCell { text: "x".into(), v_merge: Some(VMerge::Continue), ..Default::default() }]];
    let expanded = expand_table(&rows);
    assert_eq!(expanded.grid.row_texts(0), vec!["x"]);
    assert!(expanded.grid.merges().is_empty());
}

#[test]
fn relationships_keep_internal_images_only() {
    let rels = parse_relationships(RELS).expect("parse rels");
    assert_eq!(rels.len(), 1);
    assert_eq!(rels.get("rId5").map(String::as_str), Some("word/media/image1.png"));
}

#[test]
fn assembled_chunks_carry_paragraph_neighbours() {
    let items = parse_document_xml(&document(&sample_body())).expect("parse document");
    let rels = parse_relationships(RELS).expect("parse rels");
    let doc_id = DocumentId("report.docx".into());
    let chunks = assemble_chunks(&items, &rels, &doc_id, &rows_cfg());

    let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![ChunkKind::Text, ChunkKind::Image, ChunkKind::TableFull, ChunkKind::TableRow, ChunkKind::Text]
    );

    assert_eq!(chunks[0].paragraph_index(), Some(1));
    assert_eq!(chunks[0].context, "Preceding: . Following: Closing text.");
    assert_eq!(chunks[4].paragraph_index(), Some(2));
    assert_eq!(chunks[4].context, "Preceding: Intro paragraph.. Following: ");

    let ChunkBody::Image(img) = &chunks[1].body else { panic!("expected image body") };
    assert_eq!(img.anchor, ImageAnchor::Paragraph { paragraph_index: 1 });
    assert_eq!(img.anchor_index, 1);
    assert_eq!(img.original_filename, "image1.png");
    assert_eq!(chunks[1].content, "word/media/image1.png");

    let ChunkBody::TableFull(meta) = &chunks[2].body else { panic!("expected table body") };
    assert_eq!(meta.anchor.table_id, "table_1");
    assert_eq!(meta.anchor.preceding_paragraph_index, Some(1));
    assert_eq!(meta.anchor.following_paragraph_index, Some(2));
    assert_eq!(meta.anchor.preceding_paragraph_content.as_deref(), Some("Intro paragraph."));
    assert_eq!(chunks[2].content, "| Name | Score |\n| --- | ---: |\n| Ann | 90 |");
    assert_eq!(chunks[2].context, "Preceding: Intro paragraph.. Following: Closing text.");

    let ChunkBody::TableRow(row) = &chunks[3].body else { panic!("expected row body") };
    assert_eq!(row.row, 2);
    assert_eq!(chunks[3].content, "| Ann | 90 |");
    assert_eq!(chunks[3].parent_id(), Some("table_1"));
}

#[test]
fn repeated_and_unknown_pictures_are_skipped() {
    let body = format!(
        "<w:p><w:r><w:t>One</w:t></w:r>{}{}</w:p>{}",
        picture("rId5"),
        picture("rId9"),
        format!("<w:p><w:r><w:t>Two</w:t></w:r>{}</w:p>", picture("rId5"))
    );
    let items = parse_document_xml(&document(&body)).expect("parse document");
    let rels = parse_relationships(RELS).expect("parse rels");
    let chunks = assemble_chunks(&items, &rels, &DocumentId("d".into()), &TableProcessingConfig::default());
    assert_eq!(chunks.iter().filter(|c| c.kind() == ChunkKind::Image).count(), 1);
}

#[test]
fn blank_paragraphs_are_not_counted() {
    let body = format!("{}{}{}", para("First"), para("   "), para("Second"));
    let items = parse_document_xml(&document(&body)).expect("parse document");
    let chunks = assemble_chunks(&items, &HashMap::new(), &DocumentId("d".into()), &TableProcessingConfig::default());
    let indices: Vec<Option<usize>> = chunks.iter().map(|c| c.paragraph_index()).collect();
    assert_eq!(indices, vec![Some(1), Some(2)]);
}

#[test]
fn docx_package_is_read_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_docx(dir.path(), "report.docx", &document(&sample_body()), Some(RELS));
    let doc_id = DocumentId("report.docx".into());
    let chunks = read_docx_to_chunks(path.to_str().expect("utf-8 path"), &doc_id, &rows_cfg()).expect("read docx");
    assert_eq!(chunks.len(), 5);
}

#[test]
fn docx_without_document_part_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("broken.docx");
    let file = std::fs::File::create(&path).expect("create file");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("docProps/app.xml", zip::write::FileOptions::default()).expect("start part");
    zip.write_all(b"<Properties/>").expect("write part");
    zip.finish().expect("finish zip");

    let err = read_docx_to_chunks(path.to_str().expect("utf-8 path"), &DocumentId("d".into()), &rows_cfg())
        .expect_err("document part is required");
    assert!(matches!(err, ReaderError::MissingPart(_)), "{err}");
}

#[test]
fn non_zip_file_is_a_package_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("plain.docx");
    std::fs::write(&path, "not a zip").expect("write file");
    let err = read_docx_to_chunks(path.to_str().expect("utf-8 path"), &DocumentId("d".into()), &rows_cfg())
        .expect_err("plain text is not a package");
    assert!(matches!(err, ReaderError::Zip(_)), "{err}");
}

#[test]
fn format_detection_follows_extension() {
    assert_eq!(detect_format("a/B.DOCX").expect("docx"), OfficeFormat::Docx);
    assert_eq!(detect_format("sheet.xlsx").expect("xlsx"), OfficeFormat::Xlsx);
    assert!(matches!(detect_format("old.doc"), Err(ChunkFileError::Reader(ReaderError::Unsupported(_)))));
    assert!(detect_format("notes.txt").is_err());
}

#[test]
fn pipeline_numbers_docx_chunks() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_docx(dir.path(), "report.docx", &document(&sample_body()), Some(RELS));
    let mut cfg = PipelineConfig::default();
    cfg.table_processing = rows_cfg();
    let output = chunk_office_file(path.to_str().expect("utf-8 path"), &cfg).expect("chunk docx");

    assert_eq!(output.doc_id.0, "report.docx");
    let ids: Vec<String> = output.chunks.iter().filter_map(|c| c.chunk_id.clone()).map(|id| id.0).collect();
    assert_eq!(ids, (1..=5).map(|i| format!("report.docx_{i}")).collect::<Vec<_>>());
    assert_eq!(output.chunks[2].context, "Preceding: Intro paragraph.. Following: Closing text.");
    let stats = output.stats.expect("stats when fragmentation is enabled");
    assert_eq!(stats.fragment_chunks, 0);
    assert_eq!(stats.total_chunks, 5);
}

#[test]
fn pipeline_fragments_long_docx_paragraph() {
    let long = "这是一个很长的段落。".repeat(30);
    let body = format!("{}{}", para("Title"), para(&long));
    let dir = TempDir::new().expect("tempdir");
    let path = write_docx(dir.path(), "long.docx", &document(&body), None);

    let mut cfg = PipelineConfig::default();
    cfg.fragmentation.max_chunk_size = 100;
    cfg.fragmentation.min_fragment_size = 20;
    cfg.fragmentation.chunk_overlap = 10;
    let output = chunk_office_file(path.to_str().expect("utf-8 path"), &cfg).expect("chunk docx");

    assert!(output.chunks.len() > 2);
    assert!(output.chunks[1..].iter().all(|c| c.is_fragment()));
    let rebuilt: String = output.chunks[1..].iter().map(|c| c.content.as_str()).collect();
    assert_eq!(rebuilt, long, "sentence-aligned fragments concatenate back to the paragraph");
    let stats = output.stats.expect("stats");
    assert_eq!(stats.fragmented_paragraphs, 1);
    assert_eq!(stats.paragraph_fragments.get(&2).copied(), Some(output.chunks.len() - 1));
}

fn write_sales_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("sales.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sales").expect("sheet name");
    sheet.merge_range(0, 0, 0, 1, "Sales 2024", &Format::new()).expect("merge header");
    sheet.write_string(1, 0, "Region").expect("write cell");
    sheet.write_string(1, 1, "Amount").expect("write cell");
    sheet.write_string(2, 0, "North").expect("write cell");
    sheet.write_number(2, 1, 100.0).expect("write cell");
    sheet.write_string(3, 0, "South").expect("write cell");
    sheet.write_number(3, 1, 200.0).expect("write cell");
    sheet.write_string(5, 0, "Total").expect("write cell");
    sheet.write_number(5, 1, 300.0).expect("write cell");
    workbook.save(&path).expect("save workbook");
    path
}

#[test]
fn workbook_blocks_become_table_chunks() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_sales_workbook(dir.path());
    let doc_id = DocumentId("sales.xlsx".into());
    let chunks = read_xlsx_to_chunks(path.to_str().expect("utf-8 path"), &doc_id, &rows_cfg()).expect("read xlsx");

    let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind()).collect();
    assert_eq!(kinds, vec![ChunkKind::TableFull, ChunkKind::TableRow, ChunkKind::TableRow, ChunkKind::TableFull]);

    let ChunkBody::TableFull(meta) = &chunks[0].body else { panic!("expected table body") };
    assert_eq!(meta.anchor.table_id, "Sales_table_1");
    assert_eq!(meta.anchor.sheet.as_deref(), Some("Sales"));
    assert_eq!(meta.header_rows, 2);
    assert_eq!(meta.anchor.header, vec!["Sales 2024/Region", "Sales 2024/Amount"]);
    assert_eq!((meta.start_row, meta.end_row), (Some(0), Some(3)));
    assert_eq!(
        chunks[0].content,
        "| Sales 2024/Region | Sales 2024/Amount |\n| --- | ---: |\n| North | 100 |\n| South | 200 |"
    );
    assert_eq!(chunks[0].context, "Preceding: . Following: Total | 300");

    let ChunkBody::TableRow(row) = &chunks[1].body else { panic!("expected row body") };
    assert_eq!(row.row, 3);
    assert_eq!(chunks[1].context, "Preceding: . Following: South | 200");
    assert_eq!(chunks[2].context, "Preceding: North | 100. Following: ");

    assert_eq!(chunks[3].context, "Preceding: South | 200. Following: ");
    assert_eq!(chunks[3].body.table_anchor().map(|a| a.table_id.as_str()), Some("Sales_table_2"));
}

#[test]
fn pipeline_keeps_sheet_contexts() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_sales_workbook(dir.path());
    let mut cfg = PipelineConfig::default();
    cfg.table_processing = rows_cfg();
    let output = chunk_office_file(path.to_str().expect("utf-8 path"), &cfg).expect("chunk xlsx");

    assert_eq!(output.chunks.len(), 4);
    assert_eq!(output.chunks[0].context, "Preceding: . Following: Total | 300");
    assert_eq!(output.chunks[3].chunk_id.as_ref().map(|id| id.0.as_str()), Some("sales.xlsx_4"));
}
