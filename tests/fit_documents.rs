use fit_pdf::file_ops::{convert_pdf_file, resolve_output_path};
use fit_pdf::{
    convert_pdf_bytes, inspect_pdf_pages, ConvertError, ConvertOptions, DocumentEngine, FitResult,
    FitStrategy, LopdfDocument, PageDimensions, A4,
};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::fs;

/// Build a PDF whose pages have the given sizes, each with a line of text.
fn create_test_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut page_ids = Vec::new();
    for (i, &(width, height)) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(50), Object::Integer(50)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
        ]);
        page_ids.push(Object::Reference(doc.add_object(page)));
    }

    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(page_ids)),
            ("Count", Object::Integer(count)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn page_sizes(bytes: &[u8]) -> Vec<PageDimensions> {
    let doc = LopdfDocument::load(bytes).unwrap();
    doc.pages()
        .into_iter()
        .map(|page| doc.page_size(page).unwrap())
        .collect()
}

fn options(strategy: FitStrategy) -> ConvertOptions {
    ConvertOptions {
        strategy,
        ..ConvertOptions::default()
    }
}

#[test]
fn resize_follows_dominant_axis() {
    let input = create_test_pdf(&[(1000, 500), (500, 1000)]);
    let (output, result) = convert_pdf_bytes(&input, &options(FitStrategy::Resize)).unwrap();

    assert_eq!(result.total_pages, 2);
    let sizes = page_sizes(&output);
    assert!(sizes[0].approx_eq(&PageDimensions::new(595.0, 297.5), 1e-2));
    assert!(sizes[1].approx_eq(&PageDimensions::new(421.0, 842.0), 1e-2));
}

#[test]
fn resize_contain_never_exceeds_target() {
    let input = create_test_pdf(&[(300, 300), (2000, 100)]);
    let (output, _) = convert_pdf_bytes(&input, &options(FitStrategy::ResizeContain)).unwrap();

    for size in page_sizes(&output) {
        assert!(size.width <= A4.width + 1e-2);
        assert!(size.height <= A4.height + 1e-2);
    }
}

#[test]
fn center_produces_a4_pages_in_order() {
    let input = create_test_pdf(&[(1000, 500), (612, 792), (200, 100)]);
    let (output, result) = convert_pdf_bytes(&input, &options(FitStrategy::Center)).unwrap();

    assert_eq!(result.total_pages, 3);
    let sizes = page_sizes(&output);
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|size| size.approx_eq(&A4, 1e-2)));

    // Each output page paints exactly one form copied from the source page
    let doc = Document::load_mem(&output).unwrap();
    for (index, page_id) in doc.get_pages().into_values().enumerate() {
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let draws: Vec<_> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Do")
            .collect();
        assert_eq!(draws.len(), 1);

        let name = draws[0].operands[0].as_name().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let form_id = xobjects.get(name).unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
        let text = String::from_utf8_lossy(&form.decompressed_content().unwrap_or_else(|_| form.content.clone()))
            .to_string();
        assert!(text.contains(&format!("Page {}", index + 1)));
    }
}

#[test]
fn center_places_landscape_page_vertically_centered() {
    let input = create_test_pdf(&[(1000, 500)]);
    let uncompressed = ConvertOptions {
        compress_streams: false,
        ..options(FitStrategy::Center)
    };
    let (output, _) = convert_pdf_bytes(&input, &uncompressed).unwrap();

    let doc = Document::load_mem(&output).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    let cm = content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .unwrap();
    let values: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
    assert!((values[0] - 0.595).abs() < 1e-3);
    assert!((values[3] - 0.595).abs() < 1e-3);
    assert!(values[4].abs() < 1e-3);
    assert!((values[5] - 272.25).abs() < 1e-2);
}

#[test]
fn crop_sets_every_box_to_target() {
    let input = create_test_pdf(&[(612, 792), (1000, 500)]);
    let (output, result) = convert_pdf_bytes(&input, &options(FitStrategy::Crop)).unwrap();

    assert_eq!(result.adjusted_pages, 2);
    assert!(page_sizes(&output)
        .iter()
        .all(|size| size.approx_eq(&A4, 1e-2)));
}

#[test]
fn inspect_reports_planned_fits() {
    let input = create_test_pdf(&[(1000, 500), (500, 1000)]);
    let reports = inspect_pdf_pages(&input, &options(FitStrategy::Resize)).unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].page_number, 1);
    assert_eq!(reports[0].size, PageDimensions::new(1000.0, 500.0));
    match reports[1].fit {
        FitResult::Resized(page) => assert!((page.width - 421.0).abs() < 1e-2),
        FitResult::Placed(_) => panic!("resize strategy should not place content"),
    }
}

#[test]
fn malformed_file_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    let output = dir.path().join("out.pdf");
    fs::write(&input, b"this is not a PDF").unwrap();

    let err = convert_pdf_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::MalformedDocument(_)));
    assert!(!output.exists());
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.pdf");
    let output = dir.path().join("out.pdf");

    let err = convert_pdf_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::FileNotFound(_)));
    assert!(!output.exists());
}

#[test]
fn output_file_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("essay.pdf");
    let output = dir.path().join("resized.pdf");
    fs::write(&input, create_test_pdf(&[(1000, 500)])).unwrap();
    fs::write(&output, b"stale").unwrap();

    let (destination, result) =
        convert_pdf_file(&input, &output, &options(FitStrategy::Resize)).unwrap();

    assert_eq!(destination, output);
    assert_eq!(result.total_pages, 1);
    let written = fs::read(&output).unwrap();
    assert!(written.starts_with(b"%PDF-"));
}

#[test]
fn output_directory_takes_input_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("essay.pdf");
    let converted = dir.path().join("converted");
    fs::create_dir(&converted).unwrap();
    fs::write(&input, create_test_pdf(&[(612, 792)])).unwrap();

    assert_eq!(resolve_output_path(&input, &converted), converted.join("essay.pdf"));

    let (destination, _) = convert_pdf_file(&input, &converted, &ConvertOptions::default()).unwrap();
    assert_eq!(destination, converted.join("essay.pdf"));
    assert_eq!(page_sizes(&fs::read(&destination).unwrap()).len(), 1);
}

#[test]
fn unwritable_output_is_a_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("essay.pdf");
    let output = dir.path().join("no-such-dir").join("out.pdf");
    fs::write(&input, create_test_pdf(&[(612, 792)])).unwrap();

    let err = convert_pdf_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::WriteFailure { .. }));
}

#[test]
fn output_into_own_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("essay.pdf");
    let original = create_test_pdf(&[(1000, 500)]);
    fs::write(&input, &original).unwrap();

    let err = convert_pdf_file(&input, dir.path(), &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::OutputIsInput(_)));
    assert_eq!(fs::read(&input).unwrap(), original);
}

#[test]
fn output_same_as_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("essay.pdf");
    fs::write(&input, create_test_pdf(&[(612, 792)])).unwrap();

    let err = convert_pdf_file(&input, &input, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::OutputIsInput(_)));
}

#[test]
fn failed_conversion_keeps_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    let output = dir.path().join("resized.pdf");
    fs::write(&input, b"this is not a PDF").unwrap();
    fs::write(&output, b"previous result").unwrap();

    assert!(convert_pdf_file(&input, &output, &ConvertOptions::default()).is_err());
    assert_eq!(fs::read(&output).unwrap(), b"previous result".to_vec());

    // no staging files are left behind
    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 2);
}
