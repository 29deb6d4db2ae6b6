use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes a PDF with one blank page per entry of `sizes` (points).
pub fn write_pdf(dir: &Path, name: &str, sizes: &[(f32, f32)]) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for (width, height) in sizes {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(*width),
                Object::Real(*height),
            ],
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture PDF should serialize");
    fs::write(&path, bytes).expect("fixture PDF should be written");
    path
}

pub fn write_script(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).expect("script should be written");
    path
}
