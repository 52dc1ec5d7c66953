//! [`DocumentEngine`] backed by `lopdf`.
//!
//! Page sizes come from the (possibly inherited) `/MediaBox`. Drawing a page
//! of another document copies that page into this one as a Form XObject,
//! pulling its resources across, and paints it with a `cm` + `Do` sequence.

use crate::engine::DocumentEngine;
use crate::geometry::{PageDimensions, PlacedContent, US_LETTER};
use crate::ConvertError;
use flate2::read::ZlibDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, warn};

/// Boxes that follow the media box when it is rewritten, if they matched it.
const DEPENDENT_BOXES: [&[u8]; 4] = [b"CropBox", b"BleedBox", b"TrimBox", b"ArtBox"];

/// Upper bound on `/Parent` hops when looking up inherited page attributes.
const MAX_TREE_DEPTH: usize = 64;

const BOX_TOLERANCE: f32 = 0.01;

/// Keys left behind when deep-copying dictionaries and stream dictionaries.
const SKIP_IN_DICT: &[&[u8]] = &[b"Parent"];
const SKIP_IN_STREAM: &[&[u8]] = &[b"Parent", b"Length"];

/// A PDF document held in memory by lopdf
pub struct LopdfDocument {
    doc: Document,
    /// Source object id -> id of its copy in `doc`. Valid for a single source
    /// document, which is how re-pagination uses it.
    imported: HashMap<ObjectId, ObjectId>,
    xobject_count: usize,
}

impl LopdfDocument {
    pub fn from_document(doc: Document) -> Self {
        LopdfDocument {
            doc,
            imported: HashMap::new(),
            xobject_count: 0,
        }
    }

    fn media_box(&self, page_id: ObjectId) -> Result<Rect, ConvertError> {
        self.doc.get_dictionary(page_id).map_err(|e| {
            ConvertError::PageStructure(format!("page {:?} is not a dictionary: {}", page_id, e))
        })?;

        match inherited(&self.doc, page_id, b"MediaBox") {
            Some(obj) => read_rect(&self.doc, obj).ok_or_else(|| {
                ConvertError::PageStructure(format!("page {:?} has an unreadable MediaBox", page_id))
            }),
            None => {
                warn!(page = ?page_id, "page has no MediaBox, assuming US Letter");
                Ok(Rect::from_size(US_LETTER))
            }
        }
    }

    fn pages_root(&self) -> Result<ObjectId, ConvertError> {
        self.doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| ConvertError::PageStructure(format!("document has no page tree: {}", e)))
    }

    /// Copy `page_id` of `source` into this document as a Form XObject.
    fn import_page(
        &mut self,
        source: &LopdfDocument,
        page_id: ObjectId,
        bbox: Rect,
    ) -> Result<ObjectId, ConvertError> {
        let page_dict = source.doc.get_dictionary(page_id).map_err(structure)?;

        let mut form = Dictionary::new();
        form.set("Type", Object::Name(b"XObject".to_vec()));
        form.set("Subtype", Object::Name(b"Form".to_vec()));
        form.set("FormType", Object::Integer(1));
        form.set("BBox", bbox.to_object());

        let content = match page_dict.get(b"Contents") {
            Ok(Object::Reference(id)) => match source.doc.get_object(*id) {
                // A single stream keeps its encoding; only the filter entries move over
                Ok(Object::Stream(stream)) => {
                    for key in [&b"Filter"[..], &b"DecodeParms"[..]] {
                        if let Ok(value) = stream.dict.get(key) {
                            let copied =
                                copy_object_deep(&mut self.doc, &source.doc, value, &mut self.imported)?;
                            form.set(key, copied);
                        }
                    }
                    stream.content.clone()
                }
                Ok(Object::Array(parts)) => concat_contents(&source.doc, parts)?,
                _ => Vec::new(),
            },
            Ok(Object::Array(parts)) => concat_contents(&source.doc, parts)?,
            _ => Vec::new(),
        };

        if let Some(resources) = inherited(&source.doc, page_id, b"Resources") {
            let copied =
                copy_object_deep(&mut self.doc, &source.doc, resources, &mut self.imported)?;
            form.set("Resources", copied);
        }

        Ok(self.doc.add_object(Stream::new(form, content)))
    }

    fn register_xobject(
        &mut self,
        page_id: ObjectId,
        name: &str,
        xobject_id: ObjectId,
    ) -> Result<(), ConvertError> {
        let page_dict = self.doc.get_dictionary_mut(page_id).map_err(structure)?;
        if !page_dict.has(b"Resources") {
            page_dict.set("Resources", Dictionary::new());
        }
        let resources = page_dict
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .map_err(|_| {
                ConvertError::PageStructure(format!("page {:?} has indirect Resources", page_id))
            })?;
        if !resources.has(b"XObject") {
            resources.set("XObject", Dictionary::new());
        }
        let xobjects = resources
            .get_mut(b"XObject")
            .and_then(Object::as_dict_mut)
            .map_err(|_| {
                ConvertError::PageStructure(format!("page {:?} has indirect XObjects", page_id))
            })?;
        xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
        Ok(())
    }

    fn append_content(&mut self, page_id: ObjectId, ops: Vec<u8>) -> Result<(), ConvertError> {
        let contents = self
            .doc
            .get_dictionary(page_id)
            .map_err(structure)?
            .get(b"Contents")
            .ok()
            .cloned();

        if let Some(Object::Reference(id)) = contents {
            if let Ok(Object::Stream(stream)) = self.doc.get_object_mut(id) {
                let mut data = decode_content(stream)?;
                data.push(b'\n');
                data.extend(ops);
                stream.dict.remove(b"Filter");
                stream.dict.remove(b"DecodeParms");
                stream.set_content(data);
                return Ok(());
            }
        }

        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), ops));
        let page_dict = self.doc.get_dictionary_mut(page_id).map_err(structure)?;
        match page_dict.get_mut(b"Contents").ok() {
            Some(Object::Array(parts)) => parts.push(Object::Reference(stream_id)),
            _ => page_dict.set("Contents", Object::Reference(stream_id)),
        }
        Ok(())
    }
}

impl DocumentEngine for LopdfDocument {
    type PageRef = ObjectId;

    fn load(bytes: &[u8]) -> Result<Self, ConvertError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ConvertError::MalformedDocument(e.to_string()))?;
        Ok(LopdfDocument::from_document(doc))
    }

    fn create() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(Vec::new())),
            ("Count", Object::Integer(0)),
        ]));
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        LopdfDocument::from_document(doc)
    }

    fn pages(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    fn page_size(&self, page: ObjectId) -> Result<PageDimensions, ConvertError> {
        Ok(self.media_box(page)?.size())
    }

    fn set_page_size(&mut self, page: ObjectId, size: PageDimensions) -> Result<(), ConvertError> {
        size.validate()?;
        let old = self.media_box(page)?;
        let new = Rect {
            llx: old.llx,
            lly: old.lly,
            urx: old.llx + size.width,
            ury: old.lly + size.height,
        };

        let followers: Vec<&[u8]> = {
            let page_dict = self.doc.get_dictionary(page).map_err(structure)?;
            DEPENDENT_BOXES
                .iter()
                .copied()
                .filter(|key| {
                    page_dict
                        .get(key)
                        .ok()
                        .and_then(|obj| read_rect(&self.doc, obj))
                        .map_or(false, |rect| rect.approx_eq(&old))
                })
                .collect()
        };

        let page_dict = self.doc.get_dictionary_mut(page).map_err(structure)?;
        page_dict.set("MediaBox", new.to_object());
        for key in followers {
            page_dict.set(key, new.to_object());
        }
        debug!(page = ?page, from = %old.size(), to = %size, "page box rewritten");
        Ok(())
    }

    fn add_page(&mut self, size: PageDimensions) -> Result<ObjectId, ConvertError> {
        size.validate()?;
        let pages_id = self.pages_root()?;

        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("MediaBox", Rect::from_size(size).to_object()),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(Dictionary::new())),
        ]));

        let pages = self.doc.get_dictionary_mut(pages_id).map_err(structure)?;
        match pages.get_mut(b"Kids").ok() {
            Some(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
            None => pages.set("Kids", Object::Array(vec![Object::Reference(page_id)])),
            Some(_) => {
                return Err(ConvertError::PageStructure(
                    "page tree Kids is not a direct array".to_string(),
                ))
            }
        }
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        pages.set("Count", Object::Integer(count + 1));

        Ok(page_id)
    }

    fn draw_page(
        &mut self,
        target: ObjectId,
        source: &LopdfDocument,
        source_page: ObjectId,
        placement: &PlacedContent,
    ) -> Result<(), ConvertError> {
        let bbox = source.media_box(source_page)?;
        let xobject_id = self.import_page(source, source_page, bbox)?;

        let name = format!("P{}", self.xobject_count);
        self.xobject_count += 1;

        // The form draws in the source page's user space, so shift its box
        // origin onto the placement offset.
        let scale = placement.scale;
        let tx = placement.offset_x - bbox.llx * scale;
        let ty = placement.offset_y - bbox.lly * scale;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(scale),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(scale),
                        Object::Real(tx),
                        Object::Real(ty),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let ops = content.encode().map_err(structure)?;

        self.register_xobject(target, &name, xobject_id)?;
        self.append_content(target, ops)
    }

    fn save(&mut self, compress: bool) -> Result<Vec<u8>, ConvertError> {
        if compress {
            self.doc.compress();
        }
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| ConvertError::SaveError(e.to_string()))?;
        Ok(output)
    }
}

/// Normalized page rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl Rect {
    fn from_size(size: PageDimensions) -> Self {
        Rect {
            llx: 0.0,
            lly: 0.0,
            urx: size.width,
            ury: size.height,
        }
    }

    fn size(&self) -> PageDimensions {
        PageDimensions::new(self.urx - self.llx, self.ury - self.lly)
    }

    fn approx_eq(&self, other: &Rect) -> bool {
        (self.llx - other.llx).abs() <= BOX_TOLERANCE
            && (self.lly - other.lly).abs() <= BOX_TOLERANCE
            && (self.urx - other.urx).abs() <= BOX_TOLERANCE
            && (self.ury - other.ury).abs() <= BOX_TOLERANCE
    }

    fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ])
    }
}

fn structure(e: lopdf::Error) -> ConvertError {
    ConvertError::PageStructure(e.to_string())
}

/// Resolve a reference to get the actual object
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

/// Look up a page attribute, walking up `/Parent` for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn read_rect(doc: &Document, obj: &Object) -> Option<Rect> {
    let values = resolve(doc, obj)?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut corners = [0.0f32; 4];
    for (slot, value) in corners.iter_mut().zip(values) {
        *slot = resolve(doc, value)?.as_float().ok()?;
    }
    Some(Rect {
        llx: corners[0].min(corners[2]),
        lly: corners[1].min(corners[3]),
        urx: corners[0].max(corners[2]),
        ury: corners[1].max(corners[3]),
    })
}

/// Decoded bytes of a content stream
fn decode_content(stream: &Stream) -> Result<Vec<u8>, ConvertError> {
    let filters: Vec<Vec<u8>> = match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    if filters.is_empty() {
        return Ok(stream.content.clone());
    }

    if filters.iter().all(|f| f == b"FlateDecode") && !stream.dict.has(b"DecodeParms") {
        let mut data = stream.content.clone();
        for _ in &filters {
            let mut decoded = Vec::new();
            ZlibDecoder::new(&data[..])
                .read_to_end(&mut decoded)
                .map_err(|e| {
                    ConvertError::PageStructure(format!("undecodable content stream: {}", e))
                })?;
            data = decoded;
        }
        return Ok(data);
    }

    stream
        .decompressed_content()
        .map_err(|e| ConvertError::PageStructure(format!("undecodable content stream: {}", e)))
}

/// Join several content streams into one decoded block
fn concat_contents(doc: &Document, parts: &[Object]) -> Result<Vec<u8>, ConvertError> {
    let mut result = Vec::new();
    for part in parts {
        if let Some(Object::Stream(stream)) = resolve(doc, part) {
            result.extend_from_slice(&decode_content(stream)?);
            result.push(b'\n');
        }
    }
    Ok(result)
}

/// Deep copy an object from `source` into `output`, following references.
///
/// `Parent` links are dropped so copying resources never drags in the page
/// tree. Ids are reserved before recursing, which keeps cyclic graphs finite.
fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object, ConvertError> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);

            let copied = match source.get_object(*id) {
                Ok(referenced) => copy_object_deep(output, source, referenced, cache)?,
                Err(_) => Object::Null,
            };
            output.objects.insert(new_id, copied);
            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(copy_dict(
            output,
            source,
            dict,
            cache,
            SKIP_IN_DICT,
        )?)),
        Object::Array(items) => {
            let mut copied = Vec::with_capacity(items.len());
            for item in items {
                copied.push(copy_object_deep(output, source, item, cache)?);
            }
            Ok(Object::Array(copied))
        }
        Object::Stream(stream) => {
            let dict = copy_dict(output, source, &stream.dict, cache, SKIP_IN_STREAM)?;
            let mut copied = Stream::new(dict, stream.content.clone());
            copied.allows_compression = stream.allows_compression;
            Ok(Object::Stream(copied))
        }
        _ => Ok(obj.clone()),
    }
}

fn copy_dict(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
    skip: &[&[u8]],
) -> Result<Dictionary, ConvertError> {
    let mut copied = Dictionary::new();
    for (key, value) in dict.iter() {
        if skip.contains(&key.as_slice()) {
            continue;
        }
        copied.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    Ok(copied)
}
