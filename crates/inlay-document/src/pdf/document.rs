// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document — open an existing PDF, add fonts and images to page
// resources, overlay new content streams, and save atomically using the
// `lopdf` crate.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use inlay_core::error::{InlayError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};

use super::content::StandardFont;
use crate::coords::{PageBox, PageRotation};
use crate::image::PdfSamples;

/// Guard against cyclic /Parent chains in malformed files.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// An existing PDF opened for overlay editing.
///
/// Wraps `lopdf::Document` and tracks which pages already had their original
/// content isolated, plus the font objects shared across pages.
pub struct PdfDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    /// Pages whose original content is already wrapped in `q … Q`.
    isolated: HashSet<ObjectId>,
    /// Font dictionaries added so far, by base font.
    fonts: HashMap<&'static str, ObjectId>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            InlayError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        Ok(Self::from_document(document))
    }

    /// Wrap an already-loaded document.
    pub fn from_document(document: Document) -> Self {
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = pages.len(), "PDF loaded");
        Self {
            document,
            pages,
            isolated: HashSet::new(),
            fonts: HashMap::new(),
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Object id of the zero-based page `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages.get(index).copied().ok_or_else(|| {
            InlayError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                index + 1,
                self.pages.len()
            ))
        })
    }

    /// Borrow the underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    /// Visible box of a page: the CropBox when present, otherwise the
    /// MediaBox, both inherited through the page tree. Falls back to US
    /// Letter when neither is usable.
    pub fn page_box(&self, page_id: ObjectId) -> PageBox {
        [&b"CropBox"[..], &b"MediaBox"[..]]
            .into_iter()
            .find_map(|key| {
                self.inherited(page_id, key)
                    .and_then(|obj| rect_from(&self.document, obj))
            })
            .unwrap_or_else(|| {
                warn!(?page_id, "Page has no usable box, assuming US Letter");
                PageBox::LETTER
            })
    }

    /// Display rotation of a page from its (inherited) /Rotate. Values that
    /// are not multiples of 90 are ignored.
    pub fn page_rotation(&self, page_id: ObjectId) -> PageRotation {
        let Some(value) = self
            .inherited(page_id, b"Rotate")
            .and_then(|obj| resolve(&self.document, obj).as_i64().ok())
        else {
            return PageRotation::None;
        };
        PageRotation::from_degrees(value).unwrap_or_else(|| {
            warn!(?page_id, rotate = value, "Ignoring invalid /Rotate");
            PageRotation::None
        })
    }

    // -- Resources ------------------------------------------------------------

    /// Make `font` available on `page_id` and return its resource name.
    pub fn font_resource(&mut self, page_id: ObjectId, font: StandardFont) -> Result<Vec<u8>> {
        let font_id = match self.fonts.get(font.base_font) {
            Some(id) => *id,
            None => {
                let mut dict = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => font.base_font,
                };
                if !font.symbolic {
                    dict.set("Encoding", "WinAnsiEncoding");
                }
                let id = self.document.add_object(dict);
                self.fonts.insert(font.base_font, id);
                id
            }
        };
        self.register_resource(page_id, b"Font", "InlayF", font_id)
    }

    /// Add an image XObject (with a soft mask when the samples carry alpha)
    /// and return its object id. The object can be shared by any number of
    /// pages.
    pub fn add_image(&mut self, samples: &PdfSamples) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => samples.width as i64,
            "Height" => samples.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        };

        if let Some(alpha) = &samples.alpha {
            let mask = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => samples.width as i64,
                "Height" => samples.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            };
            let mask_id = self.document.add_object(Stream::new(mask, alpha.clone()));
            dict.set("SMask", Object::Reference(mask_id));
        }

        let id = self
            .document
            .add_object(Stream::new(dict, samples.rgb.clone()));
        debug!(?id, width = samples.width, height = samples.height, "Image XObject added");
        id
    }

    /// Make the XObject `xobject_id` available on `page_id` and return its
    /// resource name.
    pub fn xobject_resource(&mut self, page_id: ObjectId, xobject_id: ObjectId) -> Result<Vec<u8>> {
        self.register_resource(page_id, b"XObject", "InlayIm", xobject_id)
    }

    /// Ensure `/Resources/<category>` of the page maps some name to
    /// `target`, reusing an existing mapping. The page receives its own copy
    /// of the effective (possibly inherited) resource dictionary.
    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        target: ObjectId,
    ) -> Result<Vec<u8>> {
        let mut resources = self
            .inherited(page_id, b"Resources")
            .and_then(|obj| resolve(&self.document, obj).as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|obj| resolve(&self.document, obj).as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        let existing = entries.iter().find_map(|(key, value)| match value {
            Object::Reference(id) if *id == target => Some(key.clone()),
            _ => None,
        });
        let name = match existing {
            Some(name) => name,
            None => {
                let name = unique_name(&entries, prefix);
                entries.set(name.clone(), Object::Reference(target));
                resources.set(category.to_vec(), Object::Dictionary(entries));
                self.page_dict_mut(page_id)?
                    .set("Resources", Object::Dictionary(resources));
                name
            }
        };
        Ok(name)
    }

    // -- Content --------------------------------------------------------------

    /// Append `operations` to the page as a new content stream drawn on top
    /// of everything already there.
    ///
    /// The first overlay on a page also wraps the original content in
    /// `q … Q`, so a graphics state left dangling by the original content
    /// never leaks into the overlay.
    pub fn append_overlay(&mut self, page_id: ObjectId, operations: Vec<Operation>) -> Result<()> {
        let mut contents = self.page_contents(page_id)?;

        if self.isolated.insert(page_id) && !contents.is_empty() {
            let open = self.add_content(vec![Operation::new("q", vec![])])?;
            let close = self.add_content(vec![Operation::new("Q", vec![])])?;
            contents.insert(0, Object::Reference(open));
            contents.push(Object::Reference(close));
        }

        let overlay = self.add_content(operations)?;
        contents.push(Object::Reference(overlay));

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Add a content stream. Readers concatenate a page's streams, so each
    /// one is padded with a newline on both sides to keep the last operator
    /// of one stream apart from the first of the next.
    fn add_content(&mut self, operations: Vec<Operation>) -> Result<ObjectId> {
        let encoded = Content { operations }
            .encode()
            .map_err(|err| InlayError::PdfError(format!("failed to encode content: {}", err)))?;
        let mut bytes = Vec::with_capacity(encoded.len() + 2);
        bytes.push(b'\n');
        bytes.extend_from_slice(&encoded);
        bytes.push(b'\n');
        Ok(self.document.add_object(Stream::new(Dictionary::new(), bytes)))
    }

    /// Current /Contents of a page as a flat list of stream references.
    fn page_contents(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let page = self.page_dict(page_id)?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                // A reference to an array of streams rather than a stream.
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            _ => Vec::new(),
        };
        Ok(contents)
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the document to `path` without ever exposing a partial
    /// file there: bytes go to a temp file in the same directory, which is
    /// then renamed over `path`.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn save_atomic(&mut self, path: &Path) -> Result<()> {
        let write_error = |reason: String| InlayError::WriteError {
            path: path.to_path_buf(),
            reason,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|err| write_error(err.to_string()))?;

        let mut file = tempfile::Builder::new()
            .prefix(".inlay-")
            .suffix(".pdf.part")
            .tempfile_in(dir)
            .map_err(|err| write_error(err.to_string()))?;

        self.document.compress();
        self.document
            .save_to(&mut file)
            .map_err(|err| write_error(err.to_string()))?;
        file.as_file()
            .sync_all()
            .map_err(|err| write_error(err.to_string()))?;

        file.persist(path)
            .map_err(|err| write_error(err.error.to_string()))?;

        info!(pages = self.pages.len(), "PDF saved");
        Ok(())
    }

    // -- Helpers --------------------------------------------------------------

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary> {
        self.document
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|err| InlayError::PdfError(format!("cannot read page {:?}: {}", page_id, err)))
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        self.document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| InlayError::PdfError(format!("cannot edit page {:?}: {}", page_id, err)))
    }

    /// Look up an inheritable page attribute, walking /Parent links.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.document.get_object(page_id).ok()?.as_dict().ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.document.get_object(parent).ok()?.as_dict().ok()?;
        }
        None
    }
}

/// Follow one level of indirection.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn rect_from(document: &Document, object: &Object) -> Option<PageBox> {
    let items = resolve(document, object).as_array().ok()?;
    let values: Vec<f32> = items
        .iter()
        .filter_map(|item| number(resolve(document, item)))
        .collect();
    match values[..] {
        [x0, y0, x1, y1] if x0 != x1 && y0 != y1 => Some(PageBox::from_corners(x0, y0, x1, y1)),
        _ => None,
    }
}

/// First `<prefix><n>` not already used as a key in `dict`.
fn unique_name(dict: &Dictionary, prefix: &str) -> Vec<u8> {
    (1..)
        .map(|n| format!("{prefix}{n}").into_bytes())
        .find(|candidate| !dict.has(candidate))
        .unwrap_or_else(|| prefix.as_bytes().to_vec())
}
