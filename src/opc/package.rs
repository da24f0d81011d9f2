//! In-memory OPC package with dirty-part tracking.
//!
//! A [`Package`] holds every zip member of an opened archive as raw bytes in
//! archive order. Mutations replace part payloads and mark them dirty;
//! untouched parts are re-emitted byte-for-byte on export, so a round trip
//! without writes reproduces every part exactly. Relationship files and the
//! content-type manifest are ordinary parts here; richer layers parse them on
//! demand and write them back through [`Package::write`].

use crate::opc::constants::content_type as ct;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use crate::xml::XmlElement;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

struct PartEntry {
    name: PackURI,
    blob: Vec<u8>,
}

/// An OPC package loaded entirely into memory.
pub struct Package {
    /// Parts in archive order; new parts are appended
    parts: Vec<PartEntry>,

    /// Part name -> position in `parts`
    index: HashMap<String, usize>,

    /// Names of parts whose payload has been replaced or added
    dirty: HashSet<String>,
}

impl Package {
    /// Open a package from raw archive bytes.
    ///
    /// Fails when the input is not a zip archive or when the mandatory
    /// `[Content_Types].xml` manifest is absent.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| OpcError::NotAPackage(e.to_string()))?;

        let mut parts = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let name = PackURI::new(format!("/{}", file.name()))
                .map_err(OpcError::InvalidPackUri)?;
            let mut blob = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut blob)?;

            index.insert(name.as_str().to_string(), parts.len());
            parts.push(PartEntry { name, blob });
        }

        let package = Self {
            parts,
            index,
            dirty: HashSet::new(),
        };

        if !package.contains_name(CONTENT_TYPES_URI) {
            return Err(OpcError::MissingContentTypes);
        }

        debug!("opened package with {} parts", package.parts.len());
        Ok(package)
    }

    /// Get the payload of a part.
    pub fn read(&self, name: &PackURI) -> Result<&[u8]> {
        self.try_read(name)
            .ok_or_else(|| OpcError::PartNotFound(name.to_string()))
    }

    /// Get the payload of a part, or None when absent.
    pub fn try_read(&self, name: &PackURI) -> Option<&[u8]> {
        self.index
            .get(name.as_str())
            .map(|&i| self.parts[i].blob.as_slice())
    }

    /// Replace a part's payload, creating the part if it does not exist yet.
    ///
    /// The part is marked dirty. Content types are not touched; use
    /// [`Package::add_part`] when a new part needs a manifest entry beyond
    /// the extension defaults (e.g. `.rels` files are already covered).
    pub fn write(&mut self, name: &PackURI, blob: Vec<u8>) {
        match self.index.get(name.as_str()) {
            Some(&i) => self.parts[i].blob = blob,
            None => {
                self.index
                    .insert(name.as_str().to_string(), self.parts.len());
                self.parts.push(PartEntry {
                    name: name.clone(),
                    blob,
                });
            },
        }
        self.dirty.insert(name.as_str().to_string());
    }

    /// Add a new part and register its content type in the manifest.
    ///
    /// Well-known extension/content-type pairs are registered as a Default
    /// entry, anything else as an Override for the specific part name.
    pub fn add_part(&mut self, name: &PackURI, blob: Vec<u8>, content_type: &str) -> Result<()> {
        if self.contains(name) {
            return Err(OpcError::DuplicatePart(name.to_string()));
        }

        if is_default_content_type(name.ext(), content_type) {
            self.ensure_default_content_type(name.ext(), content_type)?;
        } else {
            self.ensure_override_content_type(name.as_str(), content_type)?;
        }
        self.write(name, blob);
        debug!("added part {} ({})", name, content_type);
        Ok(())
    }

    /// Remove a part from the package.
    pub fn remove_part(&mut self, name: &PackURI) -> Result<()> {
        let pos = self
            .index
            .remove(name.as_str())
            .ok_or_else(|| OpcError::PartNotFound(name.to_string()))?;
        self.parts.remove(pos);
        self.dirty.remove(name.as_str());
        for i in pos..self.parts.len() {
            self.index
                .insert(self.parts[i].name.as_str().to_string(), i);
        }
        debug!("removed part {}", name);
        Ok(())
    }

    /// Check if a part exists.
    pub fn contains(&self, name: &PackURI) -> bool {
        self.contains_name(name.as_str())
    }

    fn contains_name(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether a part has been written since the package was opened.
    pub fn is_dirty(&self, name: &PackURI) -> bool {
        self.dirty.contains(name.as_str())
    }

    /// Iterate part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &PackURI> {
        self.parts.iter().map(|p| &p.name)
    }

    /// Number of parts in the package.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Ensure the manifest has a Default entry for an extension.
    pub fn ensure_default_content_type(&mut self, extension: &str, content_type: &str) -> Result<()> {
        self.edit_content_types(|root| {
            let exists = root.child_elements().any(|el| {
                el.is_named("Default")
                    && el
                        .attr("Extension")
                        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            });
            if exists {
                return false;
            }
            root.push(XmlElement::with_attrs(
                "Default",
                &[("Extension", extension), ("ContentType", content_type)],
            ));
            true
        })
    }

    /// Ensure the manifest has an Override entry for a part name.
    pub fn ensure_override_content_type(&mut self, part_name: &str, content_type: &str) -> Result<()> {
        self.edit_content_types(|root| {
            let exists = root
                .child_elements()
                .any(|el| el.is_named("Override") && el.attr("PartName") == Some(part_name));
            if exists {
                return false;
            }
            root.push(XmlElement::with_attrs(
                "Override",
                &[("PartName", part_name), ("ContentType", content_type)],
            ));
            true
        })
    }

    /// Parse, edit, and (when changed) rewrite the content-type manifest.
    fn edit_content_types(&mut self, edit: impl FnOnce(&mut XmlElement) -> bool) -> Result<()> {
        let uri = PackURI::new(CONTENT_TYPES_URI).map_err(OpcError::InvalidPackUri)?;
        let mut root = XmlElement::parse(self.read(&uri)?)?;
        if edit(&mut root) {
            self.write(&uri, root.to_document_bytes());
        }
        Ok(())
    }

    /// Serialize the package back into a zip archive.
    ///
    /// Parts are emitted in their original archive order with new parts at
    /// the end, all deflate-compressed.
    pub fn export(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            writer.start_file(part.name.membername(), options)?;
            writer.write_all(&part.blob)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Check if an extension/content-type pair is a standard Default mapping.
fn is_default_content_type(ext: &str, content_type: &str) -> bool {
    matches!(
        (ext, content_type),
        ("rels", ct::OPC_RELATIONSHIPS)
            | ("xml", ct::XML)
            | ("mp3", ct::MP3)
            | ("m4a", ct::M4A)
            | ("wav", ct::WAV)
            | ("png", ct::PNG)
            | ("jpg", ct::JPEG)
            | ("jpeg", ct::JPEG)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> PackURI {
        PackURI::new(s).unwrap()
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, blob) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(blob).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const CONTENT_TYPES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    fn minimal_package() -> Vec<u8> {
        build_zip(&[
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#),
            ("ppt/presentation.xml", b"<p:presentation/>"),
        ])
    }

    #[test]
    fn test_open_rejects_non_zip() {
        assert!(matches!(
            Package::open(b"not a zip"),
            Err(OpcError::NotAPackage(_))
        ));
    }

    #[test]
    fn test_open_requires_content_types() {
        let bytes = build_zip(&[("ppt/presentation.xml", b"<p:presentation/>")]);
        assert!(matches!(
            Package::open(&bytes),
            Err(OpcError::MissingContentTypes)
        ));
    }

    #[test]
    fn test_read_write_and_dirty_tracking() {
        let mut pkg = Package::open(&minimal_package()).unwrap();
        let pres = uri("/ppt/presentation.xml");

        assert_eq!(pkg.read(&pres).unwrap(), b"<p:presentation/>");
        assert!(!pkg.is_dirty(&pres));

        pkg.write(&pres, b"<p:presentation><p:sldIdLst/></p:presentation>".to_vec());
        assert!(pkg.is_dirty(&pres));
        assert!(pkg.read(&pres).unwrap().starts_with(b"<p:presentation>"));

        assert!(matches!(
            pkg.read(&uri("/ppt/missing.xml")),
            Err(OpcError::PartNotFound(_))
        ));
    }

    #[test]
    fn test_export_round_trip_is_byte_identical_for_untouched_parts() {
        let pkg = Package::open(&minimal_package()).unwrap();
        let exported = pkg.export().unwrap();

        let reopened = Package::open(&exported).unwrap();
        assert_eq!(reopened.part_count(), pkg.part_count());
        for name in pkg.part_names() {
            assert_eq!(
                reopened.read(name).unwrap(),
                pkg.read(name).unwrap(),
                "part {} changed across round trip",
                name
            );
        }
        // The manifest specifically must survive untouched
        let cts = uri(CONTENT_TYPES_URI);
        assert_eq!(reopened.read(&cts).unwrap(), CONTENT_TYPES);
    }

    #[test]
    fn test_add_part_registers_default_content_type() {
        let mut pkg = Package::open(&minimal_package()).unwrap();
        let media = uri("/ppt/media/media1.mp3");

        pkg.add_part(&media, vec![0xff, 0xfb], ct::MP3).unwrap();

        let cts = pkg.read(&uri(CONTENT_TYPES_URI)).unwrap();
        let text = std::str::from_utf8(cts).unwrap();
        assert!(text.contains(r#"<Default Extension="mp3" ContentType="audio/mpeg"/>"#));

        // Adding a second mp3 does not duplicate the Default entry
        let media2 = uri("/ppt/media/media2.mp3");
        pkg.add_part(&media2, vec![0xff, 0xfb], ct::MP3).unwrap();
        let cts = pkg.read(&uri(CONTENT_TYPES_URI)).unwrap();
        let text = std::str::from_utf8(cts).unwrap();
        assert_eq!(text.matches(r#"Extension="mp3""#).count(), 1);
    }

    #[test]
    fn test_add_part_registers_override_content_type() {
        let mut pkg = Package::open(&minimal_package()).unwrap();
        let notes = uri("/ppt/notesSlides/notesSlide1.xml");

        pkg.add_part(&notes, b"<p:notes/>".to_vec(), ct::PML_NOTES_SLIDE)
            .unwrap();

        let cts = pkg.read(&uri(CONTENT_TYPES_URI)).unwrap();
        let text = std::str::from_utf8(cts).unwrap();
        assert!(text.contains(r#"PartName="/ppt/notesSlides/notesSlide1.xml""#));

        assert!(matches!(
            pkg.add_part(&notes, b"<p:notes/>".to_vec(), ct::PML_NOTES_SLIDE),
            Err(OpcError::DuplicatePart(_))
        ));
    }

    #[test]
    fn test_remove_part() {
        let mut pkg = Package::open(&minimal_package()).unwrap();
        let pres = uri("/ppt/presentation.xml");

        pkg.remove_part(&pres).unwrap();
        assert!(!pkg.contains(&pres));
        assert!(matches!(
            pkg.remove_part(&pres),
            Err(OpcError::PartNotFound(_))
        ));

        // Index stays consistent after the removal shifts later parts
        let rels = uri("/_rels/.rels");
        assert!(pkg.read(&rels).is_ok());
    }
}
