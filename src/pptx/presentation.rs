//! Presentation model: ordered slide enumeration, the notes surface, audio
//! attachment, and export.
//!
//! A [`Presentation`] owns the underlying [`Package`] exclusively for its
//! lifetime. Slides are discovered through the presentation relationships
//! (never by scanning paths directly) and ordered by the numeric suffix of
//! their part names. Each slide tracks its current audio relationship, so
//! re-attaching narration replaces the previous clip.

use crate::opc::constants::{namespace as ns, relationship_type as rt};
use crate::opc::{OpcError, Package, PackURI, Relationships};
use crate::pptx::error::{PptxError, Result};
use crate::pptx::{audio, notes};
use crate::xml::XmlElement;
use chrono::Utc;
use log::info;
use serde::Serialize;

const PRESENTATION_PART: &str = "/ppt/presentation.xml";
const CORE_PROPS_PART: &str = "/docProps/core.xml";
const APP_PROPS_PART: &str = "/docProps/app.xml";

fn pack_uri(s: &str) -> Result<PackURI> {
    PackURI::new(s).map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))
}

/// A slide within an open presentation.
#[derive(Debug, Clone)]
pub struct Slide {
    index: usize,
    part: PackURI,
    audio_rel_id: Option<String>,
}

impl Slide {
    /// Zero-based position within the presentation.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Part name of the slide XML.
    pub fn part(&self) -> &PackURI {
        &self.part
    }

    /// rId of the slide's audio relationship, if narration is attached.
    pub fn audio_rel_id(&self) -> Option<&str> {
        self.audio_rel_id.as_deref()
    }

    pub(crate) fn set_audio_rel_id(&mut self, r_id: Option<String>) {
        self.audio_rel_id = r_id;
    }
}

/// One entry of the outward slide listing: index plus current notes text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideOverview {
    pub index: usize,
    pub notes: String,
}

/// An open presentation package.
pub struct Presentation {
    package: Package,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Open a presentation from raw `.pptx` bytes.
    ///
    /// Fails when the archive is not a valid package or lacks the main
    /// presentation part.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let package = Package::open(bytes)?;

        let pres_uri = pack_uri(PRESENTATION_PART)?;
        if !package.contains(&pres_uri) {
            return Err(PptxError::InvalidPresentation(format!(
                "missing {}",
                PRESENTATION_PART
            )));
        }

        let slides = Self::load_slides(&package)?;
        info!("opened presentation with {} slide(s)", slides.len());
        Ok(Self { package, slides })
    }

    /// Discover slides through the presentation relationships and order them
    /// by the numeric suffix of their part names.
    fn load_slides(package: &Package) -> Result<Vec<Slide>> {
        let pres_uri = pack_uri(PRESENTATION_PART)?;
        let rels_uri = pres_uri
            .rels_uri()
            .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;

        let blob = package
            .try_read(&rels_uri)
            .ok_or_else(|| PptxError::RelsNotFound(rels_uri.to_string()))?;
        let rels = Relationships::from_xml(blob, pres_uri.base_uri())?;

        let mut indexed: Vec<(u32, PackURI)> = Vec::new();
        for rel in rels.by_type(rt::SLIDE) {
            let part = rel.target_partname()?;
            if !part.as_str().contains("slides/slide") {
                continue;
            }
            indexed.push((part.idx().unwrap_or(0), part));
        }
        indexed.sort_by_key(|(n, _)| *n);

        let mut slides = Vec::with_capacity(indexed.len());
        for (index, (_, part)) in indexed.into_iter().enumerate() {
            let audio_rel_id = Self::detect_audio_rel(package, &part)?;
            slides.push(Slide {
                index,
                part,
                audio_rel_id,
            });
        }

        Ok(slides)
    }

    /// First audio relationship of a slide, if present.
    fn detect_audio_rel(package: &Package, slide_part: &PackURI) -> Result<Option<String>> {
        let rels_uri = slide_part
            .rels_uri()
            .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;
        let Some(blob) = package.try_read(&rels_uri) else {
            return Ok(None);
        };
        let rels = Relationships::from_xml(blob, slide_part.base_uri())?;
        Ok(rels.by_type(rt::AUDIO).next().map(|rel| rel.r_id().to_string()))
    }

    /// Number of slides.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// All slides in presentation order.
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    fn slide(&self, index: usize) -> Result<&Slide> {
        self.slides.get(index).ok_or(PptxError::SlideOutOfRange {
            index,
            count: self.slides.len(),
        })
    }

    /// Ordered listing of `{index, notes}` for the presentation surface.
    pub fn slide_overviews(&self) -> Result<Vec<SlideOverview>> {
        self.slides
            .iter()
            .map(|slide| {
                Ok(SlideOverview {
                    index: slide.index,
                    notes: notes::read_notes(&self.package, &slide.part)?,
                })
            })
            .collect()
    }

    /// Notes text for a slide; slides without notes read as empty.
    pub fn notes(&self, index: usize) -> Result<String> {
        let slide = self.slide(index)?;
        notes::read_notes(&self.package, &slide.part)
    }

    /// Set the notes text for a slide, creating the notes part and its
    /// relationship wiring when absent.
    pub fn set_notes(&mut self, index: usize, text: &str) -> Result<()> {
        let part = self.slide(index)?.part.clone();
        notes::write_notes(&mut self.package, &part, text)
    }

    /// Attach (or replace) a narration clip on a slide.
    ///
    /// Returns the rId of the slide's audio relationship.
    pub fn attach_audio(&mut self, index: usize, audio_bytes: &[u8], mime: &str) -> Result<String> {
        if index >= self.slides.len() {
            return Err(PptxError::SlideOutOfRange {
                index,
                count: self.slides.len(),
            });
        }
        audio::attach_audio(&mut self.package, &mut self.slides[index], audio_bytes, mime)
    }

    /// Serialize the presentation back into `.pptx` bytes.
    ///
    /// Refreshes the core-properties modified timestamp and the notes count
    /// in the application properties when those parts are present; untouched
    /// parts are re-emitted byte-for-byte.
    pub fn export(&mut self) -> Result<Vec<u8>> {
        self.touch_core_properties()?;
        self.update_notes_count()?;
        Ok(self.package.export()?)
    }

    fn touch_core_properties(&mut self) -> Result<()> {
        let core_uri = pack_uri(CORE_PROPS_PART)?;
        let Some(blob) = self.package.try_read(&core_uri) else {
            return Ok(());
        };
        let mut root = XmlElement::parse(blob)?;

        if root.attr("xmlns:dcterms").is_none() {
            root.set_attr("xmlns:dcterms", ns::DCTERMS);
        }
        if root.attr("xmlns:xsi").is_none() {
            root.set_attr("xmlns:xsi", ns::XSI);
        }

        if root.child("dcterms:modified").is_none() {
            root.push(XmlElement::new("dcterms:modified"));
        }
        let modified = root.child_mut("dcterms:modified").unwrap();
        modified.set_text(&Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
        modified.set_attr("xsi:type", "dcterms:W3CDTF");

        self.package.write(&core_uri, root.to_document_bytes());
        Ok(())
    }

    fn update_notes_count(&mut self) -> Result<()> {
        let app_uri = pack_uri(APP_PROPS_PART)?;
        let Some(blob) = self.package.try_read(&app_uri) else {
            return Ok(());
        };

        let mut count = 0usize;
        for slide in &self.slides {
            if notes::notes_part_for_slide(&self.package, &slide.part)?.is_some() {
                count += 1;
            }
        }

        let mut root = XmlElement::parse(blob)?;
        if root.child("Notes").is_none() {
            root.push(XmlElement::new("Notes"));
        }
        root.child_mut("Notes").unwrap().set_text(&count.to_string());

        self.package.write(&app_uri, root.to_document_bytes());
        Ok(())
    }

    /// The underlying package, for inspection.
    pub fn package(&self) -> &Package {
        &self.package
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// Build a minimal n-slide presentation archive in memory.
    ///
    /// Slides carry empty shape trees and no timing tree, so attachment has
    /// to synthesize the full ancestor chain.
    pub(crate) fn sample_pptx(slide_count: usize) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
        );
        for i in 1..=slide_count {
            content_types.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                i
            ));
        }
        content_types.push_str("</Types>");

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(content_types.as_bytes()).unwrap();

        writer.start_file("_rels/.rels", options).unwrap();
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#).unwrap();

        let mut sld_ids = String::new();
        let mut pres_rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for i in 1..=slide_count {
            sld_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + i, i));
            pres_rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
                i, i
            ));
        }
        pres_rels.push_str("</Relationships>");

        writer.start_file("ppt/presentation.xml", options).unwrap();
        writer
            .write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldMasterIdLst/><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
                    sld_ids
                )
                .as_bytes(),
            )
            .unwrap();

        writer
            .start_file("ppt/_rels/presentation.xml.rels", options)
            .unwrap();
        writer.write_all(pres_rels.as_bytes()).unwrap();

        for i in 1..=slide_count {
            writer
                .start_file(format!("ppt/slides/slide{}.xml", i), options)
                .unwrap();
            writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sld>"#).unwrap();

            writer
                .start_file(format!("ppt/slides/_rels/slide{}.xml.rels", i), options)
                .unwrap();
            writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#).unwrap();
        }

        writer.start_file("ppt/theme/theme1.xml", options).unwrap();
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office"/>"#).unwrap();

        writer.start_file("docProps/core.xml", options).unwrap();
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Sample</dc:title><dcterms:modified xsi:type="dcterms:W3CDTF">2020-01-01T00:00:00Z</dcterms:modified></cp:coreProperties>"#).unwrap();

        writer.start_file("docProps/app.xml", options).unwrap();
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Slides>4</Slides><Notes>0</Notes></Properties>"#).unwrap();

        writer.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::sample_pptx;
    use super::*;
    use crate::opc::constants::relationship_type as rt;

    const MP3_ONE: &[u8] = b"\xff\xfbfirst-clip-bytes";
    const MP3_TWO: &[u8] = b"\xff\xfbsecond-clip-bytes-differ";

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn uri(s: &str) -> PackURI {
        PackURI::new(s).unwrap()
    }

    fn slide_rels(pres: &Presentation, index: usize) -> Relationships {
        let part = pres.slides()[index].part().clone();
        let rels_uri = part.rels_uri().unwrap();
        Relationships::from_xml(pres.package().try_read(&rels_uri).unwrap(), part.base_uri())
            .unwrap()
    }

    #[test]
    fn test_open_rejects_archive_without_presentation_part() {
        use std::io::{Cursor, Write};
        use zip::ZipWriter;
        use zip::write::SimpleFileOptions;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            Presentation::open(&bytes),
            Err(PptxError::InvalidPresentation(_))
        ));
    }

    #[test]
    fn test_slide_enumeration_in_order() {
        let pres = Presentation::open(&sample_pptx(3)).unwrap();
        assert_eq!(pres.slide_count(), 3);
        for (i, slide) in pres.slides().iter().enumerate() {
            assert_eq!(slide.index(), i);
            assert_eq!(
                slide.part().as_str(),
                format!("/ppt/slides/slide{}.xml", i + 1)
            );
            assert!(slide.audio_rel_id().is_none());
        }
    }

    #[test]
    fn test_notes_read_empty_and_write_creates_chain() {
        let mut pres = Presentation::open(&sample_pptx(2)).unwrap();
        assert_eq!(pres.notes(0).unwrap(), "");

        pres.set_notes(0, "Speaker notes\nwith two lines").unwrap();
        assert_eq!(pres.notes(0).unwrap(), "Speaker notes\nwith two lines");

        let pkg = pres.package();
        assert!(pkg.contains(&uri("/ppt/notesSlides/notesSlide1.xml")));
        assert!(pkg.contains(&uri("/ppt/notesMasters/notesMaster1.xml")));
        assert!(pkg.contains(&uri("/ppt/theme/theme2.xml")));

        // Slide -> notes and notes -> slide wiring
        let rels = slide_rels(&pres, 0);
        assert!(rels.by_type(rt::NOTES_SLIDE).next().is_some());
        let notes_rels = Relationships::from_xml(
            pkg.try_read(&uri("/ppt/notesSlides/_rels/notesSlide1.xml.rels"))
                .unwrap(),
            "/ppt/notesSlides",
        )
        .unwrap();
        assert!(notes_rels.by_type(rt::SLIDE).next().is_some());
        assert!(notes_rels.by_type(rt::NOTES_MASTER).next().is_some());

        // Presentation now declares the notes master
        let pres_xml = pkg.try_read(&uri("/ppt/presentation.xml")).unwrap();
        let text = std::str::from_utf8(pres_xml).unwrap();
        assert!(text.contains("<p:notesMasterIdLst>"));

        // Manifest got the new overrides
        let cts = std::str::from_utf8(
            pkg.try_read(&uri("/[Content_Types].xml")).unwrap(),
        )
        .unwrap()
        .to_string();
        assert!(cts.contains("/ppt/notesSlides/notesSlide1.xml"));
        assert!(cts.contains("/ppt/notesMasters/notesMaster1.xml"));
    }

    #[test]
    fn test_notes_edit_is_isolated_to_one_slide() {
        let mut pres = Presentation::open(&sample_pptx(3)).unwrap();
        let before: Vec<Vec<u8>> = (0..3)
            .map(|i| {
                let rels_uri = pres.slides()[i].part().rels_uri().unwrap();
                pres.package().try_read(&rels_uri).unwrap().to_vec()
            })
            .collect();

        pres.set_notes(1, "only slide two").unwrap();

        for (i, original) in before.iter().enumerate() {
            let rels_uri = pres.slides()[i].part().rels_uri().unwrap();
            let now = pres.package().try_read(&rels_uri).unwrap();
            if i == 1 {
                assert_ne!(now, original.as_slice());
            } else {
                assert_eq!(now, original.as_slice(), "slide {} rels changed", i + 1);
            }
        }
        assert_eq!(pres.notes(0).unwrap(), "");
        assert_eq!(pres.notes(2).unwrap(), "");
    }

    #[test]
    fn test_editing_existing_notes_rewrites_text_in_place() {
        let mut pres = Presentation::open(&sample_pptx(1)).unwrap();
        pres.set_notes(0, "first version").unwrap();
        pres.set_notes(0, "second version").unwrap();

        assert_eq!(pres.notes(0).unwrap(), "second version");
        // No second notes part appeared
        let count = pres
            .package()
            .part_names()
            .filter(|n| n.as_str().starts_with("/ppt/notesSlides/") && n.ext() == "xml")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_attach_audio_creates_media_rels_and_timing() {
        let mut pres = Presentation::open(&sample_pptx(2)).unwrap();
        let r_id = pres.attach_audio(0, MP3_ONE, "audio/mpeg").unwrap();

        assert_eq!(pres.slides()[0].audio_rel_id(), Some(r_id.as_str()));
        assert!(pres.package().contains(&uri("/ppt/media/media1.mp3")));
        assert_eq!(
            pres.package().try_read(&uri("/ppt/media/media1.mp3")),
            Some(MP3_ONE)
        );
        assert!(pres.package().contains(&uri("/ppt/media/image1.png")));

        let rels = slide_rels(&pres, 0);
        assert!(rels.by_type(rt::AUDIO).next().is_some());
        assert!(rels.by_type(rt::MEDIA).next().is_some());
        assert!(rels.by_type(rt::IMAGE).next().is_some());

        let slide_xml = pres
            .package()
            .try_read(pres.slides()[0].part())
            .unwrap();
        let root = XmlElement::parse(slide_xml).unwrap();
        let timing = root.child("p:timing").expect("timing tree synthesized");
        let mut audio_nodes = 0;
        let mut cmd_nodes = 0;
        timing.walk(&mut |el| {
            if el.is_named("p:audio") {
                audio_nodes += 1;
            }
            if el.is_named("p:cmd") {
                cmd_nodes += 1;
            }
        });
        assert_eq!(audio_nodes, 1);
        assert_eq!(cmd_nodes, 1);

        let text = std::str::from_utf8(slide_xml).unwrap();
        assert!(text.contains(r#"a:audioFile r:link="#));
        assert!(text.contains("xmlns:p14="));

        let cts = std::str::from_utf8(
            pres.package().try_read(&uri("/[Content_Types].xml")).unwrap(),
        )
        .unwrap()
        .to_string();
        assert!(cts.contains(r#"Extension="mp3""#));
        assert!(cts.contains(r#"Extension="png""#));
    }

    #[test]
    fn test_attach_audio_twice_replaces_without_orphans() {
        let mut pres = Presentation::open(&sample_pptx(2)).unwrap();
        pres.attach_audio(0, MP3_ONE, "audio/mpeg").unwrap();
        pres.attach_audio(0, MP3_TWO, "audio/mpeg").unwrap();

        // Exactly one audio relationship on the slide
        let rels = slide_rels(&pres, 0);
        assert_eq!(rels.by_type(rt::AUDIO).count(), 1);
        assert_eq!(rels.by_type(rt::MEDIA).count(), 1);

        // Exactly one mp3 media part, holding the second clip's bytes
        let media: Vec<_> = pres
            .package()
            .part_names()
            .filter(|n| n.base_uri() == "/ppt/media" && n.ext() == "mp3")
            .cloned()
            .collect();
        assert_eq!(media.len(), 1);
        assert_eq!(pres.package().try_read(&media[0]), Some(MP3_TWO));

        // One pic shape and one trigger pair remain
        let slide_xml = pres.package().try_read(pres.slides()[0].part()).unwrap();
        let root = XmlElement::parse(slide_xml).unwrap();
        let mut pics = 0;
        let mut audio_nodes = 0;
        let mut cmds = 0;
        root.walk(&mut |el| {
            if el.is_named("p:pic") {
                pics += 1;
            }
            if el.is_named("p:audio") {
                audio_nodes += 1;
            }
            if el.is_named("p:cmd") {
                cmds += 1;
            }
        });
        assert_eq!(pics, 1);
        assert_eq!(audio_nodes, 1);
        assert_eq!(cmds, 1);
    }

    #[test]
    fn test_attach_audio_out_of_range() {
        let mut pres = Presentation::open(&sample_pptx(1)).unwrap();
        assert!(matches!(
            pres.attach_audio(5, MP3_ONE, "audio/mpeg"),
            Err(PptxError::SlideOutOfRange { index: 5, count: 1 })
        ));
    }

    #[test]
    fn test_attach_preserves_unrelated_timing_children() {
        let mut pres = Presentation::open(&sample_pptx(1)).unwrap();
        pres.attach_audio(0, MP3_ONE, "audio/mpeg").unwrap();
        let part = pres.slides()[0].part().clone();

        // Plant an unrelated animation command next to the narration command
        let mut bytes = pres.export().unwrap();
        {
            let mut pkg = Package::open(&bytes).unwrap();
            let mut root = XmlElement::parse(pkg.try_read(&part).unwrap()).unwrap();
            let command_parent = root
                .child_mut("p:timing")
                .and_then(|el| el.child_mut("p:tnLst"))
                .and_then(|el| el.child_mut("p:par"))
                .and_then(|el| el.child_mut("p:cTn"))
                .and_then(|el| el.child_mut("p:childTnLst"))
                .and_then(|el| el.child_mut("p:seq"))
                .and_then(|el| el.child_mut("p:cTn"))
                .and_then(|el| el.child_mut("p:childTnLst"))
                .and_then(|el| el.child_mut("p:par"))
                .and_then(|el| el.child_mut("p:cTn"))
                .and_then(|el| el.child_mut("p:childTnLst"))
                .unwrap();
            let mut unrelated = XmlElement::with_attrs("p:par", &[("keep", "1")]);
            unrelated.push(XmlElement::with_attrs("p:cTn", &[("id", "90"), ("fill", "hold")]));
            command_parent.push(unrelated);
            pkg.write(&part, root.to_document_bytes());
            bytes = pkg.export().unwrap();
        }

        let mut pres = Presentation::open(&bytes).unwrap();
        pres.attach_audio(0, MP3_TWO, "audio/mpeg").unwrap();

        let text = std::str::from_utf8(pres.package().try_read(&part).unwrap())
            .unwrap()
            .to_string();
        assert!(text.contains(r#"<p:par keep="1">"#), "unrelated trigger was removed");
    }

    #[test]
    fn test_scenario_attach_export_reopen() {
        init_logs();
        let original = sample_pptx(4);
        let mut pres = Presentation::open(&original).unwrap();
        pres.attach_audio(1, MP3_ONE, "audio/mpeg").unwrap();
        let exported = pres.export().unwrap();

        // Round-trip through the filesystem like a real save/open cycle
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voiced.pptx");
        std::fs::write(&path, &exported).unwrap();
        let exported = std::fs::read(&path).unwrap();

        let reopened = Presentation::open(&exported).unwrap();
        assert_eq!(reopened.slide_count(), 4);
        for (i, slide) in reopened.slides().iter().enumerate() {
            if i == 1 {
                assert!(slide.audio_rel_id().is_some(), "slide 2 lost its narration");
                let rels = slide_rels(&reopened, i);
                assert_eq!(rels.by_type(rt::AUDIO).count(), 1);
            } else {
                assert!(slide.audio_rel_id().is_none(), "slide {} gained narration", i + 1);
            }
        }

        // Untouched slides round-trip byte-for-byte
        let first = Package::open(&original).unwrap();
        for name in ["/ppt/slides/slide1.xml", "/ppt/slides/slide3.xml", "/ppt/slides/slide4.xml"] {
            assert_eq!(
                reopened.package().try_read(&uri(name)),
                first.try_read(&uri(name)),
                "{} changed",
                name
            );
        }

        // Reopen + re-attach still yields exactly one clip
        let mut reopened = reopened;
        reopened.attach_audio(1, MP3_TWO, "audio/mpeg").unwrap();
        let media: Vec<_> = reopened
            .package()
            .part_names()
            .filter(|n| n.base_uri() == "/ppt/media" && n.ext() == "mp3")
            .cloned()
            .collect();
        assert_eq!(media.len(), 1);
        assert_eq!(reopened.package().try_read(&media[0]), Some(MP3_TWO));
    }

    #[test]
    fn test_export_updates_core_and_app_properties() {
        let mut pres = Presentation::open(&sample_pptx(2)).unwrap();
        pres.set_notes(0, "noted").unwrap();
        let exported = pres.export().unwrap();

        let pkg = Package::open(&exported).unwrap();
        let core = std::str::from_utf8(pkg.try_read(&uri("/docProps/core.xml")).unwrap())
            .unwrap()
            .to_string();
        assert!(!core.contains("2020-01-01T00:00:00Z"));
        assert!(core.contains("dcterms:W3CDTF"));

        let app = std::str::from_utf8(pkg.try_read(&uri("/docProps/app.xml")).unwrap())
            .unwrap()
            .to_string();
        assert!(app.contains("<Notes>1</Notes>"));
    }
}
